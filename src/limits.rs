//! Implementation-contract constants from `spec.md` §6.

/// Width of the byte alphabet.
pub const NCHAR: usize = 256;

/// Maximum repetition count accepted in a `{m,n}` interval.
pub const RE_DUP_MAX: u32 = 255;

/// Upper bound on the number of transition tables (and, in this port, the
/// number of live non-initial [`crate::dfa::DfaState`]s) kept materialized
/// at once before a whole-table eviction.
pub const MAX_TRCOUNT: usize = 1024;

/// Maximum number of case-fold counterparts considered per input character.
pub const CASE_FOLDED_BUFSIZE: usize = 32;
