//! Byte-at-a-time execution: `spec.md` §4.F.
//!
//! One unified loop serves both single-byte and (already-lowered)
//! multibyte matching — see the module-level doc in [`super`] for why no
//! separate wide-character path is needed here.

use super::{byte_context, Dfa, TRANS_FAIL};

/// The result of scanning `buf[start..]` through a [`Dfa`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecResult {
    /// Offset (relative to the start of `buf`) one past the last matched
    /// byte, under leftmost-longest semantics: the last byte position at
    /// which the DFA could still be in an accepting state before the scan
    /// is forced to stop (end of region, a disallowed newline, or a dead
    /// transition). `None` if no match starts at `start`.
    pub match_end: Option<usize>,
    /// Number of `dfa.eol_byte()` bytes consumed strictly inside
    /// `start..end` (not counting the caller-supplied sentinel at `end`).
    pub newlines_consumed: usize,
}

/// Scans `buf` from `start` looking for the longest match beginning
/// exactly at `start`. `buf` must hold at least one byte past `end` — the
/// sentinel (ordinarily `dfa.eol_byte()`) a caller appends to mark the true
/// end of the search region, read here as an ordinary input byte so that
/// end-of-buffer is indistinguishable from end-of-line for anchors like
/// `$` (`spec.md` §4.F, "sentinel byte").
///
/// `preceding` is the context of whatever lies just before `start` (usually
/// `Context::NEWLINE` at the true start of a line). `allow_newline`
/// controls whether a `dfa.eol_byte()` byte found strictly inside
/// `start..end` is consumed like any other byte (multiline / `-z` style
/// scanning) or ends the search with no match (ordinary per-line search).
pub fn execute(
    dfa: &mut Dfa,
    buf: &[u8],
    start: usize,
    end: usize,
    preceding: crate::analyzer::Context,
    allow_newline: bool,
) -> ExecResult {
    let mut state = dfa.initial_state(preceding);
    let mut pos = start;
    let mut newlines_consumed = 0usize;
    let mut last_accept: Option<usize> = None;

    loop {
        let byte = buf[pos];
        let curr = byte_context(byte, dfa.eol_byte());

        if dfa.is_accepting(state, curr) {
            last_accept = Some(pos);
        }
        if pos >= end {
            return ExecResult {
                match_end: last_accept,
                newlines_consumed,
            };
        }
        if byte == dfa.eol_byte() {
            newlines_consumed += 1;
            if !allow_newline {
                return ExecResult {
                    match_end: last_accept,
                    newlines_consumed,
                };
            }
        }

        let next = dfa.step(state, byte);
        if next == TRANS_FAIL {
            return ExecResult {
                match_end: last_accept,
                newlines_consumed,
            };
        }
        state = next as usize;
        pos += 1;
    }
}
