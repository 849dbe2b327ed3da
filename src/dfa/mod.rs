//! Lazy subset-construction DFA: `spec.md` §4.E-§4.F.
//!
//! [`Dfa`] builds states lazily, one transition at a time, exactly as GNU
//! grep's `lib/dfa.c` does: a state is nothing more than a position-set plus
//! the preceding-context mask that produced it, and `trans[s][c]` is
//! materialized only the first time byte `c` is actually read in state `s`.
//!
//! One architectural difference from the original, licensed by this port's
//! own earlier design choice: `ANYCHAR` and non-ASCII wide characters are
//! already lowered into concrete byte-range position subgraphs by
//! [`crate::parser`] (`spec.md` §4.C), so there is no symbolic `ANYCHAR`
//! token left for the DFA layer to special-case. Multibyte matching falls
//! out of ordinary subset construction over the expanded byte automaton, and
//! the executor in [`exec`] needs only one unified byte loop — the
//! original's separate `mbps`/`mb_trindex`/`transit_state` machinery has no
//! work left to do here, and `firstpos` of the lowered subgraph already
//! excludes continuation-only byte classes by ordinary construction, which
//! is what the original's "multibyte_prop bit-0" guard (`spec.md` §4.E step
//! 7) exists to enforce by hand.
//!
//! Patterns containing a back-reference never reach this module at all:
//! per `spec.md` §4.B ("demotes the whole pattern to the noop matcher"),
//! `crate::compile` routes those straight to the
//! [`crate::backtrack::Backtracker`] seam instead of building a `Dfa`.

pub mod builder;
pub mod exec;

use crate::analyzer::{Context, PositionSet};
use crate::charclass::CharClassTable;
use crate::token::Token;
use std::collections::HashMap;

/// Transition not yet materialized (`spec.md` §3, "Transition table").
pub const TRANS_UNKNOWN: i32 = -2;
/// The byte read was the end-of-line sentinel: either true end of the
/// search region, or (mid-buffer, when newlines are allowed) a line break
/// to be counted and restarted past.
pub const TRANS_FAIL: i32 = -1;

/// One subset-construction state: a position set plus the preceding-context
/// mask that produced it (`spec.md` §3, "DFA state").
#[derive(Clone, Debug)]
pub struct DfaState {
    pub elems: PositionSet,
    pub context: Context,
}

impl DfaState {
    fn key(&self) -> (Vec<(u32, u16)>, Context) {
        (
            self.elems.iter().map(|p| (p.index, p.constraint)).collect(),
            self.context,
        )
    }
}

/// Lazily materialized subset-construction DFA over one compiled pattern's
/// postfix/follow data. Mutable: [`Dfa::step`] builds states and transition
/// rows on demand and may evict them (`spec.md` §4.E, "table reclamation").
pub struct Dfa {
    postfix: Vec<Token>,
    classes: CharClassTable,
    follow: Vec<PositionSet>,
    eol_byte: u8,
    /// If true, the "search" variant: every newly built state also gets the
    /// whole pattern's start positions unioned in, so matching can restart
    /// at any byte without an outer scanning loop (`spec.md` §4.E step 7).
    /// False for the "exact" variant used by `-x` / back-reference-free
    /// anchored refinement, where a match may only begin at `start`.
    searching: bool,
    start_positions: PositionSet,

    states: Vec<DfaState>,
    trans: Vec<[i32; 256]>,
    index_of: HashMap<(Vec<(u32, u16)>, Context), usize>,

    /// One entry per [`Context`] single-bit value (`NONE`, `LETTER`,
    /// `NEWLINE`), indexing into `states`. These are never evicted.
    initial: [usize; 3],
}

impl Dfa {
    pub fn eol_byte(&self) -> u8 {
        self.eol_byte
    }

    pub fn state_context(&self, state: usize) -> Context {
        self.states[state].context
    }

    pub fn initial_state(&self, preceding: Context) -> usize {
        self.initial[context_index(preceding)]
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Is `state` a match end, given the upcoming (not yet consumed) byte's
    /// context is `curr`? The end-of-match marker `crate::compile` appends
    /// to every postfix is reachable one `follow` step past any position
    /// already in `elems` without consuming another byte — it is a marker,
    /// not a real input symbol — so this looks one step ahead rather than
    /// asking whether `elems` itself already contains it (`spec.md` §4.F).
    pub fn is_accepting(&self, state: usize, curr: Context) -> bool {
        let prev = self.states[state].context;
        self.states[state].elems.iter().any(|p| {
            self.follow[p.index as usize].iter().any(|q| {
                self.postfix[q.index as usize] == Token::End
                    && (q.constraint == crate::analyzer::NO_CONSTRAINT
                        || crate::analyzer::succeeds_in_context(q.constraint, prev, curr))
            })
        })
    }
}

/// The context of a single input byte (`spec.md` §3, "Context bitmask").
pub(crate) fn byte_context(byte: u8, eol_byte: u8) -> Context {
    if byte == eol_byte {
        Context::NEWLINE
    } else if byte == b'_' || (byte as char).is_ascii_alphanumeric() {
        Context::LETTER
    } else {
        Context::NONE
    }
}

fn context_index(ctx: Context) -> usize {
    if ctx == Context::NONE {
        0
    } else if ctx == Context::LETTER {
        1
    } else if ctx == Context::NEWLINE {
        2
    } else {
        unreachable!("initial/state context must be exactly one of NONE/LETTER/NEWLINE")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer;
    use crate::error::LogWarnSink;
    use crate::syntax::{CompileOptions, SyntaxFlags};
    use crate::token::TokenKind;
    use std::sync::Arc;

    /// Builds a searching `Dfa` for `pattern` under GNU extended syntax, the
    /// way `crate::compile` will: prepend the beginning-of-input marker,
    /// append the end-of-match marker, and concatenate the three
    /// (`Beg . (pattern . End)`) before analysis.
    fn build(pattern: &str, eol_byte: u8) -> Dfa {
        let opts = CompileOptions::builder()
            .warn_sink(Arc::new(LogWarnSink) as Arc<dyn crate::error::WarnSink>)
            .build();
        let out =
            crate::parser::parse(pattern.as_bytes(), SyntaxFlags::gnu_extended(), &opts).unwrap();

        let mut postfix = Vec::with_capacity(out.postfix.len() + 4);
        postfix.push(Token::Op(TokenKind::Beg));
        let beg_index = 0u32;
        postfix.extend(out.postfix);
        postfix.push(Token::End);
        postfix.push(Token::Op(TokenKind::Cat));
        postfix.push(Token::Op(TokenKind::Cat));

        let analysis = analyzer::analyze(&postfix, &out.multibyte_runs);
        let start_positions = PositionSet::singleton(crate::analyzer::Position::new(
            beg_index,
            crate::analyzer::NO_CONSTRAINT,
        ));
        Dfa::new(postfix, out.classes, analysis.follow, start_positions, eol_byte, true)
    }

    fn run(dfa: &mut Dfa, haystack: &[u8]) -> exec::ExecResult {
        let mut buf = haystack.to_vec();
        buf.push(dfa.eol_byte());
        exec::execute(dfa, &buf, 0, haystack.len(), Context::NEWLINE, true)
    }

    #[test]
    fn literal_match_ends_right_after_the_word() {
        let mut dfa = build("ab", b'\n');
        let r = run(&mut dfa, b"xxabxx");
        assert_eq!(r.match_end, Some(4));
    }

    #[test]
    fn no_match_returns_none() {
        let mut dfa = build("zzz", b'\n');
        let r = run(&mut dfa, b"xxabxx");
        assert_eq!(r.match_end, None);
    }

    #[test]
    fn begline_anchor_only_matches_at_start() {
        let mut dfa = build("^ab", b'\n');
        assert_eq!(run(&mut dfa, b"ab").match_end, Some(2));
        assert_eq!(run(&mut dfa, b"xab").match_end, None);
    }

    #[test]
    fn endline_anchor_requires_end_of_buffer() {
        let mut dfa = build("ab$", b'\n');
        assert_eq!(run(&mut dfa, b"ab").match_end, Some(2));
        assert_eq!(run(&mut dfa, b"abx").match_end, None);
    }

    #[test]
    fn star_takes_longest_run_of_repetitions() {
        let mut dfa = build("ab*", b'\n');
        // Leftmost-longest: matches the whole "abb", not just "a".
        let r = run(&mut dfa, b"abb");
        assert_eq!(r.match_end, Some(3));
    }

    #[test]
    fn embedded_newline_is_counted_when_allowed() {
        let mut dfa = build("b", b'\n');
        let mut buf = b"a\nb".to_vec();
        buf.push(b'\n');
        let r = exec::execute(&mut dfa, &buf, 0, 3, Context::NEWLINE, true);
        assert_eq!(r.match_end, Some(3));
        assert_eq!(r.newlines_consumed, 1);
    }
}
