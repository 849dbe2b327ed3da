//! State/transition construction: `spec.md` §4.E.
//!
//! Grounded on `build_state`/`state_index` in GNU grep's `lib/dfa.c`. One
//! deliberate departure from the original, recorded in `DESIGN.md`: instead
//! of the original's sparse `trans`/`fails` pair plus byte-equivalence-class
//! label grouping, each state gets one dense `[i32; 256]` row, and a column
//! is computed the first time it is actually read. The original eagerly
//! fills a whole row (grouped by label) on first use of *any* byte in a
//! state; this port fills one column at a time. Both converge to the same
//! table; this port's version is simply lazier by one more notch.

use super::{byte_context, context_index, Dfa, DfaState, TRANS_FAIL, TRANS_UNKNOWN};
use crate::analyzer::{succeeds_in_context, Context, Position, PositionSet};
use crate::charclass::CharClassTable;
use crate::limits::MAX_TRCOUNT;
use crate::token::Token;
use std::collections::HashMap;

impl Dfa {
    /// Builds a new lazy DFA. `start_positions` is the singleton position
    /// set `{beg}` where `beg` is the index of the `Beg` token
    /// `crate::compile` prepends to every postfix array (see the module
    /// doc): not `firstpos` of the raw regexp, which (per `spec.md` §4.D)
    /// would let a leading zero-width anchor's *successor* leak into the
    /// start set unconstrained.
    pub fn new(
        postfix: Vec<Token>,
        classes: CharClassTable,
        follow: Vec<PositionSet>,
        start_positions: PositionSet,
        eol_byte: u8,
        searching: bool,
    ) -> Dfa {
        let mut dfa = Dfa {
            postfix,
            classes,
            follow,
            eol_byte,
            searching,
            start_positions,
            states: Vec::new(),
            trans: Vec::new(),
            index_of: HashMap::new(),
            initial: [0; 3],
        };

        let start = dfa.start_positions.clone();
        for (i, ctx) in [Context::NONE, Context::LETTER, Context::NEWLINE]
            .into_iter()
            .enumerate()
        {
            let idx = dfa.intern_state(start.clone(), ctx);
            dfa.initial[i] = idx;
        }
        dfa
    }

    fn intern_state(&mut self, elems: PositionSet, context: Context) -> usize {
        let state = DfaState { elems, context };
        let key = state.key();
        if let Some(&idx) = self.index_of.get(&key) {
            return idx;
        }
        let idx = self.states.len();
        self.states.push(state);
        self.trans.push([TRANS_UNKNOWN; 256]);
        self.index_of.insert(key, idx);
        idx
    }

    /// Returns the state reached from `state` on byte `byte`, materializing
    /// the transition (and, if needed, the target state) on first use.
    /// `TRANS_FAIL` (as a state index this never collides with, since the
    /// constant is negative) means no transition is possible.
    pub fn step(&mut self, state: usize, byte: u8) -> i32 {
        let cached = self.trans[state][byte as usize];
        if cached != TRANS_UNKNOWN {
            return cached;
        }
        self.maybe_evict(state);

        let result = self.build_transition(state, byte);
        self.trans[state][byte as usize] = result;
        result
    }

    fn build_transition(&mut self, state: usize, byte: u8) -> i32 {
        let prev_context = self.states[state].context;
        let curr_context = byte_context(byte, self.eol_byte);

        let mut follows = PositionSet::new();
        for p in self.states[state].elems.iter() {
            follows.merge(&self.follow[p.index as usize]);
        }

        let mut group = PositionSet::new();
        for p in follows.iter() {
            if self.position_survives(*p, prev_context, curr_context, byte) {
                group.insert(*p);
            }
        }

        if group.is_empty() {
            // No position survived: in a searching DFA the default
            // transition restarts the match attempt at the next byte,
            // exactly as if we were back at state 0 (`spec.md` §4.E step
            // 7); an exact/anchored DFA simply fails.
            return if self.searching {
                self.initial[context_index(curr_context)] as i32
            } else {
                TRANS_FAIL
            };
        }

        if self.searching {
            group.merge(&self.start_positions);
        }

        self.intern_state(group, curr_context) as i32
    }

    /// Does `p` belong in the next state, given we are about to read a byte
    /// whose own context is `curr` from a state whose preceding context was
    /// `prev`? The end-of-match marker is never a member of any state's
    /// `elems` at all — it is a zero-width marker, not a real input symbol
    /// — so it has no byte to match here; `Dfa::is_accepting` finds it by
    /// looking one `follow` step ahead of whatever *is* in `elems` instead
    /// (`spec.md` §4.E steps 3-4, §4.F).
    fn position_survives(&self, p: Position, prev: Context, curr: Context, byte: u8) -> bool {
        let tok = self.postfix[p.index as usize];
        let byte_matches = match tok {
            Token::Byte(b) | Token::MbByte(b) => b == byte,
            Token::CharClass(id) => self.classes.test(id, byte),
            // Back-references never reach a Dfa (`crate::compile` routes
            // whole patterns containing one to the backtracker instead);
            // `End` is handled by `Dfa::is_accepting`, not here.
            Token::Backref(_) | Token::Op(_) | Token::End => false,
        };
        if !byte_matches {
            return false;
        }
        p.constraint == crate::analyzer::NO_CONSTRAINT || succeeds_in_context(p.constraint, prev, curr)
    }

    /// `spec.md` §4.E, "table reclamation": once more than [`MAX_TRCOUNT`]
    /// transition rows exist, drop every non-initial state's row so the
    /// table doesn't grow without bound across a long search. States
    /// themselves (and their `follow`-derived identity) are kept; only the
    /// materialized `trans` rows are discarded, so they simply get rebuilt
    /// lazily on next use.
    fn maybe_evict(&mut self, just_used: usize) {
        let live_rows = self
            .trans
            .iter()
            .filter(|row| row.iter().any(|&t| t != TRANS_UNKNOWN))
            .count();
        if live_rows < MAX_TRCOUNT {
            return;
        }
        log::debug!(
            "redfa: dfa transition table at {live_rows} rows, evicting non-initial states"
        );
        for (idx, row) in self.trans.iter_mut().enumerate() {
            if idx == just_used || self.initial.contains(&idx) {
                continue;
            }
            *row = [TRANS_UNKNOWN; 256];
        }
    }
}
