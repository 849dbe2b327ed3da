//! Position/follow analysis over the postfix token array.
//!
//! Implements `spec.md` §4.D: the standard Aho-Ullman nullable/firstpos/
//! lastpos/follow construction over the postfix tree, ε-closure expansion
//! for zero-width constraint positions, and position deduplication.
//!
//! Constraint encoding (`spec.md` §3 / GLOSSARY) is carried over unchanged
//! from the original's 9-bit octal scheme — three 3-bit groups selecting
//! which preceding contexts a position accepts when the next character's
//! context is `NONE`/`LETTER`/`NEWLINE` respectively — since it is exactly
//! as compact and self-documenting in Rust as it is in C.

use crate::token::{Token, TokenKind};
use bitflags::bitflags;

pub const NO_CONSTRAINT: u16 = 0o777;
pub const BEGLINE_CONSTRAINT: u16 = 0o444;
pub const ENDLINE_CONSTRAINT: u16 = 0o700;
pub const BEGWORD_CONSTRAINT: u16 = 0o050;
pub const ENDWORD_CONSTRAINT: u16 = 0o202;
pub const LIMWORD_CONSTRAINT: u16 = 0o252;
pub const NOTLIMWORD_CONSTRAINT: u16 = 0o525;

bitflags! {
    /// The context surrounding a position: either the single-bit context of
    /// the current lookahead byte, or a mask of possible preceding contexts.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
    pub struct Context: u8 {
        const NONE    = 1 << 0;
        const LETTER  = 1 << 1;
        const NEWLINE = 1 << 2;
        const ANY     = Self::NONE.bits() | Self::LETTER.bits() | Self::NEWLINE.bits();
    }
}

fn newline_constraint(c: u16) -> u16 {
    (c >> 6) & 7
}
fn letter_constraint(c: u16) -> u16 {
    (c >> 3) & 7
}
fn other_constraint(c: u16) -> u16 {
    c & 7
}

/// Does `constraint` succeed when the preceding context is (possibly) any
/// of `prev` and the current lookahead byte's context is exactly `curr`?
pub fn succeeds_in_context(constraint: u16, prev: Context, curr: Context) -> bool {
    let mut allowed = 0u16;
    if curr.contains(Context::NONE) {
        allowed |= other_constraint(constraint);
    }
    if curr.contains(Context::LETTER) {
        allowed |= letter_constraint(constraint);
    }
    if curr.contains(Context::NEWLINE) {
        allowed |= newline_constraint(constraint);
    }
    (allowed & prev.bits() as u16) != 0
}

/// Does `constraint`'s answer depend on whether the preceding byte was a
/// newline?
pub fn prev_newline_dependent(constraint: u16) -> bool {
    ((constraint ^ (constraint >> 2)) & 0o111) != 0
}

/// Does `constraint`'s answer depend on whether the preceding byte was a
/// word (letter-class) byte?
pub fn prev_letter_dependent(constraint: u16) -> bool {
    ((constraint ^ (constraint >> 1)) & 0o111) != 0
}

fn constraint_for(kind: TokenKind) -> u16 {
    match kind {
        TokenKind::Begline => BEGLINE_CONSTRAINT,
        TokenKind::Endline => ENDLINE_CONSTRAINT,
        TokenKind::Begword => BEGWORD_CONSTRAINT,
        TokenKind::Endword => ENDWORD_CONSTRAINT,
        TokenKind::Limword => LIMWORD_CONSTRAINT,
        TokenKind::Notlimword => NOTLIMWORD_CONSTRAINT,
        _ => NO_CONSTRAINT,
    }
}

bitflags! {
    /// Per-leaf multibyte-sequence role, 2 bits per byte (`spec.md` §9's
    /// "newer lib/dfa.c encoding"). Unset for ordinary single-byte leaves.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Default)]
    pub struct MultibyteProp: u8 {
        /// This leaf is the first byte of its encoded character.
        const FIRST = 1 << 0;
        /// This leaf is the last byte of its encoded character.
        const LAST  = 1 << 1;
    }
}

/// A leaf position: an index into the postfix token array, together with
/// the context constraint under which it may match.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct Position {
    pub index: u32,
    pub constraint: u16,
}

impl Position {
    pub fn new(index: u32, constraint: u16) -> Self {
        Position { index, constraint }
    }
}

/// A set of [`Position`]s, maintained sorted by strictly decreasing
/// `index` with duplicates on `index` merged by OR-ing `constraint`
/// (`spec.md` GLOSSARY, "Position-set").
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PositionSet(Vec<Position>);

impl PositionSet {
    pub fn new() -> Self {
        PositionSet(Vec::new())
    }

    pub fn singleton(p: Position) -> Self {
        PositionSet(vec![p])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[Position] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.0.iter()
    }

    pub fn contains_index(&self, index: u32) -> bool {
        self.0.binary_search_by(|p| p.index.cmp(&index).reverse()).is_ok()
    }

    /// Insert `p`, keeping the decreasing-index/no-duplicates invariant.
    pub fn insert(&mut self, p: Position) {
        match self.0.binary_search_by(|q| q.index.cmp(&p.index).reverse()) {
            Ok(at) => self.0[at].constraint |= p.constraint,
            Err(at) => self.0.insert(at, p),
        }
    }

    /// Union `other` into `self`.
    pub fn merge(&mut self, other: &PositionSet) {
        for &p in &other.0 {
            self.insert(p);
        }
    }

    /// Union `other` into `self`, AND-ing each incoming constraint with
    /// `mask` first (used for ε-closure expansion of zero-width
    /// constraints).
    pub fn merge_with_mask(&mut self, other: &PositionSet, mask: u16) {
        for &p in &other.0 {
            self.insert(Position::new(p.index, p.constraint & mask));
        }
    }

    pub fn delete_by_index(&mut self, index: u32) -> bool {
        match self.0.binary_search_by(|q| q.index.cmp(&index).reverse()) {
            Ok(at) => {
                self.0.remove(at);
                true
            }
            Err(_) => false,
        }
    }

    /// Append without maintaining sort order or merging duplicates; call
    /// [`Self::sort_dedup`] before relying on the set's invariant again.
    pub fn append_unsorted(&mut self, p: Position) {
        self.0.push(p);
    }

    pub fn sort_dedup(&mut self) {
        self.0.sort_by(|a, b| b.index.cmp(&a.index));
        let mut out: Vec<Position> = Vec::with_capacity(self.0.len());
        for p in self.0.drain(..) {
            if let Some(last) = out.last_mut() {
                if last.index == p.index {
                    last.constraint |= p.constraint;
                    continue;
                }
            }
            out.push(p);
        }
        self.0 = out;
    }
}

/// Result of analyzing a postfix token array.
pub struct Analysis {
    pub nullable: bool,
    pub firstpos: PositionSet,
    pub lastpos: PositionSet,
    /// Indexed by postfix position (leaf indices only are meaningful).
    pub follow: Vec<PositionSet>,
    /// Indexed by postfix position (leaf indices only are meaningful).
    pub multibyte_props: Vec<MultibyteProp>,
}

struct Frame {
    nullable: bool,
    firstpos: PositionSet,
    lastpos: PositionSet,
}

/// Run the Aho-Ullman construction over `postfix`, then ε-close away the
/// zero-width constraint positions per `spec.md` §4.D.
pub fn analyze(postfix: &[Token], multibyte_runs: &[Vec<usize>]) -> Analysis {
    let mut follow: Vec<PositionSet> = vec![PositionSet::new(); postfix.len()];
    let mut multibyte_props = vec![MultibyteProp::empty(); postfix.len()];
    for run in multibyte_runs {
        if let (Some(&first), Some(&last)) = (run.first(), run.last()) {
            multibyte_props[first] |= MultibyteProp::FIRST;
            multibyte_props[last] |= MultibyteProp::LAST;
        }
    }

    let mut stack: Vec<Frame> = Vec::with_capacity(postfix.len());

    for (i, tok) in postfix.iter().enumerate() {
        let idx = i as u32;
        match tok {
            Token::Op(TokenKind::Empty) => {
                stack.push(Frame {
                    nullable: true,
                    firstpos: PositionSet::new(),
                    lastpos: PositionSet::new(),
                });
            }
            Token::Op(TokenKind::Cat) => {
                let right = stack.pop().expect("postfix well-formed");
                let left = stack.pop().expect("postfix well-formed");
                for &p in left.lastpos.as_slice() {
                    follow[p.index as usize].merge(&right.firstpos);
                }
                let nullable = left.nullable && right.nullable;
                let firstpos = if left.nullable {
                    let mut f = left.firstpos.clone();
                    f.merge(&right.firstpos);
                    f
                } else {
                    left.firstpos
                };
                let lastpos = if right.nullable {
                    let mut l = right.lastpos.clone();
                    l.merge(&left.lastpos);
                    l
                } else {
                    right.lastpos
                };
                stack.push(Frame {
                    nullable,
                    firstpos,
                    lastpos,
                });
            }
            Token::Op(TokenKind::Or) => {
                let right = stack.pop().expect("postfix well-formed");
                let left = stack.pop().expect("postfix well-formed");
                let mut firstpos = left.firstpos;
                firstpos.merge(&right.firstpos);
                let mut lastpos = left.lastpos;
                lastpos.merge(&right.lastpos);
                stack.push(Frame {
                    nullable: left.nullable || right.nullable,
                    firstpos,
                    lastpos,
                });
            }
            Token::Op(TokenKind::Star) | Token::Op(TokenKind::Plus) => {
                let child = stack.pop().expect("postfix well-formed");
                for &p in child.lastpos.as_slice() {
                    follow[p.index as usize].merge(&child.firstpos);
                }
                let nullable = matches!(tok, Token::Op(TokenKind::Star)) || child.nullable;
                stack.push(Frame {
                    nullable,
                    firstpos: child.firstpos,
                    lastpos: child.lastpos,
                });
            }
            Token::Op(TokenKind::Qmark) => {
                let child = stack.pop().expect("postfix well-formed");
                stack.push(Frame {
                    nullable: true,
                    firstpos: child.firstpos,
                    lastpos: child.lastpos,
                });
            }
            // Leaves: bytes, char classes, multibyte bytes, back-references,
            // and zero-width constraints all occupy one position each.
            Token::Backref(_) => {
                stack.push(Frame {
                    nullable: true,
                    firstpos: PositionSet::singleton(Position::new(idx, NO_CONSTRAINT)),
                    lastpos: PositionSet::singleton(Position::new(idx, NO_CONSTRAINT)),
                });
            }
            // Zero-width constraints are leaves like any other: nullable is
            // false for every leaf but BACKREF (`spec.md` §4.D). Treating
            // BEGLINE etc. as nullable would let a CAT node's firstpos rule
            // union the position *after* the anchor directly into the
            // anchor's own firstpos, unconstrained — "^ab" would then match
            // "ab" anywhere. Leaving them non-nullable forces every such
            // position to be reached only via `follow`, which is exactly
            // where ε-closure below applies the real constraint mask.
            Token::Op(kind) if kind.is_zero_width_constraint() => {
                let c = constraint_for(*kind);
                stack.push(Frame {
                    nullable: false,
                    firstpos: PositionSet::singleton(Position::new(idx, c)),
                    lastpos: PositionSet::singleton(Position::new(idx, c)),
                });
            }
            Token::Byte(_) | Token::CharClass(_) | Token::MbByte(_) => {
                stack.push(Frame {
                    nullable: false,
                    firstpos: PositionSet::singleton(Position::new(idx, NO_CONSTRAINT)),
                    lastpos: PositionSet::singleton(Position::new(idx, NO_CONSTRAINT)),
                });
            }
            // The beginning-of-input marker `crate::compile` prepends ahead
            // of every pattern, concatenated with it via one outer CAT. Not
            // nullable, so it is never unioned away: the pattern's true
            // start positions live only in `follow[beg-index]`, correctly
            // ε-closed against any leading anchor, and that follow set (not
            // the raw root firstpos) is what seeds the initial DFA state.
            Token::Op(TokenKind::Beg) => {
                stack.push(Frame {
                    nullable: false,
                    firstpos: PositionSet::singleton(Position::new(idx, NO_CONSTRAINT)),
                    lastpos: PositionSet::singleton(Position::new(idx, NO_CONSTRAINT)),
                });
            }
            // The end-of-match marker appended by `crate::compile` before
            // analysis: a position like any other, whose mere presence in a
            // DFA state's position set is what makes that state accepting.
            Token::End => {
                stack.push(Frame {
                    nullable: false,
                    firstpos: PositionSet::singleton(Position::new(idx, NO_CONSTRAINT)),
                    lastpos: PositionSet::singleton(Position::new(idx, NO_CONSTRAINT)),
                });
            }
            Token::Op(_) => {
                unreachable!("Repmn/Lparen/Rparen/Wchar never appear in postfix")
            }
        }
    }

    let root = stack.pop().expect("postfix has at least one token");
    debug_assert!(stack.is_empty(), "postfix array must reduce to one tree");

    epsilon_close(postfix, &mut follow);

    Analysis {
        nullable: root.nullable,
        firstpos: root.firstpos,
        lastpos: root.lastpos,
        follow,
        multibyte_props,
    }
}

/// `spec.md` §4.D: each zero-width constraint position `i` is removed from
/// every follow set that contains it and replaced by `follow(i)`'s elements
/// with their constraints AND'd against `i`'s own constraint mask. Iterates
/// to a fixpoint since a constraint position's own follow set may itself
/// contain another (not-yet-expanded) constraint position.
fn epsilon_close(postfix: &[Token], follow: &mut [PositionSet]) {
    let zero_width: Vec<usize> = postfix
        .iter()
        .enumerate()
        .filter_map(|(i, t)| match t {
            Token::Op(kind) if kind.is_zero_width_constraint() => Some(i),
            _ => None,
        })
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for &i in &zero_width {
            let constraint = match postfix[i] {
                Token::Op(kind) => constraint_for(kind),
                _ => unreachable!(),
            };
            let replacement = follow[i].clone();
            for set in follow.iter_mut() {
                if set.delete_by_index(i as u32) {
                    set.merge_with_mask(&replacement, constraint);
                    changed = true;
                }
            }
        }
    }
}
