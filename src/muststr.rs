//! Must-string extraction: `spec.md` §4.G.
//!
//! A bottom-up pass over the postfix tree computing, per subexpression,
//! four values: `left` (a must prefix), `right` (a must suffix), `is` (a
//! must-equal string, `None` standing for the original's "zero-length
//! sequence" sentinel), and `in` (substrings guaranteed to occur somewhere
//! in any match). The root's longest `in` entry becomes the prefilter
//! literal handed to [`crate::kwset`].
//!
//! Grounded on `dfamust()` in GNU grep's `lib/dfa.c` (the `must`/`allocmust`/
//! `resetmust`/`icatalloc`/`enlist`/`comsubs`/`inboth` family); this port
//! folds the original's byte-run coalescing (a pure performance shortcut
//! for literal runs) into the same per-leaf `CAT` fold the rest of the
//! evaluator already performs, which produces identical strings.

use crate::charclass::CharClassTable;
use crate::token::{Token, TokenKind};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct MustNode {
    left: Vec<u8>,
    right: Vec<u8>,
    /// `None` is the original's zero-length-sequence sentinel ("ZERO"), not
    /// an actual empty-string match.
    is: Option<Vec<u8>>,
    in_list: Vec<Vec<u8>>,
    begline: bool,
    endline: bool,
}

impl MustNode {
    fn epsilon() -> Self {
        MustNode::default()
    }

    fn literal(byte: u8) -> Self {
        MustNode {
            left: vec![byte],
            right: vec![byte],
            is: Some(vec![byte]),
            in_list: vec![vec![byte]],
            begline: false,
            endline: false,
        }
    }
}

/// The extracted result: the longest guaranteed substring plus its
/// anchoring/exactness flags. `None` if no non-empty substring is
/// guaranteed (disables the KWset prefilter, per `spec.md` §4.G).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MustString {
    pub text: Vec<u8>,
    pub exact: bool,
    pub begline: bool,
    pub endline: bool,
}

pub fn extract(postfix: &[Token], classes: &CharClassTable) -> Option<MustString> {
    let mut stack: Vec<MustNode> = Vec::with_capacity(postfix.len());
    let mut need_begline = false;
    let mut need_endline = false;

    for tok in postfix {
        match tok {
            Token::Byte(b) => stack.push(MustNode::literal(*b)),
            Token::MbByte(b) => stack.push(MustNode::literal(*b)),
            Token::CharClass(id) => {
                if let Some(b) = classes.get(*id).singleton() {
                    stack.push(MustNode::literal(b));
                } else {
                    stack.push(MustNode::epsilon());
                }
            }
            Token::Backref(_) => stack.push(MustNode::epsilon()),
            Token::Op(TokenKind::Begline) => {
                need_begline = true;
                let mut n = MustNode::epsilon();
                n.begline = true;
                stack.push(n);
            }
            Token::Op(TokenKind::Endline) => {
                need_endline = true;
                let mut n = MustNode::epsilon();
                n.endline = true;
                stack.push(n);
            }
            Token::Op(
                TokenKind::Empty
                | TokenKind::Begword
                | TokenKind::Endword
                | TokenKind::Limword
                | TokenKind::Notlimword
                | TokenKind::Anychar
                | TokenKind::Mbcset
                | TokenKind::Backref,
            ) => stack.push(MustNode::epsilon()),
            Token::Op(TokenKind::Star) | Token::Op(TokenKind::Qmark) => {
                stack.pop().expect("postfix well-formed");
                stack.push(MustNode::epsilon());
            }
            Token::Op(TokenKind::Plus) => {
                let mut p = stack.pop().expect("postfix well-formed");
                p.is = None;
                stack.push(p);
            }
            Token::Op(TokenKind::Cat) => {
                let rmp = stack.pop().expect("postfix well-formed");
                let lmp = stack.pop().expect("postfix well-formed");
                stack.push(cat(lmp, rmp));
            }
            Token::Op(TokenKind::Or) => {
                let rmp = stack.pop().expect("postfix well-formed");
                let lmp = stack.pop().expect("postfix well-formed");
                stack.push(or(lmp, rmp));
            }
            Token::End | Token::Op(_) => {
                unreachable!("End and Repmn/Lparen/Rparen/Wchar never appear in postfix")
            }
        }
    }

    let root = stack.pop().expect("postfix has at least one token");
    debug_assert!(stack.is_empty());

    let result = root
        .in_list
        .iter()
        .max_by_key(|s| s.len())
        .cloned()
        .unwrap_or_default();
    if result.is_empty() {
        return None;
    }

    let mut exact = false;
    let mut begline = false;
    let mut endline = false;
    if root.is.as_ref() == Some(&result) {
        if (!need_begline || root.begline) && (!need_endline || root.endline) {
            exact = true;
        }
        begline = root.begline;
        endline = root.endline;
    }

    Some(MustString {
        text: result,
        exact,
        begline,
        endline,
    })
}

fn cat(mut lmp: MustNode, rmp: MustNode) -> MustNode {
    let mut in_list = lmp.in_list.clone();
    addlist(&mut in_list, &rmp.in_list);
    if !lmp.right.is_empty() && !rmp.left.is_empty() {
        let mut joint = lmp.right.clone();
        joint.extend_from_slice(&rmp.left);
        enlist(&mut in_list, joint);
    }

    if lmp.is.is_some() {
        lmp.left.extend_from_slice(&rmp.left);
    }
    let mut right = if rmp.is.is_some() {
        lmp.right.clone()
    } else {
        Vec::new()
    };
    right.extend_from_slice(&rmp.right);

    let (is, begline, endline) = if (lmp.is.is_some() || lmp.begline)
        && (rmp.is.is_some() || rmp.endline)
    {
        let mut combined = lmp.is.clone().unwrap_or_default();
        combined.extend_from_slice(&rmp.is.unwrap_or_default());
        (Some(combined), lmp.begline, rmp.endline)
    } else {
        (None, false, false)
    };

    MustNode {
        left: lmp.left,
        right,
        is,
        in_list,
        begline,
        endline,
    }
}

fn or(lmp: MustNode, rmp: MustNode) -> MustNode {
    let (is, begline, endline) = if lmp.is == rmp.is {
        (lmp.is.clone(), lmp.begline && rmp.begline, lmp.endline && rmp.endline)
    } else {
        (None, false, false)
    };
    let left = common_prefix(&lmp.left, &rmp.left);
    let right = common_suffix(&lmp.right, &rmp.right);
    let in_list = inboth(&lmp.in_list, &rmp.in_list);

    MustNode {
        left,
        right,
        is,
        in_list,
        begline,
        endline,
    }
}

fn common_prefix(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).map(|(x, _)| *x).collect()
}

fn common_suffix(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut out: Vec<u8> = a
        .iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| *x)
        .collect();
    out.reverse();
    out
}

/// Insert `new` into `list`, keeping the invariant that no entry is a
/// substring of another: if an existing entry already contains `new`, drop
/// it; otherwise remove any existing entries `new` now subsumes, then push
/// `new` (`enlist` in the original).
fn enlist(list: &mut Vec<Vec<u8>>, new: Vec<u8>) {
    if new.is_empty() {
        return;
    }
    if list.iter().any(|s| contains(s, &new)) {
        return;
    }
    list.retain(|s| !contains(&new, s));
    list.push(new);
}

fn addlist(list: &mut Vec<Vec<u8>>, other: &[Vec<u8>]) {
    for s in other {
        enlist(list, s.clone());
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// All distinct common substrings of `left` and `right` (`comsubs`).
fn comsubs(left: &[u8], right: &[u8]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    for i in 0..left.len() {
        let mut best = 0usize;
        for j in 0..right.len() {
            if left[i] != right[j] {
                continue;
            }
            let mut k = 1;
            while i + k < left.len() && j + k < right.len() && left[i + k] == right[j + k] {
                k += 1;
            }
            best = best.max(k);
        }
        if best > 0 {
            enlist(&mut out, left[i..i + best].to_vec());
        }
    }
    out
}

/// Substrings common to both `left` and `right` lists (`inboth`).
fn inboth(left: &[Vec<u8>], right: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    for l in left {
        for r in right {
            let common = comsubs(l, r);
            addlist(&mut out, &common);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charclass::CharClassTable;
    use crate::error::LogWarnSink;
    use crate::syntax::{CompileOptions, SyntaxFlags};
    use std::sync::Arc;

    fn must_of(pattern: &str) -> Option<MustString> {
        let opts = CompileOptions::builder()
            .warn_sink(Arc::new(LogWarnSink) as Arc<dyn crate::error::WarnSink>)
            .build();
        let out = crate::parser::parse(pattern.as_bytes(), SyntaxFlags::gnu_extended(), &opts)
            .unwrap();
        extract(&out.postfix, &out.classes)
    }

    #[test]
    fn pure_literal_is_exact() {
        let m = must_of("cat").unwrap();
        assert_eq!(m.text, b"cat");
        assert!(m.exact);
    }

    #[test]
    fn alternation_keeps_common_prefix_in_in_list() {
        let m = must_of("(ab|a)b").unwrap();
        // "b" is common to every match; exactness does not hold.
        assert!(!m.text.is_empty());
        assert!(!m.exact);
    }

    #[test]
    fn star_suffix_drops_to_prefix_only() {
        let m = must_of("ab*").unwrap();
        assert_eq!(m.text, b"a");
        assert!(!m.exact);
    }

    #[test]
    fn empty_charclass_pattern_has_no_must_string() {
        let table = CharClassTable::new();
        let postfix = vec![Token::Op(TokenKind::Anychar)];
        assert!(extract(&postfix, &table).is_none());
    }
}
