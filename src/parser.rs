//! Recursive-descent parser: lex items in, postfix token array out.
//!
//! Implements `spec.md` §4.C's grammar:
//!
//! ```text
//! regexp := branch ('|' branch)*
//! branch := closure closure*
//! closure := atom (? | * | + | {m,n})*
//! atom := CHAR | WCHAR | ANYCHAR | MBCSET | CSET | BACKREF
//!       | BEGLINE | ENDLINE | BEGWORD | ENDWORD | LIMWORD | NOTLIMWORD
//!       | '(' regexp ')' | ε
//! ```

use crate::charclass::{CharClass, CharClassTable};
use crate::error::{CompileError, CompileResult};
use crate::lexer::{LexItem, Lexer};
use crate::syntax::{CompileOptions, SyntaxFlags};
use crate::token::{Token, TokenKind};

/// The UTF-8 "any character" byte-range table from `spec.md` §4.C. Stored
/// verbatim per the Design Notes in `spec.md` §9 ("do not re-derive it").
mod utf8_ranges {
    pub const A: (u8, u8) = (0x00, 0x7f);
    pub const B: (u8, u8) = (0xc2, 0xdf);
    pub const C: (u8, u8) = (0x80, 0xbf);
    pub const D: (u8, u8) = (0xe0, 0xe0);
    pub const E: (u8, u8) = (0xa0, 0xbf);
    // F = e1-ec + ee-ef (two disjoint ranges unioned into one class).
    pub const F1: (u8, u8) = (0xe1, 0xec);
    pub const F2: (u8, u8) = (0xee, 0xef);
    pub const G: (u8, u8) = (0xed, 0xed);
    pub const H: (u8, u8) = (0x80, 0x9f);
    pub const I: (u8, u8) = (0xf0, 0xf0);
    pub const J: (u8, u8) = (0x90, 0xbf);
    pub const K: (u8, u8) = (0xf1, 0xf3);
    pub const L: (u8, u8) = (0xf4, 0xf4);
    pub const M: (u8, u8) = (0x80, 0x8f);
}

pub struct ParseOutput {
    pub postfix: Vec<Token>,
    pub classes: CharClassTable,
    pub max_stack_depth: usize,
    pub has_backref: bool,
    /// Each element lists the postfix indices of one multibyte character's
    /// `MbByte` leaves, in byte order. The analyzer uses this to derive
    /// `MultibyteProp` without re-deriving adjacency from the postfix array
    /// (the `Cat` tokens linking consecutive bytes interleave with them).
    pub multibyte_runs: Vec<Vec<usize>>,
}

pub fn parse(
    pattern: &[u8],
    syntax: SyntaxFlags,
    options: &CompileOptions,
) -> CompileResult<ParseOutput> {
    if syntax.is_empty() {
        return Err(CompileError::NoSyntaxSpecified);
    }
    let mut p = Parser {
        lexer: Lexer::new(
            pattern,
            syntax,
            options.warn_sink.as_ref(),
            options.posixly_correct,
        ),
        classes: CharClassTable::new(),
        postfix: Vec::new(),
        depth: 0,
        max_depth: 0,
        peeked: None,
        has_backref: false,
        case_fold: options.case_fold,
        last_atom_start: 0,
        multibyte_runs: Vec::new(),
    };
    p.parse_regexp()?;
    if p.peek()?.is_some() {
        // A stray, unmatched `)` (or similar) remains.
        return Err(CompileError::UnbalancedParen);
    }
    Ok(ParseOutput {
        postfix: p.postfix,
        classes: p.classes,
        max_stack_depth: p.max_depth as usize,
        has_backref: p.has_backref,
        multibyte_runs: p.multibyte_runs,
    })
}

struct Parser<'p> {
    lexer: Lexer<'p>,
    classes: CharClassTable,
    postfix: Vec<Token>,
    depth: i64,
    max_depth: i64,
    peeked: Option<LexItem>,
    has_backref: bool,
    case_fold: bool,
    /// Index into `postfix` where the most recently parsed atom began.
    /// Consulted by `expand_interval` to duplicate that atom's fragment.
    last_atom_start: usize,
    multibyte_runs: Vec<Vec<usize>>,
}

impl<'p> Parser<'p> {
    fn peek(&mut self) -> CompileResult<Option<&LexItem>> {
        if self.peeked.is_none() {
            self.peeked = self.lexer.next(&mut self.classes)?;
        }
        Ok(self.peeked.as_ref())
    }

    fn advance(&mut self) -> CompileResult<Option<LexItem>> {
        if let Some(item) = self.peeked.take() {
            return Ok(Some(item));
        }
        self.lexer.next(&mut self.classes)
    }

    fn push_leaf(&mut self, tok: Token) {
        self.postfix.push(tok);
        self.depth += 1;
        self.max_depth = self.max_depth.max(self.depth);
    }

    fn push_cat(&mut self) {
        self.postfix.push(Token::Op(TokenKind::Cat));
        self.depth -= 1;
    }

    fn push_or(&mut self) {
        self.postfix.push(Token::Op(TokenKind::Or));
        self.depth -= 1;
    }

    fn push_unary(&mut self, kind: TokenKind) {
        // Pops one operand and pushes one result: net stack effect zero.
        self.postfix.push(Token::Op(kind));
    }

    fn parse_regexp(&mut self) -> CompileResult<()> {
        self.parse_branch()?;
        loop {
            let is_or = matches!(self.peek()?, Some(LexItem::Tok(Token::Op(TokenKind::Or))));
            if !is_or {
                break;
            }
            self.advance()?;
            self.lexer.mark_branch_start();
            self.parse_branch()?;
            self.push_or();
        }
        Ok(())
    }

    fn at_branch_end(item: Option<&LexItem>) -> bool {
        matches!(
            item,
            None | Some(LexItem::Rparen) | Some(LexItem::Tok(Token::Op(TokenKind::Or)))
        )
    }

    fn parse_branch(&mut self) -> CompileResult<()> {
        if Self::at_branch_end(self.peek()?) {
            self.last_atom_start = self.postfix.len();
            self.push_leaf(Token::Op(TokenKind::Empty));
            return Ok(());
        }
        self.parse_closure()?;
        while !Self::at_branch_end(self.peek()?) {
            self.parse_closure()?;
            self.push_cat();
        }
        Ok(())
    }

    fn parse_closure(&mut self) -> CompileResult<()> {
        self.parse_atom()?;
        loop {
            match self.peek()? {
                Some(LexItem::Tok(Token::Op(TokenKind::Qmark))) => {
                    self.advance()?;
                    self.push_unary(TokenKind::Qmark);
                }
                Some(LexItem::Tok(Token::Op(TokenKind::Star))) => {
                    self.advance()?;
                    self.push_unary(TokenKind::Star);
                }
                Some(LexItem::Tok(Token::Op(TokenKind::Plus))) => {
                    self.advance()?;
                    self.push_unary(TokenKind::Plus);
                }
                Some(LexItem::Interval { .. }) => {
                    let Some(LexItem::Interval { min, max }) = self.advance()? else {
                        unreachable!()
                    };
                    self.expand_interval(min, max)?;
                }
                _ => break,
            }
        }
        Ok(())
    }

    /// `{m,n}` expansion, per `spec.md` §4.C: duplicate the preceding atom
    /// `m` times (concatenated), then `n - m` more `?`-guarded copies, or
    /// for `{m,}` a trailing `+` on the last mandatory copy (or `*` if
    /// `m == 0`).
    fn expand_interval(&mut self, min: u32, max: Option<u32>) -> CompileResult<()> {
        let start = self.last_atom_start;
        let fragment: Vec<Token> = self.postfix[start..].to_vec();

        match max {
            None => {
                for _ in 1..min {
                    self.emit_fragment_copy(&fragment);
                    self.push_cat();
                }
                if min == 0 {
                    self.push_unary(TokenKind::Star);
                } else {
                    self.push_unary(TokenKind::Plus);
                }
            }
            Some(max) => {
                if max == 0 {
                    // {0,0}: the atom never appears.
                    self.postfix.truncate(start);
                    self.depth -= 1;
                    self.push_leaf(Token::Op(TokenKind::Empty));
                    return Ok(());
                }
                for _ in 1..min {
                    self.emit_fragment_copy(&fragment);
                    self.push_cat();
                }
                for _ in min..max {
                    self.emit_fragment_copy(&fragment);
                    self.push_unary(TokenKind::Qmark);
                    self.push_cat();
                }
            }
        }
        Ok(())
    }

    fn emit_fragment_copy(&mut self, fragment: &[Token]) {
        for tok in fragment {
            self.postfix.push(*tok);
        }
        self.depth += 1;
        self.max_depth = self.max_depth.max(self.depth);
    }

    fn parse_atom(&mut self) -> CompileResult<()> {
        self.last_atom_start = self.postfix.len();
        match self.advance()? {
            None => {
                self.push_leaf(Token::Op(TokenKind::Empty));
            }
            Some(LexItem::Lparen) => {
                self.lexer.mark_branch_start();
                self.parse_regexp()?;
                match self.advance()? {
                    Some(LexItem::Rparen) => {}
                    _ => return Err(CompileError::UnbalancedParen),
                }
            }
            Some(LexItem::Rparen) => {
                return Err(CompileError::UnbalancedParen);
            }
            Some(LexItem::Interval { .. }) => {
                return Err(CompileError::InvalidIntervalContent);
            }
            Some(LexItem::WChar(ch)) => {
                self.emit_wchar(ch);
            }
            Some(LexItem::Tok(tok)) => self.emit_plain_token(tok)?,
        }
        Ok(())
    }

    fn emit_plain_token(&mut self, tok: Token) -> CompileResult<()> {
        match tok {
            Token::Op(TokenKind::Anychar) => self.emit_utf8_anychar(),
            Token::Backref(_) => {
                self.has_backref = true;
                self.push_leaf(tok);
            }
            Token::Byte(b) if self.case_fold && b.is_ascii_alphabetic() => {
                self.emit_case_folded_byte(b);
            }
            other => self.push_leaf(other),
        }
        Ok(())
    }

    fn emit_case_folded_byte(&mut self, b: u8) {
        let lower = b.to_ascii_lowercase();
        let upper = b.to_ascii_uppercase();
        if lower == upper {
            self.push_leaf(Token::Byte(b));
            return;
        }
        self.push_leaf(Token::Byte(lower));
        self.push_leaf(Token::Byte(upper));
        self.push_or();
    }

    fn emit_wchar(&mut self, ch: char) {
        if self.case_fold {
            let variants: std::collections::BTreeSet<char> =
                ch.to_lowercase().chain(ch.to_uppercase()).collect();
            let mut first = true;
            for v in variants.iter().take(crate::limits::CASE_FOLDED_BUFSIZE) {
                self.emit_wchar_bytes(*v);
                if !first {
                    self.push_or();
                }
                first = false;
            }
        } else {
            self.emit_wchar_bytes(ch);
        }
    }

    /// Encodes `ch` as a concatenation of `MbByte` leaves. The analyzer
    /// derives each leaf's `MultibyteProp` (first/last-of-sequence) from its
    /// position within this fragment; see `analyzer::multibyte_props`.
    fn emit_wchar_bytes(&mut self, ch: char) {
        let mut buf = [0u8; 4];
        let bytes = ch.encode_utf8(&mut buf).as_bytes();
        if bytes.len() == 1 {
            self.push_leaf(Token::Byte(bytes[0]));
            return;
        }
        let mut run = Vec::with_capacity(bytes.len());
        run.push(self.postfix.len());
        self.push_leaf(Token::MbByte(bytes[0]));
        for &b in &bytes[1..] {
            run.push(self.postfix.len());
            self.push_leaf(Token::MbByte(b));
            self.push_cat();
        }
        self.multibyte_runs.push(run);
    }

    /// `spec.md` §4.C: lower `ANYCHAR` to `A|(B|DE|GH|(F|IJ|LM|KC)C)C` over
    /// the UTF-8 byte-range table, built bottom-up in postfix order:
    ///
    /// ```text
    /// Z  = F | (I.J) | (L.M) | (K.C)
    /// ZC = Z . C
    /// Y  = B | (D.E) | (G.H) | ZC
    /// YC = Y . C
    /// T  = A | YC
    /// ```
    ///
    /// Alternation is commutative, so the order operands are pushed in
    /// doesn't change the language each `OR` produces.
    fn emit_utf8_anychar(&mut self) {
        use utf8_ranges::*;
        let class = |lo: u8, hi: u8| {
            let mut c = CharClass::empty();
            c.set_range(lo, hi);
            c
        };
        let f_class = {
            let mut c = class(F1.0, F1.1);
            c.union_in_place(&class(F2.0, F2.1));
            c
        };

        let a = self.classes.intern(class(A.0, A.1));
        let b = self.classes.intern(class(B.0, B.1));
        let c = self.classes.intern(class(C.0, C.1));
        let d = self.classes.intern(class(D.0, D.1));
        let e = self.classes.intern(class(E.0, E.1));
        let f = self.classes.intern(f_class);
        let g = self.classes.intern(class(G.0, G.1));
        let h = self.classes.intern(class(H.0, H.1));
        let i = self.classes.intern(class(I.0, I.1));
        let j = self.classes.intern(class(J.0, J.1));
        let k = self.classes.intern(class(K.0, K.1));
        let l = self.classes.intern(class(L.0, L.1));
        let m = self.classes.intern(class(M.0, M.1));

        // Z = F | (I.J) | (L.M) | (K.C)
        self.push_leaf(Token::CharClass(f));
        self.push_leaf(Token::CharClass(i));
        self.push_leaf(Token::CharClass(j));
        self.push_cat();
        self.push_or();
        self.push_leaf(Token::CharClass(l));
        self.push_leaf(Token::CharClass(m));
        self.push_cat();
        self.push_or();
        self.push_leaf(Token::CharClass(k));
        self.push_leaf(Token::CharClass(c));
        self.push_cat();
        self.push_or();
        // ZC = Z . C
        self.push_leaf(Token::CharClass(c));
        self.push_cat();

        // B|DE|GH, then combined with the pending ZC operand above into Y.
        self.push_leaf(Token::CharClass(b));
        self.push_leaf(Token::CharClass(d));
        self.push_leaf(Token::CharClass(e));
        self.push_cat();
        self.push_or();
        self.push_leaf(Token::CharClass(g));
        self.push_leaf(Token::CharClass(h));
        self.push_cat();
        self.push_or();
        self.push_or();
        // YC = Y . C
        self.push_leaf(Token::CharClass(c));
        self.push_cat();

        // T = A | YC
        self.push_leaf(Token::CharClass(a));
        self.push_or();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LogWarnSink;
    use crate::syntax::CompileOptions;
    use std::sync::Arc;

    fn parse_with(pattern: &str, syntax: SyntaxFlags) -> ParseOutput {
        let opts = CompileOptions::builder()
            .warn_sink(Arc::new(LogWarnSink) as Arc<dyn crate::error::WarnSink>)
            .build();
        parse(pattern.as_bytes(), syntax, &opts).unwrap()
    }

    #[test]
    fn literal_concatenation() {
        let out = parse_with("ab", SyntaxFlags::gnu_extended());
        assert_eq!(
            out.postfix,
            vec![
                Token::Byte(b'a'),
                Token::Byte(b'b'),
                Token::Op(TokenKind::Cat),
            ]
        );
    }

    #[test]
    fn alternation() {
        let out = parse_with("a|b", SyntaxFlags::gnu_extended());
        assert_eq!(
            out.postfix,
            vec![
                Token::Byte(b'a'),
                Token::Byte(b'b'),
                Token::Op(TokenKind::Or),
            ]
        );
    }

    #[test]
    fn star_is_unary_on_preceding_atom() {
        let out = parse_with("ab*", SyntaxFlags::gnu_extended());
        assert_eq!(
            out.postfix,
            vec![
                Token::Byte(b'a'),
                Token::Byte(b'b'),
                Token::Op(TokenKind::Star),
                Token::Op(TokenKind::Cat),
            ]
        );
    }

    #[test]
    fn interval_expands_by_copy() {
        let out = parse_with("a{2,3}", SyntaxFlags::gnu_extended());
        // a.a.(a?)
        assert_eq!(
            out.postfix,
            vec![
                Token::Byte(b'a'),
                Token::Byte(b'a'),
                Token::Op(TokenKind::Cat),
                Token::Byte(b'a'),
                Token::Op(TokenKind::Qmark),
                Token::Op(TokenKind::Cat),
            ]
        );
    }

    #[test]
    fn group_then_plus() {
        let out = parse_with("(ab)+", SyntaxFlags::gnu_extended());
        assert_eq!(
            out.postfix,
            vec![
                Token::Byte(b'a'),
                Token::Byte(b'b'),
                Token::Op(TokenKind::Cat),
                Token::Op(TokenKind::Plus),
            ]
        );
    }

    #[test]
    fn unbalanced_paren_errors() {
        let pattern = "(ab";
        let opts = CompileOptions::builder()
            .warn_sink(Arc::new(LogWarnSink) as Arc<dyn crate::error::WarnSink>)
            .build();
        let err = parse(pattern.as_bytes(), SyntaxFlags::gnu_extended(), &opts).unwrap_err();
        assert_eq!(err, CompileError::UnbalancedParen);
    }

    #[test]
    fn utf8_anychar_lowers_to_charclass_subgraph() {
        let out = parse_with(".", SyntaxFlags::gnu_extended());
        assert!(out
            .postfix
            .iter()
            .any(|t| matches!(t, Token::CharClass(_))));
        assert!(out.postfix.iter().any(|t| matches!(
            t,
            Token::Op(TokenKind::Or) | Token::Op(TokenKind::Cat)
        )));
    }

    #[test]
    fn backref_atom_sets_has_backref() {
        // `RE_NO_BK_REFS` is set for strict POSIX basic syntax, so `\1` is
        // only recognized as a back-reference under the GNU variant.
        let out = parse_with(r"\(a\)\1", SyntaxFlags::gnu_basic());
        assert!(out.has_backref);
    }
}
