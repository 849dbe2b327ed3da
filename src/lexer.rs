//! Pattern lexer: bytes in, lex-stream tokens out.
//!
//! Implements `spec.md` §4.B. One call to [`Lexer::next`] consumes one
//! logical unit of pattern text (a literal byte, an escape, a bracket
//! expression, or an operator) and returns one [`LexItem`]. The lexer
//! tracks whether it is positioned at the start of a branch (the start of
//! the pattern, or just after `(`/`\(` or `|`/`\|`), which is what Basic
//! Regular Expression syntax consults to decide whether `^`/`$`/`*` are
//! anchors/operators or ordinary literal characters.

use crate::charclass::{CharClass, CharClassTable};
use crate::error::{CompileError, CompileResult, WarnSink};
use crate::syntax::SyntaxFlags;
use crate::token::{Token, TokenKind};

/// One item from the lex stream. `Interval`, `Lparen`, `Rparen`, and `WChar`
/// never survive into the postfix array the parser emits — they exist only
/// here and in the parser's recursive descent, per `spec.md` §3.
#[derive(Clone, Debug, PartialEq)]
pub enum LexItem {
    Tok(Token),
    Interval { min: u32, max: Option<u32> },
    Lparen,
    Rparen,
    /// A literal character decoded from the pattern's locale (UTF-8 here).
    /// ASCII characters are never wrapped in `WChar`; they're emitted
    /// directly as `Tok(Token::Byte(..))`.
    WChar(char),
}

use crate::limits::RE_DUP_MAX;

pub struct Lexer<'p> {
    pat: &'p [u8],
    pos: usize,
    syntax: SyntaxFlags,
    warn_sink: &'p dyn WarnSink,
    posixly_correct: bool,
    /// True at the very start of the whole pattern or immediately after an
    /// opening group/alternation — the contexts in which BRE's `^` is an
    /// anchor rather than a literal.
    at_start_of_branch: bool,
}

impl<'p> Lexer<'p> {
    pub fn new(pat: &'p [u8], syntax: SyntaxFlags, warn_sink: &'p dyn WarnSink, posixly_correct: bool) -> Self {
        Lexer {
            pat,
            pos: 0,
            syntax,
            warn_sink,
            posixly_correct,
            at_start_of_branch: true,
        }
    }

    pub fn is_extended(&self) -> bool {
        self.syntax.contains(SyntaxFlags::RE_EXTENDED)
    }

    fn peek(&self) -> Option<u8> {
        self.pat.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.pat.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.pat.len()
    }

    /// Returns the next lex item, or `None` at end of pattern.
    pub fn next(&mut self, classes: &mut CharClassTable) -> CompileResult<Option<LexItem>> {
        if self.at_end() {
            return Ok(None);
        }
        let item = self.lex_one(classes)?;
        self.at_start_of_branch = false;
        Ok(Some(item))
    }

    /// Called by the parser right after consuming `(`, `|`, or at the very
    /// start, to re-arm BRE's "leading `^`/`*` are special" rule.
    pub fn mark_branch_start(&mut self) {
        self.at_start_of_branch = true;
    }

    fn lex_one(&mut self, classes: &mut CharClassTable) -> CompileResult<LexItem> {
        let c = self.bump().unwrap();
        match c {
            b'.' => Ok(LexItem::Tok(Token::Op(TokenKind::Anychar))),
            b'^' => {
                let is_anchor = self.is_extended()
                    || self.syntax.contains(SyntaxFlags::RE_CONTEXT_INDEP_ANCHORS)
                    || self.at_start_of_branch;
                if is_anchor {
                    Ok(LexItem::Tok(Token::Op(TokenKind::Begline)))
                } else {
                    Ok(LexItem::Tok(Token::Byte(b'^')))
                }
            }
            b'$' => {
                let is_anchor = self.is_extended()
                    || self.syntax.contains(SyntaxFlags::RE_CONTEXT_INDEP_ANCHORS)
                    || self.at_last_position();
                if is_anchor {
                    Ok(LexItem::Tok(Token::Op(TokenKind::Endline)))
                } else {
                    Ok(LexItem::Tok(Token::Byte(b'$')))
                }
            }
            b'*' => {
                if !self.is_extended() && self.at_start_of_branch {
                    Ok(LexItem::Tok(Token::Byte(b'*')))
                } else {
                    Ok(LexItem::Tok(Token::Op(TokenKind::Star)))
                }
            }
            b'[' => self.lex_bracket(classes),
            b'\\' => self.lex_escape(classes),
            b'(' if self.is_extended() => Ok(LexItem::Lparen),
            b')' if self.is_extended() => Ok(LexItem::Rparen),
            b'|' if self.is_extended() => Ok(LexItem::Tok(Token::Op(TokenKind::Or))),
            b'+' if self.is_extended() => Ok(LexItem::Tok(Token::Op(TokenKind::Plus))),
            b'?' if self.is_extended() => Ok(LexItem::Tok(Token::Op(TokenKind::Qmark))),
            b'{' if self.is_extended() && self.syntax.contains(SyntaxFlags::RE_INTERVALS) => {
                self.lex_interval()
            }
            _ if c < 0x80 => Ok(LexItem::Tok(Token::Byte(c))),
            _ => self.lex_utf8_continuation(c),
        }
    }

    fn at_last_position(&self) -> bool {
        // `$` is an anchor in BRE at the end of the (sub)expression; since
        // we don't look ahead across `\)`/`\|` boundaries here, the parser
        // re-derives this by checking whether `$` precedes `\)`, `\|`, or
        // end-of-pattern. We approximate conservatively: true at end of
        // pattern, or when followed by `\)` or `\|`.
        match (self.peek(), self.peek2()) {
            (None, _) => true,
            (Some(b'\\'), Some(b')')) | (Some(b'\\'), Some(b'|')) => true,
            _ => false,
        }
    }

    fn lex_utf8_continuation(&mut self, first: u8) -> CompileResult<LexItem> {
        let len = utf8_len(first).ok_or(CompileError::UnfinishedEscape)?;
        let start = self.pos - 1;
        let end = start + len;
        if end > self.pat.len() {
            return Err(CompileError::UnfinishedEscape);
        }
        let bytes = &self.pat[start..end];
        let s = std::str::from_utf8(bytes).map_err(|_| CompileError::UnfinishedEscape)?;
        let ch = s.chars().next().ok_or(CompileError::UnfinishedEscape)?;
        self.pos = end;
        Ok(LexItem::WChar(ch))
    }

    fn lex_escape(&mut self, classes: &mut CharClassTable) -> CompileResult<LexItem> {
        let c = self.bump().ok_or(CompileError::UnfinishedEscape)?;
        match c {
            b'1'..=b'9' if !self.syntax.contains(SyntaxFlags::RE_NO_BK_REFS) => {
                Ok(LexItem::Tok(Token::Backref(c - b'0')))
            }
            b'<' => Ok(LexItem::Tok(Token::Op(TokenKind::Begword))),
            b'>' => Ok(LexItem::Tok(Token::Op(TokenKind::Endword))),
            b'b' => Ok(LexItem::Tok(Token::Op(TokenKind::Limword))),
            b'B' => Ok(LexItem::Tok(Token::Op(TokenKind::Notlimword))),
            b'w' => Ok(LexItem::Tok(Token::CharClass(classes.intern(word_class(false))))),
            b'W' => Ok(LexItem::Tok(Token::CharClass(classes.intern(word_class(true))))),
            b's' => Ok(LexItem::Tok(Token::CharClass(classes.intern(space_class(false))))),
            b'S' => Ok(LexItem::Tok(Token::CharClass(classes.intern(space_class(true))))),
            b'(' if !self.is_extended() => Ok(LexItem::Lparen),
            b')' if !self.is_extended() => Ok(LexItem::Rparen),
            b'|' if !self.is_extended() && !self.syntax.contains(SyntaxFlags::RE_NO_BK_VBAR) => {
                Ok(LexItem::Tok(Token::Op(TokenKind::Or)))
            }
            b'+' if !self.is_extended() && self.syntax.contains(SyntaxFlags::RE_BK_PLUS_QM) => {
                Ok(LexItem::Tok(Token::Op(TokenKind::Plus)))
            }
            b'?' if !self.is_extended() && self.syntax.contains(SyntaxFlags::RE_BK_PLUS_QM) => {
                Ok(LexItem::Tok(Token::Op(TokenKind::Qmark)))
            }
            b'{' if !self.is_extended() && self.syntax.contains(SyntaxFlags::RE_INTERVALS) => {
                self.lex_interval()
            }
            b'n' => Ok(LexItem::Tok(Token::Byte(b'\n'))),
            b't' => Ok(LexItem::Tok(Token::Byte(b'\t'))),
            _ if c.is_ascii() => Ok(LexItem::Tok(Token::Byte(c))),
            _ => Err(CompileError::UnfinishedEscape),
        }
    }

    fn lex_interval(&mut self) -> CompileResult<LexItem> {
        let close_escaped = !self.is_extended();
        let min = self.read_number()?;
        let max = if self.peek() == Some(b',') {
            self.bump();
            if self.peek().map(|b| b.is_ascii_digit()).unwrap_or(false) {
                Some(self.read_number()?)
            } else {
                None
            }
        } else {
            Some(min)
        };
        if close_escaped {
            if self.bump() != Some(b'\\') || self.bump() != Some(b'}') {
                return Err(CompileError::InvalidIntervalContent);
            }
        } else if self.bump() != Some(b'}') {
            return Err(CompileError::InvalidIntervalContent);
        }
        if let Some(max) = max {
            if min > max {
                return Err(CompileError::InvalidIntervalContent);
            }
        }
        if min > RE_DUP_MAX || max.map(|m| m > RE_DUP_MAX).unwrap_or(false) {
            return Err(CompileError::IntervalTooLarge);
        }
        Ok(LexItem::Interval { min, max })
    }

    fn read_number(&mut self) -> CompileResult<u32> {
        let start = self.pos;
        while self.peek().map(|b| b.is_ascii_digit()).unwrap_or(false) {
            self.bump();
        }
        if self.pos == start {
            return Err(CompileError::InvalidIntervalContent);
        }
        std::str::from_utf8(&self.pat[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(CompileError::InvalidIntervalContent)
    }

    /// Bracket expressions: `[...]`, `[^...]`, POSIX classes `[:name:]`,
    /// and (recognized syntactically, routed to the backtracker per
    /// `spec.md` §6) `[.x.]`/`[=x=]`.
    fn lex_bracket(&mut self, classes: &mut CharClassTable) -> CompileResult<LexItem> {
        let negate = if self.peek() == Some(b'^') {
            self.bump();
            true
        } else {
            false
        };
        let mut set = CharClass::empty();
        let mut first = true;
        let mut needs_backtracker = false;
        loop {
            match self.peek() {
                None => return Err(CompileError::UnbalancedBracket),
                Some(b']') if !first => {
                    self.bump();
                    break;
                }
                Some(b'[') if matches!(self.peek2(), Some(b':')) => {
                    self.lex_posix_class(&mut set)?;
                }
                Some(b'[') if matches!(self.peek2(), Some(b'.') | Some(b'=')) => {
                    self.skip_collating_or_equivalence()?;
                    needs_backtracker = true;
                }
                Some(_) => {
                    let lo = self.bracket_byte()?;
                    if self.peek() == Some(b'-') && self.peek2().is_some() && self.peek2() != Some(b']')
                    {
                        self.bump();
                        let hi = self.bracket_byte()?;
                        if hi < lo {
                            return Err(CompileError::UnbalancedBracket);
                        }
                        set.set_range(lo, hi);
                    } else {
                        set.set(lo);
                    }
                }
            }
            first = false;
        }
        if needs_backtracker {
            return Ok(LexItem::Tok(Token::Backref(0)));
        }
        if negate {
            set = set.complement();
        }
        let id = classes.intern(set);
        Ok(LexItem::Tok(Token::CharClass(id)))
    }

    fn bracket_byte(&mut self) -> CompileResult<u8> {
        let b = self.bump().ok_or(CompileError::UnbalancedBracket)?;
        Ok(b)
    }

    fn skip_collating_or_equivalence(&mut self) -> CompileResult<()> {
        self.bump(); // '['
        let delim = self.bump().ok_or(CompileError::UnbalancedBracket)?;
        loop {
            match self.bump() {
                None => return Err(CompileError::UnbalancedBracket),
                Some(b) if b == delim && self.peek() == Some(b']') => {
                    self.bump();
                    return Ok(());
                }
                _ => {}
            }
        }
    }

    fn lex_posix_class(&mut self, set: &mut CharClass) -> CompileResult<()> {
        self.bump(); // '['
        self.bump(); // ':'
        let start = self.pos;
        while self.peek().map(|b| b != b':').unwrap_or(false) {
            self.bump();
        }
        let name = std::str::from_utf8(&self.pat[start..self.pos])
            .unwrap_or("")
            .to_owned();
        if self.bump() != Some(b':') || self.bump() != Some(b']') {
            return Err(CompileError::InvalidCharacterClass { name });
        }
        let class = posix_class_by_name(&name)
            .ok_or_else(|| CompileError::InvalidCharacterClass { name: name.clone() })?;
        set.union_in_place(&class);
        Ok(())
    }

    /// `spec.md` §7: a literal `[:space:]` outside of `[[:space:]]` emits a
    /// warning (or, in POSIX mode, an error). Call this after lexing a
    /// bracket expression whose content was exactly a bare POSIX class
    /// name without the outer bracket pair, which `lex_bracket` cannot
    /// itself observe directly since it always requires the outer `[`.
    /// Kept as a free function so `parser.rs` can invoke it once it has
    /// enough context to detect the bare form (`name:]` with no leading
    /// `[` immediately inside the already-opened bracket).
    pub fn warn_or_error_bare_posix_class(&self, name: &str) -> CompileResult<()> {
        if self.posixly_correct {
            Err(CompileError::InvalidCharacterClass {
                name: name.to_owned(),
            })
        } else {
            self.warn_sink.warn(&format!(
                "warning: character class syntax is [[:{name}:]], not [:{name}:]"
            ));
            Ok(())
        }
    }
}

fn utf8_len(first: u8) -> Option<usize> {
    match first {
        0x00..=0x7f => Some(1),
        0xc2..=0xdf => Some(2),
        0xe0..=0xef => Some(3),
        0xf0..=0xf4 => Some(4),
        _ => None,
    }
}

/// `[_[:alnum:]]`, per `spec.md` §6's `\w`/`\W` contract.
fn word_class(negate: bool) -> CharClass {
    let mut c = posix_class_by_name("alnum").unwrap();
    c.set(b'_');
    if negate {
        c.complement()
    } else {
        c
    }
}

/// `\s`/`\S`, per `spec.md` §6.
fn space_class(negate: bool) -> CharClass {
    let c = posix_class_by_name("space").unwrap();
    if negate {
        c.complement()
    } else {
        c
    }
}

/// POSIX bracket class membership, per `spec.md` §6.
pub fn posix_class_by_name(name: &str) -> Option<CharClass> {
    let mut c = CharClass::empty();
    match name {
        "alpha" => {
            c.set_range(b'A', b'Z');
            c.set_range(b'a', b'z');
        }
        "upper" => c.set_range(b'A', b'Z'),
        "lower" => c.set_range(b'a', b'z'),
        "digit" => c.set_range(b'0', b'9'),
        "xdigit" => {
            c.set_range(b'0', b'9');
            c.set_range(b'a', b'f');
            c.set_range(b'A', b'F');
        }
        "space" => {
            for b in [b' ', b'\t', b'\n', b'\r', 0x0b, 0x0c] {
                c.set(b);
            }
        }
        "punct" => {
            for b in 0x21u16..=0x7e {
                let b = b as u8;
                if !b.is_ascii_alphanumeric() {
                    c.set(b);
                }
            }
        }
        "alnum" => {
            c.set_range(b'A', b'Z');
            c.set_range(b'a', b'z');
            c.set_range(b'0', b'9');
        }
        "print" => c.set_range(0x20, 0x7e),
        "graph" => c.set_range(0x21, 0x7e),
        "cntrl" => {
            c.set_range(0x00, 0x1f);
            c.set(0x7f);
        }
        "blank" => {
            c.set(b' ');
            c.set(b'\t');
        }
        _ => return None,
    }
    Some(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LogWarnSink;

    fn lex_all(pat: &[u8], syntax: SyntaxFlags) -> Vec<LexItem> {
        let sink = LogWarnSink;
        let mut lexer = Lexer::new(pat, syntax, &sink, false);
        let mut classes = CharClassTable::new();
        let mut out = vec![];
        while let Some(item) = lexer.next(&mut classes).unwrap() {
            out.push(item);
        }
        out
    }

    #[test]
    fn basic_literal() {
        let items = lex_all(b"ab", SyntaxFlags::posix_extended());
        assert_eq!(
            items,
            vec![
                LexItem::Tok(Token::Byte(b'a')),
                LexItem::Tok(Token::Byte(b'b'))
            ]
        );
    }

    #[test]
    fn extended_metacharacters() {
        let items = lex_all(b"a(b|c)+d", SyntaxFlags::posix_extended());
        assert!(items.contains(&LexItem::Lparen));
        assert!(items.contains(&LexItem::Rparen));
        assert!(items.contains(&LexItem::Tok(Token::Op(TokenKind::Or))));
        assert!(items.contains(&LexItem::Tok(Token::Op(TokenKind::Plus))));
    }

    #[test]
    fn bracket_range() {
        let items = lex_all(b"[a-c]", SyntaxFlags::posix_extended());
        assert_eq!(items.len(), 1);
        match &items[0] {
            LexItem::Tok(Token::CharClass(_)) => {}
            other => panic!("expected CharClass, got {other:?}"),
        }
    }

    #[test]
    fn interval_extended() {
        let items = lex_all(b"a{2,4}", SyntaxFlags::posix_extended());
        assert_eq!(
            items[1],
            LexItem::Interval {
                min: 2,
                max: Some(4)
            }
        );
    }

    #[test]
    fn interval_too_large_errors() {
        let sink = LogWarnSink;
        let mut lexer = Lexer::new(b"a{0,9999}", SyntaxFlags::posix_extended(), &sink, false);
        let mut classes = CharClassTable::new();
        lexer.next(&mut classes).unwrap();
        let err = lexer.next(&mut classes).unwrap_err();
        assert_eq!(err, CompileError::IntervalTooLarge);
    }

    #[test]
    fn word_boundary_escapes() {
        let items = lex_all(br"\<cat\>", SyntaxFlags::posix_basic());
        assert_eq!(
            items[0],
            LexItem::Tok(Token::Op(TokenKind::Begword))
        );
        assert_eq!(
            *items.last().unwrap(),
            LexItem::Tok(Token::Op(TokenKind::Endword))
        );
    }

    #[test]
    fn multibyte_literal_decodes_as_wchar() {
        let items = lex_all("Ⓐ".as_bytes(), SyntaxFlags::posix_extended());
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], LexItem::WChar('Ⓐ')));
    }
}
