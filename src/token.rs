//! Postfix token representation.
//!
//! `spec.md` describes tokens as a signed integer with disjoint value
//! ranges. We encode the same three disjoint spaces (byte values, named
//! operators, class indices) as a tagged sum instead, per the Design Notes
//! in `spec.md` §9 ("Tagged variants for tokens").

use crate::charclass::ClassId;

/// Fieldless operator kinds. `Repmn`, `Lparen`, `Rparen`, and `Wchar` only
/// ever appear in the lex/parse stream; the parser never emits them into
/// the postfix array.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum TokenKind {
    Empty,
    Qmark,
    Star,
    Plus,
    Repmn,
    Cat,
    Or,
    Lparen,
    Rparen,
    Wchar,
    Anychar,
    Beg,
    Begline,
    Endline,
    Begword,
    Endword,
    Limword,
    Notlimword,
    /// `\1` .. `\9`; the group index is carried on [`Token::Backref`]
    /// instead, since it is not a fieldless operator.
    Backref,
    Mbcset,
}

impl TokenKind {
    pub fn is_zero_width_constraint(self) -> bool {
        matches!(
            self,
            TokenKind::Begline
                | TokenKind::Endline
                | TokenKind::Begword
                | TokenKind::Endword
                | TokenKind::Limword
                | TokenKind::Notlimword
        )
    }
}

/// A single token in the lex stream or postfix array.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Token {
    End,
    Byte(u8),
    Op(TokenKind),
    CharClass(ClassId),
    /// Multibyte constant-byte token, tagged with its position in the
    /// encoded character (see [`crate::analyzer::MultibyteProp`]).
    MbByte(u8),
    Backref(u8),
}

impl Token {
    pub fn is_leaf(&self) -> bool {
        !matches!(
            self,
            Token::Op(
                TokenKind::Cat
                    | TokenKind::Or
                    | TokenKind::Star
                    | TokenKind::Plus
                    | TokenKind::Qmark
            )
        )
    }
}
