/*!
A POSIX/GNU-syntax regular-expression matching engine: a Basic/Extended/GNU
regex lexer and recursive-descent parser, a position-based Thompson NFA
driving a lazily materialized subset-construction DFA, and an Aho-Corasick/
Boyer-Moore keyword-set prefilter, composed by one compile coordinator and
one search coordinator.

This crate implements the matching *core* grep-family tools are built on —
not a command-line tool. It does not walk directories, parse `-e`/`--color`
options, or touch locale initialization; those are external collaborators.
What it does provide: a `compile` step that turns pattern bytes into a
[`CompiledPattern`], and a `search_line` primitive that returns the offset
and size of the leftmost match in a buffer under POSIX leftmost-longest
search semantics.
*/
//! ## Usage
//! ```
//! use redfa::{compile, CompileOptions, SyntaxFlags};
//!
//! let mut pattern = compile(
//!     b"a(b|c)+d",
//!     SyntaxFlags::posix_extended(),
//!     CompileOptions::default(),
//! )
//! .unwrap();
//!
//! let mut buf = b"xxabcbd".to_vec();
//! buf.push(b'\n'); // one sentinel byte past `end`, per `search_line`'s contract
//! let end = buf.len() - 1;
//!
//! let out = pattern.search_line(&mut buf, end, true);
//! assert_eq!((out.offset, out.size), (Some(2), 5));
//! ```
//!
//! ## Syntax and options
//! [`SyntaxFlags`] selects which `RE_*` bits are active (POSIX Basic,
//! POSIX Extended, or a custom combination); [`CompileOptions`] carries the
//! independent knobs grep calls `-i`/`-w`/`-x`/`-F`:
//! ```
//! use redfa::{compile, CompileOptions, SyntaxFlags};
//!
//! let mut pattern = compile(
//!     b"cat",
//!     SyntaxFlags::posix_basic(),
//!     CompileOptions::builder().match_words(true).build(),
//! )
//! .unwrap();
//!
//! let mut buf = b"catalog cat dog".to_vec();
//! buf.push(b'\n');
//! let end = buf.len() - 1;
//! let out = pattern.search_line(&mut buf, end, true);
//! assert_eq!((out.offset, out.size), (Some(8), 3));
//! ```
//!
//! ## Back-references
//! `\1`..`\9` are outside what a DFA can match natively; a pattern
//! containing one compiles successfully but every search delegates to an
//! injected [`backtrack::Backtracker`] (`CompileOptions::builder().backtracker(...)`).
//! Without one, such a pattern always reports no match — build with
//! [`backtrack::SingleGroupBacktracker`] (or your own engine) to support `\N`.
//!
//! ## Crate features
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![cfg_attr(feature = "doc", doc = document_features::document_features!())]

pub mod analyzer;
pub mod backtrack;
pub mod charclass;
pub mod compile;
pub mod dfa;
pub mod error;
pub mod kwset;
pub mod lexer;
pub mod limits;
pub mod muststr;
pub mod parser;
pub mod search;
pub mod syntax;
pub mod token;

pub use backtrack::{Backtracker, SingleGroupBacktracker};
pub use compile::{compile, CompiledPattern, Dispatch};
pub use error::{CompileError, CompileResult, LogWarnSink, WarnSink};
pub use search::SearchOutcome;
pub use syntax::{CompileOptions, SyntaxFlags};
