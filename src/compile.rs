//! Compile coordinator: `spec.md` §4.I.
//!
//! Ties the lexer/parser/analyzer/must-string/KWset/DFA layers together
//! into one [`CompiledPattern`]. Mirrors the original's `GEAcompile`/
//! `dfacomp` decision tree: split into sub-patterns, detect back-references
//! (routing the whole pattern to the [`crate::backtrack::Backtracker`] seam
//! instead of a DFA), handle `-F` by skipping the parser entirely, and
//! otherwise parse+analyze+build a DFA plus an optional [`crate::kwset::KwSet`]
//! prefilter seeded from the must-string extractor.

use crate::analyzer;
use crate::charclass::CharClassTable;
use crate::dfa::Dfa;
use crate::error::{CompileError, CompileResult};
use crate::kwset::{KwSet, KwSetBuilder};
use crate::muststr::{self, MustString};
use crate::syntax::{CompileOptions, SyntaxFlags};
use crate::token::{Token, TokenKind};
use std::sync::Arc;

/// Which matcher backend [`CompiledPattern::search_line`] dispatches to.
///
/// `spec.md` §3 names three dispatch values (`single_byte | multibyte |
/// noop`); this port's parser already lowers `ANYCHAR` and wide characters
/// into concrete byte-range subgraphs (see `dfa`'s module doc), so there is
/// never a distinct "multibyte" backend to select — ordinary subset
/// construction over the expanded byte automaton already handles it.
/// `Literal` is a genuine fourth case this port adds: `-F` without `-w`/`-x`
/// decoration never needs a DFA at all, only the KWset (`spec.md` §4.I step
/// 3), so it gets its own dispatch rather than being folded into
/// `SingleByte` with a vacuous DFA.
pub enum Dispatch {
    /// Ordinary DFA-driven matching, with an optional KWset prefilter.
    SingleByte,
    /// `-F` with no word/line decoration: the KWset result directly *is*
    /// the match.
    Literal,
    /// The pattern contains a back-reference; every candidate line is
    /// handed to the injected [`crate::backtrack::Backtracker`] instead of
    /// a DFA.
    Backref,
}

/// A compiled pattern, ready for [`CompiledPattern::search_line`].
///
/// Owns everything spec.md §3 lists under "Compiled pattern": the char-class
/// table (embedded in each [`Dfa`]), the postfix/follow data (likewise), the
/// [`KwSet`] prefilter, and the dispatch selector. `search_line` takes
/// `&mut self` since the DFA lazily materializes state/transition rows on
/// every call (`spec.md` §5).
pub struct CompiledPattern {
    pub(crate) dispatch: Dispatch,
    /// "Searching" variant (unions start positions into every state, so a
    /// single left-to-right scan restarts automatically): used to locate
    /// the END of the leftmost-longest match.
    pub(crate) search_dfa: Option<Dfa>,
    /// "Anchored" variant (`searching = false`): used, pinned at
    /// successively later start offsets, to recover the match's actual
    /// START once `search_dfa` has located its end (see `search.rs`).
    pub(crate) anchor_dfa: Option<Dfa>,
    pub(crate) kwset: Option<KwSet>,
    pub(crate) must: Option<MustString>,
    pub(crate) backtracker: Option<Arc<dyn crate::backtrack::Backtracker>>,
    /// Original pattern bytes, kept only so the `Backref` dispatch can hand
    /// them to the backtracker (`spec.md` §4.I step 2).
    pub(crate) original_pattern: Vec<u8>,
    pub(crate) eol_byte: u8,
    pub(crate) match_words: bool,
    pub(crate) match_lines: bool,
}

/// `spec.md` §6: `compile(pattern_bytes, syntax_flags, options) ->
/// CompiledPattern | CompileError`.
pub fn compile(
    pattern: &[u8],
    syntax: SyntaxFlags,
    options: CompileOptions,
) -> CompileResult<CompiledPattern> {
    let eol_byte = if options.eol_is_nul { 0u8 } else { b'\n' };

    if options.fixed_strings {
        return compile_fixed(pattern, &options, eol_byte);
    }

    if syntax.is_empty() {
        return Err(CompileError::NoSyntaxSpecified);
    }

    let merged = parse_and_merge(pattern, syntax, &options)?;

    if merged.has_backref {
        log::debug!("redfa: compiled pattern dispatches to Backref (back-reference present)");
        return Ok(CompiledPattern {
            dispatch: Dispatch::Backref,
            search_dfa: None,
            anchor_dfa: None,
            kwset: None,
            must: None,
            backtracker: options.backtracker.clone(),
            original_pattern: pattern.to_vec(),
            eol_byte,
            match_words: options.match_words,
            match_lines: options.match_lines,
        });
    }

    let must = muststr::extract(&merged.postfix, &merged.classes);
    let kwset = build_kwset(&must, options.case_fold);

    let (search_dfa, anchor_dfa) = build_dfas(&merged, eol_byte);

    log::debug!(
        "redfa: compiled pattern dispatches to SingleByte (kwset {}, must {:?})",
        if kwset.is_some() { "present" } else { "absent" },
        must.as_ref().map(|m| String::from_utf8_lossy(&m.text).into_owned())
    );

    Ok(CompiledPattern {
        dispatch: Dispatch::SingleByte,
        search_dfa: Some(search_dfa),
        anchor_dfa: Some(anchor_dfa),
        kwset,
        must,
        backtracker: options.backtracker.clone(),
        original_pattern: pattern.to_vec(),
        eol_byte,
        match_words: options.match_words,
        match_lines: options.match_lines,
    })
}

fn build_kwset(must: &Option<MustString>, case_fold: bool) -> Option<KwSet> {
    let text = must.as_ref()?.text.clone();
    if text.is_empty() {
        return None;
    }
    let mut builder = KwSetBuilder::new(case_fold);
    builder.insert(&text);
    Some(builder.build())
}

/// Result of parsing and `Or`-joining every newline-separated sub-pattern
/// (`spec.md` §4.I step 1), with `-w`/`-x` decoration (`spec.md` §4.I step
/// 3) applied per sub-pattern before joining.
struct MergedParse {
    postfix: Vec<Token>,
    classes: CharClassTable,
    multibyte_runs: Vec<Vec<usize>>,
    has_backref: bool,
}

fn parse_and_merge(
    pattern: &[u8],
    syntax: SyntaxFlags,
    options: &CompileOptions,
) -> CompileResult<MergedParse> {
    let subpatterns: Vec<&[u8]> = pattern.split(|&b| b == b'\n').collect();

    let mut merged = MergedParse {
        postfix: Vec::new(),
        classes: CharClassTable::new(),
        multibyte_runs: Vec::new(),
        has_backref: false,
    };

    for (i, sub) in subpatterns.iter().enumerate() {
        let out = crate::parser::parse(sub, syntax, options)?;
        merged.has_backref |= out.has_backref;

        // Remap this sub-pattern's char-class ids into the shared table,
        // deduplicating identical classes across sub-patterns for free.
        let mut class_remap = Vec::with_capacity(out.classes.len());
        for idx in 0..out.classes.len() {
            let id = crate::charclass::ClassId(idx as u32);
            class_remap.push(merged.classes.intern(*out.classes.get(id)));
        }
        let mut sub_postfix = out.postfix;
        for tok in sub_postfix.iter_mut() {
            if let Token::CharClass(id) = tok {
                *id = class_remap[id.0 as usize];
            }
        }
        let mut sub_runs = out.multibyte_runs;

        if options.match_words {
            sub_postfix = wrap_constraint(sub_postfix, &mut sub_runs, TokenKind::Begword, TokenKind::Endword);
        }
        if options.match_lines {
            sub_postfix = wrap_constraint(sub_postfix, &mut sub_runs, TokenKind::Begline, TokenKind::Endline);
        }

        let offset = merged.postfix.len();
        for run in sub_runs.iter_mut() {
            for idx in run.iter_mut() {
                *idx += offset;
            }
        }
        merged.multibyte_runs.extend(sub_runs);

        if i == 0 {
            merged.postfix = sub_postfix;
        } else {
            merged.postfix.extend(sub_postfix);
            merged.postfix.push(Token::Op(TokenKind::Or));
        }
    }

    Ok(merged)
}

/// Wraps `postfix` as `Begin . postfix . End` in postfix (RPN) order:
/// `[Begin, ...postfix..., Cat, End, Cat]`. Used for both `-w`'s
/// `Begword`/`Endword` and `-x`'s `Begline`/`Endline` decoration — `spec.md`
/// §4.I step 3 describes these textually as regex wrappers
/// (`(^|[^alnum_])(...)([^alnum_]|$)`, `^(...)$`); expressing them directly
/// with the zero-width constraint tokens the engine already has is
/// equivalent (that's exactly what those constraints compute) and avoids
/// re-deriving a `[^[:alnum:]_]` character class by hand.
fn wrap_constraint(
    postfix: Vec<Token>,
    runs: &mut [Vec<usize>],
    begin: TokenKind,
    end: TokenKind,
) -> Vec<Token> {
    let shift = 1usize;
    for run in runs.iter_mut() {
        for idx in run.iter_mut() {
            *idx += shift;
        }
    }
    let mut out = Vec::with_capacity(postfix.len() + 4);
    out.push(Token::Op(begin));
    out.extend(postfix);
    out.push(Token::Op(TokenKind::Cat));
    out.push(Token::Op(end));
    out.push(Token::Op(TokenKind::Cat));
    out
}

/// Builds the `(searching, anchored)` DFA pair for `merged`, both sharing
/// one `analyzer::analyze` pass (the position/follow data is identical;
/// only the runtime restart behavior differs — see `CompiledPattern`'s
/// field docs).
fn build_dfas(merged: &MergedParse, eol_byte: u8) -> (Dfa, Dfa) {
    let mut postfix = Vec::with_capacity(merged.postfix.len() + 4);
    postfix.push(Token::Op(TokenKind::Beg));
    postfix.extend(merged.postfix.iter().copied());
    postfix.push(Token::End);
    postfix.push(Token::Op(TokenKind::Cat));
    postfix.push(Token::Op(TokenKind::Cat));

    let runs: Vec<Vec<usize>> = merged
        .multibyte_runs
        .iter()
        .map(|r| r.iter().map(|i| i + 1).collect())
        .collect();

    let analysis = analyzer::analyze(&postfix, &runs);
    let start_positions = analyzer::PositionSet::singleton(analyzer::Position::new(
        0,
        analyzer::NO_CONSTRAINT,
    ));

    let search_dfa = Dfa::new(
        postfix.clone(),
        merged.classes.clone(),
        analysis.follow.clone(),
        start_positions.clone(),
        eol_byte,
        true,
    );
    let anchor_dfa = Dfa::new(
        postfix,
        merged.classes.clone(),
        analysis.follow,
        start_positions,
        eol_byte,
        false,
    );
    (search_dfa, anchor_dfa)
}

/// `-F` compilation (`spec.md` §4.I step 3). Bypasses the lexer/parser
/// entirely: each newline-separated sub-pattern is a literal keyword. When
/// `-w`/`-x` decoration is requested, the literal bytes are instead emitted
/// directly as a `Byte`-leaf postfix fragment (still no lexer/parser
/// involvement — there are no metacharacters to interpret) and run through
/// the ordinary DFA path so the zero-width constraint tokens can enforce
/// the boundary; with neither flag, the KWset alone defines the match
/// (`Dispatch::Literal`, no DFA at all).
fn compile_fixed(
    pattern: &[u8],
    options: &CompileOptions,
    eol_byte: u8,
) -> CompileResult<CompiledPattern> {
    let subpatterns: Vec<&[u8]> = pattern.split(|&b| b == b'\n').collect();

    if !options.match_words && !options.match_lines {
        let mut builder = KwSetBuilder::new(options.case_fold);
        for sub in &subpatterns {
            builder.insert(sub);
        }
        log::debug!("redfa: compiled pattern dispatches to Literal (-F, no -w/-x)");
        return Ok(CompiledPattern {
            dispatch: Dispatch::Literal,
            search_dfa: None,
            anchor_dfa: None,
            kwset: Some(builder.build()),
            must: None,
            backtracker: options.backtracker.clone(),
            original_pattern: pattern.to_vec(),
            eol_byte,
            match_words: false,
            match_lines: false,
        });
    }

    let mut merged = MergedParse {
        postfix: Vec::new(),
        classes: CharClassTable::new(),
        multibyte_runs: Vec::new(),
        has_backref: false,
    };

    for (i, sub) in subpatterns.iter().enumerate() {
        let mut sub_postfix = literal_postfix(sub, options.case_fold);
        let mut sub_runs: Vec<Vec<usize>> = Vec::new();
        if options.match_words {
            sub_postfix = wrap_constraint(sub_postfix, &mut sub_runs, TokenKind::Begword, TokenKind::Endword);
        }
        if options.match_lines {
            sub_postfix = wrap_constraint(sub_postfix, &mut sub_runs, TokenKind::Begline, TokenKind::Endline);
        }
        if i == 0 {
            merged.postfix = sub_postfix;
        } else {
            merged.postfix.extend(sub_postfix);
            merged.postfix.push(Token::Op(TokenKind::Or));
        }
    }

    let must = muststr::extract(&merged.postfix, &merged.classes);
    let kwset = build_kwset(&must, options.case_fold);
    let (search_dfa, anchor_dfa) = build_dfas(&merged, eol_byte);

    log::debug!("redfa: compiled pattern dispatches to SingleByte (-F with -w/-x decoration)");
    Ok(CompiledPattern {
        dispatch: Dispatch::SingleByte,
        search_dfa: Some(search_dfa),
        anchor_dfa: Some(anchor_dfa),
        kwset,
        must,
        backtracker: options.backtracker.clone(),
        original_pattern: pattern.to_vec(),
        eol_byte,
        match_words: options.match_words,
        match_lines: options.match_lines,
    })
}

/// Emits `bytes` as a concatenation of literal `Byte` leaves (case-folded
/// the same way `parser::emit_case_folded_byte` folds an ordinary pattern
/// byte, since `-F` content never passes through the lexer/parser at all).
fn literal_postfix(bytes: &[u8], case_fold: bool) -> Vec<Token> {
    if bytes.is_empty() {
        return vec![Token::Op(TokenKind::Empty)];
    }
    let mut out = Vec::with_capacity(bytes.len() * 2);
    for (i, &b) in bytes.iter().enumerate() {
        if case_fold && b.is_ascii_alphabetic() {
            let lower = b.to_ascii_lowercase();
            let upper = b.to_ascii_uppercase();
            if lower == upper {
                out.push(Token::Byte(b));
            } else {
                out.push(Token::Byte(lower));
                out.push(Token::Byte(upper));
                out.push(Token::Op(TokenKind::Or));
            }
        } else {
            out.push(Token::Byte(b));
        }
        if i > 0 {
            out.push(Token::Op(TokenKind::Cat));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LogWarnSink;
    use std::sync::Arc;

    fn opts() -> CompileOptions {
        CompileOptions::builder()
            .warn_sink(Arc::new(LogWarnSink) as Arc<dyn crate::error::WarnSink>)
            .build()
    }

    #[test]
    fn plain_pattern_dispatches_single_byte() {
        let pat = compile(b"abc", SyntaxFlags::gnu_extended(), opts()).unwrap();
        assert!(matches!(pat.dispatch, Dispatch::SingleByte));
        assert!(pat.kwset.is_some());
    }

    #[test]
    fn backref_dispatches_to_backref() {
        // `RE_NO_BK_REFS` is set for strict POSIX basic syntax, so `\1` is
        // only recognized as a back-reference under the GNU variant.
        let pat = compile(br"\(a\)\1", SyntaxFlags::gnu_basic(), opts()).unwrap();
        assert!(matches!(pat.dispatch, Dispatch::Backref));
    }

    #[test]
    fn fixed_strings_without_decoration_is_literal() {
        let mut o = opts();
        o.fixed_strings = true;
        let pat = compile(b"foo\nbar", SyntaxFlags::gnu_extended(), o).unwrap();
        assert!(matches!(pat.dispatch, Dispatch::Literal));
    }

    #[test]
    fn fixed_strings_with_word_match_builds_dfa() {
        let mut o = opts();
        o.fixed_strings = true;
        o.match_words = true;
        let pat = compile(b"cat", SyntaxFlags::gnu_extended(), o).unwrap();
        assert!(matches!(pat.dispatch, Dispatch::SingleByte));
    }

    #[test]
    fn empty_syntax_errors() {
        let err = compile(b"abc", SyntaxFlags::empty(), opts()).unwrap_err();
        assert_eq!(err, CompileError::NoSyntaxSpecified);
    }
}
