//! Syntax bitmask and option builders.
//!
//! Mirrors `spec.md` §6's union of `RE_*` bits verbatim. Kept as a flat
//! [`bitflags`] mask rather than a `bon` builder, since it is exactly that —
//! a bitmask — in both the original and in every regex-family API it is
//! modeled on.

use bitflags::bitflags;

bitflags! {
    /// Union of the `RE_*` syntax bits named in `spec.md` §6.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
    pub struct SyntaxFlags: u32 {
        const RE_EXTENDED                     = 1 << 0;
        const RE_CHAR_CLASSES                 = 1 << 1;
        const RE_CONTEXT_INDEP_ANCHORS        = 1 << 2;
        const RE_CONTEXT_INDEP_OPS            = 1 << 3;
        const RE_NO_BK_PARENS                 = 1 << 4;
        const RE_NO_BK_VBAR                   = 1 << 5;
        const RE_NO_BK_BRACES                 = 1 << 6;
        const RE_NO_BK_REFS                   = 1 << 7;
        const RE_BK_PLUS_QM                   = 1 << 8;
        const RE_INTERVALS                    = 1 << 9;
        const RE_HAT_LISTS_NOT_NEWLINE        = 1 << 10;
        const RE_DOT_NEWLINE                  = 1 << 11;
        const RE_DOT_NOT_NULL                 = 1 << 12;
        const RE_NEWLINE_ALT                  = 1 << 13;
        const RE_UNMATCHED_RIGHT_PAREN_ORD    = 1 << 14;
        const RE_LIMITED_OPS                  = 1 << 15;
        const RE_INVALID_INTERVAL_ORD         = 1 << 16;
        const RE_ICASE                        = 1 << 17;
    }
}

impl SyntaxFlags {
    /// POSIX Basic Regular Expression syntax, as grep's
    /// `basic_regex_flags` constant (without the GNU extensions below).
    /// `\1`..`\9` are ordinary escaped digits here, not back-references
    /// (`RE_NO_BK_REFS` set), matching POSIX BRE.
    pub fn posix_basic() -> Self {
        SyntaxFlags::RE_CHAR_CLASSES | SyntaxFlags::RE_INTERVALS | SyntaxFlags::RE_NO_BK_REFS
    }

    /// POSIX Extended Regular Expression syntax, as grep's
    /// `extended_regex_flags` constant. `RE_NO_BK_REFS` is set, as in
    /// POSIX ERE: `\1`..`\9` are ordinary escaped digits, not
    /// back-references.
    pub fn posix_extended() -> Self {
        SyntaxFlags::RE_EXTENDED
            | SyntaxFlags::RE_CHAR_CLASSES
            | SyntaxFlags::RE_CONTEXT_INDEP_ANCHORS
            | SyntaxFlags::RE_CONTEXT_INDEP_OPS
            | SyntaxFlags::RE_NO_BK_PARENS
            | SyntaxFlags::RE_NO_BK_VBAR
            | SyntaxFlags::RE_NO_BK_BRACES
            | SyntaxFlags::RE_INTERVALS
            | SyntaxFlags::RE_NO_BK_REFS
    }

    /// `posix_extended()` with `RE_NO_BK_REFS` unset, so `\1`..`\9` are
    /// recognized as back-references (GNU grep's actual ERE behavior,
    /// which departs from strict POSIX here).
    pub fn gnu_extended() -> Self {
        Self::posix_extended() - SyntaxFlags::RE_NO_BK_REFS
    }

    /// Basic syntax with GNU's `\+`, `\?`, `\|` extensions enabled, and
    /// `RE_NO_BK_REFS` unset so `\1`..`\9` are recognized as
    /// back-references (GNU grep's actual BRE behavior).
    pub fn gnu_basic() -> Self {
        (Self::posix_basic() | SyntaxFlags::RE_BK_PLUS_QM) - SyntaxFlags::RE_NO_BK_REFS
    }
}

/// Compile-time options, independent of syntax bits.
///
/// Built with [`bon`]'s `#[builder]` attribute, matching the teacher
/// crate's `IbMatcher::builder()` idiom (`matcher/mod.rs`).
pub struct CompileOptions {
    pub case_fold: bool,
    pub match_words: bool,
    pub match_lines: bool,
    pub anchor_only: bool,
    pub eol_is_nul: bool,
    /// `-F`: every sub-pattern is a literal keyword, never fed to the
    /// parser (`spec.md` §4.I step 3).
    pub fixed_strings: bool,
    /// Upgrades the `[:space:]`-outside-brackets warning (`spec.md` §7) to
    /// a hard [`crate::error::CompileError`].
    pub posixly_correct: bool,
    pub warn_sink: std::sync::Arc<dyn crate::error::WarnSink>,
    pub backtracker: Option<std::sync::Arc<dyn crate::backtrack::Backtracker>>,
}

#[bon::bon]
impl CompileOptions {
    #[builder]
    pub fn new(
        #[builder(default = false)] case_fold: bool,
        #[builder(default = false)] match_words: bool,
        #[builder(default = false)] match_lines: bool,
        #[builder(default = false)] anchor_only: bool,
        #[builder(default = false)] eol_is_nul: bool,
        #[builder(default = false)] fixed_strings: bool,
        #[builder(default = false)] posixly_correct: bool,
        warn_sink: Option<std::sync::Arc<dyn crate::error::WarnSink>>,
        backtracker: Option<std::sync::Arc<dyn crate::backtrack::Backtracker>>,
    ) -> Self {
        CompileOptions {
            case_fold,
            match_words,
            match_lines,
            anchor_only,
            eol_is_nul,
            fixed_strings,
            posixly_correct,
            warn_sink: warn_sink.unwrap_or_else(|| std::sync::Arc::new(crate::error::LogWarnSink)),
            backtracker,
        }
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_and_extended_differ_on_extended_bit() {
        assert!(!SyntaxFlags::posix_basic().contains(SyntaxFlags::RE_EXTENDED));
        assert!(SyntaxFlags::posix_extended().contains(SyntaxFlags::RE_EXTENDED));
    }

    #[test]
    fn default_options_are_permissive() {
        let opts = CompileOptions::default();
        assert!(!opts.case_fold);
        assert!(!opts.match_words);
    }
}
