//! Search coordinator: `spec.md` §4.J.
//!
//! [`CompiledPattern::search_line`] is the engine's one external search
//! entry point: KWset skip to a candidate line, widen to line boundaries,
//! run the DFA, and (for a back-reference pattern) fall back to the
//! injected [`crate::backtrack::Backtracker`].
//!
//! **Leftmost-start recovery.** This port's `Dfa` (see the `dfa` module
//! doc) only ever reports the *end* of a match directly — the "searching"
//! variant's unioned start-position trick (`spec.md` §4.E step 7) is what
//! lets one left-to-right scan find the leftmost-longest match's end
//! without an outer restart loop, but by design it never records *where*
//! that match began (doing so would mean tracking one start offset per
//! live position, which the original doesn't do either — `dfa.c`'s
//! `dfaexec` has exactly the same limitation and grep papers over it with
//! its own two-phase KWset/`dfaexec`/`re_search` handoff). This port
//! recovers the start the direct way: once `search_dfa` reports end offset
//! `e`, scan candidate starts `s` in `[line_start, e]` in increasing order
//! through the *anchored* DFA (`searching = false`) pinned at `s`; the
//! first `s` that matches is the leftmost start, and its own match end is
//! automatically the longest for that start. Bounded by the matched
//! line's width, not the whole buffer.

use crate::analyzer::Context;
use crate::compile::{CompiledPattern, Dispatch};
use crate::dfa::exec;

/// Result of [`CompiledPattern::search_line`]. `offset = None` is
/// spec.md's `SIZE_MAX` "no match" sentinel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchOutcome {
    pub offset: Option<usize>,
    pub size: usize,
    pub newlines_consumed: usize,
}

impl SearchOutcome {
    fn no_match() -> Self {
        SearchOutcome {
            offset: None,
            size: 0,
            newlines_consumed: 0,
        }
    }
}

impl CompiledPattern {
    /// `spec.md` §6: `search_line(pattern, buf, end, allow_newline,
    /// start_ptr?) -> (offset, size, newlines_consumed)`. `buf` must have
    /// one writable byte past `end` for the sentinel; it is always restored
    /// before returning (`spec.md` §5, "The engine restores the original
    /// byte before returning").
    pub fn search_line(&mut self, buf: &mut [u8], end: usize, allow_newline: bool) -> SearchOutcome {
        assert!(
            end < buf.len(),
            "search_line requires one writable sentinel byte past `end`"
        );
        let saved = buf[end];
        buf[end] = self.eol_byte;

        let outcome = match self.dispatch {
            Dispatch::Literal => self.search_literal(buf, end),
            Dispatch::Backref => self.search_backref(buf, end),
            Dispatch::SingleByte => self.search_dfa(buf, end, allow_newline),
        };

        buf[end] = saved;
        outcome
    }

    /// `-F` without `-w`/`-x`: the KWset hit directly is the match
    /// (`spec.md` §4.H, "for `-F` mode, `offset` and `size` define the
    /// match directly").
    fn search_literal(&self, buf: &[u8], end: usize) -> SearchOutcome {
        let Some(kwset) = &self.kwset else {
            return SearchOutcome::no_match();
        };
        match kwset.search(&buf[..end], 0) {
            Some(m) => SearchOutcome {
                offset: Some(m.offset),
                size: m.size,
                newlines_consumed: count_newlines(&buf[..m.offset], self.eol_byte),
            },
            None => SearchOutcome::no_match(),
        }
    }

    /// A back-reference was present at compile time: every line in
    /// `buf[..end]` is offered to the backtracker in turn, advancing past a
    /// failed line rather than retrying it with a shifted start (`spec.md`
    /// §4.J "Failure modes": "backtracker miss on back-ref ⇒ advance one
    /// line and continue").
    fn search_backref(&self, buf: &[u8], end: usize) -> SearchOutcome {
        let Some(backtracker) = &self.backtracker else {
            return SearchOutcome::no_match();
        };
        let mut line_start = 0usize;
        let mut newlines_consumed = 0usize;
        while line_start <= end {
            let line_end = buf[line_start..end]
                .iter()
                .position(|&b| b == self.eol_byte)
                .map(|i| line_start + i)
                .unwrap_or(end);
            if let Some((start, size)) = backtracker.verify(&self.original_pattern, &buf[..line_end], line_start) {
                return SearchOutcome {
                    offset: Some(start),
                    size,
                    newlines_consumed,
                };
            }
            if line_end >= end {
                break;
            }
            newlines_consumed += 1;
            line_start = line_end + 1;
        }
        SearchOutcome {
            offset: None,
            size: 0,
            newlines_consumed,
        }
    }

    /// The general DFA path (`spec.md` §4.J algorithm outline), with the
    /// superset-DFA prefilter step omitted: this port's parser already
    /// lowers every multibyte/`ANYCHAR` construct to concrete bytes before
    /// the DFA ever sees it (see `dfa`'s module doc), and the one other
    /// construct a superset DFA exists to approximate cheaply —
    /// back-references — is already routed to `Dispatch::Backref` well
    /// before reaching this method. A second, coarser DFA pass would have
    /// nothing left to filter out; see `DESIGN.md`.
    fn search_dfa(&mut self, buf: &[u8], end: usize, allow_newline: bool) -> SearchOutcome {
        let mut scan_from = 0usize;

        loop {
            if scan_from > end {
                return SearchOutcome::no_match();
            }

            let (region_start, region_end) = match &self.kwset {
                Some(kwset) => match kwset.search(&buf[..end], scan_from) {
                    Some(m) => widen_to_line(buf, end, m.offset, m.offset + m.size, self.eol_byte),
                    None => return SearchOutcome::no_match(),
                },
                None => (scan_from, end),
            };

            let preceding = if region_start == 0 {
                Context::NEWLINE
            } else {
                crate::dfa::byte_context(buf[region_start - 1], self.eol_byte)
            };

            let lines_before_region = count_newlines(&buf[..region_start], self.eol_byte);

            let search_dfa = self.search_dfa.as_mut().expect("SingleByte dispatch always has a search_dfa");
            let result = exec::execute(search_dfa, buf, region_start, region_end, preceding, allow_newline);

            let Some(match_end) = result.match_end else {
                // No match in this widened region: if there was no KWset
                // to begin with, the whole buffer was the region and we're
                // done; otherwise advance past this line and try the next
                // KWset hit (`spec.md` §4.J, "superset DFA miss ⇒
                // continue").
                if self.kwset.is_none() {
                    return SearchOutcome::no_match();
                }
                scan_from = region_end + 1;
                continue;
            };

            let anchor_dfa = self.anchor_dfa.as_mut().expect("SingleByte dispatch always has an anchor_dfa");
            if let Some((start, size)) = recover_start(anchor_dfa, buf, region_start, match_end, preceding) {
                return SearchOutcome {
                    offset: Some(start),
                    size,
                    newlines_consumed: lines_before_region + count_newlines(&buf[region_start..start], self.eol_byte),
                };
            }

            // The searching DFA accepted but no anchored start in
            // [region_start, match_end] reproduced it — only possible if
            // the match's true start precedes region_start (the KWset hit
            // landed inside a longer match). Re-scan from the start of the
            // line in that case; otherwise there is no match, and for an
            // unfiltered scan we are done.
            if self.kwset.is_none() {
                return SearchOutcome::no_match();
            }
            scan_from = region_end + 1;
        }
    }
}

/// Scans anchored start offsets `s` in `[from, to]` (inclusive) through
/// `anchor_dfa`, returning the first (leftmost) `s` at which a match is
/// found, together with that match's (longest) size at that start.
fn recover_start(
    anchor_dfa: &mut crate::dfa::Dfa,
    buf: &[u8],
    from: usize,
    to: usize,
    preceding_at_from: Context,
) -> Option<(usize, usize)> {
    let mut preceding = preceding_at_from;
    for s in from..=to {
        let result = exec::execute(anchor_dfa, buf, s, to, preceding, true);
        if let Some(e) = result.match_end {
            return Some((s, e - s));
        }
        preceding = crate::dfa::byte_context(buf[s], anchor_dfa.eol_byte());
    }
    None
}

/// Widens `[hit_start, hit_end)` out to the enclosing line: back to just
/// after the previous `eol_byte` (or 0), forward to just before the next
/// `eol_byte` (or `end`). `spec.md` §4.J step 3.
fn widen_to_line(buf: &[u8], end: usize, hit_start: usize, hit_end: usize, eol_byte: u8) -> (usize, usize) {
    let start = buf[..hit_start]
        .iter()
        .rposition(|&b| b == eol_byte)
        .map(|i| i + 1)
        .unwrap_or(0);
    let stop = buf[hit_end..end]
        .iter()
        .position(|&b| b == eol_byte)
        .map(|i| hit_end + i)
        .unwrap_or(end);
    (start, stop)
}

fn count_newlines(buf: &[u8], eol_byte: u8) -> usize {
    buf.iter().filter(|&&b| b == eol_byte).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use crate::error::LogWarnSink;
    use crate::syntax::{CompileOptions, SyntaxFlags};
    use std::sync::Arc;

    fn opts() -> CompileOptions {
        CompileOptions::builder()
            .warn_sink(Arc::new(LogWarnSink) as Arc<dyn crate::error::WarnSink>)
            .build()
    }

    fn search(pattern: &str, syntax: SyntaxFlags, options: CompileOptions, haystack: &[u8]) -> SearchOutcome {
        let mut pat = compile(pattern.as_bytes(), syntax, options).unwrap();
        let mut buf = haystack.to_vec();
        buf.push(b'\n');
        let end = haystack.len();
        pat.search_line(&mut buf, end, true)
    }

    #[test]
    fn scenario_plus_group() {
        let r = search("a(b|c)+d", SyntaxFlags::posix_extended(), opts(), b"xxabcbd");
        assert_eq!((r.offset, r.size), (Some(2), 5));
    }

    #[test]
    fn scenario_word_boundary() {
        let mut o = opts();
        o.match_words = true;
        let r = search("cat", SyntaxFlags::posix_basic(), o, b"catalog cat dog");
        assert_eq!((r.offset, r.size), (Some(8), 3));
    }

    #[test]
    fn scenario_icase() {
        let mut o = opts();
        o.case_fold = true;
        let r = search("hello", SyntaxFlags::posix_extended(), o, b"Say HeLLo");
        assert_eq!((r.offset, r.size), (Some(4), 5));
    }

    #[test]
    fn scenario_fixed_two_keywords() {
        let mut o = opts();
        o.fixed_strings = true;
        let r = search("foo\nbar", SyntaxFlags::posix_extended(), o, b"zfoobaz");
        assert_eq!((r.offset, r.size), (Some(1), 3));
    }

    #[test]
    fn scenario_empty_line_anchor() {
        let r = search("^$", SyntaxFlags::posix_extended(), opts(), b"");
        assert_eq!((r.offset, r.size), (Some(0), 0));
    }

    #[test]
    fn scenario_interval() {
        let r = search("a{2,4}", SyntaxFlags::posix_extended(), opts(), b"baaab");
        assert_eq!((r.offset, r.size), (Some(1), 3));
    }

    #[test]
    fn scenario_utf8_anychar() {
        let r = search(".", SyntaxFlags::posix_extended(), opts(), "Ⓐb".as_bytes());
        assert_eq!(r.offset, Some(0));
        assert_eq!(r.size, "Ⓐ".len());
    }

    #[test]
    fn no_match_returns_none_offset() {
        let r = search("zzz", SyntaxFlags::posix_extended(), opts(), b"xxabxx");
        assert_eq!(r.offset, None);
    }

    #[test]
    fn sentinel_byte_is_restored() {
        let mut pat = compile(b"ab", SyntaxFlags::posix_extended(), opts()).unwrap();
        let mut buf = b"xxabxx?".to_vec();
        let marker = buf[6];
        pat.search_line(&mut buf, 6, true);
        assert_eq!(buf[6], marker);
    }
}
