//! Keyword-set prefilter: `spec.md` §4.H.
//!
//! The original hand-rolls Boyer-Moore for a single keyword and
//! Aho-Corasick (with an AVL-balanced trie and BFS-built failure links) for
//! two or more. This port keeps the size-based algorithm selection but
//! reaches for the real crates the rest of this codebase's stack already
//! uses for exactly this: [`memchr::memmem`] for the single-keyword
//! Boyer-Moore-equivalent path, [`aho_corasick`] for the multi-keyword
//! path.

use itertools::Itertools;

/// One match reported by [`KwSet::search`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KwMatch {
    /// Index of the logical keyword (pre-fold-expansion) that matched.
    pub keyword_index: usize,
    pub offset: usize,
    pub size: usize,
}

enum Matcher {
    Empty,
    Single {
        finder: memchr::memmem::Finder<'static>,
        len: usize,
    },
    Multi(aho_corasick::AhoCorasick),
}

pub struct KwSet {
    matcher: Matcher,
    /// Maps a physical (fold-expanded) pattern index, as reported by the
    /// underlying matcher, back to the logical keyword index the caller
    /// inserted.
    keyword_of_pattern: Vec<usize>,
}

impl KwSet {
    /// Scans `buf[start..]` for the next occurrence of any keyword.
    pub fn search(&self, buf: &[u8], start: usize) -> Option<KwMatch> {
        match &self.matcher {
            Matcher::Empty => None,
            Matcher::Single { finder, len } => {
                finder.find(&buf[start..]).map(|pos| KwMatch {
                    keyword_index: self.keyword_of_pattern[0],
                    offset: start + pos,
                    size: *len,
                })
            }
            Matcher::Multi(ac) => ac.find(&buf[start..]).map(|m| KwMatch {
                keyword_index: self.keyword_of_pattern[m.pattern().as_usize()],
                offset: start + m.start(),
                size: m.len(),
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.matcher, Matcher::Empty)
    }
}

pub struct KwSetBuilder {
    /// One entry per logical keyword; each inner vec holds that keyword's
    /// literal bytes plus (if case-folding) its multibyte fold-equivalent
    /// expansions, per `spec.md` §4.H.
    keywords: Vec<Vec<Vec<u8>>>,
    case_fold: bool,
}

impl KwSetBuilder {
    pub fn new(case_fold: bool) -> Self {
        KwSetBuilder {
            keywords: Vec::new(),
            case_fold,
        }
    }

    /// Insert one keyword, recording its logical index. Returns that index.
    pub fn insert(&mut self, keyword: &[u8]) -> usize {
        let index = self.keywords.len();
        let variants = if self.case_fold {
            fold_variants(keyword)
        } else {
            vec![keyword.to_vec()]
        };
        self.keywords.push(variants);
        index
    }

    /// Finalizes delta tables / failure links (`prep` in the original) by
    /// constructing the appropriate backing matcher.
    pub fn build(self) -> KwSet {
        let mut patterns: Vec<Vec<u8>> = Vec::new();
        let mut keyword_of_pattern: Vec<usize> = Vec::new();
        for (logical_index, variants) in self.keywords.iter().enumerate() {
            for v in variants {
                patterns.push(v.clone());
                keyword_of_pattern.push(logical_index);
            }
        }

        let matcher = match patterns.len() {
            0 => Matcher::Empty,
            1 => Matcher::Single {
                len: patterns[0].len(),
                finder: memchr::memmem::Finder::new(&patterns[0]).into_owned(),
            },
            _ => Matcher::Multi(
                aho_corasick::AhoCorasick::builder()
                    .match_kind(aho_corasick::MatchKind::LeftmostFirst)
                    .build(&patterns)
                    .expect("keyword patterns are valid byte strings"),
            ),
        };

        KwSet {
            matcher,
            keyword_of_pattern,
        }
    }
}

/// Expands `keyword` into its case-fold-equivalent byte strings: the
/// cartesian product of each decoded character's `{lowercase, uppercase}`
/// variants, capped at [`crate::limits::CASE_FOLDED_BUFSIZE`] entries.
/// ASCII-only keywords produce exactly the upper/lower pair per byte; the
/// same machinery picks up non-ASCII fold pairs (e.g. `İ`/`i̇`) for free.
fn fold_variants(keyword: &[u8]) -> Vec<Vec<u8>> {
    let Ok(s) = std::str::from_utf8(keyword) else {
        // Not valid UTF-8 (a raw non-UTF-8 byte keyword): fold is
        // undefined here, fall back to the literal bytes only.
        return vec![keyword.to_vec()];
    };
    let per_char: Vec<Vec<char>> = s
        .chars()
        .map(|c| {
            let mut variants: Vec<char> = c.to_lowercase().chain(c.to_uppercase()).collect();
            variants.sort_unstable();
            variants.dedup();
            variants
        })
        .collect();

    if per_char.iter().any(|v| v.len() > 1) {
        per_char
            .into_iter()
            .multi_cartesian_product()
            .take(crate::limits::CASE_FOLDED_BUFSIZE)
            .map(|chars| chars.into_iter().collect::<String>().into_bytes())
            .collect()
    } else {
        vec![keyword.to_vec()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_keyword_uses_memmem_path() {
        let mut b = KwSetBuilder::new(false);
        b.insert(b"needle");
        let kw = b.build();
        let m = kw.search(b"haystack needle here", 0).unwrap();
        assert_eq!(m.offset, 9);
        assert_eq!(m.size, 6);
    }

    #[test]
    fn multi_keyword_uses_aho_corasick_path() {
        let mut b = KwSetBuilder::new(false);
        b.insert(b"foo");
        b.insert(b"bar");
        let kw = b.build();
        let m = kw.search(b"zfoobaz", 0).unwrap();
        assert_eq!(m.keyword_index, 0);
        assert_eq!((m.offset, m.size), (1, 3));
    }

    #[test]
    fn case_fold_matches_either_case() {
        let mut b = KwSetBuilder::new(true);
        b.insert(b"hello");
        let kw = b.build();
        let m = kw.search(b"Say HeLLo", 0).unwrap();
        assert_eq!(m.offset, 4);
        assert_eq!(m.size, 5);
    }

    #[test]
    fn empty_kwset_never_matches() {
        let kw = KwSetBuilder::new(false).build();
        assert!(kw.is_empty());
        assert!(kw.search(b"anything", 0).is_none());
    }
}
