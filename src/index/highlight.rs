//! Highlight option parsing and fragment rendering.
//!
//! Highlighting is a presentation transform over an already-computed hit:
//! it re-analyzes the matched field with the executed query and wraps the
//! matching ranges in configurable markers. Ranking and filtering are
//! never affected.

use std::ops::Range;
use tantivy::snippet::Snippet;

const RIGHT_ARROW: &str = "\u{21a6}";
const LEFT_ARROW: &str = "\u{21a4}";
const DIVIDES: &str = "\u{2223}";

/// Options parsed from a highlight spec string.
///
/// The spec is a `|`-separated option list: `m:` max fragments, `z:`
/// fragment size in chars, `s:`/`e:` start/end markers, `f:` fragment
/// separator, `jh:n` to keep adjacent highlights separate, `jf:n` to keep
/// fragments separate. Unknown or malformed options are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightOpts {
    pub max_frags: usize,
    pub frag_size: usize,
    pub start: String,
    pub end: String,
    pub frag_sep: String,
    pub join_hi: bool,
    pub join_frags: bool,
}

impl Default for HighlightOpts {
    fn default() -> Self {
        Self {
            max_frags: 3,
            frag_size: 128,
            start: RIGHT_ARROW.to_string(),
            end: LEFT_ARROW.to_string(),
            frag_sep: DIVIDES.to_string(),
            join_hi: true,
            join_frags: true,
        }
    }
}

impl HighlightOpts {
    pub fn parse(spec: &str) -> Self {
        let mut opts = Self::default();
        for opt in spec.trim().split('|') {
            let opt = opt.trim();
            if let Some(v) = opt.strip_prefix("m:") {
                if let Ok(n) = v.parse() {
                    opts.max_frags = n;
                }
            } else if let Some(v) = opt.strip_prefix("z:") {
                if let Ok(n) = v.parse() {
                    opts.frag_size = n;
                }
            } else if let Some(v) = opt.strip_prefix("s:") {
                opts.start = v.to_string();
            } else if let Some(v) = opt.strip_prefix("e:") {
                opts.end = v.to_string();
            } else if let Some(v) = opt.strip_prefix("f:") {
                opts.frag_sep = v.to_string();
            } else if let Some(v) = opt.strip_prefix("jh:") {
                opts.join_hi = v != "n";
            } else if let Some(v) = opt.strip_prefix("jf:") {
                opts.join_frags = v != "n";
            }
        }
        opts
    }

    /// Character budget handed to the snippet generator.
    pub fn max_chars(&self) -> usize {
        self.max_frags.max(1) * self.frag_size.max(1)
    }

    /// Render a snippet's fragment with the highlighted ranges wrapped in
    /// the start/end markers.
    pub fn render(&self, snippet: &Snippet) -> String {
        let fragment = snippet.fragment();
        let mut ranges: Vec<Range<usize>> = snippet.highlighted().to_vec();
        ranges.sort_by_key(|r| r.start);
        if self.join_hi {
            ranges = join_adjacent(fragment, ranges);
        }

        let mut out = String::with_capacity(fragment.len() + ranges.len() * 8);
        let mut pos = 0;
        for range in ranges {
            if range.start < pos || range.end > fragment.len() {
                continue;
            }
            out.push_str(&fragment[pos..range.start]);
            out.push_str(&self.start);
            out.push_str(&fragment[range.start..range.end]);
            out.push_str(&self.end);
            pos = range.end;
        }
        out.push_str(&fragment[pos..]);
        out
    }
}

/// Merge highlight ranges separated only by whitespace, so a matched
/// phrase reads as one marked span instead of one span per term.
fn join_adjacent(fragment: &str, ranges: Vec<Range<usize>>) -> Vec<Range<usize>> {
    let mut merged: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last)
                if range.start >= last.end
                    && fragment[last.end..range.start].chars().all(char::is_whitespace) =>
            {
                last.end = range.end;
            }
            _ => merged.push(range),
        }
    }
    merged
}
