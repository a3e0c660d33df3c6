//! Regex highlight rules and the chunk scan that turns them into ranges.

use ratatui::style::Style;
use regex::bytes::{Regex, RegexBuilder};

use crate::error::{PagerError, Result};
use crate::pager::line::{SearchRange, StyleRange};

/// A pattern and the style its matches are drawn in.
#[derive(Debug, Clone)]
pub struct ColorRule {
    pub pattern: String,
    pub regex: Regex,
    pub style: Style,
}

impl ColorRule {
    pub fn new(pattern: &str, style: Style) -> Result<Self> {
        Ok(Self {
            pattern: pattern.to_string(),
            regex: compile_pattern(pattern)?,
            style,
        })
    }
}

/// Whether `pattern` has no uppercase letters.
pub fn is_lowercase(pattern: &str) -> bool {
    !pattern.chars().any(char::is_uppercase)
}

/// Compile a user pattern with smart case: an all-lowercase pattern
/// matches case-insensitively.
pub fn compile_pattern(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(is_lowercase(pattern))
        .build()
        .map_err(|e| PagerError::pattern(pattern, e))
}

/// Text without its trailing newline, which never takes part in matching.
pub fn without_newline(text: &[u8]) -> &[u8] {
    text.strip_suffix(b"\n").unwrap_or(text)
}

/// Scan `text` left to right, producing non-overlapping styled ranges.
///
/// At each position the rule whose match starts earliest wins; on a tie the
/// longer match wins, then the earlier rule. Scanning resumes at the end of
/// the chosen match. Empty matches are never recorded but move the scan on by
/// one byte. With `stop_on_miss`, a rule that fails to match is not tried
/// again for the rest of the line.
pub fn scan_chunks(rules: &[ColorRule], text: &[u8], stop_on_miss: bool) -> Vec<StyleRange> {
    let text = without_newline(text);
    let mut ranges = Vec::new();
    if rules.is_empty() {
        return ranges;
    }
    let mut stopped = vec![false; rules.len()];
    let mut offset = 0;

    while offset < text.len() {
        let mut best: Option<StyleRange> = None;
        let mut null_match = false;

        for (i, rule) in rules.iter().enumerate() {
            if stopped[i] {
                continue;
            }
            match rule.regex.find_at(text, offset) {
                Some(m) if m.start() == m.end() => null_match = true,
                Some(m) => {
                    let better = best.map_or(true, |b| {
                        m.start() < b.start || (m.start() == b.start && m.end() > b.end)
                    });
                    if better {
                        best = Some(StyleRange {
                            start: m.start(),
                            end: m.end(),
                            style: rule.style,
                        });
                    }
                }
                None if stop_on_miss => stopped[i] = true,
                None => {}
            }
        }

        match best {
            Some(chunk) => {
                offset = chunk.end;
                ranges.push(chunk);
            }
            None if null_match => offset += 1,
            None => break,
        }
    }
    ranges
}

/// Every match of `regex` in `text`, in order.
pub fn find_matches(regex: &Regex, text: &[u8]) -> Vec<SearchRange> {
    let text = without_newline(text);
    let mut ranges = Vec::new();
    let mut offset = 0;
    while offset <= text.len() {
        let Some(m) = regex.find_at(text, offset) else {
            break;
        };
        ranges.push(SearchRange {
            start: m.start(),
            end: m.end(),
        });
        offset = if m.end() == m.start() {
            m.end() + 1
        } else {
            m.end()
        };
        if offset >= text.len() {
            break;
        }
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::style::Color;

    fn rule(pattern: &str, color: Color) -> ColorRule {
        ColorRule::new(pattern, Style::default().fg(color)).expect("valid pattern")
    }

    #[test]
    fn test_smart_case() {
        let re = compile_pattern("hello").expect("compile");
        assert!(re.is_match(b"HeLLo"));
        let re = compile_pattern("Hello").expect("compile");
        assert!(!re.is_match(b"hello"));
    }

    #[test]
    fn test_bad_pattern_reports_pattern() {
        let err = compile_pattern("(unclosed").unwrap_err();
        assert!(matches!(err, PagerError::PatternCompile { ref pattern, .. } if pattern == "(unclosed"));
    }

    #[test]
    fn test_chunks_are_ordered_and_disjoint() {
        let rules = vec![rule(r"\d+", Color::Red), rule(r"[a-z]+@[a-z.]+", Color::Blue)];
        let ranges = scan_chunks(&rules, b"call 555 or mail bob@example.org now 42\n", true);
        let spans: Vec<(usize, usize)> = ranges.iter().map(|r| (r.start, r.end)).collect();
        assert_eq!(spans, vec![(5, 8), (17, 32), (37, 39)]);
        for pair in ranges.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
    }

    #[test]
    fn test_longer_match_wins_at_same_start() {
        let rules = vec![rule("foo", Color::Red), rule("foobar", Color::Green)];
        let ranges = scan_chunks(&rules, b"foobar", true);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].end, 6);
        assert_eq!(ranges[0].style.fg, Some(Color::Green));
    }

    #[test]
    fn test_first_rule_wins_exact_tie() {
        let rules = vec![rule("abc", Color::Red), rule("a.c", Color::Green)];
        let ranges = scan_chunks(&rules, b"abc", true);
        assert_eq!(ranges[0].style.fg, Some(Color::Red));
    }

    #[test]
    fn test_anchor_only_matches_line_start() {
        let rules = vec![rule("^x", Color::Red)];
        let ranges = scan_chunks(&rules, b"xxx", true);
        assert_eq!(ranges.len(), 1);
        assert_eq!((ranges[0].start, ranges[0].end), (0, 1));
    }

    #[test]
    fn test_empty_matches_do_not_loop() {
        let rules = vec![rule("z*", Color::Red), rule("b", Color::Green)];
        let ranges = scan_chunks(&rules, b"abab", false);
        let spans: Vec<(usize, usize)> = ranges.iter().map(|r| (r.start, r.end)).collect();
        assert_eq!(spans, vec![(1, 2), (3, 4)]);
    }

    #[test]
    fn test_find_matches() {
        let re = compile_pattern("an").expect("compile");
        let hits = find_matches(&re, b"banana\n");
        assert_eq!(
            hits,
            vec![SearchRange { start: 1, end: 3 }, SearchRange { start: 3, end: 5 }]
        );
        assert!(find_matches(&re, b"xyz\n").is_empty());
    }

    #[test]
    fn test_newline_is_not_matched() {
        let re = compile_pattern(r"\s$").expect("compile");
        assert!(find_matches(&re, b"word\n").is_empty());
    }
}
