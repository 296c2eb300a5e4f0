//! Minimal glob matching for `file_pattern`/`repository`/`branch` conditions.
//!
//! Supports `*` (any run of characters), `?` (single character), and
//! literal segments; translated to an anchored regex, grounded on the
//! translate-to-regex approach used across the example pack's pattern
//! matchers rather than a proper glob crate the teacher doesn't depend on.

use regex::Regex;

pub fn glob_to_regex(pattern: &str) -> Regex {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            c if regex_meta(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');
    Regex::new(&out).unwrap_or_else(|_| Regex::new("$^").expect("empty-match fallback is valid"))
}

fn regex_meta(c: char) -> bool {
    matches!(c, '.' | '+' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' | '\\')
}

pub fn matches_any(patterns: &[String], candidate: &str) -> bool {
    patterns.iter().any(|p| glob_to_regex(p).is_match(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_any_suffix() {
        assert!(glob_to_regex("src/*.rs").is_match("src/main.rs"));
        assert!(!glob_to_regex("src/*.rs").is_match("lib/main.rs"));
    }

    #[test]
    fn question_mark_matches_single_char() {
        assert!(glob_to_regex("v?.txt").is_match("v1.txt"));
        assert!(!glob_to_regex("v?.txt").is_match("v12.txt"));
    }

    #[test]
    fn literal_dot_is_escaped() {
        assert!(glob_to_regex("release.yaml").is_match("release.yaml"));
        assert!(!glob_to_regex("release.yaml").is_match("releaseXyaml"));
    }
}
