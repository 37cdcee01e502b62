//! SQL `LIKE` pattern matching for the directory table.
//!
//! `%` matches any run of characters (including none), `_` matches exactly
//! one character. Matching is case-sensitive.

/// Match `text` against a `LIKE` pattern
#[must_use]
pub fn like_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0usize, 0usize);
    // Position of the last '%' seen and the text index it was tried against
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some('_') => {
                p += 1;
                t += 1;
            }
            Some(&c) if c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    backtrack = Some((star_p, star_t + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '%')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact() {
        assert!(like_match("testfile", "testfile"));
        assert!(!like_match("testfile", "testfile2"));
        assert!(!like_match("testfile", "Testfile"));
    }

    #[test]
    fn test_percent() {
        assert!(like_match("%", ""));
        assert!(like_match("%", "anything"));
        assert!(like_match("test%", "test"));
        assert!(like_match("test%", "testfile"));
        assert!(!like_match("test%", "otherfile"));
        assert!(like_match("%file", "otherfile"));
        assert!(like_match("a%b%c", "aXXbYYc"));
        assert!(!like_match("a%b%c", "aXXcYYb"));
    }

    #[test]
    fn test_underscore() {
        assert!(like_match("part_", "part1"));
        assert!(!like_match("part_", "part"));
        assert!(!like_match("part_", "part12"));
        assert!(like_match("_%_", "ab"));
    }

    #[test]
    fn test_backtracking() {
        assert!(like_match("%aab", "aaab"));
        assert!(like_match("%.csv", "x.csv.csv"));
        assert!(!like_match("%.csv", "x.csv.gz"));
    }
}
