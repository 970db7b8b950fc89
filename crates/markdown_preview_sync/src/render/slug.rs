//! Heading anchors.

use std::collections::HashMap;

/// Converts heading text to a GitHub style anchor.
///
/// Lowercases, turns spaces into hyphens, drops punctuation and collapses
/// repeated hyphens.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter_map(|c| match c {
            c if c.is_alphanumeric() || c == '_' => Some(c),
            ' ' | '-' => Some('-'),
            _ => None,
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Hands out unique anchors within one document.
#[derive(Debug, Default)]
pub(crate) struct Slugger {
    seen: HashMap<String, usize>,
}

impl Slugger {
    /// The second `intro` becomes `intro-1`, the third `intro-2`.
    pub(crate) fn slug(&mut self, text: &str) -> String {
        let base = slugify(&text.replace('`', ""));
        let count = self.seen.entry(base.clone()).or_default();
        let slug = if *count == 0 {
            base
        } else {
            format!("{base}-{count}")
        };
        *count += 1;
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("API Reference (v2)"), "api-reference-v2");
        assert_eq!(slugify("  --Spaced--  out "), "spaced-out");
        assert_eq!(slugify("snake_case"), "snake_case");
    }

    #[test]
    fn test_slugger_dedupes() {
        let mut slugger = Slugger::default();
        assert_eq!(slugger.slug("Intro"), "intro");
        assert_eq!(slugger.slug("`Intro`"), "intro-1");
        assert_eq!(slugger.slug("Intro"), "intro-2");
        assert_eq!(slugger.slug("Other"), "other");
    }
}
