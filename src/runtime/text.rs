//! Text helpers: variable modifiers and field splitting.

use std::collections::HashMap;

use crate::ast::Modifier;

/// Words kept lower-case in titles, unless they open the title.
const SHORT_WORDS: &[&str] = &[
    "a", "an", "and", "the", "on", "to", "in", "for", "nor", "or", "from", "but", "is",
];

/// Counts slugs handed out during one page render so `:unique_slug` never repeats.
#[derive(Debug, Default)]
pub struct SlugTracker {
    seen: HashMap<String, u32>,
}

impl SlugTracker {
    pub fn unique(&mut self, text: &str) -> String {
        let slug = slug(text);
        match self.seen.get_mut(&slug) {
            Some(count) => {
                let unique = format!("{slug}-{count}");
                *count += 1;
                unique
            }
            None => {
                self.seen.insert(slug.clone(), 1);
                slug
            }
        }
    }
}

pub fn apply_modifier(modifier: Modifier, text: String, slugs: &mut SlugTracker) -> String {
    match modifier {
        Modifier::None => text,
        Modifier::Slug => slug(&text),
        Modifier::UniqueSlug => slugs.unique(&text),
        Modifier::Upper => text.to_uppercase(),
        Modifier::Lower => text.to_lowercase(),
        Modifier::Title => title_case(&text),
    }
}

/// Lower-case alphanumerics joined by `-`. HTML tags are dropped, each leaving a `-`.
pub fn slug(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push('-');
            }
            _ if in_tag => {}
            c if c.is_alphanumeric() => out.extend(c.to_lowercase()),
            c if c.is_whitespace() || c == '-' => out.push('-'),
            _ => {}
        }
    }
    out
}

pub fn title_case(text: &str) -> String {
    text.split(' ')
        .enumerate()
        .map(|(i, word)| {
            if i > 0 && SHORT_WORDS.contains(&word) {
                return word.to_string();
            }
            let mut out = String::with_capacity(word.len());
            let mut upper_next = true;
            for c in word.chars() {
                if upper_next {
                    out.extend(c.to_uppercase());
                    upper_next = false;
                } else {
                    out.extend(c.to_lowercase());
                    upper_next = c == '-' || c == '—';
                }
            }
            out
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits on whitespace, keeping `"quoted runs"` together without their quotes. An
/// unterminated quote runs to the end of the text.
pub fn split_fields(text: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut rest = text.trim_start();

    while !rest.is_empty() {
        if let Some(quoted) = rest.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => {
                    fields.push(quoted[..end].to_string());
                    rest = &quoted[end + 1..];
                }
                None => {
                    fields.push(quoted.to_string());
                    rest = "";
                }
            }
        } else {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            fields.push(rest[..end].to_string());
            rest = &rest[end..];
        }
        rest = rest.trim_start();
    }
    fields
}

#[cfg(test)]
mod text_tests {
    use super::*;

    #[test]
    fn slug_drops_tags_and_punctuation() {
        assert_eq!(slug("Hello, World!"), "hello-world");
        assert_eq!(slug("<b>Bold</b> move"), "-bold--move");
    }

    #[test]
    fn unique_slugs_count_up() {
        let mut slugs = SlugTracker::default();
        assert_eq!(slugs.unique("Intro"), "intro");
        assert_eq!(slugs.unique("Intro"), "intro-1");
        assert_eq!(slugs.unique("intro"), "intro-2");
    }

    #[test]
    fn title_case_keeps_short_words() {
        assert_eq!(title_case("the lord of the rings"), "The Lord Of the Rings");
        assert_eq!(title_case("a well-known tale"), "A Well-Known Tale");
    }

    #[test]
    fn fields_respect_quotes() {
        assert_eq!(
            split_fields(r#"  one "two three" four "#),
            vec!["one", "two three", "four"]
        );
        assert_eq!(split_fields(r#"a "open"#), vec!["a", "open"]);
        assert!(split_fields("   ").is_empty());
    }
}
