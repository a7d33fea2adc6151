//! Text checks applied to user content before it is stored

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

/// Replace every banned word in `content` by asterisks
///
/// Matching is case-insensitive and only applies to whole words. The replacement has the same
/// number of characters as the word it hides.
pub fn sanitise_banned_words(content: &str, banned_words: &[String]) -> String {
    banned_words
        .iter()
        .map(|word| word.trim())
        .filter(|word| !word.is_empty())
        .fold(content.to_string(), |content, word| {
            match whole_word(word) {
                Ok(regex) => regex
                    .replace_all(&content, |caps: &regex::Captures| {
                        "*".repeat(caps[0].chars().count())
                    })
                    .into_owned(),
                Err(err) => {
                    tracing::warn!(%word, error = %err, "skipping unusable banned word");
                    content
                }
            }
        })
}

fn whole_word(word: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&format!(r"\b{}\b", regex::escape(word)))
        .case_insensitive(true)
        .build()
}

/// Whether `content` links to any of the banned hosts
///
/// A banned entry matches the link's host or any of its subdomains.
pub fn contains_banned_link(content: &str, banned_links: &[String]) -> bool {
    if banned_links.is_empty() {
        return false;
    }
    link_hosts(content).any(|host| {
        banned_links
            .iter()
            .map(|banned| normalise_host(banned))
            .filter(|banned| !banned.is_empty())
            .any(|banned| host == banned || host.ends_with(&format!(".{banned}")))
    })
}

static LINK_HOST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)(?:https?://|www\.)([^\s/"'<>?#:]+)"#).unwrap());

fn link_hosts(content: &str) -> impl Iterator<Item = String> + '_ {
    LINK_HOST_RE
        .captures_iter(content)
        .map(|caps| normalise_host(&caps[1]))
}

fn normalise_host(value: &str) -> String {
    let value = value.trim().to_ascii_lowercase();
    let value = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"))
        .unwrap_or(&value);
    let value = value.strip_prefix("www.").unwrap_or(value);
    value
        .split(['/', ':', '?', '#'])
        .next()
        .unwrap_or_default()
        .to_string()
}

/// URL-safe identifier derived from a topic name
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "topic".to_string()
    } else {
        slug.to_string()
    }
}
