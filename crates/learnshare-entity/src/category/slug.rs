//! URL slug generation for category names.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Names whose punctuation carries the meaning.
const SPECIAL_NAMES: &[(&str, &str)] = &[("C#", "c-sharp"), ("C++", "cpp"), ("C", "c-language")];

/// Longest accepted slug.
pub const MAX_SLUG_LEN: usize = 255;

/// `đ` has no canonical decomposition, so NFD leaves it alone.
fn fold(ch: char) -> char {
    match ch {
        'đ' => 'd',
        other => other,
    }
}

/// Derive a URL slug from a display name.
///
/// The name is decomposed (NFD) and its combining marks dropped, so any
/// decomposable accented letter folds to its base letter. Whitespace and
/// hyphen runs become a single `-`, and any other punctuation is dropped.
/// A name that leaves nothing behind gets a random 8-character token.
pub fn slugify(name: &str) -> String {
    let trimmed = name.trim();
    if let Some((_, slug)) = SPECIAL_NAMES.iter().find(|(n, _)| *n == trimmed) {
        return (*slug).to_string();
    }

    let mut slug = String::with_capacity(trimmed.len());
    let mut pending_dash = false;
    let folded = trimmed
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(fold);
    for ch in folded {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else if ch.is_whitespace() || ch == '-' {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        return random_token();
    }
    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }
    slug
}

/// Check that `slug` is lower-case ASCII alphanumerics joined by single hyphens.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= MAX_SLUG_LEN
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn random_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}
