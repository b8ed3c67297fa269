//! Slug generation from course titles.

use std::sync::OnceLock;

use regex::Regex;

use crate::sanitize::sanitize;
use crate::{CoreError, Slug};

/// Hard cap on collision suffixes tried by `unique_slug`.
const MAX_SUFFIX_ATTEMPTS: u32 = 1000;

fn separator_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s+]+").expect("static regex"))
}

fn disallowed() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\x{0600}-\x{06FF}-]").expect("static regex"))
}

fn hyphen_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-{2,}").expect("static regex"))
}

fn slug_text() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\w\x{0600}-\x{06FF}-]+$").expect("static regex"))
}

/// True when `s` only holds characters a slug may contain.
pub(crate) fn is_slug_text(s: &str) -> bool {
    slug_text().is_match(s)
}

/// Derive a URL-safe identifier from a title.
///
/// Whitespace and `+` runs become a single hyphen; anything that is not a
/// word character, an Arabic-script character or a hyphen is dropped. The
/// result can be empty; callers must treat that as invalid.
pub fn slugify(title: &str) -> String {
    let clean = sanitize(title);
    let s = separator_run().replace_all(clean.trim(), "-");
    let s = disallowed().replace_all(&s, "");
    let s = hyphen_run().replace_all(&s, "-");
    s.to_lowercase()
}

/// Build a slug for `title`, appending `-2`, `-3`, ... while `is_taken`
/// reports a clash.
pub fn unique_slug<F>(title: &str, mut is_taken: F) -> Result<Slug, CoreError>
where
    F: FnMut(&Slug) -> Result<bool, CoreError>,
{
    let base = slugify(title);
    if base.chars().all(|c| c == '-') {
        return Err(CoreError::invalid("slug", "title produces an empty slug"));
    }
    let first = Slug::new(base.clone())?;
    if !is_taken(&first)? {
        return Ok(first);
    }
    for n in 2..MAX_SUFFIX_ATTEMPTS {
        let candidate = Slug::new(format!("{base}-{n}"))?;
        if !is_taken(&candidate)? {
            return Ok(candidate);
        }
    }
    Err(CoreError::Repository(
        "failed to generate unique slug".into(),
    ))
}
