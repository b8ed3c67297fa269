//! Markup sanitizer applied to every free-text field before it is stored.

use std::sync::OnceLock;

use regex::{Captures, Regex};

fn dangerous_elements() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)<\s*(?:script|style|iframe|object|embed)\b[^>]*>.*?<\s*/\s*(?:script|style|iframe|object|embed)\s*>",
        )
        .expect("static regex")
    })
}

fn dangerous_tags() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<\s*/?\s*(?:script|style|iframe|object|embed)\b[^>]*>")
            .expect("static regex")
    })
}

fn any_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^<>]+>").expect("static regex"))
}

fn event_handler_attr() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#).expect("static regex")
    })
}

fn script_scheme() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:java|vb)script\s*:").expect("static regex"))
}

fn pass(input: &str) -> String {
    let out = dangerous_elements().replace_all(input, "");
    let out = dangerous_tags().replace_all(&out, "");
    let out = any_tag().replace_all(&out, |caps: &Captures| {
        event_handler_attr().replace_all(&caps[0], "").into_owned()
    });
    script_scheme().replace_all(&out, "").into_owned()
}

/// Strip executable markup from `input`.
///
/// Passes repeat until the text stops changing, so
/// `sanitize(&sanitize(x)) == sanitize(x)`. A pass only ever removes text,
/// which bounds the loop by the input length.
pub fn sanitize(input: &str) -> String {
    let mut current = pass(input);
    loop {
        let next = pass(&current);
        if next.len() >= current.len() {
            return current;
        }
        current = next;
    }
}

/// Sanitize every element of a string list in place.
pub fn sanitize_all(values: &mut [String]) {
    for v in values.iter_mut() {
        *v = sanitize(v);
    }
}

/// Sanitize an optional field in place.
pub fn sanitize_opt(value: &mut Option<String>) {
    if let Some(v) = value.as_mut() {
        *v = sanitize(v);
    }
}
