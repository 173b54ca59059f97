use once_cell::sync::Lazy;
use regex::Regex;

static TAG_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s,]+").expect("valid tag separator regex"));
static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#?([0-9a-fA-F]{6})$").expect("valid color regex"));

/// Splits free-form tag input on whitespace and commas, lowercases it and drops
/// blanks and anything already present in `existing` or earlier in the input.
pub fn parse_tags(input: &str, existing: &[String]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for raw in TAG_SEPARATOR.split(input) {
        let tag = raw.trim().to_lowercase();
        if tag.is_empty() || existing.contains(&tag) || tags.contains(&tag) {
            continue;
        }
        tags.push(tag);
    }
    tags
}

/// Normalizes a tag list coming from an already-split source.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = Vec::new();
    for tag in tags {
        let parsed = parse_tags(tag.as_ref(), &out);
        out.extend(parsed);
    }
    out
}

/// Accepts `#rrggbb` or `rrggbb`; returns lowercase `#rrggbb`.
pub fn normalize_color(input: &str) -> Option<String> {
    let caps = HEX_COLOR.captures(input.trim())?;
    Some(format!("#{}", caps[1].to_lowercase()))
}
