//! Pattern extraction of the pickup date text from the lookup page.

use std::sync::LazyLock;

use regex::Regex;

use curbside_core::model::WasteStream;

/// Literal the city prints when it cannot resolve an address.
pub const NOT_FOUND_MARKER: &str = "Your garbage collection schedule could not be determined.";

static GARBAGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| label_pattern("next garbage collection"));
static RECYCLING_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| label_pattern("next recycling collection"));

const EMPHASIS_TAGS: [&str; 3] = ["strong", "b", "em"];

// Label, then anything (newlines included), then the first emphasised span
// whose closing tag matches its opening tag. One capture group per tag.
fn label_pattern(label: &str) -> Regex {
    let spans = EMPHASIS_TAGS
        .map(|tag| format!(r"<{tag}\b[^>]*>(.*?)</{tag}\s*>"))
        .join("|");
    Regex::new(&format!(r"(?is){label}.*?(?:{spans})")).expect("static label pattern compiles")
}

/// Whether the page says the address could not be resolved.
#[must_use]
pub fn contains_not_found_marker(body: &str) -> bool {
    body.contains(NOT_FOUND_MARKER)
}

/// Emphasised text following the stream's label, trimmed, with non-breaking spaces collapsed.
#[must_use]
pub fn extract_date_text(body: &str, stream: WasteStream) -> Option<String> {
    let pattern = match stream {
        WasteStream::Garbage => &*GARBAGE_PATTERN,
        WasteStream::Recycling => &*RECYCLING_PATTERN,
    };
    let captures = pattern.captures(body)?;
    let raw = captures.iter().skip(1).flatten().next()?.as_str();
    Some(collapse_nbsp(raw).trim().to_owned())
}

/// Replace `&nbsp;` style entities and U+00A0 with a plain space.
#[must_use]
pub fn collapse_nbsp(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&NBSP;", " ")
        .replace("&#160;", " ")
        .replace("&#xa0;", " ")
        .replace("&#xA0;", " ")
        .replace('\u{a0}', " ")
}
