//! Lenient parsing of the pickup date text printed by the city page.

use chrono::NaiveDate;

use curbside_core::ports::DateParseError;

use crate::extract::collapse_nbsp;

// Tried in order after the weekday has been dropped.
const DATE_FORMATS: [&str; 5] = ["%B %d, %Y", "%B %d %Y", "%d %B %Y", "%m/%d/%Y", "%Y-%m-%d"];

const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// Parse text like `Tuesday April 9, 2025` into a date.
///
/// The weekday is optional and not checked against the date. Abbreviated names,
/// ordinal suffixes, a missing comma, `MM/DD/YYYY` and ISO dates are accepted.
/// Dates in the past are returned as given.
///
/// # Errors
///
/// Returns [`DateParseError::Missing`] for blank text and
/// [`DateParseError::Unrecognized`] when no layout matches.
pub fn parse_pickup_date(text: &str) -> Result<NaiveDate, DateParseError> {
    let tokens = normalize(text);
    if tokens.is_empty() {
        return Err(DateParseError::Missing);
    }

    let date_part = strip_weekday(&tokens).join(" ");
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&date_part, format).ok())
        .ok_or_else(|| DateParseError::Unrecognized(text.trim().to_owned()))
}

// Whitespace-split tokens with commas detached from their neighbours, trailing
// periods dropped from words, and ordinal suffixes removed from numbers.
fn normalize(text: &str) -> Vec<String> {
    collapse_nbsp(text)
        .replace(',', ", ")
        .split_whitespace()
        .map(|token| {
            let (core, comma) = token
                .strip_suffix(',')
                .map_or((token, ""), |core| (core, ","));
            let core = core.trim_end_matches('.');
            format!("{}{comma}", strip_ordinal(core))
        })
        .filter(|token| token != ",")
        .collect()
}

fn strip_ordinal(token: &str) -> &str {
    let digits = token.trim_end_matches(|ch: char| ch.is_ascii_alphabetic());
    let suffix = token.strip_prefix(digits).unwrap_or_default();
    let is_ordinal = !digits.is_empty()
        && digits.chars().all(|ch| ch.is_ascii_digit())
        && matches!(
            suffix.to_ascii_lowercase().as_str(),
            "st" | "nd" | "rd" | "th"
        );
    if is_ordinal { digits } else { token }
}

fn strip_weekday(tokens: &[String]) -> &[String] {
    match tokens.split_first() {
        Some((first, rest)) if is_weekday(first.trim_end_matches(',')) => rest,
        _ => tokens,
    }
}

// Full names and prefixes of at least three letters ("Tue", "Thurs").
fn is_weekday(word: &str) -> bool {
    let word = word.to_ascii_lowercase();
    word.len() >= 3 && WEEKDAYS.iter().any(|day| day.starts_with(word.as_str()))
}
