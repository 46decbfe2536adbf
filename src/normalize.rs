//! Text normalisation: the gate between raw caller input and the model.
//!
//! Collapses whitespace, expands common written abbreviations into their
//! spoken form, enforces length limits and estimates how long the result
//! takes to say.  Everything here is pure: no I/O, no shared state.
//!
//! Absent input (`None`) is accepted everywhere and behaves like `""`.

use fancy_regex::{NoExpand, Regex as FancyRegex};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::warn;

/// Default upper bound on input length, in characters.
pub const DEFAULT_MAX_LENGTH: usize = 2_000;

/// Default lower bound on input length, in characters.
pub const DEFAULT_MIN_LENGTH: usize = 3;

/// Default speaking rate used by [`estimate_duration`].
pub const DEFAULT_WORDS_PER_MINUTE: u32 = 150;

/// A truncation only backs off to a word boundary inside this last share of
/// the budget.
const WORD_BOUNDARY_FLOOR: f64 = 0.8;

// ─────────────────────────────────────────────────────────────────────────────
// Abbreviation table
// ─────────────────────────────────────────────────────────────────────────────

const ABBREVIATIONS: &[(&str, &str)] = &[
    ("Dr.", "Doctor"),
    ("Mr.", "Mister"),
    ("Mrs.", "Missus"),
    ("Ms.", "Miss"),
    ("Prof.", "Professor"),
    ("e.g.", "for example"),
    ("i.e.", "that is"),
    ("etc.", "etcetera"),
    ("vs.", "versus"),
    ("v.", "versus"),
    ("vs", "versus"),
    ("v", "versus"),
    ("approx.", "approximately"),
    ("min.", "minimum"),
    ("max.", "maximum"),
    ("No.", "Number"),
    ("no.", "number"),
    ("St.", "Street"),
    ("Ave.", "Avenue"),
    ("Blvd.", "Boulevard"),
    ("Rd.", "Road"),
    ("Ltd.", "Limited"),
    ("Inc.", "Incorporated"),
    ("Corp.", "Corporation"),
    ("Co.", "Company"),
    ("Jan.", "January"),
    ("Feb.", "February"),
    ("Mar.", "March"),
    ("Apr.", "April"),
    ("Aug.", "August"),
    ("Sep.", "September"),
    ("Sept.", "September"),
    ("Oct.", "October"),
    ("Nov.", "November"),
    ("Dec.", "December"),
];

/// Compiled substitution list, longest abbreviation first.
///
/// The sort is stable, so abbreviations of equal length keep table order.
static ABBREVIATION_RULES: Lazy<Vec<(FancyRegex, &'static str)>> = Lazy::new(|| {
    let mut table: Vec<(&str, &str)> = ABBREVIATIONS.to_vec();
    table.sort_by_key(|(abbrev, _)| std::cmp::Reverse(abbrev.chars().count()));
    table
        .into_iter()
        .map(|(abbrev, expansion)| {
            let escaped = fancy_regex::escape(abbrev);
            // A trailing period is not a word character, so `\b` after it
            // would demand a following letter.  Look-around instead.
            let pattern = if abbrev.ends_with('.') {
                format!(r"(?<!\w){}(?!\w)", escaped)
            } else {
                format!(r"\b{}\b", escaped)
            };
            (FancyRegex::new(&pattern).unwrap(), expansion)
        })
        .collect()
});

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

// ─────────────────────────────────────────────────────────────────────────────
// Validation errors
// ─────────────────────────────────────────────────────────────────────────────

/// Why a piece of text was rejected.  The `Display` form is the
/// human-readable reason handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Text cannot be empty")]
    Empty,

    #[error("Text is too short (minimum {min} characters)")]
    TooShort { min: usize },

    #[error("Text is too long (maximum {max} characters, got {actual})")]
    TooLong { max: usize, actual: usize },
}

// ─────────────────────────────────────────────────────────────────────────────
// Free functions
// ─────────────────────────────────────────────────────────────────────────────

/// Collapse every whitespace run to a single space and trim both ends.
pub fn clean<'a>(text: impl Into<Option<&'a str>>) -> String {
    match text.into() {
        Some(text) => RE_WHITESPACE.replace_all(text.trim(), " ").into_owned(),
        None => String::new(),
    }
}

/// Replace known abbreviations ("Dr.", "e.g.", "vs", …) with full words.
pub fn expand_abbreviations(text: &str) -> String {
    let mut text = text.to_string();
    if text.is_empty() {
        return text;
    }
    for (pattern, expansion) in ABBREVIATION_RULES.iter() {
        text = pattern.replace_all(&text, NoExpand(*expansion)).into_owned();
    }
    text
}

/// Check that `text` is non-empty and, once cleaned, within
/// `min_length..=max_length` characters.  The input itself is left untouched.
pub fn validate<'a>(
    text: impl Into<Option<&'a str>>,
    max_length: usize,
    min_length: usize,
) -> Result<(), ValidationError> {
    let cleaned = clean(text);
    if cleaned.is_empty() {
        return Err(ValidationError::Empty);
    }
    let actual = cleaned.chars().count();
    if actual < min_length {
        return Err(ValidationError::TooShort { min: min_length });
    }
    if actual > max_length {
        return Err(ValidationError::TooLong { max: max_length, actual });
    }
    Ok(())
}

/// Full pipeline: clean → expand abbreviations → clean → truncate.
///
/// The result never exceeds `max_length` characters.  When it has to be cut,
/// the cut moves back to the last space if that keeps at least 80 % of the
/// budget.
pub fn preprocess<'a>(text: impl Into<Option<&'a str>>, max_length: usize) -> String {
    let text = clean(text);
    if text.is_empty() {
        return text;
    }
    let text = clean(expand_abbreviations(&text).as_str());
    truncate(text, max_length)
}

fn truncate(text: String, max_length: usize) -> String {
    let original_len = text.chars().count();
    if original_len <= max_length {
        return text;
    }

    let hard_cut = text
        .char_indices()
        .nth(max_length)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    let truncated = &text[..hard_cut];

    let result = match truncated.rfind(' ') {
        Some(space) if truncated[..space].chars().count() as f64
            >= max_length as f64 * WORD_BOUNDARY_FLOOR =>
        {
            &truncated[..space]
        }
        _ => truncated,
    };

    warn!(
        from = original_len,
        to = result.chars().count(),
        "text truncated to fit the length limit"
    );
    result.to_string()
}

/// Estimated speaking time in seconds: `words / words_per_minute * 60`.
pub fn estimate_duration<'a>(text: impl Into<Option<&'a str>>, words_per_minute: u32) -> f64 {
    if words_per_minute == 0 {
        return 0.0;
    }
    let cleaned = clean(text);
    if cleaned.is_empty() {
        return 0.0;
    }
    let words = cleaned.split(' ').count();
    (words as f64 / words_per_minute as f64) * 60.0
}

// ─────────────────────────────────────────────────────────────────────────────
// TextNormalizer: configured pipeline
// ─────────────────────────────────────────────────────────────────────────────

/// Limits applied by a [`TextNormalizer`].
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizerConfig {
    pub max_length: usize,
    pub min_length: usize,
    pub words_per_minute: u32,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            min_length: DEFAULT_MIN_LENGTH,
            words_per_minute: DEFAULT_WORDS_PER_MINUTE,
        }
    }
}

/// The free functions above, bound to one set of limits.
#[derive(Debug, Clone, Default)]
pub struct TextNormalizer {
    pub config: NormalizerConfig,
}

impl TextNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn validate<'a>(&self, text: impl Into<Option<&'a str>>) -> Result<(), ValidationError> {
        validate(text, self.config.max_length, self.config.min_length)
    }

    pub fn preprocess<'a>(&self, text: impl Into<Option<&'a str>>) -> String {
        preprocess(text, self.config.max_length)
    }

    pub fn estimate_duration<'a>(&self, text: impl Into<Option<&'a str>>) -> f64 {
        estimate_duration(text, self.config.words_per_minute)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
