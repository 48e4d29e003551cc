//! Redundancy filtering for error messages and their causes.
//!
//! A failure is reported as a primary message plus an optional cause. Upstream
//! services frequently restate the primary message in the cause (for example
//! `Socket API Request failed (400): Bad Request` with cause `Bad Request`),
//! which reads as noise. The helpers here decide whether a cause adds new
//! information or can be dropped.
//!
//! Two checks are applied after normalizing both strings into lowercase words:
//!
//! 1. Jaccard similarity of the word sets against a threshold.
//! 2. An exact word-sequence match against any colon-delimited segment of the
//!    primary message.
//!
//! Guidance-style causes (multi-line, arrow-prefixed advice) share few words
//! with a short primary message and therefore survive both checks.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

/// Default similarity at or above which a cause is considered redundant.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.6;

/// Splits on anything that is not an ASCII word character.
#[allow(clippy::expect_used)]
static NON_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z0-9_]+").expect("non-word regex is valid") // Static pattern, safe to panic
});

/// Lowercases `text` and splits it into non-empty words, preserving order.
fn words(text: &str) -> Vec<String> {
    NON_WORD
        .split(&text.to_lowercase())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalizes `text` into its set of lowercase words.
#[must_use]
pub fn normalize_words(text: &str) -> HashSet<String> {
    words(text).into_iter().collect()
}

/// Computes the Jaccard similarity of the word sets of `a` and `b`.
///
/// Two texts without any words are identical (`1.0`); a text without words
/// compared to one with words shares nothing (`0.0`).
///
/// ```
/// use socket_sdk::summarize::calculate_word_set_similarity;
///
/// assert_eq!(calculate_word_set_similarity("Bad Request", "bad-request!"), 1.0);
/// assert_eq!(calculate_word_set_similarity("alpha beta", "gamma delta"), 0.0);
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn calculate_word_set_similarity(a: &str, b: &str) -> f64 {
    let left = normalize_words(a);
    let right = normalize_words(b);

    match (left.is_empty(), right.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        (false, false) => {}
    }

    let intersection = left.intersection(&right).count();
    let union = left.union(&right).count();
    intersection as f64 / union as f64
}

/// Returns true when `reason` restates a colon-delimited segment of `primary`.
fn matches_primary_segment(primary: &str, reason: &str) -> bool {
    let reason_words = words(reason);
    if reason_words.is_empty() {
        return false;
    }
    primary
        .split(':')
        .any(|segment| words(segment) == reason_words)
}

/// Decides whether `reason` should be left out when reporting `primary`.
///
/// A reason is omitted when it is blank, when its word-set similarity to the
/// primary message reaches `threshold`, or when it repeats one of the
/// colon-delimited segments of the primary message word for word.
#[must_use]
pub fn should_omit_reason(primary: &str, reason: Option<&str>, threshold: f64) -> bool {
    let Some(reason) = reason else {
        return true;
    };
    if reason.trim().is_empty() {
        return true;
    }

    let similarity = calculate_word_set_similarity(primary, reason);
    if similarity >= threshold {
        trace!(similarity, threshold, "reason is a near-duplicate of the message");
        return true;
    }

    if matches_primary_segment(primary, reason) {
        trace!("reason repeats a segment of the message");
        return true;
    }

    false
}

/// Returns `cause` unless it only restates `primary`.
///
/// ```
/// use socket_sdk::summarize::{DEFAULT_SIMILARITY_THRESHOLD, filter_redundant_cause};
///
/// let primary = "Socket API Request failed (400): Bad Request";
/// assert_eq!(filter_redundant_cause(primary, Some("Bad Request"), DEFAULT_SIMILARITY_THRESHOLD), None);
///
/// let cause = "Rate limit exceeded. Try again later.";
/// assert_eq!(
///     filter_redundant_cause("Request failed", Some(cause), DEFAULT_SIMILARITY_THRESHOLD),
///     Some(cause)
/// );
/// ```
#[must_use]
pub fn filter_redundant_cause<'a>(
    primary: &str,
    cause: Option<&'a str>,
    threshold: f64,
) -> Option<&'a str> {
    if should_omit_reason(primary, cause, threshold) {
        None
    } else {
        cause
    }
}
