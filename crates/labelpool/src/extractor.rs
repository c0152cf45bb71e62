//! Field extraction from the text of a single shipping label page.
//!
//! Fixed heuristics only: a tracking number is three groups of four digits,
//! an order reference follows a `REF` marker, a recipient name follows `TO`
//! and stops at the first address-like token.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static RE_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)REF[\s:\x{FF1A}-]*([0-9]+)\b").unwrap());

// First qualifying run wins; a longer digit run yields its leading twelve.
static RE_TRACKING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})\s*(\d{4})\s*(\d{4})").unwrap());

static RE_RECIPIENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bTO\s+([A-Z][A-Z\s]{2,40}?)\s+(?:FLAT|APT|APARTMENT|\d{1,4}|HOUSE|UNIT|NO\.?|BUILDING)\b",
    )
    .unwrap()
});

static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const TRACKING_WEIGHT: u8 = 50;
const REFERENCE_WEIGHT: u8 = 40;
const RECIPIENT_WEIGHT: u8 = 10;

/// Minimum confidence for a page to pass triage.
pub const MIN_VALID_CONFIDENCE: u8 = 50;

/// Fields found on one label page. Empty strings mean "not found".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelInfo {
    pub tracking_number: String,
    pub order_reference: String,
    pub recipient_name: Option<String>,
    pub confidence: u8,
}

impl LabelInfo {
    /// Whether the page can be enrolled in the pool.
    pub fn is_usable(&self) -> bool {
        !self.tracking_number.trim().is_empty() && !self.order_reference.trim().is_empty()
    }
}

/// Triage verdict for a page. Advisory only; enrollment uses
/// [`LabelInfo::is_usable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionValidation {
    pub is_valid: bool,
    pub missing_fields: Vec<&'static str>,
}

pub fn extract_label_info(text: &str) -> LabelInfo {
    let reference = RE_REFERENCE.captures(text);
    let order_reference = reference
        .as_ref()
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    // The reference digits are blanked so they cannot leak into a tracking
    // number that follows them.
    let tracking_number = match reference.and_then(|c| c.get(0)) {
        Some(span) => {
            let mut masked = String::with_capacity(text.len());
            masked.push_str(&text[..span.start()]);
            masked.push(' ');
            masked.push_str(&text[span.end()..]);
            extract_tracking_number(&masked)
        }
        None => extract_tracking_number(text),
    };

    let recipient_name = extract_recipient_name(text);

    let mut info = LabelInfo {
        tracking_number,
        order_reference,
        recipient_name,
        confidence: 0,
    };
    info.confidence = confidence(&info);
    info
}

fn extract_tracking_number(text: &str) -> String {
    RE_TRACKING
        .captures(text)
        .map(|c| format!("{}{}{}", &c[1], &c[2], &c[3]))
        .unwrap_or_default()
}

fn extract_recipient_name(text: &str) -> Option<String> {
    let normalized = RE_WHITESPACE.replace_all(text.trim(), " ");
    RE_RECIPIENT
        .captures(&normalized)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Additive score capped at 100.
pub fn confidence(info: &LabelInfo) -> u8 {
    let mut score: u8 = 0;
    if !info.tracking_number.is_empty() {
        score += TRACKING_WEIGHT;
    }
    if !info.order_reference.is_empty() {
        score += REFERENCE_WEIGHT;
    }
    if info.recipient_name.as_deref().is_some_and(|n| !n.is_empty()) {
        score += RECIPIENT_WEIGHT;
    }
    score.min(100)
}

pub fn validate_extracted(info: &LabelInfo) -> ExtractionValidation {
    let mut missing_fields = Vec::new();
    if info.tracking_number.trim().is_empty() {
        missing_fields.push("trackingNumber");
    }
    if info.order_reference.trim().is_empty() {
        missing_fields.push("orderReference");
    }
    ExtractionValidation {
        is_valid: missing_fields.is_empty() && info.confidence >= MIN_VALID_CONFIDENCE,
        missing_fields,
    }
}
