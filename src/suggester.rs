use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::models::Record;

/// A best-effort code hint from an auxiliary source.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub nominal_code: String,
    pub reason: String,
    pub confidence: f64,
}

/// Optional source of code hints for records no rule covers.
///
/// Implementations may be slow, paid, or non-deterministic; the classifier
/// only ever uses them to annotate a record for review, never to auto-code.
pub trait Suggester {
    /// Suggestions sorted by confidence, highest first. Empty when there is
    /// nothing useful to say.
    fn suggest(&self, record: &Record) -> Vec<Suggestion>;
}

const MAX_SUGGESTIONS: usize = 5;

// (keywords, code, reason, confidence)
const KEYWORD_FAMILIES: &[(&[&str], &str, &str, f64)] = &[
    (
        &["apple", "microsoft", "google", "software", "adobe", "dropbox", "zoom"],
        "7100",
        "IT/Software subscription",
        0.80,
    ),
    (
        &["hotel", "restaurant", "cafe", "food", "eat", "coffee", "lunch", "dinner"],
        "7400",
        "Travel & Subsistence",
        0.75,
    ),
    (
        &["parking", "fuel", "petrol", "diesel", "uber", "taxi", "car", "mot", "kwik fit"],
        "7500",
        "Motor expenses",
        0.75,
    ),
    (&["insurance", "admiral"], "7104", "Insurance", 0.85),
    (
        &["medical", "dental", "doctor", "pharma", "health", "clinic", "surgery"],
        "7200",
        "Medical/Healthcare",
        0.80,
    ),
    (
        &["professional", "membership", "gdc", "registration", "subscription", "accountant"],
        "7600",
        "Professional fees",
        0.75,
    ),
    (
        &["stationery", "office", "supplies", "paper", "printer", "ink"],
        "7300",
        "Office supplies",
        0.70,
    ),
    (&["amazon", "ebay", "purchase", "buy"], "5000", "Purchases", 0.65),
    (
        &["electric", "gas", "water", "broadband", "internet", "phone", "mobile"],
        "7200",
        "Utilities",
        0.75,
    ),
    (&["charges", "bank fee", "overdraft"], "7901", "Bank charges", 0.90),
];

const CAPEX_CODE: &str = "0030";
const CAPEX_CONFIDENCE: f64 = 0.50;

/// Keyword heuristics over vendor and details text.
pub struct KeywordSuggester {
    capex_threshold: Decimal,
}

impl Default for KeywordSuggester {
    fn default() -> Self {
        Self {
            capex_threshold: Decimal::new(500, 0),
        }
    }
}

impl Suggester for KeywordSuggester {
    fn suggest(&self, record: &Record) -> Vec<Suggestion> {
        let text = format!(
            "{} {}",
            record.vendor,
            record.details.as_deref().unwrap_or_default()
        )
        .to_lowercase();

        let mut found: Vec<Suggestion> = KEYWORD_FAMILIES
            .iter()
            .filter(|(keywords, ..)| keywords.iter().any(|k| text.contains(k)))
            .map(|(_, code, reason, confidence)| Suggestion {
                nominal_code: code.to_string(),
                reason: format!("{reason} (keyword match)"),
                confidence: *confidence,
            })
            .collect();

        if record.amount.value().abs() > self.capex_threshold {
            found.push(Suggestion {
                nominal_code: CAPEX_CODE.to_string(),
                reason: "Possible capital expenditure (high value)".to_string(),
                confidence: CAPEX_CONFIDENCE,
            });
        }

        dedupe_by_code(found)
    }
}

/// Keep the most confident suggestion per code, sorted descending.
fn dedupe_by_code(suggestions: Vec<Suggestion>) -> Vec<Suggestion> {
    let mut best: HashMap<String, Suggestion> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for s in suggestions {
        match best.get(&s.nominal_code) {
            Some(existing) if existing.confidence >= s.confidence => {}
            Some(_) => {
                best.insert(s.nominal_code.clone(), s);
            }
            None => {
                order.push(s.nominal_code.clone());
                best.insert(s.nominal_code.clone(), s);
            }
        }
    }
    let mut result: Vec<Suggestion> = order.into_iter().filter_map(|c| best.remove(&c)).collect();
    // Stable sort keeps first-seen order among equal confidences.
    result.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    result.truncate(MAX_SUGGESTIONS);
    result
}
