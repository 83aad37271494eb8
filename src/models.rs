use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::{NominalError, Result};

/// Which feed a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// Pre-labeled bookkeeping export, treated as ground truth.
    History,
    /// Bank statement line awaiting a nominal code.
    Bank,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::History => "history",
            Self::Bank => "bank",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "history" => Some(Self::History),
            "bank" => Some(Self::Bank),
            _ => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleType {
    Exact,
    Fuzzy,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fuzzy => "fuzzy",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "exact" => Some(Self::Exact),
            "fuzzy" => Some(Self::Fuzzy),
            _ => None,
        }
    }
}

/// Who created a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOrigin {
    Learner,
    Reviewer,
}

impl RuleOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Learner => "learner",
            Self::Reviewer => "reviewer",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "learner" => Some(Self::Learner),
            "reviewer" => Some(Self::Reviewer),
            _ => None,
        }
    }
}

/// Provenance of a record's current label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignedBy {
    Learner,
    Classifier,
    Reviewer,
    Override,
    Manual,
}

impl AssignedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Learner => "learner",
            Self::Classifier => "classifier",
            Self::Reviewer => "reviewer",
            Self::Override => "override",
            Self::Manual => "manual",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "learner" => Some(Self::Learner),
            "classifier" => Some(Self::Classifier),
            "reviewer" => Some(Self::Reviewer),
            "override" => Some(Self::Override),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// A signed, non-zero money amount with exactly two fractional digits,
/// held as whole cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i64);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        let value = value.round_dp(2);
        if value.is_zero() {
            return Err(NominalError::InvalidRecord("amount cannot be zero".into()));
        }
        let cents = value
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|c| c.to_i64())
            .ok_or_else(|| NominalError::InvalidRecord(format!("amount {value} is out of range")))?;
        Ok(Amount(cents))
    }

    pub fn from_cents(cents: i64) -> Result<Self> {
        Self::new(Decimal::new(cents, 2))
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    /// Magnitude in cents. Feeds disagree on debit sign, so joins use this.
    pub fn abs_cents(self) -> i64 {
        self.0.saturating_abs()
    }

    pub fn value(self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.value())
    }
}

/// A score in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Confidence(f64);

impl Confidence {
    pub const MAX: Confidence = Confidence(1.0);

    pub fn new(value: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&value) {
            return Err(NominalError::InvalidRule(format!(
                "confidence {value} outside [0, 1]"
            )));
        }
        Ok(Confidence(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Rounded to two decimal places, the precision rules are stored at.
    pub fn round2(self) -> Self {
        Confidence((self.0 * 100.0).round() / 100.0)
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: i64,
    pub date: NaiveDate,
    pub vendor: String,
    pub amount: Amount,
    pub nominal_code: Option<String>,
    /// Best guess that failed the auto-code bar; never exported.
    pub suggested_code: Option<String>,
    pub reference: Option<String>,
    pub details: Option<String>,
    pub source: Source,
    pub confidence: Option<Confidence>,
    pub explanation: Option<String>,
    pub reviewed: bool,
    pub assigned_by: Option<AssignedBy>,
}

impl Record {
    pub fn is_labeled(&self) -> bool {
        self.nominal_code.is_some()
    }
}

/// Intermediate representation from ingestion before the store assigns an id.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub date: NaiveDate,
    pub vendor: String,
    pub amount: Amount,
    pub nominal_code: Option<String>,
    pub reference: Option<String>,
    pub details: Option<String>,
    pub source: Source,
}

impl NewRecord {
    pub fn new(date: NaiveDate, vendor: &str, amount: Amount, source: Source) -> Result<Self> {
        let vendor = vendor.trim();
        if vendor.is_empty() {
            return Err(NominalError::InvalidRecord("vendor cannot be empty".into()));
        }
        Ok(Self {
            date,
            vendor: vendor.to_string(),
            amount,
            nominal_code: None,
            reference: None,
            details: None,
            source,
        })
    }

    pub fn with_code(mut self, code: Option<&str>) -> Self {
        self.nominal_code = code
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        self
    }
}

/// The label fields written back onto a record by classification or review.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordLabel {
    pub nominal_code: Option<String>,
    pub suggested_code: Option<String>,
    pub confidence: Option<Confidence>,
    pub explanation: Option<String>,
    pub reviewed: bool,
    pub assigned_by: Option<AssignedBy>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub id: i64,
    pub vendor_pattern: String,
    pub nominal_code: String,
    pub rule_type: RuleType,
    pub confidence: Confidence,
    pub match_count: i64,
    pub created_by: RuleOrigin,
    pub last_used: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRule {
    pub vendor_pattern: String,
    pub nominal_code: String,
    pub rule_type: RuleType,
    pub confidence: Confidence,
    pub match_count: i64,
    pub created_by: RuleOrigin,
}

impl NewRule {
    pub fn new(
        vendor_pattern: &str,
        nominal_code: &str,
        rule_type: RuleType,
        confidence: Confidence,
        created_by: RuleOrigin,
    ) -> Result<Self> {
        if vendor_pattern.trim().is_empty() {
            return Err(NominalError::InvalidRule("vendor pattern cannot be empty".into()));
        }
        if nominal_code.trim().is_empty() {
            return Err(NominalError::InvalidRule("nominal code cannot be empty".into()));
        }
        Ok(Self {
            vendor_pattern: vendor_pattern.to_string(),
            nominal_code: nominal_code.trim().to_string(),
            rule_type,
            confidence,
            match_count: 0,
            created_by,
        })
    }

    pub fn with_match_count(mut self, count: i64) -> Self {
        self.match_count = count.max(0);
        self
    }
}

/// Audit entry for a human correction. Append-only.
#[derive(Debug, Clone, PartialEq)]
pub struct Override {
    pub transaction_id: i64,
    pub original_code: Option<String>,
    pub corrected_code: String,
    pub created_rule_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_rejects_zero() {
        assert!(Amount::new(Decimal::ZERO).is_err());
        assert!(Amount::new(Decimal::new(1, 3)).is_err(), "0.001 rounds to zero");
    }

    #[test]
    fn test_amount_cents() {
        let a = Amount::new(Decimal::new(-1250, 2)).unwrap();
        assert_eq!(a.cents(), -1250);
        assert_eq!(a.abs_cents(), 1250);
        assert!(a.is_negative());
        assert_eq!(a.to_string(), "-12.50");
    }

    #[test]
    fn test_amount_out_of_range() {
        let huge: Decimal = "100000000000000000.00".parse().unwrap();
        assert!(Amount::new(huge).is_err());
        let largest = Amount::from_cents(i64::MAX).unwrap();
        assert_eq!(largest.cents(), i64::MAX);
        assert_eq!(Amount::from_cents(i64::MIN).unwrap().abs_cents(), i64::MAX);
    }

    #[test]
    fn test_confidence_bounds() {
        assert!(Confidence::new(-0.01).is_err());
        assert!(Confidence::new(1.01).is_err());
        assert!(Confidence::new(f64::NAN).is_err());
        assert_eq!(Confidence::new(2.0 / 3.0).unwrap().round2().value(), 0.67);
    }

    #[test]
    fn test_new_record_rejects_blank_vendor() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let amount = Amount::from_cents(100).unwrap();
        assert!(NewRecord::new(date, "   ", amount, Source::Bank).is_err());
        let rec = NewRecord::new(date, " ACME ", amount, Source::History)
            .unwrap()
            .with_code(Some(" "));
        assert_eq!(rec.vendor, "ACME");
        assert_eq!(rec.nominal_code, None);
    }

    #[test]
    fn test_enum_roundtrip() {
        for s in ["history", "bank"] {
            assert_eq!(Source::parse(s).unwrap().as_str(), s);
        }
        for s in ["learner", "classifier", "reviewer", "override", "manual"] {
            assert_eq!(AssignedBy::parse(s).unwrap().as_str(), s);
        }
        assert_eq!(RuleType::parse("regex"), None);
    }
}
