// 💸 Offering Entity - a recorded spending event
//
// "The amount is a FACT (never changes), the description is a VALUE (can change)"
//
// Identity: UUID
// Immutable: amount, timestamp
// Mutable through OfferingPatch only: description, category, is_exorcised

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum description length after trimming
pub const MAX_DESCRIPTION_LEN: usize = 200;

// ============================================================================
// SIN CATEGORY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SinCategory {
    Gluttony,
    Vanity,
    Sloth,
    Greed,
    Lust,
    Wrath,
}

impl SinCategory {
    pub const ALL: [SinCategory; 6] = [
        SinCategory::Gluttony,
        SinCategory::Vanity,
        SinCategory::Sloth,
        SinCategory::Greed,
        SinCategory::Lust,
        SinCategory::Wrath,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SinCategory::Gluttony => "GLUTTONY",
            SinCategory::Vanity => "VANITY",
            SinCategory::Sloth => "SLOTH",
            SinCategory::Greed => "GREED",
            SinCategory::Lust => "LUST",
            SinCategory::Wrath => "WRATH",
        }
    }
}

impl fmt::Display for SinCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SinCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SinCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownVariant {
                kind: "category",
                value: s.to_string(),
            })
    }
}

// ============================================================================
// OFFERING DRAFT
// ============================================================================

/// Unvalidated input for a new offering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferingDraft {
    pub amount: i64,
    pub description: String,
    pub category: SinCategory,

    /// Unix milliseconds; None = now
    #[serde(default)]
    pub timestamp: Option<i64>,

    #[serde(default)]
    pub is_exorcised: bool,
}

impl OfferingDraft {
    pub fn new(amount: i64, description: &str, category: SinCategory) -> Self {
        OfferingDraft {
            amount,
            description: description.to_string(),
            category,
            timestamp: None,
            is_exorcised: false,
        }
    }

    pub fn at(mut self, timestamp_ms: i64) -> Self {
        self.timestamp = Some(timestamp_ms);
        self
    }

    pub fn exorcised(mut self) -> Self {
        self.is_exorcised = true;
        self
    }
}

// ============================================================================
// OFFERING
// ============================================================================

/// An immutable spending record. Fields are read through accessors only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offering {
    id: String,
    amount: i64,
    description: String,
    category: SinCategory,
    timestamp: i64,
    is_exorcised: bool,
}

impl Offering {
    /// Validate a draft and mint a new offering with a fresh UUID
    pub fn create(draft: OfferingDraft, now_ms: i64) -> Result<Self, ValidationError> {
        if draft.amount <= 0 {
            return Err(ValidationError::NonPositiveAmount(draft.amount));
        }

        let description = validate_description(&draft.description)?;

        let timestamp = draft.timestamp.unwrap_or(now_ms);
        if timestamp < 0 {
            return Err(ValidationError::NegativeTimestamp(timestamp));
        }

        Ok(Offering {
            id: uuid::Uuid::new_v4().to_string(),
            amount: draft.amount,
            description,
            category: draft.category,
            timestamp,
            is_exorcised: draft.is_exorcised,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Minor currency units (cents)
    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> SinCategory {
        self.category
    }

    /// Unix milliseconds
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn is_exorcised(&self) -> bool {
        self.is_exorcised
    }

    /// Build the next value of this offering. Identity, amount and timestamp carry over.
    pub fn apply(&self, patch: &OfferingPatch) -> Result<Offering, ValidationError> {
        let mut next = self.clone();

        if let Some(description) = &patch.description {
            next.description = validate_description(description)?;
        }
        if let Some(category) = patch.category {
            next.category = category;
        }
        if let Some(is_exorcised) = patch.is_exorcised {
            next.is_exorcised = is_exorcised;
        }

        Ok(next)
    }

    /// JSON projection used for audit snapshots
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn validate_description(description: &str) -> Result<String, ValidationError> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyDescription);
    }

    let len = trimmed.chars().count();
    if len > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::DescriptionTooLong {
            len,
            max: MAX_DESCRIPTION_LEN,
        });
    }

    Ok(trimmed.to_string())
}

// ============================================================================
// OFFERING PATCH
// ============================================================================

/// Controlled update: only these fields may change after creation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferingPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<SinCategory>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_exorcised: Option<bool>,

    /// Present only to be rejected: amount is permanently immutable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,

    /// Present only to be rejected: timestamp is permanently immutable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl OfferingPatch {
    pub fn exorcise() -> Self {
        OfferingPatch {
            is_exorcised: Some(true),
            ..Default::default()
        }
    }

    /// Name of the first immutable field the patch tries to touch
    pub fn immutable_violation(&self) -> Option<&'static str> {
        if self.amount.is_some() {
            Some("amount")
        } else if self.timestamp.is_some() {
            Some("timestamp")
        } else {
            None
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
