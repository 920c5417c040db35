//! Stock entity and its write-side draft

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::ValidationError;

/// Maximum length for stock names
const MAX_STOCK_NAME_LEN: usize = 255;

/// Stock record as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Stock {
    pub id: Uuid,
    pub name: String,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied stock values for insert and update.
///
/// Timestamps are accepted so the JSON body can mirror [`Stock`], but the
/// repository always overwrites them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDraft {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StockDraft {
    pub fn new(name: impl Into<String>, quantity: i64) -> Self {
        Self {
            name: name.into(),
            quantity,
            ..Self::default()
        }
    }
}

/// Validated stock name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StockName(String);

impl StockName {
    /// Create a stock name.
    ///
    /// # Rules
    /// - Not empty after trimming
    /// - Max 255 characters
    /// - Letters, digits, spaces, hyphens and underscores only
    ///
    /// # Example
    /// ```
    /// use stocks_server::models::StockName;
    ///
    /// assert!(StockName::new("widget").is_ok());
    /// assert!(StockName::new("  ").is_err());
    /// assert!(StockName::new("drop;table").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "name" });
        }

        if s.chars().count() > MAX_STOCK_NAME_LEN {
            return Err(ValidationError::TooLong {
                field: "name",
                max: MAX_STOCK_NAME_LEN,
            });
        }

        if !s
            .chars()
            .all(|c| c.is_alphanumeric() || c == ' ' || c == '-' || c == '_')
        {
            return Err(ValidationError::InvalidFormat {
                field: "name",
                reason: "must contain only letters, digits, spaces, hyphens or underscores",
            });
        }

        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for StockName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Parse a stock id from its textual form
pub fn parse_stock_id(raw: &str) -> Result<Uuid, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::Empty { field: "id" });
    }
    Uuid::parse_str(raw).map_err(|_| ValidationError::InvalidFormat {
        field: "id",
        reason: "invalid UUID format",
    })
}
