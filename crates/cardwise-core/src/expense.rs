//! Expense records and push-notification parsing.
//!
//! Card transactions arrive as free-form push-notification text such as
//! `"스타벅스에서 12,000원 결제되었습니다"`. The parser extracts the place
//! (`<place>에서`) and the amount (`<digits,>원`) and degrades to defaults
//! when either token is missing: downstream accrual still runs on a
//! partially parsed expense. Only blank input or an unparseable amount
//! fails the whole call.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::{ExpenseId, UserId};

/// Sentinel place used when the notification text carries no place token.
pub const UNKNOWN_PLACE: &str = "알 수 없는 장소";

fn place_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"([0-9A-Za-z가-힣][0-9A-Za-z가-힣 ]*)에서").expect("hardcoded pattern")
    })
}

fn amount_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"([0-9][0-9,]*)원").expect("hardcoded pattern"))
}

/// Errors raised when a notification cannot be parsed at all.
///
/// Partial matches are not errors; see [`parse_notification`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The notification text was empty or whitespace-only.
    #[error("empty notification text")]
    EmptyText,

    /// An amount token was present but did not fit an integer amount.
    #[error("unparseable amount token: {0}")]
    InvalidAmount(String),
}

/// The structured result of parsing a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedExpense {
    /// Extracted place, or [`UNKNOWN_PLACE`].
    pub place: String,

    /// Extracted amount in won, or 0.
    pub amount: i64,

    /// The notification text the fields were extracted from.
    pub original_text: String,
}

/// Parse a push-notification text into a [`ParsedExpense`].
///
/// A missing place token degrades to [`UNKNOWN_PLACE`] and a missing amount
/// token degrades to 0 so that the pipeline still records the expense.
///
/// # Errors
///
/// - [`ParseError::EmptyText`] if `text` is blank.
/// - [`ParseError::InvalidAmount`] if an amount token matched but its digits
///   do not fit an `i64` once the thousands separators are stripped.
pub fn parse_notification(text: &str) -> Result<ParsedExpense, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::EmptyText);
    }

    let place = place_pattern()
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or_else(|| UNKNOWN_PLACE.to_string(), |m| m.as_str().trim().to_string());

    let amount = match amount_pattern().captures(text).and_then(|c| c.get(1)) {
        Some(m) => {
            let digits = m.as_str().replace(',', "");
            digits
                .parse::<i64>()
                .map_err(|_| ParseError::InvalidAmount(m.as_str().to_string()))?
        }
        None => 0,
    };

    Ok(ParsedExpense {
        place,
        amount,
        original_text: text.to_string(),
    })
}

/// An immutable record of a detected card transaction.
///
/// Created once by the ingestion pipeline, before any accrual runs, and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    /// Row identifier (ULID, time-ordered).
    pub id: ExpenseId,

    /// The user the transaction belongs to.
    pub user_id: UserId,

    /// Place the transaction occurred at.
    pub place: String,

    /// Transaction amount in won.
    pub amount: i64,

    /// The raw notification text the record was parsed from.
    pub original_text: String,

    /// Timestamp the notification was posted at.
    pub posted_at: DateTime<Utc>,

    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl Expense {
    /// Build an expense from a parsed notification.
    #[must_use]
    pub fn from_parsed(user_id: UserId, parsed: ParsedExpense, posted_at: DateTime<Utc>) -> Self {
        Self {
            id: ExpenseId::generate(),
            user_id,
            place: parsed.place,
            amount: parsed.amount,
            original_text: parsed.original_text,
            posted_at,
            created_at: Utc::now(),
        }
    }

    /// The external dedup fingerprint of this expense's notification.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        ingest_fingerprint(&self.original_text, self.posted_at)
    }
}

/// The dedup key for a notification delivery: `(text, posted timestamp)`.
///
/// Retransmissions of the same notification carry the same fingerprint, which
/// scopes the ingestion lock and the idempotency index.
#[must_use]
pub fn ingest_fingerprint(text: &str, posted_at: DateTime<Utc>) -> String {
    format!("{}:{}", posted_at.timestamp_millis(), text)
}
