//! Core types and pure logic for cardwise.
//!
//! This crate holds the domain model shared by the store, service, and
//! client crates:
//!
//! - **Identifiers**: `UserId`, `CardId`, `ExpenseId`, `UsageId`
//! - **Catalog**: `Card`, `Benefit`, `BenefitTerms`, `BenefitKind`, `Channel`
//! - **Expenses**: `Expense`, `ParsedExpense`, the notification parser
//! - **Ledgers**: `CardPerformance`, `BenefitUsage`, `Accrual`
//! - **Matching**: benefit applicability and per-kind reward computation
//!
//! # Amounts
//!
//! All monetary values are integer won stored as `i64`; rate-based rewards
//! are floored to the won consistently across every benefit kind.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod card;
pub mod expense;
pub mod ids;
pub mod ledger;
pub mod matcher;

pub use card::{Benefit, BenefitKind, BenefitTerms, Card, Channel, UserCard};
pub use expense::{
    ingest_fingerprint, parse_notification, Expense, ParseError, ParsedExpense, UNKNOWN_PLACE,
};
pub use ids::{CardId, ExpenseId, IdError, UsageId, UserId};
pub use ledger::{Accrual, BenefitUsage, CardPerformance};
pub use matcher::{
    card_kind_reward, is_applicable, kind_reward, list_benefit_info, term_reward, BenefitInfo,
};
