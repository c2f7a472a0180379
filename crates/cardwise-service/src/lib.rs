//! Cardwise HTTP API Service.
//!
//! This crate provides the HTTP API for the cardwise service, including:
//!
//! - Card catalog sync and user card registration
//! - Expense notification ingestion and history
//! - The lease-coordinated accrual pipeline (performance and benefit usage)
//! - The real-time card eligibility filter
//!
//! # Authentication
//!
//! All `/v1` routes authenticate service-to-service callers with a shared
//! API key (`X-API-Key`).

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers need async for routing consistency

pub mod auth;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use eligibility::{EligibilityFilter, EligibilityQuery, EligibleCard};
pub use error::ApiError;
pub use pipeline::{CardOutcome, CardStage, ExpensePipeline, IngestOutcome, KindOutcome};
pub use routes::create_router;
pub use state::AppState;
