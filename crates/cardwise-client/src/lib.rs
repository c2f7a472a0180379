//! Cardwise Client SDK.
//!
//! This crate provides a client library for services to interact with the
//! cardwise API.
//!
//! # Example
//!
//! ```no_run
//! use cardwise_client::CardwiseClient;
//! use chrono::Utc;
//!
//! # async fn example() -> Result<(), cardwise_client::ClientError> {
//! let client = CardwiseClient::new(
//!     "http://cardwise.card-system.svc:8080",
//!     "your-service-api-key",
//! )?;
//!
//! // Deliver a payment notification
//! let result = client
//!     .notify_expense(
//!         "7e0b6f64-2f3a-4b1e-9a56-5b3f8e0d9c11",
//!         "스타벅스에서 4,500원 결제",
//!         Utc::now(),
//!     )
//!     .await?;
//!
//! println!("recorded expense {} at {}", result.expense_id, result.place);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{CardwiseClient, ClientOptions};
pub use error::ClientError;
pub use types::*;
