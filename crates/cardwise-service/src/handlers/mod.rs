//! HTTP request handlers.

pub mod cards;
pub mod catalog;
pub mod expenses;
pub mod health;
