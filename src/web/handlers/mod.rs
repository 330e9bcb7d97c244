//! # Web API Request Handlers
//!
//! HTTP request handlers organized by functional area.

pub mod convert;
pub mod health;
pub mod metrics;
