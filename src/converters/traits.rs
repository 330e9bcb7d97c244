//! Converter capability trait.

use async_trait::async_trait;
use std::fmt::Debug;

use super::record::{ConvertedRecord, Record};
use crate::error::PipelineResult;

/// A stateless EU to US record converter.
///
/// `validate` is a cheap shape check run by the orchestrator before any cache, breaker or
/// pool work; `convert` runs on a pool worker and may be invoked concurrently.
#[async_trait]
pub trait Converter: Send + Sync + Debug {
    /// Stable name, used in cache keys, logs and metrics
    fn name(&self) -> &str;

    /// Reject records that cannot be converted, with a `Validation` error
    fn validate(&self, record: &Record) -> PipelineResult<()>;

    /// Convert one record
    async fn convert(&self, record: Record) -> PipelineResult<ConvertedRecord>;
}
