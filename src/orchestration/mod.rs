//! # Orchestration
//!
//! [`PipelineOrchestrator`] wires one converter to the shared cache, worker pool and
//! metrics plus its own circuit breaker.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use conversion_core::converters::{ConverterKind, Record};
//! use conversion_core::orchestration::PipelineOrchestrator;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = PipelineOrchestrator::builder(ConverterKind::Currency.build()).build()?;
//!
//! let record = Record::from_value(json!({"id": "t1", "amount": 100, "from": "EUR", "to": "USD"}))?;
//! let converted = orchestrator.process_record(record).await?;
//! println!("{}", converted.output["formatted"]);
//!
//! orchestrator.cleanup().await;
//! # Ok(())
//! # }
//! ```

pub mod orchestrator;

pub use orchestrator::{
    render_pipeline_metrics, OrchestratorHealth, PipelineOrchestrator,
    PipelineOrchestratorBuilder, DEFAULT_REQUEST_TIMEOUT,
};
