//! # Converters
//!
//! The converter contract consumed by the pipeline, plus the three reference EU to US
//! converters (currency, address, date).
//!
//! Converters are stateless: the same instance is invoked concurrently from every worker.
//! The implementation is chosen once, at construction time, through [`ConverterKind`].

pub mod address;
pub mod currency;
pub mod date;
pub mod record;
pub mod traits;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::PipelineError;

pub use address::AddressConverter;
pub use currency::{format_us_amount, CurrencyConverter};
pub use date::DateConverter;
pub use record::{ConvertedRecord, Record};
pub use traits::Converter;

/// The converters this service ships with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConverterKind {
    Currency,
    Address,
    Date,
}

impl ConverterKind {
    pub const ALL: [ConverterKind; 3] = [
        ConverterKind::Currency,
        ConverterKind::Address,
        ConverterKind::Date,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConverterKind::Currency => "currency",
            ConverterKind::Address => "address",
            ConverterKind::Date => "date",
        }
    }

    /// Build the converter implementation for this kind
    pub fn build(&self) -> Arc<dyn Converter> {
        match self {
            ConverterKind::Currency => Arc::new(CurrencyConverter::new()),
            ConverterKind::Address => Arc::new(AddressConverter::new()),
            ConverterKind::Date => Arc::new(DateConverter::new()),
        }
    }
}

impl fmt::Display for ConverterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConverterKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "currency" => Ok(ConverterKind::Currency),
            "address" => Ok(ConverterKind::Address),
            "date" => Ok(ConverterKind::Date),
            other => Err(PipelineError::validation(format!(
                "unknown converter kind '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("currency".parse::<ConverterKind>().unwrap(), ConverterKind::Currency);
        assert_eq!(" Date ".parse::<ConverterKind>().unwrap(), ConverterKind::Date);
        assert!("weather".parse::<ConverterKind>().is_err());
    }

    #[test]
    fn test_build_selects_implementation() {
        for kind in ConverterKind::ALL {
            assert_eq!(kind.build().name(), kind.as_str());
        }
    }
}
