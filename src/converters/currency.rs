//! EUR-based currency conversion with US number formatting.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::record::{ConvertedRecord, Record};
use super::traits::Converter;
use crate::error::{PipelineError, PipelineResult};

/// Units of each currency per 1 EUR
const RATES: &[(&str, f64, &str)] = &[
    ("EUR", 1.0, "€"),
    ("USD", 1.08, "$"),
    ("GBP", 0.86, "£"),
    ("CHF", 0.97, "CHF "),
    ("CAD", 1.47, "CA$"),
    ("JPY", 162.0, "¥"),
];

/// Largest accepted absolute amount. Converted at the widest rate spread it still maps to a
/// whole number of cents that `f64` represents exactly.
pub const MAX_AMOUNT: f64 = 100_000_000_000.0;

fn lookup(code: &str) -> Option<(f64, &'static str)> {
    RATES
        .iter()
        .find(|(c, _, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, rate, symbol)| (*rate, *symbol))
}

/// Format an amount the US way: thousands separated by commas, two decimals, sign before
/// the symbol (`-$1,080.50`).
pub fn format_us_amount(amount: f64, symbol: &str) -> String {
    let cents = (amount * 100.0).round() as i64;
    let negative = cents < 0;
    let cents = cents.unsigned_abs();

    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!(
        "{}{symbol}{grouped}.{:02}",
        if negative { "-" } else { "" },
        cents % 100
    )
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Converts `{amount, from, to}` records; `from` defaults to EUR and `to` to USD
#[derive(Debug, Default, Clone)]
pub struct CurrencyConverter;

impl CurrencyConverter {
    pub fn new() -> Self {
        Self
    }

    fn amount(record: &Record) -> PipelineResult<f64> {
        let amount = match record.get("amount") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(_) => None,
            None => return Err(PipelineError::validation("missing field 'amount'")),
        };

        match amount {
            Some(amount) if amount.is_finite() && amount.abs() <= MAX_AMOUNT => Ok(amount),
            Some(amount) if amount.is_finite() => Err(PipelineError::validation(format!(
                "'amount' {amount} exceeds the supported magnitude of {MAX_AMOUNT}"
            ))),
            _ => Err(PipelineError::validation("'amount' must be a finite number")),
        }
    }

    fn code<'a>(record: &'a Record, field: &str, default: &'a str) -> PipelineResult<&'a str> {
        match record.get(field) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::String(code)) if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) => {
                Ok(code.as_str())
            }
            Some(other) => Err(PipelineError::validation(format!(
                "'{field}' must be a three-letter currency code, got {other}"
            ))),
        }
    }
}

#[async_trait]
impl Converter for CurrencyConverter {
    fn name(&self) -> &str {
        "currency"
    }

    fn validate(&self, record: &Record) -> PipelineResult<()> {
        Self::amount(record)?;
        Self::code(record, "from", "EUR")?;
        Self::code(record, "to", "USD")?;
        Ok(())
    }

    async fn convert(&self, record: Record) -> PipelineResult<ConvertedRecord> {
        let amount = Self::amount(&record)?;
        let from = Self::code(&record, "from", "EUR")?.to_ascii_uppercase();
        let to = Self::code(&record, "to", "USD")?.to_ascii_uppercase();

        let (from_rate, _) = lookup(&from)
            .ok_or_else(|| PipelineError::conversion(format!("unsupported currency '{from}'")))?;
        let (to_rate, symbol) = lookup(&to)
            .ok_or_else(|| PipelineError::conversion(format!("unsupported currency '{to}'")))?;

        let rate = to_rate / from_rate;
        let converted = round_cents(amount * rate);

        Ok(ConvertedRecord::new(
            record.id(),
            self.name(),
            json!({
                "amount": converted,
                "currency": to,
                "formatted": format_us_amount(converted, symbol),
                "rate": (rate * 1_000_000.0).round() / 1_000_000.0,
                "original": { "amount": amount, "currency": from },
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    #[test]
    fn test_format_us_amount() {
        assert_eq!(format_us_amount(0.0, "$"), "$0.00");
        assert_eq!(format_us_amount(108.0, "$"), "$108.00");
        assert_eq!(format_us_amount(1080.0, "$"), "$1,080.00");
        assert_eq!(format_us_amount(1234567.891, "$"), "$1,234,567.89");
        assert_eq!(format_us_amount(-1080.5, "$"), "-$1,080.50");
        assert_eq!(format_us_amount(999.999, "$"), "$1,000.00");
    }

    #[tokio::test]
    async fn test_eur_to_usd() {
        let converter = CurrencyConverter::new();
        let input = record(json!({"id": "t1", "amount": 100, "from": "EUR", "to": "USD"}));
        converter.validate(&input).unwrap();

        let converted = converter.convert(input).await.unwrap();
        assert_eq!(converted.id.as_deref(), Some("t1"));
        assert_eq!(converted.kind, "currency");
        assert_eq!(converted.output["amount"], json!(108.0));
        assert_eq!(converted.output["formatted"], json!("$108.00"));
        assert_eq!(converted.output["currency"], json!("USD"));
    }

    #[tokio::test]
    async fn test_defaults_and_string_amounts() {
        let converter = CurrencyConverter::new();
        let converted = converter
            .convert(record(json!({"amount": "1000"})))
            .await
            .unwrap();
        assert_eq!(converted.output["formatted"], json!("$1,080.00"));
        assert_eq!(converted.id, None);
    }

    #[test]
    fn test_validation_failures() {
        let converter = CurrencyConverter::new();
        for bad in [
            json!({}),
            json!({"amount": "lots"}),
            json!({"amount": true}),
            json!({"amount": 5, "from": "EURO"}),
            json!({"amount": 5, "to": 12}),
            json!({"amount": 1e300}),
            json!({"amount": "-1e15"}),
        ] {
            let err = converter.validate(&record(bad)).unwrap_err();
            assert!(matches!(err, PipelineError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_largest_amount_formats_consistently() {
        let converter = CurrencyConverter::new();
        let input = record(json!({"amount": MAX_AMOUNT, "from": "GBP", "to": "JPY"}));
        converter.validate(&input).unwrap();

        let converted = converter.convert(input).await.unwrap();
        let amount = converted.output["amount"].as_f64().unwrap();
        let formatted = converted.output["formatted"].as_str().unwrap();
        assert_eq!(formatted, format_us_amount(amount, "¥"));

        let digits: String = formatted.chars().filter(|c| c.is_ascii_digit()).collect();
        let cents: i64 = digits.parse().unwrap();
        assert_eq!(cents as f64, (amount * 100.0).round());
    }

    #[tokio::test]
    async fn test_unknown_currency_is_conversion_error() {
        let converter = CurrencyConverter::new();
        let input = record(json!({"amount": 5, "from": "XYZ"}));
        assert!(converter.validate(&input).is_ok());
        let err = converter.convert(input).await.unwrap_err();
        assert!(matches!(err, PipelineError::Conversion(_)));
    }

    proptest! {
        #[test]
        fn prop_formatting_preserves_cents(cents in -10_000_000_000i64..10_000_000_000i64) {
            let amount = cents as f64 / 100.0;
            let formatted = format_us_amount(amount, "$");

            let negative = formatted.starts_with('-');
            let digits: String = formatted.chars().filter(|c| c.is_ascii_digit()).collect();
            let parsed: i64 = digits.parse().unwrap();
            prop_assert_eq!(if negative { -parsed } else { parsed }, cents);

            // Groups after the first are exactly three digits
            let whole = formatted.trim_start_matches('-').trim_start_matches('$');
            let whole = whole.split('.').next().unwrap();
            for group in whole.split(',').skip(1) {
                prop_assert_eq!(group.len(), 3);
            }
        }
    }
}
