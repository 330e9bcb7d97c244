//! European address fields to US address lines.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::record::{ConvertedRecord, Record};
use super::traits::Converter;
use crate::error::{PipelineError, PipelineResult};

/// Street-type words rewritten to their US abbreviation
const STREET_TYPES: &[(&str, &str)] = &[
    ("strasse", "St"),
    ("straße", "St"),
    ("street", "St"),
    ("str.", "St"),
    ("rue", "St"),
    ("via", "St"),
    ("avenue", "Ave"),
    ("allee", "Ave"),
    ("weg", "Way"),
    ("platz", "Sq"),
    ("place", "Pl"),
    ("boulevard", "Blvd"),
    ("road", "Rd"),
];

/// Converts `{street, house_number?, postal_code?, city, region?, country?, recipient?}`
/// records into US-style lines: number before street, then `City, REGION POSTAL`.
#[derive(Debug, Default, Clone)]
pub struct AddressConverter;

impl AddressConverter {
    pub fn new() -> Self {
        Self
    }

    fn text<'a>(record: &'a Record, field: &str) -> PipelineResult<Option<&'a str>> {
        match record.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.trim())),
            Some(_) => Err(PipelineError::validation(format!("'{field}' must be a string"))),
        }
    }

    fn required<'a>(record: &'a Record, field: &str) -> PipelineResult<&'a str> {
        Self::text(record, field)?
            .ok_or_else(|| PipelineError::validation(format!("missing field '{field}'")))
    }

    /// Collapse whitespace and abbreviate a trailing or leading street type
    fn normalize_street(street: &str) -> String {
        let words: Vec<&str> = street.split_whitespace().collect();
        let abbreviate = |word: &str| {
            STREET_TYPES
                .iter()
                .find(|(long, _)| long.eq_ignore_ascii_case(word))
                .map(|(_, short)| *short)
        };

        match words.as_slice() {
            [] => String::new(),
            // "Rue de Rivoli" -> "de Rivoli St"
            [first, rest @ ..] if !rest.is_empty() && abbreviate(*first).is_some() => {
                let mut out = rest.join(" ");
                out.push(' ');
                out.push_str(abbreviate(*first).unwrap_or_default());
                out
            }
            // "Baker Street" -> "Baker St"
            [init @ .., last] if !init.is_empty() && abbreviate(*last).is_some() => {
                let mut out = init.join(" ");
                out.push(' ');
                out.push_str(abbreviate(*last).unwrap_or_default());
                out
            }
            // "Hauptstrasse" -> "Haupt St"
            [single] => {
                let lower = single.to_lowercase();
                for suffix in ["strasse", "straße"] {
                    if let Some(stem) = lower.strip_suffix(suffix) {
                        if !stem.is_empty() {
                            let stem_len = single.len() - (lower.len() - stem.len());
                            return format!("{} St", single.get(..stem_len).unwrap_or(single));
                        }
                    }
                }
                single.to_string()
            }
            words => words.join(" "),
        }
    }
}

#[async_trait]
impl Converter for AddressConverter {
    fn name(&self) -> &str {
        "address"
    }

    fn validate(&self, record: &Record) -> PipelineResult<()> {
        Self::required(record, "street")?;
        Self::required(record, "city")?;
        for field in ["house_number", "postal_code", "region", "country", "recipient"] {
            if let Some(Value::Number(_)) = record.get(field) {
                continue;
            }
            Self::text(record, field)?;
        }
        Ok(())
    }

    async fn convert(&self, record: Record) -> PipelineResult<ConvertedRecord> {
        let street = Self::normalize_street(Self::required(&record, "street")?);
        let city = Self::required(&record, "city")?;

        let scalar = |field: &str| -> PipelineResult<Option<String>> {
            match record.get(field) {
                Some(Value::Number(n)) => Ok(Some(n.to_string())),
                _ => Ok(Self::text(&record, field)?.map(str::to_string)),
            }
        };

        let house_number = scalar("house_number")?;
        let postal_code = scalar("postal_code")?;
        let region = scalar("region")?;
        let country = scalar("country")?;
        let recipient = scalar("recipient")?;

        let line1 = match &house_number {
            Some(number) => format!("{number} {street}"),
            None => street,
        };

        let mut line2 = city.to_string();
        if region.is_some() || postal_code.is_some() {
            line2.push(',');
        }
        if let Some(region) = &region {
            line2.push(' ');
            line2.push_str(&region.to_uppercase());
        }
        if let Some(postal_code) = &postal_code {
            line2.push(' ');
            line2.push_str(postal_code);
        }

        let mut lines: Vec<String> = Vec::with_capacity(4);
        if let Some(recipient) = &recipient {
            lines.push(recipient.clone());
        }
        lines.push(line1.clone());
        lines.push(line2.clone());
        if let Some(country) = &country {
            lines.push(country.to_uppercase());
        }

        Ok(ConvertedRecord::new(
            record.id(),
            self.name(),
            json!({
                "line1": line1,
                "line2": line2,
                "country": country.map(|c| c.to_uppercase()),
                "formatted": lines.join("\n"),
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn convert(value: Value) -> ConvertedRecord {
        let record = Record::from_value(value).unwrap();
        AddressConverter::new().convert(record).await.unwrap()
    }

    #[test]
    fn test_normalize_street() {
        assert_eq!(AddressConverter::normalize_street("Hauptstrasse"), "Haupt St");
        assert_eq!(AddressConverter::normalize_street("Rue  de Rivoli"), "de Rivoli St");
        assert_eq!(AddressConverter::normalize_street("Baker Street"), "Baker St");
        assert_eq!(AddressConverter::normalize_street("Kalverstraat"), "Kalverstraat");
    }

    #[tokio::test]
    async fn test_german_address() {
        let converted = convert(json!({
            "id": "a1",
            "recipient": "Max Mustermann",
            "street": "Hauptstrasse",
            "house_number": 12,
            "postal_code": "10115",
            "city": "Berlin",
            "country": "Germany"
        }))
        .await;

        assert_eq!(converted.id.as_deref(), Some("a1"));
        assert_eq!(converted.output["line1"], json!("12 Haupt St"));
        assert_eq!(converted.output["line2"], json!("Berlin, 10115"));
        assert_eq!(
            converted.output["formatted"],
            json!("Max Mustermann\n12 Haupt St\nBerlin, 10115\nGERMANY")
        );
    }

    #[tokio::test]
    async fn test_region_is_uppercased() {
        let converted = convert(json!({
            "street": "Via Roma",
            "house_number": "5",
            "city": "Milano",
            "region": "mi",
            "postal_code": "20121"
        }))
        .await;
        assert_eq!(converted.output["line1"], json!("5 Roma St"));
        assert_eq!(converted.output["line2"], json!("Milano, MI 20121"));
        assert_eq!(converted.output["country"], Value::Null);
    }

    #[test]
    fn test_validate_requires_street_and_city() {
        let converter = AddressConverter::new();
        let check = |value: Value| converter.validate(&Record::from_value(value).unwrap());
        assert!(check(json!({"street": "Main", "city": "Paris"})).is_ok());
        assert!(check(json!({"street": "Main"})).is_err());
        assert!(check(json!({"city": "Paris", "street": "  "})).is_err());
        assert!(check(json!({"street": "Main", "city": "Paris", "region": ["x"]})).is_err());
    }
}
