//! European day-first dates to US month-first dates.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveTime};
use serde_json::{json, Value};

use super::record::{ConvertedRecord, Record};
use super::traits::Converter;
use crate::error::{PipelineError, PipelineResult};

const DATE_FORMATS: [&str; 4] = ["%d/%m/%Y", "%d.%m.%Y", "%d-%m-%Y", "%Y-%m-%d"];

/// Converts `{date, time?}` records.
///
/// `date` is `dd/mm/yyyy`, `dd.mm.yyyy`, `dd-mm-yyyy` or ISO `yyyy-mm-dd`; the optional
/// `time` is 24-hour `HH:MM` and is rendered on a 12-hour clock.
#[derive(Debug, Default, Clone)]
pub struct DateConverter;

impl DateConverter {
    pub fn new() -> Self {
        Self
    }

    fn parse_date(raw: &str) -> PipelineResult<NaiveDate> {
        let raw = raw.trim();
        DATE_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
            .ok_or_else(|| PipelineError::conversion(format!("unrecognised date '{raw}'")))
    }

    fn parse_time(raw: &str) -> PipelineResult<NaiveTime> {
        NaiveTime::parse_from_str(raw.trim(), "%H:%M")
            .map_err(|e| PipelineError::conversion(format!("unrecognised time '{raw}': {e}")))
    }
}

#[async_trait]
impl Converter for DateConverter {
    fn name(&self) -> &str {
        "date"
    }

    fn validate(&self, record: &Record) -> PipelineResult<()> {
        match record.get("date") {
            Some(Value::String(date)) if !date.trim().is_empty() => {}
            Some(_) => return Err(PipelineError::validation("'date' must be a non-empty string")),
            None => return Err(PipelineError::validation("missing field 'date'")),
        }
        match record.get("time") {
            None | Some(Value::Null) | Some(Value::String(_)) => Ok(()),
            Some(_) => Err(PipelineError::validation("'time' must be a string")),
        }
    }

    async fn convert(&self, record: Record) -> PipelineResult<ConvertedRecord> {
        let raw = record
            .get_str("date")
            .ok_or_else(|| PipelineError::validation("missing field 'date'"))?;
        let date = Self::parse_date(raw)?;

        let mut output = json!({
            "date": date.format("%m/%d/%Y").to_string(),
            "iso": date.format("%Y-%m-%d").to_string(),
            "weekday": date.weekday().to_string(),
            "long": date.format("%B %-d, %Y").to_string(),
        });

        if let Some(time) = record.get_str("time") {
            let time = Self::parse_time(time)?;
            output["time"] = json!(time.format("%-I:%M %p").to_string());
        }

        Ok(ConvertedRecord::new(record.id(), self.name(), output))
    }
}
