use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};
use crate::utils::constants::MISSING_MEASUREMENT;

/// A measured value in tenths of a unit together with its quality code.
///
/// Observations carry `Option<Measurement>` so a value can never be stored
/// without its quality flag or the other way round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: i32,
    pub quality: String,
}

impl Measurement {
    pub fn new(value: i32, quality: impl Into<String>) -> Self {
        Self {
            value,
            quality: quality.into(),
        }
    }

    /// Parse a compound `"value,quality"` field such as `+0050,1`.
    ///
    /// Empty fields and the `+9999` sentinel yield `None`. `line` is only used
    /// for the error message.
    pub fn parse(raw: &str, line: u64) -> Result<Option<Self>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }

        let (value_part, quality_part) =
            raw.split_once(',')
                .ok_or_else(|| IngestError::MalformedRecord {
                    line,
                    message: format!("Measurement without quality separator: '{}'", raw),
                })?;

        let value = value_part
            .trim()
            .parse::<i32>()
            .map_err(|_| IngestError::MalformedRecord {
                line,
                message: format!("Invalid measurement value: '{}'", value_part),
            })?;

        if value == MISSING_MEASUREMENT {
            return Ok(None);
        }

        Ok(Some(Self::new(value, quality_part.trim())))
    }
}

/// One normalized row of the destination table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRow {
    pub station: String,
    pub name: Option<String>,
    pub call_sign: Option<String>,
    pub timepoint: String,
    pub temperature: Option<Measurement>,
    pub dew_point: Option<Measurement>,
    /// Verbatim values of the file's remaining header columns, in layout order
    pub extras: Vec<Option<String>>,
}

impl ObservationRow {
    /// Bind values in the column order of `HeaderLayout::insert_columns`.
    pub fn to_values(&self) -> Vec<Value> {
        let mut values = Vec::with_capacity(8 + self.extras.len());
        values.push(Value::Text(self.station.clone()));
        values.push(optional_text(&self.name));
        values.push(optional_text(&self.call_sign));
        values.push(Value::Text(self.timepoint.clone()));
        push_measurement(&mut values, &self.temperature);
        push_measurement(&mut values, &self.dew_point);
        values.extend(self.extras.iter().map(optional_text));
        values
    }
}

fn optional_text(value: &Option<String>) -> Value {
    match value {
        Some(text) => Value::Text(text.clone()),
        None => Value::Null,
    }
}

fn push_measurement(values: &mut Vec<Value>, measurement: &Option<Measurement>) {
    match measurement {
        Some(m) => {
            values.push(Value::Integer(i64::from(m.value)));
            values.push(Value::Text(m.quality.clone()));
        }
        None => {
            values.push(Value::Null);
            values.push(Value::Null);
        }
    }
}
