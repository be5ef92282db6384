use std::collections::HashSet;

use csv::StringRecord;

use crate::error::{IngestError, Result};
use crate::models::{Measurement, ObservationRow};
use crate::store::is_valid_column_name;
use crate::utils::constants::{
    CORE_COLUMNS, FIELD_CALL_SIGN, FIELD_DATE, FIELD_DEW_POINT, FIELD_NAME, FIELD_STATION,
    FIELD_TEMPERATURE,
};

/// Positions of the fields the normalizer reads, resolved once per file.
#[derive(Debug, Clone)]
pub struct HeaderLayout {
    columns: Vec<String>,
    station: usize,
    date: usize,
    name: Option<usize>,
    call_sign: Option<usize>,
    temperature: Option<usize>,
    dew_point: Option<usize>,
    extras: Vec<usize>,
}

impl HeaderLayout {
    /// Build the layout from a CSV header row.
    ///
    /// Column names are trimmed and lowercased; `STATION` and `DATE` must be
    /// present. Every header column that is not one of the normalized core
    /// columns is carried through verbatim as an extra.
    pub fn from_headers(headers: &StringRecord) -> Result<Self> {
        let columns: Vec<String> = headers
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_ascii_lowercase())
            .collect();

        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !is_valid_column_name(column) {
                return Err(IngestError::InvalidColumnName(column.clone()));
            }
            if !seen.insert(column.as_str()) {
                return Err(IngestError::InvalidColumnName(format!("{} (duplicate)", column)));
            }
        }

        let position = |field: &str| columns.iter().position(|c| c == field);

        let station = position(FIELD_STATION)
            .ok_or_else(|| IngestError::MissingColumn(FIELD_STATION.to_uppercase()))?;
        let date = position(FIELD_DATE)
            .ok_or_else(|| IngestError::MissingColumn(FIELD_DATE.to_uppercase()))?;
        let name = position(FIELD_NAME);
        let call_sign = position(FIELD_CALL_SIGN);
        let temperature = position(FIELD_TEMPERATURE);
        let dew_point = position(FIELD_DEW_POINT);

        let extras = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !CORE_COLUMNS.contains(&c.as_str()))
            .map(|(idx, _)| idx)
            .collect();

        Ok(Self {
            columns,
            station,
            date,
            name,
            call_sign,
            temperature,
            dew_point,
            extras,
        })
    }

    /// Lowercased header columns as they appear in the file
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Destination columns in the order produced by `ObservationRow::to_values`
    pub fn insert_columns(&self) -> Vec<String> {
        CORE_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(self.extras.iter().map(|&idx| self.columns[idx].clone()))
            .collect()
    }
}

/// Maps raw CSV records of one file onto [`ObservationRow`]s.
pub struct RowNormalizer<'a> {
    layout: &'a HeaderLayout,
}

impl<'a> RowNormalizer<'a> {
    pub fn new(layout: &'a HeaderLayout) -> Self {
        Self { layout }
    }

    pub fn normalize(&self, record: &StringRecord) -> Result<ObservationRow> {
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        if record.len() != self.layout.columns.len() {
            return Err(IngestError::MalformedRecord {
                line,
                message: format!(
                    "Record has {} fields, header declares {}",
                    record.len(),
                    self.layout.columns.len()
                ),
            });
        }

        let station = required(record, self.layout.station, FIELD_STATION, line)?;
        let timepoint = required(record, self.layout.date, FIELD_DATE, line)?;

        let temperature = match self.layout.temperature {
            Some(idx) => Measurement::parse(&record[idx], line)?,
            None => None,
        };
        let dew_point = match self.layout.dew_point {
            Some(idx) => Measurement::parse(&record[idx], line)?,
            None => None,
        };

        Ok(ObservationRow {
            station,
            name: optional(record, self.layout.name),
            call_sign: optional(record, self.layout.call_sign),
            timepoint,
            temperature,
            dew_point,
            extras: self
                .layout
                .extras
                .iter()
                .map(|&idx| optional(record, Some(idx)))
                .collect(),
        })
    }
}

fn required(record: &StringRecord, idx: usize, field: &str, line: u64) -> Result<String> {
    let value = record[idx].trim();
    if value.is_empty() {
        return Err(IngestError::MalformedRecord {
            line,
            message: format!("Empty {} field", field.to_uppercase()),
        });
    }
    Ok(value.to_string())
}

fn optional(record: &StringRecord, idx: Option<usize>) -> Option<String> {
    idx.map(|i| record[i].trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
