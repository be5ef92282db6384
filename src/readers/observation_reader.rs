use std::borrow::Cow;
use std::io::Read;

use csv::{ReaderBuilder, StringRecordsIter};

use crate::error::Result;
use crate::models::ObservationRow;
use crate::processors::row_normalizer::{HeaderLayout, RowNormalizer};

/// Decode a payload as strict UTF-8, dropping a leading BOM.
///
/// Returns `None` when the bytes contain malformed sequences; such files are
/// rejected as a whole rather than loaded with replacement characters.
pub fn decode_payload(bytes: &[u8]) -> Option<Cow<'_, str>> {
    let (text, had_errors) = encoding_rs::UTF_8.decode_with_bom_removal(bytes);
    if had_errors {
        None
    } else {
        Some(text)
    }
}

/// Streams normalized observations out of one CSV payload.
pub struct ObservationReader<R: Read> {
    reader: csv::Reader<R>,
    layout: HeaderLayout,
}

impl<R: Read> ObservationReader<R> {
    /// Read the header row and resolve the file's layout.
    pub fn new(source: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(source);
        let headers = reader.headers()?.clone();
        let layout = HeaderLayout::from_headers(&headers)?;

        Ok(Self { reader, layout })
    }

    pub fn layout(&self) -> &HeaderLayout {
        &self.layout
    }

    /// Normalized rows in file order. The iterator yields an error for the
    /// first unreadable or malformed record; callers stop there.
    pub fn rows(&mut self) -> ObservationRows<'_, R> {
        ObservationRows {
            records: self.reader.records(),
            normalizer: RowNormalizer::new(&self.layout),
        }
    }
}

pub struct ObservationRows<'r, R: Read> {
    records: StringRecordsIter<'r, R>,
    normalizer: RowNormalizer<'r>,
}

impl<R: Read> Iterator for ObservationRows<'_, R> {
    type Item = Result<ObservationRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => return Some(Err(e.into())),
            };

            // Skip blank trailing lines
            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }

            return Some(self.normalizer.normalize(&record));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;
    use crate::models::Measurement;

    const SAMPLE: &str = "\"STATION\",\"DATE\",\"NAME\",\"TMP\",\"DEW\"\n\
        \"72503014732\",\"2020-01-01T00:51:00\",\"LAGUARDIA AIRPORT, NY US\",\"+9999,9\",\"-0028,1\"\n\
        \"72503014732\",\"2020-01-01T01:51:00\",\"LAGUARDIA AIRPORT, NY US\",\"+0050,1\",\"-0022,1\"\n";

    #[test]
    fn test_read_observations() -> Result<()> {
        let mut reader = ObservationReader::new(SAMPLE.as_bytes())?;
        assert_eq!(reader.layout().columns(), ["station", "date", "name", "tmp", "dew"]);

        let rows = reader.rows().collect::<Result<Vec<_>>>()?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].temperature, None);
        assert_eq!(rows[0].dew_point, Some(Measurement::new(-28, "1")));
        assert_eq!(rows[1].temperature, Some(Measurement::new(50, "1")));
        Ok(())
    }

    #[test]
    fn test_malformed_row_stops_with_line_number() -> Result<()> {
        let payload = format!("{}\"A\",\"2020-01-01\",\"X\",\"oops\",\"+0001,1\"\n", SAMPLE);
        let mut reader = ObservationReader::new(payload.as_bytes())?;

        let results: Vec<_> = reader.rows().collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[2],
            Err(IngestError::MalformedRecord { line: 4, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_decode_payload() {
        assert_eq!(decode_payload(b"\xEF\xBB\xBFSTATION").as_deref(), Some("STATION"));
        assert!(decode_payload(b"STATION,\xFF\xFE").is_none());
    }
}
