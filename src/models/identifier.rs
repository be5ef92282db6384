use serde::{Deserialize, Serialize};
use std::fmt;

/// Key of one ingestible source file (its URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceIdentifier(String);

impl SourceIdentifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Trailing path segment, e.g. `72503014732.csv`
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for SourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name() {
        let id = SourceIdentifier::new(
            "https://www.ncei.noaa.gov/data/global-hourly/access/2020/72503014732.csv",
        );
        assert_eq!(id.file_name(), "72503014732.csv");
        assert_eq!(SourceIdentifier::new("plain").file_name(), "plain");
    }
}
