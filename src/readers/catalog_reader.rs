use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, info};

use crate::error::{IngestError, Result};
use crate::models::SourceIdentifier;

/// Lists the source files published for one year.
pub trait SourceCatalog {
    fn list(&self, year: i32) -> Result<Vec<SourceIdentifier>>;
}

/// Enumerate every identifier of `years`, year by year.
///
/// A failing year yields its error in place of its files; callers stop at
/// the first error.
pub fn enumerate<'a, C: SourceCatalog + ?Sized>(
    catalog: &'a C,
    years: RangeInclusive<i32>,
) -> impl Iterator<Item = Result<SourceIdentifier>> + 'a {
    years.flat_map(move |year| match catalog.list(year) {
        Ok(identifiers) => identifiers.into_iter().map(Ok).collect::<Vec<_>>(),
        Err(e) => vec![Err(e)],
    })
}

/// Directory-listing catalog over HTTP (`{base_url}/{year}/`).
pub struct HttpCatalog {
    client: Client,
    base_url: String,
}

impl HttpCatalog {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn year_url(&self, year: i32) -> String {
        format!("{}/{}/", self.base_url, year)
    }
}

impl SourceCatalog for HttpCatalog {
    fn list(&self, year: i32) -> Result<Vec<SourceIdentifier>> {
        let url = self.year_url(year);
        debug!(%url, "Listing catalog");

        let response = self.client.get(&url).send()?;
        if !response.status().is_success() {
            return Err(IngestError::CatalogStatus {
                year,
                status: response.status().as_u16(),
            });
        }

        let body = response.text()?;
        let identifiers = parse_listing(&self.base_url, year, &body);
        info!(year, files = identifiers.len(), "Catalog listed");
        Ok(identifiers)
    }
}

/// Pull `*.csv` links out of an HTML directory listing.
///
/// The listing is split on double quotes, so every quoted attribute value
/// ending in `.csv` becomes one identifier. Order is preserved, duplicates
/// (href and link text both quoted) are dropped.
pub fn parse_listing(base_url: &str, year: i32, body: &str) -> Vec<SourceIdentifier> {
    let base_url = base_url.trim_end_matches('/');
    let mut seen = HashSet::new();

    body.split('"')
        .filter(|token| token.ends_with(".csv") && !token.contains('/'))
        .filter(|token| seen.insert(*token))
        .map(|file| SourceIdentifier::new(format!("{}/{}/{}", base_url, year, file)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"<html><body><table>
<tr><td><a href="01001099999.csv">01001099999.csv</a></td><td>2024-01-08 14:47</td></tr>
<tr><td><a href="01001499999.csv">01001499999.csv</a></td><td>2024-01-08 14:47</td></tr>
<tr><td><a href="01001099999.csv">again</a></td></tr>
<tr><td><a href="/data/global-hourly/doc/">Parent Directory</a></td></tr>
</table></body></html>"#;

    #[test]
    fn test_parse_listing() {
        let ids = parse_listing("https://example.org/access/", 2020, LISTING);
        assert_eq!(ids.len(), 2);
        assert_eq!(
            ids[0].as_str(),
            "https://example.org/access/2020/01001099999.csv"
        );
        assert_eq!(ids[1].file_name(), "01001499999.csv");
    }

    struct Fixed;

    impl SourceCatalog for Fixed {
        fn list(&self, year: i32) -> Result<Vec<SourceIdentifier>> {
            if year == 2022 {
                return Err(IngestError::CatalogStatus { year, status: 503 });
            }
            Ok(vec![SourceIdentifier::new(format!("{}/a.csv", year))])
        }
    }

    #[test]
    fn test_enumerate_stops_at_failing_year() {
        let results: Vec<_> = enumerate(&Fixed, 2020..=2023).collect();
        assert_eq!(results.len(), 4);
        assert!(results[1].is_ok());
        assert!(matches!(
            results[2],
            Err(IngestError::CatalogStatus { year: 2022, status: 503 })
        ));
        assert_eq!(
            enumerate(&Fixed, 2020..=2021)
                .collect::<Result<Vec<_>>>()
                .unwrap()
                .len(),
            2
        );
    }
}
