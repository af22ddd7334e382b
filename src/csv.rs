//! Delimited citation stream reader.
//!
//! Reads citation records from CSV-like exports with configurable header names. Columns
//! that do not map to a record field are kept in `extra_fields`.
//!
//! # Example
//!
//! ```
//! use issnl_match::{CsvParser, RecordParser};
//!
//! let input = "line_id,cited_journal,cited_year,cited_vol\n1,Rev Saude Publica,2005,39";
//!
//! let parser = CsvParser::new();
//! let batch = parser.parse(input).unwrap();
//! assert_eq!(batch.records[0].title.as_deref(), Some("Rev Saude Publica"));
//! assert_eq!(batch.records[0].volume.as_deref(), Some("39"));
//! ```

use csv_crate::{ReaderBuilder, StringRecord};
use nanoid::nanoid;
use std::collections::HashMap;

use crate::{CitationRecord, MatchError, RecordBatch, RecordParser, Result};

/// Default header mappings for common column names
const DEFAULT_HEADERS: &[(&str, &[&str])] = &[
    ("id", &["id", "line_id", "citation_id"]),
    (
        "title",
        &["title", "cited_journal", "journal", "journal title", "source title"],
    ),
    ("source", &["source", "cited_source"]),
    ("year", &["year", "cited_year", "ref_pubyear", "publication year"]),
    ("volume", &["volume", "vol", "cited_vol", "ref_volume"]),
    ("issn", &["issn", "cited_issn"]),
    ("doi", &["doi", "cited_doi"]),
    ("cited_issnl", &["cited_issnl", "issnl", "issn-l"]),
];

/// Configuration for delimited parsing with custom header mappings.
///
/// # Examples
///
/// ```
/// use issnl_match::csv::CsvConfig;
///
/// let mut config = CsvConfig::new();
/// config.set_header_mapping("title", vec!["Periódico".to_string()]);
/// config.set_delimiter(b'|');
/// ```
#[derive(Debug, Clone, Default)]
pub struct CsvConfig {
    /// Custom header mappings for columns
    header_map: HashMap<String, Vec<String>>,
    /// Delimiter to use for parsing
    delimiter: u8,
    /// Whether the input has headers
    has_header: bool,
}

impl CsvConfig {
    /// Creates a new configuration with default settings
    #[must_use]
    pub fn new() -> Self {
        let mut config = Self {
            header_map: HashMap::new(),
            delimiter: b',',
            has_header: true,
        };
        config.set_default_headers();
        config
    }

    fn set_default_headers(&mut self) {
        for (field, aliases) in DEFAULT_HEADERS {
            self.header_map.insert(
                field.to_string(),
                aliases.iter().map(|s| s.to_string()).collect(),
            );
        }
    }

    /// Sets a custom header mapping
    pub fn set_header_mapping(&mut self, field: &str, aliases: Vec<String>) -> &mut Self {
        self.header_map.insert(field.to_string(), aliases);
        self
    }

    pub fn set_delimiter(&mut self, delimiter: u8) -> &mut Self {
        self.delimiter = delimiter;
        self
    }

    /// Sets whether the input has headers
    pub fn set_has_header(&mut self, has_header: bool) -> &mut Self {
        self.has_header = has_header;
        self
    }

    fn get_field_for_header(&self, header: &str) -> Option<&str> {
        let header_lower = header.trim().to_lowercase();
        self.header_map
            .iter()
            .find(|(_, aliases)| aliases.iter().any(|a| a.to_lowercase() == header_lower))
            .map(|(field, _)| field.as_str())
    }
}

/// Parser for delimited citation streams.
///
/// Rows with a column count different from the header are skipped and counted. Rows
/// without an id get a generated one.
#[derive(Debug, Clone)]
pub struct CsvParser {
    config: CsvConfig,
}

impl Default for CsvParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: CsvConfig::new(),
        }
    }

    /// Creates a new parser with custom configuration
    #[must_use]
    pub fn with_config(mut self, config: CsvConfig) -> Self {
        self.config = config;
        self
    }

    fn parse_record(&self, headers: &[String], record: &StringRecord) -> CitationRecord {
        let mut citation = CitationRecord::default();

        for (header, value) in headers.iter().zip(record.iter()) {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let slot = match self.config.get_field_for_header(header) {
                Some("id") => &mut citation.id,
                Some("title") => &mut citation.title,
                Some("source") => &mut citation.source,
                Some("year") => &mut citation.year,
                Some("volume") => &mut citation.volume,
                Some("issn") => &mut citation.issn,
                Some("doi") => &mut citation.doi,
                Some("cited_issnl") => &mut citation.cited_issnl,
                _ => {
                    citation.extra_fields.insert(
                        header.clone(),
                        serde_json::Value::String(value.to_string()),
                    );
                    continue;
                }
            };
            *slot = Some(value.to_string());
        }

        if citation.id.is_none() {
            citation.id = Some(nanoid!());
        }

        citation
    }
}

impl RecordParser for CsvParser {
    fn parse(&self, input: &str) -> Result<RecordBatch> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.config.delimiter)
            .has_headers(self.config.has_header)
            .from_reader(input.as_bytes());

        let headers: Vec<String> = if self.config.has_header {
            reader
                .headers()
                .map_err(|e| MatchError::InvalidFormat(e.to_string()))?
                .iter()
                .map(|h| h.trim().to_string())
                .collect()
        } else {
            // Use column numbers as headers if no headers present
            (0..reader
                .headers()
                .map_err(|e| MatchError::InvalidFormat(e.to_string()))?
                .len())
                .map(|i| format!("Column{}", i + 1))
                .collect()
        };

        let mut batch = RecordBatch::default();
        for result in reader.records() {
            match result {
                Ok(record) => batch.records.push(self.parse_record(&headers, &record)),
                Err(err) => {
                    batch.skipped += 1;
                    tracing::warn!(error = %err, "skipping malformed citation row");
                }
            }
        }

        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_basic_csv() {
        let input = "\
id,Title,Year,Volume,DOI
r1,Rev Saude Publica,2005,39,
r2,\"Cad. Saúde Pública, Rio de Janeiro\",2010,26,10.1590/S0102-311X2010000100001";

        let batch = CsvParser::new().parse(input).unwrap();
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.skipped, 0);

        let first = &batch.records[0];
        assert_eq!(first.id.as_deref(), Some("r1"));
        assert_eq!(first.year.as_deref(), Some("2005"));
        assert_eq!(first.doi, None);

        let second = &batch.records[1];
        assert_eq!(
            second.title.as_deref(),
            Some("Cad. Saúde Pública, Rio de Janeiro")
        );
        assert!(second.has_doi());
    }

    #[test]
    fn test_custom_headers_and_extra_fields() {
        let input = "Periódico;Ano;citing_pid\nRev Saude Publica;2005;S0034-89102005";

        let mut config = CsvConfig::new();
        config
            .set_header_mapping("title", vec!["Periódico".to_string()])
            .set_header_mapping("year", vec!["ano".to_string()])
            .set_delimiter(b';');

        let batch = CsvParser::new().with_config(config).parse(input).unwrap();
        let record = &batch.records[0];

        assert_eq!(record.title.as_deref(), Some("Rev Saude Publica"));
        assert_eq!(record.year.as_deref(), Some("2005"));
        assert_eq!(
            record.extra_fields.get("citing_pid"),
            Some(&serde_json::Value::String("S0034-89102005".to_string()))
        );
        // No id column
        assert!(record.id.as_deref().is_some_and(|id| !id.is_empty()));
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let input = "title,year\nRev Saude Publica,2005\nonly one,2006,extra\nCad Saude Publica,2010";

        let batch = CsvParser::new().parse(input).unwrap();
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.skipped, 1);
        assert_eq!(batch.records[1].title.as_deref(), Some("Cad Saude Publica"));
    }

    #[test]
    fn test_without_header() {
        let input = "Rev Saude Publica|2005\n";
        let mut config = CsvConfig::new();
        config.set_has_header(false).set_delimiter(b'|');

        let batch = CsvParser::new().with_config(config).parse(input).unwrap();
        let record = &batch.records[0];
        assert_eq!(record.title, None);
        assert_eq!(record.extra_fields.len(), 2);
        assert!(record.extra_fields.contains_key("Column1"));
    }
}
