//! Output formats
//!
//! The extension and MIME type of an artifact depend only on its format.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ExportError};

use super::writers::{
    CsvArchiveWriter, ExportWriter, FormatWriter, HtmlArchiveWriter, HtmlWriter, JsonWriter,
    LegacyWorkbookWriter, SingleCsvWriter, WorkbookWriter,
};

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Format {
    /// Archive with one CSV file per table
    Csv,
    /// First table only, as a bare CSV file
    UnzippedCsv,
    /// Legacy spreadsheet
    Xls,
    /// Modern spreadsheet
    Xlsx,
    Html,
    ZippedHtml,
    Json,
}

impl Format {
    /// Every format, in listing order
    pub const ALL: [Format; 7] = [
        Format::Csv,
        Format::UnzippedCsv,
        Format::Xls,
        Format::Xlsx,
        Format::Html,
        Format::ZippedHtml,
        Format::Json,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::UnzippedCsv => "unzipped-csv",
            Format::Xls => "xls",
            Format::Xlsx => "xlsx",
            Format::Html => "html",
            Format::ZippedHtml => "zipped-html",
            Format::Json => "json",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Format::Csv | Format::ZippedHtml => "zip",
            Format::UnzippedCsv => "csv",
            Format::Xls => "xls",
            Format::Xlsx => "xlsx",
            Format::Html => "html",
            Format::Json => "json",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Format::Csv | Format::ZippedHtml => "application/zip",
            Format::UnzippedCsv => "text/csv",
            Format::Xls | Format::Xlsx => "application/vnd.ms-excel",
            Format::Html => "text/html",
            Format::Json => "application/json",
        }
    }

    /// Parse a format slug, ignoring case
    pub fn from_slug(slug: &str) -> Result<Self, ConfigError> {
        let wanted = slug.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.slug() == wanted)
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "format".to_string(),
                value: slug.to_string(),
            })
    }

    /// Fresh backend for this format
    pub fn backend(&self) -> Box<dyn FormatWriter> {
        match self {
            Format::Csv => Box::new(CsvArchiveWriter::new()),
            Format::UnzippedCsv => Box::new(SingleCsvWriter::new()),
            Format::Xls => Box::new(LegacyWorkbookWriter::new()),
            Format::Xlsx => Box::new(WorkbookWriter::new()),
            Format::Html => Box::new(HtmlWriter::new()),
            Format::ZippedHtml => Box::new(HtmlArchiveWriter::new()),
            Format::Json => Box::new(JsonWriter::new()),
        }
    }

    /// Lifecycle-checked writer for this format
    pub fn writer(&self) -> ExportWriter {
        ExportWriter::new(self.backend())
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Format {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_slug(s).map_err(ExportError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_contract() {
        assert_eq!(Format::Csv.extension(), "zip");
        assert_eq!(Format::Csv.mime_type(), "application/zip");
        assert_eq!(Format::Xls.extension(), "xls");
        assert_eq!(Format::Xlsx.mime_type(), "application/vnd.ms-excel");
        assert_eq!(Format::Html.mime_type(), "text/html");
        assert_eq!(Format::Json.extension(), "json");
        assert_eq!(Format::Json.mime_type(), "application/json");
    }

    #[test]
    fn test_from_slug() {
        assert_eq!(Format::from_slug("XLSX").unwrap(), Format::Xlsx);
        assert_eq!("unzipped-csv".parse::<Format>().unwrap(), Format::UnzippedCsv);
        assert!(Format::from_slug("pdf").is_err());
        for format in Format::ALL {
            assert_eq!(Format::from_slug(format.slug()).unwrap(), format);
        }
    }

    #[test]
    fn test_table_name_caps() {
        assert_eq!(Format::Xls.backend().max_table_name_size(), 31);
        assert_eq!(Format::Xlsx.backend().max_table_name_size(), 31);
        assert_eq!(Format::Csv.backend().max_table_name_size(), 500);
    }
}
