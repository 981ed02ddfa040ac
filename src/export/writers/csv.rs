//! CSV writers
//!
//! Every CSV file starts with a UTF-8 byte-order mark so spreadsheet
//! applications pick the right encoding. Tables are spooled to scratch files
//! and assembled on close: into a deflated archive with one `<title>.csv`
//! per table, or, for the unzipped variant, as the first table alone.

use std::io::{Cursor, Write};

use async_trait::async_trait;
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;
use crate::projection::Cell;

use super::scratch::{ScratchSet, ScratchTable};
use super::FormatWriter;

const BOM_UTF8: &[u8] = b"\xEF\xBB\xBF";

fn start_table(tables: &mut ScratchSet, tag: &str, title: &str) -> Result<()> {
    let table = tables.add(tag, title)?;
    table.writer().write_all(BOM_UTF8)?;
    Ok(())
}

fn append_row(table: &mut ScratchTable, row: &[Cell]) -> Result<()> {
    {
        let mut out = ::csv::WriterBuilder::new()
            .terminator(::csv::Terminator::CRLF)
            .from_writer(table.writer());
        out.write_record(row.iter().map(Cell::text))?;
        out.flush()?;
    }
    table.rows += 1;
    Ok(())
}

/// Writer for the `csv` format: a zip archive of CSV files
#[derive(Default)]
pub struct CsvArchiveWriter {
    tables: ScratchSet,
}

impl CsvArchiveWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FormatWriter for CsvArchiveWriter {
    async fn init_table(&mut self, tag: &str, title: &str) -> Result<()> {
        start_table(&mut self.tables, tag, title)
    }

    async fn write_row(&mut self, tag: &str, row: &[Cell]) -> Result<()> {
        append_row(self.tables.get_mut(tag)?, row)
    }

    async fn finish(&mut self) -> Result<Vec<u8>> {
        let result = zip_tables(&mut self.tables, "csv");
        self.tables.clear();
        result
    }
}

/// Pack every scratch table into a deflated archive as `<title>.<extension>`
pub(crate) fn zip_tables(tables: &mut ScratchSet, extension: &str) -> Result<Vec<u8>> {
    let mut archive = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for table in tables.iter_mut() {
        let contents = table.contents()?;
        archive.start_file(format!("{}.{extension}", table.title), options)?;
        archive.write_all(&contents)?;
        debug!("Archived table '{}' ({} rows)", table.title, table.rows);
    }

    Ok(archive.finish()?.into_inner())
}

/// Writer for the `unzipped-csv` format: the first table as one CSV file
///
/// Rows of any later table are accepted and dropped.
#[derive(Default)]
pub struct SingleCsvWriter {
    tables: ScratchSet,
    first_tag: Option<String>,
}

impl SingleCsvWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FormatWriter for SingleCsvWriter {
    async fn init_table(&mut self, tag: &str, title: &str) -> Result<()> {
        if self.first_tag.is_none() {
            self.first_tag = Some(tag.to_string());
            start_table(&mut self.tables, tag, title)?;
        }
        Ok(())
    }

    async fn write_row(&mut self, tag: &str, row: &[Cell]) -> Result<()> {
        if self.first_tag.as_deref() != Some(tag) {
            return Ok(());
        }
        append_row(self.tables.get_mut(tag)?, row)
    }

    async fn finish(&mut self) -> Result<Vec<u8>> {
        let result = match self.tables.first_mut() {
            Some(table) => table.contents(),
            None => Ok(Vec::new()),
        };
        self.tables.clear();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::writers::{ExportWriter, TableHeader};
    use crate::projection::{FormattedRow, ProjectedTable};
    use std::collections::HashMap;
    use std::io::Read;

    fn people() -> Vec<ProjectedTable> {
        vec![ProjectedTable {
            tag: "people".to_string(),
            rows: vec![
                FormattedRow::header(&["danny", "male"]),
                FormattedRow::header(&["amelia", "female"]),
            ],
        }]
    }

    fn headers() -> Vec<TableHeader> {
        vec![
            TableHeader::new("people", vec!["name".into(), "gender".into()]),
            TableHeader::new("offices", vec!["location".into()]),
        ]
    }

    #[tokio::test]
    async fn test_single_csv_keeps_first_table_with_bom() {
        let mut writer = ExportWriter::new(Box::new(SingleCsvWriter::new()));
        writer.open(&headers(), &HashMap::new(), 2000).await.unwrap();
        writer.write(people()).await.unwrap();
        writer
            .write(vec![ProjectedTable {
                tag: "offices".to_string(),
                rows: vec![FormattedRow::header(&["Boston"])],
            }])
            .await
            .unwrap();
        let bytes = writer.close().await.unwrap();

        assert!(bytes.starts_with(BOM_UTF8));
        let text = String::from_utf8(bytes[BOM_UTF8.len()..].to_vec()).unwrap();
        assert_eq!(text, "name,gender\r\ndanny,male\r\namelia,female\r\n");
    }

    #[tokio::test]
    async fn test_archive_holds_one_file_per_table() {
        let mut writer = ExportWriter::new(Box::new(CsvArchiveWriter::new()));
        writer.open(&headers(), &HashMap::new(), 2000).await.unwrap();
        writer.write(people()).await.unwrap();
        let bytes = writer.close().await.unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut contents = Vec::new();
        archive.by_name("people.csv").unwrap().read_to_end(&mut contents).unwrap();
        assert!(contents.starts_with(BOM_UTF8));
        let text = String::from_utf8(contents[BOM_UTF8.len()..].to_vec()).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), ["name,gender", "danny,male", "amelia,female"]);

        let mut offices = String::new();
        archive.by_name("offices.csv").unwrap().read_to_string(&mut offices).unwrap();
        assert_eq!(offices.trim_start_matches('\u{feff}'), "location\r\n");
    }

    #[tokio::test]
    async fn test_quoting() {
        let mut backend = SingleCsvWriter::new();
        backend.init_table("t", "t").await.unwrap();
        backend
            .write_row("t", &[Cell::from("a,b"), Cell::from("say \"hi\""), Cell::Null])
            .await
            .unwrap();
        let bytes = backend.finish().await.unwrap();
        let text = String::from_utf8(bytes[BOM_UTF8.len()..].to_vec()).unwrap();
        assert_eq!(text, "\"a,b\",\"say \"\"hi\"\"\",\r\n");
    }
}
