//! HTML writers
//!
//! Markup is produced by a [`SectionRenderer`]; the writers only decide which
//! section comes next. A table's first row (its header) renders as
//! [`Section::FirstRow`], later rows as [`Section::Row`], and a table
//! without data rows gets a [`Section::NoRows`] before it ends.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::projection::Cell;

use super::csv::zip_tables;
use super::scratch::{ScratchSet, ScratchTable};
use super::FormatWriter;

/// Structural pieces of an HTML export
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Section<'a> {
    DocBegin,
    TableBegin { name: &'a str },
    FirstRow(&'a [Cell]),
    Row(&'a [Cell]),
    NoRows,
    TableEnd,
    DocEnd,
}

/// Turns sections into markup
pub trait SectionRenderer: Send + Sync {
    fn render(&self, section: Section<'_>) -> String;
}

/// Plain, escaped HTML tables
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHtmlRenderer;

impl DefaultHtmlRenderer {
    fn cells(tag: &str, row: &[Cell]) -> String {
        let cells: String = row
            .iter()
            .map(|cell| format!("<{tag}>{}</{tag}>", escape(&cell.text())))
            .collect();
        format!("<tr>{cells}</tr>\n")
    }
}

impl SectionRenderer for DefaultHtmlRenderer {
    fn render(&self, section: Section<'_>) -> String {
        match section {
            Section::DocBegin => {
                "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"></head>\n<body>\n".to_string()
            }
            Section::TableBegin { name } => format!("<h2>{}</h2>\n<table>\n", escape(name)),
            Section::FirstRow(row) => Self::cells("th", row),
            Section::Row(row) => Self::cells("td", row),
            Section::NoRows => "<tr><td>No rows</td></tr>\n".to_string(),
            Section::TableEnd => "</table>\n".to_string(),
            Section::DocEnd => "</body>\n</html>\n".to_string(),
        }
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn emit(table: &mut ScratchTable, renderer: &dyn SectionRenderer, section: Section<'_>) -> Result<()> {
    table.writer().write_all(renderer.render(section).as_bytes())?;
    Ok(())
}

fn append_row(table: &mut ScratchTable, renderer: &dyn SectionRenderer, row: &[Cell]) -> Result<()> {
    let section = if table.rows == 0 {
        Section::FirstRow(row)
    } else {
        Section::Row(row)
    };
    emit(table, renderer, section)?;
    table.rows += 1;
    Ok(())
}

/// Close the row part of a table, marking it when it had no data rows
fn end_rows(table: &mut ScratchTable, renderer: &dyn SectionRenderer) -> Result<()> {
    if table.rows <= 1 {
        emit(table, renderer, Section::NoRows)?;
    }
    Ok(())
}

/// Writer for the `html` format: one document, one section per table
pub struct HtmlWriter {
    renderer: Arc<dyn SectionRenderer>,
    tables: ScratchSet,
}

impl HtmlWriter {
    pub fn new() -> Self {
        Self::with_renderer(Arc::new(DefaultHtmlRenderer))
    }

    pub fn with_renderer(renderer: Arc<dyn SectionRenderer>) -> Self {
        Self {
            renderer,
            tables: ScratchSet::default(),
        }
    }

    fn assemble(&mut self) -> Result<Vec<u8>> {
        let renderer = self.renderer.as_ref();
        let mut out = renderer.render(Section::DocBegin).into_bytes();
        for table in self.tables.iter_mut() {
            end_rows(table, renderer)?;
            out.extend(renderer.render(Section::TableBegin { name: &table.title }).into_bytes());
            out.extend(table.contents()?);
            out.extend(renderer.render(Section::TableEnd).into_bytes());
        }
        out.extend(renderer.render(Section::DocEnd).into_bytes());
        Ok(out)
    }
}

impl Default for HtmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FormatWriter for HtmlWriter {
    async fn init_table(&mut self, tag: &str, title: &str) -> Result<()> {
        self.tables.add(tag, title)?;
        Ok(())
    }

    async fn write_row(&mut self, tag: &str, row: &[Cell]) -> Result<()> {
        append_row(self.tables.get_mut(tag)?, self.renderer.as_ref(), row)
    }

    async fn finish(&mut self) -> Result<Vec<u8>> {
        let result = self.assemble();
        self.tables.clear();
        result
    }
}

/// Writer for the `zipped-html` format: one complete document per table
pub struct HtmlArchiveWriter {
    renderer: Arc<dyn SectionRenderer>,
    tables: ScratchSet,
}

impl HtmlArchiveWriter {
    pub fn new() -> Self {
        Self::with_renderer(Arc::new(DefaultHtmlRenderer))
    }

    pub fn with_renderer(renderer: Arc<dyn SectionRenderer>) -> Self {
        Self {
            renderer,
            tables: ScratchSet::default(),
        }
    }

    fn assemble(&mut self) -> Result<Vec<u8>> {
        let renderer = self.renderer.as_ref();
        for table in self.tables.iter_mut() {
            end_rows(table, renderer)?;
            emit(table, renderer, Section::TableEnd)?;
            emit(table, renderer, Section::DocEnd)?;
        }
        zip_tables(&mut self.tables, "html")
    }
}

impl Default for HtmlArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FormatWriter for HtmlArchiveWriter {
    async fn init_table(&mut self, tag: &str, title: &str) -> Result<()> {
        let renderer = self.renderer.clone();
        let table = self.tables.add(tag, title)?;
        emit(table, renderer.as_ref(), Section::DocBegin)?;
        emit(table, renderer.as_ref(), Section::TableBegin { name: title })?;
        Ok(())
    }

    async fn write_row(&mut self, tag: &str, row: &[Cell]) -> Result<()> {
        append_row(self.tables.get_mut(tag)?, self.renderer.as_ref(), row)
    }

    async fn finish(&mut self) -> Result<Vec<u8>> {
        let result = self.assemble();
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
    use std::io::{Cursor, Read};

    /// Renders section names only
    struct Outline;

    impl SectionRenderer for Outline {
        fn render(&self, section: Section<'_>) -> String {
            match section {
                Section::DocBegin => "doc[".to_string(),
                Section::TableBegin { name } => format!("table:{name}["),
                Section::FirstRow(row) => format!("head:{};", row.len()),
                Section::Row(row) => format!("row:{};", row[0]),
                Section::NoRows => "empty;".to_string(),
                Section::TableEnd => "]".to_string(),
                Section::DocEnd => "]".to_string(),
            }
        }
    }

    fn headers() -> Vec<TableHeader> {
        vec![
            TableHeader::new("people", vec!["name".into(), "gender".into()]),
            TableHeader::new("offices", vec!["location".into()]),
        ]
    }

    fn people() -> Vec<ProjectedTable> {
        vec![ProjectedTable {
            tag: "people".to_string(),
            rows: vec![
                FormattedRow::header(&["danny", "male"]),
                FormattedRow::header(&["amelia", "female"]),
            ],
        }]
    }

    #[tokio::test]
    async fn test_section_order() {
        let mut writer = ExportWriter::new(Box::new(HtmlWriter::with_renderer(Arc::new(Outline))));
        writer.open(&headers(), &HashMap::new(), 2000).await.unwrap();
        writer.write(people()).await.unwrap();
        let html = String::from_utf8(writer.close().await.unwrap()).unwrap();

        assert_eq!(
            html,
            "doc[table:people[head:2;row:danny;row:amelia;]table:offices[head:1;empty;]]"
        );
    }

    #[tokio::test]
    async fn test_zipped_html_one_document_per_table() {
        let backend = HtmlArchiveWriter::with_renderer(Arc::new(Outline));
        let mut writer = ExportWriter::new(Box::new(backend));
        writer.open(&headers(), &HashMap::new(), 2000).await.unwrap();
        writer.write(people()).await.unwrap();
        let bytes = writer.close().await.unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut offices = String::new();
        archive.by_name("offices.html").unwrap().read_to_string(&mut offices).unwrap();
        assert_eq!(offices, "doc[table:offices[head:1;empty;]]");
    }

    #[tokio::test]
    async fn test_default_renderer_escapes() {
        let mut backend = HtmlWriter::new();
        backend.init_table("t", "A & B").await.unwrap();
        backend.write_row("t", &[Cell::from("<b>")]).await.unwrap();
        let html = String::from_utf8(backend.finish().await.unwrap()).unwrap();

        assert!(html.contains("<h2>A &amp; B</h2>"));
        assert!(html.contains("<th>&lt;b&gt;</th>"));
        assert!(html.contains("No rows"));
        assert!(html.ends_with("</html>\n"));
    }
}
