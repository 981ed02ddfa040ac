//! Spreadsheet writers
//!
//! - [`WorkbookWriter`] (`xlsx`) appends rows to `rust_xlsxwriter`
//!   worksheets; code points a workbook cannot hold become `?`.
//! - [`LegacyWorkbookWriter`] (`xls`) fills a random-access cell grid per
//!   sheet and renders it as an Excel 2003 XML spreadsheet, which legacy
//!   spreadsheet applications open as `.xls`.
//!
//! Both cap sheet names at 31 characters.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use async_trait::async_trait;
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::error::{Result, WriterError};
use crate::projection::Cell;

use super::FormatWriter;

/// Sheet-name cap shared by both spreadsheet formats
pub const MAX_SHEET_NAME_SIZE: usize = 31;

/// Last row index (0-based) of an xlsx sheet
const XLSX_MAX_ROW: u32 = 1_048_575;

/// Grid limits of a legacy sheet
const XLS_MAX_ROWS: u32 = 65_536;
const XLS_MAX_COLUMNS: u16 = 256;

/// Replace code points spreadsheets cannot store with `?`
fn clean_text(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{00}'..='\u{08}'
            | '\u{0b}'..='\u{1f}'
            | '\u{7f}'..='\u{84}'
            | '\u{86}'..='\u{9f}'
            | '\u{fdd0}'..='\u{fddf}'
            | '\u{fffe}'..='\u{ffff}' => '?',
            other => other,
        })
        .collect()
}

fn too_large(what: &str, title: &str) -> WriterError {
    WriterError::Backend(format!("sheet '{title}' exceeds the {what} limit"))
}

struct Sheet {
    tag: String,
    sheet: Worksheet,
    next_row: u32,
}

/// Writer for the `xlsx` format
#[derive(Default)]
pub struct WorkbookWriter {
    sheets: Vec<Sheet>,
}

impl WorkbookWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FormatWriter for WorkbookWriter {
    fn max_table_name_size(&self) -> usize {
        MAX_SHEET_NAME_SIZE
    }

    async fn init_table(&mut self, tag: &str, title: &str) -> Result<()> {
        let mut sheet = Worksheet::new();
        sheet.set_name(title)?;
        self.sheets.push(Sheet {
            tag: tag.to_string(),
            sheet,
            next_row: 0,
        });
        Ok(())
    }

    async fn write_row(&mut self, tag: &str, row: &[Cell]) -> Result<()> {
        let target = self
            .sheets
            .iter_mut()
            .find(|s| s.tag == tag)
            .ok_or_else(|| WriterError::UnknownTable(tag.to_string()))?;

        let row_index = target.next_row;
        if row_index > XLSX_MAX_ROW {
            return Err(too_large("row", tag).into());
        }
        for (i, cell) in row.iter().enumerate() {
            let col = u16::try_from(i).map_err(|_| too_large("column", tag))?;
            match cell {
                Cell::Null => {}
                Cell::Bool(b) => {
                    target.sheet.write_boolean(row_index, col, *b)?;
                }
                Cell::Number(n) => match n.as_f64() {
                    Some(f) => {
                        target.sheet.write_number(row_index, col, f)?;
                    }
                    None => {
                        target.sheet.write_string(row_index, col, n.to_string())?;
                    }
                },
                Cell::Text(s) => {
                    target.sheet.write_string(row_index, col, clean_text(s))?;
                }
                Cell::Error(constant) => {
                    target.sheet.write_string(row_index, col, constant.message())?;
                }
            }
        }
        target.next_row += 1;
        Ok(())
    }

    async fn finish(&mut self) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        for sheet in self.sheets.drain(..) {
            workbook.push_worksheet(sheet.sheet);
        }
        Ok(workbook.save_to_buffer()?)
    }
}

/// One legacy sheet: a sparse grid addressed by (row, column)
struct Grid {
    tag: String,
    title: String,
    cells: BTreeMap<(u32, u16), String>,
    next_row: u32,
}

impl Grid {
    fn set_cell(&mut self, row: u32, col: u16, value: String) -> Result<()> {
        if row >= XLS_MAX_ROWS {
            return Err(too_large("row", &self.title).into());
        }
        if col >= XLS_MAX_COLUMNS {
            return Err(too_large("column", &self.title).into());
        }
        self.cells.insert((row, col), value);
        Ok(())
    }

    fn render(&self, out: &mut String) {
        let _ = writeln!(out, " <Worksheet ss:Name=\"{}\">", xml_escape(&self.title));
        out.push_str("  <Table>\n");
        let mut current_row = None;
        for ((row, col), value) in &self.cells {
            if current_row != Some(*row) {
                if current_row.is_some() {
                    out.push_str("   </Row>\n");
                }
                let _ = writeln!(out, "   <Row ss:Index=\"{}\">", row + 1);
                current_row = Some(*row);
            }
            let _ = writeln!(
                out,
                "    <Cell ss:Index=\"{}\"><Data ss:Type=\"String\">{}</Data></Cell>",
                col + 1,
                xml_escape(value)
            );
        }
        if current_row.is_some() {
            out.push_str("   </Row>\n");
        }
        out.push_str("  </Table>\n </Worksheet>\n");
    }
}

fn xml_escape(text: &str) -> String {
    clean_text(text)
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Writer for the `xls` format
#[derive(Default)]
pub struct LegacyWorkbookWriter {
    sheets: Vec<Grid>,
}

impl LegacyWorkbookWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FormatWriter for LegacyWorkbookWriter {
    fn max_table_name_size(&self) -> usize {
        MAX_SHEET_NAME_SIZE
    }

    async fn init_table(&mut self, tag: &str, title: &str) -> Result<()> {
        self.sheets.push(Grid {
            tag: tag.to_string(),
            title: title.to_string(),
            cells: BTreeMap::new(),
            next_row: 0,
        });
        Ok(())
    }

    async fn write_row(&mut self, tag: &str, row: &[Cell]) -> Result<()> {
        let grid = self
            .sheets
            .iter_mut()
            .find(|g| g.tag == tag)
            .ok_or_else(|| WriterError::UnknownTable(tag.to_string()))?;

        let row_index = grid.next_row;
        for (i, cell) in row.iter().enumerate() {
            if cell.is_null() {
                continue;
            }
            let col = u16::try_from(i).unwrap_or(u16::MAX);
            grid.set_cell(row_index, col, cell.text())?;
        }
        grid.next_row += 1;
        Ok(())
    }

    async fn finish(&mut self) -> Result<Vec<u8>> {
        let mut out = String::from(concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<?mso-application progid=\"Excel.Sheet\"?>\n",
            "<Workbook xmlns=\"urn:schemas-microsoft-com:office:spreadsheet\" ",
            "xmlns:ss=\"urn:schemas-microsoft-com:office:spreadsheet\">\n"
        ));
        if self.sheets.is_empty() {
            out.push_str(" <Worksheet ss:Name=\"Sheet1\">\n  <Table>\n  </Table>\n </Worksheet>\n");
        }
        for grid in self.sheets.drain(..) {
            grid.render(&mut out);
        }
        out.push_str("</Workbook>\n");
        Ok(out.into_bytes())
    }
}
