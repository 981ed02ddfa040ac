//! Per-table scratch files
//!
//! Formats that assemble their artifact at the end (archives, HTML) spool
//! each table to an anonymous temporary file. The files are unlinked by the
//! operating system as soon as their handles drop, on success and error
//! paths alike.

use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};

use crate::error::{Result, WriterError};

/// One spooled table
pub(crate) struct ScratchTable {
    pub tag: String,
    pub title: String,
    /// Rows written so far, header included
    pub rows: usize,
    out: BufWriter<File>,
}

impl ScratchTable {
    fn create(tag: &str, title: &str) -> Result<Self> {
        let file = tempfile::tempfile()?;
        Ok(Self {
            tag: tag.to_string(),
            title: title.to_string(),
            rows: 0,
            out: BufWriter::new(file),
        })
    }

    pub fn writer(&mut self) -> &mut BufWriter<File> {
        &mut self.out
    }

    /// Everything written so far
    pub fn contents(&mut self) -> Result<Vec<u8>> {
        self.out.flush()?;
        let file = self.out.get_mut();
        file.seek(SeekFrom::Start(0))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

/// Scratch tables in creation order
#[derive(Default)]
pub(crate) struct ScratchSet {
    tables: Vec<ScratchTable>,
}

impl ScratchSet {
    pub fn add(&mut self, tag: &str, title: &str) -> Result<&mut ScratchTable> {
        self.tables.push(ScratchTable::create(tag, title)?);
        let last = self.tables.len() - 1;
        Ok(&mut self.tables[last])
    }

    pub fn get_mut(&mut self, tag: &str) -> Result<&mut ScratchTable> {
        self.tables
            .iter_mut()
            .find(|t| t.tag == tag)
            .ok_or_else(|| WriterError::UnknownTable(tag.to_string()).into())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ScratchTable> {
        self.tables.iter_mut()
    }

    pub fn first_mut(&mut self) -> Option<&mut ScratchTable> {
        self.tables.first_mut()
    }

    /// Drop every scratch file
    pub fn clear(&mut self) {
        self.tables.clear();
    }
}
