//! Incremental CSV shape scanner.
//!
//! Bytes are fed in arbitrary chunks; only the header fields are kept in
//! memory, data records are counted and discarded.

use chat_types::{ChatError, Result};

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Shape of a scanned CSV document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvShape {
    pub column_names: Vec<String>,
    pub row_count: u64,
}

#[derive(Debug, Default)]
pub struct CsvScanner {
    header: Option<Vec<String>>,
    // Header fields collected so far; data fields are only counted
    pending_header: Vec<String>,
    field: Vec<u8>,
    fields_in_record: usize,
    record_started: bool,
    at_field_start: bool,
    in_quotes: bool,
    quote_pending: bool,
    rows: u64,
    line: u64,
    // Leading bytes held back until a byte-order mark is ruled in or out
    lead: Vec<u8>,
    lead_checked: bool,
}

impl CsvScanner {
    pub fn new() -> Self {
        Self {
            at_field_start: true,
            line: 1,
            ..Default::default()
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Result<()> {
        let mut rest = chunk;
        if !self.lead_checked {
            let take = (BOM.len() - self.lead.len()).min(rest.len());
            self.lead.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.lead.len() < BOM.len() && BOM.starts_with(&self.lead) {
                return Ok(());
            }
            self.release_lead()?;
        }
        for &b in rest {
            self.step(b)?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<CsvShape> {
        if !self.lead_checked {
            self.release_lead()?;
        }
        if self.quote_pending {
            self.quote_pending = false;
            self.in_quotes = false;
        }
        if self.in_quotes {
            return Err(ChatError::MalformedCsv(format!(
                "unterminated quoted field starting before line {}",
                self.line
            )));
        }
        if self.record_started {
            self.end_record()?;
        }
        let column_names = self
            .header
            .ok_or_else(|| ChatError::MalformedCsv("no header row".to_string()))?;
        Ok(CsvShape {
            column_names,
            row_count: self.rows,
        })
    }

    fn release_lead(&mut self) -> Result<()> {
        self.lead_checked = true;
        let lead = std::mem::take(&mut self.lead);
        if lead != BOM {
            for b in lead {
                self.step(b)?;
            }
        }
        Ok(())
    }

    fn step(&mut self, b: u8) -> Result<()> {
        if self.in_quotes {
            if self.quote_pending {
                self.quote_pending = false;
                if b == b'"' {
                    self.push(b'"');
                    return Ok(());
                }
                // Closing quote; `b` is handled as unquoted input below
                self.in_quotes = false;
            } else {
                if b == b'"' {
                    self.quote_pending = true;
                } else {
                    if b == b'\n' {
                        self.line += 1;
                    }
                    self.push(b);
                }
                return Ok(());
            }
        }

        match b {
            b'"' if self.at_field_start => {
                self.in_quotes = true;
                self.record_started = true;
                self.at_field_start = false;
            }
            b',' => self.end_field()?,
            b'\n' => {
                if self.record_started {
                    self.end_record()?;
                }
                self.line += 1;
            }
            b'\r' => {}
            _ => self.push(b),
        }
        Ok(())
    }

    fn push(&mut self, b: u8) {
        self.record_started = true;
        self.at_field_start = false;
        if self.header.is_none() {
            self.field.push(b);
        }
    }

    fn end_field(&mut self) -> Result<()> {
        self.record_started = true;
        self.at_field_start = true;
        self.fields_in_record += 1;
        if self.header.is_none() {
            let raw = std::mem::take(&mut self.field);
            let name = String::from_utf8(raw).map_err(|_| {
                ChatError::MalformedCsv("header row is not valid UTF-8".to_string())
            })?;
            self.pending_header.push(name);
        }
        Ok(())
    }

    fn end_record(&mut self) -> Result<()> {
        self.end_field()?;
        match &self.header {
            None => self.header = Some(std::mem::take(&mut self.pending_header)),
            Some(columns) => {
                if self.fields_in_record > columns.len() {
                    return Err(ChatError::MalformedCsv(format!(
                        "expected {} fields in line {}, saw {}",
                        columns.len(),
                        self.line,
                        self.fields_in_record
                    )));
                }
                self.rows += 1;
            }
        }
        self.fields_in_record = 0;
        self.record_started = false;
        self.at_field_start = true;
        Ok(())
    }
}

/// Scan a complete in-memory document.
pub fn scan_bytes(data: &[u8]) -> Result<CsvShape> {
    let mut scanner = CsvScanner::new();
    scanner.feed(data)?;
    scanner.finish()
}
