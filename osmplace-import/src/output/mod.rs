//! COPY-text row emitter.
//!
//! Streams rows to the database sink in PostgreSQL `COPY ... FROM STDIN`
//! text form: tab-separated columns, `\N` for NULL, hstore maps as
//! `"k"=>"v"` lists, geometry as hex-encoded WKB. Rows are buffered and
//! flushed in batches; any write failure is fatal to the import.

use std::fmt::Write as _;
use std::io::{self, Write};

use thiserror::Error;

/// Failure pushing rows into the sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write COPY data to the sink")]
    Write(#[source] io::Error),
}

/// Destination table descriptor, e.g. `place(place_id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTarget {
    pub name: String,
    pub id_column: String,
}

impl TableTarget {
    pub fn new(name: impl Into<String>, id_column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_column: id_column.into(),
        }
    }
}

const DEFAULT_BATCH_ROWS: usize = 1000;

/// Buffered COPY-text writer over any byte sink.
///
/// # Examples
/// ```
/// use osmplace_import::output::{CopyWriter, TableTarget};
///
/// let table = TableTarget::new("place", "place_id");
/// let mut out = Vec::new();
/// let mut writer = CopyWriter::new(&mut out);
/// writer.new_line(&table);
/// writer.add_column_num(1);
/// writer.add_column_str("N");
/// writer.add_null_column();
/// writer.finish_line().unwrap();
/// writer.flush().unwrap();
/// assert_eq!(out, b"1\tN\t\\N\n");
/// ```
pub struct CopyWriter<W: Write> {
    sink: W,
    buf: String,
    rows_in_buf: usize,
    batch_rows: usize,
    first_column: bool,
    first_hash_elem: bool,
}

impl<W: Write> CopyWriter<W> {
    pub fn new(sink: W) -> Self {
        Self::with_batch_rows(sink, DEFAULT_BATCH_ROWS)
    }

    pub fn with_batch_rows(sink: W, batch_rows: usize) -> Self {
        Self {
            sink,
            buf: String::new(),
            rows_in_buf: 0,
            batch_rows: batch_rows.max(1),
            first_column: true,
            first_hash_elem: true,
        }
    }

    /// Begin a row bound to the given table.
    pub fn new_line(&mut self, _table: &TableTarget) {
        self.first_column = true;
    }

    pub fn add_column_num(&mut self, value: i64) {
        self.column_sep();
        let _ = write!(self.buf, "{value}");
    }

    pub fn add_column_char(&mut self, value: char) {
        self.column_sep();
        match value {
            '\\' => self.buf.push_str("\\\\"),
            '\t' => self.buf.push_str("\\t"),
            '\n' => self.buf.push_str("\\n"),
            '\r' => self.buf.push_str("\\r"),
            _ => self.buf.push(value),
        }
    }

    pub fn add_column_str(&mut self, value: &str) {
        self.column_sep();
        push_copy_escaped(&mut self.buf, value);
    }

    pub fn add_null_column(&mut self) {
        self.column_sep();
        self.buf.push_str("\\N");
    }

    /// Begin an hstore-valued column.
    pub fn new_hash(&mut self) {
        self.column_sep();
        self.first_hash_elem = true;
    }

    pub fn add_hash_elem(&mut self, key: &str, value: &str) {
        self.hash_sep();
        self.buf.push('"');
        push_hash_escaped(&mut self.buf, key);
        self.buf.push_str("\"=>\"");
        push_hash_escaped(&mut self.buf, value);
        self.buf.push('"');
    }

    /// Hash element whose value needs no escaping (ISO timestamps and
    /// similar machine-generated strings).
    pub fn add_hash_elem_raw(&mut self, key: &str, value: &str) {
        self.hash_sep();
        self.buf.push('"');
        push_hash_escaped(&mut self.buf, key);
        self.buf.push_str("\"=>\"");
        self.buf.push_str(value);
        self.buf.push('"');
    }

    pub fn add_hash_num(&mut self, key: &str, value: i64) {
        self.hash_sep();
        self.buf.push('"');
        push_hash_escaped(&mut self.buf, key);
        let _ = write!(self.buf, "\"=>\"{value}\"");
    }

    pub fn finish_hash(&mut self) {}

    /// Geometry column: WKB hex-encoded on the way out.
    pub fn add_hex_geom(&mut self, wkb: &[u8]) {
        self.column_sep();
        for byte in wkb {
            let _ = write!(self.buf, "{byte:02X}");
        }
    }

    /// Terminate the row; flushes when the batch is full.
    pub fn finish_line(&mut self) -> Result<(), SinkError> {
        self.buf.push('\n');
        self.rows_in_buf += 1;
        if self.rows_in_buf >= self.batch_rows {
            self.flush()?;
        }
        Ok(())
    }

    /// Push all buffered rows to the sink.
    pub fn flush(&mut self) -> Result<(), SinkError> {
        if !self.buf.is_empty() {
            self.sink
                .write_all(self.buf.as_bytes())
                .map_err(SinkError::Write)?;
            self.buf.clear();
            self.rows_in_buf = 0;
        }
        self.sink.flush().map_err(SinkError::Write)
    }

    fn column_sep(&mut self) {
        if self.first_column {
            self.first_column = false;
        } else {
            self.buf.push('\t');
        }
    }

    fn hash_sep(&mut self) {
        if self.first_hash_elem {
            self.first_hash_elem = false;
        } else {
            self.buf.push(',');
        }
    }
}

/// COPY text escaping: backslash, tab, newline, carriage return.
fn push_copy_escaped(buf: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '\\' => buf.push_str("\\\\"),
            '\t' => buf.push_str("\\t"),
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            _ => buf.push(c),
        }
    }
}

/// Hstore element escaping layered under the COPY escaping: a literal
/// quote must reach the server as `\"` and a backslash as `\\`.
fn push_hash_escaped(buf: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '\\' => buf.push_str("\\\\\\\\"),
            '"' => buf.push_str("\\\\\""),
            '\t' => buf.push_str("\\t"),
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            _ => buf.push(c),
        }
    }
}
