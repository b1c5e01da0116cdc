//! CSV reader and writer for review records.
//!
//! Rows are kept positionally, so duplicate column names and the exact header
//! text survive the round trip. A UTF-8 byte-order mark in front of the first
//! header name is ignored when resolving column names and written back out
//! unchanged.

use std::{
    fs::File,
    io::{BufRead, BufReader, Read, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{info, warn};

const BOM: char = '\u{feff}';
const BOM_BYTES: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("column {column:?} not found; detected headers: {headers:?}")]
    MissingColumn { column: String, headers: Vec<String> },
    #[error("input has no header row")]
    NoHeader,
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Strip a leading byte-order mark from a header name.
pub fn clean_header(name: &str) -> &str {
    name.trim_start_matches(BOM)
}

/// Header layout shared by every record of one input.
#[derive(Debug, PartialEq, Eq)]
struct Columns {
    /// Header names with the byte-order mark removed.
    names: Vec<String>,
    /// First position of each name.
    positions: IndexMap<String, usize>,
    text_index: usize,
}

/// One input row, stored by position in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRecord {
    columns: Arc<Columns>,
    values: Vec<String>,
}

impl ReviewRecord {
    /// The review body.
    pub fn text(&self) -> &str {
        &self.values[self.columns.text_index]
    }

    /// Replace the review body, leaving every other column untouched.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.values[self.columns.text_index] = text.into();
    }

    /// Value of the first column called `column`.
    pub fn get(&self, column: &str) -> Option<&str> {
        let idx = *self.columns.positions.get(clean_header(column))?;
        self.values.get(idx).map(String::as_str)
    }

    /// Values in header order, one per column.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns.names
    }
}

/// Header-keyed review stream over any reader.
pub struct ReviewReader<R> {
    inner: csv::Reader<BufReader<R>>,
    raw_headers: Vec<String>,
    columns: Arc<Columns>,
}

impl ReviewReader<File> {
    pub fn open(path: &Path, text_column: &str) -> Result<Self, RecordError> {
        let file = File::open(path).map_err(|err| RecordError::Open {
            path: path.to_path_buf(),
            source: csv::Error::from(err),
        })?;
        Self::from_reader(file, text_column)
    }
}

impl<R: Read> ReviewReader<R> {
    pub fn from_reader(rdr: R, text_column: &str) -> Result<Self, RecordError> {
        let mut buffered = BufReader::new(rdr);
        let has_bom = buffered.fill_buf()?.starts_with(BOM_BYTES);

        let mut inner = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(buffered);
        let mut raw_headers: Vec<String> = inner.headers()?.iter().map(String::from).collect();
        if raw_headers.is_empty() {
            return Err(RecordError::NoHeader);
        }
        // the csv reader drops the mark; put it back for the writer
        if has_bom && !raw_headers[0].starts_with(BOM) {
            raw_headers[0].insert(0, BOM);
        }

        let names: Vec<String> = raw_headers
            .iter()
            .map(|h| clean_header(h).to_string())
            .collect();
        info!(fieldnames = ?names, bom = has_bom, "detected input fields");

        let mut positions = IndexMap::new();
        for (idx, name) in names.iter().enumerate() {
            positions.entry(name.clone()).or_insert(idx);
        }

        let wanted = clean_header(text_column);
        let text_index = *positions
            .get(wanted)
            .ok_or_else(|| RecordError::MissingColumn {
                column: wanted.to_string(),
                headers: names.clone(),
            })?;

        Ok(Self {
            inner,
            raw_headers,
            columns: Arc::new(Columns {
                names,
                positions,
                text_index,
            }),
        })
    }

    /// Field names in input order, byte-order mark removed.
    pub fn headers(&self) -> &[String] {
        &self.columns.names
    }

    /// Header exactly as it appeared in the input, for writing back out.
    pub fn raw_headers(&self) -> &[String] {
        &self.raw_headers
    }

    pub fn text_column(&self) -> &str {
        &self.columns.names[self.columns.text_index]
    }

    pub fn text_index(&self) -> usize {
        self.columns.text_index
    }

    /// Lazily yield records in file order. Reopen the file to restart.
    pub fn records(&mut self) -> impl Iterator<Item = Result<ReviewRecord, RecordError>> + '_ {
        let columns = &self.columns;
        self.inner
            .records()
            .map(move |row| -> Result<ReviewRecord, RecordError> {
                let row = row?;
                let width = columns.names.len();
                if row.len() > width {
                    warn!(
                        line = row.position().map(|p| p.line()),
                        extra = row.len() - width,
                        "dropping fields beyond the header"
                    );
                }
                let values = (0..width)
                    .map(|idx| row.get(idx).unwrap_or_default().to_string())
                    .collect();
                Ok(ReviewRecord {
                    columns: Arc::clone(columns),
                    values,
                })
            })
    }
}

/// Writer emitting the input header once, then one row per record.
pub struct ReviewWriter<W: Write> {
    inner: csv::Writer<W>,
    rows: u64,
}

impl ReviewWriter<File> {
    /// Create (or truncate) `path` and write the header.
    pub fn create(path: &Path, headers: &[String]) -> Result<Self, RecordError> {
        let file = File::create(path).map_err(|err| RecordError::Open {
            path: path.to_path_buf(),
            source: csv::Error::from(err),
        })?;
        Self::from_writer(file, headers)
    }
}

impl<W: Write> ReviewWriter<W> {
    pub fn from_writer(wtr: W, headers: &[String]) -> Result<Self, RecordError> {
        let mut inner = csv::Writer::from_writer(wtr);
        inner.write_record(headers)?;
        Ok(Self { inner, rows: 0 })
    }

    pub fn write(&mut self, record: &ReviewRecord) -> Result<(), RecordError> {
        self.inner.write_record(record.values())?;
        self.rows += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), RecordError> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> Result<W, RecordError> {
        self.inner
            .into_inner()
            .map_err(|err| RecordError::Io(err.into_error()))
    }
}
