//! CSV Data Loader Module
//! Reads delimited microdata files into a Polars DataFrame.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Rows sampled when inferring column types.
const INFER_SCHEMA_ROWS: usize = 10000;

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not valid {encoding:?} text (byte offset {offset})")]
    Decode {
        path: PathBuf,
        encoding: TextEncoding,
        offset: usize,
    },
    #[error("Header of {path} split into {found} columns, expected {expected}")]
    ColumnCount {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
    #[error("{path} has no column(s) {missing:?}; header read as {found:?} (wrong delimiter?)")]
    MissingColumns {
        path: PathBuf,
        missing: Vec<String>,
        found: Vec<String>,
    },
    #[error("Failed to parse CSV: {0}")]
    Parse(#[from] PolarsError),
}

/// Text encoding of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    Utf8,
    /// ISO-8859-1, the encoding the microdata files are published in.
    #[default]
    Latin1,
}

impl TextEncoding {
    /// Decode raw bytes into UTF-8 text.
    ///
    /// Latin-1 maps every byte to the code point of the same value, so it
    /// cannot fail. On a UTF-8 error the offset of the first invalid byte is
    /// returned.
    pub fn decode(self, bytes: Vec<u8>) -> Result<String, usize> {
        match self {
            TextEncoding::Utf8 => String::from_utf8(bytes).map_err(|e| e.utf8_error().valid_up_to()),
            TextEncoding::Latin1 => {
                String::from_utf8(latin1_to_utf8(bytes)).map_err(|e| e.utf8_error().valid_up_to())
            }
        }
    }
}

/// Transcode Latin-1 to UTF-8 inside the same buffer.
///
/// Bytes above 0x7F become two-byte sequences, so the buffer grows by one byte
/// per such byte and is rewritten back to front. Pure ASCII input is returned
/// untouched.
fn latin1_to_utf8(mut bytes: Vec<u8>) -> Vec<u8> {
    let high = bytes.iter().filter(|b| !b.is_ascii()).count();
    if high == 0 {
        return bytes;
    }

    let len = bytes.len();
    bytes.resize(len + high, 0);
    let mut write = bytes.len();
    for read in (0..len).rev() {
        let b = bytes[read];
        if b.is_ascii() {
            write -= 1;
            bytes[write] = b;
        } else {
            write -= 2;
            bytes[write] = 0xC0 | (b >> 6);
            bytes[write + 1] = 0x80 | (b & 0x3F);
        }
    }
    bytes
}

/// Where and how to read a delimited file.
#[derive(Debug, Clone)]
pub struct CsvSource {
    pub path: PathBuf,
    pub encoding: TextEncoding,
    pub delimiter: u8,
    /// When set, the header must split into exactly this many columns.
    pub expected_columns: Option<usize>,
    /// Columns the header must contain.
    pub required_columns: Vec<String>,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>, encoding: TextEncoding, delimiter: u8) -> Self {
        Self {
            path: path.into(),
            encoding,
            delimiter,
            expected_columns: None,
            required_columns: Vec::new(),
        }
    }

    pub fn with_expected_columns(mut self, expected: usize) -> Self {
        self.expected_columns = Some(expected);
        self
    }

    pub fn with_required_columns(mut self, columns: &[&str]) -> Self {
        self.required_columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }
}

/// Load a delimited file into a DataFrame.
///
/// Columns follow the header row and rows keep file order. Cells that do not
/// parse as the inferred column type become null.
pub fn load_table(source: &CsvSource) -> Result<DataFrame, ReadError> {
    let bytes = read_bytes(&source.path)?;
    debug!(path = %source.path.display(), bytes = bytes.len(), "Read input file");

    let text = source
        .encoding
        .decode(bytes)
        .map_err(|offset| ReadError::Decode {
            path: source.path.clone(),
            encoding: source.encoding,
            offset,
        })?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .with_ignore_errors(true)
        .map_parse_options(|opts| opts.with_separator(source.delimiter))
        .into_reader_with_file_handle(Cursor::new(text.into_bytes()))
        .finish()?;

    if let Some(expected) = source.expected_columns {
        if df.width() != expected {
            return Err(ReadError::ColumnCount {
                path: source.path.clone(),
                expected,
                found: df.width(),
            });
        }
    }

    let missing: Vec<String> = source
        .required_columns
        .iter()
        .filter(|name| df.get_column_index(name).is_none())
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ReadError::MissingColumns {
            path: source.path.clone(),
            missing,
            found: df.get_column_names().iter().map(|s| s.to_string()).collect(),
        });
    }

    info!(
        path = %source.path.display(),
        rows = df.height(),
        columns = df.width(),
        "Loaded table"
    );
    Ok(df)
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, ReadError> {
    std::fs::read(path).map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })
}
