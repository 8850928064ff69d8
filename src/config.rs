//! Run settings: file locations, municipality and CSV dialects.
//!
//! Defaults match the published microdata layout. A JSON file may override
//! any subset of the fields; command-line flags are applied on top by the
//! binary.

use crate::data::{CsvSource, TextEncoding, SELECTED_COLUMNS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Delimiter {0:?} is not a single ASCII character")]
    Delimiter(char),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Raw microdata file, as published.
    pub raw_path: PathBuf,
    /// Comma-delimited file the analysis commands read.
    pub intermediate_path: PathBuf,
    /// Where `export` writes the combinations CSV.
    pub combinations_path: PathBuf,
    pub municipality: String,
    pub encoding: TextEncoding,
    pub raw_delimiter: char,
    pub intermediate_delimiter: char,
    pub chart_dir: PathBuf,
    pub chart_width: u32,
    pub chart_height: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            raw_path: PathBuf::from("MICRODADOS_ENEM_2023.csv"),
            intermediate_path: PathBuf::from("MICRODADOS_ENEM_2023_FILTERED.csv"),
            combinations_path: PathBuf::from("ENEM_2023_COMBINATIONS.csv"),
            municipality: "Fortaleza".to_string(),
            encoding: TextEncoding::Latin1,
            raw_delimiter: ';',
            intermediate_delimiter: ',',
            chart_dir: PathBuf::from("charts"),
            chart_width: 1400,
            chart_height: 800,
        }
    }
}

impl Settings {
    /// Defaults, overridden by `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Source for the raw semicolon-delimited file.
    pub fn raw_source(&self) -> Result<CsvSource, ConfigError> {
        Ok(CsvSource::new(
            &self.raw_path,
            self.encoding,
            delimiter_byte(self.raw_delimiter)?,
        )
        .with_required_columns(&SELECTED_COLUMNS))
    }

    /// Source for the comma-delimited intermediate file.
    pub fn intermediate_source(&self) -> Result<CsvSource, ConfigError> {
        Ok(CsvSource::new(
            &self.intermediate_path,
            self.encoding,
            delimiter_byte(self.intermediate_delimiter)?,
        )
        .with_required_columns(&SELECTED_COLUMNS))
    }
}

fn delimiter_byte(c: char) -> Result<u8, ConfigError> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(ConfigError::Delimiter(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{load_table, ReadError};

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings =
            Settings::from_json(r#"{ "municipality": "Recife", "encoding": "utf8" }"#).unwrap();
        assert_eq!(settings.municipality, "Recife");
        assert_eq!(settings.encoding, TextEncoding::Utf8);
        assert_eq!(settings.raw_delimiter, ';');
        assert_eq!(settings.chart_dir, PathBuf::from("charts"));
    }

    #[test]
    fn test_sources_use_configured_delimiters() {
        let settings = Settings::default();
        assert_eq!(settings.raw_source().unwrap().delimiter, b';');
        let source = settings.intermediate_source().unwrap();
        assert_eq!(source.delimiter, b',');
        assert_eq!(source.encoding, TextEncoding::Latin1);
        assert_eq!(source.required_columns, SELECTED_COLUMNS.to_vec());
    }

    #[test]
    fn test_intermediate_with_wrong_delimiter_fails_to_load() {
        let path = std::env::temp_dir().join("enem_scores_semicolon_intermediate.csv");
        std::fs::write(
            &path,
            "NO_MUNICIPIO_PROVA;TP_ESCOLA;NU_NOTA_CN;NU_NOTA_CH;NU_NOTA_LC;NU_NOTA_MT;NU_NOTA_REDACAO\n\
             Fortaleza;2;500;510;490;520;600\n",
        )
        .unwrap();
        let settings = Settings {
            intermediate_path: path.clone(),
            ..Settings::default()
        };

        let result = load_table(&settings.intermediate_source().unwrap());
        match result {
            Err(ReadError::MissingColumns { missing, .. }) => {
                assert_eq!(missing, SELECTED_COLUMNS.to_vec());
            }
            other => panic!("expected missing columns error, got {other:?}"),
        }
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        let settings = Settings {
            raw_delimiter: '§',
            ..Settings::default()
        };
        assert!(matches!(
            settings.raw_source(),
            Err(ConfigError::Delimiter('§'))
        ));
    }

    #[test]
    fn test_missing_config_file() {
        let path = std::env::temp_dir().join("enem_scores_no_such_config.json");
        assert!(matches!(
            Settings::load(Some(&path)),
            Err(ConfigError::Io { .. })
        ));
        assert_eq!(Settings::load(None).unwrap(), Settings::default());
    }
}
