//! Upload configuration (the flat form map) and process settings (TOML + environment).

use crate::errors::ImportError;
use crate::parse::ParseOptions;
use crate::sniff::Classification;
use crate::types::{Delimiter, FileKind, TextEncoding};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// User-confirmed parsing configuration for one upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportConfig {
    pub dataset_name: String,
    pub dataset_description: Option<String>,
    pub delimiter: Delimiter,
    pub encoding: TextEncoding,
    pub has_header: bool,
}

impl ImportConfig {
    pub fn new(dataset_name: impl Into<String>) -> Self {
        Self {
            dataset_name: dataset_name.into(),
            dataset_description: None,
            delimiter: Delimiter::Comma,
            encoding: TextEncoding::Utf8,
            has_header: true,
        }
    }

    /// Parses the recognized keys of a flat request map; unknown keys are ignored.
    ///
    /// # Errors
    /// `Validation` for an unknown delimiter, encoding or boolean spelling.
    /// An empty name is reported later by [`ImportConfig::validate`].
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, ImportError> {
        let overrides = ParseOverrides::from_params(params)?;
        let mut cfg = Self::new(params.get("dataset_name").map(|s| s.trim().to_string()).unwrap_or_default());
        cfg.dataset_description = params
            .get("dataset_description")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        cfg.delimiter = overrides.delimiter.unwrap_or_default();
        cfg.encoding = overrides.encoding.unwrap_or_default();
        cfg.has_header = overrides.has_header.unwrap_or(true);
        Ok(cfg)
    }

    /// # Errors
    /// `Validation` when the dataset name is blank.
    pub fn validate(&self) -> Result<(), ImportError> {
        if self.dataset_name.trim().is_empty() {
            return Err(ImportError::validation("dataset_name must not be empty"));
        }
        Ok(())
    }
}

/// Parsing choices a caller made explicitly; absent ones fall back to the sniffed values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOverrides {
    pub delimiter: Option<Delimiter>,
    pub encoding: Option<TextEncoding>,
    pub has_header: Option<bool>,
}

impl ParseOverrides {
    /// # Errors
    /// `Validation` for an unknown delimiter, encoding or boolean spelling.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, ImportError> {
        let mut out = Self::default();
        if let Some(d) = params.get("delimiter")
            && !d.is_empty()
        {
            out.delimiter = Some(
                Delimiter::parse(d).ok_or_else(|| ImportError::validation(format!("unsupported delimiter {d:?}")))?,
            );
        }
        if let Some(e) = params.get("encoding")
            && !e.trim().is_empty()
        {
            out.encoding = Some(
                TextEncoding::parse(e).ok_or_else(|| ImportError::validation(format!("unsupported encoding {e:?}")))?,
            );
        }
        if let Some(h) = params.get("has_header")
            && !h.trim().is_empty()
        {
            out.has_header =
                Some(parse_bool(h).ok_or_else(|| ImportError::validation(format!("invalid has_header value {h:?}")))?);
        }
        Ok(out)
    }

    pub fn resolve(&self, classification: &Classification) -> ParseOptions {
        ParseOptions {
            delimiter: self.delimiter.or(classification.delimiter).unwrap_or_default(),
            encoding: self.encoding.unwrap_or(classification.encoding),
            has_header: self.has_header.unwrap_or(true),
        }
    }
}

pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Append-log file; `None` keeps everything in memory.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    pub max_file_size: u64,
    pub allowed_types: Vec<FileKind>,
    pub preview_rows: usize,
    pub batch_size: usize,
    pub sniff_sample_bytes: usize,
    pub sniff_lines: usize,
    /// Files up to this size are fully scanned for an exact preview row count.
    pub full_scan_bytes: u64,
    pub progress_every: u64,
    pub max_warnings: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            allowed_types: vec![FileKind::Csv, FileKind::Json, FileKind::Xml],
            preview_rows: 10,
            batch_size: 500,
            sniff_sample_bytes: 64 * 1024,
            sniff_lines: 20,
            full_scan_bytes: 1024 * 1024,
            progress_every: 1000,
            max_warnings: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingSettings {
    pub default_per_page: usize,
    pub max_per_page: usize,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self { default_per_page: 20, max_per_page: 200 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub dir: Option<PathBuf>,
    pub level: Option<String>,
    pub retention: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub import: ImportSettings,
    pub listing: ListingSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Parses a TOML document; missing sections and keys take their defaults.
    ///
    /// # Errors
    /// `Validation` with the TOML diagnostic.
    pub fn from_toml_str(s: &str) -> Result<Self, ImportError> {
        toml::from_str(s).map_err(|e| ImportError::validation(format!("invalid settings: {e}")))
    }

    /// Loads settings with precedence: explicit path > `CROCKDATA_CONFIG` > `./crockdata.toml`
    /// > `<config dir>/crockdata/config.toml` > defaults, then applies environment overrides.
    ///
    /// # Errors
    /// I/O errors reading an explicitly named file, or a parse error in the first file found.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ImportError> {
        let mut settings = Self::default();
        if let Some(p) = explicit {
            let s = std::fs::read_to_string(p)?;
            settings = Self::from_toml_str(&s)?;
        } else if let Some(p) = Self::candidate_paths().into_iter().find(|p| p.exists()) {
            log::debug!("settings: loading {}", p.display());
            let s = std::fs::read_to_string(&p)?;
            settings = Self::from_toml_str(&s)?;
        }
        settings.apply_env(|k| std::env::var(k).ok());
        Ok(settings)
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(p) = std::env::var("CROCKDATA_CONFIG") {
            paths.push(PathBuf::from(p));
        }
        if let Ok(cur) = std::env::current_dir() {
            paths.push(cur.join("crockdata.toml"));
        }
        if let Some(dir) = dirs_next::config_dir() {
            paths.push(dir.join("crockdata").join("config.toml"));
        }
        paths
    }

    /// Environment overrides, read through `get` so tests need not touch the process env.
    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, get: F) {
        if let Some(p) = get("CROCKDATA_DB").filter(|s| !s.is_empty()) {
            self.storage.path = Some(PathBuf::from(p));
        }
        if let Some(n) = get("CROCKDATA_MAX_FILE_SIZE").and_then(|s| s.parse().ok()) {
            self.import.max_file_size = n;
        }
        if let Some(n) = get("CROCKDATA_BATCH_SIZE").and_then(|s| s.parse().ok()) {
            self.import.batch_size = n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::request as params;

    #[test]
    fn defaults_when_keys_absent() {
        let cfg = ImportConfig::from_params(&params(&[("dataset_name", "Sales")])).unwrap();
        assert_eq!(cfg.delimiter, Delimiter::Comma);
        assert_eq!(cfg.encoding, TextEncoding::Utf8);
        assert!(cfg.has_header);
        assert!(cfg.dataset_description.is_none());
        cfg.validate().unwrap();
    }

    #[test]
    fn parses_form_values() {
        let cfg = ImportConfig::from_params(&params(&[
            ("dataset_name", "x"),
            ("delimiter", "\\t"),
            ("encoding", "windows-1252"),
            ("has_header", "0"),
            ("dataset_description", "  d  "),
        ]))
        .unwrap();
        assert_eq!(cfg.delimiter, Delimiter::Tab);
        assert_eq!(cfg.encoding, TextEncoding::Windows1252);
        assert!(!cfg.has_header);
        assert_eq!(cfg.dataset_description.as_deref(), Some("d"));
    }

    #[test]
    fn blank_values_keep_defaults() {
        let cfg = ImportConfig::from_params(&params(&[
            ("dataset_name", "x"),
            ("has_header", ""),
            ("delimiter", ""),
            ("encoding", " "),
        ]))
        .unwrap();
        assert!(cfg.has_header);
        assert_eq!(cfg.delimiter, Delimiter::Comma);
        assert_eq!(cfg.encoding, TextEncoding::Utf8);
        assert_eq!(ParseOverrides::from_params(&params(&[("has_header", "  ")])).unwrap().has_header, None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn rejects_bad_values_and_blank_name() {
        assert!(ImportConfig::from_params(&params(&[("delimiter", "#")])).is_err());
        assert!(ImportConfig::from_params(&params(&[("encoding", "ebcdic")])).is_err());
        assert!(ImportConfig::from_params(&params(&[("has_header", "maybe")])).is_err());
        let cfg = ImportConfig::from_params(&params(&[("dataset_name", "   ")])).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn overrides_fall_back_to_sniffed_values() {
        let sniffed = Classification {
            kind: FileKind::Csv,
            delimiter: Some(Delimiter::Semicolon),
            encoding: TextEncoding::Iso88591,
            warnings: Vec::new(),
        };
        let none = ParseOverrides::from_params(&params(&[])).unwrap().resolve(&sniffed);
        assert_eq!(none.delimiter, Delimiter::Semicolon);
        assert_eq!(none.encoding, TextEncoding::Iso88591);
        assert!(none.has_header);
        let chosen = ParseOverrides::from_params(&params(&[("delimiter", "|"), ("has_header", "false")]))
            .unwrap()
            .resolve(&sniffed);
        assert_eq!(chosen.delimiter, Delimiter::Pipe);
        assert!(!chosen.has_header);
    }

    #[test]
    fn toml_sections_and_env_overrides() {
        let mut s = Settings::from_toml_str(
            "[import]\nmax_file_size = 1024\nallowed_types = [\"csv\"]\n[listing]\nmax_per_page = 5\n",
        )
        .unwrap();
        assert_eq!(s.import.max_file_size, 1024);
        assert_eq!(s.import.allowed_types, vec![FileKind::Csv]);
        assert_eq!(s.import.batch_size, 500);
        assert_eq!(s.listing.max_per_page, 5);
        s.apply_env(|k| match k {
            "CROCKDATA_BATCH_SIZE" => Some("7".into()),
            "CROCKDATA_DB" => Some("/tmp/x.log".into()),
            _ => None,
        });
        assert_eq!(s.import.batch_size, 7);
        assert_eq!(s.storage.path, Some(PathBuf::from("/tmp/x.log")));
    }
}
