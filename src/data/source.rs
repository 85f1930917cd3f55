//! Dataset retrieval.
//!
//! A [`DatasetSource`] turns a dataset name (e.g. `unemployment_rates`) into a
//! local CSV path. The pipeline never cares where the file came from:
//!
//! - [`LocalDatasetSource`]: `<dir>/<name>.csv`, or the first `*.csv` under
//!   `<dir>/<name>/` (downloaded dataset bundles unpack into directories)
//! - [`HttpDatasetSource`]: downloads `{base_url}/{name}.csv` into a cache dir
//! - `data::sample::SampleDatasetSource`: writes synthetic tables
//!
//! Retrieval is one-shot: no retries, failures surface immediately.

use std::fs;
use std::path::{Path, PathBuf};

use reqwest::blocking::Client;

use crate::error::AppError;

/// Environment variable holding the HTTP source's base URL.
pub const DATASET_URL_ENV: &str = "MACRO_ALIGN_DATASET_URL";

/// Directory recursion depth when looking for CSV files inside a bundle.
const DEFAULT_SEARCH_DEPTH: usize = 4;

pub trait DatasetSource {
    /// Resolve `name` to a readable CSV file.
    fn fetch(&self, name: &str) -> Result<PathBuf, AppError>;

    /// Short label for logs and reports.
    fn describe(&self) -> String;
}

/// Datasets already on disk.
#[derive(Debug, Clone)]
pub struct LocalDatasetSource {
    root: PathBuf,
}

impl LocalDatasetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DatasetSource for LocalDatasetSource {
    fn fetch(&self, name: &str) -> Result<PathBuf, AppError> {
        let direct = self.root.join(format!("{name}.csv"));
        if direct.is_file() {
            return Ok(direct);
        }

        let bundle = self.root.join(name);
        if bundle.is_file() {
            return validate_csv_path(&bundle);
        }
        if bundle.is_dir() {
            let files = find_csv_files(&bundle, DEFAULT_SEARCH_DEPTH);
            if files.len() > 1 {
                log::warn!(
                    "Dataset '{name}' contains {} CSV files; using '{}'.",
                    files.len(),
                    pretty_path(&files[0])
                );
            }
            return files.into_iter().next().ok_or_else(|| {
                AppError::new(
                    2,
                    format!("No .csv files found under '{}'.", bundle.display()),
                )
            });
        }

        Err(AppError::new(
            2,
            format!(
                "Dataset '{name}' not found: expected '{}' or a directory '{}'.",
                direct.display(),
                bundle.display()
            ),
        ))
    }

    fn describe(&self) -> String {
        format!("local:{}", self.root.display())
    }
}

/// Datasets downloaded over HTTP into a cache directory.
pub struct HttpDatasetSource {
    client: Client,
    base_url: String,
    cache_dir: PathBuf,
}

impl HttpDatasetSource {
    pub fn new(base_url: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache_dir: cache_dir.into(),
        }
    }

    /// Build from `MACRO_ALIGN_DATASET_URL` (a `.env` file is honoured).
    pub fn from_env(cache_dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let base_url = std::env::var(DATASET_URL_ENV)
            .map_err(|_| AppError::new(2, format!("Missing {DATASET_URL_ENV} in environment (.env).")))?;
        Ok(Self::new(base_url, cache_dir))
    }

    fn url_for(&self, name: &str) -> String {
        format!("{}/{name}.csv", self.base_url)
    }
}

impl DatasetSource for HttpDatasetSource {
    fn fetch(&self, name: &str) -> Result<PathBuf, AppError> {
        let url = self.url_for(name);
        log::info!("Downloading dataset '{name}' from {url}");

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| AppError::new(4, format!("Dataset request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::new(
                4,
                format!("Dataset request for '{name}' failed with status {}.", resp.status()),
            ));
        }

        let body = resp
            .bytes()
            .map_err(|e| AppError::new(4, format!("Failed to read dataset '{name}': {e}")))?;

        fs::create_dir_all(&self.cache_dir).map_err(|e| {
            AppError::new(
                2,
                format!("Failed to create cache directory '{}': {e}", self.cache_dir.display()),
            )
        })?;
        let path = self.cache_dir.join(format!("{name}.csv"));
        fs::write(&path, &body)
            .map_err(|e| AppError::new(2, format!("Failed to write '{}': {e}", path.display())))?;

        log::info!("Cached '{name}' ({} bytes) at '{}'.", body.len(), path.display());
        Ok(path)
    }

    fn describe(&self) -> String {
        format!("http:{}", self.base_url)
    }
}

/// Validate the provided path points to a `.csv` file.
pub fn validate_csv_path(path: &Path) -> Result<PathBuf, AppError> {
    if !path.exists() {
        return Err(AppError::new(
            2,
            format!("CSV file not found: {}", path.display()),
        ));
    }
    if path.is_dir() {
        return Err(AppError::new(
            2,
            format!("Expected a file, got a directory: {}", path.display()),
        ));
    }
    if !has_csv_extension(path) {
        return Err(AppError::new(
            2,
            format!("Expected a .csv file (got: {}).", path.display()),
        ));
    }

    Ok(path.to_path_buf())
}

/// `*.csv` files under `root`, in deterministic order.
pub fn find_csv_files(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    let mut out = Vec::new();
    find_csv_files_inner(root, 0, max_depth, &mut out);
    out.sort_by_key(|p| pretty_path(p));
    out
}

fn find_csv_files_inner(root: &Path, depth: usize, max_depth: usize, out: &mut Vec<PathBuf>) {
    if depth > max_depth {
        return;
    }

    let Ok(entries) = fs::read_dir(root) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            if !should_skip_dir(&path) {
                find_csv_files_inner(&path, depth + 1, max_depth, out);
            }
        } else if file_type.is_file() && has_csv_extension(&path) {
            out.push(path);
        }
    }
}

fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn should_skip_dir(path: &Path) -> bool {
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
    matches!(name, ".git" | "target" | "node_modules")
}

fn pretty_path(path: &Path) -> String {
    let stripped = path.strip_prefix("./").unwrap_or(path);
    stripped.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_source_prefers_named_csv() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("unemployment_rates.csv"), "TIME_PERIOD\n").unwrap();
        let source = LocalDatasetSource::new(dir.path());
        let path = source.fetch("unemployment_rates").unwrap();
        assert!(path.ends_with("unemployment_rates.csv"));
    }

    #[test]
    fn local_source_searches_bundle_directories() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = dir.path().join("global-inflation-data/versions/1");
        fs::create_dir_all(&bundle).unwrap();
        fs::write(bundle.join("global_inflation_data.csv"), "country_name\n").unwrap();
        fs::write(bundle.join("notes.txt"), "ignored").unwrap();

        let source = LocalDatasetSource::new(dir.path());
        let path = source.fetch("global-inflation-data").unwrap();
        assert!(path.ends_with("global_inflation_data.csv"));
    }

    #[test]
    fn missing_dataset_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalDatasetSource::new(dir.path()).fetch("nope").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("nope"));
    }

    #[test]
    fn validate_rejects_non_csv() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("a.txt");
        fs::write(&txt, "x").unwrap();
        assert!(validate_csv_path(&txt).is_err());
        assert!(validate_csv_path(dir.path()).is_err());
    }

    #[test]
    fn http_urls_join_base_and_name() {
        let source = HttpDatasetSource::new("https://example.org/datasets/", "cache");
        assert_eq!(
            source.url_for("unemployment_rates"),
            "https://example.org/datasets/unemployment_rates.csv"
        );
        assert_eq!(source.describe(), "http:https://example.org/datasets");
    }
}
