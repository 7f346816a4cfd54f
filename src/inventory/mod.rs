//! Input inventory: what the user dropped into `inputs/`, classified by
//! extension. The scan is persisted to `runtime/inputs-inventory.json` and its
//! summary seeds new jobs.

use crate::orchestration::manifest::InventorySummary;
use crate::shared::fs_atomic::atomic_write_file;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const INVENTORY_FILE_NAME: &str = "inputs-inventory.json";

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "tiff", "bmp", "gif"];
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "docx", "txt", "md", "html", "rtf", "odt"];
const DATA_EXTENSIONS: &[&str] = &["csv", "json", "xml", "yaml", "yml"];
const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "ogg", "m4a"];

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("json error at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Image,
    Document,
    Data,
    Audio,
    Unknown,
}

impl FileKind {
    pub fn classify(path: &Path) -> Self {
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            return Self::Unknown;
        };
        let ext = ext.to_ascii_lowercase();
        let ext = ext.as_str();
        if IMAGE_EXTENSIONS.contains(&ext) {
            Self::Image
        } else if DOCUMENT_EXTENSIONS.contains(&ext) {
            Self::Document
        } else if DATA_EXTENSIONS.contains(&ext) {
            Self::Data
        } else if AUDIO_EXTENSIONS.contains(&ext) {
            Self::Audio
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Document => "document",
            Self::Data => "data",
            Self::Audio => "audio",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Path relative to the inputs dir, `/`-separated.
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    pub size_bytes: u64,
    pub full_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub scanned_at: DateTime<Utc>,
    pub inputs_dir: PathBuf,
    pub total_files: u64,
    pub total_size_bytes: u64,
    pub type_counts: BTreeMap<String, u64>,
    pub items: Vec<InventoryItem>,
}

impl InventorySnapshot {
    pub fn summary(&self) -> InventorySummary {
        InventorySummary {
            total_files: self.total_files,
            type_counts: self.type_counts.clone(),
        }
    }

    pub fn paths_of(&self, kind: FileKind) -> Vec<&str> {
        self.items
            .iter()
            .filter(|item| item.kind == kind)
            .map(|item| item.path.as_str())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct InventoryScanner {
    inputs_dir: PathBuf,
    runtime_dir: PathBuf,
}

impl InventoryScanner {
    pub fn new(inputs_dir: impl Into<PathBuf>, runtime_dir: impl Into<PathBuf>) -> Self {
        Self {
            inputs_dir: inputs_dir.into(),
            runtime_dir: runtime_dir.into(),
        }
    }

    pub fn inputs_dir(&self) -> &Path {
        &self.inputs_dir
    }

    pub fn inventory_path(&self) -> PathBuf {
        self.runtime_dir.join(INVENTORY_FILE_NAME)
    }

    /// Walks `inputs/` recursively and persists the snapshot. Files that
    /// cannot be stat'ed are skipped with a warning.
    pub fn scan(&self) -> Result<InventorySnapshot, InventoryError> {
        for dir in [&self.inputs_dir, &self.runtime_dir] {
            fs::create_dir_all(dir).map_err(|err| io_error(dir, err))?;
        }

        let mut items = Vec::new();
        collect_files(&self.inputs_dir, &self.inputs_dir, &mut items)?;
        items.sort_by(|a, b| a.path.cmp(&b.path));

        let mut type_counts = BTreeMap::new();
        let mut total_size_bytes = 0u64;
        for item in &items {
            *type_counts.entry(item.kind.as_str().to_string()).or_insert(0) += 1;
            total_size_bytes += item.size_bytes;
        }

        let snapshot = InventorySnapshot {
            scanned_at: Utc::now(),
            inputs_dir: self.inputs_dir.clone(),
            total_files: items.len() as u64,
            total_size_bytes,
            type_counts,
            items,
        };
        self.persist(&snapshot)?;
        tracing::info!(
            inputs_dir = %self.inputs_dir.display(),
            total_files = snapshot.total_files,
            "inventory scanned"
        );
        Ok(snapshot)
    }

    /// The last persisted snapshot, if any scan has run.
    pub fn load_latest(&self) -> Result<Option<InventorySnapshot>, InventoryError> {
        let path = self.inventory_path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_error(&path, err)),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| InventoryError::Json {
                path: path.display().to_string(),
                source,
            })
    }

    fn persist(&self, snapshot: &InventorySnapshot) -> Result<(), InventoryError> {
        let path = self.inventory_path();
        let body = serde_json::to_vec_pretty(snapshot).map_err(|source| InventoryError::Json {
            path: path.display().to_string(),
            source,
        })?;
        atomic_write_file(&path, &body).map_err(|err| io_error(&path, err))
    }
}

fn collect_files(
    dir: &Path,
    base: &Path,
    items: &mut Vec<InventoryItem>,
) -> Result<(), InventoryError> {
    let entries = fs::read_dir(dir).map_err(|err| io_error(dir, err))?;
    for entry in entries {
        let entry = entry.map_err(|err| io_error(dir, err))?;
        let path = entry.path();
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping unreadable input");
                continue;
            }
        };
        if metadata.is_dir() {
            collect_files(&path, base, items)?;
            continue;
        }
        if !metadata.is_file() {
            continue;
        }
        let relative = path
            .strip_prefix(base)
            .unwrap_or(path.as_path())
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        items.push(InventoryItem {
            path: relative,
            kind: FileKind::classify(&path),
            size_bytes: metadata.len(),
            full_path: path,
        });
    }
    Ok(())
}

fn io_error(path: &Path, source: std::io::Error) -> InventoryError {
    InventoryError::Io {
        path: path.display().to_string(),
        source,
    }
}
