//! The on-disk metadata index.
//!
//! Everything the server knows about past scrapes lives in one JSON file,
//! `scraped_metadata.json`, next to the content files it references. The file
//! maps provider name to its latest [`ScrapeRecord`]. It is read once at the
//! start of a tool call and, for scrapes, written once at the end.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

pub const METADATA_FILE: &str = "scraped_metadata.json";

/// Outcome-specific part of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Success {
        /// format -> file name relative to the store directory
        content_files: IndexMap<String, String>,
        title: String,
        description: String,
    },
    Failure {
        error: String,
    },
}

/// One scrape attempt for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRecord", into = "RawRecord")]
pub struct ScrapeRecord {
    pub provider_name: String,
    pub url: String,
    pub domain: String,
    pub scraped_at: DateTime<Utc>,
    pub formats: Vec<String>,
    pub outcome: RecordOutcome,
}

impl ScrapeRecord {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RecordOutcome::Success { .. })
    }

    pub fn content_files(&self) -> Option<&IndexMap<String, String>> {
        match &self.outcome {
            RecordOutcome::Success { content_files, .. } if !content_files.is_empty() => {
                Some(content_files)
            }
            _ => None,
        }
    }
}

/// Flat on-disk layout shared by success and failure records.
#[derive(Serialize, Deserialize)]
struct RawRecord {
    provider_name: String,
    url: String,
    domain: String,
    scraped_at: String,
    formats: Vec<String>,
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content_files: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl TryFrom<RawRecord> for ScrapeRecord {
    type Error = String;

    fn try_from(raw: RawRecord) -> std::result::Result<Self, Self::Error> {
        let scraped_at = parse_timestamp(&raw.scraped_at)?;
        let outcome = if raw.success {
            RecordOutcome::Success {
                content_files: raw.content_files.unwrap_or_default(),
                title: raw.title.unwrap_or_default(),
                description: raw.description.unwrap_or_default(),
            }
        } else {
            RecordOutcome::Failure {
                error: raw.error.ok_or_else(|| {
                    format!("failed record for '{}' has no error", raw.provider_name)
                })?,
            }
        };

        Ok(ScrapeRecord {
            provider_name: raw.provider_name,
            url: raw.url,
            domain: raw.domain,
            scraped_at,
            formats: raw.formats,
            outcome,
        })
    }
}

impl From<ScrapeRecord> for RawRecord {
    fn from(record: ScrapeRecord) -> Self {
        let mut raw = RawRecord {
            provider_name: record.provider_name,
            url: record.url,
            domain: record.domain,
            scraped_at: record.scraped_at.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true),
            formats: record.formats,
            success: false,
            content_files: None,
            title: None,
            description: None,
            error: None,
        };
        match record.outcome {
            RecordOutcome::Success {
                content_files,
                title,
                description,
            } => {
                raw.success = true;
                raw.content_files = Some(content_files);
                raw.title = Some(title);
                raw.description = Some(description);
            }
            RecordOutcome::Failure { error } => raw.error = Some(error),
        }
        raw
    }
}

/// Accepts RFC 3339, or a naive ISO-8601 timestamp taken to be UTC.
fn parse_timestamp(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("invalid scraped_at '{}': {}", value, e))
}

/// In-memory copy of the metadata file, in file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScrapeIndex(IndexMap<String, ScrapeRecord>);

impl ScrapeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any record stored under the same provider name. A replaced
    /// entry keeps its position.
    pub fn upsert(&mut self, record: ScrapeRecord) {
        self.0.insert(record.provider_name.clone(), record);
    }

    pub fn get(&self, provider_name: &str) -> Option<&ScrapeRecord> {
        self.0.get(provider_name)
    }

    /// First record, in file order, whose key, URL or domain equals
    /// `identifier`. The key is the provider name the record is stored under.
    /// URLs and domains are not unique across providers, so an earlier record
    /// sharing a domain shadows later ones.
    pub fn find(&self, identifier: &str) -> Option<&ScrapeRecord> {
        self.0
            .iter()
            .find(|(key, record)| {
                key.as_str() == identifier
                    || record.url == identifier
                    || record.domain == identifier
            })
            .map(|(_, record)| record)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScrapeRecord> {
        self.0.values()
    }
}

/// Handle on a scrape output directory and its metadata file.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    dir: PathBuf,
}

impl MetadataStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    pub fn content_path(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// Resolves a content file name, refusing anything that is not a single
    /// plain component inside the store directory.
    fn contained_path(&self, filename: &str) -> Result<PathBuf> {
        let mut components = Path::new(filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.content_path(filename)),
            _ => Err(AppError::CorruptStore {
                path: self.metadata_path(),
                message: format!("content file '{}' is outside {}", filename, self.dir.display()),
            }),
        }
    }

    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| AppError::io(&self.dir, e))
    }

    /// Reads the index, treating a missing file as empty.
    pub fn load(&self) -> Result<ScrapeIndex> {
        match self.read_index() {
            Err(AppError::StoreNotFound(_)) => Ok(ScrapeIndex::new()),
            other => other,
        }
    }

    /// Reads the index, failing if no scrape has ever written it.
    pub fn load_existing(&self) -> Result<ScrapeIndex> {
        self.read_index()
    }

    fn read_index(&self) -> Result<ScrapeIndex> {
        let path = self.metadata_path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(AppError::StoreNotFound(path)),
            Err(e) => return Err(AppError::io(path, e)),
        };
        serde_json::from_str(&raw).map_err(|e| AppError::CorruptStore {
            path,
            message: e.to_string(),
        })
    }

    /// Rewrites the whole metadata file. The new content goes to a sibling
    /// temp file first and is renamed over the old one.
    pub fn save(&self, index: &ScrapeIndex) -> Result<()> {
        self.ensure_dir()?;
        let path = self.metadata_path();
        let tmp = path.with_extension("json.tmp");

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        index.serialize(&mut ser)?;

        fs::write(&tmp, &buf).map_err(|e| AppError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| AppError::io(&path, e))?;
        tracing::debug!(path = %path.display(), records = index.len(), "Saved scrape metadata");
        Ok(())
    }

    pub fn write_content(&self, filename: &str, content: &str) -> Result<()> {
        let path = self.contained_path(filename)?;
        fs::write(&path, content).map_err(|e| AppError::io(path, e))
    }

    pub fn read_content(&self, filename: &str) -> Result<String> {
        let path = self.contained_path(filename)?;
        fs::read_to_string(&path).map_err(|e| AppError::io(path, e))
    }
}
