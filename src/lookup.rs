use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::error::Result;
use crate::store::{MetadataStore, RecordOutcome, ScrapeRecord};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapedInfo {
    pub provider_name: String,
    pub url: String,
    pub domain: String,
    pub scraped_at: DateTime<Utc>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// format -> full text of the stored content file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<IndexMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(ScrapedInfo),
    NotFound(String),
}

impl Lookup {
    /// Text returned to the tool caller.
    pub fn render(&self) -> Result<String> {
        match self {
            Lookup::Found(info) => Ok(serde_json::to_string_pretty(info)?),
            Lookup::NotFound(message) => Ok(message.clone()),
        }
    }
}

pub fn not_found_message(identifier: &str) -> String {
    format!("There's no saved information related to identifier '{}'.", identifier)
}

/// Looks up a scraped site by provider name, URL or domain and loads its
/// content files.
///
/// Fails when the metadata file is missing or unreadable. A record whose
/// content files cannot all be read is reported as not found.
pub fn extract_scraped_info(store: &MetadataStore, identifier: &str) -> Result<Lookup> {
    tracing::info!(identifier, "Extracting information");
    let index = store.load_existing()?;

    let Some(record) = index.find(identifier) else {
        return Ok(Lookup::NotFound(not_found_message(identifier)));
    };

    let mut content = None;
    if let Some(files) = record.content_files() {
        let mut loaded = IndexMap::new();
        for (format, filename) in files {
            match store.read_content(filename) {
                Ok(text) => {
                    loaded.insert(format.clone(), text);
                }
                Err(error) => {
                    tracing::error!(
                        provider = %record.provider_name,
                        %error,
                        "Error reading content file"
                    );
                    return Ok(Lookup::NotFound(not_found_message(identifier)));
                }
            }
        }
        content = Some(loaded);
    }

    Ok(Lookup::Found(info_for(record, content)))
}

fn info_for(record: &ScrapeRecord, content: Option<IndexMap<String, String>>) -> ScrapedInfo {
    let (title, description, error) = match &record.outcome {
        RecordOutcome::Success {
            title, description, ..
        } => (Some(title.clone()), Some(description.clone()), None),
        RecordOutcome::Failure { error } => (None, None, Some(error.clone())),
    };
    ScrapedInfo {
        provider_name: record.provider_name.clone(),
        url: record.url.clone(),
        domain: record.domain.clone(),
        scraped_at: record.scraped_at,
        success: record.is_success(),
        title,
        description,
        error,
        content,
    }
}
