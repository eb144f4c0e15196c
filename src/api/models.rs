use std::collections::BTreeMap;

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ScrapeWebsitesArgs {
    /// Provider name -> URL. Provider names become part of the content file
    /// names.
    #[schemars(with = "BTreeMap<String, String>")]
    pub websites: IndexMap<String, String>,
    /// Formats to request, e.g. "markdown", "html". Defaults to both.
    #[serde(default)]
    pub formats: Option<Vec<String>>,
    /// Firecrawl API key; falls back to FIRECRAWL_API_KEY.
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExtractScrapedInfoArgs {
    /// Provider name, full URL, or domain to look for.
    pub identifier: String,
}
