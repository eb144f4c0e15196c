use chrono::Utc;
use indexmap::IndexMap;

use crate::error::Result;
use crate::firecrawl::ScrapeProvider;
use crate::store::{MetadataStore, RecordOutcome, ScrapeRecord};

pub const DEFAULT_FORMATS: [&str; 2] = ["markdown", "html"];

pub fn default_formats() -> Vec<String> {
    DEFAULT_FORMATS.iter().map(|f| f.to_string()).collect()
}

/// Result of scraping one provider within a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutcome {
    Scraped {
        provider: String,
        content_files: IndexMap<String, String>,
    },
    Failed {
        provider: String,
        error: String,
    },
}

impl ProviderOutcome {
    pub fn provider(&self) -> &str {
        match self {
            ProviderOutcome::Scraped { provider, .. }
            | ProviderOutcome::Failed { provider, .. } => provider,
        }
    }
}

/// Per-provider outcomes of one `scrape_websites` call, in input order.
#[derive(Debug, Clone, Default)]
pub struct ScrapeReport {
    pub outcomes: Vec<ProviderOutcome>,
}

impl ScrapeReport {
    pub fn succeeded(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ProviderOutcome::Scraped { .. }))
            .map(|o| o.provider().to_string())
            .collect()
    }

    pub fn failed(&self) -> Vec<&ProviderOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ProviderOutcome::Failed { .. }))
            .collect()
    }
}

/// Network location of a URL exactly as written: the authority between
/// `scheme://` and the next `/`, `?` or `#`, including any userinfo and
/// explicit port. Empty when the URL has no scheme or no `//` authority.
pub fn domain_of(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once(':') else {
        return String::new();
    };
    let valid_scheme = scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    let Some(authority) = rest.strip_prefix("//").filter(|_| valid_scheme) else {
        return String::new();
    };
    let end = authority.find(['/', '?', '#']).unwrap_or(authority.len());
    authority[..end].to_string()
}

pub fn content_filename(provider: &str, format: &str) -> String {
    format!("{}_{}.txt", provider, format)
}

fn is_safe_provider_name(provider: &str) -> bool {
    !provider.trim().is_empty() && !provider.contains(['/', '\\']) && !provider.contains("..")
}

struct ScrapedPage {
    content_files: IndexMap<String, String>,
    title: String,
    description: String,
}

/// Scrapes every website in turn and records each outcome in the store.
///
/// A provider that fails is recorded as a failure and the batch moves on;
/// only store-level errors (unreadable metadata, unwritable directory) abort
/// the call. The metadata file is written once, after the last provider.
pub async fn scrape_websites(
    store: &MetadataStore,
    scraper: &dyn ScrapeProvider,
    websites: &IndexMap<String, String>,
    formats: &[String],
) -> Result<ScrapeReport> {
    store.ensure_dir()?;
    let mut index = store.load()?;
    let mut report = ScrapeReport::default();

    for (provider, url) in websites {
        tracing::info!(provider = %provider, url = %url, "Scraping");

        let result = scrape_one(store, scraper, provider, url, formats).await;
        let (outcome, record_outcome) = match result {
            Ok(page) => {
                let files = page.content_files.len();
                tracing::info!(provider = %provider, files, "Successfully scraped");
                (
                    ProviderOutcome::Scraped {
                        provider: provider.clone(),
                        content_files: page.content_files.clone(),
                    },
                    RecordOutcome::Success {
                        content_files: page.content_files,
                        title: page.title,
                        description: page.description,
                    },
                )
            }
            Err(error) => {
                tracing::error!(provider = %provider, url = %url, %error, "Failed to scrape");
                (
                    ProviderOutcome::Failed {
                        provider: provider.clone(),
                        error: error.clone(),
                    },
                    RecordOutcome::Failure { error },
                )
            }
        };

        index.upsert(ScrapeRecord {
            provider_name: provider.clone(),
            url: url.clone(),
            domain: domain_of(url),
            scraped_at: Utc::now(),
            formats: formats.to_vec(),
            outcome: record_outcome,
        });
        report.outcomes.push(outcome);
    }

    store.save(&index)?;

    let succeeded = report.succeeded();
    tracing::info!(?succeeded, failed = report.failed().len(), "Scraping completed");
    Ok(report)
}

async fn scrape_one(
    store: &MetadataStore,
    scraper: &dyn ScrapeProvider,
    provider: &str,
    url: &str,
    formats: &[String],
) -> std::result::Result<ScrapedPage, String> {
    if !is_safe_provider_name(provider) {
        return Err(format!("provider name '{}' is not usable as a file name", provider));
    }

    let outcome = scraper.scrape(url, formats).await.map_err(|e| e.to_string())?;
    if !outcome.is_ok() {
        return Err(format!(
            "Scrape failed for {} at {} with error: {}",
            provider,
            url,
            outcome.error.as_deref().unwrap_or("Unknown error")
        ));
    }

    let mut content_files = IndexMap::new();
    for format in formats {
        let Some(content) = outcome.content.get(format).filter(|c| !c.is_empty()) else {
            continue;
        };
        let filename = content_filename(provider, format);
        store.write_content(&filename, content).map_err(|e| e.to_string())?;
        content_files.insert(format.clone(), filename);
    }

    Ok(ScrapedPage {
        content_files,
        title: outcome.title.unwrap_or_default(),
        description: outcome.description.unwrap_or_default(),
    })
}


#[cfg(test)]
mod tests {
    use super::testing::MockScraper;
    use super::*;
    use crate::error::AppError;

    fn websites(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn domain_is_the_network_location() {
        assert_eq!(domain_of("https://acme.example.com/page?q=1"), "acme.example.com");
        assert_eq!(domain_of("http://localhost:8080/x"), "localhost:8080");
        assert_eq!(domain_of("https://acme.example.com:443/page"), "acme.example.com:443");
        assert_eq!(domain_of("https://ACME.Example.com/page"), "ACME.Example.com");
        assert_eq!(domain_of("https://u:p@acme.example.com/page"), "u:p@acme.example.com");
        assert_eq!(domain_of("https://acme.example.com?q=1"), "acme.example.com");
        assert_eq!(domain_of("https://acme.example.com#top"), "acme.example.com");
        assert_eq!(domain_of("not a url"), "");
        assert_eq!(domain_of("mailto:someone@example.com"), "");
    }

    #[test]
    fn unsafe_provider_names() {
        assert!(is_safe_provider_name("cloudrift_ai"));
        assert!(!is_safe_provider_name("../etc"));
        assert!(!is_safe_provider_name("a/b"));
        assert!(!is_safe_provider_name(" "));
    }

    #[tokio::test]
    async fn partial_failure_batch() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path().join("scraped_content"));
        let scraper = MockScraper::default()
            .page("https://a.example.com", "# A", "<h1>A</h1>")
            .page("https://c.example.com", "# C", "<h1>C</h1>");

        let report = scrape_websites(
            &store,
            &scraper,
            &websites(&[
                ("alpha", "https://a.example.com"),
                ("bravo", "https://b.example.com"),
                ("charlie", "https://c.example.com"),
            ]),
            &default_formats(),
        )
        .await
        .unwrap();

        assert_eq!(report.succeeded(), ["alpha", "charlie"]);
        assert_eq!(report.failed().len(), 1);
        assert_eq!(scraper.calls.lock().unwrap().len(), 3);

        let index = store.load().unwrap();
        assert_eq!(index.len(), 3);
        assert!(index.get("alpha").unwrap().is_success());
        assert!(index.get("charlie").unwrap().is_success());
        match &index.get("bravo").unwrap().outcome {
            RecordOutcome::Failure { error } => assert!(error.contains("connection refused")),
            other => panic!("expected failure, got {other:?}"),
        }

        assert_eq!(store.read_content("alpha_markdown.txt").unwrap(), "# A");
        assert_eq!(store.read_content("charlie_html.txt").unwrap(), "<h1>C</h1>");
    }

    #[tokio::test]
    async fn non_200_status_is_recorded_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        let scraper = MockScraper::default()
            .status("https://gone.example.com", 404, Some("Not Found"))
            .status("https://odd.example.com", 500, None);

        let report = scrape_websites(
            &store,
            &scraper,
            &websites(&[("gone", "https://gone.example.com"), ("odd", "https://odd.example.com")]),
            &default_formats(),
        )
        .await
        .unwrap();

        assert!(report.succeeded().is_empty());
        let index = store.load().unwrap();
        let RecordOutcome::Failure { error } = &index.get("gone").unwrap().outcome else {
            panic!("expected failure");
        };
        assert_eq!(
            error,
            "Scrape failed for gone at https://gone.example.com with error: Not Found"
        );
        let RecordOutcome::Failure { error } = &index.get("odd").unwrap().outcome else {
            panic!("expected failure");
        };
        assert!(error.ends_with("with error: Unknown error"));
        assert!(!store.content_path("gone_markdown.txt").exists());
    }

    #[tokio::test]
    async fn empty_content_is_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        let scraper = MockScraper::default().page("https://acme.example.com", "# Acme", "");

        let sites = websites(&[("acme", "https://acme.example.com")]);
        scrape_websites(&store, &scraper, &sites, &default_formats())
            .await
            .unwrap();

        let index = store.load().unwrap();
        let record = index.get("acme").unwrap();
        let files = record.content_files().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files["markdown"], "acme_markdown.txt");
        assert_eq!(record.formats, ["markdown", "html"]);
        assert_eq!(record.domain, "acme.example.com");
        assert!(!store.content_path("acme_html.txt").exists());
    }

    #[tokio::test]
    async fn rescrape_overwrites_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        let sites = websites(&[("acme", "https://acme.example.com")]);

        let ok = MockScraper::default().page("https://acme.example.com", "# Acme", "<h1>Acme</h1>");
        scrape_websites(&store, &ok, &sites, &default_formats()).await.unwrap();

        let broken = MockScraper::default().status(
            "https://acme.example.com",
            503,
            Some("Service Unavailable"),
        );
        let report = scrape_websites(&store, &broken, &sites, &["markdown".to_string()])
            .await
            .unwrap();

        assert!(report.succeeded().is_empty());
        let index = store.load().unwrap();
        assert_eq!(index.len(), 1);
        let record = index.get("acme").unwrap();
        assert!(!record.is_success());
        assert_eq!(record.formats, ["markdown"]);
        // content from the earlier run is left on disk
        assert!(store.content_path("acme_html.txt").exists());
    }

    #[tokio::test]
    async fn unsafe_provider_name_is_a_failure_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path().join("out"));
        let scraper = MockScraper::default().page("https://acme.example.com", "# Acme", "");

        let report = scrape_websites(
            &store,
            &scraper,
            &websites(&[("../escape", "https://acme.example.com")]),
            &default_formats(),
        )
        .await
        .unwrap();

        assert!(report.succeeded().is_empty());
        assert!(scraper.calls.lock().unwrap().is_empty());
        assert!(!dir.path().join("escape_markdown.txt").exists());
        assert!(!store.load().unwrap().get("../escape").unwrap().is_success());
    }

    #[tokio::test]
    async fn stored_domain_keeps_the_written_authority() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        let url = "https://acme.example.com:443/page";
        let scraper = MockScraper::default().page(url, "# Acme", "");

        scrape_websites(&store, &scraper, &websites(&[("acme", url)]), &default_formats())
            .await
            .unwrap();

        let index = store.load().unwrap();
        assert_eq!(index.get("acme").unwrap().domain, "acme.example.com:443");
        assert_eq!(index.find("acme.example.com:443").unwrap().provider_name, "acme");
        assert!(index.find("acme.example.com").is_none());
    }

    #[tokio::test]
    async fn corrupt_store_aborts_before_scraping() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        std::fs::write(store.metadata_path(), "garbage").unwrap();
        let scraper = MockScraper::default().page("https://acme.example.com", "# Acme", "");

        let sites = websites(&[("acme", "https://acme.example.com")]);
        let err = scrape_websites(&store, &scraper, &sites, &default_formats())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::CorruptStore { .. }));
        assert!(scraper.calls.lock().unwrap().is_empty());
        assert_eq!(std::fs::read_to_string(store.metadata_path()).unwrap(), "garbage");
    }
}
