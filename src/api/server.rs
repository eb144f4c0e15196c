use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler, ServiceExt,
    model::{
        CallToolRequestParam, CallToolResult, Implementation, JsonObject, ListToolsResult,
        PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext,
    transport::stdio,
};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::AppState;
use crate::api::models::{ExtractScrapedInfoArgs, ScrapeWebsitesArgs};
use crate::api::response;
use crate::config::resolve_api_key;
use crate::error::{AppError, Result};
use crate::firecrawl::FirecrawlClient;
use crate::lookup;
use crate::scraper::{self, default_formats};

pub const SCRAPE_WEBSITES: &str = "scrape_websites";
pub const EXTRACT_SCRAPED_INFO: &str = "extract_scraped_info";

/// MCP server exposing the scrape and lookup tools.
#[derive(Clone)]
pub struct ScrapeServer {
    state: AppState,
}

impl ScrapeServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn tools() -> Vec<Tool> {
        vec![
            Tool::new(
                SCRAPE_WEBSITES,
                "Scrape multiple websites using Firecrawl and store their content. \
                 Returns the provider names that were scraped successfully.",
                input_schema::<ScrapeWebsitesArgs>(),
            ),
            Tool::new(
                EXTRACT_SCRAPED_INFO,
                "Extract information about a scraped website by provider name, full URL, or domain.",
                input_schema::<ExtractScrapedInfoArgs>(),
            ),
        ]
    }

    /// Dispatches one tool call by name.
    pub async fn call(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> std::result::Result<CallToolResult, McpError> {
        let result = match name {
            SCRAPE_WEBSITES => self.run_scrape_websites(arguments).await,
            EXTRACT_SCRAPED_INFO => self.run_extract_scraped_info(arguments).await,
            other => return Err(McpError::invalid_params(format!("Unknown tool: {}", other), None)),
        };

        result.or_else(|err| {
            tracing::warn!(tool = name, error = %err, "Tool call failed");
            response::error(err)
        })
    }

    async fn run_scrape_websites(&self, arguments: Option<JsonObject>) -> Result<CallToolResult> {
        let args = parse_args::<ScrapeWebsitesArgs>(arguments)?;
        let succeeded = self.scrape_websites(args).await?;
        response::json(&succeeded)
    }

    async fn run_extract_scraped_info(
        &self,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult> {
        let args = parse_args::<ExtractScrapedInfoArgs>(arguments)?;
        let text = self.extract_scraped_info(args).await?;
        Ok(response::success(text))
    }

    pub async fn scrape_websites(&self, args: ScrapeWebsitesArgs) -> Result<Vec<String>> {
        if args.websites.is_empty() {
            return Err(AppError::InvalidArguments("websites must not be empty".to_string()));
        }
        let formats = args
            .formats
            .filter(|formats| !formats.is_empty())
            .unwrap_or_else(default_formats);
        let api_key = resolve_api_key(args.api_key.as_deref(), |key| (self.state.env)(key))?;
        let client = FirecrawlClient::new(self.state.config.firecrawl_url.clone(), api_key);

        let store = self.state.store.lock().await;
        let report = scraper::scrape_websites(&store, &client, &args.websites, &formats).await?;
        Ok(report.succeeded())
    }

    pub async fn extract_scraped_info(&self, args: ExtractScrapedInfoArgs) -> Result<String> {
        let store = self.state.store.lock().await;
        lookup::extract_scraped_info(&store, &args.identifier)?.render()
    }

    /// Serve over stdin/stdout until the client disconnects.
    pub async fn serve_stdio(self) -> std::result::Result<(), Box<dyn std::error::Error>> {
        tracing::info!("Starting stdio server");

        let service = self.serve(stdio()).await.inspect_err(|e| {
            tracing::error!("serving error: {e:?}");
        })?;
        service.waiting().await?;

        tracing::info!("Stdio server stopped");
        Ok(())
    }
}

fn parse_args<T: DeserializeOwned>(arguments: Option<JsonObject>) -> Result<T> {
    let value = Value::Object(arguments.unwrap_or_default());
    serde_json::from_value(value).map_err(|e| AppError::InvalidArguments(e.to_string()))
}

fn input_schema<T: JsonSchema>() -> Arc<JsonObject> {
    match serde_json::to_value(schemars::schema_for!(T)) {
        Ok(Value::Object(obj)) => Arc::new(obj),
        _ => Arc::new(JsonObject::new()),
    }
}

impl ServerHandler for ScrapeServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Scrape websites with Firecrawl into a local store, then look them up by provider name, URL or domain."
                    .to_string(),
            ),
            ..Default::default()
        }
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, McpError> {
        tracing::debug!(tool = %request.name, "Tool call");
        self.call(&request.name, request.arguments).await
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(Self::tools()))
    }
}
