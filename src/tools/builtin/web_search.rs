//! Web search tool backed by the Serper API

use crate::tools::{Tool, ToolDescription, ToolError, ToolHandle};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://google.serper.dev";
const DEFAULT_API_KEY_ENV: &str = "SERPER_API_KEY";
const MAX_RESULTS: usize = 20;

/// One organic search hit
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

/// Serper web search
pub struct WebSearchTool {
    client: Option<reqwest::Client>,
    api_key: Option<String>,
    base_url: String,
    default_results: usize,
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self {
            client: None,
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            default_results: 10,
        }
    }
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ready-to-use tool with an explicit key and endpoint, bypassing `initialize`
    pub fn with_api_key(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ToolError> {
        Ok(Self {
            client: Some(Self::build_client(Duration::from_secs(30))?),
            api_key: Some(api_key.into()),
            base_url: base_url.into(),
            ..Self::default()
        })
    }

    fn build_client(timeout: Duration) -> Result<reqwest::Client, ToolError> {
        reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ToolError::InitializationError(e.to_string()))
    }

    fn build_search_payload(query: &str, num_results: usize) -> Value {
        json!({
            "q": query,
            "num": num_results.clamp(1, MAX_RESULTS),
        })
    }

    fn parse_search_response(search_result: &Value, num_results: usize) -> Vec<SearchHit> {
        search_result
            .get("organic")
            .and_then(Value::as_array)
            .map(|organic| {
                organic
                    .iter()
                    .filter_map(|hit| {
                        let title = hit.get("title")?.as_str()?;
                        let link = hit.get("link")?.as_str()?;
                        let snippet = hit.get("snippet").and_then(Value::as_str).unwrap_or("");
                        Some(SearchHit {
                            title: title.to_string(),
                            link: link.to_string(),
                            snippet: snippet.to_string(),
                        })
                    })
                    .take(num_results)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Render hits as plain text for the model
    fn format_hits(query: &str, hits: &[SearchHit]) -> String {
        let mut text = format!("Search results for '{query}':\n");
        for hit in hits {
            text.push_str(&format!(
                "\nTitle: {}\nLink: {}\nSnippet: {}\n---",
                hit.title, hit.link, hit.snippet
            ));
        }
        text
    }

    fn requested_results(&self, parameters: &Value) -> usize {
        parameters
            .get("num_results")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(self.default_results)
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: ToolHandle::WebSearch.name().to_string(),
            description: "Search the internet for current information; returns titles, links and snippets".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Search query"
                    },
                    "num_results": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": MAX_RESULTS
                    }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        }
    }

    async fn initialize(&mut self, config: Option<&Value>) -> Result<(), ToolError> {
        let setting = |key: &str| config.and_then(|c| c.get(key));

        let key_env = setting("api_key_env")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_API_KEY_ENV);
        self.api_key = std::env::var(key_env).ok().filter(|k| !k.is_empty());
        if self.api_key.is_none() {
            return Err(ToolError::InitializationError(format!(
                "{key_env} environment variable not set"
            )));
        }

        if let Some(n) = setting("num_results").and_then(Value::as_u64) {
            self.default_results = (n as usize).clamp(1, MAX_RESULTS);
        }
        if let Some(url) = setting("base_url").and_then(Value::as_str) {
            self.base_url = url.to_string();
        }
        let timeout = setting("timeout_secs").and_then(Value::as_u64).unwrap_or(30);

        self.client = Some(Self::build_client(Duration::from_secs(timeout))?);
        Ok(())
    }

    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError> {
        let (client, api_key) = match (&self.client, &self.api_key) {
            (Some(client), Some(key)) => (client, key),
            _ => {
                return Err(ToolError::ExecutionError(
                    "web_search not initialized".to_string(),
                ))
            }
        };

        let query = parameters
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::ValidationError("query is required".to_string()))?;
        let num_results = self.requested_results(parameters);

        let response = client
            .post(format!("{}/search", self.base_url.trim_end_matches('/')))
            .header("X-API-KEY", api_key)
            .json(&Self::build_search_payload(query, num_results))
            .send()
            .await
            .map_err(|e| ToolError::Unreachable(format!("Serper request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ToolError::ExecutionError(format!(
                "Serper API error ({}): {}",
                status.as_u16(),
                error_text
            )));
        }

        let search_result: Value = response
            .json()
            .await
            .map_err(|e| ToolError::ExecutionError(format!("Failed to parse response: {e}")))?;

        let hits = Self::parse_search_response(&search_result, num_results);
        if hits.is_empty() {
            return Err(ToolError::EmptyResult(ToolHandle::WebSearch.name().to_string()));
        }

        Ok(Value::String(Self::format_hits(query, &hits)))
    }

    async fn shutdown(&mut self) -> Result<(), ToolError> {
        self.client = None;
        Ok(())
    }
}
