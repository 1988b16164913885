//! Page scraping tool
//!
//! Fetches a URL and reduces the HTML to readable text, using Mozilla's
//! Readability algorithm (`article_scraper`) with a tag-stripping fallback.

use crate::tools::{Tool, ToolDescription, ToolError, ToolHandle};
use article_scraper::Readability;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

static SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b.*?</script\s*>").expect("valid regex"));
static STYLE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style\b.*?</style\s*>").expect("valid regex"));
static BLOCK_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</?(p|div|br|li|tr|h[1-6]|section|article)\b[^>]*>").expect("valid regex")
});
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\r\f]+").expect("valid regex"));

/// Fetch-and-extract tool
pub struct ScrapeWebsiteTool {
    client: Option<reqwest::Client>,
    max_response_size: usize,
}

impl Default for ScrapeWebsiteTool {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrapeWebsiteTool {
    pub fn new() -> Self {
        Self {
            client: None,
            max_response_size: 1024 * 1024,
        }
    }

    /// Readability extraction; malformed pages fall back to [`html_to_text`]
    async fn extract_readable_content(html: &str, url: &str) -> Result<String, ToolError> {
        let Ok(parsed_url) = Url::parse(url) else {
            tracing::debug!(url, "Unparseable URL, using plain text extraction");
            return Ok(html_to_text(html));
        };

        // article_scraper can panic on unusual markup, so it runs isolated on the blocking pool
        let html_owned = html.to_string();
        let outcome = tokio::task::spawn_blocking(move || {
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                tokio::runtime::Handle::current()
                    .block_on(async { Readability::extract(&html_owned, Some(parsed_url)).await })
            }))
        })
        .await;

        match outcome {
            Ok(Ok(Ok(article))) => {
                let text = html_to_text(&article);
                if text.is_empty() {
                    Ok(html_to_text(html))
                } else {
                    Ok(text)
                }
            }
            Ok(Ok(Err(e))) => {
                tracing::debug!(url, "Readability extraction failed ({}), using fallback", e);
                Ok(html_to_text(html))
            }
            Ok(Err(_panic)) => Err(ToolError::ExecutionError(format!(
                "Content extraction failed for '{url}': the page structure could not be parsed"
            ))),
            Err(e) => {
                tracing::warn!(url, "Extraction task failed: {}", e);
                Ok(html_to_text(html))
            }
        }
    }

    /// Missing and `text/plain` content types fall back to sniffing the body
    fn looks_like_html(content_type: Option<&str>, body: &str) -> bool {
        match content_type.map(str::to_ascii_lowercase) {
            Some(ct) if ct.contains("html") => true,
            Some(ct) if !ct.starts_with("text/plain") => false,
            _ => body.trim_start().starts_with('<'),
        }
    }

    fn too_large(size: u64, max: usize) -> ToolError {
        ToolError::ExecutionError(format!("Response too large: {size} bytes (max: {max})"))
    }

    /// Read the body chunk by chunk, giving up as soon as it passes the size limit
    async fn read_body(&self, mut response: reqwest::Response) -> Result<String, ToolError> {
        if let Some(declared) = response.content_length() {
            if declared > self.max_response_size as u64 {
                return Err(Self::too_large(declared, self.max_response_size));
            }
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ToolError::ExecutionError(e.to_string()))?
        {
            bytes.extend_from_slice(&chunk);
            if bytes.len() > self.max_response_size {
                return Err(Self::too_large(bytes.len() as u64, self.max_response_size));
            }
        }

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Strip markup from an HTML document, keeping one line per block element
pub fn html_to_text(html: &str) -> String {
    let without_scripts = SCRIPT_BLOCK.replace_all(html, " ");
    let without_styles = STYLE_BLOCK.replace_all(&without_scripts, " ");
    let with_breaks = BLOCK_TAG.replace_all(&without_styles, "\n");
    let text = ANY_TAG.replace_all(&with_breaks, " ");
    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    decoded
        .lines()
        .map(|line| SPACES.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Tool for ScrapeWebsiteTool {
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: ToolHandle::ScrapeWebsite.name().to_string(),
            description: "Fetch a web page and return its readable text content (prices, stock, shipping details)".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Absolute URL of the page to read"
                    }
                },
                "required": ["url"],
                "additionalProperties": false
            }),
        }
    }

    async fn initialize(&mut self, config: Option<&Value>) -> Result<(), ToolError> {
        let setting = |key: &str| config.and_then(|c| c.get(key)).and_then(Value::as_u64);

        if let Some(max_size) = setting("max_response_size") {
            self.max_response_size = max_size as usize;
        }
        let timeout = setting("timeout_secs").unwrap_or(30);

        self.client = Some(
            reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout))
                .user_agent(concat!("market-crew/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| ToolError::InitializationError(e.to_string()))?,
        );

        Ok(())
    }

    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError> {
        let client = self.client.as_ref().ok_or_else(|| {
            ToolError::ExecutionError("scrape_website not initialized".to_string())
        })?;

        let url = parameters
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::ValidationError("url is required".to_string()))?;

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| ToolError::Unreachable(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Unreachable(format!(
                "{url}: HTTP {}",
                status.as_u16()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = self.read_body(response).await?;

        let text = if Self::looks_like_html(content_type.as_deref(), &body) {
            Self::extract_readable_content(&body, url).await?
        } else {
            body.trim().to_string()
        };

        if text.trim().is_empty() {
            return Err(ToolError::EmptyResult(
                ToolHandle::ScrapeWebsite.name().to_string(),
            ));
        }

        Ok(Value::String(text))
    }

    async fn shutdown(&mut self) -> Result<(), ToolError> {
        self.client = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_tool_creation() {
        let tool = ScrapeWebsiteTool::new();
        assert!(tool.client.is_none());
        assert_eq!(tool.max_response_size, 1024 * 1024);
    }

    #[test]
    fn test_html_to_text_drops_scripts_and_styles() {
        let html = r#"
            <html><head><style>body { color: red; }</style></head>
            <body>
                <h1>Widget X</h1>
                <p>Price: R$ 199&nbsp;&amp; free shipping</p>
                <script type="text/javascript">console.log("tracking");</script>
            </body></html>
        "#;

        let text = html_to_text(html);
        assert!(text.contains("Widget X"));
        assert!(text.contains("Price: R$ 199 & free shipping"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("console.log"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn test_html_to_text_one_line_per_block() {
        let text = html_to_text("<ul><li>Amazon</li><li>eBay</li></ul>");
        assert_eq!(text, "Amazon\neBay");
    }

    #[test]
    fn test_looks_like_html() {
        assert!(ScrapeWebsiteTool::looks_like_html(Some("text/html; charset=utf-8"), ""));
        assert!(!ScrapeWebsiteTool::looks_like_html(Some("application/json"), "<x>"));
        assert!(ScrapeWebsiteTool::looks_like_html(None, "  <!DOCTYPE html>"));
        assert!(!ScrapeWebsiteTool::looks_like_html(None, "plain"));
    }

    #[test]
    fn test_html_labelled_as_plain_text_is_sniffed() {
        assert!(ScrapeWebsiteTool::looks_like_html(
            Some("text/plain; charset=utf-8"),
            "\n<html><body>Widget X</body></html>"
        ));
        assert!(!ScrapeWebsiteTool::looks_like_html(
            Some("text/plain"),
            "Widget X,101.99,in stock"
        ));
    }

    #[tokio::test]
    async fn test_extraction_with_invalid_url_falls_back() {
        let text = ScrapeWebsiteTool::extract_readable_content(
            "<html><body><p>Content</p></body></html>",
            "not-a-valid-url",
        )
        .await
        .unwrap();
        assert_eq!(text, "Content");
    }

    #[tokio::test]
    async fn test_extraction_of_article() {
        let html = r#"
            <!DOCTYPE html>
            <html>
            <head><title>Widget X review</title></head>
            <body>
                <article>
                    <h1>Widget X price roundup</h1>
                    <p>This is the main content of the article about Widget X offers across stores.</p>
                    <p>It lists the best prices, stock status and shipping conditions in detail.</p>
                </article>
            </body>
            </html>
        "#;

        let text = ScrapeWebsiteTool::extract_readable_content(html, "https://example.com/widget")
            .await
            .unwrap();
        assert!(text.contains("main content"));
    }

    #[tokio::test]
    async fn test_execute_requires_initialization() {
        let tool = ScrapeWebsiteTool::new();
        let result = tool.execute(&json!({"url": "https://example.com"})).await;
        assert!(matches!(result, Err(ToolError::ExecutionError(_))));
    }

    #[test]
    fn test_tool_description() {
        let description = ScrapeWebsiteTool::new().describe();
        assert_eq!(description.name, "scrape_website");
        assert_eq!(description.parameters["required"][0], "url");
    }
}
