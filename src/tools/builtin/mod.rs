//! Builtin tools: Serper web search and page scraping.
//!
//! Each tool keeps request building and response parsing in pure functions,
//! separate from the HTTP I/O.

pub mod scrape_website;
pub mod web_search;

pub use scrape_website::ScrapeWebsiteTool;
pub use web_search::WebSearchTool;
