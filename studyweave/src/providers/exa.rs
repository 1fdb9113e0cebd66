//! Exa web search.
//!
//! Thin reqwest wrapper over the Exa `/search` endpoint with text contents
//! included in the response. The educational variant prefixes the query
//! and uses neural search; the recent variant applies a published-date
//! cutoff.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::WebSearchTool;
use crate::error::ProviderError;
use crate::sources::WebResult;

const EXA_SEARCH_URL: &str = "https://api.exa.ai/search";
const SNIPPET_MAX_CHARS: usize = 500;

pub struct ExaSearch {
    client: reqwest::Client,
    api_key: String,
}

#[derive(Deserialize)]
struct ExaResponse {
    results: Vec<ExaResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExaResult {
    title: Option<String>,
    url: String,
    published_date: Option<String>,
    score: Option<f32>,
    text: Option<String>,
}

impl ExaSearch {
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .use_rustls_tls()
            .build()
            .map_err(|err| ProviderError::Request(err.to_string()))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
        })
    }

    async fn search(
        &self,
        query: &str,
        num_results: usize,
        search_type: &str,
        days_back: Option<u32>,
    ) -> Result<Vec<WebResult>, ProviderError> {
        let mut body = json!({
            "query": query,
            "numResults": num_results,
            "type": search_type,
            "useAutoprompt": true,
            "contents": { "text": { "maxCharacters": 2000 } },
        });
        if let Some(days_back) = days_back {
            let cutoff = Utc::now() - chrono::Duration::days(i64::from(days_back));
            body["startPublishedDate"] = json!(cutoff.format("%Y-%m-%d").to_string());
        }

        tracing::debug!(query, num_results, search_type, ?days_back, "web search");

        let response = self
            .client
            .post(EXA_SEARCH_URL)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: ExaResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::Malformed(err.to_string()))?;

        Ok(parsed
            .results
            .into_iter()
            .map(|result| WebResult {
                title: result.title.unwrap_or_else(|| result.url.clone()),
                url: result.url,
                published_date: result.published_date,
                snippet: result
                    .text
                    .map(|text| text.chars().take(SNIPPET_MAX_CHARS).collect())
                    .unwrap_or_default(),
                score: result.score.unwrap_or(0.0),
            })
            .collect())
    }
}

#[async_trait]
impl WebSearchTool for ExaSearch {
    async fn search_recent(
        &self,
        query: &str,
        num_results: usize,
        days_back: u32,
    ) -> Result<Vec<WebResult>, ProviderError> {
        self.search(query, num_results, "auto", Some(days_back)).await
    }

    async fn search_educational(
        &self,
        query: &str,
        num_results: usize,
    ) -> Result<Vec<WebResult>, ProviderError> {
        let enhanced = format!("educational explanation tutorial: {query}");
        self.search(&enhanced, num_results, "neural", None).await
    }
}
