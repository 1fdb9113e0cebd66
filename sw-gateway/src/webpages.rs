//! Webpage fetching for `/process-webpages`.

use url::Url;

/// One URL's fetch result: the raw HTML, or why it could not be fetched.
pub enum FetchedPage {
    Ok { source: String, html: String },
    Failed { source: String, error: String },
}

/// Fetch every URL, never failing the batch: each page resolves to either
/// its HTML or a per-URL error the ingestion report carries through.
pub async fn fetch_all(client: &reqwest::Client, urls: &[String]) -> Vec<FetchedPage> {
    let mut pages = Vec::with_capacity(urls.len());
    for raw in urls {
        pages.push(fetch_one(client, raw).await);
    }
    pages
}

async fn fetch_one(client: &reqwest::Client, raw: &str) -> FetchedPage {
    let source = raw.to_string();
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(err) => {
            return FetchedPage::Failed {
                source,
                error: format!("invalid url: {err}"),
            }
        }
    };

    let response = match client.get(url).send().await.and_then(|r| r.error_for_status()) {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(url = raw, error = %err, "webpage fetch failed");
            return FetchedPage::Failed {
                source,
                error: err.to_string(),
            };
        }
    };

    match response.text().await {
        Ok(html) => {
            tracing::debug!(url = raw, bytes = html.len(), "webpage fetched");
            FetchedPage::Ok { source, html }
        }
        Err(err) => FetchedPage::Failed {
            source,
            error: err.to_string(),
        },
    }
}
