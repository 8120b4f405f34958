mod parse;

pub use parse::{parse_expose, parse_german_number, parse_search_results, split_address};

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, COOKIE, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, info};

use crate::models::{Listing, SearchProfile};
use crate::sources::error::SourceError;
use crate::sources::traits::Source;
use crate::sources::types::search_url;
use crate::sources::user_agents::UserAgentRotator;

pub const DEFAULT_BASE_URL: &str = "https://www.immobilienscout24.de";

/// ImmobilienScout24 over plain HTTP.
pub struct Is24Source {
    client: Client,
    base_url: Url,
    cookie: Option<String>,
    user_agents: UserAgentRotator,
}

impl Is24Source {
    pub fn new(base_url: &str, cookie: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid source base URL {base_url:?}"))?;

        Ok(Self {
            client,
            base_url,
            cookie: cookie.filter(|c| !c.trim().is_empty()),
            user_agents: UserAgentRotator::default(),
        })
    }

    async fn fetch(&self, url: Url) -> Result<String, SourceError> {
        debug!(%url, "fetching");
        let mut request = self
            .client
            .get(url.clone())
            .header(USER_AGENT, self.user_agents.next())
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "de-DE,de;q=0.9");
        if let Some(cookie) = &self.cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(SourceError::RateLimited {
                url: url.to_string(),
            }),
            StatusCode::FORBIDDEN => Err(SourceError::Blocked {
                url: url.to_string(),
            }),
            status if !status.is_success() => Err(SourceError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            }),
            _ => Ok(response.text().await?),
        }
    }
}

#[async_trait]
impl Source for Is24Source {
    async fn search(&self, profile: &SearchProfile) -> Result<Vec<Listing>> {
        let url = search_url(&self.base_url, profile)?;
        let html = self
            .fetch(url)
            .await
            .with_context(|| format!("Failed to fetch search results for {}", profile.name))?;
        debug!(bytes = html.len(), "downloaded search page");

        let listings = parse_search_results(&html, &self.base_url)?;
        info!(profile = %profile.name, count = listings.len(), "parsed search results");
        Ok(listings)
    }

    async fn fetch_detail(&self, external_id: &str) -> Result<Listing> {
        let url = self
            .base_url
            .join(&format!("/expose/{external_id}"))
            .with_context(|| format!("Invalid expose id {external_id:?}"))?;
        let html = self
            .fetch(url)
            .await
            .with_context(|| format!("Failed to fetch expose {external_id}"))?;
        Ok(parse_expose(&html, external_id, &self.base_url)?)
    }

    fn source_name(&self) -> &'static str {
        "ImmobilienScout24"
    }
}
