use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compose::template::generic_details;
use crate::compose::traits::Enhancer;
use crate::models::Listing;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const MAX_DESCRIPTION_CHARS: usize = 500;

const SYSTEM_PROMPT: &str = "Du schreibst personalisierte Sätze für Wohnungsbewerbungen. \
Schreibe 1-2 authentische, enthusiastische Sätze, die zeigen, warum genau diese Wohnung interessant ist. \
Nenne konkrete Details aus dem Inserat (Lage, Ausstattung, Räume). \
Erwähne keine Besichtigung und keine Grußformeln, nur den Mittelteil über die Wohnung selbst.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Replaces the generic personalised paragraph with one written by an
/// OpenAI chat model.
pub struct OpenAiEnhancer {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiEnhancer {
    pub fn new(api_base: &str, api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    fn prompt(listing: &Listing) -> String {
        let mut features = Vec::new();
        if listing.has_balcony {
            features.push("Balkon".to_string());
        }
        if listing.has_built_in_kitchen {
            features.push("Einbauküche".to_string());
        }
        if listing.has_elevator {
            features.push("Aufzug".to_string());
        }
        if let Some(rooms) = listing.rooms {
            features.push(format!("{rooms:.0} Zimmer"));
        }
        if let Some(area) = listing.area {
            features.push(format!("{area:.0} m²"));
        }

        let mut description: String = listing
            .description
            .chars()
            .take(MAX_DESCRIPTION_CHARS)
            .collect();
        if listing.description.chars().count() > MAX_DESCRIPTION_CHARS {
            description.push_str("...");
        }

        format!(
            "Wohnungsinserat:\n- Titel: {}\n- Lage: {}\n- Features: {}\n- Beschreibung: {}\n\n\
             Schreibe 1-2 kurze, authentische Sätze darüber, was an dieser Wohnung besonders ansprechend ist. \
             Nenne 2-3 konkrete Aspekte aus dem Inserat. Schreibe auf Deutsch und gib nur die Sätze zurück, \
             ohne Anführungszeichen.",
            listing.title,
            listing.locality(),
            features.join(", "),
            description,
        )
    }

    async fn personalised_details(&self, listing: &Listing) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Self::prompt(listing),
                },
            ],
            max_tokens: 150,
            temperature: 0.7,
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("OpenAI request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {status}: {body}");
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to decode OpenAI response")?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().trim_matches('"').trim().to_string())
            .unwrap_or_default();
        if content.is_empty() {
            bail!("OpenAI returned no text");
        }
        Ok(content)
    }
}

#[async_trait]
impl Enhancer for OpenAiEnhancer {
    async fn enhance(&self, text: &str, listing: &Listing) -> Result<String> {
        let generic = generic_details(listing);
        if !text.contains(&generic) {
            bail!("message has no personalised paragraph to replace");
        }
        let details = self.personalised_details(listing).await?;
        debug!(id = %listing.external_id, "message personalised");
        Ok(text.replacen(&generic, &details, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn listing() -> Listing {
        let mut listing = Listing::new("1");
        listing.title = "Altbau mit Stuck".to_string();
        listing.district = Some("Kreuzberg".to_string());
        listing.has_balcony = true;
        listing
    }

    #[tokio::test]
    async fn swaps_generic_paragraph() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"model": "gpt-4o-mini", "max_tokens": 150})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": " \"Der Stuck und der Balkon gefallen mir sehr.\" "}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let listing = listing();
        let base = format!("Hallo,\n\n{}\n\nGrüße", generic_details(&listing));
        let enhancer = OpenAiEnhancer::new(&server.uri(), "sk-test", DEFAULT_MODEL).unwrap();
        let text = enhancer.enhance(&base, &listing).await.unwrap();
        assert_eq!(text, "Hallo,\n\nDer Stuck und der Balkon gefallen mir sehr.\n\nGrüße");
    }

    #[tokio::test]
    async fn api_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let listing = listing();
        let base = generic_details(&listing);
        let enhancer = OpenAiEnhancer::new(&server.uri(), "sk-test", DEFAULT_MODEL).unwrap();
        let err = enhancer.enhance(&base, &listing).await.unwrap_err();
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn text_without_paragraph_is_rejected_without_request() {
        let server = MockServer::start().await;
        Mock::given(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let enhancer = OpenAiEnhancer::new(&server.uri(), "sk-test", DEFAULT_MODEL).unwrap();
        assert!(enhancer.enhance("custom text", &listing()).await.is_err());
    }

    #[test]
    fn prompt_truncates_long_descriptions() {
        let mut listing = listing();
        listing.description = "ä".repeat(600);
        let prompt = OpenAiEnhancer::prompt(&listing);
        assert!(prompt.contains(&format!("{}...", "ä".repeat(500))));
        assert!(!prompt.contains(&"ä".repeat(501)));
    }
}
