// src/extraction.rs
//! Portfolio extraction from free text or an image through a chat-completion model.
use crate::allocation::category_of;
use crate::error::AppError;
use crate::models::PortfolioItem;
use crate::performance::Basis;
use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

const SYSTEM_PROMPT: &str = "You read investment portfolios. From the user's input, list every \
holding as a JSON array and return nothing else. When the input states allocation percentages, \
use objects like {\"ticker\": \"AAPL\", \"weight\": 0.25} with decimal weights normalised to sum \
to 1. When it states share counts, use objects like {\"ticker\": \"AAPL\", \"shares\": 10, \
\"price\": 190.5} and include the price only if it is shown. Use one form for the whole array. \
Ticker symbols must be uppercase. Images arrive as image_url blocks.";

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionInput {
    Text(String),
    Image { data: String, mime_type: String },
}

impl ExtractionInput {
    /// Text wins over a file. A file without a MIME type is read as text.
    pub fn from_request(
        text: Option<String>,
        file_data: Option<String>,
        file_type: Option<String>,
    ) -> Result<Self, AppError> {
        let non_empty = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
        match (non_empty(text), non_empty(file_data), non_empty(file_type)) {
            (Some(text), _, _) => Ok(ExtractionInput::Text(text)),
            (None, Some(data), Some(mime_type)) => Ok(ExtractionInput::Image { data, mime_type }),
            (None, Some(data), None) => Ok(ExtractionInput::Text(data)),
            (None, None, _) => Err(AppError::InvalidInput("No input provided".to_string())),
        }
    }

    fn user_content(&self) -> Value {
        match self {
            ExtractionInput::Text(text) => json!(text),
            ExtractionInput::Image { data, mime_type } => json!([
                { "type": "text", "text": "Please extract the holdings from the image." },
                {
                    "type": "image_url",
                    "image_url": { "url": format!("data:{};base64,{}", mime_type, data) }
                }
            ]),
        }
    }
}

#[async_trait]
pub trait Extractor: Send + Sync {
    /// Raw model output; parsing is left to [`parse_extraction`].
    async fn extract(&self, input: &ExtractionInput) -> Result<String, AppError>;
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Holding {
    pub ticker: String,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub shares: Option<f64>,
    #[serde(default)]
    pub price: Option<f64>,
}

fn parse_array(raw: &str) -> Option<Vec<Holding>> {
    serde_json::from_str(raw).ok()
}

/// Strict parse first, then the outermost bracketed substring.
pub fn parse_extraction(content: &str) -> Result<Vec<Holding>, AppError> {
    let trimmed = content.trim();
    if let Some(holdings) = parse_array(trimmed) {
        return Ok(holdings);
    }
    let bracketed = match (trimmed.find('['), trimmed.rfind(']')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => {
            return Err(AppError::MalformedExtraction(
                "no JSON array in model output".to_string(),
            ))
        }
    };
    parse_array(bracketed).ok_or_else(|| {
        AppError::MalformedExtraction("model output array is not valid JSON".to_string())
    })
}

/// Items categorised by ticker, and the single basis every holding uses.
pub fn into_portfolio(holdings: Vec<Holding>) -> Result<(Vec<PortfolioItem>, Basis), AppError> {
    if holdings.is_empty() {
        return Err(AppError::MalformedExtraction(
            "no holdings extracted".to_string(),
        ));
    }
    let basis = if holdings.iter().all(|h| h.shares.is_some()) {
        Basis::Shares
    } else if holdings.iter().all(|h| h.weight.is_some()) {
        Basis::Weights
    } else {
        return Err(AppError::MalformedExtraction(
            "holdings mix weights and share counts".to_string(),
        ));
    };

    let mut items = Vec::with_capacity(holdings.len());
    for h in holdings {
        let ticker = h.ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return Err(AppError::MalformedExtraction(
                "holding without a ticker".to_string(),
            ));
        }
        items.push(PortfolioItem {
            category: category_of(&ticker),
            ticker,
            weight: match basis {
                Basis::Weights => h.weight.unwrap_or(0.0),
                Basis::Shares => 0.0,
            },
            shares: h.shares,
            price: h.price,
        });
    }
    Ok((items, basis))
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

pub struct OpenAiExtractor {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiExtractor {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        OpenAiExtractor {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Extractor for OpenAiExtractor {
    async fn extract(&self, input: &ExtractionInput) -> Result<String, AppError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Upstream("OpenAI API key not configured".to_string()))?;

        let payload = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": input.user_content() },
            ],
        });

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(AppError::upstream)?;

        if !response.status().is_success() {
            error!("Extraction request failed: HTTP {}", response.status());
            return Err(AppError::Upstream(format!(
                "Extraction failed: HTTP {}",
                response.status()
            )));
        }

        let completion: ChatCompletion = response.json().await.map_err(AppError::upstream)?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AppError::Upstream("No response from OpenAI".to_string()))?;
        debug!("Extraction returned {} bytes", content.len());
        Ok(content)
    }
}
