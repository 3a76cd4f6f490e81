//! Wise quotes, used as a live exchange rate source.

use num::BigRational;
use serde::{Deserialize, Serialize};
use serde_json::Number;
use tl_core::money::parse_decimal;

use crate::{ApiError, error_for_status, http_client};

const WISE_QUOTES_URL: &str = "https://api.transferwise.com/v3/quotes/";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteRequest<'a> {
    source_currency: &'a str,
    target_currency: &'a str,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    rate: Number,
}

/// Wise quote client.
///
/// Quotes need no credentials; only the rate of the returned quote is used.
#[derive(Debug, Clone)]
pub struct WiseClient {
    http: reqwest::Client,
    url: String,
}

impl WiseClient {
    pub fn new() -> Result<Self, ApiError> {
        Ok(Self {
            http: http_client()?,
            url: WISE_QUOTES_URL.to_string(),
        })
    }

    /// Points the client at another quotes endpoint.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Requests a quote and returns its exchange rate.
    pub async fn quote_rate(&self, source: &str, target: &str) -> Result<BigRational, ApiError> {
        tracing::debug!(source, target, "requesting Wise quote");
        let response = self
            .http
            .post(&self.url)
            .json(&QuoteRequest {
                source_currency: source,
                target_currency: target,
            })
            .send()
            .await?;
        let body = error_for_status(response).await?.text().await?;
        parse_quote_rate(&body)
    }
}

fn parse_quote_rate(body: &str) -> Result<BigRational, ApiError> {
    let quote: QuoteResponse =
        serde_json::from_str(body).map_err(|err| ApiError::InvalidResponse(err.to_string()))?;
    parse_decimal(&quote.rate.to_string())
        .map_err(|err| ApiError::InvalidResponse(format!("quote rate: {err}")))
}
