//! Gemini-backed synthetic sentiment source.
//!
//! One `generateContent` round trip per fetch. The system instruction asks
//! for a continuous daily series as a bare JSON array; the provider is not
//! guaranteed to comply, so the candidate text is parsed defensively and a
//! non-array answer surfaces as `MalformedResponse`.

use crate::config::{HttpConfig, SentimentConfig};
use crate::models::{DailySentiment, GenerateResponse, RawSentimentRow};
use crate::sources::http_client::{HttpClient, HttpError};
use crate::sources::{FetchError, SentimentProvider, normalize};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::info;
use url::Url;

// ── Request payload ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: RequestContent,
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

impl RequestContent {
    fn text(text: String) -> Self {
        Self {
            parts: vec![RequestPart { text }],
        }
    }
}

fn system_prompt(start_date: &str, end_date: &str) -> String {
    format!(
        "You are an expert financial and geopolitical analyst. Generate a \
         statistically plausible time series of average global news sentiment \
         for a dashboard, as a number between -1.0 (extremely negative) and \
         1.0 (extremely positive), with 0.0 neutral.\n\
         Produce one score per day from {start_date} to {end_date}. Most days \
         should sit slightly positive around 0.0 to 0.1, with some significant \
         dips (-0.3 to -0.6) and occasional spikes (0.5 to 0.8) simulating \
         major news events. The series must be continuous with no missing \
         days.\n\
         Your response MUST be a single JSON array where each object has two \
         keys: 'Date' (YYYY-MM-DD) and 'Avg_Sentiment' (a float). Do not \
         include any explanatory text or markdown outside the JSON array."
    )
}

// ── Source ────────────────────────────────────────────────────────────────────

pub struct GeminiSentiment {
    client: HttpClient,
    endpoint: Url,
    api_key: Option<String>,
}

impl GeminiSentiment {
    pub fn new(http: &HttpConfig, config: &SentimentConfig) -> Result<Self> {
        let endpoint = Url::parse(&format!(
            "{}/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.model,
        ))
        .with_context(|| format!("Invalid sentiment base URL {:?}", config.base_url))?;

        Ok(Self {
            client: HttpClient::new(http)?,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl SentimentProvider for GeminiSentiment {
    async fn fetch_daily(&self, days: u32) -> Result<Vec<DailySentiment>, FetchError> {
        let Some(api_key) = self.api_key.as_ref() else {
            return Err(FetchError::ClientNotConfigured);
        };

        let end = Utc::now();
        let start = end - Duration::days(i64::from(days));

        let request = GenerateRequest {
            system_instruction: RequestContent::text(system_prompt(
                &start.format("%Y-%m-%d").to_string(),
                &end.format("%Y-%m-%d").to_string(),
            )),
            contents: vec![RequestContent::text(
                "Generate the requested time series data now.".to_string(),
            )],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        info!(
            "Generating synthetic daily news sentiment for the last {} days",
            days
        );

        let resp: GenerateResponse = self
            .client
            .post_json(
                self.endpoint.clone(),
                &[("x-goog-api-key", api_key.clone())],
                &request,
            )
            .await
            .map_err(|e| match e {
                HttpError::Decode(inner) => FetchError::MalformedResponse(inner.to_string()),
                other => FetchError::ServiceUnavailable(other.to_string()),
            })?;

        let daily = normalize::daily_sentiment_rows(parse_candidate_rows(&resp)?);
        info!("{} sentiment days generated", daily.len());

        Ok(daily)
    }
}

/// Pull the candidate text out of the envelope and parse it as the promised
/// JSON array.
fn parse_candidate_rows(resp: &GenerateResponse) -> Result<Vec<RawSentimentRow>, FetchError> {
    let text = resp
        .candidates
        .first()
        .and_then(|c| c.content.parts.first())
        .map(|p| p.text.as_str())
        .ok_or_else(|| {
            FetchError::MalformedResponse("no candidate text in generation response".to_string())
        })?;

    serde_json::from_str(text).map_err(|e| {
        FetchError::MalformedResponse(format!("candidate text is not a sentiment array: {e}"))
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(text: &str) -> GenerateResponse {
        serde_json::from_str(
            &serde_json::json!({
                "candidates": [
                    {"content": {"parts": [{"text": text}]}}
                ]
            })
            .to_string(),
        )
        .unwrap()
    }

    fn test_source(api_key: Option<&str>) -> GeminiSentiment {
        let http = HttpConfig {
            timeout_secs: 5,
            request_delay_ms: 0,
            jitter_ms: 0,
            user_agent: "test".into(),
        };
        let config = SentimentConfig {
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            model: "gemini-2.5-flash".into(),
            api_key: api_key.map(String::from),
        };
        GeminiSentiment::new(&http, &config).unwrap()
    }

    #[test]
    fn test_missing_credential_checked_before_call() {
        let source = test_source(None);
        let err = tokio_test::block_on(source.fetch_daily(30)).unwrap_err();
        assert!(matches!(err, FetchError::ClientNotConfigured));
    }

    #[test]
    fn test_candidate_rows_parse() {
        let resp = envelope(
            r#"[{"Date": "2024-01-01", "Avg_Sentiment": 0.1},
                {"Date": "2024-01-02", "Avg_Sentiment": -0.4}]"#,
        );

        let rows = parse_candidate_rows(&resp).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, "2024-01-01");
        assert_eq!(rows[1].avg_sentiment, -0.4);
    }

    #[test]
    fn test_non_json_text_is_malformed() {
        let resp = envelope("Sure! Here is your data:\n```json\n[]\n```");
        let err = parse_candidate_rows(&resp).unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }

    #[test]
    fn test_empty_candidates_is_malformed() {
        let resp: GenerateResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        let err = parse_candidate_rows(&resp).unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let request = GenerateRequest {
            system_instruction: RequestContent::text("sys".into()),
            contents: vec![RequestContent::text("go".into())],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("systemInstruction").is_some());
        assert_eq!(
            value["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }
}
