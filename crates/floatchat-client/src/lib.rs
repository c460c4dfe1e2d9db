// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use floatchat_app::Answer;
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

const ASK_PATH: &str = "ask";

/// Blocking client for the question-answering service.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    endpoint: Url,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("service.base_url must not be empty");
        }

        let endpoint = ask_endpoint(&base_url)?;
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            endpoint,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// One round trip. The error text is what the transcript shows, so it is
    /// the service's own `detail` whenever one is supplied.
    pub fn ask(&self, question: &str) -> Result<Answer> {
        let started = Instant::now();
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&AskRequest { question })
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let error = clean_error_response(status, &body);
            warn!(status = status.as_u16(), %error, "service rejected question");
            return Err(error);
        }

        let answer: Answer = response
            .json()
            .context("decode answer from service; expected {summary, data, sql_query}")?;
        debug!(
            elapsed = ?started.elapsed(),
            rows = answer.data.as_ref().map(Vec::len).unwrap_or(0),
            "service answered"
        );
        Ok(answer)
    }
}

fn ask_endpoint(base_url: &str) -> Result<Url> {
    let parsed = Url::parse(&format!("{base_url}/")).with_context(|| {
        format!("service.base_url {base_url:?} is not a valid URL (for example http://127.0.0.1:8000)")
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!(
            "service.base_url {base_url:?} must use http or https, got {}",
            parsed.scheme()
        );
    }
    parsed
        .join(ASK_PATH)
        .with_context(|| format!("build ask endpoint from {base_url:?}"))
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!("request to {base_url} timed out -- raise [service].timeout or retry");
    }
    anyhow!(
        "cannot reach {} -- is the answering service running? ({})",
        base_url,
        error
    )
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<DetailEnvelope>(body)
        && let Some(detail) = parsed.detail
        && !detail.trim().is_empty()
    {
        return anyhow!("{detail}");
    }

    anyhow!(
        "API error: {}",
        status.canonical_reason().unwrap_or(status.as_str())
    )
}

#[derive(Debug, Serialize)]
struct AskRequest<'a> {
    question: &'a str,
}

#[derive(Debug, Deserialize)]
struct DetailEnvelope {
    #[serde(default, deserialize_with = "string_detail")]
    detail: Option<String>,
}

/// Only a string `detail` is human readable; validation arrays are ignored.
fn string_detail<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(text) => Some(text),
        _ => None,
    })
}
