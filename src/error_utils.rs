use anyhow::{Context, Result};
use reqwest::{header::HeaderMap, redirect, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

/// JSON serialization/parsing error handling utilities
///
/// Serialize data to single-line JSON with contextual error handling
pub fn serialize_to_json_with_context<T: Serialize>(data: &T, data_desc: &str) -> Result<String> {
    serde_json::to_string(data).with_context(|| format!("Failed to serialize {data_desc} to JSON"))
}

/// Parse JSON from string with contextual error handling
pub fn parse_json_with_context<T: DeserializeOwned>(json_str: &str, data_desc: &str) -> Result<T> {
    serde_json::from_str(json_str).with_context(|| format!("Failed to parse {data_desc} from JSON"))
}

/// HTTP request error handling utilities
///
/// Parse HTTP response as JSON with contextual error handling
pub async fn parse_http_response_json<T: DeserializeOwned>(
    response: reqwest::Response,
    api_desc: &str,
) -> Result<T> {
    let body = response
        .text()
        .await
        .with_context(|| format!("Failed to read {api_desc} response"))?;
    parse_json_with_context(&body, &format!("{api_desc} response"))
}

/// Create HTTP client with contextual error handling
///
/// Redirects are never followed so that a bounce to the login page can be
/// reported instead of silently parsed as HTML.
pub fn create_http_client_with_context(
    timeout: Duration,
    user_agent: &str,
    default_headers: HeaderMap,
) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .default_headers(default_headers)
        .redirect(redirect::Policy::none())
        .build()
        .context("Failed to create HTTP client")
}
