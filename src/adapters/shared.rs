//! Shared REST helpers for the exchange adapters

use serde::de::DeserializeOwned;

use crate::adapters::errors::{ExchangeError, ExchangeResult};

/// Maximum response body length echoed into error messages
const MAX_ERROR_BODY_LEN: usize = 200;

/// GET a JSON document and map HTTP failures onto `ExchangeError`
///
/// - 401/403 -> `Authentication`
/// - other non-2xx -> `Api { status, message }`
/// - undecodable body -> `InvalidResponse`
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> ExchangeResult<T> {
    let response = client.get(url).query(query).send().await?;
    let status = response.status();
    let body = response.text().await?;

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(ExchangeError::Authentication(truncate(&body)));
    }
    if !status.is_success() {
        return Err(ExchangeError::Api {
            status: status.as_u16(),
            message: truncate(&body),
        });
    }

    serde_json::from_str(&body).map_err(|e| {
        ExchangeError::InvalidResponse(format!("{} - body: {}", e, truncate(&body)))
    })
}

/// Parse a decimal string field as sent by most exchange REST APIs
pub(crate) fn parse_f64(field: &str, value: &str) -> ExchangeResult<f64> {
    value
        .parse::<f64>()
        .map_err(|_| ExchangeError::InvalidResponse(format!("{} is not a number: {}", field, value)))
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_LEN).collect()
}
