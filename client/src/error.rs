//! Mapping of HTTP responses onto core errors

use serde::de::DeserializeOwned;
use serde::Deserialize;

use etl_wizard_core::{CoreError, Result};

/// Error body every non-2xx response is expected to carry
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub detail: serde_json::Value,
}

impl ErrorResponse {
    /// The `detail` as shown to the operator
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

pub(crate) fn transport(err: reqwest::Error) -> CoreError {
    CoreError::Transport(err.to_string())
}

/// Decode a response body, or turn a failed response into a core error
pub(crate) async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.bytes().await.map_err(transport)?;
    decode_body(status.as_u16(), status.is_success(), &body)
}

fn decode_body<T: DeserializeOwned>(status: u16, success: bool, body: &[u8]) -> Result<T> {
    if success {
        return serde_json::from_slice(body)
            .map_err(|e| CoreError::Transport(format!("Malformed response: {}", e)));
    }
    match serde_json::from_slice::<ErrorResponse>(body) {
        Ok(error) => Err(CoreError::Backend {
            status,
            detail: error.message(),
        }),
        Err(_) => Err(CoreError::Transport(format!(
            "HTTP {} with no error detail",
            status
        ))),
    }
}
