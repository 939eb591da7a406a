use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use snafu::ResultExt;

use crate::providers::{ApiSnafu, DecodeSnafu, ProviderError};

/// Turns a fully read response into `T`.
///
/// The body is read as text before decoding so that both a non-success status
/// and a decode failure can carry it back to the caller.
pub fn decode_response<T: DeserializeOwned>(
    status: StatusCode,
    body: String,
) -> Result<T, ProviderError> {
    if !status.is_success() {
        return ApiSnafu {
            status: status.as_u16(),
            body,
        }
        .fail();
    }
    serde_json::from_str::<T>(&body).context(DecodeSnafu { body: &body })
}
