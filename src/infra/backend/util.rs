use reqwest::StatusCode;
use reqwest::header::CONTENT_RANGE;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::application::gateways::GatewayError;
use crate::application::repos::RepoError;

const UNIQUE_VIOLATION: &str = "23505";

/// Error body shared by the table, storage and auth APIs; each uses a subset.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RemoteErrorBody {
    code: Option<serde_json::Value>,
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl RemoteErrorBody {
    fn message(self, status: StatusCode, raw: &str) -> String {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| fallback_message(status, raw))
    }
}

fn fallback_message(status: StatusCode, raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        raw.to_string()
    }
}

pub fn map_transport_error(err: reqwest::Error) -> RepoError {
    if err.is_timeout() {
        RepoError::Timeout
    } else {
        RepoError::transport(err)
    }
}

pub(crate) fn map_gateway_transport(err: reqwest::Error) -> GatewayError {
    GatewayError::transport(err)
}

/// Passes successful responses through and turns the rest into a [`RepoError`].
pub(crate) async fn check_table_response(
    response: reqwest::Response,
) -> Result<reqwest::Response, RepoError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let raw = response.text().await.unwrap_or_default();
    let body: RemoteErrorBody = serde_json::from_str(&raw).unwrap_or_default();
    let duplicate = status == StatusCode::CONFLICT
        || body
            .code
            .as_ref()
            .and_then(|code| code.as_str())
            .is_some_and(|code| code == UNIQUE_VIOLATION);
    let message = body.message(status, &raw);

    debug!(
        target = "blogdeck::infra::backend",
        status = status.as_u16(),
        message = %message,
        "data API rejected request"
    );

    if duplicate {
        Err(RepoError::Duplicate { message })
    } else {
        Err(RepoError::Remote {
            status: status.as_u16(),
            message,
        })
    }
}

pub(crate) async fn check_gateway_response(
    response: reqwest::Response,
) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(gateway_error(status, response).await)
}

pub(crate) async fn gateway_error(status: StatusCode, response: reqwest::Response) -> GatewayError {
    let raw = response.text().await.unwrap_or_default();
    let body: RemoteErrorBody = serde_json::from_str(&raw).unwrap_or_default();
    GatewayError::Remote {
        status: status.as_u16(),
        message: body.message(status, &raw),
    }
}

pub(crate) async fn decode_rows<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<Vec<T>, RepoError> {
    response.json::<Vec<T>>().await.map_err(RepoError::decode)
}

/// First row of a `return=representation` write, or `NotFound` when nothing matched.
pub(crate) async fn decode_single<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, RepoError> {
    decode_rows(response)
        .await?
        .into_iter()
        .next()
        .ok_or(RepoError::NotFound)
}

/// Total row count from `Content-Range` (`0-8/42`, `*/0`).
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.parse().ok()
}

pub(crate) fn response_total(response: &reqwest::Response) -> Result<u64, RepoError> {
    let header = response
        .headers()
        .get(CONTENT_RANGE)
        .ok_or_else(|| RepoError::decode("missing Content-Range header"))?;
    let value = header
        .to_str()
        .map_err(|err| RepoError::decode(format!("invalid Content-Range header: {err}")))?;
    parse_content_range_total(value)
        .ok_or_else(|| RepoError::decode(format!("unusable Content-Range `{value}`")))
}

pub(crate) fn url_error(err: url::ParseError) -> RepoError {
    RepoError::transport(format!("invalid request URL: {err}"))
}
