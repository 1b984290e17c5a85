use serde::Serialize;
use serde_json::Value;

use crate::registry::{CategoryId, Record, Registry};
use crate::transport::{HttpResponse, Transport, TransportError};

/// Field of the data payload that holds the row collection.
pub const ROW_COLLECTION_FIELD: &str = "value";

pub const FORBIDDEN_MESSAGE: &str = "You do not have permission to access this resource.";
pub const TRANSIENT_MESSAGE: &str = "Error fetching data. Please try again later.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Forbidden,
    Transient,
}

impl ErrorKind {
    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::Forbidden => FORBIDDEN_MESSAGE,
            ErrorKind::Transient => TRANSIENT_MESSAGE,
        }
    }
}

/// Monotonic per-page dispatch counter; a completion is only applied when
/// its token is still the pending one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    pub token: RequestToken,
    pub category: CategoryId,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FetchOutcome {
    Rows(Vec<Record>),
    Failed(ErrorKind),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FetchCompletion {
    pub token: RequestToken,
    pub category: CategoryId,
    pub outcome: FetchOutcome,
}

pub fn classify_response(resp: &HttpResponse) -> FetchOutcome {
    if resp.status == 403 {
        return FetchOutcome::Failed(ErrorKind::Forbidden);
    }
    if !resp.is_success() {
        return FetchOutcome::Failed(ErrorKind::Transient);
    }
    match parse_rows(&resp.body) {
        Some(rows) => FetchOutcome::Rows(rows),
        None => {
            tracing::warn!(
                bytes = resp.body.len(),
                "payload has no '{}' array",
                ROW_COLLECTION_FIELD
            );
            FetchOutcome::Failed(ErrorKind::Transient)
        }
    }
}

pub fn classify(result: Result<HttpResponse, TransportError>) -> FetchOutcome {
    match result {
        Ok(resp) => classify_response(&resp),
        Err(e) => {
            tracing::warn!(error = %e, "fetch did not complete");
            FetchOutcome::Failed(ErrorKind::Transient)
        }
    }
}

fn parse_rows(body: &[u8]) -> Option<Vec<Record>> {
    let payload: Value = serde_json::from_slice(body).ok()?;
    let items = payload.get(ROW_COLLECTION_FIELD)?.as_array()?;
    Some(
        items
            .iter()
            .map(|item| match item {
                Value::Object(map) => map.clone(),
                _ => Record::new(),
            })
            .collect(),
    )
}

/// Issues exactly one GET for the requested category.
pub async fn fetch(
    transport: &dyn Transport,
    registry: &Registry,
    request: FetchRequest,
) -> FetchCompletion {
    let endpoint = registry.endpoint(request.category);
    tracing::debug!(token = request.token.0, endpoint, "fetching");
    let outcome = classify(transport.get(endpoint).await);
    FetchCompletion {
        token: request.token,
        category: request.category,
        outcome,
    }
}
