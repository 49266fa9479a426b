//! # Ingest Service
//!
//! Glue between an upload body, the telemetry pipeline and the session store.
//! Transport (HTTP routing, CORS, auth) is left to the embedding application;
//! these functions are what its handlers call.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{AnalystError, Result};
use crate::session::{ChatTurn, SessionId, SessionState, SessionStore};
use crate::telemetry::filter::FilteredMap;
use crate::telemetry::labels::Dialect;
use crate::telemetry::metrics::MetricsMap;
use crate::telemetry::{analyze, RawTelemetry};

/// Chat request body
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
}

/// Reply to a telemetry upload
#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub session_id: SessionId,
    /// Dialects the extracted signals came from
    pub dialects: Vec<Dialect>,
    /// Residual signals, after metric derivation
    pub filtered_info: FilteredMap,
    pub metrics: MetricsMap,
}

/// Parse an upload body into raw telemetry
///
/// # Errors
///
/// Returns error if:
/// - The body exceeds `max_bytes`
/// - The body is not valid JSON
/// - The JSON root is not an object
pub fn parse_upload(body: &[u8], max_bytes: usize) -> Result<RawTelemetry> {
    check_size(body.len() as u64, max_bytes)?;

    match serde_json::from_slice::<Value>(body)? {
        Value::Object(raw) => Ok(raw),
        other => Err(AnalystError::InvalidTelemetry(format!(
            "root must be an object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Read and parse a telemetry file from disk
///
/// The size limit is checked against file metadata before anything is read.
///
/// # Errors
///
/// Returns error if:
/// - The file cannot be stat'ed or read
/// - The file exceeds `max_bytes`
/// - The contents are not a JSON object
pub async fn read_upload(path: impl AsRef<Path>, max_bytes: usize) -> Result<RawTelemetry> {
    let path = path.as_ref();
    let metadata = tokio::fs::metadata(path).await?;
    check_size(metadata.len(), max_bytes)?;

    let body = tokio::fs::read(path).await?;
    debug!("Read {} bytes from {}", body.len(), path.display());
    parse_upload(&body, max_bytes)
}

fn check_size(len: u64, max_bytes: usize) -> Result<()> {
    if len > max_bytes as u64 {
        return Err(AnalystError::InvalidTelemetry(format!(
            "upload of {} bytes exceeds limit of {} bytes",
            len, max_bytes
        )));
    }
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Analyse a flight log and open a session for it
///
/// # Arguments
///
/// * `store` - Session store receiving the new session
/// * `raw` - Decoded telemetry document
///
/// # Returns
///
/// * `UploadResponse` - New session id, residual signals and metrics
pub async fn upload_log<S>(store: &S, raw: &RawTelemetry) -> UploadResponse
where
    S: SessionStore + ?Sized,
{
    let analysis = analyze(raw);
    let dialects = analysis.filtered.dialects();
    let filtered_info = analysis.residual.clone();
    let metrics = analysis.metrics.clone();

    let session_id = store.create(SessionState::from_analysis(analysis)).await;
    info!(
        "Session {}: {} metrics, {} residual signals",
        session_id,
        metrics.len(),
        filtered_info.len()
    );

    UploadResponse {
        session_id,
        dialects,
        filtered_info,
        metrics,
    }
}

/// Record an answered chat turn against a session
///
/// # Errors
///
/// Returns `SessionNotFound` if the id is malformed or unknown
pub async fn record_turn<S>(store: &S, request: &ChatRequest, reply: &str) -> Result<()>
where
    S: SessionStore + ?Sized,
{
    let id: SessionId = request.session_id.parse()?;
    store
        .append_turn(
            &id,
            ChatTurn {
                user: request.message.clone(),
                assistant: reply.to_string(),
            },
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MockSessionStore;
    use crate::telemetry::labels::CanonicalLabel;
    use crate::telemetry::metrics::MetricName;
    use mockall::predicate::always;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tokio_test::{assert_err, assert_ok, block_on};

    fn temp_file(contents: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_upload_object() {
        let raw = parse_upload(br#"{"STAT": {"BTemp": [30]}}"#, 1024).unwrap();
        assert_eq!(raw["STAT"], json!({ "BTemp": [30] }));
    }

    #[test]
    fn test_parse_upload_rejects_non_object() {
        let result = parse_upload(b"[1, 2, 3]", 1024);
        assert!(matches!(result, Err(AnalystError::InvalidTelemetry(_))));
    }

    #[test]
    fn test_parse_upload_rejects_invalid_json() {
        let result = parse_upload(b"{\"GPS\": ", 1024);
        assert!(matches!(result, Err(AnalystError::Json(_))));
    }

    #[test]
    fn test_parse_upload_size_limit() {
        let body = br#"{"OSD": {"flyTime": 1}}"#;
        assert_ok!(parse_upload(body, body.len()));
        let result = parse_upload(body, body.len() - 1);
        assert!(matches!(result, Err(AnalystError::InvalidTelemetry(_))));
    }

    #[test]
    fn test_read_upload_parses_file() {
        let file = temp_file(br#"{"OSD": {"flyTime": 120}}"#);
        let raw = assert_ok!(block_on(read_upload(file.path(), 1024)));
        assert_eq!(raw["OSD"], json!({ "flyTime": 120 }));
    }

    #[test]
    fn test_read_upload_rejects_oversized_file() {
        let body = br#"{"STAT": {"BTemp": [30, 35, 40]}}"#;
        let file = temp_file(body);

        assert_ok!(block_on(read_upload(file.path(), body.len())));
        let err = assert_err!(block_on(read_upload(file.path(), body.len() - 1)));
        assert!(matches!(err, AnalystError::InvalidTelemetry(_)));
    }

    #[test]
    fn test_read_upload_missing_file() {
        let err = assert_err!(block_on(read_upload("/nonexistent/flight.json", 1024)));
        assert!(matches!(err, AnalystError::Io(_)));
    }

    #[tokio::test]
    async fn test_upload_log_stores_session() {
        let id = SessionId::new();
        let mut store = MockSessionStore::new();
        store
            .expect_create()
            .withf(|state| {
                state.filtered.contains(CanonicalLabel::GpsAltitude)
                    && state.filtered.contains(CanonicalLabel::RcUplinkSignal)
                    && state.residual.is_empty()
                    && state.history.is_empty()
            })
            .times(1)
            .return_const(id);

        let raw = json!({
            "GPS[0]": { "Alt": [5, 15] },
            "RC": { "uplinkSignal": [99] }
        });
        let response = upload_log(&store, raw.as_object().unwrap()).await;

        assert_eq!(response.session_id, id);
        assert_eq!(response.dialects, vec![Dialect::DataFlash, Dialect::DjiOsd]);
        assert_eq!(response.metrics.get(MetricName::GpsAltitude), Some(&json!(15)));
        assert!(response.filtered_info.is_empty());
    }

    #[tokio::test]
    async fn test_upload_response_shape() {
        let id = SessionId::new();
        let mut store = MockSessionStore::new();
        store.expect_create().return_const(id);

        let raw = json!({ "GPS[0]": { "TimeUS": [1, 2] } });
        let response = upload_log(&store, raw.as_object().unwrap()).await;

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "session_id": id.to_string(),
                "dialects": ["data_flash"],
                "filtered_info": { "gps_time": [1, 2] },
                "metrics": {}
            })
        );
    }

    #[tokio::test]
    async fn test_record_turn_appends() {
        let id = SessionId::new();
        let mut store = MockSessionStore::new();
        store
            .expect_append_turn()
            .withf(move |sid, turn| {
                *sid == id && turn.user == "max altitude?" && turn.assistant == "130 m"
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let request = ChatRequest {
            session_id: id.to_string(),
            message: "max altitude?".to_string(),
        };
        assert_ok!(record_turn(&store, &request, "130 m").await);
    }

    #[tokio::test]
    async fn test_record_turn_malformed_id() {
        let mut store = MockSessionStore::new();
        store.expect_append_turn().with(always(), always()).never();

        let request = ChatRequest {
            session_id: "nope".to_string(),
            message: "hi".to_string(),
        };
        let err = assert_err!(record_turn(&store, &request, "hello").await);
        assert!(matches!(err, AnalystError::SessionNotFound(_)));
    }

    #[test]
    fn test_chat_request_deserialize() {
        let request: ChatRequest =
            serde_json::from_str(r#"{"session_id": "abc", "message": "any errors?"}"#).unwrap();
        assert_eq!(request.session_id, "abc");
        assert_eq!(request.message, "any errors?");
    }
}
