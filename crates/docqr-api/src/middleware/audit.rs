//! Per-route audit middleware.
//!
//! Wraps a mutating or sensitive route. After the handler has produced a 2xx response an
//! entry is pushed onto the [`AuditQueue`]; the response itself is never held back.

use crate::auth::models::AuthUser;
use crate::error::HttpAppError;
use crate::services::audit::AuditQueue;
use crate::utils::ip_extraction::{client_ip, peer_addr};
use axum::{
    body::Body,
    extract::{rejection::RawPathParamsRejection, Query, RawPathParams, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use docqr_core::models::NewAuditLog;
use docqr_core::AppError;
use futures::StreamExt;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// Largest JSON body copied into an audit entry.
const MAX_CAPTURED_BODY: usize = 64 * 1024;

const SENSITIVE_FIELDS: &[&str] = &["password", "password_hash", "token", "secret"];
const REDACTED: &str = "[REDACTED]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    View,
    Download,
    PermanentDelete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
            AuditAction::View => "VIEW",
            AuditAction::Download => "DOWNLOAD",
            AuditAction::PermanentDelete => "PERMANENT_DELETE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Document,
    Category,
    User,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Document => "DOCUMENT",
            ResourceType::Category => "CATEGORY",
            ResourceType::User => "USER",
        }
    }
}

/// State for one audited route.
#[derive(Clone)]
pub struct AuditContext {
    queue: AuditQueue,
    action: AuditAction,
    resource: ResourceType,
    trusted_proxy_count: usize,
}

impl AuditContext {
    pub fn new(
        queue: AuditQueue,
        action: AuditAction,
        resource: ResourceType,
        trusted_proxy_count: usize,
    ) -> Self {
        Self {
            queue,
            action,
            resource,
            trusted_proxy_count,
        }
    }
}

/// Response extension: id of a resource created by the handler (no `{id}` in the path).
#[derive(Debug, Clone, Copy)]
pub struct AuditResourceId(pub Uuid);

/// Response extension: request fields a handler parsed itself, such as multipart form
/// fields, recorded in place of the raw body.
#[derive(Debug, Clone)]
pub struct AuditBody(pub Value);

/// Request facts captured before the handler consumes the request.
struct RequestSnapshot {
    method: String,
    path: String,
    query: Value,
    body: Value,
    user_id: Option<Uuid>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    path_id: Option<Uuid>,
}

pub async fn record_audit(
    State(ctx): State<AuditContext>,
    path_params: Result<RawPathParams, RawPathParamsRejection>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();

    let (captured_body, body) = match capture_json_body(&parts.headers, body).await {
        Ok(captured) => captured,
        Err(e) => return e.into_response(),
    };

    let path_id = path_params.ok().and_then(|params| {
        params
            .iter()
            .find(|(key, _)| *key == "id")
            .and_then(|(_, value)| Uuid::parse_str(value).ok())
    });
    let snapshot = snapshot(&parts, captured_body, path_id, ctx.trusted_proxy_count);

    let response = next.run(Request::from_parts(parts, body)).await;

    if response.status().is_success() {
        let entry = build_entry(&ctx, snapshot, &response);
        ctx.queue.record(entry);
    }

    response
}

fn snapshot(
    parts: &Parts,
    body: Value,
    path_id: Option<Uuid>,
    trusted_proxy_count: usize,
) -> RequestSnapshot {
    let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
        .map(|Query(params)| json!(params))
        .unwrap_or_else(|_| json!({}));

    RequestSnapshot {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query,
        body,
        user_id: parts.extensions.get::<AuthUser>().map(AuthUser::id),
        ip_address: client_ip(
            &parts.headers,
            peer_addr(&parts.extensions),
            trusted_proxy_count,
        ),
        user_agent: parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        path_id,
    }
}

fn build_entry(ctx: &AuditContext, snapshot: RequestSnapshot, response: &Response) -> NewAuditLog {
    let resource_id = response
        .extensions()
        .get::<AuditResourceId>()
        .map(|AuditResourceId(id)| *id)
        .or(snapshot.path_id);

    let body = match response.extensions().get::<AuditBody>() {
        Some(AuditBody(fields)) => sanitize_body(fields.clone()),
        None => snapshot.body,
    };

    NewAuditLog {
        user_id: snapshot.user_id,
        action: ctx.action.as_str().to_string(),
        resource_type: ctx.resource.as_str().to_string(),
        resource_id,
        details: json!({
            "method": snapshot.method,
            "path": snapshot.path,
            "query": snapshot.query,
            "body": body,
        }),
        ip_address: snapshot.ip_address,
        user_agent: snapshot.user_agent,
    }
}

/// Buffer a small JSON body so it can be both recorded and handed to the handler.
///
/// Works with and without `Content-Length`. Non-JSON bodies and bodies over the cap are
/// recorded as `{}`; whatever was read ahead is replayed in front of the rest.
async fn capture_json_body(headers: &HeaderMap, body: Body) -> Result<(Value, Body), HttpAppError> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_lowercase().starts_with("application/json"));

    let declared_len = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());

    if !is_json || declared_len.is_some_and(|len| len > MAX_CAPTURED_BODY) {
        return Ok((json!({}), body));
    }

    let mut stream = body.into_data_stream();
    let mut chunks: Vec<Bytes> = Vec::new();
    let mut read = 0usize;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk
            .map_err(|e| AppError::BadRequest(format!("Failed to read request body: {}", e)))?;
        read += chunk.len();
        chunks.push(chunk);

        if read > MAX_CAPTURED_BODY {
            let replay = futures::stream::iter(chunks.into_iter().map(Ok)).chain(stream);
            return Ok((json!({}), Body::from_stream(replay)));
        }
    }

    let bytes = Bytes::from(chunks.concat());
    let value = serde_json::from_slice::<Value>(&bytes)
        .map(sanitize_body)
        .unwrap_or_else(|_| json!({}));

    Ok((value, Body::from(bytes)))
}

/// Replace top-level credential fields. Anything that is not an object is kept as is,
/// `null` becomes `{}`.
pub fn sanitize_body(body: Value) -> Value {
    match body {
        Value::Null => Value::Object(Map::new()),
        Value::Object(mut fields) => {
            for field in SENSITIVE_FIELDS {
                if let Some(value) = fields.get_mut(*field) {
                    *value = Value::String(REDACTED.to_string());
                }
            }
            Value::Object(fields)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::{routing::post, Router};
    use axum::http::StatusCode;
    use tower::ServiceExt;

    #[test]
    fn credentials_are_redacted() {
        let body = json!({
            "username": "alice",
            "password": "hunter22",
            "token": "abc",
            "secret": "",
            "nested": { "password": "kept" }
        });
        let clean = sanitize_body(body);
        assert_eq!(clean["username"], "alice");
        assert_eq!(clean["password"], REDACTED);
        assert_eq!(clean["token"], REDACTED);
        assert_eq!(clean["secret"], REDACTED);
        assert_eq!(clean["nested"]["password"], "kept");
    }

    #[test]
    fn null_body_becomes_empty_object() {
        assert_eq!(sanitize_body(Value::Null), json!({}));
        assert_eq!(sanitize_body(json!([1, 2])), json!([1, 2]));
    }

    #[test]
    fn action_and_resource_names() {
        assert_eq!(AuditAction::PermanentDelete.as_str(), "PERMANENT_DELETE");
        assert_eq!(AuditAction::Download.as_str(), "DOWNLOAD");
        assert_eq!(ResourceType::Category.as_str(), "CATEGORY");
    }

    fn app(queue: AuditQueue, status: StatusCode) -> Router {
        let ctx = AuditContext::new(queue, AuditAction::Update, ResourceType::Document, 0);
        Router::new().route(
            "/documents/{id}",
            post(move |body: String| async move { (status, body) })
                .layer(axum::middleware::from_fn_with_state(ctx, record_audit)),
        )
    }

    fn json_request(uri: &str, body: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, body.len())
            .header(header::USER_AGENT, "audit-test")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn successful_request_is_recorded_and_body_reaches_handler() {
        let (queue, mut rx) = AuditQueue::bounded(8);
        let id = Uuid::new_v4();
        let body = r#"{"title":"Q1","password":"x"}"#;

        let response = app(queue, StatusCode::OK)
            .oneshot(json_request(&format!("/documents/{}?page=2", id), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let echoed = to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&echoed[..], body.as_bytes());

        let entry = rx.try_recv().unwrap();
        assert_eq!(entry.action, "UPDATE");
        assert_eq!(entry.resource_type, "DOCUMENT");
        assert_eq!(entry.resource_id, Some(id));
        assert_eq!(entry.user_agent.as_deref(), Some("audit-test"));
        assert_eq!(entry.details["method"], "POST");
        assert_eq!(entry.details["query"]["page"], "2");
        assert_eq!(entry.details["body"]["title"], "Q1");
        assert_eq!(entry.details["body"]["password"], REDACTED);
    }

    #[tokio::test]
    async fn failed_request_is_not_recorded() {
        let (queue, mut rx) = AuditQueue::bounded(8);
        let response = app(queue, StatusCode::NOT_FOUND)
            .oneshot(json_request(&format!("/documents/{}", Uuid::new_v4()), "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn non_uuid_path_id_is_recorded_as_null() {
        let (queue, mut rx) = AuditQueue::bounded(8);
        app(queue, StatusCode::OK)
            .oneshot(json_request("/documents/not-a-uuid", "{}"))
            .await
            .unwrap();
        let entry = rx.try_recv().unwrap();
        assert_eq!(entry.resource_id, None);
    }

    fn chunked_json_request(uri: &str, parts: Vec<&'static str>) -> Request {
        let chunks = futures::stream::iter(
            parts
                .into_iter()
                .map(|p| Ok::<_, std::io::Error>(Bytes::from_static(p.as_bytes()))),
        );
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from_stream(chunks))
            .unwrap()
    }

    #[tokio::test]
    async fn chunked_json_is_captured_and_redacted() {
        let (queue, mut rx) = AuditQueue::bounded(8);
        let request = chunked_json_request(
            "/documents/x",
            vec![r#"{"username":"bob","#, r#""password":"hunter22"}"#],
        );

        let response = app(queue, StatusCode::OK).oneshot(request).await.unwrap();
        let echoed = to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&echoed[..], br#"{"username":"bob","password":"hunter22"}"#);

        let entry = rx.try_recv().unwrap();
        assert_eq!(entry.details["body"]["username"], "bob");
        assert_eq!(entry.details["body"]["password"], REDACTED);
    }

    #[tokio::test]
    async fn oversized_chunked_body_reaches_handler_intact() {
        let (queue, mut rx) = AuditQueue::bounded(8);
        let filler: &'static str = Box::leak("a".repeat(MAX_CAPTURED_BODY).into_boxed_str());
        let request = chunked_json_request("/documents/x", vec![r#"{"note":""#, filler, r#""}"#]);

        let response = app(queue, StatusCode::OK).oneshot(request).await.unwrap();
        let echoed = to_bytes(response.into_body(), MAX_CAPTURED_BODY * 2).await.unwrap();
        assert_eq!(echoed.len(), MAX_CAPTURED_BODY + 11);

        let entry = rx.try_recv().unwrap();
        assert_eq!(entry.details["body"], json!({}));
    }
}
