//! HTTP handlers for the publish, subscribe and account endpoints

use crate::account::AccountInfo;
use crate::caller::Caller;
use crate::error::{ApiError, ApiResult};
use crate::service::{AttachmentUpload, NotificationService, PublishRequest};
use crate::stream::{NDJSON_CONTENT_TYPE, ndjson_lines, ndjson_stream};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, header},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use herald_core::{Message, Permission};
use herald_pubsub::Since;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<NotificationService>,
}

impl AppState {
    pub fn new(service: Arc<NotificationService>) -> Self {
        Self { service }
    }
}

/// Body of a reservation request
#[derive(Debug, Deserialize)]
pub struct ReservationRequest {
    pub topic: String,
    #[serde(default)]
    pub everyone: Permission,
}

/// Query parameters of the subscribe endpoint
#[derive(Debug, Default, Deserialize)]
pub struct SubscribeQuery {
    pub since: Option<String>,
    pub poll: Option<String>,
}

impl SubscribeQuery {
    fn is_poll(&self) -> bool {
        self.poll
            .as_deref()
            .is_some_and(|value| matches!(value, "1" | "yes" | "true"))
    }

    fn since(&self) -> ApiResult<Since> {
        match self.since.as_deref() {
            Some(value) => Ok(Since::parse(value, Utc::now().timestamp())?),
            None => Ok(Since::default()),
        }
    }
}

pub async fn health_check() -> Json<Value> {
    Json(json!({ "healthy": true }))
}

pub async fn account(
    State(state): State<AppState>,
    Caller(identity): Caller,
) -> ApiResult<Json<AccountInfo>> {
    Ok(Json(state.service.account(&identity).await?))
}

pub async fn reserve(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Json(request): Json<ReservationRequest>,
) -> ApiResult<Json<Value>> {
    state
        .service
        .reserve_topic(&identity, &request.topic, request.everyone)
        .await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn unreserve(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Path(topic): Path<String>,
) -> ApiResult<Json<Value>> {
    state.service.unreserve_topic(&identity, &topic).await?;
    Ok(Json(json!({ "success": true })))
}

/// Publish the request body to a topic
pub async fn publish(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Path(topic): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Message>> {
    let request = publish_request(&headers, body)?;
    let message = state.service.publish(&topic, &identity, request).await?;

    info!(
        topic = %topic,
        message_id = %message.id,
        identity = %identity,
        "Message published"
    );
    Ok(Json(Message::clone(&message)))
}

/// Stream a topic as newline-delimited JSON, or return its buffered
/// history when polling
pub async fn subscribe(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Path(topic): Path<String>,
    Query(query): Query<SubscribeQuery>,
) -> ApiResult<Response> {
    let since = query.since()?;

    if query.is_poll() {
        let messages = state.service.poll(&topic, &identity, &since).await?;
        let body = ndjson_lines(&messages).map_err(|e| ApiError::internal(e.to_string()))?;
        return Ok(([(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)], body).into_response());
    }

    let subscription = state.service.subscribe(&topic, &identity, &since).await?;
    info!(
        topic = %topic,
        subscriber_id = %subscription.id(),
        identity = %identity,
        "Subscriber connected"
    );

    let keepalive = state.service.config().server.keepalive_interval;
    Ok((
        [(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)],
        ndjson_stream(subscription, keepalive),
    )
        .into_response())
}

fn publish_request(headers: &HeaderMap, body: Bytes) -> ApiResult<PublishRequest> {
    let mut request = PublishRequest::default();

    match header_str(headers, "x-filename")? {
        Some(name) => {
            request.message = header_str(headers, "x-message")?
                .map(str::to_string)
                .unwrap_or_else(|| format!("You received a file: {name}"));
            request.attachment = Some(AttachmentUpload {
                name: name.to_string(),
                size: body.len() as u64,
            });
        }
        None => {
            request.message = String::from_utf8(body.to_vec())
                .map_err(|_| ApiError::bad_request("message body must be UTF-8"))?;
        }
    }

    request.title = header_str(headers, "x-title")?.map(str::to_string);
    request.email = header_str(headers, "x-email")?.map(str::to_string);
    request.tags = header_str(headers, "x-tags")?
        .map(|tags| {
            tags.split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    request.priority = header_str(headers, "x-priority")?
        .map(|value| {
            value
                .parse::<u8>()
                .map_err(|_| ApiError::bad_request(format!("invalid priority: {value}")))
        })
        .transpose()?;

    Ok(request)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> ApiResult<Option<&'a str>> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| ApiError::bad_request(format!("invalid {name} header")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_publish_request_from_headers() {
        let mut fixture = HeaderMap::new();
        fixture.insert("x-title", HeaderValue::from_static("Backup"));
        fixture.insert("x-tags", HeaderValue::from_static("disk, warning,"));
        fixture.insert("x-priority", HeaderValue::from_static("4"));

        let actual = publish_request(&fixture, Bytes::from_static(b"done")).unwrap();
        let expected = PublishRequest::new("done")
            .title("Backup")
            .tags(vec!["disk".to_string(), "warning".to_string()])
            .priority(4u8);
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_publish_request_with_attachment() {
        let mut fixture = HeaderMap::new();
        fixture.insert("x-filename", HeaderValue::from_static("log.txt"));

        let actual = publish_request(&fixture, Bytes::from_static(b"0123456789")).unwrap();
        let expected = PublishRequest::new("You received a file: log.txt").attachment(
            AttachmentUpload {
                name: "log.txt".to_string(),
                size: 10,
            },
        );
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_publish_request_bad_priority() {
        let mut fixture = HeaderMap::new();
        fixture.insert("x-priority", HeaderValue::from_static("urgent"));

        let actual = publish_request(&fixture, Bytes::new());
        assert!(matches!(actual, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_subscribe_query_poll_flag() {
        let fixture = SubscribeQuery {
            since: Some("all".to_string()),
            poll: Some("1".to_string()),
        };
        assert!(fixture.is_poll());
        assert_eq!(fixture.since().unwrap(), Since::All);

        let fixture = SubscribeQuery::default();
        assert!(!fixture.is_poll());
        assert_eq!(fixture.since().unwrap(), Since::None);
    }
}
