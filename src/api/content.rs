//! Content API endpoints.
//!
//! Request flow for mutating verbs: read body (capped), verify the SSH
//! signature (unless this is the public contact-form POST), parse JSON,
//! sanitize against the resource allowlist, then read-merge-write the
//! backing file.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::ApiResult;
use crate::auth;
use crate::errors::AppError;
use crate::models::{Mode, Resource};
use crate::sanitize::sanitize;
use crate::AppState;

fn resolve(name: &str) -> Result<Resource, AppError> {
    Resource::from_name(name).ok_or_else(|| AppError::NotFound("Unknown resource".to_string()))
}

/// Percent-decode the request path; this decoded form is what gets signed.
fn decoded_path(uri: &Uri) -> Result<String, AppError> {
    urlencoding::decode(uri.path())
        .map(|path| path.into_owned())
        .map_err(|_| AppError::BadRequest("Bad request".to_string()))
}

fn parse_body(body: &[u8]) -> Result<Value, AppError> {
    if body.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(body)
        .map_err(|_| AppError::BadRequest("Invalid JSON body".to_string()))
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

async fn require_auth(
    state: &AppState,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), AppError> {
    let path = decoded_path(uri)?;
    auth::authorize(state.verifier.as_ref(), method, &path, headers, body).await
}

fn singleton_id_error() -> AppError {
    AppError::BadRequest("Resource does not support ids".to_string())
}

fn item_id_matches(item: &Value, id: &str) -> bool {
    item.get("id").and_then(Value::as_str) == Some(id)
}

/// GET /api/:resource - Full collection or singleton document.
pub async fn fetch_resource(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult {
    let resource = resolve(&name)?;
    let data = state.store.load(resource).await?;
    Ok((StatusCode::OK, Json(data)).into_response())
}

/// GET /api/:resource/:id - Single collection item.
pub async fn fetch_item(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
) -> ApiResult {
    let resource = resolve(&name)?;
    if resource.mode() == Mode::Singleton {
        return Err(singleton_id_error());
    }
    let data = state.store.load(resource).await?;
    let item = data
        .as_array()
        .and_then(|items| items.iter().find(|item| item_id_matches(item, &id)))
        .cloned();
    match item {
        Some(item) => Ok((StatusCode::OK, Json(item)).into_response()),
        None => Err(AppError::NotFound("Not found".to_string())),
    }
}

/// POST /api/:resource - Create a collection item, or merge into a
/// singleton document.
///
/// `POST /api/messages` is the one verb that skips signature verification:
/// the public contact form. Every other mutation is admin-only.
pub async fn submit_resource(
    State(state): State<AppState>,
    Path(name): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    let resource = resolve(&name)?;
    if resource.mode() == Mode::Singleton {
        return merge_singleton(&state, resource, &method, &uri, &headers, &body).await;
    }

    let is_public_message_post = resource == Resource::Messages;
    if !is_public_message_post {
        require_auth(&state, &method, &uri, &headers, &body).await?;
    }

    let payload = parse_body(&body)?;
    let cleaned = sanitize(resource, &payload, false)?;

    let mut item = Map::new();
    item.insert("id".to_string(), json!(Uuid::new_v4().to_string()));
    item.insert("createdAt".to_string(), json!(now_iso()));
    item.extend(cleaned);

    let mut items = state
        .store
        .load(resource)
        .await?
        .as_array()
        .cloned()
        .unwrap_or_default();
    items.insert(0, Value::Object(item.clone()));
    state.store.save(resource, &Value::Array(items)).await?;

    Ok((StatusCode::CREATED, Json(Value::Object(item))).into_response())
}

/// PUT /api/:resource - Merge into a singleton document. Collections need
/// an id in the path.
pub async fn merge_resource(
    State(state): State<AppState>,
    Path(name): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    let resource = resolve(&name)?;
    if resource.mode() == Mode::Singleton {
        return merge_singleton(&state, resource, &method, &uri, &headers, &body).await;
    }
    require_auth(&state, &method, &uri, &headers, &body).await?;
    Err(AppError::BadRequest("Missing resource id".to_string()))
}

/// DELETE /api/:resource - Singletons are never deleted; collections need
/// an id in the path.
pub async fn remove_resource(
    State(state): State<AppState>,
    Path(name): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    let resource = resolve(&name)?;
    if resource.mode() == Mode::Singleton {
        return Err(AppError::MethodNotAllowed("Method not allowed".to_string()));
    }
    require_auth(&state, &method, &uri, &headers, &body).await?;
    Err(AppError::BadRequest("Missing resource id".to_string()))
}

/// POST /api/:resource/:id - Never valid; creation assigns ids server-side.
pub async fn submit_item(
    State(state): State<AppState>,
    Path((name, _id)): Path<(String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    let resource = resolve(&name)?;
    if resource.mode() == Mode::Singleton {
        return Err(singleton_id_error());
    }
    // The public-messages bypass covers POST without id only; an id in the
    // path always requires auth before the shape error is reported.
    require_auth(&state, &method, &uri, &headers, &body).await?;
    Err(AppError::BadRequest(
        "POST does not accept resource id".to_string(),
    ))
}

/// PUT /api/:resource/:id - Merge fields into a collection item.
pub async fn update_item(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    let resource = resolve(&name)?;
    if resource.mode() == Mode::Singleton {
        return Err(singleton_id_error());
    }
    require_auth(&state, &method, &uri, &headers, &body).await?;

    let payload = parse_body(&body)?;
    let cleaned = sanitize(resource, &payload, true)?;

    let mut items = state
        .store
        .load(resource)
        .await?
        .as_array()
        .cloned()
        .unwrap_or_default();
    let Some(index) = items.iter().position(|item| item_id_matches(item, &id)) else {
        return Err(AppError::NotFound("Not found".to_string()));
    };

    let mut updated = items[index].as_object().cloned().unwrap_or_default();
    updated.extend(cleaned);
    updated.insert("updatedAt".to_string(), json!(now_iso()));
    items[index] = Value::Object(updated.clone());

    state.store.save(resource, &Value::Array(items)).await?;
    Ok((StatusCode::OK, Json(Value::Object(updated))).into_response())
}

/// DELETE /api/:resource/:id - Remove a collection item.
pub async fn remove_item(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    let resource = resolve(&name)?;
    if resource.mode() == Mode::Singleton {
        return Err(singleton_id_error());
    }
    require_auth(&state, &method, &uri, &headers, &body).await?;

    let items = state
        .store
        .load(resource)
        .await?
        .as_array()
        .cloned()
        .unwrap_or_default();
    let remaining: Vec<Value> = items
        .iter()
        .filter(|item| !item_id_matches(item, &id))
        .cloned()
        .collect();
    if remaining.len() == items.len() {
        return Err(AppError::NotFound("Not found".to_string()));
    }

    state.store.save(resource, &Value::Array(remaining)).await?;
    Ok((StatusCode::OK, Json(json!({"ok": true, "id": id}))).into_response())
}

/// Shared POST/PUT path for singleton resources: sanitize as a partial
/// update, shallow-merge over the stored document, stamp timestamps.
async fn merge_singleton(
    state: &AppState,
    resource: Resource,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: &[u8],
) -> ApiResult {
    require_auth(state, method, uri, headers, body).await?;

    let payload = parse_body(body)?;
    let cleaned = sanitize(resource, &payload, true)?;

    let current = state.store.load(resource).await?;
    let has_created = current
        .get("createdAt")
        .and_then(Value::as_str)
        .map(|s| !s.is_empty())
        .unwrap_or(false);

    let mut merged = current.as_object().cloned().unwrap_or_default();
    merged.extend(cleaned);
    let now = now_iso();
    merged.insert("updatedAt".to_string(), json!(now));
    if !has_created {
        merged.insert("createdAt".to_string(), json!(now));
    }

    state.store.save(resource, &Value::Object(merged.clone())).await?;
    Ok((StatusCode::OK, Json(Value::Object(merged))).into_response())
}
