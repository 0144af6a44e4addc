// HTTP request handlers
use crate::application::render_plan::WidgetView;
use crate::domain::catalog::DeviceType;
use crate::domain::dashboard::{DashboardAction, DashboardLayout};
use crate::domain::server::{NewServer, ServerPatch, ServerView};
use crate::infrastructure::auth::{Claims, IssuedToken};
use crate::infrastructure::file_store::is_valid_id;
use crate::infrastructure::http_response::{accepts_brotli, json_attachment, json_response};
use crate::infrastructure::upstream_repository::UpstreamRepository;
use crate::presentation::app_state::AppState;
use crate::presentation::error::AppError;
use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, Path, RawQuery, Request, State},
    http::{header, HeaderMap, Method, Response, StatusCode},
    middleware::Next,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub layout: DashboardLayout,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub widget_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DataResponse {
    dashboard_id: String,
    time_range: String,
    refreshed_at: i64,
    widgets: Vec<WidgetView>,
}

fn dashboard_id(id: String) -> Result<String, AppError> {
    if is_valid_id(&id) {
        Ok(id)
    } else {
        Err(AppError::BadRequest(format!("Invalid dashboard id '{}'", id)))
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Rejects requests without a valid bearer token; the claims are handed
/// to the handler as an extension.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response<Body>, AppError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let claims = state.tokens.verify(token.trim()).map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        AppError::Unauthorized
    })?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Attempts are limited per client address, or per username when the
/// address is unknown.
pub async fn login(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<IssuedToken>, AppError> {
    let client = match connect_info {
        Some(ConnectInfo(addr)) => addr.ip().to_string(),
        None => format!("user:{}", request.username),
    };
    if !state.login_limiter.check(&client) {
        return Err(AppError::TooManyRequests);
    }

    let tokens = state.tokens.clone();
    let LoginRequest { username, password } = request;
    let (username, issued) = tokio::task::spawn_blocking(move || {
        let issued = tokens.login(&username, &password);
        (username, issued)
    })
    .await
    .map_err(|e| AppError::Internal(e.into()))?;

    match issued? {
        Some(issued) => {
            state.login_limiter.reset(&client);
            tracing::info!("User {} logged in", username);
            Ok(Json(issued))
        }
        None => Err(AppError::Unauthorized),
    }
}

pub async fn verify(Extension(claims): Extension<Claims>) -> Json<Value> {
    Json(serde_json::json!({
        "subject": claims.sub,
        "expiresAt": claims.exp,
    }))
}

/// List devices known to the upstream database
pub async fn list_devices(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let devices = state.frames.list_devices().await.map_err(AppError::Upstream)?;
    Ok(Json(devices))
}

/// Run a raw query (query builder) and return the frames
pub async fn query_frames(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Response<Body>, AppError> {
    if request.query.trim().is_empty() {
        return Err(AppError::BadRequest("Query must not be empty".to_string()));
    }

    let frames = state
        .frames
        .query_frames(&request.query)
        .await
        .map_err(AppError::Upstream)?;
    Ok(json_response(&frames, accepts_brotli(&headers)).await.into_response())
}

pub async fn list_device_types(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    json_response(&state.catalog.summaries(), accepts_brotli(&headers)).await
}

pub async fn get_device_type(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DeviceType>, AppError> {
    state
        .catalog
        .device_type(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Device type {} not found", id)))
}

pub async fn get_dashboard(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardLayout>, AppError> {
    let id = dashboard_id(id)?;
    Ok(Json(state.dashboard_service.get(&id).await?))
}

/// Replace the whole layout snapshot
pub async fn put_dashboard(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(layout): Json<DashboardLayout>,
) -> Result<Json<DashboardLayout>, AppError> {
    let id = dashboard_id(id)?;
    Ok(Json(state.dashboard_service.replace(&id, layout).await?))
}

pub async fn apply_action(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(action): Json<DashboardAction>,
) -> Result<Json<ActionResponse>, AppError> {
    let id = dashboard_id(id)?;
    let (layout, widget_id) = state.dashboard_service.apply(&id, action).await?;
    Ok(Json(ActionResponse { layout, widget_id }))
}

/// Refresh every widget of a dashboard and return the render plan
pub async fn dashboard_data(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Result<Response<Body>, AppError> {
    let id = dashboard_id(id)?;
    let layout = state.dashboard_service.get(&id).await?;
    let widgets = state.refresh_service.refresh(&layout).await;

    let response = DataResponse {
        dashboard_id: id,
        time_range: layout.time_range,
        refreshed_at: chrono::Utc::now().timestamp_millis(),
        widgets,
    };
    Ok(json_response(&response, accepts_brotli(&headers)).await.into_response())
}

/// Download the layout as a backup file
pub async fn export_dashboard(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response<Body>, AppError> {
    let id = dashboard_id(id)?;
    let layout = state.dashboard_service.get(&id).await?;
    Ok(json_attachment(&layout, &format!("dashboard-{}.json", id)).into_response())
}

/// Restore a backup, written through immediately
pub async fn import_dashboard(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(layout): Json<DashboardLayout>,
) -> Result<Json<DashboardLayout>, AppError> {
    let id = dashboard_id(id)?;
    tracing::info!("Importing dashboard {} ({} widgets)", id, layout.widgets.len());
    Ok(Json(state.dashboard_service.import(&id, layout).await?))
}

/// Thin pass-through to the upstream REST API; the upstream status code
/// and body are returned unchanged.
pub async fn proxy(
    State(state): State<Arc<AppState>>,
    method: Method,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response<Body>, AppError> {
    forward(&state.upstream, method, &path, query.as_deref(), &headers, body).await
}

pub async fn list_servers(State(state): State<Arc<AppState>>) -> Json<Vec<ServerView>> {
    Json(state.servers.list().await)
}

pub async fn create_server(
    State(state): State<Arc<AppState>>,
    Json(input): Json<NewServer>,
) -> Result<(StatusCode, Json<ServerView>), AppError> {
    let view = state.servers.create(input).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn update_server(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(patch): Json<ServerPatch>,
) -> Result<Json<ServerView>, AppError> {
    Ok(Json(state.servers.update(&id, patch).await?))
}

pub async fn delete_server(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, AppError> {
    state.servers.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Pass-through to a registered server, authenticated with its stored key
pub async fn server_proxy(
    State(state): State<Arc<AppState>>,
    method: Method,
    Path((id, path)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response<Body>, AppError> {
    let connection = state.servers.connection(&id).await?;
    let upstream = state.upstream.for_server(&connection.url, connection.api_key);
    forward(&upstream, method, &path, query.as_deref(), &headers, body).await
}

async fn forward(
    upstream: &UpstreamRepository,
    method: Method,
    path: &str,
    query: Option<&str>,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response<Body>, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    let answer = upstream
        .forward(method, path, query, content_type, body)
        .await
        .map_err(AppError::Upstream)?;

    let mut response = Response::builder().status(answer.status);
    if let Some(content_type) = answer.content_type {
        response = response.header(header::CONTENT_TYPE, content_type);
    }
    response
        .body(Body::from(answer.body))
        .map_err(|e| AppError::Internal(e.into()))
}
