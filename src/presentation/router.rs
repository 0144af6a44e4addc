// Route table - public routes plus everything behind the bearer token check
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    apply_action, create_server, dashboard_data, delete_server, export_dashboard, get_dashboard,
    get_device_type, health_check, import_dashboard, list_device_types, list_devices, list_servers,
    login, proxy, put_dashboard, query_frames, require_auth, server_proxy, update_server, verify,
};
use axum::{
    middleware,
    routing::{any, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

// Note: JSON payloads are Brotli-encoded by our response builders,
// so there is no CompressionLayer here
pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/auth/verify", get(verify))
        .route("/api/devices", get(list_devices))
        .route("/api/query", post(query_frames))
        .route("/api/device-types", get(list_device_types))
        .route("/api/device-types/:id", get(get_device_type))
        .route("/api/dashboards/:id", get(get_dashboard).put(put_dashboard))
        .route("/api/dashboards/:id/actions", post(apply_action))
        .route("/api/dashboards/:id/data", get(dashboard_data))
        .route("/api/dashboards/:id/export", get(export_dashboard))
        .route("/api/dashboards/:id/import", post(import_dashboard))
        .route("/api/servers", get(list_servers).post(create_server))
        .route("/api/servers/:id", put(update_server).delete(delete_server))
        .route("/api/servers/:id/proxy/*path", any(server_proxy))
        .route("/api/proxy/*path", any(proxy))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/healthz", get(health_check))
        .route("/api/auth/login", post(login))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
