// Application state for HTTP handlers
use crate::application::dashboard_service::DashboardService;
use crate::application::frame_repository::FrameRepository;
use crate::application::refresh_service::RefreshService;
use crate::domain::catalog::Catalog;
use crate::infrastructure::auth::TokenService;
use crate::infrastructure::rate_limit::LoginRateLimiter;
use crate::infrastructure::server_registry::ServerRegistry;
use crate::infrastructure::upstream_repository::UpstreamRepository;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub dashboard_service: DashboardService,
    pub refresh_service: RefreshService,
    pub frames: Arc<dyn FrameRepository>,
    pub upstream: Arc<UpstreamRepository>,
    pub tokens: TokenService,
    pub login_limiter: Arc<LoginRateLimiter>,
    pub servers: Arc<ServerRegistry>,
}
