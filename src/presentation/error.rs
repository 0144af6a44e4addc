use crate::application::dashboard_service::DashboardServiceError;
use crate::domain::dashboard::DashboardError;
use crate::domain::server::ServerError;
use crate::infrastructure::server_registry::ServerRegistryError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Too many login attempts, try again later")]
    TooManyRequests,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Upstream error: {0:#}")]
    Upstream(anyhow::Error),

    #[error("Internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl From<DashboardServiceError> for AppError {
    fn from(e: DashboardServiceError) -> Self {
        match e {
            DashboardServiceError::Dashboard(DashboardError::WidgetNotFound(id)) => {
                AppError::NotFound(format!("Widget {} not found", id))
            }
            DashboardServiceError::Dashboard(e) => AppError::BadRequest(e.to_string()),
            DashboardServiceError::Store(e) => AppError::Internal(e),
        }
    }
}

impl From<ServerRegistryError> for AppError {
    fn from(e: ServerRegistryError) -> Self {
        match e {
            ServerRegistryError::Server(e @ ServerError::NotFound(_)) => AppError::NotFound(e.to_string()),
            ServerRegistryError::Server(e @ ServerError::Invalid(_)) => AppError::BadRequest(e.to_string()),
            ServerRegistryError::Store(e) => AppError::Internal(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("{}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let not_found: AppError =
            DashboardServiceError::Dashboard(DashboardError::WidgetNotFound("w".to_string())).into();
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let store: AppError = DashboardServiceError::Store(anyhow::anyhow!("disk full")).into();
        assert_eq!(store.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(
            AppError::Upstream(anyhow::anyhow!("timeout")).into_response().status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(AppError::Unauthorized.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::TooManyRequests.into_response().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_server_registry_errors() {
        let missing: AppError = ServerRegistryError::from(ServerError::NotFound("s1".to_string())).into();
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let invalid: AppError = ServerRegistryError::from(ServerError::Invalid("bad url".to_string())).into();
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);

        let store: AppError = ServerRegistryError::Store(anyhow::anyhow!("cannot decrypt")).into();
        assert_eq!(store.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
