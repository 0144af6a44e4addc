// Infrastructure layer - External dependencies and adapters
pub mod auth;
pub mod catalog_loader;
pub mod config;
pub mod file_store;
pub mod http_response;
pub mod rate_limit;
pub mod secret_box;
pub mod server_registry;
pub mod upstream_repository;
