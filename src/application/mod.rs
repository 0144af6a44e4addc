// Application layer - use cases over the domain
pub mod dashboard_service;
pub mod dashboard_store;
pub mod frame_repository;
pub mod refresh_service;
pub mod render_plan;
pub mod template_resolver;
pub mod widget_data;
