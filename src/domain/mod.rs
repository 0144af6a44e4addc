// Domain layer - widget pipeline types and pure rules
pub mod catalog;
pub mod conversion;
pub mod dashboard;
pub mod frame;
pub mod server;
pub mod status;
pub mod telemetry;
pub mod widget;
