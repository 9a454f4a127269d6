pub mod api;
pub mod auth;
pub mod clock;
pub mod telemetry;
