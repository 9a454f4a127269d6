pub mod api;
pub mod progress;
pub mod reading_session;

#[cfg(any(feature = "client", test))]
pub mod client;

#[cfg(any(feature = "server", test))]
pub mod app_config;
#[cfg(any(feature = "server", test))]
mod handlers;
#[cfg(any(feature = "server", test))]
pub mod progress_repository;
#[cfg(any(feature = "server", test))]
pub mod settings;
