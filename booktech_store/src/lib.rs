pub mod api;

#[cfg(any(feature = "client", test))]
pub mod client;

#[cfg(any(feature = "server", test))]
pub mod accounts;

#[cfg(any(feature = "server", test))]
pub mod app_config;

#[cfg(any(feature = "server", test))]
pub mod catalog_lookup;

#[cfg(any(feature = "server", test))]
pub mod checkout;

#[cfg(any(feature = "server", test))]
pub mod context;

#[cfg(any(feature = "server", test))]
mod handlers;

#[cfg(any(feature = "server", test))]
pub mod order_workflow;

#[cfg(any(feature = "server", test))]
pub mod passwords;

#[cfg(any(feature = "server", test))]
pub mod payment_gateway;

#[cfg(any(feature = "server", test))]
pub mod pricing;

#[cfg(any(feature = "server", test))]
pub mod service_error;

#[cfg(any(feature = "server", test))]
pub mod settings;

#[cfg(any(feature = "server", test))]
pub mod store_repository;
