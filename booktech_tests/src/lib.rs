//! Tests against running services, enabled with the `system_tests` and `load_tests` features

#[cfg(all(test, feature = "system_tests"))]
mod system_tests;


/// Base url of a service, overridden by the given environment variable
#[cfg(test)]
fn service_url(variable: &str, default: &str) -> String {
    std::env::var(variable).unwrap_or_else(|_| default.to_string())
}
