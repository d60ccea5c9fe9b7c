use core::time::Duration;

use tracing::error;

use crate::config::Config;

/// Client for the AWS service calls, bounded by `http_timeout`.
#[must_use]
pub fn get_client(config: &Config) -> reqwest::Client {
    build_client(config).unwrap_or_else(|e| {
        error!(
            "Unable to build HTTP client: {}, falling back to the default client",
            e
        );
        reqwest::Client::new()
    })
}

fn build_client(config: &Config) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(Duration::from_secs(config.http_timeout))
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        .tcp_keepalive(Some(Duration::from_secs(120)))
        .build()
}

/// Client for the local Runtime API. `/invocation/next` blocks until the
/// next event, so no request timeout is set.
pub fn get_runtime_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().no_proxy().build()
}
