//! Fetch interception: live network with a fixed fallback.

use tracing::{trace, warn};

use crate::config::FallbackConfig;
use crate::net::{Request, Response};
use crate::platform::Network;

/// Passes requests through to the network; answers 503 when it fails.
///
/// The cache is never consulted.
pub struct FetchInterceptor<'a> {
    network: &'a dyn Network,
    fallback: &'a FallbackConfig,
}

impl<'a> FetchInterceptor<'a> {
    pub fn new(network: &'a dyn Network, fallback: &'a FallbackConfig) -> Self {
        Self { network, fallback }
    }

    /// Single attempt; the network response is returned untouched.
    pub async fn respond(&self, request: &Request) -> Response {
        match self.network.fetch(request).await {
            Ok(response) => {
                trace!(url = %request.url, status = response.status.as_u16(), "Passed through");
                response
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "Network failed, serving fallback");
                self.fallback_response()
            }
        }
    }

    pub fn fallback_response(&self) -> Response {
        Response::service_unavailable(&self.fallback.body)
    }
}
