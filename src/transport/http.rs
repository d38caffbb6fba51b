use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::json;

use super::{RelayOutcome, RelayTransport, SendRequest};
use crate::config::Config;
use crate::error::Error;

/// Posts each send request as JSON to the relay endpoint
pub struct HttpRelay {
    url: String,
    client: Client,
}

impl HttpRelay {
    /// Build a relay client from the configuration. Every request is bounded by
    /// `send_timeout_secs`; a hung relay shows up as a failed send rather than a
    /// stuck campaign.
    pub fn new(config: &Config) -> Result<HttpRelay, Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.send_timeout_secs))
            .build()?;

        Ok(HttpRelay {
            url: config.relay_url.clone(),
            client,
        })
    }
}

impl RelayTransport for HttpRelay {
    fn send(&self, request: &SendRequest) -> RelayOutcome {
        debug!("POST {} for {}", self.url, request.to);

        let response = match self.client.post(&self.url).json(request).send() {
            Ok(r) => r,
            Err(e) => {
                info!("Relay request for {} failed: {}", request.to, e);
                let kind = if e.is_timeout() { "timeout" } else { "request" };
                return RelayOutcome::failed(
                    &format!("Request failed: {}", e),
                    json!({ "error": kind, "detail": e.to_string() }),
                );
            }
        };

        let status = response.status();
        let body = match response.text() {
            Ok(b) => b,
            Err(e) => {
                info!("Reading relay response for {} failed: {}", request.to, e);
                return RelayOutcome::failed(
                    &format!("Unreadable response: {}", e),
                    json!({ "error": "Unreadable response", "status": status.as_u16() }),
                );
            }
        };

        trace!("Relay answered {} for {}: {}", status, request.to, body);
        RelayOutcome::from_reply(status.is_success(), &body)
    }
}
