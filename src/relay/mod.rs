//! The receiving side of a send request: an HTTP-framework-agnostic handler
//! which turns one JSON request into one email and hands it to a `MailSink`.
//!
//! The endpoint is public and unauthenticated, answering any origin. Put it
//! behind whatever access control the deployment needs.

pub mod message;
pub mod smtp;

pub use self::message::OutboundMail;
pub use self::smtp::SmtpSink;

use serde_json::{json, Value};
use validator::ValidateEmail;

use self::message::Composition;

/// The result of handing an email to a `MailSink`
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Accepted. The transport's response is included.
    Delivered(String),

    /// Not accepted. The error is included.
    Failed(String),
}

/// Where the endpoint sends the emails it builds
pub trait MailSink: Send + Sync {
    /// Domain used in generated Message-IDs
    fn helo_name(&self) -> &str;

    fn deliver(&self, mail: &OutboundMail) -> Delivery;
}

/// An incoming HTTP request, reduced to what the endpoint looks at
#[derive(Debug, Clone, Default)]
pub struct RelayRequest {
    pub method: String,
    /// Value of the Host header, if any
    pub host: Option<String>,
    pub body: Vec<u8>,
}

impl RelayRequest {
    pub fn post(host: Option<&str>, body: &str) -> RelayRequest {
        RelayRequest {
            method: "POST".to_owned(),
            host: host.map(|h| h.to_owned()),
            body: body.as_bytes().to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelayResponse {
    pub status_code: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl RelayResponse {
    fn preflight() -> RelayResponse {
        RelayResponse {
            status_code: 200,
            headers: cors_headers(),
            body: String::new(),
        }
    }

    fn json(status_code: u16, body: Value) -> RelayResponse {
        let mut headers = cors_headers();
        headers.push(("Content-Type", "application/json".to_owned()));
        RelayResponse {
            status_code,
            headers,
            body: body.to_string(),
        }
    }

    fn failed(status_code: u16, message: &str) -> RelayResponse {
        RelayResponse::json(status_code, json!({ "status": "failed", "message": message }))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| &**v)
    }
}

fn cors_headers() -> Vec<(&'static str, String)> {
    vec![
        ("Access-Control-Allow-Origin", "*".to_owned()),
        ("Access-Control-Allow-Methods", "POST, OPTIONS".to_owned()),
        ("Access-Control-Allow-Headers", "Content-Type".to_owned()),
    ]
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct IncomingSend {
    to: Option<String>,
    from_name: Option<String>,
    from_email: Option<String>,
    subject: Option<String>,
    body: Option<String>,
}

/// The sender address to use: the requested one if it is a valid address,
/// otherwise `no-reply@` the request host (without `www.` or a port).
pub fn resolve_sender(from_email: Option<&str>, host: Option<&str>) -> String {
    if let Some(email) = from_email.map(str::trim) {
        if email.validate_email() {
            return email.to_owned();
        }
    }

    let host = host
        .map(|h| h.trim().to_lowercase())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_owned());
    let host = host.split(':').next().unwrap_or("localhost");
    let host = host.strip_prefix("www.").unwrap_or(host);
    format!("no-reply@{}", host)
}

pub struct RelayEndpoint<M: MailSink> {
    sink: M,
}

impl<M: MailSink> RelayEndpoint<M> {
    pub fn new(sink: M) -> RelayEndpoint<M> {
        RelayEndpoint { sink }
    }

    pub fn handle(&self, request: &RelayRequest) -> RelayResponse {
        if request.method.eq_ignore_ascii_case("OPTIONS") {
            return RelayResponse::preflight();
        }
        if !request.method.eq_ignore_ascii_case("POST") {
            return RelayResponse::failed(405, "Method not allowed");
        }

        let incoming: IncomingSend = match serde_json::from_slice(&request.body) {
            Ok(i) => i,
            Err(e) => {
                debug!("(relay) unusable request body: {}", e);
                return RelayResponse::failed(400, "No data received");
            }
        };

        let to = match incoming.to.as_deref().map(str::trim) {
            Some(to) if !to.is_empty() => to.to_owned(),
            _ => return RelayResponse::failed(400, "Missing recipient"),
        };

        let from_email = resolve_sender(incoming.from_email.as_deref(), request.host.as_deref());
        let parts = Composition {
            to: &to,
            from_name: incoming.from_name.as_deref().unwrap_or(""),
            from_email: &from_email,
            subject: incoming.subject.as_deref().unwrap_or(""),
            html_body: incoming.body.as_deref().unwrap_or(""),
        };

        let mail = match message::compose(&parts, self.sink.helo_name()) {
            Ok(m) => m,
            Err(e) => {
                warn!("(relay) unable to build email for {}: {}", to, e);
                return RelayResponse::failed(500, "Email sending failed");
            }
        };

        match self.sink.deliver(&mail) {
            Delivery::Delivered(response) => {
                debug!("(relay) delivered to {}: {}", to, response);
                RelayResponse::json(
                    200,
                    json!({
                        "status": "success",
                        "message": format!("Email sent to {}", to),
                        "debug_from": from_email,
                    }),
                )
            }
            Delivery::Failed(reason) => {
                warn!("(relay) delivery to {} failed: {}", to, reason);
                RelayResponse::failed(500, "Email sending failed")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingSink {
        accept: bool,
        sent: Mutex<Vec<OutboundMail>>,
    }

    impl RecordingSink {
        fn new(accept: bool) -> RecordingSink {
            RecordingSink {
                accept,
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    impl MailSink for RecordingSink {
        fn helo_name(&self) -> &str {
            "relay.test"
        }

        fn deliver(&self, mail: &OutboundMail) -> Delivery {
            self.sent.lock().unwrap().push(mail.clone());
            if self.accept {
                Delivery::Delivered("250 OK".to_owned())
            } else {
                Delivery::Failed("554 rejected".to_owned())
            }
        }
    }

    fn body_json(response: &RelayResponse) -> Value {
        serde_json::from_str(&response.body).unwrap()
    }

    #[test]
    fn test_preflight() {
        let endpoint = RelayEndpoint::new(RecordingSink::new(true));
        let response = endpoint.handle(&RelayRequest {
            method: "OPTIONS".to_owned(),
            host: None,
            body: Vec::new(),
        });
        assert_eq!(response.status_code, 200);
        assert!(response.body.is_empty());
        assert_eq!(response.header("access-control-allow-origin"), Some("*"));
        assert!(endpoint.sink.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_sends_and_reports() {
        let endpoint = RelayEndpoint::new(RecordingSink::new(true));
        let response = endpoint.handle(&RelayRequest::post(
            Some("example.com"),
            r#"{"to":"a@x.com","fromName":"Ops","fromEmail":"ops@example.com","subject":"Hi","body":"<b>x</b>"}"#,
        ));

        assert_eq!(response.status_code, 200);
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert_eq!(response.header("Access-Control-Allow-Origin"), Some("*"));
        let body = body_json(&response);
        assert_eq!(body["status"], "success");
        assert_eq!(body["message"], "Email sent to a@x.com");
        assert_eq!(body["debug_from"], "ops@example.com");

        let sent = endpoint.sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@x.com");
        assert_eq!(sent[0].from, "ops@example.com");
        assert!(sent[0].message_id.ends_with("@relay.test"));
    }

    #[test]
    fn test_transport_failure() {
        let endpoint = RelayEndpoint::new(RecordingSink::new(false));
        let response = endpoint.handle(&RelayRequest::post(
            None,
            r#"{"to":"a@x.com","fromEmail":"ops@example.com","subject":"Hi","body":"x"}"#,
        ));
        assert_eq!(response.status_code, 500);
        let body = body_json(&response);
        assert_eq!(body["status"], "failed");
        assert_eq!(body["message"], "Email sending failed");
    }

    #[test]
    fn test_empty_or_garbage_body() {
        let endpoint = RelayEndpoint::new(RecordingSink::new(true));
        for raw in ["", "not json", "[1,2"].iter() {
            let response = endpoint.handle(&RelayRequest::post(None, raw));
            assert_eq!(response.status_code, 400);
            assert_eq!(body_json(&response)["status"], "failed");
        }
        let response = endpoint.handle(&RelayRequest::post(None, r#"{"subject":"no to"}"#));
        assert_eq!(response.status_code, 400);
        assert_eq!(body_json(&response)["message"], "Missing recipient");
        assert!(endpoint.sink.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_sender_fallback() {
        assert_eq!(resolve_sender(Some("ops@example.com"), Some("x.org")), "ops@example.com");
        assert_eq!(resolve_sender(Some("not an email"), Some("www.Example.com")), "no-reply@example.com");
        assert_eq!(resolve_sender(None, Some("www.example.com:8443")), "no-reply@example.com");
        assert_eq!(resolve_sender(Some(""), Some("mail.example.com")), "no-reply@mail.example.com");
        assert_eq!(resolve_sender(None, None), "no-reply@localhost");
    }

    #[test]
    fn test_fallback_sender_is_used() {
        let endpoint = RelayEndpoint::new(RecordingSink::new(true));
        let response = endpoint.handle(&RelayRequest::post(
            Some("www.shop.example"),
            r#"{"to":"a@x.com","fromName":"Shop","fromEmail":"bogus","subject":"Hi","body":"x"}"#,
        ));
        assert_eq!(body_json(&response)["debug_from"], "no-reply@shop.example");
        assert_eq!(endpoint.sink.sent.lock().unwrap()[0].from, "no-reply@shop.example");
    }
}
