pub mod http;
pub use self::http::HttpRelay;

use serde_json::{json, Value};

use crate::campaign::MessageParams;

/// JSON body posted to the relay, one per recipient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub to: String,
    pub from_name: String,
    pub from_email: String,
    pub subject: String,
    pub body: String,
}

impl SendRequest {
    pub fn new(params: &MessageParams, to: &str) -> SendRequest {
        SendRequest {
            to: to.to_owned(),
            from_name: params.from_name.clone(),
            from_email: params.from_email.clone(),
            subject: params.subject.clone(),
            body: params.body.clone(),
        }
    }
}

/// What came back from one send. Transport errors, malformed responses and
/// rejections by the relay all end up here with `success == false`.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayOutcome {
    pub success: bool,
    pub message: Option<String>,
    pub raw: Value,
}

impl RelayOutcome {
    pub fn failed(message: &str, raw: Value) -> RelayOutcome {
        RelayOutcome {
            success: false,
            message: Some(message.to_owned()),
            raw,
        }
    }

    /// Interpret a relay reply. Success requires a 2xx status *and* a JSON body
    /// with `status: "success"`. A body that is not JSON is kept as
    /// `{ error: "Non-JSON response", rawText }`.
    pub fn from_reply(http_ok: bool, body: &str) -> RelayOutcome {
        let raw: Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(_) => {
                return RelayOutcome::failed(
                    "Non-JSON response",
                    json!({ "error": "Non-JSON response", "rawText": body }),
                );
            }
        };

        let status_ok = raw.get("status").and_then(Value::as_str) == Some("success");
        let message = raw
            .get("message")
            .and_then(Value::as_str)
            .map(|s| s.to_owned());

        RelayOutcome {
            success: http_ok && status_ok,
            message,
            raw,
        }
    }
}

/// The one operation the dispatch loop needs from the outside world.
///
/// Implementations must not panic on bad input from the relay; they report it as
/// a failed outcome. The loop still guards against a panic, see `worker`.
pub trait RelayTransport: Send + Sync {
    fn send(&self, request: &SendRequest) -> RelayOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_names() {
        let req = SendRequest {
            to: "a@x.com".to_owned(),
            from_name: "Ops".to_owned(),
            from_email: "ops@x.com".to_owned(),
            subject: "Hi".to_owned(),
            body: "<p>hello</p>".to_owned(),
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["to"], "a@x.com");
        assert_eq!(v["fromName"], "Ops");
        assert_eq!(v["fromEmail"], "ops@x.com");
        assert_eq!(v["subject"], "Hi");
        assert_eq!(v["body"], "<p>hello</p>");
    }

    #[test]
    fn test_reply_success() {
        let o = RelayOutcome::from_reply(
            true,
            r#"{"status":"success","message":"Email sent to a@x.com","debug_from":"ops@x.com"}"#,
        );
        assert!(o.success);
        assert_eq!(o.message.as_deref(), Some("Email sent to a@x.com"));
        assert_eq!(o.raw["debug_from"], "ops@x.com");
    }

    #[test]
    fn test_reply_failed_status() {
        let o = RelayOutcome::from_reply(false, r#"{"status":"failed","message":"Email sending failed"}"#);
        assert!(!o.success);
        assert_eq!(o.message.as_deref(), Some("Email sending failed"));

        // 2xx alone is not enough
        let o = RelayOutcome::from_reply(true, r#"{"status":"failed","message":"nope"}"#);
        assert!(!o.success);
    }

    #[test]
    fn test_reply_not_json() {
        let o = RelayOutcome::from_reply(true, "<html>502 Bad Gateway</html>");
        assert!(!o.success);
        assert_eq!(o.message.as_deref(), Some("Non-JSON response"));
        assert_eq!(o.raw["error"], "Non-JSON response");
        assert_eq!(o.raw["rawText"], "<html>502 Bad Gateway</html>");
    }
}
