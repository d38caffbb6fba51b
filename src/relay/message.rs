use chrono::Utc;
use email_format::Email;
use lettre::{EmailAddress, Envelope, SendableEmail};
use uuid::Uuid;

use crate::error::Error;

/// An email, prepared for delivery by a `MailSink`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutboundMail {
    pub to: String,
    pub from: String,
    pub message_id: String,
    pub message: Vec<u8>,
}

/// The parts of a relay request that end up in the message
pub struct Composition<'a> {
    pub to: &'a str,
    pub from_name: &'a str,
    pub from_email: &'a str,
    pub subject: &'a str,
    pub html_body: &'a str,
}

/// Build the RFC 5322 message for one recipient. The body is sent as HTML and
/// replies go back to the sender address.
pub fn compose(parts: &Composition, helo_name: &str) -> Result<OutboundMail, Error> {
    let from = mailbox(parts.from_name, parts.from_email);
    let date = Utc::now().to_rfc2822();

    let mut email = Email::new(&*from, &*date)?;
    email.set_reply_to(parts.from_email)?;
    email.set_to(parts.to)?;
    email.set_subject(parts.subject)?;

    let message_id = format!("{}@{}", Uuid::new_v4().hyphenated(), helo_name);
    email.set_message_id(&*format!("<{}>", message_id))?;

    email.add_optional_field(("MIME-Version", "1.0"))?;
    email.add_optional_field(("Content-Type", "text/html; charset=UTF-8"))?;
    email.set_body(&*crlf(parts.html_body))?;

    Ok(OutboundMail {
        to: parts.to.to_owned(),
        from: parts.from_email.to_owned(),
        message_id,
        message: format!("{}", email).into_bytes(),
    })
}

impl OutboundMail {
    pub fn as_sendable_email(&self) -> Result<SendableEmail, Error> {
        let envelope = Envelope::new(
            Some(EmailAddress::new(self.from.clone())?),
            vec![EmailAddress::new(self.to.clone())?],
        )?;
        Ok(SendableEmail::new(
            envelope,
            self.message_id.clone(),
            self.message.clone(),
        ))
    }
}

// "Name" <addr>, or the bare address if there is no name
fn mailbox(name: &str, addr: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        return addr.to_owned();
    }
    let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\" <{}>", escaped, addr)
}

fn crlf(body: &str) -> String {
    body.replace("\r\n", "\n").replace('\n', "\r\n")
}
