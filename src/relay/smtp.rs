use std::net::ToSocketAddrs;
use std::time::Duration;

use lettre::smtp::authentication::{Credentials, Mechanism};
use lettre::smtp::client::net::ClientTlsParameters;
use lettre::smtp::error::Error as LettreSmtpError;
use lettre::smtp::extension::ClientId;
use lettre::smtp::response::Severity;
use lettre::smtp::{ClientSecurity, SmtpClient};
use lettre::Transport;
use native_tls::{Protocol, TlsConnector};

use super::message::OutboundMail;
use super::{Delivery, MailSink};
use crate::config::{AuthMechanism, RelayConfig};

/// Hands relay emails to the configured SMTP smarthost
pub struct SmtpSink {
    config: RelayConfig,
}

impl SmtpSink {
    pub fn new(config: RelayConfig) -> SmtpSink {
        SmtpSink { config }
    }
}

impl MailSink for SmtpSink {
    fn helo_name(&self) -> &str {
        &self.config.helo_name
    }

    fn deliver(&self, mail: &OutboundMail) -> Delivery {
        smtp_delivery(mail, &self.config)
    }
}

fn client_security(config: &RelayConfig) -> Result<ClientSecurity, Delivery> {
    if !config.use_tls {
        return Ok(ClientSecurity::None);
    }

    let connector = match TlsConnector::builder()
        .min_protocol_version(Some(Protocol::Tlsv12))
        .build()
    {
        Ok(connector) => connector,
        Err(e) => {
            info!("(relay) failed to create TLS Connector: {:?}", e);
            return Err(Delivery::Failed(format!("Failed to create TLS connector: {:?}", e)));
        }
    };

    let tls_parameters = ClientTlsParameters::new(config.domain_name.clone(), connector);
    if config.require_tls {
        Ok(ClientSecurity::Required(tls_parameters))
    } else {
        Ok(ClientSecurity::Opportunistic(tls_parameters))
    }
}

// Deliver an email to the smarthost
fn smtp_delivery(mail: &OutboundMail, config: &RelayConfig) -> Delivery {
    let sendable_email = match mail.as_sendable_email() {
        Ok(se) => se,
        Err(e) => {
            warn!("Invalid email address error: {:?}", e);
            return Delivery::Failed(format!("Invalid email address error: {}", e));
        }
    };

    let security = match client_security(config) {
        Ok(s) => s,
        Err(failed) => return failed,
    };

    let sockaddr = match (&*config.domain_name, config.port).to_socket_addrs() {
        Err(e) => {
            warn!("ToSocketAddr failed for ({}, {}): {:?}", config.domain_name, config.port, e);
            return Delivery::Failed(format!(
                "ToSockaddr failed for ({}, {}): {:?}",
                config.domain_name, config.port, e
            ));
        }
        Ok(mut iter) => match iter.next() {
            Some(sa) => sa,
            None => {
                warn!("No SockAddrs for ({}, {})", config.domain_name, config.port);
                return Delivery::Failed(format!(
                    "No SockAddrs for ({}, {})",
                    config.domain_name, config.port
                ));
            }
        },
    };

    let client = match SmtpClient::new(sockaddr, security) {
        Ok(c) => c,
        Err(e) => {
            info!("(relay) failed to setup SMTP transport: {:?}", e);
            return Delivery::Failed(format!("Unable to setup SMTP transport: {:?}", e));
        }
    };

    let mut client = client
        .hello_name(ClientId::Domain(config.helo_name.to_owned()))
        .smtp_utf8(true)
        .timeout(Some(Duration::from_secs(config.smtp_timeout_secs)));

    if let Some(ref auth) = config.auth {
        let mechanism = match auth.mechanism {
            AuthMechanism::Plain => Mechanism::Plain,
            AuthMechanism::Login => Mechanism::Login,
        };
        client = client
            .authentication_mechanism(mechanism)
            .credentials(Credentials::new(auth.username.clone(), auth.password.clone()));
    }

    let mut mailer = client.transport();

    debug!("Starting SMTP delivery to {} via {}", mail.to, config.domain_name);

    let result = match mailer.send(sendable_email) {
        Ok(response) => match response.code.severity {
            Severity::PositiveCompletion | Severity::PositiveIntermediate => {
                info!("(relay) Delivery Success: {:?}", response);
                Delivery::Delivered(format!("{:?}", response))
            }
            _ => {
                info!("(relay) Delivery Failed: {:?}", response);
                Delivery::Failed(format!("{:?}", response))
            }
        },
        Err(LettreSmtpError::Transient(response)) | Err(LettreSmtpError::Permanent(response)) => {
            info!("(relay) Delivery Failed: {:?}", response);
            Delivery::Failed(format!("{:?}", response))
        }
        Err(LettreSmtpError::Io(ioe)) => {
            info!("(relay) Delivery Failed (I/O error): {:?}", ioe);
            Delivery::Failed(format!("I/O error: {:?}", ioe))
        }
        Err(e) => {
            info!("(relay) delivery failed response: {:?}", e);
            Delivery::Failed(format!("{:?}", e))
        }
    };

    mailer.close();

    result
}
