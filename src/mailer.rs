use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::warn;
use std::time::Duration;

use crate::config::MailSettings;
use crate::error::Error;

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends alert mail through an SMTP relay, typically a local one that does
/// not require TLS. Credentials are attached only when both username and
/// password are configured.
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl Mailer {
    /// Builds a mailer from settings, or `None` when mail is not configured.
    /// Mail needs at least one valid recipient and a valid from address;
    /// individual bad recipient addresses are logged and skipped.
    pub fn from_settings(settings: &MailSettings) -> Option<Self> {
        if settings.to.is_empty() {
            return None;
        }
        let Some(from) = settings.from.as_deref() else {
            warn!("Mail disabled: recipients configured but no from address");
            return None;
        };
        let from: Mailbox = match from.parse() {
            Ok(mailbox) => mailbox,
            Err(err) => {
                warn!("Mail disabled: invalid from address {from}: {err}");
                return None;
            }
        };
        let to: Vec<Mailbox> = settings
            .to
            .iter()
            .filter_map(|addr| match addr.parse() {
                Ok(mailbox) => Some(mailbox),
                Err(err) => {
                    warn!("Ignoring mail recipient {addr}: {err}");
                    None
                }
            })
            .collect();
        if to.is_empty() {
            warn!("Mail disabled: no valid recipients");
            return None;
        }

        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(settings.host.as_str())
                .port(settings.port)
                .timeout(Some(SEND_TIMEOUT));
        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Some(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    /// Sends one plain-text message to every configured recipient.
    pub async fn send(&self, subject: &str, body: String) -> Result<(), Error> {
        let mut builder = Message::builder().from(self.from.clone());
        for to in &self.to {
            builder = builder.to(to.clone());
        }
        let message = builder
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        self.transport.send(message).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured_settings() -> MailSettings {
        MailSettings {
            from: Some("webmon@example.com".to_string()),
            to: vec!["ops@example.com".to_string()],
            ..MailSettings::default()
        }
    }

    #[test]
    fn test_mail_disabled_without_recipients() {
        assert!(Mailer::from_settings(&MailSettings::default()).is_none());
    }

    #[test]
    fn test_mail_disabled_without_from_address() {
        let settings = MailSettings {
            from: None,
            ..configured_settings()
        };
        assert!(Mailer::from_settings(&settings).is_none());
    }

    #[test]
    fn test_mail_disabled_when_no_recipient_parses() {
        let settings = MailSettings {
            to: vec!["not an address".to_string()],
            ..configured_settings()
        };
        assert!(Mailer::from_settings(&settings).is_none());
    }

    #[tokio::test]
    async fn test_bad_recipient_is_skipped() {
        let settings = MailSettings {
            to: vec![
                "ops@example.com".to_string(),
                "not an address".to_string(),
                "Oncall <oncall@example.com>".to_string(),
            ],
            ..configured_settings()
        };
        let mailer = Mailer::from_settings(&settings).expect("mail should be enabled");
        assert_eq!(mailer.to.len(), 2);
    }

    #[tokio::test]
    async fn test_send_failure_is_an_error_not_a_panic() {
        // Port 9 (discard) is not listening; the connection is refused.
        let settings = MailSettings {
            host: "127.0.0.1".to_string(),
            port: 9,
            ..configured_settings()
        };
        let mailer = Mailer::from_settings(&settings).expect("mail should be enabled");
        let result = mailer.send("webmon test", "test body".to_string()).await;
        assert!(matches!(result, Err(Error::Smtp(_))));
    }
}
