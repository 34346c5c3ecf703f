use async_trait::async_trait;
use log::{debug, error, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::{AlertSettings, MailSettings, Target};
use crate::error::Error;
use crate::mailer::Mailer;
use crate::probe::ProbeError;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(30);

/// One failed probe, reported by a monitor to the supervisor.
#[derive(Debug)]
pub struct AlertEvent {
    pub target: Arc<Target>,
    pub error: ProbeError,
}

impl AlertEvent {
    /// The one-line description used for logs, mail subjects and webhooks.
    pub fn message(&self) -> String {
        format!(
            "Slow or error response from {}: {}: {}",
            self.target.host, self.target.url, self.error
        )
    }
}

/// Handles one alert at a time. The supervisor awaits each call before
/// receiving the next event, so implementations never run concurrently.
#[async_trait]
pub trait Alerter: Send + Sync {
    async fn handle(&self, event: &AlertEvent);
}

/// Production alerter: logs the failure, runs the configured diagnostic
/// command, then mails the report and posts the webhook. Every side effect
/// is best effort; a failing one is logged and the rest still run.
pub struct AlertManager {
    shell_command: Option<String>,
    command_timeout: Duration,
    mailer: Option<Mailer>,
    webhook: Option<Webhook>,
}

struct Webhook {
    client: reqwest::Client,
    url: String,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    host: &'a str,
    url: &'a str,
    message: &'a str,
}

impl AlertManager {
    pub fn from_config(alert: &AlertSettings, mail: &MailSettings) -> Result<Self, Error> {
        let webhook = match &alert.webhook_url {
            None => None,
            Some(url) => Some(Webhook {
                client: reqwest::Client::builder()
                    .timeout(WEBHOOK_TIMEOUT)
                    .build()?,
                url: url.clone(),
            }),
        };
        Ok(Self {
            shell_command: alert.shell_command.clone(),
            command_timeout: alert.command_timeout,
            mailer: Mailer::from_settings(mail),
            webhook,
        })
    }

    /// Runs the diagnostic command with the target's host and process owner
    /// as its two arguments, returning combined stdout and stderr. The
    /// command is killed once the configured timeout elapses.
    async fn run_diagnostic_command(&self, program: &str, target: &Target) -> Option<String> {
        let pid_owner = target.pid_owner.as_deref().unwrap_or_default();
        let mut command = Command::new(program);
        command
            .arg(&target.host)
            .arg(pid_owner)
            .kill_on_drop(true);

        match timeout(self.command_timeout, command.output()).await {
            Err(_) => {
                error!(
                    "Diagnostic command {program} timed out after {:?}",
                    self.command_timeout
                );
                None
            }
            Ok(Err(err)) => {
                error!("Error running diagnostic command {program}: {err}");
                None
            }
            Ok(Ok(output)) => {
                if !output.status.success() {
                    warn!("Diagnostic command {program} exited with {}", output.status);
                }
                let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
                combined.push_str(&String::from_utf8_lossy(&output.stderr));
                Some(combined)
            }
        }
    }
}

impl Webhook {
    async fn post(&self, event: &AlertEvent, message: &str) -> Result<(), Error> {
        let payload = WebhookPayload {
            host: &event.target.host,
            url: event.target.url.as_str(),
            message,
        };
        self.client
            .post(&self.url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl Alerter for AlertManager {
    async fn handle(&self, event: &AlertEvent) {
        let message = event.message();
        warn!("{message}");

        let mut report = message.clone();
        if let Some(program) = &self.shell_command {
            if let Some(output) = self.run_diagnostic_command(program, &event.target).await {
                report.push_str("\n\n");
                report.push_str(&output);
            }
        }

        if let Some(mailer) = &self.mailer {
            match mailer.send(&message, report).await {
                Ok(()) => debug!("Alert mail sent for {}", event.target.host),
                Err(err) => error!("Error sending alert mail: {err}"),
            }
        }

        if let Some(webhook) = &self.webhook {
            if let Err(err) = webhook.post(event, &message).await {
                error!("Error posting alert webhook: {err}");
            }
        }
    }
}
