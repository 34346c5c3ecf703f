pub mod alert;
pub mod cli;
pub mod config;
pub mod error;
pub mod mailer;
pub mod monitor;
pub mod probe;
pub mod stats;
pub mod supervisor;

pub use alert::{AlertEvent, AlertManager, Alerter};
pub use config::{Config, Target};
pub use error::Error;
pub use probe::{HttpProber, ProbeError, ProbeResult, Prober};
pub use stats::ResponseStats;
pub use supervisor::Supervisor;

use log::{info, warn};
use tokio_util::sync::CancellationToken;

/// Wires the production prober and alerter to a supervisor and runs it
/// until the token is cancelled or the last monitor stops.
pub async fn run(config: Config, token: CancellationToken) -> Result<(), Error> {
    log_configuration(&config);

    let prober = HttpProber::new(config.monitor.max_response_time)?;
    let alerter = AlertManager::from_config(&config.alert, &config.mail)?;
    let supervisor = Supervisor::new(config.targets, prober, alerter, config.monitor, token);
    supervisor.run().await;
    Ok(())
}

fn log_configuration(config: &Config) {
    info!("Max response time: {:?}", config.monitor.max_response_time);
    info!("Monitor interval: {:?}", config.monitor.monitor_interval);
    info!("Disable interval: {:?}", config.monitor.disable_interval);
    info!("Log interval: {:?}", config.monitor.log_interval);
    if config.alert.shell_command.is_some() {
        info!("Diagnostic command is set, it will run on failure");
    }
    if config.mail.to.is_empty() {
        warn!("Mail recipients are not set, no alert mail will be sent");
    } else {
        info!(
            "Alert mail will be sent to {} recipients",
            config.mail.to.len()
        );
    }
    if config.alert.webhook_url.is_some() {
        info!("Webhook is set, a notification will be posted on failure");
    }
    if config.targets.is_empty() {
        warn!("No targets configured, nothing to monitor");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AlertSettings;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_run_returns_when_there_are_no_targets() {
        let result = run(Config::default(), CancellationToken::new()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_posts_webhook_for_failing_target() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = Config {
            targets: vec![Target::new("web-1", &format!("{}/ping", server.uri())).unwrap()],
            alert: AlertSettings {
                webhook_url: Some(format!("{}/hook", server.uri())),
                ..AlertSettings::default()
            },
            ..Config::default()
        };

        let token = CancellationToken::new();
        let handle = tokio::spawn(run(config, token.clone()));

        // Wait until the failure report reaches the webhook, then stop.
        for _ in 0..200 {
            let requests = server.received_requests().await.expect("requests recorded");
            if requests.iter().any(|r| r.url.path() == "/hook") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        token.cancel();

        let result = handle.await.expect("run task finishes");
        assert!(result.is_ok());
    }
}
