use log::{debug, info};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::alert::AlertEvent;
use crate::config::{MonitorSettings, Target};
use crate::probe::Prober;
use crate::stats::ResponseStats;

/// Watches a single target for the life of the process.
///
/// Every probe's response time is folded into a stats window that is logged
/// and reset on the log interval. A failed probe is reported to the
/// supervisor and pauses probing for the disable interval, so one outage
/// produces one alert rather than a stream of them.
pub struct TargetMonitor<P> {
    target: Arc<Target>,
    prober: Arc<P>,
    alerts: mpsc::Sender<AlertEvent>,
    settings: MonitorSettings,
    token: CancellationToken,
}

impl<P: Prober> TargetMonitor<P> {
    pub fn new(
        target: Arc<Target>,
        prober: Arc<P>,
        alerts: mpsc::Sender<AlertEvent>,
        settings: MonitorSettings,
        token: CancellationToken,
    ) -> Self {
        Self {
            target,
            prober,
            alerts,
            settings,
            token,
        }
    }

    /// Probes the target until cancellation, or until the supervisor goes
    /// away and the alert channel closes.
    pub async fn run(self) {
        info!("Monitoring {}: {}", self.target.host, self.target.url);
        let mut stats = ResponseStats::new();

        while !self.token.is_cancelled() {
            let result = self.prober.check(&self.target).await;
            stats.add(result.elapsed);

            if stats.window_age() >= self.settings.log_interval {
                info!("{}: {stats}", self.target.host);
                stats.clear();
            }

            let pause = match result.outcome {
                Ok(()) => {
                    debug!("Response from {} within limit", self.target.host);
                    self.settings.monitor_interval
                }
                Err(error) => {
                    let event = AlertEvent {
                        target: Arc::clone(&self.target),
                        error,
                    };
                    tokio::select! {
                        sent = self.alerts.send(event) => {
                            if sent.is_err() {
                                break;
                            }
                        }
                        () = self.token.cancelled() => break,
                    }
                    self.settings.disable_interval
                }
            };

            tokio::select! {
                () = sleep(pause) => {}
                () = self.token.cancelled() => break,
            }
        }
        debug!("Monitor for {} stopped", self.target.host);
    }
}
