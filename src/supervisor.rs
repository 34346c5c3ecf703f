use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::alert::{AlertEvent, Alerter};
use crate::config::{MonitorSettings, Target};
use crate::monitor::TargetMonitor;
use crate::probe::Prober;

/// Pause between monitor launches so the first probes do not all fire at
/// the same instant.
const LAUNCH_STAGGER: Duration = Duration::from_secs(3);

/// Owns the monitor tasks and funnels their alerts into one handler.
///
/// Alerts are handled one at a time in arrival order; monitors for other
/// targets keep probing while a report is being handled.
pub struct Supervisor<P, A> {
    targets: Vec<Target>,
    prober: Arc<P>,
    alerter: A,
    settings: MonitorSettings,
    token: CancellationToken,
}

impl<P, A> Supervisor<P, A>
where
    P: Prober + 'static,
    A: Alerter,
{
    pub fn new(
        targets: Vec<Target>,
        prober: P,
        alerter: A,
        settings: MonitorSettings,
        token: CancellationToken,
    ) -> Self {
        Self {
            targets,
            prober: Arc::new(prober),
            alerter,
            settings,
            token,
        }
    }

    /// Runs until cancellation or until every monitor has stopped, then
    /// waits for the monitor tasks to finish.
    pub async fn run(self) {
        let Self {
            targets,
            prober,
            alerter,
            settings,
            token,
        } = self;
        info!("Starting monitors for {} targets", targets.len());

        // A single-slot channel: a monitor hands its alert directly to the
        // supervisor and immediately enters its own cooldown.
        let (alerts_tx, mut alerts_rx) = mpsc::channel::<AlertEvent>(1);

        let mut monitors = Vec::with_capacity(targets.len());
        for (i, target) in targets.into_iter().enumerate() {
            if i > 0 {
                tokio::select! {
                    () = sleep(LAUNCH_STAGGER) => {}
                    () = token.cancelled() => break,
                }
            }
            let monitor = TargetMonitor::new(
                Arc::new(target),
                Arc::clone(&prober),
                alerts_tx.clone(),
                settings,
                token.clone(),
            );
            monitors.push(tokio::spawn(monitor.run()));
        }
        drop(alerts_tx);

        loop {
            tokio::select! {
                event = alerts_rx.recv() => match event {
                    Some(event) => alerter.handle(&event).await,
                    None => break,
                },
                () = token.cancelled() => break,
            }
        }

        debug!("Waiting for monitors to stop");
        for monitor in monitors {
            if let Err(err) = monitor.await {
                error!("Monitor task failed: {err}");
            }
        }
        info!("All monitors stopped");
    }
}
