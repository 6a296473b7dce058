//! Periodic subscription-expiry and nurture sweeps.
//!
//! Both sweeps are idempotent and may overlap a manual run from the admin
//! endpoints.

use std::time::Duration;

use academy_lifecycle::Academy;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::SchedulerConfig;

/// Run both sweeps on their intervals until `cancel` is triggered.
///
/// The first tick fires immediately, so a restarted server catches up at
/// once.
pub async fn run(academy: Academy, config: SchedulerConfig, cancel: CancellationToken) {
    tracing::info!(
        expiry_interval_secs = config.expiry_sweep_interval_secs,
        nurture_interval_secs = config.nurture_sweep_interval_secs,
        "Sweep scheduler started"
    );

    let mut expiry = tokio::time::interval(Duration::from_secs(
        config.expiry_sweep_interval_secs.max(1),
    ));
    expiry.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut nurture = tokio::time::interval(Duration::from_secs(
        config.nurture_sweep_interval_secs.max(1),
    ));
    nurture.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Sweep scheduler stopping");
                break;
            }
            _ = expiry.tick() => {
                match academy.expiry.sweep().await {
                    Ok(changed) if changed.is_empty() => {
                        tracing::debug!("Expiry sweep: nothing to do");
                    }
                    Ok(changed) => tracing::info!(changed = changed.len(), "Expiry sweep: students updated"),
                    Err(e) => tracing::error!(error = %e, "Expiry sweep failed"),
                }
            }
            _ = nurture.tick() => {
                match academy.engine.nurture_sweep().await {
                    Ok(lost) if lost.is_empty() => {
                        tracing::debug!("Nurture sweep: nothing to do");
                    }
                    Ok(lost) => tracing::info!(lost = lost.len(), "Nurture sweep: leads marked lost"),
                    Err(e) => tracing::error!(error = %e, "Nurture sweep failed"),
                }
            }
        }
    }
}
