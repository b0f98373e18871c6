//! Background loops: the rule scheduler and the revert sweeper.
//!
//! Both tick on a fixed interval until the shutdown channel flips to `true`.
//! A tick that overruns its period delays the next one instead of stacking.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Run `job` every `period` until shutdown is signalled.
pub async fn every<F, Fut>(name: &'static str, period: Duration, mut shutdown: watch::Receiver<bool>, mut job: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(task = name, period_secs = period.as_secs(), "background task started");

    loop {
        tokio::select! {
            _ = interval.tick() => job().await,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    tracing::info!(task = name, "background task stopped");
}
