//! Background cleanup of expired sessions and verification records.
//!
//! Expiration is always checked when a record is read; the sweeper only
//! reclaims storage for rows nobody will read again.

use anyhow::Result;
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::store::{AuthStore, PurgeCounts};

/// Delete every record that expired before now.
pub async fn sweep_once(store: &dyn AuthStore) -> Result<PurgeCounts> {
    let counts = store.purge_expired(Utc::now()).await?;
    if counts.sessions > 0 || counts.verifications > 0 {
        info!(
            sessions = counts.sessions,
            verifications = counts.verifications,
            "purged expired records"
        );
    } else {
        debug!("no expired records to purge");
    }
    Ok(counts)
}

/// Run [`sweep_once`] every `every`; a zero interval disables the sweeper.
pub fn spawn_sweeper(
    store: Arc<dyn AuthStore>,
    every: Duration,
) -> Option<tokio::task::JoinHandle<()>> {
    if every.is_zero() {
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(err) = sweep_once(store.as_ref()).await {
                error!("expired record sweep failed: {err:#}");
            }
        }
    }))
}
