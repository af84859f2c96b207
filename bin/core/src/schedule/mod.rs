use std::sync::atomic::{AtomicBool, Ordering};

use async_timing_util::{Timelength, wait_until_timelength};
use depot_client::entities::depot_timestamp;

use crate::{batch, errorlog};

const ADDITIONAL_MS: u128 = 500;

/// Ticks never overlap themselves: each loop is sequential, and the
/// flags also hold if a tick is ever triggered out of band.
static REAPER_TICKING: AtomicBool = AtomicBool::new(false);
static MAINTAINER_TICKING: AtomicBool = AtomicBool::new(false);

pub fn spawn_schedulers() {
  spawn_batch_reaper();
  spawn_partition_maintainer();
}

/// Every 5 minutes, moves IN_PROGRESS batches past the configured
/// timeout to NOT_COMPLETED. Each batch transition runs in its own
/// transaction inside [batch::reap_expired].
fn spawn_batch_reaper() {
  tokio::spawn(async move {
    loop {
      wait_until_timelength(Timelength::FiveMinutes, ADDITIONAL_MS)
        .await;
      if REAPER_TICKING.swap(true, Ordering::Acquire) {
        continue;
      }
      match batch::reap_expired().await {
        Ok(0) => {}
        Ok(reaped) => {
          info!("Batch reaper tick | reaped: {reaped}")
        }
        Err(e) => {
          error!("Batch reaper tick failed | {e:?}")
        }
      }
      REAPER_TICKING.store(false, Ordering::Release);
    }
  });
}

/// Just after each month boundary (00:00 UTC on the 1st), makes sure
/// the new current month's partition exists and pre-creates the next
/// one, so appends never race partition creation.
fn spawn_partition_maintainer() {
  tokio::spawn(async move {
    loop {
      let now = depot_timestamp();
      let boundary = errorlog::next_month(now);
      let wait = (boundary - now)
        .to_std()
        .unwrap_or_default()
        .saturating_add(std::time::Duration::from_secs(5));
      tokio::time::sleep(wait).await;

      if MAINTAINER_TICKING.swap(true, Ordering::Acquire) {
        continue;
      }
      let now = depot_timestamp();
      for at in [now, errorlog::next_month(now)] {
        if let Err(e) = errorlog::ensure_partition(at).await {
          error!(
            "Partition maintainer failed for {} | {e:?}",
            errorlog::partition_name(at)
          );
        }
      }
      MAINTAINER_TICKING.store(false, Ordering::Release);
    }
  });
}
