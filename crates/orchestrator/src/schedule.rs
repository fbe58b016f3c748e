//! Daily catalog update.

use std::sync::Arc;
use std::time::Duration;

use exn::ResultExt;
use time::{OffsetDateTime, Time};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::Orchestrator;
use crate::error::{ErrorKind, Result};

/// Time until the next `hour:00` UTC strictly after `now`.
pub fn next_run_delay(now: OffsetDateTime, hour: u8) -> Result<Duration> {
    let at = Time::from_hms(hour, 0, 0).or_raise(|| ErrorKind::InvalidSchedule(format!("hour {hour}")))?;
    let now = now.to_offset(time::UtcOffset::UTC);
    let mut next = now.replace_time(at);
    if next <= now {
        next += time::Duration::DAY;
    }
    Ok((next - now).unsigned_abs())
}

/// Enqueues every stored series once a day at `hour` UTC until `shutdown`
/// is cancelled.
pub async fn run_daily(orchestrator: Arc<Orchestrator>, hour: u8, shutdown: CancellationToken) -> Result<()> {
    loop {
        let delay = next_run_delay(OffsetDateTime::now_utc(), hour)?;
        info!(hour, in_secs = delay.as_secs(), "Next catalog update scheduled");
        tokio::select! {
            () = shutdown.cancelled() => return Ok(()),
            () = tokio::time::sleep(delay) => {},
        }
        match orchestrator.enqueue_all().await {
            Ok(added) => info!(added, "Scheduled catalog update queued"),
            Err(err) => warn!(error = %*err, "Scheduled catalog update failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use time::macros::datetime;

    #[rstest]
    #[case(datetime!(2026-01-01 00:00 UTC), 2, 2 * 3600)]
    #[case(datetime!(2026-01-01 01:59:30 UTC), 2, 30)]
    #[case(datetime!(2026-01-01 02:00 UTC), 2, 24 * 3600)]
    #[case(datetime!(2026-01-01 03:00 UTC), 2, 23 * 3600)]
    #[case(datetime!(2026-01-01 03:00 +02:00), 2, 3600)]
    fn test_next_run_delay(#[case] now: OffsetDateTime, #[case] hour: u8, #[case] secs: u64) {
        assert_eq!(next_run_delay(now, hour).unwrap(), Duration::from_secs(secs));
    }

    #[test]
    fn test_invalid_hour() {
        let err = next_run_delay(OffsetDateTime::UNIX_EPOCH, 24).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidSchedule(_)));
    }
}
