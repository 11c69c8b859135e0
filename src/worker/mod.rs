use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{json, Value};
use tokio::time::sleep;
use tracing::{error, info};

use crate::services::supabase::{DataStore, StoreError};
use crate::state::AppState;

/// Default sweep interval, overridable via `TRACKING_SWEEP_SECS`.
const DEFAULT_SWEEP_SECS: u64 = 600;

pub async fn start_background_workers(state: AppState) {
    // Single periodic task for now. Can be extended to multiple tasks.
    tokio::spawn(async move {
        let sweep_secs: u64 = std::env::var("TRACKING_SWEEP_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_SWEEP_SECS);
        loop {
            match sweep_completed_events(state.store.as_ref()).await {
                Ok(updated) if updated > 0 => {
                    info!(updated, "advanced tracked events to completed");
                }
                Ok(_) => {}
                Err(err) => {
                    error!(?err, "completed-event sweep failed");
                }
            }
            sleep(Duration::from_secs(sweep_secs)).await;
        }
    });
}

/// One sweep tick: asks the backend to advance every tracked event whose
/// window has passed. The transition itself runs server-side; the reply
/// carries the number of rows it moved.
pub async fn sweep_completed_events(store: &dyn DataStore) -> Result<i64, StoreError> {
    let result = store
        .rpc("check_and_update_completed_events", json!({}))
        .await?;
    Ok(result
        .get("updated_count")
        .and_then(Value::as_i64)
        .unwrap_or(0))
}

/// The completion rule the server-side sweep applies: the event's date is
/// past, or is today and its "HH:MM" end time has already passed. An event
/// today without an end time stays open until the day rolls over.
#[allow(dead_code)]
pub fn is_event_completed(event_date: NaiveDate, end_time: Option<&str>, now: NaiveDateTime) -> bool {
    let today = now.date();
    if event_date < today {
        return true;
    }
    if event_date > today {
        return false;
    }
    match end_time.and_then(|t| NaiveTime::parse_from_str(t, "%H:%M").ok()) {
        Some(end) => now.time() > end,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::supabase::MockBackend;

    #[tokio::test]
    async fn sweep_invokes_rpc_and_reads_updated_count() {
        let mock = MockBackend::new();
        mock.set_rpc_result(
            "check_and_update_completed_events",
            json!({ "updated_count": 3 }),
        );

        let updated = sweep_completed_events(&mock).await.unwrap();
        assert_eq!(updated, 3);

        let calls = mock.rpc_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "check_and_update_completed_events");
        assert_eq!(calls[0].1, json!({}));
    }

    #[tokio::test]
    async fn sweep_treats_missing_count_as_zero() {
        let mock = MockBackend::new();
        let updated = sweep_completed_events(&mock).await.unwrap();
        assert_eq!(updated, 0);
    }

    #[tokio::test]
    async fn sweep_surfaces_rpc_failure() {
        let mock = MockBackend::new();
        mock.fail_rpc_function("check_and_update_completed_events");
        assert!(sweep_completed_events(&mock).await.is_err());
    }

    fn at(date: &str, time: &str) -> NaiveDateTime {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
        let time = NaiveTime::parse_from_str(time, "%H:%M").unwrap();
        date.and_time(time)
    }

    fn day(date: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn past_date_is_completed() {
        assert!(is_event_completed(
            day("2026-05-01"),
            None,
            at("2026-05-02", "00:01")
        ));
    }

    #[test]
    fn future_date_is_not_completed() {
        assert!(!is_event_completed(
            day("2026-05-03"),
            Some("10:00"),
            at("2026-05-02", "23:59")
        ));
    }

    #[test]
    fn today_with_passed_end_time_is_completed() {
        assert!(is_event_completed(
            day("2026-05-02"),
            Some("18:00"),
            at("2026-05-02", "19:30")
        ));
    }

    #[test]
    fn today_with_remaining_end_time_is_not_completed() {
        assert!(!is_event_completed(
            day("2026-05-02"),
            Some("18:00"),
            at("2026-05-02", "17:59")
        ));
    }

    #[test]
    fn today_without_end_time_stays_open() {
        assert!(!is_event_completed(
            day("2026-05-02"),
            None,
            at("2026-05-02", "23:59")
        ));
    }

    #[test]
    fn unparseable_end_time_is_ignored() {
        assert!(!is_event_completed(
            day("2026-05-02"),
            Some("late evening"),
            at("2026-05-02", "23:59")
        ));
    }
}
