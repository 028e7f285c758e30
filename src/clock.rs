use std::time::Duration;

use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tokio_util::sync::CancellationToken;

use crate::display::ClockSink;

pub const TICK: Duration = Duration::from_millis(850);

/// Wall-clock text in the form `2024/05/01 09:30:00`.
pub fn format_time(t: OffsetDateTime) -> String {
    let fmt = format_description!("[year]/[month]/[day] [hour]:[minute]:[second]");
    t.format(&fmt)
        .unwrap_or_else(|_| String::from("----/--/-- --:--:--"))
}

/// Local time when the offset can be determined, UTC otherwise.
pub fn now_local() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    match UtcOffset::current_local_offset() {
        Ok(offset) => now.to_offset(offset),
        Err(_) => now,
    }
}

/// Push the current time into `sink` every [`TICK`] until cancelled.
pub async fn run_clock(mut sink: impl ClockSink, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(TICK);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = interval.tick() => sink.show_time(&format_time(now_local())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn formats_zero_padded() {
        assert_eq!(
            format_time(datetime!(2024-05-01 09:03:07 UTC)),
            "2024/05/01 09:03:07"
        );
    }

    #[derive(Clone, Default)]
    struct Ticks(std::sync::Arc<std::sync::Mutex<Vec<String>>>);

    impl ClockSink for Ticks {
        fn show_time(&mut self, text: &str) {
            self.0.lock().unwrap().push(text.to_string());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_until_cancelled() {
        let ticks = Ticks::default();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_clock(ticks.clone(), cancel.clone()));

        tokio::time::sleep(TICK * 2 + Duration::from_millis(10)).await;
        cancel.cancel();
        task.await.unwrap();

        // first tick fires immediately
        assert_eq!(ticks.0.lock().unwrap().len(), 3);
    }
}
