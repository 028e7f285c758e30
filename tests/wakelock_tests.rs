#![cfg(unix)]

use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use scan_watch::display::ActivityLog;
use scan_watch::wakelock::{follow_visibility, WakeLock, WakeLockError, WakeLockKeeper};

struct Counting(Arc<AtomicUsize>);

impl WakeLock for Counting {
    fn request(&mut self) -> Result<(), WakeLockError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct Shared(Arc<Mutex<Vec<String>>>);

impl ActivityLog for Shared {
    fn append(&mut self, message: &str, _is_error: bool) {
        self.0.lock().unwrap().push(message.to_string());
    }
}

fn raise(signal: &str) {
    let status = Command::new("kill")
        .args([signal, &std::process::id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn user_signals_drive_visibility() {
    let requests = Arc::new(AtomicUsize::new(0));
    let log = Shared::default();
    let mut keeper = WakeLockKeeper::new(Counting(requests.clone()));
    keeper.init(&mut log.clone());
    assert_eq!(requests.load(Ordering::SeqCst), 1);

    let cancel = CancellationToken::new();
    let task = tokio::spawn(follow_visibility(keeper, log.clone(), cancel.clone()));
    tokio::time::sleep(Duration::from_millis(100)).await;

    raise("-USR2");
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(requests.load(Ordering::SeqCst), 1);

    raise("-USR1");
    tokio::time::timeout(Duration::from_secs(5), async {
        while requests.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("SIGUSR1 requests the lock again");
    assert_eq!(
        log.0.lock().unwrap().last().map(String::as_str),
        Some("Wake Lock is active")
    );

    cancel.cancel();
    task.await.unwrap().unwrap();
}
