//! Keeps the display from sleeping while the watcher is visible.

use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::display::ActivityLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

#[derive(Debug, thiserror::Error)]
#[error("{name}: {message}")]
pub struct WakeLockError {
    pub name: String,
    pub message: String,
}

pub trait WakeLock {
    /// Acquire the lock, replacing any lock already held.
    fn request(&mut self) -> Result<(), WakeLockError>;
}

/// Requests the lock on init and again each time the watcher becomes visible,
/// reporting every attempt to the activity log.
pub struct WakeLockKeeper<L> {
    lock: L,
    active: bool,
}

impl<L: WakeLock> WakeLockKeeper<L> {
    pub fn new(lock: L) -> Self {
        Self {
            lock,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn init(&mut self, log: &mut impl ActivityLog) {
        self.request(log);
        log.append("Wake Lock initialized", false);
    }

    pub fn on_visibility_change(&mut self, visibility: Visibility, log: &mut impl ActivityLog) {
        if visibility == Visibility::Visible {
            self.request(log);
        }
    }

    fn request(&mut self, log: &mut impl ActivityLog) {
        match self.lock.request() {
            Ok(()) => {
                self.active = true;
                log.append("Wake Lock is active", false);
            }
            Err(e) => {
                self.active = false;
                warn!(error = %e, "wake lock request failed");
                log.append(
                    &format!("Failed to request Wake Lock: {}, {}", e.name, e.message),
                    true,
                );
            }
        }
    }
}

/// How long a freshly spawned inhibitor must survive before it counts as held.
/// `systemd-inhibit` exits at once when logind is unreachable.
const SETTLE: Duration = Duration::from_millis(150);

/// Holds an idle inhibitor by keeping a `systemd-inhibit` child alive.
#[derive(Debug)]
pub struct InhibitLock {
    program: String,
    args: Vec<String>,
    settle: Duration,
    child: Option<Child>,
}

impl Default for InhibitLock {
    fn default() -> Self {
        Self::with_command(
            "systemd-inhibit",
            [
                "--what=idle:sleep",
                "--who=scan-watch",
                "--why=live status display",
                "--mode=block",
                "sleep",
                "infinity",
            ],
        )
    }
}

impl InhibitLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold the lock through `program args..` instead of `systemd-inhibit`.
    /// The child must stay running for as long as the lock is held.
    pub fn with_command<I, A>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            settle: SETTLE,
            child: None,
        }
    }

    fn release(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn not_allowed(message: impl Into<String>) -> WakeLockError {
    WakeLockError {
        name: "NotAllowedError".into(),
        message: message.into(),
    }
}

impl WakeLock for InhibitLock {
    fn request(&mut self) -> Result<(), WakeLockError> {
        if let Some(child) = self.child.as_mut() {
            if matches!(child.try_wait(), Ok(None)) {
                return Ok(());
            }
        }
        self.release();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| not_allowed(e.to_string()))?;

        std::thread::sleep(self.settle);
        match child.try_wait() {
            Ok(None) => {}
            Ok(Some(status)) => {
                return Err(not_allowed(format!("{} exited: {status}", self.program)));
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(not_allowed(e.to_string()));
            }
        }
        debug!(pid = child.id(), program = %self.program, "inhibitor started");
        self.child = Some(child);
        Ok(())
    }
}

/// Drive `keeper` from process signals until `cancel` fires: SIGUSR1 marks
/// the display visible (the lock is requested again), SIGUSR2 marks it hidden.
#[cfg(unix)]
pub async fn follow_visibility<L, A>(
    mut keeper: WakeLockKeeper<L>,
    mut log: A,
    cancel: CancellationToken,
) -> std::io::Result<()>
where
    L: WakeLock,
    A: ActivityLog,
{
    use tokio::signal::unix::{signal, SignalKind};

    let mut shown = signal(SignalKind::user_defined1())?;
    let mut hidden = signal(SignalKind::user_defined2())?;
    loop {
        let visibility = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = shown.recv() => Visibility::Visible,
            _ = hidden.recv() => Visibility::Hidden,
        };
        debug!(?visibility, "visibility changed");
        keeper.on_visibility_change(visibility, &mut log);
    }
}

impl Drop for InhibitLock {
    fn drop(&mut self) {
        self.release();
    }
}
