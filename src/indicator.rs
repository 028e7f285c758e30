use tracing::{info, warn};

use crate::display::Display;
use crate::types::{ConnectionState, StatusView};

pub const CONNECTING_MESSAGE: &str = "Connecting…";
pub const OK_MESSAGE: &str = "Normal";
pub const ERROR_MESSAGE: &str = "An error occurred while attempting to sync.";

/// Two-state connectivity signal driven only by stream open/error callbacks.
///
/// `Connecting` is the initial state and is never re-entered; `Ok` and `Error`
/// alternate for the lifetime of the session.
#[derive(Debug, Default)]
pub struct ConnectionIndicator {
    state: ConnectionState,
}

impl ConnectionIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn view(&self) -> StatusView {
        match self.state {
            ConnectionState::Connecting => StatusView::default(),
            ConnectionState::Ok => StatusView {
                state: ConnectionState::Ok,
                message: OK_MESSAGE.to_string(),
                stream_active: true,
            },
            ConnectionState::Error => StatusView {
                state: ConnectionState::Error,
                message: ERROR_MESSAGE.to_string(),
                stream_active: false,
            },
        }
    }

    pub fn on_open(&mut self, display: &mut impl Display) {
        if self.state != ConnectionState::Ok {
            info!(from = self.state.as_str(), "stream connected");
        }
        self.state = ConnectionState::Ok;
        display.show_status(&self.view());
    }

    pub fn on_error(&mut self, display: &mut impl Display) {
        if self.state != ConnectionState::Error {
            warn!(from = self.state.as_str(), "stream error");
        }
        self.state = ConnectionState::Error;
        display.show_status(&self.view());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Statuses(Vec<StatusView>);

    impl Display for Statuses {
        fn show_current(&mut self, _: &str, _: usize) {}
        fn show_history(&mut self, _: &str, _: usize) {}
        fn show_status(&mut self, status: &StatusView) {
            self.0.push(status.clone());
        }
    }

    #[test]
    fn starts_connecting() {
        let ind = ConnectionIndicator::new();
        assert_eq!(ind.state(), ConnectionState::Connecting);
        assert!(!ind.view().stream_active);
    }

    #[test]
    fn open_error_open() {
        let mut ind = ConnectionIndicator::new();
        let mut d = Statuses::default();

        ind.on_open(&mut d);
        assert_eq!(ind.state(), ConnectionState::Ok);
        ind.on_error(&mut d);
        assert_eq!(ind.state(), ConnectionState::Error);
        ind.on_open(&mut d);
        assert_eq!(ind.state(), ConnectionState::Ok);

        let msgs: Vec<(&str, bool)> = d
            .0
            .iter()
            .map(|s| (s.message.as_str(), s.stream_active))
            .collect();
        assert_eq!(
            msgs,
            vec![(OK_MESSAGE, true), (ERROR_MESSAGE, false), (OK_MESSAGE, true)]
        );
    }

    #[test]
    fn error_before_open() {
        let mut ind = ConnectionIndicator::new();
        let mut d = Statuses::default();
        ind.on_error(&mut d);
        assert_eq!(ind.state(), ConnectionState::Error);
        assert_eq!(d.0.len(), 1);
    }
}
