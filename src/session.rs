//! The stream session: one context object that owns the history renderer, the
//! connectivity indicator and the display, and reacts to stream signals one at a time.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::decoder::{self, DecodedEvent};
use crate::display::Display;
use crate::error::DecodeError;
use crate::history::HistoryLog;
use crate::indicator::ConnectionIndicator;
use crate::render::HistoryRenderer;
use crate::sse::{SseEvent, MESSAGE_EVENT};
use crate::store::HistoryStore;
use crate::transport::{EventStream, StreamSignal};
use crate::types::{ConnectionState, SequenceId};

/// Buffered signals between the stream task and the session loop.
const SIGNAL_BUFFER: usize = 64;

pub struct Session<S, D> {
    renderer: HistoryRenderer<S>,
    indicator: ConnectionIndicator,
    display: D,
}

impl<S: HistoryStore, D: Display> Session<S, D> {
    pub fn new(store: S, display: D, history_limit: Option<usize>) -> Self {
        Self {
            renderer: HistoryRenderer::new(store, history_limit),
            indicator: ConnectionIndicator::new(),
            display,
        }
    }

    pub fn log(&self) -> &HistoryLog {
        self.renderer.log()
    }

    pub fn store(&self) -> &S {
        self.renderer.store()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.indicator.state()
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn into_parts(self) -> (S, D) {
        (self.renderer.into_store(), self.display)
    }

    /// Show the stored history and initial status. Call before the first signal.
    pub fn restore(&mut self) -> usize {
        self.display.show_status(&self.indicator.view());
        let restored = self.renderer.restore(&mut self.display);
        if restored > 0 {
            info!(entries = restored, "restored history from previous run");
        }
        restored
    }

    pub fn on_open(&mut self) {
        self.indicator.on_open(&mut self.display);
    }

    pub fn on_error(&mut self) {
        self.indicator.on_error(&mut self.display);
    }

    /// Decode and render one message. A payload that fails to decode changes nothing.
    pub fn on_message(&mut self, id: SequenceId, payload: &str) -> Result<(), DecodeError> {
        let event: DecodedEvent = decoder::decode(payload)?;
        debug!(id = %id, devices = event.device_count, "scan result");
        self.renderer.render(&mut self.display, id, event);
        Ok(())
    }

    pub fn handle(&mut self, signal: StreamSignal) {
        match signal {
            StreamSignal::Open => self.on_open(),
            StreamSignal::Error(_) => self.on_error(),
            StreamSignal::Message(ev) => self.dispatch_message(ev),
        }
    }

    fn dispatch_message(&mut self, ev: SseEvent) {
        if ev.event != MESSAGE_EVENT {
            debug!(event = %ev.event, "ignoring named event");
            return;
        }
        let id = SequenceId::new(ev.last_event_id);
        if let Err(e) = self.on_message(id.clone(), &ev.data) {
            warn!(id = %id, error = %e, "dropping malformed event");
        }
    }

    /// Handle signals until the sender goes away or `cancel` fires.
    pub async fn run(&mut self, mut rx: mpsc::Receiver<StreamSignal>, cancel: &CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                signal = rx.recv() => match signal {
                    Some(signal) => self.handle(signal),
                    None => break,
                },
            }
        }
    }

    /// Restore history, open the one stream connection and process it until
    /// `cancel` fires or the stream gives up for good. The stream is consumed,
    /// so a session never holds two.
    pub async fn start(&mut self, stream: EventStream, cancel: CancellationToken) {
        self.restore();
        let (tx, rx) = mpsc::channel(SIGNAL_BUFFER);
        let stream_cancel = cancel.child_token();
        info!(url = %stream.url(), "opening event stream");
        let handle = stream.spawn(tx, stream_cancel.clone());
        self.run(rx, &cancel).await;
        stream_cancel.cancel();
        if let Err(e) = handle.await {
            warn!(error = %e, "event stream task ended abnormally");
        }
    }
}
