//! Sinks the pipeline renders into, and a console implementation of them.

use std::io::{self, Write};

use crate::types::{ScanResult, StatusView};

/// Display surfaces driven by the session: live result, history container
/// and connectivity status.
pub trait Display {
    /// Latest result only; each call replaces the previous one.
    fn show_current(&mut self, text: &str, count: usize);

    /// The history container changed. `markup` is the full container and
    /// `entries` the number of units in it.
    fn show_history(&mut self, markup: &str, entries: usize);

    fn show_status(&mut self, status: &StatusView);
}

/// Receives the formatted wall-clock time.
pub trait ClockSink {
    fn show_time(&mut self, text: &str);
}

/// On-page activity log used by the wake-lock keeper.
pub trait ActivityLog {
    fn append(&mut self, message: &str, is_error: bool);
}

/// Prints results as a table on stdout. History markup is not printed; only its size.
pub struct ConsoleDisplay<W: Write = io::Stdout> {
    out: W,
}

impl ConsoleDisplay<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsoleDisplay<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_devices(&mut self, text: &str, count: usize) -> io::Result<()> {
        let devices: ScanResult = serde_json::from_str(text).unwrap_or_default();
        let mut id_w = "device".len();
        let mut data_w = "data".len();
        let rows: Vec<(String, String)> = devices
            .iter()
            .map(|(id, v)| {
                let data = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (id.clone(), truncate(data, 60))
            })
            .collect();
        for (id, data) in &rows {
            id_w = id_w.max(id.len());
            data_w = data_w.max(data.chars().count());
        }

        writeln!(self.out, "\nDevices: {count}")?;
        writeln!(
            self.out,
            "{:<id_w$}  {:<data_w$}",
            "device",
            "data",
            id_w = id_w,
            data_w = data_w
        )?;
        writeln!(
            self.out,
            "{:-<id_w$}  {:-<data_w$}",
            "",
            "",
            id_w = id_w,
            data_w = data_w
        )?;
        for (id, data) in &rows {
            writeln!(
                self.out,
                "{:<id_w$}  {:<data_w$}",
                id,
                data,
                id_w = id_w,
                data_w = data_w
            )?;
        }
        self.out.flush()
    }
}

impl<W: Write> Display for ConsoleDisplay<W> {
    fn show_current(&mut self, text: &str, count: usize) {
        report(self.write_devices(text, count));
    }

    fn show_history(&mut self, _markup: &str, entries: usize) {
        report(writeln!(self.out, "History entries: {entries}"));
    }

    fn show_status(&mut self, status: &StatusView) {
        report(writeln!(
            self.out,
            "[{}] {}",
            status.state.as_str(),
            status.message
        ));
    }
}

impl<W: Write> ActivityLog for ConsoleDisplay<W> {
    fn append(&mut self, message: &str, is_error: bool) {
        let tag = if is_error { "warn" } else { "info" };
        report(writeln!(self.out, "[{tag}] {message}"));
    }
}

fn report(res: io::Result<()>) {
    if let Err(e) = res {
        tracing::warn!(error = %e, "console write failed");
    }
}

fn truncate(mut s: String, max_chars: usize) -> String {
    if let Some((idx, _)) = s.char_indices().nth(max_chars) {
        s.truncate(idx);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConnectionState;

    #[test]
    fn prints_device_table() {
        let mut d = ConsoleDisplay::new(Vec::new());
        d.show_current("{\n  \"aa:bb\": \"phone\",\n  \"cc:dd\": \"\"\n}", 2);
        let out = String::from_utf8(d.into_inner()).unwrap();
        assert!(out.contains("Devices: 2"));
        assert!(out.contains("aa:bb   phone"));
        assert!(out.lines().any(|l| l.starts_with("cc:dd")));
    }

    #[test]
    fn prints_status_line() {
        let mut d = ConsoleDisplay::new(Vec::new());
        d.show_status(&StatusView {
            state: ConnectionState::Ok,
            message: "Normal".into(),
            stream_active: true,
        });
        let out = String::from_utf8(d.into_inner()).unwrap();
        assert_eq!(out, "[ok] Normal\n");
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn write_failures_do_not_panic() {
        let mut d = ConsoleDisplay::new(Broken);
        d.show_current("{}", 0);
        d.show_history("", 0);
        d.show_status(&StatusView::default());
        d.append("Wake Lock is active", false);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("ああああ".into(), 2), "ああ");
        assert_eq!(truncate("ab".into(), 5), "ab");
    }
}
