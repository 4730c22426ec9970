//! Warning-message sink threaded through the solver context, keeping the
//! sink mockable for tests instead of writing to a process-wide channel.

/// A single warning/info line written to the warning channel (by default,
/// standard output).
pub trait Logger {
    fn warn(&mut self, message: &str);
    fn info(&mut self, message: &str);
}

/// Default sink: stderr for warnings, stdout for informational progress
/// lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrLogger;

impl Logger for StderrLogger {
    fn warn(&mut self, message: &str) {
        eprintln!("warning: {message}");
    }

    fn info(&mut self, message: &str) {
        println!("{message}");
    }
}

/// Mockable sink for tests: every line recorded, warnings and info
/// interleaved in call order with a tag so tests can assert on either
/// stream alone.
#[derive(Debug, Default, Clone)]
pub struct RecordingLogger {
    pub lines: Vec<(bool, String)>,
}

impl RecordingLogger {
    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .filter(|(is_warn, _)| *is_warn)
            .map(|(_, s)| s.as_str())
    }
}

impl Logger for RecordingLogger {
    fn warn(&mut self, message: &str) {
        self.lines.push((true, message.to_string()));
    }

    fn info(&mut self, message: &str) {
        self.lines.push((false, message.to_string()));
    }
}
