//! Operator-facing status sink.
//!
//! The orchestrator reports through this trait only at phase boundaries and
//! on the final outcome, never mid-step. Build output itself goes straight to
//! the terminal from the child processes.

/// Terminal status surface. Implementations must never block the pipeline.
pub trait Feedback {
    fn info(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);
}

/// Plain console sink used by the CLI.
#[derive(Debug, Default)]
pub struct ConsoleFeedback;

impl Feedback for ConsoleFeedback {
    fn info(&self, message: &str) {
        println!("{message}");
    }

    fn warning(&self, message: &str) {
        eprintln!("[WARN] {message}");
    }

    fn error(&self, message: &str) {
        eprintln!("[ERROR] {message}");
    }
}

/// Collecting sink for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingFeedback {
    pub messages: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl Feedback for RecordingFeedback {
    fn info(&self, message: &str) {
        self.messages.lock().unwrap().push(format!("info: {message}"));
    }

    fn warning(&self, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push(format!("warning: {message}"));
    }

    fn error(&self, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push(format!("error: {message}"));
    }
}
