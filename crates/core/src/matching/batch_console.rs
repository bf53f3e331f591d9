use crate::matching::batch_logger::BatchLogger;

/// Append-only list of non-fatal per-image problems for one batch.
#[derive(Debug, Default)]
pub struct ErrorLog {
    messages: Vec<String>,
}

impl ErrorLog {
    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Take every recorded message, leaving the log empty.
    pub fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.messages)
    }
}

/// Print drained error messages as one report. Silent when empty.
pub fn report_errors(heading: &str, messages: &[String]) {
    if messages.is_empty() {
        return;
    }
    log::warn!("{heading}");
    for message in messages {
        log::warn!("\t{message}");
    }
}

/// Everything guarded by the batch's output lock: status output and the
/// error log. Result data never passes through here.
pub struct BatchConsole<'a> {
    logger: &'a mut dyn BatchLogger,
    errors: ErrorLog,
    completed: usize,
    total: usize,
}

impl<'a> BatchConsole<'a> {
    pub fn new(logger: &'a mut dyn BatchLogger, total: usize) -> Self {
        Self {
            logger,
            errors: ErrorLog::default(),
            completed: 0,
            total,
        }
    }

    /// Per-image status line, serialized with the other console output.
    pub fn status(&mut self, message: &str) {
        log::debug!("{message}");
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message);
    }

    /// Mark one image finished, successfully or not.
    pub fn image_done(&mut self, duration_ms: f64, faces: Option<usize>) {
        self.completed += 1;
        self.logger.timing("match", duration_ms);
        if let Some(faces) = faces {
            self.logger.metric("faces", faces as f64);
        }
        self.logger.progress(self.completed, self.total);
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn take_errors(&mut self) -> Vec<String> {
        self.errors.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::batch_logger::StdoutBatchLogger;

    #[test]
    fn test_error_log_drain_empties_log() {
        let mut log = ErrorLog::default();
        log.push("first");
        log.push(String::from("second"));

        assert_eq!(log.drain(), vec!["first", "second"]);
        assert!(log.drain().is_empty());
    }

    #[test]
    fn test_console_counts_completed_images() {
        let mut logger = StdoutBatchLogger::new(1);
        let mut console = BatchConsole::new(&mut logger, 2);

        console.image_done(10.0, Some(3));
        console.image_done(20.0, None);

        assert_eq!(console.completed(), 2);
        drop(console);
        assert_eq!(logger.timings_for("match").unwrap().len(), 2);
        assert_eq!(logger.metrics_for("faces").unwrap(), &[3.0]);
    }

    #[test]
    fn test_console_errors_taken_once() {
        let mut logger = StdoutBatchLogger::new(1);
        let mut console = BatchConsole::new(&mut logger, 1);
        console.record_error("no faces in y.jpg");

        assert_eq!(console.take_errors(), vec!["no faces in y.jpg"]);
        assert!(console.take_errors().is_empty());
    }

    #[test]
    fn test_report_errors_accepts_empty() {
        report_errors("heading", &[]);
    }
}
