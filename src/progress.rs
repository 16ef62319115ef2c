//! Progress reporting utilities

use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

/// Spinner per pipeline step
#[derive(Debug)]
pub struct ProgressReporter {
    pub step_pb: Option<ProgressBar>,
    steps_finished: usize,
    show_progress: bool,
    start_time: Instant,
}

impl ProgressReporter {
    /// Create progress reporter for a diff run
    pub fn new_for_diff() -> Self {
        Self {
            step_pb: None,
            steps_finished: 0,
            show_progress: true,
            start_time: Instant::now(),
        }
    }

    /// Create minimal progress reporter (no progress bars)
    pub fn new_minimal() -> Self {
        Self {
            step_pb: None,
            steps_finished: 0,
            show_progress: false,
            start_time: Instant::now(),
        }
    }

    /// Start a spinner for the next step, finishing any running one silently
    pub fn start_step(&mut self, message: &str) {
        if let Some(pb) = self.step_pb.take() {
            pb.finish_and_clear();
        }
        if self.show_progress {
            self.step_pb = Some(create_spinner(message));
        }
    }

    /// Update the running step's message without finishing it
    pub fn update_step(&mut self, message: &str) {
        if let Some(pb) = &self.step_pb {
            pb.set_message(message.to_string());
        }
    }

    pub fn finish_step(&mut self, message: &str) {
        if let Some(pb) = self.step_pb.take() {
            pb.finish_with_message(message.to_string());
        }
        self.steps_finished += 1;
    }

    pub fn steps_finished(&self) -> usize {
        self.steps_finished
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Finish the running step, if any
    pub fn finish_all(&mut self, message: &str) {
        if self.step_pb.is_some() {
            self.finish_step(message);
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(pb) = self.step_pb.take() {
            pb.finish_and_clear();
        }
    }
}

/// Create a spinner progress bar
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} [{elapsed}] {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
