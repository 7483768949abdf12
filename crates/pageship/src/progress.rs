use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner shown while a slow engine step runs
pub struct StepProgress {
    progress_bar: ProgressBar,
}

impl StepProgress {
    pub fn new(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("  {spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));

        Self { progress_bar: pb }
    }

    pub fn finish_success(&self, message: &str) {
        self.progress_bar
            .finish_with_message(format!("{} {}", "✓".green(), message));
    }

    pub fn finish_error(&self, message: &str) {
        self.progress_bar
            .finish_with_message(format!("{} {}", "✗".red().bold(), message));
    }
}
