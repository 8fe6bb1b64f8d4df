//! Progress reporting utilities

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter for discovery and sweep loops
#[derive(Debug)]
pub struct ProgressReporter {
    pub discovery_pb: Option<ProgressBar>,
    pub items_pb: Option<ProgressBar>,
    show_progress: bool,
}

impl ProgressReporter {
    /// Reporter that draws spinners and bars on the terminal
    pub fn new() -> Self {
        Self {
            discovery_pb: None,
            items_pb: None,
            show_progress: true,
        }
    }

    /// Create minimal progress reporter (no progress bars)
    pub fn new_minimal() -> Self {
        Self {
            discovery_pb: None,
            items_pb: None,
            show_progress: false,
        }
    }

    /// Show a spinner while talking to the management services
    pub fn start_discovery(&mut self, message: &str) {
        if self.show_progress {
            self.discovery_pb = Some(create_spinner(message));
        }
    }

    pub fn finish_discovery(&mut self, message: &str) {
        if let Some(pb) = self.discovery_pb.take() {
            pb.finish_with_message(message.to_string());
        }
    }

    /// Start a bar over `total` VMs or volumes
    pub fn start_items(&mut self, total: u64, message: &str) {
        if self.show_progress {
            self.items_pb = Some(create_progress_bar(total, message));
        }
    }

    /// Advance one item, naming what is being worked on
    pub fn advance(&mut self, current: &str) {
        if let Some(pb) = &self.items_pb {
            pb.set_message(current.to_string());
            pb.inc(1);
        }
    }

    pub fn finish_items(&mut self, message: &str) {
        if let Some(pb) = self.items_pb.take() {
            pb.finish_with_message(message.to_string());
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(pb) = self.discovery_pb.take() {
            pb.finish_and_clear();
        }
        if let Some(pb) = self.items_pb.take() {
            pb.finish_and_clear();
        }
    }
}

/// Create a spinner progress bar
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.green} {msg}")
            .expect("Invalid progress template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Create a progress bar with known total
fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>4}/{len:4} {msg}")
            .expect("Invalid progress template")
            .progress_chars("#>-"),
    );
    pb.set_message(message.to_string());
    pb
}
