use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::models::ProgressEvent;
use crate::ui::icons::{CHECK, CROSS, DISK, GLOBE};

/// Terminal rendering of one run's progress channel.
///
/// Starts as a spinner while the sitemap is fetched, turns into a bar once
/// the page count is known and finishes on the terminal event. Feed it every
/// event from the run's receiver via [`Self::handle`].
pub struct RunProgressUI {
    bar: ProgressBar,
    failures: usize,
}

impl RunProgressUI {
    pub fn new(sitemap_url: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(format!("{}Fetching {}", GLOBE, style(sitemap_url).cyan()));
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar, failures: 0 }
    }

    /// A UI that draws nothing, for `--json` output.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            failures: 0,
        }
    }

    pub fn handle(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { total, .. } => self.start_pages(*total as u64),
            ProgressEvent::Page {
                current, message, ..
            } => {
                if event.is_page_failure() {
                    self.failures += 1;
                    self.print_line(format!("  {}{}", CROSS, style(message).red()));
                }
                self.bar.set_position(*current as u64);
                self.bar.set_message(message.clone());
            }
            ProgressEvent::Completed { timestamp, .. } => {
                self.bar.finish_and_clear();
                self.print_line(format!(
                    "{}Run {} stored",
                    DISK,
                    style(timestamp).green().bold()
                ));
            }
            ProgressEvent::Failed { message, .. } => {
                self.bar.abandon_with_message(format!("{}{}", CROSS, style(message).red()));
            }
        }
    }

    /// Pages that came back as failures so far.
    pub fn failures(&self) -> usize {
        self.failures
    }

    fn start_pages(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓▒░"),
        );
        self.bar.set_prefix("Pages");
        self.bar.set_message("starting");
        self.print_line(format!("{}Auditing {} pages", CHECK, style(total).cyan()));
    }

    fn print_line(&self, msg: impl AsRef<str>) {
        if self.bar.is_hidden() {
            return;
        }
        self.bar.println(msg.as_ref());
    }
}
