use std::collections::HashMap;
use std::sync::Mutex;

use colored::*;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use sublicheck_core::{LogLevel, RootDomain, ScanEventSink};

/// One progress bar per root domain; log, result and status lines are
/// printed above the bars.
pub struct ProgressSink {
    multi: MultiProgress,
    bars: Mutex<HashMap<RootDomain, ProgressBar>>,
    style: ProgressStyle,
}

impl ProgressSink {
    pub fn new() -> Self {
        let style = ProgressStyle::default_bar()
            .template("{prefix:>24.cyan.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
            style,
        }
    }

    fn println(&self, line: String) {
        // println on a hidden target is a no-op
        if self.multi.is_hidden() || self.multi.println(&line).is_err() {
            println!("{}", line);
        }
    }

    fn bar(&self, domain: &RootDomain) -> ProgressBar {
        let mut bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        bars.entry(domain.clone())
            .or_insert_with(|| {
                let bar = self.multi.add(ProgressBar::new(0));
                bar.set_style(self.style.clone());
                bar.set_prefix(domain.to_string());
                bar.set_message("enumerating...");
                bar
            })
            .clone()
    }
}

impl ScanEventSink for ProgressSink {
    fn on_log(&self, level: LogLevel, message: &str) {
        let line = match level {
            LogLevel::Success => message.green().to_string(),
            LogLevel::Error => message.red().to_string(),
            LogLevel::Warn => message.yellow().to_string(),
            LogLevel::Info => message.to_string(),
        };
        self.println(line);
    }

    fn on_domain_initialized(&self, domain: &RootDomain, total: usize) {
        let bar = self.bar(domain);
        bar.set_length(total as u64);
        bar.set_message("200 OK: 0");
        if total == 0 {
            bar.finish_with_message("no subdomains");
        }
        self.println(format!("[{}] Subdomains found: {}", domain, total).bright_cyan().to_string());
    }

    fn on_progress(&self, domain: &RootDomain, checked: usize, found: usize) {
        let bar = self.bar(domain);
        bar.set_position(checked as u64);
        bar.set_message(format!("200 OK: {}", found));
        if bar.length() == Some(checked as u64) {
            bar.finish();
        }
    }

    fn on_result(&self, domain: &RootDomain, message: &str) {
        self.println(format!("[{}] {} {}", domain, "✔".green().bold(), message.green()));
    }

    fn on_status(&self, domain: &RootDomain, code: u16, url: &str, size: u64) {
        self.println(format!(
            "[{}] {} {} | {} Bytes",
            domain,
            format!("[{}]", code).yellow(),
            url,
            size
        ));
    }
}
