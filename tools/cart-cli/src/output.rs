//! Output formatting for the CLI.

use cart_core::CartSnapshot;
use cart_sync::{DrawerDocument, Notice, NoticeLevel};
use chrono::{DateTime, Utc};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
    Html,
}

/// JSON envelope for one command.
#[derive(Debug, Serialize)]
pub struct Report<'a, T: Serialize> {
    pub command: &'a str,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub body: T,
}

/// Output handler for CLI messages.
#[derive(Clone)]
pub struct Output {
    verbose: bool,
    format: Format,
}

impl Output {
    /// Create a new output handler.
    pub fn new(verbose: bool, format: Format) -> Self {
        Self { verbose, format }
    }

    fn quiet(&self) -> bool {
        self.format == Format::Json
    }

    /// Print an info message.
    pub fn info(&self, msg: &str) {
        if self.quiet() {
            return;
        }
        println!("{} {}", style("ℹ").blue(), msg);
    }

    /// Print a success message.
    pub fn success(&self, msg: &str) {
        if self.quiet() {
            return;
        }
        println!("{} {}", style("✓").green(), msg);
    }

    /// Print a warning message.
    pub fn warn(&self, msg: &str) {
        if self.quiet() {
            return;
        }
        eprintln!("{} {}", style("⚠").yellow(), msg);
    }

    /// Print an error message.
    pub fn error(&self, msg: &str) {
        if self.quiet() {
            let body = serde_json::json!({ "error": msg, "at": Utc::now() });
            eprintln!("{}", body);
            return;
        }
        eprintln!("{} {}", style("✗").red(), style(msg).red());
    }

    /// Print a debug message (only in verbose mode).
    pub fn debug(&self, msg: &str) {
        if !self.verbose || self.quiet() {
            return;
        }
        eprintln!("{} {}", style("→").dim(), style(msg).dim());
    }

    /// Print a header/title.
    pub fn header(&self, msg: &str) {
        if self.quiet() {
            return;
        }
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a step in a process.
    pub fn step(&self, num: usize, total: usize, msg: &str) {
        if self.quiet() {
            return;
        }
        println!("{} {}", style(format!("[{}/{}]", num, total)).dim(), msg);
    }

    /// Print a key-value pair.
    pub fn kv(&self, key: &str, value: &str) {
        if self.quiet() {
            return;
        }
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(&self, item: &str) {
        if self.quiet() {
            return;
        }
        println!("  {} {}", style("•").dim(), item);
    }

    /// Print JSON output.
    pub fn json<T: Serialize>(&self, value: &T) {
        if let Ok(json) = serde_json::to_string_pretty(value) {
            println!("{}", json);
        }
    }

    /// Print a timestamped JSON report for `command`.
    pub fn report<T: Serialize>(&self, command: &str, body: T) {
        self.json(&Report {
            command,
            at: Utc::now(),
            body,
        });
    }

    /// Print the drawer in the selected format.
    pub fn drawer(&self, command: &str, doc: &DrawerDocument, snapshot: Option<&CartSnapshot>) {
        match self.format {
            Format::Json => self.report(command, serde_json::json!({ "cart": snapshot })),
            Format::Html => println!("{}", doc.to_html()),
            Format::Text => {
                println!();
                print!("{}", doc.to_text());
                if let Some(snapshot) = snapshot {
                    if let Some(token) = &snapshot.token {
                        self.debug(&format!("cart token {}", token));
                    }
                }
            }
        }
    }

    /// Echo one notice the controller raised.
    pub fn notice(&self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Success => self.success(&notice.message),
            NoticeLevel::Error => self.warn(&notice.message),
        }
    }

    /// Echo the notices still up in the drawer, newest last.
    pub fn notices(&self, doc: &DrawerDocument) {
        for notice in doc.notices() {
            self.notice(notice);
        }
    }

    /// Create a spinner for indeterminate progress.
    pub fn spinner(&self, msg: &str) -> ProgressBar {
        if self.format != Format::Text {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new_spinner();
        if let Ok(spinner) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }

    /// Check if JSON mode is enabled.
    pub fn is_json(&self) -> bool {
        self.format == Format::Json
    }

    /// Whether prompts may be shown.
    pub fn is_interactive(&self) -> bool {
        self.format == Format::Text && console::Term::stdout().is_term()
    }
}
