//! Terminal and JSON rendering for mc-admin.

pub mod human;
pub mod json;
pub mod reporter;
pub mod styles;

use console::Term;
use owo_colors::{OwoColorize as _, Style};

pub use human::HumanRenderer;
pub use json::JsonRenderer;
pub use reporter::TerminalReporter;
pub use styles::Styles;

/// Leading symbol of a one-line status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Done,
    Progress,
    Attention,
    Failure,
    Hint,
}

impl Mark {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Done => "✓",
            Self::Progress => "→",
            Self::Attention => "!",
            Self::Failure => "✗",
            Self::Hint => "ℹ",
        }
    }

    fn style(self, styles: &Styles) -> Style {
        match self {
            Self::Done => styles.done,
            Self::Progress | Self::Hint => styles.in_flight,
            Self::Attention => styles.attention,
            Self::Failure => styles.failure,
        }
    }
}

/// Styling plus the quiet switch shared by every renderer.
pub struct OutputContext {
    pub styles: Styles,
    /// Suppresses everything on stdout except requested documents.
    pub quiet: bool,
}

impl OutputContext {
    /// Colours are used only when stdout is a terminal and neither
    /// `--no-color` nor `NO_COLOR` is set.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let use_colors =
            !no_color && Term::stdout().is_term() && std::env::var_os("NO_COLOR").is_none();
        let styles = if use_colors {
            Styles::colored()
        } else {
            Styles::default()
        };
        Self { styles, quiet }
    }

    /// Print `  <mark> message`. Failures go to stderr and ignore `quiet`.
    pub fn mark(&self, mark: Mark, message: &str) {
        let symbol = mark.symbol();
        let symbol = symbol.style(mark.style(&self.styles));
        if mark == Mark::Failure {
            eprintln!("  {symbol} {message}");
        } else if !self.quiet {
            println!("  {symbol} {message}");
        }
    }

    pub fn success(&self, message: &str) {
        self.mark(Mark::Done, message);
    }

    pub fn info(&self, message: &str) {
        self.mark(Mark::Hint, message);
    }

    pub fn header(&self, title: &str) {
        if !self.quiet {
            println!("  {}", title.style(self.styles.title));
        }
    }

    /// Detail-view field; `key` carries its own padding.
    pub fn kv(&self, key: &str, value: &str) {
        if !self.quiet {
            println!("  {}  {value}", key.style(self.styles.muted));
        }
    }
}
