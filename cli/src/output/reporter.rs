//! Job progress on the terminal.

use crate::application::ports::ProgressReporter;
use crate::output::{Mark, OutputContext};

/// [`ProgressReporter`] printing `→`, `✓` and `!` lines through an
/// [`OutputContext`]. Silent when the context is quiet, which `--json` implies.
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
}

impl<'a> TerminalReporter<'a> {
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        self.ctx.mark(Mark::Progress, message);
    }

    fn success(&self, message: &str) {
        self.ctx.mark(Mark::Done, message);
    }

    // A failed step is reported, not raised: the job record carries the error.
    fn warn(&self, message: &str) {
        self.ctx.mark(Mark::Attention, message);
    }
}
