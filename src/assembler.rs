//! Script assembly from `cmd` calls
//!
//! In normal mode the latest fragment replaces whatever was pending. In
//! splicing mode fragments accumulate in call order until the next
//! submission joins them with newlines.

/// Accumulates command fragments into one script body
#[derive(Debug, Default)]
pub struct CommandAssembler {
    splicing: bool,
    fragments: Vec<String>,
}

impl CommandAssembler {
    /// Create an empty assembler in normal mode
    #[must_use]
    pub const fn new() -> Self {
        Self {
            splicing: false,
            fragments: Vec::new(),
        }
    }

    /// Switch to splicing mode until the next [`take`](Self::take)
    ///
    /// A fragment already pending in normal mode becomes the first spliced line.
    pub fn enable_splicing(&mut self) {
        self.splicing = true;
    }

    /// Whether splicing mode is active
    #[must_use]
    pub const fn is_splicing(&self) -> bool {
        self.splicing
    }

    /// Add a fragment
    pub fn push(&mut self, text: impl Into<String>) {
        if !self.splicing {
            self.fragments.clear();
        }
        self.fragments.push(text.into());
    }

    /// Consume the pending script, resetting to normal mode
    ///
    /// Returns `None` when nothing is pending.
    pub fn take(&mut self) -> Option<String> {
        self.splicing = false;
        if self.fragments.is_empty() {
            return None;
        }
        let script = self.fragments.join("\n");
        self.fragments.clear();
        Some(script)
    }

    /// Drop any pending fragments and leave splicing mode
    pub fn clear(&mut self) {
        self.splicing = false;
        self.fragments.clear();
    }
}
