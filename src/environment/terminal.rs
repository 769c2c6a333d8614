//! Terminal environment backed by crossterm.

use std::cell::Cell;
use std::time::Duration;

use crossterm::event::{poll, read, Event};

use super::Environment;
use crate::error::Result;

/// The controlling terminal.
///
/// Content size is the character grid from `terminal::size()`; the outer
/// size is the grid reported alongside the pixel size by
/// `terminal::window_size()`, which some platforms fill more accurately.
/// When stdout is not a terminal both fail and the viewport reads as 0x0.
#[derive(Debug, Default)]
pub struct TerminalEnvironment {
    attached: Cell<bool>,
}

impl TerminalEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether resize events are currently being consumed.
    pub fn is_attached(&self) -> bool {
        self.attached.get()
    }
}

impl Environment for TerminalEnvironment {
    fn content_size(&self) -> Option<(u32, u32)> {
        crossterm::terminal::size()
            .ok()
            .map(|(cols, rows)| (cols as u32, rows as u32))
    }

    fn outer_size(&self) -> Option<(u32, u32)> {
        crossterm::terminal::window_size()
            .ok()
            .map(|size| (size.columns as u32, size.rows as u32))
    }

    fn attach(&self) {
        self.attached.set(true);
    }

    fn detach(&self) {
        self.attached.set(false);
    }

    fn wait_for_resize(&self, timeout: Duration) -> Result<bool> {
        if !self.attached.get() {
            if !timeout.is_zero() {
                std::thread::sleep(timeout);
            }
            return Ok(false);
        }

        if !poll(timeout)? {
            return Ok(false);
        }

        // Drain whatever is already queued so a drag collapses into one cycle
        let mut resized = false;
        loop {
            if let Event::Resize(_, _) = read()? {
                resized = true;
            }
            if !poll(Duration::ZERO)? {
                break;
            }
        }
        Ok(resized)
    }
}
