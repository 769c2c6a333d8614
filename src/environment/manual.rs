//! Host-driven environment.
//!
//! For hosts that learn about size changes through their own channels (a GUI
//! toolkit, a web bridge, a test) and push them in.

use std::cell::Cell;

use super::Environment;
use crate::dispatcher;

/// Environment whose sizes are set by the host.
///
/// Holds a content size and an outer size like a browser's document and
/// window. [`resize`](Self::resize) sets both; [`set_sizes`](Self::set_sizes)
/// sets them independently.
#[derive(Debug)]
pub struct ManualEnvironment {
    content: Cell<Option<(u32, u32)>>,
    outer: Cell<Option<(u32, u32)>>,
    attached: Cell<bool>,
    attach_count: Cell<usize>,
}

impl ManualEnvironment {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            content: Cell::new(Some((width, height))),
            outer: Cell::new(Some((width, height))),
            attached: Cell::new(false),
            attach_count: Cell::new(0),
        }
    }

    /// Set both sources and notify subscribers if attached.
    pub fn resize(&self, width: u32, height: u32) {
        self.set_sizes(Some((width, height)), Some((width, height)));
    }

    /// Set content and outer sizes separately and notify if attached.
    pub fn set_sizes(&self, content: Option<(u32, u32)>, outer: Option<(u32, u32)>) {
        self.content.set(content);
        self.outer.set(outer);
        if self.attached.get() {
            dispatcher::on_resize();
        }
    }

    /// Change the sizes without a resize notification.
    ///
    /// Models platforms that change the viewport without reporting it (an
    /// orientation change, for instance); subscribers only see it after a
    /// manual refresh.
    pub fn set_silently(&self, width: u32, height: u32) {
        self.content.set(Some((width, height)));
        self.outer.set(Some((width, height)));
    }

    pub fn is_attached(&self) -> bool {
        self.attached.get()
    }

    /// How many times monitoring was started.
    pub fn attach_count(&self) -> usize {
        self.attach_count.get()
    }
}

impl Environment for ManualEnvironment {
    fn content_size(&self) -> Option<(u32, u32)> {
        self.content.get()
    }

    fn outer_size(&self) -> Option<(u32, u32)> {
        self.outer.get()
    }

    fn attach(&self) {
        self.attached.set(true);
        self.attach_count.set(self.attach_count.get() + 1);
    }

    fn detach(&self) {
        self.attached.set(false);
    }
}
