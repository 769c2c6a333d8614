//! Environment with no viewport at all.

use super::Environment;

/// Render-only context: every size source is missing, so readers report 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessEnvironment;

impl Environment for HeadlessEnvironment {
    fn content_size(&self) -> Option<(u32, u32)> {
        None
    }

    fn outer_size(&self) -> Option<(u32, u32)> {
        None
    }
}
