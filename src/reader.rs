//! Dimension Reader - live viewport size from the active environment.
//!
//! Each axis is the larger of the content size and the outer size, so a
//! source that under-reports (scrollbars, status lines) never shrinks the
//! result. Missing sources count as 0. Nothing here is cached.

use crate::environment;
use crate::types::Viewport;

/// Current viewport width.
pub fn current_width() -> u32 {
    current_viewport().width
}

/// Current viewport height.
pub fn current_height() -> u32 {
    current_viewport().height
}

/// Current viewport, both axes read together.
pub fn current_viewport() -> Viewport {
    let env = environment::current();
    let (content_w, content_h) = env.content_size().unwrap_or((0, 0));
    let (outer_w, outer_h) = env.outer_size().unwrap_or((0, 0));
    Viewport::new(content_w.max(outer_w), content_h.max(outer_h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{install, HeadlessEnvironment, ManualEnvironment};
    use std::rc::Rc;

    #[test]
    fn test_headless_reads_zero() {
        install(Rc::new(HeadlessEnvironment));
        assert_eq!(current_width(), 0);
        assert_eq!(current_height(), 0);
    }

    #[test]
    fn test_takes_larger_source_per_axis() {
        let env = Rc::new(ManualEnvironment::new(0, 0));
        install(env.clone());

        env.set_sizes(Some((624, 480)), Some((640, 470)));
        assert_eq!(current_viewport(), Viewport::new(640, 480));

        env.set_sizes(None, Some((320, 200)));
        assert_eq!(current_viewport(), Viewport::new(320, 200));
    }

    #[test]
    fn test_not_memoized() {
        let env = Rc::new(ManualEnvironment::new(10, 20));
        install(env.clone());
        assert_eq!(current_width(), 10);

        env.set_silently(30, 40);
        assert_eq!(current_width(), 30);
        assert_eq!(current_height(), 40);
    }
}
