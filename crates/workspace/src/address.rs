//! Mobile/desktop address selection
//!
//! The address for a frame is chosen once, when the frame is created, and
//! stays frozen for the rest of the session. Resizing the viewport later does
//! not re-point existing frames.

use framedeck_common::Url;
use std::sync::atomic::{AtomicU32, Ordering};

/// Pick the address a frame for `url` should load
pub fn choose_address(url: &Url, is_mobile_viewport: bool) -> &str {
    match (&url.url_mobile, is_mobile_viewport) {
        (Some(mobile), true) => mobile,
        _ => &url.url,
    }
}

/// Whether a viewport of `width_px` counts as mobile
pub fn is_mobile_viewport(width_px: u32, breakpoint_px: u32) -> bool {
    width_px < breakpoint_px
}

/// Source of the current viewport width
pub trait ViewportProbe: Send + Sync {
    fn width(&self) -> u32;
}

/// Viewport whose width can be changed at runtime
#[derive(Debug)]
pub struct SharedViewport {
    width: AtomicU32,
}

impl SharedViewport {
    pub fn new(width: u32) -> Self {
        Self {
            width: AtomicU32::new(width),
        }
    }

    pub fn set_width(&self, width: u32) {
        self.width.store(width, Ordering::Relaxed);
    }
}

impl Default for SharedViewport {
    fn default() -> Self {
        Self::new(1280)
    }
}

impl ViewportProbe for SharedViewport {
    fn width(&self) -> u32 {
        self.width.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(true, true, "https://m.a.test" ; "mobile with mobile address")]
    #[test_case(true, false, "https://a.test" ; "desktop with mobile address")]
    #[test_case(false, true, "https://a.test" ; "mobile without mobile address")]
    #[test_case(false, false, "https://a.test" ; "desktop without mobile address")]
    fn test_choose_address(has_mobile: bool, mobile: bool, expected: &str) {
        let mut url = Url::new("u1", "https://a.test");
        if has_mobile {
            url = url.with_mobile("https://m.a.test");
        }
        assert_eq!(choose_address(&url, mobile), expected);
    }

    #[test]
    fn test_breakpoint_is_exclusive() {
        assert!(is_mobile_viewport(767, 768));
        assert!(!is_mobile_viewport(768, 768));
    }

    #[test]
    fn test_shared_viewport() {
        let viewport = SharedViewport::new(1024);
        viewport.set_width(375);
        assert_eq!(viewport.width(), 375);
    }
}
