//! The live SVG drawing surface as a `ScreenTransform`.
//!
//! The host attaches the element that holds the diagram content (the group
//! carrying the pan/zoom transform). Its screen CTM is read back on every
//! conversion, so a pan or zoom mid-gesture is picked up immediately.

use flowkit_core::ScreenTransform;
use kurbo::{Affine, Vec2};
use web_sys::SvgGraphicsElement;

#[derive(Debug, Default)]
pub struct SvgSurface {
    element: Option<SvgGraphicsElement>,
    /// Screen position of the logical origin when no CTM is available.
    fallback: Vec2,
}

impl SvgSurface {
    pub fn attach(&mut self, element: SvgGraphicsElement) {
        self.element = Some(element);
    }

    pub fn detach(&mut self) {
        self.element = None;
    }

    pub fn set_fallback_offset(&mut self, offset: Vec2) {
        self.fallback = offset;
    }
}

impl ScreenTransform for SvgSurface {
    fn screen_ctm(&self) -> Option<Affine> {
        let m = self.element.as_ref()?.get_screen_ctm()?;
        Some(Affine::new([
            f64::from(m.a()),
            f64::from(m.b()),
            f64::from(m.c()),
            f64::from(m.d()),
            f64::from(m.e()),
            f64::from(m.f()),
        ]))
    }

    fn fallback_offset(&self) -> Vec2 {
        self.fallback
    }
}
