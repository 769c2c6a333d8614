//! Core types for spark-viewport.
//!
//! The snapshot, filter and signature values that flow from the environment
//! through the dispatcher into each subscription.

use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::error::ViewportError;

// =============================================================================
// Viewport Snapshot
// =============================================================================

/// Width and height of the visible viewport, read together.
///
/// Never partially updated: a new snapshot replaces the old one as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// An empty viewport (what render-only contexts report).
    pub const ZERO: Self = Self { width: 0, height: 0 };

    /// Create a new viewport snapshot.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl From<(u32, u32)> for Viewport {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl From<(u16, u16)> for Viewport {
    fn from((width, height): (u16, u16)) -> Self {
        Self {
            width: width as u32,
            height: height as u32,
        }
    }
}

// =============================================================================
// Dimension Filter
// =============================================================================

/// Which part of the viewport a subscriber cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Dimension {
    #[cfg_attr(feature = "serde", serde(rename = "w"))]
    Width,
    #[cfg_attr(feature = "serde", serde(rename = "h"))]
    Height,
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "both"))]
    Both,
}

impl Dimension {
    /// The change flags this filter reacts to.
    pub const fn flags(self) -> Changed {
        match self {
            Dimension::Width => Changed::WIDTH,
            Dimension::Height => Changed::HEIGHT,
            Dimension::Both => Changed::BOTH,
        }
    }

    /// Short name as accepted by [`FromStr`].
    pub const fn as_str(self) -> &'static str {
        match self {
            Dimension::Width => "w",
            Dimension::Height => "h",
            Dimension::Both => "both",
        }
    }
}

impl FromStr for Dimension {
    type Err = ViewportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "w" | "width" => Ok(Dimension::Width),
            "h" | "height" => Ok(Dimension::Height),
            "both" | "" => Ok(Dimension::Both),
            other => Err(ViewportError::UnknownDimension(other.to_string())),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags::bitflags! {
    /// Axes that differ between two snapshots.
    ///
    /// `Dimension::Both` reacts to either bit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Changed: u8 {
        const NONE = 0;
        const WIDTH = 1 << 0;
        const HEIGHT = 1 << 1;
        const BOTH = Self::WIDTH.bits() | Self::HEIGHT.bits();
    }
}

impl Changed {
    /// Compare two snapshots axis by axis.
    pub fn between(previous: Viewport, next: Viewport) -> Self {
        let mut changed = Changed::NONE;
        if previous.width != next.width {
            changed |= Changed::WIDTH;
        }
        if previous.height != next.height {
            changed |= Changed::HEIGHT;
        }
        changed
    }

    /// Whether a subscriber filtering on `dimension` should see this change.
    #[inline]
    pub fn affects(self, dimension: Dimension) -> bool {
        self.intersects(dimension.flags())
    }
}

// =============================================================================
// Signature
// =============================================================================

/// Value used to decide whether a subscriber needs a new delivery.
///
/// Only ever compared for equality between dispatch cycles.
#[derive(Debug, Clone, PartialEq)]
pub enum Signature {
    /// Raw width (`Dimension::Width` without a hasher).
    Width(u32),
    /// Raw height (`Dimension::Height` without a hasher).
    Height(u32),
    /// Width and height packed as `width << 32 | height`.
    Both(u64),
    /// Value returned by a caller-supplied hasher.
    Custom(CustomSignature),
}

impl Signature {
    /// Derive the default signature for a filter.
    pub fn derive(viewport: Viewport, dimension: Dimension) -> Self {
        match dimension {
            Dimension::Width => Signature::Width(viewport.width),
            Dimension::Height => Signature::Height(viewport.height),
            Dimension::Both => Signature::Both(pack(viewport)),
        }
    }

    /// Wrap any comparable value as a custom signature.
    pub fn custom<T: SignatureValue>(value: T) -> Self {
        Signature::Custom(CustomSignature::new(value))
    }

    /// Borrow a custom signature as `T`, if that is what it holds.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            Signature::Custom(custom) => custom.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Whether this signature came from a hasher.
    pub fn is_custom(&self) -> bool {
        matches!(self, Signature::Custom(_))
    }
}

#[inline]
fn pack(viewport: Viewport) -> u64 {
    ((viewport.width as u64) << 32) | viewport.height as u64
}

/// Object-safe equality for hasher output.
///
/// Implemented for every `'static` type that is `PartialEq + Debug`.
pub trait SignatureValue: Any + fmt::Debug {
    fn eq_dyn(&self, other: &dyn SignatureValue) -> bool;
    fn as_any(&self) -> &dyn Any;
}

impl<T> SignatureValue for T
where
    T: Any + PartialEq + fmt::Debug,
{
    fn eq_dyn(&self, other: &dyn SignatureValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Shared, type-erased hasher output.
#[derive(Clone)]
pub struct CustomSignature(Rc<dyn SignatureValue>);

impl CustomSignature {
    pub fn new<T: SignatureValue>(value: T) -> Self {
        Self(Rc::new(value))
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }
}

impl PartialEq for CustomSignature {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_dyn(other.0.as_ref())
    }
}

impl fmt::Debug for CustomSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_signature_is_order_sensitive() {
        let a = Signature::derive(Viewport::new(640, 480), Dimension::Both);
        let b = Signature::derive(Viewport::new(480, 640), Dimension::Both);
        assert_ne!(a, b);
        assert_eq!(a, Signature::derive(Viewport::new(640, 480), Dimension::Both));
    }

    #[test]
    fn test_packed_signature_large_values() {
        // Would collide with a 16-bit shift
        let a = Signature::derive(Viewport::new(1, 0), Dimension::Both);
        let b = Signature::derive(Viewport::new(0, 65536), Dimension::Both);
        assert_ne!(a, b);
    }

    #[test]
    fn test_single_axis_signature() {
        let vp = Viewport::new(44, 80);
        assert_eq!(Signature::derive(vp, Dimension::Width), Signature::Width(44));
        assert_eq!(Signature::derive(vp, Dimension::Height), Signature::Height(80));
    }

    #[test]
    fn test_custom_signature_equality() {
        assert_eq!(Signature::custom("md"), Signature::custom("md"));
        assert_ne!(Signature::custom("md"), Signature::custom("lg"));
        // Different types never compare equal
        assert_ne!(Signature::custom(1u32), Signature::custom(1i64));
        assert_ne!(Signature::custom(640u32), Signature::Width(640));
    }

    #[test]
    fn test_custom_signature_downcast() {
        let sig = Signature::custom(String::from("sm"));
        assert_eq!(sig.downcast_ref::<String>().map(String::as_str), Some("sm"));
        assert!(sig.downcast_ref::<u32>().is_none());
        assert!(sig.is_custom());
    }

    #[test]
    fn test_changed_between() {
        let a = Viewport::new(10, 10);
        assert_eq!(Changed::between(a, a), Changed::NONE);
        assert_eq!(Changed::between(a, Viewport::new(11, 10)), Changed::WIDTH);
        assert_eq!(Changed::between(a, Viewport::new(11, 12)), Changed::BOTH);

        let height_only = Changed::between(a, Viewport::new(10, 12));
        assert!(height_only.affects(Dimension::Height));
        assert!(height_only.affects(Dimension::Both));
        assert!(!height_only.affects(Dimension::Width));
        assert!(!Changed::NONE.affects(Dimension::Both));
    }

    #[test]
    fn test_dimension_parse() {
        assert_eq!("w".parse::<Dimension>().ok(), Some(Dimension::Width));
        assert_eq!("h".parse::<Dimension>().ok(), Some(Dimension::Height));
        assert_eq!("both".parse::<Dimension>().ok(), Some(Dimension::Both));
        assert!("diagonal".parse::<Dimension>().is_err());
        assert_eq!(Dimension::default(), Dimension::Both);
    }
}
