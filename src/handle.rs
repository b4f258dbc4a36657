use std::fmt::{Debug, Display, Formatter};
use std::num::NonZeroU16;

/// Attribute handle ([Vol 3] Part F, Section 3.2.2).
#[derive(
    Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Handle(NonZeroU16);

impl Handle {
    /// First valid handle.
    pub const MIN: Self = Self(NonZeroU16::MIN);
    /// Last valid handle.
    pub const MAX: Self = Self(NonZeroU16::MAX);

    /// Wraps a raw handle. Returns `None` if the handle is invalid.
    #[inline]
    #[must_use]
    pub const fn new(h: u16) -> Option<Self> {
        match NonZeroU16::new(h) {
            Some(nz) => Some(Self(nz)),
            None => None,
        }
    }

    /// Returns the next handle or `None` if the maximum handle was reached.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        Self::new(self.0.get().wrapping_add(1))
    }
}

impl Debug for Handle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({:#06X})", self.0.get())
    }
}

impl Display for Handle {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

impl From<Handle> for u16 {
    #[inline]
    fn from(h: Handle) -> Self {
        h.0.get()
    }
}

impl From<Handle> for usize {
    #[inline]
    fn from(h: Handle) -> Self {
        Self::from(h.0.get())
    }
}

/// Inclusive range of attribute handles. This is a `Copy` version of
/// `RangeInclusive<Handle>`.
#[derive(
    Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize,
)]
#[must_use]
#[serde(try_from = "RawRange")]
pub struct HandleRange {
    start: Handle,
    end: Handle,
}

/// Wire form of [`HandleRange`] pending the `start <= end` check.
#[derive(serde::Deserialize)]
#[serde(rename = "HandleRange")]
struct RawRange {
    start: Handle,
    end: Handle,
}

impl TryFrom<RawRange> for HandleRange {
    type Error = String;

    fn try_from(r: RawRange) -> Result<Self, Self::Error> {
        if r.start <= r.end {
            Ok(Self {
                start: r.start,
                end: r.end,
            })
        } else {
            Err(format!(
                "inverted handle range: {:#06X} > {:#06X}",
                u16::from(r.start),
                u16::from(r.end)
            ))
        }
    }
}

impl HandleRange {
    /// Handle range that includes all possible handles.
    pub const ALL: Self = Self {
        start: Handle::MIN,
        end: Handle::MAX,
    };

    /// Creates a new handle range `start..=end`.
    ///
    /// # Panics
    ///
    /// Panics if `start > end`.
    #[inline]
    pub const fn new(start: Handle, end: Handle) -> Self {
        assert!(start.0.get() <= end.0.get());
        Self { start, end }
    }

    /// Returns the starting handle.
    #[inline(always)]
    #[must_use]
    pub const fn start(self) -> Handle {
        self.start
    }

    /// Returns the ending handle.
    #[inline(always)]
    #[must_use]
    pub const fn end(self) -> Handle {
        self.end
    }

    /// Returns the number of handles in the range (at least 1).
    #[inline]
    #[must_use]
    pub const fn len(self) -> u32 {
        self.end.0.get() as u32 - self.start.0.get() as u32 + 1
    }

    /// Returns whether `h` is within the range.
    #[inline]
    #[must_use]
    pub const fn contains(self, h: Handle) -> bool {
        self.start.0.get() <= h.0.get() && h.0.get() <= self.end.0.get()
    }

    /// Returns whether `self` and `other` share at least one handle.
    #[inline]
    #[must_use]
    pub(crate) const fn overlaps(self, other: Self) -> bool {
        self.start.0.get() <= other.end.0.get() && other.start.0.get() <= self.end.0.get()
    }
}

impl Display for HandleRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06X}..={:#06X}", self.start.0.get(), self.end.0.get())
    }
}
