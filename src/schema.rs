//! Service shape description and sequential handle assignment.
//!
//! The allocator does not need to know anything about a service other than
//! how many attributes it occupies: one service declaration, one attribute
//! per included service, two per characteristic (declaration plus value),
//! and one per descriptor ([Vol 3] Part G, Section 3). [`ServiceShape`]
//! captures those counts, and [`ServiceHandles`] is the resulting handle
//! assignment for one allocated block.

use smallvec::SmallVec;

use crate::{Handle, HandleRange};

/// Attribute counts for one GATT service definition.
///
/// The order in which characteristics are added is the order in which they
/// receive handles.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[must_use]
pub struct ServiceShape {
    includes: u16,
    /// Descriptor count for each characteristic, in declaration order.
    chars: SmallVec<[u16; 4]>,
}

impl ServiceShape {
    /// Creates the shape of an empty service (one declaration attribute).
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `n` included services.
    #[inline]
    pub fn includes(mut self, n: u16) -> Self {
        self.includes = self.includes.saturating_add(n);
        self
    }

    /// Adds one characteristic with `descriptors` descriptors.
    #[inline]
    pub fn characteristic(mut self, descriptors: u16) -> Self {
        self.chars.push(descriptors);
        self
    }

    /// Returns the total number of attributes the service occupies:
    /// `1 + includes + 2 * characteristics + descriptors`.
    #[must_use]
    pub fn attr_count(&self) -> u32 {
        let descs = (self.chars.iter()).fold(0, |n, &d| n + u32::from(d));
        1 + u32::from(self.includes) + 2 * self.chars.len() as u32 + descs
    }
}

/// Handle assignment for one allocated service block.
///
/// All handles are strictly increasing and fall within
/// `handle()..=end_handle()`. The assignment is fixed for as long as the
/// service stays registered; sub-elements are never renumbered.
#[derive(Clone, Debug, Eq, PartialEq)]
#[must_use]
pub struct ServiceHandles {
    handle: Handle,
    end_handle: Handle,
    includes: SmallVec<[Handle; 2]>,
    chars: SmallVec<[CharacteristicHandles; 4]>,
}

/// Handle assignment for one characteristic within a service block.
#[derive(Clone, Debug, Eq, PartialEq)]
#[must_use]
pub struct CharacteristicHandles {
    handle: Handle,
    value_handle: Handle,
    end_handle: Handle,
    descriptors: SmallVec<[Handle; 2]>,
}

impl ServiceHandles {
    /// Assigns sequential handles from `block` to the elements of `shape`.
    /// The block must be exactly `shape.attr_count()` handles long.
    pub(crate) fn assign(block: HandleRange, shape: &ServiceShape) -> Self {
        debug_assert_eq!(block.len(), shape.attr_count());
        let mut cur = block.start();
        let mut take = || {
            cur = cur.next().unwrap_or(Handle::MAX);
            cur
        };
        let includes = (0..shape.includes).map(|_| take()).collect();
        let chars = (shape.chars.iter())
            .map(|&nd| {
                let handle = take();
                let value_handle = take();
                let descriptors: SmallVec<_> = (0..nd).map(|_| take()).collect();
                CharacteristicHandles {
                    handle,
                    value_handle,
                    end_handle: descriptors.last().copied().unwrap_or(value_handle),
                    descriptors,
                }
            })
            .collect();
        Self {
            handle: block.start(),
            end_handle: block.end(),
            includes,
            chars,
        }
    }

    /// Returns the service declaration handle.
    #[inline(always)]
    #[must_use]
    pub const fn handle(&self) -> Handle {
        self.handle
    }

    /// Returns the last handle of the service block.
    #[inline(always)]
    #[must_use]
    pub const fn end_handle(&self) -> Handle {
        self.end_handle
    }

    /// Returns the allocated block `handle()..=end_handle()`, which is the
    /// range to pass back to [`HandleAllocator::release`].
    ///
    /// [`HandleAllocator::release`]: crate::HandleAllocator::release
    #[inline]
    pub const fn range(&self) -> HandleRange {
        HandleRange::new(self.handle, self.end_handle)
    }

    /// Returns the include declaration handles, in definition order.
    #[inline(always)]
    #[must_use]
    pub fn includes(&self) -> &[Handle] {
        &self.includes
    }

    /// Returns the characteristic assignments, in definition order.
    #[inline(always)]
    #[must_use]
    pub fn characteristics(&self) -> &[CharacteristicHandles] {
        &self.chars
    }
}

impl CharacteristicHandles {
    /// Returns the characteristic declaration handle.
    #[inline(always)]
    #[must_use]
    pub const fn handle(&self) -> Handle {
        self.handle
    }

    /// Returns the characteristic value handle.
    #[inline(always)]
    #[must_use]
    pub const fn value_handle(&self) -> Handle {
        self.value_handle
    }

    /// Returns the last handle of the characteristic: its last descriptor,
    /// or the value handle if it has no descriptors.
    #[inline(always)]
    #[must_use]
    pub const fn end_handle(&self) -> Handle {
        self.end_handle
    }

    /// Returns the descriptor handles, in definition order.
    #[inline(always)]
    #[must_use]
    pub fn descriptors(&self) -> &[Handle] {
        &self.descriptors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hdl(h: u16) -> Handle {
        Handle::new(h).unwrap()
    }

    #[test]
    fn attr_count() {
        assert_eq!(ServiceShape::new().attr_count(), 1);
        assert_eq!(ServiceShape::new().includes(2).attr_count(), 3);
        assert_eq!(ServiceShape::new().characteristic(0).attr_count(), 3);
        let s = ServiceShape::new()
            .includes(1)
            .characteristic(2)
            .characteristic(0);
        assert_eq!(s.attr_count(), 1 + 1 + 2 * 2 + 2);
    }

    #[test]
    fn assign_sequential() {
        let shape = ServiceShape::new()
            .includes(1)
            .characteristic(2)
            .characteristic(0);
        let block = HandleRange::new(hdl(10), hdl(17));
        assert_eq!(block.len(), shape.attr_count());
        let s = ServiceHandles::assign(block, &shape);
        assert_eq!(s.handle(), hdl(10));
        assert_eq!(s.end_handle(), hdl(17));
        assert_eq!(s.range(), block);
        assert_eq!(s.includes(), &[hdl(11)]);
        let [a, b] = s.characteristics() else {
            panic!("expected two characteristics")
        };
        assert_eq!((a.handle(), a.value_handle()), (hdl(12), hdl(13)));
        assert_eq!(a.descriptors(), &[hdl(14), hdl(15)]);
        assert_eq!(a.end_handle(), hdl(15));
        assert_eq!((b.handle(), b.value_handle()), (hdl(16), hdl(17)));
        assert!(b.descriptors().is_empty());
        assert_eq!(b.end_handle(), b.value_handle());
    }

    #[test]
    fn assign_empty_service() {
        let shape = ServiceShape::new();
        let s = ServiceHandles::assign(HandleRange::new(hdl(3), hdl(3)), &shape);
        assert_eq!(s.handle(), s.end_handle());
        assert!(s.includes().is_empty() && s.characteristics().is_empty());
    }
}
