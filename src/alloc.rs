//! Per-application attribute handle allocator.
//!
//! Each registered GATT application owns the full handle space
//! `0x0001..=0xFFFF` and carves a contiguous block out of it for every
//! service it registers. Free space is kept as a sorted list of disjoint,
//! non-adjacent ranges. Allocation is first-fit: the lowest free range that
//! can hold the block wins, and any remainder stays in place. Released
//! blocks are merged back with their free neighbors, so a fully torn-down
//! application returns to a single `0x0001..=0xFFFF` range.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{Debug, Display, Formatter};
use std::num::NonZeroU32;

use tracing::{debug, warn};

use crate::{Handle, HandleRange, ServiceHandles, ServiceShape, SyncMutex};

/// Error type returned by the allocator.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No free range can hold the requested number of attributes. Retrying
    /// without releasing another service will not succeed.
    #[error("not enough free handles for {0} attributes")]
    NotEnoughHandles(u32),
    /// The application was never registered or was already deregistered.
    #[error("unknown application {0}")]
    UnknownApp(AppId),
    /// The released range is not a currently allocated block.
    #[error("{0} is not an allocated handle block")]
    InvalidRange(HandleRange),
}

/// Common allocator result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Opaque GATT application identifier scoping one handle space.
#[derive(
    Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct AppId(NonZeroU32);

impl AppId {
    /// Wraps a raw application id. Returns `None` if the id is invalid.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Option<Self> {
        match NonZeroU32::new(id) {
            Some(nz) => Some(Self(nz)),
            None => None,
        }
    }
}

impl Debug for AppId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "AppId({})", self.0.get())
    }
}

impl Display for AppId {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

/// Sorted list of disjoint, non-adjacent free handle ranges.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
struct FreeList(Vec<HandleRange>);

impl FreeList {
    /// Creates a free-list covering the entire handle space.
    #[inline]
    fn full() -> Self {
        Self(vec![HandleRange::ALL])
    }

    /// Carves a block of `count` handles off the front of the first free
    /// range that can hold it. The list is unchanged on failure.
    fn carve(&mut self, count: u32) -> Option<HandleRange> {
        let i = self.0.iter().position(|r| r.len() >= count)?;
        let r = self.0[i];
        // count <= r.len() <= 0xFFFF, so the block end cannot wrap
        let end = Handle::new(u16::from(r.start()).wrapping_add((count - 1) as u16))?;
        let block = HandleRange::new(r.start(), end);
        match end.next() {
            Some(rest) if end < r.end() => self.0[i] = HandleRange::new(rest, r.end()),
            _ => {
                self.0.remove(i);
            }
        }
        Some(block)
    }

    /// Returns a block to the list, merging it with an adjacent predecessor
    /// and/or successor. Fails if the block overlaps any free range.
    fn insert(&mut self, r: HandleRange) -> bool {
        let i = self.0.partition_point(|f| f.end() < r.start());
        if self.0.get(i).is_some_and(|&f| f.overlaps(r)) {
            return false;
        }
        let prev = (i > 0).then(|| self.0[i - 1]);
        let next = self.0.get(i).copied();
        let merge_prev = prev.is_some_and(|p| p.end().next() == Some(r.start()));
        let merge_next = next.is_some_and(|n| r.end().next() == Some(n.start()));
        match (merge_prev, merge_next) {
            (true, true) => {
                self.0[i - 1] = HandleRange::new(self.0[i - 1].start(), self.0[i].end());
                self.0.remove(i);
            }
            (true, false) => self.0[i - 1] = HandleRange::new(self.0[i - 1].start(), r.end()),
            (false, true) => self.0[i] = HandleRange::new(r.start(), self.0[i].end()),
            (false, false) => self.0.insert(i, r),
        }
        true
    }
}

/// Per-application allocator state.
#[derive(Clone, Debug, Default)]
struct AppState {
    free: FreeList,
    /// Currently allocated blocks, start handle -> end handle.
    used: BTreeMap<Handle, Handle>,
}

impl AppState {
    #[inline]
    fn new() -> Self {
        Self {
            free: FreeList::full(),
            used: BTreeMap::new(),
        }
    }
}

/// Attribute handle allocator for a set of GATT applications.
///
/// All operations are synchronous and serialized on one internal lock, so a
/// shared instance can be called from any thread the surrounding binding
/// layer happens to run on. Call frequency is tied to service registration
/// and teardown, not per-packet traffic.
#[derive(Debug, Default)]
pub struct HandleAllocator(SyncMutex<Inner>);

#[derive(Debug, Default)]
struct Inner {
    /// Last application id issued by [`HandleAllocator::next_id`].
    last_id: u32,
    apps: HashMap<AppId, AppState>,
}

impl HandleAllocator {
    /// Creates an allocator with no registered applications.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a new monotonically increasing application id. The id is not
    /// registered until passed to [`register`](Self::register).
    pub fn next_id(&self) -> AppId {
        let inner = &mut *self.0.lock();
        inner.last_id = inner.last_id.wrapping_add(1).max(1);
        // SAFETY: last_id >= 1
        AppId(unsafe { NonZeroU32::new_unchecked(inner.last_id) })
    }

    /// Registers an application, giving it the full handle space. Returns
    /// `false`, leaving existing state untouched, if the application is
    /// already registered.
    pub fn register(&self, app: AppId) -> bool {
        match self.0.lock().apps.entry(app) {
            Entry::Occupied(_) => {
                debug!("{app} is already registered");
                false
            }
            Entry::Vacant(e) => {
                e.insert(AppState::new());
                debug!("{app} registered");
                true
            }
        }
    }

    /// Deregisters an application, dropping its free-list and every
    /// allocated block. Returns `false` if the application was not
    /// registered.
    pub fn deregister(&self, app: AppId) -> bool {
        let known = self.0.lock().apps.remove(&app).is_some();
        if known {
            debug!("{app} deregistered");
        }
        known
    }

    /// Returns whether `app` is currently registered.
    #[must_use]
    pub fn is_registered(&self, app: AppId) -> bool {
        self.0.lock().apps.contains_key(&app)
    }

    /// Allocates a handle block for one service and assigns sequential
    /// handles to its elements. On failure the application's state is
    /// unchanged.
    pub fn allocate(&self, app: AppId, shape: &ServiceShape) -> Result<ServiceHandles> {
        let count = shape.attr_count();
        let inner = &mut *self.0.lock();
        let st = inner.apps.get_mut(&app).ok_or(Error::UnknownApp(app))?;
        let Some(block) = st.free.carve(count) else {
            warn!("{app}: no free range can hold {count} attributes");
            return Err(Error::NotEnoughHandles(count));
        };
        st.used.insert(block.start(), block.end());
        debug!("{app}: allocated {block}");
        Ok(ServiceHandles::assign(block, shape))
    }

    /// Returns a previously allocated block to the application's free-list.
    /// `block` must be exactly the range returned by
    /// [`allocate`](Self::allocate); anything else, including a
    /// double-release, is rejected with [`Error::InvalidRange`].
    pub fn release(&self, app: AppId, block: HandleRange) -> Result<()> {
        let inner = &mut *self.0.lock();
        let st = inner.apps.get_mut(&app).ok_or(Error::UnknownApp(app))?;
        match st.used.get(&block.start()) {
            Some(&end) if end == block.end() => {}
            _ => return Err(Error::InvalidRange(block)),
        }
        st.used.remove(&block.start());
        if !st.free.insert(block) {
            // used said the block was allocated, so it cannot overlap free
            // space; restore the record rather than corrupt the list
            st.used.insert(block.start(), block.end());
            return Err(Error::InvalidRange(block));
        }
        debug!("{app}: released {block}");
        Ok(())
    }

    /// Returns the application's free ranges sorted ascending by start, or
    /// `None` if the application is not registered.
    #[must_use]
    pub fn free_ranges(&self, app: AppId) -> Option<Vec<HandleRange>> {
        Some(self.0.lock().apps.get(&app)?.free.0.clone())
    }

    /// Returns the application's allocated blocks sorted ascending by
    /// start, or `None` if the application is not registered.
    #[must_use]
    pub fn allocated(&self, app: AppId) -> Option<Vec<HandleRange>> {
        let inner = self.0.lock();
        let st = inner.apps.get(&app)?;
        Some(
            (st.used.iter())
                .map(|(&start, &end)| HandleRange::new(start, end))
                .collect(),
        )
    }
}
