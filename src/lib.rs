//! Attribute handle allocation for emulated GATT servers and clients.
//!
//! A bridge that re-exposes a platform's native GATT stack through its own
//! attribute table must hand out ATT handles itself: every service,
//! characteristic, and descriptor registered by an application needs a
//! unique 16-bit handle ([Vol 3] Part F, Section 3.2.2), and a service's
//! handle block must be reclaimed when the service is removed. This crate
//! provides that bookkeeping as a per-application free-list of disjoint
//! handle ranges with first-fit block allocation and adjacent-range merging
//! on release.

pub use {alloc::*, handle::*, schema::*};

mod alloc;
mod handle;
mod schema;

pub(crate) type SyncMutex<T> = parking_lot::Mutex<T>;
