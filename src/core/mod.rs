//! Core module: primitive OS yang dibagi dengan renderer
//!
//! - Shared memory mapping (memmap2) dengan version header
//! - Named semaphore untuk lock dan sinyal readiness
//! - `SharedBuffer`: satu-satunya pintu baca/tulis ke data region

mod region;
mod semaphore;

pub use region::{
    LocalRegion, NoLock, ReadyCounter, ReadySignal, Region, RegionLock, SharedBuffer, ShmRegion,
    DATA_OFF, DEFAULT_REGION_LEN, VERSION_LEN, VERSION_OFF,
};
pub use semaphore::NamedSemaphore;
