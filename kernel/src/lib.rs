//! okos kernel concurrency core.
//!
//! A hosted Rust port of the KallistiOS kernel's synchronization primitives
//! and its PVR (PowerVR tile accelerator) scene-submission pipeline, plus the
//! GD-ROM command pipeline that shares the same interrupt/semaphore
//! completion pattern.
//!
//! Hardware sits behind the [`pvr::TileAccelerator`] and [`cdrom::G1Device`]
//! traits so the full interrupt-driven state machines run unmodified against
//! a fake device in tests. Interrupt handlers are plain functions dispatched
//! inside an [`interrupt`] context scope; they must never block, and every
//! blocking primitive fails fast when called from that scope.

pub mod cdrom;
pub mod error;
pub mod interrupt;
mod log;
pub mod param;
pub mod pvr;
pub mod sync;
pub mod task;
pub mod time;

pub use self::error::KernelError;
