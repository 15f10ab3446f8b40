//! System-wide tunables.

/// Default per-list vertex buffer capacity in bytes (split across the two
/// DMA target sets).
pub const PVR_VERTBUF_LEN: usize = 256 * 1024;

/// Size of one PVR vertex/primitive word group in bytes. Primitive
/// submissions must be a multiple of this.
pub const PVR_PRIM_ALIGN: usize = 32;

/// GD-ROM sector payload size for cooked (2048-byte) reads.
pub const CD_SECTOR_SIZE: usize = 2048;

/// Polling interval budget for GD-ROM command completion, in polls, before
/// an untimed command is considered wedged.
pub const CD_DEFAULT_POLLS: u32 = 1_000_000;

/// Label capacity for wait-queue diagnostics.
pub const GENWAIT_DESC_LEN: usize = 32;
