//! Hardware port of the PVR pipeline.
//!
//! The state machines in this module run against anything implementing
//! [`TileAccelerator`]; the real MMIO/store-queue backend and the recording
//! fakes used in tests are interchangeable behind it.

use crate::pvr::ListType;

/// Where a render pass rasterizes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    /// One of the two screen frame buffers.
    Screen {
        /// Which buffer the tile accelerator's output goes to.
        ta_target: usize,
    },
    /// An offscreen texture; flips are skipped for these frames.
    Texture(TextureTarget),
}

/// Description of a render-to-texture destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureTarget {
    /// VRAM offset of the texture.
    pub base: u32,
    pub width: u32,
    pub height: u32,
}

/// Asynchronous events raised by the tile accelerator and its DMA engine.
///
/// Delivered to [`Pvr::handle_interrupt`](crate::pvr::Pvr::handle_interrupt)
/// by the platform interrupt dispatcher (or by a test pumping a fake).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaEvent {
    /// The TA confirmed full receipt of one list's geometry.
    ListDone(ListType),
    /// A previously started render pass finished.
    RenderDone,
    /// One queued list DMA transfer completed.
    DmaDone,
    /// Vertical blanking interval reached.
    Vblank,
}

/// The tile-accelerator hardware interface consumed by the PVR pipeline.
///
/// Contract: completions for [`begin_list_dma`] must be delivered
/// asynchronously as [`TaEvent::DmaDone`] after the call returns, exactly as
/// the hardware raises its interrupt — never synchronously from inside the
/// call, which would re-enter the chain under its own lock.
///
/// [`begin_list_dma`]: TileAccelerator::begin_list_dma
pub trait TileAccelerator: Send {
    /// Writes one primitive directly into the TA input FIFO for `list`.
    fn submit(&mut self, list: ListType, data: &[u8]);

    /// Starts an asynchronous DMA transfer of a filled vertex buffer
    /// into the TA.
    fn begin_list_dma(&mut self, list: ListType, data: &[u8]);

    /// Kicks rasterization of the binned frame.
    fn start_render(&mut self, target: RenderTarget);

    /// Points video scanout at the given frame buffer. Called only from the
    /// vblank handler.
    fn flip(&mut self, view_target: usize);
}
