//! PVR scene-submission pipeline.
//!
//! The application collects a frame by opening and filling primitive lists
//! between [`Pvr::scene_begin`] and [`Pvr::scene_finish`]; closing a list is
//! one-way within a scene. Lists whose geometry was registered through
//! [`Pvr::set_vertbuf`] are staged in main-memory vertex buffers and pushed
//! to the tile accelerator by a chained DMA walk at `scene_finish`; lists
//! without a buffer go straight to the TA FIFO as they are submitted. The
//! two styles may be mixed within one frame.
//!
//! Frame pacing is interrupt-driven: per-list "fully received" events gate
//! the render start, the render-done event arms the buffer flip, and the
//! flip itself happens only inside the vblank handler. See [`dma`] for the
//! thread/interrupt handoff of the transfer chain.

use std::{
    ptr,
    sync::atomic::{AtomicU64, Ordering},
    thread::ThreadId,
};

use strum::IntoEnumIterator as _;

use crate::{
    error::KernelError,
    interrupt, kernel_dbg,
    param::{PVR_PRIM_ALIGN, PVR_VERTBUF_LEN},
    sync::{RawMutex, SpinLock, genwait},
    task,
};

mod dma;
mod hw;
mod irq;
mod list;

pub use self::{
    hw::{RenderTarget, TaEvent, TextureTarget, TileAccelerator},
    list::{ListMask, ListPhase, ListType},
};

/// Init-time pipeline configuration.
#[derive(Debug, Clone, Copy)]
pub struct PvrConfig {
    /// Lists the application will submit; bins are allocated for these.
    pub lists: ListMask,
}

impl Default for PvrConfig {
    fn default() -> Self {
        Self {
            lists: ListMask::OPAQUE | ListMask::TRANSLUCENT | ListMask::PUNCH_THROUGH,
        }
    }
}

/// Lifetime counters, monotonically increasing between init and shutdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct PvrStats {
    pub frame_count: u64,
    pub vblank_count: u64,
}

/// Where the scene collection currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ScenePhase {
    #[default]
    Idle,
    Collecting,
}

#[derive(Debug, Default)]
struct ListRecord {
    phase: ListPhase,
    prims: u32,
}

/// One half of a registered double-buffered vertex buffer.
#[derive(Debug)]
struct DmaBuffer {
    data: Vec<u8>,
    used: usize,
}

impl DmaBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            used: 0,
        }
    }
}

/// One of the two per-frame buffer target sets.
#[derive(Debug, Default)]
struct BufferSet {
    bufs: [Option<DmaBuffer>; ListType::COUNT],
    /// False while the DMA chain is still draining this set.
    ready: bool,
}

struct PvrState {
    hw: Box<dyn TileAccelerator>,
    active: bool,
    configured: ListMask,

    scene: ScenePhase,
    to_texture: Option<TextureTarget>,
    open_list: Option<ListType>,
    lists: [ListRecord; ListType::COUNT],

    buffers: [BufferSet; 2],
    /// Target set the application is currently filling.
    ram_target: usize,
    /// Buffer the TA bins into; flipped when a render starts.
    ta_target: usize,
    /// Buffer scanout displays; flipped only at vblank.
    view_target: usize,

    /// TA holds a submitted frame that has not started rendering.
    ta_busy: bool,
    /// A render pass is in flight.
    render_busy: bool,
    /// Target of the in-flight render pass. Latched when the render starts:
    /// by the time it completes, `to_texture` may already describe the next
    /// scene being collected.
    rendering: Option<RenderTarget>,
    /// A render finished but its buffer has not been flipped yet.
    render_completed: bool,

    /// DMA chain bookkeeping; the chain mutex serializes whole chains, the
    /// owner is whom the completing interrupt unlocks it for.
    dma_active: bool,
    dma_owner: Option<ThreadId>,
}

/// The PVR pipeline context.
///
/// One instance per GPU, alive between construction and [`shutdown`]. An
/// explicit object rather than a process-wide singleton, so the pipeline can
/// be driven against a fake device.
///
/// [`shutdown`]: Pvr::shutdown
pub struct Pvr {
    state: SpinLock<PvrState>,
    /// Chain-ownership mutex: held from the first transfer of a frame's DMA
    /// chain until the interrupt that completes the last one releases it on
    /// the issuing thread's behalf.
    dma_lock: RawMutex,
    frame_count: AtomicU64,
    vblank_count: AtomicU64,
}

/// Wait-channel offsets added to the context address for genwait keys.
const WAIT_TA_READY: usize = 0;
const WAIT_RENDER_DONE: usize = 1;

impl Pvr {
    /// Brings the pipeline up against the given hardware.
    pub fn new(hw: Box<dyn TileAccelerator>, config: PvrConfig) -> Result<Self, KernelError> {
        if config.lists.is_empty() {
            return Err(KernelError::InvalidArgument);
        }
        Ok(Self {
            state: SpinLock::new(PvrState {
                hw,
                active: true,
                configured: config.lists,
                scene: ScenePhase::Idle,
                to_texture: None,
                open_list: None,
                lists: Default::default(),
                buffers: [
                    BufferSet {
                        bufs: Default::default(),
                        ready: true,
                    },
                    BufferSet {
                        bufs: Default::default(),
                        ready: true,
                    },
                ],
                ram_target: 0,
                ta_target: 0,
                view_target: 0,
                ta_busy: false,
                render_busy: false,
                rendering: None,
                render_completed: false,
                dma_active: false,
                dma_owner: None,
            }),
            dma_lock: RawMutex::default(),
            frame_count: AtomicU64::new(0),
            vblank_count: AtomicU64::new(0),
        })
    }

    /// Tears the pipeline down. Blocked waiters are released with an error.
    pub fn shutdown(&self) -> Result<(), KernelError> {
        interrupt::assert_thread_context()?;
        {
            let mut st = self.state.lock();
            if !st.active {
                return Err(KernelError::InvalidState);
            }
            st.active = false;
        }
        genwait::wake_all(self.wait_key(WAIT_TA_READY));
        genwait::wake_all(self.wait_key(WAIT_RENDER_DONE));
        Ok(())
    }

    /// Registers a double-buffered main-memory vertex buffer of `len` bytes
    /// for `list`, switching that list to DMA submission. `len == 0`
    /// removes the buffer. Only allowed between scenes.
    pub fn set_vertbuf(&self, list: ListType, len: usize) -> Result<(), KernelError> {
        let mut st = self.state.lock();
        st.check_active()?;
        if st.scene != ScenePhase::Idle {
            return Err(KernelError::InvalidState);
        }
        if !st.configured.contains_list(list) {
            return Err(KernelError::InvalidArgument);
        }
        if len == 0 {
            for set in &mut st.buffers {
                set.bufs[list.index()] = None;
            }
            return Ok(());
        }
        // Split across the two target sets; each half must hold whole
        // primitive word groups.
        if len % (2 * PVR_PRIM_ALIGN) != 0 {
            return Err(KernelError::InvalidArgument);
        }
        for set in &mut st.buffers {
            set.bufs[list.index()] = Some(DmaBuffer::new(len / 2));
        }
        Ok(())
    }

    /// Default-sized [`set_vertbuf`](Pvr::set_vertbuf).
    pub fn set_vertbuf_default(&self, list: ListType) -> Result<(), KernelError> {
        self.set_vertbuf(list, PVR_VERTBUF_LEN)
    }

    /// Opens a scene targeting the screen double buffer.
    pub fn scene_begin(&self) -> Result<(), KernelError> {
        self.scene_begin_inner(None)
    }

    /// Opens a scene rendering to a texture. Frames submitted this way skip
    /// the vblank flip and may overlap an unflipped screen render.
    pub fn scene_begin_txr(&self, target: TextureTarget) -> Result<(), KernelError> {
        self.scene_begin_inner(Some(target))
    }

    fn scene_begin_inner(&self, target: Option<TextureTarget>) -> Result<(), KernelError> {
        let mut st = self.state.lock();
        st.check_active()?;
        if st.scene != ScenePhase::Idle {
            return Err(KernelError::InvalidState);
        }
        let ram_target = st.ram_target;
        if !st.buffers[ram_target].ready {
            // Still being drained by a previous frame's chain; the caller
            // skipped wait_ready.
            return Err(KernelError::Busy);
        }
        st.scene = ScenePhase::Collecting;
        st.to_texture = target;
        st.open_list = None;
        for rec in &mut st.lists {
            rec.phase = ListPhase::Unopened;
            rec.prims = 0;
        }
        for buf in st.buffers[ram_target].bufs.iter_mut().flatten() {
            buf.used = 0;
        }
        Ok(())
    }

    /// Opens `list` for primitive submission, implicitly closing any other
    /// list that is still open.
    ///
    /// Closing is one-way within a scene: a list that was already closed
    /// cannot be reopened, and reopening the currently open list is a
    /// caller error too.
    pub fn list_begin(&self, list: ListType) -> Result<(), KernelError> {
        let mut st = self.state.lock();
        st.check_active()?;
        if st.scene != ScenePhase::Collecting {
            return Err(KernelError::InvalidState);
        }
        if !st.configured.contains_list(list) {
            return Err(KernelError::InvalidArgument);
        }
        match st.lists[list.index()].phase {
            ListPhase::Unopened => {}
            // One-way: never reopened within the scene.
            _ => return Err(KernelError::InvalidState),
        }
        if let Some(open) = st.open_list {
            st.close_list(open);
        }
        st.lists[list.index()].phase = ListPhase::Open;
        st.open_list = Some(list);
        Ok(())
    }

    /// Closes the currently open list.
    ///
    /// A list that was opened but received no primitives still gets one
    /// empty primitive emitted so its hardware bin is not left undefined.
    pub fn list_finish(&self) -> Result<(), KernelError> {
        let mut st = self.state.lock();
        st.check_active()?;
        if st.scene != ScenePhase::Collecting {
            return Err(KernelError::InvalidState);
        }
        let Some(open) = st.open_list else {
            return Err(KernelError::InvalidState);
        };
        st.close_list(open);
        Ok(())
    }

    /// Submits one primitive to the currently open list.
    ///
    /// Routed to the list's vertex buffer when one is registered, otherwise
    /// written directly to the TA FIFO. `data` must be a non-empty multiple
    /// of the primitive word-group size.
    pub fn prim(&self, data: &[u8]) -> Result<(), KernelError> {
        let mut st = self.state.lock();
        st.check_active()?;
        if st.scene != ScenePhase::Collecting {
            return Err(KernelError::InvalidState);
        }
        let Some(open) = st.open_list else {
            return Err(KernelError::InvalidState);
        };
        if data.is_empty() || data.len() % PVR_PRIM_ALIGN != 0 {
            return Err(KernelError::InvalidArgument);
        }
        st.push_prim(open, data);
        Ok(())
    }

    /// Submits one primitive to `list`'s vertex buffer, opening the list if
    /// this is its first use in the scene.
    ///
    /// Submitting to a closed list is a caller error surfaced as a negative
    /// result, not silently redirected. A DMA-mode submission to a list
    /// with no registered buffer would corrupt the frame, so that one is a
    /// fatal assertion.
    pub fn list_prim(&self, list: ListType, data: &[u8]) -> Result<(), KernelError> {
        let mut st = self.state.lock();
        st.check_active()?;
        if st.scene != ScenePhase::Collecting {
            return Err(KernelError::InvalidState);
        }
        if data.is_empty() || data.len() % PVR_PRIM_ALIGN != 0 {
            return Err(KernelError::InvalidArgument);
        }
        match st.lists[list.index()].phase {
            ListPhase::Unopened => st.lists[list.index()].phase = ListPhase::Open,
            ListPhase::Open => {}
            _ => return Err(KernelError::InvalidState),
        }
        let ram_target = st.ram_target;
        assert!(
            st.buffers[ram_target].bufs[list.index()].is_some(),
            "list_prim on {list} without a vertex buffer"
        );
        st.append_to_buffer(list, data);
        st.lists[list.index()].prims += 1;
        Ok(())
    }

    /// Closes the scene and makes the frame eligible for transfer and
    /// rendering.
    ///
    /// Any still-open list is auto-finished. If any list staged geometry in
    /// a vertex buffer, the DMA chain for the just-filled target set is
    /// started here; the chain's completion interrupt releases the chain
    /// mutex on this thread's behalf.
    pub fn scene_finish(&self) -> Result<(), KernelError> {
        interrupt::assert_thread_context()?;
        let has_dma = {
            let mut st = self.state.lock();
            st.check_active()?;
            if st.scene != ScenePhase::Collecting {
                return Err(KernelError::InvalidState);
            }
            // Close everything still accepting primitives, the explicitly
            // open list included.
            for list in ListType::iter() {
                if st.lists[list.index()].phase == ListPhase::Open {
                    st.close_list(list);
                }
            }
            st.open_list = None;
            st.scene = ScenePhase::Idle;
            st.ta_busy = true;
            let ram_target = st.ram_target;
            ListType::iter().any(|l| {
                st.lists[l.index()].phase == ListPhase::Closed
                    && st.buffers[ram_target].bufs[l.index()]
                        .as_ref()
                        .is_some_and(|b| b.used > 0)
            })
        };
        self.frame_count.fetch_add(1, Ordering::Relaxed);

        if !has_dma {
            kernel_dbg!("pvr: direct-mode frame submitted");
            return Ok(());
        }

        // Serialize whole chains: taken here in thread context, released by
        // the interrupt that completes the last transfer.
        self.dma_lock.lock()?;
        let mut st = self.state.lock();
        st.dma_owner = Some(task::current());
        st.dma_active = true;
        st.ram_target ^= 1;
        let chain_target = st.ram_target ^ 1;
        st.buffers[chain_target].ready = false;
        dma::advance(self, &mut st);
        Ok(())
    }

    /// Non-blocking probe: is the TA ready to accept the next frame?
    pub fn check_ready(&self) -> Result<(), KernelError> {
        let st = self.state.lock();
        st.check_active()?;
        if st.ta_busy {
            return Err(KernelError::Busy);
        }
        Ok(())
    }

    /// Blocks until the TA can accept the next frame (the previously
    /// submitted frame has started rendering).
    pub fn wait_ready(&self) -> Result<(), KernelError> {
        interrupt::assert_thread_context()?;
        let key = self.wait_key(WAIT_TA_READY);
        loop {
            let seen = genwait::prepare(key);
            {
                let st = self.state.lock();
                st.check_active()?;
                if !st.ta_busy {
                    return Ok(());
                }
            }
            genwait::wait_prepared(key, seen, "pvr_ready", None)?;
        }
    }

    /// Blocks until no render pass is in flight.
    pub fn wait_render_done(&self) -> Result<(), KernelError> {
        interrupt::assert_thread_context()?;
        let key = self.wait_key(WAIT_RENDER_DONE);
        loop {
            let seen = genwait::prepare(key);
            {
                let st = self.state.lock();
                st.check_active()?;
                if !st.render_busy {
                    return Ok(());
                }
            }
            genwait::wait_prepared(key, seen, "pvr_render_done", None)?;
        }
    }

    #[must_use]
    pub fn stats(&self) -> PvrStats {
        PvrStats {
            frame_count: self.frame_count.load(Ordering::Relaxed),
            vblank_count: self.vblank_count.load(Ordering::Relaxed),
        }
    }

    fn wait_key(&self, which: usize) -> usize {
        ptr::from_ref(self) as usize + which
    }
}

impl PvrState {
    fn check_active(&self) -> Result<(), KernelError> {
        if !self.active {
            return Err(KernelError::InvalidState);
        }
        Ok(())
    }

    /// Closes `list`, emitting a placeholder primitive if it is empty.
    fn close_list(&mut self, list: ListType) {
        if self.lists[list.index()].prims == 0 {
            let empty = [0_u8; PVR_PRIM_ALIGN];
            self.push_prim(list, &empty);
        }
        self.lists[list.index()].phase = ListPhase::Closed;
        if self.open_list == Some(list) {
            self.open_list = None;
        }
    }

    /// Routes a primitive to the list's vertex buffer or the TA FIFO.
    fn push_prim(&mut self, list: ListType, data: &[u8]) {
        let ram_target = self.ram_target;
        if self.buffers[ram_target].bufs[list.index()].is_some() {
            self.append_to_buffer(list, data);
        } else {
            self.hw.submit(list, data);
        }
        self.lists[list.index()].prims += 1;
    }

    fn append_to_buffer(&mut self, list: ListType, data: &[u8]) {
        let ram_target = self.ram_target;
        let buf = self.buffers[ram_target].bufs[list.index()]
            .as_mut()
            .expect("vertex buffer disappeared mid-scene");
        assert!(
            buf.used + data.len() <= buf.data.len(),
            "vertex buffer overflow on {list}"
        );
        buf.data[buf.used..buf.used + data.len()].copy_from_slice(data);
        buf.used += data.len();
    }
}
