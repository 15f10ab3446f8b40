//! Interrupt-side frame pacing.
//!
//! Two cooperating handlers decouple "all geometry received" from "safe to
//! flip": list-done events start a render the moment every enabled list is
//! in, while the vblank handler is the only place the visible buffer
//! pointer moves. A render blocked on an unflipped predecessor becomes
//! dispatchable again at the next vblank, which is why the vblank handler
//! unconditionally retries the render gate.

use std::sync::atomic::Ordering;

use strum::IntoEnumIterator as _;

use crate::{
    kernel_dbg,
    pvr::{
        ListPhase, ListType, Pvr, PvrState, RenderTarget, TaEvent, WAIT_RENDER_DONE,
        WAIT_TA_READY, dma,
    },
    sync::genwait,
    task,
};

impl Pvr {
    /// Delivers one hardware event to the pipeline.
    ///
    /// Called by the platform's interrupt dispatcher; the handler body runs
    /// in interrupt context and never blocks.
    pub fn handle_interrupt(&self, event: TaEvent) {
        let _irq = crate::interrupt::enter();
        let mut st = self.state.lock();
        if !st.active {
            return;
        }
        match event {
            TaEvent::ListDone(list) => self.on_list_done(&mut st, list),
            TaEvent::RenderDone => self.on_render_done(&mut st),
            TaEvent::DmaDone => {
                if st.dma_active {
                    dma::advance(self, &mut st);
                }
            }
            TaEvent::Vblank => self.on_vblank(&mut st),
        }
    }

    fn on_list_done(&self, st: &mut PvrState, list: ListType) {
        let rec = &mut st.lists[list.index()];
        if !rec.phase.is_enabled() {
            // Spurious: the TA acknowledged a list this frame never used.
            kernel_dbg!("pvr: spurious list-done for {list}");
            return;
        }
        rec.phase = ListPhase::Transferred;
        self.render_lists(st);
    }

    fn on_render_done(&self, st: &mut PvrState) {
        st.render_busy = false;
        // Attribute the completion to the render that actually ran, not to
        // whatever scene is being collected now: the next scene may have
        // opened while this render was in flight.
        if let Some(RenderTarget::Screen { .. }) = st.rendering.take() {
            // Screen frames hold their output until the vblank flip;
            // texture frames have no flip to wait for.
            st.render_completed = true;
        }
        genwait::wake_all(self.wait_key(WAIT_RENDER_DONE));
    }

    fn on_vblank(&self, st: &mut PvrState) {
        self.vblank_count.fetch_add(1, Ordering::Relaxed);
        if st.render_completed {
            st.view_target ^= 1;
            let view = st.view_target;
            st.hw.flip(view);
            st.render_completed = false;
        }
        // A render deferred on the unflipped previous frame only becomes
        // dispatchable here.
        self.render_lists(st);
    }

    /// The render gate: start rasterization once a fully transferred frame
    /// is waiting and the previous one is out of the way.
    ///
    /// Starting a render flips the TA's write target (not the visible
    /// buffer), releases the submission side, and wakes anything parked in
    /// `wait_ready` so the next frame's geometry can overlap this render.
    fn render_lists(&self, st: &mut PvrState) {
        if !st.ta_busy || st.render_busy {
            return;
        }
        if st.render_completed && st.to_texture.is_none() {
            // Previous frame not flipped yet; retried at vblank.
            return;
        }
        let mut enabled = 0;
        for list in ListType::iter() {
            let phase = st.lists[list.index()].phase;
            if phase.is_enabled() {
                enabled += 1;
                if phase != ListPhase::Transferred {
                    return;
                }
            }
        }
        if enabled == 0 {
            return;
        }

        let target = match st.to_texture {
            Some(txr) => RenderTarget::Texture(txr),
            None => RenderTarget::Screen {
                ta_target: st.ta_target,
            },
        };
        st.hw.start_render(target);
        st.render_busy = true;
        st.rendering = Some(target);
        st.ta_target ^= 1;
        for rec in &mut st.lists {
            rec.phase = ListPhase::Unopened;
            rec.prims = 0;
        }
        st.ta_busy = false;
        genwait::wake_all(self.wait_key(WAIT_TA_READY));
        task::schedule(true);
        kernel_dbg!("pvr: render started");
    }
}
