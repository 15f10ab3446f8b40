//! The list DMA chain.
//!
//! A frame's staged vertex buffers are pushed to the TA by a chain of DMA
//! transfers: the submitting thread issues the first one from
//! `scene_finish` while holding the chain mutex, and every completion
//! interrupt re-enters [`advance`] to issue the next. The walk visits the
//! lists in fixed priority order, skipping over direct-mode lists, and a
//! list is marked [`ListPhase::DmaIssued`] *before* its transfer is handed
//! to hardware — the completion re-entry must already see the mark or it
//! would issue the same list twice.
//!
//! When no unissued list remains the chain is done: the drained buffer set
//! is recycled and the chain mutex is released exactly once — via the
//! owner-handoff unlock when the final completion arrives in interrupt
//! context, since the mutex still belongs to the thread that started the
//! chain.

use strum::IntoEnumIterator as _;

use crate::{
    interrupt, kernel_dbg,
    pvr::{ListPhase, ListType, Pvr, PvrState},
};

/// Issues the next pending transfer, or finishes the chain.
///
/// Re-entrant from both thread context (first call) and interrupt context
/// (every completion). The caller holds the PVR state lock; the chain mutex
/// is held by the chain's owning thread throughout.
pub(super) fn advance(pvr: &Pvr, st: &mut PvrState) {
    debug_assert!(st.dma_active);
    // The set being drained is the one the application is *not* filling.
    let target = st.ram_target ^ 1;

    for list in ListType::iter() {
        if st.lists[list.index()].phase != ListPhase::Closed {
            continue;
        }
        let has_data = st.buffers[target].bufs[list.index()]
            .as_ref()
            .is_some_and(|b| b.used > 0);
        if !has_data {
            // Direct-mode list (or empty buffer): nothing to transfer, but
            // the mark keeps the walk moving past it on re-entry.
            st.lists[list.index()].phase = ListPhase::DmaIssued;
            continue;
        }

        // Mark before issuing: the completion callback is this same
        // function and must not find the list still pending.
        st.lists[list.index()].phase = ListPhase::DmaIssued;
        let PvrState { hw, buffers, .. } = st;
        let buf = buffers[target].bufs[list.index()].as_ref().unwrap();
        hw.begin_list_dma(list, &buf.data[..buf.used]);
        kernel_dbg!("pvr: dma chain issued {list} ({} bytes)", buf.used);
        return;
    }

    finish(pvr, st, target);
}

/// Chain drained: recycle the buffer set and hand the chain mutex back.
fn finish(pvr: &Pvr, st: &mut PvrState, target: usize) {
    st.dma_active = false;
    for buf in st.buffers[target].bufs.iter_mut().flatten() {
        buf.used = 0;
    }
    st.buffers[target].ready = true;

    let owner = st
        .dma_owner
        .take()
        .expect("dma chain finished without an owner");
    let released = if interrupt::inside() {
        // The logical owner is the thread that started the chain; a normal
        // unlock here would be rejected as a foreign release.
        unsafe { pvr.dma_lock.unlock_as(owner) }
    } else {
        pvr.dma_lock.unlock()
    };
    debug_assert!(released.is_ok(), "dma chain unlock failed: {released:?}");
    kernel_dbg!("pvr: dma chain complete");
}
