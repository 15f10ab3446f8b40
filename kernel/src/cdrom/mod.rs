//! GD-ROM command and DMA pipeline.
//!
//! Structurally the same machine as the PVR DMA chain: a thread submits a
//! command while holding the command mutex, completion is signaled from the
//! G1 DMA interrupt handler, and a non-blocking caller has the mutex handed
//! back on its behalf by that handler instead of waiting on the
//! transfer-done semaphore.

use std::thread::ThreadId;

use crate::{
    error::KernelError,
    interrupt, kernel_dbg,
    param::{CD_DEFAULT_POLLS, CD_SECTOR_SIZE},
    sync::{RawMutex, Semaphore, SpinLock},
    task,
    time::{ClockId, now_ms},
};

mod hw;
mod stream;

pub use self::{
    hw::{CdCommand, CdStatus, CmdHandle, CmdResponse, G1Device, TransferMode},
    stream::StreamCallback,
};
use self::stream::StreamState;

/// How a completed DMA transfer reaches the thread that started it.
#[derive(Debug, Clone, Copy)]
enum DmaWaiter {
    /// The issuing thread blocks on the transfer-done semaphore.
    Blocking,
    /// The issuing thread returned immediately and left the command mutex
    /// held; the interrupt releases it as that thread.
    Handoff(ThreadId),
}

struct CdState {
    hw: Box<dyn G1Device>,
    dma_waiter: Option<DmaWaiter>,
    stream: Option<StreamState>,
    callback: Option<StreamCallback>,
}

/// The GD-ROM driver context.
pub struct Cdrom {
    state: SpinLock<CdState>,
    /// Serializes drive commands. Held across a whole streaming session,
    /// and across a non-blocking read until its completion interrupt hands
    /// it back.
    cmd_lock: RawMutex,
    /// Posted by the G1 DMA interrupt for blocking reads.
    dma_done: Semaphore,
}

impl Cdrom {
    #[must_use]
    pub fn new(hw: Box<dyn G1Device>) -> Self {
        Self {
            state: SpinLock::new(CdState {
                hw,
                dma_waiter: None,
                stream: None,
                callback: None,
            }),
            cmd_lock: RawMutex::default(),
            dma_done: Semaphore::new(0),
        }
    }

    /// Executes a drive command, polling it to completion.
    pub fn exec_cmd(&self, cmd: CdCommand, params: &[u32]) -> Result<(), KernelError> {
        self.exec_cmd_timed(cmd, params, None)
    }

    /// Executes a drive command with a millisecond deadline.
    ///
    /// One deadline covers the whole call: time spent waiting for the
    /// command slot is charged against it before polling starts. Between
    /// polls the CPU is yielded when running in thread context. A command
    /// that outlives the deadline (or the untimed poll budget) is aborted
    /// so the command slot is reusable, then reported as a
    /// [`CdStatus::Timeout`].
    pub fn exec_cmd_timed(
        &self,
        cmd: CdCommand,
        params: &[u32],
        timeout_ms: Option<u64>,
    ) -> Result<(), KernelError> {
        interrupt::assert_thread_context()?;
        let deadline = timeout_ms.map(|ms| now_ms(ClockId::Monotonic) + ms);
        match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_sub(now_ms(ClockId::Monotonic));
                self.cmd_lock.lock_timed(remaining)?;
            }
            None => self.cmd_lock.lock()?,
        }
        let result = self.exec_cmd_locked(cmd, params, deadline);
        self.cmd_lock.unlock()?;
        result
    }

    fn exec_cmd_locked(
        &self,
        cmd: CdCommand,
        params: &[u32],
        deadline: Option<u64>,
    ) -> Result<(), KernelError> {
        let hnd = {
            let mut st = self.state.lock();
            st.hw.submit(cmd, params).map_err(KernelError::Cdrom)?
        };
        self.poll_cmd(hnd, deadline)
    }

    /// The poll trampoline: probes `hnd` until success, failure, or the
    /// absolute deadline (monotonic milliseconds).
    fn poll_cmd(&self, hnd: CmdHandle, deadline: Option<u64>) -> Result<(), KernelError> {
        let mut polls = 0_u32;
        loop {
            let resp = {
                let mut st = self.state.lock();
                st.hw.poll(hnd)
            };
            match resp {
                CmdResponse::Completed => return Ok(()),
                CmdResponse::Failed(status) => return Err(KernelError::Cdrom(status)),
                CmdResponse::Processing | CmdResponse::Streaming => {}
            }
            let timed_out = match deadline {
                Some(deadline) => now_ms(ClockId::Monotonic) >= deadline,
                None => {
                    polls += 1;
                    polls >= CD_DEFAULT_POLLS
                }
            };
            if timed_out {
                // Abort-and-reset: never leave the slot occupied.
                let mut st = self.state.lock();
                st.hw.abort(hnd);
                return Err(KernelError::Cdrom(CdStatus::Timeout));
            }
            if !interrupt::inside() {
                task::pass();
            }
        }
    }

    /// Re-initializes the drive, retrying while it reports a disc change
    /// (the status settles after a few commands on a fresh disc).
    pub fn reinit_ex(&self, max_attempts: u32) -> Result<(), KernelError> {
        let mut last = KernelError::Cdrom(CdStatus::Timeout);
        for _ in 0..max_attempts.max(1) {
            match self.exec_cmd(CdCommand::Init, &[]) {
                Ok(()) => return Ok(()),
                Err(KernelError::Cdrom(CdStatus::DiscChanged)) => {
                    last = KernelError::Cdrom(CdStatus::DiscChanged);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last)
    }

    /// Reads `count` sectors starting at `sector` into `buf`, blocking
    /// until the data has landed.
    ///
    /// DMA-mode completion arrives via [`handle_dma_irq`] posting the
    /// transfer-done semaphore; PIO mode pulls the data synchronously.
    ///
    /// [`handle_dma_irq`]: Cdrom::handle_dma_irq
    pub fn read_sectors_ex(
        &self,
        buf: &mut [u8],
        sector: u32,
        count: u32,
        mode: TransferMode,
    ) -> Result<(), KernelError> {
        interrupt::assert_thread_context()?;
        if buf.len() != count as usize * CD_SECTOR_SIZE {
            return Err(KernelError::InvalidArgument);
        }
        self.cmd_lock.lock()?;
        let result = self.read_locked(buf, sector, count, mode);
        self.cmd_lock.unlock()?;
        result
    }

    fn read_locked(
        &self,
        buf: &mut [u8],
        sector: u32,
        count: u32,
        mode: TransferMode,
    ) -> Result<(), KernelError> {
        {
            let mut st = self.state.lock();
            st.hw
                .submit(CdCommand::Read, &[sector, count])
                .map_err(KernelError::Cdrom)?;
            st.dma_waiter = Some(DmaWaiter::Blocking);
            st.hw.begin_transfer(mode, buf.len());
        }
        match mode {
            TransferMode::Dma => self.dma_done.wait()?,
            TransferMode::Pio => {
                // PIO has no completion interrupt for plain reads; drain
                // the data register directly.
                let mut st = self.state.lock();
                st.dma_waiter = None;
                while st.hw.transfer_remaining() > 0 {
                    st.hw.read_transferred(buf);
                }
                return Ok(());
            }
        }
        let mut st = self.state.lock();
        st.hw.read_transferred(buf);
        Ok(())
    }

    /// Starts a sector read whose completion hands the command mutex back
    /// instead of blocking this thread.
    ///
    /// The command mutex stays held by the calling thread until the G1 DMA
    /// interrupt releases it on the caller's behalf; [`dma_in_progress`]
    /// reports whether the transfer is still outstanding.
    ///
    /// [`dma_in_progress`]: Cdrom::dma_in_progress
    pub fn read_sectors_async(
        &self,
        sector: u32,
        count: u32,
    ) -> Result<(), KernelError> {
        interrupt::assert_thread_context()?;
        self.cmd_lock.lock()?;
        let mut st = self.state.lock();
        if let Err(status) = st.hw.submit(CdCommand::Read, &[sector, count]) {
            drop(st);
            self.cmd_lock.unlock()?;
            return Err(KernelError::Cdrom(status));
        }
        st.dma_waiter = Some(DmaWaiter::Handoff(task::current()));
        st.hw
            .begin_transfer(TransferMode::Dma, count as usize * CD_SECTOR_SIZE);
        Ok(())
    }

    /// Whether an asynchronous transfer is still outstanding.
    #[must_use]
    pub fn dma_in_progress(&self) -> bool {
        self.state.lock().dma_waiter.is_some()
    }

    /// G1 DMA completion interrupt handler.
    pub fn handle_dma_irq(&self) {
        let _irq = interrupt::enter();
        // Streaming sessions consume the interrupt per chunk.
        if self.stream_chunk_done() {
            return;
        }
        let waiter = {
            let mut st = self.state.lock();
            st.dma_waiter.take()
        };
        match waiter {
            Some(DmaWaiter::Blocking) => self.dma_done.post(),
            Some(DmaWaiter::Handoff(owner)) => {
                // The mutex's logical owner is the thread that issued the
                // read, not this interrupt.
                let released = unsafe { self.cmd_lock.unlock_as(owner) };
                debug_assert!(released.is_ok());
            }
            None => kernel_dbg!("cdrom: spurious G1 DMA interrupt"),
        }
    }
}
