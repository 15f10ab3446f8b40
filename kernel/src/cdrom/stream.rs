//! GD-ROM streaming reads.
//!
//! A streaming session holds the command mutex for its whole lifetime and
//! delivers data chunk by chunk: the application requests a chunk, the G1
//! DMA interrupt reports it complete, and a user callback is invoked once
//! per completed chunk.

use crate::{error::KernelError, interrupt, kernel_dbg, param::CD_SECTOR_SIZE};

use super::{CdCommand, Cdrom, CmdHandle, TransferMode};

/// Per-chunk completion callback; receives the chunk size in bytes.
pub type StreamCallback = Box<dyn FnMut(usize) + Send>;

#[derive(Debug)]
pub(super) struct StreamState {
    hnd: CmdHandle,
    mode: TransferMode,
    /// Bytes left in the whole session.
    remaining: usize,
    /// Size of the chunk currently in flight, if any.
    chunk: Option<usize>,
}

impl Cdrom {
    /// Installs (or clears) the per-chunk completion callback.
    pub fn stream_set_callback(&self, cb: Option<StreamCallback>) {
        self.state.lock().callback = cb;
    }

    /// Opens a streaming session of `count` sectors starting at `sector`.
    ///
    /// The command mutex is held by the calling thread until
    /// [`stream_stop`](Cdrom::stream_stop).
    pub fn stream_start(
        &self,
        sector: u32,
        count: u32,
        mode: TransferMode,
    ) -> Result<(), KernelError> {
        interrupt::assert_thread_context()?;
        self.cmd_lock.lock()?;
        let mut st = self.state.lock();
        if st.stream.is_some() {
            drop(st);
            self.cmd_lock.unlock()?;
            return Err(KernelError::Busy);
        }
        let hnd = match st.hw.submit(CdCommand::StreamStart, &[sector, count]) {
            Ok(hnd) => hnd,
            Err(status) => {
                drop(st);
                self.cmd_lock.unlock()?;
                return Err(KernelError::Cdrom(status));
            }
        };
        st.stream = Some(StreamState {
            hnd,
            mode,
            remaining: count as usize * CD_SECTOR_SIZE,
            chunk: None,
        });
        Ok(())
    }

    /// Requests the next chunk of up to `len` bytes.
    ///
    /// Completion is reported through the installed callback. The final
    /// chunk of a PIO session is completed inline: the drive firmware has
    /// been observed not to raise the transfer interrupt for it, so the
    /// driver detects the stream running dry and invokes the callback
    /// itself. That compensation is load-bearing on an unverified firmware
    /// assumption; see DESIGN.md.
    pub fn stream_request(&self, len: usize) -> Result<(), KernelError> {
        if len == 0 {
            return Err(KernelError::InvalidArgument);
        }
        let mut st = self.state.lock();
        let Some(stream) = st.stream.as_mut() else {
            return Err(KernelError::InvalidState);
        };
        if stream.chunk.is_some() {
            return Err(KernelError::Busy);
        }
        if stream.remaining == 0 {
            return Err(KernelError::InvalidState);
        }
        let len = len.min(stream.remaining);
        let mode = stream.mode;
        let final_pio = mode == TransferMode::Pio && len == stream.remaining;
        stream.chunk = Some(len);
        st.hw.begin_transfer(mode, len);

        if final_pio {
            kernel_dbg!("cdrom: completing final PIO stream chunk inline");
            drop(st);
            self.finish_chunk();
        }
        Ok(())
    }

    /// Bytes left in the current session (in-flight chunk included).
    pub fn stream_progress(&self) -> Result<usize, KernelError> {
        let st = self.state.lock();
        st.stream
            .as_ref()
            .map(|s| s.remaining)
            .ok_or(KernelError::InvalidState)
    }

    /// Ends the session, aborting any in-flight chunk, and releases the
    /// command mutex.
    pub fn stream_stop(&self) -> Result<(), KernelError> {
        let mut st = self.state.lock();
        let Some(stream) = st.stream.take() else {
            return Err(KernelError::InvalidState);
        };
        if stream.chunk.is_some() || stream.remaining > 0 {
            st.hw.abort(stream.hnd);
        }
        drop(st);
        self.cmd_lock.unlock()
    }

    /// Interrupt-side chunk completion; returns `false` when no session
    /// owns the interrupt.
    pub(super) fn stream_chunk_done(&self) -> bool {
        let st = self.state.lock();
        let active = st
            .stream
            .as_ref()
            .is_some_and(|stream| stream.chunk.is_some());
        drop(st);
        if !active {
            return false;
        }
        self.finish_chunk();
        true
    }

    /// Accounts one completed chunk and runs the user callback outside the
    /// state lock (the callback may call back into the driver).
    fn finish_chunk(&self) {
        let (done, callback) = {
            let mut st = self.state.lock();
            let Some(stream) = st.stream.as_mut() else {
                return;
            };
            let Some(done) = stream.chunk.take() else {
                return;
            };
            stream.remaining -= done;
            (done, st.callback.take())
        };
        if let Some(mut cb) = callback {
            cb(done);
            let mut st = self.state.lock();
            if st.callback.is_none() {
                st.callback = Some(cb);
            }
        }
    }
}
