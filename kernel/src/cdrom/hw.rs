//! Hardware port of the GD-ROM drive (G1 bus).

use strum::Display;

/// Commands submitted through the drive's command slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdCommand {
    /// Re-initialize the drive / re-read the disc TOC.
    Init,
    /// Read the table of contents.
    GetToc,
    /// Read data sectors.
    Read,
    /// Begin a streaming read session.
    StreamStart,
    /// Drive status query.
    Stat,
}

/// Drive status codes attached to failed commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CdStatus {
    #[strum(serialize = "no disc")]
    NoDisc,
    #[strum(serialize = "disc changed")]
    DiscChanged,
    #[strum(serialize = "system error")]
    SystemError,
    #[strum(serialize = "timeout")]
    Timeout,
}

/// Progress of a submitted command, as reported by the status probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdResponse {
    /// Still being processed; poll again.
    Processing,
    /// Finished successfully.
    Completed,
    /// Finished with a drive error.
    Failed(CdStatus),
    /// A streaming session is active on this handle.
    Streaming,
}

/// Opaque handle to an in-flight command slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmdHandle(pub u32);

/// How sector data moves from the drive to memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// G1 bus DMA; completion raises the G1 DMA interrupt.
    Dma,
    /// Programmed I/O through the data register.
    Pio,
}

/// The G1/GD-ROM hardware interface consumed by the driver.
///
/// Same contract as the PVR port: transfer completions must arrive
/// asynchronously via [`Cdrom::handle_dma_irq`], never from inside
/// [`begin_transfer`].
///
/// [`Cdrom::handle_dma_irq`]: crate::cdrom::Cdrom::handle_dma_irq
/// [`begin_transfer`]: G1Device::begin_transfer
pub trait G1Device: Send {
    /// Submits a command to the drive's command slot.
    fn submit(&mut self, cmd: CdCommand, params: &[u32]) -> Result<CmdHandle, CdStatus>;

    /// Probes an in-flight command.
    fn poll(&mut self, hnd: CmdHandle) -> CmdResponse;

    /// Aborts a stuck command so its slot is not left permanently
    /// occupied.
    fn abort(&mut self, hnd: CmdHandle);

    /// Starts moving `len` bytes of the current read or stream.
    fn begin_transfer(&mut self, mode: TransferMode, len: usize);

    /// Bytes the device still owes on the transfer started last.
    fn transfer_remaining(&self) -> usize;

    /// Copies completed transfer data out of the device.
    fn read_transferred(&mut self, buf: &mut [u8]) -> usize;
}
