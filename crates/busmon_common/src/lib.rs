pub mod app;
pub mod hal;

use bitflags::bitflags;

/// Number of byte locations reachable over the shared bus.
pub const BUS_SIZE: usize = 0x100;

/// Command register. The target writes a command code here before raising RDY.
pub const COMMAND: u8 = 0xF0;
/// First argument/result byte. Multi-byte results occupy `CMD_ARG..=CMD_ARG + 3`.
pub const CMD_ARG: u8 = 0xF1;

/// Low byte of the target's reset vector, as seen through the 8-bit bus window.
pub const RESET_VECTOR: u8 = 0xFC;
/// Reset vector written before every image load: target address 0xFF00.
pub const RESET_TARGET: u16 = 0xFF00;

/// Status bytes interleaved into the serial stream.
pub mod status {
    /// Bus access attempted without ownership.
    pub const GUARD: u8 = b'!';
    /// Unrecognised command code.
    pub const UNKNOWN: u8 = b'?';
    /// Memory self-test mismatch.
    pub const MISMATCH: u8 = b'X';
    /// EXIT acknowledgement.
    pub const EXIT_ACK: u8 = 0x19;
    /// Line terminator after time output and dump lines.
    pub const CR: u8 = 0x0D;
    /// Monitor shell prompt.
    pub const PROMPT: u8 = b'#';
}

bitflags! {
    /// Lines of the control port.
    ///
    /// Levels are physical: RDY, RESB and IRQB are active low, RD and WR
    /// are active high, BE high lets the target drive the bus.
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
    pub struct ControlLines: u8 {
        const RXD = 1 << 0;
        const TXD = 1 << 1;
        const RDY = 1 << 2;
        const BE = 1 << 3;
        const RESB = 1 << 4;
        const IRQB = 1 << 5;
        const RD = 1 << 6;
        const WR = 1 << 7;
    }
}

impl ControlLines {
    /// Pins the controller drives after reset.
    pub const OUTPUTS: ControlLines = ControlLines::BE
        .union(ControlLines::RESB)
        .union(ControlLines::IRQB)
        .union(ControlLines::RD)
        .union(ControlLines::WR);

    /// Output latch after reset: TXD idle high, IRQB released, RXD pulled up,
    /// everything else low (target held in reset, RDY latch at 0 so that
    /// switching it to an output pulls the line down).
    pub const RESET_LATCH: ControlLines = ControlLines::RXD
        .union(ControlLines::TXD)
        .union(ControlLines::IRQB);
}
