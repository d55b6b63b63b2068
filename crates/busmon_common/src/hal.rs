//! Hardware capabilities injected into the firmware components.
//!
//! The firmware never touches registers directly. Every component receives
//! the pieces of hardware it needs through these traits so that the same
//! protocol code runs against the real board or against the simulated one.

use std::time::Duration;

/// The three 8-bit ports wired to the target.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Port {
    /// A0-A7.
    Address,
    /// D0-D7.
    Data,
    /// RDY, BE, RESB, IRQB, RD, WR (see [`crate::ControlLines`]).
    Control,
}

/// General purpose I/O with AVR-like semantics: an output latch, a direction
/// register (bit set = output) and the sampled pin levels.
///
/// For input pins the latch selects the pull-up.
pub trait Gpio {
    /// Write the output latch of `port`.
    fn set(&mut self, port: Port, value: u8);
    /// Sample the pin levels of `port`.
    fn get(&mut self, port: Port) -> u8;
    /// Read back the output latch of `port`.
    fn latch(&self, port: Port) -> u8;
    /// Write the direction register of `port`.
    fn set_direction(&mut self, port: Port, outputs: u8);
    /// Read back the direction register of `port`.
    fn direction(&self, port: Port) -> u8;
}

/// Raw serial receiver/transmitter registers.
pub trait SerialPort {
    /// A received byte is waiting.
    fn rx_ready(&mut self) -> bool;
    /// Take the received byte. Only meaningful after `rx_ready` returned true.
    fn read(&mut self) -> u8;
    /// The transmit register can accept a byte.
    fn tx_ready(&mut self) -> bool;
    /// Load a byte into the transmit register.
    fn write(&mut self, byte: u8);
    /// Called between polls while a blocking receive waits for a byte.
    fn wait_rx(&mut self) {
        std::hint::spin_loop();
    }

    /// The far end has gone away and no further byte will ever arrive.
    ///
    /// A physical UART never hangs up.
    fn hung_up(&self) -> bool {
        false
    }
}

/// Fixed-duration waits.
pub trait Delay {
    /// Wait at least `duration`.
    fn sleep(&mut self, duration: Duration);
    /// Burn `cycles` instruction cycles (NOPs on the AVR).
    fn spin(&mut self, cycles: u32);
}
