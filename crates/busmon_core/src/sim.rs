//! A software board: ports, target CPU, memory and a serial line.
//!
//! The simulated target does not execute 6502 code. Each image it may be
//! booted with is paired with a [`TargetProgram`] that produces the same
//! mailbox traffic the real program would.

mod gpio;
mod serial;
mod target;

use std::time::Duration;

use busmon_common::hal::Delay;

pub use gpio::{GpioEvent, SimGpio};
pub use serial::SimSerial;
pub use target::{ClockProgram, EchoProgram, ScriptProgram, TargetProgram, TargetStep, Transcript};

/// Records requested waits without sleeping.
#[derive(Debug, Default)]
pub struct SimDelay {
    slept: Duration,
    spun: u64,
}

impl SimDelay {
    pub fn slept(&self) -> Duration {
        self.slept
    }

    pub fn spun(&self) -> u64 {
        self.spun
    }
}

impl Delay for SimDelay {
    fn sleep(&mut self, duration: Duration) {
        self.slept += duration;
    }

    fn spin(&mut self, cycles: u32) {
        self.spun += u64::from(cycles);
    }
}
