//! Byte-level access to the shared bus.
//!
//! The address and data pins are shared with the target CPU, so every
//! transaction switches them to outputs, strobes, and hands them back as
//! pulled-up inputs. Nothing is driven unless BE shows that the controller
//! has taken the bus.

use std::time::Duration;

use busmon_common::hal::{Delay, Gpio, Port, SerialPort};
use busmon_common::{status, ControlLines};

use crate::{BusError, MonitorConfig, Usart};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BusOwner {
    Target,
    Controller,
}

pub struct BusTransport<G, D> {
    gpio: G,
    delay: D,
    strobe_hold: Duration,
    settle_cycles: u32,
    wake_pulse: Duration,
    reset_hold: Duration,
}

impl<G: Gpio, D: Delay> BusTransport<G, D> {
    pub fn new(gpio: G, delay: D, config: &MonitorConfig) -> Self {
        Self {
            gpio,
            delay,
            strobe_hold: config.strobe_hold,
            settle_cycles: config.settle_cycles,
            wake_pulse: config.wake_pulse,
            reset_hold: config.reset_hold,
        }
    }

    pub fn gpio(&self) -> &G {
        &self.gpio
    }

    pub fn gpio_mut(&mut self) -> &mut G {
        &mut self.gpio
    }

    pub fn delay_mut(&mut self) -> &mut D {
        &mut self.delay
    }

    /// Put every port in its power-on state: address and data floating with
    /// pull-ups, target held in reset, BE low, IRQB released.
    pub fn init(&mut self) {
        self.gpio
            .set_direction(Port::Control, ControlLines::OUTPUTS.bits());
        self.gpio
            .set(Port::Control, ControlLines::RESET_LATCH.bits());
        self.float(Port::Address);
        self.float(Port::Data);
    }

    fn float(&mut self, port: Port) {
        self.gpio.set(port, 0xFF);
        self.gpio.set_direction(port, 0x00);
    }

    fn set_line(&mut self, line: ControlLines, high: bool) {
        let latch = ControlLines::from_bits_retain(self.gpio.latch(Port::Control));
        let latch = if high { latch | line } else { latch - line };
        self.gpio.set(Port::Control, latch.bits());
    }

    pub fn owner(&self) -> BusOwner {
        let latch = ControlLines::from_bits_retain(self.gpio.latch(Port::Control));
        if latch.contains(ControlLines::BE) {
            BusOwner::Target
        } else {
            BusOwner::Controller
        }
    }

    /// Drive RDY low so the target cannot raise a request.
    pub fn hold_rdy(&mut self) {
        let dir = self.gpio.direction(Port::Control) | ControlLines::RDY.bits();
        self.gpio.set_direction(Port::Control, dir);
    }

    /// Float RDY again; the external pull-up or the target decides its level.
    pub fn open_rdy(&mut self) {
        let dir = self.gpio.direction(Port::Control) & !ControlLines::RDY.bits();
        self.gpio.set_direction(Port::Control, dir);
    }

    /// RDY is low (active).
    pub fn rdy_asserted(&mut self) -> bool {
        self.gpio.get(Port::Control) & ControlLines::RDY.bits() == 0
    }

    /// Take the bus from the target.
    pub fn acquire(&mut self) {
        self.hold_rdy();
        self.set_line(ControlLines::BE, false);
    }

    /// Give the bus back to the target.
    pub fn release(&mut self) {
        self.set_line(ControlLines::BE, true);
        self.open_rdy();
    }

    /// Low pulse on IRQB to resume a target waiting in WAI.
    pub fn pulse_wake(&mut self) {
        self.set_line(ControlLines::IRQB, false);
        self.delay.sleep(self.wake_pulse);
        self.set_line(ControlLines::IRQB, true);
    }

    pub fn hold_reset(&mut self) {
        self.set_line(ControlLines::RESB, false);
    }

    pub fn release_reset(&mut self) {
        self.set_line(ControlLines::RESB, true);
    }

    pub fn pulse_reset(&mut self) {
        self.hold_reset();
        self.delay.sleep(self.reset_hold);
        self.release_reset();
    }

    pub fn sleep(&mut self, duration: Duration) {
        self.delay.sleep(duration);
    }

    pub fn write(&mut self, addr: u8, value: u8) -> Result<(), BusError> {
        if self.owner() != BusOwner::Controller {
            return Err(BusError::NotOwner { addr });
        }

        self.gpio.set_direction(Port::Address, 0xFF);
        self.gpio.set_direction(Port::Data, 0xFF);
        self.gpio.set(Port::Address, addr);
        self.gpio.set(Port::Data, value);

        self.set_line(ControlLines::WR, true);
        self.delay.sleep(self.strobe_hold);
        self.set_line(ControlLines::WR, false);
        self.delay.spin(self.settle_cycles);

        self.float(Port::Address);
        self.float(Port::Data);
        Ok(())
    }

    pub fn read(&mut self, addr: u8) -> Result<u8, BusError> {
        if self.owner() != BusOwner::Controller {
            return Err(BusError::NotOwner { addr });
        }

        self.gpio.set_direction(Port::Address, 0xFF);
        self.gpio.set(Port::Address, addr);

        self.set_line(ControlLines::RD, true);
        self.delay.sleep(self.strobe_hold);
        let value = self.gpio.get(Port::Data);
        self.set_line(ControlLines::RD, false);
        self.delay.spin(self.settle_cycles);

        self.float(Port::Address);
        Ok(value)
    }

    /// [`write`](Self::write), reporting a refused access with `!` on the console.
    pub fn write_or_flag<S: SerialPort>(&mut self, console: &mut Usart<S>, addr: u8, value: u8) {
        if let Err(err) = self.write(addr, value) {
            log::warn!("{err}");
            console.transmit(status::GUARD);
        }
    }

    /// [`read`](Self::read), reporting a refused access with `!` on the
    /// console and reading as 0.
    pub fn read_or_flag<S: SerialPort>(&mut self, console: &mut Usart<S>, addr: u8) -> u8 {
        match self.read(addr) {
            Ok(value) => value,
            Err(err) => {
                log::warn!("{err}");
                console.transmit(status::GUARD);
                0
            }
        }
    }
}
