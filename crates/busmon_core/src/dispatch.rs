use busmon_common::hal::{Delay, Gpio, SerialPort};
use busmon_common::{status, CMD_ARG};

use crate::{BusTransport, Clock, Flow, InputBuffer, Usart};

/// Command codes the target may leave in the command register.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Command {
    Exit = 0,
    Getch = 1,
    Putch = 2,
    GetTime = 3,
    PrTime = 4,
}

impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Command::Exit),
            1 => Ok(Command::Getch),
            2 => Ok(Command::Putch),
            3 => Ok(Command::GetTime),
            4 => Ok(Command::PrTime),
            other => Err(other),
        }
    }
}

/// Executes one command per service window.
///
/// Owns the host console together with the input buffer and the clock the
/// commands need. It never takes or releases the bus itself.
pub struct Dispatcher<S> {
    console: Usart<S>,
    input: InputBuffer,
    clock: Clock,
    serviced: u64,
}

impl<S: SerialPort> Dispatcher<S> {
    pub fn new(console: Usart<S>, clock: Clock) -> Self {
        Self {
            console,
            input: InputBuffer::default(),
            clock,
            serviced: 0,
        }
    }

    pub fn console(&mut self) -> &mut Usart<S> {
        &mut self.console
    }

    pub fn console_ref(&self) -> &Usart<S> {
        &self.console
    }

    pub fn input(&mut self) -> &mut InputBuffer {
        &mut self.input
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Commands dispatched so far, unknown codes included.
    pub fn serviced(&self) -> u64 {
        self.serviced
    }

    /// Move a waiting serial byte into the input buffer.
    pub fn poll_input(&mut self) -> Option<u8> {
        self.input.poll(&mut self.console)
    }

    pub fn dispatch<G: Gpio, D: Delay>(&mut self, bus: &mut BusTransport<G, D>, code: u8) -> Flow {
        self.serviced += 1;
        let command = match Command::try_from(code) {
            Ok(command) => command,
            Err(code) => {
                log::debug!("unknown command 0x{code:02X}");
                self.console.transmit(status::UNKNOWN);
                return Flow::Continue;
            }
        };
        log::debug!("dispatch {command:?}");

        match command {
            Command::Exit => {
                self.console.transmit(status::EXIT_ACK);
                return Flow::Exit;
            }
            Command::Getch => match self.input.getch(&mut self.console) {
                Some(c) => bus.write_or_flag(&mut self.console, CMD_ARG, c),
                None => {
                    log::info!("serial link closed while the target waits for input");
                    return Flow::Exit;
                }
            },
            Command::Putch => {
                let c = bus.read_or_flag(&mut self.console, CMD_ARG);
                self.console.transmit(c);
            }
            Command::GetTime => {
                let time = self.clock.get_time();
                for (offset, byte) in (0u8..).zip(time.to_le_bytes()) {
                    bus.write_or_flag(&mut self.console, CMD_ARG + offset, byte);
                }
            }
            Command::PrTime => {
                let time = self.clock.get_time();
                self.console.send_hex4(time.high);
                self.console.send_hex4(time.low);
                self.console.transmit(status::CR);
            }
        }
        Flow::Continue
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sim::{SimDelay, SimGpio, SimSerial};
    use crate::{MonitorConfig, TimeStamp, TimerCounter};

    struct Rig {
        bus: BusTransport<SimGpio, SimDelay>,
        dispatcher: Dispatcher<SimSerial>,
    }

    fn rig(input: &[u8], time: TimeStamp) -> Rig {
        let mut bus = BusTransport::new(SimGpio::new(), SimDelay::default(), &MonitorConfig::default());
        bus.init();
        bus.acquire();
        let clock = Clock::new(Arc::new(TimerCounter::starting_at(time)));
        let dispatcher = Dispatcher::new(Usart::new(SimSerial::with_input(input)), clock);
        Rig { bus, dispatcher }
    }

    impl Rig {
        fn output(&self) -> &[u8] {
            self.dispatcher.console_ref().serial().output()
        }
    }

    #[test]
    fn command_codes() {
        assert_eq!(Command::try_from(0), Ok(Command::Exit));
        assert_eq!(Command::try_from(4), Ok(Command::PrTime));
        assert_eq!(Command::try_from(5), Err(5));
        assert_eq!(Command::GetTime as u8, 3);
    }

    #[test]
    fn exit_acknowledges_and_stops() {
        let mut rig = rig(b"", TimeStamp::default());
        assert_eq!(rig.dispatcher.dispatch(&mut rig.bus, 0), Flow::Exit);
        assert_eq!(rig.output(), [0x19]);
    }

    #[test]
    fn getch_uses_buffered_byte() {
        let mut rig = rig(b"A", TimeStamp::default());
        assert_eq!(rig.dispatcher.poll_input(), Some(0x41));
        assert_eq!(rig.dispatcher.input().len(), 1);

        assert_eq!(rig.dispatcher.dispatch(&mut rig.bus, 1), Flow::Continue);
        assert_eq!(rig.bus.gpio().memory()[CMD_ARG as usize], 0x41);
        assert!(rig.dispatcher.input().is_empty());
        assert!(rig.output().is_empty());
    }

    #[test]
    fn getch_on_closed_link_ends_loop() {
        let mut rig = rig(b"", TimeStamp::default());
        rig.dispatcher.console().serial_mut().hang_up();
        assert_eq!(rig.dispatcher.dispatch(&mut rig.bus, 1), Flow::Exit);
    }

    #[test]
    fn putch_transmits_argument() {
        let mut rig = rig(b"", TimeStamp::default());
        rig.bus.gpio_mut().memory_mut()[CMD_ARG as usize] = b'k';
        assert_eq!(rig.dispatcher.dispatch(&mut rig.bus, 2), Flow::Continue);
        assert_eq!(rig.output(), b"k");
    }

    #[test]
    fn gettime_writes_four_bytes() {
        let mut rig = rig(b"", TimeStamp::new(0xA1B2, 0xC3D4));
        rig.dispatcher.dispatch(&mut rig.bus, 3);
        let arg = CMD_ARG as usize;
        assert_eq!(rig.bus.gpio().memory()[arg..arg + 4], [0xD4, 0xC3, 0xB2, 0xA1]);
        assert!(rig.output().is_empty());
    }

    #[test]
    fn prtime_prints_high_then_low() {
        let mut rig = rig(b"", TimeStamp::new(0x0001, 0x1234));
        rig.dispatcher.dispatch(&mut rig.bus, 4);
        assert_eq!(rig.output(), b"00011234\r");
    }

    #[test]
    fn unknown_code_prints_question_mark_only() {
        let mut rig = rig(b"", TimeStamp::default());
        rig.bus.gpio_mut().clear_trace();
        let before = *rig.bus.gpio().memory();

        assert_eq!(rig.dispatcher.dispatch(&mut rig.bus, 99), Flow::Continue);
        assert_eq!(rig.output(), b"?");
        assert!(rig.bus.gpio().trace().is_empty());
        assert_eq!(*rig.bus.gpio().memory(), before);
        assert_eq!(rig.dispatcher.serviced(), 1);
    }

    #[test]
    fn arguments_without_ownership_are_flagged() {
        let mut rig = rig(b"", TimeStamp::default());
        rig.bus.release();
        rig.dispatcher.dispatch(&mut rig.bus, 2);
        // PUTCH reads 0 and still transmits it.
        assert_eq!(rig.output(), b"!\0");
    }
}
