//! Request detection and bus hand-over.
//!
//! ```text
//!            RDY low                    RDY still low
//!   Idle ─────────────> ConfirmRequest ───────────────> Servicing
//!    ▲                        │                             │
//!    └──── RDY high (glitch) ─┘                             │
//!    └──────────────── release, wake pulse ─────────────────┘
//! ```

use busmon_common::hal::{Delay, Gpio, SerialPort};
use busmon_common::COMMAND;

use crate::{BusTransport, Dispatcher, Flow, MonitorConfig};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum HandshakeState {
    /// The target owns the bus; RDY is being watched.
    #[default]
    Idle,
    /// RDY was seen low once and is re-sampled after the debounce spin.
    ConfirmRequest,
    /// Request confirmed; the next step takes the bus and dispatches.
    Servicing,
}

pub struct Handshake {
    state: HandshakeState,
    debounce_cycles: u32,
    glitches: u64,
}

impl Handshake {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            state: HandshakeState::Idle,
            debounce_cycles: config.debounce_cycles,
            glitches: 0,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// RDY pulses absorbed by the debounce re-check.
    pub fn glitches(&self) -> u64 {
        self.glitches
    }

    /// Perform one transition.
    ///
    /// Returns [`Flow::Exit`] only when a serviced EXIT command ends the
    /// command loop. On EXIT the controller keeps the bus and the target is
    /// not woken.
    pub fn step<G, D, S>(&mut self, bus: &mut BusTransport<G, D>, dispatcher: &mut Dispatcher<S>) -> Flow
    where
        G: Gpio,
        D: Delay,
        S: SerialPort,
    {
        match self.state {
            HandshakeState::Idle => {
                dispatcher.poll_input();
                if bus.rdy_asserted() {
                    self.state = HandshakeState::ConfirmRequest;
                }
                Flow::Continue
            }
            HandshakeState::ConfirmRequest => {
                bus.delay_mut().spin(self.debounce_cycles);
                if bus.rdy_asserted() {
                    self.state = HandshakeState::Servicing;
                } else {
                    log::trace!("RDY glitch ignored");
                    self.glitches += 1;
                    self.state = HandshakeState::Idle;
                }
                Flow::Continue
            }
            HandshakeState::Servicing => {
                self.state = HandshakeState::Idle;
                bus.acquire();
                let code = bus.read_or_flag(dispatcher.console(), COMMAND);
                let flow = dispatcher.dispatch(bus, code);
                if flow == Flow::Exit {
                    return flow;
                }
                bus.release();
                bus.pulse_wake();
                flow
            }
        }
    }

    /// Service requests until the target sends EXIT.
    pub fn run<G, D, S>(&mut self, bus: &mut BusTransport<G, D>, dispatcher: &mut Dispatcher<S>)
    where
        G: Gpio,
        D: Delay,
        S: SerialPort,
    {
        dispatcher.input().reset();
        self.state = HandshakeState::Idle;
        while self.step(bus, dispatcher) == Flow::Continue {}
    }
}

#[cfg(test)]
mod tests {
    use busmon_common::hal::Port;
    use busmon_common::{ControlLines, CMD_ARG};

    use super::*;
    use crate::sim::{GpioEvent, SimDelay, SimGpio, SimSerial};
    use crate::{BusOwner, Clock, Usart};

    struct Rig {
        bus: BusTransport<SimGpio, SimDelay>,
        dispatcher: Dispatcher<SimSerial>,
        handshake: Handshake,
    }

    fn rig(input: &[u8]) -> Rig {
        let config = MonitorConfig::default();
        let mut bus = BusTransport::new(SimGpio::new(), SimDelay::default(), &config);
        bus.init();
        bus.release();
        Rig {
            bus,
            dispatcher: Dispatcher::new(Usart::new(SimSerial::with_input(input)), Clock::default()),
            handshake: Handshake::new(&config),
        }
    }

    impl Rig {
        fn step(&mut self) -> Flow {
            self.handshake.step(&mut self.bus, &mut self.dispatcher)
        }

        fn output(&self) -> &[u8] {
            self.dispatcher.console_ref().serial().output()
        }
    }

    #[test]
    fn idle_without_request_stays_idle() {
        let mut rig = rig(b"");
        for _ in 0..10 {
            assert_eq!(rig.step(), Flow::Continue);
            assert_eq!(rig.handshake.state(), HandshakeState::Idle);
        }
        assert_eq!(rig.bus.owner(), BusOwner::Target);
    }

    #[test]
    fn glitch_produces_no_transfer() {
        let mut rig = rig(b"");
        rig.bus.gpio_mut().script_rdy(&[true, false]);
        rig.bus.gpio_mut().clear_trace();

        rig.step();
        assert_eq!(rig.handshake.state(), HandshakeState::ConfirmRequest);
        rig.step();
        assert_eq!(rig.handshake.state(), HandshakeState::Idle);

        assert_eq!(rig.handshake.glitches(), 1);
        assert_eq!(rig.dispatcher.serviced(), 0);
        assert_eq!(rig.bus.owner(), BusOwner::Target);
        assert!(rig.bus.gpio().trace().is_empty());
        assert!(rig.output().is_empty());
        assert_eq!(rig.bus.delay_mut().spun(), 3);
    }

    #[test]
    fn confirmed_request_is_serviced_and_target_woken() {
        let mut rig = rig(b"");
        rig.bus.gpio_mut().request(2, b'Z');

        rig.step();
        rig.step();
        assert_eq!(rig.handshake.state(), HandshakeState::Servicing);
        assert_eq!(rig.step(), Flow::Continue);

        assert_eq!(rig.handshake.state(), HandshakeState::Idle);
        assert_eq!(rig.output(), b"Z");
        assert_eq!(rig.dispatcher.serviced(), 1);
        assert_eq!(rig.bus.owner(), BusOwner::Target);
        assert_eq!(rig.bus.gpio().wakes(), 1);
        assert!(!rig.bus.gpio().requesting());
        assert_eq!(rig.bus.gpio().contention(), 0);
    }

    #[test]
    fn servicing_order_is_acquire_read_release_wake() {
        let mut rig = rig(b"");
        rig.bus.gpio_mut().request(4, 0);
        rig.step();
        rig.step();
        rig.bus.gpio_mut().clear_trace();
        rig.step();

        let control: Vec<ControlLines> = rig
            .bus
            .gpio()
            .trace()
            .iter()
            .filter_map(|event| match event {
                GpioEvent::Set(Port::Control, v) => Some(ControlLines::from_bits_retain(*v)),
                _ => None,
            })
            .collect();

        let be_low = control.iter().position(|c| !c.contains(ControlLines::BE));
        let rd = control.iter().position(|c| c.contains(ControlLines::RD));
        let be_high = control.iter().position(|c| c.contains(ControlLines::BE));
        let irq_low = control.iter().position(|c| !c.contains(ControlLines::IRQB));
        assert_eq!(be_low, Some(0));
        assert!(be_low < rd && rd < be_high && be_high < irq_low);
        assert!(control.last().unwrap().contains(ControlLines::IRQB | ControlLines::BE));
    }

    #[test]
    fn exit_keeps_bus_and_skips_wake() {
        let mut rig = rig(b"");
        rig.bus.gpio_mut().request(0, 0);
        rig.step();
        rig.step();
        assert_eq!(rig.step(), Flow::Exit);
        assert_eq!(rig.output(), [0x19]);
        assert_eq!(rig.bus.owner(), BusOwner::Controller);
        assert_eq!(rig.bus.gpio().wakes(), 0);
        assert_eq!(rig.handshake.state(), HandshakeState::Idle);
    }

    #[test]
    fn idle_drains_serial_input() {
        let mut rig = rig(b"xy");
        rig.step();
        rig.step();
        assert_eq!(rig.dispatcher.input().len(), 2);

        rig.bus.gpio_mut().request(1, 0);
        while rig.handshake.state() != HandshakeState::Servicing {
            rig.step();
        }
        rig.step();
        assert_eq!(rig.bus.gpio().memory()[CMD_ARG as usize], b'x');
        assert_eq!(rig.dispatcher.input().len(), 1);
    }

    #[test]
    fn run_stops_on_exit() {
        let mut rig = rig(b"");
        rig.bus.gpio_mut().request(0, 0);
        rig.handshake.run(&mut rig.bus, &mut rig.dispatcher);
        assert_eq!(rig.output(), [0x19]);
    }
}
