use busmon_common::app::Firmware;
use busmon_common::hal::{Delay, Gpio, SerialPort};
use busmon_common::{status, BUS_SIZE, RESET_TARGET, RESET_VECTOR};

use crate::{BusTransport, Clock, Dispatcher, Handshake, Images, MonitorConfig, Usart};

/// Single-key commands of the host shell.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HostCommand {
    RunPrimary,
    RunSecondary,
    Time,
    MemTest,
    Dump,
    Reset,
    Wake,
}

impl HostCommand {
    pub fn from_key(key: u8) -> Option<Self> {
        match key {
            b'e' => Some(HostCommand::RunPrimary),
            b't' => Some(HostCommand::RunSecondary),
            b'c' => Some(HostCommand::Time),
            b'm' => Some(HostCommand::MemTest),
            b'd' => Some(HostCommand::Dump),
            b'r' => Some(HostCommand::Reset),
            b'i' => Some(HostCommand::Wake),
            _ => None,
        }
    }
}

/// Firmware root: owns the bus, the protocol state and the host console.
pub struct Monitor<G, D, S> {
    bus: BusTransport<G, D>,
    handshake: Handshake,
    dispatcher: Dispatcher<S>,
    images: Images,
    config: MonitorConfig,
    should_exit: bool,
}

impl<G: Gpio, D: Delay, S: SerialPort> Monitor<G, D, S> {
    pub fn new(gpio: G, delay: D, serial: S, clock: Clock, images: Images, config: MonitorConfig) -> Self {
        Self {
            bus: BusTransport::new(gpio, delay, &config),
            handshake: Handshake::new(&config),
            dispatcher: Dispatcher::new(Usart::new(serial), clock),
            images,
            config,
            should_exit: false,
        }
    }

    pub fn bus(&self) -> &BusTransport<G, D> {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut BusTransport<G, D> {
        &mut self.bus
    }

    pub fn dispatcher(&self) -> &Dispatcher<S> {
        &self.dispatcher
    }

    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn console(&mut self) -> &mut Usart<S> {
        self.dispatcher.console()
    }

    /// Prompt, read one key, echo it and run the matching command.
    pub fn shell_step(&mut self) {
        self.console().transmit(status::PROMPT);
        let Some(key) = self.console().receive() else {
            log::info!("host console closed");
            self.should_exit = true;
            return;
        };
        self.console().transmit(key);

        match HostCommand::from_key(key) {
            Some(command) => self.execute(command),
            None => log::trace!("ignored key 0x{key:02X}"),
        }
    }

    pub fn execute(&mut self, command: HostCommand) {
        log::debug!("host command {command:?}");
        match command {
            HostCommand::RunPrimary => {
                let image = self.images.primary().to_vec();
                self.load_and_run(&image);
            }
            HostCommand::RunSecondary => {
                let image = self.images.secondary().to_vec();
                self.load_and_run(&image);
            }
            HostCommand::Time => {
                let time = self.dispatcher.clock().get_time();
                let console = self.console();
                console.transmit(status::CR);
                console.send_hex4(time.high);
                console.send_hex4(time.low);
            }
            HostCommand::MemTest => {
                let mismatches = self.test_memory();
                log::info!("memory test: {mismatches} mismatches");
            }
            HostCommand::Dump => self.dump_memory(),
            HostCommand::Reset => {
                log::info!("resetting target");
                self.bus.pulse_reset();
            }
            HostCommand::Wake => self.bus.pulse_wake(),
        }
    }

    /// Copy the reset vector and `image` into target memory.
    ///
    /// The caller must own the bus.
    pub fn load(&mut self, image: &[u8]) {
        let [lo, hi] = RESET_TARGET.to_le_bytes();
        let console = self.dispatcher.console();
        self.bus.write_or_flag(console, RESET_VECTOR, lo);
        self.bus.write_or_flag(console, RESET_VECTOR + 1, hi);
        for (addr, &byte) in (0u8..=u8::MAX).zip(image) {
            self.bus.write_or_flag(console, addr, byte);
        }
    }

    /// Load `image`, start the target on it and service its requests until
    /// it sends EXIT.
    pub fn load_and_run(&mut self, image: &[u8]) {
        log::info!("loading {} byte image", image.len());
        self.bus.acquire();
        self.load(image);
        self.bus.hold_reset();
        self.bus.release();
        self.bus.sleep(self.config.reset_hold);
        self.bus.release_reset();

        self.handshake.run(&mut self.bus, &mut self.dispatcher);
        log::info!("target exited after {} requests", self.dispatcher.serviced());
    }

    /// Sixteen lines of `AAAA XX XX ...` followed by CR.
    pub fn dump_memory(&mut self) {
        let console = self.dispatcher.console();
        for row in 0..16u8 {
            console.send_hex4(u16::from(row) * 16);
            for col in 0..16u8 {
                let value = self.bus.read_or_flag(console, row * 16 + col);
                console.transmit(b' ');
                console.send_hex2(value);
            }
            console.transmit(status::CR);
        }
    }

    /// Fill/read-back patterns over the whole window, `X` per mismatch.
    /// Returns the number of mismatches.
    pub fn test_memory(&mut self) -> usize {
        let mut mismatches = 0;
        for fill in [0x00, 0xFF, 0x55, 0xAA] {
            mismatches += self.test_pattern(|_| fill);
        }
        mismatches + self.test_pattern(|addr| addr)
    }

    fn test_pattern(&mut self, pattern: impl Fn(u8) -> u8) -> usize {
        let console = self.dispatcher.console();
        for addr in 0..BUS_SIZE {
            let addr = addr as u8;
            self.bus.write_or_flag(console, addr, pattern(addr));
        }
        let mut mismatches = 0;
        for addr in 0..BUS_SIZE {
            let addr = addr as u8;
            if self.bus.read_or_flag(console, addr) != pattern(addr) {
                console.transmit(status::MISMATCH);
                mismatches += 1;
            }
        }
        mismatches
    }
}

impl<G: Gpio, D: Delay, S: SerialPort> Firmware for Monitor<G, D, S> {
    fn init(&mut self) {
        log::info!("busmon init, serial {} 8N1", self.config.baud);
        self.bus.init();
    }

    fn step(&mut self) {
        self.shell_step();
    }

    fn should_exit(&self) -> bool {
        self.should_exit
    }

    fn exit(&mut self) {
        log::info!("busmon exit");
    }

    fn title(&self) -> String {
        "busmon".to_string()
    }
}
