use std::collections::VecDeque;

use busmon_common::hal::{Gpio, Port};
use busmon_common::{ControlLines, BUS_SIZE, CMD_ARG, COMMAND};

use super::target::{TargetProgram, TargetStep};

/// Register writes seen by the simulated ports, in order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GpioEvent {
    Set(Port, u8),
    Direction(Port, u8),
}

fn index(port: Port) -> usize {
    match port {
        Port::Address => 0,
        Port::Data => 1,
        Port::Control => 2,
    }
}

struct Target {
    programs: Vec<(Vec<u8>, Box<dyn TargetProgram>)>,
    active: Option<usize>,
    /// RDY pulled low, waiting in WAI.
    requesting: bool,
    resets: u32,
    wakes: u32,
}

impl Target {
    fn reset(&mut self, memory: &mut [u8; BUS_SIZE]) {
        self.resets += 1;
        self.requesting = false;
        self.active = self
            .programs
            .iter()
            .position(|(image, _)| !image.is_empty() && memory.starts_with(image));
        match self.active {
            Some(i) => {
                log::debug!("target booted program #{i}");
                self.requesting = self.programs[i].1.start(memory) == TargetStep::Request;
            }
            None => log::warn!("target reset: no known program matches memory"),
        }
    }

    fn wake(&mut self, memory: &mut [u8; BUS_SIZE]) {
        if !self.requesting {
            // Not in WAI with interrupts masked: the pulse goes unnoticed.
            return;
        }
        self.wakes += 1;
        self.requesting = match self.active {
            Some(i) => self.programs[i].1.resume(memory) == TargetStep::Request,
            None => false,
        };
    }
}

/// Ports of the controller wired to a simulated target and its memory.
pub struct SimGpio {
    latch: [u8; 3],
    dir: [u8; 3],
    memory: [u8; BUS_SIZE],
    target: Target,
    /// Scripted RDY samples (true = low) consumed before the target's level.
    rdy_script: VecDeque<bool>,
    contention: u32,
    trace: Vec<GpioEvent>,
}

impl Default for SimGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl SimGpio {
    pub fn new() -> Self {
        Self {
            latch: [0xFF, 0xFF, 0x00],
            dir: [0x00; 3],
            memory: [0; BUS_SIZE],
            target: Target {
                programs: Vec::new(),
                active: None,
                requesting: false,
                resets: 0,
                wakes: 0,
            },
            rdy_script: VecDeque::new(),
            contention: 0,
            trace: Vec::new(),
        }
    }

    /// Boot `program` whenever the target leaves reset with `image` at the
    /// start of memory.
    pub fn with_program(mut self, image: &[u8], program: impl TargetProgram + 'static) -> Self {
        self.target.programs.push((image.to_vec(), Box::new(program)));
        self
    }

    /// Place a request in the mailbox and pull RDY low, as a target with no
    /// program attached would.
    pub fn request(&mut self, command: u8, arg: u8) {
        self.memory[COMMAND as usize] = command;
        self.memory[CMD_ARG as usize] = arg;
        self.target.requesting = true;
    }

    /// Override the next RDY samples (true = low).
    pub fn script_rdy(&mut self, samples: &[bool]) {
        self.rdy_script.extend(samples);
    }

    pub fn memory(&self) -> &[u8; BUS_SIZE] {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut [u8; BUS_SIZE] {
        &mut self.memory
    }

    pub fn requesting(&self) -> bool {
        self.target.requesting
    }

    pub fn resets(&self) -> u32 {
        self.target.resets
    }

    pub fn wakes(&self) -> u32 {
        self.target.wakes
    }

    /// Times the address or data port was driven while BE was high.
    pub fn contention(&self) -> u32 {
        self.contention
    }

    pub fn trace(&self) -> &[GpioEvent] {
        &self.trace
    }

    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }

    fn control(&self) -> ControlLines {
        ControlLines::from_bits_retain(self.latch[index(Port::Control)])
    }

    fn target_owns_bus(&self) -> bool {
        self.control().contains(ControlLines::BE)
    }

    fn check_contention(&mut self) {
        let driven = self.dir[index(Port::Address)] | self.dir[index(Port::Data)];
        if driven != 0 && self.target_owns_bus() {
            log::warn!("bus contention: controller driving pins while BE is high");
            self.contention += 1;
        }
    }

    /// Level of the pins of `port` that are inputs, before the latch of
    /// output pins is merged in.
    fn input_levels(&mut self, port: Port) -> u8 {
        match port {
            Port::Address => 0xFF,
            Port::Data => {
                let control = self.control();
                if control.contains(ControlLines::RD) && !control.contains(ControlLines::BE) {
                    let addr = self.pins(Port::Address);
                    self.memory[addr as usize]
                } else {
                    0xFF
                }
            }
            Port::Control => {
                let target_low = self
                    .rdy_script
                    .pop_front()
                    .unwrap_or(self.target.requesting);
                let mut levels = ControlLines::all();
                if target_low {
                    levels.remove(ControlLines::RDY);
                }
                levels.bits()
            }
        }
    }

    fn pins(&mut self, port: Port) -> u8 {
        let i = index(port);
        let (latch, dir) = (self.latch[i], self.dir[i]);
        (latch & dir) | (self.input_levels(port) & !dir)
    }

    fn control_changed(&mut self, old: ControlLines, new: ControlLines) {
        let fell = |line| old.contains(line) && !new.contains(line);
        let rose = |line| !old.contains(line) && new.contains(line);

        if fell(ControlLines::WR) && !new.contains(ControlLines::BE) {
            let addr = self.pins(Port::Address);
            let value = self.pins(Port::Data);
            self.memory[addr as usize] = value;
        }
        if rose(ControlLines::BE) {
            self.check_contention();
        }
        if rose(ControlLines::RESB) {
            self.target.reset(&mut self.memory);
        }
        if rose(ControlLines::IRQB) {
            self.target.wake(&mut self.memory);
        }
    }
}

impl Gpio for SimGpio {
    fn set(&mut self, port: Port, value: u8) {
        self.trace.push(GpioEvent::Set(port, value));
        let i = index(port);
        let old = self.latch[i];
        self.latch[i] = value;
        if port == Port::Control {
            self.control_changed(
                ControlLines::from_bits_retain(old),
                ControlLines::from_bits_retain(value),
            );
        } else {
            self.check_contention();
        }
    }

    fn get(&mut self, port: Port) -> u8 {
        self.pins(port)
    }

    fn latch(&self, port: Port) -> u8 {
        self.latch[index(port)]
    }

    fn set_direction(&mut self, port: Port, outputs: u8) {
        self.trace.push(GpioEvent::Direction(port, outputs));
        self.dir[index(port)] = outputs;
        self.check_contention();
    }

    fn direction(&self, port: Port) -> u8 {
        self.dir[index(port)]
    }
}
