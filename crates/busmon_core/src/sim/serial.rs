use std::collections::VecDeque;

use busmon_common::hal::SerialPort;

/// Serial line with a queued receive side and a captured transmit side.
#[derive(Debug, Default)]
pub struct SimSerial {
    input: VecDeque<u8>,
    output: Vec<u8>,
    hung_up: bool,
}

impl SimSerial {
    pub fn with_input(bytes: &[u8]) -> Self {
        Self {
            input: bytes.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// No more input will be pushed.
    pub fn hang_up(&mut self) {
        self.hung_up = true;
    }
}

impl SerialPort for SimSerial {
    fn rx_ready(&mut self) -> bool {
        !self.input.is_empty()
    }

    fn read(&mut self) -> u8 {
        self.input.pop_front().unwrap_or(0)
    }

    fn tx_ready(&mut self) -> bool {
        true
    }

    fn write(&mut self, byte: u8) {
        self.output.push(byte);
    }

    fn hung_up(&self) -> bool {
        self.hung_up
    }
}
