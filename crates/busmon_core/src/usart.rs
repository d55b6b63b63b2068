use busmon_common::hal::SerialPort;

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Blocking byte I/O on top of the raw serial registers.
pub struct Usart<S> {
    serial: S,
}

impl<S: SerialPort> Usart<S> {
    pub fn new(serial: S) -> Self {
        Self { serial }
    }

    pub fn serial(&self) -> &S {
        &self.serial
    }

    pub fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }

    /// Wait for the transmit register to drain, then send `byte`.
    pub fn transmit(&mut self, byte: u8) {
        while !self.serial.tx_ready() {
            std::hint::spin_loop();
        }
        self.serial.write(byte);
    }

    /// Wait for a received byte.
    ///
    /// Returns `None` only when the port reports a hang-up, which a physical
    /// UART never does.
    pub fn receive(&mut self) -> Option<u8> {
        loop {
            if self.serial.rx_ready() {
                return Some(self.serial.read());
            }
            if self.serial.hung_up() {
                return None;
            }
            self.serial.wait_rx();
        }
    }

    /// Take a received byte if one is waiting.
    pub fn try_receive(&mut self) -> Option<u8> {
        if self.serial.rx_ready() {
            Some(self.serial.read())
        } else {
            None
        }
    }

    pub fn send_hex1(&mut self, x: u8) {
        self.transmit(HEX[(x & 0x0F) as usize]);
    }

    pub fn send_hex2(&mut self, x: u8) {
        self.send_hex1(x >> 4);
        self.send_hex1(x);
    }

    /// Four upper-case hex digits, most significant first.
    pub fn send_hex4(&mut self, x: u16) {
        self.send_hex2((x >> 8) as u8);
        self.send_hex2(x as u8);
    }
}
