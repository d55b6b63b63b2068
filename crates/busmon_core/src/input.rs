use busmon_common::hal::SerialPort;

use crate::Usart;

/// Bytes the buffer holds before it starts dropping input.
pub const CAPACITY: usize = 255;

/// FIFO of bytes drained from the serial receiver while the controller is
/// busy watching RDY.
///
/// Cursors are `u8` and wrap around the 256-slot ring; `count` never exceeds
/// [`CAPACITY`], so the write cursor can never lap the read cursor.
pub struct InputBuffer {
    buf: [u8; 256],
    put: u8,
    get: u8,
    count: u8,
}

impl Default for InputBuffer {
    fn default() -> Self {
        Self {
            buf: [0; 256],
            put: 0,
            get: 0,
            count: 0,
        }
    }
}

impl InputBuffer {
    pub fn reset(&mut self) {
        self.put = 0;
        self.get = 0;
        self.count = 0;
    }

    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Append `byte`, or drop it when full. Returns whether it was kept.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.len() >= CAPACITY {
            log::trace!("input buffer full, dropped 0x{:02X}", byte);
            return false;
        }
        self.buf[self.put as usize] = byte;
        self.put = self.put.wrapping_add(1);
        self.count += 1;
        true
    }

    pub fn pop(&mut self) -> Option<u8> {
        if self.count == 0 {
            return None;
        }
        let byte = self.buf[self.get as usize];
        self.get = self.get.wrapping_add(1);
        self.count -= 1;
        Some(byte)
    }

    /// Drain one byte from the receiver if one is waiting.
    ///
    /// The byte is handed back to the caller whether or not there was room
    /// to queue it.
    pub fn poll<S: SerialPort>(&mut self, usart: &mut Usart<S>) -> Option<u8> {
        let byte = usart.try_receive()?;
        self.push(byte);
        Some(byte)
    }

    /// Next input byte: queued bytes first, then a blocking receive.
    pub fn getch<S: SerialPort>(&mut self, usart: &mut Usart<S>) -> Option<u8> {
        match self.pop() {
            Some(byte) => Some(byte),
            None => usart.receive(),
        }
    }
}
