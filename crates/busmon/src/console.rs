//! Host terminal standing in for the serial line.

use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;

use anyhow::Result;

use busmon_common::hal::SerialPort;
use busmon_common::status;

/// How long a blocking receive parks between polls.
const RX_POLL: Duration = Duration::from_micros(200);

/// Serial port backed by stdin and stdout.
///
/// A reader thread feeds stdin bytes through a channel. Line feeds become CR
/// on the way in, as a serial terminal sends them, and CR becomes CR LF on the
/// way out.
pub struct StdConsole<W = io::Stdout> {
    rx: Receiver<u8>,
    pending: Option<u8>,
    closed: bool,
    out: W,
}

impl StdConsole {
    pub fn spawn() -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("stdin".to_string())
            .spawn(move || {
                for byte in io::stdin().lock().bytes() {
                    let byte = match byte {
                        Ok(b'\n') => status::CR,
                        Ok(byte) => byte,
                        Err(err) => {
                            log::error!("stdin: {err}");
                            break;
                        }
                    };
                    if tx.send(byte).is_err() {
                        break;
                    }
                }
                log::debug!("stdin closed");
            })?;
        Ok(Self::new(rx, io::stdout()))
    }
}

impl<W: Write> StdConsole<W> {
    pub fn new(rx: Receiver<u8>, out: W) -> Self {
        Self {
            rx,
            pending: None,
            closed: false,
            out,
        }
    }

    pub fn out(&self) -> &W {
        &self.out
    }
}

impl<W: Write> SerialPort for StdConsole<W> {
    fn rx_ready(&mut self) -> bool {
        if self.pending.is_none() && !self.closed {
            match self.rx.try_recv() {
                Ok(byte) => self.pending = Some(byte),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => self.closed = true,
            }
        }
        self.pending.is_some()
    }

    fn wait_rx(&mut self) {
        if self.pending.is_none() && !self.closed {
            match self.rx.recv_timeout(RX_POLL) {
                Ok(byte) => self.pending = Some(byte),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.closed = true,
            }
        }
    }

    fn read(&mut self) -> u8 {
        self.pending.take().unwrap_or(0)
    }

    fn tx_ready(&mut self) -> bool {
        true
    }

    fn write(&mut self, byte: u8) {
        let result = if byte == status::CR {
            self.out.write_all(b"\r\n")
        } else {
            self.out.write_all(&[byte])
        };
        if let Err(err) = result.and_then(|()| self.out.flush()) {
            log::warn!("stdout: {err}");
        }
    }

    fn hung_up(&self) -> bool {
        self.closed && self.pending.is_none()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use busmon_core::Usart;

    use super::*;

    #[test]
    fn rx_ready_does_not_wait() {
        let (_tx, rx) = mpsc::channel();
        let mut console = StdConsole::new(rx, Vec::<u8>::new());
        let start = Instant::now();
        for _ in 0..1000 {
            assert!(!console.rx_ready());
        }
        assert!(start.elapsed() < RX_POLL * 1000 / 2);
    }

    #[test]
    fn blocking_receive_waits_for_late_byte() {
        let (tx, rx) = mpsc::channel();
        let mut usart = Usart::new(StdConsole::new(rx, Vec::<u8>::new()));
        let sender = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            tx.send(b'q').unwrap();
        });
        assert_eq!(usart.receive(), Some(b'q'));
        sender.join().unwrap();
        // Sender dropped: the next receive reports the hang-up.
        assert_eq!(usart.receive(), None);
    }

    #[test]
    fn bytes_arrive_in_order_then_hang_up() {
        let (tx, rx) = mpsc::channel();
        let mut console = StdConsole::new(rx, Vec::<u8>::new());
        assert!(!console.rx_ready());

        tx.send(b'e').unwrap();
        tx.send(b'm').unwrap();
        drop(tx);

        assert!(console.rx_ready());
        assert_eq!(console.read(), b'e');
        assert!(console.rx_ready());
        assert_eq!(console.read(), b'm');
        assert!(!console.rx_ready());
        assert!(console.hung_up());
    }

    #[test]
    fn carriage_return_expands_on_output() {
        let (_tx, rx) = mpsc::channel();
        let mut console = StdConsole::new(rx, Vec::<u8>::new());
        for &byte in b"#c\r0001" {
            console.write(byte);
        }
        assert_eq!(console.out(), b"#c\r\n0001");
    }
}
