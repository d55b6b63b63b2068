pub mod clock;
mod config;
pub mod dispatch;
mod error;
pub mod handshake;
pub mod images;
pub mod input;
mod monitor;
pub mod sim;
pub mod transport;
pub mod usart;

pub use clock::{Clock, TimeStamp, TimerCounter, TimerTick};
pub use config::MonitorConfig;
pub use dispatch::{Command, Dispatcher};
pub use error::{BusError, ImageError};
pub use handshake::{Handshake, HandshakeState};
pub use images::Images;
pub use input::InputBuffer;
pub use monitor::{HostCommand, Monitor};
pub use transport::{BusOwner, BusTransport};
pub use usart::Usart;

pub use busmon_common::{CMD_ARG, COMMAND};

/// What the command loop does after a serviced request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Counter rate of the hardware timer: 8 MHz system clock, prescaler 8.
pub const TIMER_HZ: u32 = 1_000_000;
