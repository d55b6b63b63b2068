use std::time::Duration;

use typed_builder::TypedBuilder;

/// Timing knobs of the bus protocol.
///
/// Defaults are the values the board was tuned with at 8 MHz.
#[derive(Clone, Debug, TypedBuilder)]
pub struct MonitorConfig {
    /// Spin cycles between the two RDY samples of the request debounce.
    #[builder(default = 3)]
    pub debounce_cycles: u32,
    /// How long RD/WR stay asserted.
    #[builder(default = Duration::from_micros(1))]
    pub strobe_hold: Duration,
    /// Spin cycles after a strobe is released.
    #[builder(default = 2)]
    pub settle_cycles: u32,
    /// Width of the low pulse on IRQB.
    #[builder(default = Duration::from_micros(2))]
    pub wake_pulse: Duration,
    /// How long RESB is held low.
    #[builder(default = Duration::from_millis(100))]
    pub reset_hold: Duration,
    /// Serial line rate (8N1). Informational for host serial ports.
    #[builder(default = 38_400)]
    pub baud: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
