use thiserror::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum BusError {
    /// The target still owns the bus (BE is high).
    #[error("bus access at 0x{addr:02X} without ownership")]
    NotOwner { addr: u8 },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum ImageError {
    #[error("image is {len} bytes, the bus window holds {max}")]
    TooLarge { len: usize, max: usize },
}
