//! Program images copied into target memory before a run.
//!
//! The bus window is the top page of the target's address space
//! (0xFF00-0xFFFF), so image offset 0 runs at 0xFF00, the reset vector the
//! loader installs. The mailbox sits at 0xFFF0/0xFFF1.

use busmon_common::BUS_SIZE;

use crate::ImageError;

/// W65C02: print the time once, then exit.
///
/// ```text
/// FF00  A2 FF     LDX #$FF
/// FF02  9A        TXS
/// FF03  A9 04     LDA #$04      ; PRTIME
/// FF05  8D F0 FF  STA $FFF0
/// FF08  CB        WAI
/// FF09  9C F0 FF  STZ $FFF0     ; EXIT
/// FF0C  CB        WAI
/// FF0D  DB        STP
/// ```
pub const CLOCK_IMAGE: &[u8] = &[
    0xA2, 0xFF, 0x9A, 0xA9, 0x04, 0x8D, 0xF0, 0xFF, 0xCB, 0x9C, 0xF0, 0xFF, 0xCB, 0xDB,
];

/// W65C02: echo characters until ESC, then exit.
///
/// ```text
/// FF00  A2 FF     LDX #$FF
/// FF02  9A        TXS
/// FF03  A9 01     LDA #$01      ; GETCH
/// FF05  8D F0 FF  STA $FFF0
/// FF08  CB        WAI
/// FF09  AD F1 FF  LDA $FFF1
/// FF0C  C9 1B     CMP #$1B
/// FF0E  F0 08     BEQ $FF18
/// FF10  A9 02     LDA #$02      ; PUTCH, character still in $FFF1
/// FF12  8D F0 FF  STA $FFF0
/// FF15  CB        WAI
/// FF16  80 EB     BRA $FF03
/// FF18  9C F0 FF  STZ $FFF0     ; EXIT
/// FF1B  CB        WAI
/// FF1C  DB        STP
/// ```
pub const ECHO_IMAGE: &[u8] = &[
    0xA2, 0xFF, 0x9A, 0xA9, 0x01, 0x8D, 0xF0, 0xFF, 0xCB, 0xAD, 0xF1, 0xFF, 0xC9, 0x1B, 0xF0,
    0x08, 0xA9, 0x02, 0x8D, 0xF0, 0xFF, 0xCB, 0x80, 0xEB, 0x9C, 0xF0, 0xFF, 0xCB, 0xDB,
];

/// The primary and secondary images selectable from the monitor shell.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Images {
    primary: Vec<u8>,
    secondary: Vec<u8>,
}

impl Default for Images {
    fn default() -> Self {
        Self {
            primary: CLOCK_IMAGE.to_vec(),
            secondary: ECHO_IMAGE.to_vec(),
        }
    }
}

impl Images {
    pub fn new(primary: Vec<u8>, secondary: Vec<u8>) -> Result<Self, ImageError> {
        check(&primary)?;
        check(&secondary)?;
        Ok(Self { primary, secondary })
    }

    pub fn primary(&self) -> &[u8] {
        &self.primary
    }

    pub fn secondary(&self) -> &[u8] {
        &self.secondary
    }
}

fn check(image: &[u8]) -> Result<(), ImageError> {
    if image.len() > BUS_SIZE {
        return Err(ImageError::TooLarge {
            len: image.len(),
            max: BUS_SIZE,
        });
    }
    Ok(())
}
