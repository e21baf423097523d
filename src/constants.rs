//! bq34z100-g1 ROM mode constants.
//!
//! Ref: TI SLUA665, "Updating the bq34z100-g1 Firmware at Production"
use std::time::Duration;

/// I2C address of the gauge in normal (firmware) mode.
pub const FUEL_GAUGE_ADDRESS: u8 = 0x55;
/// The gauge answers on this address once it is in ROM mode.
pub const ROM_ADDRESS: u8 = 0x0B;

/// Largest payload of a single SMBus block write.
pub const MAX_BLOCK_LEN: usize = 32;
/// Largest payload of a single image record.
pub const MAX_RECORD_LEN: usize = 32;

pub const IMAGE_EXTENSION: &str = "srec";
/// `/dev/i2c-1`
pub const DEFAULT_I2C_PORT: u8 = 1;

pub const ROM_ENTRY_DELAY: Duration = Duration::from_millis(200);
/// Physical erase time of the data flash.
pub const MASS_ERASE_DELAY: Duration = Duration::from_millis(500);

pub mod registers {
    pub const CONTROL: u8 = 0x00;
    /// RemainingCapacity 0x04/0x05, doubles as the erase target in ROM mode.
    pub const ERASE_TARGET: u8 = 0x04;
    /// DoD@EoC low byte, the high byte lives at the next register.
    pub const DOD_AT_EOC: u8 = 0x64;
    pub const DOD_AT_EOC_HIGH: u8 = 0x65;
}

pub mod commands {
    /// Control words in natural order. They go out swapped.
    pub const ROM_ENTRY_PREAMBLE: [u8; 2] = [0xff, 0xff];
    pub const ENTER_ROM: [u8; 2] = [0x0f, 0x00];

    pub const MASS_ERASE: u8 = 0x0c;
    pub const ERASE_TARGET: [u8; 2] = [0x83, 0xde];

    pub const EXECUTE: u8 = 0x0f;
    pub const EXECUTE_CHECKSUM: [u8; 2] = [0x0f, 0x00];
}
