//! Abstract I2C transport interface.
use std::time::Duration;

use crate::constants::MAX_BLOCK_LEN;
use crate::error::TransportError;
use crate::protocol::Command;

pub use self::i2c::I2cTransport;

mod i2c;

/// Abstraction of the bus the gauge hangs off.
/// Might be Linux i2c-dev, a USB-I2C bridge, or a recording fake.
pub trait Transport {
    fn write_byte(&mut self, device: u8, register: u8, value: u8) -> Result<(), TransportError>;
    fn write_block(&mut self, device: u8, register: u8, data: &[u8])
    -> Result<(), TransportError>;

    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn transfer(&mut self, cmd: &Command) -> Result<(), TransportError> {
        log::debug!("=> {}", cmd);
        match cmd {
            Command::WriteByte {
                device,
                register,
                value,
            } => self.write_byte(*device, *register, *value),
            Command::WriteBlock {
                device,
                register,
                data,
            } => {
                check_block_len(data)?;
                self.write_block(*device, *register, data)
            }
            Command::Settle(duration) => {
                self.delay(*duration);
                Ok(())
            }
        }
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write_byte(&mut self, device: u8, register: u8, value: u8) -> Result<(), TransportError> {
        (**self).write_byte(device, register, value)
    }

    fn write_block(
        &mut self,
        device: u8,
        register: u8,
        data: &[u8],
    ) -> Result<(), TransportError> {
        (**self).write_block(device, register, data)
    }

    fn delay(&mut self, duration: Duration) {
        (**self).delay(duration)
    }
}

pub(crate) fn check_block_len(data: &[u8]) -> Result<(), TransportError> {
    if data.is_empty() || data.len() > MAX_BLOCK_LEN {
        return Err(TransportError::BlockLength(data.len()));
    }
    Ok(())
}
