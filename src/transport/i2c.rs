//! Linux i2c-dev Transportation.
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::io::AsRawFd;

use super::{Transport, check_block_len};
use crate::error::TransportError;

/// i2c-dev ioctls, see linux/i2c-dev.h
mod ioctl {
    const I2C_SLAVE: u16 = 0x0703;

    nix::ioctl_write_int_bad!(i2c_slave, I2C_SLAVE);
}

pub struct I2cTransport {
    file: File,
    /// Address currently bound with `I2C_SLAVE`.
    selected: Option<u8>,
}

impl I2cTransport {
    pub fn open(path: &str) -> Result<Self, TransportError> {
        log::info!("Opening I2C bus: \"{}\"", path);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| TransportError::Open {
                path: path.to_string(),
                source,
            })?;
        Ok(I2cTransport {
            file,
            selected: None,
        })
    }

    /// Opens `/dev/i2c-<port>`.
    pub fn open_nth(port: u8) -> Result<Self, TransportError> {
        Self::open(&format!("/dev/i2c-{}", port))
    }

    fn select(&mut self, device: u8) -> Result<(), TransportError> {
        if device > 0x7f {
            return Err(TransportError::InvalidAddress(device));
        }
        if self.selected == Some(device) {
            return Ok(());
        }
        // SAFETY: I2C_SLAVE takes the address by value, the fd is owned by self.file
        unsafe { ioctl::i2c_slave(self.file.as_raw_fd(), libc::c_int::from(device)) }.map_err(
            |errno| TransportError::SelectDevice {
                device,
                source: errno.into(),
            },
        )?;
        self.selected = Some(device);
        Ok(())
    }

    /// One I2C write message: register followed by the payload.
    fn send(&mut self, device: u8, register: u8, payload: &[u8]) -> Result<(), TransportError> {
        self.select(device)?;

        let mut buf = Vec::with_capacity(payload.len() + 1);
        buf.push(register);
        buf.extend_from_slice(payload);

        let written = self
            .file
            .write(&buf)
            .map_err(|source| TransportError::Write {
                device,
                register,
                source,
            })?;
        if written != buf.len() {
            return Err(TransportError::ShortWrite {
                device,
                written,
                expected: buf.len(),
            });
        }
        Ok(())
    }
}

impl Transport for I2cTransport {
    fn write_byte(&mut self, device: u8, register: u8, value: u8) -> Result<(), TransportError> {
        self.send(device, register, &[value])
    }

    fn write_block(
        &mut self,
        device: u8,
        register: u8,
        data: &[u8],
    ) -> Result<(), TransportError> {
        check_block_len(data)?;
        self.send(device, register, data)
    }
}
