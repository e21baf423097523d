//! Data flash programming logic.
//!
//! Ref: TI SLUA665. A run goes normal mode -> ROM mode -> mass erase ->
//! write -> execute and never steps back. Once the mass erase has been sent
//! the gauge has no valid data flash until the run completes, so nothing here
//! retries or can be cancelled past that point.
use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::checksum::RunningChecksum;
use crate::constants::{FUEL_GAUGE_ADDRESS, MASS_ERASE_DELAY, ROM_ADDRESS, ROM_ENTRY_DELAY};
use crate::error::{FlashError, ProtocolError, TransportError};
use crate::format::{self, WriteRecord};
use crate::protocol::{self, Command, FailureReason, ProtocolPhase};
use crate::transport::{I2cTransport, Transport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashConfig {
    /// Address of the gauge in normal mode
    pub device_address: u8,
    /// Address of the gauge in ROM mode
    pub rom_address: u8,
    pub rom_entry_delay: Duration,
    pub erase_delay: Duration,
}

impl Default for FlashConfig {
    fn default() -> Self {
        FlashConfig {
            device_address: FUEL_GAUGE_ADDRESS,
            rom_address: ROM_ADDRESS,
            rom_entry_delay: ROM_ENTRY_DELAY,
            erase_delay: MASS_ERASE_DELAY,
        }
    }
}

pub struct Flashing<T: Transport> {
    transport: T,
    config: FlashConfig,
    phase: ProtocolPhase,
    checksum: RunningChecksum,
}

impl Flashing<I2cTransport> {
    pub fn new_from_i2c(port: u8) -> Result<Self, TransportError> {
        Ok(Flashing::new(I2cTransport::open_nth(port)?))
    }
}

impl<T: Transport> Flashing<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, FlashConfig::default())
    }

    pub fn with_config(transport: T, config: FlashConfig) -> Self {
        Flashing {
            transport,
            config,
            phase: ProtocolPhase::Normal,
            checksum: RunningChecksum::start(),
        }
    }

    pub fn phase(&self) -> &ProtocolPhase {
        &self.phase
    }

    /// Checksum carried so far, seeded by the mass erase.
    pub fn checksum(&self) -> RunningChecksum {
        self.checksum
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Drive the gauge through the whole ROM mode sequence.
    pub fn flash(&mut self, records: &[WriteRecord]) -> Result<(), ProtocolError> {
        if self.phase != ProtocolPhase::Normal {
            return Err(ProtocolError::NotIdle(self.phase.clone()));
        }
        self.enter_rom_mode()?;
        self.erase_data_flash()?;
        self.write_image(records)?;
        self.execute()?;
        self.advance(ProtocolPhase::Done)
    }

    fn enter_rom_mode(&mut self) -> Result<(), ProtocolError> {
        log::info!("Putting the fuel gauge into ROM mode...");
        self.advance(ProtocolPhase::EnteringRom)?;
        let cmds =
            protocol::rom_entry_sequence(self.config.device_address, self.config.rom_entry_delay);
        self.run(&cmds)?;

        self.advance(ProtocolPhase::Rom)?;
        log::info!(
            "Fuel gauge is in ROM mode at {:#04x}",
            self.config.rom_address
        );
        Ok(())
    }

    fn erase_data_flash(&mut self) -> Result<(), ProtocolError> {
        log::info!("Starting mass erase of data flash...");
        self.advance(ProtocolPhase::Erasing)?;
        let (cmds, seed) =
            protocol::mass_erase_sequence(self.config.rom_address, self.config.erase_delay);
        self.checksum = seed;
        self.run(&cmds)?;

        log::info!("Data Flash Erased");
        Ok(())
    }

    fn write_image(&mut self, records: &[WriteRecord]) -> Result<(), ProtocolError> {
        self.advance(ProtocolPhase::Writing)?;
        log::info!("Writing {} records", records.len());

        let bar = ProgressBar::new(records.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_message("Writing");

        let rom = self.config.rom_address;
        for record in records {
            self.run(&Command::data_flash(rom, record.address(), record.data()))?;
            self.checksum = self.checksum.extend(record.data());
            bar.inc(1);
        }
        bar.finish_and_clear();

        log::debug!("DoD@EoC checksum: {}", self.checksum);
        self.run(&Command::dod_at_eoc(rom, self.checksum.finalize()))?;
        log::info!("Data Flash Written");
        Ok(())
    }

    fn execute(&mut self) -> Result<(), ProtocolError> {
        self.advance(ProtocolPhase::Executing)?;
        self.run(&protocol::execute_sequence(self.config.rom_address))?;
        log::info!("Gauge program started");
        Ok(())
    }

    /// Any bus failure moves the machine to `Failed`.
    fn run(&mut self, cmds: &[Command]) -> Result<(), ProtocolError> {
        for cmd in cmds {
            if let Err(e) = self.transport.transfer(cmd) {
                return Err(self.fail(e));
            }
        }
        Ok(())
    }

    fn advance(&mut self, next: ProtocolPhase) -> Result<(), ProtocolError> {
        if !self.phase.can_advance_to(&next) {
            return Err(ProtocolError::IllegalTransition {
                from: self.phase.clone(),
                to: next,
            });
        }
        log::debug!("phase: {:?} -> {:?}", self.phase, next);
        self.phase = next;
        Ok(())
    }

    fn fail(&mut self, source: TransportError) -> ProtocolError {
        let phase = self.phase.clone();
        let irrecoverable = phase.is_past_erase();
        self.phase = ProtocolPhase::Failed(FailureReason {
            message: source.to_string(),
            irrecoverable,
        });

        if irrecoverable {
            log::error!(
                "Flashing failed while {}, the data flash is left INCONSISTENT: {}",
                phase,
                source
            );
            ProtocolError::PostEraseFailure { phase, source }
        } else {
            log::warn!("Flashing aborted while {}, device unchanged: {}", phase, source);
            ProtocolError::PreEraseFailure { phase, source }
        }
    }
}

/// Parse `image` and flash it through `transport`.
///
/// The image is fully parsed before the first bus transaction.
pub fn flash<T: Transport>(image: &str, transport: T) -> Result<(), FlashError> {
    let records = format::parse(image)?;
    Flashing::new(transport).flash(&records)?;
    Ok(())
}

/// Flash the image at `path` to the gauge on `/dev/i2c-<port>`.
pub fn flash_file<P: AsRef<Path>>(path: P, port: u8) -> Result<(), FlashError> {
    let records = format::read_image_from_file(path)?;
    let mut flashing = Flashing::new_from_i2c(port).map_err(FlashError::TransportOpen)?;
    flashing.flash(&records)?;
    log::info!("Fuel gauge flashed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullTransport;

    impl Transport for NullTransport {
        fn write_byte(&mut self, _: u8, _: u8, _: u8) -> Result<(), TransportError> {
            Ok(())
        }

        fn write_block(&mut self, _: u8, _: u8, _: &[u8]) -> Result<(), TransportError> {
            Ok(())
        }

        fn delay(&mut self, _: Duration) {}
    }

    #[test]
    fn skipping_a_phase_is_rejected() {
        let mut flashing = Flashing::new(NullTransport);
        let err = flashing.advance(ProtocolPhase::Erasing).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::IllegalTransition {
                from: ProtocolPhase::Normal,
                to: ProtocolPhase::Erasing,
            }
        ));
        assert_eq!(flashing.phase(), &ProtocolPhase::Normal);
    }

    #[test]
    fn moving_backwards_is_rejected() {
        let mut flashing = Flashing::new(NullTransport);
        flashing.flash(&[]).unwrap();
        assert!(flashing.advance(ProtocolPhase::Writing).is_err());
        assert_eq!(flashing.phase(), &ProtocolPhase::Done);
    }
}
