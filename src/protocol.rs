//! The bus transactions of the bq34z100 ROM mode protocol.

use std::fmt;
use std::time::Duration;

use crate::checksum::RunningChecksum;
use crate::constants::{MAX_BLOCK_LEN, commands, registers};

/// A single step on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    /// SMBus write byte data.
    WriteByte { device: u8, register: u8, value: u8 },
    /// SMBus (I2C) write block data. `data` is sent as-is, 1 to 32 bytes.
    WriteBlock {
        device: u8,
        register: u8,
        data: Vec<u8>,
    },
    /// Wait for the gauge to finish internally before the next command.
    Settle(Duration),
}

/// Reverse a control word into the order the gauge expects on the wire.
///
/// TI documents control words most significant byte first, the gauge
/// takes them little endian (`0x0F00` goes out as `00 0F`). Applying it
/// twice yields the input.
pub fn swap_pair(pair: [u8; 2]) -> [u8; 2] {
    [pair[1], pair[0]]
}

impl Command {
    /// Block write of a control word to the control register.
    pub fn control_word(device: u8, word: [u8; 2]) -> Self {
        Command::WriteBlock {
            device,
            register: registers::CONTROL,
            data: swap_pair(word).to_vec(),
        }
    }

    pub fn control_byte(device: u8, opcode: u8) -> Self {
        Command::WriteByte {
            device,
            register: registers::CONTROL,
            value: opcode,
        }
    }

    /// Byte writes of a `(low, high)` pair to DoD@EoC.
    pub fn dod_at_eoc(device: u8, (low, high): (u8, u8)) -> [Self; 2] {
        [
            Command::WriteByte {
                device,
                register: registers::DOD_AT_EOC,
                value: low,
            },
            Command::WriteByte {
                device,
                register: registers::DOD_AT_EOC_HIGH,
                value: high,
            },
        ]
    }

    /// Block writes placing `data` at a 16-bit data flash address.
    ///
    /// The high address byte is the register, the low address byte leads the
    /// block. Payloads that don't fit next to the address byte are split.
    pub fn data_flash(device: u8, address: u16, data: &[u8]) -> Vec<Self> {
        data.chunks(MAX_BLOCK_LEN - 1)
            .scan(address, |addr, chunk| {
                let [high, low] = addr.to_be_bytes();
                *addr = addr.wrapping_add(chunk.len() as u16);
                let mut block = Vec::with_capacity(chunk.len() + 1);
                block.push(low);
                block.extend_from_slice(chunk);
                Some(Command::WriteBlock {
                    device,
                    register: high,
                    data: block,
                })
            })
            .collect()
    }
}

/// Commands that put a gauge in normal mode at `device` into ROM mode.
pub fn rom_entry_sequence(device: u8, settle: Duration) -> Vec<Command> {
    vec![
        Command::control_word(device, commands::ROM_ENTRY_PREAMBLE),
        Command::control_word(device, commands::ROM_ENTRY_PREAMBLE),
        Command::Settle(settle),
        Command::control_word(device, commands::ENTER_ROM),
        Command::Settle(settle),
    ]
}

/// Checksum of the mass erase command, the start of the write checksum.
pub fn erase_seed() -> RunningChecksum {
    RunningChecksum::start()
        .add(commands::MASS_ERASE)
        .extend(&commands::ERASE_TARGET)
}

/// Mass erase of the data flash and the checksum seed it leaves behind.
pub fn mass_erase_sequence(rom: u8, settle: Duration) -> (Vec<Command>, RunningChecksum) {
    let checksum = erase_seed();

    let mut cmds = vec![
        Command::control_byte(rom, commands::MASS_ERASE),
        Command::WriteBlock {
            device: rom,
            register: registers::ERASE_TARGET,
            data: commands::ERASE_TARGET.to_vec(),
        },
    ];
    cmds.extend(Command::dod_at_eoc(rom, checksum.finalize()));
    cmds.push(Command::Settle(settle));
    (cmds, checksum)
}

/// Starts the gauge firmware from ROM mode.
pub fn execute_sequence(rom: u8) -> Vec<Command> {
    let [low, high] = commands::EXECUTE_CHECKSUM;
    let mut cmds = vec![Command::control_byte(rom, commands::EXECUTE)];
    cmds.extend(Command::dod_at_eoc(rom, (low, high)));
    cmds
}

/// Why a run ended in [`ProtocolPhase::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReason {
    pub message: String,
    /// The data flash was already erased.
    pub irrecoverable: bool,
}

/// Phase of a flashing run. Only ever moves forward, or to `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolPhase {
    Normal,
    EnteringRom,
    Rom,
    Erasing,
    Writing,
    Executing,
    Done,
    Failed(FailureReason),
}

impl ProtocolPhase {
    fn ordinal(&self) -> u8 {
        match self {
            ProtocolPhase::Normal => 0,
            ProtocolPhase::EnteringRom => 1,
            ProtocolPhase::Rom => 2,
            ProtocolPhase::Erasing => 3,
            ProtocolPhase::Writing => 4,
            ProtocolPhase::Executing => 5,
            ProtocolPhase::Done => 6,
            ProtocolPhase::Failed(_) => 7,
        }
    }

    /// `true` for a transition the protocol allows.
    pub fn can_advance_to(&self, next: &ProtocolPhase) -> bool {
        match (self, next) {
            (ProtocolPhase::Done | ProtocolPhase::Failed(_), _) => false,
            (_, ProtocolPhase::Failed(_)) => true,
            _ => next.ordinal() == self.ordinal() + 1,
        }
    }

    /// Once erasing has begun a failure leaves the data flash inconsistent.
    pub fn is_past_erase(&self) -> bool {
        (ProtocolPhase::Erasing.ordinal()..=ProtocolPhase::Done.ordinal())
            .contains(&self.ordinal())
    }
}

impl fmt::Display for ProtocolPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolPhase::Normal => write!(f, "in normal mode"),
            ProtocolPhase::EnteringRom => write!(f, "entering ROM mode"),
            ProtocolPhase::Rom => write!(f, "in ROM mode"),
            ProtocolPhase::Erasing => write!(f, "erasing data flash"),
            ProtocolPhase::Writing => write!(f, "writing data flash"),
            ProtocolPhase::Executing => write!(f, "starting gauge program"),
            ProtocolPhase::Done => write!(f, "done"),
            ProtocolPhase::Failed(reason) => write!(f, "failed ({})", reason.message),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::WriteByte {
                device,
                register,
                value,
            } => write!(f, "[{:02x}] {:02x} <= {:02x}", device, register, value),
            Command::WriteBlock {
                device,
                register,
                data,
            } => write!(f, "[{:02x}] {:02x} <= {}", device, register, hex::encode(data)),
            Command::Settle(d) => write!(f, "settle {}ms", d.as_millis()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{FUEL_GAUGE_ADDRESS, ROM_ADDRESS};

    #[test]
    fn swap_is_an_involution() {
        for pair in [[0x0f, 0x00], [0xff, 0xff], [0x12, 0x34], [0x00, 0x00]] {
            assert_eq!(swap_pair(swap_pair(pair)), pair);
        }
        assert_eq!(swap_pair([0x0f, 0x00]), [0x00, 0x0f]);
    }

    #[test]
    fn control_word_goes_out_swapped() {
        assert_eq!(
            Command::control_word(FUEL_GAUGE_ADDRESS, commands::ENTER_ROM),
            Command::WriteBlock {
                device: 0x55,
                register: 0x00,
                data: vec![0x00, 0x0f],
            }
        );
    }

    #[test]
    fn mass_erase_checksum() {
        let (cmds, checksum) = mass_erase_sequence(ROM_ADDRESS, Duration::from_millis(500));
        assert_eq!(checksum.sum(), 0x016d);
        assert_eq!(cmds[0], Command::control_byte(0x0b, 0x0c));
        assert_eq!(
            &cmds[2..4],
            &[
                Command::WriteByte {
                    device: 0x0b,
                    register: 0x64,
                    value: 0x6d
                },
                Command::WriteByte {
                    device: 0x0b,
                    register: 0x65,
                    value: 0x01
                },
            ]
        );
        assert_eq!(cmds[4], Command::Settle(Duration::from_millis(500)));
    }

    #[test]
    fn data_flash_splits_long_payloads() {
        let data: Vec<u8> = (0..32).collect();
        let cmds = Command::data_flash(ROM_ADDRESS, 0x20f0, &data);
        assert_eq!(cmds.len(), 2);
        match (&cmds[0], &cmds[1]) {
            (
                Command::WriteBlock {
                    register: r0,
                    data: d0,
                    ..
                },
                Command::WriteBlock {
                    register: r1,
                    data: d1,
                    ..
                },
            ) => {
                assert_eq!((*r0, d0[0], d0.len()), (0x20, 0xf0, 32));
                assert_eq!((*r1, d1[0], &d1[1..]), (0x21, 0x0f, &[31u8][..]));
            }
            other => panic!("unexpected commands {other:?}"),
        }
    }

    #[test]
    fn phases_only_move_forward() {
        let failed = ProtocolPhase::Failed(FailureReason {
            message: "nack".into(),
            irrecoverable: false,
        });
        assert!(ProtocolPhase::Normal.can_advance_to(&ProtocolPhase::EnteringRom));
        assert!(ProtocolPhase::Erasing.can_advance_to(&ProtocolPhase::Writing));
        assert!(ProtocolPhase::Writing.can_advance_to(&failed));
        assert!(!ProtocolPhase::Writing.can_advance_to(&ProtocolPhase::Erasing));
        assert!(!ProtocolPhase::Normal.can_advance_to(&ProtocolPhase::Rom));
        assert!(!ProtocolPhase::Done.can_advance_to(&failed));
        assert!(!failed.can_advance_to(&ProtocolPhase::Normal));

        assert!(!ProtocolPhase::Rom.is_past_erase());
        assert!(ProtocolPhase::Erasing.is_past_erase());
        assert!(ProtocolPhase::Executing.is_past_erase());
    }
}
