//! DoD@EoC verification checksum.
use std::fmt;

/// Running 16-bit sum of every value written to the data flash in ROM mode.
///
/// The sum starts at the mass erase and is carried over the whole write
/// phase, it is never reset per record. Feeding bytes in a different order
/// than they are written to the device is a bug.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RunningChecksum(u16);

impl RunningChecksum {
    pub fn start() -> Self {
        RunningChecksum(0)
    }

    #[must_use]
    pub fn add(self, byte: u8) -> Self {
        RunningChecksum(self.0.wrapping_add(byte as u16))
    }

    #[must_use]
    pub fn extend(self, bytes: &[u8]) -> Self {
        bytes.iter().fold(self, |acc, &b| acc.add(b))
    }

    pub fn sum(&self) -> u16 {
        self.0
    }

    /// `(low, high)` as written to DoD@EoC 0x64/0x65.
    pub fn finalize(&self) -> (u8, u8) {
        let [low, high] = self.0.to_le_bytes();
        (low, high)
    }
}

/// The DoD@EoC pair in register order, `<0x64> <0x65>`.
impl fmt::Display for RunningChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (low, high) = self.finalize();
        write!(f, "{:02x} {:02x}", low, high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::commands;

    #[test]
    fn erase_seed() {
        let seed = RunningChecksum::start()
            .add(commands::MASS_ERASE)
            .extend(&commands::ERASE_TARGET);
        assert_eq!(seed.sum(), 0x016d);
        assert_eq!(seed.finalize(), (0x6d, 0x01));
    }

    #[test]
    fn wraps_at_16_bits() {
        let sum = RunningChecksum::start().extend(&[0xff; 258]);
        // 258 * 0xff = 0x100fe
        assert_eq!(sum.sum(), 0x00fe);
        assert_eq!(sum.finalize(), (0xfe, 0x00));
    }

    #[test]
    fn carries_across_records() {
        let seed = RunningChecksum::start().extend(&[0x0c, 0x83, 0xde]);
        let carried = seed.extend(&[0x01, 0x02]).extend(&[0x03, 0x04]);
        assert_eq!(carried.finalize(), (0x77, 0x01));
        assert_ne!(carried, RunningChecksum::start().extend(&[1, 2, 3, 4]));
    }

    #[test]
    fn displays_in_register_order() {
        let seed = RunningChecksum::start().extend(&[0x0c, 0x83, 0xde]);
        assert_eq!(seed.to_string(), "6d 01");
    }
}
