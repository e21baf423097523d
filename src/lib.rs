//! bq34z100-g1 fuel gauge data flash programmer.

pub mod checksum;
pub mod constants;
pub mod error;
pub mod flashing;
pub mod format;
pub mod protocol;
pub mod transport;

pub use self::checksum::RunningChecksum;
pub use self::error::{FlashError, ParseError, ProtocolError, TransportError};
pub use self::flashing::{FlashConfig, Flashing, flash, flash_file};
pub use self::format::WriteRecord;
pub use self::protocol::{Command, ProtocolPhase};
pub use self::transport::Transport;
