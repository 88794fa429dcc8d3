mod bridge;
mod config;
mod error;
mod master;
mod pin;
mod rw_bit;
mod slave;
mod synchronizer;

pub use self::bridge::{
    BridgeConfig, BridgeState, BusBridge, BRIDGE_SETTLED_DIVIDER, DEFAULT_BRIDGE_CYCLES,
    MIN_BRIDGE_CYCLES,
};
pub use self::config::{is_reserved_address, validate_address_7b, TransferConfig};
pub use self::error::Error;
pub use self::master::{I2cMaster, MasterState, Operation};
pub use self::pin::{resolve, Drive, LineState, PinType, Pins};
pub use self::rw_bit::{address_byte, split_address_and_rw, RWBit};
pub use self::slave::{I2cSlave, SlaveEvent, SlaveState};
pub use self::synchronizer::{BusSynchronizer, Synchronizer};

/// Storage behind a slave. The slave only drives the pointer and the write
/// strobe, the words themselves live here.
pub trait RegisterFile {
    /// Word at `register`, `None` if the register does not exist.
    fn read(&self, register: u32) -> Option<u32>;

    /// Stores `value`, returns false if the register does not exist.
    fn write(&mut self, register: u32, value: u32) -> bool;
}
