//! Cycle-accurate I2C protocol engine: master, slave and a two-segment bus
//! bridge, all advanced one tick at a time against resolved open-drain lines.

#[macro_use]
extern crate log;

pub mod bit_layer;
pub mod emulation;

pub use bit_layer::{
    BridgeConfig, BridgeState, BusBridge, Drive, Error, I2cMaster, I2cSlave, LineState,
    MasterState, Pins, RegisterFile, SlaveEvent, SlaveState, TransferConfig,
};
pub use emulation::{BridgedLink, Completion, Emulation, Link, MemoryRegisters};
