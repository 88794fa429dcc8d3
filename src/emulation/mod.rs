mod bus;
mod device;
mod registers;

pub use self::bus::{default_watchdog, resolve_segment, BridgedLink, Completion, Emulation, Link};
pub use self::device::Device;
pub use self::registers::MemoryRegisters;
