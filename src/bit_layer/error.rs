use std::{error, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Chip address does not fit in 7 bits.
    InvalidChipAddress(u8),
    /// Register address or data width outside the supported byte range.
    InvalidWidth { address_width: u8, data_width: u8 },
    /// Quarter-bit divider must fit the 12 bit counter and be non-zero.
    InvalidClockDivider(u16),
    /// Bridge timeout too short to outlast its own forwarded edge.
    InvalidBridgeTimeout(u16),
    /// Master clock too fast for its bits to cross the bridge.
    InvalidBridgedDivider {
        clock_divider: u16,
        min_clock_divider: u16,
    },
    /// A request arrived while a transaction was still running.
    Busy,
    /// A new transaction was requested while a burst is parked on the bus.
    BurstOpen,
    /// A continue or stop was requested without a parked burst of that kind.
    NoOpenBurst,
    /// The watchdog expired before the engine went idle.
    BusStuck { ticks: u64 },
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::InvalidChipAddress(address) => {
                write!(f, "Chip address {:#04x} does not fit in 7 bits", address)
            }
            Error::InvalidWidth { address_width, data_width } => write!(
                f,
                "Unsupported widths: {} address byte(s), {} data byte(s)",
                address_width, data_width
            ),
            Error::InvalidClockDivider(divider) => {
                write!(f, "Clock divider {} outside 1..=4095", divider)
            }
            Error::InvalidBridgeTimeout(cycles) => {
                write!(f, "Bridge timeout of {} ticks is too short", cycles)
            }
            Error::InvalidBridgedDivider {
                clock_divider,
                min_clock_divider,
            } => write!(
                f,
                "Clock divider {} is too fast for the bridge, needs at least {}",
                clock_divider, min_clock_divider
            ),
            Error::Busy => f.write_str("Engine is busy"),
            Error::BurstOpen => f.write_str("A burst is still open on the bus"),
            Error::NoOpenBurst => f.write_str("No open burst to continue"),
            Error::BusStuck { ticks } => write!(f, "Bus did not go idle within {} ticks", ticks),
        }
    }
}
