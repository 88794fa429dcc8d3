use super::Error;

pub const MAX_ADDRESS_WIDTH: u8 = 4;
pub const MAX_DATA_WIDTH: u8 = 4;
pub const MAX_CLOCK_DIVIDER: u16 = 0x0FFF;

/// Per-engine transfer parameters, fixed when the engine is built.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TransferConfig {
    /// Register address bytes following the chip address byte.
    pub address_width: u8,
    /// Bytes per data word.
    pub data_width: u8,
    /// Own address for a slave; default target for the master.
    pub chip_address: u8,
    /// Release lines for a high level instead of driving them.
    pub open_drain: bool,
    /// Quarter-bit period in local ticks.
    pub clock_divider: u16,
}

impl TransferConfig {
    pub fn new(
        chip_address: u8,
        address_width: u8,
        data_width: u8,
        clock_divider: u16,
    ) -> Result<Self, Error> {
        validate_address_7b(chip_address)?;

        if address_width > MAX_ADDRESS_WIDTH || data_width == 0 || data_width > MAX_DATA_WIDTH {
            return Err(Error::InvalidWidth {
                address_width,
                data_width,
            });
        }

        if clock_divider == 0 || clock_divider > MAX_CLOCK_DIVIDER {
            return Err(Error::InvalidClockDivider(clock_divider));
        }

        Ok(TransferConfig {
            address_width,
            data_width,
            chip_address,
            open_drain: true,
            clock_divider,
        })
    }

    pub fn with_open_drain(mut self, open_drain: bool) -> Self {
        self.open_drain = open_drain;
        self
    }

    /// Bits in the status word: one per address and data byte plus the chip
    /// address byte.
    pub fn status_width(&self) -> u32 {
        u32::from(self.address_width) + u32::from(self.data_width) + 1
    }

    pub fn status_mask(&self) -> u32 {
        (1 << self.status_width()) - 1
    }

    pub fn data_mask(&self) -> u32 {
        mask_bytes(self.data_width)
    }

    pub fn register_mask(&self) -> u32 {
        mask_bytes(self.address_width)
    }
}

fn mask_bytes(bytes: u8) -> u32 {
    match bytes {
        0 => 0,
        4 => u32::max_value(),
        n => (1 << (8 * u32::from(n))) - 1,
    }
}

/// Addresses the I2C bus reserves for special purposes.
pub fn is_reserved_address(address: u8) -> bool {
    match address {
        0x00..=0x07 | 0x78..=0x7F => true,
        _ => false,
    }
}

/// Rejects addresses wider than 7 bits and warns on reserved ones.
pub fn validate_address_7b(address: u8) -> Result<(), Error> {
    if address > 0x7F {
        return Err(Error::InvalidChipAddress(address));
    }

    if is_reserved_address(address) {
        warn!("Chip address {:#04x} is reserved", address);
    }

    Ok(())
}
