use std::convert;
use std::fmt;

impl fmt::Display for RWBit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            RWBit::SlaveRead => "master reads",
            RWBit::SlaveWrite => "master writes",
        })
    }
}

/// Direction bit in the LSB of the address byte, named from the slave's side.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RWBit {
    SlaveRead,
    SlaveWrite,
}

impl RWBit {
    pub fn bit(self) -> u8 {
        match self {
            RWBit::SlaveWrite => 0,
            RWBit::SlaveRead => 1,
        }
    }
}

impl convert::From<u8> for RWBit {
    fn from(value: u8) -> Self {
        match value {
            0 => RWBit::SlaveWrite,
            1 => RWBit::SlaveRead,
            other => {
                error!("Direction bit {:#x} is not 0 or 1, treating it as a read", other);
                RWBit::SlaveRead
            }
        }
    }
}

/// Splits an address byte into the 7 bit chip address and the direction bit.
pub fn split_address_and_rw(address_and_rw: u8) -> (u8, RWBit) {
    (address_and_rw >> 1, RWBit::from(address_and_rw & 0x1))
}

/// Builds the address byte sent after START.
pub fn address_byte(chip_address: u8, rw: RWBit) -> u8 {
    (chip_address << 1) | rw.bit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_address() {
        assert_eq!(split_address_and_rw(0xE0), (0x70, RWBit::SlaveWrite));
        assert_eq!(split_address_and_rw(0xE1), (0x70, RWBit::SlaveRead));
    }

    #[test]
    fn test_address_byte() {
        assert_eq!(address_byte(0x70, RWBit::SlaveWrite), 0xE0);
        assert_eq!(address_byte(0x70, RWBit::SlaveRead), 0xE1);
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(RWBit::SlaveWrite.to_string(), "master writes");
        assert_eq!(RWBit::from(1).to_string(), "master reads");
    }

    #[test]
    fn test_out_of_range_rw_value() {
        assert_eq!(RWBit::from(2), RWBit::SlaveRead);
    }
}
