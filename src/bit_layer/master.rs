//! Bit-level I2C master.
//!
//! Every bit takes four quarter periods of `clock_divider` ticks. The clock
//! is low in quarters 0 and 1 and released in quarters 2 and 3. Data the
//! master drives changes in quarter 1, received bits are sampled at the end
//! of quarter 3.

use super::config::{validate_address_7b, TransferConfig};
use super::pin::{Drive, LineState, Pins};
use super::rw_bit::{address_byte, RWBit};
use super::synchronizer::BusSynchronizer;
use super::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Write,
    Read,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MasterState {
    Wait,
    StartForWrite,
    StartForRead,
    ShiftOut,
    RcvAck,
    ShiftIn,
    SendAck,
    SendNack,
    Stop,
    StopConfirm,
    /// Burst parked between calls, clock held low.
    Hold,
}

pub struct I2cMaster {
    config: TransferConfig,
    state: MasterState,
    bus: BusSynchronizer,
    pins: Pins,

    divider_count: u16,
    quarter: u8,
    bit_index: u8,

    operation: Operation,
    // START issued while the clock is already low
    restart: bool,
    read_pending: bool,
    chip_address: u8,
    tx_shift: u128,
    tx_bytes: u8,
    rx_shift: u32,
    rx_bytes: u8,

    status: u32,
    read_data: u32,
    busy: bool,
    done: bool,
    write_mode: bool,
    read_mode: bool,
}

impl I2cMaster {
    pub fn new(config: TransferConfig) -> Self {
        let high = Drive::level(true, config.open_drain);

        I2cMaster {
            config,
            state: MasterState::Wait,
            bus: BusSynchronizer::default(),
            pins: Pins { sda: high, scl: high },
            divider_count: 0,
            quarter: 0,
            bit_index: 0,
            operation: Operation::Write,
            restart: false,
            read_pending: false,
            chip_address: config.chip_address,
            tx_shift: 0,
            tx_bytes: 0,
            rx_shift: 0,
            rx_bytes: 0,
            status: 0,
            read_data: 0,
            busy: false,
            done: false,
            write_mode: false,
            read_mode: false,
        }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn state(&self) -> MasterState {
        self.state
    }

    pub fn pins(&self) -> Pins {
        self.pins
    }

    pub fn busy(&self) -> bool {
        self.busy
    }

    /// High for exactly one tick when a call completes.
    pub fn done(&self) -> bool {
        self.done
    }

    /// ACK slots of the last call, oldest in the highest bit, 1 = NACK.
    pub fn status(&self) -> u32 {
        self.status
    }

    pub fn read_data(&self) -> u32 {
        self.read_data
    }

    /// A burst is parked and may be continued or stopped.
    pub fn is_parked(&self) -> bool {
        self.state == MasterState::Hold
    }

    /// Keep write bursts open after the data bytes instead of sending STOP.
    pub fn set_write_mode(&mut self, enabled: bool) {
        self.write_mode = enabled;
    }

    /// Defer the final read ACK and keep read bursts open.
    pub fn set_read_mode(&mut self, enabled: bool) {
        self.read_mode = enabled;
    }

    pub fn write(&mut self, chip_address: u8, register_address: u32, data: u32) -> Result<(), Error> {
        self.check_idle()?;
        validate_address_7b(chip_address)?;

        let address_width = self.config.address_width;
        let data_width = self.config.data_width;
        let mut word = u128::from(address_byte(chip_address, RWBit::SlaveWrite));
        word = (word << (8 * u32::from(address_width)))
            | u128::from(register_address & self.config.register_mask());
        word = (word << (8 * u32::from(data_width))) | u128::from(data & self.config.data_mask());

        debug!(
            "Write to {:#04x}, register {:#x}, data {:#x}",
            chip_address, register_address, data
        );

        self.chip_address = chip_address;
        self.operation = Operation::Write;
        self.read_pending = false;
        self.load(word, 1 + address_width + data_width);
        self.accept();
        self.restart = false;
        self.enter(MasterState::StartForWrite);

        Ok(())
    }

    pub fn write_continue(&mut self, data: u32) -> Result<(), Error> {
        self.check_parked(Operation::Write)?;

        debug!("Continue write burst to {:#04x}, data {:#x}", self.chip_address, data);

        self.load(
            u128::from(data & self.config.data_mask()),
            self.config.data_width,
        );
        self.accept();
        self.enter(MasterState::ShiftOut);

        Ok(())
    }

    pub fn read(&mut self, chip_address: u8, register_address: u32) -> Result<(), Error> {
        self.check_idle()?;
        validate_address_7b(chip_address)?;

        debug!("Read from {:#04x}, register {:#x}", chip_address, register_address);

        let address_width = self.config.address_width;
        self.chip_address = chip_address;
        self.operation = Operation::Read;
        self.rx_shift = 0;
        self.rx_bytes = self.config.data_width;
        self.accept();
        self.restart = false;

        if address_width > 0 {
            let word = (u128::from(address_byte(chip_address, RWBit::SlaveWrite))
                << (8 * u32::from(address_width)))
                | u128::from(register_address & self.config.register_mask());
            self.load(word, 1 + address_width);
            self.read_pending = true;
            self.enter(MasterState::StartForWrite);
        } else {
            self.load(u128::from(address_byte(chip_address, RWBit::SlaveRead)), 1);
            self.read_pending = false;
            self.enter(MasterState::StartForRead);
        }

        Ok(())
    }

    pub fn read_continue(&mut self) -> Result<(), Error> {
        self.check_parked(Operation::Read)?;

        debug!("Continue read burst from {:#04x}", self.chip_address);

        self.rx_shift = 0;
        self.rx_bytes = self.config.data_width;
        self.accept();
        self.enter(MasterState::SendAck);

        Ok(())
    }

    /// Closes a parked burst. Reads NACK the deferred byte before the STOP.
    pub fn stop(&mut self) -> Result<(), Error> {
        if self.state != MasterState::Hold {
            return Err(Error::NoOpenBurst);
        }

        debug!("Close {:?} burst to {:#04x}", self.operation, self.chip_address);

        self.accept();
        match self.operation {
            Operation::Write => self.enter(MasterState::Stop),
            Operation::Read => self.enter(MasterState::SendNack),
        }

        Ok(())
    }

    pub fn tick(&mut self, lines: LineState) {
        self.bus.sample(lines.sda, lines.scl);
        self.done = false;

        match self.state {
            MasterState::Wait | MasterState::Hold => return,
            _ => {}
        }

        if self.clock_stretched() {
            return;
        }

        self.divider_count += 1;
        if self.divider_count < self.config.clock_divider {
            return;
        }
        self.divider_count = 0;

        if self.quarter == 3 {
            self.end_of_bit();
        } else {
            self.quarter += 1;
            self.apply_quarter();
        }
    }

    /// The clock was let go but some agent still holds it low.
    fn clock_stretched(&self) -> bool {
        !self.pins.scl.is_low() && !self.bus.scl.value()
    }

    fn check_idle(&self) -> Result<(), Error> {
        match self.state {
            MasterState::Wait => Ok(()),
            MasterState::Hold => Err(Error::BurstOpen),
            _ => Err(Error::Busy),
        }
    }

    fn check_parked(&self, operation: Operation) -> Result<(), Error> {
        match self.state {
            MasterState::Hold if self.operation == operation => Ok(()),
            MasterState::Hold | MasterState::Wait => Err(Error::NoOpenBurst),
            _ => Err(Error::Busy),
        }
    }

    fn accept(&mut self) {
        self.busy = true;
        self.done = false;
        self.status = 0;
    }

    fn load(&mut self, word: u128, bytes: u8) {
        self.tx_shift = word << (128 - 8 * u32::from(bytes));
        self.tx_bytes = bytes;
    }

    fn high(&self) -> Drive {
        Drive::level(true, self.config.open_drain)
    }

    fn enter(&mut self, state: MasterState) {
        trace!("Master {:?} -> {:?}", self.state, state);
        self.state = state;
        self.bit_index = 0;
        self.next_bit();
    }

    fn next_bit(&mut self) {
        self.quarter = 0;
        self.divider_count = 0;
        self.apply_quarter();
    }

    fn finish(&mut self, state: MasterState) {
        trace!("Master {:?} -> {:?}", self.state, state);
        self.state = state;
        self.busy = false;
        self.done = true;

        self.pins = match state {
            MasterState::Hold => Pins {
                sda: Drive::Release,
                scl: Drive::Low,
            },
            _ => Pins {
                sda: self.high(),
                scl: self.high(),
            },
        };

        debug!(
            "{:?} done, status {:#b}, data {:#x}",
            self.operation, self.status, self.read_data
        );
    }

    fn apply_quarter(&mut self) {
        let high = self.high();

        match (self.state, self.quarter) {
            (MasterState::StartForWrite, q) | (MasterState::StartForRead, q) => {
                match (self.restart, q) {
                    (false, 0) => {
                        self.pins.sda = high;
                        self.pins.scl = high;
                    }
                    (false, 2) => self.pins.sda = Drive::Low,
                    (true, 0) => self.pins.scl = Drive::Low,
                    (true, 1) => self.pins.sda = high,
                    (true, 2) => self.pins.scl = high,
                    (true, 3) => self.pins.sda = Drive::Low,
                    _ => {}
                }
            }
            (MasterState::ShiftOut, 1) => {
                let bit = self.tx_shift >> 127 == 1;
                self.pins.sda = Drive::level(bit, self.config.open_drain);
            }
            (MasterState::RcvAck, 0) | (MasterState::ShiftIn, 0) => {
                self.pins.scl = Drive::Low;
                self.pins.sda = Drive::Release;
            }
            (MasterState::SendAck, 1) | (MasterState::Stop, 1) => self.pins.sda = Drive::Low,
            (MasterState::SendNack, 1) => self.pins.sda = high,
            (MasterState::Stop, 3) => self.pins.sda = high,
            (MasterState::StopConfirm, _) => {
                self.pins.sda = high;
                self.pins.scl = high;
            }
            (_, 0) => self.pins.scl = Drive::Low,
            (_, 2) => self.pins.scl = high,
            _ => {}
        }
    }

    fn end_of_bit(&mut self) {
        match self.state {
            MasterState::StartForWrite | MasterState::StartForRead => {
                self.enter(MasterState::ShiftOut);
            }
            MasterState::ShiftOut => {
                self.tx_shift <<= 1;
                self.bit_index += 1;

                if self.bit_index == 8 {
                    self.tx_bytes -= 1;
                    self.enter(MasterState::RcvAck);
                } else {
                    self.next_bit();
                }
            }
            MasterState::RcvAck => {
                let nack = self.bus.sda.value();
                if nack {
                    debug!("NACK from {:#04x}", self.chip_address);
                }
                self.status = ((self.status << 1) | nack as u32) & self.config.status_mask();
                self.after_ack();
            }
            MasterState::ShiftIn => {
                self.rx_shift = (self.rx_shift << 1) | self.bus.sda.value() as u32;
                self.bit_index += 1;

                if self.bit_index < 8 {
                    self.next_bit();
                    return;
                }

                self.rx_bytes -= 1;
                if self.rx_bytes > 0 {
                    self.enter(MasterState::SendAck);
                    return;
                }

                self.read_data = self.rx_shift & self.config.data_mask();
                if self.read_mode {
                    self.finish(MasterState::Hold);
                } else {
                    self.enter(MasterState::SendNack);
                }
            }
            MasterState::SendAck => self.enter(MasterState::ShiftIn),
            MasterState::SendNack => self.enter(MasterState::Stop),
            MasterState::Stop => self.enter(MasterState::StopConfirm),
            MasterState::StopConfirm => self.finish(MasterState::Wait),
            MasterState::Wait | MasterState::Hold => {}
        }
    }

    fn after_ack(&mut self) {
        if self.tx_bytes > 0 {
            self.enter(MasterState::ShiftOut);
            return;
        }

        match self.operation {
            Operation::Write if self.write_mode => self.finish(MasterState::Hold),
            Operation::Write => self.enter(MasterState::Stop),
            Operation::Read if self.read_pending => {
                self.read_pending = false;
                self.load(u128::from(address_byte(self.chip_address, RWBit::SlaveRead)), 1);
                self.restart = true;
                self.enter(MasterState::StartForRead);
            }
            Operation::Read => self.enter(MasterState::ShiftIn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn master(divider: u16) -> I2cMaster {
        I2cMaster::new(TransferConfig::new(0x70, 1, 2, divider).unwrap())
    }

    fn idle_bus(master: &mut I2cMaster, ticks: usize) {
        for _ in 0..ticks {
            let lines = LineState {
                sda: !master.pins().sda.is_low(),
                scl: !master.pins().scl.is_low(),
            };
            master.tick(lines);
        }
    }

    #[test]
    fn test_idle_releases_lines() {
        let master = master(4);
        assert_eq!(master.pins().sda, Drive::Release);
        assert_eq!(master.pins().scl, Drive::Release);
        assert!(!master.busy());
    }

    #[test]
    fn test_request_while_busy() {
        let mut master = master(4);
        master.write(0x70, 0x55, 0xAAC3).unwrap();
        assert!(master.busy());
        assert_eq!(master.write(0x70, 0x55, 0), Err(Error::Busy));
        assert_eq!(master.read(0x70, 0x55), Err(Error::Busy));
        assert_eq!(master.read_continue(), Err(Error::Busy));
    }

    #[test]
    fn test_continue_without_burst() {
        let mut master = master(4);
        assert_eq!(master.write_continue(1), Err(Error::NoOpenBurst));
        assert_eq!(master.read_continue(), Err(Error::NoOpenBurst));
        assert_eq!(master.stop(), Err(Error::NoOpenBurst));
    }

    #[test]
    fn test_rejects_wide_chip_address() {
        let mut master = master(4);
        assert_eq!(master.write(0x80, 0, 0), Err(Error::InvalidChipAddress(0x80)));
        assert!(!master.busy());
    }

    #[test]
    fn test_start_condition_from_idle() {
        let mut master = master(4);
        master.write(0x70, 0x55, 0xAAC3).unwrap();
        assert_eq!(master.state(), MasterState::StartForWrite);

        // quarters 0 and 1 keep both lines high
        idle_bus(&mut master, 7);
        assert_eq!(master.pins().sda, Drive::Release);

        // quarter 2 pulls data low with the clock still released
        idle_bus(&mut master, 1);
        assert_eq!(master.pins().sda, Drive::Low);
        assert_eq!(master.pins().scl, Drive::Release);

        idle_bus(&mut master, 8);
        assert_eq!(master.state(), MasterState::ShiftOut);
        assert_eq!(master.pins().scl, Drive::Low);
    }

    #[test]
    fn test_unanswered_write_reports_nacks() {
        let mut master = master(4);
        master.write(0x70, 0x55, 0xAAC3).unwrap();

        let mut ticks = 0;
        while !master.done() {
            idle_bus(&mut master, 1);
            ticks += 1;
            assert!(ticks < 10_000, "write never completed");
        }

        assert!(!master.busy());
        assert_eq!(master.status(), 0b1111);
        assert_eq!(master.state(), MasterState::Wait);

        idle_bus(&mut master, 1);
        assert!(!master.done());
    }

    #[test]
    fn test_write_mode_parks_burst() {
        let mut master = master(4);
        master.set_write_mode(true);
        master.write(0x70, 0x10, 0x1234).unwrap();

        while !master.done() {
            idle_bus(&mut master, 1);
        }

        assert!(master.is_parked());
        assert_eq!(master.pins().scl, Drive::Low);
        assert_eq!(master.write(0x70, 0x10, 0), Err(Error::BurstOpen));
        assert_eq!(master.read_continue(), Err(Error::NoOpenBurst));

        master.stop().unwrap();
        while !master.done() {
            idle_bus(&mut master, 1);
        }
        assert_eq!(master.state(), MasterState::Wait);
    }

    #[test]
    fn test_driven_mode_drives_high() {
        let config = TransferConfig::new(0x70, 1, 1, 4).unwrap().with_open_drain(false);
        let master = I2cMaster::new(config);
        assert_eq!(master.pins().sda, Drive::High);
        assert_eq!(master.pins().scl, Drive::High);
    }
}
