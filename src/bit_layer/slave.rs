//! Bit-level I2C slave.

use super::config::TransferConfig;
use super::pin::{Drive, LineState, Pins};
use super::rw_bit::{split_address_and_rw, RWBit};
use super::synchronizer::BusSynchronizer;

// sentinel reaches bit 8 after eight shifts
const SENTINEL: u16 = 0x1;
const BYTE_COMPLETE: u16 = 0x100;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SlaveState {
    Wait,
    Shift,
    Ack,
    AckSettle,
    Send,
    CheckAck,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SlaveEvent {
    /// A full data word arrived for `register`.
    Write { register: u32, data: u32 },
    /// A word is about to be streamed from `register`.
    Read { register: u32 },
    /// The transfer addressed to this slave ended.
    Stop,
}

pub struct I2cSlave {
    config: TransferConfig,
    state: SlaveState,
    bus: BusSynchronizer,
    sda: Drive,

    shift: u16,
    byte_count: u8,
    rw: RWBit,
    address_acc: u32,
    register_address: u32,
    data_acc: u32,
    data_bytes: u8,

    read_data: u32,
    send_word: u32,
    send_shift: u8,
    send_bits: u8,
    byte_in_word: u8,
    master_acked: bool,

    write_enable: bool,
    write_address: u32,
    write_data: u32,
    busy: bool,
    done: bool,
}

impl I2cSlave {
    pub fn new(config: TransferConfig) -> Self {
        I2cSlave {
            config,
            state: SlaveState::Wait,
            bus: BusSynchronizer::default(),
            sda: Drive::Release,
            shift: SENTINEL,
            byte_count: 0,
            rw: RWBit::SlaveWrite,
            address_acc: 0,
            register_address: 0,
            data_acc: 0,
            data_bytes: 0,
            read_data: 0,
            send_word: 0,
            send_shift: 0,
            send_bits: 0,
            byte_in_word: 0,
            master_acked: false,
            write_enable: false,
            write_address: 0,
            write_data: 0,
            busy: false,
            done: false,
        }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn state(&self) -> SlaveState {
        self.state
    }

    /// The slave never stretches the clock, so SCL is always released.
    pub fn pins(&self) -> Pins {
        Pins {
            sda: self.sda,
            scl: Drive::Release,
        }
    }

    pub fn register_address(&self) -> u32 {
        self.register_address
    }

    /// Word returned when the master next reads from the current register.
    pub fn set_read_data(&mut self, word: u32) {
        self.read_data = word & self.config.data_mask();
    }

    pub fn write_enable(&self) -> bool {
        self.write_enable
    }

    pub fn write_address(&self) -> u32 {
        self.write_address
    }

    /// Last word captured from the master.
    pub fn write_data(&self) -> u32 {
        self.write_data
    }

    pub fn busy(&self) -> bool {
        self.busy
    }

    pub fn done(&self) -> bool {
        self.done
    }

    pub fn tick(&mut self, lines: LineState) -> Option<SlaveEvent> {
        self.bus.sample(lines.sda, lines.scl);
        self.write_enable = false;
        self.done = false;

        if self.bus.stop() {
            self.sda = Drive::Release;
            self.state = SlaveState::Wait;

            if self.busy {
                trace!("Slave {:#04x} saw stop", self.config.chip_address);
                self.end_transfer();
                return Some(SlaveEvent::Stop);
            }
            return None;
        }

        if self.bus.start() {
            trace!("Slave {:#04x} saw start", self.config.chip_address);
            self.sda = Drive::Release;
            self.state = SlaveState::Shift;
            self.shift = SENTINEL;
            self.byte_count = 0;
            self.address_acc = 0;
            self.data_acc = 0;
            self.data_bytes = 0;
            return None;
        }

        let rising = self.bus.scl.rising();
        let falling = self.bus.scl.falling();

        match self.state {
            SlaveState::Wait => None,
            SlaveState::Shift => {
                if rising {
                    self.shift = (self.shift << 1) | self.bus.sda.value() as u16;
                    None
                } else if falling && self.shift & BYTE_COMPLETE != 0 {
                    let byte = self.shift as u8;
                    self.shift = SENTINEL;
                    self.receive_byte(byte)
                } else {
                    None
                }
            }
            SlaveState::Ack => {
                if rising {
                    self.state = SlaveState::AckSettle;
                }
                None
            }
            SlaveState::AckSettle => {
                if !falling {
                    return None;
                }

                match self.rw {
                    RWBit::SlaveRead => self.send_next_byte(),
                    RWBit::SlaveWrite => {
                        self.sda = Drive::Release;
                        self.shift = SENTINEL;
                        self.state = SlaveState::Shift;
                        None
                    }
                }
            }
            SlaveState::Send => {
                if falling {
                    self.send_bits += 1;

                    if self.send_bits == 8 {
                        self.sda = Drive::Release;
                        self.master_acked = false;
                        self.state = SlaveState::CheckAck;
                    } else {
                        self.send_shift <<= 1;
                        self.drive_bit();
                    }
                }
                None
            }
            SlaveState::CheckAck => {
                if rising {
                    self.check_master_ack();
                    None
                } else if falling && self.master_acked {
                    self.send_next_byte()
                } else {
                    None
                }
            }
        }
    }

    fn receive_byte(&mut self, byte: u8) -> Option<SlaveEvent> {
        let index = self.byte_count;
        self.byte_count = self.byte_count.saturating_add(1);

        if index == 0 {
            let (address, rw) = split_address_and_rw(byte);

            if address != self.config.chip_address {
                trace!("Address {:#04x} did not match", address);
                self.sda = Drive::Release;
                self.state = SlaveState::Wait;
                if self.busy {
                    self.end_transfer();
                }
                return None;
            }

            trace!("Address matched, {}", rw);
            self.rw = rw;
            self.busy = true;
            self.byte_in_word = 0;
            self.acknowledge();
            return None;
        }

        self.acknowledge();

        if index <= self.config.address_width {
            self.address_acc = (self.address_acc << 8) | u32::from(byte);
            if index == self.config.address_width {
                self.register_address = self.address_acc & self.config.register_mask();
                trace!("Register pointer set to {:#x}", self.register_address);
            }
            return None;
        }

        self.data_acc = (self.data_acc << 8) | u32::from(byte);
        self.data_bytes += 1;
        if self.data_bytes < self.config.data_width {
            return None;
        }

        let register = self.register_address;
        let data = self.data_acc & self.config.data_mask();
        self.write_enable = true;
        self.write_address = register;
        self.write_data = data;
        self.data_acc = 0;
        self.data_bytes = 0;
        self.advance_register();

        Some(SlaveEvent::Write { register, data })
    }

    fn acknowledge(&mut self) {
        self.sda = Drive::Low;
        self.state = SlaveState::Ack;
    }

    fn send_next_byte(&mut self) -> Option<SlaveEvent> {
        let data_width = self.config.data_width;
        let event = if self.byte_in_word == 0 {
            self.send_word = self.read_data;
            Some(SlaveEvent::Read {
                register: self.register_address,
            })
        } else {
            None
        };

        let shift = 8 * u32::from(data_width - 1 - self.byte_in_word);
        self.send_shift = (self.send_word >> shift) as u8;
        self.send_bits = 0;
        self.state = SlaveState::Send;
        self.drive_bit();

        event
    }

    fn drive_bit(&mut self) {
        let bit = self.send_shift & 0x80 != 0;
        self.sda = Drive::level(bit, self.config.open_drain);
    }

    fn check_master_ack(&mut self) {
        let nack = self.bus.sda.value();

        self.byte_in_word += 1;
        if self.byte_in_word == self.config.data_width {
            self.byte_in_word = 0;
            self.advance_register();
        }

        if nack {
            trace!("Master NACK, slave {:#04x} stops sending", self.config.chip_address);
            self.state = SlaveState::Wait;
        } else {
            self.master_acked = true;
        }
    }

    fn advance_register(&mut self) {
        self.register_address = self.register_address.wrapping_add(1);
        if self.config.address_width > 0 {
            self.register_address &= self.config.register_mask();
        }
    }

    fn end_transfer(&mut self) {
        self.busy = false;
        self.done = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feeds one level pair for `ticks` ticks.
    fn hold(slave: &mut I2cSlave, sda: bool, scl: bool, ticks: usize) -> Vec<SlaveEvent> {
        (0..ticks)
            .filter_map(|_| slave.tick(LineState { sda, scl }))
            .collect()
    }

    /// Like `hold`, also counting the ticks on which `done` was raised.
    fn hold_counting_done(
        slave: &mut I2cSlave,
        sda: bool,
        scl: bool,
        ticks: usize,
    ) -> (Vec<SlaveEvent>, usize) {
        let mut events = Vec::new();
        let mut pulses = 0;
        for _ in 0..ticks {
            events.extend(slave.tick(LineState { sda, scl }));
            if slave.done() {
                pulses += 1;
            }
        }
        (events, pulses)
    }

    fn start(slave: &mut I2cSlave) {
        hold(slave, true, true, 4);
        hold(slave, false, true, 4);
        hold(slave, false, false, 4);
    }

    fn stop(slave: &mut I2cSlave) -> Vec<SlaveEvent> {
        hold(slave, false, false, 4);
        hold(slave, false, true, 4);
        hold(slave, true, true, 4)
    }

    /// Clocks out one byte and the ACK slot; returns the slave's ACK drive.
    fn send_byte(slave: &mut I2cSlave, byte: u8) -> (Drive, Vec<SlaveEvent>) {
        let mut events = Vec::new();
        for i in (0..8).rev() {
            let bit = byte >> i & 1 == 1;
            events.extend(hold(slave, bit, false, 4));
            events.extend(hold(slave, bit, true, 4));
        }
        events.extend(hold(slave, true, false, 4));
        let ack = slave.pins().sda;
        events.extend(hold(slave, !ack.is_low(), true, 4));
        events.extend(hold(slave, !ack.is_low(), false, 4));
        (ack, events)
    }

    fn slave() -> I2cSlave {
        I2cSlave::new(TransferConfig::new(0x70, 1, 2, 4).unwrap())
    }

    #[test]
    fn test_start_enters_shift() {
        let mut slave = slave();
        assert_eq!(slave.state(), SlaveState::Wait);
        start(&mut slave);
        assert_eq!(slave.state(), SlaveState::Shift);
        assert!(!slave.busy());
    }

    #[test]
    fn test_write_word() {
        let mut slave = slave();
        start(&mut slave);

        let (ack, _) = send_byte(&mut slave, 0xE0);
        assert_eq!(ack, Drive::Low);
        assert!(slave.busy());

        let (ack, _) = send_byte(&mut slave, 0x55);
        assert_eq!(ack, Drive::Low);
        assert_eq!(slave.register_address(), 0x55);

        let (_, events) = send_byte(&mut slave, 0xAA);
        assert!(events.is_empty());

        let (ack, events) = send_byte(&mut slave, 0xC3);
        assert_eq!(ack, Drive::Low);
        assert_eq!(
            events,
            vec![SlaveEvent::Write {
                register: 0x55,
                data: 0xAAC3
            }]
        );
        assert_eq!(slave.write_address(), 0x55);
        assert_eq!(slave.write_data(), 0xAAC3);
        assert_eq!(slave.register_address(), 0x56);

        hold(&mut slave, false, false, 4);
        hold(&mut slave, false, true, 4);
        let (events, pulses) = hold_counting_done(&mut slave, true, true, 4);
        assert_eq!(events, vec![SlaveEvent::Stop]);
        assert_eq!(pulses, 1);
        assert!(!slave.busy());
        assert_eq!(slave.state(), SlaveState::Wait);
    }

    #[test]
    fn test_other_address_after_repeated_start() {
        let mut slave = slave();
        start(&mut slave);
        send_byte(&mut slave, 0xE0);
        send_byte(&mut slave, 0x55);
        assert!(slave.busy());
        assert!(!slave.done());

        start(&mut slave);
        assert_eq!(slave.state(), SlaveState::Shift);
        assert!(slave.busy());

        let mut pulses = 0;
        for i in (0..8).rev() {
            let bit = 0xA0u8 >> i & 1 == 1;
            pulses += hold_counting_done(&mut slave, bit, false, 4).1;
            pulses += hold_counting_done(&mut slave, bit, true, 4).1;
        }
        let (events, ack_pulses) = hold_counting_done(&mut slave, true, false, 8);

        assert!(events.is_empty());
        assert_eq!(pulses + ack_pulses, 1);
        assert!(!slave.busy());
        assert_eq!(slave.state(), SlaveState::Wait);
        assert_eq!(slave.pins().sda, Drive::Release);

        hold(&mut slave, false, false, 4);
        hold(&mut slave, false, true, 4);
        let (events, pulses) = hold_counting_done(&mut slave, true, true, 4);
        assert!(events.is_empty());
        assert_eq!(pulses, 0);
    }

    #[test]
    fn test_other_address_is_ignored() {
        let mut slave = slave();
        start(&mut slave);

        let (ack, events) = send_byte(&mut slave, 0xA0);
        assert_eq!(ack, Drive::Release);
        assert!(events.is_empty());
        assert_eq!(slave.state(), SlaveState::Wait);

        let (ack, events) = send_byte(&mut slave, 0x12);
        assert_eq!(ack, Drive::Release);
        assert!(events.is_empty());

        assert!(stop(&mut slave).is_empty());
        assert!(!slave.busy());
    }

    #[test]
    fn test_write_enable_is_one_tick() {
        let mut slave = slave();
        start(&mut slave);
        send_byte(&mut slave, 0xE0);
        send_byte(&mut slave, 0x01);
        send_byte(&mut slave, 0x12);

        for i in (0..8).rev() {
            let bit = 0x34u8 >> i & 1 == 1;
            hold(&mut slave, bit, false, 4);
            hold(&mut slave, bit, true, 4);
        }

        let mut strobes = 0;
        for _ in 0..4 {
            slave.tick(LineState { sda: true, scl: false });
            if slave.write_enable() {
                strobes += 1;
            }
        }
        assert_eq!(strobes, 1);
        assert_eq!(slave.write_data(), 0x1234);
    }
}
