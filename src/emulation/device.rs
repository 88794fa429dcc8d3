use crate::bit_layer::{I2cSlave, LineState, Pins, RegisterFile, SlaveEvent, TransferConfig};

/// A slave wired to the register file it serves.
pub struct Device<R>
where
    R: RegisterFile,
{
    slave: I2cSlave,
    registers: R,
    rejected: u64,
}

impl<R> Device<R>
where
    R: RegisterFile,
{
    pub fn new(config: TransferConfig, registers: R) -> Self {
        let mut device = Device {
            slave: I2cSlave::new(config),
            registers,
            rejected: 0,
        };
        device.refresh_read_data();
        device
    }

    pub fn slave(&self) -> &I2cSlave {
        &self.slave
    }

    pub fn registers(&self) -> &R {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut R {
        &mut self.registers
    }

    /// Writes the register file refused.
    pub fn rejected_writes(&self) -> u64 {
        self.rejected
    }

    pub fn pins(&self) -> Pins {
        self.slave.pins()
    }

    pub fn tick(&mut self, lines: LineState) -> Option<SlaveEvent> {
        let event = self.slave.tick(lines);

        if let Some(SlaveEvent::Write { register, data }) = event {
            trace!("Register {:#x} <- {:#x}", register, data);
            if !self.registers.write(register, data) {
                warn!("Register {:#x} does not exist, dropped {:#x}", register, data);
                self.rejected += 1;
            }
        }

        self.refresh_read_data();
        event
    }

    // unmapped registers read back as an idle bus
    fn refresh_read_data(&mut self) {
        let register = self.slave.register_address();
        let word = self.registers.read(register).unwrap_or(u32::max_value());
        self.slave.set_read_data(word);
    }
}
