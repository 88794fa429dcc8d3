use crate::bit_layer::RegisterFile;

/// Vec backed register file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryRegisters {
    registers: Vec<u32>,
}

impl MemoryRegisters {
    pub fn new(registers: Vec<u32>) -> Self {
        MemoryRegisters { registers }
    }

    pub fn zeroed(count: usize) -> Self {
        MemoryRegisters::new(vec![0; count])
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.registers
    }
}

impl RegisterFile for MemoryRegisters {
    fn read(&self, register: u32) -> Option<u32> {
        self.registers.get(register as usize).cloned()
    }

    fn write(&mut self, register: u32, data: u32) -> bool {
        match self.registers.get_mut(register as usize) {
            Some(slot) => {
                *slot = data;
                true
            }
            None => false,
        }
    }
}
