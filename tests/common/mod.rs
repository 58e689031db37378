#![allow(dead_code)]

use embedded_hal::i2c::{self, ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use ina219_monitor::register::{DEVICE_ID, READ_FLAG, RESET_PATTERN};
use ina219_monitor::Register;
use std::sync::{Arc, Mutex, MutexGuard};

const REGISTER_COUNT: usize = 6;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FakeI2cError;

impl i2c::Error for FakeI2cError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
    }
}

struct FakeState {
    address: u8,
    power_on_config: u16,
    registers: [u16; REGISTER_COUNT],
    reads: [usize; REGISTER_COUNT],
    pointer: usize,
    failing: bool,
}

/// A register-level stand-in for the chip that answers any sequence of reads, so polling
/// threads can run against it without a scripted transaction list.
#[derive(Clone)]
pub struct FakeI2c {
    state: Arc<Mutex<FakeState>>,
}

impl FakeI2c {
    pub fn new() -> Self {
        Self::with_power_on_config(DEVICE_ID)
    }

    /// A chip whose configuration register reads `config` after a reset.
    pub fn with_power_on_config(config: u16) -> Self {
        let mut registers = [0; REGISTER_COUNT];
        registers[Register::Configuration as usize] = config;
        Self {
            state: Arc::new(Mutex::new(FakeState {
                address: 0x40,
                power_on_config: config,
                registers,
                reads: [0; REGISTER_COUNT],
                pointer: 0,
                failing: false,
            })),
        }
    }

    pub fn set(&self, register: Register, value: u16) {
        self.state().registers[register as usize] = value;
    }

    pub fn get(&self, register: Register) -> u16 {
        self.state().registers[register as usize]
    }

    pub fn reads(&self, register: Register) -> usize {
        self.state().reads[register as usize]
    }

    pub fn set_failing(&self, failing: bool) {
        self.state().failing = failing;
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

impl ErrorType for FakeI2c {
    type Error = FakeI2cError;
}

impl I2c for FakeI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.state();
        if state.failing || address != state.address {
            return Err(FakeI2cError);
        }

        for operation in operations {
            match operation {
                Operation::Write(bytes) => match **bytes {
                    [pointer] => {
                        let register = usize::from(pointer & !READ_FLAG);
                        if register >= REGISTER_COUNT {
                            return Err(FakeI2cError);
                        }
                        state.pointer = register;
                    }
                    [register, high, low] => {
                        let register = usize::from(register);
                        if register >= REGISTER_COUNT {
                            return Err(FakeI2cError);
                        }
                        let value = u16::from_be_bytes([high, low]);
                        let reset = value & RESET_PATTERN != 0;
                        if register == Register::Configuration as usize && reset {
                            let power_on = state.power_on_config;
                            state.registers = [0; REGISTER_COUNT];
                            state.registers[register] = power_on;
                        } else {
                            state.registers[register] = value;
                        }
                        state.pointer = register;
                    }
                    _ => return Err(FakeI2cError),
                },
                Operation::Read(buffer) => {
                    if buffer.len() != 2 {
                        return Err(FakeI2cError);
                    }
                    let pointer = state.pointer;
                    buffer.copy_from_slice(&state.registers[pointer].to_be_bytes());
                    state.reads[pointer] += 1;
                }
            }
        }
        Ok(())
    }
}
