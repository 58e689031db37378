/// Default 7-bit bus address (A0 and A1 tied to GND).
pub const DEFAULT_ADDRESS: u8 = 0x40;

/// Power-on value of the configuration register, used to identify the chip after a reset.
pub const DEVICE_ID: u16 = 0x399F;

/// Writing this to [`Register::Configuration`] resets every register to its power-on value.
pub const RESET_PATTERN: u16 = 0x8000;

/// Set on the register pointer byte when selecting a register for reading.
pub const READ_FLAG: u8 = 0x80;

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    /// 16 bit, R/W
    Configuration = 0x00,
    /// 16 bit signed, RO
    ShuntVoltage = 0x01,
    /// 16 bit, RO. The two low bits are the conversion-ready and math-overflow flags.
    BusVoltage = 0x02,
    /// 16 bit, RO
    Power = 0x03,
    /// 16 bit signed, RO
    Current = 0x04,
    /// 16 bit, R/W
    Calibration = 0x05,
}

impl Register {
    pub const fn address(self) -> u8 {
        self as u8
    }
}
