//! Raw register words to physical units.

/// Volts per count of the shunt voltage register.
pub const SHUNT_VOLTAGE_LSB: f32 = 0.00001;

/// Volts per count of the (shifted) bus voltage register.
pub const BUS_VOLTAGE_LSB: f32 = 0.004;

/// Reported instead of a bus voltage when the chip flags a math overflow.
pub const BUS_VOLTAGE_OVERFLOW: f32 = -100.0;

const BUS_OVERFLOW_FLAG: u16 = 0b01;
const BUS_VOLTAGE_SHIFT: u16 = 3;

/// Two's-complement interpretation of a register word.
pub const fn to_signed16(word: u16) -> i16 {
    word as i16
}

pub fn shunt_voltage(raw: u16) -> f32 {
    f32::from(to_signed16(raw)) * SHUNT_VOLTAGE_LSB
}

/// Returns [`BUS_VOLTAGE_OVERFLOW`] when the overflow flag is set.
pub fn bus_voltage(raw: u16) -> f32 {
    if raw & BUS_OVERFLOW_FLAG != 0 {
        return BUS_VOLTAGE_OVERFLOW;
    }
    f32::from(raw >> BUS_VOLTAGE_SHIFT) * BUS_VOLTAGE_LSB
}

pub fn current(raw: u16, current_lsb: f32) -> f32 {
    f32::from(to_signed16(raw)) * current_lsb
}

pub fn power(raw: u16, current_lsb: f32) -> f32 {
    f32::from(raw) * current_lsb * crate::calibration::POWER_LSB_MULTIPLIER
}
