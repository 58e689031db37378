//! Configuration register fields and the init-time configuration.
//!
//! Every field of the configuration register is a small enum whose discriminant is the bit
//! pattern the chip expects. The logical values accepted by the numeric setters (volts,
//! millivolts, resolution/averaging codes, mode numbers) are mapped through static tables, so an
//! unsupported value never reaches the register.
//!
//! ```text
//!  15  | 14 | 13  | 12 11 | 10  9  8  7 | 6  5  4  3 | 2  1  0
//!  RST | -  | BRNG| PG    | BADC        | SADC       | MODE
//! ```

use crate::register::DEFAULT_ADDRESS;

/// Placement of one field inside the configuration register.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct Field {
    pub(crate) name: &'static str,
    shift: u8,
    mask: u16,
}

impl Field {
    pub(crate) const BUS_VOLTAGE_RANGE: Field = Field::new("bus voltage range", 13, 0b1);
    pub(crate) const GAIN: Field = Field::new("gain", 11, 0b11);
    pub(crate) const BUS_ADC: Field = Field::new("bus ADC", 7, 0b1111);
    pub(crate) const SHUNT_ADC: Field = Field::new("shunt ADC", 3, 0b1111);
    pub(crate) const MODE: Field = Field::new("mode", 0, 0b111);

    const fn new(name: &'static str, shift: u8, mask: u16) -> Self {
        Self { name, shift, mask }
    }

    /// The bits this field occupies in the register.
    pub(crate) const fn register_mask(self) -> u16 {
        self.mask << self.shift
    }

    /// Replaces this field in `reg` with `bits`, leaving every other bit untouched.
    pub(crate) const fn apply(self, reg: u16, bits: u16) -> u16 {
        (reg & !self.register_mask()) | ((bits & self.mask) << self.shift)
    }

    pub(crate) const fn extract(self, reg: u16) -> u16 {
        (reg >> self.shift) & self.mask
    }
}

fn lookup<T: Copy>(table: &[(u16, T)], value: u16) -> Option<T> {
    table
        .iter()
        .find(|(logical, _)| *logical == value)
        .map(|(_, field)| *field)
}

/// Bus voltage full-scale range.
#[repr(u16)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BusVoltageRange {
    V16 = 0,
    #[default]
    V32 = 1,
}

impl BusVoltageRange {
    const TABLE: [(u16, Self); 2] = [(16, Self::V16), (32, Self::V32)];

    /// Full-scale range in volts.
    pub const fn volts(self) -> u16 {
        match self {
            Self::V16 => 16,
            Self::V32 => 32,
        }
    }

    pub(crate) const fn bits(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for BusVoltageRange {
    type Error = u16;

    fn try_from(volts: u16) -> Result<Self, Self::Error> {
        lookup(&Self::TABLE, volts).ok_or(volts)
    }
}

/// PGA gain, expressed as the shunt voltage full-scale window.
#[repr(u16)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Gain {
    /// ±40 mV, gain 1
    Mv40 = 0,
    /// ±80 mV, gain /2
    Mv80 = 1,
    /// ±160 mV, gain /4
    Mv160 = 2,
    /// ±320 mV, gain /8
    #[default]
    Mv320 = 3,
}

impl Gain {
    const TABLE: [(u16, Self); 4] = [
        (40, Self::Mv40),
        (80, Self::Mv80),
        (160, Self::Mv160),
        (320, Self::Mv320),
    ];

    /// Full-scale shunt voltage in millivolts.
    pub const fn millivolts(self) -> u16 {
        match self {
            Self::Mv40 => 40,
            Self::Mv80 => 80,
            Self::Mv160 => 160,
            Self::Mv320 => 320,
        }
    }

    pub(crate) const fn bits(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for Gain {
    type Error = u16;

    fn try_from(millivolts: u16) -> Result<Self, Self::Error> {
        lookup(&Self::TABLE, millivolts).ok_or(millivolts)
    }
}

/// ADC resolution or sample averaging, shared by the bus and shunt converters.
///
/// The logical code is the bit depth for single samples (9..=12) and the sample count for
/// averaged 12-bit conversions (2..=128).
#[repr(u16)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Adc {
    Res9Bit = 0b0000,
    Res10Bit = 0b0001,
    Res11Bit = 0b0010,
    #[default]
    Res12Bit = 0b0011,
    Avg2 = 0b1001,
    Avg4 = 0b1010,
    Avg8 = 0b1011,
    Avg16 = 0b1100,
    Avg32 = 0b1101,
    Avg64 = 0b1110,
    Avg128 = 0b1111,
}

impl Adc {
    const TABLE: [(u16, Self); 11] = [
        (9, Self::Res9Bit),
        (10, Self::Res10Bit),
        (11, Self::Res11Bit),
        (12, Self::Res12Bit),
        (2, Self::Avg2),
        (4, Self::Avg4),
        (8, Self::Avg8),
        (16, Self::Avg16),
        (32, Self::Avg32),
        (64, Self::Avg64),
        (128, Self::Avg128),
    ];

    /// The logical resolution/averaging code.
    pub const fn code(self) -> u16 {
        match self {
            Self::Res9Bit => 9,
            Self::Res10Bit => 10,
            Self::Res11Bit => 11,
            Self::Res12Bit => 12,
            Self::Avg2 => 2,
            Self::Avg4 => 4,
            Self::Avg8 => 8,
            Self::Avg16 => 16,
            Self::Avg32 => 32,
            Self::Avg64 => 64,
            Self::Avg128 => 128,
        }
    }

    pub(crate) const fn bits(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for Adc {
    type Error = u16;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        lookup(&Self::TABLE, code).ok_or(code)
    }
}

/// Operating mode.
#[repr(u16)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    PowerDown = 0,
    ShuntTriggered = 1,
    BusTriggered = 2,
    ShuntAndBusTriggered = 3,
    AdcOff = 4,
    ShuntContinuous = 5,
    BusContinuous = 6,
    #[default]
    ShuntAndBusContinuous = 7,
}

impl Mode {
    const ALL: [Self; 8] = [
        Self::PowerDown,
        Self::ShuntTriggered,
        Self::BusTriggered,
        Self::ShuntAndBusTriggered,
        Self::AdcOff,
        Self::ShuntContinuous,
        Self::BusContinuous,
        Self::ShuntAndBusContinuous,
    ];

    pub const fn number(self) -> u8 {
        self as u8
    }

    pub(crate) const fn bits(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u8> for Mode {
    type Error = u8;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        Self::ALL.get(usize::from(number)).copied().ok_or(number)
    }
}

/// Settings applied when the device handle is created.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Ina219Config {
    /// 7-bit bus address
    pub address: u8,
    /// Maximum expected current in amps, sets the current-per-bit scale
    pub max_current: f64,
    /// Shunt resistance in ohms
    pub shunt_resistance: f64,
    pub bus_voltage_range: BusVoltageRange,
    pub gain: Gain,
    pub bus_adc: Adc,
    pub shunt_adc: Adc,
    pub mode: Mode,
    /// Accept unsupported setter values as silent no-ops instead of returning
    /// [`Ina219Error::InvalidConfigValue`](crate::Ina219Error::InvalidConfigValue).
    pub lenient: bool,
}

impl Ina219Config {
    pub const DEFAULT_MAX_CURRENT: f64 = 3.2768;
    pub const DEFAULT_SHUNT_RESISTANCE: f64 = 0.1;

    /// The configuration register word for these settings.
    pub fn register_bits(&self) -> u16 {
        let mut reg = 0;
        reg = Field::BUS_VOLTAGE_RANGE.apply(reg, self.bus_voltage_range.bits());
        reg = Field::GAIN.apply(reg, self.gain.bits());
        reg = Field::BUS_ADC.apply(reg, self.bus_adc.bits());
        reg = Field::SHUNT_ADC.apply(reg, self.shunt_adc.bits());
        Field::MODE.apply(reg, self.mode.bits())
    }
}

impl Default for Ina219Config {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            max_current: Self::DEFAULT_MAX_CURRENT,
            shunt_resistance: Self::DEFAULT_SHUNT_RESISTANCE,
            bus_voltage_range: BusVoltageRange::default(),
            gain: Gain::default(),
            bus_adc: Adc::default(),
            shunt_adc: Adc::default(),
            mode: Mode::default(),
            lenient: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::DEVICE_ID;

    #[test]
    fn defaults_match_power_on_register() {
        assert_eq!(Ina219Config::default().register_bits(), DEVICE_ID);
    }

    #[test]
    fn apply_only_touches_its_own_bits() {
        let reg = 0x399F;
        let updated = Field::GAIN.apply(reg, Gain::Mv40.bits());
        assert_eq!(
            updated & !Field::GAIN.register_mask(),
            reg & !Field::GAIN.register_mask()
        );
        assert_eq!(Field::GAIN.extract(updated), 0);

        let updated = Field::SHUNT_ADC.apply(reg, Adc::Avg128.bits());
        assert_eq!(updated, 0x39FF);
        assert_eq!(Field::BUS_ADC.extract(updated), Adc::Res12Bit.bits());
    }

    #[test]
    fn field_masks_do_not_overlap() {
        let fields = [
            Field::BUS_VOLTAGE_RANGE,
            Field::GAIN,
            Field::BUS_ADC,
            Field::SHUNT_ADC,
            Field::MODE,
        ];
        let mut seen = 0u16;
        for field in fields {
            assert_eq!(seen & field.register_mask(), 0, "{} overlaps", field.name);
            seen |= field.register_mask();
        }
        assert_eq!(seen, 0x3FFF);
    }

    #[test]
    fn adc_codes_map_to_datasheet_bits() {
        assert_eq!(Adc::try_from(9), Ok(Adc::Res9Bit));
        assert_eq!(Adc::try_from(12).map(Adc::bits), Ok(0b0011));
        assert_eq!(Adc::try_from(2).map(Adc::bits), Ok(0b1001));
        assert_eq!(Adc::try_from(128).map(Adc::bits), Ok(0b1111));
        for code in [0, 1, 3, 13, 256] {
            assert_eq!(Adc::try_from(code), Err(code));
        }
        for (code, adc) in Adc::TABLE {
            assert_eq!(adc.code(), code);
        }
    }

    #[test]
    fn rejects_unsupported_values() {
        assert_eq!(BusVoltageRange::try_from(24), Err(24));
        assert_eq!(Gain::try_from(8), Err(8));
        assert_eq!(Gain::try_from(160), Ok(Gain::Mv160));
        assert_eq!(Mode::try_from(8), Err(8));
        assert_eq!(Mode::try_from(0), Ok(Mode::PowerDown));
        assert_eq!(Mode::try_from(7).map(Mode::number), Ok(7));
    }

    #[test]
    fn sixteen_volt_range_clears_brng() {
        let config = Ina219Config {
            bus_voltage_range: BusVoltageRange::V16,
            ..Default::default()
        };
        assert_eq!(config.register_bits(), 0x199F);
    }
}
