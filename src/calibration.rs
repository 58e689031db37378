use crate::config::Ina219Config;

/// Current-per-bit for a given maximum expected current: `max_current / 2^15`.
pub const CURRENT_LSB_PER_AMP: f64 = 3.0517578125e-5;

/// Fixed scaling constant from the datasheet calibration equation.
const CALIBRATION_SCALE: f64 = 0.04096;

/// Ratio between the power register LSB and the current register LSB.
pub const POWER_LSB_MULTIPLIER: f32 = 20.0;

/// Scale factors derived from the maximum expected current and the shunt resistance.
///
/// The calibration equation is evaluated in `f64`; only the per-bit scales handed to the
/// conversions are narrowed to `f32`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Calibration {
    max_current: f64,
    shunt_resistance: f64,
    current_lsb: f64,
}

impl Calibration {
    /// Non-positive (or NaN) inputs fall back to the driver defaults.
    pub fn new(max_current: f64, shunt_resistance: f64) -> Self {
        let max_current = positive_or(max_current, Ina219Config::DEFAULT_MAX_CURRENT);
        Self {
            max_current,
            shunt_resistance: positive_or(shunt_resistance, Ina219Config::DEFAULT_SHUNT_RESISTANCE),
            current_lsb: max_current * CURRENT_LSB_PER_AMP,
        }
    }

    pub fn with_max_current(self, max_current: f64) -> Self {
        Self::new(max_current, self.shunt_resistance)
    }

    pub fn with_shunt_resistance(self, shunt_resistance: f64) -> Self {
        Self::new(self.max_current, shunt_resistance)
    }

    pub fn max_current(&self) -> f64 {
        self.max_current
    }

    pub fn shunt_resistance(&self) -> f64 {
        self.shunt_resistance
    }

    /// Amps represented by one count of the current register.
    pub fn current_lsb(&self) -> f32 {
        self.current_lsb as f32
    }

    /// Watts represented by one count of the power register.
    pub fn power_lsb(&self) -> f32 {
        self.current_lsb() * POWER_LSB_MULTIPLIER
    }

    /// Value for the calibration register, saturated to 16 bits.
    pub fn register_value(&self) -> u16 {
        // float -> int casts saturate
        let counts = CALIBRATION_SCALE / (self.current_lsb * self.shunt_resistance);
        libm::round(counts) as u16
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::new(
            Ina219Config::DEFAULT_MAX_CURRENT,
            Ina219Config::DEFAULT_SHUNT_RESISTANCE,
        )
    }
}

fn positive_or(value: f64, default: f64) -> f64 {
    if value > 0.0 {
        value
    } else {
        default
    }
}
