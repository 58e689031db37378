use crate::calibration::Calibration;
use crate::channel::ChannelKind;
use crate::config::{Adc, BusVoltageRange, Field, Gain, Ina219Config, Mode};
use crate::conversion;
use crate::register::{Register, DEVICE_ID, READ_FLAG, RESET_PATTERN};
use embedded_hal::i2c::I2c;
use log::{debug, info, trace, warn};

const MAX_ADDRESS: u8 = 0x7F;

#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Ina219Error<E> {
    #[error("I2C error: {0:?}")]
    Bus(E),
    #[error("unable to find INA219 (identification read {found:#06x})")]
    DeviceNotFound { found: u16 },
    #[error("unsupported {field} value {value}")]
    InvalidConfigValue { field: &'static str, value: u32 },
}

pub struct Ina219<I2C> {
    i2c: I2C,
    config: Ina219Config,
    calibration: Calibration,
    calibrated: bool,
}

impl<I2C> Ina219<I2C>
where
    I2C: I2c,
{
    /// Resets, identifies and configures the chip.
    ///
    /// # Arguments
    ///
    /// * `i2c`: The bus the chip is attached to.
    /// * `config`: Address, calibration and configuration register settings. Non-positive
    /// calibration values are replaced with the defaults.
    ///
    /// returns: Result<Ina219<I2C>, Ina219Error<<I2C as ErrorType>::Error>>
    pub fn new(i2c: I2C, config: Ina219Config) -> Result<Self, Ina219Error<I2C::Error>> {
        if config.address > MAX_ADDRESS {
            return Err(Ina219Error::InvalidConfigValue {
                field: "address",
                value: config.address.into(),
            });
        }

        let mut driver = Self {
            i2c,
            config,
            calibration: Calibration::new(config.max_current, config.shunt_resistance),
            calibrated: false,
        };

        debug!("INA219 @ {:#04x}: resetting", config.address);
        driver.reset()?;

        debug!("INA219 @ {:#04x}: identifying", config.address);
        let found = driver.identification()?;
        if found != DEVICE_ID {
            return Err(Ina219Error::DeviceNotFound { found });
        }

        debug!("INA219 @ {:#04x}: configuring", config.address);
        driver.configure(config)?;

        info!(
            "INA219 @ {:#04x} ready, {} A/bit",
            config.address,
            driver.calibration.current_lsb()
        );
        Ok(driver)
    }

    /// Returns the chip to its power-on defaults.
    ///
    /// The calibration register is cleared by the chip, so current and power read zero and
    /// [`is_calibrated`](Self::is_calibrated) is false until [`configure`](Self::configure) or
    /// one of the calibration setters is called. The calibration inputs are kept for that.
    pub fn reset(&mut self) -> Result<(), Ina219Error<I2C::Error>> {
        self.write_word(Register::Configuration, RESET_PATTERN)?;
        self.calibrated = false;
        self.config = Ina219Config {
            bus_voltage_range: BusVoltageRange::default(),
            gain: Gain::default(),
            bus_adc: Adc::default(),
            shunt_adc: Adc::default(),
            mode: Mode::default(),
            ..self.config
        };
        Ok(())
    }

    /// Whether the configuration register currently reads `expected_id`.
    ///
    /// Only meaningful right after [`reset`](Self::reset), when the register holds its power-on
    /// value [`DEVICE_ID`].
    pub fn identify(&mut self, expected_id: u16) -> Result<bool, Ina219Error<I2C::Error>> {
        Ok(self.identification()? == expected_id)
    }

    /// Writes the calibration and the whole configuration register from `config`.
    ///
    /// The bus address of an existing handle never changes.
    pub fn configure(&mut self, config: Ina219Config) -> Result<(), Ina219Error<I2C::Error>> {
        let calibration = Calibration::new(config.max_current, config.shunt_resistance);
        self.apply_calibration(calibration)?;
        self.write_word(Register::Configuration, config.register_bits())?;
        self.config = Ina219Config {
            address: self.config.address,
            max_current: calibration.max_current(),
            shunt_resistance: calibration.shunt_resistance(),
            ..config
        };
        Ok(())
    }

    pub fn set_max_current(&mut self, amps: f64) -> Result<(), Ina219Error<I2C::Error>> {
        self.apply_calibration(self.calibration.with_max_current(amps))
    }

    pub fn set_shunt_resistance(&mut self, ohms: f64) -> Result<(), Ina219Error<I2C::Error>> {
        self.apply_calibration(self.calibration.with_shunt_resistance(ohms))
    }

    /// Accepts 16 or 32 volts.
    pub fn set_bus_voltage_range(&mut self, volts: u16) -> Result<(), Ina219Error<I2C::Error>> {
        let range = match BusVoltageRange::try_from(volts) {
            Ok(range) => range,
            Err(volts) => return self.reject(Field::BUS_VOLTAGE_RANGE, volts.into()),
        };
        self.update_field(Field::BUS_VOLTAGE_RANGE, range.bits())?;
        self.config.bus_voltage_range = range;
        Ok(())
    }

    /// Accepts 40, 80, 160 or 320 millivolts full scale.
    pub fn set_gain(&mut self, millivolts: u16) -> Result<(), Ina219Error<I2C::Error>> {
        let gain = match Gain::try_from(millivolts) {
            Ok(gain) => gain,
            Err(millivolts) => return self.reject(Field::GAIN, millivolts.into()),
        };
        self.update_field(Field::GAIN, gain.bits())?;
        self.config.gain = gain;
        Ok(())
    }

    /// Accepts the resolution codes 9, 10, 11, 12 or the averaging counts 2..=128.
    pub fn set_bus_adc(&mut self, code: u16) -> Result<(), Ina219Error<I2C::Error>> {
        let adc = match Adc::try_from(code) {
            Ok(adc) => adc,
            Err(code) => return self.reject(Field::BUS_ADC, code.into()),
        };
        self.update_field(Field::BUS_ADC, adc.bits())?;
        self.config.bus_adc = adc;
        Ok(())
    }

    /// Same codes as [`set_bus_adc`](Self::set_bus_adc).
    pub fn set_shunt_adc(&mut self, code: u16) -> Result<(), Ina219Error<I2C::Error>> {
        let adc = match Adc::try_from(code) {
            Ok(adc) => adc,
            Err(code) => return self.reject(Field::SHUNT_ADC, code.into()),
        };
        self.update_field(Field::SHUNT_ADC, adc.bits())?;
        self.config.shunt_adc = adc;
        Ok(())
    }

    /// Accepts 0 (power-down) to 7 (continuous shunt and bus).
    pub fn set_mode(&mut self, mode: u8) -> Result<(), Ina219Error<I2C::Error>> {
        let mode = match Mode::try_from(mode) {
            Ok(mode) => mode,
            Err(mode) => return self.reject(Field::MODE, mode.into()),
        };
        self.update_field(Field::MODE, mode.bits())?;
        self.config.mode = mode;
        Ok(())
    }

    /// Shunt voltage in volts.
    pub fn shunt_voltage(&mut self) -> Result<f32, Ina219Error<I2C::Error>> {
        let raw = self.read_word(Register::ShuntVoltage)?;
        Ok(conversion::shunt_voltage(raw))
    }

    /// Bus voltage in volts, or [`BUS_VOLTAGE_OVERFLOW`](crate::conversion::BUS_VOLTAGE_OVERFLOW)
    /// when the chip reports a math overflow.
    pub fn bus_voltage(&mut self) -> Result<f32, Ina219Error<I2C::Error>> {
        let raw = self.read_word(Register::BusVoltage)?;
        Ok(conversion::bus_voltage(raw))
    }

    /// Current in amps.
    pub fn current(&mut self) -> Result<f32, Ina219Error<I2C::Error>> {
        let raw = self.read_word(Register::Current)?;
        Ok(conversion::current(raw, self.calibration.current_lsb()))
    }

    /// Power in watts.
    pub fn power(&mut self) -> Result<f32, Ina219Error<I2C::Error>> {
        let raw = self.read_word(Register::Power)?;
        Ok(conversion::power(raw, self.calibration.current_lsb()))
    }

    pub fn read(&mut self, kind: ChannelKind) -> Result<f32, Ina219Error<I2C::Error>> {
        match kind {
            ChannelKind::ShuntVoltage => self.shunt_voltage(),
            ChannelKind::BusVoltage => self.bus_voltage(),
            ChannelKind::Current => self.current(),
            ChannelKind::Power => self.power(),
        }
    }

    pub fn read_word(&mut self, register: Register) -> Result<u16, Ina219Error<I2C::Error>> {
        let mut read_buffer = [0u8; 2];
        self.i2c
            .write(self.config.address, &[register.address() | READ_FLAG])
            .map_err(Ina219Error::Bus)?;
        self.i2c
            .read(self.config.address, &mut read_buffer)
            .map_err(Ina219Error::Bus)?;

        let result = u16::from_be_bytes(read_buffer);
        trace!("read {:?} = {:#06x}", register, result);

        Ok(result)
    }

    pub fn write_word(
        &mut self,
        register: Register,
        data: u16,
    ) -> Result<(), Ina219Error<I2C::Error>> {
        trace!("write {:?} = {:#06x}", register, data);
        let [high, low] = data.to_be_bytes();
        self.i2c
            .write(self.config.address, &[register.address(), high, low])
            .map_err(Ina219Error::Bus)
    }

    fn apply_calibration(
        &mut self,
        calibration: Calibration,
    ) -> Result<(), Ina219Error<I2C::Error>> {
        self.write_word(Register::Calibration, calibration.register_value())?;
        self.calibration = calibration;
        self.calibrated = true;
        self.config.max_current = calibration.max_current();
        self.config.shunt_resistance = calibration.shunt_resistance();
        Ok(())
    }

    fn identification(&mut self) -> Result<u16, Ina219Error<I2C::Error>> {
        self.read_word(Register::Configuration)
    }

    fn update_field(&mut self, field: Field, bits: u16) -> Result<(), Ina219Error<I2C::Error>> {
        let reg = self.read_word(Register::Configuration)?;
        trace!(
            "{}: {:#06b} -> {:#06b}",
            field.name,
            field.extract(reg),
            bits
        );
        self.write_word(Register::Configuration, field.apply(reg, bits))
    }

    fn reject(&self, field: Field, value: u32) -> Result<(), Ina219Error<I2C::Error>> {
        if self.config.lenient {
            warn!("ignoring unsupported {} value {}", field.name, value);
            Ok(())
        } else {
            Err(Ina219Error::InvalidConfigValue {
                field: field.name,
                value,
            })
        }
    }
}

impl<I2C> Ina219<I2C> {
    /// The live configuration, including calibration inputs after fallback to defaults.
    pub fn config(&self) -> &Ina219Config {
        &self.config
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Scale of the last calibration written. After a [`reset`](Ina219::reset) the chip no
    /// longer applies it; see [`is_calibrated`](Self::is_calibrated).
    pub fn current_lsb(&self) -> f32 {
        self.calibration.current_lsb()
    }

    /// Whether the chip's calibration register holds [`calibration`](Self::calibration).
    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn address(&self) -> u8 {
        self.config.address
    }

    /// Gives the bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }
}
