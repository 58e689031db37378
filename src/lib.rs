//!
//! A platform-agnostic driver for the INA219 current/power monitor. Built using embedded-hal.
//!
//! [`Ina219`] turns the chip's register words into volts, amps and watts and exposes the
//! calibration and configuration register fields as validated setters. With the `std` feature,
//! [`PowerMonitor`] samples any subset of the four measurement channels (shunt voltage, bus
//! voltage, current, power) from a single shared polling thread.
//!
//! ```no_run
//! # #[cfg(feature = "std")]
//! # fn demo<I2C: embedded_hal::i2c::I2c + Send + 'static>(i2c: I2C) {
//! use ina219_monitor::{Channel, Ina219Config, PowerMonitor};
//! use std::time::Duration;
//!
//! let monitor = PowerMonitor::connect(i2c, Ina219Config::default()).unwrap();
//! let current = monitor.channel(2).unwrap();
//! current.start(Duration::from_millis(100)).unwrap();
//! println!("{} A", current.value());
//! # }
//! ```
//!

#![cfg_attr(not(feature = "std"), no_std)]

pub mod calibration;
pub mod channel;
pub mod config;
pub mod conversion;
pub mod driver;
#[cfg(feature = "std")]
pub mod monitor;
pub mod register;

pub use calibration::Calibration;
pub use channel::{Channel, ChannelKind, CHANNEL_COUNT};
pub use config::{Adc, BusVoltageRange, Gain, Ina219Config, Mode};
pub use driver::*;
#[cfg(feature = "std")]
pub use monitor::{MonitorChannel, PowerMonitor, DEFAULT_PERIOD, MIN_PERIOD};
pub use register::Register;
