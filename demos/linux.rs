use ina219_monitor::{Channel, Ina219Config, PowerMonitor};
use linux_embedded_hal::I2cdev;
use std::error::Error;
use std::thread;
use std::time::Duration;

const PERIOD: Duration = Duration::from_millis(1000);

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let i2c = I2cdev::new("/dev/i2c-1")?;

    let config = Ina219Config {
        max_current: 2.0,
        ..Default::default()
    };
    let monitor = PowerMonitor::connect(i2c, config)?;

    let (Some(bus_voltage), Some(current), Some(power)) =
        (monitor.channel(1), monitor.channel(2), monitor.channel(3))
    else {
        return Err("missing channel".into());
    };

    bus_voltage.start(PERIOD)?;
    current.start(PERIOD)?;
    power.start(PERIOD)?;

    loop {
        thread::sleep(PERIOD);
        println!(
            "Voltage: {:.2} V    Current: {:.3} A    Power: {:.3} W",
            bus_voltage.value(),
            current.value(),
            power.value()
        );
    }
}
