use std::{error::Error, time::Duration};

use rustmeter::PowerMeter;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    test_meter()?;
    Ok(())
}

fn test_meter() -> Result<(), Box<dyn Error>> {
    println!("Starting power meter connecting test\n");
    let mut meter = PowerMeter::connect_tcp("192.168.1.101:5025".parse()?, Duration::from_secs(5))?;
    println!("{}", meter.identify()?);
    meter.zeroing(1)?;
    meter.set_frequency(1, 1.0e9)?;
    println!("channel 1 power: {} dBm", meter.read(1)?);
    Ok(())
}
