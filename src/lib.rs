use std::{
    io::{Read, Write},
    net::{SocketAddr, TcpStream},
    time::Duration,
};

use instruments::{
    e4418,
    e4418::{PowerUnit, Query, Set, E4418},
    Delay, Instrument, Messenger, StdDelay,
};
use protocols::{Protocol, Serial, Tcp};
use serial::{SerialPort, SystemPort};
use tracing::info;

pub mod error;
pub mod instruments;
pub mod protocols;
pub mod scpi;

pub use error::Error;
pub use scpi::error::{DiagnosticReport, ScpiError};
pub use scpi::{EventStatusByte, StatusByte};

fn config_serial<T: SerialPort>(port: &mut T, config: Serial) -> serial::Result<()> {
    port.reconfigure(&|settings| {
        settings.set_baud_rate(config.baud_rate)?;
        settings.set_char_size(config.data_bits);
        settings.set_parity(config.parity);
        settings.set_stop_bits(config.stop_bits);
        settings.set_flow_control(config.flow_control);
        Ok(())
    })
}

fn parse_reply<T: std::str::FromStr>(reply: String) -> Result<T, Error> {
    match reply.trim().parse() {
        Ok(value) => Ok(value),
        Err(_) => Err(ScpiError::Parse { line: reply }.into()),
    }
}

/// One EPM series power meter on one exclusively owned transport.
///
/// Every operation blocks the calling thread for the full
/// command/response round trip; [`zeroing`](PowerMeter::zeroing) and
/// [`calibration`](PowerMeter::calibration) additionally block for the
/// instrument's documented settling time. Set commands return nothing on
/// the wire, so each setter pops the error queue afterwards and fails
/// with the decoded entry if the meter rejected it.
pub struct PowerMeter<IO: Read + Write, D: Delay = StdDelay> {
    instrument: Instrument<Messenger<IO>, E4418>,
    delay: D,
}

impl PowerMeter<TcpStream> {
    /// Connects over raw-socket SCPI (port 5025 on LAN adapters).
    pub fn connect_tcp(address: SocketAddr, timeout: Duration) -> Result<Self, Error> {
        let io = Tcp.connect(address, timeout)?;
        Ok(Self::with_io(io))
    }
}

impl PowerMeter<SystemPort> {
    /// Connects over the rear RS232 port at the factory settings.
    pub fn connect_serial(port: u8, timeout: Duration) -> Result<Self, Error> {
        let instrument = e4418::connect(port, timeout)?;
        Ok(Self {
            instrument,
            delay: StdDelay,
        })
    }
}

impl<IO: Read + Write> PowerMeter<IO> {
    /// Binds an already connected transport.
    pub fn with_io(io: IO) -> Self {
        Self::with_io_and_delay(io, StdDelay)
    }
}

impl<IO: Read + Write, D: Delay> PowerMeter<IO, D> {
    /// Binds an already connected transport with a caller-supplied clock
    /// for the timed routines.
    pub fn with_io_and_delay(io: IO, delay: D) -> Self {
        Self {
            instrument: Messenger::new(io).bind(E4418),
            delay,
        }
    }

    pub fn instrument(&mut self) -> &mut Instrument<Messenger<IO>, E4418> {
        &mut self.instrument
    }

    /// *IDN? identity string.
    pub fn identify(&mut self) -> Result<String, Error> {
        Ok(self.instrument.query(Query::Common(scpi::Query::Idn))?)
    }

    pub fn reset(&mut self) -> Result<(), Error> {
        Ok(self.instrument.set(Set::Common(scpi::Command::Rst))?)
    }

    /// *CLS, drops every pending entry from the error queue.
    pub fn clear_errors(&mut self) -> Result<(), Error> {
        Ok(self.instrument.set(Set::Common(scpi::Command::Cls))?)
    }

    /// *TST?; true means the meter passed.
    pub fn self_test(&mut self) -> Result<bool, Error> {
        let reply = self.instrument.query(Query::Common(scpi::Query::Tst))?;
        Ok(reply.trim() == "0")
    }

    /// Pops the oldest entry from the error queue without decoding it.
    pub fn next_error(&mut self) -> Result<(i32, String), Error> {
        Ok(self.instrument.query_error()?)
    }

    /// Pops one entry from the error queue and fails if it is non-zero.
    pub fn check_errors(&mut self) -> Result<(), Error> {
        Ok(self.instrument.check_errors()?)
    }

    /// Zeroes the given channel with no power applied to the sensor.
    ///
    /// Blocks for the instrument's full zeroing time, about 10 seconds.
    /// The error queue is checked right after the command (catching a
    /// rejected channel immediately, before any wait) and again once the
    /// routine has settled, where a failed zero surfaces as
    /// "Data questionable;ZERO ERROR".
    pub fn zeroing(&mut self, ch: u8) -> Result<(), Error> {
        info!(channel = ch, "zeroing, blocks for about 10 s");
        Ok(self
            .instrument
            .execute_timed(Set::ZeroOnce(ch), e4418::ZERO_SETTLE, &mut self.delay)?)
    }

    /// Calibrates the given channel against the 1 mW reference.
    ///
    /// Blocks like [`zeroing`](PowerMeter::zeroing); a failed run
    /// surfaces as "Data questionable;CAL ERROR".
    pub fn calibration(&mut self, ch: u8) -> Result<(), Error> {
        info!(channel = ch, "calibrating, blocks for about 10 s");
        Ok(self
            .instrument
            .execute_timed(Set::CalibrateOnce(ch), e4418::CAL_SETTLE, &mut self.delay)?)
    }

    /// FETCn?, the current measurement in the channel's unit.
    pub fn fetch(&mut self, ch: u8) -> Result<f64, Error> {
        parse_reply(self.instrument.query(Query::Fetch(ch))?)
    }

    /// READn?, a freshly triggered measurement.
    pub fn read(&mut self, ch: u8) -> Result<f64, Error> {
        parse_reply(self.instrument.query(Query::Read(ch))?)
    }

    /// MEASn?, configure-initiate-fetch in one exchange.
    pub fn measure(&mut self, ch: u8) -> Result<f64, Error> {
        parse_reply(self.instrument.query(Query::Measure(ch))?)
    }

    pub fn set_frequency(&mut self, ch: u8, hz: f64) -> Result<(), Error> {
        self.instrument.set(Set::SetFrequency(ch, hz))?;
        Ok(self.instrument.check_errors()?)
    }

    pub fn frequency(&mut self, ch: u8) -> Result<f64, Error> {
        parse_reply(self.instrument.query(Query::GetFrequency(ch))?)
    }

    pub fn set_average_count(&mut self, ch: u8, count: u16) -> Result<(), Error> {
        self.instrument.set(Set::SetAverageCount(ch, count))?;
        Ok(self.instrument.check_errors()?)
    }

    pub fn average_count(&mut self, ch: u8) -> Result<u16, Error> {
        parse_reply(self.instrument.query(Query::GetAverageCount(ch))?)
    }

    pub fn set_average_auto(&mut self, ch: u8, auto: bool) -> Result<(), Error> {
        self.instrument.set(Set::SetAverageAuto(ch, auto))?;
        Ok(self.instrument.check_errors()?)
    }

    pub fn set_power_unit(&mut self, ch: u8, unit: PowerUnit) -> Result<(), Error> {
        self.instrument.set(Set::SetPowerUnit(ch, unit))?;
        Ok(self.instrument.check_errors()?)
    }

    pub fn power_unit(&mut self, ch: u8) -> Result<PowerUnit, Error> {
        let reply = self.instrument.query(Query::GetPowerUnit(ch))?;
        match reply.trim() {
            "DBM" => Ok(PowerUnit::Dbm),
            "W" => Ok(PowerUnit::Watt),
            _ => Err(ScpiError::Parse { line: reply }.into()),
        }
    }

    pub fn set_offset(&mut self, ch: u8, db: f64) -> Result<(), Error> {
        self.instrument.set(Set::SetOffset(ch, db))?;
        Ok(self.instrument.check_errors()?)
    }

    pub fn set_offset_enable(&mut self, ch: u8, on: bool) -> Result<(), Error> {
        self.instrument.set(Set::SetOffsetEnable(ch, on))?;
        Ok(self.instrument.check_errors()?)
    }

    pub fn set_duty_cycle(&mut self, ch: u8, percent: f64) -> Result<(), Error> {
        self.instrument.set(Set::SetDutyCycle(ch, percent))?;
        Ok(self.instrument.check_errors()?)
    }

    pub fn set_duty_cycle_enable(&mut self, ch: u8, on: bool) -> Result<(), Error> {
        self.instrument.set(Set::SetDutyCycleEnable(ch, on))?;
        Ok(self.instrument.check_errors()?)
    }

    pub fn initiate(&mut self, ch: u8) -> Result<(), Error> {
        self.instrument.set(Set::Initiate(ch))?;
        Ok(self.instrument.check_errors()?)
    }

    pub fn set_continuous(&mut self, ch: u8, on: bool) -> Result<(), Error> {
        self.instrument.set(Set::SetInitContinuous(ch, on))?;
        Ok(self.instrument.check_errors()?)
    }

    /// *ESR? event status register, cleared by the read.
    pub fn event_status(&mut self) -> Result<EventStatusByte, Error> {
        let byte: u8 = parse_reply(self.instrument.query(Query::Common(scpi::Query::Esr))?)?;
        Ok(EventStatusByte::new(byte))
    }

    /// *STB? status byte.
    pub fn status_byte(&mut self) -> Result<StatusByte, Error> {
        let byte: u8 = parse_reply(self.instrument.query(Query::Common(scpi::Query::Stb))?)?;
        Ok(StatusByte::new(byte))
    }
}
