use std::time::Duration;

use crate::protocols::{Protocol, Serial};
use crate::scpi::{self, ErrorEntry};

use super::{Messenger, Model};

/// Agilent E4418 (EPM-441A) single-channel power meter. The dual-channel
/// E4419 speaks the same command set with channel 2.
pub struct E4418;

pub(crate) const ID: E4418 = E4418;
type DefaultProtocol = Serial;

/// RS232 factory settings of the rear-panel port.
pub const DEFAULT_PROTOCOL: DefaultProtocol = Serial {
    baud_rate: serial::Baud9600,
    data_bits: serial::Bits8,
    parity: serial::ParityNone,
    stop_bits: serial::Stop1,
    flow_control: serial::FlowNone,
};

/// Zeroing adjusts the meter for a zero-power reading with no power
/// supplied to the sensor and takes approximately 10 seconds.
pub const ZERO_SETTLE: Duration = Duration::from_secs(10);

/// Calibration against the 1 mW reference takes about as long as zeroing.
pub const CAL_SETTLE: Duration = Duration::from_secs(10);

impl Model for E4418 {
    const DESCRIPTION: &'static str = "Agilent E4418/E4419 EPM series power meter";
    const ERRORS: &'static [ErrorEntry] = ERROR_LIST;
    type SetCommand = Set;
    type QueryCommand = Query;
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum PowerUnit {
    Dbm,
    Watt,
}

impl PowerUnit {
    fn mnemonic(self) -> &'static str {
        match self {
            PowerUnit::Dbm => "DBM",
            PowerUnit::Watt => "W",
        }
    }
}

/// Channel numbers render in decimal with no leading zeros and are not
/// validated locally: an out-of-range channel is the instrument's call
/// and comes back through the error queue.
pub enum Set {
    ///CALn:ZERO:AUTO ONCE, starts the zeroing routine
    ZeroOnce(u8),
    ///CALn:AUTO ONCE, calibrates against the 1 mW reference
    CalibrateOnce(u8),
    ///SENSn:FREQ, frequency of the measured signal in Hz
    SetFrequency(u8, f64),
    ///SENSn:AVER:COUN, averaging filter length
    SetAverageCount(u8, u16),
    ///SENSn:AVER:COUN:AUTO, automatic filter-length selection
    SetAverageAuto(u8, bool),
    ///UNITn:POW, measurement unit
    SetPowerUnit(u8, PowerUnit),
    ///SENSn:CORR:GAIN2, channel offset in dB
    SetOffset(u8, f64),
    ///SENSn:CORR:GAIN2:STAT
    SetOffsetEnable(u8, bool),
    ///SENSn:CORR:DCYC, pulse duty cycle in percent
    SetDutyCycle(u8, f64),
    ///SENSn:CORR:DCYC:STAT
    SetDutyCycleEnable(u8, bool),
    ///INITn:IMM, arms a single measurement
    Initiate(u8),
    ///INITn:CONT, free-running measurement
    SetInitContinuous(u8, bool),
    Common(scpi::Command),
}

pub enum Query {
    ///FETCn?, current measurement without re-triggering
    Fetch(u8),
    ///READn?, fresh measurement
    Read(u8),
    ///MEASn?, configure, initiate and fetch in one go
    Measure(u8),
    ///SENSn:FREQ?
    GetFrequency(u8),
    ///SENSn:AVER:COUN?
    GetAverageCount(u8),
    ///UNITn:POW?
    GetPowerUnit(u8),
    ///SENSn:CORR:GAIN2?
    GetOffset(u8),
    ///SENSn:CORR:DCYC?
    GetDutyCycle(u8),
    ///SYST:VERS?
    SystemVersion,
    Common(scpi::Query),
}

impl super::InstructionSet<false> for Set {
    const TERMINATOR: u8 = b'\n';
    const END_BYTE: u8 = b'\n';
    fn to_bytes(command: Self) -> Box<[u8]> {
        match command {
            Set::ZeroOnce(ch) => format!("CAL{}:ZERO:AUTO ONCE", ch),
            Set::CalibrateOnce(ch) => format!("CAL{}:AUTO ONCE", ch),
            Set::SetFrequency(ch, hz) => format!("SENS{}:FREQ {}", ch, hz),
            Set::SetAverageCount(ch, n) => format!("SENS{}:AVER:COUN {}", ch, n),
            Set::SetAverageAuto(ch, on) => format!("SENS{}:AVER:COUN:AUTO {}", ch, on as u8),
            Set::SetPowerUnit(ch, unit) => format!("UNIT{}:POW {}", ch, unit.mnemonic()),
            Set::SetOffset(ch, db) => format!("SENS{}:CORR:GAIN2 {}", ch, db),
            Set::SetOffsetEnable(ch, on) => format!("SENS{}:CORR:GAIN2:STAT {}", ch, on as u8),
            Set::SetDutyCycle(ch, pct) => format!("SENS{}:CORR:DCYC {}", ch, pct),
            Set::SetDutyCycleEnable(ch, on) => format!("SENS{}:CORR:DCYC:STAT {}", ch, on as u8),
            Set::Initiate(ch) => format!("INIT{}:IMM", ch),
            Set::SetInitContinuous(ch, on) => format!("INIT{}:CONT {}", ch, on as u8),
            Set::Common(command) => command.encode(),
        }
        .bytes()
        .chain(std::iter::once(Self::TERMINATOR))
        .collect::<Vec<u8>>()
        .into_boxed_slice()
    }
}

impl super::InstructionSet<true> for Query {
    const TERMINATOR: u8 = b'\n';
    const END_BYTE: u8 = b'\n';
    fn to_bytes(command: Self) -> Box<[u8]> {
        match command {
            Query::Fetch(ch) => format!("FETC{}?", ch),
            Query::Read(ch) => format!("READ{}?", ch),
            Query::Measure(ch) => format!("MEAS{}?", ch),
            Query::GetFrequency(ch) => format!("SENS{}:FREQ?", ch),
            Query::GetAverageCount(ch) => format!("SENS{}:AVER:COUN?", ch),
            Query::GetPowerUnit(ch) => format!("UNIT{}:POW?", ch),
            Query::GetOffset(ch) => format!("SENS{}:CORR:GAIN2?", ch),
            Query::GetDutyCycle(ch) => format!("SENS{}:CORR:DCYC?", ch),
            Query::SystemVersion => "SYST:VERS?".to_string(),
            Query::Common(query) => query.mnemonic().to_string(),
        }
        .bytes()
        .chain(std::iter::once(Self::TERMINATOR))
        .collect::<Vec<u8>>()
        .into_boxed_slice()
    }
}

/// Connects over the rear RS232 port at the factory settings.
pub fn connect(
    address: <DefaultProtocol as Protocol>::Address,
    timeout: Duration,
) -> super::Bound<DefaultProtocol, E4418> {
    let io = DEFAULT_PROTOCOL.connect(address, timeout)?;
    Ok(Messenger::new(io).bind(ID))
}

/// The documented error list of the EPM series, in manual order. Codes
/// repeat (-221, -230, -231, -310, -330 all carry several messages), so
/// the message text is what identifies an entry; code 0 heads the list
/// as the empty-queue sentinel.
pub const ERROR_LIST: &[ErrorEntry] = &[
    ErrorEntry { code: 0, summary: "No error", detail: "" },
    ErrorEntry {
        code: -101,
        summary: "Invalid character",
        detail: "An invalid character was found in the command string. You may have inserted a character such as #, $ or % in the command header or within a parameter. For example, LIM:LOW O#.",
    },
    ErrorEntry {
        code: -102,
        summary: "Syntax error",
        detail: "Invalid syntax was found in the command string. For example, LIM:CLE:AUTO, 1 or LIM:CLE:AUTO 1.",
    },
    ErrorEntry {
        code: -103,
        summary: "Invalid separator",
        detail: "An invalid separator was found in the command string. You may have used a comma instead of a colon, semicolon or blank space; or you may have used a blank space instead of a comma. For example, OUTP:ROSC,1.",
    },
    ErrorEntry {
        code: -105,
        summary: "GET not allowed",
        detail: "A Group Execute Trigger (GET) is not allowed within a command string.",
    },
    ErrorEntry {
        code: -108,
        summary: "Parameter not allowed",
        detail: "More parameters were received than expected for the command. You may have entered an extra parameter or added a parameter to a command that does not accept a parameter. For example, CAL 10.",
    },
    ErrorEntry {
        code: -109,
        summary: "Missing parameter",
        detail: "Fewer parameters were received than expected for the command. You omitted one or more parameters that are required for this command. For example, AVER:COUN.",
    },
    ErrorEntry {
        code: -112,
        summary: "Program mnemonic too long",
        detail: "A command header was received which contained more than the maximum 12 characters allowed. For example, SENSeAVERageCOUNt 8.",
    },
    ErrorEntry {
        code: -113,
        summary: "Undefined header",
        detail: "A command was received that is not valid for this power meter. You may have misspelled the command, it may not be a valid command or you may have the wrong interface selected. If you are using the short form of the command, remember that it may contain up to four letters. For example, TRIG:SOUR IMM.",
    },
    ErrorEntry {
        code: -121,
        summary: "Invalid character in number",
        detail: "An invalid character was found in the number specified for a parameter value. For example, SENS:AVER:COUN 128#H.",
    },
    ErrorEntry {
        code: -123,
        summary: "Exponent too large",
        detail: "A numeric parameter was found whose exponent was larger than 32,000. For example, SENS:COUN 1E34000.",
    },
    ErrorEntry {
        code: -124,
        summary: "Too many digits",
        detail: "A numeric parameter was found whose mantissa contained more than 255 digits, excluding leading zeros.",
    },
    ErrorEntry {
        code: -128,
        summary: "Numeric data not allowed",
        detail: "A numeric value was received within a command which does not accept a numeric value. For example, MEM:CLE 24.",
    },
    ErrorEntry {
        code: -131,
        summary: "Invalid suffix",
        detail: "A suffix was incorrectly specified for a numeric parameter. You may have misspelled the suffix. For example, SENS:FREQ 200KZ.",
    },
    ErrorEntry {
        code: -134,
        summary: "Suffix too long",
        detail: "A suffix used contained more than 12 characters. For example, SENS:FREQ 2MHZZZZZZZZZZZ.",
    },
    ErrorEntry {
        code: -138,
        summary: "Suffix not allowed",
        detail: "A suffix was received following a numeric parameter which does not accept a suffix. For example, INIT:CONT 0Hz.",
    },
    ErrorEntry {
        code: -148,
        summary: "Character data not allowed",
        detail: "A discrete parameter was received but a character string or a numeric parameter was expected. Check the list of parameters to verify that you have used a valid parameter type. For example, MEM:CLE CUSTOM_1.",
    },
    ErrorEntry {
        code: -151,
        summary: "Invalid string data",
        detail: "An invalid string was received. Check to see if you have enclosed the character string in single or double quotes. For example, MEM:CLE \"CUSTOM_1.",
    },
    ErrorEntry {
        code: -158,
        summary: "String data not allowed",
        detail: "A character string was received but is not allowed for the command. Check the list of parameters to verify that you have used a valid parameter type. For example, LIM:STAT `ON'.",
    },
    ErrorEntry {
        code: -161,
        summary: "Invalid block data",
        detail: "A block data element was expected but was invalid for some reason. For example, *DDT #15FET. The 5 in the string indicates that 5 characters should follow, whereas in this example there are only 3.",
    },
    ErrorEntry {
        code: -168,
        summary: "Block data not allowed",
        detail: "A legal block data element was encountered but not allowed by the power meter at this point. For example SYST:LANG #15FETC?.",
    },
    ErrorEntry {
        code: -178,
        summary: "Expression data not allowed",
        detail: "A legal expression data was encountered but not allowed by the power meter at this point. For example SYST:LANG (5+2).",
    },
    ErrorEntry {
        code: -211,
        summary: "Trigger ignored",
        detail: "Indicates that <GET> or *TRG or TRIG:IMM was received and recognized by the device but was ignored because the power meter was not in the wait for trigger state.",
    },
    ErrorEntry {
        code: -213,
        summary: "Init ignored",
        detail: "Indicates that a request for a measurement initiation was ignored as the power meter was already initiated. For example, INIT:CONT ON INIT.",
    },
    ErrorEntry {
        code: -214,
        summary: "Trigger deadlock",
        detail: "TRIG:SOUR was set to HOLD or BUS and a READ? or MEASure? was attempted, expecting TRIG:SOUR to be set to IMMediate.",
    },
    ErrorEntry {
        code: -220,
        summary: "Parameter error;Frequency list must be in ascending order.",
        detail: "Indicates that the frequencies entered using the MEMory:TABLe:FREQuency command are not in ascending order.",
    },
    ErrorEntry {
        code: -221,
        summary: "Settings conflict",
        detail: "This command occurs under a variety of conflicting conditions. The following list gives a few examples of where this error may occur: * If the READ? parameters do not match the current settings. * If you are in fast mode and attempting to switch on for example, averaging, duty cycle or limits. * Trying to clear a sensor calibration table when none is selected.",
    },
    ErrorEntry {
        code: -221,
        summary: "Settings conflict;DTR/DSR not available on RS422",
        detail: "DTR/DSR is only available on the RS232 interface.",
    },
    ErrorEntry {
        code: -222,
        summary: "Data out of range",
        detail: "A numeric parameter value is outside the valid range for the command. For example, SENS:FREQ 2KHZ.",
    },
    ErrorEntry {
        code: -224,
        summary: "Illegal parameter value",
        detail: "A discrete parameter was received which was not a valid choice for the command. You may have used an invalid parameter choice. For example, TRIG:SOUR EXT.",
    },
    ErrorEntry {
        code: -226,
        summary: "Lists not same length",
        detail: "This occurs when SENSe:CORRection:CSET[1]|CSET2:STATe is set to ON and the frequency and calibration/offset lists do not correspond in length.",
    },
    ErrorEntry {
        code: -230,
        summary: "Data corrupt or stale",
        detail: "This occurs when a FETC? is attempted and either a reset has been received or the power meter state has changed such that the current measurement is invalidated (for example, a change of frequency setting or triggering conditions).",
    },
    ErrorEntry {
        code: -230,
        summary: "Data corrupt or stale;Please zero and calibrate Channel A",
        detail: "When CAL[1|2]:RCAL is set to ON and the sensor currently connected to channel A has not been zeroed and calibrated, then any command which would normally return a measurement result (for example FETC?, READ? or MEAS?) will generate this error message.",
    },
    ErrorEntry {
        code: -230,
        summary: "Data corrupt or stale;Please zero Channel A",
        detail: "When CAL[1|2]:RCAL is set to ON and the sensor currently connected to channel A has not been zeroed, then any command which would normally return a measurement result (for example FETC?, READ? or MEAS?) will generate this error message.",
    },
    ErrorEntry {
        code: -230,
        summary: "Data corrupt or stale;Please calibrate Channel A",
        detail: "When CAL[1|2]:RCAL is set to ON and the sensor currently connected to channel A has not been calibrated, then any command which would normally return a measurement result (for example FETC?, READ? or MEAS?) will generate this error message",
    },
    ErrorEntry {
        code: -231,
        summary: "Data questionable;CAL ERROR",
        detail: "Power meter calibration failed. The most likely cause is attempting to calibrate without applying a 1 mW power to the power sensor.",
    },
    ErrorEntry {
        code: -231,
        summary: "Data questionable;Input Overload",
        detail: "The power input to Channel A exceeds the power sensor's maximum range.",
    },
    ErrorEntry {
        code: -231,
        summary: "Data questionable;Lower window log error",
        detail: "This indicates that a difference measurement in the lower window has given a negative result when the units of measurement were logarithmic.",
    },
    ErrorEntry {
        code: -231,
        summary: "Data questionable;Upper window log error",
        detail: "This indicates that a difference measurement in the upper window has given a negative result when the units of measurement were logarithmic.",
    },
    ErrorEntry {
        code: -231,
        summary: "Data questionable;ZERO ERROR",
        detail: "Power meter zeroing failed. The most likely cause is attempting to zero when some power signal is being applied to the power sensor.",
    },
    ErrorEntry {
        code: -241,
        summary: "Hardware missing",
        detail: "The power meter is unable to execute the command because either no power sensor is connected or it expects an Agilent E-Series or N8480 Series power sensor, and one is not connected.",
    },
    ErrorEntry {
        code: -310,
        summary: "System error;Dty Cyc may impair accuracy with ECP sensor",
        detail: "This indicates that the sensor connected is for use with CW signals only.",
    },
    ErrorEntry {
        code: -310,
        summary: "System error;Sensor EEPROM Read Failed - critical data not found or unreadable",
        detail: "This indicates a failure with your Agilent E-Series or N8480 Series power sensor. Refer to your power sensor manual for details on returning it for repair.",
    },
    ErrorEntry {
        code: -310,
        summary: "System error;Sensor EEPROM Read Completed OK but optional data block(s) not found or unreadable",
        detail: "This indicates a failure with your Agilent E-Series or N8480 Series power sensor. Refer to your power sensor manual for details on returning it for repair.",
    },
    ErrorEntry {
        code: -310,
        summary: "System error;Sensor EEPROM Read Failed - unknown EEPROM table format",
        detail: "This indicates a failure with your Agilent E-Series or N8480 Series power sensor. Refer to your power sensor manual for details on returning it for repair.",
    },
    ErrorEntry {
        code: -310,
        summary: "System error;Sensor EEPROM < > data not found or unreadable",
        detail: "Where < > refers to the sensor data block covered, for example, Linearity, Temp - Comp (temperature compensation). This indicates a failure with your Agilent E-Series or N8480 Series power sensor. Refer to your power sensor manual for details on returning it for repair.",
    },
    ErrorEntry {
        code: -310,
        summary: "System error;Option 001 Battery charger fault",
        detail: "The power meter is connected to an AC power source, the battery is not fully charged and it is not charging.",
    },
    ErrorEntry {
        code: -310,
        summary: "System error;Sensors connected to both front and rear inputs. You cannot connect two power sensors to the one channel input. In this instance, the power",
        detail: "meter detects power sensors connected to both its front and rear channel inputs.",
    },
    ErrorEntry {
        code: -320,
        summary: "Out of memory",
        detail: "The power meter required more memory than was available to run an internal operation.",
    },
    ErrorEntry {
        code: -330,
        summary: "Self-test Failed;",
        detail: "The -330, \"Self-test Failed\" errors indicate that you have a problem with your power meter. Refer to \"Contacting Agilent Technologies\" on page 103 for details of what to do with your faulty power meter.",
    },
    ErrorEntry {
        code: -330,
        summary: "Self-test Failed;Measurement Channel Fault",
        detail: "Refer to \"Measurement Assembly\" on page 98 if you require a description of the Measurement Assembly test.",
    },
    ErrorEntry {
        code: -330,
        summary: "Self-test Failed;Option 001 Battery requires replacement",
        detail: "The Option 001 battery is not charging to a satisfactory level and should be replaced.",
    },
    ErrorEntry {
        code: -330,
        summary: "Self-test Failed;RAM Battery Fault",
        detail: "Refer to \"RAM Battery\" on page 98 if you require a description of the battery test.",
    },
    ErrorEntry {
        code: -330,
        summary: "Self-test Failed;Calibrator Fault",
        detail: "Refer to \"Calibrator\" on page 99 if you require a description of the calibrator test.",
    },
    ErrorEntry {
        code: -330,
        summary: "Self-test Failed;ROM Check Failed",
        detail: "Refer to \"ROM Checksum\" on page 98 if you require a description of the ROM Checksum test.",
    },
    ErrorEntry {
        code: -330,
        summary: "Self-test Failed;RAM Check Failed",
        detail: "Refer to \"RAM\" on page 98 if you require a description of the RAM test.",
    },
    ErrorEntry {
        code: -330,
        summary: "Self-test Failed;Display Assy. Fault",
        detail: "Refer to \"Display\" on page 99 if you require a description of the Display test.",
    },
    ErrorEntry {
        code: -330,
        summary: "Self-test Failed;Confidence Check Fault",
        detail: "Refer to \"Confidence Check\" on page 96 if you require a description of this test.",
    },
    ErrorEntry {
        code: -330,
        summary: "Self-test Failed;Serial Interface Fault",
        detail: "Refer to \"Serial Interface\" on page 99 if you require a description of this test.",
    },
    ErrorEntry {
        code: -350,
        summary: "Queue overflow",
        detail: "The error queue is full and another error has occurred which could not be recorded.",
    },
    ErrorEntry {
        code: -361,
        summary: "Parity error in program",
        detail: "The serial port receiver has detected a parity error and consequently, data integrity cannot be guaranteed.",
    },
    ErrorEntry {
        code: -362,
        summary: "Framing error in program",
        detail: "The serial port receiver has detected a framing error and consequently, data integrity cannot be guaranteed.",
    },
    ErrorEntry {
        code: -363,
        summary: "Input buffer overrun",
        detail: "The serial port receiver has been overrun and consequently, data has been lost.",
    },
    ErrorEntry {
        code: -410,
        summary: "Query INTERRUPTED",
        detail: "A command was received which sends data to the output buffer, but the output buffer contained data from a previous command (the previous data is not overwritten). The output buffer is cleared when power has been off or after *RST (reset) command has been executed.",
    },
    ErrorEntry {
        code: -420,
        summary: "Query UNTERMINATED",
        detail: "The power meter was addressed to talk (that is, to send data over the interface) but a command has not been received which sends data to the output buffer. For example, you may have executed a CONFigure command (which does not generate data) and then attempted to read data from the remote interface.",
    },
    ErrorEntry {
        code: -430,
        summary: "Query DEADLOCKED",
        detail: "A command was received which generates too much data to fit in the output buffer and the input buffer is also full. Command execution continues but data is lost. -440 Query UNTERMINATED after indefinite response The *IDN? command must be the last query command within a command string.",
    },
];

#[cfg(test)]
mod tests {
    use super::super::InstructionSet;
    use super::*;

    fn set_text(command: Set) -> String {
        String::from_utf8(<Set as InstructionSet<false>>::to_bytes(command).into_vec()).unwrap()
    }

    fn query_text(command: Query) -> String {
        String::from_utf8(<Query as InstructionSet<true>>::to_bytes(command).into_vec()).unwrap()
    }

    #[test]
    fn every_catalog_message_round_trips() {
        for entry in ERROR_LIST {
            let found = scpi::lookup(ERROR_LIST, entry.summary)
                .unwrap_or_else(|| panic!("no match for {:?}", entry.summary));
            assert!(std::ptr::eq(found, entry), "wrong entry for {:?}", entry.summary);
        }
    }

    #[test]
    fn the_sentinel_heads_the_list() {
        assert_eq!(ERROR_LIST[0].code, 0);
        assert_eq!(ERROR_LIST[0].summary, "No error");
    }

    #[test]
    fn duplicated_codes_keep_all_their_messages() {
        let count = |code: i32| ERROR_LIST.iter().filter(|e| e.code == code).count();
        assert_eq!(count(-221), 2);
        assert_eq!(count(-230), 4);
        assert_eq!(count(-231), 5);
        assert_eq!(count(-310), 7);
        assert_eq!(count(-330), 10);
    }

    #[test]
    fn zeroing_command_renders_the_channel_in_decimal() {
        assert_eq!(set_text(Set::ZeroOnce(1)), "CAL1:ZERO:AUTO ONCE\n");
        assert_eq!(set_text(Set::ZeroOnce(2)), "CAL2:ZERO:AUTO ONCE\n");
    }

    #[test]
    fn measurement_command_encodings() {
        assert_eq!(query_text(Query::Fetch(1)), "FETC1?\n");
        assert_eq!(query_text(Query::Read(2)), "READ2?\n");
        assert_eq!(set_text(Set::SetFrequency(1, 50e6)), "SENS1:FREQ 50000000\n");
        assert_eq!(set_text(Set::SetAverageAuto(1, true)), "SENS1:AVER:COUN:AUTO 1\n");
        assert_eq!(set_text(Set::SetPowerUnit(2, PowerUnit::Dbm)), "UNIT2:POW DBM\n");
        assert_eq!(set_text(Set::Common(scpi::Command::Cls)), "*CLS\n");
        assert_eq!(query_text(Query::Common(scpi::Query::Idn)), "*IDN?\n");
    }
}
