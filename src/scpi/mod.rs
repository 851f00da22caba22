pub mod error;

use error::DiagnosticReport;

/// One documented entry of an instrument's error list.
///
/// The message text is the identifying key, not the code: SCPI
/// instruments reuse one code for several distinct conditions (the EPM
/// series lists four different messages under -230 alone), so the code
/// is carried for display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorEntry {
    pub code: i32,
    pub summary: &'static str,
    pub detail: &'static str,
}

/// Finds the catalog entry whose message matches `message` exactly.
pub fn lookup<'a>(catalog: &'a [ErrorEntry], message: &str) -> Option<&'a ErrorEntry> {
    catalog.iter().find(|entry| entry.summary == message)
}

/// Resolves one `(code, message)` pair popped from the error queue.
///
/// Code 0 is the empty-queue sentinel and never fails. Every non-zero
/// code fails with exactly one report: either the catalog entry under
/// the reported code, or a bare report carrying the raw message so
/// uncataloged firmware errors stay diagnosable. Suppressing an error is
/// a caller decision, never made here.
pub fn decode(catalog: &[ErrorEntry], code: i32, message: &str) -> Result<(), DiagnosticReport> {
    if code == 0 {
        return Ok(());
    }
    let report = match lookup(catalog, message) {
        Some(entry) => DiagnosticReport {
            code,
            summary: entry.summary.to_string(),
            detail: entry.detail.to_string(),
        },
        None => DiagnosticReport {
            code,
            summary: message.to_string(),
            detail: String::new(),
        },
    };
    Err(report)
}

///IEEE-488.2 common queries
pub enum Query {
    ///Identification query
    Idn,
    ///Self-test query
    Tst,
    ///Operation complete query
    Opc,
    ///Installed options query
    Opt,
    ///Event status enable query
    Ese,
    ///Event status register query
    Esr,
    ///Service request enable query
    Sre,
    ///Read status byte query
    Stb,
}

impl Query {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Query::Idn => "*IDN?",
            Query::Tst => "*TST?",
            Query::Opc => "*OPC?",
            Query::Opt => "*OPT?",
            Query::Ese => "*ESE?",
            Query::Esr => "*ESR?",
            Query::Sre => "*SRE?",
            Query::Stb => "*STB?",
        }
    }
}

///IEEE-488.2 common commands
pub enum Command {
    ///Clear status
    Cls,
    ///Reset
    Rst,
    ///Save instrument state
    Sav(u8),
    ///Recall instrument state
    Rcl(u8),
    ///Operation complete
    Opc,
    ///Wait to complete
    Wai,
    ///Event status enable
    Ese(u8),
    ///Service request enable
    Sre(u8),
}

impl Command {
    pub fn encode(&self) -> String {
        match self {
            Command::Cls => "*CLS".to_string(),
            Command::Rst => "*RST".to_string(),
            Command::Sav(register) => format!("*SAV {}", register),
            Command::Rcl(register) => format!("*RCL {}", register),
            Command::Opc => "*OPC".to_string(),
            Command::Wai => "*WAI".to_string(),
            Command::Ese(mask) => format!("*ESE {}", mask),
            Command::Sre(mask) => format!("*SRE {}", mask),
        }
    }
}

/// Status byte returned by *STB?, reported as decimal ASCII.
pub struct StatusByte(u8);

impl StatusByte {
    pub fn new(byte: u8) -> Self {
        Self(byte)
    }
    pub fn byte(&self) -> u8 {
        self.0
    }
    pub fn data_questionable(&self) -> bool {
        self.0 & (1 << 3) != 0
    }
    pub fn message_available(&self) -> bool {
        self.0 & (1 << 4) != 0
    }
    pub fn event_status(&self) -> bool {
        self.0 & (1 << 5) != 0
    }
    pub fn requesting_service(&self) -> bool {
        self.0 & (1 << 6) != 0
    }
    pub fn operation_status(&self) -> bool {
        self.0 & (1 << 7) != 0
    }
}

/// Event status register returned by *ESR?, reported as decimal ASCII.
pub struct EventStatusByte(u8);

impl EventStatusByte {
    pub fn new(byte: u8) -> Self {
        Self(byte)
    }
    pub fn byte(&self) -> u8 {
        self.0
    }
    pub fn operation_complete(&self) -> bool {
        self.0 & (1 << 0) != 0
    }
    pub fn query_error(&self) -> bool {
        self.0 & (1 << 2) != 0
    }
    pub fn device_dependent_error(&self) -> bool {
        self.0 & (1 << 3) != 0
    }
    pub fn execution_error(&self) -> bool {
        self.0 & (1 << 4) != 0
    }
    pub fn command_error(&self) -> bool {
        self.0 & (1 << 5) != 0
    }
    pub fn power_on(&self) -> bool {
        self.0 & (1 << 7) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &[ErrorEntry] = &[
        ErrorEntry {
            code: 0,
            summary: "No error",
            detail: "",
        },
        ErrorEntry {
            code: -230,
            summary: "Data corrupt or stale",
            detail: "A FETC? was attempted after the measurement was invalidated.",
        },
        ErrorEntry {
            code: -230,
            summary: "Data corrupt or stale;Please zero Channel A",
            detail: "The connected sensor has not been zeroed.",
        },
    ];

    #[test]
    fn code_zero_never_fails() {
        assert!(decode(CATALOG, 0, "No error").is_ok());
        assert!(decode(CATALOG, 0, "arbitrary text the meter never sent").is_ok());
    }

    #[test]
    fn duplicate_codes_resolve_by_message() {
        let plain = lookup(CATALOG, "Data corrupt or stale").unwrap();
        let zero = lookup(CATALOG, "Data corrupt or stale;Please zero Channel A").unwrap();
        assert!(plain.detail.contains("FETC?"));
        assert!(zero.detail.contains("zeroed"));
    }

    #[test]
    fn decode_keeps_the_reported_code() {
        let report = decode(CATALOG, -999, "Data corrupt or stale").unwrap_err();
        assert_eq!(report.code, -999);
        assert_eq!(report.summary, "Data corrupt or stale");
        assert!(report.detail.contains("FETC?"));
    }

    #[test]
    fn unknown_message_falls_back_to_raw_text() {
        let report = decode(CATALOG, -700, "Flux capacitor drained").unwrap_err();
        assert_eq!(report.code, -700);
        assert_eq!(report.summary, "Flux capacitor drained");
        assert!(report.detail.is_empty());
    }

    #[test]
    fn common_command_encodings() {
        assert_eq!(Command::Cls.encode(), "*CLS");
        assert_eq!(Command::Sav(5).encode(), "*SAV 5");
        assert_eq!(Command::Ese(32).encode(), "*ESE 32");
        assert_eq!(Query::Idn.mnemonic(), "*IDN?");
        assert_eq!(Query::Esr.mnemonic(), "*ESR?");
    }

    #[test]
    fn event_status_bits() {
        let esr = EventStatusByte::new(0b0010_0100);
        assert!(esr.command_error());
        assert!(esr.query_error());
        assert!(!esr.operation_complete());
    }
}
