use std::{
    io::{BufRead, BufReader, Read, Write},
    marker::PhantomData,
    time::Duration,
};

use tracing::debug;

use crate::protocols::Protocol;
use crate::scpi::{self, error::ScpiError, ErrorEntry};

type Bound<P, ID> = Result<Instrument<Messenger<<P as Protocol>::IO>, ID>, <P as Protocol>::Error>;

pub mod e4418;

pub trait Model {
    const DESCRIPTION: &'static str;
    /// The instrument's documented error list, in manual order.
    const ERRORS: &'static [ErrorEntry];
    type SetCommand: InstructionSet<false>;
    type QueryCommand: InstructionSet<true>;
}

pub trait InstructionSet<const REPLY: bool> {
    const TERMINATOR: u8;
    const END_BYTE: u8;
    fn to_bytes(command: Self) -> Box<[u8]>;
}

/// Clock used by commands that start a long physical routine on the
/// instrument. Injectable so tests observe the settling wait instead of
/// sleeping through it.
pub trait Delay {
    fn sleep(&mut self, duration: Duration);
}

/// Blocks the calling thread for the full settling time.
#[derive(Debug, Default)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

pub struct Messenger<IO: Write + Read> {
    io: IO,
}

impl<IO: Write + Read> Write for Messenger<IO> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.io.write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        self.io.flush()
    }
}

impl<IO: Write + Read> Read for Messenger<IO> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.io.read(buf)
    }
}

impl<IO: Write + Read> Messenger<IO> {
    pub fn new(io: IO) -> Self {
        Self { io }
    }
    pub fn bind<M: Model>(self, _model: M) -> Instrument<Self, M> {
        Instrument {
            messenger: BufReader::new(self),
            model: PhantomData,
            buf: Vec::new(),
        }
    }
}

/// One instrument on one exclusively owned transport. Every operation
/// takes `&mut self` and performs at most one send and one blocking
/// read, so commands and responses can never interleave on the link.
pub struct Instrument<IO: Write + Read, M: Model> {
    messenger: BufReader<IO>,
    model: PhantomData<M>,
    buf: Vec<u8>,
}

impl<IO: Write + Read, M: Model> Write for Instrument<IO, M> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.messenger.get_mut().write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        self.messenger.get_mut().flush()
    }
}

impl<IO: Write + Read, M: Model> Read for Instrument<IO, M> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.messenger.read(buf)
    }
}

impl<IO: Write + Read, M: Model> BufRead for Instrument<IO, M> {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        self.messenger.fill_buf()
    }
    fn consume(&mut self, amt: usize) {
        self.messenger.consume(amt)
    }
}

impl<IO: Write + Read, M: Model> Instrument<IO, M> {
    pub fn set(&mut self, command: M::SetCommand) -> Result<(), ScpiError> {
        let message = InstructionSet::to_bytes(command);
        debug!(command = %String::from_utf8_lossy(&message).trim_end(), "send");
        self.write_all(&message)?;
        self.flush()?;
        Ok(())
    }

    pub fn query(&mut self, command: M::QueryCommand) -> Result<String, ScpiError> {
        let message = InstructionSet::to_bytes(command);
        debug!(command = %String::from_utf8_lossy(&message).trim_end(), "send");
        self.write_all(&message)?;
        self.flush()?;
        self.read_reply()
    }

    /// SYST:ERR? round trip. Pops one entry from the instrument's FIFO
    /// error queue (capacity 30); code 0 means the queue is empty.
    pub fn query_error(&mut self) -> Result<(i32, String), ScpiError> {
        self.write_all(b"SYST:ERR?")?;
        self.write_all(&[M::QueryCommand::TERMINATOR])?;
        self.flush()?;
        let line = self.read_reply()?;
        parse_error_line(&line)
    }

    /// The post-command sentinel: most SCPI set commands return nothing,
    /// so the only way to learn they failed is to pop the error queue.
    pub fn check_errors(&mut self) -> Result<(), ScpiError> {
        let (code, message) = self.query_error()?;
        scpi::decode(M::ERRORS, code, &message).map_err(ScpiError::Device)
    }

    /// Runs a command that starts a long physical routine: send, verify
    /// the command was accepted, block for the documented settling time,
    /// verify the routine itself succeeded. A failed post-send check
    /// returns immediately and the wait is never entered.
    pub fn execute_timed<D: Delay>(
        &mut self,
        command: M::SetCommand,
        settle: Duration,
        delay: &mut D,
    ) -> Result<(), ScpiError> {
        self.set(command)?;
        self.check_errors()?;
        debug!(settle_secs = settle.as_secs(), "waiting for the instrument to settle");
        delay.sleep(settle);
        self.check_errors()
    }

    fn read_reply(&mut self) -> Result<String, ScpiError> {
        self.buf.clear();
        let n = self
            .messenger
            .read_until(M::QueryCommand::END_BYTE, &mut self.buf)?;
        if n == 0 {
            return Err(ScpiError::Communication(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "instrument closed the connection",
            )));
        }
        let line = String::from_utf8_lossy(&self.buf).trim().to_string();
        debug!(reply = %line, "recv");
        Ok(line)
    }
}

/// Parses one error-queue reply of the form `<int>,"<message>"`.
///
/// The split is at the first comma only: several documented messages
/// themselves contain commas. Surrounding quotes and whitespace inside
/// them are stripped.
fn parse_error_line(line: &str) -> Result<(i32, String), ScpiError> {
    let line = line.trim();
    let mut fields = line.splitn(2, ',');
    let code = fields.next().unwrap_or("");
    let message = match fields.next() {
        Some(message) => message,
        None => {
            return Err(ScpiError::Parse {
                line: line.to_string(),
            })
        }
    };
    let code = code.trim().parse::<i32>().map_err(|_| ScpiError::Parse {
        line: line.to_string(),
    })?;
    let message = message.trim().trim_matches('"').trim().to_string();
    Ok((code, message))
}

#[cfg(test)]
mod tests {
    use super::e4418::{Set, E4418, ZERO_SETTLE};
    use super::*;
    use std::cell::RefCell;
    use std::io::{self, Cursor};
    use std::rc::Rc;

    /// In-memory transport scripted with canned reply lines. Everything
    /// written lands in the shared `sent` buffer.
    struct FakeMeter {
        sent: Rc<RefCell<Vec<u8>>>,
        replies: Cursor<Vec<u8>>,
    }

    impl Write for FakeMeter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.sent.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Read for FakeMeter {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.replies.read(buf)
        }
    }

    struct FakeDelay {
        slept: Vec<Duration>,
    }

    impl Delay for FakeDelay {
        fn sleep(&mut self, duration: Duration) {
            self.slept.push(duration);
        }
    }

    fn fake(replies: &[&str]) -> (Instrument<Messenger<FakeMeter>, E4418>, Rc<RefCell<Vec<u8>>>) {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let io = FakeMeter {
            sent: Rc::clone(&sent),
            replies: Cursor::new(replies.concat().into_bytes()),
        };
        (Messenger::new(io).bind(E4418), sent)
    }

    fn sent_text(sent: &Rc<RefCell<Vec<u8>>>) -> String {
        String::from_utf8(sent.borrow().clone()).unwrap()
    }

    #[test]
    fn query_error_parses_an_empty_queue_reply() {
        let (mut meter, sent) = fake(&["  +0,\"No error.\"\n"]);
        assert_eq!(meter.query_error().unwrap(), (0, "No error.".to_string()));
        assert_eq!(sent_text(&sent), "SYST:ERR?\n");
    }

    #[test]
    fn query_error_is_idempotent_on_an_empty_queue() {
        let reply = "0,\"No error.\"\n";
        let (mut meter, _sent) = fake(&[reply, reply, reply]);
        for _ in 0..3 {
            assert_eq!(meter.query_error().unwrap(), (0, "No error.".to_string()));
        }
    }

    #[test]
    fn query_error_keeps_commas_inside_the_message() {
        let (mut meter, _sent) = fake(&["-222,\"Data out of range, upper window\"\n"]);
        let (code, message) = meter.query_error().unwrap();
        assert_eq!(code, -222);
        assert_eq!(message, "Data out of range, upper window");
    }

    #[test]
    fn query_error_rejects_a_reply_without_a_comma() {
        let (mut meter, _sent) = fake(&["garbage\n"]);
        match meter.query_error() {
            Err(ScpiError::Parse { line }) => assert_eq!(line, "garbage"),
            other => panic!("expected a parse failure, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn query_error_rejects_a_non_numeric_code() {
        let (mut meter, _sent) = fake(&["oops,\"No error.\"\n"]);
        assert!(matches!(meter.query_error(), Err(ScpiError::Parse { .. })));
    }

    #[test]
    fn check_errors_passes_on_code_zero() {
        let (mut meter, _sent) = fake(&["0,\"No error.\"\n"]);
        assert!(meter.check_errors().is_ok());
    }

    #[test]
    fn check_errors_decodes_a_cataloged_error() {
        let (mut meter, _sent) = fake(&["-224,\"Illegal parameter value\"\n"]);
        let report = match meter.check_errors() {
            Err(ScpiError::Device(report)) => report,
            other => panic!("expected a device error, got {:?}", other.map(|_| ())),
        };
        assert_eq!(report.code, -224);
        assert_eq!(report.summary, "Illegal parameter value");
        assert!(report.detail.contains("discrete parameter"));
    }

    #[test]
    fn check_errors_preserves_an_uncataloged_message() {
        let (mut meter, _sent) = fake(&["-800,\"Firmware rev 3 surprise\"\n"]);
        let report = meter.check_errors().unwrap_err();
        let report = match report {
            ScpiError::Device(report) => report,
            other => panic!("expected a device error, got {}", other),
        };
        assert_eq!(report.summary, "Firmware rev 3 surprise");
        assert!(report.detail.is_empty());
    }

    #[test]
    fn check_errors_drains_the_queue_in_fifo_order() {
        let (mut meter, _sent) = fake(&[
            "-113,\"Undefined header\"\n",
            "-224,\"Illegal parameter value\"\n",
            "0,\"No error.\"\n",
        ]);
        assert_eq!(meter.query_error().unwrap().0, -113);
        assert_eq!(meter.query_error().unwrap().0, -224);
        assert_eq!(meter.query_error().unwrap().0, 0);
    }

    #[test]
    fn timed_command_checks_before_and_after_the_wait() {
        let (mut meter, sent) = fake(&["0,\"No error.\"\n", "0,\"No error.\"\n"]);
        let mut delay = FakeDelay { slept: Vec::new() };
        meter
            .execute_timed(Set::ZeroOnce(1), ZERO_SETTLE, &mut delay)
            .unwrap();
        assert_eq!(
            sent_text(&sent),
            "CAL1:ZERO:AUTO ONCE\nSYST:ERR?\nSYST:ERR?\n"
        );
        assert_eq!(delay.slept, vec![ZERO_SETTLE]);
    }

    #[test]
    fn timed_command_fails_fast_and_skips_the_wait() {
        let (mut meter, sent) = fake(&["-224,\"Illegal parameter value\"\n"]);
        let mut delay = FakeDelay { slept: Vec::new() };
        let err = meter
            .execute_timed(Set::ZeroOnce(9), ZERO_SETTLE, &mut delay)
            .unwrap_err();
        assert!(matches!(err, ScpiError::Device(_)));
        assert!(delay.slept.is_empty());
        // exactly one error check went out before the bail-out
        assert_eq!(sent_text(&sent), "CAL9:ZERO:AUTO ONCE\nSYST:ERR?\n");
    }

    #[test]
    fn timed_command_surfaces_a_post_wait_zero_error() {
        let (mut meter, _sent) = fake(&[
            "0,\"No error.\"\n",
            "-231,\"Data questionable;ZERO ERROR\"\n",
        ]);
        let mut delay = FakeDelay { slept: Vec::new() };
        let err = meter
            .execute_timed(Set::ZeroOnce(1), ZERO_SETTLE, &mut delay)
            .unwrap_err();
        let report = err.report().expect("device error");
        assert_eq!(report.code, -231);
        assert_eq!(report.summary, "Data questionable;ZERO ERROR");
        assert!(report.detail.contains("zeroing failed"));
        assert_eq!(delay.slept, vec![ZERO_SETTLE]);
    }

    #[test]
    fn disconnect_is_a_communication_failure() {
        let (mut meter, _sent) = fake(&[]);
        assert!(matches!(
            meter.query_error(),
            Err(ScpiError::Communication(_))
        ));
    }
}
