//! Command interpreter.
//!
//! Turns one submitted line into a register operation on a [`RegisterBus`]
//! and writes the result to the output stream. Command errors go to the
//! error stream and never end the session; only `quit`/`exit` do.

use std::fmt;
use std::io::{self, Write};

use tracing::debug;

use crate::access::{AccessError, RegisterBus, Width};

/// Help text printed by `help`.
pub const HELP: &str = "\
Available commands:
  iorb <addr>     - Read byte from IO address
  iorw <addr>     - Read word from IO address
  iord <addr>     - Read double word from IO address
  iowb <addr> <data> - Write byte to IO address
  ioww <addr> <data> - Write word to IO address
  iowd <addr> <data> - Write double word to IO address
  help            - Show this help message
  quit|exit       - Exit the program

Address and data can be specified in decimal, octal (prefix 0) or hexadecimal (prefix 0x)
";

/// What the session should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// A parsed command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Read { width: Width, addr: usize },
    Write { width: Width, addr: usize, value: u64 },
    Help,
    Quit,
}

/// Reasons a line could not be executed.
#[derive(Debug)]
pub enum CommandError {
    MissingAddress(String),
    MissingData(String),
    InvalidAddress(String),
    InvalidData(String),
    Unknown(String),
    Access(AccessError),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAddress(cmd) => write!(f, "Missing address argument for {cmd}"),
            Self::MissingData(cmd) => write!(f, "Missing address or data argument for {cmd}"),
            Self::InvalidAddress(token) => write!(f, "Invalid address: {token}"),
            Self::InvalidData(token) => write!(f, "Invalid data: {token}"),
            Self::Unknown(cmd) => {
                write!(f, "Unknown command: {cmd}. Type 'help' for available commands.")
            }
            Self::Access(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Access(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AccessError> for CommandError {
    fn from(err: AccessError) -> Self {
        Self::Access(err)
    }
}

/// Parse an unsigned number.
///
/// `0x` selects hexadecimal, a leading `0` followed by more digits selects
/// octal, anything else is decimal. The whole token must be a number.
#[must_use]
pub fn parse_number(token: &str) -> Option<u64> {
    let (digits, radix) = if let Some(hex) = token.strip_prefix("0x") {
        (hex, 16)
    } else if token.len() > 1 && token.starts_with('0') {
        (&token[1..], 8)
    } else {
        (token, 10)
    };
    // from_str_radix accepts a leading '+', which is not a digit here.
    if digits.is_empty() || !digits.bytes().all(|b| (b as char).is_digit(radix)) {
        return None;
    }
    u64::from_str_radix(digits, radix).ok()
}

fn parse_address(token: &str) -> Result<usize, CommandError> {
    parse_number(token)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| CommandError::InvalidAddress(token.to_string()))
}

impl Command {
    /// Parse a line. `Ok(None)` means the line was blank.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let mut tokens = line.split_whitespace();
        let Some(name) = tokens.next() else {
            return Ok(None);
        };
        let arg1 = tokens.next();
        let arg2 = tokens.next();

        let command = match name {
            "iorb" | "iorw" | "iord" => {
                let width = width_suffix(name);
                let token = arg1.ok_or_else(|| CommandError::MissingAddress(name.to_string()))?;
                Self::Read {
                    width,
                    addr: parse_address(token)?,
                }
            }
            "iowb" | "ioww" | "iowd" => {
                let width = width_suffix(name);
                let (Some(addr), Some(data)) = (arg1, arg2) else {
                    return Err(CommandError::MissingData(name.to_string()));
                };
                let addr = parse_address(addr)?;
                let value =
                    parse_number(data).ok_or_else(|| CommandError::InvalidData(data.to_string()))?;
                Self::Write { width, addr, value }
            }
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn width_suffix(name: &str) -> Width {
    match name.as_bytes().last() {
        Some(b'b') => Width::Byte,
        Some(b'w') => Width::Word,
        _ => Width::Dword,
    }
}

/// Run `command` against `bus`, writing its result to `out`.
pub fn run<B: RegisterBus + ?Sized, W: Write + ?Sized>(
    command: Command,
    bus: &mut B,
    out: &mut W,
) -> Result<Flow, RunError> {
    match command {
        Command::Read { width, addr } => {
            let value = bus.read(addr, width)?;
            writeln!(out, "0x{value:0digits$X}", digits = width.hex_digits())?;
        }
        Command::Write { width, addr, value } => {
            let value = width.truncate(value);
            bus.write(addr, width, value)?;
            writeln!(
                out,
                "Write {width} 0x{value:0digits$X} to address 0x{addr:X}",
                digits = width.hex_digits()
            )?;
        }
        Command::Help => out.write_all(HELP.as_bytes())?,
        Command::Quit => return Ok(Flow::Exit),
    }
    Ok(Flow::Continue)
}

/// Failure of [`run`]: either the command failed or the output stream did.
#[derive(Debug)]
pub enum RunError {
    Command(CommandError),
    Io(io::Error),
}

impl From<AccessError> for RunError {
    fn from(err: AccessError) -> Self {
        Self::Command(CommandError::Access(err))
    }
}

impl From<io::Error> for RunError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Parse and run one line.
///
/// Command errors are written to `err` and the session continues. Only a
/// failing output stream is returned as an error.
pub fn execute<B, O, E>(line: &str, bus: &mut B, out: &mut O, err: &mut E) -> io::Result<Flow>
where
    B: RegisterBus + ?Sized,
    O: Write + ?Sized,
    E: Write + ?Sized,
{
    let result = match Command::parse(line) {
        Ok(None) => Ok(Flow::Continue),
        Ok(Some(command)) => {
            debug!(?command, "executing");
            run(command, bus, out)
        }
        Err(e) => Err(RunError::Command(e)),
    };
    out.flush()?;
    match result {
        Ok(flow) => Ok(flow),
        Err(RunError::Command(e)) => {
            debug!(error = %e, "command failed");
            writeln!(err, "{e}")?;
            err.flush()?;
            Ok(Flow::Continue)
        }
        Err(RunError::Io(e)) => Err(e),
    }
}
