use std::io::{self, Write};
use std::process::ExitCode;

use iotool::config::Config;
use iotool::console::{self, BANNER, Console, GOODBYE, READY};
use iotool_core::terminal::{RawModeGuard, SignalGuard};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("iotool: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(unix)]
fn run() -> io::Result<()> {
    use iotool::access::HardwareBus;

    let parsed = Config::from_env_with_diagnostics();
    let config = parsed.config;
    if let Err(err) = iotool::logging::init(&config) {
        eprintln!("Warning: logging disabled: {err}");
    }
    for err in &parsed.errors {
        tracing::warn!(%err, "ignoring invalid configuration value");
        eprintln!("Warning: ignoring invalid setting {err}");
    }

    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    writeln!(stdout, "{BANNER}")?;
    stdout.flush()?;

    let (bus, report) = HardwareBus::open(&config.access());
    console::report_init(&report, &mut stderr)?;

    writeln!(stdout, "{READY}")?;
    stdout.flush()?;

    let _signals = SignalGuard::install()?;
    let mut session = Console::new(&config, bus);
    let reason = session.run(&mut io::stdin(), &mut stdout, &mut stderr, RawModeGuard::enter)?;
    tracing::info!(?reason, "session finished");

    // Closes the memory device.
    drop(session.finish());

    writeln!(stdout, "{GOODBYE}")?;
    stdout.flush()
}

#[cfg(not(unix))]
fn run() -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "hardware register access requires a Unix host",
    ))
}
