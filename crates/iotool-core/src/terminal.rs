#![forbid(unsafe_code)]

//! Terminal mode lifecycle.
//!
//! Two RAII guards keep the controlling terminal usable on every exit path:
//!
//! - [`RawModeGuard`] puts the terminal into raw, unbuffered, non-echoing
//!   mode for one input cycle and restores the previous mode on drop.
//! - [`SignalGuard`] is installed once per process. A signal-hook thread
//!   waits for `SIGINT`/`SIGTERM`/`SIGHUP`, restores the terminal, and exits
//!   with `128 + signal`. It never touches editor state.
//!
//! A panic hook installed on first use restores the terminal before the
//! previous hook prints the panic message.
//!
//! # Usage
//!
//! ```no_run
//! use iotool_core::editor::LineEditor;
//! use iotool_core::terminal::{RawModeGuard, SignalGuard};
//!
//! let _signals = SignalGuard::install()?;
//! let mut editor = LineEditor::default();
//!
//! let line = {
//!     let _raw = RawModeGuard::enter()?;
//!     editor.read_line("io> ", &mut std::io::stdin(), &mut std::io::stdout())?
//! };
//! // Raw mode is released here, before the line is interpreted.
//! # Ok::<(), std::io::Error>(())
//! ```

use std::io::{self, IsTerminal, Write};
use std::sync::OnceLock;

#[cfg(unix)]
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
#[cfg(unix)]
use signal_hook::iterator::Signals;

/// Raw mode held for the lifetime of the guard.
///
/// # Contract
///
/// - Only one guard should exist at a time.
/// - Dropping the guard (normally, via `?`, or during unwinding) leaves raw
///   mode. Errors during restore are ignored.
#[derive(Debug)]
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    /// Enter raw mode.
    ///
    /// # Errors
    ///
    /// Returns an error if stdin is not a terminal or its attributes cannot
    /// be changed. Stdin is checked first so that piped input never puts the
    /// controlling terminal into raw mode.
    pub fn enter() -> io::Result<Self> {
        if !io::stdin().is_terminal() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "stdin is not a terminal",
            ));
        }
        install_panic_hook();
        crossterm::terminal::enable_raw_mode()?;
        crate::trace!("terminal raw mode enabled");
        Ok(Self { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::terminal::disable_raw_mode();
        let _ = io::stdout().flush();
        crate::trace!("terminal raw mode disabled");
    }
}

fn install_panic_hook() {
    static HOOK: OnceLock<()> = OnceLock::new();
    HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            restore_terminal();
            previous(info);
        }));
    });
}

/// Best-effort terminal restore, safe to call when raw mode is not active.
pub fn restore_terminal() {
    let _ = crossterm::terminal::disable_raw_mode();
    let _ = io::stdout().flush();
}

/// Exit status used after a terminating signal.
#[must_use]
pub const fn signal_exit_code(signal: i32) -> i32 {
    128 + signal
}

/// Process-wide termination handler.
#[cfg(unix)]
#[derive(Debug)]
pub struct SignalGuard {
    handle: signal_hook::iterator::Handle,
    thread: Option<std::thread::JoinHandle<()>>,
}

#[cfg(unix)]
impl SignalGuard {
    /// Register the handler and start its thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal handlers cannot be registered.
    pub fn install() -> io::Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP]).map_err(io::Error::other)?;
        let handle = signals.handle();
        let thread = std::thread::spawn(move || {
            for signal in signals.forever() {
                crate::warn!(signal, "termination signal received, restoring terminal");
                restore_terminal();
                // Leave the shell prompt on a fresh line.
                let _ = io::stdout().write_all(b"\r\n");
                let _ = io::stdout().flush();
                std::process::exit(signal_exit_code(signal));
            }
        });
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

#[cfg(unix)]
impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// No signal handling off Unix; raw mode is still released by [`RawModeGuard`].
#[cfg(not(unix))]
#[derive(Debug)]
pub struct SignalGuard;

#[cfg(not(unix))]
impl SignalGuard {
    pub fn install() -> io::Result<Self> {
        Ok(Self)
    }
}
