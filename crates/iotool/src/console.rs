//! Interactive session driver.
//!
//! Owns the line editor and the register bus for the lifetime of the
//! session. Each cycle holds raw terminal mode only while a line is being
//! edited, so command output is printed in cooked mode.

use std::io::{self, Read, Write};

use iotool_core::editor::LineEditor;
use tracing::{info, warn};

use crate::access::{InitReport, RegisterBus};
use crate::command::{self, Flow};
use crate::config::Config;

pub const BANNER: &str = "IO Access Tool - Low-level hardware register access";
pub const READY: &str = "Type 'help' for available commands.";
pub const GOODBYE: &str = "Exiting IO Access Tool. Goodbye!";

/// Why the session loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// `quit` or `exit`.
    Command,
    /// Ctrl-C, Ctrl-D on an empty line, or the input stream closed.
    Cancelled,
}

/// Print the startup warnings that follow bus initialization.
pub fn report_init<E: Write + ?Sized>(report: &InitReport, err: &mut E) -> io::Result<()> {
    for warning in &report.warnings {
        writeln!(err, "{warning}")?;
    }
    if !report.usable() {
        writeln!(err, "Initialization failed. Some features may not work properly.")?;
        writeln!(err, "Try running with root privileges for full functionality.")?;
    }
    if !report.is_root {
        writeln!(err, "Warning: Running without root privileges. Many operations will fail.")?;
    }
    err.flush()
}

/// Read-interpret loop over one register bus.
#[derive(Debug)]
pub struct Console<B> {
    prompt: String,
    editor: LineEditor,
    bus: B,
    raw_mode_warned: bool,
}

impl<B: RegisterBus> Console<B> {
    #[must_use]
    pub fn new(config: &Config, bus: B) -> Self {
        Self {
            prompt: config.prompt.clone(),
            editor: LineEditor::new(config.editor()),
            bus,
            raw_mode_warned: false,
        }
    }

    /// Run until the user quits or input ends.
    ///
    /// `raw_mode` is called at the start of every cycle and its guard is
    /// dropped once the line is read. If it fails, the failure is reported
    /// once and lines are still edited without raw mode.
    pub fn run<I, O, E, M, G>(
        &mut self,
        input: &mut I,
        out: &mut O,
        err: &mut E,
        mut raw_mode: M,
    ) -> io::Result<ExitReason>
    where
        I: Read + ?Sized,
        O: Write + ?Sized,
        E: Write + ?Sized,
        M: FnMut() -> io::Result<G>,
    {
        loop {
            let line = {
                let _guard = match raw_mode() {
                    Ok(guard) => Some(guard),
                    Err(e) => {
                        self.warn_raw_mode(&e, err)?;
                        None
                    }
                };
                self.editor.read_line(&self.prompt, input, out)?
            };

            let Some(line) = line else {
                info!("session cancelled");
                return Ok(ExitReason::Cancelled);
            };
            if command::execute(&line, &mut self.bus, out, err)? == Flow::Exit {
                info!("session ended by command");
                return Ok(ExitReason::Command);
            }
        }
    }

    fn warn_raw_mode<E: Write + ?Sized>(&mut self, e: &io::Error, err: &mut E) -> io::Result<()> {
        if self.raw_mode_warned {
            return Ok(());
        }
        self.raw_mode_warned = true;
        warn!(error = %e, "raw mode unavailable, editing without it");
        writeln!(err, "Warning: Failed to enable raw terminal mode: {e}")?;
        err.flush()
    }

    /// Release history and hand back the bus.
    pub fn finish(mut self) -> B {
        self.editor.shutdown();
        self.bus
    }

    #[must_use]
    pub fn editor(&self) -> &LineEditor {
        &self.editor
    }
}
