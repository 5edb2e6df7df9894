#![forbid(unsafe_code)]

//! PTY utilities for driving the `iotool` binary in integration tests.
//!
//! The line editor only behaves like it does at a real terminal when stdin
//! is a TTY: raw mode, byte-at-a-time input, and in-place repainting. These
//! helpers spawn the binary behind a pseudo-terminal, feed it keystrokes, and
//! capture everything it writes.
//!
//! `portable-pty` provides the PTY pair; a reader thread forwards output over
//! a channel so reads can time out.

use std::fmt;
use std::io::{self, Read, Write};
#[cfg(unix)]
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

pub use portable_pty::{CommandBuilder, ExitStatus};
use portable_pty::{MasterPty, PtySize};

/// Configuration for PTY-backed test sessions.
#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// PTY width in columns.
    pub cols: u16,
    /// PTY height in rows.
    pub rows: u16,
    /// TERM to set in the child (defaults to xterm-256color).
    pub term: Option<String>,
    /// Extra environment variables to set in the child.
    pub env: Vec<(String, String)>,
    /// Optional test name for logging context.
    pub test_name: Option<String>,
    /// Enable structured PTY logging to stderr.
    pub log_events: bool,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            cols: 80,
            rows: 24,
            term: Some("xterm-256color".to_string()),
            env: Vec::new(),
            test_name: None,
            log_events: true,
        }
    }
}

impl PtyConfig {
    /// Add an environment variable in the child.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Attach a test name for logging context.
    pub fn with_test_name(mut self, name: impl Into<String>) -> Self {
        self.test_name = Some(name.into());
        self
    }

    /// Enable or disable log output.
    pub fn logging(mut self, enabled: bool) -> Self {
        self.log_events = enabled;
        self
    }
}

#[derive(Debug)]
enum ReaderMsg {
    Data(Vec<u8>),
    Eof,
    Err(io::Error),
}

/// A spawned PTY session with captured output.
pub struct PtySession {
    child: Box<dyn portable_pty::Child + Send + Sync>,
    /// Held so the terminal settings outlive the child.
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    rx: mpsc::Receiver<ReaderMsg>,
    reader_thread: Option<thread::JoinHandle<()>>,
    captured: Vec<u8>,
    eof: bool,
    config: PtyConfig,
}

impl fmt::Debug for PtySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PtySession")
            .field("child_pid", &self.child.process_id())
            .field("captured_len", &self.captured.len())
            .field("eof", &self.eof)
            .field("config", &self.config)
            .finish()
    }
}

/// Spawn a command into a new PTY.
///
/// `config.term` and `config.env` are applied to the `CommandBuilder` before spawn.
pub fn spawn_command(mut config: PtyConfig, mut cmd: CommandBuilder) -> io::Result<PtySession> {
    if let Some(name) = config.test_name.as_ref() {
        log_event(config.log_events, "PTY_TEST_START", name);
    }

    if let Some(term) = config.term.take() {
        cmd.env("TERM", term);
    }
    for (k, v) in config.env.drain(..) {
        cmd.env(k, v);
    }

    let pty_system = portable_pty::native_pty_system();
    let pair = pty_system
        .openpty(PtySize {
            rows: config.rows,
            cols: config.cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(portable_pty_error)?;

    let child = pair.slave.spawn_command(cmd).map_err(portable_pty_error)?;
    let mut reader = pair.master.try_clone_reader().map_err(portable_pty_error)?;
    let writer = pair.master.take_writer().map_err(portable_pty_error)?;

    let (tx, rx) = mpsc::channel::<ReaderMsg>();
    let reader_thread = thread::spawn(move || {
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => {
                    let _ = tx.send(ReaderMsg::Eof);
                    break;
                }
                Ok(n) => {
                    let _ = tx.send(ReaderMsg::Data(buf[..n].to_vec()));
                }
                Err(err) => {
                    let _ = tx.send(ReaderMsg::Err(err));
                    break;
                }
            }
        }
    });

    Ok(PtySession {
        child,
        master: pair.master,
        writer,
        rx,
        reader_thread: Some(reader_thread),
        captured: Vec::new(),
        eof: false,
        config,
    })
}

impl PtySession {
    /// Read output until `pattern` appears after byte offset `from`, or the
    /// timeout elapses.
    ///
    /// Searching from an offset lets a test wait for the *next* prompt
    /// instead of matching one that was already printed.
    pub fn read_until_after(
        &mut self,
        from: usize,
        pattern: &[u8],
        timeout: Duration,
    ) -> io::Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut retries_remaining = 3u32;

        loop {
            let haystack = self.captured.get(from..).unwrap_or_default();
            if find_subsequence(haystack, pattern).is_some() {
                log_event(
                    self.config.log_events,
                    "PTY_CHECK",
                    format!("pattern_found bytes={}", self.captured.len()),
                );
                return Ok(self.captured.clone());
            }

            if self.eof || Instant::now() >= deadline {
                break;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.read_available(remaining) {
                Ok(_) => retries_remaining = 3,
                Err(err) if is_transient_error(&err) && retries_remaining > 0 => {
                    retries_remaining -= 1;
                    log_event(
                        self.config.log_events,
                        "PTY_RETRY",
                        format!("transient_error={} retries_left={retries_remaining}", err.kind()),
                    );
                    thread::sleep(Duration::from_millis(25).min(remaining));
                }
                Err(err) => return Err(err),
            }
        }

        Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!(
                "PTY read_until timed out (captured {} bytes)\n{}",
                self.captured.len(),
                printable_dump(&self.captured, 1024)
            ),
        ))
    }

    /// Read output until `pattern` is found anywhere or a timeout elapses.
    pub fn read_until(&mut self, pattern: &[u8], timeout: Duration) -> io::Result<Vec<u8>> {
        self.read_until_after(0, pattern, timeout)
    }

    /// Send input bytes to the child process.
    pub fn send_input(&mut self, bytes: &[u8]) -> io::Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }

        self.writer.write_all(bytes)?;
        self.writer.flush()?;

        log_event(
            self.config.log_events,
            "PTY_INPUT",
            format!("sent_bytes={}", bytes.len()),
        );

        Ok(())
    }

    /// Wait for the child to exit and return its status.
    pub fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait()
    }

    /// Wait for the child and drain all remaining output.
    pub fn wait_and_drain(&mut self, drain_timeout: Duration) -> io::Result<ExitStatus> {
        let status = self.child.wait()?;
        let _ = self.drain_remaining(drain_timeout)?;
        Ok(status)
    }

    /// Access all captured output so far.
    pub fn output(&self) -> &[u8] {
        &self.captured
    }

    /// Captured output with escape sequences removed.
    pub fn output_text(&self) -> String {
        strip_escapes(&self.captured)
    }

    /// Child process id (if available on this platform).
    pub fn child_pid(&self) -> Option<u32> {
        self.child.process_id()
    }

    /// Current line-discipline settings of the PTY, as printed by `stty -a`.
    ///
    /// Still readable after the child exits, which shows whether it left
    /// the terminal in a usable mode.
    #[cfg(unix)]
    pub fn tty_settings(&self) -> io::Result<String> {
        let path = self
            .master
            .tty_name()
            .ok_or_else(|| io::Error::other("PTY has no slave device name"))?;
        let tty = std::fs::File::open(&path)?;
        let output = Command::new("stty")
            .arg("-a")
            .stdin(Stdio::from(tty))
            .stderr(Stdio::null())
            .output()?;
        if !output.status.success() {
            return Err(io::Error::other(format!(
                "stty -a failed on {}: {}",
                path.display(),
                output.status
            )));
        }
        log_event(
            self.config.log_events,
            "PTY_STTY",
            format!("tty={}", path.display()),
        );
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn absorb(&mut self, msg: ReaderMsg) -> io::Result<usize> {
        match msg {
            ReaderMsg::Data(bytes) => {
                self.captured.extend_from_slice(&bytes);
                Ok(bytes.len())
            }
            ReaderMsg::Eof => {
                self.eof = true;
                Ok(0)
            }
            ReaderMsg::Err(err) => Err(err),
        }
    }

    /// Wait up to `timeout` for one message, then take whatever else is queued.
    fn read_available(&mut self, timeout: Duration) -> io::Result<usize> {
        if self.eof {
            return Ok(0);
        }

        let first = match self.rx.recv_timeout(timeout) {
            Ok(msg) => msg,
            Err(mpsc::RecvTimeoutError::Timeout) => return Ok(0),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                self.eof = true;
                return Ok(0);
            }
        };

        let mut total = self.absorb(first)?;
        while !self.eof {
            match self.rx.try_recv() {
                Ok(msg) => total = total.saturating_add(self.absorb(msg)?),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => self.eof = true,
            }
        }

        if total > 0 {
            log_event(
                self.config.log_events,
                "PTY_OUTPUT",
                format!("captured_bytes={total}"),
            );
        }
        Ok(total)
    }

    /// Drain all remaining output until EOF or timeout.
    ///
    /// Output may still be in transit through the PTY after the child exits.
    pub fn drain_remaining(&mut self, timeout: Duration) -> io::Result<usize> {
        let deadline = Instant::now() + timeout;
        let mut total = 0usize;
        while !self.eof {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                log_event(
                    self.config.log_events,
                    "PTY_DRAIN_TIMEOUT",
                    format!("captured_bytes={total}"),
                );
                break;
            }
            let n = self.read_available(remaining)?;
            if n == 0 && !self.eof {
                break;
            }
            total = total.saturating_add(n);
        }
        Ok(total)
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        // Best-effort cleanup: close writer (sends EOF), then try to terminate the child.
        let _ = self.writer.flush();
        let _ = self.child.kill();

        if let Some(handle) = self.reader_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Remove CSI sequences (`ESC [ ... final`) and carriage returns.
///
/// What remains is the text a line-oriented reader would see.
pub fn strip_escapes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            0x1B if bytes.get(i + 1) == Some(&b'[') => {
                i += 2;
                while i < bytes.len() && !(0x40..=0x7E).contains(&bytes[i]) {
                    i += 1;
                }
                i += 1;
            }
            b'\r' => i += 1,
            b => {
                out.push(char::from(b));
                i += 1;
            }
        }
    }
    out
}

/// Look up a boolean flag in `stty -a` output.
///
/// `stty` prints a set flag as `echo` and a cleared one as `-echo`.
pub fn stty_flag(settings: &str, flag: &str) -> Option<bool> {
    settings.split_whitespace().find_map(|token| {
        if token == flag {
            Some(true)
        } else if token.strip_prefix('-') == Some(flag) {
            Some(false)
        } else {
            None
        }
    })
}

/// Count non-overlapping occurrences of `needle`.
pub fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
    if needle.is_empty() {
        return 0;
    }
    let mut count = 0;
    let mut rest = haystack;
    while let Some(pos) = find_subsequence(rest, needle) {
        count += 1;
        rest = &rest[pos + needle.len()..];
    }
    count
}

fn log_event(enabled: bool, event: &str, detail: impl fmt::Display) {
    if !enabled {
        return;
    }

    let timestamp = timestamp_rfc3339();
    eprintln!("[{timestamp}] {event}: {detail}");
}

fn timestamp_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

fn printable_dump(bytes: &[u8], limit: usize) -> String {
    let mut out = String::new();
    let slice = bytes.get(0..limit).unwrap_or(bytes);

    for (row, chunk) in slice.chunks(16).enumerate() {
        out.push_str(&format!("{:04x}: ", row * 16));
        for b in chunk {
            let ch = if b.is_ascii_graphic() || *b == b' ' {
                *b as char
            } else {
                '.'
            };
            out.push(ch);
        }
        out.push('\n');
    }

    if bytes.len() > limit {
        out.push_str("... (truncated)\n");
    }

    out
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn portable_pty_error<E: fmt::Display>(err: E) -> io::Error {
    io::Error::other(err.to_string())
}

/// Check if an I/O error is transient and worth retrying.
fn is_transient_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
    )
}
