#![deny(unsafe_code)]

//! Interactive console for hardware register access.
//!
//! # Role
//! `iotool` wires the line editor from `iotool-core` to a register bus:
//! - [`access`]: the [`access::RegisterBus`] seam and the hardware bus
//!   (port I/O and memory-mapped pages).
//! - [`command`]: parses and runs `iorb`/`iowb`-style commands.
//! - [`console`]: the read-interpret loop.
//! - [`config`] and [`logging`]: environment configuration and tracing setup.

pub mod access;
pub mod command;
pub mod config;
pub mod console;
pub mod logging;
