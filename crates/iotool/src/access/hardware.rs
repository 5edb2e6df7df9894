#![allow(unsafe_code)]

//! Bus backed by real hardware.
//!
//! Port I/O uses the x86 `in`/`out` instructions after `iopl(3)`. Memory
//! access maps the page holding the register from the memory device,
//! performs one volatile load or store, and unmaps it again.

use std::ffi::c_void;
use std::fs::{File, OpenOptions};
use std::io;
use std::num::NonZeroUsize;
use std::os::unix::fs::OpenOptionsExt;
use std::ptr::NonNull;

use nix::fcntl::OFlag;
use nix::sys::mman::{MapFlags, ProtFlags, mmap, munmap};
use nix::unistd::{SysconfVar, geteuid, sysconf};
use tracing::{debug, warn};

use super::{
    AccessConfig, AccessError, FALLBACK_PAGE_SIZE, InitReport, RegisterBus, Width,
    is_aligned, is_port_address, map_length, page_base, page_offset,
};

/// Register bus over `iopl` port access and the memory device.
#[derive(Debug)]
pub struct HardwareBus {
    port_access: bool,
    mem: Option<File>,
    page_size: usize,
}

impl HardwareBus {
    /// Acquire whatever access the process is allowed.
    ///
    /// Never fails: missing privileges are recorded in the report and the
    /// affected operations fail later with [`AccessError`].
    pub fn open(config: &AccessConfig) -> (Self, InitReport) {
        let mut report = InitReport {
            is_root: geteuid().is_root(),
            ..InitReport::default()
        };
        if !report.is_root {
            report
                .warnings
                .push("Warning: Root privileges required for direct hardware access".to_string());
        }

        if config.port_io {
            match request_port_access() {
                Ok(()) => report.port_access = true,
                Err(err) => report
                    .warnings
                    .push(format!("Warning: Failed to get I/O port access: {err}")),
            }
        }

        let mem = match OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(OFlag::O_SYNC.bits())
            .open(&config.mem_device)
        {
            Ok(file) => {
                report.memory_access = true;
                Some(file)
            }
            Err(err) => {
                report
                    .warnings
                    .push(format!("Warning: Failed to open {}: {err}", config.mem_device.display()));
                None
            }
        };

        for warning in &report.warnings {
            warn!(%warning, "hardware access degraded");
        }

        let bus = Self {
            port_access: report.port_access,
            mem,
            page_size: system_page_size(),
        };
        debug!(
            port_access = bus.port_access,
            memory_access = bus.mem.is_some(),
            page_size = bus.page_size,
            "hardware bus opened"
        );
        (bus, report)
    }

    fn uses_ports(&self, addr: usize) -> bool {
        self.port_access && is_port_address(addr)
    }

    /// Map the page holding `addr` (and the next one if the register
    /// crosses into it), run `op` on a pointer to the register, unmap.
    fn with_mapped<T>(
        &self,
        addr: usize,
        width: Width,
        prot: ProtFlags,
        op: impl FnOnce(NonNull<c_void>) -> T,
    ) -> Result<T, AccessError> {
        let file = self.mem.as_ref().ok_or(AccessError::MemoryUnavailable)?;

        let base = page_base(addr, self.page_size);
        let offset = page_offset(addr, self.page_size);
        let file_offset =
            nix::libc::off_t::try_from(base).map_err(|_| AccessError::OutOfRange { addr })?;
        let length = NonZeroUsize::new(map_length(offset, width, self.page_size))
            .ok_or(AccessError::OutOfRange { addr })?;

        // SAFETY: a fresh shared mapping of the device; no Rust references
        // into it exist, and it is unmapped before this function returns.
        let page = unsafe {
            mmap(
                None,
                length,
                prot,
                MapFlags::MAP_SHARED,
                file,
                file_offset,
            )
        }
        .map_err(|errno| AccessError::Map {
            addr,
            source: io::Error::from(errno),
        })?;

        // SAFETY: `offset + width.bytes() <= length` by map_length, so the
        // register lies entirely inside the mapping.
        let register = unsafe { page.byte_add(offset) };
        let result = op(register);

        // SAFETY: `page` and `length` are exactly what mmap returned above.
        if let Err(errno) = unsafe { munmap(page, length.get()) } {
            warn!(addr, %errno, "munmap failed");
        }
        Ok(result)
    }
}

impl RegisterBus for HardwareBus {
    fn read(&mut self, addr: usize, width: Width) -> Result<u32, AccessError> {
        let value = if self.uses_ports(addr) {
            port::read(addr as u16, width)
        } else {
            // SAFETY: `ptr` covers `width` mapped bytes (see with_mapped).
            self.with_mapped(addr, width, ProtFlags::PROT_READ, |ptr| unsafe {
                read_mapped(ptr, width, is_aligned(addr, width))
            })?
        };
        debug!(addr, %width, value, "register read");
        Ok(value)
    }

    fn write(&mut self, addr: usize, width: Width, value: u32) -> Result<(), AccessError> {
        let value = width.truncate(u64::from(value));
        if self.uses_ports(addr) {
            port::write(addr as u16, width, value);
        } else {
            let prot = ProtFlags::PROT_READ | ProtFlags::PROT_WRITE;
            // SAFETY: `ptr` covers `width` mapped bytes (see with_mapped).
            self.with_mapped(addr, width, prot, |ptr| unsafe {
                write_mapped(ptr, width, value, is_aligned(addr, width));
            })?;
        }
        debug!(addr, %width, value, "register write");
        Ok(())
    }
}

/// One volatile load of `width`, or little-endian byte loads when `ptr` is
/// not aligned for it.
///
/// # Safety
///
/// `ptr` must be valid for reads of `width.bytes()` bytes.
unsafe fn read_mapped(ptr: NonNull<c_void>, width: Width, aligned: bool) -> u32 {
    // SAFETY: guaranteed by the caller; aligned pointers are checked first.
    unsafe {
        match (width, aligned) {
            (Width::Byte, _) => u32::from(ptr.cast::<u8>().read_volatile()),
            (Width::Word, true) => u32::from(ptr.cast::<u16>().read_volatile()),
            (Width::Dword, true) => ptr.cast::<u32>().read_volatile(),
            (_, false) => {
                let bytes = ptr.cast::<u8>();
                (0..width.bytes()).rev().fold(0u32, |acc, i| {
                    (acc << 8) | u32::from(bytes.add(i).read_volatile())
                })
            }
        }
    }
}

/// Counterpart of [`read_mapped`] for stores.
///
/// # Safety
///
/// `ptr` must be valid for writes of `width.bytes()` bytes.
unsafe fn write_mapped(ptr: NonNull<c_void>, width: Width, value: u32, aligned: bool) {
    // SAFETY: guaranteed by the caller; aligned pointers are checked first.
    unsafe {
        match (width, aligned) {
            (Width::Byte, _) => ptr.cast::<u8>().write_volatile(value as u8),
            (Width::Word, true) => ptr.cast::<u16>().write_volatile(value as u16),
            (Width::Dword, true) => ptr.cast::<u32>().write_volatile(value),
            (_, false) => {
                let bytes = ptr.cast::<u8>();
                for i in 0..width.bytes() {
                    bytes.add(i).write_volatile((value >> (8 * i)) as u8);
                }
            }
        }
    }
}

fn system_page_size() -> usize {
    match sysconf(SysconfVar::PAGE_SIZE) {
        Ok(Some(size)) => usize::try_from(size)
            .ok()
            .filter(|s| s.is_power_of_two())
            .unwrap_or(FALLBACK_PAGE_SIZE),
        _ => FALLBACK_PAGE_SIZE,
    }
}

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
fn request_port_access() -> io::Result<()> {
    // SAFETY: iopl only changes the privilege level of this process.
    if unsafe { libc::iopl(3) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
fn request_port_access() -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "port I/O is only available on Linux x86_64",
    ))
}

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
mod port {
    use x86_64::instructions::port::Port;

    use crate::access::Width;

    // Callers only reach these after iopl(3) succeeded.

    pub(super) fn read(port: u16, width: Width) -> u32 {
        // SAFETY: the process holds I/O privilege level 3.
        unsafe {
            match width {
                Width::Byte => u32::from(Port::<u8>::new(port).read()),
                Width::Word => u32::from(Port::<u16>::new(port).read()),
                Width::Dword => Port::<u32>::new(port).read(),
            }
        }
    }

    pub(super) fn write(port: u16, width: Width, value: u32) {
        // SAFETY: the process holds I/O privilege level 3.
        unsafe {
            match width {
                Width::Byte => Port::<u8>::new(port).write(value as u8),
                Width::Word => Port::<u16>::new(port).write(value as u16),
                Width::Dword => Port::<u32>::new(port).write(value),
            }
        }
    }
}

#[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
mod port {
    use crate::access::Width;

    // Port access is never granted on these targets.

    pub(super) fn read(_port: u16, _width: Width) -> u32 {
        0
    }

    pub(super) fn write(_port: u16, _width: Width, _value: u32) {}
}
