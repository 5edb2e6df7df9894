//! Register access.
//!
//! [`RegisterBus`] is the seam between the command interpreter and the
//! hardware. Addresses up to [`PORT_LIMIT`] go to the x86 I/O port space when
//! port access was granted; everything else is a memory-mapped register,
//! reached by mapping the page that contains it.

use std::fmt;
use std::io;
use std::path::PathBuf;

#[cfg(unix)]
mod hardware;

#[cfg(unix)]
pub use hardware::HardwareBus;

/// Highest address treated as an I/O port.
pub const PORT_LIMIT: usize = 0xFFFF;

/// Default memory device.
pub const DEFAULT_MEM_DEVICE: &str = "/dev/mem";

/// Page size used when the platform cannot report one.
pub const FALLBACK_PAGE_SIZE: usize = 4096;

/// Access width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    Byte,
    Word,
    Dword,
}

impl Width {
    /// Size in bytes.
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Word => 2,
            Self::Dword => 4,
        }
    }

    /// Mask of the bits that fit in this width.
    #[must_use]
    pub const fn mask(self) -> u64 {
        match self {
            Self::Byte => 0xFF,
            Self::Word => 0xFFFF,
            Self::Dword => 0xFFFF_FFFF,
        }
    }

    /// Hex digits needed to print a full value.
    #[must_use]
    pub const fn hex_digits(self) -> usize {
        self.bytes() * 2
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Byte => "byte",
            Self::Word => "word",
            Self::Dword => "dword",
        }
    }

    /// Truncate `value` to this width.
    #[must_use]
    pub const fn truncate(self, value: u64) -> u32 {
        (value & self.mask()) as u32
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Register access failures.
#[derive(Debug)]
pub enum AccessError {
    /// The memory device could not be opened at startup.
    MemoryUnavailable,
    /// The page holding `addr` could not be mapped.
    Map { addr: usize, source: io::Error },
    /// `addr` cannot be expressed as a device offset.
    OutOfRange { addr: usize },
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MemoryUnavailable => write!(f, "memory device is not available"),
            Self::Map { addr, source } => {
                write!(f, "Failed to map memory at 0x{addr:x}: {source}")
            }
            Self::OutOfRange { addr } => write!(f, "address 0x{addr:X} is out of range"),
        }
    }
}

impl std::error::Error for AccessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Map { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Reads and writes registers by address.
pub trait RegisterBus {
    fn read(&mut self, addr: usize, width: Width) -> Result<u32, AccessError>;

    fn write(&mut self, addr: usize, width: Width, value: u32) -> Result<(), AccessError>;
}

/// How the hardware bus is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessConfig {
    /// Memory device used for memory-mapped access.
    pub mem_device: PathBuf,
    /// Request I/O port privileges. When `false`, every address is memory-mapped.
    pub port_io: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            mem_device: PathBuf::from(DEFAULT_MEM_DEVICE),
            port_io: true,
        }
    }
}

/// What initialization managed to acquire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    pub is_root: bool,
    pub port_access: bool,
    pub memory_access: bool,
    /// Human-readable warnings, in the order they occurred.
    pub warnings: Vec<String>,
}

impl InitReport {
    /// At least one access path is usable.
    #[must_use]
    pub fn usable(&self) -> bool {
        self.port_access || self.memory_access
    }
}

/// Whether `addr` lies in the I/O port range.
#[must_use]
pub const fn is_port_address(addr: usize) -> bool {
    addr <= PORT_LIMIT
}

/// Start of the page holding `addr`. `page_size` must be a power of two.
#[must_use]
pub const fn page_base(addr: usize, page_size: usize) -> usize {
    addr & !(page_size - 1)
}

/// Offset of `addr` inside its page.
#[must_use]
pub const fn page_offset(addr: usize, page_size: usize) -> usize {
    addr & (page_size - 1)
}

/// Bytes to map so that an access of `width` at `offset` fits.
///
/// One page, or two when the register runs past the end of its page.
#[must_use]
pub const fn map_length(offset: usize, width: Width, page_size: usize) -> usize {
    if offset + width.bytes() > page_size {
        page_size * 2
    } else {
        page_size
    }
}

/// Whether `addr` is a multiple of the access width.
#[must_use]
pub const fn is_aligned(addr: usize, width: Width) -> bool {
    addr % width.bytes() == 0
}
