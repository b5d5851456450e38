//! Flash page and erase-block layout.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Largest address reachable with 24-bit addressing
pub const MAX_ADDRESS: u32 = 0x00FF_FFFF;

/// Largest supported page size (size of the session's page buffer)
pub const MAX_PAGE_SIZE: u32 = 256;

/// Default busy polling budget
pub const DEFAULT_BUSY_TIMEOUT: u32 = 10_000;

/// Page and erase-block sizes of the flash chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FlashGeometry {
    /// Page program size in bytes (power of two, at most 256)
    pub page_size: u32,
    /// Erase block size in bytes (multiple of the page size)
    pub erase_size: u32,
    /// Number of status polls before giving up on a busy device
    pub busy_timeout: u32,
}

impl Default for FlashGeometry {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            erase_size: MAX_PAGE_SIZE,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

impl FlashGeometry {
    /// Check the sizes are usable
    pub fn is_valid(&self) -> bool {
        self.page_size.is_power_of_two()
            && self.page_size <= MAX_PAGE_SIZE
            && self.erase_size >= self.page_size
            && self.erase_size % self.page_size == 0
            && self.busy_timeout > 0
    }

    /// Start of the page containing `address`
    pub fn page_base(&self, address: u32) -> u32 {
        address - address % self.page_size
    }

    /// Start of the erase block containing `address`
    pub fn erase_base(&self, address: u32) -> u32 {
        address - address % self.erase_size
    }

    /// Split `len` bytes at `address` into page-bounded segments
    pub fn page_segments(&self, address: u32, len: u32) -> PageSegments {
        PageSegments {
            page_size: self.page_size,
            address,
            remaining: len,
            offset: 0,
        }
    }
}

/// One page-bounded piece of a larger write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PageSegment {
    /// Flash address of the first byte
    pub address: u32,
    /// Offset of the first byte within the whole write
    pub offset: u32,
    /// Number of bytes
    pub len: u32,
}

/// Iterator over [`PageSegment`]s
#[derive(Debug, Clone)]
pub struct PageSegments {
    page_size: u32,
    address: u32,
    remaining: u32,
    offset: u32,
}

impl Iterator for PageSegments {
    type Item = PageSegment;

    fn next(&mut self) -> Option<PageSegment> {
        if self.remaining == 0 {
            return None;
        }

        let room = self.page_size - self.address % self.page_size;
        let len = room.min(self.remaining);
        let segment = PageSegment {
            address: self.address,
            offset: self.offset,
            len,
        };

        self.address = self.address.wrapping_add(len);
        self.offset += len;
        self.remaining -= len;
        Some(segment)
    }
}
