use crate::platform::{AlignedOps, Platform, align_ceil};
#[cfg(feature = "defmt")]
use defmt::trace;

pub(crate) const CHECKSUM_SIZE: usize = 4;

/// Stack scratch space for unaligned heads and tails and for streaming slot checksums.
/// Read and write granularity of the flash must divide it.
pub(crate) const SCRATCH_SIZE: usize = 64;

pub(crate) const ERASED_BYTE: u8 = 0xFF;

/// One of the two copies in the page. Slot A is the one served by a raw read.
#[derive(strum::Display, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Slot {
    A,
    B,
}

/// Placement of both slots for a record of a given size.
///
/// ```text
/// | data A | pad | crc A | pad | data B | pad | crc B | pad | erased ... |
/// ^ 0                          ^ stride                    ^ footprint
/// ```
///
/// Padding only appears when the size is not a multiple of the write granularity. With halfword
/// programming and even sizes, slot B starts at `size + 4`.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub(crate) struct Layout {
    pub(crate) data_size: usize,
    data_region: usize,
    stride: usize,
}

impl Layout {
    pub(crate) const fn for_record(data_size: usize, write_size: usize) -> Self {
        let data_region = align_ceil(data_size, write_size);
        let stride = data_region + align_ceil(CHECKSUM_SIZE, write_size);
        Self {
            data_size,
            data_region,
            stride,
        }
    }

    pub(crate) const fn footprint(&self) -> usize {
        2 * self.stride
    }

    pub(crate) const fn data_offset(&self, slot: Slot) -> usize {
        match slot {
            Slot::A => 0,
            Slot::B => self.stride,
        }
    }

    pub(crate) const fn checksum_offset(&self, slot: Slot) -> usize {
        self.data_offset(slot) + self.data_region
    }
}

/// Largest record whose two slots fit into `page_size` bytes.
pub(crate) const fn max_record_size(page_size: usize, write_size: usize) -> usize {
    let checksum_region = align_ceil(CHECKSUM_SIZE, write_size);
    let per_slot = page_size / 2;
    if per_slot < checksum_region {
        return 0;
    }
    // records are halfword multiples
    ((per_slot - checksum_region) / write_size * write_size) & !1
}

pub(crate) fn write_aligned<T: Platform>(
    hal: &mut T,
    offset: u32,
    bytes: &[u8],
) -> Result<(), T::Error> {
    #[cfg(feature = "defmt")]
    trace!("write_aligned @{:#08x}: [{}]", offset, bytes.len());

    if bytes.len().is_multiple_of(T::WRITE_SIZE) {
        if bytes.is_empty() {
            return Ok(());
        }
        hal.write(offset, bytes)
    } else {
        let pivot = T::align_write_floor(bytes.len());
        let header = &bytes[..pivot];
        let trailer = &bytes[pivot..];
        if !header.is_empty() {
            hal.write(offset, header)?;
        }

        // no need to write the trailer if remaining data is all ones - this the default state of the flash
        if trailer.iter().any(|&e| e != ERASED_BYTE) {
            let mut buf = [ERASED_BYTE; SCRATCH_SIZE];
            buf[..trailer.len()].copy_from_slice(trailer);
            hal.write(offset + (pivot as u32), &buf[..T::WRITE_SIZE])?
        }

        Ok(())
    }
}

pub(crate) fn read_aligned<T: Platform>(
    hal: &mut T,
    offset: u32,
    bytes: &mut [u8],
) -> Result<(), T::Error> {
    #[cfg(feature = "defmt")]
    trace!("read_aligned @{:#08x}: [{}]", offset, bytes.len());

    let pivot = T::align_read_floor(bytes.len());
    if pivot > 0 {
        hal.read(offset, &mut bytes[..pivot])?;
    }

    let trailer_len = bytes.len() - pivot;
    if trailer_len > 0 {
        let mut buf = [0u8; SCRATCH_SIZE];
        let padded = T::align_read(trailer_len);
        hal.read(offset + (pivot as u32), &mut buf[..padded])?;
        bytes[pivot..].copy_from_slice(&buf[..trailer_len]);
    }

    Ok(())
}
