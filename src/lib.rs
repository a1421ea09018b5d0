#![doc = include_str ! ("../README.md")]
#![cfg_attr(not(target_arch = "x86_64"), no_std)]

pub mod error;
mod internal;
pub mod platform;
mod raw;

use crate::error::Error;
use crate::platform::Platform;
#[cfg(feature = "defmt")]
use defmt::{trace, warn};

pub use raw::Slot;

/// Offset of the last 1 KiB page of a 32 KiB flash, `0x0800_7C00` on an STM32F0.
pub const DEFAULT_PAGE_BASE: u32 = 0x7C00;
pub const DEFAULT_PAGE_SIZE: usize = 1024;

/// Where the record page lives. The page has to be a single erasable unit of the flash, or a
/// multiple of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub page_base: u32,
    pub page_size: usize,
}

impl Config {
    pub const fn new(page_base: u32, page_size: usize) -> Self {
        Self {
            page_base,
            page_size,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_BASE, DEFAULT_PAGE_SIZE)
    }
}

/// Outcome of a successful [`RecordStore::read_verified`].
#[derive(strum::Display, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadStatus {
    /// Both copies were valid, nothing was written.
    Intact,
    /// Slot A was corrupted and has been rewritten from slot B.
    RestoredFromB,
    /// Slot B was corrupted and has been rewritten from slot A.
    RestoredFromA,
}

/// Validity of both copies as currently found in flash.
#[derive(strum::Display, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PageState {
    BothValid,
    OnlyAValid,
    OnlyBValid,
    BothInvalid,
}

/// Keeps two checksummed copies of a single record in one flash page.
///
/// The size of the record is not persisted. Every call has to use the same buffer length that
/// was used for the last write, and that length has to be even.
///
/// Writes erase the whole page first. A power loss in the middle of a write leaves zero, one or
/// two valid copies behind; [`RecordStore::read_verified`] repairs the page as long as one copy
/// survived.
pub struct RecordStore<T: Platform> {
    pub(crate) hal: T,
    pub(crate) config: Config,
    pub(crate) faulted: bool,
}

impl<T: Platform> RecordStore<T> {
    /// Checks the page against the flash geometry. Nothing is read or written.
    pub fn new(config: Config, hal: T) -> Result<RecordStore<T>, Error> {
        if T::READ_SIZE == 0
            || T::WRITE_SIZE == 0
            || !raw::SCRATCH_SIZE.is_multiple_of(T::WRITE_SIZE)
            || !T::WRITE_SIZE.is_multiple_of(T::READ_SIZE)
        {
            return Err(Error::UnsupportedGeometry);
        }

        if !(config.page_base as usize).is_multiple_of(T::ERASE_SIZE) {
            return Err(Error::InvalidPageAddress);
        }

        if config.page_size == 0 || !config.page_size.is_multiple_of(T::ERASE_SIZE) {
            return Err(Error::InvalidPageSize);
        }

        let end = (config.page_base as usize).checked_add(config.page_size);
        if end.is_none_or(|end| end > hal.capacity() || u32::try_from(end).is_err()) {
            return Err(Error::InvalidPageSize);
        }

        Ok(Self {
            hal,
            config,
            faulted: false,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Largest record that fits twice into the page, 508 bytes for a 1 KiB page.
    pub fn max_record_size(&self) -> usize {
        raw::max_record_size(self.config.page_size, T::WRITE_SIZE)
    }

    /// Set once the flash driver reported an error. A faulted store refuses to write.
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Gives the flash back.
    pub fn release(self) -> T {
        self.hal
    }

    /// Copies slot A into `dest` without looking at the checksum.
    pub fn read(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        debug_assert!(dest.len().is_multiple_of(2), "record size must be even");
        let layout = self.layout(dest.len())?;
        self.read_slot(&layout, Slot::A, dest)
    }

    /// Erases the page and stores two copies of `src`, each followed by its checksum.
    ///
    /// Blocks for the duration of a page erase plus programming, tens of milliseconds on
    /// typical microcontrollers. Fails with [`Error::TooLarge`] before touching the flash if
    /// both copies don't fit.
    pub fn write(&mut self, src: &[u8]) -> Result<(), Error> {
        debug_assert!(src.len().is_multiple_of(2), "record size must be even");

        if self.faulted {
            return Err(Error::FlashError);
        }

        let layout = self.layout(src.len())?;
        self.write_slots(&layout, src)
    }

    /// Compares the checksum of `size` bytes of data in `slot` against the one stored behind them.
    pub fn verify(&mut self, slot: Slot, size: usize) -> Result<bool, Error> {
        let layout = self.layout(size)?;
        self.verify_slot(&layout, slot)
    }

    /// Reports which copies are currently valid. Nothing is repaired.
    pub fn page_state(&mut self, size: usize) -> Result<PageState, Error> {
        let layout = self.layout(size)?;
        self.classify(&layout)
    }

    /// Reads the record and repairs a corrupted copy from the valid one.
    ///
    /// A repair rewrites the whole page and blocks like [`RecordStore::write`]. If both copies
    /// are corrupted, [`Error::Unrecoverable`] is returned and `dest` is not modified; the caller
    /// has to fall back to a default record.
    pub fn read_verified(&mut self, dest: &mut [u8]) -> Result<ReadStatus, Error> {
        debug_assert!(dest.len().is_multiple_of(2), "record size must be even");
        let layout = self.layout(dest.len())?;

        match self.classify(&layout)? {
            PageState::BothValid => {
                self.read_slot(&layout, Slot::A, dest)?;
                Ok(ReadStatus::Intact)
            }
            PageState::OnlyBValid => {
                #[cfg(feature = "defmt")]
                trace!("read_verified: restoring slot A");

                #[cfg(feature = "debug-logs")]
                println!("read_verified: restoring slot A");

                self.read_slot(&layout, Slot::B, dest)?;
                self.write(dest)?;
                self.read_slot(&layout, Slot::A, dest)?;
                Ok(ReadStatus::RestoredFromB)
            }
            PageState::OnlyAValid => {
                #[cfg(feature = "defmt")]
                trace!("read_verified: restoring slot B");

                #[cfg(feature = "debug-logs")]
                println!("read_verified: restoring slot B");

                self.read_slot(&layout, Slot::A, dest)?;
                self.write(dest)?;
                Ok(ReadStatus::RestoredFromA)
            }
            PageState::BothInvalid => {
                #[cfg(feature = "defmt")]
                warn!("read_verified: both copies corrupted");

                #[cfg(feature = "debug-logs")]
                println!("read_verified: both copies corrupted");

                Err(Error::Unrecoverable)
            }
        }
    }
}
