use crate::error::Error;
use crate::platform::{Platform, Unlocked};
use crate::raw::{CHECKSUM_SIZE, Layout, SCRATCH_SIZE, Slot, read_aligned, write_aligned};
use crate::{PageState, RecordStore};
use core::cmp;
#[cfg(feature = "defmt")]
use defmt::trace;
#[cfg(feature = "defmt")]
use defmt::warn;

/// Seed for every checksum computation, at write time as well as during verification.
pub(crate) const CRC_INIT: u32 = u32::MAX;

impl<T: Platform> RecordStore<T> {
    pub(crate) fn layout(&self, size: usize) -> Result<Layout, Error> {
        // keeps the layout arithmetic below from overflowing
        if size > self.config.page_size {
            return Err(Error::TooLarge);
        }
        let layout = Layout::for_record(size, T::WRITE_SIZE);
        if layout.footprint() > self.config.page_size {
            return Err(Error::TooLarge);
        }
        Ok(layout)
    }

    fn address(&self, offset: usize) -> u32 {
        self.config.page_base + offset as u32
    }

    /// Runs a flash operation and marks the store as faulted if the driver reports an error.
    fn flash<R>(&mut self, op: impl FnOnce(&mut T) -> Result<R, T::Error>) -> Result<R, Error> {
        match op(&mut self.hal) {
            Ok(val) => Ok(val),
            Err(_) => {
                #[cfg(feature = "defmt")]
                warn!("flash error, refusing further writes");

                #[cfg(feature = "debug-logs")]
                println!("internal: flash error, store faulted");

                self.faulted = true;
                Err(Error::FlashError)
            }
        }
    }

    pub(crate) fn read_slot(
        &mut self,
        layout: &Layout,
        slot: Slot,
        dest: &mut [u8],
    ) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("read_slot: {} [{}]", slot, layout.data_size);

        #[cfg(feature = "debug-logs")]
        println!("internal: read_slot {slot} [{}]", layout.data_size);

        let address = self.address(layout.data_offset(slot));
        self.flash(|hal| read_aligned(hal, address, &mut dest[..layout.data_size]))
    }

    /// Erases the page and programs both slots from `src`. Both slots get the same checksum,
    /// each stored right behind its own copy of the data.
    pub(crate) fn write_slots(&mut self, layout: &Layout, src: &[u8]) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("write_slots: @{:#08x} [{}]", self.config.page_base, src.len());

        #[cfg(feature = "debug-logs")]
        println!(
            "internal: write_slots @{:#08x} [{}]",
            self.config.page_base,
            src.len()
        );

        let from = self.config.page_base;
        let to = self.address(self.config.page_size);
        let checksum = T::crc32(CRC_INIT, src).to_le_bytes();
        let data_a = self.address(layout.data_offset(Slot::A));
        let checksum_a = self.address(layout.checksum_offset(Slot::A));
        let data_b = self.address(layout.data_offset(Slot::B));
        let checksum_b = self.address(layout.checksum_offset(Slot::B));

        self.flash(|hal| {
            let mut hal = Unlocked::new(hal);
            hal.erase(from, to)?;
            write_aligned(&mut *hal, data_a, src)?;
            write_aligned(&mut *hal, checksum_a, &checksum)?;
            write_aligned(&mut *hal, data_b, src)?;
            write_aligned(&mut *hal, checksum_b, &checksum)
        })
    }

    /// Streams the data region of `slot` through the checksum in scratch sized chunks.
    fn compute_slot_checksum(&mut self, layout: &Layout, slot: Slot) -> Result<u32, Error> {
        let base = layout.data_offset(slot);
        let mut crc = CRC_INIT;
        let mut buf = [0u8; SCRATCH_SIZE];
        let mut pos = 0;
        while pos < layout.data_size {
            let len = cmp::min(SCRATCH_SIZE, layout.data_size - pos);
            let address = self.address(base + pos);
            self.flash(|hal| read_aligned(hal, address, &mut buf[..len]))?;
            crc = T::crc32(crc, &buf[..len]);
            pos += len;
        }
        Ok(crc)
    }

    fn load_slot_checksum(&mut self, layout: &Layout, slot: Slot) -> Result<u32, Error> {
        let mut buf = [0u8; CHECKSUM_SIZE];
        let address = self.address(layout.checksum_offset(slot));
        self.flash(|hal| read_aligned(hal, address, &mut buf))?;
        Ok(u32::from_le_bytes(buf))
    }

    pub(crate) fn verify_slot(&mut self, layout: &Layout, slot: Slot) -> Result<bool, Error> {
        let calculated = self.compute_slot_checksum(layout, slot)?;
        let stored = self.load_slot_checksum(layout, slot)?;

        #[cfg(feature = "defmt")]
        trace!(
            "verify_slot: {} calculated {:#x} stored {:#x}",
            slot, calculated, stored
        );

        #[cfg(feature = "debug-logs")]
        println!("internal: verify_slot {slot}: calculated {calculated:#010x} stored {stored:#010x}");

        if calculated != stored {
            #[cfg(feature = "defmt")]
            warn!("slot {} corrupted", slot);
            return Ok(false);
        }
        Ok(true)
    }

    pub(crate) fn classify(&mut self, layout: &Layout) -> Result<PageState, Error> {
        let a_valid = self.verify_slot(layout, Slot::A)?;
        let b_valid = self.verify_slot(layout, Slot::B)?;
        Ok(match (a_valid, b_valid) {
            (true, true) => PageState::BothValid,
            (true, false) => PageState::OnlyAValid,
            (false, true) => PageState::OnlyBValid,
            (false, false) => PageState::BothInvalid,
        })
    }
}
