use core::ops::{Deref, DerefMut};
use embedded_storage::nor_flash::NorFlash;

/// See README.md for an example implementation.
pub trait Platform: Crc + FlashLock + NorFlash {}

impl<T: Crc + FlashLock + NorFlash> Platform for T {}

/// Checksum peripheral. Has to be chainable: `crc32(crc32(i, a), b) == crc32(i, a ++ b)`,
/// since slots are checksummed chunk by chunk straight from flash.
pub trait Crc {
    fn crc32(init: u32, data: &[u8]) -> u32;
}

impl<T: Crc> Crc for &mut T {
    fn crc32(init: u32, data: &[u8]) -> u32 {
        T::crc32(init, data)
    }
}

/// Write access to the flash controller. Most drivers unlock implicitly, hence the no-op
/// defaults. On parts like the STM32 the controller has to be unlocked with a key sequence
/// before any erase or program operation.
pub trait FlashLock {
    fn unlock(&mut self) {}

    fn lock(&mut self) {}
}

impl<T: FlashLock> FlashLock for &mut T {
    fn unlock(&mut self) {
        T::unlock(self)
    }

    fn lock(&mut self) {
        T::lock(self)
    }
}

/// Keeps the flash controller unlocked for as long as it lives. Locks again on drop, so every
/// exit path of a programming sequence (`?` included) leaves the controller locked.
pub(crate) struct Unlocked<'a, T: FlashLock> {
    hal: &'a mut T,
}

impl<'a, T: FlashLock> Unlocked<'a, T> {
    pub(crate) fn new(hal: &'a mut T) -> Self {
        hal.unlock();
        Self { hal }
    }
}

impl<T: FlashLock> Drop for Unlocked<'_, T> {
    fn drop(&mut self) {
        self.hal.lock();
    }
}

impl<T: FlashLock> Deref for Unlocked<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.hal
    }
}

impl<T: FlashLock> DerefMut for Unlocked<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.hal
    }
}

pub trait AlignedOps: Platform {
    fn align_read(size: usize) -> usize {
        align_ceil(size, Self::READ_SIZE)
    }

    fn align_read_floor(size: usize) -> usize {
        align_floor(size, Self::READ_SIZE)
    }

    fn align_write_floor(size: usize) -> usize {
        align_floor(size, Self::WRITE_SIZE)
    }
}

#[inline(always)]
pub(crate) const fn align_ceil(size: usize, alignment: usize) -> usize {
    if alignment.is_power_of_two() {
        size.saturating_add(alignment - 1) & !(alignment - 1)
    } else {
        size.saturating_add(alignment - 1) / alignment * alignment
    }
}

#[inline(always)]
pub(crate) const fn align_floor(size: usize, alignment: usize) -> usize {
    if alignment.is_power_of_two() {
        size & !(alignment - 1)
    } else {
        size / alignment * alignment
    }
}

impl<T: Platform> AlignedOps for T {}

#[cfg(any(
    feature = "esp32",
    feature = "esp32s2",
    feature = "esp32s3",
    feature = "esp32c2",
    feature = "esp32c3",
    feature = "esp32c6",
    feature = "esp32h2",
))]
mod chip {
    use esp_storage::FlashStorage;

    use crate::platform::{Crc, FlashLock};

    impl Crc for FlashStorage<'_> {
        fn crc32(init: u32, data: &[u8]) -> u32 {
            esp_hal::rom::crc::crc32_le(init, data)
        }
    }

    // esp-storage unlocks the SPI flash on every call
    impl FlashLock for FlashStorage<'_> {}
}
