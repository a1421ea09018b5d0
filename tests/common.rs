#![allow(dead_code)]

// filename according to https://doc.rust-lang.org/book/ch11-03-test-organization.html
use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};

pub const FLASH_PAGE_SIZE: usize = 1024;
pub const CHECKSUM_SIZE: usize = 4;

/// STM32F0 style: byte reads, halfword programming.
pub type HalfwordFlash = Flash<2, 1>;
/// Word programming and word reads, forces padding between data and checksum.
pub type WordFlash = Flash<4, 4>;

pub struct Flash<const WRITE: usize, const READ: usize> {
    pub buf: Vec<u8>,
    pub fail_after_operation: usize,
    pub operations: Vec<Operation>,
    pub faults: usize,
    pub locked: bool,
    pub unlocks: usize,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Read { offset: u32, len: usize },
    Write { offset: u32, len: usize },
    Erase { offset: u32, len: usize },
}

impl<const WRITE: usize, const READ: usize> Flash<WRITE, READ> {
    pub fn new(pages: usize) -> Self {
        Self::new_with_fault(pages, usize::MAX)
    }

    pub fn new_with_fault(pages: usize, fail_after_operation: usize) -> Self {
        Self {
            buf: vec![0xffu8; FLASH_PAGE_SIZE * pages],
            fail_after_operation,
            operations: Vec::new(),
            faults: 0,
            locked: true,
            unlocks: 0,
        }
    }

    /// Lets the next `operations` flash operations succeed, fails everything after.
    pub fn fail_in(&mut self, operations: usize) {
        self.fail_after_operation = self.operations.len() + operations;
    }

    pub fn disable_faults(&mut self) {
        self.fail_after_operation = usize::MAX;
    }

    pub fn erases(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Erase { .. }))
            .count()
    }

    pub fn writes(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Write { .. }))
            .count()
    }

    pub fn flip_bit(&mut self, offset: usize, bit: u8) {
        self.buf[offset] ^= 1 << bit;
    }

    pub fn dump_operations(&self) {
        println!("Operations:");
        for op in &self.operations {
            println!("  {:?}", op);
        }
    }

    fn fault(&mut self) -> bool {
        if self.operations.len() >= self.fail_after_operation {
            println!("    flash: FAULT");
            self.faults += 1;
            return true;
        }
        false
    }
}

#[derive(Debug)]
pub struct FlashError;

impl NorFlashError for FlashError {
    fn kind(&self) -> NorFlashErrorKind {
        NorFlashErrorKind::Other
    }
}

impl<const WRITE: usize, const READ: usize> ErrorType for Flash<WRITE, READ> {
    type Error = FlashError;
}

impl<const WRITE: usize, const READ: usize> ReadNorFlash for Flash<WRITE, READ> {
    const READ_SIZE: usize = READ;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::READ_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::READ_SIZE));

        println!(
            "    flash: read:  0x{offset:04X}[0x{:04X}] #{:>2}",
            bytes.len(),
            self.operations.len()
        );
        if self.fault() {
            return Err(FlashError);
        }
        self.operations.push(Operation::Read {
            offset,
            len: bytes.len(),
        });

        let offset = offset as usize;
        bytes.copy_from_slice(&self.buf[offset..offset + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl<const WRITE: usize, const READ: usize> NorFlash for Flash<WRITE, READ> {
    const WRITE_SIZE: usize = WRITE;

    const ERASE_SIZE: usize = FLASH_PAGE_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        assert!(!self.locked, "erase on locked flash");
        assert!(from.is_multiple_of(Self::ERASE_SIZE as _));
        assert!(to.is_multiple_of(Self::ERASE_SIZE as _));
        assert!(to > from);

        println!(
            "    flash: erase: {from:04X} - {to:04X} #{:>2}",
            self.operations.len()
        );

        if self.fault() {
            return Err(FlashError);
        }

        self.operations.push(Operation::Erase {
            offset: from,
            len: (to - from) as usize,
        });

        for addr in from..to {
            self.buf[addr as usize] = 0xff;
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        assert!(!self.locked, "write on locked flash");
        assert!(offset.is_multiple_of(Self::WRITE_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::WRITE_SIZE));
        assert!(!bytes.is_empty());

        println!(
            "    flash: write: 0x{offset:04X}[0x{:04X}] #{:>2}",
            bytes.len(),
            self.operations.len()
        );

        if self.fault() {
            return Err(FlashError);
        }

        self.operations.push(Operation::Write {
            offset,
            len: bytes.len(),
        });

        let offset = offset as usize;
        for (i, &val) in bytes.iter().enumerate() {
            // programming can only flip bits from 1 to 0
            self.buf[offset + i] &= val;
        }
        Ok(())
    }
}

impl<const WRITE: usize, const READ: usize> twin_page::platform::Crc for Flash<WRITE, READ> {
    fn crc32(init: u32, data: &[u8]) -> u32 {
        unsafe { libz_sys::crc32(init as _, data.as_ptr(), data.len() as u32) as u32 }
    }
}

impl<const WRITE: usize, const READ: usize> twin_page::platform::FlashLock for Flash<WRITE, READ> {
    fn unlock(&mut self) {
        assert!(self.locked, "unlock on unlocked flash");
        self.locked = false;
        self.unlocks += 1;
    }

    fn lock(&mut self) {
        self.locked = true;
    }
}
