use thiserror::Error;

/// Errors that can occur while operating on the record page. Marked as non-exhaustive to allow
/// for future additions. A caller would usually only handle `Unrecoverable` (fall back to a
/// default record) and `TooLarge`, as the remaining variants are static configuration mistakes
/// or hardware faults.
#[derive(Error, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The page base address has to be aligned to the erase size of the flash
    #[error("invalid page address")]
    InvalidPageAddress,

    /// The page size has to be a non-zero multiple of the erase size and must fit the flash
    #[error("invalid page size")]
    InvalidPageSize,

    /// The read or write granularity of the flash is not supported
    #[error("unsupported flash geometry")]
    UnsupportedGeometry,

    /// Two copies of the record plus their checksums don't fit into the page.
    /// Nothing has been written.
    #[error("record too large")]
    TooLarge,

    /// Both copies failed their checksum. The destination buffer was left untouched.
    #[error("both copies corrupted")]
    Unrecoverable,

    /// The internal error value is returned from the provided `&mut impl NorFlash`
    #[error("internal flash error")]
    FlashError,
}
