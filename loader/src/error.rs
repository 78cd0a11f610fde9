use crate::Status;

/// Flash programming errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The flash controller raised one or more error flags.
    ///
    /// The inner value is the status register snapshot of the failing
    /// programming step with everything except the error flags masked out.
    Flags(Status),
    /// `BSY` did not clear within the [`Poll`] limit.
    ///
    /// [`Poll`]: crate::Poll
    Timeout,
}

impl Error {
    /// Result code reported to the debug host.
    ///
    /// Hardware errors are reported as the raw error mask. A timeout is
    /// reported as the `BSY` bit, which never appears in an error mask.
    ///
    /// # Example
    ///
    /// ```
    /// use stm32wl_flash_loader::{Error, Status};
    ///
    /// assert_eq!(Error::Flags(Status::SIZERR).code(), 1 << 6);
    /// assert_eq!(Error::Timeout.code(), Status::BSY.bits());
    /// ```
    pub const fn code(&self) -> u32 {
        match self {
            Error::Flags(status) => status.bits(),
            Error::Timeout => Status::BSY.bits(),
        }
    }

    /// Decode a result code read back from the target.
    ///
    /// Returns `None` for `0`, the success code. Bits outside of
    /// [`Status::ERRORS`] are dropped from a flag mask.
    ///
    /// # Example
    ///
    /// ```
    /// use stm32wl_flash_loader::{Error, Status};
    ///
    /// assert_eq!(Error::from_code(0), None);
    /// assert_eq!(Error::from_code(0x10), Some(Error::Flags(Status::WRPERR)));
    /// assert_eq!(Error::from_code(1 << 16), Some(Error::Timeout));
    /// assert_eq!(
    ///     Error::from_code((1 << 16) | 0x10),
    ///     Some(Error::Flags(Status::WRPERR))
    /// );
    /// ```
    pub const fn from_code(code: u32) -> Option<Error> {
        if code == 0 {
            None
        } else if code == Status::BSY.bits() {
            Some(Error::Timeout)
        } else {
            Some(Error::Flags(Status::from_bits(code).errors()))
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Flags(status) => write!(f, "flash error: {status}"),
            Error::Timeout => f.write_str("flash busy timeout"),
        }
    }
}

/// Convert the result of a transfer to the code reported to the debug host.
///
/// # Example
///
/// ```
/// use stm32wl_flash_loader::{result_code, Error, Status};
///
/// assert_eq!(result_code(Ok(())), 0);
/// assert_eq!(result_code(Err(Error::Flags(Status::PROGERR))), 0x8);
/// ```
pub const fn result_code(result: Result<(), Error>) -> u32 {
    match result {
        Ok(()) => 0,
        Err(e) => e.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::{result_code, Error};
    use crate::{Flag, Status};

    #[test]
    fn codes_are_distinct() {
        for flag in Flag::ALL {
            let err: Error = Error::Flags(flag.into());
            assert_ne!(err.code(), 0);
            assert_ne!(err.code(), Error::Timeout.code());
            assert_eq!(Error::from_code(err.code()), Some(err));
        }
        assert_eq!(Error::from_code(Error::Timeout.code()), Some(Error::Timeout));
    }

    #[test]
    fn busy_bit_is_not_an_error_flag() {
        let code: u32 = (Status::BSY | Status::PROGERR | Status::EOP).bits();
        assert_eq!(Error::from_code(code), Some(Error::Flags(Status::PROGERR)));
        assert_eq!(Error::from_code(Status::BSY.bits()), Some(Error::Timeout));
    }

    #[test]
    fn multiple_flags() {
        let mask: Status = Status::PGSERR | Status::PGAERR;
        assert_eq!(result_code(Err(Error::Flags(mask))), 0xA0);
        assert_eq!(
            Error::Flags(mask).to_string(),
            "flash error: PGAERR | PGSERR"
        );
    }
}
