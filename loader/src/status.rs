use core::ops::{BitOr, BitOrAssign};

/// Flash status register (SR) error flag.
///
/// Each variant is the value of its bit in the status register.
#[repr(u32)]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Flag {
    /// Operation error.
    ///
    /// A flash operation (program or erase) completed unsuccessfully.
    Op = 1 << 1,
    /// Programming error.
    ///
    /// A 64-bit address to be programmed contains a value different from
    /// `0xFFFF_FFFF_FFFF_FFFF` before programming, except if the data to write
    /// is `0x0000_0000_0000_0000`.
    Prog = 1 << 3,
    /// Write protection error.
    ///
    /// An address to be erased/programmed belongs to a write-protected part
    /// (by WRP, PCROP or RDP level 1) of the flash memory.
    Wp = 1 << 4,
    /// Programming alignment error.
    ///
    /// The data to program cannot be contained in the same double-word (`u64`)
    /// of flash memory.
    Align = 1 << 5,
    /// Size error.
    ///
    /// The size of the access is a byte (`u8`) or half-word (`u16`) during a
    /// program sequence.
    Size = 1 << 6,
    /// Programming sequence error.
    ///
    /// A write access to the flash memory was performed while PG or FSTPG was
    /// not set, or a previous programming error is still pending.
    Seq = 1 << 7,
    /// Fast programming data miss error.
    Miss = 1 << 8,
    /// Fast programming error.
    Fast = 1 << 9,
    /// PCROP read error.
    Rd = 1 << 14,
    /// Option validity error.
    OptV = 1 << 15,
}

impl Flag {
    /// All error flags, in ascending bit order.
    pub const ALL: [Flag; 10] = [
        Flag::Op,
        Flag::Prog,
        Flag::Wp,
        Flag::Align,
        Flag::Size,
        Flag::Seq,
        Flag::Miss,
        Flag::Fast,
        Flag::Rd,
        Flag::OptV,
    ];

    /// Status register bit value of the flag.
    ///
    /// # Example
    ///
    /// ```
    /// use stm32wl_flash_loader::Flag;
    ///
    /// assert_eq!(Flag::Size.bits(), 1 << 6);
    /// ```
    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// Reference manual name of the flag.
    ///
    /// # Example
    ///
    /// ```
    /// use stm32wl_flash_loader::Flag;
    ///
    /// assert_eq!(Flag::Wp.name(), "WRPERR");
    /// ```
    pub const fn name(self) -> &'static str {
        match self {
            Flag::Op => "OPERR",
            Flag::Prog => "PROGERR",
            Flag::Wp => "WRPERR",
            Flag::Align => "PGAERR",
            Flag::Size => "SIZERR",
            Flag::Seq => "PGSERR",
            Flag::Miss => "MISSERR",
            Flag::Fast => "FASTERR",
            Flag::Rd => "RDERR",
            Flag::OptV => "OPTVERR",
        }
    }
}

impl From<Flag> for Status {
    fn from(flag: Flag) -> Self {
        Status(flag.bits())
    }
}

/// Flash status register (SR) value.
///
/// This is a snapshot of the register bits; writing it back with
/// [`FlashRegs::clear_status`] clears the flags that are set in it.
///
/// [`FlashRegs::clear_status`]: crate::FlashRegs::clear_status
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(u32);

impl Status {
    /// No bits set.
    pub const NONE: Status = Status(0);
    /// End of operation.
    pub const EOP: Status = Status(1);
    /// Operation error.
    pub const OPERR: Status = Status(Flag::Op.bits());
    /// Programming error.
    pub const PROGERR: Status = Status(Flag::Prog.bits());
    /// Write protection error.
    pub const WRPERR: Status = Status(Flag::Wp.bits());
    /// Programming alignment error.
    pub const PGAERR: Status = Status(Flag::Align.bits());
    /// Size error.
    pub const SIZERR: Status = Status(Flag::Size.bits());
    /// Programming sequence error.
    pub const PGSERR: Status = Status(Flag::Seq.bits());
    /// Fast programming data miss error.
    pub const MISSERR: Status = Status(Flag::Miss.bits());
    /// Fast programming error.
    pub const FASTERR: Status = Status(Flag::Fast.bits());
    /// PCROP read error.
    pub const RDERR: Status = Status(Flag::Rd.bits());
    /// Option validity error.
    pub const OPTVERR: Status = Status(Flag::OptV.bits());
    /// Busy.
    ///
    /// Set at the beginning of a flash operation and reset when the operation
    /// finishes or when an error occurs.
    pub const BSY: Status = Status(1 << 16);

    /// Union of every error flag.
    pub const ERRORS: Status = Status::OPERR
        .union(Status::PROGERR)
        .union(Status::WRPERR)
        .union(Status::PGAERR)
        .union(Status::SIZERR)
        .union(Status::PGSERR)
        .union(Status::MISSERR)
        .union(Status::FASTERR)
        .union(Status::RDERR)
        .union(Status::OPTVERR);

    /// Mask written back to SR after every programming step.
    ///
    /// # Example
    ///
    /// ```
    /// use stm32wl_flash_loader::Status;
    ///
    /// assert_eq!(Status::CLEAR.bits(), 0xC3FB);
    /// assert!(!Status::CLEAR.contains(Status::BSY));
    /// ```
    pub const CLEAR: Status = Status::EOP.union(Status::ERRORS);

    /// Create a status from raw register bits.
    pub const fn from_bits(bits: u32) -> Status {
        Status(bits)
    }

    /// Raw register bits.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Returns `true` if no bits are set.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if every bit of `other` is set in `self`.
    pub const fn contains(&self, other: Status) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if any bit of `other` is set in `self`.
    pub const fn intersects(&self, other: Status) -> bool {
        self.0 & other.0 != 0
    }

    /// Bits set in either `self` or `other`.
    #[must_use]
    pub const fn union(self, other: Status) -> Status {
        Status(self.0 | other.0)
    }

    /// Bits set in both `self` and `other`.
    #[must_use]
    pub const fn intersection(self, other: Status) -> Status {
        Status(self.0 & other.0)
    }

    /// Bits set in `self` but not in `other`.
    #[must_use]
    pub const fn difference(self, other: Status) -> Status {
        Status(self.0 & !other.0)
    }

    /// Returns `true` if a flash operation is in progress.
    pub const fn is_busy(&self) -> bool {
        self.intersects(Status::BSY)
    }

    /// Error flags of this snapshot.
    ///
    /// `EOP` is masked out before the intersection with [`Status::ERRORS`].
    ///
    /// # Example
    ///
    /// ```
    /// use stm32wl_flash_loader::Status;
    ///
    /// let sr: Status = Status::EOP | Status::BSY;
    /// assert!(sr.errors().is_empty());
    ///
    /// let sr: Status = Status::EOP | Status::WRPERR | Status::PGSERR;
    /// assert_eq!(sr.errors(), Status::WRPERR | Status::PGSERR);
    /// ```
    #[must_use]
    pub const fn errors(self) -> Status {
        self.difference(Status::EOP).intersection(Status::ERRORS)
    }

    /// Iterate over the error flags that are set.
    ///
    /// # Example
    ///
    /// ```
    /// use stm32wl_flash_loader::{Flag, Status};
    ///
    /// let sr: Status = Status::SIZERR | Status::PGSERR | Status::EOP;
    /// let mut flags = sr.flags();
    /// assert_eq!(flags.next(), Some(Flag::Size));
    /// assert_eq!(flags.next(), Some(Flag::Seq));
    /// assert_eq!(flags.next(), None);
    /// ```
    pub fn flags(self) -> impl Iterator<Item = Flag> {
        Flag::ALL
            .into_iter()
            .filter(move |flag| self.contains(Status::from(*flag)))
    }
}

impl BitOr for Status {
    type Output = Status;

    fn bitor(self, rhs: Status) -> Status {
        self.union(rhs)
    }
}

impl BitOrAssign for Status {
    fn bitor_assign(&mut self, rhs: Status) {
        *self = self.union(rhs)
    }
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut first: bool = true;
        let mut push = |f: &mut core::fmt::Formatter<'_>, name: &str| {
            let sep: &str = if first { "" } else { " | " };
            first = false;
            write!(f, "{sep}{name}")
        };

        if self.is_busy() {
            push(f, "BSY")?;
        }
        if self.contains(Status::EOP) {
            push(f, "EOP")?;
        }
        for flag in self.flags() {
            push(f, flag.name())?;
        }
        if first {
            f.write_str("(none)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Flag, Status};
    use static_assertions as sa;

    sa::const_assert_eq!(Status::ERRORS.bits(), 0xC3FA);
    sa::const_assert!(!Status::ERRORS.intersects(Status::EOP));
    sa::const_assert!(!Status::ERRORS.intersects(Status::BSY));

    #[test]
    fn flags_are_distinct_bits() {
        let mut seen: u32 = 0;
        for flag in Flag::ALL {
            assert_eq!(flag.bits().count_ones(), 1, "{flag:?}");
            assert_eq!(seen & flag.bits(), 0, "{flag:?}");
            seen |= flag.bits();
        }
        assert_eq!(seen, Status::ERRORS.bits());
    }

    #[test]
    fn errors_ignores_eop_and_bsy() {
        assert_eq!(Status::CLEAR.errors(), Status::ERRORS);
        assert_eq!(Status::from_bits(u32::MAX).errors(), Status::ERRORS);
        assert!(Status::from_bits(0x0001_0001).errors().is_empty());
    }

    #[test]
    fn display() {
        assert_eq!(Status::NONE.to_string(), "(none)");
        assert_eq!(Status::EOP.to_string(), "EOP");
        assert_eq!(
            (Status::BSY | Status::WRPERR | Status::OPTVERR).to_string(),
            "BSY | WRPERR | OPTVERR"
        );
    }
}
