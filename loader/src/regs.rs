//! Flash controller registers.

use crate::Status;

/// Base address of the flash controller register block.
pub const FLASH_BASE: usize = 0x5800_4000;

/// Offset of the CPU1 status register (SR).
pub const SR_OFFSET: usize = 0x10;

/// Offset of the CPU1 control register (CR).
pub const CR_OFFSET: usize = 0x14;

/// Standard programming enable bit (PG) of the control register.
pub const CR_PG: u32 = 1 << 0;

/// Access to the flash controller status and control registers.
///
/// The register block belongs to the chip: its reset values and the lock
/// state are managed outside of this crate, implementations only read and
/// write bits on request.
pub trait FlashRegs {
    /// Read the status register.
    fn status(&self) -> Status;

    /// Write `mask` to the status register.
    ///
    /// Status flags are cleared by writing `1`, bits that are not set in
    /// `mask` are left as-is.
    fn clear_status(&mut self, mask: Status);

    /// Set the `PG` bit in the control register, leaving all other bits
    /// unchanged.
    fn arm_program(&mut self);
}

impl<T: FlashRegs + ?Sized> FlashRegs for &mut T {
    fn status(&self) -> Status {
        (**self).status()
    }

    fn clear_status(&mut self, mask: Status) {
        (**self).clear_status(mask)
    }

    fn arm_program(&mut self) {
        (**self).arm_program()
    }
}

#[cfg(any(
    feature = "stm32wl5x_cm0p",
    feature = "stm32wl5x_cm4",
    feature = "stm32wle5"
))]
impl FlashRegs for crate::pac::FLASH {
    #[inline(always)]
    fn status(&self) -> Status {
        Status::from_bits(c1_c2!(self.sr.read().bits(), self.c2sr.read().bits()))
    }

    #[inline(always)]
    #[allow(unused_unsafe)]
    fn clear_status(&mut self, mask: Status) {
        c1_c2!(
            self.sr.write(|w| unsafe { w.bits(mask.bits()) }),
            self.c2sr.write(|w| unsafe { w.bits(mask.bits()) })
        )
    }

    #[inline(always)]
    fn arm_program(&mut self) {
        c1_c2!(
            self.cr.modify(|_, w| w.pg().set_bit()),
            self.c2cr.modify(|_, w| w.pg().set_bit())
        )
    }
}
