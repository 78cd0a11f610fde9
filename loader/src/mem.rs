use core::ptr::{read_volatile, write_volatile};

/// Word access to the target address space.
///
/// Addresses are 32-bit target addresses, the same values the debug host
/// places in the argument registers.
pub trait Memory {
    /// Read the 32-bit word at `addr`.
    ///
    /// # Safety
    ///
    /// `addr` must be word aligned and readable.
    unsafe fn read_u32(&self, addr: u32) -> u32;

    /// Write `val` to the 32-bit word at `addr`.
    ///
    /// # Safety
    ///
    /// `addr` must be word aligned and writable. For flash addresses the
    /// flash controller must be ready to accept the write.
    unsafe fn write_u32(&mut self, addr: u32, val: u32);
}

impl<T: Memory + ?Sized> Memory for &mut T {
    unsafe fn read_u32(&self, addr: u32) -> u32 {
        unsafe { (**self).read_u32(addr) }
    }

    unsafe fn write_u32(&mut self, addr: u32, val: u32) {
        unsafe { (**self).write_u32(addr, val) }
    }
}

/// Volatile access to the address space of the running core.
///
/// Only meaningful when executing on the target.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Direct {
    _priv: (),
}

impl Direct {
    /// Create a new `Direct` memory accessor.
    pub const fn new() -> Self {
        Self { _priv: () }
    }
}

impl Memory for Direct {
    #[inline(always)]
    unsafe fn read_u32(&self, addr: u32) -> u32 {
        unsafe { read_volatile(addr as usize as *const u32) }
    }

    #[inline(always)]
    unsafe fn write_u32(&mut self, addr: u32, val: u32) {
        unsafe { write_volatile(addr as usize as *mut u32, val) }
    }
}
