//! Flash word-pair writer for the STM32WL.
//!
//! A routine that runs from SRAM under the control of a debug probe and
//! programs a buffer, already resident in target memory, into flash using the
//! standard double-word programming sequence:
//!
//! 1. set `PG` in `FLASH_CR`
//! 2. write two consecutive 32-bit words
//! 3. wait for `BSY` to clear in `FLASH_SR`
//! 4. clear `EOP` and the error flags
//! 5. stop on the first error, otherwise continue with the next double-word
//!
//! The result is reported as a single word: `0` on success, otherwise the
//! error flags raised by the failing step. Unlocking, erasing, and verifying
//! flash are left to the debug host.
//!
//! Register and memory access go through the [`FlashRegs`] and [`Memory`]
//! traits. With one of the chip features enabled [`FlashRegs`] is implemented
//! for the [`pac`] `FLASH` peripheral, and [`Direct`] accesses target memory.
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

mod macros;

mod error;
mod mem;
mod poll;
pub mod regs;
mod status;
mod writer;

pub use error::{result_code, Error};
pub use mem::{Direct, Memory};
pub use poll::Poll;
pub use regs::FlashRegs;
pub use status::{Flag, Status};
pub use writer::{program, program_with_exit, HostExit, Transfer, DOUBLE_WORD};

cfg_if::cfg_if! {
    if #[cfg(feature = "stm32wl5x_cm0p")] {
        /// Peripheral access crate.
        pub use stm32wl::stm32wl5x_cm0p as pac;
    } else if #[cfg(feature = "stm32wl5x_cm4")] {
        /// Peripheral access crate.
        pub use stm32wl::stm32wl5x_cm4 as pac;
    } else if #[cfg(feature = "stm32wle5")] {
        /// Peripheral access crate.
        pub use stm32wl::stm32wle5 as pac;
    }
}
