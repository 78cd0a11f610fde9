//! SRAM image of the flash loader.
//!
//! The debug host stages the data in SRAM, unlocks and erases flash, then
//! starts execution at [`flash_write`] with:
//!
//! | Register | Value                                  |
//! |----------|----------------------------------------|
//! | `r0`     | source address in SRAM                 |
//! | `r1`     | destination address in flash           |
//! | `r2`     | number of 32-bit words at the source   |
//!
//! On completion the result code is placed in `r0` and the core halts on a
//! `bkpt`. `0` is success, anything else is the status register error mask
//! of the failing double-word (or `BSY` when the `bounded-poll` feature is
//! enabled and the flash controller never finished).
#![no_std]
#![no_main]

use core::{convert::Infallible, panic::PanicInfo};
use stm32wl_flash_loader::{self as loader, pac, Direct, HostExit, Poll, Transfer};

#[cfg(feature = "bounded-poll")]
const POLL: Poll = Poll::bounded(0x00F0_0000);
#[cfg(not(feature = "bounded-poll"))]
const POLL: Poll = Poll::UNBOUNDED;

/// Return to the debug host with the result code in `r0`.
struct Bkpt;

impl HostExit for Bkpt {
    type Output = Infallible;

    fn exit(self, code: u32) -> Infallible {
        // the host may resume the core, trap again if it does
        unsafe {
            core::arch::asm!(
                "2:",
                "bkpt #0",
                "b 2b",
                in("r0") code,
                options(noreturn, nomem, nostack),
            )
        }
    }
}

/// Program `words` 32-bit words from `src` into flash at `dst`.
///
/// # Safety
///
/// Only to be started by the debug host, with flash unlocked and the
/// destination erased. See [`loader::program`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn flash_write(src: u32, dst: u32, words: u32) -> ! {
    // nothing else runs on the core while the loader executes
    let mut dp: pac::Peripherals = unsafe { pac::Peripherals::steal() };
    let transfer: Transfer = Transfer::new(src, dst, words);

    match unsafe {
        loader::program_with_exit(&mut dp.FLASH, &mut Direct::new(), &transfer, POLL, Bkpt)
    } {}
}

#[panic_handler]
fn panic(_: &PanicInfo) -> ! {
    cortex_m::interrupt::disable();
    loop {
        cortex_m::asm::udf()
    }
}
