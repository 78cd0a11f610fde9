#![no_std]
#![no_main]

use core::ptr::{addr_of, read_volatile};
use defmt::unwrap;
use defmt_rtt as _; // global logger
use panic_probe as _;
use static_assertions as sa;
use stm32wl_flash_loader::{
    pac::{self, DWT},
    program, regs, Direct, Error, Poll, Status, Transfer,
};

const FREQ: u32 = 4_000_000;
const CYC_PER_MICRO: u32 = FREQ / 1000 / 1000;

const FLASH_START: u32 = 0x0800_0000;
const PAGE_SIZE: u32 = 2048;

// flash only gets 10k program cycles, stay clear of the test binary
const PAGE: u8 = 120;
const PAGE_ADDR: u32 = FLASH_START + (PAGE as u32) * PAGE_SIZE;

const WORDS: usize = 64;
sa::const_assert!(WORDS as u32 * 4 <= PAGE_SIZE);

// WARNING will wrap-around eventually, use this for relative timing only
defmt::timestamp!("{=u32:us}", DWT::cycle_count() / CYC_PER_MICRO);

#[cortex_m_rt::exception]
#[allow(non_snake_case)]
unsafe fn HardFault(ef: &cortex_m_rt::ExceptionFrame) -> ! {
    cortex_m::interrupt::disable();
    defmt::error!("HardFault {:#}", defmt::Debug2Format(ef));
    defmt::flush();
    loop {
        cortex_m::asm::udf()
    }
}

fn unlock(flash: &mut pac::FLASH) {
    flash.keyr.write(|w| w.key().bits(0x4567_0123));
    flash.keyr.write(|w| w.key().bits(0xCDEF_89AB));
}

fn erase_page(flash: &mut pac::FLASH) {
    flash.sr.write(|w| unsafe { w.bits(Status::CLEAR.bits()) });
    flash.cr.modify(|_, w| {
        w.pg()
            .clear_bit()
            .per()
            .set_bit()
            .pnb()
            .bits(PAGE)
            .strt()
            .set_bit()
    });
    while flash.sr.read().bsy().bit_is_set() {}
    flash.cr.modify(|_, w| w.per().clear_bit());
    flash.sr.write(|w| unsafe { w.bits(Status::CLEAR.bits()) });
}

unsafe fn program_unbounded(flash: &mut pac::FLASH, transfer: &Transfer) -> Result<(), Error> {
    program(flash, &mut Direct::new(), transfer, Poll::UNBOUNDED)
}

fn flash_word(idx: usize) -> u32 {
    unsafe { read_volatile((PAGE_ADDR as *const u32).add(idx)) }
}

fn pattern() -> [u32; WORDS] {
    let mut buf: [u32; WORDS] = [0; WORDS];
    buf.iter_mut()
        .enumerate()
        .for_each(|(n, w)| *w = (n as u32).wrapping_mul(0x9E37_79B9) | 1);
    buf
}

#[defmt_test::tests]
mod tests {
    use super::*;

    struct TestArgs {
        flash: pac::FLASH,
    }

    #[init]
    fn init() -> TestArgs {
        let mut cp: pac::CorePeripherals = unwrap!(pac::CorePeripherals::take());
        let mut dp: pac::Peripherals = unwrap!(pac::Peripherals::take());

        cp.DCB.enable_trace();
        cp.DWT.enable_cycle_counter();
        cp.DWT.set_cycle_count(0);

        unlock(&mut dp.FLASH);

        defmt::info!("Testing with page {}, {:#010X}", PAGE, PAGE_ADDR);

        TestArgs { flash: dp.FLASH }
    }

    #[test]
    fn register_layout() {
        let base: usize = pac::FLASH::PTR as usize;
        let sr: usize = unsafe { addr_of!((*pac::FLASH::PTR).sr) } as usize;
        let cr: usize = unsafe { addr_of!((*pac::FLASH::PTR).cr) } as usize;
        defmt::assert_eq!(base, regs::FLASH_BASE);
        defmt::assert_eq!(sr - base, regs::SR_OFFSET);
        defmt::assert_eq!(cr - base, regs::CR_OFFSET);

        // ensure previous logs are seen before we start executing code that can
        // result in difficult-to-debug situations
        defmt::flush();
    }

    #[test]
    fn program_words(ta: &mut TestArgs) {
        erase_page(&mut ta.flash);
        let buf: [u32; WORDS] = pattern();
        let transfer = Transfer::new(buf.as_ptr() as u32, PAGE_ADDR, WORDS as u32);

        let start: u32 = DWT::cycle_count();
        let result = unsafe { program_unbounded(&mut ta.flash, &transfer) };
        let elapsed: u32 = DWT::cycle_count().wrapping_sub(start);

        defmt::info!(
            "{}B program duration: {=u32:us} seconds",
            WORDS * 4,
            elapsed / CYC_PER_MICRO
        );

        defmt::assert_eq!(result, Ok(()));
        for (idx, &word) in buf.iter().enumerate() {
            defmt::assert_eq!(flash_word(idx), word);
        }
        defmt::assert!(ta.flash.sr.read().bits() & Status::CLEAR.bits() == 0);
        defmt::assert!(ta.flash.cr.read().pg().bit_is_set());
    }

    #[test]
    fn odd_word_count(ta: &mut TestArgs) {
        erase_page(&mut ta.flash);
        let buf: [u32; 3] = [0x1111_1111, 0x2222_2222, 0x3333_3333];
        let transfer = Transfer::new(buf.as_ptr() as u32, PAGE_ADDR, 3);

        let result = unsafe { program_unbounded(&mut ta.flash, &transfer) };

        defmt::assert_eq!(result, Ok(()));
        defmt::assert_eq!(flash_word(0), 0x1111_1111);
        defmt::assert_eq!(flash_word(1), 0x2222_2222);
        defmt::assert_eq!(flash_word(2), u32::MAX);
    }

    #[test]
    fn program_over_data(ta: &mut TestArgs) {
        erase_page(&mut ta.flash);
        let buf: [u32; 4] = [0x1111_1111, 0x2222_2222, 0x3333_3333, 0x4444_4444];
        let upper: *const u32 = buf[2..].as_ptr();
        let transfer = Transfer::new(upper as u32, PAGE_ADDR + 8, 2);
        unwrap!(unsafe { program_unbounded(&mut ta.flash, &transfer) });

        // the second double-word is already programmed
        let transfer = Transfer::new(buf.as_ptr() as u32, PAGE_ADDR, 4);
        let result = unsafe { program_unbounded(&mut ta.flash, &transfer) };

        defmt::assert_eq!(result, Err(Error::Flags(Status::PROGERR)));
        defmt::assert_eq!(flash_word(0), 0x1111_1111);
        defmt::assert_eq!(flash_word(1), 0x2222_2222);
        defmt::assert_eq!(flash_word(2), 0x3333_3333);
        defmt::assert!(ta.flash.sr.read().bits() & Status::CLEAR.bits() == 0);
    }

    #[test]
    fn bounded_poll(ta: &mut TestArgs) {
        erase_page(&mut ta.flash);
        let buf: [u32; WORDS] = pattern();
        let transfer = Transfer::new(buf.as_ptr() as u32, PAGE_ADDR, WORDS as u32);

        let result = unsafe {
            program(&mut ta.flash, &mut Direct::new(), &transfer, Poll::bounded(100_000))
        };

        defmt::assert_eq!(result, Ok(()));
        defmt::assert_eq!(flash_word(WORDS - 1), buf[WORDS - 1]);
    }
}
