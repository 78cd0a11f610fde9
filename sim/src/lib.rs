//! Simulated STM32WL flash controller and address space.
//!
//! The model covers what the flash loader touches: SRAM, the flash array,
//! and the `SR`/`CR` registers of the flash controller. It follows the
//! reference manual closely enough to catch sequencing mistakes:
//!
//! * a flash write with `PG` clear, or while an error flag is still set,
//!   raises `PGSERR`
//! * the first word of a double-word must be 8-byte aligned and the second
//!   must follow it, otherwise `PGAERR`
//! * programming a double-word that is not erased raises `PROGERR`, unless
//!   the data is all zeros
//! * `BSY` is set when the second word is written and clears after a
//!   configurable number of status register reads, setting `EOP` or the
//!   error flags
//! * status flags are write-1-to-clear, `BSY` is read-only
//!
//! Errors can be injected for a given double-word with
//! [`SimTarget::with_fault`]; a faulted double-word leaves flash untouched.
//!
//! # Example
//!
//! ```
//! use stm32wl_flash_loader::{Poll, Transfer};
//! use stm32wl_flash_loader_sim::{SimTarget, FLASH_BASE, SRAM_BASE};
//!
//! let target = SimTarget::default();
//! target.load(SRAM_BASE, &[0x1111_1111, 0x2222_2222]);
//!
//! let code: u32 = target.run(&Transfer::new(SRAM_BASE, FLASH_BASE, 2), Poll::UNBOUNDED);
//! assert_eq!(code, 0);
//! assert_eq!(target.read(FLASH_BASE, 2), [0x1111_1111, 0x2222_2222]);
//! ```

use std::{cell::RefCell, collections::BTreeMap, ops::Range, rc::Rc};
use stm32wl_flash_loader::{
    program_with_exit, regs::CR_PG, FlashRegs, HostExit, Memory, Poll, Status, Transfer,
};

/// Start of the simulated SRAM.
pub const SRAM_BASE: u32 = 0x2000_0000;

/// Start of the simulated flash memory.
pub const FLASH_BASE: u32 = 0x0800_0000;

/// Value of an erased flash word.
pub const ERASED: u32 = 0xFFFF_FFFF;

/// Default SRAM size in bytes.
pub const SRAM_SIZE: u32 = 32 * 1024;

/// Default flash size in bytes.
pub const FLASH_SIZE: u32 = 256 * 1024;

/// How long the controller stays busy after a double-word is started.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Busy {
    /// `BSY` reads as set this many times before the operation completes.
    Reads(u32),
    /// `BSY` never clears.
    Stuck,
}

impl Default for Busy {
    fn default() -> Self {
        Busy::Reads(2)
    }
}

/// Something the code under test did to the target.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Event {
    /// `PG` was set in `CR`.
    ArmProgram,
    /// A word was written, to SRAM or flash.
    Write {
        /// Target address.
        addr: u32,
        /// Written value.
        val: u32,
    },
    /// A complete double-word was handed to the flash controller.
    Program {
        /// Index of the double-word since the target was created.
        group: u32,
        /// Flash address of the double-word.
        addr: u32,
    },
    /// The status register was written.
    ClearStatus {
        /// Status register before the write.
        before: Status,
        /// Status register after the write.
        after: Status,
    },
    /// The result code was handed to the host.
    Exit(u32),
}

#[derive(Debug)]
struct State {
    sram: Vec<u32>,
    flash: Vec<u32>,
    sr: Status,
    cr: u32,
    busy: Busy,
    busy_left: u32,
    completion: Status,
    faults: BTreeMap<u32, Status>,
    latch: Option<(u32, u32)>,
    programmed: u32,
    status_reads: u32,
    events: Vec<Event>,
}

const fn region(base: u32, words: usize) -> Range<u32> {
    base..base + (words as u32) * 4
}

impl State {
    fn word(&self, addr: u32) -> Option<u32> {
        if region(SRAM_BASE, self.sram.len()).contains(&addr) {
            Some(self.sram[((addr - SRAM_BASE) / 4) as usize])
        } else if region(FLASH_BASE, self.flash.len()).contains(&addr) {
            Some(self.flash[((addr - FLASH_BASE) / 4) as usize])
        } else {
            None
        }
    }

    fn word_mut(&mut self, addr: u32) -> Option<&mut u32> {
        if region(SRAM_BASE, self.sram.len()).contains(&addr) {
            Some(&mut self.sram[((addr - SRAM_BASE) / 4) as usize])
        } else if region(FLASH_BASE, self.flash.len()).contains(&addr) {
            Some(&mut self.flash[((addr - FLASH_BASE) / 4) as usize])
        } else {
            None
        }
    }

    fn is_flash(&self, addr: u32) -> bool {
        region(FLASH_BASE, self.flash.len()).contains(&addr)
    }

    fn flash_write(&mut self, addr: u32, val: u32) {
        if self.cr & CR_PG == 0 || self.sr.intersects(Status::ERRORS) || self.sr.is_busy() {
            self.sr |= Status::PGSERR;
            self.latch = None;
            return;
        }

        match self.latch.take() {
            None if addr % 8 != 0 => self.sr |= Status::PGAERR,
            None => self.latch = Some((addr, val)),
            Some((first, _)) if addr != first + 4 => self.sr |= Status::PGAERR,
            Some((first, low)) => self.start(first, low, val),
        }
    }

    fn start(&mut self, addr: u32, low: u32, high: u32) {
        let group: u32 = self.programmed;
        self.programmed += 1;
        self.events.push(Event::Program { group, addr });

        let idx: usize = ((addr - FLASH_BASE) / 4) as usize;
        self.completion = if let Some(fault) = self.faults.get(&group) {
            *fault
        } else if (self.flash[idx] != ERASED || self.flash[idx + 1] != ERASED)
            && (low, high) != (0, 0)
        {
            Status::PROGERR
        } else {
            self.flash[idx] &= low;
            self.flash[idx + 1] &= high;
            Status::EOP
        };

        self.sr |= Status::BSY;
        self.busy_left = match self.busy {
            Busy::Reads(n) => n,
            Busy::Stuck => 0,
        };
    }

    fn read_status(&mut self) -> Status {
        self.status_reads += 1;
        if self.sr.is_busy() {
            match self.busy {
                Busy::Stuck => (),
                Busy::Reads(_) if self.busy_left > 0 => self.busy_left -= 1,
                Busy::Reads(_) => {
                    self.sr = self.sr.difference(Status::BSY).union(self.completion);
                }
            }
        }
        self.sr
    }
}

/// Simulated target.
///
/// Cloning a `SimTarget` yields another handle to the same target.
#[derive(Debug, Clone)]
pub struct SimTarget {
    state: Rc<RefCell<State>>,
}

impl Default for SimTarget {
    fn default() -> Self {
        SimTarget::new(SRAM_SIZE, FLASH_SIZE)
    }
}

impl SimTarget {
    /// Create a target with `sram_size` bytes of zeroed SRAM and `flash_size`
    /// bytes of erased flash.
    pub fn new(sram_size: u32, flash_size: u32) -> Self {
        let state = State {
            sram: vec![0; (sram_size / 4) as usize],
            flash: vec![ERASED; (flash_size / 4) as usize],
            sr: Status::NONE,
            cr: 0,
            busy: Busy::default(),
            busy_left: 0,
            completion: Status::NONE,
            faults: BTreeMap::new(),
            latch: None,
            programmed: 0,
            status_reads: 0,
            events: Vec::new(),
        };
        SimTarget {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// Set how long the controller stays busy per double-word.
    #[must_use = "with_busy returns a modified SimTarget"]
    pub fn with_busy(self, busy: Busy) -> Self {
        self.state.borrow_mut().busy = busy;
        self
    }

    /// Raise `errors` instead of programming the double-word with index
    /// `group`.
    ///
    /// `group` counts every double-word started on this target, from `0`.
    #[must_use = "with_fault returns a modified SimTarget"]
    pub fn with_fault(self, group: u32, errors: Status) -> Self {
        self.state.borrow_mut().faults.insert(group, errors);
        self
    }

    /// Set the status register, as left behind by an earlier operation.
    #[must_use = "with_status returns a modified SimTarget"]
    pub fn with_status(self, status: Status) -> Self {
        self.state.borrow_mut().sr = status;
        self
    }

    /// Store `words` at `addr` without going through the flash controller.
    ///
    /// # Panics
    ///
    /// Panics if any word is outside of SRAM and flash.
    pub fn load(&self, addr: u32, words: &[u32]) {
        let mut state = self.state.borrow_mut();
        for (n, &word) in words.iter().enumerate() {
            let addr: u32 = addr + (n as u32) * 4;
            match state.word_mut(addr) {
                Some(slot) => *slot = word,
                None => panic!("load to unmapped address {addr:#010X}"),
            }
        }
    }

    /// Read `len` words starting at `addr`.
    ///
    /// # Panics
    ///
    /// Panics if any word is outside of SRAM and flash.
    pub fn read(&self, addr: u32, len: usize) -> Vec<u32> {
        let state = self.state.borrow();
        (0..len as u32)
            .map(|n| {
                let addr: u32 = addr + n * 4;
                state
                    .word(addr)
                    .unwrap_or_else(|| panic!("read from unmapped address {addr:#010X}"))
            })
            .collect()
    }

    /// Status register value, without the side effects of a register read.
    pub fn sr(&self) -> Status {
        self.state.borrow().sr
    }

    /// Control register value.
    pub fn cr(&self) -> u32 {
        self.state.borrow().cr
    }

    /// Number of double-words handed to the flash controller.
    pub fn programmed(&self) -> u32 {
        self.state.borrow().programmed
    }

    /// Number of status register reads.
    pub fn status_reads(&self) -> u32 {
        self.state.borrow().status_reads
    }

    /// Everything that happened to the target so far.
    pub fn events(&self) -> Vec<Event> {
        self.state.borrow().events.clone()
    }

    /// Flash controller register handle.
    pub fn flash(&self) -> SimFlash {
        SimFlash {
            state: Rc::clone(&self.state),
        }
    }

    /// Address space handle.
    pub fn memory(&self) -> SimMemory {
        SimMemory {
            state: Rc::clone(&self.state),
        }
    }

    /// Host handle recording the result code.
    pub fn host(&self) -> SimHost {
        SimHost {
            state: Rc::clone(&self.state),
        }
    }

    /// Run a transfer the way the debug host would, returning the result
    /// code.
    pub fn run(&self, transfer: &Transfer, poll: Poll) -> u32 {
        // safety: every address is checked by the model
        unsafe {
            program_with_exit(
                &mut self.flash(),
                &mut self.memory(),
                transfer,
                poll,
                self.host(),
            )
        }
    }
}

/// Simulated flash controller registers.
#[derive(Debug)]
pub struct SimFlash {
    state: Rc<RefCell<State>>,
}

impl FlashRegs for SimFlash {
    fn status(&self) -> Status {
        self.state.borrow_mut().read_status()
    }

    fn clear_status(&mut self, mask: Status) {
        let mut state = self.state.borrow_mut();
        let before: Status = state.sr;
        state.sr = before.difference(mask.intersection(Status::CLEAR));
        let after: Status = state.sr;
        state.events.push(Event::ClearStatus { before, after });
    }

    fn arm_program(&mut self) {
        let mut state = self.state.borrow_mut();
        state.cr |= CR_PG;
        state.events.push(Event::ArmProgram);
    }
}

/// Simulated address space.
///
/// # Panics
///
/// Accesses that are unaligned or outside of SRAM and flash panic.
#[derive(Debug)]
pub struct SimMemory {
    state: Rc<RefCell<State>>,
}

impl Memory for SimMemory {
    unsafe fn read_u32(&self, addr: u32) -> u32 {
        assert_eq!(addr % 4, 0, "unaligned read from {addr:#010X}");
        self.state
            .borrow()
            .word(addr)
            .unwrap_or_else(|| panic!("read from unmapped address {addr:#010X}"))
    }

    unsafe fn write_u32(&mut self, addr: u32, val: u32) {
        assert_eq!(addr % 4, 0, "unaligned write to {addr:#010X}");
        let mut state = self.state.borrow_mut();
        state.events.push(Event::Write { addr, val });
        if state.is_flash(addr) {
            state.flash_write(addr, val)
        } else {
            match state.word_mut(addr) {
                Some(slot) => *slot = val,
                None => panic!("write to unmapped address {addr:#010X}"),
            }
        }
    }
}

/// Simulated debug host.
#[derive(Debug)]
pub struct SimHost {
    state: Rc<RefCell<State>>,
}

impl HostExit for SimHost {
    type Output = u32;

    fn exit(self, code: u32) -> u32 {
        self.state.borrow_mut().events.push(Event::Exit(code));
        code
    }
}
