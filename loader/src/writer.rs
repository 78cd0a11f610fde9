use crate::{result_code, Error, FlashRegs, Memory, Poll, Status};
use core::ops::Range;

/// Size of one programming unit in bytes.
pub const DOUBLE_WORD: u32 = 8;

/// Source, destination, and size of a flash write.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transfer {
    /// Address of the data to program, in target memory.
    pub src: u32,
    /// Destination address in flash.
    pub dst: u32,
    /// Number of 32-bit words available at `src`.
    pub words: u32,
}

impl Transfer {
    /// Create a new transfer descriptor.
    pub const fn new(src: u32, dst: u32, words: u32) -> Self {
        Self { src, dst, words }
    }

    /// Number of double-words that will be programmed.
    ///
    /// A trailing unpaired word is not programmed.
    ///
    /// # Example
    ///
    /// ```
    /// use stm32wl_flash_loader::Transfer;
    ///
    /// assert_eq!(Transfer::new(0x2000_1000, 0x0803_0000, 4).groups(), 2);
    /// assert_eq!(Transfer::new(0x2000_1000, 0x0803_0000, 3).groups(), 1);
    /// assert_eq!(Transfer::new(0x2000_1000, 0x0803_0000, 1).groups(), 0);
    /// ```
    pub const fn groups(&self) -> u32 {
        self.words >> 1
    }

    /// Flash address range written by a complete transfer.
    ///
    /// # Example
    ///
    /// ```
    /// use stm32wl_flash_loader::Transfer;
    ///
    /// assert_eq!(
    ///     Transfer::new(0x2000_1000, 0x0803_0000, 5).dst_range(),
    ///     0x0803_0000..0x0803_0010
    /// );
    /// ```
    pub const fn dst_range(&self) -> Range<u32> {
        let len: u32 = self.groups().wrapping_mul(DOUBLE_WORD);
        self.dst..self.dst.wrapping_add(len)
    }
}

/// Final step of a transfer, returning control to the debug host.
///
/// On target this is a debug trap that never returns; a simulated host can
/// record the code instead.
pub trait HostExit {
    /// Value produced by [`exit`](HostExit::exit).
    type Output;

    /// Hand the result code to the host.
    fn exit(self, code: u32) -> Self::Output;
}

/// Program `transfer.words` words from `transfer.src` into flash at
/// `transfer.dst`, one double-word at a time.
///
/// For every double-word: `PG` is set, the two words are copied, the status
/// register is polled until `BSY` clears, the status flags are cleared, and
/// the snapshot taken before clearing is checked for errors. The first error
/// stops the transfer, later double-words are not attempted.
///
/// `PG` is left set on return.
///
/// # Safety
///
/// 1. Flash must be unlocked and the destination range erased by the caller.
/// 2. `transfer.src` must point to `transfer.words` readable words.
/// 3. `transfer.dst` must be a double-word aligned flash address, and the
///    range returned by [`Transfer::dst_range`] must be within flash.
/// 4. Do not program flash memory that is being used for your code.
///
/// # Example
///
/// ```no_run
/// use stm32wl_flash_loader::{program, Direct, FlashRegs, Poll, Transfer};
///
/// fn write<F: FlashRegs>(flash: &mut F) {
///     let transfer = Transfer::new(0x2000_1000, 0x0803_0000, 64);
///     let result = unsafe { program(flash, &mut Direct::new(), &transfer, Poll::UNBOUNDED) };
///     assert_eq!(result, Ok(()));
/// }
/// ```
pub unsafe fn program<F, M>(
    flash: &mut F,
    mem: &mut M,
    transfer: &Transfer,
    poll: Poll,
) -> Result<(), Error>
where
    F: FlashRegs + ?Sized,
    M: Memory + ?Sized,
{
    let groups: u32 = transfer.groups();
    let mut src: u32 = transfer.src;
    let mut dst: u32 = transfer.dst;

    debug!(
        "programming {=u32} double-words {=u32:#010X} -> {=u32:#010X}",
        groups,
        src,
        dst
    );

    for group in 0..groups {
        flash.arm_program();

        for _ in 0..2 {
            unsafe {
                let word: u32 = mem.read_u32(src);
                mem.write_u32(dst, word);
            }
            src = src.wrapping_add(4);
            dst = dst.wrapping_add(4);
        }

        let sr: Status = poll.wait(&*flash)?;
        flash.clear_status(Status::CLEAR);

        let err: Status = sr.errors();
        if !err.is_empty() {
            debug!("double-word {=u32} failed: {}", group, sr);
            return Err(Error::Flags(err));
        }

        trace!("double-word {=u32} done", group);
    }

    Ok(())
}

/// [`program`], then pass the [result code](crate::result_code) to `host`.
///
/// # Safety
///
/// See [`program`].
pub unsafe fn program_with_exit<F, M, H>(
    flash: &mut F,
    mem: &mut M,
    transfer: &Transfer,
    poll: Poll,
    host: H,
) -> H::Output
where
    F: FlashRegs + ?Sized,
    M: Memory + ?Sized,
    H: HostExit,
{
    let result: Result<(), Error> = unsafe { program(flash, mem, transfer, poll) };
    host.exit(result_code(result))
}

#[cfg(test)]
mod tests {
    use super::{program, Transfer};
    use crate::{Error, FlashRegs, Memory, Poll, Status};
    use core::cell::RefCell;
    use std::collections::BTreeMap;

    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    enum Op {
        Arm,
        Status,
        Clear(Status),
        Read(u32),
        Write(u32, u32),
    }

    /// Records every access into a shared log, reports `status` on every SR
    /// read.
    struct Regs<'a> {
        log: &'a RefCell<Vec<Op>>,
        status: Status,
    }

    impl FlashRegs for Regs<'_> {
        fn status(&self) -> Status {
            self.log.borrow_mut().push(Op::Status);
            self.status
        }

        fn clear_status(&mut self, mask: Status) {
            self.log.borrow_mut().push(Op::Clear(mask));
        }

        fn arm_program(&mut self) {
            self.log.borrow_mut().push(Op::Arm);
        }
    }

    /// Unmapped words read back as their own address.
    struct Mem<'a> {
        log: &'a RefCell<Vec<Op>>,
        words: BTreeMap<u32, u32>,
    }

    impl Memory for Mem<'_> {
        unsafe fn read_u32(&self, addr: u32) -> u32 {
            self.log.borrow_mut().push(Op::Read(addr));
            self.words.get(&addr).copied().unwrap_or(addr)
        }

        unsafe fn write_u32(&mut self, addr: u32, val: u32) {
            self.log.borrow_mut().push(Op::Write(addr, val));
        }
    }

    fn run(
        status: Status,
        words: &[(u32, u32)],
        transfer: Transfer,
    ) -> (Result<(), Error>, Vec<Op>) {
        let log: RefCell<Vec<Op>> = RefCell::new(Vec::new());
        let mut regs = Regs { log: &log, status };
        let mut mem = Mem {
            log: &log,
            words: words.iter().copied().collect(),
        };
        let result = unsafe { program(&mut regs, &mut mem, &transfer, Poll::UNBOUNDED) };
        (result, log.into_inner())
    }

    #[test]
    fn sequence_per_double_word() {
        let (result, ops) = run(Status::EOP, &[], Transfer::new(0x2000_0000, 0x0800_0000, 4));
        assert_eq!(result, Ok(()));

        let group = |src: u32, dst: u32| {
            [
                Op::Arm,
                Op::Read(src),
                Op::Write(dst, src),
                Op::Read(src + 4),
                Op::Write(dst + 4, src + 4),
                Op::Status,
                Op::Clear(Status::CLEAR),
            ]
        };
        let expected: Vec<Op> = group(0x2000_0000, 0x0800_0000)
            .into_iter()
            .chain(group(0x2000_0008, 0x0800_0008))
            .collect();
        assert_eq!(ops, expected);
    }

    #[test]
    fn error_stops_after_first_double_word() {
        let (result, ops) = run(
            Status::EOP | Status::WRPERR,
            &[],
            Transfer::new(0x2000_0000, 0x0800_0000, 6),
        );
        assert_eq!(result, Err(Error::Flags(Status::WRPERR)));

        let arms: usize = ops.iter().filter(|op| **op == Op::Arm).count();
        let writes: usize = ops
            .iter()
            .filter(|op| matches!(op, Op::Write(_, _)))
            .count();
        assert_eq!(arms, 1);
        assert_eq!(writes, 2);
        // status is still cleared before bailing out
        assert_eq!(ops.last(), Some(&Op::Clear(Status::CLEAR)));
    }

    #[test]
    fn no_access_without_a_pair() {
        for words in [0, 1] {
            let transfer = Transfer::new(0x2000_0000, 0x0800_0000, words);
            let (result, ops) = run(Status::EOP, &[], transfer);
            assert_eq!(result, Ok(()));
            assert!(ops.is_empty());
        }
    }

    #[test]
    fn odd_word_dropped() {
        let (result, ops) = run(
            Status::EOP,
            &[
                (0x2000_0000, 0xAAAA_AAAA),
                (0x2000_0004, 0xBBBB_BBBB),
                (0x2000_0008, 0xCCCC_CCCC),
            ],
            Transfer::new(0x2000_0000, 0x0800_0100, 3),
        );
        assert_eq!(result, Ok(()));

        let writes: Vec<Op> = ops
            .into_iter()
            .filter(|op| matches!(op, Op::Write(_, _)))
            .collect();
        assert_eq!(
            writes,
            [
                Op::Write(0x0800_0100, 0xAAAA_AAAA),
                Op::Write(0x0800_0104, 0xBBBB_BBBB),
            ]
        );
    }
}
