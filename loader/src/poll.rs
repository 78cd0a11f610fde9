use crate::{Error, FlashRegs, Status};

/// Busy-wait policy for the flash status register.
///
/// The default is [`Poll::UNBOUNDED`]: the status register is read until
/// `BSY` clears, however long that takes. A flash controller that never
/// clears `BSY` will hang the caller until the debug host halts the core.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Poll {
    max_reads: Option<u32>,
}

impl Poll {
    /// Spin until `BSY` clears, without a limit.
    pub const UNBOUNDED: Poll = Poll { max_reads: None };

    /// Give up after `max_reads` reads of the status register that all show
    /// `BSY`.
    ///
    /// A `max_reads` of `0` is treated as `1`.
    ///
    /// # Example
    ///
    /// ```
    /// use stm32wl_flash_loader::Poll;
    ///
    /// const POLL: Poll = Poll::bounded(10_000);
    /// assert_eq!(POLL.max_reads(), Some(10_000));
    /// assert_eq!(Poll::bounded(0).max_reads(), Some(1));
    /// assert_eq!(Poll::UNBOUNDED.max_reads(), None);
    /// ```
    pub const fn bounded(max_reads: u32) -> Poll {
        let max_reads: u32 = if max_reads == 0 { 1 } else { max_reads };
        Poll {
            max_reads: Some(max_reads),
        }
    }

    /// Maximum number of status register reads, `None` if unbounded.
    pub const fn max_reads(&self) -> Option<u32> {
        self.max_reads
    }

    /// Read the status register until `BSY` clears.
    ///
    /// Returns the first status snapshot with `BSY` clear, or
    /// [`Error::Timeout`] once the read limit is exhausted.
    pub fn wait<F: FlashRegs + ?Sized>(&self, flash: &F) -> Result<Status, Error> {
        let mut reads: u32 = 0;
        loop {
            let sr: Status = flash.status();
            if !sr.is_busy() {
                return Ok(sr);
            }

            if let Some(max_reads) = self.max_reads {
                reads += 1;
                if reads >= max_reads {
                    return Err(Error::Timeout);
                }
            }

            core::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Poll;
    use crate::{Error, FlashRegs, Status};
    use core::cell::Cell;

    /// Shows `BSY` for a fixed number of reads.
    struct BusyFor {
        reads: Cell<u32>,
        busy: u32,
    }

    impl BusyFor {
        fn new(busy: u32) -> Self {
            Self {
                reads: Cell::new(0),
                busy,
            }
        }
    }

    impl FlashRegs for BusyFor {
        fn status(&self) -> Status {
            let n: u32 = self.reads.get();
            self.reads.set(n + 1);
            if n < self.busy {
                Status::BSY
            } else {
                Status::EOP
            }
        }

        fn clear_status(&mut self, _: Status) {}

        fn arm_program(&mut self) {}
    }

    #[test]
    fn default_is_unbounded() {
        assert_eq!(Poll::default(), Poll::UNBOUNDED);
        assert_eq!(Poll::default().max_reads(), None);
    }

    #[test]
    fn unbounded_waits_for_not_busy() {
        let flash = BusyFor::new(5_000);
        assert_eq!(Poll::UNBOUNDED.wait(&flash), Ok(Status::EOP));
        assert_eq!(flash.reads.get(), 5_001);
    }

    #[test]
    fn bounded_limit() {
        let flash = BusyFor::new(3);
        assert_eq!(Poll::bounded(3).wait(&flash), Err(Error::Timeout));
        assert_eq!(flash.reads.get(), 3);

        let flash = BusyFor::new(3);
        assert_eq!(Poll::bounded(4).wait(&flash), Ok(Status::EOP));
        assert_eq!(flash.reads.get(), 4);
    }

    #[test]
    fn bounded_zero_reads_once() {
        let flash = BusyFor::new(0);
        assert_eq!(Poll::bounded(0).wait(&flash), Ok(Status::EOP));

        let flash = BusyFor::new(1);
        assert_eq!(Poll::bounded(0).wait(&flash), Err(Error::Timeout));
        assert_eq!(flash.reads.get(), 1);
    }
}
