//! Free-running 32-bit time source.
//!
//! The low word is the 16-bit hardware counter, the high word counts its
//! overflows. Both halves are written by a single producer (the timer-tick
//! task) inside a sequence-lock write section, so a reader never sees a low
//! word that has already wrapped paired with a high word that has not yet
//! been bumped.

use std::sync::atomic::{fence, AtomicU16, AtomicU32, Ordering};
use std::sync::Arc;

/// A consistent (high, low) snapshot of the timer.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TimeStamp {
    pub high: u16,
    pub low: u16,
}

impl TimeStamp {
    pub const fn new(high: u16, low: u16) -> Self {
        Self { high, low }
    }

    pub const fn from_u32(value: u32) -> Self {
        Self {
            high: (value >> 16) as u16,
            low: value as u16,
        }
    }

    /// `high * 2^16 + low`.
    pub const fn as_u32(self) -> u32 {
        (self.high as u32) << 16 | self.low as u32
    }

    /// Low word first, each word little-endian; the GETTIME result layout.
    pub const fn to_le_bytes(self) -> [u8; 4] {
        self.as_u32().to_le_bytes()
    }
}

#[derive(Debug, Default)]
pub struct TimerCounter {
    /// Odd while a write section is open.
    seq: AtomicU32,
    low: AtomicU16,
    high: AtomicU16,
}

impl TimerCounter {
    pub fn starting_at(time: TimeStamp) -> Self {
        Self {
            seq: AtomicU32::new(0),
            low: AtomicU16::new(time.low),
            high: AtomicU16::new(time.high),
        }
    }

    /// Advance the hardware counter by `ticks`, running the overflow handler
    /// once for every wrap of the low word.
    ///
    /// Only reachable through the counter's single [`TimerTick`].
    fn advance(&self, ticks: u32) {
        self.write_section(|| {
            let total = u64::from(self.low.load(Ordering::Relaxed)) + u64::from(ticks);
            self.low.store(total as u16, Ordering::Relaxed);
            for _ in 0..(total >> 16) {
                self.on_overflow();
            }
        });
    }

    /// Timer overflow interrupt body.
    fn on_overflow(&self) {
        let high = self.high.load(Ordering::Relaxed);
        self.high.store(high.wrapping_add(1), Ordering::Relaxed);
    }

    fn write_section(&self, f: impl FnOnce()) {
        let seq = self.seq.load(Ordering::Relaxed);
        self.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        f();
        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Read both words, retrying while a write section overlaps the read.
    pub fn snapshot(&self) -> TimeStamp {
        loop {
            let before = self.seq.load(Ordering::Acquire);
            if before & 1 == 1 {
                std::hint::spin_loop();
                continue;
            }
            let low = self.low.load(Ordering::Relaxed);
            let high = self.high.load(Ordering::Relaxed);
            fence(Ordering::Acquire);
            if self.seq.load(Ordering::Relaxed) == before {
                return TimeStamp { high, low };
            }
        }
    }
}

/// Read side of the timer, held by the dispatcher and the monitor shell.
#[derive(Clone, Debug, Default)]
pub struct Clock {
    counter: Arc<TimerCounter>,
}

impl Clock {
    pub fn new(counter: Arc<TimerCounter>) -> Self {
        Self { counter }
    }

    pub fn get_time(&self) -> TimeStamp {
        self.counter.snapshot()
    }
}

/// Write side of the timer: the timer-tick task.
///
/// Each counter has exactly one, created together with it, so the write
/// sections of the sequence lock never overlap.
#[derive(Debug)]
pub struct TimerTick {
    counter: Arc<TimerCounter>,
}

impl TimerTick {
    /// A counter starting at `time`, its producer and a first reader.
    pub fn new(time: TimeStamp) -> (Self, Clock) {
        let counter = Arc::new(TimerCounter::starting_at(time));
        let clock = Clock::new(Arc::clone(&counter));
        (Self { counter }, clock)
    }

    pub fn advance(&mut self, ticks: u32) {
        self.counter.advance(ticks);
    }

    pub fn clock(&self) -> Clock {
        Clock::new(Arc::clone(&self.counter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::thread;

    #[test]
    fn advance_carries_into_high_word() {
        let (mut tick, clock) = TimerTick::new(TimeStamp::new(0x0001, 0xFFF0));
        tick.advance(0x20);
        assert_eq!(clock.get_time(), TimeStamp::new(0x0002, 0x0010));
    }

    #[test]
    fn one_increment_per_wrap() {
        let (mut tick, clock) = TimerTick::new(TimeStamp::default());
        tick.advance(3 * 0x1_0000 + 5);
        assert_eq!(clock.get_time(), TimeStamp::new(3, 5));
    }

    #[test]
    fn wraps_at_32_bits() {
        let (mut tick, clock) = TimerTick::new(TimeStamp::new(0xFFFF, 0xFFFF));
        tick.advance(2);
        assert_eq!(clock.get_time().as_u32(), 1);
    }

    #[test]
    fn get_time_is_non_decreasing() {
        let (mut tick, clock) = TimerTick::new(TimeStamp::default());
        let first = clock.get_time();
        tick.advance(1234);
        let second = clock.get_time();
        assert!(second.as_u32() >= first.as_u32());
        assert_eq!(second.as_u32() - first.as_u32(), 1234);
    }

    #[test]
    fn le_bytes_match_gettime_layout() {
        let time = TimeStamp::new(0xA1B2, 0xC3D4);
        assert_eq!(time.to_le_bytes(), [0xD4, 0xC3, 0xB2, 0xA1]);
        assert_eq!(TimeStamp::from_u32(0xA1B2_C3D4), time);
    }

    #[test]
    fn concurrent_overflow_never_tears() {
        let (mut tick, clock) = TimerTick::new(TimeStamp::new(0, 0xFF00));
        let done = Arc::new(AtomicBool::new(false));

        let ticker = {
            let done = Arc::clone(&done);
            thread::spawn(move || {
                for _ in 0..200_000 {
                    tick.advance(0x101);
                }
                done.store(true, Ordering::Release);
            })
        };

        let mut last = clock.get_time().as_u32();
        while !done.load(Ordering::Acquire) {
            let now = clock.get_time().as_u32();
            assert!(now >= last, "time went backwards: {last:#010X} -> {now:#010X}");
            assert_eq!((now - 0xFF00) % 0x101, 0, "torn read {now:#010X}");
            last = now;
        }
        ticker.join().unwrap();
        assert_eq!(clock.get_time().as_u32(), 0xFF00 + 200_000 * 0x101);
    }

    #[test]
    fn every_reader_sees_the_producer() {
        let (mut tick, first) = TimerTick::new(TimeStamp::default());
        let second = tick.clock();
        let third = first.clone();
        tick.advance(0x1_0001);
        for clock in [first, second, third] {
            assert_eq!(clock.get_time(), TimeStamp::new(1, 1));
        }
    }
}
