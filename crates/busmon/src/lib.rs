use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use typed_builder::TypedBuilder;

use busmon_common::app::Firmware;
use busmon_common::hal::Delay;
use busmon_core::sim::{ClockProgram, EchoProgram, SimGpio};
use busmon_core::{Images, Monitor, MonitorConfig, TimeStamp, TimerTick, TIMER_HZ};

pub mod console;

use console::StdConsole;

const TICK_PERIOD: Duration = Duration::from_millis(1);

#[derive(TypedBuilder)]
pub struct RunInfo {
    pub title: String,
    /// Stop after this many shell steps.
    #[builder(default)]
    pub max_steps: Option<u64>,
    #[builder(default = TIMER_HZ)]
    pub timer_hz: u32,
}

/// Drives a [`Firmware`] while a background thread plays the hardware timer.
pub struct Runner;

impl Runner {
    pub fn run(info: RunInfo, mut timer: TimerTick, mut app: impl Firmware) -> Result<()> {
        let RunInfo {
            title,
            max_steps,
            timer_hz,
        } = info;
        log::info!("starting {title}, timer at {timer_hz} Hz");

        let stop = Arc::new(AtomicBool::new(false));
        let timer = {
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("timer".to_string())
                .spawn(move || tick(&mut timer, timer_hz, &stop))?
        };

        app.init();
        let mut steps = 0u64;
        loop {
            if app.should_exit() {
                break;
            }
            if max_steps.is_some_and(|max| steps >= max) {
                log::info!("step limit of {steps} reached");
                break;
            }
            app.step();
            steps += 1;
        }
        app.exit();

        stop.store(true, Ordering::Relaxed);
        timer
            .join()
            .map_err(|_| anyhow!("timer thread panicked"))?;
        Ok(())
    }
}

/// Advance `timer` at `hz` until `stop` is set.
fn tick(timer: &mut TimerTick, hz: u32, stop: &AtomicBool) {
    let start = Instant::now();
    let mut ticked = 0u64;
    while !stop.load(Ordering::Relaxed) {
        thread::sleep(TICK_PERIOD);
        let due = start.elapsed().as_nanos() * u128::from(hz) / 1_000_000_000;
        let due = u64::try_from(due).unwrap_or(u64::MAX);
        // Counter wraps at 32 bits, so a single advance never needs more.
        let ticks = (due - ticked).min(u64::from(u32::MAX)) as u32;
        timer.advance(ticks);
        ticked += u64::from(ticks);
    }
}

/// Wall-clock waits for the host build.
#[derive(Debug, Default)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }

    fn spin(&mut self, cycles: u32) {
        for _ in 0..cycles {
            std::hint::spin_loop();
        }
    }
}

/// Run the monitor shell on stdin/stdout against the simulated board.
///
/// The primary image boots the clock program and the secondary image the
/// echo program on the simulated target.
pub fn run_simulated(images: Images, config: MonitorConfig, info: RunInfo) -> Result<()> {
    let gpio = SimGpio::new()
        .with_program(images.primary(), ClockProgram::default())
        .with_program(images.secondary(), EchoProgram::default());
    let (timer, clock) = TimerTick::new(TimeStamp::default());
    let monitor = Monitor::new(gpio, StdDelay, StdConsole::spawn()?, clock, images, config);
    Runner::run(info, timer, monitor)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    struct Countdown {
        left: u64,
        log: Log,
    }

    impl Countdown {
        fn new(left: u64) -> (Self, Log) {
            let log = Log::default();
            (
                Self {
                    left,
                    log: Rc::clone(&log),
                },
                log,
            )
        }
    }

    impl Firmware for Countdown {
        fn init(&mut self) {
            self.log.borrow_mut().push("init");
        }

        fn step(&mut self) {
            self.left -= 1;
            self.log.borrow_mut().push("step");
        }

        fn should_exit(&self) -> bool {
            self.left == 0
        }

        fn exit(&mut self) {
            self.log.borrow_mut().push("exit");
        }

        fn title(&self) -> String {
            "countdown".to_string()
        }
    }

    #[test]
    fn runner_stops_when_firmware_exits() {
        let info = RunInfo::builder().title("test".to_string()).build();
        let (app, log) = Countdown::new(2);
        let (timer, _) = TimerTick::new(TimeStamp::default());
        Runner::run(info, timer, app).unwrap();
        assert_eq!(*log.borrow(), ["init", "step", "step", "exit"]);
    }

    #[test]
    fn runner_honours_step_limit() {
        let info = RunInfo::builder()
            .title("test".to_string())
            .max_steps(Some(3))
            .build();
        let (app, log) = Countdown::new(u64::MAX);
        let (timer, _) = TimerTick::new(TimeStamp::default());
        Runner::run(info, timer, app).unwrap();
        assert_eq!(log.borrow().iter().filter(|&&e| e == "step").count(), 3);
        assert_eq!(log.borrow().last(), Some(&"exit"));
    }

    #[test]
    fn timer_thread_advances_counter() {
        let (mut timer, clock) = TimerTick::new(TimeStamp::default());
        let stop = AtomicBool::new(false);
        thread::scope(|s| {
            s.spawn(|| tick(&mut timer, TIMER_HZ, &stop));
            thread::sleep(Duration::from_millis(20));
            stop.store(true, Ordering::Relaxed);
        });
        assert!(clock.get_time() > TimeStamp::default());
    }

    #[test]
    fn std_delay_sleeps_at_least_requested() {
        let start = Instant::now();
        StdDelay.sleep(Duration::from_millis(2));
        StdDelay.spin(10);
        assert!(start.elapsed() >= Duration::from_millis(2));
    }
}
