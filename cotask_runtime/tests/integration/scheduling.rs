//! Integration test: round-robin ordering, tick wraparound and catch-up,
//! using plain counting tasks that publish through shared cells.

use std::cell::RefCell;
use std::rc::Rc;

use cotask_runtime::scheduler::{Scheduler, SchedulerError};
use cotask_runtime::share::Share;
use cotask_runtime::task::{PeriodicTask, StateMachine, StepContext, TaskError, TaskState};
use cotask_runtime::ticks::{ManualClock, TickWidth};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Count {
    Running,
}

impl TaskState for Count {
    fn label(self) -> &'static str {
        "S_RUN"
    }
}

/// Counts its runs into a cell and appends its name to a shared log.
struct Counter {
    name: &'static str,
    runs: Share<u32>,
    log: Rc<RefCell<Vec<&'static str>>>,
    fail_at: Option<u32>,
}

impl StateMachine for Counter {
    type State = Count;

    fn state(&self) -> Count {
        Count::Running
    }

    fn advance(&mut self, _ctx: StepContext) -> Result<(), TaskError> {
        let n = self.runs.read() + 1;
        self.runs.write(n);
        self.log.borrow_mut().push(self.name);
        if self.fail_at == Some(n) {
            return Err(TaskError::InvalidState {
                task: self.name,
                state: "S_RUN",
                detail: "counter reached its failure point".into(),
            });
        }
        Ok(())
    }
}

struct Bench {
    clock: ManualClock,
    scheduler: Scheduler,
    log: Rc<RefCell<Vec<&'static str>>>,
}

impl Bench {
    fn new(width: TickWidth, start: u32) -> Self {
        let clock = ManualClock::new(width, start);
        Self {
            scheduler: Scheduler::new(Box::new(clock.clone())),
            clock,
            log: Rc::default(),
        }
    }

    fn add(&mut self, name: &'static str, period: u32, fail_at: Option<u32>) -> Share<u32> {
        let runs = Share::new(name, 0);
        let machine = Counter {
            name,
            runs: runs.clone(),
            log: self.log.clone(),
            fail_at,
        };
        self.scheduler
            .add_task(PeriodicTask::new(name, period, &self.clock, machine));
        runs
    }

    fn tick(&mut self, delta: u32, passes: usize) {
        for _ in 0..passes {
            self.clock.advance(delta);
            self.scheduler.run_passes(1).unwrap();
        }
    }
}

#[test]
fn rates_hold_across_16_bit_wraparound() {
    let width = TickWidth::new(16).unwrap();
    let mut b = Bench::new(width, 60_000);
    let fast = b.add("fast", 1_000, None);
    let mid = b.add("mid", 2_000, None);
    let slow = b.add("slow", 4_000, None);

    // 40 ms of simulated time crosses the 65_536 boundary.
    b.tick(1_000, 40);
    assert_eq!(fast.read(), 40);
    assert_eq!(mid.read(), 20);
    assert_eq!(slow.read(), 10);
}

#[test]
fn due_tasks_run_in_registration_order() {
    let mut b = Bench::new(TickWidth::U32, 0);
    b.add("a", 1_000, None);
    b.add("b", 1_000, None);
    b.add("c", 2_000, None);

    b.tick(1_000, 2);
    assert_eq!(*b.log.borrow(), ["a", "b", "a", "b", "c"]);
}

#[test]
fn late_task_catches_up_one_period_per_pass() {
    let mut b = Bench::new(TickWidth::U32, 0);
    let runs = b.add("late", 1_000, None);

    // Stall for five periods, then keep the clock still.
    b.tick(5_000, 1);
    assert_eq!(runs.read(), 1);
    b.tick(0, 10);
    assert_eq!(runs.read(), 5);
}

#[test]
fn faulted_task_is_skipped_until_none_remain() {
    let mut b = Bench::new(TickWidth::U32, 0);
    let good = b.add("good", 1_000, Some(4));
    let bad = b.add("bad", 1_000, Some(2));

    b.tick(1_000, 3);
    assert_eq!(bad.read(), 2);
    assert_eq!(good.read(), 3);
    assert_eq!(b.scheduler.faulted(), ["bad"]);

    b.tick(1_000, 1);
    assert_eq!(good.read(), 4);
    b.clock.advance(1_000);
    assert!(matches!(
        b.scheduler.run_passes(1),
        Err(SchedulerError::AllTasksFaulted { count: 2 })
    ));
}
