use crossbeam_utils::CachePadded;
use std::fmt;
use std::hint;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{DisruptorError, Result};
use crate::Core::futex::{futex_wait, futex_wake};
use crate::Core::sequence::{minimum_sequence, Sequence};

/// How a consumer passes the time until `sequence` becomes available.
///
/// `dependents` are the progress sequences of upstream stages; when empty the
/// producer cursor is what the consumer depends on. Implementations must poll
/// `alerted` at bounded intervals and return `DisruptorError::Alerted` once it
/// reports true.
pub trait WaitStrategy: Send + Sync + fmt::Debug {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alerted: &dyn Fn() -> bool,
    ) -> Result<i64>;

    /// Called by producers after publishing and by barriers on alert.
    fn signal_all_when_blocking(&self);
}

#[inline]
fn dependent_sequence(cursor: &Sequence, dependents: &[Arc<Sequence>]) -> i64 {
    if dependents.is_empty() {
        cursor.get()
    } else {
        minimum_sequence(dependents, i64::MAX)
    }
}

/// Burns a core; lowest latency, only sensible with a core per consumer.
#[derive(Debug, Default, Clone, Copy)]
pub struct BusySpinWaitStrategy;

impl WaitStrategy for BusySpinWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alerted: &dyn Fn() -> bool,
    ) -> Result<i64> {
        loop {
            if alerted() {
                return Err(DisruptorError::Alerted);
            }
            let available = dependent_sequence(cursor, dependents);
            if available >= sequence {
                return Ok(available);
            }
            hint::spin_loop();
        }
    }

    fn signal_all_when_blocking(&self) {}
}

const YIELD_SPIN_TRIES: u32 = 100;

/// Spins for a while, then yields the time slice on every poll.
#[derive(Debug, Default, Clone, Copy)]
pub struct YieldingWaitStrategy;

impl WaitStrategy for YieldingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alerted: &dyn Fn() -> bool,
    ) -> Result<i64> {
        let mut counter = YIELD_SPIN_TRIES;
        loop {
            if alerted() {
                return Err(DisruptorError::Alerted);
            }
            let available = dependent_sequence(cursor, dependents);
            if available >= sequence {
                return Ok(available);
            }
            if counter == 0 {
                thread::yield_now();
            } else {
                counter -= 1;
                hint::spin_loop();
            }
        }
    }

    fn signal_all_when_blocking(&self) {}
}

const SLEEP_RETRIES: u32 = 200;
const DEFAULT_SLEEP: Duration = Duration::from_nanos(100);

/// Spin, then yield, then sleep in short fixed steps.
#[derive(Debug, Clone, Copy)]
pub struct SleepingWaitStrategy {
    retries: u32,
    sleep: Duration,
}

impl SleepingWaitStrategy {
    pub fn new() -> Self {
        Self::with_backoff(SLEEP_RETRIES, DEFAULT_SLEEP)
    }

    pub fn with_backoff(retries: u32, sleep: Duration) -> Self {
        Self { retries, sleep }
    }
}

impl Default for SleepingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for SleepingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alerted: &dyn Fn() -> bool,
    ) -> Result<i64> {
        let mut counter = self.retries;
        loop {
            if alerted() {
                return Err(DisruptorError::Alerted);
            }
            let available = dependent_sequence(cursor, dependents);
            if available >= sequence {
                return Ok(available);
            }
            if counter > self.retries / 2 {
                counter -= 1;
                hint::spin_loop();
            } else if counter > 0 {
                counter -= 1;
                thread::yield_now();
            } else {
                thread::sleep(self.sleep);
            }
        }
    }

    fn signal_all_when_blocking(&self) {}
}

const DEFAULT_PARK_TIMEOUT: Duration = Duration::from_millis(1);

/// Parks consumers on a futex until a producer publishes.
///
/// The futex word is a generation counter bumped on every signal, so a
/// publish that lands between a consumer's check and its park is never lost.
/// The park is bounded by `timeout` so alerts are observed even if a wake-up
/// is missed. Once the cursor has moved, waiting on upstream stages spins.
pub struct BlockingWaitStrategy {
    generation: CachePadded<AtomicU32>,
    waiters: CachePadded<AtomicU32>,
    timeout: Duration,
}

impl BlockingWaitStrategy {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_PARK_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            generation: CachePadded::new(AtomicU32::new(0)),
            waiters: CachePadded::new(AtomicU32::new(0)),
            timeout,
        }
    }
}

impl Default for BlockingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BlockingWaitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingWaitStrategy")
            .field("waiters", &self.waiters.load(Ordering::Relaxed))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl BlockingWaitStrategy {
    /// Park until the cursor reaches `sequence`, then spin on `dependents`.
    /// With a `deadline`, gives up with `Timeout` once it passes.
    fn wait_until(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alerted: &dyn Fn() -> bool,
        deadline: Option<Instant>,
    ) -> Result<i64> {
        if cursor.get() < sequence {
            self.waiters.fetch_add(1, Ordering::SeqCst);
            let outcome = loop {
                let observed = self.generation.load(Ordering::SeqCst);
                if alerted() {
                    break Err(DisruptorError::Alerted);
                }
                if cursor.get() >= sequence {
                    break Ok(());
                }
                let park = match deadline {
                    Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                        Some(left) if !left.is_zero() => left.min(self.timeout),
                        _ => break Err(DisruptorError::Timeout),
                    },
                    None => self.timeout,
                };
                futex_wait(&self.generation, observed, Some(park));
            };
            self.waiters.fetch_sub(1, Ordering::SeqCst);
            outcome?;
        }

        loop {
            if alerted() {
                return Err(DisruptorError::Alerted);
            }
            let available = dependent_sequence(cursor, dependents);
            if available >= sequence {
                return Ok(available);
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(DisruptorError::Timeout);
            }
            hint::spin_loop();
        }
    }
}

impl WaitStrategy for BlockingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alerted: &dyn Fn() -> bool,
    ) -> Result<i64> {
        self.wait_until(sequence, cursor, dependents, alerted, None)
    }

    fn signal_all_when_blocking(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if self.waiters.load(Ordering::SeqCst) > 0 {
            futex_wake(&self.generation, i32::MAX);
        }
    }
}

/// Blocking wait that reports `DisruptorError::Timeout` when nothing arrives
/// within `timeout`; processors pass that on to `EventHandler::on_timeout`.
#[derive(Debug)]
pub struct TimeoutBlockingWaitStrategy {
    blocking: BlockingWaitStrategy,
    timeout: Duration,
}

impl TimeoutBlockingWaitStrategy {
    pub fn new(timeout: Duration) -> Self {
        Self {
            blocking: BlockingWaitStrategy::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl WaitStrategy for TimeoutBlockingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependents: &[Arc<Sequence>],
        alerted: &dyn Fn() -> bool,
    ) -> Result<i64> {
        let deadline = Instant::now() + self.timeout;
        self.blocking
            .wait_until(sequence, cursor, dependents, alerted, Some(deadline))
    }

    fn signal_all_when_blocking(&self) {
        self.blocking.signal_all_when_blocking();
    }
}

/// Selector used by the builder when a strategy is picked by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitStrategyKind {
    BusySpin,
    Yielding,
    #[default]
    Blocking,
    Sleeping,
}

impl WaitStrategyKind {
    pub fn build(self) -> Arc<dyn WaitStrategy> {
        match self {
            Self::BusySpin => Arc::new(BusySpinWaitStrategy),
            Self::Yielding => Arc::new(YieldingWaitStrategy),
            Self::Blocking => Arc::new(BlockingWaitStrategy::new()),
            Self::Sleeping => Arc::new(SleepingWaitStrategy::new()),
        }
    }
}
