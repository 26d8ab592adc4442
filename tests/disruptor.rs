mod common;

use common::{eventually, CountDownLatch};
use dmxp_disruptor::error::{DisruptorError, EventError, RewindableError};
use dmxp_disruptor::MPMC::{
    DisruptorBuilder, EventHandler, EventuallyGiveUpBatchRewindStrategy, ExceptionHandler, FnHandler,
    IgnoreExceptionHandler, ProcessorState, ProducerType, SimpleBatchRewindStrategy, TimeoutBlockingWaitStrategy,
    WaitStrategyKind,
};

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Default)]
struct ValueEvent {
    value: i64,
    doubled: i64,
}

fn stage<F>(f: F) -> FnHandler<F>
where
    F: FnMut(&mut ValueEvent, i64, bool) -> Result<(), EventError> + Send,
{
    FnHandler(f)
}

/// Records every failure it is handed and skips the event.
#[derive(Default)]
struct RecordingExceptionHandler {
    failures: Mutex<Vec<(i64, bool)>>,
}

impl ExceptionHandler<ValueEvent> for Arc<RecordingExceptionHandler> {
    fn handle_event_exception(&self, error: EventError, sequence: i64, _event: &ValueEvent) -> Result<(), EventError> {
        self.failures.lock().push((sequence, error.is_rewindable()));
        Ok(())
    }

    fn handle_on_start_exception(&self, _error: EventError) {}

    fn handle_on_shutdown_exception(&self, _error: EventError) {}
}

#[test]
fn stages_see_events_after_the_stage_before_them() {
    let mut disruptor = DisruptorBuilder::new()
        .with_buffer_size(256)
        .with_wait_strategy_kind(WaitStrategyKind::Yielding)
        .build(ValueEvent::default)
        .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    disruptor
        .handle_events_with(stage(|event, _seq, _eob| {
            event.doubled = event.value * 2;
            Ok(())
        }))
        .unwrap()
        .then(stage(move |event, _seq, _eob| {
            sink.lock().push((event.value, event.doubled));
            Ok(())
        }))
        .unwrap();

    let ring_buffer = disruptor.start().unwrap();
    for i in 0..10_000 {
        ring_buffer.publish_event(|event, _sequence| event.value = i).unwrap();
    }
    disruptor.shutdown_timeout(Duration::from_secs(10)).unwrap();

    let seen = seen.lock();
    assert_eq!(seen.len(), 10_000);
    for (i, &(value, doubled)) in seen.iter().enumerate() {
        assert_eq!(value, i as i64);
        assert_eq!(doubled, value * 2);
    }
}

#[test]
fn shutdown_right_after_start_drains_the_event() {
    for round in 0..50 {
        let mut disruptor = DisruptorBuilder::new().with_buffer_size(8).build(ValueEvent::default).unwrap();

        let processed = Arc::new(AtomicUsize::new(0));
        let count = processed.clone();
        disruptor
            .handle_events_with(stage(move |_event, _seq, _eob| {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .unwrap()
            .then(stage(|event, _seq, _eob| {
                event.doubled = event.value * 2;
                Ok(())
            }))
            .unwrap();

        let ring_buffer = disruptor.start().unwrap();
        ring_buffer.publish_event(|event, _sequence| event.value = round).unwrap();
        disruptor.shutdown_timeout(Duration::from_secs(5)).unwrap();

        assert_eq!(processed.load(Ordering::SeqCst), 1, "round {round}");
        assert!(disruptor.processors().iter().all(|control| control.sequence().get() == 0));
    }
}

#[test]
fn shutdown_does_not_wait_behind_a_halted_stage() {
    let mut disruptor = DisruptorBuilder::new().with_buffer_size(16).build(ValueEvent::default).unwrap();
    disruptor
        .handle_events_with(stage(|_event, sequence, _eob| {
            if sequence == 2 {
                return Err(EventError::fatal("stop here"));
            }
            Ok(())
        }))
        .unwrap()
        .then(stage(|_event, _seq, _eob| Ok(())))
        .unwrap();

    let ring_buffer = disruptor.start().unwrap();
    for i in 0..6 {
        ring_buffer.publish_event(|event, _sequence| event.value = i).unwrap();
    }
    let upstream = disruptor.processors()[0].clone();
    assert!(eventually(Duration::from_secs(5), || upstream.state() == ProcessorState::Halted));

    disruptor.shutdown_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(disruptor.processors()[1].sequence().get(), upstream.sequence().get());
}

#[test]
fn multiple_producers_keep_per_producer_order() {
    const PRODUCERS: i64 = 4;
    const PER_PRODUCER: i64 = 2_500;

    let mut disruptor = DisruptorBuilder::new()
        .with_buffer_size(64)
        .with_producer_type(ProducerType::Multi)
        .build(ValueEvent::default)
        .unwrap();

    let last_seen = Arc::new(Mutex::new(vec![-1i64; PRODUCERS as usize]));
    let received = Arc::new(AtomicUsize::new(0));
    let (last, count) = (last_seen.clone(), received.clone());
    disruptor
        .handle_events_with(stage(move |event, _seq, _eob| {
            let producer = (event.value / 1_000_000) as usize;
            let index = event.value % 1_000_000;
            let mut last = last.lock();
            assert!(index > last[producer], "producer {producer} went backwards");
            last[producer] = index;
            count.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }))
        .unwrap();

    let ring_buffer = disruptor.start().unwrap();
    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let ring_buffer = ring_buffer.clone();
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    ring_buffer
                        .publish_event(|event, _sequence| event.value = p * 1_000_000 + i)
                        .unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    disruptor.shutdown_timeout(Duration::from_secs(10)).unwrap();

    assert_eq!(received.load(Ordering::Relaxed), (PRODUCERS * PER_PRODUCER) as usize);
    assert!(last_seen.lock().iter().all(|&last| last == PER_PRODUCER - 1));
}

#[test]
fn rewind_redelivers_the_whole_batch() {
    const BATCH: i64 = 10;
    const FAILURES: usize = 3;

    let mut disruptor = DisruptorBuilder::new().with_buffer_size(16).build(ValueEvent::default).unwrap();

    let invocations = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(AtomicUsize::new(0));
    let (calls, failed) = (invocations.clone(), failures.clone());
    disruptor
        .handle_events_with_rewind(
            stage(move |_event, sequence, _eob| {
                calls.fetch_add(1, Ordering::SeqCst);
                if sequence == BATCH - 1 && failed.load(Ordering::SeqCst) < FAILURES {
                    failed.fetch_add(1, Ordering::SeqCst);
                    return Err(EventError::from(RewindableError::new("try again")));
                }
                Ok(())
            }),
            SimpleBatchRewindStrategy,
        )
        .unwrap();

    // Published before the stage starts, so the first wake-up sees one batch.
    let ring_buffer = disruptor.ring_buffer().clone();
    for i in 0..BATCH {
        ring_buffer.publish_event(|event, _sequence| event.value = i).unwrap();
    }
    disruptor.start().unwrap();
    disruptor.shutdown_timeout(Duration::from_secs(10)).unwrap();

    assert_eq!(invocations.load(Ordering::SeqCst), BATCH as usize * (1 + FAILURES));
}

#[test]
fn give_up_strategy_hands_the_failure_to_the_exception_handler() {
    const BATCH: i64 = 10;

    let mut disruptor = DisruptorBuilder::new().with_buffer_size(16).build(ValueEvent::default).unwrap();

    let exceptions = Arc::new(RecordingExceptionHandler::default());
    disruptor.handle_exceptions_with(exceptions.clone());

    let invocations = Arc::new(AtomicUsize::new(0));
    let calls = invocations.clone();
    disruptor
        .handle_events_with_rewind(
            stage(move |_event, sequence, _eob| {
                calls.fetch_add(1, Ordering::SeqCst);
                if sequence == BATCH - 1 {
                    return Err(EventError::from(RewindableError::new("never works")));
                }
                Ok(())
            }),
            EventuallyGiveUpBatchRewindStrategy::new(2),
        )
        .unwrap();

    let ring_buffer = disruptor.ring_buffer().clone();
    for i in 0..BATCH {
        ring_buffer.publish_event(|event, _sequence| event.value = i).unwrap();
    }
    disruptor.start().unwrap();
    disruptor.shutdown_timeout(Duration::from_secs(10)).unwrap();

    // Two rewinds, then the third failure is thrown.
    assert_eq!(invocations.load(Ordering::SeqCst), BATCH as usize * 3);
    assert_eq!(*exceptions.failures.lock(), vec![(BATCH - 1, true)]);
}

#[test]
fn fatal_failure_halts_the_processor() {
    let mut disruptor = DisruptorBuilder::new().with_buffer_size(16).build(ValueEvent::default).unwrap();
    disruptor
        .handle_events_with(stage(|_event, sequence, _eob| {
            if sequence == 3 {
                return Err(EventError::fatal("boom"));
            }
            Ok(())
        }))
        .unwrap();

    let ring_buffer = disruptor.start().unwrap();
    for i in 0..8 {
        ring_buffer.publish_event(|event, _sequence| event.value = i).unwrap();
    }

    let control = disruptor.processors()[0].clone();
    assert!(eventually(Duration::from_secs(5), || control.state() == ProcessorState::Halted));
    assert!(control.sequence().get() < 3);
    disruptor.halt();
}

#[test]
fn ignored_panics_skip_only_the_failing_event() {
    let mut disruptor = DisruptorBuilder::new().with_buffer_size(16).build(ValueEvent::default).unwrap();
    disruptor.handle_exceptions_with(IgnoreExceptionHandler);

    let processed = Arc::new(AtomicUsize::new(0));
    let count = processed.clone();
    disruptor
        .handle_events_with(stage(move |_event, sequence, _eob| {
            if sequence == 2 {
                panic!("handler bug");
            }
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .unwrap();

    let ring_buffer = disruptor.start().unwrap();
    for i in 0..10 {
        ring_buffer.publish_event(|event, _sequence| event.value = i).unwrap();
    }
    disruptor.shutdown_timeout(Duration::from_secs(10)).unwrap();

    assert_eq!(processed.load(Ordering::SeqCst), 9);
    assert_eq!(disruptor.processors()[0].state(), ProcessorState::Halted);
}

#[test]
fn halting_the_sequencer_releases_a_blocked_producer() {
    let mut disruptor = DisruptorBuilder::new().with_buffer_size(4).build(ValueEvent::default).unwrap();

    let release = Arc::new(CountDownLatch::new(1));
    let gate = release.clone();
    disruptor
        .handle_events_with(stage(move |_event, _seq, _eob| {
            gate.wait_timeout(Duration::from_secs(10));
            Ok(())
        }))
        .unwrap();

    let ring_buffer = disruptor.start().unwrap();
    let producer = {
        let ring_buffer = ring_buffer.clone();
        thread::spawn(move || {
            let mut published = 0;
            loop {
                match ring_buffer.publish_event(|event, _sequence| event.value = published) {
                    Ok(_) => published += 1,
                    Err(err) => return (published, err),
                }
            }
        })
    };

    assert!(eventually(Duration::from_secs(5), || ring_buffer.cursor() == 3));
    thread::sleep(Duration::from_millis(20));
    ring_buffer.sequencer().halt();

    let (published, err) = producer.join().unwrap();
    assert_eq!(published, 4);
    assert!(matches!(err, DisruptorError::Halted));
    assert!(matches!(ring_buffer.try_publish_event(|_, _| {}), Err(DisruptorError::Halted)));

    release.count_down();
    disruptor.halt();
}

#[test]
fn try_publish_reports_a_full_buffer() {
    let mut disruptor = DisruptorBuilder::new()
        .with_buffer_size(4)
        .with_producer_type(ProducerType::Single)
        .build(ValueEvent::default)
        .unwrap();
    disruptor
        .handle_events_with(stage(|_event, _seq, _eob| Ok(())))
        .unwrap();

    // Not started: nothing frees slots.
    let ring_buffer = disruptor.ring_buffer().clone();
    for i in 0..4 {
        assert_eq!(ring_buffer.try_publish_event(|event, _| event.value = i).unwrap(), i);
    }
    assert!(matches!(
        ring_buffer.try_publish_event(|_, _| {}),
        Err(DisruptorError::InsufficientCapacity)
    ));
    assert_eq!(ring_buffer.remaining_capacity(), 0);
}

#[test]
fn second_start_is_rejected() {
    let mut disruptor = DisruptorBuilder::new().with_buffer_size(8).build(ValueEvent::default).unwrap();
    disruptor
        .handle_events_with(stage(|_event, _seq, _eob| Ok(())))
        .unwrap();
    disruptor.start().unwrap();

    assert!(matches!(disruptor.start(), Err(DisruptorError::AlreadyStarted)));
    assert!(matches!(
        disruptor.handle_events_with(stage(|_e, _s, _b| Ok(()))),
        Err(DisruptorError::AlreadyStarted)
    ));
    disruptor.halt();
}

#[test]
fn buffer_size_must_be_a_power_of_two() {
    let result = DisruptorBuilder::new().with_buffer_size(12).build(ValueEvent::default);
    assert!(matches!(result, Err(DisruptorError::InvalidBufferSize(12))));
}

/// Counts the idle timeouts its processor reports.
struct TimeoutCounter {
    timeouts: Arc<AtomicUsize>,
}

impl EventHandler<ValueEvent> for TimeoutCounter {
    fn on_event(&mut self, _event: &mut ValueEvent, _sequence: i64, _end_of_batch: bool) -> Result<(), EventError> {
        Ok(())
    }

    fn on_timeout(&mut self, _sequence: i64) {
        self.timeouts.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn idle_processor_reports_timeouts_to_its_handler() {
    let mut disruptor = DisruptorBuilder::new()
        .with_buffer_size(16)
        .with_wait_strategy(TimeoutBlockingWaitStrategy::new(Duration::from_millis(5)))
        .build(ValueEvent::default)
        .unwrap();

    let timeouts = Arc::new(AtomicUsize::new(0));
    disruptor
        .handle_events_with(TimeoutCounter {
            timeouts: timeouts.clone(),
        })
        .unwrap();

    let ring_buffer = disruptor.start().unwrap();
    assert!(eventually(Duration::from_secs(5), || timeouts.load(Ordering::SeqCst) >= 2));

    ring_buffer.publish_event(|event, _sequence| event.value = 7).unwrap();
    let control = disruptor.processors()[0].clone();
    assert!(eventually(Duration::from_secs(5), || control.sequence().get() == 0));
    assert!(control.is_running());
    disruptor.shutdown_timeout(Duration::from_secs(5)).unwrap();
}
