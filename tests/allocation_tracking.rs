// Allocation tracking for the publish/replay hot path.
//
// dhat only allows one profiler at a time, so every test here is
// #[serial_test::serial] and this binary holds nothing else.
//
// cargo test --test allocation_tracking -- --nocapture

use dmxp_disruptor::ring_buffer_proxy;
use dmxp_disruptor::MPMC::{DisruptorBuilder, FnHandler, IgnoreExceptionHandler, WaitStrategyKind};
use dmxp_disruptor::Proxy::{OverflowStrategy, ProxyMethodInvocation, RingBufferProxyGenerator};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

ring_buffer_proxy! {
    pub trait Ticks => TicksProxy {
        fn on_tick(&mut self, price: f64, size: i64);
        fn on_halt(&mut self, venue: u32);
    }
}

#[derive(Default)]
struct Totals {
    notional: f64,
    halts: u64,
}

impl Ticks for Totals {
    fn on_tick(&mut self, price: f64, size: i64) {
        self.notional += price * size as f64;
    }

    fn on_halt(&mut self, _venue: u32) {
        self.halts += 1;
    }
}

fn wait_until_consumed(cursor: impl Fn() -> i64, consumed: impl Fn() -> i64) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while consumed() < cursor() {
        assert!(Instant::now() < deadline, "consumer fell behind");
        thread::yield_now();
    }
}

#[test]
#[serial_test::serial]
fn proxy_calls_do_not_allocate_from_the_first_call() {
    let _dhat = dhat::Profiler::new_heap();

    let mut disruptor = DisruptorBuilder::new()
        .with_buffer_size(64)
        .with_wait_strategy_kind(WaitStrategyKind::Yielding)
        .build(ProxyMethodInvocation::new)
        .unwrap();
    disruptor.handle_exceptions_with(IgnoreExceptionHandler);
    let mut proxy: TicksProxy = RingBufferProxyGenerator::default()
        .create_ring_buffer_proxy(&mut disruptor, OverflowStrategy::Block, vec![Totals::default()])
        .unwrap();
    let ring_buffer = disruptor.start().unwrap();
    let consumer = disruptor.processors()[0].clone();
    let deadline = Instant::now() + Duration::from_secs(10);
    while !consumer.is_running() {
        assert!(Instant::now() < deadline, "consumer never started");
        thread::yield_now();
    }

    let before = dhat::HeapStats::get();
    for i in 0..10_000 {
        if i % 100 == 0 {
            proxy.on_halt(i as u32);
        } else {
            proxy.on_tick(100.25, i);
        }
    }
    wait_until_consumed(|| ring_buffer.cursor(), || consumer.sequence().get());
    let after = dhat::HeapStats::get();

    println!("blocks before: {}, after: {}", before.total_blocks, after.total_blocks);
    assert_eq!(after.total_blocks, before.total_blocks);

    disruptor.halt();
}

#[test]
#[serial_test::serial]
fn raw_ring_buffer_publish_does_not_allocate() {
    let _dhat = dhat::Profiler::new_heap();

    let mut disruptor = DisruptorBuilder::new()
        .with_buffer_size(1024)
        .with_wait_strategy_kind(WaitStrategyKind::Yielding)
        .build(|| 0u64)
        .unwrap();
    let sum = Arc::new(std::sync::atomic::AtomicU64::new(0));
    let total = sum.clone();
    disruptor
        .handle_events_with(FnHandler(move |event: &mut u64, _sequence: i64, _end_of_batch: bool| {
            total.fetch_add(*event, std::sync::atomic::Ordering::Relaxed);
            Ok::<(), dmxp_disruptor::EventError>(())
        }))
        .unwrap();
    let ring_buffer = disruptor.start().unwrap();
    let consumer = disruptor.processors()[0].clone();

    let before = dhat::HeapStats::get();
    for i in 0..10_000u64 {
        ring_buffer.publish_event(|event, _sequence| *event = i).unwrap();
    }
    wait_until_consumed(|| ring_buffer.cursor(), || consumer.sequence().get());
    let after = dhat::HeapStats::get();

    assert_eq!(after.total_blocks, before.total_blocks);
    assert_eq!(sum.load(std::sync::atomic::Ordering::Relaxed), (0..10_000u64).sum::<u64>());

    disruptor.halt();
}
