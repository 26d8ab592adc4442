// cargo run --example pipeline -- <num_events> [busy-spin|yielding|sleeping|blocking]
use dmxp_disruptor::error::{EventError, RewindableError};
use dmxp_disruptor::MPMC::{
    DisruptorBuilder, EventHandler, NanosecondPauseBatchRewindStrategy, ProducerType, WaitStrategyKind,
};
use sha2::{Digest, Sha256};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

#[derive(Default)]
struct Message {
    id: u64,
    hash: [u8; 32],
    verified: bool,
}

/// Stage 1: hash the message id.
struct Hasher;

impl EventHandler<Message> for Hasher {
    fn on_event(&mut self, event: &mut Message, _sequence: i64, _end_of_batch: bool) -> Result<(), EventError> {
        event
            .hash
            .copy_from_slice(&Sha256::digest(format!("message_{}", event.id).as_bytes()));
        Ok(())
    }
}

/// Stage 2: re-check the hash; every 1000th batch fails once to show rewinds.
struct Verifier {
    verified: u64,
    rewinds: u64,
    fail_next: bool,
}

impl EventHandler<Message> for Verifier {
    fn on_event(&mut self, event: &mut Message, sequence: i64, end_of_batch: bool) -> Result<(), EventError> {
        let expected = Sha256::digest(format!("message_{}", event.id).as_bytes());
        event.verified = expected.as_slice() == event.hash;
        if event.verified {
            self.verified += 1;
        }

        if end_of_batch && self.fail_next {
            self.fail_next = false;
            self.rewinds += 1;
            return Err(RewindableError::new(format!("flaky store at {}", sequence)).into());
        }
        if sequence % 1000 == 999 {
            self.fail_next = true;
        }
        Ok(())
    }

    fn on_shutdown(&mut self) -> Result<(), EventError> {
        println!("Verifier: {} deliveries verified, {} rewinds", self.verified, self.rewinds);
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dmxp_disruptor::Core::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <num_events> [busy-spin|yielding|sleeping|blocking]", args[0]);
        std::process::exit(1);
    }
    let num_events: u64 = args[1].parse()?;
    let wait_strategy = match args.get(2).map(String::as_str) {
        Some("busy-spin") => WaitStrategyKind::BusySpin,
        Some("yielding") => WaitStrategyKind::Yielding,
        Some("sleeping") => WaitStrategyKind::Sleeping,
        _ => WaitStrategyKind::Blocking,
    };

    let running = Arc::new(AtomicBool::new(true));
    let running_for_handler = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_for_handler.store(false, Ordering::SeqCst);
    })?;

    let mut disruptor = DisruptorBuilder::new()
        .with_buffer_size(1024)
        .with_producer_type(ProducerType::Multi)
        .with_wait_strategy_kind(wait_strategy)
        .with_thread_name("pipeline")
        .build(Message::default)?;
    disruptor
        .handle_events_with(Hasher)?
        .then_with_rewind(
            Verifier {
                verified: 0,
                rewinds: 0,
                fail_next: false,
            },
            NanosecondPauseBatchRewindStrategy::new(1_000),
        )?;
    let ring_buffer = disruptor.start()?;

    let start = Instant::now();
    let producers: Vec<_> = (0..2u64)
        .map(|p| {
            let ring_buffer = Arc::clone(&ring_buffer);
            let running = Arc::clone(&running);
            thread::spawn(move || {
                let mut id = p;
                while id < num_events && running.load(Ordering::Relaxed) {
                    if ring_buffer.publish_event(|message, _| message.id = id).is_err() {
                        break;
                    }
                    id += 2;
                }
            })
        })
        .collect();
    for producer in producers {
        let _ = producer.join();
    }

    disruptor.shutdown();
    println!("Pipeline: {} events through 2 stages in {:.2?}", num_events, start.elapsed());
    println!("{:?}", disruptor);
    Ok(())
}
