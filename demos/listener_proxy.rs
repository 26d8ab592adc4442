// cargo run --example listener_proxy --features tracing -- <num_calls> [--drop]
use dmxp_disruptor::ring_buffer_proxy;
use dmxp_disruptor::MPMC::{DisruptorBuilder, IgnoreExceptionHandler};
use dmxp_disruptor::Proxy::{
    BatchSizeListener, DropListener, OverflowStrategy, ProxyMethodInvocation, RingBufferProxyGenerator,
};
use sha2::{Digest, Sha256};
use std::env;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

ring_buffer_proxy! {
    #[disruptor_proxy]
    pub trait Journal => JournalProxy {
        fn on_record(&mut self, id: u64, payload: String);
        fn on_checkpoint(&mut self, id: u64);
    }
}

/// Folds every record into a running SHA-256 digest.
struct DigestJournal {
    name: &'static str,
    hasher: Sha256,
    records: u64,
    largest_batch: usize,
}

impl DigestJournal {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            hasher: Sha256::new(),
            records: 0,
            largest_batch: 0,
        }
    }
}

impl Journal for DigestJournal {
    fn on_record(&mut self, id: u64, payload: String) {
        self.hasher.update(id.to_le_bytes());
        self.hasher.update(payload.as_bytes());
        self.records += 1;
    }

    fn on_checkpoint(&mut self, id: u64) {
        let digest = self.hasher.clone().finalize();
        println!(
            "{}: checkpoint {} after {} records, digest {:x}, largest batch {}",
            self.name, id, self.records, digest, self.largest_batch
        );
    }
}

impl BatchSizeListener for DigestJournal {
    fn on_end_of_batch(&mut self, batch_size: usize) {
        self.largest_batch = self.largest_batch.max(batch_size);
    }
}

#[derive(Default)]
struct CountingDropListener(AtomicUsize);

impl DropListener for CountingDropListener {
    fn on_drop(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dmxp_disruptor::Core::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <num_calls> [--drop]", args[0]);
        std::process::exit(1);
    }
    let num_calls: u64 = args[1].parse()?;
    let overflow = if args.get(2).is_some_and(|s| s == "--drop") {
        OverflowStrategy::Drop
    } else {
        OverflowStrategy::Block
    };

    let running = Arc::new(AtomicBool::new(true));
    let running_for_handler = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_for_handler.store(false, Ordering::SeqCst);
    })?;

    let mut disruptor = DisruptorBuilder::new()
        .with_buffer_size(4096)
        .with_thread_name("journal")
        .build(ProxyMethodInvocation::new)?;
    disruptor.handle_exceptions_with(IgnoreExceptionHandler);

    let drops = Arc::new(CountingDropListener::default());
    let mut journal: JournalProxy = RingBufferProxyGenerator::default()
        .with_drop_listener(drops.clone())
        .create_batch_aware_ring_buffer_proxy(
            &mut disruptor,
            overflow,
            vec![DigestJournal::new("primary"), DigestJournal::new("replica")],
        )?;
    disruptor.start()?;
    println!("Journal: {:?}", journal);

    let start = Instant::now();
    let mut sent = 0;
    for id in 0..num_calls {
        if !running.load(Ordering::SeqCst) {
            println!("Interrupted after {} calls", sent);
            break;
        }
        journal.on_record(id, format!("record_{}", id));
        sent += 1;
    }
    journal.on_checkpoint(sent);
    let elapsed = start.elapsed();

    disruptor.shutdown();
    println!(
        "Sent {} calls in {:.2?} ({:.0} calls/s), {} dropped",
        sent,
        elapsed,
        sent as f64 / elapsed.as_secs_f64(),
        drops.0.load(Ordering::Relaxed)
    );
    Ok(())
}
