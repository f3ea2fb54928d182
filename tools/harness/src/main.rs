// =============================================================================
// signalair-harness — in-process mesh simulation driver
// =============================================================================
// Spins up N simulated peers over InMemoryTransport, wires them into a
// full mesh, drives synthetic broadcast traffic at a configurable rate,
// and prints the resulting SecurityEvent stream plus periodic stats
// snapshots. No real radio I/O: this is a harness for exercising
// signalair-core's dedup/flood-guard/trust/relay pipeline end to end.
// =============================================================================

use bytes::Bytes;
use clap::Parser;
use rand::Rng;
use signalair_core::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "signalair-harness")]
#[command(about = "In-process mesh simulation harness for signalair-core")]
struct Args {
    /// Number of simulated peers, wired into a full mesh
    #[arg(long, default_value_t = 6)]
    peers: usize,

    /// Broadcasts per second, originated by peer 0
    #[arg(long, default_value_t = 20)]
    rate: u32,

    /// Duration in seconds
    #[arg(long, default_value_t = 30)]
    duration: u64,

    /// Payload size in bytes for generated traffic
    #[arg(long, default_value_t = 64)]
    payload_size: usize,

    /// Fraction of traffic repeated verbatim, to exercise dedup/suspicion
    #[arg(long, default_value_t = 0.1)]
    replay_fraction: f64,

    /// Use the disaster-mode configuration profile instead of defaults
    #[arg(long, default_value_t = false)]
    disaster_profile: bool,
}

struct Counters {
    broadcast_ok: AtomicU64,
    broadcast_err: AtomicU64,
    delivered: AtomicU64,
}

impl Counters {
    fn new() -> Self {
        Self {
            broadcast_ok: AtomicU64::new(0),
            broadcast_err: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
        }
    }
}

/// Pumps frames peers have queued for send into the matching peer's
/// transport, since `InMemoryTransport` records sends rather than
/// delivering them — the harness plays the role real radio I/O would.
async fn pump_network(transports: Vec<(PeerId, Arc<InMemoryTransport>)>) {
    let mut interval = tokio::time::interval(Duration::from_millis(5));
    loop {
        interval.tick().await;
        for (from_id, transport) in &transports {
            for (to_id, frame) in transport.drain_sent() {
                if let Some((_, target)) = transports.iter().find(|(id, _)| *id == to_id) {
                    target.deliver(from_id.clone(), frame).await;
                }
            }
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "signalair_harness=info,signalair_core=info".into()))
        .init();

    let args = Args::parse();

    println!("=== SignalAir Mesh Harness ===");
    println!("Peers:           {}", args.peers);
    println!("Rate:            {} broadcast/s", args.rate);
    println!("Duration:        {}s", args.duration);
    println!("Payload size:    {} bytes", args.payload_size);
    println!("Replay fraction: {:.0}%", args.replay_fraction * 100.0);
    println!("Profile:         {}", if args.disaster_profile { "disaster" } else { "default" });
    println!();

    let config = if args.disaster_profile { Config::disaster_profile() } else { Config::default() };
    let crypto = Arc::new(DefaultCryptoProvider::new());

    let peer_ids: Vec<PeerId> = (0..args.peers).map(|i| PeerId::new(format!("peer-{i}"))).collect();
    let transports: Vec<Arc<InMemoryTransport>> = (0..args.peers).map(|_| InMemoryTransport::new()).collect();
    let handles: Vec<MeshHandle> = peer_ids
        .iter()
        .zip(transports.iter())
        .map(|(id, transport)| {
            MeshHandle::start(id.clone(), config.clone(), transport.clone(), crypto.clone())
                .expect("config already validated upstream")
        })
        .collect();

    // Full mesh: every peer connects to every other.
    for (i, transport) in transports.iter().enumerate() {
        for (j, peer_id) in peer_ids.iter().enumerate() {
            if i != j {
                transport.connect(peer_id.clone()).await;
            }
        }
    }

    let wired: Vec<(PeerId, Arc<InMemoryTransport>)> = peer_ids.iter().cloned().zip(transports.iter().cloned()).collect();
    tokio::spawn(pump_network(wired));

    let counters = Arc::new(Counters::new());

    // Log security events from peer 0 as they arrive.
    {
        let mut security_events = handles[0].security_events();
        tokio::spawn(async move {
            while let Ok(event) = security_events.recv().await {
                tracing::info!(kind = ?event.kind, severity = ?event.severity, peer = ?event.peer, detail = %event.detail, "security event");
            }
        });
    }

    // Count delivered messages across all peers.
    for handle in &handles {
        let delivered = counters.delivered.clone();
        handle.on_receive(move |_message| {
            delivered.fetch_add(1, Ordering::Relaxed);
        });
    }

    let interval = Duration::from_micros(1_000_000 / args.rate.max(1) as u64);
    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let start = Instant::now();
    let originator = &handles[0];

    println!("Sending...\n");

    let mut rng = rand::thread_rng();
    let mut tick = 0u64;
    let mut last_payload: Option<Bytes> = None;

    while Instant::now() < deadline {
        let payload = if last_payload.is_some() && rng.gen_bool(args.replay_fraction) {
            last_payload.clone().unwrap()
        } else {
            let bytes: Vec<u8> = (0..args.payload_size).map(|_| rng.gen()).collect();
            let fresh = Bytes::from(bytes);
            last_payload = Some(fresh.clone());
            fresh
        };

        match originator.broadcast(MessageType::Chat, payload).await {
            Ok(_) => {
                counters.broadcast_ok.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                counters.broadcast_err.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %err, "broadcast failed");
            }
        }

        tick += 1;
        if tick % 100 == 0 {
            let elapsed = start.elapsed().as_secs_f64();
            if let Ok(stats) = originator.stats().await {
                println!(
                    "  [{:.1}s] sent={} delivered={} dedup_count={} banned={} tracked={}",
                    elapsed,
                    counters.broadcast_ok.load(Ordering::Relaxed),
                    counters.delivered.load(Ordering::Relaxed),
                    stats.dedup.count,
                    stats.rate.currently_banned,
                    stats.tracked_messages,
                );
            }
        }

        let target = Duration::from_micros(tick * interval.as_micros() as u64);
        let actual = start.elapsed();
        if actual < target {
            tokio::time::sleep(target - actual).await;
        }
    }

    let elapsed = start.elapsed();
    let stats = originator.stats().await.unwrap_or(RouterStats {
        dedup: signalair_core::dedup::DedupStats { count: 0, utilization_rate: 0.0 },
        rate: Default::default(),
        trust: signalair_core::trust::TrustStatistics { total: 0, trusted: 0, suspicious: 0, blacklisted: 0, average: 0.0 },
        connected_peers: 0,
        tracked_messages: 0,
    });

    println!("\n=== Results ===");
    println!("Duration:        {:.2}s", elapsed.as_secs_f64());
    println!("Broadcast sent:  {}", counters.broadcast_ok.load(Ordering::Relaxed));
    println!("Broadcast err:   {}", counters.broadcast_err.load(Ordering::Relaxed));
    println!("Total delivered: {}", counters.delivered.load(Ordering::Relaxed));
    println!("Dedup entries:   {}", stats.dedup.count);
    println!("Currently banned:{}", stats.rate.currently_banned);
    println!("Trust avg score: {:.1}", stats.trust.average);
    println!("Tracked messages:{}", stats.tracked_messages);

    for handle in &handles {
        handle.stop().await;
    }
}
