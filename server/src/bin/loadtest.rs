//! Load test for the ski relay server.
//!
//! Spawns multiple fake WebSocket clients that:
//! - Connect and send `init`
//! - Periodically send position updates (and the odd chat line)
//! - Race each other for the first few coins
//! - Receive and count relayed messages
//!
//! Usage: cargo run --bin loadtest -- [OPTIONS]
//!
//! Options:
//!   --clients N      Number of clients to spawn (default: 100)
//!   --duration S     Test duration in seconds (default: 30)
//!   --rate R         Updates per second per client (default: 10)
//!   --url URL        Server URL (default: ws://127.0.0.1:8080/ws)

use futures_util::{SinkExt, StreamExt};
use ski_relay::protocol::{ClientMsg, PlayerPosition, PlayerState, ServerMsg, Vec3};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Coins every client tries to grab; only one claim per coin should win.
const CONTESTED_COINS: usize = 5;

// === Metrics ===

struct Metrics {
    connected: AtomicU64,
    messages_received: AtomicU64,
    updates_received: AtomicU64,
    joins_received: AtomicU64,
    lefts_received: AtomicU64,
    coins_received: AtomicU64,
    updates_sent: AtomicU64,
    errors: AtomicU64,
    latency_sum_ms: AtomicU64,
    latency_count: AtomicU64,
}

impl Metrics {
    fn new() -> Self {
        Self {
            connected: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            updates_received: AtomicU64::new(0),
            joins_received: AtomicU64::new(0),
            lefts_received: AtomicU64::new(0),
            coins_received: AtomicU64::new(0),
            updates_sent: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            latency_sum_ms: AtomicU64::new(0),
            latency_count: AtomicU64::new(0),
        }
    }

    fn record(&self, msg: &ServerMsg) {
        let counter = match msg {
            ServerMsg::Update(_) => &self.updates_received,
            ServerMsg::PlayerJoined(_) => &self.joins_received,
            ServerMsg::PlayerLeft(_) => &self.lefts_received,
            ServerMsg::CoinCollected(_) => &self.coins_received,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

fn to_text(msg: &ClientMsg) -> Option<Message> {
    serde_json::to_string(msg)
        .ok()
        .map(|json| Message::Text(json.into()))
}

// === Client task ===

async fn run_client(
    client_id: u32,
    url: String,
    rate: f64,
    duration: Duration,
    metrics: Arc<Metrics>,
) {
    let connect_start = Instant::now();

    let (mut ws, _) = match connect_async(&url).await {
        Ok(conn) => conn,
        Err(e) => {
            if client_id < 5 {
                eprintln!("Client {} failed to connect: {}", client_id, e);
            }
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    metrics
        .latency_sum_ms
        .fetch_add(connect_start.elapsed().as_millis() as u64, Ordering::Relaxed);
    metrics.latency_count.fetch_add(1, Ordering::Relaxed);
    metrics.connected.fetch_add(1, Ordering::Relaxed);

    let init = ClientMsg::Init {
        username: format!("skier{}", client_id),
    };
    let sent = match to_text(&init) {
        Some(frame) => ws.send(frame).await.is_ok(),
        None => false,
    };
    if !sent {
        metrics.errors.fetch_add(1, Ordering::Relaxed);
        metrics.connected.fetch_sub(1, Ordering::Relaxed);
        return;
    }

    // Wait for the init reply before doing anything else
    let init_reply = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                    if let Ok(ServerMsg::Init(init)) = serde_json::from_str::<ServerMsg>(&text) {
                        return Some(init.game_state.coins);
                    }
                }
                Ok(Message::Close(_)) | Err(_) => return None,
                _ => {}
            }
        }
        None
    })
    .await;

    let coins = match init_reply {
        Ok(Some(coins)) => coins,
        Ok(None) | Err(_) => {
            if client_id < 3 {
                eprintln!("Client {} never got its init reply", client_id);
            }
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            metrics.connected.fetch_sub(1, Ordering::Relaxed);
            return;
        }
    };
    let mut contested: Vec<Vec3> = coins.into_iter().flatten().take(CONTESTED_COINS).collect();

    let update_interval = if rate > 0.0 {
        Duration::from_secs_f64(1.0 / rate)
    } else {
        Duration::from_secs(3600) // Effectively never
    };
    let mut update_timer = tokio::time::interval(update_interval);
    update_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let test_end = Instant::now() + duration;
    let mut tick: u64 = 0;

    loop {
        if Instant::now() >= test_end {
            break;
        }

        tokio::select! {
            _ = update_timer.tick() => {
                tick += 1;
                // Carve a slow circle around a per-client centre.
                let angle = tick as f64 * 0.05 + client_id as f64;
                let position = PlayerPosition::new(
                    client_id as f64 + angle.cos() * 10.0,
                    0.0,
                    -(tick as f64) * 0.5 + angle.sin() * 10.0,
                    angle,
                );
                let update = ClientMsg::Update {
                    position,
                    state: Some(PlayerState {
                        speed: Some(20.0),
                        ..Default::default()
                    }),
                };

                let mut outgoing = vec![update];
                if tick % 50 == 0 {
                    outgoing.push(ClientMsg::ChatMessage {
                        message: format!("skier{} checking in", client_id),
                    });
                }
                if let Some(coin) = contested.pop() {
                    outgoing.push(ClientMsg::CoinCollected { coin });
                }

                let mut failed = false;
                for msg in &outgoing {
                    let Some(frame) = to_text(msg) else { continue };
                    if ws.send(frame).await.is_err() {
                        failed = true;
                        break;
                    }
                }
                if failed {
                    metrics.errors.fetch_add(1, Ordering::Relaxed);
                    break;
                }
                metrics.updates_sent.fetch_add(1, Ordering::Relaxed);
            }

            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                        if let Ok(server_msg) = serde_json::from_str::<ServerMsg>(&text) {
                            metrics.record(&server_msg);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        if client_id < 3 {
                            eprintln!("Client {} closed by server", client_id);
                        }
                        break;
                    }
                    Some(Err(e)) => {
                        if client_id < 3 {
                            eprintln!("Client {} error: {}", client_id, e);
                        }
                        metrics.errors.fetch_add(1, Ordering::Relaxed);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = ws.close(None).await;
    metrics.connected.fetch_sub(1, Ordering::Relaxed);
}

// === Main ===

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut num_clients: u32 = 100;
    let mut duration_secs: u64 = 30;
    let mut rate: f64 = 10.0;
    let mut url = "ws://127.0.0.1:8080/ws".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--clients" => {
                i += 1;
                num_clients = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(100);
            }
            "--duration" => {
                i += 1;
                duration_secs = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(30);
            }
            "--rate" => {
                i += 1;
                rate = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(10.0);
            }
            "--url" => {
                i += 1;
                url = args.get(i).cloned().unwrap_or(url);
            }
            _ => {}
        }
        i += 1;
    }

    println!("=== Ski Relay Load Test ===");
    println!("Clients: {}", num_clients);
    println!("Duration: {}s", duration_secs);
    println!("Update rate: {}/s per client", rate);
    println!("URL: {}", url);
    println!();

    let metrics = Arc::new(Metrics::new());
    let duration = Duration::from_secs(duration_secs);

    let mut handles = Vec::with_capacity(num_clients as usize);

    println!("Spawning {} clients...", num_clients);
    let spawn_start = Instant::now();

    for client_id in 0..num_clients {
        let url = url.clone();
        let metrics = Arc::clone(&metrics);

        handles.push(tokio::spawn(async move {
            run_client(client_id, url, rate, duration, metrics).await;
        }));

        // Stagger spawns slightly to avoid thundering herd
        if client_id % 50 == 49 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    println!("All clients spawned in {:?}", spawn_start.elapsed());
    println!();

    // Print stats periodically
    let metrics_clone = Arc::clone(&metrics);
    let stats_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        let start = Instant::now();

        loop {
            interval.tick().await;
            let elapsed = start.elapsed().as_secs();
            if elapsed >= duration_secs + 5 {
                break;
            }

            println!(
                "[{:3}s] connected={}, msgs={}, updates_in={}, updates_out={}, joins={}, lefts={}, errors={}",
                elapsed,
                metrics_clone.connected.load(Ordering::Relaxed),
                metrics_clone.messages_received.load(Ordering::Relaxed),
                metrics_clone.updates_received.load(Ordering::Relaxed),
                metrics_clone.updates_sent.load(Ordering::Relaxed),
                metrics_clone.joins_received.load(Ordering::Relaxed),
                metrics_clone.lefts_received.load(Ordering::Relaxed),
                metrics_clone.errors.load(Ordering::Relaxed),
            );
        }
    });

    for handle in handles {
        let _ = handle.await;
    }

    stats_handle.abort();

    println!();
    println!("=== Final Results ===");
    let msgs = metrics.messages_received.load(Ordering::Relaxed);
    let updates_in = metrics.updates_received.load(Ordering::Relaxed);
    let updates_out = metrics.updates_sent.load(Ordering::Relaxed);
    let coins = metrics.coins_received.load(Ordering::Relaxed);
    let errors = metrics.errors.load(Ordering::Relaxed);
    let latency_sum = metrics.latency_sum_ms.load(Ordering::Relaxed);
    let latency_count = metrics.latency_count.load(Ordering::Relaxed);

    println!("Total messages received: {}", msgs);
    println!("Total updates sent: {}", updates_out);
    println!("Total updates received: {}", updates_in);
    println!("Total player_joined: {}", metrics.joins_received.load(Ordering::Relaxed));
    println!("Total player_left: {}", metrics.lefts_received.load(Ordering::Relaxed));
    println!("Total coin_collected: {}", coins);
    println!("Total errors: {}", errors);

    if latency_count > 0 {
        println!("Average connect latency: {}ms", latency_sum / latency_count);
    }

    // Each update fans out to every other client.
    let expected = updates_out as f64 * num_clients.saturating_sub(1) as f64;
    println!();
    println!("Messages/sec (total): {:.0}", msgs as f64 / duration_secs.max(1) as f64);
    if expected > 0.0 {
        println!("Update delivery rate: {:.1}%", updates_in as f64 / expected * 100.0);
    }
    // A contested coin is announced to everyone except the winner.
    let max_coin_notices = CONTESTED_COINS as u64 * num_clients.saturating_sub(1) as u64;
    println!("coin_collected notices: {} (at most {})", coins, max_coin_notices);
}
