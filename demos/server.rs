//! Broadcast calibrated orientation to WebSocket clients.
//!
//! Each client receives JSON messages at up to ~60 Hz. Sending the text
//! `reset` makes the band's current pose the new reference; `lock` and
//! `unlock` are forwarded to the band.
//!
//! Usage:
//!   cargo run --release --example server
//!   Connect to ws://localhost:8765

use myobot::{
    channel_backend, Arm, DeviceEvent, DeviceInfo, EventFeed, Quaternion, Session, SessionConfig,
    SessionHandle, WarmupState, XDirection,
};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tungstenite::Message;

const PORT: u16 = 8765;

type WsClient = Arc<Mutex<tungstenite::WebSocket<TcpStream>>>;

fn main() {
    env_logger::init();

    let config = SessionConfig::from_env();
    let (feed, backend) = channel_backend(
        config.event_queue_capacity,
        Box::new(|command| {
            eprintln!("[BAND] {:?}", command);
            Ok(())
        }),
    );

    // Stands in for the vendor callback thread.
    std::thread::Builder::new()
        .name("band-callbacks".into())
        .spawn(move || band_loop(feed))
        .unwrap_or_else(|e| {
            eprintln!("Failed to spawn band thread: {}", e);
            std::process::exit(1);
        });

    let handle = match Session::initialize(backend, config).and_then(|s| s.spawn()) {
        Ok(h) => Arc::new(h),
        Err(e) => {
            eprintln!("Failed to start session: {}", e);
            std::process::exit(1);
        }
    };

    let clients: Arc<Mutex<Vec<WsClient>>> = Arc::new(Mutex::new(Vec::new()));

    let broadcast_clients = clients.clone();
    let broadcast_handle = handle.clone();
    std::thread::Builder::new()
        .name("myobot-broadcast".into())
        .spawn(move || broadcast_loop(broadcast_handle, broadcast_clients))
        .unwrap_or_else(|e| {
            eprintln!("Failed to spawn broadcast thread: {}", e);
            std::process::exit(1);
        });

    let listener = TcpListener::bind(format!("0.0.0.0:{}", PORT)).unwrap_or_else(|e| {
        eprintln!("Failed to bind port {}: {}", PORT, e);
        std::process::exit(1);
    });
    eprintln!("[WS] Listening on ws://localhost:{}", PORT);

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                eprintln!("[TCP] accept error: {}", e);
                continue;
            }
        };
        let clients = clients.clone();
        let handle = handle.clone();
        std::thread::spawn(move || handle_client(stream, clients, handle));
    }
}

/// Register the client, then serve its control messages until it leaves.
fn handle_client(stream: TcpStream, clients: Arc<Mutex<Vec<WsClient>>>, handle: Arc<SessionHandle>) {
    stream.set_write_timeout(Some(Duration::from_secs(2))).ok();
    // Short read timeout so the broadcast thread can take the socket lock.
    stream.set_read_timeout(Some(Duration::from_millis(50))).ok();
    stream.set_nodelay(true).ok();

    let ws = match tungstenite::accept(stream) {
        Ok(ws) => Arc::new(Mutex::new(ws)),
        Err(e) => {
            eprintln!("[WS] handshake error: {}", e);
            return;
        }
    };

    if let Ok(mut list) = clients.lock() {
        list.push(ws.clone());
        eprintln!("[WS] Client connected ({} total)", list.len());
    }

    loop {
        let message = match ws.lock() {
            Ok(mut socket) => socket.read(),
            Err(_) => break,
        };
        match message {
            Ok(Message::Text(text)) => {
                let result = match text.trim() {
                    "reset" => {
                        handle.update_reference();
                        Ok(())
                    }
                    "lock" => handle.lock(),
                    "unlock" => handle.unlock(),
                    other => {
                        eprintln!("[WS] unknown command {:?}", other);
                        Ok(())
                    }
                };
                if let Err(e) = result {
                    eprintln!("[WS] {} failed: {}", text.trim(), e);
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(tungstenite::Error::Io(e))
                if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) =>
            {
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(_) => break,
        }
    }

    if let Ok(mut list) = clients.lock() {
        list.retain(|c| !Arc::ptr_eq(c, &ws));
        eprintln!("[WS] Client disconnected ({} total)", list.len());
    }
}

/// Push the current angles to every client, dropping those that fail.
fn broadcast_loop(handle: Arc<SessionHandle>, clients: Arc<Mutex<Vec<WsClient>>>) {
    let interval = Duration::from_millis(16);
    let mut last_report = Instant::now();
    let mut sent: u64 = 0;

    while handle.is_active() {
        std::thread::sleep(interval);

        let state = handle.state();
        let a = state.orientation().to_degrees();
        let json = format!(
            "{{\"roll\":{:.1},\"pitch\":{:.1},\"yaw\":{:.1},\"arm\":\"{:?}\",\"pose\":\"{:?}\",\"locked\":{},\"t\":{}}}",
            a.roll,
            a.pitch,
            a.yaw,
            state.arm(),
            state.pose(),
            state.is_locked(),
            state.last_timestamp_us().unwrap_or(0),
        );

        let msg = Message::Text(json);
        if let Ok(mut list) = clients.lock() {
            list.retain(|client| match client.lock() {
                Ok(mut ws) => ws.send(msg.clone()).is_ok(),
                Err(_) => false,
            });
        }
        sent += 1;

        if last_report.elapsed() >= Duration::from_secs(5) {
            let count = clients.lock().map(|l| l.len()).unwrap_or(0);
            eprintln!("[WS] {} broadcasts, {} client(s)", sent, count);
            sent = 0;
            last_report = Instant::now();
        }
    }

    eprintln!("[WS] Session ended, broadcast stopped");
}

/// Pair, sync, then report a slow turn at 50 Hz.
fn band_loop(feed: EventFeed) {
    let start = Instant::now();
    let now_us = || start.elapsed().as_micros() as u64;

    let setup = [
        DeviceEvent::Paired {
            timestamp_us: now_us(),
            info: DeviceInfo {
                name: "Simulated Band".into(),
                firmware_version: "1.5.1970".into(),
            },
        },
        DeviceEvent::ArmSync {
            timestamp_us: now_us(),
            arm: Arm::Right,
            x_direction: XDirection::TowardWrist,
            rotation: 0.0,
            warmup_state: WarmupState::Warm,
        },
    ];
    for event in setup {
        if feed.push(event).is_err() {
            return;
        }
    }

    loop {
        std::thread::sleep(Duration::from_millis(20));
        let t = now_us();
        let yaw = 0.3 * t as f64 / 1e6;
        let q = Quaternion::from_axis_angle([0.0, 0.0, 1.0], yaw);
        match feed.push_orientation(t, q) {
            Ok(()) | Err(myobot::MyoError::QueueFull) => {}
            Err(_) => return,
        }
    }
}
