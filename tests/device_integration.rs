//! End-to-end tests against a scripted mock receiver.

use denon_telnet::{DenonDevice, DeviceConfig, PowerState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Capture wire-level tracing in the per-test output
fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Mock receiver: answers state queries with canned lines, records every
/// line it sees and tracks how many connections are open at once.
struct MockReceiver {
    seen: Arc<Mutex<Vec<String>>>,
    open_connections: Arc<AtomicUsize>,
    max_concurrent: Arc<AtomicUsize>,
}

impl MockReceiver {
    fn spawn(listener: TcpListener) -> Self {
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let open_connections = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        let seen_srv = seen.clone();
        let open_srv = open_connections.clone();
        let max_srv = max_concurrent.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let open = open_srv.fetch_add(1, Ordering::SeqCst) + 1;
                max_srv.fetch_max(open, Ordering::SeqCst);

                let seen = seen_srv.clone();
                let open_count = open_srv.clone();
                tokio::spawn(async move {
                    let mut reader = BufReader::new(stream);
                    loop {
                        let mut raw = Vec::new();
                        match reader.read_until(b'\r', &mut raw).await {
                            Ok(0) | Err(_) => break,
                            Ok(_) => {}
                        }
                        let command =
                            String::from_utf8_lossy(&raw).trim_end_matches('\r').to_string();
                        seen.lock().unwrap().push(command.clone());
                        let answer: &[u8] = match command.as_str() {
                            "PW?" => b"PWON\r",
                            "MV?" => b"MVMAX 80X\rMV45\r",
                            "MU?" => b"MUOFF\r",
                            "SI?" => b"SITUNER\r",
                            "NSE" => b"NSE0My Station\rNSE1XMy Artist\r",
                            _ => b"",
                        };
                        if !answer.is_empty() {
                            let stream = reader.get_mut();
                            if stream.write_all(answer).await.is_err() {
                                break;
                            }
                            let _ = stream.flush().await;
                        }
                    }
                    open_count.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        Self {
            seen,
            open_connections,
            max_concurrent,
        }
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    /// Command lines only (queries filtered out)
    fn seen_commands(&self) -> Vec<String> {
        self.seen()
            .into_iter()
            .filter(|line| !line.ends_with('?') && line != "NSE")
            .collect()
    }
}

fn fast_config(host: &str, port: u16) -> DeviceConfig {
    let mut config = DeviceConfig::new(host);
    config.port = port;
    config.read_timeout = Duration::from_millis(50);
    config.error_debounce = Duration::from_millis(50);
    config
}

/// Drive ticks at a fast cadence until the receiver has seen the expected
/// command lines or the deadline passes.
async fn tick_until(device: &DenonDevice, receiver: &MockReceiver, expected: usize) {
    for _ in 0..300 {
        if receiver.seen_commands().len() >= expected {
            // One more breath so any over-delivery would show up
            tokio::time::sleep(Duration::from_millis(50)).await;
            return;
        }
        device.tick();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "receiver saw {:?}, expected {} command lines",
        receiver.seen(),
        expected
    );
}

#[tokio::test]
async fn refused_connection_retries_command_at_head() {
    init_tracing();

    // Nothing listens yet: the first delivery attempt must fail
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (host, port) = (addr.ip().to_string(), addr.port());
    drop(listener);

    let device = DenonDevice::new(fast_config(&host, port));

    // Enqueued while disconnected: select-source first, then the volume
    // command derived from 0.5 of the default max of 60
    device.select_source("TV");
    device.set_volume_level(0.5);

    // Let the failed session finish and the debounce window lapse
    tokio::time::sleep(Duration::from_millis(200)).await;

    // The receiver comes back on the same port
    let listener = TcpListener::bind(format!("{host}:{port}")).await.unwrap();
    let receiver = MockReceiver::spawn(listener);

    tick_until(&device, &receiver, 2).await;

    let commands = receiver.seen_commands();
    assert_eq!(
        commands,
        vec!["SITV".to_string(), "MV30".to_string()],
        "select-source retries once, at the head, before the volume command"
    );
    assert_eq!(
        commands.iter().filter(|c| *c == "SITV").count(),
        1,
        "exactly one (successful) delivery of the retried command"
    );
}

#[tokio::test]
async fn interleaved_triggers_never_overlap_sessions() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let receiver = MockReceiver::spawn(listener);

    let device = DenonDevice::new(fast_config(&addr.ip().to_string(), addr.port()));

    // Storm the device with concurrent triggers from several tasks
    let mut tasks = Vec::new();
    for round in 0..10u32 {
        let device = device.clone();
        tasks.push(tokio::spawn(async move {
            device.turn_on();
            device.request_refresh();
            device.mute_volume(round % 2 == 0);
            device.tick();
            device.volume_up();
            device.tick();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    // 3 command lines per round
    tick_until(&device, &receiver, 30).await;

    let commands = receiver.seen_commands();
    assert_eq!(commands.len(), 30, "every command delivered exactly once: {commands:?}");
    assert_eq!(commands.iter().filter(|c| *c == "PWON").count(), 10);
    assert_eq!(commands.iter().filter(|c| *c == "MVUP").count(), 10);
    assert_eq!(
        commands.iter().filter(|c| *c == "MUON" || *c == "MUOFF").count(),
        10
    );

    assert_eq!(
        receiver.max_concurrent.load(Ordering::SeqCst),
        1,
        "at most one connection, and so one session, at a time"
    );
}

#[tokio::test]
async fn poll_and_commands_share_one_connection() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let receiver = MockReceiver::spawn(listener);

    let device = DenonDevice::new(fast_config(&addr.ip().to_string(), addr.port()));

    device.request_refresh();
    device.turn_on();
    tick_until(&device, &receiver, 1).await;

    assert_eq!(device.power_state(), PowerState::On);
    assert_eq!(device.source().as_deref(), Some("Tuner"));
    assert_eq!(device.media_title(), "My Station\nMy Artist\n");
    assert!((device.volume_level() - 45.0 / 80.0).abs() < 1e-6);
    assert_eq!(receiver.max_concurrent.load(Ordering::SeqCst), 1);

    // The poll ran before the queued command within the same session
    let seen = receiver.seen();
    let poll_pos = seen.iter().position(|l| l == "PW?").unwrap();
    let cmd_pos = seen.iter().position(|l| l == "PWON").unwrap();
    assert!(poll_pos < cmd_pos);
}

#[tokio::test]
async fn idle_connection_closes_after_timeout() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let receiver = MockReceiver::spawn(listener);

    let mut config = fast_config(&addr.ip().to_string(), addr.port());
    config.idle_timeout = Duration::from_millis(200);
    let device = DenonDevice::new(config);

    device.request_refresh();

    // The refresh opens a connection
    let mut opened = false;
    for _ in 0..100 {
        if receiver.open_connections.load(Ordering::SeqCst) == 1 {
            opened = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(opened, "refresh never opened a connection");

    // Keep ticking with no pending work; once the refresh is done and the
    // idle window has lapsed, the idle check closes the connection
    let mut closed = false;
    for _ in 0..200 {
        device.tick();
        tokio::time::sleep(Duration::from_millis(20)).await;
        if receiver.open_connections.load(Ordering::SeqCst) == 0 {
            closed = true;
            break;
        }
    }
    assert!(closed, "idle connection was never closed");
}
