// tests/transport.rs
//
// End-to-end transport behaviour over an in-memory modem link.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use motegate::io::serial::link::memory;
use motegate::io::serial::TransportState;
use motegate::{Frame, SerialTransport, TransportError, TransportEvent};

const WAIT: Duration = Duration::from_secs(2);

fn transport(verbose: bool) -> (SerialTransport, memory::MemoryLinkHandle) {
    let (link, handle) = memory::pair();
    (SerialTransport::from_link("modem", Box::new(link), verbose), handle)
}

/// `Ended` is sent just before the listener thread returns
fn wait_for_idle(transport: &SerialTransport) {
    let deadline = std::time::Instant::now() + WAIT;
    while transport.state() != TransportState::Idle {
        assert!(std::time::Instant::now() < deadline, "listener did not exit");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_stop_while_listener_blocked() {
    let (transport, modem) = transport(false);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    transport.set_receive_callback(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    transport.start_listening().unwrap();

    // Listener is idle in a read with nothing on the wire
    thread::sleep(Duration::from_millis(120));
    transport.stop();
    assert_eq!(transport.state(), TransportState::Stopped);

    // Traffic arriving after stop never reaches the callback
    modem.inject("late\r");
    thread::sleep(Duration::from_millis(120));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_send_then_stop_flushes() {
    let (transport, modem) = transport(true);
    let transport = Arc::new(transport);

    let sender = {
        let transport = transport.clone();
        thread::spawn(move || transport.send("(AT+RESET)\r"))
    };
    sender.join().unwrap().unwrap();
    transport.stop();

    assert_eq!(modem.written(), b"(AT+RESET)\r".to_vec());
    assert_eq!(
        transport.send("again"),
        Err(TransportError::LinkNotOpen {
            port: "modem".to_string()
        })
    );
}

#[test]
fn test_stop_waits_for_send_in_flight() {
    let (transport, modem) = transport(false);
    let transport = Arc::new(transport);
    modem.set_write_delay(Duration::from_millis(200));

    let sender = {
        let transport = transport.clone();
        thread::spawn(move || transport.send("(0102)\r"))
    };

    // Stop lands while the write is still sleeping inside the link
    let deadline = std::time::Instant::now() + WAIT;
    while modem.writes_started() == 0 {
        assert!(std::time::Instant::now() < deadline, "send never started");
        thread::sleep(Duration::from_millis(1));
    }
    transport.stop();

    assert_eq!(modem.written(), b"(0102)\r".to_vec());
    assert_eq!(sender.join().unwrap(), Ok(()));
    assert_eq!(transport.state(), TransportState::Stopped);
}

#[test]
fn test_verbose_traffic_is_logged() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = motegate::init_file_logging(dir.path()).unwrap();

    let (transport, modem) = transport(true);
    let mut events = transport.subscribe();
    transport.start_listening().unwrap();

    transport.send("(PING)\r").unwrap();
    modem.inject("(PONG)\r");
    assert_eq!(
        events.blocking_recv(),
        Some(TransportEvent::Frame(Frame::new("(PONG)")))
    );
    transport.stop();
    motegate::stop_file_logging();

    let log = std::fs::read_to_string(log_path).unwrap();
    assert!(log.contains("[serial:modem] Sent: (PING)"), "{}", log);
    assert!(log.contains("[serial:modem] Rved: (PONG)"), "{}", log);
    assert!(log.contains("[serial:modem] Listener started"), "{}", log);
}

#[test]
fn test_concurrent_sends_are_not_interleaved() {
    let (transport, modem) = transport(false);
    let transport = Arc::new(transport);

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let transport = transport.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    transport.send(format!("({})\r", i)).unwrap();
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    let written = String::from_utf8(modem.written()).unwrap();
    let packets: Vec<&str> = written.split_terminator('\r').collect();
    assert_eq!(packets.len(), 100);
    assert!(packets.iter().all(|p| p.len() == 3 && p.starts_with('(') && p.ends_with(')')));
}

#[test]
fn test_callback_and_frames_split_across_reads() {
    let (transport, modem) = transport(true);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (tx, rx) = mpsc::channel();
    {
        let seen = seen.clone();
        transport.set_receive_callback(move |frame: &Frame| {
            seen.lock().unwrap().push(frame.to_string());
            let _ = tx.send(());
        });
    }
    transport.start_listening().unwrap();

    modem.inject("00");
    modem.inject("1A\n");
    modem.inject("\r(77");
    modem.inject("(88\r");
    for _ in 0..3 {
        rx.recv_timeout(WAIT).unwrap();
    }
    transport.stop();

    assert_eq!(*seen.lock().unwrap(), vec!["001A", "(77", "88"]);
}

#[tokio::test]
async fn test_async_subscription() {
    let (transport, modem) = transport(false);
    let mut events = transport.subscribe();
    transport.start_listening().unwrap();

    modem.inject("(0A01FF)\r");
    let event = tokio::time::timeout(WAIT, events.recv()).await.unwrap();
    assert_eq!(event, Some(TransportEvent::Frame(Frame::new("(0A01FF)"))));

    modem.hang_up();
    let event = tokio::time::timeout(WAIT, events.recv()).await.unwrap();
    assert!(matches!(event, Some(TransportEvent::Error(TransportError::Io { .. }))));
    let event = tokio::time::timeout(WAIT, events.recv()).await.unwrap();
    assert_eq!(event, Some(TransportEvent::Ended));

    // Listener has exited on its own; the transport is idle until stopped
    transport.stop();
    assert_eq!(events.recv().await, None);
}

#[test]
fn test_restart_after_link_failure() {
    let (transport, modem) = transport(false);
    let mut events = transport.subscribe();
    transport.start_listening().unwrap();

    modem.fail(std::io::ErrorKind::Other);
    assert!(matches!(events.blocking_recv(), Some(TransportEvent::Error(_))));
    assert_eq!(events.blocking_recv(), Some(TransportEvent::Ended));
    wait_for_idle(&transport);

    transport.start_listening().unwrap();
    modem.inject("ok\r");
    assert_eq!(
        events.blocking_recv(),
        Some(TransportEvent::Frame(Frame::new("ok")))
    );
    transport.stop();
}
