// src/io/serial/transport.rs
//
// Serial transport for the radio modem.
// Owns the link, runs one listener thread per port that feeds bytes through the
// FrameAssembler, and fans completed frames out to subscribers and the receive
// callback in the order they were read.

use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::mpsc;

use super::framer::{Frame, FrameAssembler};
use super::link::{self, Link};
use super::utils::LineSettings;
use crate::io::error::TransportError;

// ============================================================================
// Constants
// ============================================================================

/// Default modem bit rate
pub const DEFAULT_BAUD_RATE: u32 = 38_400;

/// How long DTR is held high to hardware-reset the modem
pub const RESET_PULSE: Duration = Duration::from_millis(100);

// ============================================================================
// Types
// ============================================================================

/// What a subscriber sees from the listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A completed inbound frame
    Frame(Frame),
    /// The link failed while nobody had asked the transport to stop
    Error(TransportError),
    /// The listener has exited; no further events follow
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Link open, no listener running
    Idle,
    Listening,
    /// `stop()` has closed the link
    Stopped,
}

type FrameCallback = Box<dyn FnMut(&Frame) + Send>;
type ErrorCallback = Box<dyn FnMut(&TransportError) + Send>;

/// Receiving end handed out by `SerialTransport::subscribe`.
/// The channel closes once the transport is stopped or dropped.
pub struct FrameSubscription {
    rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl FrameSubscription {
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }

    /// Blocking variant for plain threads. Panics inside an async runtime.
    pub fn blocking_recv(&mut self) -> Option<TransportEvent> {
        self.rx.blocking_recv()
    }

    pub fn try_recv(&mut self) -> Option<TransportEvent> {
        self.rx.try_recv().ok()
    }
}

/// State shared between the transport handle and its listener thread
struct Shared {
    port: String,
    verbose: bool,
    stop_flag: AtomicBool,
    /// Write half. `None` once stopped.
    writer: Mutex<Option<Box<dyn Link>>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<TransportEvent>>>,
    on_frame: Mutex<Option<FrameCallback>>,
    on_error: Mutex<Option<ErrorCallback>>,
}

fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl Shared {
    fn stopping(&self) -> bool {
        self.stop_flag.load(Ordering::SeqCst)
    }

    fn broadcast(&self, event: TransportEvent) {
        lock(&self.subscribers).retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn deliver_frame(&self, frame: Frame) {
        if self.verbose {
            tlog!("[serial:{}] Rved: {}", self.port, frame);
        }
        if let Some(cb) = lock(&self.on_frame).as_mut() {
            cb(&frame);
        }
        self.broadcast(TransportEvent::Frame(frame));
    }

    fn report_error(&self, err: TransportError) {
        tlog!("[serial:{}] Listener error: {}", self.port, err);
        if let Some(cb) = lock(&self.on_error).as_mut() {
            cb(&err);
        }
        self.broadcast(TransportEvent::Error(err));
    }
}

// ============================================================================
// Serial Transport
// ============================================================================

/// Serial link to the radio modem.
///
/// All methods take `&self`, so a transport can sit behind an `Arc` and be
/// driven from any thread while the listener runs.
pub struct SerialTransport {
    shared: Arc<Shared>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SerialTransport {
    /// Open `port` at `baud_rate` with 8-N-1 framing.
    pub fn open(port: &str, baud_rate: u32, verbose: bool) -> Result<Self, TransportError> {
        Self::open_with(port, baud_rate, &LineSettings::default(), verbose)
    }

    /// Open `port` with explicit line settings.
    pub fn open_with(
        port: &str,
        baud_rate: u32,
        line: &LineSettings,
        verbose: bool,
    ) -> Result<Self, TransportError> {
        let link = link::open_port(port, baud_rate, line).map_err(|e| {
            tlog!("[serial:{}] Failed to open: {}", port, e);
            TransportError::unavailable(port, e)
        })?;

        tlog!(
            "[serial:{}] Opened at {} baud ({})",
            port,
            baud_rate,
            line.label()
        );

        Ok(Self::from_link(port, link, verbose))
    }

    /// Wrap an already open link
    pub fn from_link(port: impl Into<String>, link: Box<dyn Link>, verbose: bool) -> Self {
        SerialTransport {
            shared: Arc::new(Shared {
                port: port.into(),
                verbose,
                stop_flag: AtomicBool::new(false),
                writer: Mutex::new(Some(link)),
                subscribers: Mutex::new(Vec::new()),
                on_frame: Mutex::new(None),
                on_error: Mutex::new(None),
            }),
            listener: Mutex::new(None),
        }
    }

    pub fn port(&self) -> &str {
        &self.shared.port
    }

    pub fn state(&self) -> TransportState {
        if self.shared.stopping() {
            return TransportState::Stopped;
        }
        match lock(&self.listener).as_ref() {
            Some(handle) if !handle.is_finished() => TransportState::Listening,
            _ => TransportState::Idle,
        }
    }

    /// Start the listener thread.
    ///
    /// Bytes are read one at a time; every completed frame goes to the receive
    /// callback (on the listener thread) and then to each subscriber.
    pub fn start_listening(&self) -> Result<(), TransportError> {
        let port = &self.shared.port;
        let mut listener = lock(&self.listener);

        if matches!(listener.as_ref(), Some(handle) if !handle.is_finished()) {
            return Err(TransportError::AlreadyListening { port: port.clone() });
        }

        let reader = {
            let writer = lock(&self.shared.writer);
            match writer.as_ref() {
                Some(link) if !self.shared.stopping() => link
                    .try_clone()
                    .map_err(|e| TransportError::io(port.as_str(), format!("Clone for reading: {}", e)))?,
                _ => {
                    tlog!("[serial:{}] Unable to listen since the port is not open", port);
                    return Err(TransportError::not_open(port.as_str()));
                }
            }
        };

        let shared = self.shared.clone();
        let handle = thread::Builder::new()
            .name(format!("serial-{}", port))
            .spawn(move || run_listener(shared, reader))
            .map_err(|e| TransportError::io(port.as_str(), format!("Spawn listener: {}", e)))?;

        *listener = Some(handle);
        tlog!("[serial:{}] Listener started", port);
        Ok(())
    }

    /// Write `data` to the link from the calling thread.
    pub fn send(&self, data: impl AsRef<[u8]>) -> Result<(), TransportError> {
        let data = data.as_ref();
        let mut writer = lock(&self.shared.writer);
        let link = writer
            .as_mut()
            .ok_or_else(|| TransportError::not_open(self.shared.port.as_str()))?;

        link.write_all(data)
            .map_err(|e| TransportError::io(self.shared.port.as_str(), format!("Write error: {}", e)))?;

        if self.shared.verbose {
            tlog!("[serial:{}] Sent: {}", self.shared.port, String::from_utf8_lossy(data));
        }
        Ok(())
    }

    /// Register the receive callback, replacing any previous one.
    ///
    /// The callback runs on the listener thread, before subscribers see the
    /// frame. It must return quickly and must not re-register callbacks.
    pub fn set_receive_callback<F>(&self, callback: F)
    where
        F: FnMut(&Frame) + Send + 'static,
    {
        *lock(&self.shared.on_frame) = Some(Box::new(callback));
    }

    pub fn clear_receive_callback(&self) {
        *lock(&self.shared.on_frame) = None;
    }

    /// Register the callback for listener failures, replacing any previous one.
    pub fn set_error_callback<F>(&self, callback: F)
    where
        F: FnMut(&TransportError) + Send + 'static,
    {
        *lock(&self.shared.on_error) = Some(Box::new(callback));
    }

    /// New event stream. Any number of subscriptions may be live at once.
    pub fn subscribe(&self) -> FrameSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        if !self.shared.stopping() {
            lock(&self.shared.subscribers).push(tx);
        }
        FrameSubscription { rx }
    }

    /// Hardware-reset the modem by pulsing DTR high for `RESET_PULSE`.
    /// Blocks the caller for the pulse. DTR is driven low again even if the
    /// wait is cut short by a panic.
    pub fn reset(&self) -> Result<(), TransportError> {
        let port = self.shared.port.as_str();
        let mut writer = lock(&self.shared.writer);
        let link = writer.as_mut().ok_or_else(|| TransportError::not_open(port))?;

        let pulse = DtrPulse::raise(&mut **link)
            .map_err(|e| TransportError::io(port, format!("Set DTR: {}", e)))?;
        thread::sleep(RESET_PULSE);
        pulse
            .release()
            .map_err(|e| TransportError::io(port, format!("Clear DTR: {}", e)))?;

        tlog!("[serial:{}] Modem reset", port);
        Ok(())
    }

    /// Close the link and stop the listener.
    ///
    /// Waits for any in-flight `send` to finish before closing, then waits for
    /// the listener to exit (unless called from the listener itself). Once this
    /// returns the receive callback is not invoked again. Idempotent.
    pub fn stop(&self) {
        if self.shared.stop_flag.swap(true, Ordering::SeqCst) {
            return;
        }

        let closed = lock(&self.shared.writer).take();
        drop(closed);

        if let Some(handle) = lock(&self.listener).take() {
            if handle.thread().id() != thread::current().id() {
                if handle.join().is_err() {
                    tlog!("[serial:{}] Listener panicked", self.shared.port);
                }
            }
        }

        // Closes every subscription channel
        lock(&self.shared.subscribers).clear();
        tlog!("[serial:{}] Port closed", self.shared.port);
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Listener
// ============================================================================

fn run_listener(shared: Arc<Shared>, mut reader: Box<dyn Link>) {
    let mut assembler = FrameAssembler::new();
    let mut byte = [0u8; 1];

    loop {
        if shared.stopping() {
            break;
        }

        match reader.read(&mut byte) {
            Ok(0) => {
                if !shared.stopping() {
                    shared.report_error(TransportError::io(
                        shared.port.as_str(),
                        "Link closed by device",
                    ));
                }
                break;
            }
            Ok(_) => {
                // Bytes that race with stop() are dropped
                if shared.stopping() {
                    break;
                }
                if let Some(frame) = assembler.push(byte[0] as char) {
                    shared.deliver_frame(frame);
                }
            }
            Err(ref e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                if !shared.stopping() {
                    shared.report_error(TransportError::io(
                        shared.port.as_str(),
                        format!("Read error: {}", e),
                    ));
                }
                break;
            }
        }
    }

    drop(reader);
    shared.broadcast(TransportEvent::Ended);
    tlog!("[serial:{}] Listener stopped", shared.port);
}

// ============================================================================
// DTR pulse
// ============================================================================

/// DTR held high for as long as this guard lives
struct DtrPulse<'a> {
    link: &'a mut dyn Link,
    released: bool,
}

impl<'a> DtrPulse<'a> {
    fn raise(link: &'a mut dyn Link) -> std::io::Result<Self> {
        link.set_dtr(true)?;
        Ok(DtrPulse {
            link,
            released: false,
        })
    }

    fn release(mut self) -> std::io::Result<()> {
        self.released = true;
        self.link.set_dtr(false)
    }
}

impl Drop for DtrPulse<'_> {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.link.set_dtr(false);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::serial::link::memory;
    use std::sync::mpsc as std_mpsc;

    const WAIT: Duration = Duration::from_secs(2);

    fn transport() -> (SerialTransport, memory::MemoryLinkHandle) {
        let (link, handle) = memory::pair();
        (SerialTransport::from_link("mem0", Box::new(link), false), handle)
    }

    #[test]
    fn test_callback_receives_frames_in_order() {
        let (transport, modem) = transport();
        let (tx, rx) = std_mpsc::channel();
        transport.set_receive_callback(move |frame| {
            let _ = tx.send(frame.as_str().to_string());
        });
        transport.start_listening().unwrap();

        modem.inject("ab(cd\r\r");

        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "ab");
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "cd");
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "");
        transport.stop();
    }

    #[test]
    fn test_replacing_callback() {
        let (transport, modem) = transport();
        let (tx_old, rx_old) = std_mpsc::channel();
        let (tx_new, rx_new) = std_mpsc::channel();
        transport.set_receive_callback(move |f| {
            let _ = tx_old.send(f.clone());
        });
        transport.set_receive_callback(move |f| {
            let _ = tx_new.send(f.clone());
        });
        transport.start_listening().unwrap();

        modem.inject("x\r");
        assert_eq!(rx_new.recv_timeout(WAIT).unwrap(), "x");
        assert!(rx_old.try_recv().is_err());
        transport.stop();
    }

    #[test]
    fn test_subscribers_each_get_every_frame() {
        let (transport, modem) = transport();
        let mut first = transport.subscribe();
        let mut second = transport.subscribe();
        transport.start_listening().unwrap();

        modem.inject("one\rtwo\r");
        for sub in [&mut first, &mut second] {
            assert_eq!(sub.blocking_recv(), Some(TransportEvent::Frame(Frame::new("one"))));
            assert_eq!(sub.blocking_recv(), Some(TransportEvent::Frame(Frame::new("two"))));
        }

        transport.stop();
        assert_eq!(first.blocking_recv(), Some(TransportEvent::Ended));
        assert_eq!(first.blocking_recv(), None);
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let (transport, modem) = transport();
        let dropped = transport.subscribe();
        let mut kept = transport.subscribe();
        drop(dropped);
        transport.start_listening().unwrap();

        modem.inject("z\r");
        assert_eq!(kept.blocking_recv(), Some(TransportEvent::Frame(Frame::new("z"))));
        assert_eq!(lock(&transport.shared.subscribers).len(), 1);
        transport.stop();
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let (transport, _modem) = transport();
        transport.start_listening().unwrap();
        assert_eq!(transport.state(), TransportState::Listening);
        assert_eq!(
            transport.start_listening(),
            Err(TransportError::AlreadyListening {
                port: "mem0".to_string()
            })
        );
        transport.stop();
    }

    #[test]
    fn test_operations_after_stop_report_link_not_open() {
        let (transport, _modem) = transport();
        assert_eq!(transport.state(), TransportState::Idle);
        transport.stop();
        assert_eq!(transport.state(), TransportState::Stopped);

        let not_open = TransportError::not_open("mem0");
        assert_eq!(transport.start_listening(), Err(not_open.clone()));
        assert_eq!(transport.send(b"x"), Err(not_open.clone()));
        assert_eq!(transport.reset(), Err(not_open));

        // A late subscription is closed straight away
        let mut late = transport.subscribe();
        assert_eq!(late.blocking_recv(), None);

        transport.stop();
    }

    #[test]
    fn test_send_writes_bytes() {
        let (transport, modem) = transport();
        transport.send("(0102)\r").unwrap();
        transport.send(vec![0x41u8, 0x42]).unwrap();
        assert_eq!(modem.written(), b"(0102)\rAB".to_vec());
    }

    #[test]
    fn test_reset_pulses_dtr() {
        let (transport, modem) = transport();
        let started = std::time::Instant::now();
        transport.reset().unwrap();
        assert!(started.elapsed() >= RESET_PULSE);
        assert_eq!(modem.dtr_log(), vec![true, false]);
    }

    #[test]
    fn test_dtr_guard_lowers_line_on_drop() {
        let (mut link, modem) = memory::pair();
        {
            let _pulse = DtrPulse::raise(&mut link).unwrap();
        }
        assert_eq!(modem.dtr_log(), vec![true, false]);
    }

    #[test]
    fn test_device_hangup_is_reported() {
        let (transport, modem) = transport();
        let (tx, rx) = std_mpsc::channel();
        transport.set_error_callback(move |e| {
            let _ = tx.send(e.clone());
        });
        let mut sub = transport.subscribe();
        transport.start_listening().unwrap();

        modem.hang_up();

        let err = rx.recv_timeout(WAIT).unwrap();
        assert!(matches!(err, TransportError::Io { .. }));
        assert!(matches!(sub.blocking_recv(), Some(TransportEvent::Error(_))));
        assert_eq!(sub.blocking_recv(), Some(TransportEvent::Ended));
        assert!(!modem.read_after_hangup());
        transport.stop();
    }

    #[test]
    fn test_read_failure_is_reported() {
        let (transport, modem) = transport();
        let mut sub = transport.subscribe();
        transport.start_listening().unwrap();

        modem.fail(ErrorKind::BrokenPipe);

        match sub.blocking_recv() {
            Some(TransportEvent::Error(TransportError::Io { message, .. })) => {
                assert!(message.starts_with("Read error"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(sub.blocking_recv(), Some(TransportEvent::Ended));
    }

    #[test]
    fn test_stop_from_inside_callback() {
        let (link, modem) = memory::pair();
        let transport = Arc::new(SerialTransport::from_link("mem0", Box::new(link), false));
        let (tx, rx) = std_mpsc::channel();
        let inner = Arc::downgrade(&transport);
        transport.set_receive_callback(move |_| {
            if let Some(t) = inner.upgrade() {
                t.stop();
            }
            let _ = tx.send(());
        });
        transport.start_listening().unwrap();

        modem.inject("go\r");
        rx.recv_timeout(WAIT).unwrap();
        assert_eq!(transport.state(), TransportState::Stopped);
    }

    #[test]
    fn test_open_missing_port_is_unavailable() {
        let err = SerialTransport::open("/dev/motegate-does-not-exist", DEFAULT_BAUD_RATE, false)
            .err()
            .expect("open should fail");
        assert!(matches!(err, TransportError::PortUnavailable { .. }));
    }
}
