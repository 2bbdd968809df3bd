// src/io/serial/link.rs
//
// The physical side of a serial transport.
// SerialTransport only needs byte reads, writes and the DTR line, so it talks
// to this trait instead of `serialport::SerialPort` directly. Tests plug in
// an in-memory link through the same seam.

use std::io::{self, Read, Write};
use std::time::Duration;

use super::utils::LineSettings;

/// Read timeout used internally by the listener so it can observe `stop()`.
/// A timeout is never reported; it only means "no byte yet".
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A duplex byte link with a DTR control line
pub trait Link: Send {
    /// Read into `buf`. `Ok(0)` means the far end went away.
    /// `ErrorKind::TimedOut` means no data arrived within the poll interval.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write the whole buffer and flush it to the wire
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Drive the DTR control line
    fn set_dtr(&mut self, level: bool) -> io::Result<()>;

    /// Second handle onto the same link, used as the listener's read half
    fn try_clone(&self) -> io::Result<Box<dyn Link>>;
}

// ============================================================================
// serialport-backed link
// ============================================================================

impl Link for Box<dyn serialport::SerialPort> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(self, buf)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        Write::write_all(self, data)?;
        Write::flush(self)
    }

    fn set_dtr(&mut self, level: bool) -> io::Result<()> {
        serialport::SerialPort::write_data_terminal_ready(self.as_mut(), level).map_err(io::Error::from)
    }

    fn try_clone(&self) -> io::Result<Box<dyn Link>> {
        let port = serialport::SerialPort::try_clone(self.as_ref()).map_err(io::Error::from)?;
        Ok(Box::new(port))
    }
}

/// Open a physical port in blocking mode with the given line settings
pub fn open_port(port: &str, baud_rate: u32, line: &LineSettings) -> serialport::Result<Box<dyn Link>> {
    let port = serialport::new(port, baud_rate)
        .data_bits(line.port_data_bits())
        .stop_bits(line.port_stop_bits())
        .parity(line.port_parity())
        .timeout(POLL_INTERVAL)
        .open()?;
    Ok(Box::new(port))
}

// ============================================================================
// Port enumeration
// ============================================================================

/// A port found on this host
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerialPortInfo {
    pub port_name: String,
    /// "USB", "Bluetooth", "PCI" or "Unknown"
    pub port_type: String,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    fn bare(port_name: String, port_type: &str) -> Self {
        SerialPortInfo {
            port_name,
            port_type: port_type.to_string(),
            manufacturer: None,
            product: None,
            serial_number: None,
            vid: None,
            pid: None,
        }
    }
}

impl From<serialport::SerialPortInfo> for SerialPortInfo {
    fn from(p: serialport::SerialPortInfo) -> Self {
        match p.port_type {
            serialport::SerialPortType::UsbPort(usb) => SerialPortInfo {
                manufacturer: usb.manufacturer,
                product: usb.product,
                serial_number: usb.serial_number,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                ..SerialPortInfo::bare(p.port_name, "USB")
            },
            serialport::SerialPortType::BluetoothPort => SerialPortInfo::bare(p.port_name, "Bluetooth"),
            serialport::SerialPortType::PciPort => SerialPortInfo::bare(p.port_name, "PCI"),
            serialport::SerialPortType::Unknown => SerialPortInfo::bare(p.port_name, "Unknown"),
        }
    }
}

/// Ports a modem could be attached to.
///
/// On macOS only the /dev/cu.* callout devices are listed; opening a
/// /dev/tty.* device blocks until carrier detect.
pub fn list_ports() -> serialport::Result<Vec<SerialPortInfo>> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .filter(|p| !(cfg!(target_os = "macos") && p.port_name.starts_with("/dev/tty.")))
        .map(SerialPortInfo::from)
        .collect())
}

// ============================================================================
// In-memory link
// ============================================================================

/// Loopback-style link backed by channels, for driving a transport without
/// hardware. The `MemoryLinkHandle` plays the modem: it injects inbound bytes
/// and observes what the transport wrote and how it drove DTR.
pub mod memory {
    use std::io;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use super::{Link, POLL_INTERVAL};

    enum Inbound {
        Bytes(Vec<u8>),
        Fail(io::ErrorKind),
        Hangup,
    }

    struct Shared {
        written: Mutex<Vec<u8>>,
        dtr_log: Mutex<Vec<bool>>,
        reads_after_hangup: AtomicBool,
        write_delay: Mutex<Duration>,
        writes_started: AtomicUsize,
    }

    /// Transport-facing end
    pub struct MemoryLink {
        rx: Arc<Mutex<Receiver<Inbound>>>,
        pending: Vec<u8>,
        shared: Arc<Shared>,
        hung_up: bool,
    }

    /// Test-facing end
    #[derive(Clone)]
    pub struct MemoryLinkHandle {
        tx: Sender<Inbound>,
        shared: Arc<Shared>,
    }

    /// Create a connected link/handle pair
    pub fn pair() -> (MemoryLink, MemoryLinkHandle) {
        let (tx, rx) = mpsc::channel();
        let shared = Arc::new(Shared {
            written: Mutex::new(Vec::new()),
            dtr_log: Mutex::new(Vec::new()),
            reads_after_hangup: AtomicBool::new(false),
            write_delay: Mutex::new(Duration::ZERO),
            writes_started: AtomicUsize::new(0),
        });
        (
            MemoryLink {
                rx: Arc::new(Mutex::new(rx)),
                pending: Vec::new(),
                shared: shared.clone(),
                hung_up: false,
            },
            MemoryLinkHandle { tx, shared },
        )
    }

    impl MemoryLinkHandle {
        /// Queue bytes for the transport to read
        pub fn inject(&self, data: impl AsRef<[u8]>) {
            let _ = self.tx.send(Inbound::Bytes(data.as_ref().to_vec()));
        }

        /// Make the next read fail with the given error kind
        pub fn fail(&self, kind: io::ErrorKind) {
            let _ = self.tx.send(Inbound::Fail(kind));
        }

        /// Simulate the device disappearing (reads return 0)
        pub fn hang_up(&self) {
            let _ = self.tx.send(Inbound::Hangup);
        }

        /// Hold every subsequent write for `delay` before it lands
        pub fn set_write_delay(&self, delay: Duration) {
            *self.shared.write_delay.lock().unwrap_or_else(|e| e.into_inner()) = delay;
        }

        /// Number of writes that have begun, finished or not
        pub fn writes_started(&self) -> usize {
            self.shared.writes_started.load(Ordering::SeqCst)
        }

        /// Everything the transport has written so far
        pub fn written(&self) -> Vec<u8> {
            self.shared.written.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }

        /// Every DTR level the transport has driven, in order
        pub fn dtr_log(&self) -> Vec<bool> {
            self.shared.dtr_log.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }

        /// True once a read was attempted after a hang-up was delivered
        pub fn read_after_hangup(&self) -> bool {
            self.shared.reads_after_hangup.load(Ordering::SeqCst)
        }
    }

    impl Link for MemoryLink {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.hung_up {
                self.shared.reads_after_hangup.store(true, Ordering::SeqCst);
                return Ok(0);
            }
            if self.pending.is_empty() {
                let rx = self.rx.lock().unwrap_or_else(|e| e.into_inner());
                match rx.recv_timeout(POLL_INTERVAL) {
                    Ok(Inbound::Bytes(bytes)) => self.pending = bytes,
                    Ok(Inbound::Fail(kind)) => return Err(io::Error::new(kind, "injected failure")),
                    Ok(Inbound::Hangup) | Err(RecvTimeoutError::Disconnected) => {
                        self.hung_up = true;
                        return Ok(0);
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
                    }
                }
            }
            let n = buf.len().min(self.pending.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            Ok(n)
        }

        fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
            self.shared.writes_started.fetch_add(1, Ordering::SeqCst);
            let delay = *self.shared.write_delay.lock().unwrap_or_else(|e| e.into_inner());
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            self.shared
                .written
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .extend_from_slice(data);
            Ok(())
        }

        fn set_dtr(&mut self, level: bool) -> io::Result<()> {
            self.shared
                .dtr_log
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(level);
            Ok(())
        }

        fn try_clone(&self) -> io::Result<Box<dyn Link>> {
            Ok(Box::new(MemoryLink {
                rx: self.rx.clone(),
                pending: Vec::new(),
                shared: self.shared.clone(),
                hung_up: false,
            }))
        }
    }
}
