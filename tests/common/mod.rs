//! Shared fakes for the integration tests: a device that produces chunks on a
//! timer and a one-shot HTTP server.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

use voice_verify::audio::{AudioDevice, DeviceEvent, DeviceStream};
use voice_verify::{AudioError, StatusSink, StatusUpdate};
use voice_verify::{Navigator, Page};

/// Emits `chunk_len`-sample chunks every `chunk_len / sample_rate` seconds,
/// optionally hanging up after `max_chunks`.
pub struct TimedDevice {
    pub sample_rate: u32,
    pub chunk_len: usize,
    pub max_chunks: Option<usize>,
    pub deny: Option<AudioError>,
    pub sent: Arc<AtomicUsize>,
    pub released: Arc<AtomicBool>,
}

impl TimedDevice {
    pub fn new(sample_rate: u32, chunk_len: usize) -> Self {
        Self {
            sample_rate,
            chunk_len,
            max_chunks: None,
            deny: None,
            sent: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(self.chunk_len as f64 / self.sample_rate as f64)
    }

    pub fn chunks_sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl AudioDevice for TimedDevice {
    async fn request_access(&self) -> Result<DeviceStream, AudioError> {
        if let Some(err) = self.deny.clone() {
            return Err(err);
        }

        let (tx, rx) = mpsc::channel(64);
        let period = self.period();
        let chunk_len = self.chunk_len;
        let max_chunks = self.max_chunks;
        let sent = self.sent.clone();

        let producer = tokio::spawn(async move {
            let mut index = 0usize;
            loop {
                if max_chunks.is_some_and(|max| index >= max) {
                    break;
                }
                tokio::time::sleep(period).await;
                // Sawtooth so sample order is observable after encoding
                let value = ((index % 16) as f32 / 16.0) - 0.5;
                if tx.send(DeviceEvent::Chunk(vec![value; chunk_len])).await.is_err() {
                    break;
                }
                sent.fetch_add(1, Ordering::SeqCst);
                index += 1;
            }
        });

        let released = self.released.clone();
        Ok(DeviceStream::new(self.sample_rate, rx, move || {
            producer.abort();
            released.store(true, Ordering::SeqCst);
        }))
    }
}

/// Pushes chunks from a plain OS thread with `try_send`, like a realtime
/// audio callback, independent of how busy the runtime is.
pub struct ThreadedDevice {
    pub sample_rate: u32,
    pub chunk_len: usize,
    pub period: Duration,
    pub accepted: Arc<AtomicUsize>,
}

impl ThreadedDevice {
    pub fn new(sample_rate: u32, chunk_len: usize, period: Duration) -> Self {
        Self {
            sample_rate,
            chunk_len,
            period,
            accepted: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Chunks the queue took. Final once the stream is released.
    pub fn chunks_accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

impl AudioDevice for ThreadedDevice {
    async fn request_access(&self) -> Result<DeviceStream, AudioError> {
        let (tx, rx) = mpsc::channel(1024);
        let stop = Arc::new(AtomicBool::new(false));
        let period = self.period;
        let chunk_len = self.chunk_len;
        let accepted = self.accepted.clone();

        let producer = {
            let stop = stop.clone();
            std::thread::spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    std::thread::sleep(period);
                    match tx.try_send(DeviceEvent::Chunk(vec![0.25; chunk_len])) {
                        Ok(()) => {
                            accepted.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(mpsc::error::TrySendError::Full(_)) => {}
                        Err(mpsc::error::TrySendError::Closed(_)) => break,
                    }
                }
            })
        };

        Ok(DeviceStream::new(self.sample_rate, rx, move || {
            stop.store(true, Ordering::SeqCst);
            let _ = producer.join();
        }))
    }
}

#[derive(Default)]
pub struct RecordingStatus {
    pub updates: Mutex<Vec<StatusUpdate>>,
}

impl RecordingStatus {
    pub fn updates(&self) -> Vec<StatusUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<StatusUpdate> {
        self.updates.lock().unwrap().last().cloned()
    }
}

impl StatusSink for RecordingStatus {
    fn set_status(&self, update: StatusUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    pub pages: Mutex<Vec<Page>>,
}

impl RecordingNavigator {
    pub fn pages(&self) -> Vec<Page> {
        self.pages.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, page: Page) {
        self.pages.lock().unwrap().push(page);
    }
}

/// A captured HTTP request
#[derive(Debug)]
pub struct CapturedRequest {
    pub head: String,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    pub fn body_contains(&self, needle: &[u8]) -> bool {
        find(&self.body, needle).is_some()
    }

    /// Bytes of the multipart part that follows `marker`, up to the next boundary.
    pub fn part_after(&self, marker: &[u8]) -> Vec<u8> {
        let start = find(&self.body, marker).expect("marker not in body");
        let rest = &self.body[start..];
        let data_start = find(rest, b"\r\n\r\n").expect("part headers not terminated") + 4;
        let data = &rest[data_start..];
        let data_end = find(data, b"\r\n--").expect("part not terminated");
        data[..data_end].to_vec()
    }
}

pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Serve one request with `status` and `body`, then shut down.
pub async fn serve_once(
    status: u16,
    content_type: &'static str,
    body: &'static str,
) -> (String, oneshot::Receiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;

        let response = format!(
            "HTTP/1.1 {} Status\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            content_type,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        let _ = tx.send(request);
    });

    (format!("http://{}", addr), rx)
}

/// A base URL nothing is listening on.
pub async fn unreachable_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> CapturedRequest {
    let mut raw = Vec::new();
    let mut buf = [0u8; 8192];

    let head_end = loop {
        let n = socket.read(&mut buf).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        raw.extend_from_slice(&buf[..n]);
        if let Some(pos) = find(&raw, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&raw[..head_end]).to_string();
    let lower = head.to_ascii_lowercase();
    let mut body = raw[head_end..].to_vec();

    if let Some(len) = header_value(&lower, "content-length").and_then(|v| v.parse::<usize>().ok())
    {
        while body.len() < len {
            let n = socket.read(&mut buf).await.unwrap();
            assert!(n > 0, "client closed mid-body");
            body.extend_from_slice(&buf[..n]);
        }
    } else if header_value(&lower, "transfer-encoding").is_some_and(|v| v.contains("chunked")) {
        while find(&body, b"0\r\n\r\n").is_none() {
            let n = socket.read(&mut buf).await.unwrap();
            assert!(n > 0, "client closed mid-body");
            body.extend_from_slice(&buf[..n]);
        }
        body = dechunk(&body);
    }

    CapturedRequest { head, body }
}

fn header_value<'a>(lower_head: &'a str, name: &str) -> Option<&'a str> {
    lower_head.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == name).then(|| value.trim())
    })
}

fn dechunk(mut data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let Some(line_end) = find(data, b"\r\n") else {
            break;
        };
        let size_str = String::from_utf8_lossy(&data[..line_end]).to_string();
        let size = usize::from_str_radix(size_str.split(';').next().unwrap_or("0").trim(), 16)
            .unwrap_or(0);
        if size == 0 {
            break;
        }
        let start = line_end + 2;
        out.extend_from_slice(&data[start..start + size]);
        data = &data[start + size + 2..];
    }
    out
}
