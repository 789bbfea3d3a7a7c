//! Async frame stream over TCP.
//!
//! [`FrameReader`] turns a byte stream into [`ReadEvent`]s with two
//! deadlines: an idle deadline while waiting for the next frame to start,
//! and a per-frame deadline once it has. An idle expiry is harmless; a
//! per-frame expiry leaves the stream mid-frame and is fatal.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{self, Instant};

use super::error::{LinkError, LinkResult};
use crate::codec::{FrameKind, FrameLimits, parse_length};
use crate::core::constants::{HEARTBEAT_PROBE, LENGTH_PREFIX_SIZE};

/// Initial capacity for the payload buffer (typical frame size).
const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// One step of the inbound stream.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadEvent<'a> {
    /// Nothing arrived within the idle deadline.
    Idle,
    /// A zero-length frame.
    TransportHeartbeat,
    /// A complete frame payload.
    Payload(&'a [u8]),
}

/// Reads length-prefixed frames from a byte stream.
///
/// Progress through the current frame lives in the reader, so a
/// `next_event` future dropped mid-frame loses nothing: the next call
/// resumes where it stopped, against the same per-frame deadline.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    limits: FrameLimits,
    idle_timeout: Duration,
    frame_timeout: Duration,
    header: [u8; LENGTH_PREFIX_SIZE],
    header_read: usize,
    /// Declared length once the header has been parsed.
    payload_len: Option<usize>,
    payload_read: usize,
    /// Deadline of the frame in progress.
    deadline: Instant,
    /// Reused across frames.
    buffer: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a reader with explicit limits and deadlines.
    pub fn with_limits(inner: R, limits: FrameLimits, idle_timeout: Duration, frame_timeout: Duration) -> Self {
        Self {
            inner,
            limits,
            idle_timeout,
            frame_timeout,
            header: [0u8; LENGTH_PREFIX_SIZE],
            header_read: 0,
            payload_len: None,
            payload_read: 0,
            deadline: Instant::now(),
            buffer: Vec::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    #[cfg(test)]
    fn in_frame(&self) -> bool {
        self.header_read > 0
    }

    /// Wait for the next frame.
    ///
    /// Cancel-safe. The per-frame deadline starts with the first header
    /// byte and keeps running across cancelled calls.
    pub async fn next_event(&mut self) -> LinkResult<ReadEvent<'_>> {
        if self.header_read == 0 {
            let started = match time::timeout(self.idle_timeout, self.inner.read(&mut self.header)).await {
                Err(_) => return Ok(ReadEvent::Idle),
                Ok(Ok(0)) => return Err(LinkError::ConnectionClosed),
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(e.into()),
            };
            self.header_read = started;
            self.deadline = Instant::now() + self.frame_timeout;
        }

        while self.header_read < LENGTH_PREFIX_SIZE {
            self.header_read += read_by(&mut self.inner, &mut self.header[self.header_read..], self.deadline).await?;
        }

        let len = match self.payload_len {
            Some(len) => len,
            None => match parse_length(self.header, &self.limits) {
                Ok(FrameKind::TransportHeartbeat) => {
                    self.finish_frame();
                    return Ok(ReadEvent::TransportHeartbeat);
                }
                Ok(FrameKind::Payload(len)) => {
                    self.buffer.resize(len, 0);
                    self.payload_len = Some(len);
                    len
                }
                Err(e) => {
                    self.finish_frame();
                    return Err(e.into());
                }
            },
        };

        while self.payload_read < len {
            self.payload_read +=
                read_by(&mut self.inner, &mut self.buffer[self.payload_read..len], self.deadline).await?;
        }
        self.finish_frame();
        Ok(ReadEvent::Payload(&self.buffer[..len]))
    }

    fn finish_frame(&mut self) {
        self.header_read = 0;
        self.payload_len = None;
        self.payload_read = 0;
    }
}

/// One read into `buf`, which must not be empty, bounded by `deadline`.
async fn read_by<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8], deadline: Instant) -> LinkResult<usize> {
    match time::timeout_at(deadline, reader.read(buf)).await {
        Err(_) => Err(LinkError::FrameTimeout),
        Ok(Ok(0)) => Err(LinkError::ConnectionClosed),
        Ok(Ok(n)) => Ok(n),
        Ok(Err(e)) => Err(e.into()),
    }
}

/// Write one outbound liveness probe.
pub async fn write_probe<W: AsyncWrite + Unpin>(writer: &mut W, timeout: Duration) -> LinkResult<()> {
    let write = async {
        writer.write_all(&HEARTBEAT_PROBE).await?;
        writer.flush().await
    };
    match time::timeout(timeout, write).await {
        Err(_) => Err(LinkError::WriteTimeout),
        Ok(result) => result.map_err(LinkError::from),
    }
}

/// Open a TCP connection to the telemetry source.
pub async fn connect(addr: SocketAddr, timeout: Duration) -> LinkResult<TcpStream> {
    let stream = match time::timeout(timeout, TcpStream::connect(addr)).await {
        Err(_) => return Err(LinkError::ConnectTimeout),
        Ok(result) => result?,
    };
    stream.set_nodelay(true)?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_frame, transport_heartbeat_frame};
    use crate::core::FrameError;
    use tokio::io::duplex;
    use tokio::net::TcpListener;

    fn reader<R: AsyncRead + Unpin>(inner: R) -> FrameReader<R> {
        FrameReader::with_limits(
            inner,
            FrameLimits::default(),
            Duration::from_millis(50),
            Duration::from_millis(200),
        )
    }

    #[tokio::test]
    async fn test_reads_heartbeat_and_payload() {
        let (mut tx, rx) = duplex(1024);
        let mut reader = reader(rx);

        tx.write_all(&transport_heartbeat_frame()).await.unwrap();
        tx.write_all(&encode_frame(b"{\"data\":{}}").unwrap()).await.unwrap();

        assert_eq!(reader.next_event().await.unwrap(), ReadEvent::TransportHeartbeat);
        assert_eq!(
            reader.next_event().await.unwrap(),
            ReadEvent::Payload(b"{\"data\":{}}".as_slice())
        );
    }

    #[tokio::test]
    async fn test_idle_when_nothing_arrives() {
        let (_tx, rx) = duplex(64);
        let mut reader = reader(rx);
        assert_eq!(reader.next_event().await.unwrap(), ReadEvent::Idle);
    }

    #[tokio::test]
    async fn test_partial_writes_are_reassembled() {
        let (mut tx, rx) = duplex(1024);
        let mut reader = reader(rx);
        let frame = encode_frame(b"hello world").unwrap();

        let writer = tokio::spawn(async move {
            for chunk in frame.chunks(3) {
                tx.write_all(chunk).await.unwrap();
                time::sleep(Duration::from_millis(5)).await;
            }
            tx
        });

        assert_eq!(
            reader.next_event().await.unwrap(),
            ReadEvent::Payload(b"hello world".as_slice())
        );
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn test_stalled_frame_is_frame_timeout() {
        let (mut tx, rx) = duplex(1024);
        let mut reader = reader(rx);

        // Header promises 10 bytes, only 2 arrive.
        tx.write_all(&10u32.to_be_bytes()).await.unwrap();
        tx.write_all(b"ab").await.unwrap();

        let err = reader.next_event().await.unwrap_err();
        assert!(matches!(err, LinkError::FrameTimeout));
        assert!(err.is_desync());
    }

    #[tokio::test]
    async fn test_cancelled_read_resumes_mid_frame() {
        let (mut tx, rx) = duplex(1024);
        let mut reader = reader(rx);
        let frame = encode_frame(b"resumed payload").unwrap();

        tx.write_all(&frame[..7]).await.unwrap();
        assert!(time::timeout(Duration::from_millis(20), reader.next_event()).await.is_err());
        assert!(reader.in_frame());

        tx.write_all(&frame[7..]).await.unwrap();
        tx.write_all(&transport_heartbeat_frame()).await.unwrap();
        assert_eq!(
            reader.next_event().await.unwrap(),
            ReadEvent::Payload(b"resumed payload".as_slice())
        );
        assert!(!reader.in_frame());
        assert_eq!(reader.next_event().await.unwrap(), ReadEvent::TransportHeartbeat);
    }

    #[tokio::test]
    async fn test_cancelled_read_keeps_frame_deadline() {
        let (mut tx, rx) = duplex(1024);
        let mut reader = reader(rx);

        tx.write_all(&10u32.to_be_bytes()).await.unwrap();
        for _ in 0..3 {
            assert!(time::timeout(Duration::from_millis(20), reader.next_event()).await.is_err());
        }
        // The 200 ms frame deadline counts from the header, not this call.
        let started = Instant::now();
        assert!(matches!(reader.next_event().await.unwrap_err(), LinkError::FrameTimeout));
        assert!(started.elapsed() < Duration::from_millis(190));
    }

    #[tokio::test]
    async fn test_negative_length_is_frame_error() {
        let (mut tx, rx) = duplex(64);
        let mut reader = reader(rx);
        tx.write_all(&(-5i32).to_be_bytes()).await.unwrap();

        let err = reader.next_event().await.unwrap_err();
        assert!(matches!(err, LinkError::Frame(FrameError::InvalidLength(-5))));
    }

    #[tokio::test]
    async fn test_peer_close_is_reported() {
        let (tx, rx) = duplex(64);
        let mut reader = reader(rx);
        drop(tx);
        assert!(matches!(
            reader.next_event().await.unwrap_err(),
            LinkError::ConnectionClosed
        ));
    }

    #[tokio::test]
    async fn test_close_mid_frame_is_reported() {
        let (mut tx, rx) = duplex(64);
        let mut reader = reader(rx);
        tx.write_all(&8u32.to_be_bytes()).await.unwrap();
        tx.write_all(b"abc").await.unwrap();
        drop(tx);
        assert!(matches!(
            reader.next_event().await.unwrap_err(),
            LinkError::ConnectionClosed
        ));
    }

    #[tokio::test]
    async fn test_write_probe() {
        let (mut tx, mut rx) = duplex(64);
        write_probe(&mut tx, Duration::from_millis(100)).await.unwrap();

        let mut buf = [0xAAu8; 4];
        rx.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, HEARTBEAT_PROBE);
    }

    #[tokio::test]
    async fn test_connect_to_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (client, accepted) = tokio::join!(connect(addr, Duration::from_secs(1)), listener.accept());
        let client = client.unwrap();
        let (_server, peer) = accepted.unwrap();
        assert_eq!(client.local_addr().unwrap(), peer);
        assert!(client.nodelay().unwrap());
    }
}
