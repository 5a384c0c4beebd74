//! Mux session: many logical streams over one byte stream.
//!
//! A session owns two tasks. The writer drains a frame queue into the
//! connection; the reader dispatches incoming frames to streams. Each logical
//! stream is one end of an in-memory pipe whose other end is pumped to and
//! from frames by two small per-stream tasks.

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use ztlink_core::DEFAULT_MUX_STREAM_BUFFER;

use super::frame::{Cmd, Frame, MuxCodec};

/// Frames queued towards the connection before senders wait.
const FRAME_QUEUE: usize = 256;
/// Payload chunks queued per stream before the reader waits.
const STREAM_QUEUE: usize = 64;
/// Opened-by-peer streams waiting for `accept_stream`.
const ACCEPT_BACKLOG: usize = 16;
/// Largest payload one pump read produces.
const PUMP_CHUNK: usize = 32 * 1024;
/// How long `close` waits for queued frames to reach the connection.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

type StreamTable = Arc<Mutex<HashMap<u32, mpsc::Sender<Bytes>>>>;

/// One logical stream of a [`MuxSession`].
#[derive(Debug)]
pub struct MuxStream {
    id: u32,
    io: DuplexStream,
}

impl MuxStream {
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl AsyncRead for MuxStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_read(cx, buf)
    }
}

impl AsyncWrite for MuxStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.io).poll_write(cx, data)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.io).poll_shutdown(cx)
    }
}

/// Multiplexer over one established connection.
///
/// The client side numbers its streams odd, the server side even.
pub struct MuxSession {
    next_id: AtomicU32,
    frames: Option<mpsc::Sender<Frame>>,
    streams: StreamTable,
    incoming: tokio::sync::Mutex<mpsc::Receiver<MuxStream>>,
    closed: CancellationToken,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl MuxSession {
    pub fn client<S>(io: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::start(io, 1)
    }

    pub fn server<S>(io: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::start(io, 2)
    }

    fn start<S>(io: S, first_id: u32) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(io);
        let (frames_tx, frames_rx) = mpsc::channel(FRAME_QUEUE);
        let (accept_tx, accept_rx) = mpsc::channel(ACCEPT_BACKLOG);
        let streams: StreamTable = Arc::default();
        let closed = CancellationToken::new();

        let writer = tokio::spawn(write_loop(
            FramedWrite::new(write_half, MuxCodec),
            frames_rx,
            closed.clone(),
        ));
        let reader = tokio::spawn(read_loop(
            FramedRead::new(read_half, MuxCodec),
            ReaderState {
                frames: frames_tx.downgrade(),
                streams: streams.clone(),
                accept: accept_tx,
                closed: closed.clone(),
            },
        ));

        Self {
            next_id: AtomicU32::new(first_id),
            frames: Some(frames_tx),
            streams,
            incoming: tokio::sync::Mutex::new(accept_rx),
            closed,
            reader: Some(reader),
            writer: Some(writer),
        }
    }

    /// Open a new stream towards the peer.
    pub async fn open_stream(&self) -> io::Result<MuxStream> {
        let frames = self.frames.as_ref().ok_or_else(session_closed)?;
        if self.closed.is_cancelled() {
            return Err(session_closed());
        }
        let id = self.next_id.fetch_add(2, Ordering::Relaxed);
        let stream = attach(id, frames.clone(), &self.streams);
        frames
            .send(Frame::syn(id))
            .await
            .map_err(|_| session_closed())?;
        debug!(stream_id = id, "mux stream opened");
        Ok(stream)
    }

    /// Wait for the peer to open a stream.
    pub async fn accept_stream(&self) -> io::Result<MuxStream> {
        let stream = self
            .incoming
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(session_closed)?;
        debug!(stream_id = stream.id, "mux stream accepted");
        Ok(stream)
    }

    /// Number of live streams.
    pub fn stream_count(&self) -> usize {
        self.streams.lock().len()
    }

    /// Flush pending frames and close the connection.
    ///
    /// Streams still held by the caller keep the writer alive; drop them first.
    pub async fn close(mut self) {
        drop(self.frames.take());
        if let Some(writer) = self.writer.take() {
            if tokio::time::timeout(DRAIN_TIMEOUT, writer).await.is_err() {
                debug!("mux drain timed out");
            }
        }
        self.closed.cancel();
    }
}

impl Drop for MuxSession {
    fn drop(&mut self) {
        self.closed.cancel();
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

fn session_closed() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "mux session closed")
}

/// Create the pipe for stream `id`, register it and start its pumps.
fn attach(id: u32, frames: mpsc::Sender<Frame>, streams: &StreamTable) -> MuxStream {
    let (app, pump) = tokio::io::duplex(DEFAULT_MUX_STREAM_BUFFER);
    let (pump_read, pump_write) = tokio::io::split(pump);
    let (inbound_tx, inbound_rx) = mpsc::channel(STREAM_QUEUE);
    streams.lock().insert(id, inbound_tx);

    tokio::spawn(deliver_inbound(inbound_rx, pump_write));
    tokio::spawn(pump_outbound(id, pump_read, frames));
    MuxStream { id, io: app }
}

/// Peer data for one stream → the application end of its pipe.
async fn deliver_inbound(
    mut chunks: mpsc::Receiver<Bytes>,
    mut pipe: tokio::io::WriteHalf<DuplexStream>,
) {
    while let Some(chunk) = chunks.recv().await {
        if pipe.write_all(&chunk).await.is_err() {
            return;
        }
    }
    // Peer sent FIN or the session ended.
    let _ = pipe.shutdown().await;
}

/// Application writes on one stream → PSH frames, then FIN at EOF.
async fn pump_outbound(
    id: u32,
    mut pipe: tokio::io::ReadHalf<DuplexStream>,
    frames: mpsc::Sender<Frame>,
) {
    let mut buf = vec![0u8; PUMP_CHUNK];
    loop {
        match pipe.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let frame = Frame::psh(id, Bytes::copy_from_slice(&buf[..n]));
                if frames.send(frame).await.is_err() {
                    return;
                }
            }
        }
    }
    let _ = frames.send(Frame::fin(id)).await;
    trace!(stream_id = id, "mux stream finished");
}

async fn write_loop<W>(
    mut sink: FramedWrite<W, MuxCodec>,
    mut frames: mpsc::Receiver<Frame>,
    closed: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            biased;
            _ = closed.cancelled() => break,
            frame = frames.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = sink.send(frame).await {
                        debug!(error = %e, "mux write failed");
                        closed.cancel();
                        return;
                    }
                }
                None => break,
            },
        }
    }
    let _ = sink.close().await;
}

struct ReaderState {
    frames: mpsc::WeakSender<Frame>,
    streams: StreamTable,
    accept: mpsc::Sender<MuxStream>,
    closed: CancellationToken,
}

async fn read_loop<R>(mut source: FramedRead<R, MuxCodec>, state: ReaderState)
where
    R: AsyncRead + Unpin,
{
    while let Some(item) = source.next().await {
        let frame = match item {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "mux read failed");
                break;
            }
        };
        let id = frame.stream_id;

        match frame.cmd {
            Cmd::Syn => {
                let Some(frames) = state.frames.upgrade() else {
                    break;
                };
                let stream = attach(id, frames, &state.streams);
                if state.accept.send(stream).await.is_err() {
                    state.streams.lock().remove(&id);
                }
            }
            Cmd::Psh => {
                let inbound = state.streams.lock().get(&id).cloned();
                match inbound {
                    Some(tx) => {
                        if tx.send(frame.payload).await.is_err() {
                            state.streams.lock().remove(&id);
                        }
                    }
                    None => trace!(stream_id = id, "data for unknown mux stream"),
                }
            }
            Cmd::Fin => {
                state.streams.lock().remove(&id);
            }
            Cmd::Nop => {}
        }
    }

    // Connection gone: every stream reads EOF, pending accepts fail.
    state.streams.lock().clear();
    state.closed.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn single_stream_carries_both_directions() {
        let (a, b) = duplex(64 * 1024);
        let client = MuxSession::client(a);
        let server = MuxSession::server(b);

        let mut outgoing = client.open_stream().await.unwrap();
        assert_eq!(outgoing.id() % 2, 1);
        outgoing.write_all(b"hello server").await.unwrap();

        let mut incoming = server.accept_stream().await.unwrap();
        assert_eq!(incoming.id(), outgoing.id());
        let mut buf = [0u8; 12];
        incoming.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello server");

        incoming.write_all(b"hello client").await.unwrap();
        outgoing.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello client");
    }

    #[tokio::test]
    async fn dropping_a_stream_signals_eof_to_peer() {
        let (a, b) = duplex(64 * 1024);
        let client = MuxSession::client(a);
        let server = MuxSession::server(b);

        let mut outgoing = client.open_stream().await.unwrap();
        outgoing.write_all(b"last words").await.unwrap();
        drop(outgoing);

        let mut incoming = server.accept_stream().await.unwrap();
        let mut received = Vec::new();
        incoming.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"last words");
    }

    #[tokio::test]
    async fn streams_are_independent() {
        let (a, b) = duplex(64 * 1024);
        let client = MuxSession::client(a);
        let server = MuxSession::server(b);

        let mut first = client.open_stream().await.unwrap();
        let mut second = client.open_stream().await.unwrap();
        assert_ne!(first.id(), second.id());

        let mut in_first = server.accept_stream().await.unwrap();
        let mut in_second = server.accept_stream().await.unwrap();

        second.write_all(b"two").await.unwrap();
        first.write_all(b"one").await.unwrap();

        let mut buf = [0u8; 3];
        in_second.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"two");
        in_first.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"one");
    }

    #[tokio::test]
    async fn close_flushes_pending_data() {
        let (a, b) = duplex(64 * 1024);
        let client = MuxSession::client(a);
        let server = MuxSession::server(b);

        let mut outgoing = client.open_stream().await.unwrap();
        let payload = vec![7u8; 200 * 1024];
        outgoing.write_all(&payload).await.unwrap();
        drop(outgoing);

        let reader = tokio::spawn(async move {
            let mut incoming = server.accept_stream().await.unwrap();
            let mut received = Vec::new();
            incoming.read_to_end(&mut received).await.unwrap();
            received
        });

        client.close().await;
        assert_eq!(reader.await.unwrap(), payload);
    }

    #[tokio::test]
    async fn peer_disconnect_fails_accept() {
        let (a, b) = duplex(1024);
        let server = MuxSession::server(b);
        drop(a);

        assert!(server.accept_stream().await.is_err());
    }
}
