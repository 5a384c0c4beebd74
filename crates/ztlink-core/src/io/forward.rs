//! Transparent bidirectional forwarding between two established streams.
//!
//! The two directions run as separate pumps raced in one `select!`, so a
//! stalled writer on one side never blocks the other. Forwarding ends as soon
//! as either pump sees EOF or an error: a tunnel hop has no use for a
//! half-open pair.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// Byte accounting hook for the forwarder.
pub trait ForwardMetrics {
    /// Bytes copied from the first stream to the second.
    fn record_upstream(&self, bytes: u64);
    /// Bytes copied from the second stream to the first.
    fn record_downstream(&self, bytes: u64);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl ForwardMetrics for NoOpMetrics {
    #[inline]
    fn record_upstream(&self, _bytes: u64) {}
    #[inline]
    fn record_downstream(&self, _bytes: u64) {}
}

/// Move chunks from `reader` to `writer` until EOF, flushing after each one.
async fn pump<R, W, F>(mut reader: R, mut writer: W, buffer_size: usize, record: F) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    F: Fn(u64),
{
    let mut buf = vec![0u8; buffer_size.max(1)];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            // Pass the EOF on so the far side drains before both are dropped.
            let _ = writer.shutdown().await;
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        record(n as u64);
    }
}

/// Copy bytes both ways between `a` and `b` until one side is done.
///
/// Returns `Ok(())` when either direction reaches EOF or `cancel` fires,
/// and the first I/O error otherwise. Both streams are dropped (closed) on
/// return. There is no idle timeout.
pub async fn forward_bidirectional<A, B, M>(
    a: A,
    b: B,
    buffer_size: usize,
    metrics: &M,
    cancel: &CancellationToken,
) -> io::Result<()>
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
    M: ForwardMetrics,
{
    let (a_read, a_write) = tokio::io::split(a);
    let (b_read, b_write) = tokio::io::split(b);

    let upstream = pump(a_read, b_write, buffer_size, |n| metrics.record_upstream(n));
    let downstream = pump(b_read, a_write, buffer_size, |n| metrics.record_downstream(n));

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(()),
        res = upstream => res,
        res = downstream => res,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    #[derive(Default)]
    struct Counting {
        up: AtomicU64,
        down: AtomicU64,
    }

    impl ForwardMetrics for Counting {
        fn record_upstream(&self, bytes: u64) {
            self.up.fetch_add(bytes, Ordering::Relaxed);
        }
        fn record_downstream(&self, bytes: u64) {
            self.down.fetch_add(bytes, Ordering::Relaxed);
        }
    }

    #[tokio::test]
    async fn copies_both_directions() {
        let (mut client, hop_a) = duplex(1024);
        let (hop_b, mut target) = duplex(1024);
        let metrics = Arc::new(Counting::default());
        let cancel = CancellationToken::new();

        let m = metrics.clone();
        let task = tokio::spawn(async move {
            forward_bidirectional(hop_a, hop_b, 512, m.as_ref(), &cancel).await
        });

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        target.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        target.write_all(b"pong!").await.unwrap();
        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong!");

        drop(client);
        task.await.unwrap().unwrap();
        assert_eq!(metrics.up.load(Ordering::Relaxed), 4);
        assert_eq!(metrics.down.load(Ordering::Relaxed), 5);
    }

    #[tokio::test]
    async fn eof_on_one_side_closes_the_other() {
        let (client, hop_a) = duplex(1024);
        let (hop_b, mut target) = duplex(1024);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(async move {
            forward_bidirectional(hop_a, hop_b, 512, &NoOpMetrics, &cancel).await
        });

        drop(client);
        task.await.unwrap().unwrap();

        // The forwarder dropped its end, so the target reads EOF.
        let mut rest = Vec::new();
        target.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn cancellation_stops_idle_forwarding() {
        let (_client, hop_a) = duplex(1024);
        let (hop_b, _target) = duplex(1024);
        let cancel = CancellationToken::new();

        let child = cancel.clone();
        let task = tokio::spawn(async move {
            forward_bidirectional(hop_a, hop_b, 512, &NoOpMetrics, &child).await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("forwarder should stop after cancel")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn stays_open_without_traffic() {
        let (_client, hop_a) = duplex(1024);
        let (hop_b, _target) = duplex(1024);
        let cancel = CancellationToken::new();

        let fut = async move { forward_bidirectional(hop_a, hop_b, 512, &NoOpMetrics, &cancel).await };
        let idle = tokio::time::timeout(Duration::from_millis(100), fut).await;
        assert!(idle.is_err(), "no idle timeout expected");
    }
}
