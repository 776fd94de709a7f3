use std::collections::HashMap;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio_stream::{Stream, StreamExt, StreamMap};
use tokio_util::codec::{Decoder, FramedRead};

use crate::hooks::ProxyHooks;
use crate::stream::ChannelId;

/// Structural side of a channel: the socket's position in the topology,
/// not the direction of any particular payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Leg {
    /// Client-facing socket.
    Downstream,

    /// Server-facing socket.
    Upstream,
}

/// Key of one readable socket inside the multiplexed source set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SocketKey {
    channel: ChannelId,
    leg: Leg,
}

/// Write halves of one proxied connection pair.
struct Channel {
    downstream: OwnedWriteHalf,
    upstream: OwnedWriteHalf,
}

/// Decoder yielding whatever bytes are available, capped per chunk.
///
/// The proxy is protocol-agnostic: chunks carry no framing guarantee and
/// are forwarded as observed.
struct ChunkDecoder {
    max_chunk: usize,
}

impl Decoder for ChunkDecoder {
    type Item = Bytes;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> std::io::Result<Option<Bytes>> {
        if src.is_empty() {
            return Ok(None);
        }

        let len = src.len().min(self.max_chunk);

        Ok(Some(src.split_to(len).freeze()))
    }
}

/// Readable socket as a stream of chunks, with EOF made visible.
///
/// A bare exhausted stream would be dropped silently by the multiplexer,
/// leaving the channel half-open forever. This wrapper turns end-of-stream
/// into one final error item so the serve loop can tear the channel down.
struct SocketSource {
    inner: FramedRead<OwnedReadHalf, ChunkDecoder>,
    eof_seen: bool,
}

impl SocketSource {
    fn new(socket: OwnedReadHalf, max_chunk: usize) -> Self {
        Self {
            inner: FramedRead::new(socket, ChunkDecoder { max_chunk }),
            eof_seen: false,
        }
    }
}

impl Stream for SocketSource {
    type Item = std::io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.eof_seen {
            return Poll::Ready(None);
        }

        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(None) => {
                self.eof_seen = true;
                Poll::Ready(Some(Err(std::io::ErrorKind::UnexpectedEof.into())))
            }
            poll => poll,
        }
    }
}

/// One unit of work drained from the event sources.
enum Step {
    Accept(std::io::Result<(TcpStream, SocketAddr)>),
    Socket(SocketKey, std::io::Result<Bytes>),
}

/// Single-threaded, cooperatively multiplexed proxy event loop.
///
/// Listens for clients, opens one upstream connection per accepted client,
/// and forwards chunks between the two legs of every channel, invoking the
/// interception pipeline around each forwarded chunk. All per-channel
/// failures are contained: a broken socket closes its channel and nothing
/// else.
pub struct ProxyLoop<H> {
    listener: TcpListener,
    upstream_addr: SocketAddr,
    hooks: H,
    channels: HashMap<ChannelId, Channel>,
    sources: StreamMap<SocketKey, SocketSource>,
    buffer_size: usize,
    next_channel: ChannelId,
    running: bool,
}

impl<H: ProxyHooks> ProxyLoop<H> {
    /// Creates a proxy forwarding between `listener` and `upstream_addr`.
    ///
    /// `buffer_size` caps the size of a forwarded chunk.
    pub fn new(listener: TcpListener, upstream_addr: SocketAddr, hooks: H, buffer_size: usize) -> Self {
        Self {
            listener,
            upstream_addr,
            hooks,
            channels: HashMap::new(),
            sources: StreamMap::new(),
            buffer_size: buffer_size.max(1),
            next_channel: 0,
            running: false,
        }
    }

    /// Local address the proxy is listening on.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the event loop until [stop](Self::stop) or until the
    /// interception pipeline reports completion.
    ///
    /// With a `timeout`, the loop also wakes up periodically while idle to
    /// re-check the termination conditions.
    pub async fn serve(&mut self, timeout: Option<Duration>) {
        self.running = true;
        tracing::info!(upstream = %self.upstream_addr, "proxy serving");

        while self.running && !self.hooks.is_done() {
            let step = match timeout {
                Some(timeout) => {
                    match tokio::time::timeout(timeout, Self::next_step(&mut self.listener, &mut self.sources)).await {
                        Ok(step) => step,
                        Err(_) => continue,
                    }
                }
                None => Self::next_step(&mut self.listener, &mut self.sources).await,
            };

            match step {
                Step::Accept(Ok((downstream, peer))) => self.open_channel(downstream, peer).await,
                Step::Accept(Err(e)) => tracing::warn!(error = %e, "accept failed"),
                Step::Socket(key, Ok(data)) => self.forward(key, data).await,
                Step::Socket(key, Err(e)) => {
                    if e.kind() == std::io::ErrorKind::UnexpectedEof {
                        tracing::info!(channel = key.channel, leg = ?key.leg, "socket closed");
                    } else {
                        tracing::warn!(channel = key.channel, leg = ?key.leg, error = %e, "read failed");
                    }

                    self.close_channel(key.channel);
                }
            }
        }

        self.running = false;
        self.channels.clear();
        self.sources.clear();

        tracing::info!("proxy stopped");
    }

    /// Requests the event loop to terminate.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Number of currently open channels.
    pub fn open_channels(&self) -> usize {
        self.channels.len()
    }

    async fn next_step(
        listener: &mut TcpListener,
        sources: &mut StreamMap<SocketKey, SocketSource>,
    ) -> Step {
        tokio::select! {
            conn = listener.accept() => Step::Accept(conn),
            Some((key, item)) = sources.next() => Step::Socket(key, item),
        }
    }

    async fn open_channel(&mut self, downstream: TcpStream, peer: SocketAddr) {
        let upstream = match TcpStream::connect(self.upstream_addr).await {
            Ok(upstream) => upstream,
            Err(e) => {
                // the client socket is dropped with the failed attempt, so
                // the client observes a close rather than a stalled channel
                tracing::error!(
                    %peer,
                    upstream = %self.upstream_addr,
                    error = %e,
                    "upstream connection failed; dropping client"
                );
                return;
            }
        };

        let channel = self.next_channel;
        self.next_channel += 1;

        let (down_read, down_write) = downstream.into_split();
        let (up_read, up_write) = upstream.into_split();

        self.channels.insert(
            channel,
            Channel {
                downstream: down_write,
                upstream: up_write,
            },
        );
        self.sources.insert(
            SocketKey { channel, leg: Leg::Downstream },
            SocketSource::new(down_read, self.buffer_size),
        );
        self.sources.insert(
            SocketKey { channel, leg: Leg::Upstream },
            SocketSource::new(up_read, self.buffer_size),
        );

        tracing::info!(channel, %peer, "channel open");
    }

    async fn forward(&mut self, key: SocketKey, data: Bytes) {
        let channel = key.channel;

        let data = match key.leg {
            Leg::Downstream => self.hooks.pre_upstream_send(channel, data),
            Leg::Upstream => self.hooks.pre_downstream_send(channel, data),
        };

        let written = {
            // a racing teardown may have removed the channel already
            let Some(ends) = self.channels.get_mut(&channel) else {
                return;
            };

            let dest = match key.leg {
                Leg::Downstream => &mut ends.upstream,
                Leg::Upstream => &mut ends.downstream,
            };

            dest.write_all(&data).await
        };

        if let Err(e) = written {
            tracing::warn!(channel, leg = ?key.leg, error = %e, "write failed");
            self.close_channel(channel);
            return;
        }

        let keep = match key.leg {
            Leg::Downstream => self.hooks.post_upstream_send(channel, &data),
            Leg::Upstream => self.hooks.post_downstream_send(channel, &data),
        };

        if !keep {
            tracing::warn!(channel, "channel torn down after interception");
            self.close_channel(channel);
        }
    }

    fn close_channel(&mut self, channel: ChannelId) {
        self.channels.remove(&channel);
        self.sources.remove(&SocketKey { channel, leg: Leg::Downstream });
        self.sources.remove(&SocketKey { channel, leg: Leg::Upstream });
    }
}
