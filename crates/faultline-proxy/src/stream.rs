use std::collections::VecDeque;

use bytes::Bytes;
use indexmap::IndexMap;

/// Identifier of one proxied connection.
pub type ChannelId = u64;

/// Bounded, ordered record of the packets sent toward the upstream server
/// for one channel.
///
/// When full, the oldest packet is evicted before a new one is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketStream {
    packets: VecDeque<Bytes>,
    capacity: usize,
}

impl PacketStream {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);

        Self {
            packets: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, packet: Bytes) {
        if self.packets.len() == self.capacity {
            self.packets.pop_front();
        }

        self.packets.push_back(packet);
    }

    /// Iterates over the retained packets, oldest first.
    pub fn packets(&self) -> impl Iterator<Item = &Bytes> {
        self.packets.iter()
    }

    /// Number of retained packets.
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Whether no packet is retained.
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

/// Bounded, recency-ordered collection of per-channel packet streams.
///
/// Recording into a stream re-marks it as the most-recently-active entry;
/// when the store is full, the least-recently-active entry is evicted. The
/// recency ordering is what makes "history minus the crashing stream"
/// meaningful: the crashing stream is always the most recent to have
/// activity at report time.
#[derive(Debug)]
pub struct StreamStore {
    streams: IndexMap<ChannelId, PacketStream>,
    max_streams: usize,
    max_pkts_per_stream: usize,
}

impl StreamStore {
    /// Creates a store bounded to `max_streams` entries of
    /// `max_pkts_per_stream` packets each.
    pub fn new(max_streams: usize, max_pkts_per_stream: usize) -> Self {
        Self {
            streams: IndexMap::new(),
            max_streams: max_streams.max(1),
            max_pkts_per_stream,
        }
    }

    /// Appends a packet to the stream of the given channel, creating the
    /// stream first if the channel is unseen, and re-marks the stream as
    /// most-recently-active.
    pub fn record(&mut self, channel: ChannelId, packet: Bytes) -> &PacketStream {
        let index = match self.streams.get_index_of(&channel) {
            Some(index) => {
                let last = self.streams.len() - 1;
                self.streams.move_index(index, last);
                last
            }
            None => {
                if self.streams.len() >= self.max_streams {
                    self.streams.shift_remove_index(0);
                }

                self.streams
                    .insert_full(channel, PacketStream::new(self.max_pkts_per_stream))
                    .0
            }
        };

        let Some((_, stream)) = self.streams.get_index_mut(index) else {
            unreachable!("stream was just inserted or moved");
        };

        stream.push(packet);

        &*stream
    }

    /// Whether a stream exists for the given channel.
    pub fn contains(&self, channel: ChannelId) -> bool {
        self.streams.contains_key(&channel)
    }

    /// Returns the stream of the given channel.
    pub fn stream(&self, channel: ChannelId) -> Option<&PacketStream> {
        self.streams.get(&channel)
    }

    /// Iterates over every retained stream except the most-recently-active
    /// one, least-recently-active first.
    pub fn history_excluding_latest(&self) -> impl Iterator<Item = &PacketStream> {
        let keep = self.streams.len().saturating_sub(1);
        self.streams.values().take(keep)
    }

    /// Number of retained streams.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Whether no stream is retained.
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use bytes::Bytes;

    use super::StreamStore;

    fn pkt(b: u8) -> Bytes {
        Bytes::copy_from_slice(&[b])
    }

    #[test]
    fn stream_retains_only_the_last_packets() {
        let mut store = StreamStore::new(4, 10);

        // scenario: 12 packets through one channel, capacity 10
        for i in 0..12u8 {
            store.record(7, pkt(i));
        }

        let stream = store.stream(7).unwrap();
        assert_eq!(stream.len(), 10);

        let retained: Vec<u8> = stream.packets().map(|p| p[0]).collect();
        assert_eq!(retained, (2..12).collect::<Vec<u8>>());
    }

    #[test]
    fn store_never_exceeds_max_streams() {
        let mut store = StreamStore::new(3, 2);

        for channel in 0..10 {
            store.record(channel, pkt(channel as u8));
            assert!(store.len() <= 3);
        }

        // least-recently-active streams were evicted
        assert!(!store.contains(6));
        assert!(store.contains(7) && store.contains(8) && store.contains(9));
    }

    #[test]
    fn record_marks_stream_most_recently_active() {
        let mut store = StreamStore::new(3, 2);

        store.record(1, pkt(1));
        store.record(2, pkt(2));
        store.record(3, pkt(3));

        // touch the oldest stream again
        store.record(1, pkt(11));

        let history: Vec<u64> = {
            let mut keys = Vec::new();
            for stream in store.history_excluding_latest() {
                keys.push(stream.packets().next().unwrap()[0] as u64);
            }
            keys
        };

        // stream 1 is now the most recent, so history holds 2 and 3 only
        assert_eq!(history, [2, 3]);

        // a fourth stream now evicts stream 2, not stream 1
        store.record(4, pkt(4));
        assert!(store.contains(1));
        assert!(!store.contains(2));
    }

    #[test]
    fn history_is_empty_with_a_single_stream() {
        let mut store = StreamStore::new(3, 2);
        store.record(1, pkt(1));

        assert_eq!(store.history_excluding_latest().count(), 0);
    }

    #[test]
    fn record_returns_the_updated_stream() {
        let mut store = StreamStore::new(2, 4);

        store.record(1, pkt(1));
        let stream = store.record(1, pkt(2));

        assert_eq!(stream.len(), 2);
    }
}
