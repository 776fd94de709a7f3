use bytes::Bytes;

use crate::stream::ChannelId;

/// Interception pipeline between the proxy loop and crash correlation.
///
/// The proxy invokes the matching pre/post pair around every forwarded
/// packet. All methods are optional: the defaults forward data unchanged
/// and assume the target is alive.
pub trait ProxyHooks {
    /// Whether the pipeline wants the serve loop to terminate.
    fn is_done(&self) -> bool {
        false
    }

    /// Observes (and may transform) data about to be sent to the server.
    fn pre_upstream_send(&mut self, _channel: ChannelId, data: Bytes) -> Bytes {
        data
    }

    /// Called right after data was sent to the server.
    ///
    /// Returning `false` signals the proxy to tear the channel down.
    fn post_upstream_send(&mut self, _channel: ChannelId, _data: &Bytes) -> bool {
        true
    }

    /// Observes (and may transform) data about to be sent back to the client.
    fn pre_downstream_send(&mut self, _channel: ChannelId, data: Bytes) -> Bytes {
        data
    }

    /// Called right after data was sent back to the client.
    ///
    /// Returning `false` signals the proxy to tear the channel down.
    fn post_downstream_send(&mut self, _channel: ChannelId, _data: &Bytes) -> bool {
        true
    }
}

/// Pipeline that forwards all traffic unchanged and never reports the
/// target dead.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl ProxyHooks for NoopHooks {}
