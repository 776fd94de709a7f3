use std::time::Duration;

use faultline_proxy::CorrelatorConfig;

/// Configuration of a proxy run.
#[derive(Debug, PartialEq, knus::Decode)]
pub struct ProxyConfig {
    /// Maximum number of retained streams.
    #[knus(child, default = 10, unwrap(argument))]
    pub max_streams: usize,

    /// Maximum number of retained packets per stream.
    #[knus(child, default = 10, unwrap(argument))]
    pub max_pkts_per_stream: usize,

    /// Crash-detection window after each upstream send, in milliseconds.
    #[knus(child, default = 100, unwrap(argument))]
    pub crash_timeout_ms: u64,

    /// Delay before respawning a crashed target, in milliseconds.
    ///
    /// When omitted, a dead target is not restarted and the proxy shuts
    /// down instead.
    #[knus(child, unwrap(argument))]
    pub restart_delay_ms: Option<u64>,

    /// Maximum size of a forwarded chunk, in bytes.
    #[knus(child, default = 4096, unwrap(argument))]
    pub buffer_size: usize,

    /// Idle wake-up interval of the serve loop, in milliseconds.
    #[knus(child, default = 500, unwrap(argument))]
    pub serve_timeout_ms: u64,

    /// Directory crash reports are written to.
    #[knus(child, default = "crashes".to_owned(), unwrap(argument))]
    pub crash_folder: String,
}

impl ProxyConfig {
    /// Correlator tunables derived from this configuration.
    pub fn correlator_config(&self) -> CorrelatorConfig {
        CorrelatorConfig {
            max_streams: self.max_streams,
            max_pkts_per_stream: self.max_pkts_per_stream,
            crash_timeout: Duration::from_millis(self.crash_timeout_ms),
            restart_delay: self.restart_delay_ms.map(Duration::from_millis),
        }
    }

    /// Idle wake-up interval of the serve loop.
    pub fn serve_timeout(&self) -> Duration {
        Duration::from_millis(self.serve_timeout_ms)
    }
}
