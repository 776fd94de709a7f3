//! This crate implements the network side of `faultline`: a transparent
//! intercepting proxy that forwards traffic between fuzzing clients and the
//! target server while correlating observed crashes with the most recent
//! network input.
//!
//! Main components:
//! - [ProxyLoop](self::proxy::ProxyLoop) — the single-threaded, cooperatively
//!   multiplexed event loop forwarding bytes between channel legs.
//! - [ProxyHooks](self::hooks::ProxyHooks) — the pre/post-send interception
//!   pipeline sitting between the loop and crash correlation.
//! - [StreamStore](self::stream::StreamStore) — bounded, recency-ordered
//!   per-channel packet histories.
//! - [CrashCorrelator](self::correlator::CrashCorrelator) /
//!   [FaultMonitor](self::correlator::FaultMonitor) — the two halves of the
//!   crash-correlation pipeline, linked by a thread-safe crash-report queue.

mod error;

/// Module implementing the crash-correlation pipeline.
pub mod correlator;

/// Module containing the interception pipeline trait.
pub mod hooks;

/// Module implementing the proxy event loop.
pub mod proxy;

/// Module implementing packet stream bookkeeping.
pub mod stream;

pub use self::correlator::{CorrelatorConfig, CrashCorrelator, FaultMonitor, prepare_crash_dir};
pub use self::error::{MonitorError, ReportError};
pub use self::hooks::{NoopHooks, ProxyHooks};
pub use self::proxy::ProxyLoop;
pub use self::stream::{ChannelId, PacketStream, StreamStore};
