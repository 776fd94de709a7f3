use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use faultline_monitor::handler::EventHandler;
use faultline_monitor::session::DebugSession;
use faultline_monitor::tracer::{ExitStatus, TracedProcess, Tracer};
use faultline_monitor::{BacktraceFrame, CrashReport, FaultSignal};

use crate::error::{MonitorError, ReportError};
use crate::hooks::ProxyHooks;
use crate::stream::{ChannelId, PacketStream, StreamStore};

/// Stack words captured into a crash report.
const STACK_WORDS: usize = 32;

/// Backtrace frames captured into a crash report.
const BACKTRACE_DEPTH: usize = 20;

/// Instructions disassembled around the fault location.
const DISASM_INSTRS: usize = 16;

/// Tunables of the crash-correlation pipeline.
#[derive(Debug, Clone)]
pub struct CorrelatorConfig {
    /// Maximum number of retained streams.
    pub max_streams: usize,

    /// Maximum number of retained packets per stream.
    pub max_pkts_per_stream: usize,

    /// How long a forwarding step waits for crash forensics to surface.
    pub crash_timeout: Duration,

    /// Delay before respawning a crashed target; `None` means do not
    /// restart and shut the session down instead.
    pub restart_delay: Option<Duration>,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            max_streams: 10,
            max_pkts_per_stream: 10,
            crash_timeout: Duration::from_millis(100),
            restart_delay: None,
        }
    }
}

/// Creates the crash-report directory.
///
/// Must be called (once) before building the correlator pair; directory
/// creation is an explicit setup step, not a constructor side effect.
pub fn prepare_crash_dir(path: impl AsRef<Path>) -> std::io::Result<PathBuf> {
    let path = path.as_ref();
    std::fs::create_dir_all(path)?;
    Ok(path.to_path_buf())
}

/// Proxy-thread half of the crash-correlation pipeline.
///
/// Owns the stream store and the consuming end of the crash queue; the
/// [FaultMonitor] half runs on the debug thread and feeds the queue.
pub struct CrashCorrelator {
    store: StreamStore,
    stream_count: Arc<AtomicU64>,
    crash_rx: Receiver<CrashReport>,
    crash_dir: PathBuf,
    crash_timeout: Duration,
    done: Arc<AtomicBool>,
}

impl CrashCorrelator {
    /// Creates the two linked halves of the pipeline.
    ///
    /// `crash_dir` must already exist (see [prepare_crash_dir]).
    pub fn new(config: CorrelatorConfig, crash_dir: PathBuf) -> (Self, FaultMonitor) {
        let (crash_tx, crash_rx) = channel();
        let stream_count = Arc::new(AtomicU64::new(0));
        let done = Arc::new(AtomicBool::new(false));

        let session_id = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| format!("{:x}", d.as_nanos()))
            .unwrap_or_default();

        tracing::info!(session_id, "crash correlator ready");

        let correlator = Self {
            store: StreamStore::new(config.max_streams, config.max_pkts_per_stream),
            stream_count: stream_count.clone(),
            crash_rx,
            crash_dir,
            crash_timeout: config.crash_timeout,
            done: done.clone(),
        };

        let monitor = FaultMonitor {
            session_id,
            crash_tx,
            stream_count,
            restart_delay: config.restart_delay,
            done,
        };

        (correlator, monitor)
    }

    fn persist(&self, report: &CrashReport) -> Result<PathBuf, ReportError> {
        let path = self.crash_dir.join(report.file_name());

        let file = File::create(&path).map_err(|e| ReportError::File(path.clone(), e))?;
        report.to_writer(file)?;

        Ok(path)
    }
}

impl ProxyHooks for CrashCorrelator {
    fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    fn pre_upstream_send(&mut self, channel: ChannelId, data: Bytes) -> Bytes {
        // the counter only advances when a previously-unseen channel opens
        // a new logical stream
        if !self.store.contains(channel) {
            self.stream_count.fetch_add(1, Ordering::SeqCst);
        }

        self.store.record(channel, data.clone());

        data
    }

    fn post_upstream_send(&mut self, channel: ChannelId, _data: &Bytes) -> bool {
        match self.crash_rx.recv_timeout(self.crash_timeout) {
            Ok(mut report) => {
                // correlation is temporal, not causal: the crash surfaced
                // within the window after this send
                report.stream = self.store.stream(channel).map(hex_packets).unwrap_or_default();
                report.history = self.store.history_excluding_latest().map(hex_packets).collect();

                match self.persist(&report) {
                    Ok(path) => {
                        tracing::warn!(
                            pid = report.pid,
                            signal = report.signal,
                            path = %path.display(),
                            "crash report written"
                        );
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to persist crash report; shutting down");
                        self.done.store(true, Ordering::SeqCst);
                    }
                }

                false
            }
            Err(RecvTimeoutError::Timeout) => true,
            Err(RecvTimeoutError::Disconnected) => {
                tracing::error!("fault monitor is gone; shutting down");
                self.done.store(true, Ordering::SeqCst);
                true
            }
        }
    }
}

fn hex_packets(stream: &PacketStream) -> Vec<String> {
    stream.packets().map(hex::encode).collect()
}

/// Debug-thread half of the crash-correlation pipeline.
///
/// Classifies delivered signals, gathers best-effort forensics from the
/// stopped process, and posts fully-populated crash reports to the queue.
/// It never touches proxy-thread state.
pub struct FaultMonitor {
    session_id: String,
    crash_tx: Sender<CrashReport>,
    stream_count: Arc<AtomicU64>,
    restart_delay: Option<Duration>,
    done: Arc<AtomicBool>,
}

impl FaultMonitor {
    fn build_report<P: TracedProcess>(
        &self,
        process: &mut P,
        process_id: u64,
        fault: FaultSignal,
    ) -> CrashReport {
        let mut report = CrashReport::new(
            self.session_id.clone(),
            process_id,
            fault,
            self.stream_count.load(Ordering::SeqCst),
        );

        // every accessor is independently best-effort: a partial report is
        // always preferable to no report
        match process.registers() {
            Ok(registers) => {
                report.registers = registers
                    .into_iter()
                    .map(|(name, value)| (name, format!("{value:#x}")))
                    .collect();
            }
            Err(e) => tracing::warn!(error = %e, "registers unavailable"),
        }

        match process.stack(STACK_WORDS) {
            Ok(words) => {
                report.stack = words
                    .into_iter()
                    .map(|(addr, value)| (format!("{addr:#x}"), format!("{value:#x}")))
                    .collect();
            }
            Err(e) => tracing::warn!(error = %e, "stack unavailable"),
        }

        match process.backtrace(BACKTRACE_DEPTH) {
            Ok(frames) => {
                report.backtrace = frames
                    .into_iter()
                    .map(|frame| {
                        let frame_record = BacktraceFrame {
                            symbol: frame.symbol.unwrap_or_else(|| "??".to_owned()),
                            arguments: Vec::new(),
                        };

                        (format!("{:#x}", frame.instr_addr), frame_record)
                    })
                    .collect();
            }
            Err(e) => tracing::warn!(error = %e, "backtrace unavailable"),
        }

        match process.disassembly(DISASM_INSTRS) {
            Ok(listing) => {
                report.disassembly = listing
                    .into_iter()
                    .map(|(addr, text)| (format!("{addr:#x}"), text))
                    .collect();
            }
            Err(e) => tracing::warn!(error = %e, "disassembly unavailable"),
        }

        match process.memory_maps() {
            Ok(maps) => report.maps = maps,
            Err(e) => tracing::warn!(error = %e, "memory maps unavailable"),
        }

        report
    }
}

impl<T: Tracer> EventHandler<T> for FaultMonitor {
    type Error = MonitorError<T::Error>;

    fn signal(
        &mut self,
        session: &mut DebugSession<T>,
        process_id: u64,
        signal: i32,
    ) -> Result<(), Self::Error> {
        if let Some(fault) = FaultSignal::from_raw(signal) {
            tracing::warn!(process_id, signal = fault.name(), "fault signal observed");

            if let Some(process) = session.process_mut(process_id) {
                let report = self.build_report(process, process_id, fault);
                self.crash_tx.send(report).map_err(|_| MonitorError::QueueClosed)?;
            }
        } else {
            tracing::debug!(process_id, signal, "non-fault signal delivered");
        }

        // resume with the original signal so the OS default disposition
        // (coredump/termination) proceeds
        session.resume(process_id, Some(signal))?;

        Ok(())
    }

    fn lifecycle(
        &mut self,
        session: &mut DebugSession<T>,
        process_id: u64,
        event: i32,
    ) -> Result<(), Self::Error> {
        tracing::debug!(process_id, event, "lifecycle event");
        session.resume(process_id, None)?;
        Ok(())
    }

    fn exited(
        &mut self,
        session: &mut DebugSession<T>,
        process_id: u64,
        status: ExitStatus,
    ) -> Result<(), Self::Error> {
        tracing::info!(process_id, ?status, "traced process exited");

        match self.restart_delay {
            Some(delay) => {
                std::thread::sleep(delay);
                session.spawn_traced_process()?;
            }
            None => {
                session.stop();
                self.done.store(true, Ordering::SeqCst);
            }
        }

        Ok(())
    }
}
