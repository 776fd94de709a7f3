#![allow(clippy::unwrap_used)]
#![allow(missing_docs)]

use std::fs::File;
use std::time::Duration;

use bytes::Bytes;
use indexmap::IndexMap;

use faultline_monitor::handler::EventHandler;
use faultline_monitor::session::DebugSession;
use faultline_monitor::tracer::{ExitStatus, Frame, TraceEvent, TracedProcess, Tracer};
use faultline_monitor::CrashReport;
use faultline_proxy::{CorrelatorConfig, CrashCorrelator, ProxyHooks, prepare_crash_dir};

#[derive(thiserror::Error, Debug)]
#[error("mock tracer error")]
struct MockError;

struct MockProcess {
    id: u64,
    attached: bool,
}

impl TracedProcess for MockProcess {
    type Error = MockError;

    fn id(&self) -> u64 {
        self.id
    }

    fn is_attached(&self) -> bool {
        self.attached
    }

    fn resume(&mut self, _signal: Option<i32>) -> Result<(), Self::Error> {
        Ok(())
    }

    fn detach(&mut self) -> Result<(), Self::Error> {
        self.attached = false;
        Ok(())
    }

    fn registers(&mut self) -> Result<IndexMap<String, u64>, Self::Error> {
        Ok(IndexMap::from([("rip".to_owned(), 0xdead_beef_u64)]))
    }

    fn stack(&mut self, _max_words: usize) -> Result<Vec<(u64, u64)>, Self::Error> {
        Ok(vec![(0x7ffc_0000, 0x1)])
    }

    fn backtrace(&mut self, _max_depth: usize) -> Result<Vec<Frame>, Self::Error> {
        Ok(vec![
            Frame {
                instr_addr: 0xdead_beef,
                symbol: Some("parse_input".to_owned()),
            },
            Frame {
                instr_addr: 0x40_1000,
                symbol: None,
            },
        ])
    }

    fn disassembly(&mut self, _max_instrs: usize) -> Result<Vec<(u64, String)>, Self::Error> {
        Ok(vec![(0xdead_beef, "ud2".to_owned())])
    }

    fn memory_maps(&self) -> Result<Vec<String>, Self::Error> {
        Ok(vec!["00400000-00452000 r-xp".to_owned()])
    }
}

#[derive(Default)]
struct MockTracer {
    next_id: u64,
    spawned: usize,
}

impl Tracer for MockTracer {
    type Process = MockProcess;
    type Error = MockError;

    fn spawn(&mut self) -> Result<Self::Process, Self::Error> {
        self.next_id += 1;
        self.spawned += 1;

        Ok(MockProcess {
            id: 1000 + self.next_id,
            attached: true,
        })
    }

    fn wait_event(&mut self) -> Result<TraceEvent, Self::Error> {
        Err(MockError)
    }
}

fn pair(
    crash_timeout: Duration,
    restart_delay: Option<Duration>,
    dir: &tempfile::TempDir,
) -> (CrashCorrelator, faultline_proxy::FaultMonitor) {
    let crash_dir = prepare_crash_dir(dir.path().join("crashes")).unwrap();

    let config = CorrelatorConfig {
        crash_timeout,
        restart_delay,
        ..Default::default()
    };

    CrashCorrelator::new(config, crash_dir)
}

#[test_log::test]
fn fault_within_the_window_yields_a_report_and_closes_the_channel() {
    let dir = tempfile::tempdir().unwrap();
    let (mut correlator, mut monitor) = pair(Duration::from_millis(200), None, &dir);

    let mut session = DebugSession::new(MockTracer::default());
    let pid = session.spawn_traced_process().unwrap();

    let data = correlator.pre_upstream_send(1, Bytes::from_static(b"\xde\xad"));

    // a fault is observed on the debug side before the post-send check
    monitor.signal(&mut session, pid, nix::libc::SIGSEGV).unwrap();

    assert!(!correlator.post_upstream_send(1, &data), "channel should be closed");

    let path = dir.path().join("crashes").join(format!("{pid}.json"));
    let report = CrashReport::from_reader(File::open(path).unwrap()).unwrap();

    assert_eq!(report.pid, pid);
    assert_eq!(report.signal, "SIGSEGV");
    assert_eq!(report.stream_count, 1);
    assert_eq!(report.stream, ["dead"]);
    assert!(report.history.is_empty());
    assert_eq!(report.registers.get("rip").map(String::as_str), Some("0xdeadbeef"));
    assert_eq!(report.backtrace[0].symbol, "parse_input");
    assert_eq!(report.backtrace[1].symbol, "??");
    assert_eq!(report.disassembly.get("0xdeadbeef").map(String::as_str), Some("ud2"));
    assert_eq!(report.stack.get("0x7ffc0000").map(String::as_str), Some("0x1"));
    assert_eq!(report.maps, ["00400000-00452000 r-xp"]);
}

#[test_log::test]
fn report_history_carries_the_other_retained_streams() {
    let dir = tempfile::tempdir().unwrap();
    let (mut correlator, mut monitor) = pair(Duration::from_millis(200), None, &dir);

    let mut session = DebugSession::new(MockTracer::default());
    let pid = session.spawn_traced_process().unwrap();

    correlator.pre_upstream_send(1, Bytes::from_static(b"\x01"));
    let data = correlator.pre_upstream_send(2, Bytes::from_static(b"\x02"));

    monitor.signal(&mut session, pid, nix::libc::SIGABRT).unwrap();
    assert!(!correlator.post_upstream_send(2, &data));

    let path = dir.path().join("crashes").join(format!("{pid}.json"));
    let report = CrashReport::from_reader(File::open(path).unwrap()).unwrap();

    assert_eq!(report.signal, "SIGABRT");
    assert_eq!(report.stream_count, 2);
    assert_eq!(report.stream, ["02"]);
    assert_eq!(report.history, [["01"]]);
}

#[test_log::test]
fn quiet_window_keeps_the_channel_open() {
    let dir = tempfile::tempdir().unwrap();
    let (mut correlator, mut monitor) = pair(Duration::from_millis(20), None, &dir);

    let mut session = DebugSession::new(MockTracer::default());
    let pid = session.spawn_traced_process().unwrap();

    let data = correlator.pre_upstream_send(1, Bytes::from_static(b"ok"));

    // a non-fault stop must not produce a report
    monitor.signal(&mut session, pid, nix::libc::SIGCHLD).unwrap();

    assert!(correlator.post_upstream_send(1, &data));
    assert!(!correlator.is_done());
    assert!(std::fs::read_dir(dir.path().join("crashes")).unwrap().next().is_none());
}

#[test_log::test]
fn exit_without_restart_stops_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let (correlator, mut monitor) = pair(Duration::from_millis(20), None, &dir);

    let mut session = DebugSession::new(MockTracer::default());
    let pid = session.spawn_traced_process().unwrap();

    monitor.exited(&mut session, pid, ExitStatus::Code(0)).unwrap();

    assert_eq!(session.tracked_processes(), 0);
    assert!(correlator.is_done());
}

#[test_log::test]
fn exit_with_restart_respawns_the_target() {
    let dir = tempfile::tempdir().unwrap();
    let (correlator, mut monitor) =
        pair(Duration::from_millis(20), Some(Duration::from_millis(1)), &dir);

    let mut session = DebugSession::new(MockTracer::default());
    let pid = session.spawn_traced_process().unwrap();

    monitor
        .exited(&mut session, pid, ExitStatus::Signal(nix::libc::SIGSEGV))
        .unwrap();

    assert!(!correlator.is_done());
    assert!(session.process_mut(pid + 1).is_some(), "a fresh target should be traced");
}

#[test_log::test]
fn lost_debug_thread_shuts_the_proxy_down() {
    let dir = tempfile::tempdir().unwrap();
    let (mut correlator, monitor) = pair(Duration::from_millis(20), None, &dir);
    drop(monitor);

    let data = correlator.pre_upstream_send(1, Bytes::from_static(b"x"));

    assert!(correlator.post_upstream_send(1, &data));
    assert!(correlator.is_done());
}
