// Once clippy takes `clippy.toml` into account (for `tests` targets),
// we can remove these.
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(missing_docs)]

use std::collections::VecDeque;

use indexmap::IndexMap;

use faultline_monitor::DebugSession;
use faultline_monitor::SessionError;
use faultline_monitor::handler::EventHandler;
use faultline_monitor::tracer::{ExitStatus, Frame, TraceEvent, TracedProcess, Tracer};

#[derive(Debug, thiserror::Error)]
#[error("mock: {0}")]
struct MockError(String);

struct MockProcess {
    id: u64,
    attached: bool,
    resumed_with: Vec<Option<i32>>,
}

impl TracedProcess for MockProcess {
    type Error = MockError;

    fn id(&self) -> u64 {
        self.id
    }

    fn is_attached(&self) -> bool {
        self.attached
    }

    fn resume(&mut self, signal: Option<i32>) -> Result<(), Self::Error> {
        self.resumed_with.push(signal);
        Ok(())
    }

    fn detach(&mut self) -> Result<(), Self::Error> {
        self.attached = false;
        Ok(())
    }

    fn registers(&mut self) -> Result<IndexMap<String, u64>, Self::Error> {
        Ok(IndexMap::from([("pc".to_owned(), 0xdead_beef)]))
    }

    fn stack(&mut self, _max_words: usize) -> Result<Vec<(u64, u64)>, Self::Error> {
        Err(MockError("no stack access".to_owned()))
    }

    fn backtrace(&mut self, _max_depth: usize) -> Result<Vec<Frame>, Self::Error> {
        Ok(vec![Frame { instr_addr: 0xdead_beef, symbol: None }])
    }

    fn disassembly(&mut self, _max_instrs: usize) -> Result<Vec<(u64, String)>, Self::Error> {
        Err(MockError("no code access".to_owned()))
    }

    fn memory_maps(&self) -> Result<Vec<String>, Self::Error> {
        Ok(vec![])
    }
}

#[derive(Default)]
struct MockTracer {
    events: VecDeque<TraceEvent>,
    next_id: u64,
}

impl MockTracer {
    fn with_events(events: impl IntoIterator<Item = TraceEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
            next_id: 0,
        }
    }
}

impl Tracer for MockTracer {
    type Process = MockProcess;
    type Error = MockError;

    fn spawn(&mut self) -> Result<Self::Process, Self::Error> {
        self.next_id += 1;
        Ok(MockProcess {
            id: self.next_id,
            attached: true,
            resumed_with: Vec::new(),
        })
    }

    fn wait_event(&mut self) -> Result<TraceEvent, Self::Error> {
        self.events
            .pop_front()
            .ok_or_else(|| MockError("event script exhausted".to_owned()))
    }
}

#[derive(Default)]
struct RecordingHandler {
    seen: Vec<String>,
    stop_on_signal: bool,
}

impl EventHandler<MockTracer> for RecordingHandler {
    type Error = MockError;

    fn signal(
        &mut self,
        session: &mut DebugSession<MockTracer>,
        process_id: u64,
        signal: i32,
    ) -> Result<(), Self::Error> {
        self.seen.push(format!("signal:{process_id}:{signal}"));

        if self.stop_on_signal {
            session.stop();
            return Ok(());
        }

        session
            .resume(process_id, Some(signal))
            .map_err(|e| MockError(e.to_string()))
    }

    fn exited(
        &mut self,
        _session: &mut DebugSession<MockTracer>,
        process_id: u64,
        status: ExitStatus,
    ) -> Result<(), Self::Error> {
        self.seen.push(format!("exit:{process_id}:{status:?}"));
        Ok(())
    }
}

#[test]
fn watch_dispatches_and_terminates_when_no_process_remains() {
    let tracer = MockTracer::with_events([
        TraceEvent::Signal { process_id: 1, signal: 11 },
        TraceEvent::Exit { process_id: 1, status: ExitStatus::Code(0) },
    ]);

    let mut session = DebugSession::new(tracer);
    let pid = session.spawn_traced_process().expect("spawn");
    assert_eq!(pid, 1);
    assert_eq!(session.tracked_processes(), 1);

    let mut handler = RecordingHandler::default();
    session.watch(&mut handler).expect("watch");

    assert_eq!(handler.seen, ["signal:1:11", "exit:1:Code(0)"]);
    assert!(!session.is_running());
    assert_eq!(session.tracked_processes(), 0);
}

#[test]
fn watch_stops_when_handler_stops_the_session() {
    let tracer = MockTracer::with_events([
        TraceEvent::Signal { process_id: 1, signal: 6 },
        // never reached: the handler stops the session on the first event
        TraceEvent::Signal { process_id: 1, signal: 6 },
    ]);

    let mut session = DebugSession::new(tracer);
    session.spawn_traced_process().expect("spawn");

    let mut handler = RecordingHandler { stop_on_signal: true, ..Default::default() };
    session.watch(&mut handler).expect("watch");

    assert_eq!(handler.seen, ["signal:1:6"]);
    assert!(!session.is_running());
    assert_eq!(session.tracked_processes(), 0);
}

#[test]
fn watch_removes_processes_that_detached_during_dispatch() {
    struct DetachingHandler;

    impl EventHandler<MockTracer> for DetachingHandler {
        type Error = MockError;

        fn signal(
            &mut self,
            session: &mut DebugSession<MockTracer>,
            process_id: u64,
            _signal: i32,
        ) -> Result<(), Self::Error> {
            let process = session.process_mut(process_id).expect("tracked");
            process.detach().map_err(|e| MockError(e.to_string()))
        }

        fn exited(
            &mut self,
            _session: &mut DebugSession<MockTracer>,
            _process_id: u64,
            _status: ExitStatus,
        ) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    let tracer = MockTracer::with_events([TraceEvent::Signal { process_id: 1, signal: 2 }]);

    let mut session = DebugSession::new(tracer);
    session.spawn_traced_process().expect("spawn");

    session.watch(&mut DetachingHandler).expect("watch");

    assert_eq!(session.tracked_processes(), 0);
}

#[test]
fn stop_is_idempotent() {
    let mut session = DebugSession::new(MockTracer::default());
    session.spawn_traced_process().expect("spawn");
    session.spawn_traced_process().expect("spawn");
    assert_eq!(session.tracked_processes(), 2);

    session.stop();
    assert!(!session.is_running());
    assert_eq!(session.tracked_processes(), 0);

    session.stop();
    assert!(!session.is_running());
    assert_eq!(session.tracked_processes(), 0);
}

#[test]
fn resume_of_untracked_process_is_an_error() {
    let mut session = DebugSession::new(MockTracer::default());

    match session.resume(99, None) {
        Err(SessionError::UntrackedProcess(99)) => (),
        other => panic!("unexpected result: {other:?}"),
    }
}
