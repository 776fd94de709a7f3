use std::ffi::OsStr;
use std::path::Path;

use miette::IntoDiagnostic;

use faultline_debugger::{Command, PtraceTracer};
use faultline_monitor::DebugSession;
use faultline_proxy::{CrashCorrelator, ProxyLoop, prepare_crash_dir};

use tokio::net::TcpListener;

use crate::{CliOpts, Endpoint, ProxyConfig};

/// Runs the proxy described by the given command-line options.
///
/// Blocks until the traced target is gone (and not restarted) or the
/// debug session fails.
pub fn evaluate_run(opts: CliOpts) -> miette::Result<()> {
    let listen = opts.listen.parse::<Endpoint>().into_diagnostic()?;
    let upstream = opts.upstream.parse::<Endpoint>().into_diagnostic()?;
    let upstream_addr = upstream.resolve().into_diagnostic()?;

    let config = parse_run_config(opts.config.as_deref())?;
    let (tracer, targets) = select_targets(&opts)?;

    let crash_dir = prepare_crash_dir(&config.crash_folder).into_diagnostic()?;
    let (correlator, mut monitor) = CrashCorrelator::new(config.correlator_config(), crash_dir);

    let mut session = DebugSession::new(tracer);

    // a session without its targets must not start serving
    for _ in 0..targets {
        session.spawn_traced_process().into_diagnostic()?;
    }

    let debug_thread = std::thread::spawn(move || {
        if let Err(e) = session.watch(&mut monitor) {
            tracing::error!(error = %e, "debug session failed");
        }
    });

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;

    runtime.block_on(async move {
        let listener = TcpListener::bind((listen.host.as_str(), listen.port))
            .await
            .into_diagnostic()?;

        tracing::info!(%listen, %upstream, "forwarding traffic");

        let mut proxy = ProxyLoop::new(listener, upstream_addr, correlator, config.buffer_size);
        proxy.serve(Some(config.serve_timeout())).await;

        Ok::<_, miette::Report>(())
    })?;

    if debug_thread.join().is_err() {
        miette::bail!("debug thread panicked");
    }

    Ok(())
}

fn select_targets(opts: &CliOpts) -> miette::Result<(PtraceTracer, usize)> {
    if !opts.pids.is_empty() {
        Ok((PtraceTracer::attach_pids(opts.pids.iter().copied()), opts.pids.len()))
    } else if let Some(name) = opts.name.as_deref() {
        let pids = crate::pids_by_name(name).into_diagnostic()?;

        if pids.is_empty() {
            miette::bail!("no running process is named {name:?}");
        }

        tracing::info!(?pids, name, "attaching to processes by name");

        let targets = pids.len();
        Ok((PtraceTracer::attach_pids(pids), targets))
    } else if let Some((program, args)) = opts.program.split_first() {
        let command = Command::new(program).args(args.iter().cloned());
        Ok((PtraceTracer::spawn_command(command), 1))
    } else {
        miette::bail!("no target: give a program to spawn, or --pids/--name to attach");
    }
}

fn parse_run_config(config: Option<&str>) -> miette::Result<ProxyConfig> {
    let Some(config) = config else {
        return knus::parse("<default>", "").map_err(miette::Report::new);
    };

    let path = Path::new(config);

    let config = if let Some((filename, "kdl")) = path
        .file_name()
        .and_then(OsStr::to_str)
        .zip(path.extension().and_then(OsStr::to_str))
    {
        let content = std::fs::read_to_string(path).into_diagnostic()?;
        knus::parse(filename, &content)?
    } else {
        knus::parse("<content>", config)?
    };

    Ok(config)
}
