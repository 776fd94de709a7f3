use std::io;
use std::os::unix::process::CommandExt;
use std::process::Stdio;

use capstone::Capstone;
use capstone::prelude::*;
use indexmap::IndexMap;
use nix::errno::Errno;
use nix::sys::ptrace;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::Pid;

use faultline_monitor::tracer::{Frame, TracedProcess};

use super::{mem, thread};
use crate::Command;

/// Size of one saved frame record (saved frame pointer + return address).
const FRAME_RECORD: usize = 2 * size_of::<u64>();

/// Upper bound of one encoded instruction, used to size code reads.
const MAX_INSTR_LEN: usize = 16;

/// One process traced through `ptrace`.
pub struct PtraceProcess {
    pid: Pid,
    attached: bool,
    kill_on_drop: bool,
}

impl PtraceProcess {
    /// Spawns the command as a traced child, leaving it stopped at the
    /// initial exec trap.
    pub(super) fn spawn(command: &Command) -> crate::Result<Self> {
        let mut cmd = std::process::Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // On Linux, if a `pre_exec` closure is specified, `rust-std` will
        // spawn the process with `fork`+`exec`, otherwise `posix_spawn` is used.
        unsafe {
            cmd.pre_exec(|| ptrace::traceme().map_err(|e| io::Error::from_raw_os_error(e as i32)))
        };

        let child = cmd.spawn().map_err(crate::Error::Spawn)?;
        let pid = Pid::from_raw(child.id() as i32);

        wait_for_stop(pid, Signal::SIGTRAP)?;
        ptrace::setoptions(pid, ptrace::Options::PTRACE_O_EXITKILL)?;

        tracing::debug!(
            pid = pid.as_raw(),
            program = %command.program.display(),
            "spawned under trace"
        );

        Ok(Self {
            pid,
            attached: true,
            kill_on_drop: true,
        })
    }

    /// Attaches to an already-running process, leaving it stopped.
    pub(super) fn attach(pid: Pid) -> crate::Result<Self> {
        ptrace::attach(pid)?;
        wait_for_stop(pid, Signal::SIGSTOP)?;

        tracing::debug!(pid = pid.as_raw(), "attached");

        Ok(Self {
            pid,
            attached: true,
            kill_on_drop: false,
        })
    }
}

impl TracedProcess for PtraceProcess {
    type Error = crate::Error;

    fn id(&self) -> u64 {
        self.pid.as_raw() as u64
    }

    fn is_attached(&self) -> bool {
        self.attached
    }

    fn resume(&mut self, signal: Option<i32>) -> crate::Result<()> {
        let signal = signal.map(Signal::try_from).transpose()?;
        ptrace::cont(self.pid, signal)?;
        Ok(())
    }

    fn detach(&mut self) -> crate::Result<()> {
        ptrace::detach(self.pid, None)?;
        self.attached = false;
        self.kill_on_drop = false;
        Ok(())
    }

    fn registers(&mut self) -> crate::Result<IndexMap<String, u64>> {
        let regs = thread::read_registers(self.pid)?;
        Ok(thread::named_registers(&regs))
    }

    fn stack(&mut self, max_words: usize) -> crate::Result<Vec<(u64, u64)>> {
        let regs = thread::read_registers(self.pid)?;
        let stack_addr = thread::stack_addr(&regs);

        let mut buf = vec![0u8; max_words * size_of::<u64>()];
        let len = mem::read_process_memory(self.pid, stack_addr, &mut buf)?;

        let words = buf[..len]
            .chunks_exact(size_of::<u64>())
            .enumerate()
            .map(|(i, chunk)| {
                let mut word = [0u8; size_of::<u64>()];
                word.copy_from_slice(chunk);
                (
                    stack_addr + (i * size_of::<u64>()) as u64,
                    u64::from_ne_bytes(word),
                )
            })
            .collect();

        Ok(words)
    }

    fn backtrace(&mut self, max_depth: usize) -> crate::Result<Vec<Frame>> {
        let regs = thread::read_registers(self.pid)?;

        let mut frames = vec![Frame {
            instr_addr: thread::instr_addr(&regs),
            symbol: None,
        }];

        // Best-effort frame-pointer walk; stops at the first frame that
        // does not look like a valid saved record.
        let mut frame_addr = thread::frame_addr(&regs);

        while frames.len() < max_depth {
            if frame_addr == 0 || frame_addr % size_of::<u64>() as u64 != 0 {
                break;
            }

            let mut record = [0u8; FRAME_RECORD];
            if mem::read_process_memory(self.pid, frame_addr, &mut record)? < FRAME_RECORD {
                break;
            }

            let mut word = [0u8; size_of::<u64>()];
            word.copy_from_slice(&record[..size_of::<u64>()]);
            let saved_frame_addr = u64::from_ne_bytes(word);
            word.copy_from_slice(&record[size_of::<u64>()..]);
            let return_addr = u64::from_ne_bytes(word);

            if return_addr == 0 {
                break;
            }

            frames.push(Frame {
                instr_addr: return_addr,
                symbol: None,
            });

            // frames grow toward higher addresses; anything else is a cycle
            if saved_frame_addr <= frame_addr {
                break;
            }

            frame_addr = saved_frame_addr;
        }

        Ok(frames)
    }

    fn disassembly(&mut self, max_instrs: usize) -> crate::Result<Vec<(u64, String)>> {
        let regs = thread::read_registers(self.pid)?;
        let instr_addr = thread::instr_addr(&regs);

        let mut code = vec![0u8; max_instrs * MAX_INSTR_LEN];
        let len = mem::read_process_memory(self.pid, instr_addr, &mut code)?;

        let cs = new_capstone()?;
        let instrs = cs.disasm_count(&code[..len], instr_addr, max_instrs)?;

        let listing = instrs
            .iter()
            .map(|instr| {
                let text = format!(
                    "{} {}",
                    instr.mnemonic().unwrap_or_default(),
                    instr.op_str().unwrap_or_default()
                );

                (instr.address(), text.trim_end().to_owned())
            })
            .collect();

        Ok(listing)
    }

    fn memory_maps(&self) -> crate::Result<Vec<String>> {
        let maps = std::fs::read_to_string(format!("/proc/{}/maps", self.pid.as_raw()))?;
        Ok(maps.lines().map(str::to_owned).collect())
    }
}

impl Drop for PtraceProcess {
    fn drop(&mut self) {
        if self.kill_on_drop {
            match signal::kill(self.pid, Signal::SIGKILL) {
                Ok(()) => tracing::debug!(pid = self.pid.as_raw(), "process killed"),
                Err(Errno::ESRCH) => (),
                Err(e) => tracing::error!(error = %e, pid = self.pid.as_raw(), "kill"),
            }
        }
    }
}

fn wait_for_stop(pid: Pid, expected: Signal) -> crate::Result<()> {
    let status = waitpid(pid, None)?;

    match status {
        WaitStatus::Stopped(_, signal) if signal == expected => Ok(()),
        status => Err(crate::Error::BadChildWait(status)),
    }
}

#[cfg(target_arch = "x86_64")]
fn new_capstone() -> crate::Result<Capstone> {
    Capstone::new()
        .x86()
        .mode(arch::x86::ArchMode::Mode64)
        .build()
        .map_err(Into::into)
}

#[cfg(target_arch = "aarch64")]
fn new_capstone() -> crate::Result<Capstone> {
    Capstone::new()
        .arm64()
        .mode(arch::arm64::ArchMode::Arm)
        .build()
        .map_err(Into::into)
}
