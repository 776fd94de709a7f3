use std::mem;

use indexmap::IndexMap;
use nix::errno::Errno;
use nix::libc;
use nix::sys::ptrace::regset::NT_PRSTATUS;
use nix::sys::ptrace::{self, RegisterSet};
use nix::unistd::Pid;

/// Captures the general-purpose registers of a stopped process.
pub fn read_registers(pid: Pid) -> crate::Result<libc::user_regs_struct> {
    let mut data = mem::MaybeUninit::<libc::user_regs_struct>::uninit();

    let mut iov = libc::iovec {
        iov_base: data.as_mut_ptr().cast(),
        iov_len: mem::size_of::<libc::user_regs_struct>(),
    };

    unsafe {
        Errno::result(libc::ptrace(
            ptrace::Request::PTRACE_GETREGSET as u32,
            pid.as_raw(),
            NT_PRSTATUS::VALUE as i32,
            &mut iov as *mut libc::iovec,
        ))
        .map(|_| 0)?
    };

    Ok(unsafe { data.assume_init() })
}

/// Returns the instruction pointer of the captured register set.
pub const fn instr_addr(regs: &libc::user_regs_struct) -> u64 {
    #[cfg(target_arch = "x86_64")]
    {
        regs.rip
    }
    #[cfg(target_arch = "aarch64")]
    {
        regs.pc
    }
}

/// Returns the stack pointer of the captured register set.
pub const fn stack_addr(regs: &libc::user_regs_struct) -> u64 {
    #[cfg(target_arch = "x86_64")]
    {
        regs.rsp
    }
    #[cfg(target_arch = "aarch64")]
    {
        regs.sp
    }
}

/// Returns the frame pointer of the captured register set.
pub const fn frame_addr(regs: &libc::user_regs_struct) -> u64 {
    #[cfg(target_arch = "x86_64")]
    {
        regs.rbp
    }
    #[cfg(target_arch = "aarch64")]
    {
        regs.regs[29]
    }
}

/// Names every register of the captured set, in `user_regs_struct` order.
#[cfg(target_arch = "x86_64")]
pub fn named_registers(regs: &libc::user_regs_struct) -> IndexMap<String, u64> {
    let mut named = IndexMap::new();

    macro_rules! reg {
        ($($name:ident),+ $(,)?) => {
            $(named.insert(stringify!($name).to_owned(), regs.$name);)+
        };
    }

    reg!(
        r15, r14, r13, r12, rbp, rbx, r11, r10, r9, r8, rax, rcx, rdx, rsi, rdi, orig_rax, rip,
        cs, eflags, rsp, ss, fs_base, gs_base, ds, es, fs, gs,
    );

    named
}

/// Names every register of the captured set, in `user_regs_struct` order.
#[cfg(target_arch = "aarch64")]
pub fn named_registers(regs: &libc::user_regs_struct) -> IndexMap<String, u64> {
    let mut named = IndexMap::new();

    for (i, value) in regs.regs.iter().enumerate() {
        named.insert(format!("x{i}"), *value);
    }

    named.insert("sp".to_owned(), regs.sp);
    named.insert("pc".to_owned(), regs.pc);
    named.insert("pstate".to_owned(), regs.pstate);

    named
}
