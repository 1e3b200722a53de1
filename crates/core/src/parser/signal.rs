//! Signal decoding.
//!
//! The structured `$_siginfo` print is trusted first. The textual
//! `Program received signal SIGSEGV` / `Signal 11 (SIGSEGV)` announcement is
//! only consulted when no structured payload was printed.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{SignalFault, SignalInfo};

const SIGNAL_NAMES: &[(i32, &str)] = &[
    (1, "SIGHUP"),
    (2, "SIGINT"),
    (3, "SIGQUIT"),
    (4, "SIGILL"),
    (5, "SIGTRAP"),
    (6, "SIGABRT"),
    (7, "SIGBUS"),
    (8, "SIGFPE"),
    (9, "SIGKILL"),
    (10, "SIGUSR1"),
    (11, "SIGSEGV"),
    (12, "SIGUSR2"),
    (13, "SIGPIPE"),
    (14, "SIGALRM"),
    (15, "SIGTERM"),
    (16, "SIGSTKFLT"),
    (17, "SIGCHLD"),
    (18, "SIGCONT"),
    (19, "SIGSTOP"),
    (20, "SIGTSTP"),
    (21, "SIGTTIN"),
    (22, "SIGTTOU"),
    (23, "SIGURG"),
    (24, "SIGXCPU"),
    (25, "SIGXFSZ"),
    (26, "SIGVTALRM"),
    (27, "SIGPROF"),
    (28, "SIGWINCH"),
    (29, "SIGIO"),
    (30, "SIGPWR"),
    (31, "SIGSYS"),
];

/// (signal, code) -> sub-reason.
const SIGNAL_CODES: &[(i32, i32, &str)] = &[
    (11, 1, "SEGV_MAPERR (Address not mapped to object)"),
    (11, 2, "SEGV_ACCERR (Invalid permissions for mapped object)"),
    (11, 3, "SEGV_BNDERR (Failed address bound checks)"),
    (11, 4, "SEGV_PKUERR (Access was denied by memory protection keys)"),
    (7, 1, "BUS_ADRALN (Invalid address alignment)"),
    (7, 2, "BUS_ADRERR (Nonexistent physical address)"),
    (7, 3, "BUS_OBJERR (Object-specific hardware error)"),
    (8, 1, "FPE_INTDIV (Integer divide by zero)"),
    (8, 2, "FPE_INTOVF (Integer overflow)"),
    (8, 3, "FPE_FLTDIV (Floating point divide by zero)"),
    (8, 4, "FPE_FLTOVF (Floating point overflow)"),
    (8, 5, "FPE_FLTUND (Floating point underflow)"),
    (8, 6, "FPE_FLTRES (Floating point inexact result)"),
    (8, 7, "FPE_FLTINV (Invalid floating point operation)"),
    (8, 8, "FPE_FLTSUB (Subscript out of range)"),
    (4, 1, "ILL_ILLOPC (Illegal opcode)"),
    (4, 2, "ILL_ILLOPN (Illegal operand)"),
    (4, 3, "ILL_ILLADR (Illegal addressing mode)"),
    (4, 4, "ILL_ILLTRP (Illegal trap)"),
    (4, 5, "ILL_PRVOPC (Privileged opcode)"),
    (4, 6, "ILL_PRVREG (Privileged register)"),
    (4, 7, "ILL_COPROC (Coprocessor error)"),
    (4, 8, "ILL_BADSTK (Internal stack error)"),
];

/// Sender codes shared by every signal.
const GENERIC_CODES: &[(i32, &str)] = &[
    (0x80, "SI_KERNEL (Sent by the kernel)"),
    (-1, "SI_QUEUE (Sent by sigqueue)"),
    (-2, "SI_TIMER (POSIX timer expired)"),
    (-3, "SI_MESGQ (POSIX message queue state changed)"),
    (-4, "SI_ASYNCIO (AIO completed)"),
    (-5, "SI_SIGIO (Queued SIGIO)"),
    (-6, "SI_TKILL (Sent by tkill or tgkill)"),
];

static SI_SIGNO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"si_signo\s*=\s*(-?\d+)").expect("SI_SIGNO regex pattern is valid")
});
static SI_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"si_code\s*=\s*(-?\d+)").expect("SI_CODE regex pattern is valid"));
static SI_ADDR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"si_addr\s*=\s*(?:\([^)]*\)\s*)?(0x[0-9a-fA-F]+)")
        .expect("SI_ADDR regex pattern is valid")
});
static SIGFAULT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"_sigfault\s*=\s*\{([^}]*)\}").expect("SIGFAULT_BLOCK regex pattern is valid")
});
static ADDR_LSB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"_addr_lsb\s*=\s*(-?\d+)").expect("ADDR_LSB regex pattern is valid")
});
static SIGNAL_ANNOUNCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Signal\s+(\d+)\s+\(([A-Z0-9]+)\)").expect("SIGNAL_ANNOUNCE regex pattern is valid")
});
static PROGRAM_SIGNAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Program (?:terminated|received) .*?signal (SIG[A-Z0-9]+)")
        .expect("PROGRAM_SIGNAL regex pattern is valid")
});

/// Canonical name, `SIGNAL_<n>` when the number is not a known signal.
pub fn signal_name(signo: i32) -> String {
    SIGNAL_NAMES
        .iter()
        .find(|(n, _)| *n == signo)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| format!("SIGNAL_{signo}"))
}

pub fn signal_number(name: &str) -> Option<i32> {
    SIGNAL_NAMES.iter().find(|(_, n)| *n == name).map(|(signo, _)| *signo)
}

/// Base phrase plus the code sub-reason when one is known.
pub fn signal_description(signo: i32, code: i32) -> String {
    let mut desc = match signo {
        11 => "Segmentation fault".to_string(),
        6 => "Process abort signal (possibly assertion failure)".to_string(),
        7 => "Bus error".to_string(),
        8 => "Floating point exception".to_string(),
        4 => "Illegal instruction".to_string(),
        _ => format!("Signal {signo}"),
    };

    let reason = SIGNAL_CODES
        .iter()
        .find(|(s, c, _)| *s == signo && *c == code)
        .map(|(_, _, text)| *text)
        .or_else(|| GENERIC_CODES.iter().find(|(c, _)| *c == code).map(|(_, text)| *text));
    match reason {
        Some(text) => {
            desc.push_str(" - ");
            desc.push_str(text);
        }
        None if code != 0 => desc.push_str(&format!(" (code {code})")),
        None => {}
    }
    desc
}

/// Builds a fully described `SignalInfo` from a number and code.
pub fn decode_signal(signo: i32, code: i32) -> SignalInfo {
    SignalInfo {
        signal_number: signo,
        signal_code: code,
        signal_name: signal_name(signo),
        signal_description: signal_description(signo, code),
        fault_address: None,
        fault_info: None,
    }
}

/// Extracts the terminating signal from a transcript. Returns the default
/// (number 0) when neither source is present.
pub fn parse_signal_info(transcript: &str) -> SignalInfo {
    if let Some(signo) = SI_SIGNO.captures(transcript).and_then(|c| c[1].parse().ok()) {
        let code = SI_CODE.captures(transcript).and_then(|c| c[1].parse().ok()).unwrap_or(0);
        let mut info = decode_signal(signo, code);
        info.fault_address = SI_ADDR.captures(transcript).map(|c| c[1].to_string());
        info.fault_info = parse_sigfault(transcript);
        if info.fault_address.is_none() {
            info.fault_address = info.fault_info.as_ref().map(|f| f.address.clone());
        }
        return info;
    }

    if let Some(caps) = SIGNAL_ANNOUNCE.captures(transcript) {
        if let Ok(signo) = caps[1].parse() {
            let mut info = decode_signal(signo, 0);
            info.signal_name = caps[2].to_string();
            return info;
        }
    }
    if let Some(caps) = PROGRAM_SIGNAL.captures(transcript) {
        let name = caps[1].to_string();
        let mut info = signal_number(&name).map(|n| decode_signal(n, 0)).unwrap_or_default();
        if info.is_known() {
            info.signal_name = name;
        }
        return info;
    }
    SignalInfo::default()
}

/// Structured fault detail from `print $_siginfo._sifields._sigfault`.
pub fn parse_sigfault(transcript: &str) -> Option<SignalFault> {
    let block = SIGFAULT_BLOCK.captures(transcript)?;
    let body = &block[1];
    let address = SI_ADDR.captures(body).map(|c| c[1].to_string())?;
    Some(SignalFault {
        address,
        addr_lsb: ADDR_LSB.captures(body).map(|c| c[1].to_string()),
        library: None,
    })
}
