use corelens_core::parser::signal::{parse_sigfault, signal_description};
use corelens_core::parser::{decode_signal, parse_signal_info, signal_name};

#[test]
fn segv_with_maperr_code() {
    let info = decode_signal(11, 1);
    assert_eq!(info.signal_name, "SIGSEGV");
    assert_eq!(info.signal_number, 11);
    assert_eq!(info.signal_code, 1);
    assert!(info.signal_description.contains("SEGV_MAPERR"), "{}", info.signal_description);
    assert!(info.signal_description.starts_with("Segmentation fault - "));
}

#[test]
fn unknown_signal_numbers_get_a_synthetic_name() {
    assert_eq!(signal_name(64), "SIGNAL_64");
    assert_eq!(signal_name(0), "SIGNAL_0");
    assert_eq!(signal_name(6), "SIGABRT");
}

#[test]
fn description_code_handling() {
    assert_eq!(signal_description(6, 0), "Process abort signal (possibly assertion failure)");
    assert_eq!(signal_description(15, 0), "Signal 15");
    assert_eq!(signal_description(11, 42), "Segmentation fault (code 42)");
    assert!(signal_description(11, 0x80).contains("SI_KERNEL"));
    assert!(signal_description(6, -6).contains("SI_TKILL"));
    assert!(signal_description(7, 2).contains("BUS_ADRERR"));
    assert!(signal_description(8, 1).contains("FPE_INTDIV"));
}

#[test]
fn structured_siginfo_is_preferred() {
    let transcript = "Program terminated with signal SIGABRT, Aborted.\n\
        $1 = {si_signo = 11, si_errno = 0, si_code = 2, _sifields = {_sigfault = {si_addr = 0x7f0000001000, _addr_lsb = 0}}}\n";
    let info = parse_signal_info(transcript);
    assert_eq!(info.signal_number, 11);
    assert_eq!(info.signal_name, "SIGSEGV");
    assert!(info.signal_description.contains("SEGV_ACCERR"));
    assert_eq!(info.fault_address.as_deref(), Some("0x7f0000001000"));
    let fault = info.fault_info.expect("fault info");
    assert_eq!(fault.address, "0x7f0000001000");
    assert_eq!(fault.addr_lsb.as_deref(), Some("0"));
    assert_eq!(fault.library, None);
}

#[test]
fn cast_si_addr_is_understood() {
    let transcript = "si_signo = 7\nsi_code = 1\nsi_addr = (void *) 0xdeadbeef\n";
    let info = parse_signal_info(transcript);
    assert_eq!(info.signal_name, "SIGBUS");
    assert_eq!(info.fault_address.as_deref(), Some("0xdeadbeef"));
    assert_eq!(info.fault_info, None);
}

#[test]
fn textual_announcement_fallback() {
    let info = parse_signal_info("Signal 6 (SIGABRT) received\n");
    assert_eq!(info.signal_number, 6);
    assert_eq!(info.signal_name, "SIGABRT");
    assert_eq!(info.fault_address, None);

    let info = parse_signal_info("Program terminated with signal SIGSEGV, Segmentation fault.\n");
    assert_eq!(info.signal_number, 11);
    assert_eq!(info.signal_name, "SIGSEGV");
    assert_eq!(info.signal_description, "Segmentation fault");
}

#[test]
fn no_signal_source_yields_default() {
    let info = parse_signal_info("Thread 1 (LWP 1):\n#0  0x1 in f ()\n");
    assert!(!info.is_known());
    assert_eq!(info.signal_name, "");
}

#[test]
fn sigfault_block_without_address_is_ignored() {
    assert_eq!(parse_sigfault("_sigfault = {_addr_lsb = 0}"), None);
    let fault = parse_sigfault("_sigfault = {si_addr = 0x10, _addr_lsb = 3}").expect("fault");
    assert_eq!(fault.address, "0x10");
    assert_eq!(fault.addr_lsb.as_deref(), Some("3"));
}
