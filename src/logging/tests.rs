// src/logging/tests.rs

use super::*;
use std::ffi::{c_char, c_int, c_void, CString};
use std::process::Command;
use std::sync::{Arc, Mutex};

/// Set when this test binary re-executes itself to run
/// `null_forwarder_child`.
const NULL_FORWARDER_CHILD_ENV: &str = "REMDISP_TEST_NULL_FORWARDER_CHILD";

/// Returns a forwarder whose callback records every message it sees.
fn recording_forwarder() -> (LogForwarder, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let forwarder = LogForwarder::with_callback(move |msg: &str| {
        sink.lock().unwrap().push(msg.to_string());
    });
    (forwarder, seen)
}

struct FailingDisplay;

impl fmt::Display for FailingDisplay {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Err(fmt::Error)
    }
}

#[test_log::test]
fn it_should_deliver_formatted_messages_exactly() {
    let (forwarder, seen) = recording_forwarder();

    forwarder.log(format_args!("Opened device {} with {} rects", 1, 16));
    forwarder.log(format_args!("{:>6}|{:<4}|{:#x}", "evdi", 7, 255));

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            "Opened device 1 with 16 rects".to_string(),
            "  evdi|7   |0xff".to_string()
        ]
    );
}

#[test_log::test]
fn it_should_deliver_a_message_of_exactly_the_maximum_length_untouched() {
    let (forwarder, seen) = recording_forwarder();
    let msg = "x".repeat(MAX_LOG_MESSAGE_LEN);

    forwarder.log(format_args!("{}", msg));

    assert_eq!(seen.lock().unwrap()[0], msg);
}

#[test_log::test]
fn it_should_truncate_messages_that_overflow_the_buffer() {
    let (forwarder, seen) = recording_forwarder();
    let long = "a".repeat(LOG_MESSAGE_CAPACITY * 2);

    forwarder.log(format_args!("prefix {}", long));

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].len(), MAX_LOG_MESSAGE_LEN);
    assert!(seen[0].starts_with("prefix aaa"));
}

#[test_log::test]
fn it_should_truncate_on_a_char_boundary() {
    // 'é' is two bytes, so the limit falls in the middle of a character.
    let text = "é".repeat(LOG_MESSAGE_CAPACITY);
    let formatted = format_bounded(format_args!("{}", text)).unwrap();

    assert_eq!(formatted.len(), MAX_LOG_MESSAGE_LEN - 1);
    assert!(formatted.chars().all(|c| c == 'é'));
}

#[test_log::test]
fn it_should_truncate_preformatted_messages_passed_to_forward() {
    let (forwarder, seen) = recording_forwarder();
    let long = "b".repeat(LOG_MESSAGE_CAPACITY + 10);

    forwarder.forward(&long).unwrap();

    assert_eq!(seen.lock().unwrap()[0].len(), MAX_LOG_MESSAGE_LEN);
}

#[test_log::test]
fn it_should_send_the_fallback_message_when_formatting_fails() {
    let (forwarder, seen) = recording_forwarder();

    forwarder.log(format_args!("value: {}", FailingDisplay));

    assert_eq!(seen.lock().unwrap()[0], FORMAT_FALLBACK_MESSAGE);
}

#[test_log::test]
fn it_should_report_a_formatting_failure() {
    assert_eq!(
        format_bounded(format_args!("{}", FailingDisplay)),
        Err(LogError::Format)
    );
}

#[test_log::test]
fn it_should_replace_the_callback_on_reinitialization() {
    let (forwarder, first) = recording_forwarder();
    let second = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&second);

    forwarder.log(format_args!("before"));
    let replaced = forwarder.set_callback(move |msg: &str| {
        sink.lock().unwrap().push(msg.to_string());
    });
    forwarder.log(format_args!("after"));

    assert!(replaced);
    assert_eq!(*first.lock().unwrap(), vec!["before".to_string()]);
    assert_eq!(*second.lock().unwrap(), vec!["after".to_string()]);
}

#[test_log::test]
fn it_should_report_a_missing_callback_from_forward() {
    let forwarder = LogForwarder::new(MissingCallback::Discard);

    assert!(!forwarder.has_callback());
    assert_eq!(forwarder.forward("lost"), Err(LogError::NoCallback));
}

#[test_log::test]
fn it_should_drop_messages_without_a_callback_under_the_discard_policy() {
    let forwarder = LogForwarder::new(MissingCallback::Discard);

    // Must return normally instead of exiting the test process.
    forwarder.log(format_args!("nobody is listening"));
}

#[test_log::test]
fn it_should_default_to_terminating_on_a_missing_callback() {
    assert_eq!(LogForwarder::default().on_missing(), MissingCallback::Terminate);
}

#[test_log::test]
fn it_should_deserialize_the_missing_callback_policy() {
    let policy: MissingCallback = serde_json::from_str("\"discard\"").unwrap();
    assert_eq!(policy, MissingCallback::Discard);
}

fn as_user_data(forwarder: &LogForwarder) -> *mut c_void {
    forwarder as *const LogForwarder as *mut c_void
}

#[test_log::test]
fn it_should_format_printf_style_messages_through_the_c_trampoline() {
    let (forwarder, seen) = recording_forwarder();
    let name = CString::new("card").unwrap();

    unsafe {
        ffi::remdisp_log_trampoline(
            as_user_data(&forwarder),
            c"Opened /dev/dri/%s%d".as_ptr(),
            name.as_ptr(),
            1 as c_int,
        );
        ffi::remdisp_log_trampoline(
            as_user_data(&forwarder),
            c"%5s|%-3d|%#x".as_ptr(),
            c"evdi".as_ptr(),
            7 as c_int,
            255 as c_int,
        );
    }

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "Opened /dev/dri/card1".to_string(),
            " evdi|7  |0xff".to_string()
        ]
    );
}

#[test_log::test]
fn it_should_bound_trampoline_output_to_the_buffer_capacity() {
    let (forwarder, seen) = recording_forwarder();
    let long = CString::new("z".repeat(LOG_MESSAGE_CAPACITY + 1000)).unwrap();

    unsafe {
        ffi::remdisp_log_trampoline(as_user_data(&forwarder), c"%s".as_ptr(), long.as_ptr());
    }

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].len(), MAX_LOG_MESSAGE_LEN);
    assert!(seen[0].bytes().all(|b| b == b'z'));
}

#[test_log::test]
fn it_should_replace_invalid_utf8_from_the_library() {
    let (forwarder, seen) = recording_forwarder();
    let latin1: *const c_char = b"caf\xe9\0".as_ptr().cast();

    unsafe {
        ffi::remdisp_log_trampoline(as_user_data(&forwarder), c"%s".as_ptr(), latin1);
    }

    assert_eq!(seen.lock().unwrap()[0], "caf\u{fffd}");
}

/// Only does something inside the child process started by
/// `it_should_exit_when_the_library_logs_without_a_forwarder`.
#[test]
fn null_forwarder_child() {
    if std::env::var_os(NULL_FORWARDER_CHILD_ENV).is_none() {
        return;
    }
    unsafe {
        ffi::remdisp_log_trampoline(std::ptr::null_mut(), c"%s".as_ptr(), c"orphan".as_ptr());
    }
}

#[test]
fn it_should_exit_when_the_library_logs_without_a_forwarder() {
    let output = Command::new(std::env::current_exe().unwrap())
        .args([
            "--exact",
            "logging::tests::null_forwarder_child",
            "--nocapture",
            "--test-threads=1",
        ])
        .env(NULL_FORWARDER_CHILD_ENV, "1")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("log callback not set"));
}
