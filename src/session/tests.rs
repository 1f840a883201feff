// src/session/tests.rs

use super::*;
use crate::backends::mock::{MockBackend, MockHandle, MockSettings};
use crate::device::{Backend, DeviceStatus, MAX_DIRTY_RECTS};

const TIMEOUT: Duration = Duration::from_secs(2);

fn connected_session(settings: MockSettings) -> Session<MockHandle> {
    let backend = MockBackend::new(settings);
    let handle = backend.open(1).expect("mock device 1 is available");
    let mut session = Session::new(handle);
    session.connect(&DeviceConfig::sample()).unwrap();
    session
}

#[test_log::test]
fn it_should_refuse_to_poll_before_connecting() {
    let backend = MockBackend::default();
    let session = Session::new(backend.open(1).unwrap());

    assert!(matches!(
        session.poll_ready(Some(Duration::ZERO)),
        Err(DeviceError::NotConnected)
    ));
}

#[test_log::test]
fn it_should_become_ready_after_connect_and_deliver_the_mode() {
    let mut session = connected_session(MockSettings::default());

    assert!(session.poll_ready(None).unwrap());

    let mut queue = EventQueue::default();
    session.handle_events(&mut queue).unwrap();

    assert_eq!(queue.events.len(), 1);
    assert!(matches!(queue.events[0], DeviceEvent::ModeChanged(_)));
    assert_eq!(
        session.handle().connected_config(),
        Some(&DeviceConfig::sample())
    );
}

#[test_log::test]
fn it_should_time_out_when_no_events_are_pending() {
    let mut session = connected_session(MockSettings::default());
    session.handle_events(&mut EventQueue::default()).unwrap();

    let ready = session.poll_ready(Some(Duration::from_millis(10))).unwrap();

    assert!(!ready);
}

#[test_log::test]
fn it_should_wait_for_the_mode_and_keep_other_events() {
    let mut session = connected_session(MockSettings::default());
    session.handle_mut().inject_event(DeviceEvent::Dpms(0));

    let (mode, others) = session.wait_for_mode(TIMEOUT).unwrap();

    assert_eq!(mode, MockSettings::default().mode);
    assert_eq!(others, vec![DeviceEvent::Dpms(0)]);
}

#[test_log::test]
fn it_should_report_a_timeout_when_no_mode_arrives() {
    let mut session = connected_session(MockSettings::default());
    session.handle_events(&mut EventQueue::default()).unwrap();

    let result = session.wait_for_mode(Duration::from_millis(20));

    let err = result.unwrap_err();
    assert!(matches!(err, DeviceError::Timeout));
    assert!(err.is_retryable());
}

#[test_log::test]
fn it_should_distinguish_an_unknown_buffer_from_a_pending_update() {
    let settings = MockSettings {
        update_pattern: vec![UpdateStatus::Pending],
        ..MockSettings::default()
    };
    let mut session = connected_session(settings);
    let id = session
        .register_buffer(Buffer::new(0, 64, 32, 64 * 4))
        .unwrap();

    assert_eq!(session.request_update(id).unwrap(), UpdateStatus::Pending);
    assert!(matches!(
        session.request_update(7),
        Err(DeviceError::UnknownBuffer(7))
    ));
}

#[test_log::test]
fn it_should_announce_a_pending_update_with_an_update_ready_event() {
    let settings = MockSettings {
        update_pattern: vec![UpdateStatus::Pending],
        ..MockSettings::default()
    };
    let mut session = connected_session(settings);
    session.handle_events(&mut EventQueue::default()).unwrap();
    let id = session
        .register_buffer(Buffer::new(2, 64, 32, 64 * 4))
        .unwrap();

    session.request_update(id).unwrap();
    assert!(session.poll_ready(Some(TIMEOUT)).unwrap());
    let mut queue = EventQueue::default();
    session.handle_events(&mut queue).unwrap();

    assert_eq!(queue.events, vec![DeviceEvent::UpdateReady(2)]);
    assert_eq!(session.grab_pixels(2).unwrap().len(), 1);
}

#[test_log::test]
fn it_should_grab_pixels_into_the_registered_buffer() {
    let settings = MockSettings {
        rects_per_grab: 4,
        ..MockSettings::default()
    };
    let mut session = connected_session(settings);
    let id = session
        .register_buffer(Buffer::new(0, 64, 32, 64 * 4))
        .unwrap();

    assert_eq!(session.request_update(id).unwrap(), UpdateStatus::Ready);
    let rects = session.grab_pixels(id).unwrap().to_vec();

    assert_eq!(rects.len(), 4);
    assert_eq!(rects[0], Rect::new(0, 0, 64, 8));
    assert_eq!(rects[3], Rect::new(0, 24, 64, 32));
    assert!(session.buffer(id).unwrap().bytes().iter().all(|&b| b == 1));
}

#[test_log::test]
fn it_should_clamp_rect_counts_above_capacity() {
    let settings = MockSettings {
        rects_per_grab: 100,
        ..MockSettings::default()
    };
    let mut session = connected_session(settings);
    let id = session
        .register_buffer(Buffer::new(0, 64, 32, 64 * 4))
        .unwrap();

    session.request_update(id).unwrap();

    assert_eq!(session.grab_pixels(id).unwrap().len(), MAX_DIRTY_RECTS);
}

#[test_log::test]
fn it_should_reject_a_duplicate_buffer_id() {
    let mut session = connected_session(MockSettings::default());
    session.register_buffer(Buffer::new(0, 8, 8, 32)).unwrap();

    assert!(matches!(
        session.register_buffer(Buffer::new(0, 8, 8, 32)),
        Err(DeviceError::BufferAlreadyRegistered(0))
    ));
}

#[test_log::test]
fn it_should_surface_a_buffer_registration_failure() {
    let settings = MockSettings {
        fail_register: true,
        ..MockSettings::default()
    };
    let mut session = connected_session(settings);

    assert!(matches!(
        session.register_buffer(Buffer::new(5, 8, 8, 32)),
        Err(DeviceError::BufferRegistrationFailed(5))
    ));
    assert_eq!(session.buffer_ids().count(), 0);
}

#[test_log::test]
fn it_should_unregister_a_buffer_on_request() {
    let mut session = connected_session(MockSettings::default());
    session.register_buffer(Buffer::new(1, 8, 8, 32)).unwrap();

    let buffer = session.unregister_buffer(1).unwrap();

    assert_eq!(buffer.id(), 1);
    assert_eq!(session.handle().registered_buffers().count(), 0);
    assert!(matches!(
        session.request_update(1),
        Err(DeviceError::UnknownBuffer(1))
    ));
}

#[test_log::test]
fn it_should_refuse_updates_after_disconnect() {
    let mut session = connected_session(MockSettings::default());
    session.register_buffer(Buffer::new(0, 8, 8, 32)).unwrap();

    session.disconnect();

    assert!(!session.handle().is_connected());
    assert!(matches!(
        session.request_update(0),
        Err(DeviceError::NotConnected)
    ));
}

#[test_log::test]
fn it_should_propagate_a_rejected_connection() {
    let backend = MockBackend::new(MockSettings {
        reject_connect: true,
        ..MockSettings::default()
    });
    let mut session = Session::new(backend.open(1).unwrap());

    let err = session.connect(&DeviceConfig::sample()).unwrap_err();

    assert!(matches!(err, DeviceError::ConnectRejected));
    assert!(!session.is_connected());
}

#[test_log::test]
fn it_should_fail_to_open_a_missing_device() {
    let backend = MockBackend::default();

    assert_eq!(backend.check_device(5), DeviceStatus::NotPresent);
    assert!(matches!(backend.open(5), Err(DeviceError::OpenFailed(5))));
}

#[test_log::test]
fn it_should_keep_earlier_mode_changes_of_the_same_batch() {
    let mut session = connected_session(MockSettings::default());
    let newer = Mode {
        width: 1920,
        height: 1080,
        ..MockSettings::default().mode
    };
    session.handle_mut().inject_event(DeviceEvent::ModeChanged(newer));

    let (mode, others) = session.wait_for_mode(TIMEOUT).unwrap();

    assert_eq!(mode, newer);
    assert_eq!(
        others,
        vec![DeviceEvent::ModeChanged(MockSettings::default().mode)]
    );
}

#[test_log::test]
fn it_should_not_block_on_many_unhandled_pending_updates() {
    let settings = MockSettings {
        update_pattern: vec![UpdateStatus::Pending],
        ..MockSettings::default()
    };
    let mut session = connected_session(settings);
    session.handle_events(&mut EventQueue::default()).unwrap();
    let id = session
        .register_buffer(Buffer::new(0, 8, 8, 8 * 4))
        .unwrap();

    for _ in 0..5000 {
        assert_eq!(session.request_update(id).unwrap(), UpdateStatus::Pending);
    }
    assert_eq!(session.handle().queued_events(), 1);

    assert!(session.poll_ready(Some(TIMEOUT)).unwrap());
    let mut queue = EventQueue::default();
    session.handle_events(&mut queue).unwrap();

    assert_eq!(queue.events, vec![DeviceEvent::UpdateReady(0)]);
    assert!(!session.poll_ready(Some(Duration::ZERO)).unwrap());
}

#[test_log::test]
fn it_should_grab_rectangles_into_an_unregistered_scratch_buffer() {
    let settings = MockSettings {
        rects_per_grab: 40,
        ..MockSettings::default()
    };
    let mut session = connected_session(settings);
    let mut scratch = Buffer::new(5, 0, 0, 0);

    let rects = session.grab_into(&mut scratch).unwrap().len();

    assert_eq!(rects, MAX_DIRTY_RECTS);
    assert!(session.buffer(5).is_none());
}
