//! End-to-end lifecycle tests against recording collaborators.

mod common;

use coin_counter::lifecycle::{CaptureMode, LoopTicket, ResourceKind, TickOutcome};
use coin_counter::runtime::Circle;
use coin_counter::sink::StatusLevel;
use coin_counter::CaptureError;
use common::{image_bytes, Event, Harness};
use proptest::prelude::*;

#[test]
fn test_stop_while_idle_does_nothing() {
    let mut h = Harness::new();

    assert!(h.coordinator.stop().is_ok());
    assert!(h.coordinator.stop().is_ok());

    assert!(h.events().is_empty());
    assert_eq!(h.coordinator.stats().transitions, 0);
    assert_eq!(h.pump.total_cancellations(), 0);
}

#[test]
fn test_camera_frames_publish_results() {
    let mut h = Harness::new();
    h.coordinator.start_camera().unwrap();

    for _ in 0..5 {
        h.refresh();
    }

    assert_eq!(h.coordinator.mode(), CaptureMode::Camera);
    assert_eq!(h.results.borrow().len(), 5);
    assert_eq!(h.runtime.borrow().outstanding(), 0);
    assert_eq!(h.camera.borrow().live, 1);
}

#[test]
fn test_switch_to_still_stops_stream_before_decoding() {
    let mut h = Harness::new();
    h.coordinator.start_camera().unwrap();
    h.refresh();
    h.clear_events();

    h.coordinator.load_image(image_bytes(90)).unwrap();

    let stopped = h.position(&Event::TracksStopped(1)).expect("tracks stopped");
    let decoded = h.position(&Event::Decoded).expect("image decoded");
    let first_alloc = h.position(&Event::Allocated).expect("processing ran");
    assert!(stopped < decoded);
    assert!(decoded < first_alloc);

    assert_eq!(h.coordinator.mode(), CaptureMode::StillImage);
    assert_eq!(h.camera.borrow().live, 0);
    assert_eq!(h.pump.active_registrations(), 0);
    assert_eq!(h.coordinator.guard().resource_kind(), ResourceKind::Image);
}

#[test]
fn test_permission_denied_returns_to_idle() {
    let mut h = Harness::new();
    h.camera.borrow_mut().deny = true;

    let err = h.coordinator.start_camera().unwrap_err();
    assert_eq!(
        err,
        CaptureError::DeviceUnavailable {
            reason: "PermissionDenied".into()
        }
    );

    assert_eq!(h.coordinator.mode(), CaptureMode::Idle);
    assert!(!h.coordinator.guard().has_loop());
    assert_eq!(h.pump.total_registrations(), 0);
    assert!(h.danger_messages()[0].contains("denied"));
    assert!(!h.last_controls().unwrap().busy);
}

#[test]
fn test_permission_denied_after_still_image_releases_bitmap() {
    let mut h = Harness::new();
    h.coordinator.load_image(image_bytes(5)).unwrap();
    h.camera.borrow_mut().deny = true;

    assert!(h.coordinator.start_camera().is_err());
    assert_eq!(h.coordinator.mode(), CaptureMode::Idle);
    assert_eq!(h.coordinator.guard().resource_kind(), ResourceKind::None);
}

#[test]
fn test_second_still_replaces_first() {
    let mut h = Harness::new();

    h.coordinator.load_image(image_bytes(10)).unwrap();
    h.coordinator.load_image(image_bytes(200)).unwrap();

    assert_eq!(h.coordinator.mode(), CaptureMode::StillImage);
    let bitmap = h.coordinator.guard().bitmap().expect("bitmap held");
    assert_eq!(bitmap.pixels()[0], 200);

    let results = h.results.borrow();
    assert_eq!(results.len(), 2);
    assert!(results[1].sequence() > results[0].sequence());
}

#[test]
fn test_still_image_detection_total() {
    let mut h = Harness::new();
    h.runtime.borrow_mut().circles = Some(vec![
        Circle {
            x: 12.0,
            y: 12.0,
            radius: 53.0,
        },
        Circle {
            x: 12.0,
            y: 12.0,
            radius: 45.2,
        },
    ]);

    h.coordinator.load_image(image_bytes(1)).unwrap();

    assert_eq!(h.coordinator.stats().last_total, Some(600));
    assert!(h.events().contains(&Event::Published(600)));
}

#[test]
fn test_alternating_frame_failures_keep_loop_alive() {
    let mut h = Harness::new();
    h.runtime.borrow_mut().fail_odd_detections = true;
    h.coordinator.start_camera().unwrap();
    h.clear_events();

    for _ in 0..1000 {
        h.refresh();
    }

    // One outcome per tick: a result on success, a warning on failure
    let outcomes: Vec<&str> = h
        .events()
        .iter()
        .filter_map(|event| match event {
            Event::Published(_) => Some("published"),
            Event::Status(StatusLevel::Warning, _) => Some("warning"),
            Event::Status(..) => Some("other status"),
            _ => None,
        })
        .collect();
    assert_eq!(outcomes.len(), 1000);
    for (tick, outcome) in outcomes.iter().enumerate() {
        let expected = if tick % 2 == 0 { "published" } else { "warning" };
        assert_eq!(*outcome, expected, "tick {tick}");
    }
    assert_eq!(h.results.borrow().len(), 500);

    let stats = h.coordinator.stats();
    assert_eq!(stats.frames_processed, 500);
    assert_eq!(stats.frames_failed, 500);
    assert_eq!(h.coordinator.mode(), CaptureMode::Camera);
    assert_eq!(h.runtime.borrow().allocations, 4000);
    assert_eq!(h.runtime.borrow().outstanding(), 0);
}

#[test]
fn test_read_failure_skips_frame_without_buffers() {
    let mut h = Harness::new();
    h.coordinator.start_camera().unwrap();
    h.camera.borrow_mut().fail_reads = true;

    h.pump.tick();
    let ticket = h.pump.drain().remove(0);
    assert_eq!(h.coordinator.on_frame(ticket), TickOutcome::Skipped);

    assert_eq!(h.runtime.borrow().allocations, 0);
    assert_eq!(h.coordinator.mode(), CaptureMode::Camera);
    assert!(h.coordinator.guard().has_loop());
}

#[test]
fn test_ticket_from_cancelled_loop_is_ignored() {
    let mut h = Harness::new();
    h.coordinator.start_camera().unwrap();

    // Tick lands in the queue, then the camera restarts before delivery
    h.pump.tick();
    h.coordinator.start_camera().unwrap();
    let queued = h.pump.drain();
    assert_eq!(queued, vec![LoopTicket::new(1)]);

    h.clear_events();
    assert_eq!(h.coordinator.on_frame(queued[0]), TickOutcome::Stale);
    assert!(h.events().is_empty());
    assert_eq!(h.coordinator.stats().stale_ticks, 1);

    h.refresh();
    assert_eq!(h.coordinator.stats().frames_processed, 1);
}

#[test]
fn test_ticket_after_stop_is_ignored() {
    let mut h = Harness::new();
    h.coordinator.start_camera().unwrap();
    h.pump.tick();
    h.coordinator.stop().unwrap();

    for ticket in h.pump.drain() {
        assert_eq!(h.coordinator.on_frame(ticket), TickOutcome::Stale);
    }
    assert!(h.results.borrow().is_empty());
    assert_eq!(h.runtime.borrow().allocations, 0);
}

#[test]
fn test_runtime_not_ready_leaves_camera_running() {
    let mut h = Harness::new();
    h.coordinator.start_camera().unwrap();
    h.runtime.borrow_mut().ready = false;
    h.clear_events();

    let err = h.coordinator.load_image(image_bytes(3)).unwrap_err();

    assert_eq!(err, CaptureError::RuntimeNotReady);
    assert_eq!(h.coordinator.mode(), CaptureMode::Camera);
    assert_eq!(h.camera.borrow().live, 1);
    assert!(h.coordinator.guard().has_loop());
    assert!(!h.events().contains(&Event::Decoded));
    assert_eq!(h.danger_messages().len(), 1);
}

#[test]
fn test_runtime_not_ready_rejects_from_idle() {
    let mut h = Harness::new();
    h.runtime.borrow_mut().ready = false;

    assert_eq!(
        h.coordinator.start_camera(),
        Err(CaptureError::RuntimeNotReady)
    );
    assert_eq!(h.camera.borrow().opened, 0);
    assert_eq!(h.coordinator.mode(), CaptureMode::Idle);
}

#[test]
fn test_still_processing_failure_returns_to_idle() {
    let mut h = Harness::new();
    h.runtime.borrow_mut().fail_all_detections = true;

    let err = h.coordinator.load_image(image_bytes(7)).unwrap_err();

    assert!(matches!(err, CaptureError::ProcessingError { .. }));
    assert_eq!(h.coordinator.mode(), CaptureMode::Idle);
    assert_eq!(h.coordinator.guard().resource_kind(), ResourceKind::None);
    assert_eq!(h.runtime.borrow().outstanding(), 0);
    assert!(h.results.borrow().is_empty());
}

#[test]
fn test_decode_failure_from_camera_ends_idle() {
    let mut h = Harness::new();
    h.coordinator.start_camera().unwrap();

    let err = h.coordinator.load_image(Vec::new()).unwrap_err();

    assert!(matches!(err, CaptureError::DecodeFailed { .. }));
    assert_eq!(h.coordinator.mode(), CaptureMode::Idle);
    assert_eq!(h.camera.borrow().live, 0);
    assert_eq!(h.pump.active_registrations(), 0);
}

#[test]
fn test_failed_track_stop_still_reaches_idle() {
    let mut h = Harness::new();
    h.camera.borrow_mut().fail_stop = true;
    h.coordinator.start_camera().unwrap();

    assert!(h.coordinator.stop().is_ok());

    assert_eq!(h.coordinator.mode(), CaptureMode::Idle);
    assert_eq!(h.coordinator.stats().teardown_faults, 1);
    assert!(!h.coordinator.guard().has_loop());
    assert!(h.events().iter().any(|event| matches!(
        event,
        Event::Status(StatusLevel::Warning, text) if text.contains("Cleanup")
    )));
}

#[test]
fn test_controls_busy_only_during_transitions() {
    let mut h = Harness::new();
    h.coordinator.start_camera().unwrap();

    let controls: Vec<_> = h
        .events()
        .into_iter()
        .filter_map(|event| match event {
            Event::Controls(controls) => Some(controls),
            _ => None,
        })
        .collect();

    assert_eq!(controls.len(), 2);
    assert!(controls[0].busy);
    assert!(!controls[1].busy);
    assert_eq!(controls[1].mode, CaptureMode::Camera);
    assert!(controls[1].can_stop());
}

#[test]
fn test_dropping_coordinator_releases_camera() {
    let mut h = Harness::new();
    h.coordinator.start_camera().unwrap();

    let camera = std::rc::Rc::clone(&h.camera);
    let pump = h.pump.clone();
    drop(h);

    assert_eq!(camera.borrow().live, 0);
    assert_eq!(pump.active_registrations(), 0);
}

#[derive(Debug, Clone)]
enum Op {
    Stop,
    Camera,
    Image { fill: u8, valid: bool },
    Refresh,
    SetReady(bool),
    Deny(bool),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => Just(Op::Stop),
        3 => Just(Op::Camera),
        3 => (any::<u8>(), prop::bool::weighted(0.8))
            .prop_map(|(fill, valid)| Op::Image { fill, valid }),
        4 => Just(Op::Refresh),
        1 => any::<bool>().prop_map(Op::SetReady),
        1 => any::<bool>().prop_map(Op::Deny),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_resources_follow_mode(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut h = Harness::new();

        for op in ops {
            match op {
                Op::Stop => {
                    prop_assert!(h.coordinator.stop().is_ok());
                }
                Op::Camera => {
                    let _ = h.coordinator.start_camera();
                }
                Op::Image { fill, valid } => {
                    let bytes = if valid { image_bytes(fill) } else { Vec::new() };
                    let _ = h.coordinator.load_image(bytes);
                }
                Op::Refresh => h.refresh(),
                Op::SetReady(ready) => h.runtime.borrow_mut().ready = ready,
                Op::Deny(deny) => h.camera.borrow_mut().deny = deny,
            }

            let mode = h.coordinator.mode();
            let camera_live = h.camera.borrow().live;
            let expected_kind = match mode {
                CaptureMode::Idle => ResourceKind::None,
                CaptureMode::Camera => ResourceKind::Camera,
                CaptureMode::StillImage => ResourceKind::Image,
            };

            prop_assert!(camera_live <= 1);
            prop_assert_eq!(camera_live == 1, mode == CaptureMode::Camera);
            prop_assert_eq!(h.coordinator.guard().has_loop(), mode == CaptureMode::Camera);
            prop_assert_eq!(
                h.pump.active_registrations(),
                usize::from(mode == CaptureMode::Camera)
            );
            prop_assert_eq!(h.coordinator.guard().resource_kind(), expected_kind);
            prop_assert_eq!(h.runtime.borrow().outstanding(), 0);
            if let Some(controls) = h.last_controls() {
                prop_assert!(!controls.busy);
            }
        }
    }
}
