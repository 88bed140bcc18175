use super::*;

#[test]
fn fps_rejects_zero_parts() {
    assert!(Fps::new(0, 1).is_err());
    assert!(Fps::new(30, 0).is_err());
    assert!(Fps::new(30, 1).is_ok());
}

#[test]
fn fps_rejects_rates_with_a_zero_frame_interval() {
    assert!(Fps::new(1_000_000_000, 1).is_ok());
    assert!(Fps::new(2_000_000_000, 1).is_err());
    assert!(Fps::new(u32::MAX, 1).is_err());
}

#[test]
fn frames_due_counts_slot_zero_at_start() {
    let fps = Fps::new(30, 1).unwrap();
    assert_eq!(fps.frames_due(Duration::ZERO), 1);
    assert_eq!(fps.frames_due(Duration::from_millis(33)), 1);
    assert_eq!(fps.frames_due(Duration::from_millis(34)), 2);
}

#[test]
fn ceil_timestamps_round_trip_through_frames_due() {
    let fps = Fps::new(30_000, 1001).unwrap();
    for k in [0u64, 1, 2, 29, 30, 299, 1_000] {
        assert_eq!(fps.frames_due(fps.frames_to_duration_ceil(k)), k + 1);
    }
}

#[test]
fn frames_to_cover_rounds_up() {
    let fps = Fps::new(30, 1).unwrap();
    assert_eq!(fps.frames_to_cover(Duration::from_millis(9_000)), 270);
    assert_eq!(fps.frames_to_cover(Duration::from_millis(9_001)), 271);
    assert_eq!(fps.frames_to_cover(Duration::ZERO), 0);
}

#[test]
fn canvas_validation_catches_bad_values() {
    assert!(Canvas { width: 0, height: 10 }.validate().is_err());
    assert!(Canvas { width: 11, height: 10 }.validate().is_err());
    assert!(Canvas { width: 70_000, height: 10 }.validate().is_err());
    assert!(Canvas { width: 1280, height: 720 }.validate().is_ok());
}
