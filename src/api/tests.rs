use super::*;

// The engine is a process-wide singleton, so lifecycle checks live in one
// test to keep them ordered.
#[test]
fn test_engine_lifecycle_through_api() {
    shutdown_engine();
    assert_eq!(start_timer(), Err(EngineError::NotRunning));
    assert!(!push_accelerometer_reading(0.0, 0.0, 1.0));

    init_engine(String::new()).unwrap();
    assert_eq!(init_engine(String::new()), Err(EngineError::AlreadyRunning));
    // The worker subscribes the feed asynchronously.
    with_engine(|engine| engine.flush()).unwrap();
    assert!(push_accelerometer_reading(0.0, 0.0, 1.0));

    set_sensitivity_level(3).unwrap();
    start_timer().unwrap();
    with_engine(|engine| engine.flush()).unwrap();
    let snapshot = get_snapshot().unwrap();
    assert_eq!(snapshot.sensitivity_level, 3);
    assert_eq!(snapshot.status, crate::timer::ShotStatus::Brewing);

    app_backgrounded().unwrap();
    with_engine(|engine| engine.flush()).unwrap();
    assert!(!push_accelerometer_reading(0.0, 0.0, 1.0));
    assert_eq!(
        get_snapshot().unwrap().status,
        crate::timer::ShotStatus::Finished
    );

    app_foregrounded().unwrap();
    with_engine(|engine| engine.flush()).unwrap();
    assert!(push_accelerometer_reading(0.0, 0.0, 1.0));

    set_has_seen_onboarding(true).unwrap();
    assert!(has_seen_onboarding().unwrap());

    shutdown_engine();
    assert_eq!(get_snapshot(), Err(EngineError::NotRunning));
}

#[test]
fn test_get_version() {
    assert_eq!(get_version(), env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_error_code_tables() {
    let _ = get_engine_error_codes();
    assert_eq!(EngineErrorCodes::NOT_RUNNING, 1002);
    assert_eq!(CalibrationErrorCodes::EMPTY_SESSION, 2001);
}
