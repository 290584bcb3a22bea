use deskband_pipe::{logging, Settings};
use serial_test::serial;
use std::{fs, thread::sleep, time::Duration};
use tempfile::tempdir;

#[test]
#[serial]
fn settings_drive_log_file_and_diagnostics() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("band.log");
    let trace = dir.path().join("trace.log");
    let settings = Settings {
        debug_logging: true,
        log_file: Some(log.to_string_lossy().into_owned()),
        diagnostics_enabled: true,
        diagnostics_file: Some(trace.to_string_lossy().into_owned()),
        ..Settings::default()
    };

    logging::init_from_settings(&settings);
    assert!(logging::diagnostics_enabled());
    assert_eq!(logging::diagnostics_path(), trace);

    tracing::info!("control surface log line");
    // the file layer writes through a background worker
    sleep(Duration::from_millis(100));

    let contents = fs::read_to_string(&log).expect("log file was not created");
    assert!(contents.contains("control surface log line"));
    let traced = fs::read_to_string(&trace).expect("diagnostics file was not created");
    assert!(traced.contains("control surface log line"));

    logging::set_diagnostics_enabled(false);
    tracing::info!("after diagnostics off");
    sleep(Duration::from_millis(100));
    assert!(!fs::read_to_string(&trace).unwrap().contains("after diagnostics off"));
}
