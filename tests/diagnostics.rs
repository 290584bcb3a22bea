#![cfg(unix)]

use deskband_pipe::{logging, ControlClient, ControlSurface, HeadlessHost, RenderedText, Settings};
use serial_test::serial;
use std::sync::Arc;
use std::{fs, thread::sleep, time::Duration};
use tempfile::tempdir;

#[test]
#[serial]
fn trace_is_written_only_while_enabled() {
    let dir = tempdir().unwrap();
    let trace = dir.path().join("trace.log");
    logging::set_diagnostics_path(&trace);
    logging::set_diagnostics_enabled(false);
    logging::init(false, None);

    let settings = Settings {
        pipe_name: dir.path().join("control.sock").to_string_lossy().into_owned(),
        ..Settings::default()
    };
    let (host, _events) = HeadlessHost::new();
    let surface = ControlSurface::start(&settings, Arc::new(host)).unwrap();
    let mut client = ControlClient::connect(surface.address()).unwrap();

    client.expect_ok(&["NEW_TEXTINFO"]).unwrap();
    client.expect_ok(&["SET", "TEXT", "quiet"]).unwrap();
    surface.render(&mut Vec::<RenderedText>::new());
    sleep(Duration::from_millis(50));
    assert!(!trace.exists(), "trace written while disabled");

    client.set_logging(true).unwrap();
    client.expect_ok(&["SET", "TEXT", "traced"]).unwrap();
    surface.render(&mut Vec::<RenderedText>::new());
    client.set_logging(false).unwrap();
    client.expect_ok(&["SET", "TEXT", "silent again"]).unwrap();
    surface.render(&mut Vec::<RenderedText>::new());
    sleep(Duration::from_millis(50));

    let contents = fs::read_to_string(&trace).unwrap();
    assert!(contents.contains("SET,TEXT,traced"));
    assert!(contents.contains("Text:  traced"));
    assert!(!contents.contains("silent again"));
    assert!(!logging::diagnostics_enabled());
}
