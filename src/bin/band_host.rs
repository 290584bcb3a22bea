use deskband_pipe::{logging, ControlSurface, HeadlessHost, HostEvent, RenderedText, Settings};
use std::sync::Arc;

/// Headless stand-in for the host window: serves the control channel and plays the
/// window's event thread, printing the overlay on every repaint.
fn main() -> anyhow::Result<()> {
    let settings_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "settings.json".to_string());
    let settings = Settings::load(&settings_path)?;
    logging::init_from_settings(&settings);

    let (host, events) = HeadlessHost::new();
    let surface = ControlSurface::start(&settings, Arc::new(host))?;
    tracing::info!(address = surface.address(), "band host ready");

    while surface.is_running() {
        let event = match events.recv_timeout(std::time::Duration::from_millis(200)) {
            Ok(event) => event,
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        };
        match event {
            HostEvent::Repaint => {
                let mut frame: Vec<RenderedText> = Vec::new();
                surface.render(&mut frame);
                println!("--- repaint ({} texts)", frame.len());
                for item in &frame {
                    let c = item.info.color;
                    println!(
                        "[{},{} {}x{}] rgb({},{},{}) {}",
                        item.bounds.left,
                        item.bounds.top,
                        item.bounds.right - item.bounds.left,
                        item.bounds.bottom - item.bounds.top,
                        c.red,
                        c.green,
                        c.blue,
                        item.info.text
                    );
                }
            }
            HostEvent::Message(id) => {
                let code = surface.handle_host_message(id);
                tracing::info!(message_id = id, exit_code = code, "host message handled");
            }
        }
    }

    tracing::info!("control surface stopped; exiting");
    Ok(())
}
