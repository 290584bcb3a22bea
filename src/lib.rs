pub mod action_map;
pub mod channel;
pub mod client;
pub mod dispatcher;
pub mod host;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod settings;
pub mod state;
pub mod store;
pub mod surface;

#[cfg(target_os = "windows")]
pub mod win32;

pub use client::ControlClient;
pub use host::{HeadlessHost, HostEvent, RenderedText, Size, TextPainter, WindowHost};
pub use settings::Settings;
pub use surface::ControlSurface;
