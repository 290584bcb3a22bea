use crate::store::{Rect, TextInfo};
use std::sync::mpsc::{channel, Receiver, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

/// Window the control surface draws into.
///
/// Called from the server thread. `invalidate` and `post_message` only queue work
/// for the host event thread and must not wait for it.
pub trait WindowHost: Send + Sync {
    fn client_extent(&self) -> Size;
    fn measure_text(&self, text: &str) -> Size;
    fn invalidate(&self);
    fn post_message(&self, message_id: u32);
}

/// A record ready to be drawn, with bounds derived from the measured text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedText {
    pub info: TextInfo,
    pub bounds: Rect,
}

/// Draw context handed to [`crate::ControlSurface::render`] by the host.
pub trait TextPainter {
    fn draw_text(&mut self, text: &RenderedText);
}

impl TextPainter for Vec<RenderedText> {
    fn draw_text(&mut self, text: &RenderedText) {
        self.push(text.clone());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Repaint,
    Message(u32),
}

/// Window host without a real window.
///
/// Text is measured on a fixed cell grid and repaint requests and posted messages
/// are forwarded as [`HostEvent`]s to whoever plays the event thread.
pub struct HeadlessHost {
    extent: Size,
    cell: Size,
    events: Sender<HostEvent>,
}

impl HeadlessHost {
    pub const DEFAULT_EXTENT: Size = Size {
        width: 160,
        height: 40,
    };
    pub const DEFAULT_CELL: Size = Size {
        width: 8,
        height: 16,
    };

    pub fn new() -> (Self, Receiver<HostEvent>) {
        Self::with_metrics(Self::DEFAULT_EXTENT, Self::DEFAULT_CELL)
    }

    pub fn with_metrics(extent: Size, cell: Size) -> (Self, Receiver<HostEvent>) {
        let (tx, rx) = channel();
        (
            Self {
                extent,
                cell,
                events: tx,
            },
            rx,
        )
    }

    fn emit(&self, event: HostEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!(?event, "host event dropped; no event loop attached");
        }
    }
}

impl WindowHost for HeadlessHost {
    fn client_extent(&self) -> Size {
        self.extent
    }

    fn measure_text(&self, text: &str) -> Size {
        let chars = i32::try_from(text.chars().count()).unwrap_or(i32::MAX);
        Size {
            width: chars.saturating_mul(self.cell.width),
            height: self.cell.height,
        }
    }

    fn invalidate(&self) {
        self.emit(HostEvent::Repaint);
    }

    fn post_message(&self, message_id: u32) {
        self.emit(HostEvent::Message(message_id));
    }
}
