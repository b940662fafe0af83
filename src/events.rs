use crossbeam_channel::{unbounded, Receiver, Sender};
use eframe::egui;

use crate::bot::BotEvent;

/// Everything that reaches the window from another thread.
pub enum UiEvent {
    ImageLoaded {
        generation: u64,
        image: egui::ColorImage,
    },
    Bot(BotEvent),
}

impl std::fmt::Debug for UiEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UiEvent::ImageLoaded { generation, image } => f
                .debug_struct("ImageLoaded")
                .field("generation", generation)
                .field("size", &image.size)
                .finish(),
            UiEvent::Bot(event) => f.debug_tuple("Bot").field(event).finish(),
        }
    }
}

/// Cloneable producer half of the window's event queue.
///
/// Every send also asks egui for a repaint so the update loop wakes up and
/// drains the queue even when the user is not moving the mouse.
#[derive(Clone)]
pub struct EventSink {
    tx: Sender<UiEvent>,
    ctx: Option<egui::Context>,
}

impl EventSink {
    pub fn channel(ctx: Option<egui::Context>) -> (Self, Receiver<UiEvent>) {
        let (tx, rx) = unbounded();
        (Self { tx, ctx }, rx)
    }

    pub fn send(&self, event: UiEvent) {
        // The window is gone once the receiver drops; nothing left to notify.
        if self.tx.send(event).is_ok() {
            if let Some(ctx) = &self.ctx {
                ctx.request_repaint();
            }
        }
    }

    pub fn bot(&self, event: BotEvent) {
        self.send(UiEvent::Bot(event));
    }
}
