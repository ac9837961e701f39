use tokio::sync::broadcast;
use tracing::debug;

use crate::{
    scroll::{ScrollAction, ScrollRequest, Scroller},
    view::Page,
};

/// Side effect requested by the processor for whoever draws the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    TitleChanged(String),
    FixedHeightChanged(bool),
    Scroll(ScrollAction),
}

/// Publishes page and scroll side effects on a broadcast channel.
///
/// Sending never blocks and never fails the command that caused it: with no
/// subscriber the event is simply dropped.
#[derive(Clone)]
pub struct BroadcastSink {
    events: broadcast::Sender<ViewEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self { events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: ViewEvent) {
        if self.events.send(event).is_err() {
            debug!("view: no subscriber for view event");
        }
    }
}

impl Page for BroadcastSink {
    fn set_title(&self, title: &str) {
        self.publish(ViewEvent::TitleChanged(title.to_string()));
    }

    fn set_fixed_height(&self, enabled: bool) {
        self.publish(ViewEvent::FixedHeightChanged(enabled));
    }
}

impl Scroller for BroadcastSink {
    fn scroll(&self, request: ScrollRequest) {
        self.publish(ViewEvent::Scroll(ScrollAction::Container(request)));
    }

    fn scroll_document(&self, request: ScrollRequest) {
        self.publish(ViewEvent::Scroll(ScrollAction::Document(request)));
    }
}
