use std::time::Duration;

use serde::Serialize;
use shared::domain::{ScopeId, ScrollPosition};

use crate::view::ViewState;

/// Delay before scrolling the fixed-height box so fresh output has settled.
pub const SETTLE_DELAY: Duration = Duration::from_millis(15);
pub const CONTAINER_BOTTOM_PADDING: u32 = 30;
pub const DOCUMENT_BOTTOM_PADDING: u32 = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ScrollTarget {
    /// The output area as a whole.
    Output,
    Scope(ScopeId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollRequest {
    pub target: ScrollTarget,
    pub position: ScrollPosition,
    /// Extra room kept between the target edge and the viewport edge.
    pub padding: u32,
    /// How long the scroller should wait before it starts moving.
    pub delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrollAction {
    /// Scroll inside the fixed-height output box.
    Container(ScrollRequest),
    /// Scroll the page itself.
    Document(ScrollRequest),
}

impl ScrollAction {
    pub fn request(&self) -> &ScrollRequest {
        match self {
            ScrollAction::Container(request) | ScrollAction::Document(request) => request,
        }
    }

    pub fn dispatch(self, scroller: &dyn Scroller) {
        match self {
            ScrollAction::Container(request) => scroller.scroll(request),
            ScrollAction::Document(request) => scroller.scroll_document(request),
        }
    }
}

/// The two scroll primitives. Both return immediately; any animation runs on
/// its own.
pub trait Scroller: Send + Sync {
    fn scroll(&self, request: ScrollRequest);
    fn scroll_document(&self, request: ScrollRequest);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollPolicy {
    pub settle_delay: Duration,
    pub container_bottom_padding: u32,
    pub document_bottom_padding: u32,
}

impl Default for ScrollPolicy {
    fn default() -> Self {
        Self {
            settle_delay: SETTLE_DELAY,
            container_bottom_padding: CONTAINER_BOTTOM_PADDING,
            document_bottom_padding: DOCUMENT_BOTTOM_PADDING,
        }
    }
}

impl ScrollPolicy {
    /// Scrolling owed after an `output` command. Only output landing in the
    /// root scope is eligible, and only while auto-scroll is on. The box
    /// scroll in fixed-height mode comes in addition to the page scroll.
    pub fn after_output(&self, view: &ViewState, scroll_eligible: bool) -> Vec<ScrollAction> {
        if !scroll_eligible || !view.auto_scroll_bottom {
            return Vec::new();
        }

        let mut actions = Vec::with_capacity(2);
        if view.output_fixed_height {
            actions.push(ScrollAction::Container(ScrollRequest {
                target: ScrollTarget::Output,
                position: ScrollPosition::Bottom,
                padding: self.container_bottom_padding,
                delay: self.settle_delay,
            }));
        }
        actions.push(ScrollAction::Document(ScrollRequest {
            target: ScrollTarget::Output,
            position: ScrollPosition::Bottom,
            padding: self.document_bottom_padding,
            delay: Duration::ZERO,
        }));
        actions
    }

    /// An explicit `scroll_to`, regardless of auto-scroll.
    pub fn scroll_to(
        &self,
        view: &ViewState,
        target: ScopeId,
        position: ScrollPosition,
    ) -> ScrollAction {
        let request = ScrollRequest {
            target: ScrollTarget::Scope(target),
            position,
            padding: 0,
            delay: Duration::ZERO,
        };
        if view.output_fixed_height {
            ScrollAction::Container(request)
        } else {
            ScrollAction::Document(request)
        }
    }
}

#[cfg(test)]
#[path = "tests/scroll_tests.rs"]
mod tests;
