/// Document-wide display flags, written only by `output_ctl`.
///
/// Commands are applied one at a time by a single owner, so this lives as a
/// plain value inside the processor without any locking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewState {
    /// Output renders inside a bounded, independently scrollable box.
    pub output_fixed_height: bool,
    /// New root output pulls the viewport to the bottom.
    pub auto_scroll_bottom: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            output_fixed_height: true,
            auto_scroll_bottom: true,
        }
    }
}

/// Page-level side effects that do not touch the scope tree.
pub trait Page: Send + Sync {
    fn set_title(&self, title: &str);
    /// Switch the output area between the bounded box and free document flow.
    fn set_fixed_height(&self, enabled: bool);
}
