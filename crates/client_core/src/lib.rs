pub mod error;
pub mod interpreter;
pub mod materializer;
pub mod scope_store;
pub mod scroll;
pub mod sink;
pub mod view;

pub use error::ProcessError;
pub use interpreter::{CommandProcessor, FieldFailure, ProcessorConfig, Report, RunSummary};
pub use materializer::{BasicMaterializer, Materializer, RenderError, RenderedWidget};
pub use scope_store::{NodeContent, NodeKey, ScopeStore, SnapshotNode};
pub use scroll::{ScrollAction, ScrollPolicy, ScrollRequest, ScrollTarget, Scroller};
pub use sink::{BroadcastSink, ViewEvent};
pub use view::{Page, ViewState};
