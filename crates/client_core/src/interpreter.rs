use std::sync::Arc;

use futures::{Stream, StreamExt};
use shared::{
    domain::{IfExist, ScopeId},
    protocol::{Command, OutputCtl, OutputRequest, ScrollTo, SetScope},
};
use tracing::{debug, error, info, warn};

use crate::{
    error::ProcessError,
    materializer::Materializer,
    scope_store::{resolve_slot, NodeContent, ScopeStore},
    scroll::{ScrollPolicy, Scroller},
    view::{Page, ViewState},
};

#[derive(Debug, Clone, Default)]
pub struct ProcessorConfig {
    pub view: ViewState,
    pub scroll: ScrollPolicy,
}

/// One part of a command that was abandoned.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFailure {
    /// `"output"` for a whole `output` command, otherwise the `output_ctl` key.
    pub field: &'static str,
    pub error: ProcessError,
}

/// What went wrong while handling one command. Empty when everything applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub failures: Vec<FieldFailure>,
}

impl Report {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, field: &'static str, result: Result<(), ProcessError>) {
        let Err(error) = result else {
            return;
        };
        if error.is_warning() {
            warn!(field, %error, "processor: command field skipped");
        } else {
            error!(field, %error, "processor: command field failed");
        }
        self.failures.push(FieldFailure { field, error });
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub commands: usize,
    pub failed_fields: usize,
}

/// Sole owner of the scope tree and the view state.
///
/// Commands go through [`handle_message`](Self::handle_message) strictly one
/// after another. Failures never escape: each is logged and returned in the
/// [`Report`], and the processor stays ready for the next command.
pub struct CommandProcessor {
    store: ScopeStore,
    view: ViewState,
    policy: ScrollPolicy,
    materializer: Arc<dyn Materializer>,
    scroller: Arc<dyn Scroller>,
    page: Arc<dyn Page>,
}

impl CommandProcessor {
    pub fn new(
        materializer: Arc<dyn Materializer>,
        scroller: Arc<dyn Scroller>,
        page: Arc<dyn Page>,
    ) -> Self {
        Self::with_config(ProcessorConfig::default(), materializer, scroller, page)
    }

    pub fn with_config(
        config: ProcessorConfig,
        materializer: Arc<dyn Materializer>,
        scroller: Arc<dyn Scroller>,
        page: Arc<dyn Page>,
    ) -> Self {
        Self {
            store: ScopeStore::new(),
            view: config.view,
            policy: config.scroll,
            materializer,
            scroller,
            page,
        }
    }

    pub fn store(&self) -> &ScopeStore {
        &self.store
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn handle_message(&mut self, command: Command) -> Report {
        let mut report = Report::default();
        match command {
            Command::Output(request) => {
                let result = self.output(request);
                report.record("output", result);
            }
            Command::OutputCtl(ctl) => self.output_ctl(ctl, &mut report),
        }
        report
    }

    /// Apply commands as they arrive until the stream ends.
    pub async fn run<S>(&mut self, mut commands: S) -> RunSummary
    where
        S: Stream<Item = Command> + Unpin,
    {
        let mut summary = RunSummary::default();
        while let Some(command) = commands.next().await {
            let report = self.handle_message(command);
            summary.commands += 1;
            summary.failed_fields += report.failures.len();
        }
        info!(
            commands = summary.commands,
            failed_fields = summary.failed_fields,
            "processor: command stream ended"
        );
        summary
    }

    fn output(&mut self, request: OutputRequest) -> Result<(), ProcessError> {
        let widget = self.materializer.materialize(&request.widget)?;
        let kind = widget.kind.clone();
        self.store
            .insert_at(&request.scope, NodeContent::Widget(widget), request.position)?;
        debug!(
            scope = %request.scope,
            position = request.position,
            kind = %kind,
            "processor: widget inserted"
        );

        let scroll_eligible = request.scope.is_root();
        for action in self.policy.after_output(&self.view, scroll_eligible) {
            action.dispatch(self.scroller.as_ref());
        }
        Ok(())
    }

    fn output_ctl(&mut self, ctl: OutputCtl, report: &mut Report) {
        if let Some(title) = ctl.title {
            self.page.set_title(&title);
        }
        if let Some(enabled) = ctl.output_fixed_height {
            self.view.output_fixed_height = enabled;
            self.page.set_fixed_height(enabled);
        }
        if let Some(enabled) = ctl.auto_scroll_bottom {
            self.view.auto_scroll_bottom = enabled;
        }
        if let Some(request) = ctl.set_scope {
            let result = self.set_scope(request);
            report.record("set_scope", result);
        }
        if let Some(id) = ctl.clear {
            let result = self.store.clear_contents(&id).map(|n| removed("clear", &id, n));
            report.record("clear", result);
        }
        if let Some(id) = ctl.clear_before {
            let result = self
                .store
                .remove_siblings_before(&id)
                .map(|n| removed("clear_before", &id, n));
            report.record("clear_before", result);
        }
        if let Some(id) = ctl.clear_after {
            let result = self
                .store
                .remove_siblings_after(&id)
                .map(|n| removed("clear_after", &id, n));
            report.record("clear_after", result);
        }
        if let Some(request) = ctl.scroll_to {
            let result = self.scroll_to(request);
            report.record("scroll_to", result);
        }
        if let Some((start, end)) = ctl.clear_range {
            let result = self.clear_range(&start, &end);
            report.record("clear_range", result);
        }
        if let Some(id) = ctl.remove {
            let result = self.store.remove_subtree(&id).map(|n| removed("remove", &id, n));
            report.record("remove", result);
        }
    }

    fn set_scope(&mut self, request: SetScope) -> Result<(), ProcessError> {
        let container = self
            .store
            .find(&request.container)
            .ok_or_else(|| ProcessError::ScopeNotFound(request.container.clone()))?;

        if let Some(existing) = self.store.find(&request.id) {
            match request.if_exist {
                IfExist::Keep => {
                    debug!(scope = %request.id, "processor: scope already exists, keeping it");
                    return Ok(());
                }
                IfExist::Clear => {
                    let n = self.store.clear_contents(&request.id)?;
                    removed("set_scope", &request.id, n);
                    return Ok(());
                }
                IfExist::Remove => {
                    // Recreating a scope inside the one being replaced would
                    // leave the new scope without a parent.
                    if self.store.is_within(container, existing) {
                        return Err(ProcessError::ScopeNotFound(request.container));
                    }
                    // The slot must resolve against the container as it will
                    // look once the old scope is gone.
                    let mut len = self.store.children(container).len();
                    let old_parent = self.store.get(existing).and_then(|node| node.parent());
                    if old_parent == Some(container) {
                        len -= 1;
                    }
                    if resolve_slot(len, request.position).is_none() {
                        return Err(ProcessError::PositionOutOfRange {
                            parent: request.container,
                            position: request.position,
                            len,
                        });
                    }
                    self.store.remove_subtree(&request.id)?;
                }
            }
        }

        self.store
            .create_scope(&request.container, request.id.clone(), request.position)?;
        debug!(
            scope = %request.id,
            container = %request.container,
            position = request.position,
            "processor: scope created"
        );
        Ok(())
    }

    fn scroll_to(&self, request: ScrollTo) -> Result<(), ProcessError> {
        if !self.store.contains(&request.target) {
            return Err(ProcessError::ScopeNotFound(request.target));
        }
        self.policy
            .scroll_to(&self.view, request.target, request.position)
            .dispatch(self.scroller.as_ref());
        Ok(())
    }

    fn clear_range(&mut self, start: &ScopeId, end: &ScopeId) -> Result<(), ProcessError> {
        for id in [start, end] {
            if !self.store.contains(id) {
                return Err(ProcessError::ScopeNotFound(id.clone()));
            }
        }
        let n = self.store.remove_range(start, end)?;
        removed("clear_range", start, n);
        Ok(())
    }
}

fn removed(field: &'static str, id: &ScopeId, nodes: usize) {
    debug!(field, scope = %id, nodes, "processor: nodes removed");
}

#[cfg(test)]
#[path = "tests/interpreter_tests.rs"]
mod tests;
