use super::*;
use std::sync::Mutex;

use serde_json::{json, Value};
use shared::{domain::ScrollPosition, protocol::WidgetSpec};

use crate::{
    materializer::{BasicMaterializer, RenderError, RenderedWidget},
    scope_store::SnapshotNode,
    scroll::{ScrollAction, ScrollRequest, ScrollTarget},
};

#[derive(Default)]
struct RecordingScroller {
    calls: Mutex<Vec<ScrollAction>>,
}

impl RecordingScroller {
    fn calls(&self) -> Vec<ScrollAction> {
        self.calls.lock().expect("scroller lock").clone()
    }
}

impl Scroller for RecordingScroller {
    fn scroll(&self, request: ScrollRequest) {
        self.calls
            .lock()
            .expect("scroller lock")
            .push(ScrollAction::Container(request));
    }

    fn scroll_document(&self, request: ScrollRequest) {
        self.calls
            .lock()
            .expect("scroller lock")
            .push(ScrollAction::Document(request));
    }
}

#[derive(Default)]
struct RecordingPage {
    titles: Mutex<Vec<String>>,
    fixed_height: Mutex<Vec<bool>>,
}

impl Page for RecordingPage {
    fn set_title(&self, title: &str) {
        self.titles.lock().expect("page lock").push(title.to_string());
    }

    fn set_fixed_height(&self, enabled: bool) {
        self.fixed_height.lock().expect("page lock").push(enabled);
    }
}

/// Fails every widget whose spec carries `"broken": true`.
struct FlakyMaterializer;

impl Materializer for FlakyMaterializer {
    fn materialize(&self, spec: &WidgetSpec) -> Result<RenderedWidget, RenderError> {
        if spec.get("broken") == Some(&Value::Bool(true)) {
            return Err(RenderError::UnknownWidget("broken".into()));
        }
        BasicMaterializer.materialize(spec)
    }
}

struct Harness {
    processor: CommandProcessor,
    scroller: Arc<RecordingScroller>,
    page: Arc<RecordingPage>,
}

impl Harness {
    fn new() -> Self {
        Self::with_view(ViewState::default())
    }

    fn with_view(view: ViewState) -> Self {
        let scroller = Arc::new(RecordingScroller::default());
        let page = Arc::new(RecordingPage::default());
        let processor = CommandProcessor::with_config(
            ProcessorConfig {
                view,
                ..ProcessorConfig::default()
            },
            Arc::new(FlakyMaterializer),
            scroller.clone(),
            page.clone(),
        );
        Self {
            processor,
            scroller,
            page,
        }
    }

    fn send(&mut self, value: Value) -> Report {
        let command = Command::from_json(&value.to_string()).expect("valid command");
        self.processor.handle_message(command)
    }

    fn text(&mut self, content: &str, scope: Option<&str>, position: Option<i64>) -> Report {
        let mut spec = json!({"type": "text", "content": content});
        if let Some(scope) = scope {
            spec["scope"] = json!(scope);
        }
        if let Some(position) = position {
            spec["position"] = json!(position);
        }
        self.send(json!({"command": "output", "spec": spec}))
    }

    fn ctl(&mut self, spec: Value) -> Report {
        self.send(json!({"command": "output_ctl", "spec": spec}))
    }

    fn labels(&self, id: &str) -> Vec<String> {
        let Some(SnapshotNode::Scope { children, .. }) =
            self.processor.store().snapshot_of(&ScopeId::from(id))
        else {
            panic!("scope {id} missing");
        };
        children
            .into_iter()
            .map(|child| match child {
                SnapshotNode::Scope { id, .. } => format!("#{id}"),
                SnapshotNode::Widget { content, .. } => content["content"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect()
    }

    fn root_labels(&self) -> Vec<String> {
        self.labels(shared::domain::ROOT_SCOPE_ID)
    }
}

fn failed_fields(report: &Report) -> Vec<&'static str> {
    report.failures.iter().map(|f| f.field).collect()
}

#[test]
fn output_appends_to_root_by_default() {
    let mut h = Harness::new();
    for label in ["1", "2", "3"] {
        assert!(h.text(label, None, None).is_clean());
    }
    assert_eq!(h.root_labels(), ["1", "2", "3"]);
}

#[test]
fn output_at_zero_prepends() {
    let mut h = Harness::new();
    for label in ["1", "2", "3"] {
        h.text(label, None, Some(0));
    }
    assert_eq!(h.root_labels(), ["3", "2", "1"]);
}

#[test]
fn output_into_nested_scope_with_position() {
    let mut h = Harness::new();
    h.ctl(json!({"set_scope": "box"}));
    h.text("a", Some("box"), None);
    h.text("c", Some("#box"), None);
    h.text("b", Some("box"), Some(1));
    assert_eq!(h.labels("box"), ["a", "b", "c"]);
    assert_eq!(h.root_labels(), ["#box"]);
}

#[test]
fn render_failure_aborts_only_that_command() {
    let mut h = Harness::new();
    let report = h.send(json!({
        "command": "output",
        "spec": {"type": "text", "content": "x", "broken": true}
    }));
    assert_eq!(
        report.failures,
        vec![FieldFailure {
            field: "output",
            error: ProcessError::Render(RenderError::UnknownWidget("broken".into())),
        }]
    );
    assert!(h.processor.store().is_empty());
    assert!(h.scroller.calls().is_empty());

    assert!(h.text("next", None, None).is_clean());
    assert_eq!(h.root_labels(), ["next"]);
}

#[test]
fn output_to_missing_scope_is_logged_and_skipped() {
    let mut h = Harness::new();
    let report = h.text("x", Some("ghost"), None);
    assert_eq!(
        report.failures[0].error,
        ProcessError::ScopeNotFound(ScopeId::from("ghost"))
    );
    assert!(h.processor.store().is_empty());
    assert!(h.scroller.calls().is_empty());
}

#[test]
fn root_output_scrolls_document_only_without_fixed_height() {
    let mut h = Harness::with_view(ViewState {
        output_fixed_height: false,
        auto_scroll_bottom: true,
    });
    h.text("x", None, None);

    let calls = h.scroller.calls();
    assert_eq!(calls.len(), 1);
    assert!(matches!(calls[0], ScrollAction::Document(_)));
}

#[test]
fn root_output_scrolls_container_and_document_with_fixed_height() {
    let mut h = Harness::new();
    h.text("x", Some("#pywebio-scope-ROOT"), None);

    let calls = h.scroller.calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(calls[0], ScrollAction::Container(_)));
    assert!(matches!(calls[1], ScrollAction::Document(_)));
}

#[test]
fn nested_output_never_auto_scrolls() {
    let mut h = Harness::new();
    h.ctl(json!({"set_scope": "box"}));
    h.text("x", Some("box"), None);
    assert!(h.scroller.calls().is_empty());
}

#[test]
fn auto_scroll_flag_gates_output_scrolling() {
    let mut h = Harness::new();
    h.ctl(json!({"auto_scroll_bottom": false}));
    h.text("x", None, None);
    assert!(h.scroller.calls().is_empty());
    assert!(!h.processor.view().auto_scroll_bottom);

    h.ctl(json!({"auto_scroll_bottom": true}));
    h.text("y", None, None);
    assert_eq!(h.scroller.calls().len(), 2);
}

#[test]
fn title_and_fixed_height_reach_the_page() {
    let mut h = Harness::new();
    let report = h.ctl(json!({"title": "Rent", "output_fixed_height": false}));
    assert!(report.is_clean());
    assert_eq!(*h.page.titles.lock().expect("page lock"), vec!["Rent"]);
    assert_eq!(*h.page.fixed_height.lock().expect("page lock"), vec![false]);
    assert!(!h.processor.view().output_fixed_height);
}

#[test]
fn set_scope_requires_existing_container() {
    let mut h = Harness::new();
    let report = h.ctl(json!({"set_scope": "a", "container": "missing"}));
    assert_eq!(failed_fields(&report), ["set_scope"]);
    assert_eq!(
        report.failures[0].error,
        ProcessError::ScopeNotFound(ScopeId::from("missing"))
    );
    assert!(!h.processor.store().contains(&ScopeId::from("a")));
}

#[test]
fn set_scope_honours_position() {
    let mut h = Harness::new();
    h.ctl(json!({"set_scope": "a"}));
    h.ctl(json!({"set_scope": "c"}));
    h.ctl(json!({"set_scope": "b", "position": 1}));
    h.ctl(json!({"set_scope": "first", "position": 0}));
    h.ctl(json!({"set_scope": "penultimate", "position": -2}));
    assert_eq!(
        h.root_labels(),
        ["#first", "#a", "#b", "#penultimate", "#c"]
    );
}

#[test]
fn set_scope_twice_without_if_exist_is_ignored() {
    let mut h = Harness::new();
    h.ctl(json!({"set_scope": "x", "container": "pywebio-scope-ROOT", "position": -1}));
    h.text("kept", Some("x"), None);
    let before = h.processor.store().snapshot();

    let report = h.ctl(json!({"set_scope": "x", "container": "pywebio-scope-ROOT", "position": -1}));
    assert!(report.is_clean());
    assert_eq!(h.processor.store().snapshot(), before);
}

#[test]
fn set_scope_if_exist_none_is_strict_noop() {
    let mut h = Harness::new();
    h.ctl(json!({"set_scope": "x"}));
    h.text("kept", Some("x"), None);
    let before = h.processor.store().snapshot();

    let report = h.ctl(json!({"set_scope": "x", "position": 0, "if_exist": "none"}));
    assert!(report.is_clean());
    assert_eq!(h.processor.store().snapshot(), before);
}

#[test]
fn set_scope_if_exist_clear_empties_without_recreating() {
    let mut h = Harness::new();
    h.ctl(json!({"set_scope": "x"}));
    h.ctl(json!({"set_scope": "y"}));
    h.text("old", Some("x"), None);

    let report = h.ctl(json!({"set_scope": "x", "position": -1, "if_exist": "clear"}));
    assert!(report.is_clean());
    assert!(h.labels("x").is_empty());
    // Still in its original slot, not re-appended after `y`.
    assert_eq!(h.root_labels(), ["#x", "#y"]);
}

#[test]
fn set_scope_if_exist_remove_recreates_at_position() {
    let mut h = Harness::new();
    h.ctl(json!({"set_scope": "x"}));
    h.ctl(json!({"set_scope": "inner", "container": "x"}));
    h.ctl(json!({"set_scope": "y"}));
    h.text("old", Some("x"), None);

    let report = h.ctl(json!({"set_scope": "x", "position": -1, "if_exist": "remove"}));
    assert!(report.is_clean());
    assert!(h.labels("x").is_empty());
    assert!(!h.processor.store().contains(&ScopeId::from("inner")));
    assert_eq!(h.root_labels(), ["#y", "#x"]);
}

#[test]
fn set_scope_remove_with_bad_position_keeps_old_scope() {
    let mut h = Harness::new();
    h.ctl(json!({"set_scope": "x"}));
    h.ctl(json!({"set_scope": "y"}));
    h.text("precious", Some("x"), None);
    let before = h.processor.store().snapshot();

    // Once `x` is gone root holds a single child, so index 1 addresses nothing.
    let report = h.ctl(json!({"set_scope": "x", "position": 1, "if_exist": "remove"}));
    assert_eq!(
        report.failures,
        vec![FieldFailure {
            field: "set_scope",
            error: ProcessError::PositionOutOfRange {
                parent: ScopeId::root(),
                position: 1,
                len: 1,
            },
        }]
    );
    assert_eq!(h.processor.store().snapshot(), before);
    assert_eq!(h.labels("x"), ["precious"]);
}

#[test]
fn set_scope_remove_moves_scope_into_other_container() {
    let mut h = Harness::new();
    h.ctl(json!({"set_scope": "x"}));
    h.ctl(json!({"set_scope": "host"}));
    h.ctl(json!({"set_scope": "a", "container": "host"}));

    let report = h.ctl(json!({
        "set_scope": "x", "container": "host", "position": 0, "if_exist": "remove"
    }));
    assert!(report.is_clean());
    assert_eq!(h.root_labels(), ["#host"]);
    assert_eq!(h.labels("host"), ["#x", "#a"]);
}

#[test]
fn set_scope_remove_into_itself_is_rejected_untouched() {
    let mut h = Harness::new();
    h.ctl(json!({"set_scope": "x"}));
    h.ctl(json!({"set_scope": "inner", "container": "x"}));
    let before = h.processor.store().snapshot();

    let report = h.ctl(json!({"set_scope": "x", "container": "inner", "if_exist": "remove"}));
    assert_eq!(failed_fields(&report), ["set_scope"]);
    assert_eq!(h.processor.store().snapshot(), before);
}

#[test]
fn clear_before_and_after() {
    let mut h = Harness::new();
    for id in ["a", "b", "c", "d", "e"] {
        h.ctl(json!({"set_scope": id}));
    }
    assert!(h.ctl(json!({"clear_before": "b"})).is_clean());
    assert_eq!(h.root_labels(), ["#b", "#c", "#d", "#e"]);

    assert!(h.ctl(json!({"clear_after": "d"})).is_clean());
    assert_eq!(h.root_labels(), ["#b", "#c"]);
}

#[test]
fn clear_range_scenario() {
    let mut h = Harness::new();
    for id in ["A", "B", "C"] {
        h.ctl(json!({"set_scope": id}));
    }
    assert!(h.ctl(json!({"clear_range": ["A", "C"]})).is_clean());
    assert_eq!(h.root_labels(), ["#A", "#C"]);
}

#[test]
fn clear_range_without_reachable_end_is_a_warning() {
    let mut h = Harness::new();
    for id in ["A", "B", "C"] {
        h.ctl(json!({"set_scope": id}));
    }
    let report = h.ctl(json!({"clear_range": ["C", "A"]}));
    assert!(report.failures[0].error.is_warning());
    assert_eq!(h.root_labels(), ["#A", "#B", "#C"]);
}

#[test]
fn clear_range_with_missing_endpoint_is_a_noop() {
    let mut h = Harness::new();
    for id in ["A", "B"] {
        h.ctl(json!({"set_scope": id}));
    }
    let report = h.ctl(json!({"clear_range": ["A", "Z"]}));
    assert_eq!(
        report.failures[0].error,
        ProcessError::ScopeNotFound(ScopeId::from("Z"))
    );
    assert_eq!(h.root_labels(), ["#A", "#B"]);
}

#[test]
fn remove_missing_scope_leaves_tree_unchanged() {
    let mut h = Harness::new();
    h.ctl(json!({"set_scope": "a"}));
    let before = h.processor.store().snapshot();

    let report = h.ctl(json!({"remove": "x"}));
    assert_eq!(failed_fields(&report), ["remove"]);
    assert_eq!(h.processor.store().snapshot(), before);
}

#[test]
fn scroll_to_bypasses_auto_scroll_gate() {
    let mut h = Harness::new();
    h.ctl(json!({"auto_scroll_bottom": false, "output_fixed_height": false}));
    h.ctl(json!({"set_scope": "results"}));
    assert!(h.ctl(json!({"scroll_to": "results", "position": "bottom"})).is_clean());

    let calls = h.scroller.calls();
    assert_eq!(calls.len(), 1);
    let ScrollAction::Document(request) = &calls[0] else {
        panic!("expected document scroll, got {:?}", calls[0]);
    };
    assert_eq!(request.target, ScrollTarget::Scope(ScopeId::from("results")));
    assert_eq!(request.position, ScrollPosition::Bottom);
}

#[test]
fn scroll_to_uses_container_in_fixed_height_mode() {
    let mut h = Harness::new();
    h.ctl(json!({"set_scope": "results"}));
    h.ctl(json!({"scroll_to": "results"}));
    let calls = h.scroller.calls();
    assert_eq!(calls.len(), 1);
    assert!(matches!(calls[0], ScrollAction::Container(_)));
}

#[test]
fn scroll_to_missing_target_only_logs() {
    let mut h = Harness::new();
    let report = h.ctl(json!({"scroll_to": "nowhere"}));
    assert_eq!(failed_fields(&report), ["scroll_to"]);
    assert!(h.scroller.calls().is_empty());
}

#[test]
fn ctl_fields_apply_independently_in_order() {
    let mut h = Harness::new();
    for id in ["a", "b", "c"] {
        h.ctl(json!({"set_scope": id}));
    }
    h.text("inside", Some("b"), None);

    // `set_scope` runs before `remove`, `clear` fails without undoing it.
    let report = h.ctl(json!({
        "set_scope": "d",
        "clear": "ghost",
        "clear_after": "c",
        "remove": "a",
        "auto_scroll_bottom": false
    }));
    assert_eq!(failed_fields(&report), ["clear"]);
    assert_eq!(h.root_labels(), ["#b"]);
    assert_eq!(h.labels("b"), ["inside"]);
    assert!(!h.processor.view().auto_scroll_bottom);
}

#[test]
fn root_cannot_be_removed_by_command() {
    let mut h = Harness::new();
    h.text("x", None, None);
    let report = h.ctl(json!({"remove": "pywebio-scope-ROOT"}));
    assert_eq!(
        report.failures[0].error,
        ProcessError::RootScope(ScopeId::root())
    );
    assert_eq!(h.root_labels(), ["x"]);

    assert!(h.ctl(json!({"clear": "pywebio-scope-ROOT"})).is_clean());
    assert!(h.processor.store().is_empty());
}

#[tokio::test]
async fn run_drains_stream_serially() {
    let mut h = Harness::new();
    let commands = [
        json!({"command": "output_ctl", "spec": {"set_scope": "log"}}),
        json!({"command": "output", "spec": {"type": "text", "content": "1", "scope": "log"}}),
        json!({"command": "output", "spec": {"type": "text", "content": "2", "scope": "log"}}),
        json!({"command": "output_ctl", "spec": {"remove": "missing"}}),
    ]
    .into_iter()
    .map(|value| Command::from_json(&value.to_string()).expect("valid command"))
    .collect::<Vec<_>>();

    let summary = h.processor.run(futures::stream::iter(commands)).await;
    assert_eq!(
        summary,
        RunSummary {
            commands: 4,
            failed_fields: 1,
        }
    );
    assert_eq!(h.labels("log"), ["1", "2"]);
}
