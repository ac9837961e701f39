use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    domain::{IfExist, ScopeId, ScrollPosition, APPEND},
    error::ProtocolError,
};

/// Widget description forwarded untouched to the materializer.
pub type WidgetSpec = Map<String, Value>;

/// Command exactly as the server puts it on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", content = "spec", rename_all = "snake_case")]
pub enum WireCommand {
    Output(OutputSpec),
    OutputCtl(OutputCtlSpec),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(flatten)]
    pub widget: WidgetSpec,
}

/// `position` is shared between `set_scope` (child index) and `scroll_to`
/// (viewport anchor), so on the wire it is either shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CtlPosition {
    Index(i64),
    Anchor(ScrollPosition),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputCtlSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_fixed_height: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_scroll_bottom: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_scope: Option<ScopeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<ScopeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<CtlPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_exist: Option<IfExist>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear: Option<ScopeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_before: Option<ScopeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_after: Option<ScopeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_range: Option<(ScopeId, ScopeId)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove: Option<ScopeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_to: Option<ScopeId>,
}

/// A validated command, ready for the processor.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Output(OutputRequest),
    OutputCtl(OutputCtl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputRequest {
    pub scope: ScopeId,
    pub position: i64,
    pub widget: WidgetSpec,
}

impl OutputRequest {
    /// Append `widget` to the root scope.
    pub fn new(widget: WidgetSpec) -> Self {
        Self {
            scope: ScopeId::root(),
            position: APPEND,
            widget,
        }
    }

    pub fn in_scope(mut self, scope: impl Into<ScopeId>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn at(mut self, position: i64) -> Self {
        self.position = position;
        self
    }
}

/// Layout edits carried by one `output_ctl` message. Every field is optional
/// and handled independently, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputCtl {
    pub title: Option<String>,
    pub output_fixed_height: Option<bool>,
    pub auto_scroll_bottom: Option<bool>,
    pub set_scope: Option<SetScope>,
    pub clear: Option<ScopeId>,
    pub clear_before: Option<ScopeId>,
    pub clear_after: Option<ScopeId>,
    pub scroll_to: Option<ScrollTo>,
    pub clear_range: Option<(ScopeId, ScopeId)>,
    pub remove: Option<ScopeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetScope {
    pub id: ScopeId,
    pub container: ScopeId,
    pub position: i64,
    pub if_exist: IfExist,
}

impl SetScope {
    /// Append a new scope `id` under `container`, keeping any existing one.
    pub fn new(id: impl Into<ScopeId>, container: impl Into<ScopeId>) -> Self {
        Self {
            id: id.into(),
            container: container.into(),
            position: APPEND,
            if_exist: IfExist::default(),
        }
    }

    pub fn at(mut self, position: i64) -> Self {
        self.position = position;
        self
    }

    pub fn if_exist(mut self, if_exist: IfExist) -> Self {
        self.if_exist = if_exist;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollTo {
    pub target: ScopeId,
    pub position: ScrollPosition,
}

impl Command {
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let wire: WireCommand = serde_json::from_str(text)?;
        Self::try_from(wire)
    }
}

impl TryFrom<WireCommand> for Command {
    type Error = ProtocolError;

    fn try_from(value: WireCommand) -> Result<Self, Self::Error> {
        match value {
            WireCommand::Output(spec) => OutputRequest::try_from(spec).map(Command::Output),
            WireCommand::OutputCtl(spec) => OutputCtl::try_from(spec).map(Command::OutputCtl),
        }
    }
}

impl TryFrom<OutputSpec> for OutputRequest {
    type Error = ProtocolError;

    fn try_from(spec: OutputSpec) -> Result<Self, Self::Error> {
        let scope = match spec.scope {
            Some(scope) => non_empty("scope", scope)?,
            None => ScopeId::root(),
        };
        Ok(Self {
            scope,
            position: spec.position.unwrap_or(APPEND),
            widget: spec.widget,
        })
    }
}

impl TryFrom<OutputCtlSpec> for OutputCtl {
    type Error = ProtocolError;

    fn try_from(spec: OutputCtlSpec) -> Result<Self, Self::Error> {
        // One `position` key serves both fields. When a message carries both,
        // the value goes to whichever field its shape fits and the other
        // field keeps its default.
        let mut index = None;
        let mut anchor = None;
        match spec.position {
            Some(CtlPosition::Index(value)) => {
                if spec.set_scope.is_none() && spec.scroll_to.is_some() {
                    return Err(ProtocolError::invalid(
                        "position",
                        "scroll_to expects one of top, middle, bottom",
                    ));
                }
                index = Some(value);
            }
            Some(CtlPosition::Anchor(value)) => {
                if spec.scroll_to.is_none() && spec.set_scope.is_some() {
                    return Err(ProtocolError::invalid(
                        "position",
                        "set_scope expects an integer child index",
                    ));
                }
                anchor = Some(value);
            }
            None => {}
        }

        let set_scope = match spec.set_scope {
            Some(id) => Some(SetScope {
                id: non_empty("set_scope", id)?,
                container: match spec.container {
                    Some(container) => non_empty("container", container)?,
                    None => ScopeId::root(),
                },
                position: index.unwrap_or(APPEND),
                if_exist: spec.if_exist.unwrap_or_default(),
            }),
            None => None,
        };

        let scroll_to = match spec.scroll_to {
            Some(target) => Some(ScrollTo {
                target: non_empty("scroll_to", target)?,
                position: anchor.unwrap_or_default(),
            }),
            None => None,
        };

        let clear_range = match spec.clear_range {
            Some((start, end)) => Some((
                non_empty("clear_range", start)?,
                non_empty("clear_range", end)?,
            )),
            None => None,
        };

        Ok(Self {
            title: spec.title,
            output_fixed_height: spec.output_fixed_height,
            auto_scroll_bottom: spec.auto_scroll_bottom,
            set_scope,
            clear: spec.clear.map(|id| non_empty("clear", id)).transpose()?,
            clear_before: spec
                .clear_before
                .map(|id| non_empty("clear_before", id))
                .transpose()?,
            clear_after: spec
                .clear_after
                .map(|id| non_empty("clear_after", id))
                .transpose()?,
            scroll_to,
            clear_range,
            remove: spec.remove.map(|id| non_empty("remove", id)).transpose()?,
        })
    }
}

fn non_empty(field: &'static str, id: ScopeId) -> Result<ScopeId, ProtocolError> {
    if id.as_str().is_empty() {
        Err(ProtocolError::invalid(field, "id must not be empty"))
    } else {
        Ok(id)
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
