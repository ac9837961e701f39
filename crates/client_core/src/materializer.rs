use serde::Serialize;
use serde_json::Value;
use shared::protocol::WidgetSpec;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("widget spec has no `type`")]
    MissingType,
    #[error("unknown widget type `{0}`")]
    UnknownWidget(String),
    #[error("`{kind}` widget is missing `{field}`")]
    MissingField { kind: String, field: &'static str },
    #[error("`{kind}` widget field `{field}` must be {expected}")]
    InvalidField {
        kind: String,
        field: &'static str,
        expected: &'static str,
    },
}

/// Opaque output of the materializer, stored as a leaf in the scope tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedWidget {
    pub kind: String,
    pub content: Value,
}

/// Builds the opaque tree node for a widget spec, or says why none could be built.
pub trait Materializer: Send + Sync {
    fn materialize(&self, spec: &WidgetSpec) -> Result<RenderedWidget, RenderError>;
}

#[derive(Debug, Clone, Copy)]
enum Shape {
    Text,
    List,
}

impl Shape {
    fn matches(self, value: &Value) -> bool {
        match self {
            Shape::Text => value.is_string(),
            Shape::List => value.is_array(),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Shape::Text => "a string",
            Shape::List => "an array",
        }
    }
}

const WIDGETS: &[(&str, &[(&str, Shape)])] = &[
    ("text", &[("content", Shape::Text)]),
    ("markdown", &[("content", Shape::Text)]),
    ("html", &[("content", Shape::Text)]),
    ("buttons", &[("buttons", Shape::List)]),
    ("file", &[("name", Shape::Text), ("content", Shape::Text)]),
    ("table", &[("data", Shape::List)]),
];

/// Accepts the built-in output widget types and checks their required fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicMaterializer;

impl Materializer for BasicMaterializer {
    fn materialize(&self, spec: &WidgetSpec) -> Result<RenderedWidget, RenderError> {
        let kind = spec
            .get("type")
            .and_then(Value::as_str)
            .ok_or(RenderError::MissingType)?;

        let (_, required) = WIDGETS
            .iter()
            .find(|(name, _)| *name == kind)
            .ok_or_else(|| RenderError::UnknownWidget(kind.to_string()))?;

        for &(field, shape) in required.iter() {
            let value = spec.get(field).ok_or_else(|| RenderError::MissingField {
                kind: kind.to_string(),
                field,
            })?;
            if !shape.matches(value) {
                return Err(RenderError::InvalidField {
                    kind: kind.to_string(),
                    field,
                    expected: shape.describe(),
                });
            }
        }

        let mut content = spec.clone();
        content.remove("type");
        Ok(RenderedWidget {
            kind: kind.to_string(),
            content: Value::Object(content),
        })
    }
}
