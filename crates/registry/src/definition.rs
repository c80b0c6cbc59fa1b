//! Tool definitions and their input schemas.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Host application family a tool belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Excel,
    Word,
    PowerPoint,
    Host,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Excel,
        Category::Word,
        Category::PowerPoint,
        Category::Host,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Excel => "excel",
            Self::Word => "word",
            Self::PowerPoint => "powerpoint",
            Self::Host => "host",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// JSON type of a single parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    fn as_schema_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// A named, typed parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamType,
    pub required: bool,
    pub description: String,
}

/// Ordered set of parameters accepted by a tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSchema {
    params: Vec<ParamSpec>,
}

impl InputSchema {
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Required parameter names, in declaration order.
    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
    }

    /// Render as a JSON Schema object.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            properties.insert(
                param.name.clone(),
                json!({
                    "type": param.kind.as_schema_type(),
                    "description": param.description,
                }),
            );
        }
        let required: Vec<&str> = self.required().collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Immutable description of a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
    pub category: Category,
}

impl ToolDefinition {
    pub fn builder(
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> ToolDefinitionBuilder {
        ToolDefinitionBuilder {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
            category: Category::Host,
        }
    }

    /// Wire form: `{name, description, inputSchema}`.
    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema.to_json_schema(),
        })
    }
}

/// Builder for [`ToolDefinition`].
#[derive(Debug, Clone)]
pub struct ToolDefinitionBuilder {
    name: String,
    description: String,
    params: Vec<ParamSpec>,
    category: Category,
}

impl ToolDefinitionBuilder {
    pub fn category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn param(
        mut self,
        name: impl Into<String>,
        kind: ParamType,
        required: bool,
        description: impl Into<String>,
    ) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind,
            required,
            description: description.into(),
        });
        self
    }

    pub fn build(self) -> ToolDefinition {
        ToolDefinition {
            name: self.name,
            description: self.description,
            input_schema: InputSchema {
                params: self.params,
            },
            category: self.category,
        }
    }
}
