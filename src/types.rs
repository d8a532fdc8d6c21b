use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};

use crate::error::SchemaError;

/// A record the model is asked to produce.
///
/// `from_json` is the only way model output enters the crate: it checks every
/// declared field by name and type instead of defaulting missing ones.
pub trait ResponseModel: Serialize + DeserializeOwned + Sized {
    fn name() -> String;

    /// Descriptor sent alongside the prompt.
    fn schema() -> JsonValue;

    fn from_json(value: &JsonValue) -> Result<Self, SchemaError>;

    fn to_markdown(&self) -> String;
}

struct Fields<'a> {
    model: &'static str,
    object: &'a Map<String, JsonValue>,
}

impl<'a> Fields<'a> {
    fn of(model: &'static str, value: &'a JsonValue) -> Result<Self, SchemaError> {
        match value {
            JsonValue::Object(object) => Ok(Self { model, object }),
            other => Err(SchemaError::new(
                model,
                "$",
                format!("expected a JSON object, found {}", kind_of(other)),
            )),
        }
    }

    fn get(&self, field: &str) -> Result<&'a JsonValue, SchemaError> {
        self.object
            .get(field)
            .ok_or_else(|| SchemaError::new(self.model, field, "missing required field"))
    }

    fn string(&self, field: &str) -> Result<String, SchemaError> {
        match self.get(field)? {
            JsonValue::String(s) => Ok(s.clone()),
            other => Err(SchemaError::new(
                self.model,
                field,
                format!("expected a string, found {}", kind_of(other)),
            )),
        }
    }

    fn strings(&self, field: &str) -> Result<Vec<String>, SchemaError> {
        let items = match self.get(field)? {
            JsonValue::Array(items) => items,
            other => {
                return Err(SchemaError::new(
                    self.model,
                    field,
                    format!("expected a list of strings, found {}", kind_of(other)),
                ));
            }
        };
        items
            .iter()
            .enumerate()
            .map(|(idx, item)| match item {
                JsonValue::String(s) => Ok(s.clone()),
                other => Err(SchemaError::new(
                    self.model,
                    format!("{field}[{idx}]"),
                    format!("expected a string, found {}", kind_of(other)),
                )),
            })
            .collect()
    }
}

fn kind_of(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a list",
        JsonValue::Object(_) => "an object",
    }
}

/// Append a `## heading` section; empty lists emit nothing.
fn push_section(out: &mut String, heading: &str, items: &[String], ordered: bool) {
    if items.is_empty() {
        return;
    }
    out.push_str(&format!("\n## {heading}\n\n"));
    for (idx, item) in items.iter().enumerate() {
        if ordered {
            out.push_str(&format!("{}. {}\n", idx + 1, item));
        } else {
            out.push_str(&format!("* {}\n", item));
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Perspective {
    pub title: String,
    pub expertise: String,
    pub goal: String,
    pub role: String,
}

impl ResponseModel for Perspective {
    fn name() -> String {
        "Perspective".to_string()
    }

    fn schema() -> JsonValue {
        json!({
            "title": "Short name of the expert viewpoint (string)",
            "expertise": "Domain knowledge this expert brings (string)",
            "goal": "What this expert wants the decision to achieve (string)",
            "role": "How this expert behaves in the discussion (string)"
        })
    }

    fn from_json(value: &JsonValue) -> Result<Self, SchemaError> {
        let fields = Fields::of("Perspective", value)?;
        Ok(Self {
            title: fields.string("title")?,
            expertise: fields.string("expertise")?,
            goal: fields.string("goal")?,
            role: fields.string("role")?,
        })
    }

    fn to_markdown(&self) -> String {
        format!(
            "## {}\n\n**Expertise:** {}\n\n**Goal:** {}\n\n**Role:** {}\n",
            self.title, self.expertise, self.goal, self.role
        )
    }
}

/// One perspective's contribution to a discussion or interview round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discussion {
    pub perspective: String,
    pub opinion: String,
}

impl ResponseModel for Discussion {
    fn name() -> String {
        "Discussion".to_string()
    }

    fn schema() -> JsonValue {
        json!({
            "perspective": "Title of the perspective speaking (string)",
            "opinion": "What this perspective says, in its own voice (string)"
        })
    }

    fn from_json(value: &JsonValue) -> Result<Self, SchemaError> {
        let fields = Fields::of("Discussion", value)?;
        Ok(Self {
            perspective: fields.string("perspective")?,
            opinion: fields.string("opinion")?,
        })
    }

    fn to_markdown(&self) -> String {
        format!("### {}\n\n{}\n", self.perspective, self.opinion)
    }
}

/// Declares a record made only of string lists, with its schema descriptor,
/// validation and Markdown rendering in field order.
macro_rules! list_record {
    (
        $(#[$meta:meta])*
        $name:ident, $title:literal {
            $( $field:ident => ($heading:literal, $ordered:literal, $desc:literal) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            $( pub $field: Vec<String>, )+
        }

        impl ResponseModel for $name {
            fn name() -> String {
                stringify!($name).to_string()
            }

            fn schema() -> JsonValue {
                let mut object = Map::new();
                $( object.insert(stringify!($field).to_string(), json!([$desc])); )+
                JsonValue::Object(object)
            }

            fn from_json(value: &JsonValue) -> Result<Self, SchemaError> {
                let fields = Fields::of(stringify!($name), value)?;
                Ok(Self {
                    $( $field: fields.strings(stringify!($field))?, )+
                })
            }

            fn to_markdown(&self) -> String {
                let mut out = format!("# {}\n", $title);
                $( push_section(&mut out, $heading, &self.$field, $ordered); )+
                out
            }
        }
    };
}

list_record! {
    /// Questions and gaps to resolve before the discussion starts.
    Clarification, "Clarification" {
        questions => ("Questions", true, "Question the user should answer (string)"),
        missing_context => ("Missing Context", false, "Information the description lacks (string)"),
        assumptions => ("Assumptions", false, "Assumption the description makes (string)"),
        suggestions => ("Suggestions", false, "Suggestion for framing the topic (string)"),
    }
}

list_record! {
    BiasAnalysis, "Bias Analysis" {
        cognitive_biases => ("Cognitive Biases", false, "Cognitive bias present in the discussion (string)"),
        emotional_biases => ("Emotional Biases", false, "Emotional bias present in the discussion (string)"),
        cultural_biases => ("Cultural Biases", false, "Cultural bias present in the discussion (string)"),
        professional_biases => ("Professional Biases", false, "Bias stemming from professional background (string)"),
        recommendations => ("Recommendations", true, "Step to counter the biases found (string)"),
    }
}

list_record! {
    StressAnalysis, "Stress Analysis" {
        failure_points => ("Failure Points", false, "Way the conclusions could fail (string)"),
        edge_cases => ("Edge Cases", false, "Situation the discussion did not consider (string)"),
        hidden_assumptions => ("Hidden Assumptions", false, "Unstated assumption the conclusions rely on (string)"),
        resource_constraints => ("Resource Constraints", false, "Limit on time, money or people (string)"),
        mitigation_strategies => ("Mitigation Strategies", true, "Step that reduces a risk above (string)"),
    }
}

list_record! {
    Summary, "Summary" {
        key_points => ("Key Points", false, "Main point raised in the discussion (string)"),
        decisions => ("Decisions", false, "Decision reached or converged on (string)"),
        open_questions => ("Open Questions", false, "Question still unresolved (string)"),
        next_steps => ("Next Steps", true, "Concrete action to take next (string)"),
    }
}

/// Lists come back either bare or wrapped in a single-key object, since JSON
/// response mode only produces objects.
impl<T: ResponseModel> ResponseModel for Vec<T> {
    fn name() -> String {
        format!("list of {}", T::name())
    }

    fn schema() -> JsonValue {
        json!({ "items": [T::schema()] })
    }

    fn from_json(value: &JsonValue) -> Result<Self, SchemaError> {
        let items = match value {
            JsonValue::Array(items) => items,
            JsonValue::Object(object) if object.len() == 1 => {
                match object.values().next() {
                    Some(JsonValue::Array(items)) => items,
                    _ => {
                        return Err(SchemaError::new(
                            Self::name(),
                            "items",
                            "expected a list",
                        ));
                    }
                }
            }
            other => {
                return Err(SchemaError::new(
                    Self::name(),
                    "items",
                    format!("expected a list, found {}", kind_of(other)),
                ));
            }
        };

        items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                T::from_json(item).map_err(|e| {
                    SchemaError::new(e.model, format!("[{idx}].{}", e.field), e.reason)
                })
            })
            .collect()
    }

    fn to_markdown(&self) -> String {
        self.iter()
            .map(ResponseModel::to_markdown)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
