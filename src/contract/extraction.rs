//! Tasks extracted from a free-text document
//!
//! Extraction output is coerced leniently before anything is rejected:
//! models routinely quote numbers, omit optional keys, or return a bare
//! array instead of `{"tasks": [...]}`. Only entries that are not objects
//! or have no usable title fail the contract.

use super::{ContractOutcome, evaluate};
use serde::Serialize;
use serde_json::{Map, Value};

pub const DEFAULT_STATUS: &str = "todo";
pub const DEFAULT_TEAM: &str = "Product";
pub const DEFAULT_PRIORITY: &str = "Medium";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedTask {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub status: String,
    pub due_date: Option<String>,
    pub assignee: Option<String>,
    pub team: String,
    pub priority: String,
    /// Ids of tasks in the same extraction that must finish first
    pub dependencies: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    pub tasks: Vec<ExtractedTask>,
}

impl ExtractionResult {
    /// Coerce parsed model output into extracted tasks
    pub fn from_value(value: Value) -> Result<Self, String> {
        let entries = match value {
            Value::Array(entries) => entries,
            Value::Object(mut map) => match map.remove("tasks") {
                Some(Value::Array(entries)) => entries,
                Some(_) => return Err("`tasks` is not an array".to_string()),
                None => return Err("missing `tasks` array".to_string()),
            },
            _ => return Err("expected an object with `tasks` or an array".to_string()),
        };

        let tasks = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| match entry {
                Value::Object(map) => coerce_task(index + 1, map),
                _ => Err(format!("task {} is not an object", index + 1)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { tasks })
    }

    /// Clean, parse, and coerce a raw completion
    pub fn from_completion(raw: &str) -> ContractOutcome<Self> {
        evaluate(raw, Self::from_value)
    }
}

fn coerce_task(position: usize, map: Map<String, Value>) -> Result<ExtractedTask, String> {
    let title = match map.get("title") {
        Some(Value::String(title)) if !title.trim().is_empty() => title.trim().to_string(),
        _ => return Err(format!("task {} has no title", position)),
    };

    Ok(ExtractedTask {
        id: map.get("id").and_then(as_id).unwrap_or(position as u64),
        title,
        description: string_field(&map, "description").unwrap_or_default(),
        status: string_field(&map, "status").unwrap_or_else(|| DEFAULT_STATUS.to_string()),
        due_date: string_field(&map, "dueDate"),
        assignee: string_field(&map, "assignee"),
        team: string_field(&map, "team").unwrap_or_else(|| DEFAULT_TEAM.to_string()),
        priority: string_field(&map, "priority").unwrap_or_else(|| DEFAULT_PRIORITY.to_string()),
        dependencies: match map.get("dependencies") {
            Some(Value::Array(deps)) => deps.iter().filter_map(as_id).collect(),
            _ => Vec::new(),
        },
    })
}

/// Non-negative integer id from a number or numeric string
fn as_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Non-blank string field; anything else counts as absent
fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}
