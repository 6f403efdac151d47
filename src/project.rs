//! Project and task snapshots supplied by callers
//!
//! Persistence lives outside this crate; requests carry the project data
//! the model should reason over. Ids may arrive as JSON strings or
//! numbers and are kept as strings.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectInput {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    pub name: String,
    /// Free text attached to the project, e.g. an uploaded document
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    pub title: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default, deserialize_with = "flexible_ids")]
    pub dependencies: Vec<String>,
}

impl TaskInput {
    /// Status in `snake_case` form, e.g. `"In Progress"` → `in_progress`
    pub fn normalized_status(&self) -> String {
        normalize_status(&self.status)
    }
}

fn default_status() -> String {
    "todo".to_string()
}

/// Lowercase a status and join its words with underscores
pub fn normalize_status(status: &str) -> String {
    status
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Text(String),
    Number(i64),
}

impl From<IdRepr> for String {
    fn from(id: IdRepr) -> Self {
        match id {
            IdRepr::Text(s) => s,
            IdRepr::Number(n) => n.to_string(),
        }
    }
}

fn flexible_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    IdRepr::deserialize(deserializer).map(String::from)
}

fn flexible_ids<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let ids = Option::<Vec<IdRepr>>::deserialize(deserializer)?;
    Ok(ids
        .unwrap_or_default()
        .into_iter()
        .map(String::from)
        .collect())
}
