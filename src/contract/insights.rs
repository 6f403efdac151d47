//! Project analysis insights
//!
//! The shape a model must produce for `analyze`. Field names are the
//! camelCase keys the prompt asks for and clients read.

use super::{ContractOutcome, evaluate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Task reference inside a deadline bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRef {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deadlines {
    pub overdue: Vec<TaskRef>,
    pub due_soon: Vec<TaskRef>,
    pub on_track: Vec<TaskRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedAction {
    /// `null` for project-wide actions
    #[serde(deserialize_with = "nullable_string")]
    pub task_id: Option<String>,
    pub action: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInsights {
    pub summary: String,
    pub risk_level: RiskLevel,
    pub deadlines: Deadlines,
    pub standup_update: String,
    pub suggested_actions: Vec<SuggestedAction>,
}

impl ProjectInsights {
    /// Check parsed model output against the insights shape
    ///
    /// Extra keys are ignored; every listed key must be present with the
    /// right type. `taskId` must be present, either a string or `null`.
    pub fn from_value(value: Value) -> Result<Self, String> {
        serde_json::from_value(value).map_err(|e| format!("insights shape mismatch: {}", e))
    }

    /// Clean, parse, and validate a raw completion
    pub fn from_completion(raw: &str) -> ContractOutcome<Self> {
        evaluate(raw, Self::from_value)
    }
}

/// Accept a string or an explicit `null`; a missing key is still an error
fn nullable_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)
}
