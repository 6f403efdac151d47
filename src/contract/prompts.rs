//! Prompt templates and message assembly
//!
//! Every request is a system message carrying the instructions followed by
//! the user content. Chat adds prior turns between the two.

use crate::backends::ChatMessage;
use crate::project::{ProjectInput, TaskInput};

/// Most recent conversation turns forwarded with a chat question
pub const MAX_HISTORY_TURNS: usize = 10;

pub const ANALYZE_PROMPT: &str = "\
You are a senior project management AI.

You receive:
- A project name
- A list of tasks with id, title, status, assignee, dueDate, and dependencies.

Statuses are: todo, in_progress, done, blocked.

Your job:
1) Summarize the current project status in 3-5 sentences.
2) Compute a riskLevel: \"Low\", \"Medium\", or \"High\".
   - High if many tasks are overdue or blocked, or critical dependencies are not done.
3) Identify deadlines:
   - overdue: tasks past dueDate and not done.
   - dueSoon: tasks due in the next 3 days.
   - onTrack: tasks not overdue and not due soon.
4) Write a daily stand-up style update (Yesterday / Today / Blockers) as one paragraph.
5) Suggest 3-5 concrete next actions.

Return ONLY valid JSON with these top-level keys:
- summary (string)
- riskLevel (string: \"Low\" | \"Medium\" | \"High\")
- deadlines (object with arrays: overdue, dueSoon, onTrack; each item has id and title as strings)
- standupUpdate (string)
- suggestedActions (array of objects with: taskId (string or null), action (string), reason (string))";

pub const CHAT_PROMPT: &str = "\
You are a project management assistant.
Answer the user's question using ONLY the project information below.
If something is not in the data, say you don't know.";

pub const EXTRACT_PROMPT: &str = "\
You turn product documents (PRDs, specs, meeting notes) into an actionable task list.

For each distinct piece of work in the document produce an object with:
- id (number, starting at 1)
- title (short imperative phrase)
- description (one or two sentences)
- status (always \"todo\")
- dueDate (ISO date string if the document states one, otherwise null)
- assignee (always null)
- team (\"Product\", \"Engineering\", \"Design\", or \"Marketing\")
- priority (\"Low\", \"Medium\", or \"High\")
- dependencies (array of ids of tasks that must finish first)

Return ONLY valid JSON of the form {\"tasks\": [...]}.";

/// Render tasks one per line for a prompt
///
/// `- [status] (id) "title" assignee=<name> due=<date> deps=<ids>`
pub fn tasks_block(tasks: &[TaskInput]) -> String {
    if tasks.is_empty() {
        return "No tasks.".to_string();
    }
    tasks
        .iter()
        .map(|t| {
            let deps = if t.dependencies.is_empty() {
                "none".to_string()
            } else {
                t.dependencies.join(",")
            };
            format!(
                "- [{}] ({}) \"{}\" assignee={} due={} deps={}",
                t.normalized_status(),
                t.id,
                t.title,
                non_blank(t.assignee.as_deref()).unwrap_or("unassigned"),
                non_blank(t.due_date.as_deref()).unwrap_or("none"),
                deps
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

pub fn analysis_messages(project: &ProjectInput, tasks: &[TaskInput]) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(ANALYZE_PROMPT),
        ChatMessage::user(format!(
            "Project name: {}\n\nTasks:\n{}",
            project.name,
            tasks_block(tasks)
        )),
    ]
}

/// System prompt with project data, recent history, then the question
pub fn chat_messages(
    project: &ProjectInput,
    tasks: &[TaskInput],
    question: &str,
    history: &[ChatMessage],
) -> Vec<ChatMessage> {
    let mut system = format!(
        "{}\n\nProject: {}\n\nTasks:\n{}",
        CHAT_PROMPT,
        project.name,
        tasks_block(tasks)
    );
    if let Some(context) = non_blank(project.context.as_deref()) {
        system.push_str("\n\nProject context:\n");
        system.push_str(context);
    }

    let recent = &history[history.len().saturating_sub(MAX_HISTORY_TURNS)..];
    let mut messages = Vec::with_capacity(recent.len() + 2);
    messages.push(ChatMessage::system(system));
    messages.extend(recent.iter().cloned());
    messages.push(ChatMessage::user(question));
    messages
}

pub fn extraction_messages(document: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(EXTRACT_PROMPT),
        ChatMessage::user(format!("Document:\n{}", document)),
    ]
}
