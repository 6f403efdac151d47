//! AI operations over project data
//!
//! Each operation builds messages from the request, runs them through the
//! resilient invoker, and checks the completion against its contract.
//! Analysis and extraction results are cached; chat answers are not.

use crate::backends::{BackendPool, ChatMessage, Role};
use crate::cache::{ResponseCache, cache_key};
use crate::config::Config;
use crate::contract::extraction::ExtractionResult;
use crate::contract::insights::ProjectInsights;
use crate::contract::{ContractOutcome, prompts};
use crate::error::{AiError, AppError, AppResult};
use crate::jobs::{Job, JobRunner};
use crate::metrics::Metrics;
use crate::project::{ProjectInput, TaskInput};
use crate::resilience::{CircuitBreaker, ResilientInvoker};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Job type tag for background document extraction
pub const DOC_TO_TASKS_JOB: &str = "doc_to_tasks";

pub struct AiService {
    invoker: ResilientInvoker,
    analysis_cache: ResponseCache<ProjectInsights>,
    extraction_cache: ResponseCache<ExtractionResult>,
    jobs: Arc<JobRunner>,
    metrics: Arc<Metrics>,
}

impl AiService {
    pub fn new(
        invoker: ResilientInvoker,
        jobs: Arc<JobRunner>,
        cache_ttl: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            invoker,
            analysis_cache: ResponseCache::new("analysis", cache_ttl).with_metrics(metrics.clone()),
            extraction_cache: ResponseCache::new("extraction", cache_ttl)
                .with_metrics(metrics.clone()),
            jobs,
            metrics,
        }
    }

    /// Wire the pool, breaker, caches and job runner from configuration
    pub fn from_config(config: &Config, metrics: Arc<Metrics>) -> Self {
        Self::with_pool(config, BackendPool::from_config(config), metrics)
    }

    /// Same as `from_config` with an already-built backend pool
    pub fn with_pool(config: &Config, pool: BackendPool, metrics: Arc<Metrics>) -> Self {
        let breaker = CircuitBreaker::new(
            "completion",
            config.breaker.failure_threshold,
            config.breaker.cooldown(),
        )
        .with_metrics(metrics.clone());
        let invoker = ResilientInvoker::new(pool, breaker, metrics.clone());
        let jobs = Arc::new(
            JobRunner::new(config.jobs.retention(), config.jobs.sweep_interval())
                .with_metrics(metrics.clone()),
        );
        Self::new(invoker, jobs, config.cache.default_ttl(), metrics)
    }

    pub fn invoker(&self) -> &ResilientInvoker {
        &self.invoker
    }

    pub fn jobs(&self) -> &Arc<JobRunner> {
        &self.jobs
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Status summary, risk level, deadlines, stand-up and next actions
    pub async fn analyze(
        &self,
        project: &ProjectInput,
        tasks: &[TaskInput],
    ) -> AppResult<ProjectInsights> {
        // The name appears in the prompt, so a rename must miss the cache
        let key = cache_key(
            &format!("analysis:{}", project.id),
            &(project.name.as_str(), tasks),
        );
        if let Some(insights) = self.analysis_cache.get(&key) {
            tracing::debug!(project_id = %project.id, "Analysis served from cache");
            return Ok(insights);
        }

        let messages = prompts::analysis_messages(project, tasks);
        let raw = self.invoker.complete(&messages).await?;
        let insights = checked(ProjectInsights::from_completion(&raw), "analysis")?;

        self.analysis_cache.set(key, insights.clone(), None);
        tracing::info!(
            project_id = %project.id,
            task_count = tasks.len(),
            risk_level = ?insights.risk_level,
            "Project analysed"
        );
        Ok(insights)
    }

    /// Answer a question grounded in the project's data
    pub async fn chat(
        &self,
        project: &ProjectInput,
        tasks: &[TaskInput],
        question: &str,
        history: &[ChatMessage],
    ) -> AppResult<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::Validation("question cannot be empty".to_string()));
        }
        if history.iter().any(|turn| turn.role == Role::System) {
            return Err(AppError::Validation(
                "history may only contain user and assistant turns".to_string(),
            ));
        }

        let messages = prompts::chat_messages(project, tasks, question, history);
        let answer = self.invoker.complete(&messages).await?;
        Ok(answer.trim().to_string())
    }

    /// Turn a document into a task list
    pub async fn extract(&self, document: &str) -> AppResult<ExtractionResult> {
        if document.trim().is_empty() {
            return Err(AppError::Validation("document cannot be empty".to_string()));
        }

        let key = cache_key("extract", document);
        if let Some(result) = self.extraction_cache.get(&key) {
            tracing::debug!("Extraction served from cache");
            return Ok(result);
        }

        let messages = prompts::extraction_messages(document);
        let raw = self.invoker.complete(&messages).await?;
        let result = checked(ExtractionResult::from_completion(&raw), "extraction")?;

        self.extraction_cache.set(key, result.clone(), None);
        tracing::info!(task_count = result.tasks.len(), "Tasks extracted from document");
        Ok(result)
    }

    /// Run `extract` as a background job; returns the job id
    pub fn submit_extraction(self: &Arc<Self>, document: String) -> AppResult<String> {
        if document.trim().is_empty() {
            return Err(AppError::Validation("document cannot be empty".to_string()));
        }

        let service = Arc::clone(self);
        let payload = json!({ "document": &document });
        let id = self.jobs.submit(DOC_TO_TASKS_JOB, payload, move |_| async move {
            let result = service.extract(&document).await.map_err(|e| e.to_string())?;
            serde_json::to_value(result).map_err(|e| e.to_string())
        });
        Ok(id)
    }

    pub fn job_status(&self, id: &str) -> AppResult<Job> {
        self.jobs
            .status(id)
            .ok_or_else(|| AppError::JobNotFound(id.to_string()))
    }
}

/// Log a contract near-miss and convert it to `AiError::ContractValidation`
fn checked<T>(outcome: ContractOutcome<T>, contract: &str) -> Result<T, AiError> {
    if let ContractOutcome::Invalid {
        reason,
        raw,
        cleaned,
    } = &outcome
    {
        tracing::warn!(
            contract = %contract,
            reason = %reason,
            raw_len = raw.len(),
            cleaned = %cleaned,
            "Model output failed contract validation"
        );
    }
    outcome.into_result()
}
