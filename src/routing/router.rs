//! Top-level routing state machine.
//!
//! `validate → enrich → classify → route → respond`, with a bounded
//! self-loop on the classifying state and a terminal error path reachable
//! from anywhere. The error path is the only place a user-visible failure
//! message is produced, and it never surfaces raw internal error text.

use crate::core::task::Task;
use crate::error::{Error, ErrorKind, Result};
use crate::orchestration::{Orchestrator, PhasedExecutor, ResultIntegrator, TaskDecomposer};
use crate::routing::classifier::{fallback_classify, is_unsafe};
use crate::routing::state::{
    Category, FinalResponse, RequestContext, RequestState, RoutingStep,
};
use crate::{slog_debug, slog_info, slog_warn};
use std::sync::Arc;

const CLASSIFY_OPERATION: &str = "classification";

/// Drives a request through the routing pipeline.
pub struct Router {
    ctx: Arc<Orchestrator>,
}

impl Router {
    pub fn new(ctx: Arc<Orchestrator>) -> Self {
        Self { ctx }
    }

    /// Route a request to a processor and produce the final response.
    ///
    /// Never fails; every failure funnels into the terminal error path,
    /// which classifies the most recent recorded error into a user-safe
    /// message.
    pub async fn route(&self, input: &str, context: RequestContext) -> FinalResponse {
        let mut state = self.validate(RequestState::new(input));
        state = self.enrich(state, context);

        loop {
            state = self.classify(state).await;
            if !state.has_errors() {
                break;
            }
            if state.retry_count < self.ctx.config.max_classify_retries {
                state = state.bumped_retry();
                slog_debug!(
                    "classification loop, retry {}/{}",
                    state.retry_count,
                    self.ctx.config.max_classify_retries
                );
            } else {
                return self.error_response(state.advanced(RoutingStep::Error));
            }
        }

        // Sub-threshold confidence falls back to the chat route.
        let category = match state.category {
            Some(c) if state.confidence >= self.ctx.config.confidence_threshold => c,
            _ => Category::GeneralChat,
        };
        state = state.advanced(RoutingStep::Routed(category));
        slog_info!(
            "routed to {} (confidence {:.2})",
            category,
            state.confidence
        );

        let outcome = match category {
            Category::GeneralChat => self.process_chat(&state).await,
            Category::DocumentQuery => self.process_document_query(&state).await,
            Category::CodeGeneration => self.process_generation(&state).await,
        };

        match outcome {
            Ok(response) => response,
            Err(err) => {
                slog_warn!("{} processor failed: {}", category, err);
                self.error_response(state.with_error(err).advanced(RoutingStep::Error))
            }
        }
    }

    /// Reject empty, oversized, or unsafe input by recording a validation
    /// error. Never panics or throws.
    fn validate(&self, state: RequestState) -> RequestState {
        let state = state.advanced(RoutingStep::Validating);
        let trimmed = state.input.trim();
        if trimmed.is_empty() {
            return state.with_error(Error::Validation("the request is empty".to_string()));
        }
        if state.input.len() > self.ctx.config.max_input_len {
            let limit = self.ctx.config.max_input_len;
            return state.with_error(Error::Validation(format!(
                "the request exceeds the {} character limit",
                limit
            )));
        }
        if is_unsafe(&state.input) {
            return state.with_error(Error::Validation(
                "the request contains disallowed content".to_string(),
            ));
        }
        state
    }

    /// Attach caller context. Never fails; malformed context arrives here
    /// already replaced by an empty default plus a warning.
    fn enrich(&self, state: RequestState, context: RequestContext) -> RequestState {
        state
            .advanced(RoutingStep::Enriching)
            .with_context(context, None)
    }

    /// Classify via the external collaborator, falling back to the
    /// deterministic keyword classifier on failure or low confidence.
    async fn classify(&self, state: RequestState) -> RequestState {
        let state = state.advanced(RoutingStep::Classifying);
        if state.has_errors() {
            // Validation already failed; classification cannot help.
            return state;
        }

        if let Some(client) = &self.ctx.classification {
            self.ctx.limiter.acquire().await;
            if self.ctx.breaker.check(CLASSIFY_OPERATION).is_ok() {
                let input = state.input.clone();
                let context = state.context.clone();
                let outcome = self
                    .ctx
                    .retry
                    .execute(CLASSIFY_OPERATION, || {
                        let client = Arc::clone(client);
                        let input = input.clone();
                        let context = context.clone();
                        async move { client.classify(&input, &context).await }
                    })
                    .await;
                match outcome {
                    Ok(c) if c.confidence >= self.ctx.config.confidence_threshold => {
                        self.ctx.breaker.record_success(CLASSIFY_OPERATION);
                        return state.classified(c.category, c.confidence, c.reasoning);
                    }
                    Ok(c) => {
                        self.ctx.breaker.record_success(CLASSIFY_OPERATION);
                        slog_debug!(
                            "collaborator confidence {:.2} below threshold, using fallback",
                            c.confidence
                        );
                    }
                    Err(err) => {
                        self.ctx.breaker.record_failure(CLASSIFY_OPERATION);
                        slog_warn!("classification collaborator failed: {}", err);
                    }
                }
            }
        }

        let fallback = fallback_classify(&state.input, &state.context);
        state.classified(fallback.category, fallback.confidence, fallback.reasoning)
    }

    async fn process_chat(&self, state: &RequestState) -> Result<FinalResponse> {
        let system = "You are a helpful assistant. Answer concisely and directly.";
        let user = if state.context.history.is_empty() {
            state.input.clone()
        } else {
            let history = state
                .context
                .history
                .iter()
                .map(|turn| format!("{}: {}", turn.role, turn.content))
                .collect::<Vec<_>>()
                .join("\n");
            format!("Conversation so far:\n{}\n\nUser: {}", history, state.input)
        };
        let completion = self.ctx.generation.complete(system, &user).await?;
        Ok(FinalResponse {
            text: completion.text,
            workflow: Category::GeneralChat.as_str().to_string(),
            sources: Vec::new(),
            confidence: state.confidence,
        })
    }

    async fn process_document_query(&self, state: &RequestState) -> Result<FinalResponse> {
        let Some(retriever) = &self.ctx.retrieval else {
            slog_debug!("no retriever configured, answering document query as chat");
            return self.process_chat(state).await;
        };

        let passages = retriever.retrieve(&state.input, 5).await?;
        let mut sources: Vec<String> = Vec::new();
        for passage in &passages {
            if !sources.contains(&passage.source) {
                sources.push(passage.source.clone());
            }
        }
        let excerpts = passages
            .iter()
            .map(|p| format!("[{}] {}", p.source, p.text))
            .collect::<Vec<_>>()
            .join("\n\n");

        let system = "Answer using only the provided excerpts. Cite sources by name. \
                      Say so when the excerpts do not contain the answer.";
        let user = format!("Excerpts:\n{}\n\nQuestion: {}", excerpts, state.input);
        let completion = self.ctx.generation.complete(system, &user).await?;
        Ok(FinalResponse {
            text: completion.text,
            workflow: Category::DocumentQuery.as_str().to_string(),
            sources,
            confidence: state.confidence,
        })
    }

    /// The decompose → execute → integrate chain.
    async fn process_generation(&self, state: &RequestState) -> Result<FinalResponse> {
        let title: String = state.input.chars().take(60).collect();
        let task = Task::new(&title, &state.input);

        let subtasks = TaskDecomposer::new(Arc::clone(&self.ctx))
            .decompose(&task)
            .await;
        let report = PhasedExecutor::new(Arc::clone(&self.ctx))
            .execute(&task, subtasks)
            .await?;
        slog_info!(
            "execution finished: {}/{} completed in {:?}",
            report.completed,
            report.total,
            report.execution_time
        );
        let integrated = ResultIntegrator::new(Arc::clone(&self.ctx))
            .integrate(&task, &report.results)
            .await;

        let text = format!(
            "{}\n\n---\n{}",
            integrated.solution, integrated.architecture_summary
        );
        Ok(FinalResponse {
            text,
            workflow: Category::CodeGeneration.as_str().to_string(),
            sources: integrated.resolved_dependencies,
            confidence: state.confidence,
        })
    }

    /// Terminal error path: classify the most recent error into one of the
    /// user-safe messages. Raw error text never reaches the caller except
    /// for validation guidance, which is written for users.
    fn error_response(&self, state: RequestState) -> FinalResponse {
        let text = match state.last_error() {
            Some(Error::Validation(guidance)) => {
                format!("Your request could not be processed: {}.", guidance)
            }
            Some(err)
                if err.kind() == ErrorKind::RetriesExhausted
                    || state.retry_count >= self.ctx.config.max_classify_retries =>
            {
                "Maximum retries exceeded, please rephrase your request.".to_string()
            }
            Some(_) => "The service is temporarily unavailable, retrying.".to_string(),
            None => "The request could not be completed.".to_string(),
        };
        FinalResponse {
            text,
            workflow: "error".to_string(),
            sources: Vec::new(),
            confidence: 0.0,
        }
    }
}
