//! The turn orchestrator — one user request from input to terminal event.
//!
//! Request lifecycle:
//!
//! ```text
//!   AwaitingProvider ──► StreamingAnswer ──► Completed
//!          ▲                    │
//!          │                    ▼ (calls extracted)
//!          └──────── DispatchingCommands
//!
//!   any state ──► Aborted (cancelled, round limit, provider failure)
//! ```
//!
//! Each round streams one provider response through the command scanner.
//! Visible text goes out as `AnswerDelta` events; extracted calls are
//! dispatched as a batch and their results appended as tool-result turns,
//! then the loop asks the provider again. A plain answer (no calls) ends
//! the request.

use std::sync::Arc;

use colloquy_context::Session;
use colloquy_context::token;
use colloquy_core::backend::{ChatBackend, ChatRequest, Usage};
use colloquy_core::command::{CommandCall, Span};
use colloquy_core::error::{OrchestrationError, ParseError, ProviderError};
use colloquy_core::event::{AbortReason, EngineEvent};
use colloquy_core::retrieval::{ContextRetriever, NoRetrieval};
use colloquy_core::turn::Turn;
use colloquy_dispatch::Dispatcher;
use colloquy_grammar::{CommandScanner, ScanItem};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::prompt;

/// Floor for the window budget; trimming never goes below this.
const MIN_BUDGET: usize = 256;

/// Terminal metadata for a completed request, mirroring the `Completed`
/// event for callers that want a return value instead of an event stream.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Visible answer text across all rounds, fences stripped
    pub answer: String,

    /// Provider rounds used
    pub rounds: usize,

    /// Commands dispatched
    pub commands_run: usize,

    /// Token usage for this request
    pub usage: Usage,
}

/// What one provider round produced.
struct RoundOutcome {
    /// Everything the model streamed, command calls included
    raw: String,

    /// Text items only — what the user saw
    visible: String,

    calls: Vec<CommandCall>,
    malformed: Vec<(ParseError, Span)>,
    usage: Option<Usage>,
}

impl RoundOutcome {
    fn new() -> Self {
        Self {
            raw: String::new(),
            visible: String::new(),
            calls: Vec::new(),
            malformed: Vec::new(),
            usage: None,
        }
    }

    fn wants_dispatch(&self) -> bool {
        !self.calls.is_empty() || !self.malformed.is_empty()
    }
}

/// Drives user requests against a backend, a dispatcher, and a session.
pub struct Orchestrator {
    backend: Arc<dyn ChatBackend>,
    dispatcher: Dispatcher,
    retriever: Arc<dyn ContextRetriever>,
    persona: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    context_budget: usize,
    round_limit: usize,
    retrieval_limit: usize,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn ChatBackend>, dispatcher: Dispatcher) -> Self {
        Self {
            backend,
            dispatcher,
            retriever: Arc::new(NoRetrieval),
            persona: prompt::DEFAULT_PERSONA.into(),
            model: "gpt-4o-mini".into(),
            temperature: 0.7,
            max_tokens: None,
            context_budget: 6_144,
            round_limit: 8,
            retrieval_limit: 4,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_context_budget(mut self, budget: usize) -> Self {
        self.context_budget = budget.max(MIN_BUDGET);
        self
    }

    /// Maximum provider rounds per request. Clamped to at least one.
    pub fn with_round_limit(mut self, limit: usize) -> Self {
        self.round_limit = limit.max(1);
        self
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn ContextRetriever>) -> Self {
        self.retriever = retriever;
        self
    }

    pub fn with_retrieval_limit(mut self, limit: usize) -> Self {
        self.retrieval_limit = limit;
        self
    }

    /// Run one user request to its terminal event.
    ///
    /// Appends the user turn, then loops provider rounds until the model
    /// answers without commands (`Completed`), the round limit trips, the
    /// token is cancelled, or the provider fails terminally (`Aborted`).
    /// The returned summary mirrors the terminal event; progress streams
    /// over `events` as it happens.
    pub async fn run(
        &self,
        session: &mut Session,
        user_turn: Turn,
        events: &mpsc::Sender<EngineEvent>,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, OrchestrationError> {
        info!(session = %session.id, "processing user request");

        let retrieved = self
            .retriever
            .retrieve(&user_turn.content, self.retrieval_limit)
            .await;
        session.append(user_turn);

        let system_turn = Turn::system(prompt::system_prompt(
            &self.persona,
            &self.dispatcher.registry().descriptors(),
            &retrieved,
        ));

        let mut rounds = 0usize;
        let mut commands_run = 0usize;
        let mut answer = String::new();
        let mut usage = Usage::default();
        let mut budget = self.context_budget;

        loop {
            if cancel.is_cancelled() {
                return self.abort(events, OrchestrationError::Cancelled).await;
            }
            if rounds >= self.round_limit {
                warn!(
                    session = %session.id,
                    limit = self.round_limit,
                    "round limit exceeded"
                );
                return self
                    .abort(
                        events,
                        OrchestrationError::RoundLimitExceeded {
                            limit: self.round_limit,
                        },
                    )
                    .await;
            }
            rounds += 1;
            debug!(session = %session.id, round = rounds, budget, "provider round");

            let round = match self
                .stream_round(session, &system_turn, budget, events, cancel)
                .await
            {
                Ok(round) => round,
                // One trim-and-retry when the window outgrew the provider.
                Err(OrchestrationError::Provider(ProviderError::ContextTooLarge(reason)))
                    if budget / 2 >= MIN_BUDGET =>
                {
                    warn!(
                        session = %session.id,
                        %reason,
                        "context too large, trimming window and retrying"
                    );
                    budget /= 2;
                    match self
                        .stream_round(session, &system_turn, budget, events, cancel)
                        .await
                    {
                        Ok(round) => round,
                        Err(err) => return self.abort(events, err).await,
                    }
                }
                Err(err) => return self.abort(events, err).await,
            };

            if let Some(round_usage) = round.usage {
                usage.absorb(round_usage);
                session.absorb_usage(round_usage);
            }

            // The full raw text, fences included, is what the session keeps:
            // later rounds must show the model its own calls.
            if !round.raw.is_empty() {
                session.append(Turn::assistant(round.raw.clone()));
            }
            let visible = round.visible.trim();
            if !visible.is_empty() {
                if !answer.is_empty() {
                    answer.push('\n');
                }
                answer.push_str(visible);
            }

            if !round.wants_dispatch() {
                info!(session = %session.id, rounds, commands_run, "request completed");
                emit(
                    events,
                    EngineEvent::Completed {
                        session_id: session.id.to_string(),
                        usage,
                        rounds,
                        commands_run,
                    },
                )
                .await;
                return Ok(RunSummary {
                    answer,
                    rounds,
                    commands_run,
                    usage,
                });
            }

            // Parse failures go back to the model as failed results so it
            // can correct the call in the next round.
            for (error, span) in &round.malformed {
                warn!(
                    session = %session.id,
                    error = %error,
                    start = span.start,
                    end = span.end,
                    "malformed command call"
                );
                session.append(Turn::tool_result(
                    "malformed",
                    serde_json::json!({
                        "cmd": serde_json::Value::Null,
                        "state": "failed",
                        "output": error.to_string(),
                    })
                    .to_string(),
                ));
            }

            if !round.calls.is_empty() {
                for call in &round.calls {
                    emit(
                        events,
                        EngineEvent::CommandStarted {
                            call_id: call.id.clone(),
                            name: call.name.clone(),
                            params: call.params.clone(),
                        },
                    )
                    .await;
                }

                let results = self.dispatcher.dispatch_all(&round.calls, cancel).await;
                commands_run += results.len();
                for result in results {
                    session.append(Turn::tool_result(result.call_id.clone(), result.render()));
                    emit(
                        events,
                        EngineEvent::CommandFinished {
                            name: result.command.clone(),
                            result,
                        },
                    )
                    .await;
                }
            }
            // Back to AwaitingProvider with the results in history.
        }
    }

    /// One provider round: select the window, stream the response through
    /// the scanner, emit `AnswerDelta` for visible text as it arrives.
    ///
    /// On cancellation or a stream error nothing is appended — the partial
    /// text the user already saw rendered stays on their screen, but the
    /// session records no partial assistant turn.
    async fn stream_round(
        &self,
        session: &Session,
        system_turn: &Turn,
        budget: usize,
        events: &mpsc::Sender<EngineEvent>,
        cancel: &CancellationToken,
    ) -> Result<RoundOutcome, OrchestrationError> {
        let window_budget = budget
            .saturating_sub(token::estimate_turn_tokens(system_turn))
            .max(MIN_BUDGET);

        let mut turns = vec![system_turn.clone()];
        turns.extend(session.windowed(window_budget));

        let mut request = ChatRequest::new(&self.model, turns).with_temperature(self.temperature);
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let mut stream = self
            .backend
            .stream_chat(request)
            .await
            .map_err(OrchestrationError::Provider)?;

        let mut scanner = CommandScanner::new();
        let mut outcome = RoundOutcome::new();

        loop {
            let next = tokio::select! {
                delta = stream.recv() => delta,
                _ = cancel.cancelled() => {
                    debug!(session = %session.id, "provider stream cancelled");
                    return Err(OrchestrationError::Cancelled);
                }
            };
            let Some(delta) = next else { break };
            let delta = delta.map_err(OrchestrationError::Provider)?;

            if let Some(text) = &delta.text {
                outcome.raw.push_str(text);
                for item in scanner.feed(text) {
                    absorb_item(item, &mut outcome, events).await;
                }
            }
            if let Some(delta_usage) = delta.usage {
                outcome.usage = Some(delta_usage);
            }
            if delta.done {
                break;
            }
        }

        // An unterminated call at stream end is discarded by the scanner.
        for item in scanner.finish() {
            absorb_item(item, &mut outcome, events).await;
        }

        Ok(outcome)
    }

    /// Emit the terminal `Aborted` event and surface the error.
    async fn abort(
        &self,
        events: &mpsc::Sender<EngineEvent>,
        err: OrchestrationError,
    ) -> Result<RunSummary, OrchestrationError> {
        let reason = match &err {
            OrchestrationError::RoundLimitExceeded { .. } => AbortReason::RoundLimitExceeded,
            OrchestrationError::Cancelled => AbortReason::Cancelled,
            OrchestrationError::Provider(_) => AbortReason::ProviderFailed,
        };
        emit(
            events,
            EngineEvent::Aborted {
                reason,
                message: err.to_string(),
            },
        )
        .await;
        Err(err)
    }
}

async fn absorb_item(
    item: ScanItem,
    outcome: &mut RoundOutcome,
    events: &mpsc::Sender<EngineEvent>,
) {
    match item {
        ScanItem::Text(text) => {
            outcome.visible.push_str(&text);
            emit(events, EngineEvent::AnswerDelta { text }).await;
        }
        ScanItem::Call(call) => {
            debug!(command = %call.name, "command call extracted");
            outcome.calls.push(call);
        }
        ScanItem::Malformed { error, span } => outcome.malformed.push((error, span)),
    }
}

/// Send an event; a dropped receiver is not an error, cancellation is the
/// explicit way to stop a run.
async fn emit(events: &mpsc::Sender<EngineEvent>, event: EngineEvent) {
    if events.send(event).await.is_err() {
        debug!("event receiver dropped");
    }
}
