//! Job session: the bridge between one provisioning worker and its
//! observers.
//!
//! The worker side is synchronous in spirit: `emit_*` calls return as soon
//! as the event is appended (fan-out happens on subscriber tasks), and
//! `ask_*` calls park the worker until an operator answers. The observer
//! side goes through [`JobSession::subscribe`] and the prompt lookup /
//! answer methods, which the HTTP layer exposes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::CoreError;
use crate::event::{Event, EventKind, EventLog};
use crate::prompt::{Prompt, PromptAnswer, PromptKind, PromptRegistry};
use crate::subscription::{EventSink, SubscriptionSet};
use crate::types::JobId;

/// Terminal metadata collected by a successful provisioning run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobOutcome {
    /// Domain name assigned to the cluster, if any.
    pub domain: Option<String>,
    /// One-time dashboard login token.
    pub dashboard_login_token: Option<String>,
    /// Cluster CA certificate (PEM). Base64 URL-safe encoded on the wire.
    pub ca_cert: Option<String>,
}

/// How a driven provisioning run ended.
#[derive(Debug, Clone)]
pub enum SessionResult {
    Completed(JobOutcome),
    Failed(String),
    Aborted,
}

/// The provisioning worker boundary.
///
/// Implementations receive the session they report into and the launch
/// parameters as JSON. Everything else about them is opaque to the core.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn run(
        &self,
        session: Arc<JobSession>,
        params: serde_json::Value,
    ) -> Result<JobOutcome, CoreError>;
}

/// One provisioning attempt: event log, prompt registry, subscriptions,
/// and the terminal flag. Owns all of them exclusively.
pub struct JobSession {
    id: JobId,
    log: Arc<EventLog>,
    prompts: PromptRegistry,
    subscriptions: SubscriptionSet,
    /// Set once, by the first `finish` or `abort`. No events are appended
    /// afterwards.
    terminal: AtomicBool,
    cancel: CancellationToken,
}

impl JobSession {
    pub fn new(id: JobId) -> Self {
        let log = Arc::new(EventLog::new());
        Self {
            id,
            log: Arc::clone(&log),
            prompts: PromptRegistry::new(),
            subscriptions: SubscriptionSet::new(log),
            terminal: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.load(Ordering::Acquire)
    }

    // -----------------------------------------------------------------------
    // Worker-facing API
    // -----------------------------------------------------------------------

    /// Record a progress message. Dropped if the job is already terminal.
    pub async fn emit_status(&self, text: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        let text = text.into();
        tracing::info!(job_id = %self.id, status = %text, "Job status");
        self.append(EventKind::Status, Some(text), None).await;
    }

    /// Record a worker error. Informational only; the job keeps running
    /// unless the worker itself decides to stop.
    pub async fn emit_error(&self, error: impl std::fmt::Display) {
        if self.is_terminal() {
            return;
        }
        let description = error.to_string();
        tracing::warn!(job_id = %self.id, error = %description, "Job error");
        self.append(EventKind::Error, Some(description), None).await;
    }

    /// Ask the operator a yes/no question and wait for the answer.
    ///
    /// Appends a `prompt` event for the unresolved prompt, parks until an
    /// answer arrives via [`JobSession::answer_prompt`], appends a second
    /// `prompt` event carrying the resolution, and returns the boolean.
    /// Returns `CoreError::Aborted` if the job is aborted while waiting.
    pub async fn ask_yes_no(&self, message: impl Into<String>) -> Result<bool, CoreError> {
        let answer = self.ask(PromptKind::YesNo, message.into()).await?;
        Ok(answer.yes)
    }

    /// Ask the operator for free-text input and wait for the answer.
    pub async fn ask_input(&self, message: impl Into<String>) -> Result<String, CoreError> {
        let answer = self.ask(PromptKind::Input, message.into()).await?;
        Ok(answer.input)
    }

    async fn ask(&self, kind: PromptKind, message: String) -> Result<PromptAnswer, CoreError> {
        if self.is_terminal() {
            return Err(CoreError::Conflict(
                "Cannot prompt on a finished job".into(),
            ));
        }

        let (prompt, rx) = self.prompts.create(kind, message).await;
        let prompt_id = prompt.id.clone();
        tracing::info!(job_id = %self.id, prompt_id = %prompt_id, "Prompt created");
        self.append(EventKind::Prompt, None, Some(prompt)).await;

        let answer = tokio::select! {
            answer = rx => answer
                .map_err(|_| CoreError::Internal("prompt waiter dropped".into()))?,
            () = self.cancel.cancelled() => return Err(CoreError::Aborted),
        };

        // Second prompt event lets observers see the resolution.
        let resolved = self.prompts.find(&prompt_id).await?;
        self.append(EventKind::Prompt, None, Some(resolved)).await;

        Ok(answer)
    }

    /// Emit the terminal metadata events and the final `done` event, mark
    /// the job terminal, and fire every subscription's done signal.
    ///
    /// Idempotent: calling it on an already-terminal job is a logged no-op.
    pub async fn finish(&self, outcome: JobOutcome) {
        if self.terminal.swap(true, Ordering::AcqRel) {
            tracing::warn!(job_id = %self.id, "finish called on a terminal job");
            return;
        }

        if let Some(domain) = &outcome.domain {
            self.append(EventKind::Domain, Some(domain.clone()), None)
                .await;
        }
        if let Some(token) = &outcome.dashboard_login_token {
            self.append(EventKind::DashboardLoginToken, Some(token.clone()), None)
                .await;
        }
        if let Some(ca_cert) = &outcome.ca_cert {
            self.append(EventKind::CaCert, Some(URL_SAFE.encode(ca_cert)), None)
                .await;
        }
        self.append(EventKind::Done, None, None).await;

        self.subscriptions.finish().await;
        tracing::info!(job_id = %self.id, "Job finished");
    }

    /// Abort the job: cancel any in-flight `ask_*` call (the worker gets
    /// `CoreError::Aborted`), mark the job terminal, and close every
    /// observer stream.
    pub async fn abort(&self) {
        self.terminal.store(true, Ordering::Release);
        self.cancel.cancel();
        self.subscriptions.finish().await;
        tracing::info!(job_id = %self.id, "Job aborted");
    }

    /// Run a provisioner to completion against this session.
    ///
    /// A worker error ends the job: the error is recorded as an `error`
    /// event and the job still finishes with a `done` event (and no
    /// terminal metadata). An abort produces neither.
    pub async fn drive(
        self: &Arc<Self>,
        provisioner: Arc<dyn Provisioner>,
        params: serde_json::Value,
    ) -> SessionResult {
        match provisioner.run(Arc::clone(self), params).await {
            Ok(outcome) => {
                self.finish(outcome.clone()).await;
                SessionResult::Completed(outcome)
            }
            Err(CoreError::Aborted) => {
                tracing::info!(job_id = %self.id, "Provisioner stopped by abort");
                SessionResult::Aborted
            }
            Err(error) => {
                self.emit_error(&error).await;
                self.finish(JobOutcome::default()).await;
                SessionResult::Failed(error.to_string())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Observer-facing API
    // -----------------------------------------------------------------------

    /// Attach an observer starting after `cursor` (`-1` for the full
    /// backlog). See [`SubscriptionSet::subscribe`].
    pub async fn subscribe(&self, cursor: i64, sink: EventSink) -> oneshot::Receiver<()> {
        self.subscriptions.subscribe(cursor, sink).await
    }

    /// Events with index greater than `cursor`, in order.
    pub async fn events_since(&self, cursor: i64) -> Vec<Arc<Event>> {
        self.log.since(cursor).await
    }

    /// All prompts of this job, in creation order.
    pub async fn list_prompts(&self) -> Vec<Prompt> {
        self.prompts.list().await
    }

    pub async fn find_prompt(&self, prompt_id: &str) -> Result<Prompt, CoreError> {
        self.prompts.find(prompt_id).await
    }

    /// Resolve a prompt on behalf of the operator. The only externally
    /// triggered mutation into the prompt registry.
    pub async fn answer_prompt(
        &self,
        prompt_id: &str,
        answer: PromptAnswer,
    ) -> Result<Prompt, CoreError> {
        let resolved = self.prompts.resolve(prompt_id, answer).await?;
        tracing::info!(job_id = %self.id, prompt_id = %prompt_id, "Prompt answered");
        Ok(resolved)
    }

    async fn append(&self, kind: EventKind, description: Option<String>, prompt: Option<Prompt>) {
        self.log.append(kind, description, prompt).await;
        self.subscriptions.notify_all().await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use super::*;

    fn new_session() -> Arc<JobSession> {
        Arc::new(JobSession::new(uuid::Uuid::new_v4()))
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<Arc<Event>>) -> Arc<Event> {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event stream closed unexpectedly")
    }

    #[tokio::test]
    async fn status_then_prompt_scenario_observed_in_order() {
        let session = new_session();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _done = session.subscribe(-1, tx).await;

        let worker = {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                session.emit_status("booting").await;
                session.ask_yes_no("Continue?").await
            })
        };

        let status = next_event(&mut rx).await;
        assert_eq!(status.kind, EventKind::Status);
        assert_eq!(status.description.as_deref(), Some("booting"));

        let asked = next_event(&mut rx).await;
        assert_eq!(asked.kind, EventKind::Prompt);
        let prompt = asked.prompt.clone().expect("prompt event carries prompt");
        assert!(!prompt.resolved);

        session
            .answer_prompt(
                &prompt.id,
                PromptAnswer {
                    yes: true,
                    input: String::new(),
                },
            )
            .await
            .unwrap();

        let resolved = next_event(&mut rx).await;
        assert_eq!(resolved.kind, EventKind::Prompt);
        let prompt = resolved.prompt.clone().unwrap();
        assert!(prompt.resolved);
        assert!(prompt.yes);

        let answer = worker.await.unwrap().unwrap();
        assert!(answer, "worker should unblock with the operator's answer");
    }

    #[tokio::test]
    async fn ask_input_returns_submitted_text() {
        let session = new_session();

        let worker = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.ask_input("Domain name?").await })
        };

        // Wait for the prompt to appear, then answer it.
        let prompt = loop {
            if let Some(prompt) = session.list_prompts().await.into_iter().next() {
                break prompt;
            }
            tokio::task::yield_now().await;
        };

        session
            .answer_prompt(
                &prompt.id,
                PromptAnswer {
                    yes: false,
                    input: "cluster.example.com".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(worker.await.unwrap().unwrap(), "cluster.example.com");
    }

    #[tokio::test]
    async fn finish_emits_metadata_then_done_and_marks_terminal() {
        let session = new_session();

        session
            .finish(JobOutcome {
                domain: Some("cluster.example.com".into()),
                dashboard_login_token: Some("tok-123".into()),
                ca_cert: Some("---CERT---".into()),
            })
            .await;

        assert!(session.is_terminal());

        let events = session.events_since(-1).await;
        let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Domain,
                EventKind::DashboardLoginToken,
                EventKind::CaCert,
                EventKind::Done,
            ]
        );

        // CA certificate travels base64 URL-safe encoded.
        assert_eq!(
            events[2].description.as_deref(),
            Some(URL_SAFE.encode("---CERT---").as_str())
        );
    }

    #[tokio::test]
    async fn finish_twice_appends_exactly_one_done_event() {
        let session = new_session();

        session.finish(JobOutcome::default()).await;
        session.finish(JobOutcome::default()).await;

        let events = session.events_since(-1).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Done);
    }

    #[tokio::test]
    async fn no_events_are_appended_after_terminal() {
        let session = new_session();
        session.finish(JobOutcome::default()).await;

        let result = session.ask_yes_no("Too late?").await;
        assert_matches!(result, Err(CoreError::Conflict(_)));

        assert_eq!(session.events_since(-1).await.len(), 1);
    }

    #[tokio::test]
    async fn abort_unblocks_in_flight_prompt_with_aborted() {
        let session = new_session();

        let worker = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.ask_yes_no("Stuck forever?").await })
        };

        // Let the worker reach the prompt wait.
        while session.list_prompts().await.is_empty() {
            tokio::task::yield_now().await;
        }

        session.abort().await;

        let result = worker.await.unwrap();
        assert_matches!(result, Err(CoreError::Aborted));
        assert!(session.is_terminal());
    }

    struct FailingProvisioner;

    #[async_trait]
    impl Provisioner for FailingProvisioner {
        async fn run(
            &self,
            session: Arc<JobSession>,
            _params: serde_json::Value,
        ) -> Result<JobOutcome, CoreError> {
            session.emit_status("starting").await;
            Err(CoreError::Internal("the cloud is on fire".into()))
        }
    }

    #[tokio::test]
    async fn drive_records_fatal_worker_error_and_still_finishes() {
        let session = new_session();

        let result = session
            .drive(Arc::new(FailingProvisioner), serde_json::Value::Null)
            .await;
        assert_matches!(result, SessionResult::Failed(_));

        let kinds: Vec<EventKind> = session
            .events_since(-1)
            .await
            .iter()
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![EventKind::Status, EventKind::Error, EventKind::Done]
        );
        assert!(session.is_terminal());
    }
}
