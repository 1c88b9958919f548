//! Interactive prompts: questions the provisioning worker cannot answer on
//! its own.
//!
//! The worker creates a prompt and parks on a oneshot channel; an operator
//! answers it over HTTP, which resolves the prompt and wakes the worker.
//! A prompt resolves exactly once. Double-resolution is a caller protocol
//! violation and is rejected with `CoreError::Conflict` rather than
//! overwriting the first answer.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, Mutex};

use crate::error::CoreError;

/// The two shapes of question a worker can ask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    /// A boolean question; answered with `yes`.
    YesNo,
    /// A free-text question; answered with `input`.
    Input,
}

/// An operator's answer to a prompt, as submitted over the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptAnswer {
    #[serde(default)]
    pub yes: bool,
    #[serde(default)]
    pub input: String,
}

/// Serializable snapshot of a prompt.
///
/// Wire representation: `{id, type, message, yes?, input?, resolved}`.
/// The answer fields are omitted while empty so an unresolved prompt looks
/// the same on the wire before and after this build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: PromptKind,

    pub message: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub yes: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub input: String,

    #[serde(default)]
    pub resolved: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Registry-internal prompt state: the public snapshot plus the waker for
/// the blocked worker.
struct PromptEntry {
    prompt: Prompt,
    /// Taken exactly once, by the first successful `resolve`.
    waiter: Option<oneshot::Sender<PromptAnswer>>,
}

/// Tracks the outstanding and resolved prompts of a single job.
///
/// All operations go through one mutex. Contention is negligible: a job
/// rarely has more than one prompt outstanding, though nothing here assumes
/// exactly one.
pub struct PromptRegistry {
    prompts: Mutex<Vec<PromptEntry>>,
}

impl PromptRegistry {
    pub fn new() -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Allocate a fresh unresolved prompt.
    ///
    /// Returns the snapshot to embed in a `prompt` event and the receiver
    /// the asking worker must await for the answer.
    pub async fn create(
        &self,
        kind: PromptKind,
        message: impl Into<String>,
    ) -> (Prompt, oneshot::Receiver<PromptAnswer>) {
        let (tx, rx) = oneshot::channel();
        let prompt = Prompt {
            id: new_prompt_id(),
            kind,
            message: message.into(),
            yes: false,
            input: String::new(),
            resolved: false,
        };
        self.prompts.lock().await.push(PromptEntry {
            prompt: prompt.clone(),
            waiter: Some(tx),
        });
        (prompt, rx)
    }

    /// Current snapshot of a prompt by id.
    pub async fn find(&self, id: &str) -> Result<Prompt, CoreError> {
        self.prompts
            .lock()
            .await
            .iter()
            .find(|entry| entry.prompt.id == id)
            .map(|entry| entry.prompt.clone())
            .ok_or(CoreError::NotFound {
                entity: "Prompt",
                id: id.to_string(),
            })
    }

    /// Snapshots of all prompts, in creation order.
    pub async fn list(&self) -> Vec<Prompt> {
        self.prompts
            .lock()
            .await
            .iter()
            .map(|entry| entry.prompt.clone())
            .collect()
    }

    /// Resolve a prompt, waking the worker that asked it.
    ///
    /// Exactly one caller wins: the answer is recorded, the waiter fires,
    /// and the resolved snapshot is returned. A second resolve for the same
    /// id gets `Conflict`; an unknown id gets `NotFound`.
    pub async fn resolve(&self, id: &str, answer: PromptAnswer) -> Result<Prompt, CoreError> {
        let mut prompts = self.prompts.lock().await;
        let entry = prompts
            .iter_mut()
            .find(|entry| entry.prompt.id == id)
            .ok_or(CoreError::NotFound {
                entity: "Prompt",
                id: id.to_string(),
            })?;

        if entry.prompt.resolved {
            return Err(CoreError::Conflict(format!(
                "Prompt {id} is already resolved"
            )));
        }

        entry.prompt.resolved = true;
        entry.prompt.yes = answer.yes;
        entry.prompt.input = answer.input.clone();

        // The waiter is gone only if the worker was aborted mid-prompt; the
        // answer is still recorded for observers.
        if let Some(waiter) = entry.waiter.take() {
            let _ = waiter.send(answer);
        }

        Ok(entry.prompt.clone())
    }
}

impl Default for PromptRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// 16 random bytes, hex-encoded. Opaque and unique per prompt.
fn new_prompt_id() -> String {
    let bytes: [u8; 16] = rand::random();
    let mut id = String::with_capacity(32);
    for byte in bytes {
        let _ = write!(id, "{byte:02x}");
    }
    id
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn create_returns_unresolved_prompt_with_unique_id() {
        let registry = PromptRegistry::new();

        let (p1, _rx1) = registry.create(PromptKind::YesNo, "Continue?").await;
        let (p2, _rx2) = registry.create(PromptKind::Input, "Domain name?").await;

        assert!(!p1.resolved);
        assert_eq!(p1.kind, PromptKind::YesNo);
        assert_eq!(p1.id.len(), 32);
        assert_ne!(p1.id, p2.id);
        assert_eq!(registry.list().await.len(), 2);
    }

    #[tokio::test]
    async fn resolve_wakes_waiter_with_answer() {
        let registry = PromptRegistry::new();
        let (prompt, rx) = registry.create(PromptKind::YesNo, "Continue?").await;

        let resolved = registry
            .resolve(
                &prompt.id,
                PromptAnswer {
                    yes: true,
                    input: String::new(),
                },
            )
            .await
            .unwrap();

        assert!(resolved.resolved);
        assert!(resolved.yes);

        let answer = rx.await.expect("waiter should receive the answer");
        assert!(answer.yes);
    }

    #[tokio::test]
    async fn resolve_unknown_id_is_not_found() {
        let registry = PromptRegistry::new();

        let result = registry.resolve("deadbeef", PromptAnswer::default()).await;
        assert_matches!(result, Err(CoreError::NotFound { entity: "Prompt", .. }));
    }

    #[tokio::test]
    async fn double_resolve_is_rejected_and_does_not_overwrite() {
        let registry = PromptRegistry::new();
        let (prompt, _rx) = registry.create(PromptKind::Input, "Domain name?").await;

        registry
            .resolve(
                &prompt.id,
                PromptAnswer {
                    yes: false,
                    input: "first.example.com".into(),
                },
            )
            .await
            .unwrap();

        let second = registry
            .resolve(
                &prompt.id,
                PromptAnswer {
                    yes: false,
                    input: "second.example.com".into(),
                },
            )
            .await;
        assert_matches!(second, Err(CoreError::Conflict(_)));

        let snapshot = registry.find(&prompt.id).await.unwrap();
        assert_eq!(snapshot.input, "first.example.com");
    }

    #[tokio::test]
    async fn concurrent_resolvers_produce_exactly_one_winner() {
        let registry = Arc::new(PromptRegistry::new());
        let (prompt, rx) = registry.create(PromptKind::YesNo, "Continue?").await;

        let mut handles = Vec::new();
        for i in 0..8 {
            let registry = Arc::clone(&registry);
            let id = prompt.id.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .resolve(
                        &id,
                        PromptAnswer {
                            yes: i % 2 == 0,
                            input: String::new(),
                        },
                    )
                    .await
            }));
        }

        let mut wins = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(CoreError::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(conflicts, 7);

        // The worker unblocks exactly once, with the winning answer.
        rx.await.expect("winner should have fired the waiter");
    }

    #[tokio::test]
    async fn resolve_with_dropped_waiter_still_records_answer() {
        let registry = PromptRegistry::new();
        let (prompt, rx) = registry.create(PromptKind::YesNo, "Continue?").await;
        drop(rx);

        let resolved = registry
            .resolve(&prompt.id, PromptAnswer { yes: true, input: String::new() })
            .await
            .unwrap();
        assert!(resolved.resolved);
    }

    #[test]
    fn unresolved_prompt_wire_format_omits_answer_fields() {
        let prompt = Prompt {
            id: "abc123".into(),
            kind: PromptKind::YesNo,
            message: "Continue?".into(),
            yes: false,
            input: String::new(),
            resolved: false,
        };

        let json = serde_json::to_value(&prompt).unwrap();
        assert_eq!(json["type"], "yes_no");
        assert_eq!(json["resolved"], false);
        assert!(json.get("yes").is_none());
        assert!(json.get("input").is_none());
    }
}
