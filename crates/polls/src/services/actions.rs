//! Poll action orchestration.
//!
//! Every handler follows the same flow: mutate storage, emit a toast, then
//! hand the outcome to the optional callback. Failures are logged, shown
//! as a destructive toast and returned to the caller. Nothing is retried.

use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

use super::export_service;
use crate::entities::{Conversation, Poll, PollStatus, PollType};
use crate::repositories::PollStore;
use crate::types::{
    ActionOutcome, BulkOutcome, DeleteReport, ExportFormat, ExportedFile, PollError, PollResult,
    Toast,
};

/// Receives the toasts produced by actions.
pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Asks the user to approve a destructive action.
pub trait Confirmer: Send + Sync {
    fn confirm(&self, prompt: &ConfirmationPrompt) -> bool;
}

pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> PollResult<()>;
}

pub type ActionCallback = Arc<dyn Fn(&ActionOutcome) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationPrompt {
    pub action: &'static str,
    pub message: String,
}

/// Logs toasts through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, toast: Toast) {
        info!(
            title = %toast.title,
            description = %toast.description,
            variant = ?toast.variant,
            "toast"
        );
    }
}

/// Keeps every toast, newest last.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    toasts: Mutex<Vec<Toast>>,
}

impl RecordingNotifier {
    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, toast: Toast) {
        if let Ok(mut toasts) = self.toasts.lock() {
            toasts.push(toast);
        }
    }
}

/// Answers every prompt the same way, e.g. from an explicit `confirm` flag.
#[derive(Debug, Clone, Copy)]
pub struct StaticConfirmer(pub bool);

impl Confirmer for StaticConfirmer {
    fn confirm(&self, prompt: &ConfirmationPrompt) -> bool {
        if !self.0 {
            info!(action = prompt.action, "confirmation declined");
        }
        self.0
    }
}

/// Clipboard stand-in that remembers the last text written.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
}

impl MemoryClipboard {
    pub fn contents(&self) -> Option<String> {
        self.contents.lock().ok().and_then(|c| c.clone())
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&self, text: &str) -> PollResult<()> {
        let mut contents = self
            .contents
            .lock()
            .map_err(|_| PollError::clipboard("clipboard lock poisoned"))?;
        *contents = Some(text.to_string());
        Ok(())
    }
}

#[derive(Clone)]
pub struct PollActions {
    store: Arc<dyn PollStore>,
    notifier: Arc<dyn Notifier>,
    confirmer: Arc<dyn Confirmer>,
    clipboard: Arc<dyn Clipboard>,
    public_base_url: String,
    on_success: Option<ActionCallback>,
}

impl PollActions {
    pub fn new(store: Arc<dyn PollStore>, public_base_url: impl Into<String>) -> Self {
        Self {
            store,
            notifier: Arc::new(TracingNotifier),
            confirmer: Arc::new(StaticConfirmer(false)),
            clipboard: Arc::new(MemoryClipboard::default()),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            on_success: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_confirmer(mut self, confirmer: Arc<dyn Confirmer>) -> Self {
        self.confirmer = confirmer;
        self
    }

    pub fn with_clipboard(mut self, clipboard: Arc<dyn Clipboard>) -> Self {
        self.clipboard = clipboard;
        self
    }

    pub fn with_callback(mut self, callback: ActionCallback) -> Self {
        self.on_success = Some(callback);
        self
    }

    pub fn store(&self) -> &Arc<dyn PollStore> {
        &self.store
    }

    pub fn public_url(&self, poll: &Poll) -> String {
        format!("{}/poll/{}", self.public_base_url, poll.slug)
    }

    fn finish<T>(
        &self,
        action: &'static str,
        poll_id: &str,
        result: PollResult<T>,
        success: impl FnOnce(&T) -> (Toast, ActionOutcome),
    ) -> PollResult<T> {
        match result {
            Ok(value) => {
                let (toast, outcome) = success(&value);
                self.notifier.notify(toast);
                if let Some(callback) = &self.on_success {
                    callback(&outcome);
                }
                Ok(value)
            }
            Err(err @ PollError::Cancelled { .. }) => {
                info!(action, poll_id = %poll_id, "poll action cancelled");
                Err(err)
            }
            Err(err) => {
                error!(action, poll_id = %poll_id, error = %err, "poll action failed");
                self.notifier
                    .notify(Toast::destructive("Erreur", failure_message(action, &err)));
                Err(err)
            }
        }
    }

    fn confirm(&self, action: &'static str, message: String) -> PollResult<()> {
        let prompt = ConfirmationPrompt { action, message };
        if self.confirmer.confirm(&prompt) {
            Ok(())
        } else {
            Err(PollError::cancelled(action))
        }
    }

    /// Copy `{public_base_url}/poll/{slug}` to the clipboard.
    pub async fn copy_link(&self, poll: &Poll) -> PollResult<String> {
        let url = self.public_url(poll);
        let result = self.clipboard.write_text(&url).map(|_| url);
        self.finish("copy_link", &poll.id, result, |url| {
            (
                Toast::success("Lien copié", "Le lien du sondage a été copié dans le presse-papiers."),
                ActionOutcome::LinkCopied { url: url.clone() },
            )
        })
    }

    /// Deep-copy the poll and link a fresh conversation to the copy. The
    /// conversation inherits the original's messages when there is one.
    pub async fn duplicate(&self, poll: &Poll) -> PollResult<Poll> {
        let result = self.duplicate_inner(poll).await;
        self.finish("duplicate", &poll.id, result, |copy| {
            (
                Toast::success("Sondage dupliqué", format!("« {} » a été créé.", copy.title)),
                ActionOutcome::Duplicated { poll: copy.clone() },
            )
        })
    }

    async fn duplicate_inner(&self, poll: &Poll) -> PollResult<Poll> {
        let mut copy = self.store.duplicate_poll(poll).await?;

        let mut conversation = Conversation::new(copy.title.clone()).linked_to(&copy.id);
        if let Some(original_id) = &poll.conversation_id {
            match self.store.find_conversation(original_id).await? {
                Some(original) => conversation.messages = original.messages,
                None => warn!(
                    poll_id = %poll.id,
                    conversation_id = %original_id,
                    "linked conversation missing, duplicating without messages"
                ),
            }
        }
        self.store.insert_conversation(&conversation).await?;

        copy.conversation_id = Some(conversation.id.clone());
        self.store.save_poll(&copy).await?;
        Ok(copy)
    }

    pub async fn archive(&self, poll: &Poll) -> PollResult<Poll> {
        let result = self.change_status(poll, PollStatus::Archived).await;
        self.finish("archive", &poll.id, result, |archived| {
            (
                Toast::success("Sondage archivé", format!("« {} » a été archivé.", archived.title)),
                ActionOutcome::Archived {
                    poll: archived.clone(),
                },
            )
        })
    }

    /// Close after confirmation. Declining leaves the poll untouched.
    pub async fn close(&self, poll: &Poll) -> PollResult<Poll> {
        let result = match self.confirm(
            "close",
            format!("Clôturer « {} » ? Les participants ne pourront plus voter.", poll.title),
        ) {
            Ok(()) => self.change_status(poll, PollStatus::Closed).await,
            Err(err) => Err(err),
        };
        self.finish("close", &poll.id, result, |closed| {
            (
                Toast::success("Sondage clôturé", format!("« {} » est maintenant fermé.", closed.title)),
                ActionOutcome::Closed {
                    poll: closed.clone(),
                },
            )
        })
    }

    async fn change_status(&self, poll: &Poll, next: PollStatus) -> PollResult<Poll> {
        let mut updated = self.store.require_poll(&poll.id).await?;
        updated.transition_to(next)?;
        self.store.save_poll(&updated).await?;
        info!(poll_id = %updated.id, status = %next, "poll status changed");
        Ok(updated)
    }

    /// Irreversibly replace voter identities on a date poll.
    pub async fn anonymize(&self, poll: &Poll) -> PollResult<u64> {
        let result = self.anonymize_inner(poll).await;
        self.finish("anonymize", &poll.id, result, |votes| {
            (
                Toast::success(
                    "Données anonymisées",
                    format!("{votes} participation(s) anonymisée(s)."),
                ),
                ActionOutcome::Anonymized {
                    poll_id: poll.id.clone(),
                    votes: *votes,
                },
            )
        })
    }

    async fn anonymize_inner(&self, poll: &Poll) -> PollResult<u64> {
        if poll.poll_type() != PollType::Date {
            return Err(PollError::unsupported("anonymize", poll.poll_type()));
        }
        self.confirm(
            "anonymize",
            format!(
                "Anonymiser les participants de « {} » ? Cette action est irréversible.",
                poll.title
            ),
        )?;
        self.store.anonymize_votes_for_poll(&poll.id).await
    }

    /// Remove votes, then the poll, then optionally its conversation.
    pub async fn delete_with_cascade(
        &self,
        poll: &Poll,
        delete_conversation: bool,
    ) -> PollResult<DeleteReport> {
        let result = self.cascade(poll, delete_conversation).await;
        self.finish("delete", &poll.id, result, |report| {
            let description = match &report.conversation_error {
                Some(reason) => format!(
                    "« {} » a été supprimé, mais pas sa conversation : {reason}",
                    poll.title
                ),
                None => format!("« {} » a été supprimé.", poll.title),
            };
            (
                Toast::success("Sondage supprimé", description),
                ActionOutcome::Deleted {
                    report: report.clone(),
                },
            )
        })
    }

    async fn cascade(&self, poll: &Poll, delete_conversation: bool) -> PollResult<DeleteReport> {
        let votes_deleted = self.store.delete_votes_for_poll(&poll.id).await?;
        if !self.store.delete_poll(&poll.id).await? {
            return Err(PollError::poll_not_found(&poll.id));
        }

        let mut report = DeleteReport {
            poll_id: poll.id.clone(),
            votes_deleted,
            conversation_deleted: false,
            conversation_error: None,
        };

        if let (true, Some(conversation_id)) = (delete_conversation, &poll.conversation_id) {
            match self.store.delete_conversation(conversation_id).await {
                Ok(true) => report.conversation_deleted = true,
                Ok(false) => {
                    report.conversation_error =
                        Some(PollError::conversation_not_found(conversation_id).to_string())
                }
                Err(err) => {
                    warn!(
                        poll_id = %poll.id,
                        conversation_id = %conversation_id,
                        error = %err,
                        "conversation delete failed after poll removal"
                    );
                    report.conversation_error = Some(err.to_string());
                }
            }
        }

        Ok(report)
    }

    /// Export a form poll's responses.
    pub async fn export(&self, poll: &Poll, format: ExportFormat) -> PollResult<ExportedFile> {
        let result = self.export_inner(poll, format).await;
        self.finish("export", &poll.id, result, |file| {
            (
                Toast::success("Export réussi", format!("{} est prêt.", file.file_name)),
                ActionOutcome::Exported { file: file.clone() },
            )
        })
    }

    async fn export_inner(&self, poll: &Poll, format: ExportFormat) -> PollResult<ExportedFile> {
        if poll.poll_type() != PollType::Form {
            return Err(PollError::unsupported("export", poll.poll_type()));
        }
        let votes = self.store.list_votes(&poll.id).await?;
        export_service::export_form_poll(poll, &votes, format)
    }

    /// Cascade-delete each poll in turn, tallying successes and failures.
    /// A failure does not stop the remaining deletions.
    pub async fn bulk_delete(&self, ids: &[String], delete_conversations: bool) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();

        for id in ids {
            let result = match self.store.require_poll(id).await {
                Ok(poll) => self.cascade(&poll, delete_conversations).await,
                Err(err) => Err(err),
            };
            match result {
                Ok(report) => outcome.succeeded.push(report.poll_id),
                Err(err) => {
                    warn!(poll_id = %id, error = %err, "bulk delete item failed");
                    outcome.record_failure(id.clone(), err);
                }
            }
        }

        let toast = if outcome.failed.is_empty() {
            Toast::success(
                "Suppression terminée",
                format!("{} sondage(s) supprimé(s).", outcome.success_count()),
            )
        } else {
            Toast::destructive(
                "Suppression partielle",
                format!(
                    "{} sondage(s) supprimé(s), {} échec(s).",
                    outcome.success_count(),
                    outcome.failure_count()
                ),
            )
        };
        self.notifier.notify(toast);
        info!(
            succeeded = outcome.success_count(),
            failed = outcome.failure_count(),
            "bulk delete finished"
        );

        if let Some(callback) = &self.on_success {
            callback(&ActionOutcome::BulkDeleted {
                outcome: outcome.clone(),
            });
        }
        outcome
    }
}

fn failure_message(action: &str, err: &PollError) -> String {
    let verb = match action {
        "copy_link" => "copier le lien",
        "duplicate" => "dupliquer le sondage",
        "archive" => "archiver le sondage",
        "close" => "clôturer le sondage",
        "anonymize" => "anonymiser les participants",
        "delete" => "supprimer le sondage",
        "export" => "exporter les réponses",
        _ => "terminer l'action",
    };
    format!("Impossible de {verb} : {err}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        AnswerValue, ConversationMessage, DatePollContent, FormPollContent, FormQuestion,
        MessageRole, Preference, QuestionKind, Vote, VotePayload,
    };
    use crate::repositories::MemoryPollStore;
    use crate::types::ToastVariant;
    use std::collections::BTreeMap;

    struct Harness {
        store: Arc<MemoryPollStore>,
        notifier: Arc<RecordingNotifier>,
        clipboard: Arc<MemoryClipboard>,
        outcomes: Arc<Mutex<Vec<ActionOutcome>>>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: Arc::new(MemoryPollStore::new()),
                notifier: Arc::new(RecordingNotifier::default()),
                clipboard: Arc::new(MemoryClipboard::default()),
                outcomes: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn actions(&self, confirm: bool) -> PollActions {
            let outcomes = Arc::clone(&self.outcomes);
            PollActions::new(self.store.clone(), "https://doodates.example/")
                .with_notifier(self.notifier.clone())
                .with_clipboard(self.clipboard.clone())
                .with_confirmer(Arc::new(StaticConfirmer(confirm)))
                .with_callback(Arc::new(move |outcome: &ActionOutcome| {
                    outcomes.lock().unwrap().push(outcome.clone());
                }))
        }

        fn outcomes(&self) -> Vec<ActionOutcome> {
            self.outcomes.lock().unwrap().clone()
        }
    }

    async fn date_poll(store: &MemoryPollStore, voters: &[&str]) -> Poll {
        let poll = Poll::new(
            "Réunion d'équipe",
            DatePollContent {
                dates: vec!["2025-03-10".into()],
                ..Default::default()
            }
            .into(),
        );
        store.insert_poll(&poll).await.unwrap();
        for name in voters {
            let mut selections = BTreeMap::new();
            selections.insert("2025-03-10".to_string(), Preference::Yes);
            let vote = Vote::new(&poll.id, Some(name.to_string()), VotePayload::Date { selections })
                .with_email(format!("{name}@example.com"));
            store.insert_vote(&vote).await.unwrap();
        }
        poll
    }

    #[tokio::test]
    async fn test_copy_link_writes_public_url() {
        let h = Harness::new();
        let poll = date_poll(&h.store, &[]).await;

        let url = h.actions(false).copy_link(&poll).await.unwrap();
        assert_eq!(url, format!("https://doodates.example/poll/{}", poll.slug));
        assert_eq!(h.clipboard.contents(), Some(url.clone()));
        assert_eq!(h.outcomes(), vec![ActionOutcome::LinkCopied { url }]);
        assert_eq!(h.notifier.toasts()[0].variant, ToastVariant::Default);
    }

    #[tokio::test]
    async fn test_duplicate_links_new_conversation_with_copied_messages() {
        let h = Harness::new();
        let mut poll = date_poll(&h.store, &["alice"]).await;
        let conversation = Conversation::new("Chat")
            .linked_to(&poll.id)
            .with_messages(vec![ConversationMessage::new(MessageRole::User, "Un sondage pour lundi")]);
        h.store.insert_conversation(&conversation).await.unwrap();
        poll.conversation_id = Some(conversation.id.clone());
        h.store.save_poll(&poll).await.unwrap();

        let copy = h.actions(false).duplicate(&poll).await.unwrap();
        assert_ne!(copy.id, poll.id);
        assert_ne!(copy.slug, poll.slug);
        assert_eq!(copy.title, "Réunion d'équipe (copie)");
        assert_eq!(h.store.count_votes(&copy.id).await.unwrap(), 0);

        let stored = h.store.require_poll(&copy.id).await.unwrap();
        let linked_id = stored.conversation_id.expect("copy has a conversation");
        assert_ne!(linked_id, conversation.id);
        let linked = h.store.find_conversation(&linked_id).await.unwrap().unwrap();
        assert_eq!(linked.poll_id.as_deref(), Some(copy.id.as_str()));
        assert_eq!(linked.messages, conversation.messages);
    }

    #[tokio::test]
    async fn test_archive_then_archive_again_fails_with_toast() {
        let h = Harness::new();
        let poll = date_poll(&h.store, &[]).await;
        let actions = h.actions(false);

        let archived = actions.archive(&poll).await.unwrap();
        assert_eq!(archived.status, PollStatus::Archived);

        let err = actions.archive(&archived).await.unwrap_err();
        assert!(matches!(err, PollError::InvalidTransition { .. }));
        let toasts = h.notifier.toasts();
        assert_eq!(toasts.last().unwrap().variant, ToastVariant::Destructive);
        assert_eq!(h.outcomes().len(), 1);
    }

    #[tokio::test]
    async fn test_close_requires_confirmation() {
        let h = Harness::new();
        let poll = date_poll(&h.store, &[]).await;

        let err = h.actions(false).close(&poll).await.unwrap_err();
        assert!(matches!(err, PollError::Cancelled { .. }));
        assert_eq!(
            h.store.require_poll(&poll.id).await.unwrap().status,
            PollStatus::Active
        );
        assert!(h.notifier.toasts().is_empty());

        let closed = h.actions(true).close(&poll).await.unwrap();
        assert_eq!(closed.status, PollStatus::Closed);
    }

    #[tokio::test]
    async fn test_anonymize_only_for_date_polls() {
        let h = Harness::new();
        let poll = date_poll(&h.store, &["alice", "bob"]).await;

        assert_eq!(h.actions(true).anonymize(&poll).await.unwrap(), 2);
        let votes = h.store.list_votes(&poll.id).await.unwrap();
        assert!(votes.iter().all(|v| v.voter_email.is_none()));

        let form = Poll::new("Questionnaire", FormPollContent::default().into());
        h.store.insert_poll(&form).await.unwrap();
        let err = h.actions(true).anonymize(&form).await.unwrap_err();
        assert!(matches!(err, PollError::UnsupportedAction { .. }));
    }

    #[tokio::test]
    async fn test_delete_reports_missing_conversation() {
        let h = Harness::new();
        let mut poll = date_poll(&h.store, &["alice", "bob"]).await;
        poll.conversation_id = Some("gone".into());
        h.store.save_poll(&poll).await.unwrap();

        let report = h.actions(false).delete_with_cascade(&poll, true).await.unwrap();
        assert_eq!(report.votes_deleted, 2);
        assert!(!report.conversation_deleted);
        assert!(report.conversation_error.is_some());
        assert!(h.store.find_poll(&poll.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_export_rejects_date_polls_and_renders_forms() {
        let h = Harness::new();
        let date = date_poll(&h.store, &["alice"]).await;
        let err = h.actions(false).export(&date, ExportFormat::Csv).await.unwrap_err();
        assert!(matches!(err, PollError::UnsupportedAction { .. }));

        let form = Poll::new(
            "Retour atelier",
            FormPollContent {
                questions: vec![FormQuestion {
                    id: "q1".into(),
                    title: "Commentaire".into(),
                    required: false,
                    kind: QuestionKind::Text { placeholder: None },
                }],
                ..Default::default()
            }
            .into(),
        );
        h.store.insert_poll(&form).await.unwrap();
        let mut answers = BTreeMap::new();
        answers.insert("q1".to_string(), AnswerValue::Text("Super".into()));
        h.store
            .insert_vote(&Vote::new(&form.id, Some("Alice".into()), VotePayload::Form { answers }))
            .await
            .unwrap();

        let file = h.actions(false).export(&form, ExportFormat::Json).await.unwrap();
        assert_eq!(file.file_name, format!("{}-reponses.json", form.slug));
        assert!(file.body.contains("Super"));
    }

    #[tokio::test]
    async fn test_bulk_delete_continues_after_failure() {
        let h = Harness::new();
        let first = date_poll(&h.store, &["alice"]).await;
        let second = date_poll(&h.store, &[]).await;
        let ids = vec![first.id.clone(), "missing".to_string(), second.id.clone()];

        let outcome = h.actions(false).bulk_delete(&ids, false).await;
        assert_eq!(outcome.succeeded, vec![first.id.clone(), second.id.clone()]);
        assert_eq!(outcome.failure_count(), 1);
        assert_eq!(outcome.failed[0].id, "missing");
        assert!(h.store.list_polls().await.unwrap().is_empty());
        assert_eq!(
            h.notifier.toasts().last().unwrap().variant,
            ToastVariant::Destructive
        );
    }
}
