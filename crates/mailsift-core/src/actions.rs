use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, info};

use crate::emails::EmailRecord;
use crate::labels::{
    CATEGORY_SOCIAL, IMPORTANT, INBOX, LabelService, RemoteServiceError, SPAM, STARRED, UNREAD,
};

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0} - invalid action")]
    InvalidAction(String),
    #[error(transparent)]
    Remote(#[from] RemoteServiceError),
}

/// An action name outside the supported set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0} - invalid action")]
pub struct UnknownAction(pub String);

impl From<UnknownAction> for ActionError {
    fn from(err: UnknownAction) -> Self {
        ActionError::InvalidAction(err.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    MarkAsUnread,
    MarkAsRead,
    MoveToStarred,
    MoveToImportant,
    MoveToSpam,
    MoveToCategorySocial,
    MoveToInbox,
}

/// Whether an action wants its label present or absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelChange {
    Add,
    Remove,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::MarkAsUnread => "mark_as_unread",
            Action::MarkAsRead => "mark_as_read",
            Action::MoveToStarred => "move_to_starred",
            Action::MoveToImportant => "move_to_important",
            Action::MoveToSpam => "move_to_spam",
            Action::MoveToCategorySocial => "move_to_category_social",
            Action::MoveToInbox => "move_to_inbox",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Action::MarkAsUnread | Action::MarkAsRead => UNREAD,
            Action::MoveToStarred => STARRED,
            Action::MoveToImportant => IMPORTANT,
            Action::MoveToSpam => SPAM,
            Action::MoveToCategorySocial => CATEGORY_SOCIAL,
            Action::MoveToInbox => INBOX,
        }
    }

    pub fn change(&self) -> LabelChange {
        match self {
            Action::MarkAsRead => LabelChange::Remove,
            _ => LabelChange::Add,
        }
    }
}

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mark_as_unread" => Ok(Action::MarkAsUnread),
            "mark_as_read" => Ok(Action::MarkAsRead),
            "move_to_starred" => Ok(Action::MoveToStarred),
            "move_to_important" => Ok(Action::MoveToImportant),
            "move_to_spam" => Ok(Action::MoveToSpam),
            "move_to_category_social" => Ok(Action::MoveToCategorySocial),
            "move_to_inbox" => Ok(Action::MoveToInbox),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// Classifies every name before anything is sent, so one bad name leaves the
/// record untouched.
pub fn parse_actions<S: AsRef<str>>(names: &[S]) -> Result<Vec<Action>, UnknownAction> {
    names.iter().map(|name| name.as_ref().parse()).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionOutcome {
    pub mutations: usize,
    pub skipped: usize,
}

impl ActionOutcome {
    fn absorb(&mut self, other: ActionOutcome) {
        self.mutations += other.mutations;
        self.skipped += other.skipped;
    }
}

pub struct ActionExecutor<L> {
    labels: L,
}

impl<L: LabelService> ActionExecutor<L> {
    pub fn new(labels: L) -> Self {
        Self { labels }
    }

    pub async fn execute_actions<S: AsRef<str>>(
        &self,
        record: &EmailRecord,
        actions: &[S],
    ) -> Result<ActionOutcome, ActionError> {
        let actions = parse_actions(actions)?;
        Ok(self.apply(record, &actions).await?)
    }

    /// Applies already classified actions in order. Each action reads the
    /// current labels and only writes when the state differs.
    pub async fn apply(
        &self,
        record: &EmailRecord,
        actions: &[Action],
    ) -> Result<ActionOutcome, RemoteServiceError> {
        let mut outcome = ActionOutcome::default();
        for action in actions {
            outcome.absorb(self.apply_one(record, *action).await?);
        }
        Ok(outcome)
    }

    async fn apply_one(
        &self,
        record: &EmailRecord,
        action: Action,
    ) -> Result<ActionOutcome, RemoteServiceError> {
        let label = action.label();
        let current = self.labels.get_labels(&record.id).await?;
        let present = current.contains(label);

        match (action.change(), present) {
            (LabelChange::Add, false) => {
                self.labels.add_label(&record.id, label).await?;
            }
            (LabelChange::Remove, true) => {
                self.labels.remove_label(&record.id, label).await?;
            }
            _ => {
                debug!(
                    message_id = %record.id,
                    action = action.as_str(),
                    label,
                    "label already in requested state"
                );
                return Ok(ActionOutcome {
                    mutations: 0,
                    skipped: 1,
                });
            }
        }

        info!(
            message_id = %record.id,
            action = action.as_str(),
            label,
            "applied label change"
        );
        Ok(ActionOutcome {
            mutations: 1,
            skipped: 0,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::labels::{LabelService, RemoteServiceError};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Get(String),
        Add(String, String),
        Remove(String, String),
    }

    /// In-memory label service that records every call.
    #[derive(Default)]
    pub struct RecordingLabels {
        state: Mutex<HashMap<String, HashSet<String>>>,
        calls: Mutex<Vec<Call>>,
        fail_on: Option<String>,
    }

    impl RecordingLabels {
        pub fn with_labels(message_id: &str, labels: &[&str]) -> Self {
            let service = Self::default();
            service.set_labels(message_id, labels);
            service
        }

        pub fn failing_for(message_id: &str) -> Self {
            Self {
                fail_on: Some(message_id.to_string()),
                ..Self::default()
            }
        }

        pub fn set_labels(&self, message_id: &str, labels: &[&str]) {
            self.state.lock().unwrap().insert(
                message_id.to_string(),
                labels.iter().map(|label| label.to_string()).collect(),
            );
        }

        pub fn labels_of(&self, message_id: &str) -> HashSet<String> {
            self.state
                .lock()
                .unwrap()
                .get(message_id)
                .cloned()
                .unwrap_or_default()
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn modifications(&self) -> Vec<Call> {
            self.calls()
                .into_iter()
                .filter(|call| !matches!(call, Call::Get(_)))
                .collect()
        }

        fn check(&self, message_id: &str) -> Result<(), RemoteServiceError> {
            if self.fail_on.as_deref() == Some(message_id) {
                return Err(RemoteServiceError::Service {
                    message_id: message_id.to_string(),
                    reason: "unavailable".into(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl LabelService for RecordingLabels {
        async fn get_labels(
            &self,
            message_id: &str,
        ) -> Result<HashSet<String>, RemoteServiceError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Get(message_id.to_string()));
            self.check(message_id)?;
            Ok(self.labels_of(message_id))
        }

        async fn add_label(&self, message_id: &str, label: &str) -> Result<(), RemoteServiceError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Add(message_id.to_string(), label.to_string()));
            self.check(message_id)?;
            self.state
                .lock()
                .unwrap()
                .entry(message_id.to_string())
                .or_default()
                .insert(label.to_string());
            Ok(())
        }

        async fn remove_label(
            &self,
            message_id: &str,
            label: &str,
        ) -> Result<(), RemoteServiceError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Remove(message_id.to_string(), label.to_string()));
            self.check(message_id)?;
            if let Some(labels) = self.state.lock().unwrap().get_mut(message_id) {
                labels.remove(label);
            }
            Ok(())
        }
    }
}
