// ABOUTME: Correlates a long-running management task with its terminal notification.
// ABOUTME: Callback side runs on the client's delivery thread; the deploy task waits with a deadline.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::error::SubscriptionError;
use crate::remote::{
    ClientHandle, ManagementClient, Notification, NotificationFilter, NotificationListener,
    Properties, TaskName, TaskStatus, app_management_query,
};
use crate::types::{CorrelationId, ListenerId, ObjectName};

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// Where a watched task stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalOutcome {
    Pending,
    Succeeded,
    Failed,
}

#[derive(Debug)]
struct SubscriptionState {
    outcome: TerminalOutcome,
    messages: Vec<String>,
    last_properties: Properties,
    abandoned: bool,
}

struct Shared {
    watched: Vec<TaskName>,
    correlation: CorrelationId,
    state: Mutex<SubscriptionState>,
    wake: Notify,
    registration: Mutex<Option<(ObjectName, ListenerId)>>,
    client: Weak<dyn ManagementClient>,
}

impl Shared {
    fn outcome(&self) -> TerminalOutcome {
        self.state.lock().outcome
    }

    /// Remove the listener from the server. Runs at most once per registration;
    /// removal errors are logged and dropped.
    fn detach(&self) {
        let Some((object, listener)) = self.registration.lock().take() else {
            return;
        };
        let Some(client) = self.client.upgrade() else {
            return;
        };
        if let Err(e) = client.remove_notification_listener(&object, &listener) {
            tracing::debug!(
                subscription = %self.correlation,
                error = %e,
                "ignoring listener removal failure"
            );
        }
    }
}

impl NotificationListener for Shared {
    fn handle_notification(&self, notification: &Notification, handback: &str) {
        if handback != self.correlation.as_str() {
            return;
        }

        tracing::debug!(
            subscription = %self.correlation,
            task = %notification.task_name,
            status = notification.status.as_wire(),
            message = %notification.message,
            "management notification"
        );

        let resolved = {
            let mut state = self.state.lock();
            if state.abandoned {
                return;
            }
            state.messages.push(notification.message.clone());

            let watched = notification
                .task()
                .is_some_and(|task| self.watched.contains(&task));
            if !watched
                || !notification.status.is_terminal()
                || state.outcome != TerminalOutcome::Pending
            {
                false
            } else {
                state.outcome = if notification.status == TaskStatus::Failed {
                    TerminalOutcome::Failed
                } else {
                    TerminalOutcome::Succeeded
                };
                state.last_properties = notification.properties.clone();
                true
            }
        };

        if resolved {
            self.detach();
            self.wake.notify_one();
        }
    }
}

/// A listener registration on the application management object, watching
/// for the first terminal notification of a set of tasks.
///
/// Dropping the subscription unsubscribes it.
pub struct NotificationSubscription {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for NotificationSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationSubscription")
            .field("correlation", &self.shared.correlation)
            .field("watched", &self.shared.watched)
            .field("outcome", &self.outcome())
            .finish()
    }
}

impl NotificationSubscription {
    /// Register for notifications before issuing the operation they report on.
    pub async fn create(
        client: &ClientHandle,
        watched: &[TaskName],
        tag: &str,
    ) -> Result<Self, SubscriptionError> {
        let object = client
            .query_names(&app_management_query())
            .await
            .map_err(SubscriptionError::Lookup)?
            .into_iter()
            .next()
            .ok_or(SubscriptionError::ManagementObjectNotFound)?;

        let correlation = CorrelationId::new(format!(
            "{tag}#{}",
            NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed)
        ));

        let shared = Arc::new(Shared {
            watched: watched.to_vec(),
            correlation: correlation.clone(),
            state: Mutex::new(SubscriptionState {
                outcome: TerminalOutcome::Pending,
                messages: Vec::new(),
                last_properties: Properties::new(),
                abandoned: false,
            }),
            wake: Notify::new(),
            registration: Mutex::new(None),
            client: Arc::downgrade(client),
        });

        let listener = client
            .add_notification_listener(
                &object,
                &NotificationFilter::app_management(),
                Arc::clone(&shared) as Arc<dyn NotificationListener>,
                correlation.as_str(),
            )
            .map_err(SubscriptionError::Registration)?;

        *shared.registration.lock() = Some((object, listener));

        // The terminal event may have raced the bookkeeping above.
        if shared.outcome() != TerminalOutcome::Pending {
            shared.detach();
        }

        tracing::debug!(subscription = %correlation, ?watched, "subscribed");
        Ok(Self { shared })
    }

    /// Wait until a watched task ends or `timeout` passes. Returns
    /// [`TerminalOutcome::Pending`] on timeout.
    /// A timeout too large to express as a deadline waits without one.
    pub async fn wait(&self, timeout: Duration) -> TerminalOutcome {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let notified = self.shared.wake.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let outcome = self.shared.outcome();
            if outcome != TerminalOutcome::Pending {
                return outcome;
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return self.shared.outcome();
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Stop listening. Later notifications are ignored. Safe to call repeatedly.
    pub fn unsubscribe(&self) {
        self.shared.state.lock().abandoned = true;
        self.shared.detach();
    }

    pub fn outcome(&self) -> TerminalOutcome {
        self.shared.outcome()
    }

    /// Every notification message received, one per line.
    pub fn message_log(&self) -> String {
        self.shared.state.lock().messages.join("\n")
    }

    /// Properties carried by the terminal notification.
    pub fn last_properties(&self) -> Properties {
        self.shared.state.lock().last_properties.clone()
    }

    pub fn is_registered(&self) -> bool {
        self.shared.registration.lock().is_some()
    }

    pub fn correlation(&self) -> &CorrelationId {
        &self.shared.correlation
    }
}

impl Drop for NotificationSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
