//! Change sessions: the unit-of-work boundary for signal collection.
//!
//! A host opens one session per logical write (a request, a job run),
//! reports every mutation through the [`Observer`] hooks, and closes the
//! session when the write commits. Classification and dispatch happen at
//! close; an abandoned session emits nothing until something closes it.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::classify;
use crate::entity::{ChangeKind, Instance, Signal};
use crate::registry::Registry;
use crate::store::{DataStore, EventSink, Observer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting signals.
    Open,
    /// Classifying; no new signals accepted.
    Closing,
    /// Done. Further closes are no-ops.
    Closed,
}

/// Collects mutation signals for one unit of work and, on close, classifies
/// them into at most one event per (registration, root instance).
pub struct ChangeSession {
    registry: Arc<Registry>,
    store: Arc<dyn DataStore>,
    sink: Arc<dyn EventSink>,
    signals: VecDeque<Signal>,
    state: SessionState,
}

impl ChangeSession {
    pub fn new(
        registry: Arc<Registry>,
        store: Arc<dyn DataStore>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            registry,
            store,
            sink,
            signals: VecDeque::new(),
            state: SessionState::Open,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of signals collected so far.
    pub fn pending(&self) -> usize {
        self.signals.len()
    }

    fn accepting(&self) -> bool {
        self.state == SessionState::Open && !self.registry.is_suspended()
    }

    fn push(&mut self, instance: Instance, kind: ChangeKind) {
        self.signals.push_back(Signal::new(instance, kind));
    }

    /// Classify collected signals and hand the resulting events to the sink.
    /// Idempotent: only the first close on an open session does anything.
    pub fn close(&mut self) {
        if self.state != SessionState::Open {
            return;
        }
        self.state = SessionState::Closing;

        for registration in self.registry.registrations() {
            classify::exec(
                &registration,
                &self.signals,
                self.store.as_ref(),
                self.sink.as_ref(),
            );
        }

        self.signals.clear();
        self.state = SessionState::Closed;
    }
}

impl Observer for ChangeSession {
    fn on_created(&mut self, instance: Instance) {
        if !self.accepting() {
            return;
        }
        self.push(instance, ChangeKind::Created);
    }

    fn on_updated(&mut self, instance: Instance) {
        if !self.accepting() {
            return;
        }
        self.push(instance, ChangeKind::Updated);
    }

    /// A link-table change is an update of the instance on either side.
    fn on_relation_changed(&mut self, instance: Instance) {
        self.on_updated(instance);
    }

    /// Must run while the row still exists: owner lookup and the reverse
    /// traversal from nested instances to their roots both stop working the
    /// moment the delete lands.
    fn on_deleting(&mut self, mut instance: Instance) {
        if !self.accepting() {
            return;
        }

        for registration in self.registry.registrations() {
            if registration.root() == &instance.entity {
                if instance.cached_owner.is_none() {
                    instance.cached_owner = registration.resolve_owner(&instance);
                }
                continue;
            }

            let Some(query) = registration.getter(&instance.entity) else {
                continue;
            };
            match query.roots(self.store.as_ref(), registration.root(), &instance) {
                Ok(roots) => {
                    for mut root in roots {
                        if root.cached_owner.is_none() {
                            root.cached_owner = registration.resolve_owner(&root);
                        }
                        self.push(root, ChangeKind::Updated);
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        target: "tattle_session",
                        base_name = %registration.base_name(),
                        entity = %instance.entity,
                        key = %instance.key,
                        error = %err,
                        "Pre-delete root lookup failed; affected roots will not be notified"
                    );
                }
            }
        }

        self.push(instance, ChangeKind::Deleted);
    }
}

/// Scope guard that closes its session on drop, so an early return or panic
/// in the host's write path still flushes collected signals.
pub struct SessionScope {
    session: ChangeSession,
}

impl SessionScope {
    pub fn new(session: ChangeSession) -> Self {
        Self { session }
    }

    /// Close explicitly. Equivalent to dropping the scope, but reads better
    /// at the end of a happy path.
    pub fn finish(mut self) {
        self.session.close();
    }
}

impl Deref for SessionScope {
    type Target = ChangeSession;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl DerefMut for SessionScope {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.session
    }
}

impl Drop for SessionScope {
    fn drop(&mut self) {
        self.session.close();
    }
}
