//! Dispatch observability

use crate::events::ClassifiedEvent;
use crate::ids::UserId;
use crate::state::ConversationState;

/// Observer trait for external observability
pub trait DispatchObserver: Send + Sync + 'static {
    fn on_event_received(&self, event: &ClassifiedEvent);
    fn on_illegal_event(&self, event: &ClassifiedEvent);
    fn on_transition(&self, user: &UserId, state: &ConversationState);
    fn on_reactor_failed(&self, user: &UserId, reactor: &str, error: &str);
    fn on_dispatched(&self, user: &UserId, errored: bool);
}

/// No-op observer
pub struct NoOpObserver;

impl DispatchObserver for NoOpObserver {
    fn on_event_received(&self, _event: &ClassifiedEvent) {}
    fn on_illegal_event(&self, _event: &ClassifiedEvent) {}
    fn on_transition(&self, _user: &UserId, _state: &ConversationState) {}
    fn on_reactor_failed(&self, _user: &UserId, _reactor: &str, _error: &str) {}
    fn on_dispatched(&self, _user: &UserId, _errored: bool) {}
}

/// Tracing-based observer
pub struct TracingObserver;

impl DispatchObserver for TracingObserver {
    fn on_event_received(&self, event: &ClassifiedEvent) {
        tracing::info!(user = %event.user_id, kind = event.event_type(), "Event received");
    }

    fn on_illegal_event(&self, event: &ClassifiedEvent) {
        tracing::info!(user = %event.user_id, kind = event.event_type(), "Event rejected");
    }

    fn on_transition(&self, user: &UserId, state: &ConversationState) {
        tracing::info!(
            user = %user,
            register = ?state.register,
            list = ?state.list,
            recipe = ?state.recipe,
            "State transition"
        );
    }

    fn on_reactor_failed(&self, user: &UserId, reactor: &str, error: &str) {
        tracing::warn!(user = %user, reactor = %reactor, error = %error, "Reactor failed");
    }

    fn on_dispatched(&self, user: &UserId, errored: bool) {
        tracing::info!(user = %user, errored, "Dispatch finished");
    }
}
