//! Ordered reactor dispatch
//!
//! A dispatcher holds reactors in registration order and invokes each one
//! on `notify`. A reactor failure is logged, flips the error flag on the
//! accumulator, and never stops the remaining reactors: the reply reactor
//! must still run after a persistence failure so the user hears something.

use crate::decision::Decision;
use crate::events::ClassifiedEvent;
use crate::ids::UserId;
use crate::observer::DispatchObserver;
use crate::reply::SinkError;
use crate::store::StoreError;
use std::sync::Arc;

/// A reactor raised; dispatch continues with the event flagged errored
#[derive(Debug, thiserror::Error)]
pub enum ReactorError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Mutable per-event accumulator, scoped to one dispatch
#[derive(Debug)]
pub struct Dispatch {
    pub user_id: UserId,
    pub decision: Decision,
    /// Set on any failure; reactors skip mutations and the reply reactor
    /// falls back to the generic-error notice
    pub errored: bool,
    /// Set by the reply reactor once an intent went out
    pub replied: bool,
}

impl Dispatch {
    pub fn new(user_id: UserId, decision: Decision) -> Self {
        Self {
            user_id,
            decision,
            errored: false,
            replied: false,
        }
    }
}

/// One reactor capability
pub trait Reactor: Send + Sync {
    /// Name used in failure diagnostics
    fn name(&self) -> &'static str;

    fn react(&self, event: &ClassifiedEvent, dispatch: &mut Dispatch) -> Result<(), ReactorError>;
}

/// Subject holding reactors in registration order.
///
/// Ordering is a correctness requirement: the caller registers persistence
/// before render so derived quantities read back inside the same dispatch.
pub struct EventDispatcher {
    reactors: Vec<Box<dyn Reactor>>,
    observer: Arc<dyn DispatchObserver>,
}

impl EventDispatcher {
    pub fn new(observer: Arc<dyn DispatchObserver>) -> Self {
        Self {
            reactors: Vec::new(),
            observer,
        }
    }

    /// Append a reactor; invocation order is append order
    pub fn add(&mut self, reactor: Box<dyn Reactor>) {
        self.reactors.push(reactor);
    }

    /// Invoke every reactor in order; returns the number of failures
    pub fn notify(&self, event: &ClassifiedEvent, dispatch: &mut Dispatch) -> usize {
        let mut failures = 0;
        for reactor in &self.reactors {
            if let Err(error) = reactor.react(event, dispatch) {
                tracing::warn!(
                    user = %dispatch.user_id,
                    reactor = reactor.name(),
                    %error,
                    "reactor failed"
                );
                self.observer
                    .on_reactor_failed(&dispatch.user_id, reactor.name(), &error.to_string());
                dispatch.errored = true;
                failures += 1;
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::observer::NoOpObserver;
    use std::sync::Mutex;

    struct Trace {
        calls: Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
        fail: bool,
    }

    impl Reactor for Trace {
        fn name(&self) -> &'static str {
            self.name
        }

        fn react(
            &self,
            _event: &ClassifiedEvent,
            _dispatch: &mut Dispatch,
        ) -> Result<(), ReactorError> {
            self.calls.lock().unwrap().push(self.name);
            if self.fail {
                Err(ReactorError::Store(StoreError::Storage("down".into())))
            } else {
                Ok(())
            }
        }
    }

    fn event() -> ClassifiedEvent {
        ClassifiedEvent {
            user_id: UserId::new("u1"),
            kind: EventKind::Subscribe,
        }
    }

    #[test]
    fn test_reactors_run_in_append_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new(Arc::new(NoOpObserver));
        for name in ["first", "second", "third"] {
            dispatcher.add(Box::new(Trace {
                calls: calls.clone(),
                name,
                fail: false,
            }));
        }

        let mut dispatch = Dispatch::new(UserId::new("u1"), Decision::inert());
        let failures = dispatcher.notify(&event(), &mut dispatch);

        assert_eq!(failures, 0);
        assert!(!dispatch.errored);
        assert_eq!(*calls.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_failure_flags_event_and_continues() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new(Arc::new(NoOpObserver));
        dispatcher.add(Box::new(Trace {
            calls: calls.clone(),
            name: "persist",
            fail: true,
        }));
        dispatcher.add(Box::new(Trace {
            calls: calls.clone(),
            name: "reply",
            fail: false,
        }));

        let mut dispatch = Dispatch::new(UserId::new("u1"), Decision::inert());
        let failures = dispatcher.notify(&event(), &mut dispatch);

        assert_eq!(failures, 1);
        assert!(dispatch.errored);
        // The reply reactor still ran after the persistence failure
        assert_eq!(*calls.lock().unwrap(), vec!["persist", "reply"]);
    }
}
