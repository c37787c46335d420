//! ConversationCore: one inbound event, end to end
//!
//! `handle` classifies the event, loads the user's state, validates
//! legality, computes the transition plus reply plan, and drives the
//! dispatcher (persistence first, then reply). It never returns an error
//! to the caller; failures flip the event's error flag and the reply
//! collapses to the generic-error notice.

use crate::date;
use crate::decision::{Decision, ReplyPlan, SideEffect};
use crate::dispatch::{Dispatch, EventDispatcher};
use crate::events::{ClassifiedEvent, Command, EventKind, InboundEvent, Sequence};
use crate::ids::UserId;
use crate::observer::{DispatchObserver, NoOpObserver};
use crate::pager::{toggle, NavDirection};
use crate::phonetics::PhoneticKeyer;
use crate::reactors::{PersistReactor, ReplyReactor};
use crate::reply::{BrowseFlow, Notice, ReplySink};
use crate::state::{ConversationState, ListStatus, Menu, RecipeStatus, RegisterStatus};
use crate::stats::{DispatchStats, DispatchStatsSnapshot};
use crate::store::{Repository, StoreError};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Free-text length cap enforced at entry, in characters
pub const MAX_ITEM_CHARS: usize = 15;

/// How one dispatch ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandleOutcome {
    pub errored: bool,
    pub replied: bool,
}

#[derive(Debug, thiserror::Error)]
enum DecideError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no conversation state for user")]
    MissingState,
    #[error("payload missing {0}")]
    MissingField(&'static str),
    #[error("not a calendar date: {0}")]
    BadDate(Box<str>),
}

/// The decision core. One instance serves every user; all per-user data
/// lives behind the injected repository.
pub struct ConversationCore {
    repo: Arc<dyn Repository>,
    sink: Arc<dyn ReplySink>,
    keyer: Arc<dyn PhoneticKeyer>,
    observer: Arc<dyn DispatchObserver>,
    stats: Arc<DispatchStats>,
}

impl ConversationCore {
    pub fn new(
        repo: Arc<dyn Repository>,
        sink: Arc<dyn ReplySink>,
        keyer: Arc<dyn PhoneticKeyer>,
    ) -> Self {
        Self {
            repo,
            sink,
            keyer,
            observer: Arc::new(NoOpObserver),
            stats: Arc::new(DispatchStats::new()),
        }
    }

    /// Swap in an observer (defaults to no-op)
    pub fn with_observer(mut self, observer: Arc<dyn DispatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Counter snapshot
    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }

    /// Process one inbound event to completion
    pub fn handle(&self, event: InboundEvent) -> HandleOutcome {
        self.stats.events_received.fetch_add(1, Ordering::Relaxed);
        let user_id = event.user_id.clone();

        let classified = match ClassifiedEvent::classify(event) {
            Ok(classified) => classified,
            Err(error) => {
                tracing::warn!(user = %user_id, %error, "postback payload did not parse");
                self.stats.malformed_payloads.fetch_add(1, Ordering::Relaxed);
                ClassifiedEvent {
                    user_id: user_id.clone(),
                    kind: EventKind::Malformed,
                }
            }
        };
        self.observer.on_event_received(&classified);

        let mut dispatch = if matches!(classified.kind, EventKind::Malformed) {
            let mut errored = Dispatch::new(user_id.clone(), Decision::inert());
            errored.errored = true;
            errored
        } else {
            match self.decide(&classified) {
                Ok(decision) => {
                    if matches!(
                        decision.reply,
                        ReplyPlan::Notice(Notice::Unrecognized | Notice::Unavailable)
                    ) {
                        self.stats.illegal_events.fetch_add(1, Ordering::Relaxed);
                        self.observer.on_illegal_event(&classified);
                    }
                    Dispatch::new(user_id.clone(), decision)
                }
                Err(error) => {
                    tracing::warn!(user = %user_id, %error, "event could not be decided");
                    let mut errored = Dispatch::new(user_id.clone(), Decision::inert());
                    errored.errored = true;
                    errored
                }
            }
        };

        // Reactor order is the correctness contract: persist, then reply.
        let mut dispatcher = EventDispatcher::new(self.observer.clone());
        dispatcher.add(Box::new(PersistReactor::new(
            self.repo.clone(),
            self.keyer.clone(),
        )));
        dispatcher.add(Box::new(ReplyReactor::new(
            self.repo.clone(),
            self.sink.clone(),
        )));
        let failures = dispatcher.notify(&classified, &mut dispatch);

        self.stats
            .reactor_failures
            .fetch_add(failures as u64, Ordering::Relaxed);
        if !dispatch.errored {
            if let Some(state) = &dispatch.decision.state {
                self.stats.transitions_applied.fetch_add(1, Ordering::Relaxed);
                self.observer.on_transition(&user_id, state);
            }
        }
        if dispatch.replied {
            self.stats.replies_sent.fetch_add(1, Ordering::Relaxed);
        }
        self.observer.on_dispatched(&user_id, dispatch.errored);

        HandleOutcome {
            errored: dispatch.errored,
            replied: dispatch.replied,
        }
    }

    fn load_state(&self, user: &UserId) -> Result<ConversationState, DecideError> {
        self.repo.get_state(user)?.ok_or(DecideError::MissingState)
    }

    fn decide(&self, event: &ClassifiedEvent) -> Result<Decision, DecideError> {
        match &event.kind {
            EventKind::Subscribe => Ok(Decision {
                state: None,
                effect: SideEffect::Subscribe,
                reply: ReplyPlan::Notice(Notice::Welcome),
            }),
            EventKind::Unsubscribe => Ok(Decision {
                state: None,
                effect: SideEffect::Unsubscribe,
                reply: ReplyPlan::None,
            }),
            EventKind::Text { text, menu } => {
                let state = self.load_state(&event.user_id)?;
                Ok(decide_text(state, text, *menu))
            }
            EventKind::Postback {
                payload,
                picked_date,
            } => {
                let state = self.load_state(&event.user_id)?;
                decide_postback(state, payload, picked_date.as_deref())
            }
            // Handled before decide is reached
            EventKind::Malformed => Ok(Decision::inert()),
        }
    }
}

/// Transition for a text event. Valid only as a menu label or as the item
/// name the register flow is waiting for; over-long text is always invalid.
fn decide_text(state: ConversationState, text: &str, menu: Option<Menu>) -> Decision {
    if text.chars().count() > MAX_ITEM_CHARS {
        return Decision::rejected(Notice::Unrecognized);
    }

    if let Some(menu) = menu {
        let mut next = state;
        next.select_menu(menu);
        let reply = match menu {
            Menu::Register => ReplyPlan::Notice(Notice::AskItemName),
            Menu::List => fresh_browse(BrowseFlow::List),
            Menu::Recipe => fresh_browse(BrowseFlow::Recipe),
        };
        return Decision {
            state: Some(next),
            effect: SideEffect::None,
            reply,
        };
    }

    if state.register == RegisterStatus::WaitItem {
        let mut next = state;
        next.register = RegisterStatus::WaitDate;
        // The product row is not created yet; the name rides the prompt
        return Decision {
            state: Some(next),
            effect: SideEffect::None,
            reply: ReplyPlan::ExpiryPrompt {
                sequence: Sequence::RegisterExpire,
                product: None,
                name: text.into(),
            },
        };
    }

    Decision::rejected(Notice::Unrecognized)
}

/// Transition for a postback event. The sequence tag must match the step
/// the matching sub-flow is waiting on; everything else is rejected
/// without mutation.
fn decide_postback(
    state: ConversationState,
    payload: &crate::events::PostbackPayload,
    picked_date: Option<&str>,
) -> Result<Decision, DecideError> {
    let legal = match payload.sequence {
        Sequence::RegisterExpire => state.register == RegisterStatus::WaitDate,
        Sequence::ListItemPick => state.list == ListStatus::WaitItem,
        Sequence::ListAction => state.list == ListStatus::WaitSelect,
        Sequence::ListExpire => state.list == ListStatus::WaitDate,
        Sequence::RecipeItemPick => state.recipe == RecipeStatus::WaitItem,
    };
    if !legal {
        return Ok(Decision::rejected(Notice::Unavailable));
    }

    let decision = match (payload.sequence, payload.command) {
        (Sequence::RegisterExpire, Command::Datepicker) => {
            let name = payload
                .product_name
                .as_deref()
                .ok_or(DecideError::MissingField("product_name"))?;
            let wire = picked_date.ok_or(DecideError::MissingField("date"))?;
            let expires_on =
                date::convert_date(wire).ok_or_else(|| DecideError::BadDate(wire.into()))?;
            let mut next = state;
            next.register = RegisterStatus::Init;
            Decision {
                state: Some(next),
                effect: SideEffect::CreateProduct {
                    name: name.into(),
                    expires_on,
                },
                reply: ReplyPlan::Notice(Notice::Registered {
                    name: name.into(),
                    expires_on: wire.into(),
                }),
            }
        }
        (Sequence::RegisterExpire, Command::Cancel) => {
            let mut next = state;
            next.register = RegisterStatus::Init;
            Decision {
                state: Some(next),
                effect: SideEffect::None,
                reply: ReplyPlan::Notice(Notice::Canceled),
            }
        }
        // Any other command on this step still closes the register flow
        (Sequence::RegisterExpire, _) => {
            let mut next = state;
            next.register = RegisterStatus::Init;
            Decision {
                state: Some(next),
                effect: SideEffect::None,
                reply: ReplyPlan::None,
            }
        }

        (Sequence::ListItemPick, Command::Back) => {
            nav_browse(BrowseFlow::List, payload, NavDirection::Back)
        }
        (Sequence::ListItemPick, Command::Next) => {
            nav_browse(BrowseFlow::List, payload, NavDirection::Next)
        }
        (Sequence::ListItemPick, Command::SelectItem) => {
            let product = payload
                .product()
                .ok_or(DecideError::MissingField("product_id"))?;
            let name = payload
                .product_name
                .as_deref()
                .ok_or(DecideError::MissingField("product_name"))?;
            let expires_on = payload
                .expire_date
                .as_deref()
                .and_then(|raw| raw.parse().ok())
                .ok_or(DecideError::MissingField("expire_date"))?;
            let mut next = state;
            next.list = ListStatus::WaitSelect;
            Decision {
                state: Some(next),
                effect: SideEffect::None,
                reply: ReplyPlan::ActionPrompt {
                    product,
                    name: name.into(),
                    expires_on,
                },
            }
        }
        (Sequence::ListItemPick, _) => Decision::inert(),

        (Sequence::ListAction, Command::ChangeDate) => {
            let product = payload
                .product()
                .ok_or(DecideError::MissingField("product_id"))?;
            let name = payload
                .product_name
                .as_deref()
                .ok_or(DecideError::MissingField("product_name"))?;
            let mut next = state;
            next.list = ListStatus::WaitDate;
            Decision {
                state: Some(next),
                effect: SideEffect::None,
                reply: ReplyPlan::ExpiryPrompt {
                    sequence: Sequence::ListExpire,
                    product: Some(product),
                    name: name.into(),
                },
            }
        }
        (Sequence::ListAction, Command::Delete) => {
            let product = payload
                .product()
                .ok_or(DecideError::MissingField("product_id"))?;
            let mut next = state;
            next.list = ListStatus::Init;
            Decision {
                state: Some(next),
                effect: SideEffect::DeleteProduct { product },
                reply: ReplyPlan::Notice(Notice::Deleted),
            }
        }
        (Sequence::ListAction, _) => Decision::inert(),

        (Sequence::ListExpire, Command::Datepicker) => {
            let product = payload
                .product()
                .ok_or(DecideError::MissingField("product_id"))?;
            let name = payload
                .product_name
                .as_deref()
                .ok_or(DecideError::MissingField("product_name"))?;
            let wire = picked_date.ok_or(DecideError::MissingField("date"))?;
            let expires_on =
                date::convert_date(wire).ok_or_else(|| DecideError::BadDate(wire.into()))?;
            let mut next = state;
            next.list = ListStatus::Init;
            Decision {
                state: Some(next),
                effect: SideEffect::UpdateExpiry {
                    product,
                    expires_on,
                },
                reply: ReplyPlan::Notice(Notice::Registered {
                    name: name.into(),
                    expires_on: wire.into(),
                }),
            }
        }
        (Sequence::ListExpire, Command::Cancel) => {
            let mut next = state;
            next.list = ListStatus::Init;
            Decision {
                state: Some(next),
                effect: SideEffect::None,
                reply: ReplyPlan::Notice(Notice::Canceled),
            }
        }
        // Any other command on this step still closes the date-change flow
        (Sequence::ListExpire, _) => {
            let mut next = state;
            next.list = ListStatus::Init;
            Decision {
                state: Some(next),
                effect: SideEffect::None,
                reply: ReplyPlan::None,
            }
        }

        (Sequence::RecipeItemPick, Command::Back) => {
            nav_browse(BrowseFlow::Recipe, payload, NavDirection::Back)
        }
        (Sequence::RecipeItemPick, Command::Next) => {
            nav_browse(BrowseFlow::Recipe, payload, NavDirection::Next)
        }
        (Sequence::RecipeItemPick, Command::SelectItem) => {
            let product = payload
                .product()
                .ok_or(DecideError::MissingField("product_id"))?;
            let selection = toggle(&payload.markers(), product);
            Decision {
                state: None,
                effect: SideEffect::None,
                reply: ReplyPlan::Browse {
                    flow: BrowseFlow::Recipe,
                    cursor: payload.cursor(),
                    direction: NavDirection::Hold,
                    selection,
                },
            }
        }
        (Sequence::RecipeItemPick, Command::Search) => {
            let mut next = state;
            next.recipe = RecipeStatus::Init;
            Decision {
                state: Some(next),
                effect: SideEffect::None,
                reply: ReplyPlan::RecipeSearch {
                    selection: payload.markers(),
                },
            }
        }
        (Sequence::RecipeItemPick, _) => Decision::inert(),
    };

    Ok(decision)
}

fn fresh_browse(flow: BrowseFlow) -> ReplyPlan {
    ReplyPlan::Browse {
        flow,
        cursor: 0,
        direction: NavDirection::None,
        selection: Vec::new(),
    }
}

fn nav_browse(
    flow: BrowseFlow,
    payload: &crate::events::PostbackPayload,
    direction: NavDirection,
) -> Decision {
    Decision {
        state: None,
        effect: SideEffect::None,
        reply: ReplyPlan::Browse {
            flow,
            cursor: payload.cursor(),
            direction,
            selection: payload.markers(),
        },
    }
}
