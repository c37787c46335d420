//! The decision computed for one legal event
//!
//! `ConversationCore` turns an event into a [`Decision`] before any reactor
//! runs: the full state row to save, at most one product side effect, and a
//! plan for the reply. Reactors only execute it.

use crate::date::Ymd;
use crate::events::Sequence;
use crate::ids::ProductId;
use crate::pager::NavDirection;
use crate::reply::{BrowseFlow, Notice};
use crate::state::ConversationState;

/// Outcome of classification, legality validation and the transition table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    /// New state row to save, `None` when the event mutates no status
    pub state: Option<ConversationState>,
    pub effect: SideEffect,
    pub reply: ReplyPlan,
}

impl Decision {
    /// Decision that changes nothing and says nothing
    pub fn inert() -> Self {
        Self {
            state: None,
            effect: SideEffect::None,
            reply: ReplyPlan::None,
        }
    }

    /// Rejection: no mutation, a specific notice back
    pub fn rejected(notice: Notice) -> Self {
        Self {
            state: None,
            effect: SideEffect::None,
            reply: ReplyPlan::Notice(notice),
        }
    }
}

/// At most one persisted side effect per event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SideEffect {
    None,
    /// Create-or-reactivate the user row and a fresh state row
    Subscribe,
    /// Stamp the removal date, flip the flag, drop the state row
    Unsubscribe,
    CreateProduct {
        name: Box<str>,
        expires_on: Ymd,
    },
    UpdateExpiry {
        product: ProductId,
        expires_on: Ymd,
    },
    DeleteProduct {
        product: ProductId,
    },
}

/// What the reply reactor should build and send.
///
/// Browse pages and recipe results are derived from storage after the
/// persistence reactor has committed, so the plan carries only the inputs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplyPlan {
    /// Say nothing (unsubscribe, or a tolerated odd command)
    None,
    Notice(Notice),
    ExpiryPrompt {
        sequence: Sequence,
        product: Option<ProductId>,
        name: Box<str>,
    },
    ActionPrompt {
        product: ProductId,
        name: Box<str>,
        expires_on: Ymd,
    },
    Browse {
        flow: BrowseFlow,
        cursor: usize,
        direction: NavDirection,
        selection: Vec<ProductId>,
    },
    RecipeSearch {
        selection: Vec<ProductId>,
    },
}
