//! Decision core for a perishable-food chat bot
//!
//! One inbound event at a time: classify it, check it against the user's
//! conversational state, apply the transition, and dispatch persistence
//! and reply reactors in order. The platform transport, the JSON-template
//! renderer, and the real database all live outside this crate behind the
//! [`Repository`] and [`ReplySink`] traits.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! let repo = Arc::new(InMemoryStore::new());
//! let sink = Arc::new(RecordingSink::new());
//! let core = ConversationCore::new(repo, sink, Arc::new(FoldingKeyer));
//!
//! core.handle(InboundEvent {
//!     user_id: UserId::new("u1"),
//!     kind: InboundKind::Subscribe,
//! });
//! ```

// === Core Types ===
mod date;
mod decision;
mod events;
mod ids;
mod model;
mod state;

// === Storage ===
mod store;

// === Matching ===
mod index;
mod pager;
mod phonetics;

// === Dispatch ===
mod core;
mod dispatch;
mod reactors;

// === Outbound ===
mod reply;
mod sweep;

// === Observability ===
mod observer;
mod stats;

// === Re-exports ===

// Types
pub use date::{convert_date, month_day, pack, plus_days, to_wire, today, Ymd};
pub use decision::{Decision, ReplyPlan, SideEffect};
pub use events::{
    ClassifiedEvent, Command, EventKind, InboundEvent, InboundKind, PayloadError,
    PostbackPayload, Sequence,
};
pub use ids::{ProductId, RecipeId, TermKey, UserId};
pub use model::{NewProduct, Product, Recipe, User};
pub use state::{ConversationState, ListStatus, Menu, RecipeStatus, RegisterStatus};

// Storage
pub use store::{InMemoryStore, Repository, StoreError};

// Matching
pub use index::candidate_recipes;
pub use pager::{page, toggle, NavDirection, PageWindow, PAGE_SIZE};
pub use phonetics::{FoldingKeyer, PhoneticKeyer};

// Dispatch
pub use self::core::{ConversationCore, HandleOutcome, MAX_ITEM_CHARS};
pub use dispatch::{Dispatch, EventDispatcher, Reactor, ReactorError};
pub use reactors::{PersistReactor, ReplyReactor};

// Outbound
pub use reply::{
    BrowseFlow, BrowseItem, BrowsePage, Notice, RecipeCard, RecordingSink, ReminderGroup,
    ReplyIntent, ReplySink, SinkError, RESULT_CAP,
};
pub use sweep::{run_sweep, SweepError, SweepSummary, REMINDER_WINDOW_DAYS};

// Observability
pub use observer::{DispatchObserver, NoOpObserver, TracingObserver};
pub use stats::{DispatchStats, DispatchStatsSnapshot};
