//! Reply intents and the outbound delivery seam
//!
//! An intent is a tagged description of what to say; the JSON-template
//! renderer and the platform client that consume it live outside this
//! crate. No presentation detail leaks in here.

use crate::date::Ymd;
use crate::events::Sequence;
use crate::ids::{ProductId, RecipeId, UserId};
use serde::{Deserialize, Serialize};

/// Display cap on recipe results; the index itself returns the full
/// intersection
pub const RESULT_CAP: usize = 10;

/// Which flow a browse page belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrowseFlow {
    List,
    Recipe,
}

/// One row of a browse page
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseItem {
    pub product_id: ProductId,
    pub name: Box<str>,
    pub expires_on: Ymd,
    /// Whether the item is currently toggled into the recipe selection
    pub selected: bool,
}

/// Windowed view over the user's products
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowsePage {
    pub flow: BrowseFlow,
    pub items: Vec<BrowseItem>,
    pub start: usize,
    pub end: usize,
    pub total: usize,
    /// Page index to round-trip in the buttons of this page
    pub cursor: usize,
    pub selection: Vec<ProductId>,
    /// Current candidate-set size, recipe flow only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hits: Option<usize>,
}

/// One recipe result
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeCard {
    pub id: RecipeId,
    pub name: Box<str>,
    pub link: Box<str>,
    pub photo: Box<str>,
}

/// Products grouped under one expiry date in a reminder push
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderGroup {
    pub expires_on: Ymd,
    pub names: Vec<Box<str>>,
}

/// Plain-text notices
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    /// First subscribe: explain the menu
    Welcome,
    /// Register flow: ask for the item name
    AskItemName,
    /// Registration or date change confirmed
    Registered {
        name: Box<str>,
        /// `yyyy-mm-dd`, as picked
        expires_on: Box<str>,
    },
    Canceled,
    Deleted,
    /// Free text the core cannot place
    Unrecognized,
    /// Button pressed out of turn
    Unavailable,
    GenericError,
    /// Daily push: products expiring soon, grouped by date
    ExpiryReminder { groups: Vec<ReminderGroup> },
}

/// What to say back, fully described by data
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyIntent {
    Text(Notice),
    /// Datepicker prompt. `product` is absent in the register flow, where
    /// the product row does not exist yet; `sequence` tells the renderer
    /// which step to stamp into the button payload.
    ExpiryPrompt {
        sequence: Sequence,
        product: Option<ProductId>,
        name: Box<str>,
    },
    /// Change-date / delete choice for one picked product
    ActionPrompt {
        product: ProductId,
        name: Box<str>,
        expires_on: Ymd,
    },
    Browse(BrowsePage),
    /// Recipe results, capped at [`RESULT_CAP`]
    Recipes(Vec<RecipeCard>),
}

impl ReplyIntent {
    /// Short tag for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::ExpiryPrompt { .. } => "expiry_prompt",
            Self::ActionPrompt { .. } => "action_prompt",
            Self::Browse(_) => "browse",
            Self::Recipes(_) => "recipes",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("delivery error: {0}")]
    Delivery(Box<str>),
}

/// Outbound platform client seam. `reply` answers the event being
/// dispatched; `push` is unsolicited (the sweep reminders).
pub trait ReplySink: Send + Sync + 'static {
    fn reply(&self, user: &UserId, intent: ReplyIntent) -> Result<(), SinkError>;
    fn push(&self, user: &UserId, intent: ReplyIntent) -> Result<(), SinkError>;
}

/// Records outbound intents for assertions in tests
pub struct RecordingSink {
    replies: std::sync::Mutex<Vec<(UserId, ReplyIntent)>>,
    pushes: std::sync::Mutex<Vec<(UserId, ReplyIntent)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            replies: std::sync::Mutex::new(Vec::new()),
            pushes: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Drain every recorded reply
    pub fn take_replies(&self) -> Vec<(UserId, ReplyIntent)> {
        self.replies
            .lock()
            .map(|mut sent| std::mem::take(&mut *sent))
            .unwrap_or_default()
    }

    /// Drain every recorded push
    pub fn take_pushes(&self) -> Vec<(UserId, ReplyIntent)> {
        self.pushes
            .lock()
            .map(|mut sent| std::mem::take(&mut *sent))
            .unwrap_or_default()
    }

    /// The last reply, when exactly the caller expects one
    pub fn last_reply(&self) -> Option<(UserId, ReplyIntent)> {
        self.replies
            .lock()
            .ok()
            .and_then(|sent| sent.last().cloned())
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplySink for RecordingSink {
    fn reply(&self, user: &UserId, intent: ReplyIntent) -> Result<(), SinkError> {
        let mut replies = self
            .replies
            .lock()
            .map_err(|e| SinkError::Delivery(e.to_string().into()))?;
        replies.push((user.clone(), intent));
        Ok(())
    }

    fn push(&self, user: &UserId, intent: ReplyIntent) -> Result<(), SinkError> {
        let mut pushes = self
            .pushes
            .lock()
            .map_err(|e| SinkError::Delivery(e.to_string().into()))?;
        pushes.push((user.clone(), intent));
        Ok(())
    }
}
