//! Per-user conversational state
//!
//! One row per subscribed user, holding three independent sub-flow
//! statuses. In steady state at most one status is active, but that is
//! enforced only by the menu-selection transition, never structurally.

use crate::ids::UserId;
use serde::{Deserialize, Serialize};

/// Register flow status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegisterStatus {
    #[default]
    Init,
    /// Waiting for a free-text item name
    WaitItem,
    /// Waiting for the expiry datepicker
    WaitDate,
}

/// List flow status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListStatus {
    #[default]
    Init,
    /// Waiting for an item pick from the browse page
    WaitItem,
    /// Waiting for the change-date / delete choice
    WaitSelect,
    /// Waiting for the new-expiry datepicker
    WaitDate,
}

/// Recipe flow status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecipeStatus {
    #[default]
    Init,
    /// Waiting for item toggles or the search command
    WaitItem,
}

/// The fixed bot menu. Labels are the literal text of a menu press.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Menu {
    Register,
    List,
    Recipe,
}

impl Menu {
    /// Map a text message to a menu selection, `None` for free text
    pub fn from_label(text: &str) -> Option<Self> {
        match text {
            "register" => Some(Self::Register),
            "list" => Some(Self::List),
            "recipe" => Some(Self::Recipe),
            _ => None,
        }
    }

    /// The literal menu label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::List => "list",
            Self::Recipe => "recipe",
        }
    }
}

/// Conversational state row, keyed by the user identity.
/// Created on subscribe, deleted on unsubscribe, otherwise mutated in place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub user_id: UserId,
    pub register: RegisterStatus,
    pub list: ListStatus,
    pub recipe: RecipeStatus,
    // Reserved slot carried by the row format; nothing reads it yet
    #[serde(default)]
    reserved: u8,
}

impl ConversationState {
    /// Fresh state with every flow at INIT
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            register: RegisterStatus::Init,
            list: ListStatus::Init,
            recipe: RecipeStatus::Init,
            reserved: 0,
        }
    }

    /// Apply a menu selection: reset all three flows to INIT, then move
    /// exactly one to its initial waiting status. This is the only
    /// transition that touches more than one flow per event.
    pub fn select_menu(&mut self, menu: Menu) {
        self.register = RegisterStatus::Init;
        self.list = ListStatus::Init;
        self.recipe = RecipeStatus::Init;

        match menu {
            Menu::Register => self.register = RegisterStatus::WaitItem,
            Menu::List => self.list = ListStatus::WaitItem,
            Menu::Recipe => self.recipe = RecipeStatus::WaitItem,
        }
    }

    /// True when every flow is at INIT
    pub fn is_idle(&self) -> bool {
        self.register == RegisterStatus::Init
            && self.list == ListStatus::Init
            && self.recipe == RecipeStatus::Init
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ConversationState {
        ConversationState::new(UserId::new("u1"))
    }

    #[test]
    fn test_new_state_is_idle() {
        assert!(state().is_idle());
    }

    #[test]
    fn test_menu_resets_other_flows() {
        let mut s = state();
        s.register = RegisterStatus::WaitDate;

        s.select_menu(Menu::List);
        assert_eq!(s.register, RegisterStatus::Init);
        assert_eq!(s.list, ListStatus::WaitItem);
        assert_eq!(s.recipe, RecipeStatus::Init);
    }

    #[test]
    fn test_menu_selection_is_idempotent() {
        let mut s = state();
        s.select_menu(Menu::List);
        s.select_menu(Menu::List);
        assert_eq!(s.register, RegisterStatus::Init);
        assert_eq!(s.list, ListStatus::WaitItem);
        assert_eq!(s.recipe, RecipeStatus::Init);
    }

    #[test]
    fn test_menu_labels() {
        assert_eq!(Menu::from_label("register"), Some(Menu::Register));
        assert_eq!(Menu::from_label("list"), Some(Menu::List));
        assert_eq!(Menu::from_label("recipe"), Some(Menu::Recipe));
        assert_eq!(Menu::from_label("Register"), None);
        assert_eq!(Menu::from_label("milk"), None);
    }
}
