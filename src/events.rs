//! Inbound events and their classification
//!
//! The transport hands the core a normalized [`InboundEvent`]. The core
//! turns it into an immutable [`ClassifiedEvent`] before dispatch; all
//! per-event mutation lives in the dispatch accumulator, never here.

use crate::ids::{ProductId, UserId};
use crate::state::Menu;
use serde::{Deserialize, Serialize};

/// Which flow+step issued a postback button
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Sequence {
    RegisterExpire,
    ListItemPick,
    ListAction,
    ListExpire,
    RecipeItemPick,
}

/// What the user chose within a postback
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Command {
    Datepicker,
    Cancel,
    ChangeDate,
    Delete,
    Search,
    SelectItem,
    Back,
    Next,
}

/// Failed to make sense of a postback payload. Fatal for that event only.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("malformed postback payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Postback payload round-tripped through the client.
///
/// Everything here is untrusted input: the browse cursor and selection are
/// re-checked against the authoritative product list on every turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostbackPayload {
    pub sequence: Sequence,
    pub command: Command,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<Box<str>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<Box<str>>,
    /// Current expiry in packed `yyyymmdd` string form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_date: Option<Box<str>>,
    /// Zero-based page index, as a string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_position: Option<Box<str>>,
    /// Ordered set of product IDs toggled during a recipe search
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marker_array: Vec<Box<str>>,
}

impl PostbackPayload {
    /// Parse the raw payload JSON
    pub fn parse(raw: &str) -> Result<Self, PayloadError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Requested page index; a forged or missing value reads as page zero
    pub fn cursor(&self) -> usize {
        self.display_position
            .as_deref()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0)
    }

    /// Selected product IDs, dropping entries that are not IDs at all
    pub fn markers(&self) -> Vec<ProductId> {
        self.marker_array
            .iter()
            .filter_map(|raw| ProductId::parse(raw))
            .collect()
    }

    /// The product this button refers to, when present and well-formed
    pub fn product(&self) -> Option<ProductId> {
        self.product_id.as_deref().and_then(ProductId::parse)
    }
}

/// Inbound event as normalized by the transport
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundEvent {
    pub user_id: UserId,
    pub kind: InboundKind,
}

/// Raw event kinds the transport delivers
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundKind {
    Subscribe,
    Unsubscribe,
    Text {
        text: Box<str>,
    },
    Postback {
        /// Raw payload JSON from the pressed button
        data: Box<str>,
        /// Date picked in a datepicker press, `yyyy-mm-dd`
        picked_date: Option<Box<str>>,
    },
}

/// Immutable classification of one inbound event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifiedEvent {
    pub user_id: UserId,
    pub kind: EventKind,
}

/// Classified event kinds
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    Subscribe,
    Unsubscribe,
    Text {
        text: Box<str>,
        /// Set when the text is a recognized menu label
        menu: Option<Menu>,
    },
    Postback {
        payload: PostbackPayload,
        picked_date: Option<Box<str>>,
    },
    /// Postback whose payload did not parse
    Malformed,
}

impl ClassifiedEvent {
    /// Classify a normalized inbound event
    pub fn classify(event: InboundEvent) -> Result<Self, PayloadError> {
        let kind = match event.kind {
            InboundKind::Subscribe => EventKind::Subscribe,
            InboundKind::Unsubscribe => EventKind::Unsubscribe,
            InboundKind::Text { text } => {
                let menu = Menu::from_label(&text);
                EventKind::Text { text, menu }
            }
            InboundKind::Postback { data, picked_date } => EventKind::Postback {
                payload: PostbackPayload::parse(&data)?,
                picked_date,
            },
        };

        Ok(Self {
            user_id: event.user_id,
            kind,
        })
    }

    /// Short tag for diagnostics
    pub fn event_type(&self) -> &'static str {
        match &self.kind {
            EventKind::Subscribe => "subscribe",
            EventKind::Unsubscribe => "unsubscribe",
            EventKind::Text { .. } => "text",
            EventKind::Postback { .. } => "postback",
            EventKind::Malformed => "malformed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_parses_wire_names() {
        let payload = PostbackPayload::parse(
            r#"{"sequence":"list-item-pick","command":"select-item",
                "product_id":"7","product_name":"milk","expire_date":"20240501",
                "display_position":"1","marker_array":["3","7"]}"#,
        )
        .unwrap();

        assert_eq!(payload.sequence, Sequence::ListItemPick);
        assert_eq!(payload.command, Command::SelectItem);
        assert_eq!(payload.product(), Some(ProductId::new(7)));
        assert_eq!(payload.cursor(), 1);
        assert_eq!(
            payload.markers(),
            vec![ProductId::new(3), ProductId::new(7)]
        );
    }

    #[test]
    fn test_payload_optional_fields_default() {
        let payload = PostbackPayload::parse(
            r#"{"sequence":"register-expire","command":"datepicker"}"#,
        )
        .unwrap();

        assert_eq!(payload.product(), None);
        assert_eq!(payload.cursor(), 0);
        assert!(payload.markers().is_empty());
    }

    #[test]
    fn test_payload_rejects_unknown_tags() {
        assert!(PostbackPayload::parse(r#"{"sequence":"register-expire","command":"frobnicate"}"#).is_err());
        assert!(PostbackPayload::parse(r#"{"sequence":"bogus","command":"back"}"#).is_err());
        assert!(PostbackPayload::parse("not json").is_err());
    }

    #[test]
    fn test_forged_cursor_and_markers_degrade() {
        let payload = PostbackPayload::parse(
            r#"{"sequence":"recipe-item-pick","command":"next",
                "display_position":"-3","marker_array":["9","drop table","12"]}"#,
        )
        .unwrap();

        assert_eq!(payload.cursor(), 0);
        assert_eq!(
            payload.markers(),
            vec![ProductId::new(9), ProductId::new(12)]
        );
    }

    #[test]
    fn test_classification_tags_menu_text() {
        let event = InboundEvent {
            user_id: UserId::new("u1"),
            kind: InboundKind::Text {
                text: "list".into(),
            },
        };
        let classified = ClassifiedEvent::classify(event).unwrap();
        assert!(matches!(
            classified.kind,
            EventKind::Text {
                menu: Some(Menu::List),
                ..
            }
        ));
        assert_eq!(classified.event_type(), "text");
    }
}
