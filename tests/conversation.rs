//! End-to-end flows through `ConversationCore` with the in-memory store
//! and a recording sink.

use pantrybot::{
    BrowseFlow, ConversationCore, FoldingKeyer, InMemoryStore, InboundEvent, InboundKind,
    ListStatus, Notice, Recipe, RecipeId, RecipeStatus, RegisterStatus, RecordingSink,
    ReplyIntent, Repository, Sequence, TermKey, UserId,
};
use std::sync::Arc;

struct Fixture {
    store: Arc<InMemoryStore>,
    sink: Arc<RecordingSink>,
    core: ConversationCore,
}

impl Fixture {
    fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let sink = Arc::new(RecordingSink::new());
        let core = ConversationCore::new(store.clone(), sink.clone(), Arc::new(FoldingKeyer));
        Self { store, sink, core }
    }

    fn subscribe(&self, user: &str) {
        let outcome = self.core.handle(InboundEvent {
            user_id: UserId::new(user),
            kind: InboundKind::Subscribe,
        });
        assert!(!outcome.errored);
        self.sink.take_replies();
    }

    fn text(&self, user: &str, text: &str) {
        let outcome = self.core.handle(InboundEvent {
            user_id: UserId::new(user),
            kind: InboundKind::Text { text: text.into() },
        });
        assert!(!outcome.errored);
    }

    fn postback(&self, user: &str, data: &str, picked_date: Option<&str>) {
        let outcome = self.core.handle(InboundEvent {
            user_id: UserId::new(user),
            kind: InboundKind::Postback {
                data: data.into(),
                picked_date: picked_date.map(Into::into),
            },
        });
        assert!(!outcome.errored);
    }

    fn last_intent(&self) -> ReplyIntent {
        let (_, intent) = self.sink.last_reply().expect("a reply should have gone out");
        self.sink.take_replies();
        intent
    }

    fn register(&self, user: &str, name: &str, date: &str) {
        self.text(user, "register");
        self.text(user, name);
        self.postback(
            user,
            &format!(
                r#"{{"sequence":"register-expire","command":"datepicker","product_name":"{name}"}}"#
            ),
            Some(date),
        );
        self.sink.take_replies();
    }
}

#[test]
fn test_subscribe_creates_user_and_idle_state() {
    let fx = Fixture::new();
    let outcome = fx.core.handle(InboundEvent {
        user_id: UserId::new("u1"),
        kind: InboundKind::Subscribe,
    });

    assert!(!outcome.errored);
    assert!(outcome.replied);

    let user = fx.store.get_user(&UserId::new("u1")).unwrap().unwrap();
    assert!(user.subscribed);
    assert_eq!(user.removed_on, 0);

    let state = fx.store.get_state(&UserId::new("u1")).unwrap().unwrap();
    assert!(state.is_idle());

    assert_eq!(fx.last_intent(), ReplyIntent::Text(Notice::Welcome));
}

#[test]
fn test_resubscribe_keeps_the_original_row() {
    let fx = Fixture::new();
    fx.subscribe("u1");
    let original = fx.store.get_user(&UserId::new("u1")).unwrap().unwrap();

    fx.core.handle(InboundEvent {
        user_id: UserId::new("u1"),
        kind: InboundKind::Unsubscribe,
    });
    fx.subscribe("u1");

    let user = fx.store.get_user(&UserId::new("u1")).unwrap().unwrap();
    assert!(user.subscribed);
    assert_eq!(user.registered_on, original.registered_on);
}

#[test]
fn test_unsubscribe_drops_state_and_says_nothing() {
    let fx = Fixture::new();
    fx.subscribe("u1");

    let outcome = fx.core.handle(InboundEvent {
        user_id: UserId::new("u1"),
        kind: InboundKind::Unsubscribe,
    });

    assert!(!outcome.errored);
    assert!(!outcome.replied);
    assert!(fx.store.get_state(&UserId::new("u1")).unwrap().is_none());
    let user = fx.store.get_user(&UserId::new("u1")).unwrap().unwrap();
    assert!(!user.subscribed);
    assert_ne!(user.removed_on, 0);
}

#[test]
fn test_register_flow_end_to_end() {
    let fx = Fixture::new();
    fx.subscribe("u1");

    fx.text("u1", "register");
    assert_eq!(fx.last_intent(), ReplyIntent::Text(Notice::AskItemName));
    let state = fx.store.get_state(&UserId::new("u1")).unwrap().unwrap();
    assert_eq!(state.register, RegisterStatus::WaitItem);

    fx.text("u1", "Milk");
    assert_eq!(
        fx.last_intent(),
        ReplyIntent::ExpiryPrompt {
            sequence: Sequence::RegisterExpire,
            product: None,
            name: "Milk".into(),
        }
    );
    let state = fx.store.get_state(&UserId::new("u1")).unwrap().unwrap();
    assert_eq!(state.register, RegisterStatus::WaitDate);

    fx.postback(
        "u1",
        r#"{"sequence":"register-expire","command":"datepicker","product_name":"Milk"}"#,
        Some("2024-05-01"),
    );
    assert_eq!(
        fx.last_intent(),
        ReplyIntent::Text(Notice::Registered {
            name: "Milk".into(),
            expires_on: "2024-05-01".into(),
        })
    );
    let state = fx.store.get_state(&UserId::new("u1")).unwrap().unwrap();
    assert!(state.is_idle());

    let products = fx.store.products_by_user(&UserId::new("u1")).unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].name.as_ref(), "Milk");
    // The phonetic key is the folded form of the name
    assert_eq!(products[0].key, TermKey::new("milk"));
    assert_eq!(products[0].expires_on, 20240501);
}

#[test]
fn test_register_cancel_resets_without_product() {
    let fx = Fixture::new();
    fx.subscribe("u1");
    fx.text("u1", "register");
    fx.text("u1", "milk");
    fx.sink.take_replies();

    fx.postback(
        "u1",
        r#"{"sequence":"register-expire","command":"cancel"}"#,
        None,
    );

    assert_eq!(fx.last_intent(), ReplyIntent::Text(Notice::Canceled));
    let state = fx.store.get_state(&UserId::new("u1")).unwrap().unwrap();
    assert!(state.is_idle());
    assert!(fx.store.products_by_user(&UserId::new("u1")).unwrap().is_empty());
}

#[test]
fn test_out_of_turn_postback_is_rejected_without_mutation() {
    let fx = Fixture::new();
    fx.subscribe("u1");

    fx.postback(
        "u1",
        r#"{"sequence":"register-expire","command":"datepicker","product_name":"milk"}"#,
        Some("2024-05-01"),
    );

    assert_eq!(fx.last_intent(), ReplyIntent::Text(Notice::Unavailable));
    assert!(fx.store.products_by_user(&UserId::new("u1")).unwrap().is_empty());
    let state = fx.store.get_state(&UserId::new("u1")).unwrap().unwrap();
    assert!(state.is_idle());
    assert_eq!(fx.core.stats().illegal_events, 1);
}

#[test]
fn test_free_text_while_idle_is_unrecognized() {
    let fx = Fixture::new();
    fx.subscribe("u1");

    fx.text("u1", "milk");

    assert_eq!(fx.last_intent(), ReplyIntent::Text(Notice::Unrecognized));
}

#[test]
fn test_list_browse_pages_and_reorders_by_expiry() {
    let fx = Fixture::new();
    fx.subscribe("u1");
    for (name, date) in [
        ("cheese", "2024-05-20"),
        ("milk", "2024-05-05"),
        ("eggs", "2024-05-07"),
        ("butter", "2024-05-09"),
        ("yogurt", "2024-05-11"),
        ("ham", "2024-05-13"),
        ("tofu", "2024-05-15"),
    ] {
        fx.register("u1", name, date);
    }

    fx.text("u1", "list");
    let intent = fx.last_intent();
    let page = match intent {
        ReplyIntent::Browse(page) => page,
        other => panic!("expected a browse page, got {other:?}"),
    };
    assert_eq!(page.flow, BrowseFlow::List);
    assert_eq!((page.start, page.end, page.total, page.cursor), (1, 5, 7, 0));
    assert_eq!(page.hits, None);
    let names: Vec<&str> = page.items.iter().map(|i| i.name.as_ref()).collect();
    assert_eq!(names, vec!["milk", "eggs", "butter", "yogurt", "ham"]);

    fx.postback(
        "u1",
        r#"{"sequence":"list-item-pick","command":"next","display_position":"0"}"#,
        None,
    );
    let page = match fx.last_intent() {
        ReplyIntent::Browse(page) => page,
        other => panic!("expected a browse page, got {other:?}"),
    };
    assert_eq!((page.start, page.end, page.cursor), (6, 7, 1));
    let names: Vec<&str> = page.items.iter().map(|i| i.name.as_ref()).collect();
    assert_eq!(names, vec!["tofu", "cheese"]);
}

#[test]
fn test_list_change_date_updates_product() {
    let fx = Fixture::new();
    fx.subscribe("u1");
    fx.register("u1", "milk", "2024-05-05");
    let product = &fx.store.products_by_user(&UserId::new("u1")).unwrap()[0];
    let id = product.id;

    fx.text("u1", "list");
    fx.sink.take_replies();
    fx.postback(
        "u1",
        &format!(
            r#"{{"sequence":"list-item-pick","command":"select-item",
                "product_id":"{id}","product_name":"milk","expire_date":"20240505"}}"#
        ),
        None,
    );
    assert_eq!(
        fx.last_intent(),
        ReplyIntent::ActionPrompt {
            product: id,
            name: "milk".into(),
            expires_on: 20240505,
        }
    );
    let state = fx.store.get_state(&UserId::new("u1")).unwrap().unwrap();
    assert_eq!(state.list, ListStatus::WaitSelect);

    fx.postback(
        "u1",
        &format!(
            r#"{{"sequence":"list-action","command":"change-date","product_id":"{id}","product_name":"milk"}}"#
        ),
        None,
    );
    assert_eq!(
        fx.last_intent(),
        ReplyIntent::ExpiryPrompt {
            sequence: Sequence::ListExpire,
            product: Some(id),
            name: "milk".into(),
        }
    );

    fx.postback(
        "u1",
        &format!(
            r#"{{"sequence":"list-expire","command":"datepicker","product_id":"{id}","product_name":"milk"}}"#
        ),
        Some("2024-06-01"),
    );
    assert_eq!(
        fx.last_intent(),
        ReplyIntent::Text(Notice::Registered {
            name: "milk".into(),
            expires_on: "2024-06-01".into(),
        })
    );
    let product = fx.store.get_product(id).unwrap().unwrap();
    assert_eq!(product.expires_on, 20240601);
    let state = fx.store.get_state(&UserId::new("u1")).unwrap().unwrap();
    assert!(state.is_idle());
}

#[test]
fn test_list_delete_removes_product() {
    let fx = Fixture::new();
    fx.subscribe("u1");
    fx.register("u1", "milk", "2024-05-05");
    let id = fx.store.products_by_user(&UserId::new("u1")).unwrap()[0].id;

    fx.text("u1", "list");
    fx.postback(
        "u1",
        &format!(
            r#"{{"sequence":"list-item-pick","command":"select-item",
                "product_id":"{id}","product_name":"milk","expire_date":"20240505"}}"#
        ),
        None,
    );
    fx.sink.take_replies();

    fx.postback(
        "u1",
        &format!(r#"{{"sequence":"list-action","command":"delete","product_id":"{id}"}}"#),
        None,
    );

    assert_eq!(fx.last_intent(), ReplyIntent::Text(Notice::Deleted));
    assert!(fx.store.products_by_user(&UserId::new("u1")).unwrap().is_empty());
}

#[test]
fn test_recipe_toggle_and_search() {
    let fx = Fixture::new();
    fx.subscribe("u1");
    fx.register("u1", "milk", "2024-05-05");
    fx.register("u1", "egg", "2024-05-07");
    let products = fx.store.products_by_user(&UserId::new("u1")).unwrap();
    let (milk, egg) = (products[0].id, products[1].id);

    for recipe in 1..=3u64 {
        fx.store.insert_recipe(Recipe {
            id: RecipeId::new(recipe),
            name: format!("recipe {recipe}").into(),
            link: "https://cook.example/".into(),
            photo: "https://cook.example/p.jpg".into(),
            ingredients: "milk, egg".into(),
            category: "breakfast".into(),
            collected_on: 20240101,
        });
    }
    // milk appears in recipes 1 and 2, egg in 2 and 3
    fx.store
        .append_term_entry(&TermKey::new("milk"), RecipeId::new(1))
        .unwrap();
    fx.store
        .append_term_entry(&TermKey::new("milk"), RecipeId::new(2))
        .unwrap();
    fx.store
        .append_term_entry(&TermKey::new("egg"), RecipeId::new(2))
        .unwrap();
    fx.store
        .append_term_entry(&TermKey::new("egg"), RecipeId::new(3))
        .unwrap();

    fx.text("u1", "recipe");
    let page = match fx.last_intent() {
        ReplyIntent::Browse(page) => page,
        other => panic!("expected a browse page, got {other:?}"),
    };
    assert_eq!(page.flow, BrowseFlow::Recipe);
    assert_eq!(page.hits, Some(0));
    assert!(page.items.iter().all(|i| !i.selected));

    fx.postback(
        "u1",
        &format!(
            r#"{{"sequence":"recipe-item-pick","command":"select-item",
                "product_id":"{milk}","display_position":"0"}}"#
        ),
        None,
    );
    let page = match fx.last_intent() {
        ReplyIntent::Browse(page) => page,
        other => panic!("expected a browse page, got {other:?}"),
    };
    assert_eq!(page.selection, vec![milk]);
    assert_eq!(page.hits, Some(2));
    assert!(page.items.iter().any(|i| i.product_id == milk && i.selected));
    // A toggle does not close the flow
    let state = fx.store.get_state(&UserId::new("u1")).unwrap().unwrap();
    assert_eq!(state.recipe, RecipeStatus::WaitItem);

    fx.postback(
        "u1",
        &format!(
            r#"{{"sequence":"recipe-item-pick","command":"search",
                "marker_array":["{milk}","{egg}"]}}"#
        ),
        None,
    );
    let cards = match fx.last_intent() {
        ReplyIntent::Recipes(cards) => cards,
        other => panic!("expected recipe cards, got {other:?}"),
    };
    // Only recipe 2 contains both selected ingredients
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].id, RecipeId::new(2));
    let state = fx.store.get_state(&UserId::new("u1")).unwrap().unwrap();
    assert!(state.is_idle());
}

#[test]
fn test_recipe_toggle_survives_a_deselect() {
    let fx = Fixture::new();
    fx.subscribe("u1");
    fx.register("u1", "milk", "2024-05-05");
    let milk = fx.store.products_by_user(&UserId::new("u1")).unwrap()[0].id;

    fx.text("u1", "recipe");
    fx.postback(
        "u1",
        &format!(
            r#"{{"sequence":"recipe-item-pick","command":"select-item",
                "product_id":"{milk}","display_position":"0","marker_array":["{milk}"]}}"#
        ),
        None,
    );
    let page = match fx.last_intent() {
        ReplyIntent::Browse(page) => page,
        other => panic!("expected a browse page, got {other:?}"),
    };
    assert!(page.selection.is_empty());
    assert_eq!(page.hits, Some(0));
}

#[test]
fn test_forged_cursor_is_clamped_to_the_last_page() {
    let fx = Fixture::new();
    fx.subscribe("u1");
    fx.register("u1", "milk", "2024-05-05");

    fx.text("u1", "list");
    fx.sink.take_replies();
    fx.postback(
        "u1",
        r#"{"sequence":"list-item-pick","command":"next","display_position":"99"}"#,
        None,
    );

    let page = match fx.last_intent() {
        ReplyIntent::Browse(page) => page,
        other => panic!("expected a browse page, got {other:?}"),
    };
    assert_eq!((page.start, page.end, page.cursor), (1, 1, 0));
}

#[test]
fn test_malformed_payload_yields_generic_error() {
    let fx = Fixture::new();
    fx.subscribe("u1");

    let outcome = fx.core.handle(InboundEvent {
        user_id: UserId::new("u1"),
        kind: InboundKind::Postback {
            data: "not json at all".into(),
            picked_date: None,
        },
    });

    assert!(outcome.errored);
    assert!(outcome.replied);
    assert_eq!(fx.last_intent(), ReplyIntent::Text(Notice::GenericError));
    let state = fx.store.get_state(&UserId::new("u1")).unwrap().unwrap();
    assert!(state.is_idle());
}

#[test]
fn test_event_for_unknown_user_yields_generic_error() {
    let fx = Fixture::new();

    let outcome = fx.core.handle(InboundEvent {
        user_id: UserId::new("ghost"),
        kind: InboundKind::Text {
            text: "list".into(),
        },
    });

    assert!(outcome.errored);
    assert_eq!(fx.last_intent(), ReplyIntent::Text(Notice::GenericError));
}

#[test]
fn test_stats_track_the_session() {
    let fx = Fixture::new();
    fx.subscribe("u1");
    fx.text("u1", "gibberish free text");
    fx.core.handle(InboundEvent {
        user_id: UserId::new("u1"),
        kind: InboundKind::Postback {
            data: "{broken".into(),
            picked_date: None,
        },
    });

    let stats = fx.core.stats();
    assert_eq!(stats.events_received, 3);
    assert_eq!(stats.malformed_payloads, 1);
    assert_eq!(stats.illegal_events, 1);
    assert_eq!(stats.replies_sent, 3);
    assert_eq!(stats.reactor_failures, 0);
}
