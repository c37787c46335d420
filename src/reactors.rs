//! The two reactors every dispatch registers, in this order:
//! persistence first, then reply. The reply reactor derives browse pages
//! and recipe results from storage, so it must observe the committed
//! writes of the same dispatch.

use crate::date;
use crate::decision::{ReplyPlan, SideEffect};
use crate::dispatch::{Dispatch, Reactor, ReactorError};
use crate::events::ClassifiedEvent;
use crate::index::candidate_recipes;
use crate::model::{NewProduct, User};
use crate::pager::page;
use crate::phonetics::PhoneticKeyer;
use crate::reply::{
    BrowseFlow, BrowseItem, BrowsePage, Notice, RecipeCard, ReplyIntent, ReplySink, RESULT_CAP,
};
use crate::state::ConversationState;
use crate::store::Repository;
use std::sync::Arc;

/// Writes the decided state row and product side effect
pub struct PersistReactor {
    repo: Arc<dyn Repository>,
    keyer: Arc<dyn PhoneticKeyer>,
}

impl PersistReactor {
    pub fn new(repo: Arc<dyn Repository>, keyer: Arc<dyn PhoneticKeyer>) -> Self {
        Self { repo, keyer }
    }
}

impl Reactor for PersistReactor {
    fn name(&self) -> &'static str {
        "persist"
    }

    fn react(&self, event: &ClassifiedEvent, dispatch: &mut Dispatch) -> Result<(), ReactorError> {
        if dispatch.errored {
            return Ok(());
        }

        match &dispatch.decision.effect {
            SideEffect::None => {}
            SideEffect::Subscribe => {
                let user = match self.repo.get_user(&event.user_id)? {
                    Some(mut existing) => {
                        existing.subscribed = true;
                        existing
                    }
                    None => User {
                        id: event.user_id.clone(),
                        subscribed: true,
                        registered_on: date::today(),
                        removed_on: 0,
                    },
                };
                self.repo.upsert_user(user)?;
                self.repo
                    .save_state(ConversationState::new(event.user_id.clone()))?;
            }
            SideEffect::Unsubscribe => {
                if let Some(mut user) = self.repo.get_user(&event.user_id)? {
                    user.subscribed = false;
                    user.removed_on = date::today();
                    self.repo.upsert_user(user)?;
                }
                self.repo.delete_state(&event.user_id)?;
            }
            SideEffect::CreateProduct { name, expires_on } => {
                self.repo.create_product(NewProduct {
                    name: name.clone(),
                    key: self.keyer.key(name),
                    owner: event.user_id.clone(),
                    registered_on: date::today(),
                    expires_on: *expires_on,
                })?;
            }
            SideEffect::UpdateExpiry {
                product,
                expires_on,
            } => {
                self.repo.update_product_expiry(*product, *expires_on)?;
            }
            SideEffect::DeleteProduct { product } => {
                self.repo.delete_product(*product)?;
            }
        }

        if let Some(state) = &dispatch.decision.state {
            self.repo.save_state(state.clone())?;
        }

        Ok(())
    }
}

/// Renders the reply plan into an intent and sends it
pub struct ReplyReactor {
    repo: Arc<dyn Repository>,
    sink: Arc<dyn ReplySink>,
}

impl ReplyReactor {
    pub fn new(repo: Arc<dyn Repository>, sink: Arc<dyn ReplySink>) -> Self {
        Self { repo, sink }
    }

    fn build_intent(
        &self,
        event: &ClassifiedEvent,
        plan: &ReplyPlan,
    ) -> Result<Option<ReplyIntent>, ReactorError> {
        let intent = match plan {
            ReplyPlan::None => return Ok(None),
            ReplyPlan::Notice(notice) => ReplyIntent::Text(notice.clone()),
            ReplyPlan::ExpiryPrompt {
                sequence,
                product,
                name,
            } => ReplyIntent::ExpiryPrompt {
                sequence: *sequence,
                product: *product,
                name: name.clone(),
            },
            ReplyPlan::ActionPrompt {
                product,
                name,
                expires_on,
            } => ReplyIntent::ActionPrompt {
                product: *product,
                name: name.clone(),
                expires_on: *expires_on,
            },
            ReplyPlan::Browse {
                flow,
                cursor,
                direction,
                selection,
            } => {
                let products = self.repo.products_by_user(&event.user_id)?;
                let window = page(products.len(), *cursor, *direction);
                let items = if window.start == 0 {
                    Vec::new()
                } else {
                    products[window.start - 1..window.end]
                        .iter()
                        .map(|p| BrowseItem {
                            product_id: p.id,
                            name: p.name.clone(),
                            expires_on: p.expires_on,
                            selected: selection.contains(&p.id),
                        })
                        .collect()
                };
                let hits = match flow {
                    BrowseFlow::Recipe => {
                        Some(candidate_recipes(self.repo.as_ref(), selection)?.len())
                    }
                    BrowseFlow::List => None,
                };
                ReplyIntent::Browse(BrowsePage {
                    flow: *flow,
                    items,
                    start: window.start,
                    end: window.end,
                    total: products.len(),
                    cursor: window.cursor,
                    selection: selection.clone(),
                    hits,
                })
            }
            ReplyPlan::RecipeSearch { selection } => {
                let candidates = candidate_recipes(self.repo.as_ref(), selection)?;
                let mut cards = Vec::new();
                for id in candidates {
                    if let Some(recipe) = self.repo.get_recipe(id)? {
                        cards.push(RecipeCard {
                            id: recipe.id,
                            name: recipe.name,
                            link: recipe.link,
                            photo: recipe.photo,
                        });
                    }
                    if cards.len() == RESULT_CAP {
                        break;
                    }
                }
                ReplyIntent::Recipes(cards)
            }
        };

        Ok(Some(intent))
    }
}

impl Reactor for ReplyReactor {
    fn name(&self) -> &'static str {
        "reply"
    }

    fn react(&self, event: &ClassifiedEvent, dispatch: &mut Dispatch) -> Result<(), ReactorError> {
        // Anything that went wrong up to here collapses into one generic
        // error notice; the computed plan is discarded.
        if dispatch.errored {
            self.sink
                .reply(&event.user_id, ReplyIntent::Text(Notice::GenericError))?;
            dispatch.replied = true;
            return Ok(());
        }

        if let Some(intent) = self.build_intent(event, &dispatch.decision.reply)? {
            self.sink.reply(&event.user_id, intent)?;
            dispatch.replied = true;
        }

        Ok(())
    }
}
