//! Recipe discovery over the inverted term index
//!
//! Each selected product resolves through its canonical key to the set of
//! recipe IDs containing that term; the candidate set is the intersection
//! across every selected product. The first product seeds the running set,
//! so zero products yield the empty set by convention of "no seed".

use crate::ids::{ProductId, RecipeId};
use crate::store::{Repository, StoreError};
use std::collections::BTreeSet;

/// Intersect the term sets of the selected products.
///
/// Returns the full intersection; the 10-entry display cap is renderer
/// policy, not an index property.
pub fn candidate_recipes(
    repo: &dyn Repository,
    products: &[ProductId],
) -> Result<BTreeSet<RecipeId>, StoreError> {
    let mut candidates = BTreeSet::new();

    for (position, product) in products.iter().enumerate() {
        let terms = term_set(repo, *product)?;
        if position == 0 {
            candidates = terms;
        } else {
            candidates = candidates.intersection(&terms).copied().collect();
        }
    }

    Ok(candidates)
}

/// Term set of one product: absent product or unindexed key means empty
fn term_set(repo: &dyn Repository, id: ProductId) -> Result<BTreeSet<RecipeId>, StoreError> {
    let Some(product) = repo.get_product(id)? else {
        return Ok(BTreeSet::new());
    };
    let Some(entry) = repo.get_term_entry(&product.key)? else {
        return Ok(BTreeSet::new());
    };

    Ok(entry.split(',').filter_map(RecipeId::parse).collect())
}
