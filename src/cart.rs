use std::ops::RangeInclusive;

use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use crate::catalog::EntityId;

/// Draws per cart slot before a duplicate product is accepted.
pub const MAX_PICK_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: EntityId,
    pub quantity: u32,
}

/// Builds a random cart of up to `count` items from `catalog`.
///
/// Each slot draws up to [`MAX_PICK_ATTEMPTS`] times looking for a product
/// not yet in the cart and keeps the last draw even if it is a duplicate, so
/// uniqueness is best effort. The cart is shorter than `count` only when the
/// catalog itself is.
pub fn build_cart<R: Rng>(
    catalog: &[EntityId],
    count: usize,
    quantity: RangeInclusive<u32>,
    rng: &mut R,
) -> Vec<CartItem> {
    let slots = count.min(catalog.len());
    let mut items: Vec<CartItem> = Vec::with_capacity(slots);

    for _ in 0..slots {
        let mut attempts = 0;
        let picked = loop {
            // non-empty: slots > 0 implies catalog is non-empty
            let Some(candidate) = catalog.choose(rng) else {
                return items;
            };
            attempts += 1;
            let taken = items.iter().any(|item| &item.product_id == candidate);
            if !taken || attempts >= MAX_PICK_ATTEMPTS {
                break candidate;
            }
        };
        items.push(CartItem {
            product_id: picked.clone(),
            quantity: rng.gen_range(quantity.clone()),
        });
    }

    items
}
