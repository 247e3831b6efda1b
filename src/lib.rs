/**
 * AlsReco
 * Copyright (C) 2018 Sebastian Schelter
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

use tracing::info;

pub mod als;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod io;
pub mod recommend;
pub mod topk;
pub mod types;

pub use als::fit;
pub use config::ModelConfig;
pub use dictionary::Dictionary;
pub use error::{RecoError, Result};
pub use recommend::{Recommender, DEFAULT_SIMILAR_USERS};
pub use types::{ConfidenceMatrix, Factors, Identifier, Interaction};

use types::SparseCountMatrix;

/// The confidence matrix together with the dictionaries that map its rows to users and its
/// columns to items.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub matrix: ConfidenceMatrix,
    pub users: Dictionary,
    pub items: Dictionary,
}

impl Dataset {

    /// Stored confidence of a (user, item) pair, `None` if the pair was never observed.
    pub fn confidence(&self, user: &Identifier, item: &Identifier) -> Result<Option<f32>> {
        let user_index = self.users.index_of(user)?;
        let item_index = self.items.index_of(item)?;
        Ok(self.matrix.get(user_index, item_index))
    }
}

/// Aggregates the quantities of repeated (user, item) pairs and turns the sums into confidences
/// `1 + alpha * count`. Users and items are numbered in the order in which they first appear,
/// so identical input always yields identical indices.
pub fn build<I>(interactions: I, alpha: f64) -> Result<Dataset>
    where I: IntoIterator<Item=Interaction> {

    config::validate_alpha(alpha)?;

    let mut users = Dictionary::new("user");
    let mut items = Dictionary::new("item");
    let mut counts: SparseCountMatrix = Vec::new();

    let mut num_interactions: u64 = 0;

    for interaction in interactions {

        if interaction.quantity < 0 {
            return Err(invalid(&interaction, "negative quantity"));
        }

        let user_index = users.index_or_insert(&interaction.user) as usize;
        let item_index = items.index_or_insert(&interaction.item);

        if user_index == counts.len() {
            counts.push(Default::default());
        }

        let count = counts[user_index].entry(item_index).or_insert(0);
        *count = count.checked_add(interaction.quantity)
            .ok_or_else(|| invalid(&interaction, "aggregated quantity overflows"))?;

        num_interactions += 1;
    }

    let matrix = ConfidenceMatrix::from_counts(&counts, items.len(), alpha);

    info!(
        "Found {} interactions between {} users and {} items, {} distinct pairs observed.",
        num_interactions,
        users.len(),
        items.len(),
        matrix.nnz(),
    );

    Ok(Dataset { matrix, users, items })
}

fn invalid(interaction: &Interaction, reason: &'static str) -> RecoError {
    RecoError::InvalidInteraction {
        user: interaction.user.clone(),
        item: interaction.item.clone(),
        quantity: interaction.quantity.to_string(),
        reason,
    }
}
