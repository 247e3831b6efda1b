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

use fnv::FnvHashSet;
use ndarray::ArrayView1;
use tracing::debug;

use crate::als;
use crate::config::ModelConfig;
use crate::dictionary::Dictionary;
use crate::error::{RecoError, Result};
use crate::topk::{self, ScoredIndex};
use crate::types::{ConfidenceMatrix, Factors, Identifier, Interaction};
use crate::{build, Dataset};

/// Neighbourhood size for `similar_users` when the caller has no preference.
pub const DEFAULT_SIMILAR_USERS: usize = 10;

/// A trained model: the frozen factor matrices together with the dictionaries and the observed
/// interactions. All queries take `&self`, so a single instance can be shared between threads.
#[derive(Debug, Clone)]
pub struct Recommender {
    users: Dictionary,
    items: Dictionary,
    interactions: ConfidenceMatrix,
    user_factors: Factors,
    item_factors: Factors,
    exclude_observed: bool,
}

impl Recommender {

    /// Builds the confidence matrix and fits the factors in one go.
    pub fn train<I>(interactions: I, config: &ModelConfig) -> Result<Self>
        where I: IntoIterator<Item=Interaction> {

        config.validate()?;

        let dataset = build(interactions, config.alpha)?;

        let (user_factors, item_factors) = als::fit(
            &dataset.matrix,
            config.factors,
            config.regularization,
            config.iterations,
            config.seed,
            config.num_threads(),
        )?;

        Recommender::from_parts(dataset, user_factors, item_factors, config.exclude_observed)
    }

    pub fn from_parts(
        dataset: Dataset,
        user_factors: Factors,
        item_factors: Factors,
        exclude_observed: bool,
    ) -> Result<Self> {

        let Dataset { matrix, users, items } = dataset;

        if user_factors.nrows() != users.len() || item_factors.nrows() != items.len() {
            return Err(RecoError::InvalidParameter(format!(
                "factor matrices with {} user and {} item rows do not match {} users and {} items",
                user_factors.nrows(), item_factors.nrows(), users.len(), items.len())));
        }

        if user_factors.ncols() != item_factors.ncols() {
            return Err(RecoError::InvalidParameter(format!(
                "user factors have {} dimensions, item factors {}",
                user_factors.ncols(), item_factors.ncols())));
        }

        Ok(Recommender {
            users,
            items,
            interactions: matrix,
            user_factors,
            item_factors,
            exclude_observed,
        })
    }

    /// The `n` highest scoring items for `user`. Items the user already interacted with are
    /// skipped unless the model was configured otherwise.
    pub fn recommend(&self, user: &Identifier, n: usize) -> Result<Vec<(Identifier, f32)>> {

        let user_index = self.users.index_of(user)?;

        let scores = self.item_factors.dot(&self.user_factors.row(user_index));

        let (observed, _) = self.interactions.row(user_index);
        let excluded: FnvHashSet<u32> = if self.exclude_observed {
            observed.iter().cloned().collect()
        } else {
            FnvHashSet::default()
        };

        let candidates = scores.iter()
            .enumerate()
            .filter(|(item_index, _)| !excluded.contains(&(*item_index as u32)))
            .map(|(index, score)| ScoredIndex { index, score: *score });

        let recommended = topk::top_k(candidates, n);

        debug!("Recommending {} items for user {}", recommended.len(), user);

        named(&self.items, recommended)
    }

    /// The `n` users whose factors have the highest cosine similarity to those of `user`,
    /// never including `user` itself.
    pub fn similar_users(&self, user: &Identifier, n: usize) -> Result<Vec<(Identifier, f32)>> {

        let user_index = self.users.index_of(user)?;
        let query = self.user_factors.row(user_index);

        let candidates = self.user_factors.outer_iter()
            .enumerate()
            .filter(|(other_index, _)| *other_index != user_index)
            .map(|(index, other)| ScoredIndex { index, score: cosine_similarity(query, other) });

        named(&self.users, topk::top_k(candidates, n))
    }

    /// Explains a recommendation of `item` to `user` through the `k_items` items from the user's
    /// history whose factors are most similar to those of `item`. The score of an unseen item is
    /// essentially a confidence weighted aggregate over exactly these items. Users without any
    /// history get an empty explanation.
    pub fn explain(
        &self,
        user: &Identifier,
        item: &Identifier,
        k_items: usize,
    ) -> Result<Vec<(Identifier, f32)>> {

        let user_index = self.users.index_of(user)?;
        let item_index = self.items.index_of(item)?;

        let target = self.item_factors.row(item_index);
        let (observed, _) = self.interactions.row(user_index);

        let candidates = observed.iter()
            .map(|other_index| {
                let index = *other_index as usize;
                let other = self.item_factors.row(index);
                ScoredIndex { index, score: cosine_similarity(target, other) }
            });

        named(&self.items, topk::top_k(candidates, k_items))
    }

    /// Raw affinity between a user and an item, the dot product of their factors.
    pub fn score(&self, user: &Identifier, item: &Identifier) -> Result<f32> {
        let user_index = self.users.index_of(user)?;
        let item_index = self.items.index_of(item)?;

        Ok(self.user_factors.row(user_index).dot(&self.item_factors.row(item_index)))
    }

    /// All users known to the model, in index order.
    pub fn users(&self) -> &[Identifier] {
        self.users.identifiers()
    }

    /// All items known to the model, in index order.
    pub fn items(&self) -> &[Identifier] {
        self.items.identifiers()
    }

    pub fn num_users(&self) -> usize {
        self.users.len()
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    pub fn factors(&self) -> usize {
        self.user_factors.ncols()
    }

    pub fn user_factors(&self) -> &Factors {
        &self.user_factors
    }

    pub fn item_factors(&self) -> &Factors {
        &self.item_factors
    }
}

/// Translates scored indices back to external identifiers.
fn named(dictionary: &Dictionary, scored: Vec<ScoredIndex>) -> Result<Vec<(Identifier, f32)>> {
    scored.into_iter()
        .map(|candidate| {
            dictionary.identifier_of(candidate.index)
                .map(|identifier| (identifier.clone(), candidate.score))
        })
        .collect()
}

/// Cosine of the angle between two factor vectors, 0 if either of them is zero. The result is
/// exactly symmetric in its arguments.
pub fn cosine_similarity(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {

    let mut dot = 0.0_f32;
    let mut squared_norm_a = 0.0_f32;
    let mut squared_norm_b = 0.0_f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        squared_norm_a += x * x;
        squared_norm_b += y * y;
    }

    let norm_a = squared_norm_a.sqrt();
    let norm_b = squared_norm_b.sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}


#[cfg(test)]
mod tests {

    use std::sync::Arc;
    use std::thread;

    use ndarray::array;

    use super::*;

    fn model_config() -> ModelConfig {
        ModelConfig {
            factors: 4,
            alpha: 1.0,
            regularization: 0.05,
            iterations: 10,
            seed: 42,
            num_threads: Some(2),
            exclude_observed: true,
        }
    }

    fn interactions() -> Vec<Interaction> {
        vec![
            Interaction::new("alice", "apple", 3),
            Interaction::new("alice", "dog", 1),
            Interaction::new("alice", "pony", 2),
            Interaction::new("bob", "apple", 1),
            Interaction::new("bob", "pony", 4),
            Interaction::new("charles", "pony", 1),
            Interaction::new("charles", "bike", 2),
            Interaction::new("dora", "bike", 5),
            Interaction::new("dora", "car", 1),
            Interaction::new("erin", "car", 2),
            Interaction::new("erin", "dog", 1),
            Interaction::new("frank", "kite", 0),
        ]
    }

    fn history(name: &str) -> Vec<Identifier> {
        interactions().into_iter()
            .filter(|interaction| interaction.user == Identifier::from(name))
            .filter(|interaction| interaction.quantity > 0)
            .map(|interaction| interaction.item)
            .collect()
    }

    fn trained() -> Recommender {
        Recommender::train(interactions(), &model_config()).unwrap()
    }

    fn assert_sorted(results: &[(Identifier, f32)]) {
        for pair in results.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    fn assert_unknown(result: Result<Vec<(Identifier, f32)>>, expected_role: &str) {
        match result {
            Err(RecoError::UnknownIdentifier { role, .. }) => assert_eq!(role, expected_role),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn recommendations_skip_observed_items() {
        let recommender = trained();

        for user in recommender.users().to_vec() {
            let observed = history(&user.to_string());
            let recommended = recommender.recommend(&user, 3).unwrap();

            assert!(recommended.len() <= 3);
            assert_sorted(&recommended);

            let distinct: FnvHashSet<&Identifier> =
                recommended.iter().map(|(item, _)| item).collect();
            assert_eq!(distinct.len(), recommended.len());

            for (item, _) in recommended.iter() {
                assert!(!observed.contains(item));
            }
        }
    }

    #[test]
    fn recommendations_return_all_eligible_items_if_n_is_large() {
        let recommender = trained();

        // alice knows 3 of the 6 items
        let recommended = recommender.recommend(&"alice".into(), 100).unwrap();
        assert_eq!(recommended.len(), 3);

        assert!(recommender.recommend(&"alice".into(), 0).unwrap().is_empty());
    }

    #[test]
    fn unbounded_queries_return_every_candidate() {
        let recommender = trained();

        let recommended = recommender.recommend(&"alice".into(), usize::MAX).unwrap();
        assert_eq!(recommended.len(), 3);
        assert_sorted(&recommended);

        let similar = recommender.similar_users(&"alice".into(), usize::MAX).unwrap();
        assert_eq!(similar.len(), recommender.num_users() - 1);

        let reasons = recommender.explain(&"alice".into(), &"bike".into(), usize::MAX).unwrap();
        assert_eq!(reasons.len(), 3);
    }

    #[test]
    fn zero_quantity_records_are_not_observed() {
        let recommender = trained();

        // only positive counts enter the history, so kite stays a candidate for frank
        let recommended = recommender.recommend(&"frank".into(), usize::MAX).unwrap();
        assert_eq!(recommended.len(), recommender.num_items());
        assert!(recommended.iter().any(|(item, _)| *item == Identifier::from("kite")));
    }

    #[test]
    fn observed_items_can_be_kept() {
        let mut config = model_config();
        config.exclude_observed = false;
        let recommender = Recommender::train(interactions(), &config).unwrap();

        let recommended = recommender.recommend(&"alice".into(), 100).unwrap();
        assert_eq!(recommended.len(), recommender.num_items());
    }

    #[test]
    fn scores_match_factor_dot_products() {
        let recommender = trained();

        for (item, score) in recommender.recommend(&"bob".into(), 4).unwrap() {
            let expected = recommender.score(&"bob".into(), &item).unwrap();
            assert!((score - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn ties_are_broken_by_item_index() {
        let interactions = vec![
            Interaction::new(1, "x", 1),
            Interaction::new(2, "y", 1),
            Interaction::new(2, "z", 1),
            Interaction::new(2, "w", 1),
        ];
        let dataset = build(interactions, 1.0).unwrap();

        // user 1 has a zero vector, so every item scores 0
        let user_factors = array![[0.0_f32, 0.0], [1.0, 1.0]];
        let item_factors = array![[1.0_f32, 0.0], [0.5, 0.5], [0.5, 0.5], [0.5, 0.5]];

        let recommender =
            Recommender::from_parts(dataset, user_factors, item_factors, true).unwrap();

        let recommended = recommender.recommend(&Identifier::Int(1), 2).unwrap();
        let items: Vec<Identifier> = recommended.into_iter().map(|(item, _)| item).collect();

        assert_eq!(items, vec![Identifier::from("y"), Identifier::from("z")]);
    }

    #[test]
    fn similar_users_exclude_the_query_user() {
        let recommender = trained();

        for user in recommender.users().to_vec() {
            let similar = recommender.similar_users(&user, DEFAULT_SIMILAR_USERS).unwrap();

            assert_eq!(similar.len(), recommender.num_users() - 1);
            assert_sorted(&similar);
            assert!(similar.iter().all(|(other, _)| *other != user));
        }

        assert_eq!(recommender.similar_users(&"alice".into(), 2).unwrap().len(), 2);
    }

    #[test]
    fn similarity_is_symmetric() {
        let recommender = trained();
        let users = recommender.users().to_vec();

        for a in users.iter() {
            let from_a = recommender.similar_users(a, users.len()).unwrap();
            for (b, score_ab) in from_a.iter() {
                let from_b = recommender.similar_users(b, users.len()).unwrap();
                let score_ba = from_b.iter()
                    .find(|(other, _)| other == a)
                    .map(|(_, score)| *score)
                    .unwrap();
                assert_eq!(*score_ab, score_ba);
            }
        }
    }

    #[test]
    fn users_without_history_have_zero_similarity() {
        let recommender = trained();

        // frank only has a zero quantity, so the factors stay zero
        let similar = recommender.similar_users(&"frank".into(), 3).unwrap();

        assert!(similar.iter().all(|(_, score)| *score == 0.0));
    }

    #[test]
    fn explanations_come_from_the_users_history() {
        let recommender = trained();

        for user in recommender.users().to_vec() {
            let observed = history(&user.to_string());

            for item in recommender.items().to_vec() {
                let reasons = recommender.explain(&user, &item, 2).unwrap();

                assert!(reasons.len() <= 2);
                assert!(reasons.len() <= observed.len());
                assert_sorted(&reasons);
                for (reason, _) in reasons.iter() {
                    assert!(observed.contains(reason));
                }
            }
        }
    }

    #[test]
    fn empty_history_gives_empty_explanation() {
        let recommender = trained();

        let reasons = recommender.explain(&"frank".into(), &"apple".into(), 5).unwrap();

        assert!(reasons.is_empty());
    }

    #[test]
    fn unknown_identifiers_are_reported() {
        let recommender = trained();

        assert_unknown(recommender.recommend(&"zoe".into(), 3), "user");
        assert_unknown(recommender.similar_users(&Identifier::Int(99), 3), "user");
        assert_unknown(recommender.explain(&"zoe".into(), &"apple".into(), 3), "user");
        assert_unknown(recommender.explain(&"alice".into(), &"boat".into(), 3), "item");
        assert!(recommender.score(&"alice".into(), &"boat".into()).is_err());
    }

    #[test]
    fn mismatched_parts_are_rejected() {
        let dataset = build(vec![Interaction::new(1, 1, 1)], 1.0).unwrap();

        let result = Recommender::from_parts(
            dataset, array![[1.0_f32, 0.0], [0.0, 1.0]], array![[1.0_f32, 0.0]], true);

        assert!(result.is_err());
    }

    #[test]
    fn concurrent_queries_agree() {
        let recommender = Arc::new(trained());
        let expected = recommender.recommend(&"bob".into(), 3).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let recommender = Arc::clone(&recommender);
                thread::spawn(move || recommender.recommend(&"bob".into(), 3).unwrap())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        let a = array![1.0_f32, 0.0, 0.0];
        let b = array![0.0_f32, 1.0, 0.0];
        let zero = array![0.0_f32, 0.0, 0.0];

        assert!((cosine_similarity(a.view(), a.view()) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(a.view(), b.view()), 0.0);
        assert_eq!(cosine_similarity(a.view(), zero.view()), 0.0);
    }
}
