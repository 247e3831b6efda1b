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

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde_derive::{Deserialize, Serialize};

use crate::error::{RecoError, Result};

/// Hyperparameters for training and serving. Missing fields in a JSON config fall back to the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Embedding dimension k
    pub factors: usize,
    /// Weight of observed interactions, confidence is `1 + alpha * count`
    pub alpha: f64,
    /// Ridge penalty lambda
    pub regularization: f64,
    pub iterations: usize,
    pub seed: u64,
    /// Worker threads for the per-row solves, all cores if unset
    pub num_threads: Option<usize>,
    /// Drop items the user already interacted with from recommendations
    pub exclude_observed: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            factors: 190,
            alpha: 0.6,
            regularization: 0.06,
            iterations: 15,
            seed: 42,
            num_threads: None,
            exclude_observed: true,
        }
    }
}

impl ModelConfig {

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: ModelConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get).max(1)
    }

    pub fn validate(&self) -> Result<()> {
        validate_alpha(self.alpha)?;
        validate_factorization(self.factors, self.regularization)?;

        if self.num_threads == Some(0) {
            return Err(RecoError::InvalidParameter(
                "num_threads must be at least 1".to_string()));
        }

        Ok(())
    }
}

pub(crate) fn validate_alpha(alpha: f64) -> Result<()> {
    if !alpha.is_finite() || alpha < 0.0 {
        return Err(RecoError::InvalidParameter(
            format!("alpha must be finite and non-negative, got {}", alpha)));
    }
    Ok(())
}

pub(crate) fn validate_factorization(factors: usize, regularization: f64) -> Result<()> {
    if factors == 0 {
        return Err(RecoError::InvalidParameter("factors must be at least 1".to_string()));
    }
    if !regularization.is_finite() || regularization < 0.0 {
        return Err(RecoError::InvalidParameter(
            format!("regularization must be finite and non-negative, got {}", regularization)));
    }
    Ok(())
}
