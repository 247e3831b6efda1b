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

use thiserror::Error;

use crate::types::Identifier;

pub type Result<T> = std::result::Result<T, RecoError>;

/// Which of the two factor matrices was being solved when a linear system failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Users,
    Items,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Side::Users => write!(f, "user"),
            Side::Items => write!(f, "item"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RecoError {
    #[error("invalid interaction between user {user} and item {item} (quantity {quantity}): {reason}")]
    InvalidInteraction {
        user: Identifier,
        item: Identifier,
        quantity: String,
        reason: &'static str,
    },

    /// The identifier was not observed at training time. `role` is either "user" or "item".
    #[error("unknown {role} identifier {identifier}")]
    UnknownIdentifier {
        role: &'static str,
        identifier: Identifier,
    },

    #[error("index {index} out of range for a dictionary of {len} identifiers")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("linear system for {side} row {row} is not positive definite")]
    SingularSystem { side: Side, row: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
