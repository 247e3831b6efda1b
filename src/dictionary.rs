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

use fnv::FnvHashMap;

use crate::error::{RecoError, Result};
use crate::types::Identifier;

/// Bidirectional mapping between external identifiers and consecutive matrix indices. Indices
/// are handed out in the order in which identifiers are first seen.
#[derive(Debug, Clone)]
pub struct Dictionary {
    role: &'static str,
    indices: FnvHashMap<Identifier, u32>,
    identifiers: Vec<Identifier>,
}

impl Dictionary {

    /// `role` names the kind of identifier ("user" or "item") in lookup failures.
    pub fn new(role: &'static str) -> Self {
        Dictionary {
            role,
            indices: FnvHashMap::with_capacity_and_hasher(100, Default::default()),
            identifiers: Vec::with_capacity(100),
        }
    }

    /// Returns the index of `identifier`, assigning the next free one if it is new.
    pub(crate) fn index_or_insert(&mut self, identifier: &Identifier) -> u32 {
        if let Some(index) = self.indices.get(identifier) {
            return *index;
        }

        let index = self.identifiers.len() as u32;
        self.indices.insert(identifier.clone(), index);
        self.identifiers.push(identifier.clone());

        index
    }

    pub fn index_of(&self, identifier: &Identifier) -> Result<usize> {
        self.indices.get(identifier)
            .map(|index| *index as usize)
            .ok_or_else(|| RecoError::UnknownIdentifier {
                role: self.role,
                identifier: identifier.clone(),
            })
    }

    pub fn identifier_of(&self, index: usize) -> Result<&Identifier> {
        self.identifiers.get(index)
            .ok_or(RecoError::IndexOutOfRange { index, len: self.identifiers.len() })
    }

    pub fn contains(&self, identifier: &Identifier) -> bool {
        self.indices.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    /// All identifiers in index order.
    pub fn identifiers(&self) -> &[Identifier] {
        &self.identifiers
    }
}
