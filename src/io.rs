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
use std::io::{stdout, BufWriter, Read, Write};
use std::path::Path;

use serde_derive::{Deserialize, Serialize};

use crate::error::{RecoError, Result};
use crate::recommend::Recommender;
use crate::types::{Identifier, Interaction};

#[derive(Deserialize)]
struct InteractionRow {
    user: String,
    item: String,
    quantity: String,
}

/// Reads an interactions file. We expect NO headers, and a user-item-quantity triple per line
/// with tab separation.
pub fn read_interactions<P: AsRef<Path>>(path: P) -> Result<Vec<Interaction>> {
    let file = File::open(path)?;
    interactions_from_reader(file)
}

pub fn interactions_from_reader<R: Read>(reader: R) -> Result<Vec<Interaction>> {

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .from_reader(reader);

    let mut interactions = Vec::new();

    for result in csv_reader.deserialize() {
        let row: InteractionRow = result?;

        let user: Identifier = parse_identifier(&row.user);
        let item: Identifier = parse_identifier(&row.item);

        let quantity = match row.quantity.trim().parse::<i64>() {
            Ok(quantity) => quantity,
            Err(_) => {
                return Err(RecoError::InvalidInteraction {
                    user,
                    item,
                    quantity: row.quantity,
                    reason: "quantity is not an integer",
                });
            }
        };

        interactions.push(Interaction { user, item, quantity });
    }

    Ok(interactions)
}

fn parse_identifier(field: &str) -> Identifier {
    match field.parse() {
        Ok(identifier) => identifier,
        Err(never) => match never {},
    }
}

/// Struct used for JSON serialization of recommendations. Field names will be used in JSON.
#[derive(Serialize)]
struct Recommendations<'a> {
    for_user: &'a Identifier,
    recommended_items: Vec<ScoredItem>,
}

#[derive(Serialize)]
struct ScoredItem {
    item: Identifier,
    score: f32,
}

/// Output the top-`n` recommendations of every user in JSON format, one object per line, using
/// the original identifiers. If a `recommendations_path` is supplied, we write to a file at the
/// specified path, otherwise, we output to stdout.
pub fn write_recommendations(
    recommender: &Recommender,
    n: usize,
    recommendations_path: Option<String>,
) -> Result<()> {

    let out: Box<dyn Write> = match recommendations_path {
        Some(path) => Box::new(File::create(&Path::new(&path))?),
        _ => Box::new(stdout()),
    };

    let mut out = BufWriter::new(out);
    write_recommendations_to(recommender, n, &mut out)?;
    out.flush()?;

    Ok(())
}

pub fn write_recommendations_to<W: Write>(
    recommender: &Recommender,
    n: usize,
    out: &mut W,
) -> Result<()> {

    for user in recommender.users() {

        let recommended_items = recommender.recommend(user, n)?
            .into_iter()
            .map(|(item, score)| ScoredItem { item, score })
            .collect();

        let recommendations = Recommendations { for_user: user, recommended_items };

        serde_json::to_writer(&mut *out, &recommendations)?;
        writeln!(out)?;
    }

    Ok(())
}
