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

// Alternating least squares for implicit feedback, following Hu, Koren and Volinsky,
// "Collaborative Filtering for Implicit Feedback Datasets" (ICDM 2008).
//
// Every half-step fixes one factor matrix Y and solves, for each row of the other one,
//
//     (YᵀY + λI + Yᵀ(Cᵤ - I)Y) xᵤ = YᵀCᵤp(u)
//
// The term YᵀY + λI is shared by all rows and computed once per half-step, the correction
// Yᵀ(Cᵤ - I)Y only involves the observed entries of the row.

use std::sync::Mutex;
use std::time::Instant;

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scoped_pool::Pool;
use tracing::{debug, info};

use crate::config::validate_factorization;
use crate::error::{RecoError, Result, Side};
use crate::types::{ConfidenceMatrix, Factors};

/// Number of consecutive rows solved by a single pool job.
const ROWS_PER_JOB: usize = 256;

/// Initial factors are drawn uniformly from [0, INIT_SCALE).
const INIT_SCALE: f32 = 0.01;

/// A Cholesky pivot at or below this fraction of its diagonal entry counts as zero.
const PIVOT_TOLERANCE: f64 = 1e-10;

/// Fits user and item factors with `factors` latent dimensions. The result only depends on the
/// arguments, the number of threads in the pool merely changes how rows are scheduled.
///
/// With `regularization > 0` every system is positive definite, so `SingularSystem` only
/// surfaces for `regularization == 0` on degenerate data.
pub fn fit(
    matrix: &ConfidenceMatrix,
    factors: usize,
    regularization: f64,
    iterations: usize,
    seed: u64,
    pool_size: usize,
) -> Result<(Factors, Factors)> {

    validate_factorization(factors, regularization)?;

    let pool = Pool::new(pool_size.max(1));
    let fitted = alternate(&pool, matrix, factors, regularization, iterations, seed);
    pool.shutdown();

    fitted
}

fn alternate(
    pool: &Pool,
    matrix: &ConfidenceMatrix,
    factors: usize,
    regularization: f64,
    iterations: usize,
    seed: u64,
) -> Result<(Factors, Factors)> {

    let transposed = matrix.transpose();

    let mut item_factors = random_factors(matrix.num_cols(), factors, seed);
    let mut user_factors = random_factors(matrix.num_rows(), factors, seed.wrapping_add(1));

    let training_start = Instant::now();

    for iteration in 0..iterations {

        let iteration_start = Instant::now();

        user_factors = solve_side(pool, matrix, &item_factors, regularization, Side::Users)?;
        item_factors = solve_side(pool, &transposed, &user_factors, regularization, Side::Items)?;

        info!(
            "ALS iteration {}/{} took {}ms",
            iteration + 1,
            iterations,
            iteration_start.elapsed().as_millis(),
        );

        if tracing::enabled!(tracing::Level::DEBUG) {
            let loss = training_loss(matrix, &user_factors, &item_factors, regularization);
            debug!("ALS iteration {}: loss = {:.6}", iteration + 1, loss);
        }
    }

    info!(
        "Fitted {} user and {} item factors with {} dimensions in {}ms",
        user_factors.nrows(),
        item_factors.nrows(),
        factors,
        training_start.elapsed().as_millis(),
    );

    Ok((user_factors, item_factors))
}

/// Solves every row of one side against the fixed `other` factors.
fn solve_side(
    pool: &Pool,
    matrix: &ConfidenceMatrix,
    other: &Factors,
    regularization: f64,
    side: Side,
) -> Result<Factors> {

    let k = other.ncols();
    let gram = gramian(other);

    let mut solved = Array2::<f32>::zeros((matrix.num_rows(), k));
    let first_failure: Mutex<Option<usize>> = Mutex::new(None);

    pool.scoped(|scope| {
        for (job, mut rows) in solved.axis_chunks_iter_mut(Axis(0), ROWS_PER_JOB).enumerate() {

            let gram = &gram;
            let first_failure = &first_failure;

            scope.execute(move || {
                for (offset, mut target) in rows.outer_iter_mut().enumerate() {
                    let row = job * ROWS_PER_JOB + offset;
                    let (columns, confidences) = matrix.row(row);

                    match solve_row(gram, regularization, other, columns, confidences) {
                        Some(solution) => target.assign(&solution),
                        None => {
                            let mut failure = first_failure.lock()
                                .unwrap_or_else(|poisoned| poisoned.into_inner());
                            *failure = Some(failure.map_or(row, |known| known.min(row)));
                            return;
                        }
                    }
                }
            });
        }
    });

    let first_failure = first_failure.into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    match first_failure {
        Some(row) => Err(RecoError::SingularSystem { side, row }),
        None => Ok(solved),
    }
}

/// YᵀY, accumulated in double precision.
pub fn gramian(factors: &Factors) -> Array2<f64> {
    let widened = factors.mapv(f64::from);
    widened.t().dot(&widened)
}

/// Solves the weighted ridge regression for a single row, given the shared `gram` = YᵀY of the
/// fixed side and the row's observed columns with their confidences. Returns `None` if the
/// system is not positive definite.
pub fn solve_row(
    gram: &Array2<f64>,
    regularization: f64,
    other: &Factors,
    columns: &[u32],
    confidences: &[f32],
) -> Option<Array1<f32>> {

    let k = gram.nrows();

    // Nothing observed means a zero right-hand side, hence a zero solution.
    if columns.is_empty() {
        return Some(Array1::zeros(k));
    }

    let mut a = gram.clone();
    let mut b = Array1::<f64>::zeros(k);

    for i in 0..k {
        a[[i, i]] += regularization;
    }

    for (column, confidence) in columns.iter().zip(confidences.iter()) {
        let y = other.row(*column as usize);
        let confidence = f64::from(*confidence);
        let weight = confidence - 1.0;

        for r in 0..k {
            let y_r = f64::from(y[r]);
            b[r] += confidence * y_r;

            let weighted_y_r = weight * y_r;
            for c in 0..k {
                a[[r, c]] += weighted_y_r * f64::from(y[c]);
            }
        }
    }

    cholesky_solve(&a, &b).map(|x| x.mapv(|value| value as f32))
}

/// Solves A * x = b for a symmetric positive definite A via A = L * Lᵀ.
pub fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {

    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }

            if i == j {
                let pivot = a[[i, i]] - sum;
                // also catches NaN
                if !(pivot > PIVOT_TOLERANCE * a[[i, i]].abs()) {
                    return None;
                }
                l[[i, j]] = pivot.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L * y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Lᵀ * x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    if x.iter().all(|value| value.is_finite()) {
        Some(x)
    } else {
        None
    }
}

fn random_factors(num_rows: usize, k: usize, seed: u64) -> Factors {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((num_rows, k), |_| rng.gen::<f32>() * INIT_SCALE)
}

/// Full implicit-feedback objective over all user-item pairs. Unobserved pairs are accounted
/// for through xᵤᵀ(YᵀY)xᵤ, so the cost is linear in the number of stored entries.
pub(crate) fn training_loss(
    matrix: &ConfidenceMatrix,
    user_factors: &Factors,
    item_factors: &Factors,
    regularization: f64,
) -> f64 {

    let gram = gramian(item_factors);
    let mut loss = 0.0;

    for (user, x) in user_factors.outer_iter().enumerate() {
        let x = x.mapv(f64::from);
        loss += x.dot(&gram.dot(&x));

        let (columns, confidences) = matrix.row(user);
        for (column, confidence) in columns.iter().zip(confidences.iter()) {
            let prediction = x.dot(&item_factors.row(*column as usize).mapv(f64::from));
            let confidence = f64::from(*confidence);
            loss += confidence * (1.0 - prediction).powi(2) - prediction.powi(2);
        }
    }

    let user_norms: f64 = user_factors.iter().map(|v| f64::from(*v).powi(2)).sum();
    let item_norms: f64 = item_factors.iter().map(|v| f64::from(*v).powi(2)).sum();

    loss + regularization * (user_norms + item_norms)
}
