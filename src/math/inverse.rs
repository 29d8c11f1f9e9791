use std::fmt::Debug;

use nalgebra::{self as na, DMatrix, SMatrix};
use thiserror::Error;

/// Errors that can occur while inverting a small dense matrix
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InverseError {
    #[error("Matrix contains NaN or infinite values")]
    NonFinite,
    #[error("singular matrix: pivot {pivot:e} in row {row}")]
    Singular { row: usize, pivot: f64 },
}

/// Inverts a square `N x N` matrix through an LU decomposition with partial pivoting.
///
/// A pivot is considered zero when `|pivot| <= N * eps * max|m_ij|`, which makes the
/// check relative to the magnitude of the entries. Calibration transforms (4x4), the
/// triangulation normal matrix (3x3) and the homography normal matrix (8x8) all go
/// through here.
///
/// # Errors
/// * `InverseError::NonFinite` - If the input contains NaN or infinity values
/// * `InverseError::Singular` - If a zero or near-zero pivot shows up during elimination
pub fn invert<F, const N: usize>(matrix: &SMatrix<F, N, N>) -> Result<SMatrix<F, N, N>, InverseError>
where
    F: na::RealField + Copy + Debug,
{
    if matrix.iter().any(|&x| !x.is_finite()) {
        return Err(InverseError::NonFinite);
    }

    let scale = matrix.iter().fold(F::zero(), |acc, &x| acc.max(x.abs()));
    let tolerance = F::default_epsilon() * scale * na::convert::<f64, F>(N as f64);

    let lu = DMatrix::from_iterator(N, N, matrix.iter().copied()).lu();
    if let Some((row, &pivot)) = lu
        .u()
        .diagonal()
        .iter()
        .enumerate()
        .find(|&(_, &p)| p.abs() <= tolerance)
    {
        return Err(InverseError::Singular {
            row,
            pivot: pivot.to_subset_unchecked(),
        });
    }

    let inverse = lu.try_inverse().ok_or(InverseError::Singular {
        row: N.saturating_sub(1),
        pivot: 0.0,
    })?;
    if inverse.iter().any(|&x| !x.is_finite()) {
        return Err(InverseError::NonFinite);
    }

    Ok(SMatrix::from_iterator(inverse.iter().copied()))
}
