//! Regularizer (C3)
//!
//! `lambda = reg_factor * max_i |(H^T g)_i|`, forwarded to the CGLS solver
//! variant when regularization is requested (§4.3).

use crate::matrix::Matrix;

/// Compute the Tikhonov regularization coefficient. `reg_factor` is the
/// spec's hard-coded `0.10`, exposed as `Config::reg_factor` (§0.3).
pub fn compute_lambda(h: &Matrix, g: &[f64], reg_factor: f64) -> f64 {
    let htg = h.transpose_mul(g);
    let max_abs = htg.iter().fold(0.0_f64, |acc, &x| acc.max(x.abs()));
    reg_factor * max_abs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lambda_is_nonnegative() {
        let h = Matrix::from_row_major(2, 2, vec![1.0, -2.0, 3.0, 4.0]).unwrap();
        let g = vec![1.0, -1.0];
        assert!(compute_lambda(&h, &g, 0.10) >= 0.0);
    }

    #[test]
    fn lambda_is_zero_iff_htg_is_zero() {
        // H^T g = 0 when g is orthogonal to every column of H.
        let h = Matrix::from_row_major(2, 2, vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        let g = vec![0.0, 0.0];
        assert_eq!(compute_lambda(&h, &g, 0.10), 0.0);

        let g_nonzero = vec![1.0, 0.0];
        assert!(compute_lambda(&h, &g_nonzero, 0.10) > 0.0);
    }

    #[test]
    fn lambda_scales_with_reg_factor() {
        let h = Matrix::from_row_major(1, 1, vec![2.0]).unwrap();
        let g = vec![3.0];
        assert_eq!(compute_lambda(&h, &g, 0.10), 0.6);
        assert_eq!(compute_lambda(&h, &g, 0.20), 1.2);
    }
}
