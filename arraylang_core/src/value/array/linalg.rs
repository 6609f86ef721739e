//! Matrix multiply and linear solve (§4.1.10).
//!
//! Delegates the dense numerics to `nalgebra` (teacher's own choice for
//! this concern); square systems solve via LU with partial pivoting,
//! rectangular systems via QR with column pivoting. Per the redesign note
//! in the design section, a nonzero LU `info` on the square path always
//! returns `SingularMatrix` — it never falls through to a power-series
//! fallback.

use nalgebra::DMatrix;

use crate::error::{ErrorKind, Result, Traced};

use super::{ArrayBody, ArrayData, ArrayRef};

fn to_dmatrix(a: &ArrayBody) -> Result<DMatrix<f64>> {
    if a.dims.len() != 2 {
        return Err(Traced::new(ErrorKind::ShapeMismatch, "matrix operations require a 2-D operand"));
    }
    let (rows, cols) = (a.dims[0], a.dims[1]);
    let mut buf = Vec::with_capacity(rows * cols);
    for i in 0..rows * cols {
        buf.push(a.data.get_scalar(i).as_f64());
    }
    // nalgebra's DMatrix::from_vec takes column-major data, matching ours.
    Ok(DMatrix::from_vec(rows, cols, buf))
}

fn from_dmatrix(m: &DMatrix<f64>) -> ArrayRef {
    let (rows, cols) = (m.nrows(), m.ncols());
    let data: Vec<f64> = m.as_slice().to_vec();
    ArrayBody::new(vec![rows, cols], ArrayData::Float(data))
}

/// §4.1.10 matrix multiply. Scalar operands short-circuit to scalar
/// multiply before reaching here (handled by the evaluator's `*` dispatch).
pub fn matmul(a: &ArrayBody, b: &ArrayBody) -> Result<ArrayRef> {
    if a.dims.len() != 2 || b.dims.len() != 2 {
        return Err(Traced::new(ErrorKind::ShapeMismatch, "matrix multiply requires 2-D operands"));
    }
    if a.dims[1] != b.dims[0] {
        return Err(Traced::new(
            ErrorKind::ShapeMismatch,
            format!("inner dimensions disagree: {} vs {}", a.dims[1], b.dims[0]),
        ));
    }
    let lhs = to_dmatrix(a)?;
    let rhs = to_dmatrix(b)?;
    Ok(from_dmatrix(&(lhs * rhs)))
}

/// §4.1.10 left-divide `a \ b`: solves `ax = b`.
pub fn solve(a: &ArrayBody, b: &ArrayBody) -> Result<ArrayRef> {
    if a.dims.len() != 2 {
        return Err(Traced::new(ErrorKind::ShapeMismatch, "solve requires a 2-D coefficient matrix"));
    }
    let lhs = to_dmatrix(a)?;
    let rhs = to_dmatrix(b)?;

    if a.dims[0] == a.dims[1] {
        let lu = lhs.clone().lu();
        // `info` in the original C++ surfaces as a non-invertible pivot;
        // nalgebra exposes this as `determinant() == 0` / failed `solve`.
        match lu.solve(&rhs) {
            Some(x) => Ok(from_dmatrix(&x)),
            None => Err(Traced::new(ErrorKind::SingularMatrix, "LU solve failed: singular matrix")),
        }
    } else {
        let qr = lhs.clone().qr();
        match qr.solve(&rhs) {
            Some(x) => Ok(from_dmatrix(&x)),
            None => Err(Traced::new(ErrorKind::SingularMatrix, "QR solve failed: rank-deficient matrix")),
        }
    }
}

/// §4.1.10 right-divide `a / b`, implemented as `(b' \ a')'`.
pub fn rdivide(a: &ArrayBody, b: &ArrayBody) -> Result<ArrayRef> {
    let at = transpose(a)?;
    let bt = transpose(b)?;
    let x = solve(&bt.borrow(), &at.borrow())?;
    let result = transpose(&x.borrow());
    result
}

pub fn transpose(a: &ArrayBody) -> Result<ArrayRef> {
    if a.dims.len() != 2 {
        return Err(Traced::new(ErrorKind::ShapeMismatch, "transpose requires a 2-D operand"));
    }
    let (rows, cols) = (a.dims[0], a.dims[1]);
    let mut out = ArrayData::zero_of_kind(a.kind(), rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            let src = r + c * rows;
            let dst = c + r * cols;
            out.set_scalar(dst, a.data.get_scalar(src));
        }
    }
    Ok(ArrayBody::new(vec![cols, rows], out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mat(rows: usize, cols: usize, data: Vec<f64>) -> ArrayRef {
        ArrayBody::new(vec![rows, cols], ArrayData::Float(data))
    }

    #[test]
    fn matmul_identity() {
        let a = mat(2, 2, vec![1.0, 0.0, 0.0, 1.0]);
        let b = mat(2, 2, vec![5.0, 6.0, 7.0, 8.0]);
        let r = matmul(&a.borrow(), &b.borrow()).unwrap();
        match &r.borrow().data {
            ArrayData::Float(v) => assert_eq!(v, &vec![5.0, 6.0, 7.0, 8.0]),
            _ => panic!("expected float result"),
        };
    }

    #[test]
    fn mismatched_inner_dims_rejected() {
        let a = mat(2, 3, vec![0.0; 6]);
        let b = mat(2, 2, vec![0.0; 4]);
        let err = matmul(&a.borrow(), &b.borrow()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ShapeMismatch);
    }

    #[test]
    fn square_solve_recovers_x() {
        // a = [[2,0],[0,2]], b = [[4],[6]] -> x = [[2],[3]]
        let a = mat(2, 2, vec![2.0, 0.0, 0.0, 2.0]);
        let b = mat(2, 1, vec![4.0, 6.0]);
        let x = solve(&a.borrow(), &b.borrow()).unwrap();
        match &x.borrow().data {
            ArrayData::Float(v) => {
                assert!((v[0] - 2.0).abs() < 1e-9);
                assert!((v[1] - 3.0).abs() < 1e-9);
            }
            _ => panic!("expected float result"),
        };
    }

    #[test]
    fn singular_square_matrix_is_rejected() {
        let a = mat(2, 2, vec![1.0, 1.0, 1.0, 1.0]);
        let b = mat(2, 1, vec![1.0, 1.0]);
        let err = solve(&a.borrow(), &b.borrow()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SingularMatrix);
    }

    #[test]
    fn transpose_round_trip() {
        let a = mat(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let t = transpose(&a.borrow()).unwrap();
        let back = transpose(&t.borrow()).unwrap();
        assert_eq!(back.borrow().dims, a.borrow().dims);
    }
}
