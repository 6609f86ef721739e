//! Index-list validation, maximum-index computation, and bounds checking
//! (§4.1.1 – §4.1.4).
//!
//! Grounded in `examples/original_source/source/matrixobjs.cpp`
//! (`BaseMatrixObj::validIndices`, `getMaxIndices`) with the original's
//! implicit negative-index rejection made an explicit `InvalidIndex` error
//! rather than an assertion.

use crate::error::{ErrorKind, Result, Traced};

use super::ArrayBody;

/// One index-list component, already evaluated (ranges are *not* expanded
/// per §4.2.4; they stay in this lazy form).
#[derive(Debug, Clone)]
pub enum IndexComponent {
    /// 1-based integer positions.
    Numeric(Vec<i64>),
    /// Parallel boolean mask; `true` positions select successive offsets.
    Mask(Vec<bool>),
    /// `(start, step, end)`; `is_full` marks the `:` sentinel.
    Range { start: f64, step: f64, end: f64, is_full: bool },
    /// A single 1-based position; equivalent to `Numeric(vec![i])` but
    /// kept distinct so callers can special-case scalar indexing cheaply.
    Scalar(i64),
}

impl IndexComponent {
    pub fn count(&self, dim_size: usize) -> usize {
        match self {
            IndexComponent::Numeric(v) => v.len(),
            IndexComponent::Mask(v) => v.iter().filter(|&&b| b).count(),
            IndexComponent::Range { is_full: true, .. } => dim_size,
            IndexComponent::Range { start, step, end, .. } => range_len(*start, *step, *end),
            IndexComponent::Scalar(_) => 1,
        }
    }

    /// Maximum 1-based position this component implies, given the size of
    /// the dimension it indexes (ignoring the linear-tail special case,
    /// which `get_max_indices` handles for the final component).
    fn max_index(&self, dim_size: usize) -> Result<i64> {
        match self {
            IndexComponent::Numeric(v) => Ok(v.iter().copied().max().unwrap_or(0)),
            IndexComponent::Mask(v) => Ok(v.iter().filter(|&&b| b).count() as i64),
            IndexComponent::Range { is_full: true, .. } => Ok(dim_size as i64),
            IndexComponent::Range { start, end, .. } => Ok(start.max(*end) as i64),
            IndexComponent::Scalar(i) => Ok(*i),
        }
    }
}

fn range_len(start: f64, step: f64, end: f64) -> usize {
    const EPS: f64 = 1e-5;
    if step == 0.0 {
        return 0;
    }
    if step > 0.0 && end < start {
        return 0;
    }
    if step < 0.0 && end > start {
        return 0;
    }
    let raw = (end - start) / step;
    let floor = raw.floor();
    let count = if raw - floor > 1.0 - EPS { floor + 1.0 } else { floor };
    (count + 1.0).max(0.0) as usize
}

/// §4.1.2 — every numeric component must be strictly positive; every
/// non-full range must have positive `start` and `end`. Masks and full
/// ranges are unconditionally valid.
pub fn valid_indices(components: &[IndexComponent]) -> Result<()> {
    for c in components {
        match c {
            IndexComponent::Numeric(v) => {
                if v.iter().any(|&x| x <= 0) {
                    return Err(Traced::new(ErrorKind::InvalidIndex, "index values must be strictly positive"));
                }
            }
            IndexComponent::Scalar(i) => {
                if *i <= 0 {
                    return Err(Traced::new(ErrorKind::InvalidIndex, "index values must be strictly positive"));
                }
            }
            IndexComponent::Range { is_full: false, start, end, .. } => {
                if *start <= 0.0 || *end <= 0.0 {
                    return Err(Traced::new(ErrorKind::InvalidIndex, "range index bounds must be positive"));
                }
            }
            IndexComponent::Range { .. } | IndexComponent::Mask(_) => {}
        }
    }
    Ok(())
}

/// §4.1.3 — maximum implied 1-based index along each array dimension,
/// folding a trailing linear component across the remaining dimensions
/// when fewer components than dimensions were supplied.
pub fn get_max_indices(components: &[IndexComponent], dims: &[usize]) -> Result<Vec<usize>> {
    let k = dims.len();
    let n = components.len();

    if n >= k {
        let mut out = Vec::with_capacity(n);
        for (i, c) in components.iter().enumerate() {
            let dim_size = dims.get(i).copied().unwrap_or(1);
            out.push(c.max_index(dim_size)? as usize);
        }
        return Ok(out);
    }

    // Fewer components than dimensions: all but the last index normally;
    // the last component folds against the flattened tail.
    let mut out = Vec::with_capacity(k);
    for i in 0..n - 1 {
        out.push(components[i].max_index(dims[i])? as usize);
    }

    let tail_dims = &dims[n - 1..];
    let tail_size: usize = tail_dims.iter().product();
    let last = &components[n - 1];
    let linear_max = last.max_index(tail_size)? as usize;

    // Fold the 1-based linear tail index into per-dimension indices: the
    // tail dimensions keep the same column-major stride progression as the
    // source array, so this is an ordinary positional decomposition (first
    // tail dimension fastest), matching how `resolve_offsets` addresses the
    // same span with a single flattened stride.
    let mut remaining = linear_max.saturating_sub(1);
    for &d in tail_dims {
        out.push((remaining % d) + 1);
        remaining /= d;
    }

    Ok(out)
}

/// §4.1.4 read path: succeeds iff every max index fits within the
/// corresponding dimension.
pub fn bounds_check_nd(max_indices: &[usize], dims: &[usize]) -> Result<()> {
    for (i, &m) in max_indices.iter().enumerate() {
        let d = dims.get(i).copied().unwrap_or(1);
        if m > d {
            return Err(Traced::new(
                ErrorKind::IndexOutOfRange,
                format!("index {m} out of bounds for dimension {i} of size {d}"),
            ));
        }
    }
    Ok(())
}

/// §4.1.4 write path: the dimension vector an out-of-bounds write must grow
/// to — element-wise max of `dims` and `max_indices`, with `max_indices`
/// possibly introducing new trailing dimensions.
pub fn expanded_dims(dims: &[usize], max_indices: &[usize]) -> Vec<usize> {
    let n = dims.len().max(max_indices.len());
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let d = dims.get(i).copied().unwrap_or(1);
        let m = max_indices.get(i).copied().unwrap_or(0);
        out.push(d.max(m));
    }
    out
}

/// Expands `body` in place to `new_dims`, zero/empty-initializing new cells
/// and remapping the old buffer via stride translation.
pub fn expand(body: &mut ArrayBody, new_dims: Vec<usize>) {
    let new_dims = super::canonical_dims(new_dims);
    if new_dims == body.dims {
        return;
    }
    let old_dims = body.dims.clone();
    let old_strides = super::strides(&old_dims);
    let new_strides = super::strides(&new_dims);
    let new_count: usize = new_dims.iter().product();

    let mut new_data = super::ArrayData::zero_of_kind(body.kind(), new_count);
    let old_count: usize = old_dims.iter().product();

    for linear in 0..old_count {
        // Decompose the old linear offset into per-dim indices, then
        // recompute the offset in the new stride system.
        let mut remaining = linear;
        let mut new_offset = 0usize;
        for (dim_i, &old_s) in old_strides.iter().enumerate() {
            let idx = (remaining / old_s) % old_dims[dim_i];
            remaining -= idx * old_s;
            new_offset += idx * new_strides.get(dim_i).copied().unwrap_or(0);
        }
        copy_element(&body.data, linear, &mut new_data, new_offset);
    }

    body.dims = new_dims;
    body.data = new_data;
}

fn copy_element(src: &super::ArrayData, src_i: usize, dst: &mut super::ArrayData, dst_i: usize) {
    use super::ArrayData::*;
    match (src, dst) {
        (Int(s), Int(d)) => d[dst_i] = s[src_i],
        (Float(s), Float(d)) => d[dst_i] = s[src_i],
        (Complex(s), Complex(d)) => d[dst_i] = s[src_i],
        (Bool(s), Bool(d)) => d[dst_i] = s[src_i],
        (Char(s), Char(d)) => d[dst_i] = s[src_i],
        (Cell(s), Cell(d)) => d[dst_i] = s[src_i].clone(),
        _ => unreachable!("expand() called with mismatched source/dest kinds"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── validity ──
    #[test]
    fn zero_index_is_invalid() {
        let err = valid_indices(&[IndexComponent::Numeric(vec![0])]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidIndex);
    }

    #[test]
    fn mask_and_full_range_always_valid() {
        assert!(valid_indices(&[IndexComponent::Mask(vec![true, false])]).is_ok());
        assert!(valid_indices(&[IndexComponent::Range { start: 0.0, step: 1.0, end: 0.0, is_full: true }]).is_ok());
    }

    // ── max indices / linear tail folding ──
    #[test]
    fn max_indices_matches_component_count_when_full_rank() {
        let dims = vec![3, 4];
        let comps = vec![IndexComponent::Scalar(2), IndexComponent::Scalar(3)];
        assert_eq!(get_max_indices(&comps, &dims).unwrap(), vec![2, 3]);
    }

    #[test]
    fn linear_tail_extension_scenario() {
        // A(2, 6) on a [2,3,2] array: last component folds the [3,2] tail,
        // landing on the final element (dim1=3, dim2=2).
        let dims = vec![2, 3, 2];
        let comps = vec![IndexComponent::Scalar(2), IndexComponent::Scalar(6)];
        let maxi = get_max_indices(&comps, &dims).unwrap();
        assert_eq!(maxi, vec![2, 3, 2]);
        assert!(bounds_check_nd(&maxi, &dims).is_ok());
    }

    #[test]
    fn bounds_check_rejects_overflow() {
        let err = bounds_check_nd(&[5], &[3]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IndexOutOfRange);
    }

    #[test]
    fn expanded_dims_is_elementwise_max() {
        assert_eq!(expanded_dims(&[2, 2], &[1, 5]), vec![2, 5]);
    }
}
