//! Slice read/write over an index-component list (§4.1.5, §4.1.6).
//!
//! Grounded algorithmically in the teacher's `vm/exec/array_index_slice.rs`
//! (nested nested-loop nested slicing over resolved dimension indices),
//! adapted to this spec's index-component kinds and linear-tail folding.

use crate::error::{ErrorKind, Result, Traced};

use super::index::{bounds_check_nd, expand, expanded_dims, get_max_indices, valid_indices, IndexComponent};
use super::ops::promote_in_place;
use super::{canonical_dims, strides, ArrayBody, ArrayData, ArrayRef};

/// 0-based positions selected by one component, given the size of the
/// (possibly flattened-tail) span it indexes.
fn component_positions(c: &IndexComponent, size: usize) -> Vec<usize> {
    match c {
        IndexComponent::Numeric(v) => v.iter().map(|&x| (x - 1) as usize).collect(),
        IndexComponent::Scalar(i) => vec![(*i - 1) as usize],
        IndexComponent::Mask(v) => v.iter().enumerate().filter(|(_, &b)| b).map(|(i, _)| i).collect(),
        IndexComponent::Range { is_full: true, .. } => (0..size).collect(),
        IndexComponent::Range { start, step, end, .. } => {
            let mut out = Vec::new();
            let mut x = *start;
            const EPS: f64 = 1e-5;
            if *step > 0.0 {
                while x <= *end + EPS {
                    out.push((x - 1.0).round() as usize);
                    x += step;
                }
            } else if *step < 0.0 {
                while x >= *end - EPS {
                    out.push((x - 1.0).round() as usize);
                    x += step;
                }
            }
            out
        }
    }
}

/// Resolves an index-component list against `dims` into a flat list of
/// 0-based source offsets (in output column-major order) plus the output
/// shape, applying linear-tail folding when fewer components than
/// dimensions are given.
fn resolve_offsets(components: &[IndexComponent], dims: &[usize], source_is_row: bool) -> (Vec<usize>, Vec<usize>) {
    let n = components.len();
    let k = dims.len();
    let strides_in = strides(dims);

    if n >= k {
        let per_dim: Vec<Vec<usize>> = (0..k)
            .map(|i| component_positions(&components[i], dims.get(i).copied().unwrap_or(1)))
            .collect();
        let out_shape: Vec<usize> = per_dim.iter().map(|p| p.len()).collect();
        let total: usize = out_shape.iter().product();
        let mut offsets = Vec::with_capacity(total);
        let mut counters = vec![0usize; k];
        for _ in 0..total {
            let mut off = 0usize;
            for i in 0..k {
                off += per_dim[i].get(counters[i]).copied().unwrap_or(0) * strides_in[i];
            }
            offsets.push(off);
            for i in 0..k {
                counters[i] += 1;
                if counters[i] < out_shape[i].max(1) {
                    break;
                }
                counters[i] = 0;
            }
        }
        (offsets, canonical_dims(out_shape))
    } else if n == 0 {
        // `A()` selects everything, preserving shape.
        ((0..dims.iter().product()).collect(), dims.to_vec())
    } else {
        let leading: Vec<Vec<usize>> = (0..n - 1).map(|i| component_positions(&components[i], dims[i])).collect();
        let tail_dims = &dims[n - 1..];
        let tail_size: usize = tail_dims.iter().product();
        let tail_positions = component_positions(&components[n - 1], tail_size);

        let leading_shape: Vec<usize> = leading.iter().map(|p| p.len()).collect();
        let total: usize = leading_shape.iter().product::<usize>().max(1) * tail_positions.len();
        let mut offsets = Vec::with_capacity(total);
        let mut counters = vec![0usize; n - 1];
        let outer_total: usize = leading_shape.iter().product::<usize>().max(1);
        for _ in 0..outer_total.max(1) {
            let mut base = 0usize;
            for i in 0..n - 1 {
                base += leading[i].get(counters[i]).copied().unwrap_or(0) * strides_in[i];
            }
            for &t in &tail_positions {
                offsets.push(base + t * strides_in[n - 1]);
            }
            for i in 0..n.saturating_sub(1) {
                counters[i] += 1;
                if counters[i] < leading_shape[i].max(1) {
                    break;
                }
                counters[i] = 0;
            }
        }

        // §4.1.5 orientation rule applies to pure linear indexing (n == 1):
        // row-vector source yields a row-vector result, else a column.
        let out_shape = if n == 1 {
            if source_is_row {
                vec![1, tail_positions.len()]
            } else {
                vec![tail_positions.len(), 1]
            }
        } else {
            let mut s = leading_shape;
            s.push(tail_positions.len());
            canonical_dims(s)
        };
        (offsets, out_shape)
    }
}

/// §4.1.5 read.
pub fn read_slice(body: &ArrayBody, components: &[IndexComponent]) -> Result<ArrayRef> {
    valid_indices(components)?;
    let max_indices = get_max_indices(components, &body.dims)?;
    bounds_check_nd(&max_indices, &body.dims)?;

    let (offsets, out_shape) = resolve_offsets(components, &body.dims, body.is_row_vector());
    let mut out = ArrayData::zero_of_kind(body.kind(), offsets.len());
    for (i, &off) in offsets.iter().enumerate() {
        out.set_scalar(i, body.data.get_scalar(off));
    }
    Ok(ArrayBody::new(out_shape, out))
}

/// §4.1.6 write: expands on out-of-bounds, promotes kind if the source
/// dominates, replicates a scalar source against a non-scalar destination
/// shape.
pub fn write_slice(body: &mut ArrayBody, components: &[IndexComponent], value: &ArrayBody) -> Result<()> {
    valid_indices(components)?;
    let max_indices = get_max_indices(components, &body.dims)?;
    if bounds_check_nd(&max_indices, &body.dims).is_err() {
        let new_dims = expanded_dims(&body.dims, &max_indices);
        expand(body, new_dims);
    }

    if let Some(joined) = body.kind().join(value.kind()) {
        if joined != body.kind() {
            promote_in_place(body, joined)?;
        }
    } else {
        return Err(Traced::new(
            ErrorKind::KindConversionRefused,
            format!("cannot assign {:?} into {:?}", value.kind(), body.kind()),
        ));
    }

    let (offsets, out_shape) = resolve_offsets(components, &body.dims, body.is_row_vector());

    if value.numel() == 1 && offsets.len() != 1 {
        let v = value.data.get_scalar(0);
        for &off in &offsets {
            body.data.set_scalar(off, v.clone());
        }
        return Ok(());
    }

    if canonical_dims(out_shape.clone()) != canonical_dims(value.dims.clone()) && value.numel() != offsets.len() {
        return Err(Traced::new(
            ErrorKind::ShapeMismatch,
            format!("cannot assign shape {:?} into slice of shape {:?}", value.dims, out_shape),
        ));
    }

    for (i, &off) in offsets.iter().enumerate() {
        body.data.set_scalar(off, value.data.get_scalar(i));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_row(v: Vec<i64>) -> ArrayRef {
        let n = v.len();
        ArrayBody::new(vec![1, n], ArrayData::Int(v))
    }

    // ── scenario 1: auto-expand on write ──
    #[test]
    fn auto_expand_on_write() {
        let a = ArrayBody::empty_of_kind(super::super::super::ElementKind::Float);
        let mut body = a.borrow_mut();
        let value = ArrayBody::scalar_float(7.0);
        write_slice(&mut body, &[IndexComponent::Scalar(3)], &value.borrow()).unwrap();
        assert_eq!(body.dims, vec![1, 3]);
        match &body.data {
            ArrayData::Float(v) => assert_eq!(v, &vec![0.0, 0.0, 7.0]),
            _ => panic!("expected float data"),
        }
    }

    // ── scenario 2: linear tail extension ──
    #[test]
    fn linear_tail_extension_read() {
        // reshape(1:12, [2,3,2]) column-major: buffer is 1..=12 directly.
        // Row 2, tail-linear 6 folds the [3,2] tail onto its last element.
        let data: Vec<i64> = (1..=12).collect();
        let a = ArrayBody::new(vec![2, 3, 2], ArrayData::Int(data));
        let body = a.borrow();
        let result = read_slice(&body, &[IndexComponent::Scalar(2), IndexComponent::Scalar(6)]).unwrap();
        match &result.borrow().data {
            ArrayData::Int(v) => assert_eq!(v, &vec![12]),
            _ => panic!("expected int data"),
        };
    }

    #[test]
    fn round_trip_write_then_read() {
        let arr = int_row(vec![1, 2, 3, 4]);
        let mut body = arr.borrow_mut();
        let value = ArrayBody::scalar_int(99);
        write_slice(&mut body, &[IndexComponent::Scalar(2)], &value.borrow()).unwrap();
        let read_back = read_slice(&body, &[IndexComponent::Scalar(2)]).unwrap();
        match &read_back.borrow().data {
            ArrayData::Int(v) => assert_eq!(v[0], 99),
            _ => panic!("expected int data"),
        };
    }

    #[test]
    fn scalar_replication_on_write() {
        let arr = int_row(vec![1, 2, 3]);
        let mut body = arr.borrow_mut();
        let value = ArrayBody::scalar_int(0);
        write_slice(
            &mut body,
            &[IndexComponent::Range { start: 1.0, step: 1.0, end: 3.0, is_full: false }],
            &value.borrow(),
        )
        .unwrap();
        match &body.data {
            ArrayData::Int(v) => assert_eq!(v, &vec![0, 0, 0]),
            _ => panic!("expected int data"),
        }
    }
}
