//! Element-kind promotion, scalar access/conversion, element-wise kernels
//! (§4.1.8, §4.1.9), concatenation (§4.1.7) and reductions (§4.1.11).

use crate::error::{ErrorKind, Result, Traced};
use crate::value::{Complex, ElementKind, Value};

use super::{canonical_dims, strides, ArrayBody, ArrayData, ArrayRef};

/// A single element, detached from any buffer, used as the pivot type for
/// cross-kind conversion and scalar broadcasting.
#[derive(Debug, Clone)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(Complex),
    Char(char),
    Cell(Value),
}

impl Scalar {
    pub fn kind(&self) -> ElementKind {
        match self {
            Scalar::Bool(_) => ElementKind::Bool,
            Scalar::Int(_) => ElementKind::Int,
            Scalar::Float(_) => ElementKind::Float,
            Scalar::Complex(_) => ElementKind::Complex,
            Scalar::Char(_) => ElementKind::Char,
            Scalar::Cell(_) => ElementKind::Cell,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Scalar::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Scalar::Int(i) => *i as f64,
            Scalar::Float(f) => *f,
            Scalar::Complex(c) => c.re,
            Scalar::Char(c) => *c as u32 as f64,
            Scalar::Cell(_) => 0.0,
        }
    }

    pub fn as_complex(&self) -> Complex {
        match self {
            Scalar::Complex(c) => *c,
            other => Complex::from_real(other.as_f64()),
        }
    }

    pub fn is_nonzero(&self) -> bool {
        match self {
            Scalar::Bool(b) => *b,
            Scalar::Int(i) => *i != 0,
            Scalar::Float(f) => *f != 0.0,
            Scalar::Complex(c) => c.is_nonzero(),
            Scalar::Char(c) => *c != '\0',
            Scalar::Cell(v) => v.is_truthy(),
        }
    }

    /// Converts into the given kind, per the promotion lattice. `Cell`
    /// conversion to/from numeric kinds is refused by the caller before
    /// this is reached (see `promote_in_place`).
    pub fn to_kind(&self, kind: ElementKind) -> Scalar {
        if self.kind() == kind {
            return self.clone();
        }
        match kind {
            ElementKind::Bool => Scalar::Bool(self.is_nonzero()),
            ElementKind::Int => Scalar::Int(self.as_f64() as i64),
            ElementKind::Float => Scalar::Float(self.as_f64()),
            ElementKind::Complex => Scalar::Complex(self.as_complex()),
            ElementKind::Char => Scalar::Char(char::from_u32(self.as_f64() as u32).unwrap_or('\0')),
            ElementKind::Cell => Scalar::Cell(scalar_to_value(self)),
        }
    }
}

fn scalar_to_value(s: &Scalar) -> Value {
    match s {
        Scalar::Cell(v) => v.clone(),
        Scalar::Bool(b) => Value::scalar_bool(*b),
        Scalar::Int(i) => Value::scalar_int(*i),
        Scalar::Float(f) => Value::scalar_float(*f),
        Scalar::Complex(c) => Value::Array(ArrayBody::scalar_complex(*c)),
        Scalar::Char(c) => Value::Array(ArrayBody::from_str(&c.to_string())),
    }
}

impl ArrayData {
    pub fn get_scalar(&self, i: usize) -> Scalar {
        match self {
            ArrayData::Int(v) => Scalar::Int(v[i]),
            ArrayData::Float(v) => Scalar::Float(v[i]),
            ArrayData::Complex(v) => Scalar::Complex(v[i]),
            ArrayData::Bool(v) => Scalar::Bool(v[i]),
            ArrayData::Char(v) => Scalar::Char(v[i]),
            ArrayData::Cell(v) => Scalar::Cell(v[i].clone()),
        }
    }

    pub fn set_scalar(&mut self, i: usize, value: Scalar) {
        let converted = value.to_kind(self.kind());
        match (self, converted) {
            (ArrayData::Int(v), Scalar::Int(x)) => v[i] = x,
            (ArrayData::Float(v), Scalar::Float(x)) => v[i] = x,
            (ArrayData::Complex(v), Scalar::Complex(x)) => v[i] = x,
            (ArrayData::Bool(v), Scalar::Bool(x)) => v[i] = x,
            (ArrayData::Char(v), Scalar::Char(x)) => v[i] = x,
            (ArrayData::Cell(v), Scalar::Cell(x)) => v[i] = x,
            _ => unreachable!("to_kind guarantees matching variant"),
        }
    }
}

/// Promotes `body` in place to `kind` (must be `>=` its current kind in the
/// lattice); a no-op if already at `kind`.
pub fn promote_in_place(body: &mut ArrayBody, kind: ElementKind) -> Result<()> {
    if body.kind() == kind {
        return Ok(());
    }
    if body.kind().join(kind) != Some(kind) {
        return Err(Traced::new(
            ErrorKind::KindConversionRefused,
            format!("cannot promote {:?} to {:?}", body.kind(), kind),
        ));
    }
    let n = body.data.len();
    let mut new_data = ArrayData::zero_of_kind(kind, n);
    for i in 0..n {
        new_data.set_scalar(i, body.data.get_scalar(i));
    }
    body.data = new_data;
    Ok(())
}

fn joined_kind(a: ElementKind, b: ElementKind) -> Result<ElementKind> {
    a.join(b)
        .ok_or_else(|| Traced::new(ErrorKind::KindConversionRefused, format!("cannot combine {a:?} and {b:?}")))
}

/// Binary element-wise operator tag (`+ − .* ./ .^ mod == != < <= > >= & |`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    fn is_comparison(self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge)
    }

    fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}

fn apply_scalar(op: BinOp, a: &Scalar, b: &Scalar, work_kind: ElementKind) -> Scalar {
    if op.is_comparison() {
        let ord = if work_kind == ElementKind::Complex {
            a.as_complex().lex_cmp(b.as_complex())
        } else {
            a.as_f64().partial_cmp(&b.as_f64()).unwrap_or(std::cmp::Ordering::Equal)
        };
        let result = match op {
            BinOp::Eq => ord == std::cmp::Ordering::Equal,
            BinOp::Ne => ord != std::cmp::Ordering::Equal,
            BinOp::Lt => ord == std::cmp::Ordering::Less,
            BinOp::Le => ord != std::cmp::Ordering::Greater,
            BinOp::Gt => ord == std::cmp::Ordering::Greater,
            BinOp::Ge => ord != std::cmp::Ordering::Less,
            _ => unreachable!(),
        };
        return Scalar::Bool(result);
    }
    if op.is_logical() {
        let result = match op {
            BinOp::And => a.is_nonzero() && b.is_nonzero(),
            BinOp::Or => a.is_nonzero() || b.is_nonzero(),
            _ => unreachable!(),
        };
        return Scalar::Bool(result);
    }
    if work_kind == ElementKind::Complex {
        let (x, y) = (a.as_complex(), b.as_complex());
        let r = match op {
            BinOp::Add => x.add(y),
            BinOp::Sub => x.sub(y),
            BinOp::Mul => x.mul(y),
            BinOp::Div => x.div(y),
            BinOp::Pow => Complex::from_real(x.re.powf(y.re)), // real-exponent fast path
            BinOp::Mod => Complex::from_real(x.re.rem_euclid(y.re)),
            _ => unreachable!(),
        };
        Scalar::Complex(r)
    } else {
        let (x, y) = (a.as_f64(), b.as_f64());
        let r = match op {
            BinOp::Add => x + y,
            BinOp::Sub => x - y,
            BinOp::Mul => x * y,
            BinOp::Div => x / y,
            BinOp::Pow => x.powf(y),
            BinOp::Mod => x.rem_euclid(y),
            _ => unreachable!(),
        };
        if work_kind == ElementKind::Int {
            Scalar::Int(r as i64)
        } else {
            Scalar::Float(r)
        }
    }
}

/// Element-wise binary op with scalar broadcasting (§4.1.9).
pub fn elementwise(op: BinOp, a: &ArrayBody, b: &ArrayBody) -> Result<ArrayRef> {
    let a_scalar = a.is_scalar();
    let b_scalar = b.is_scalar();
    if !a_scalar && !b_scalar && a.dims != b.dims {
        return Err(Traced::new(ErrorKind::ShapeMismatch, format!("{:?} vs {:?}", a.dims, b.dims)));
    }

    let input_kind = joined_kind(a.kind(), b.kind())?;
    let result_kind = if op.is_comparison() || op.is_logical() { ElementKind::Bool } else { input_kind };

    let out_dims = if a_scalar { b.dims.clone() } else { a.dims.clone() };
    let n: usize = out_dims.iter().product();
    let mut out = ArrayData::zero_of_kind(result_kind, n);

    for i in 0..n {
        let ai = if a_scalar { 0 } else { i };
        let bi = if b_scalar { 0 } else { i };
        let av = a.data.get_scalar(ai).to_kind(input_kind);
        let bv = b.data.get_scalar(bi).to_kind(input_kind);
        out.set_scalar(i, apply_scalar(op, &av, &bv, input_kind));
    }

    Ok(ArrayBody::new(out_dims, out))
}

/// §4.1.7 — concatenation of `a` and `b` along `dim` (0-based).
pub fn concat(a: &ArrayBody, b: &ArrayBody, dim: usize) -> Result<ArrayRef> {
    if a.is_empty() {
        return Ok(ArrayBody::new(b.dims.clone(), b.data.clone()));
    }
    if b.is_empty() {
        return Ok(ArrayBody::new(a.dims.clone(), a.data.clone()));
    }

    let rank = a.dims.len().max(b.dims.len()).max(dim + 1);
    let dims_a = pad_dims(&a.dims, rank);
    let dims_b = pad_dims(&b.dims, rank);
    for i in 0..rank {
        if i != dim && dims_a[i] != dims_b[i] {
            return Err(Traced::new(ErrorKind::ShapeMismatch, format!("dimension {i} differs: {} vs {}", dims_a[i], dims_b[i])));
        }
    }

    let kind = joined_kind(a.kind(), b.kind())?;
    let mut out_dims = dims_a.clone();
    out_dims[dim] = dims_a[dim] + dims_b[dim];
    let out_dims = canonical_dims(out_dims);
    let n: usize = out_dims.iter().product();
    let mut out = ArrayData::zero_of_kind(kind, n);

    let out_strides = strides(&out_dims);
    copy_block(a, &out_strides, &out_dims, 0, dim, &mut out, kind);
    copy_block(b, &out_strides, &out_dims, dims_a[dim], dim, &mut out, kind);

    Ok(ArrayBody::new(out_dims, out))
}

fn pad_dims(dims: &[usize], rank: usize) -> Vec<usize> {
    let mut v = dims.to_vec();
    while v.len() < rank {
        v.push(1);
    }
    v
}

fn copy_block(src: &ArrayBody, out_strides: &[usize], out_dims: &[usize], dim_offset: usize, dim: usize, out: &mut ArrayData, kind: ElementKind) {
    let src_dims = pad_dims(&src.dims, out_dims.len());
    let src_strides = strides(&src_dims);
    let n: usize = src_dims.iter().product();
    for linear in 0..n {
        let mut remaining = linear;
        let mut out_offset = 0usize;
        for (i, &s) in src_strides.iter().enumerate() {
            let idx = (remaining / s) % src_dims[i];
            remaining -= idx * s;
            let out_idx = if i == dim { idx + dim_offset } else { idx };
            out_offset += out_idx * out_strides[i];
        }
        out.set_scalar(out_offset, src.data.get_scalar(linear).to_kind(kind));
    }
}

/// First non-singleton dimension (0-based), defaulting to 0 if all are 1.
pub fn default_reduction_dim(dims: &[usize]) -> usize {
    dims.iter().position(|&d| d != 1).unwrap_or(0)
}

/// Reduction kind for `sum`/`any`/`all`/`max`/`min`, with per-kind identity
/// on an empty operating dimension.
#[derive(Debug, Clone, Copy)]
pub enum ReduceOp {
    Sum,
    Any,
    All,
    Max,
    Min,
}

pub fn reduce(op: ReduceOp, a: &ArrayBody, dim: usize) -> Result<ArrayRef> {
    let dims = a.dims.clone();
    let dim_size = dims.get(dim).copied().unwrap_or(1);
    let mut out_dims = dims.clone();
    if dim < out_dims.len() {
        out_dims[dim] = 1;
    }
    let out_dims = canonical_dims(out_dims);
    let out_n: usize = out_dims.iter().product();

    let result_kind = match op {
        ReduceOp::Any | ReduceOp::All => ElementKind::Bool,
        _ => a.kind(),
    };
    let mut out = ArrayData::zero_of_kind(result_kind, out_n);
    let strides_in = strides(&dims);
    let out_strides = strides(&out_dims);

    for out_linear in 0..out_n {
        let mut remaining = out_linear;
        let mut base = vec![0usize; dims.len()];
        for (i, &s) in out_strides.iter().enumerate() {
            base[i] = (remaining / s) % out_dims[i];
            remaining -= base[i] * s;
        }

        let mut acc = identity_scalar(op, result_kind);
        if dim_size == 0 {
            out.set_scalar(out_linear, acc);
            continue;
        }
        let mut first = true;
        for j in 0..dim_size {
            let mut idx = base.clone();
            if dim < idx.len() {
                idx[dim] = j;
            }
            let mut src_linear = 0usize;
            for (i, &s) in strides_in.iter().enumerate() {
                src_linear += idx.get(i).copied().unwrap_or(0) * s;
            }
            let v = a.data.get_scalar(src_linear);
            acc = if first { v.to_kind(result_kind) } else { fold(op, &acc, &v.to_kind(result_kind)) };
            first = false;
        }
        out.set_scalar(out_linear, acc);
    }

    Ok(ArrayBody::new(out_dims, out))
}

fn identity_scalar(op: ReduceOp, kind: ElementKind) -> Scalar {
    match op {
        ReduceOp::Sum => Scalar::Float(0.0).to_kind(kind),
        ReduceOp::Any => Scalar::Bool(false),
        ReduceOp::All => Scalar::Bool(true),
        ReduceOp::Min => Scalar::Float(f64::INFINITY).to_kind(kind),
        ReduceOp::Max => Scalar::Float(f64::NEG_INFINITY).to_kind(kind),
    }
}

fn fold(op: ReduceOp, acc: &Scalar, v: &Scalar) -> Scalar {
    match op {
        ReduceOp::Sum => apply_scalar(BinOp::Add, acc, v, acc.kind()),
        ReduceOp::Any => Scalar::Bool(acc.is_nonzero() || v.is_nonzero()),
        ReduceOp::All => Scalar::Bool(acc.is_nonzero() && v.is_nonzero()),
        ReduceOp::Max => {
            if v.as_f64() > acc.as_f64() {
                v.clone()
            } else {
                acc.clone()
            }
        }
        ReduceOp::Min => {
            if v.as_f64() < acc.as_f64() {
                v.clone()
            } else {
                acc.clone()
            }
        }
    }
}
