//! Integer-sequence operators.
//!
//! Each operator maps a finite term series to a new one, or to `None` when
//! the result is undefined for the input (too short, non-integral division,
//! malformed run-length data). Everything runs in arbitrary precision so a
//! chain never fails on magnitude alone.

use std::fmt;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::invariants::gcd_of_terms;

/// Cap on the expansion produced by `rle_decode`.
const RLE_DECODE_MAX_TERMS: usize = 256;
/// Largest single run accepted by `rle_decode`.
const RLE_DECODE_MAX_RUN: i64 = 64;
/// Exponent clamp for `exp`.
const EXP_CLAMP: u32 = 64;

/// A single operator instance with its parameters bound.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Op {
    Scale(i64),
    Affine(i64, i64),
    ShiftForward(usize),
    ShiftBack(usize),
    Diff,
    Diff2,
    PartialSum,
    Abs,
    GcdNorm,
    Decimate(usize),
    Reverse,
    EvenIndexed,
    OddIndexed,
    MovSum(usize),
    CumProd,
    Popcount,
    DigitSum(u32),
    Mod(i64),
    XorIndex,
    Rle,
    RleDecode,
    ConcatIndex(u32),
    Log(u32),
    Exp(u32),
    Binomial,
    Euler,
    Mobius,
}

impl Op {
    /// Stable operator name (no parameters).
    pub fn name(&self) -> &'static str {
        match self {
            Op::Scale(_) => "scale",
            Op::Affine(..) => "affine",
            Op::ShiftForward(_) => "shift_forward",
            Op::ShiftBack(_) => "shift_back",
            Op::Diff => "diff",
            Op::Diff2 => "diff2",
            Op::PartialSum => "partial_sum",
            Op::Abs => "abs",
            Op::GcdNorm => "gcd_norm",
            Op::Decimate(_) => "decimate",
            Op::Reverse => "reverse",
            Op::EvenIndexed => "even_indexed",
            Op::OddIndexed => "odd_indexed",
            Op::MovSum(_) => "movsum",
            Op::CumProd => "cumprod",
            Op::Popcount => "popcount",
            Op::DigitSum(_) => "digit_sum",
            Op::Mod(_) => "mod",
            Op::XorIndex => "xor_index",
            Op::Rle => "rle",
            Op::RleDecode => "rle_decode",
            Op::ConcatIndex(_) => "concat_index",
            Op::Log(_) => "log",
            Op::Exp(_) => "exp",
            Op::Binomial => "binomial",
            Op::Euler => "euler",
            Op::Mobius => "mobius",
        }
    }

    /// Bound parameters, for machine-readable chain descriptions.
    pub fn params(&self) -> Vec<i64> {
        match *self {
            Op::Scale(a) => vec![a],
            Op::Affine(a, b) => vec![a, b],
            Op::ShiftForward(k) | Op::ShiftBack(k) | Op::Decimate(k) | Op::MovSum(k) => {
                vec![k as i64]
            }
            Op::DigitSum(b) | Op::ConcatIndex(b) | Op::Log(b) | Op::Exp(b) => vec![b as i64],
            Op::Mod(m) => vec![m],
            _ => Vec::new(),
        }
    }

    /// Apply the operator; `None` means the chain containing it is dropped.
    pub fn apply(&self, terms: &[BigInt]) -> Option<Vec<BigInt>> {
        match *self {
            Op::Scale(a) => {
                let a = BigInt::from(a);
                Some(terms.iter().map(|t| t * &a).collect())
            }
            Op::Affine(a, b) => {
                let a = BigInt::from(a);
                let b = BigInt::from(b);
                Some(terms.iter().map(|t| t * &a + &b).collect())
            }
            Op::ShiftForward(k) => (terms.len() > k).then(|| terms[k..].to_vec()),
            Op::ShiftBack(k) => (terms.len() > k).then(|| terms[..terms.len() - k].to_vec()),
            Op::Diff => diff(terms),
            Op::Diff2 => diff(terms).as_deref().and_then(diff),
            Op::PartialSum => {
                let mut acc = BigInt::zero();
                Some(
                    terms
                        .iter()
                        .map(|t| {
                            acc += t;
                            acc.clone()
                        })
                        .collect(),
                )
            }
            Op::Abs => Some(terms.iter().map(|t| t.abs()).collect()),
            Op::GcdNorm => {
                let g = gcd_of_terms(terms);
                if g <= BigInt::one() {
                    Some(terms.to_vec())
                } else {
                    Some(terms.iter().map(|t| t / &g).collect())
                }
            }
            Op::Decimate(k) => {
                if k == 0 {
                    return None;
                }
                Some(terms.iter().step_by(k).cloned().collect())
            }
            Op::Reverse => Some(terms.iter().rev().cloned().collect()),
            Op::EvenIndexed => Some(terms.iter().step_by(2).cloned().collect()),
            Op::OddIndexed => Some(terms.iter().skip(1).step_by(2).cloned().collect()),
            Op::MovSum(k) => {
                if k == 0 || terms.len() < k {
                    return None;
                }
                Some(
                    terms
                        .windows(k)
                        .map(|w| w.iter().sum::<BigInt>())
                        .collect(),
                )
            }
            Op::CumProd => {
                let mut acc = BigInt::one();
                Some(
                    terms
                        .iter()
                        .map(|t| {
                            acc *= t;
                            acc.clone()
                        })
                        .collect(),
                )
            }
            Op::Popcount => Some(
                terms
                    .iter()
                    .map(|t| BigInt::from(t.magnitude().count_ones()))
                    .collect(),
            ),
            Op::DigitSum(base) => {
                if base < 2 {
                    return None;
                }
                Some(
                    terms
                        .iter()
                        .map(|t| {
                            let sum: u64 = t
                                .magnitude()
                                .to_radix_be(base)
                                .iter()
                                .map(|&d| d as u64)
                                .sum();
                            BigInt::from(sum)
                        })
                        .collect(),
                )
            }
            Op::Mod(m) => {
                if m < 2 {
                    return None;
                }
                let m = BigInt::from(m);
                Some(terms.iter().map(|t| t.mod_floor(&m)).collect())
            }
            Op::XorIndex => Some(
                terms
                    .iter()
                    .enumerate()
                    .map(|(i, t)| t ^ BigInt::from(i))
                    .collect(),
            ),
            Op::Rle => Some(rle_encode(terms)),
            Op::RleDecode => rle_decode(terms),
            Op::ConcatIndex(base) => concat_index(terms, base),
            Op::Log(base) => {
                if base < 2 {
                    return None;
                }
                Some(terms.iter().map(|t| int_log(t, base)).collect())
            }
            Op::Exp(base) => {
                if base < 2 {
                    return None;
                }
                Some(terms.iter().map(|t| int_exp(t, base)).collect())
            }
            Op::Binomial => Some(binomial_transform(terms)),
            Op::Euler => euler_transform(terms),
            Op::Mobius => Some(mobius_transform(terms)),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self.params();
        if params.is_empty() {
            f.write_str(self.name())
        } else {
            let rendered = params
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(",");
            write!(f, "{}({})", self.name(), rendered)
        }
    }
}

fn diff(terms: &[BigInt]) -> Option<Vec<BigInt>> {
    (terms.len() >= 2).then(|| terms.windows(2).map(|w| &w[1] - &w[0]).collect())
}

/// Run-length encode as (value, run-length) pairs.
fn rle_encode(terms: &[BigInt]) -> Vec<BigInt> {
    let mut out = Vec::new();
    let mut iter = terms.iter();
    let Some(first) = iter.next() else {
        return out;
    };
    let mut current = first;
    let mut run = 1i64;
    for t in iter {
        if t == current {
            run += 1;
        } else {
            out.push(current.clone());
            out.push(BigInt::from(run));
            current = t;
            run = 1;
        }
    }
    out.push(current.clone());
    out.push(BigInt::from(run));
    out
}

/// Inverse of [`rle_encode`]: expand (value, run-length) pairs, rejecting
/// malformed or explosive inputs.
fn rle_decode(terms: &[BigInt]) -> Option<Vec<BigInt>> {
    if terms.len() % 2 != 0 {
        return None;
    }
    let mut out = Vec::new();
    for pair in terms.chunks(2) {
        let run = pair[1].to_i64()?;
        if run < 1 || run > RLE_DECODE_MAX_RUN {
            return None;
        }
        for _ in 0..run {
            out.push(pair[0].clone());
            if out.len() > RLE_DECODE_MAX_TERMS {
                return None;
            }
        }
    }
    Some(out)
}

fn concat_index(terms: &[BigInt], base: u32) -> Option<Vec<BigInt>> {
    if base < 2 {
        return None;
    }
    let big_base = BigInt::from(base);
    Some(
        terms
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let mut width = 1u32;
                let mut rest = i / base as usize;
                while rest > 0 {
                    width += 1;
                    rest /= base as usize;
                }
                let shifted = t.abs() * num_traits::pow(big_base.clone(), width as usize)
                    + BigInt::from(i);
                if t.is_negative() {
                    -shifted
                } else {
                    shifted
                }
            })
            .collect(),
    )
}

/// Floor of log_base |t|, clamped to zero for |t| <= 1.
fn int_log(t: &BigInt, base: u32) -> BigInt {
    let mut mag = t.abs();
    let base = BigInt::from(base);
    let mut log = 0u32;
    while mag >= base {
        mag /= &base;
        log += 1;
    }
    BigInt::from(log)
}

/// base^t with the exponent clamped into [0, EXP_CLAMP].
fn int_exp(t: &BigInt, base: u32) -> BigInt {
    let exp = t.to_u32().map(|e| e.min(EXP_CLAMP)).unwrap_or({
        if t.is_negative() {
            0
        } else {
            EXP_CLAMP
        }
    });
    num_traits::pow(BigInt::from(base), exp as usize)
}

/// Binomial transform: b_n = sum_k C(n,k) a_k.
fn binomial_transform(terms: &[BigInt]) -> Vec<BigInt> {
    let n = terms.len();
    let mut out = Vec::with_capacity(n);
    let mut row: Vec<BigInt> = vec![BigInt::one()];
    for i in 0..n {
        if i > 0 {
            // Next Pascal row from the previous one.
            let mut next = Vec::with_capacity(i + 1);
            next.push(BigInt::one());
            for j in 1..i {
                next.push(&row[j - 1] + &row[j]);
            }
            next.push(BigInt::one());
            row = next;
        }
        let b: BigInt = row.iter().zip(&terms[..=i]).map(|(c, a)| c * a).sum();
        out.push(b);
    }
    out
}

/// Euler transform (1-indexed): c_n = sum_{d|n} d*a_d, then
/// n*b_n = c_n + sum_{k=1}^{n-1} c_k b_{n-k}.
///
/// Integral for genuine Euler transforms; a non-exact division means the
/// input is not in the transform's image and the chain is dropped.
fn euler_transform(terms: &[BigInt]) -> Option<Vec<BigInt>> {
    let n = terms.len();
    let a = |i: usize| &terms[i - 1];
    let mut c = vec![BigInt::zero()];
    for m in 1..=n {
        let mut cm = BigInt::zero();
        for d in 1..=m {
            if m % d == 0 {
                cm += BigInt::from(d) * a(d);
            }
        }
        c.push(cm);
    }
    let mut b = vec![BigInt::zero(); n + 1];
    for m in 1..=n {
        let mut acc = c[m].clone();
        for k in 1..m {
            acc += &c[k] * &b[m - k];
        }
        let m_big = BigInt::from(m);
        let (q, r) = acc.div_rem(&m_big);
        if !r.is_zero() {
            return None;
        }
        b[m] = q;
    }
    Some(b[1..].to_vec())
}

/// Mobius transform (1-indexed): b_n = sum_{d|n} mu(n/d) a_d.
fn mobius_transform(terms: &[BigInt]) -> Vec<BigInt> {
    let n = terms.len();
    let a = |i: usize| &terms[i - 1];
    (1..=n)
        .map(|m| {
            let mut bm = BigInt::zero();
            for d in 1..=m {
                if m % d == 0 {
                    bm += BigInt::from(moebius(m / d)) * a(d);
                }
            }
            bm
        })
        .collect()
}

/// Moebius mu for the small arguments chain enumeration produces.
fn moebius(mut n: usize) -> i64 {
    if n == 1 {
        return 1;
    }
    let mut factors = 0;
    let mut p = 2;
    while p * p <= n {
        if n % p == 0 {
            n /= p;
            if n % p == 0 {
                return 0;
            }
            factors += 1;
        }
        p += 1;
    }
    if n > 1 {
        factors += 1;
    }
    if factors % 2 == 0 {
        1
    } else {
        -1
    }
}
