//! Portable math for targets without an x87 unit.
//!
//! Trigonometry runs CORDIC in circular mode, logarithms and exponentials in
//! hyperbolic mode, all in `I4F28` fixed point. The `f64` wrappers at the
//! bottom do the range reduction and exponent bookkeeping around them.
//!
//! Results carry roughly 1e-7 absolute error, and that is what the exported
//! C `sin`, `cos`, `tan`, `pow` and `log10` deliver on non-x86 targets.

use core::f64::consts::{LN_2, LOG10_2, LOG2_E, TAU};

use fixed::types::extra::{IsLessOrEqual, True, U29, U30, U32, Unsigned};
use fixed::types::{I4F28, U0F32};
use fixed::FixedI32;

pub trait FixedCordic:
    Copy
    + PartialOrd
    + core::ops::AddAssign
    + core::ops::SubAssign
    + core::ops::Neg<Output = Self>
    + core::ops::Sub<Output = Self>
    + core::ops::Add<Output = Self>
    + core::ops::Shr<u8, Output = Self>
{
    const ZERO: Self;
    const ONE: Self;
    const FRAC_PI_2: Self;
    const PI: Self;

    const FRAC_BITS: u8;

    fn from_u0f32(val: U0F32) -> Self;
}

impl<Frac> FixedCordic for FixedI32<Frac>
where
    Frac: 'static
        + Unsigned
        + IsLessOrEqual<U32, Output = True>
        + IsLessOrEqual<U30, Output = True>
        + IsLessOrEqual<U29, Output = True>,
{
    const ZERO: Self = Self::ZERO;

    const ONE: Self = Self::ONE;

    const FRAC_PI_2: Self = Self::FRAC_PI_2;

    const PI: Self = Self::PI;

    const FRAC_BITS: u8 = Frac::U8;

    fn from_u0f32(val: U0F32) -> Self {
        Self::from_num(val)
    }
}

/// atan(2^-i) for i = 0..32.
const ATAN_TABLE: [u32; 32] = [
    0xC90F_DAA2, 0x76B1_9C16, 0x3EB6_EBF2, 0x1FD5_BA9B, 0x0FFA_ADDC, 0x07FF_556F, 0x03FF_EAAB, 0x01FF_FD55,
    0x00FF_FFAB, 0x007F_FFF5, 0x003F_FFFF, 0x0020_0000, 0x0010_0000, 0x0008_0000, 0x0004_0000, 0x0002_0000,
    0x0001_0000, 0x0000_8000, 0x0000_4000, 0x0000_2000, 0x0000_1000, 0x0000_0800, 0x0000_0400, 0x0000_0200,
    0x0000_0100, 0x0000_0080, 0x0000_0040, 0x0000_0020, 0x0000_0010, 0x0000_0008, 0x0000_0004, 0x0000_0002,
];

/// atanh(2^-i) for i = 1..=32.
const ATANH_TABLE: [u32; 32] = [
    0x8C9F_53D5, 0x4162_BBEA, 0x202B_1239, 0x1005_588B, 0x0800_AAC4, 0x0400_1556, 0x0200_02AB, 0x0100_0055,
    0x0080_000B, 0x0040_0001, 0x0020_0000, 0x0010_0000, 0x0008_0000, 0x0004_0000, 0x0002_0000, 0x0001_0000,
    0x0000_8000, 0x0000_4000, 0x0000_2000, 0x0000_1000, 0x0000_0800, 0x0000_0400, 0x0000_0200, 0x0000_0100,
    0x0000_0080, 0x0000_0040, 0x0000_0020, 0x0000_0010, 0x0000_0008, 0x0000_0004, 0x0000_0002, 0x0000_0001,
];

const INV_GAIN: U0F32 = U0F32::from_bits(0x9B74EDA8); // 0.607252935009
const HYP_GAIN_M1: U0F32 = U0F32::from_bits(0x351E8720); // 0.207497067763

#[inline]
fn cordic_circular<T: FixedCordic>(mut x: T, mut y: T, mut z: T, vecmode: T) -> (T, T, T) {
    let mut i = 0u8;

    while i < T::FRAC_BITS {
        let step = T::from_u0f32(U0F32::from_bits(ATAN_TABLE[i as usize]));
        if vecmode >= T::ZERO && y < vecmode || vecmode < T::ZERO && z >= T::ZERO {
            let x1 = x - (y >> i);
            y = y + (x >> i);
            x = x1;
            z = z - step;
        } else {
            let x1 = x + (y >> i);
            y = y - (x >> i);
            x = x1;
            z = z + step;
        }
        i += 1;
    }

    (x, y, z)
}

#[inline]
fn cordic_hyperbolic<T: FixedCordic>(mut x: T, mut y: T, mut z: T, vecmode: T) -> (T, T, T) {
    let mut i = 1u8;
    let mut repeat = 4u8;

    while i < T::FRAC_BITS {
        let step = T::from_u0f32(U0F32::from_bits(ATANH_TABLE[(i - 1) as usize]));

        // Steps 4, 13, 40, ... run twice or the rotation does not converge.
        let passes = if i == repeat {
            repeat = 3 * repeat + 1;
            2
        } else {
            1
        };

        for _ in 0..passes {
            if vecmode >= T::ZERO && y < vecmode || vecmode < T::ZERO && z >= T::ZERO {
                let x1 = x + (y >> i);
                y = y + (x >> i);
                x = x1;
                z = z - step;
            } else {
                let x1 = x - (y >> i);
                y = y - (x >> i);
                x = x1;
                z = z + step;
            }
        }

        i += 1;
    }

    (x, y, z)
}

#[inline]
fn sin_cos<T: FixedCordic>(mut angle: T) -> (T, T) {
    let mut negative = false;

    while angle > T::FRAC_PI_2 {
        angle -= T::PI;
        negative = !negative;
    }

    while angle < -T::FRAC_PI_2 {
        angle += T::PI;
        negative = !negative;
    }

    let res = cordic_circular(T::from_u0f32(INV_GAIN), T::ZERO, angle, -T::ONE);

    if negative {
        (-res.1, -res.0)
    } else {
        (res.1, res.0)
    }
}

pub trait FixedCordicMath: FixedCordic {
    fn sin_cos(self) -> (Self, Self) {
        sin_cos(self)
    }

    fn sin(self) -> Self {
        self.sin_cos().0
    }

    fn cos(self) -> Self {
        self.sin_cos().1
    }

    /// Natural logarithm of a mantissa in `[1, 2)`.
    fn ln_mantissa(self) -> Self {
        let z = cordic_hyperbolic(self + Self::ONE, self - Self::ONE, Self::ZERO, Self::ZERO).2;
        z + z
    }

    /// `e^self` for `|self| <= ln(2) / 2`.
    fn exp_reduced(self) -> Self {
        let gain = Self::ONE + Self::from_u0f32(HYP_GAIN_M1);
        let (x, y, _) = cordic_hyperbolic(gain, Self::ZERO, self, -Self::ONE);
        x + y
    }
}

impl<T: FixedCordic> FixedCordicMath for T {}

/// Beyond this magnitude the angle has no fractional turns left to reduce.
const REDUCTION_LIMIT: f64 = 9_223_372_036_854_775_808.0;

const MANTISSA_MASK: u64 = (1 << 52) - 1;
const EXPONENT_BIAS: i32 = 1023;

/// Splits a positive finite `x` into a mantissa in `[1, 2)` and a power of two.
fn split(x: f64) -> (f64, i32) {
    let mut bits = x.to_bits();
    let mut exponent = -EXPONENT_BIAS;

    if bits >> 52 == 0 {
        bits = (x * f64::from_bits(((EXPONENT_BIAS + 54) as u64) << 52)).to_bits();
        exponent -= 54;
    }

    exponent += (bits >> 52) as i32 & 0x7FF;
    let mantissa = f64::from_bits(bits & MANTISSA_MASK | (EXPONENT_BIAS as u64) << 52);
    (mantissa, exponent)
}

/// `x * 2^n`, stepping through the exponent range so intermediates stay finite.
fn scale(mut x: f64, mut n: i32) -> f64 {
    while n > EXPONENT_BIAS {
        x *= f64::from_bits(0x7FE << 52);
        n -= EXPONENT_BIAS;
    }
    while n < 1 - EXPONENT_BIAS {
        x *= f64::from_bits(1 << 52);
        n += EXPONENT_BIAS - 1;
    }
    x * f64::from_bits(((n + EXPONENT_BIAS) as u64) << 52)
}

fn nearest(t: f64) -> i64 {
    let whole = t as i64;
    let frac = t - whole as f64;
    if frac >= 0.5 {
        whole + 1
    } else if frac <= -0.5 {
        whole - 1
    } else {
        whole
    }
}

fn sin_cos_f64(x: f64) -> (f64, f64) {
    if !(x > -REDUCTION_LIMIT && x < REDUCTION_LIMIT) {
        return (f64::NAN, f64::NAN);
    }

    let turns = (x / TAU) as i64;
    let reduced = x - TAU * turns as f64;
    let (sin, cos) = I4F28::saturating_from_num(reduced).sin_cos();
    (sin.to_num(), cos.to_num())
}

pub fn sin(x: f64) -> f64 {
    sin_cos_f64(x).0
}

pub fn cos(x: f64) -> f64 {
    sin_cos_f64(x).1
}

pub fn tan(x: f64) -> f64 {
    let (sin, cos) = sin_cos_f64(x);
    sin / cos
}

pub fn log2(x: f64) -> f64 {
    if x.is_nan() || x < 0.0 {
        return f64::NAN;
    }
    if x == 0.0 {
        return f64::NEG_INFINITY;
    }
    if x == f64::INFINITY {
        return x;
    }

    let (mantissa, exponent) = split(x);
    if mantissa == 1.0 {
        return exponent as f64;
    }
    let ln = I4F28::from_num(mantissa).ln_mantissa().to_num::<f64>();
    exponent as f64 + ln * LOG2_E
}

pub fn exp2(t: f64) -> f64 {
    if t.is_nan() {
        return t;
    }
    if t >= 1024.0 {
        return f64::INFINITY;
    }
    if t < -1100.0 {
        return 0.0;
    }

    let whole = nearest(t);
    let frac = t - whole as f64;
    if frac == 0.0 {
        return scale(1.0, whole as i32);
    }
    let power = I4F28::from_num(frac * LN_2).exp_reduced().to_num::<f64>();
    scale(power, whole as i32)
}

pub fn pow(x: f64, y: f64) -> f64 {
    exp2(y * log2(x))
}

pub fn log10(x: f64) -> f64 {
    log2(x) * LOG10_2
}

/// Square root by Newton iteration on the mantissa.
pub fn sqrt(x: f64) -> f64 {
    if x.is_nan() || x < 0.0 {
        return f64::NAN;
    }
    if x == 0.0 || x == f64::INFINITY {
        return x;
    }

    let (mut mantissa, mut exponent) = split(x);
    if exponent % 2 != 0 {
        mantissa *= 2.0;
        exponent -= 1;
    }

    let mut root = 0.5 * (1.0 + mantissa);
    for _ in 0..6 {
        root = 0.5 * (root + mantissa / root);
    }
    scale(root, exponent / 2)
}
