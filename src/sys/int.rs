//! 64-bit integer helpers for targets whose registers are 32 bits wide.
//!
//! Every operation works on a [`Words`] pair the way the compiler's helper
//! calls see it (low word in EAX, high word in EDX), using only 32-bit
//! operations and the 64/32 hardware divide. None of them may lower back into
//! a 64-bit helper call, or the exported symbols would recurse into themselves.

use core::cmp::Ordering;

use const_default::ConstDefault;

/// A 64-bit value split into its two 32-bit halves.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ConstDefault)]
pub struct Words {
    pub lo: u32,
    pub hi: u32,
}

impl Words {
    #[inline]
    pub const fn new(lo: u32, hi: u32) -> Self {
        Self { lo, hi }
    }

    #[inline]
    pub const fn from_u64(value: u64) -> Self {
        Self::new(value as u32, (value >> 32) as u32)
    }

    #[inline]
    pub const fn from_i64(value: i64) -> Self {
        Self::from_u64(value as u64)
    }

    #[inline]
    pub const fn to_u64(self) -> u64 {
        (self.hi as u64) << 32 | self.lo as u64
    }

    #[inline]
    pub const fn to_i64(self) -> i64 {
        self.to_u64() as i64
    }

    #[inline]
    pub const fn is_negative(self) -> bool {
        (self.hi as i32) < 0
    }

    /// Two's complement negation; the borrow out of the low word feeds the high word.
    #[inline]
    pub const fn wrapping_neg(self) -> Self {
        let borrow = (self.lo != 0) as u32;
        Self::new(self.lo.wrapping_neg(), self.hi.wrapping_neg().wrapping_sub(borrow))
    }

    #[inline]
    pub const fn wrapping_sub(self, rhs: Self) -> Self {
        let (lo, borrow) = self.lo.overflowing_sub(rhs.lo);
        Self::new(lo, self.hi.wrapping_sub(rhs.hi).wrapping_sub(borrow as u32))
    }

    #[inline]
    const fn magnitude(self) -> Self {
        if self.is_negative() {
            self.wrapping_neg()
        } else {
            self
        }
    }
}

impl PartialOrd for Words {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Words {
    /// Unsigned comparison, high word first.
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.hi.cmp(&other.hi).then(self.lo.cmp(&other.lo))
    }
}

impl From<u64> for Words {
    #[inline]
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl From<i64> for Words {
    #[inline]
    fn from(value: i64) -> Self {
        Self::from_i64(value)
    }
}

impl From<Words> for u64 {
    #[inline]
    fn from(value: Words) -> Self {
        value.to_u64()
    }
}

impl From<Words> for i64 {
    #[inline]
    fn from(value: Words) -> Self {
        value.to_i64()
    }
}

/// Quotient and remainder of a division.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DivRem<T> {
    pub quotient: T,
    pub remainder: T,
}

/// 32x32 -> 64 multiply, a single `mul` on x86.
#[inline(always)]
const fn mul_wide(a: u32, b: u32) -> Words {
    Words::from_u64(a as u64 * b as u64)
}

/// Divides `hi:lo` by `divisor` with one hardware divide.
///
/// Requires `hi < divisor` so that the quotient fits in 32 bits.
#[inline(always)]
fn div_wide(hi: u32, lo: u32, divisor: u32) -> (u32, u32) {
    debug_assert!(hi < divisor);

    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        let (quotient, remainder): (u32, u32);
        unsafe {
            core::arch::asm!(
                "div {divisor:e}",
                divisor = in(reg) divisor,
                inout("eax") lo => quotient,
                inout("edx") hi => remainder,
                options(pure, nomem, nostack),
            );
        }
        (quotient, remainder)
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    {
        let dividend = Words::new(lo, hi).to_u64();
        let divisor = divisor as u64;
        ((dividend / divisor) as u32, (dividend % divisor) as u32)
    }
}

#[inline]
pub const fn shl_words(value: Words, amount: u32) -> Words {
    if amount >= 64 {
        Words::DEFAULT
    } else if amount >= 32 {
        Words::new(0, value.lo << (amount & 31))
    } else if amount == 0 {
        value
    } else {
        Words::new(value.lo << amount, value.hi << amount | value.lo >> (32 - amount))
    }
}

#[inline]
pub const fn lshr_words(value: Words, amount: u32) -> Words {
    if amount >= 64 {
        Words::DEFAULT
    } else if amount >= 32 {
        Words::new(value.hi >> (amount & 31), 0)
    } else if amount == 0 {
        value
    } else {
        Words::new(value.lo >> amount | value.hi << (32 - amount), value.hi >> amount)
    }
}

#[inline]
pub const fn ashr_words(value: Words, amount: u32) -> Words {
    let fill = ((value.hi as i32) >> 31) as u32;
    if amount >= 64 {
        Words::new(fill, fill)
    } else if amount >= 32 {
        Words::new(((value.hi as i32) >> (amount & 31)) as u32, fill)
    } else if amount == 0 {
        value
    } else {
        Words::new(
            value.lo >> amount | value.hi << (32 - amount),
            ((value.hi as i32) >> amount) as u32,
        )
    }
}

/// Low 64 bits of the product from three partial products; `a.hi * b.hi`
/// only contributes above bit 64 and is never formed.
#[inline]
pub const fn mul_words(a: Words, b: Words) -> Words {
    let cross = a.hi.wrapping_mul(b.lo).wrapping_add(a.lo.wrapping_mul(b.hi));
    let low = mul_wide(a.lo, b.lo);
    Words::new(low.lo, low.hi.wrapping_add(cross))
}

/// Unsigned long division. Returns `None` for a zero divisor.
pub fn udivmod_words(dividend: Words, divisor: Words) -> Option<DivRem<Words>> {
    if divisor.hi == 0 {
        if divisor.lo == 0 {
            return None;
        }
        let (q_hi, rem) = div_wide(0, dividend.hi, divisor.lo);
        let (q_lo, rem) = div_wide(rem, dividend.lo, divisor.lo);
        return Some(DivRem {
            quotient: Words::new(q_lo, q_hi),
            remainder: Words::new(rem, 0),
        });
    }

    // Scale both operands down until the divisor fits one word. The divisor
    // then has its top bit set, so the estimate is exact or one too large.
    let mut d = divisor;
    let mut n = dividend;
    while d.hi != 0 {
        d = lshr_words(d, 1);
        n = lshr_words(n, 1);
    }
    let (mut q, _) = div_wide(n.hi, n.lo, d.lo);

    let low = mul_wide(q, divisor.lo);
    let cross = mul_wide(q, divisor.hi);
    let (hi, carry) = low.hi.overflowing_add(cross.lo);
    if carry || cross.hi != 0 || Words::new(low.lo, hi) > dividend {
        q -= 1;
    }

    let product = mul_words(Words::new(q, 0), divisor);
    Some(DivRem {
        quotient: Words::new(q, 0),
        remainder: dividend.wrapping_sub(product),
    })
}

/// Signed division truncating toward zero. The remainder takes the sign of
/// the dividend. `i64::MIN / -1` wraps back to `i64::MIN`.
pub fn divmod_words(dividend: Words, divisor: Words) -> Option<DivRem<Words>> {
    let negative = dividend.is_negative() != divisor.is_negative();
    let DivRem { quotient, remainder } = udivmod_words(dividend.magnitude(), divisor.magnitude())?;

    Some(DivRem {
        quotient: if negative { quotient.wrapping_neg() } else { quotient },
        remainder: if dividend.is_negative() { remainder.wrapping_neg() } else { remainder },
    })
}

fn or_zero(result: Option<DivRem<Words>>) -> DivRem<Words> {
    result.unwrap_or_else(|| {
        crate::debugln!("64-bit division by zero");
        DivRem {
            quotient: Words::DEFAULT,
            remainder: Words::DEFAULT,
        }
    })
}

/// Signed division for the C helpers: a zero divisor gives a zero quotient
/// and remainder instead of trapping.
#[inline]
pub fn divmod_or_zero(dividend: Words, divisor: Words) -> DivRem<Words> {
    or_zero(divmod_words(dividend, divisor))
}

/// Unsigned counterpart of [`divmod_or_zero`].
#[inline]
pub fn udivmod_or_zero(dividend: Words, divisor: Words) -> DivRem<Words> {
    or_zero(udivmod_words(dividend, divisor))
}

/// Logical left shift. Amounts of 64 and above give 0.
#[inline]
pub fn shift_left(value: u64, amount: u32) -> u64 {
    shl_words(Words::from_u64(value), amount).to_u64()
}

/// Logical right shift. Amounts of 64 and above give 0.
#[inline]
pub fn shift_right_unsigned(value: u64, amount: u32) -> u64 {
    lshr_words(Words::from_u64(value), amount).to_u64()
}

/// Arithmetic right shift. Amounts of 64 and above leave only the sign.
#[inline]
pub fn shift_right_signed(value: i64, amount: u32) -> i64 {
    ashr_words(Words::from_i64(value), amount).to_i64()
}

/// Wrapping 64-bit multiply; identical for signed and unsigned operands.
#[inline]
pub fn multiply(a: u64, b: u64) -> u64 {
    mul_words(Words::from_u64(a), Words::from_u64(b)).to_u64()
}

#[inline]
pub fn divide(dividend: i64, divisor: i64) -> Option<DivRem<i64>> {
    let DivRem { quotient, remainder } = divmod_words(Words::from_i64(dividend), Words::from_i64(divisor))?;
    Some(DivRem {
        quotient: quotient.to_i64(),
        remainder: remainder.to_i64(),
    })
}

#[inline]
pub fn divide_unsigned(dividend: u64, divisor: u64) -> Option<DivRem<u64>> {
    let DivRem { quotient, remainder } = udivmod_words(Words::from_u64(dividend), Words::from_u64(divisor))?;
    Some(DivRem {
        quotient: quotient.to_u64(),
        remainder: remainder.to_u64(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const AMOUNTS: [u32; 9] = [0, 1, 31, 32, 33, 63, 64, 100, u32::MAX];

    const VALUES: [u64; 8] = [
        0,
        1,
        0x8000_0000,
        0xFFFF_FFFF,
        0x1_0000_0000,
        0x0123_4567_89AB_CDEF,
        0x8000_0000_0000_0000,
        u64::MAX,
    ];

    fn reference_shl(value: u64, amount: u32) -> u64 {
        if amount >= 64 {
            0
        } else {
            ((value as u128) << amount) as u64
        }
    }

    fn reference_lshr(value: u64, amount: u32) -> u64 {
        if amount >= 64 {
            0
        } else {
            ((value as u128) >> amount) as u64
        }
    }

    fn reference_ashr(value: i64, amount: u32) -> i64 {
        ((value as i128) >> amount.min(127)) as i64
    }

    fn reference_divide(dividend: i64, divisor: i64) -> (i64, i64) {
        let (n, d) = (dividend as i128, divisor as i128);
        ((n / d) as i64, (n % d) as i64)
    }

    #[test]
    fn words_layout_is_low_word_first() {
        let words = Words::from_u64(0x1122_3344_5566_7788);
        assert_eq!(words, Words::new(0x5566_7788, 0x1122_3344));
        assert_eq!(u64::from(words), 0x1122_3344_5566_7788);
        assert_eq!(Words::DEFAULT, Words::new(0, 0));
        assert_eq!(core::mem::size_of::<Words>(), 8);
    }

    #[test]
    fn words_compare_high_word_first() {
        assert!(Words::new(0, 1) > Words::new(u32::MAX, 0));
        assert!(Words::new(5, 7) < Words::new(6, 7));
        assert_eq!(Words::new(3, 3).cmp(&Words::new(3, 3)), Ordering::Equal);
    }

    #[test]
    fn words_negation_borrows_across_halves() {
        assert_eq!(Words::from_i64(1).wrapping_neg().to_i64(), -1);
        assert_eq!(Words::from_u64(0x1_0000_0000).wrapping_neg().to_i64(), -0x1_0000_0000);
        assert_eq!(Words::from_i64(i64::MIN).wrapping_neg().to_i64(), i64::MIN);
        assert_eq!(Words::DEFAULT.wrapping_neg(), Words::DEFAULT);
    }

    #[test]
    fn shifts_match_reference_at_boundaries() {
        for value in VALUES {
            for amount in AMOUNTS {
                assert_eq!(shift_left(value, amount), reference_shl(value, amount), "{value:#x} << {amount}");
                assert_eq!(
                    shift_right_unsigned(value, amount),
                    reference_lshr(value, amount),
                    "{value:#x} >> {amount}"
                );
                assert_eq!(
                    shift_right_signed(value as i64, amount),
                    reference_ashr(value as i64, amount),
                    "{value:#x} >>s {amount}"
                );
            }
        }
    }

    #[test]
    fn shift_into_the_other_word() {
        assert_eq!(shift_left(0xDEAD_BEEF, 32), 0xDEAD_BEEF_0000_0000);
        assert_eq!(shift_left(0xDEAD_BEEF, 36), 0xEADB_EEF0_0000_0000);
        assert_eq!(shift_right_unsigned(0xDEAD_BEEF_0000_0000, 32), 0xDEAD_BEEF);
        assert_eq!(shift_right_unsigned(0xDEAD_BEEF_0000_0000, 63), 1);
        assert_eq!(shift_right_signed(-2, 100), -1);
        assert_eq!(shift_right_signed(i64::MAX, 64), 0);
    }

    #[test]
    fn multiply_wraps_past_64_bits() {
        assert_eq!(multiply(u64::MAX, u64::MAX), 1);
        assert_eq!(multiply(0x1_0000_0000, 0x1_0000_0000), 0);
        assert_eq!(multiply(0xFFFF_FFFF, 0xFFFF_FFFF), 0xFFFF_FFFE_0000_0001);
        assert_eq!(multiply((-3i64) as u64, 7) as i64, -21);
    }

    #[test]
    fn divide_by_zero_is_none() {
        assert_eq!(divide(42, 0), None);
        assert_eq!(divide_unsigned(42, 0), None);
        assert_eq!(udivmod_words(Words::new(1, 1), Words::DEFAULT), None);
    }

    #[test]
    fn divide_handles_every_sign_combination() {
        let magnitudes = [1i64, 3, 7, 0xFFFF_FFFF, 0x1_0000_0001, 0x7FFF_FFFF_FFFF_FFFF];
        for &n in &magnitudes {
            for &d in &magnitudes {
                for (sn, sd) in [(1, 1), (1, -1), (-1, 1), (-1, -1)] {
                    let (dividend, divisor) = (n * sn, d * sd);
                    let expected = reference_divide(dividend, divisor);
                    let actual = divide(dividend, divisor).unwrap();
                    assert_eq!(
                        (actual.quotient, actual.remainder),
                        expected,
                        "{dividend} / {divisor}"
                    );
                }
            }
        }
    }

    #[test]
    fn divide_boundary_values() {
        assert_eq!(divide(i64::MIN, 1), Some(DivRem { quotient: i64::MIN, remainder: 0 }));
        assert_eq!(divide(i64::MIN, -1), Some(DivRem { quotient: i64::MIN, remainder: 0 }));
        assert_eq!(divide(i64::MIN, i64::MAX), Some(DivRem { quotient: -1, remainder: -1 }));
        assert_eq!(divide(i64::MAX, i64::MIN), Some(DivRem { quotient: 0, remainder: i64::MAX }));
        assert_eq!(divide(i64::MIN, i64::MIN), Some(DivRem { quotient: 1, remainder: 0 }));
        assert_eq!(divide(-7, 2), Some(DivRem { quotient: -3, remainder: -1 }));
        assert_eq!(divide(7, -2), Some(DivRem { quotient: -3, remainder: 1 }));
    }

    #[test]
    fn slow_path_corrects_overestimate() {
        // Divisors with a non-zero high word and a large low word make the
        // scaled estimate overshoot.
        let cases = [
            (u64::MAX, 0x1_FFFF_FFFF),
            (u64::MAX, 0x8000_0000_0000_0001),
            (0xFFFF_FFFF_0000_0000, 0x1_0000_0001),
            (0x8000_0000_0000_0000, 0x1_FFFF_FFFF),
            (0x1_0000_0000, 0x1_0000_0001),
        ];
        for (n, d) in cases {
            let actual = divide_unsigned(n, d).unwrap();
            assert_eq!((actual.quotient, actual.remainder), (n / d, n % d), "{n:#x} / {d:#x}");
        }
    }

    #[test]
    fn helper_division_by_zero_gives_zero() {
        let zero = DivRem { quotient: Words::DEFAULT, remainder: Words::DEFAULT };
        assert_eq!(divmod_or_zero(Words::from_i64(-42), Words::DEFAULT), zero);
        assert_eq!(divmod_or_zero(Words::from_i64(i64::MIN), Words::DEFAULT), zero);
        assert_eq!(udivmod_or_zero(Words::from_u64(u64::MAX), Words::DEFAULT), zero);
    }

    #[test]
    fn helper_division_matches_checked_division() {
        let wrapped = divmod_or_zero(Words::from_i64(i64::MIN), Words::from_i64(-1));
        assert_eq!(wrapped.quotient.to_i64(), i64::MIN);
        assert_eq!(wrapped.remainder.to_i64(), 0);

        let signed = divmod_or_zero(Words::from_i64(-7), Words::from_i64(2));
        assert_eq!((signed.quotient.to_i64(), signed.remainder.to_i64()), (-3, -1));

        let unsigned = udivmod_or_zero(Words::from_u64(u64::MAX), Words::from_u64(0x1_FFFF_FFFF));
        assert_eq!(unsigned.quotient.to_u64(), u64::MAX / 0x1_FFFF_FFFF);
        assert_eq!(unsigned.remainder.to_u64(), u64::MAX % 0x1_FFFF_FFFF);
    }

    mod proptests {
        use proptest::prelude::*;

        use super::super::*;
        use super::{reference_ashr, reference_divide, reference_lshr, reference_shl};

        fn operand() -> impl Strategy<Value = u64> {
            prop_oneof![
                any::<u64>(),
                any::<u32>().prop_map(u64::from),
                (0u64..=16).prop_map(|v| v.wrapping_sub(8)),
                (any::<u32>(), 0u32..64).prop_map(|(v, s)| (v as u64) << (s % 33)),
            ]
        }

        proptest! {
            #[test]
            fn shifts_match_reference(value in any::<u64>(), amount in 0u32..128) {
                prop_assert_eq!(shift_left(value, amount), reference_shl(value, amount));
                prop_assert_eq!(shift_right_unsigned(value, amount), reference_lshr(value, amount));
                prop_assert_eq!(shift_right_signed(value as i64, amount), reference_ashr(value as i64, amount));
            }

            #[test]
            fn multiply_matches_truncated_reference(a in operand(), b in operand()) {
                prop_assert_eq!(multiply(a, b), ((a as u128) * (b as u128)) as u64);
            }

            #[test]
            fn unsigned_division_matches_reference(n in operand(), d in operand()) {
                prop_assume!(d != 0);
                let actual = divide_unsigned(n, d).unwrap();
                prop_assert_eq!(actual.quotient, n / d);
                prop_assert_eq!(actual.remainder, n % d);
            }

            #[test]
            fn signed_division_matches_reference(n in operand(), d in operand()) {
                let (n, d) = (n as i64, d as i64);
                prop_assume!(d != 0);
                let actual = divide(n, d).unwrap();
                prop_assert_eq!((actual.quotient, actual.remainder), reference_divide(n, d));
            }
        }
    }
}
