//! x87 control word and float-to-integer conversion.

use const_default::ConstDefault;

/// Rounding control, bits 10-11 of the control word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RoundingMode {
    /// Round to nearest, ties to even.
    Nearest = 0,
    Down = 1,
    Up = 2,
    TowardZero = 3,
}

impl ConstDefault for RoundingMode {
    const DEFAULT: Self = Self::Nearest;
}

/// Precision control, bits 8-9 of the control word. Only affects the
/// arithmetic instructions, not loads, stores or integer conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Precision {
    Single = 0,
    Double = 2,
    Extended = 3,
}

impl ConstDefault for Precision {
    const DEFAULT: Self = Self::Extended;
}

/// Exception mask bits; a set bit suppresses the corresponding trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExceptionMask(u8);

impl ExceptionMask {
    pub const NONE: Self = Self(0);
    pub const INVALID: Self = Self(0x01);
    pub const DENORMAL: Self = Self(0x02);
    pub const ZERO_DIVIDE: Self = Self(0x04);
    pub const OVERFLOW: Self = Self(0x08);
    pub const UNDERFLOW: Self = Self(0x10);
    pub const PRECISION: Self = Self(0x20);
    pub const ALL: Self = Self(0x3F);

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl ConstDefault for ExceptionMask {
    const DEFAULT: Self = Self::ALL;
}

/// Decoded x87 control word. [`FpuControl::DEFAULT`] is the state `fninit`
/// leaves behind: all exceptions masked, extended precision, round to nearest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ConstDefault)]
pub struct FpuControl {
    pub rounding: RoundingMode,
    pub precision: Precision,
    pub exceptions: ExceptionMask,
}

impl Default for FpuControl {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl FpuControl {
    /// Bit 6 is reserved and reads back as one.
    const RESERVED: u16 = 0x0040;

    pub const fn to_word(self) -> u16 {
        Self::RESERVED
            | self.exceptions.0 as u16
            | (self.precision as u16) << 8
            | (self.rounding as u16) << 10
    }

    /// Decodes a control word. The reserved precision encoding `01` is read
    /// as extended precision.
    pub const fn from_word(word: u16) -> Self {
        let rounding = match (word >> 10) & 3 {
            0 => RoundingMode::Nearest,
            1 => RoundingMode::Down,
            2 => RoundingMode::Up,
            _ => RoundingMode::TowardZero,
        };
        let precision = match (word >> 8) & 3 {
            0 => Precision::Single,
            2 => Precision::Double,
            _ => Precision::Extended,
        };

        Self {
            rounding,
            precision,
            exceptions: ExceptionMask((word & 0x3F) as u8),
        }
    }

    pub const fn with_rounding(self, rounding: RoundingMode) -> Self {
        Self { rounding, ..self }
    }

    pub const fn with_precision(self, precision: Precision) -> Self {
        Self { precision, ..self }
    }

    pub const fn with_exceptions(self, exceptions: ExceptionMask) -> Self {
        Self { exceptions, ..self }
    }

    /// Reads the calling thread's control word.
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    pub fn current() -> Self {
        let mut word = 0u16;
        unsafe {
            core::arch::asm!(
                "fnstcw word ptr [{p}]",
                p = in(reg) &mut word as *mut u16,
                options(nostack, preserves_flags),
            );
        }
        Self::from_word(word)
    }

    /// Loads this configuration into the calling thread's control word.
    ///
    /// Unmasking an exception whose status flag is already set traps on the
    /// next x87 instruction.
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    pub fn apply(self) {
        let word = self.to_word();
        unsafe {
            core::arch::asm!(
                "fldcw word ptr [{p}]",
                p = in(reg) &word as *const u16,
                options(nostack, preserves_flags, readonly),
            );
        }
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    pub fn current() -> Self {
        Self::DEFAULT
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    pub fn apply(self) {}
}

/// Runs `f` with `control` loaded, restoring the previous control word
/// afterwards, also when `f` unwinds.
#[inline]
pub fn with_fpu_control<R>(control: FpuControl, f: impl FnOnce() -> R) -> R {
    struct Restore(FpuControl);

    impl Drop for Restore {
        #[inline(always)]
        fn drop(&mut self) {
            self.0.apply();
        }
    }

    let _restore = Restore(FpuControl::current());
    control.apply();
    f()
}

/// Value `fistp` stores when the source is NaN or out of range.
pub const INTEGER_INDEFINITE: i32 = i32::MIN;

/// Converts to `i32` with the FPU's current rounding mode (round to nearest,
/// ties to even, unless changed). NaN and out-of-range inputs give
/// [`INTEGER_INDEFINITE`].
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
pub fn round_to_nearest_int(x: f64) -> i32 {
    let mut result = 0i32;
    unsafe {
        core::arch::asm!(
            "fld qword ptr [{x}]",
            "fistp dword ptr [{dst}]",
            x = in(reg) &x as *const f64,
            dst = in(reg) &mut result as *mut i32,
            out("st(0)") _, out("st(1)") _, out("st(2)") _, out("st(3)") _,
            out("st(4)") _, out("st(5)") _, out("st(6)") _, out("st(7)") _,
            options(nostack),
        );
    }
    result
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
#[inline]
pub fn round_to_nearest_int(x: f64) -> i32 {
    round_half_even(x)
}

/// Software round-to-nearest-even with the same out-of-range result as the
/// hardware conversion.
#[cfg_attr(any(target_arch = "x86", target_arch = "x86_64"), allow(dead_code))]
fn round_half_even(x: f64) -> i32 {
    if !(x > -2_147_483_649.0 && x < 2_147_483_648.0) {
        return INTEGER_INDEFINITE;
    }

    let whole = x as i64;
    let frac = x - whole as f64;
    let rounded = if frac > 0.5 || frac == 0.5 && whole & 1 != 0 {
        whole + 1
    } else if frac < -0.5 || frac == -0.5 && whole & 1 != 0 {
        whole - 1
    } else {
        whole
    };

    i32::try_from(rounded).unwrap_or(INTEGER_INDEFINITE)
}
