//! Math routines backed by the x87 transcendental instructions.
//!
//! Results are computed at the FPU's internal precision and rounded once on
//! the final store. On targets without an x87 unit the same functions come
//! from [`crate::sys::fixed`].

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub use self::x87::{cos, log10, pow, sin, sqrt, tan};

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
pub use super::fixed::{cos, log10, pow, sin, sqrt, tan};

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
mod x87 {
    /// Runs an x87 sequence that leaves the register stack as it found it.
    /// Operands are pointers to `f64` slots in memory.
    macro_rules! x87 {
        ($($line:literal),+ ; $($name:ident = $slot:expr),+ $(,)?) => {
            unsafe {
                core::arch::asm!(
                    $($line,)+
                    $($name = in(reg) $slot,)+
                    out("st(0)") _, out("st(1)") _, out("st(2)") _, out("st(3)") _,
                    out("st(4)") _, out("st(5)") _, out("st(6)") _, out("st(7)") _,
                    options(nostack),
                )
            }
        };
    }

    #[inline]
    pub fn sin(x: f64) -> f64 {
        let mut v = x;
        x87!(
            "fld qword ptr [{v}]",
            "fsin",
            "fstp qword ptr [{v}]";
            v = &mut v as *mut f64,
        );
        v
    }

    #[inline]
    pub fn cos(x: f64) -> f64 {
        let mut v = x;
        x87!(
            "fld qword ptr [{v}]",
            "fcos",
            "fstp qword ptr [{v}]";
            v = &mut v as *mut f64,
        );
        v
    }

    /// `sin(x) / cos(x)`, both evaluated on the FPU stack.
    #[inline]
    pub fn tan(x: f64) -> f64 {
        let mut v = x;
        x87!(
            "fld qword ptr [{v}]",
            "fcos",
            "fld qword ptr [{v}]",
            "fsin",
            "fdiv st, st(1)",
            "fstp qword ptr [{v}]",
            "fstp st(0)";
            v = &mut v as *mut f64,
        );
        v
    }

    #[inline]
    pub fn sqrt(x: f64) -> f64 {
        let mut v = x;
        x87!(
            "fld qword ptr [{v}]",
            "fsqrt",
            "fstp qword ptr [{v}]";
            v = &mut v as *mut f64,
        );
        v
    }

    /// `2^(y * log2(x))`. The exponent is split into an integer part for
    /// `fscale` and a fraction in `[-0.5, 0.5]` for `f2xm1`. Negative bases
    /// give NaN.
    #[inline]
    pub fn pow(x: f64, y: f64) -> f64 {
        let mut base = x;
        x87!(
            "fld qword ptr [{y}]",
            "fld qword ptr [{x}]",
            "fyl2x",
            "fld st(0)",
            "frndint",
            "fxch st(1)",
            "fsub st, st(1)",
            "f2xm1",
            "fld1",
            "faddp st(1), st",
            "fscale",
            "fstp st(1)",
            "fstp qword ptr [{x}]";
            x = &mut base as *mut f64,
            y = &y as *const f64,
        );
        base
    }

    /// `log10(2) * log2(x)`.
    #[inline]
    pub fn log10(x: f64) -> f64 {
        let mut v = x;
        x87!(
            "fldlg2",
            "fld qword ptr [{v}]",
            "fyl2x",
            "fstp qword ptr [{v}]";
            v = &mut v as *mut f64,
        );
        v
    }
}

#[cfg(all(feature = "symbols", not(test)))]
mod symbols {
    #[no_mangle]
    pub extern "C" fn sin(x: f64) -> f64 {
        super::sin(x)
    }

    #[no_mangle]
    pub extern "C" fn cos(x: f64) -> f64 {
        super::cos(x)
    }

    #[no_mangle]
    pub extern "C" fn tan(x: f64) -> f64 {
        super::tan(x)
    }

    #[no_mangle]
    pub extern "C" fn sqrt(x: f64) -> f64 {
        super::sqrt(x)
    }

    #[no_mangle]
    pub extern "C" fn pow(x: f64, y: f64) -> f64 {
        super::pow(x, y)
    }

    #[no_mangle]
    pub extern "C" fn log10(x: f64) -> f64 {
        super::log10(x)
    }
}
