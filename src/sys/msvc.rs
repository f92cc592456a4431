//! Entry points the MSVC code generator references by name.
//!
//! On 32-bit x86 the compiler lowers 64-bit shifts, multiplies and divides,
//! `(int)` casts of doubles and the SSE2 math intrinsics into calls to these
//! helpers, each with its own register convention. The shims below translate
//! those conventions into plain calls to the portable implementations.

use core::ffi::c_int;

/// Referenced by every object file that uses floating point.
#[no_mangle]
#[allow(non_upper_case_globals)]
pub static _fltused: c_int = 0;

/// Called through the vtable slot of a pure virtual function.
#[no_mangle]
pub extern "C" fn _purecall() -> c_int {
    crate::debugln!("pure virtual function called");
    0
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    pub const NULL: Self = Self {
        data1: 0,
        data2: 0,
        data3: 0,
        data4: [0; 8],
    };
}

#[no_mangle]
pub static GUID_NULL: Guid = Guid::NULL;

#[cfg(target_arch = "x86")]
mod x86 {
    use crate::sys::int::{ashr_words, divmod_or_zero, lshr_words, mul_words, shl_words, udivmod_or_zero, Words};
    use crate::sys::math;

    // Shift helpers take the value in EDX:EAX and the count in CL, and return
    // in EDX:EAX. The shims spill them as cdecl arguments.

    extern "C" fn shl(lo: u32, hi: u32, amount: u32) -> u64 {
        shl_words(Words::new(lo, hi), amount).to_u64()
    }

    extern "C" fn lshr(lo: u32, hi: u32, amount: u32) -> u64 {
        lshr_words(Words::new(lo, hi), amount).to_u64()
    }

    extern "C" fn ashr(lo: u32, hi: u32, amount: u32) -> u64 {
        ashr_words(Words::new(lo, hi), amount).to_u64()
    }

    #[unsafe(naked)]
    #[no_mangle]
    pub unsafe extern "C" fn _allshl() {
        core::arch::naked_asm!(
            "movzx ecx, cl",
            "push ecx",
            "push edx",
            "push eax",
            "call {f}",
            "add esp, 12",
            "ret",
            f = sym shl,
        )
    }

    #[unsafe(naked)]
    #[no_mangle]
    pub unsafe extern "C" fn _aullshr() {
        core::arch::naked_asm!(
            "movzx ecx, cl",
            "push ecx",
            "push edx",
            "push eax",
            "call {f}",
            "add esp, 12",
            "ret",
            f = sym lshr,
        )
    }

    #[unsafe(naked)]
    #[no_mangle]
    pub unsafe extern "C" fn _allshr() {
        core::arch::naked_asm!(
            "movzx ecx, cl",
            "push ecx",
            "push edx",
            "push eax",
            "call {f}",
            "add esp, 12",
            "ret",
            f = sym ashr,
        )
    }

    // Multiply and divide helpers are callee-cleanup with both operands on
    // the stack, which is exactly stdcall. The leading \x01 keeps LLVM from
    // decorating the name with `@16`.

    #[export_name = "\x01__allmul"]
    pub extern "stdcall" fn allmul(a: u64, b: u64) -> u64 {
        mul_words(Words::from_u64(a), Words::from_u64(b)).to_u64()
    }

    #[export_name = "\x01__alldiv"]
    pub extern "stdcall" fn alldiv(dividend: i64, divisor: i64) -> i64 {
        divmod_or_zero(dividend.into(), divisor.into()).quotient.to_i64()
    }

    #[export_name = "\x01__allrem"]
    pub extern "stdcall" fn allrem(dividend: i64, divisor: i64) -> i64 {
        divmod_or_zero(dividend.into(), divisor.into()).remainder.to_i64()
    }

    #[export_name = "\x01__aulldiv"]
    pub extern "stdcall" fn aulldiv(dividend: u64, divisor: u64) -> u64 {
        udivmod_or_zero(dividend.into(), divisor.into()).quotient.to_u64()
    }

    #[export_name = "\x01__aullrem"]
    pub extern "stdcall" fn aullrem(dividend: u64, divisor: u64) -> u64 {
        udivmod_or_zero(dividend.into(), divisor.into()).remainder.to_u64()
    }

    /// Converts ST(0) to an integer in EAX and pops it.
    #[unsafe(naked)]
    #[no_mangle]
    pub unsafe extern "C" fn _ftol2_sse() {
        core::arch::naked_asm!(
            "sub esp, 4",
            "fistp dword ptr [esp]",
            "pop eax",
            "ret",
        )
    }

    // The `_libm_sse2_*_precise` helpers take their arguments in XMM0 (and
    // XMM1) and return in XMM0. The cdecl targets return in ST(0).

    extern "C" fn sin(x: f64) -> f64 {
        math::sin(x)
    }

    extern "C" fn cos(x: f64) -> f64 {
        math::cos(x)
    }

    extern "C" fn tan(x: f64) -> f64 {
        math::tan(x)
    }

    extern "C" fn sqrt(x: f64) -> f64 {
        math::sqrt(x)
    }

    extern "C" fn log10(x: f64) -> f64 {
        math::log10(x)
    }

    extern "C" fn pow(x: f64, y: f64) -> f64 {
        math::pow(x, y)
    }

    macro_rules! sse2_unary {
        ($($name:ident => $target:ident),+ $(,)?) => {
            $(
                #[unsafe(naked)]
                #[no_mangle]
                pub unsafe extern "C" fn $name() {
                    core::arch::naked_asm!(
                        "sub esp, 8",
                        "movq qword ptr [esp], xmm0",
                        "call {f}",
                        "fstp qword ptr [esp]",
                        "movq xmm0, qword ptr [esp]",
                        "add esp, 8",
                        "ret",
                        f = sym $target,
                    )
                }
            )+
        };
    }

    sse2_unary! {
        _libm_sse2_sin_precise => sin,
        _libm_sse2_cos_precise => cos,
        _libm_sse2_tan_precise => tan,
        _libm_sse2_sqrt_precise => sqrt,
        _libm_sse2_log10_precise => log10,
    }

    #[unsafe(naked)]
    #[no_mangle]
    pub unsafe extern "C" fn _libm_sse2_pow_precise() {
        core::arch::naked_asm!(
            "sub esp, 16",
            "movq qword ptr [esp], xmm0",
            "movq qword ptr [esp + 8], xmm1",
            "call {f}",
            "fstp qword ptr [esp]",
            "movq xmm0, qword ptr [esp]",
            "add esp, 16",
            "ret",
            f = sym pow,
        )
    }
}
