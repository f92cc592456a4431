//! Minimal C runtime replacement for size-constrained intro executables.
//!
//! Provides the handful of symbols a compiler expects from the C runtime:
//! heap entry points behind `new`/`delete`, `memcpy`/`memset`, the 64-bit
//! integer helpers of 32-bit targets, float-to-int conversion and the x87
//! backed math routines. Everything lives under [`sys`]; the common entry
//! points are re-exported here.

#![cfg_attr(not(test), no_std)]
#![no_builtins]

pub mod sys;

pub use sys::alloc::{ProcessHeap, PROCESS_HEAP};
pub use sys::fpu::{round_to_nearest_int, with_fpu_control, FpuControl};
pub use sys::int::{
    divide, divide_unsigned, multiply, shift_left, shift_right_signed, shift_right_unsigned,
    DivRem, Words,
};
