pub mod debug;
pub mod alloc;
pub mod libc;
pub mod int;
pub mod fpu;
pub mod math;
pub mod fixed;
#[cfg(all(target_env = "msvc", feature = "symbols", not(test)))]
pub mod msvc;

/// Terminates the process without running any destructors.
pub fn exit_process(code: u32) -> ! {
    #[cfg(windows)]
    {
        #[link(name = "kernel32")]
        extern "system" {
            fn ExitProcess(exit_code: u32) -> !;
        }

        unsafe { ExitProcess(code) }
    }

    #[cfg(not(windows))]
    {
        extern "C" {
            fn _exit(status: core::ffi::c_int) -> !;
        }

        unsafe { _exit(code as core::ffi::c_int) }
    }
}

#[cfg(all(feature = "panic-handler", not(test)))]
#[panic_handler]
pub fn panic_handler(info: &core::panic::PanicInfo) -> ! {
    match info.location() {
        Some(location) => crate::debugln!("panic at {}: {}", location, info.message()),
        None => crate::debugln!("panic: {}", info.message()),
    }
    exit_process(101)
}
