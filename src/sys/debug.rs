//! Diagnostic output to the host debugger.
//!
//! Lines are formatted into a fixed buffer on the stack, so reporting an
//! allocation failure never allocates. Nothing is emitted unless the
//! `debug-log` feature is enabled.

use core::fmt::{self, Write};

/// Longest message emitted in one piece; the rest is cut off.
pub const LINE_CAPACITY: usize = 256;

pub type Line = heapless::String<LINE_CAPACITY>;

struct Truncating<'a>(&'a mut Line);

impl Write for Truncating<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                return Err(fmt::Error);
            }
        }
        Ok(())
    }
}

/// Formats `args`, keeping whatever fits in [`LINE_CAPACITY`] bytes.
pub fn format_line(args: fmt::Arguments) -> Line {
    let mut line = Line::new();
    let _ = Truncating(&mut line).write_fmt(args);
    line
}

#[cfg(all(feature = "debug-log", windows))]
fn emit(message: &str) {
    #[link(name = "kernel32")]
    extern "system" {
        fn OutputDebugStringA(output: *const u8);
    }

    let mut buf: heapless::Vec<u8, { LINE_CAPACITY + 1 }> = heapless::Vec::new();
    let _ = buf.extend_from_slice(message.as_bytes());
    let _ = buf.push(0);
    unsafe { OutputDebugStringA(buf.as_ptr()) }
}

#[cfg(all(feature = "debug-log", not(windows)))]
fn emit(message: &str) {
    extern "C" {
        fn write(fd: core::ffi::c_int, buf: *const u8, count: usize) -> isize;
    }

    unsafe { write(2, message.as_ptr(), message.len()) };
}

#[doc(hidden)]
#[inline]
pub fn _debug_print(args: fmt::Arguments) {
    #[cfg(feature = "debug-log")]
    emit(&format_line(args));

    #[cfg(not(feature = "debug-log"))]
    let _ = args;
}

#[macro_export]
macro_rules! debug_print {
    ($($arg:tt)*) => ($crate::sys::debug::_debug_print(format_args!($($arg)*)));
}

#[macro_export]
macro_rules! debugln {
    () => ($crate::debug_print!("\n"));
    ($($arg:tt)*) => ($crate::debug_print!("{}\n", format_args!($($arg)*)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_lines_format_completely() {
        let line = format_line(format_args!("heap: {} bytes at {:#x}", 64, 0x1000));
        assert_eq!(line.as_str(), "heap: 64 bytes at 0x1000");
    }

    #[test]
    fn long_lines_are_cut_at_capacity() {
        let long = "x".repeat(LINE_CAPACITY * 2);
        let line = format_line(format_args!("{long}!"));
        assert_eq!(line.len(), LINE_CAPACITY);
        assert!(line.chars().all(|c| c == 'x'));
    }

    #[test]
    fn truncation_keeps_whole_characters() {
        let wide = "\u{00E9}".repeat(LINE_CAPACITY);
        let line = format_line(format_args!("{wide}"));
        assert_eq!(line.len(), LINE_CAPACITY);
        assert!(line.chars().all(|c| c == '\u{00E9}'));
    }

    #[test]
    fn macros_accept_format_arguments() {
        crate::debug_print!("value {}", 1);
        crate::debugln!("value {} and {:?}", 2, "three");
        crate::debugln!();
    }
}
