use core::ffi::c_int;

/// Copies `count` bytes from `src` to `dst`, last byte first, and returns `dst`.
///
/// Running backward keeps overlapping ranges with `dst > src` correct. Ranges
/// overlapping the other way need [`move_bytes`].
///
/// # Safety
///
/// `src` must be valid for reads and `dst` valid for writes of `count` bytes.
#[inline(never)]
pub unsafe fn copy(dst: *mut u8, src: *const u8, count: usize) -> *mut u8 {
    let mut i = count;
    while i != 0 {
        i -= 1;
        *dst.add(i) = *src.add(i);
    }
    dst
}

#[inline(always)]
unsafe fn copy_forward(dst: *mut u8, src: *const u8, count: usize) {
    let mut i = 0;
    while i < count {
        *dst.add(i) = *src.add(i);
        i += 1;
    }
}

/// Overlap-safe copy: picks the direction that never reads a byte it already
/// overwrote. Returns `dst`.
///
/// # Safety
///
/// `src` must be valid for reads and `dst` valid for writes of `count` bytes.
#[inline(never)]
pub unsafe fn move_bytes(dst: *mut u8, src: *const u8, count: usize) -> *mut u8 {
    if dst.addr().wrapping_sub(src.addr()) >= count {
        copy_forward(dst, src, count);
        dst
    } else {
        copy(dst, src, count)
    }
}

/// Writes the low byte of `value` into `count` bytes starting at `dst`.
///
/// # Safety
///
/// `dst` must be valid for writes of `count` bytes.
#[inline(never)]
pub unsafe fn fill(dst: *mut u8, value: c_int, count: usize) -> *mut u8 {
    let byte = value as u8;
    let mut i = 0;
    while i < count {
        *dst.add(i) = byte;
        i += 1;
    }
    dst
}

#[cfg(all(feature = "symbols", not(test)))]
mod symbols {
    use core::ffi::{c_int, c_void};

    #[no_mangle]
    pub unsafe extern "C" fn memcpy(dst: *mut c_void, src: *const c_void, count: usize) -> *mut c_void {
        super::copy(dst.cast(), src.cast(), count).cast()
    }

    #[no_mangle]
    pub unsafe extern "C" fn memmove(dst: *mut c_void, src: *const c_void, count: usize) -> *mut c_void {
        super::move_bytes(dst.cast(), src.cast(), count).cast()
    }

    #[no_mangle]
    pub unsafe extern "C" fn memset(dst: *mut c_void, value: c_int, count: usize) -> *mut c_void {
        super::fill(dst.cast(), value, count).cast()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_sets_every_byte() {
        let mut buf = [0u8; 67];
        let ret = unsafe { fill(buf.as_mut_ptr(), 0xAB, buf.len()) };
        assert_eq!(ret, buf.as_mut_ptr());
        assert!(buf.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn fill_truncates_value_to_a_byte() {
        let mut buf = [0u8; 8];
        unsafe { fill(buf.as_mut_ptr(), 0x7_01AB, buf.len()) };
        assert_eq!(buf, [0xAB; 8]);

        unsafe { fill(buf.as_mut_ptr(), -1, 4) };
        assert_eq!(buf, [0xFF, 0xFF, 0xFF, 0xFF, 0xAB, 0xAB, 0xAB, 0xAB]);
    }

    #[test]
    fn zero_count_touches_nothing() {
        let mut dst = [0x11u8; 16];
        let src = [0x22u8; 16];
        unsafe {
            fill(dst.as_mut_ptr(), 0xAB, 0);
            copy(dst.as_mut_ptr(), src.as_ptr(), 0);
            move_bytes(dst.as_mut_ptr(), src.as_ptr(), 0);
        }
        assert_eq!(dst, [0x11; 16]);
    }

    #[test]
    fn fill_stays_inside_range() {
        let mut buf = [0u8; 32];
        unsafe { fill(buf.as_mut_ptr().add(8), 0xAB, 16) };
        assert!(buf[..8].iter().all(|&b| b == 0));
        assert!(buf[8..24].iter().all(|&b| b == 0xAB));
        assert!(buf[24..].iter().all(|&b| b == 0));
    }

    #[test]
    fn copy_handles_overlap_toward_higher_addresses() {
        let mut buf: [u8; 16] = core::array::from_fn(|i| i as u8);
        let base = buf.as_mut_ptr();
        unsafe { copy(base.add(4), base, 10) };
        assert_eq!(&buf[4..14], &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(&buf[..4], &[0, 1, 2, 3]);
        assert_eq!(&buf[14..], &[14, 15]);
    }

    #[test]
    fn move_bytes_handles_both_overlap_directions() {
        let mut buf: [u8; 16] = core::array::from_fn(|i| i as u8);
        let base = buf.as_mut_ptr();
        unsafe { move_bytes(base, base.add(4), 10) };
        assert_eq!(&buf[..10], &[4, 5, 6, 7, 8, 9, 10, 11, 12, 13]);

        let mut buf: [u8; 16] = core::array::from_fn(|i| i as u8);
        let base = buf.as_mut_ptr();
        let ret = unsafe { move_bytes(base.add(3), base, 10) };
        assert_eq!(ret, unsafe { base.add(3) });
        assert_eq!(&buf[3..13], &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    mod proptests {
        use proptest::prelude::*;

        use super::super::*;

        proptest! {
            #[test]
            fn copy_round_trips_disjoint_buffers(src in proptest::collection::vec(any::<u8>(), 0..512)) {
                let mut dst = vec![0u8; src.len() + 2];
                let ret = unsafe { copy(dst.as_mut_ptr().add(1), src.as_ptr(), src.len()) };
                prop_assert_eq!(ret, unsafe { dst.as_mut_ptr().add(1) });
                prop_assert_eq!(&dst[1..=src.len()], &src[..]);
                prop_assert_eq!(dst[0], 0);
                prop_assert_eq!(dst[src.len() + 1], 0);
            }

            #[test]
            fn move_bytes_matches_copy_within(
                data in proptest::collection::vec(any::<u8>(), 1..256),
                from in 0usize..256,
                to in 0usize..256,
                len in 0usize..256,
            ) {
                let n = data.len();
                let from = from % n;
                let to = to % n;
                let len = len % (n - from.max(to) + 1);

                let mut expected = data.clone();
                expected.copy_within(from..from + len, to);

                let mut actual = data;
                let base = actual.as_mut_ptr();
                unsafe { move_bytes(base.add(to), base.add(from), len) };
                prop_assert_eq!(actual, expected);
            }
        }
    }
}
