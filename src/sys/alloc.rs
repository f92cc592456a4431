use core::{alloc::Layout, cell::Cell, ffi::c_void, ptr::NonNull};

use critical_section as cs;

/// Opaque handle of the host heap every block is carved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapHandle(NonNull<c_void>);

// Only ever handed back to the host heap, which does its own locking.
unsafe impl Send for HeapHandle {}

#[cfg(windows)]
mod backend {
    use core::{ffi::c_void, ptr::NonNull};

    use super::HeapHandle;

    const HEAP_ZERO_MEMORY: u32 = 0x0000_0008;

    #[link(name = "kernel32")]
    extern "system" {
        fn GetProcessHeap() -> *mut c_void;
        fn HeapAlloc(heap: *mut c_void, flags: u32, bytes: usize) -> *mut c_void;
        fn HeapReAlloc(heap: *mut c_void, flags: u32, mem: *mut c_void, bytes: usize) -> *mut c_void;
        fn HeapFree(heap: *mut c_void, flags: u32, mem: *mut c_void) -> i32;
    }

    /// `MEMORY_ALLOCATION_ALIGNMENT`
    pub const MIN_ALIGN: usize = 2 * core::mem::size_of::<usize>();

    #[inline]
    pub fn acquire() -> Option<HeapHandle> {
        NonNull::new(unsafe { GetProcessHeap() }).map(HeapHandle)
    }

    #[inline]
    pub unsafe fn alloc_block(heap: HeapHandle, size: usize, zeroed: bool) -> *mut u8 {
        let flags = if zeroed { HEAP_ZERO_MEMORY } else { 0 };
        HeapAlloc(heap.0.as_ptr(), flags, size).cast()
    }

    #[inline]
    pub unsafe fn realloc_block(heap: HeapHandle, ptr: *mut u8, size: usize) -> *mut u8 {
        HeapReAlloc(heap.0.as_ptr(), 0, ptr.cast(), size).cast()
    }

    #[inline]
    pub unsafe fn free_block(heap: HeapHandle, ptr: *mut u8) {
        HeapFree(heap.0.as_ptr(), 0, ptr.cast());
    }
}

/// Hosts without a process heap API fall back to the C heap. It has no handle,
/// so the cached token only records that the heap is usable.
#[cfg(not(windows))]
mod backend {
    use core::{ffi::c_void, ptr::NonNull};

    use super::HeapHandle;

    extern "C" {
        fn malloc(size: usize) -> *mut c_void;
        fn calloc(count: usize, size: usize) -> *mut c_void;
        fn realloc(ptr: *mut c_void, size: usize) -> *mut c_void;
        fn free(ptr: *mut c_void);
    }

    pub const MIN_ALIGN: usize = 2 * core::mem::size_of::<usize>();

    #[inline]
    pub fn acquire() -> Option<HeapHandle> {
        Some(HeapHandle(NonNull::dangling()))
    }

    // malloc(0) may legally return null; HeapAlloc hands out a unique block instead.
    #[inline]
    pub unsafe fn alloc_block(_heap: HeapHandle, size: usize, zeroed: bool) -> *mut u8 {
        let size = size.max(1);
        if zeroed {
            calloc(1, size).cast()
        } else {
            malloc(size).cast()
        }
    }

    #[inline]
    pub unsafe fn realloc_block(_heap: HeapHandle, ptr: *mut u8, size: usize) -> *mut u8 {
        realloc(ptr.cast(), size.max(1)).cast()
    }

    #[inline]
    pub unsafe fn free_block(_heap: HeapHandle, ptr: *mut u8) {
        free(ptr.cast());
    }
}

/// Pass-through allocator over the host process heap.
///
/// There is no bookkeeping of its own: block sizes are tracked by the host
/// heap, and the heap handle is looked up once and then cached for the rest of
/// the process. Can be installed with `#[global_allocator]`.
pub struct ProcessHeap {
    handle: cs::Mutex<Cell<Option<HeapHandle>>>,
}

/// The process-wide heap used by the C and C++ entry points.
pub static PROCESS_HEAP: ProcessHeap = ProcessHeap::new();

impl ProcessHeap {
    #[inline]
    pub const fn new() -> Self {
        Self {
            handle: cs::Mutex::new(Cell::new(None)),
        }
    }

    /// Returns the host heap, acquiring it on first use.
    pub fn handle(&self) -> Option<HeapHandle> {
        let handle = cs::with(|cs| {
            let cached = self.handle.borrow(cs);
            if cached.get().is_none() {
                cached.set(backend::acquire());
            }
            cached.get()
        });

        if handle.is_none() {
            crate::debugln!("process heap unavailable");
        }
        handle
    }

    #[inline(never)]
    pub fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        let heap = self.handle()?;
        let ptr = NonNull::new(unsafe { backend::alloc_block(heap, size, false) });
        if ptr.is_none() {
            crate::debugln!("allocate({}) failed", size);
        }
        ptr
    }

    #[inline(never)]
    pub fn allocate_zeroed(&self, size: usize) -> Option<NonNull<u8>> {
        let heap = self.handle()?;
        let ptr = NonNull::new(unsafe { backend::alloc_block(heap, size, true) });
        if ptr.is_none() {
            crate::debugln!("allocate_zeroed({}) failed", size);
        }
        ptr
    }

    /// Resizes a block. On failure the original block is left untouched.
    ///
    /// # Safety
    ///
    /// `ptr` must come from this heap and still be live.
    pub unsafe fn reallocate(&self, ptr: NonNull<u8>, new_size: usize) -> Option<NonNull<u8>> {
        let heap = self.handle()?;
        let new_ptr = NonNull::new(backend::realloc_block(heap, ptr.as_ptr(), new_size));
        if new_ptr.is_none() {
            crate::debugln!("reallocate({}) failed", new_size);
        }
        new_ptr
    }

    /// Releases a block. A null pointer is a no-op.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or come from this heap and still be live.
    #[inline(never)]
    pub unsafe fn deallocate(&self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        if let Some(heap) = self.handle() {
            backend::free_block(heap, ptr);
        }
    }

    /// Serves alignments the host heap does not guarantee by over-allocating and
    /// storing the original block address just below the aligned pointer.
    unsafe fn allocate_overaligned(&self, layout: Layout, zeroed: bool) -> *mut u8 {
        let Some(total) = layout.size().checked_add(layout.align()) else {
            return core::ptr::null_mut();
        };
        let block = if zeroed {
            self.allocate_zeroed(total)
        } else {
            self.allocate(total)
        };
        let Some(block) = block else {
            return core::ptr::null_mut();
        };

        // The block is MIN_ALIGN-aligned, so the offset is at least one pointer wide.
        let offset = layout.align() - (block.as_ptr().addr() & (layout.align() - 1));
        let aligned = block.as_ptr().add(offset);
        aligned.cast::<*mut u8>().sub(1).write(block.as_ptr());
        aligned
    }

    #[inline]
    unsafe fn overaligned_block(ptr: *mut u8) -> *mut u8 {
        ptr.cast::<*mut u8>().sub(1).read()
    }
}

impl Default for ProcessHeap {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn heap_aligned(layout: Layout) -> bool {
    layout.align() <= backend::MIN_ALIGN
}

unsafe impl core::alloc::GlobalAlloc for ProcessHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if heap_aligned(layout) {
            self.allocate(layout.size()).map_or(core::ptr::null_mut(), |ptr| ptr.as_ptr())
        } else {
            self.allocate_overaligned(layout, false)
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if heap_aligned(layout) {
            self.deallocate(ptr);
        } else {
            self.deallocate(Self::overaligned_block(ptr));
        }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if heap_aligned(layout) {
            return match NonNull::new(ptr) {
                Some(ptr) => self.reallocate(ptr, new_size),
                None => self.allocate(new_size),
            }
            .map_or(core::ptr::null_mut(), |ptr| ptr.as_ptr());
        }

        let new_layout = Layout::from_size_align_unchecked(new_size, layout.align());
        let new_ptr = self.allocate_overaligned(new_layout, false);
        if !new_ptr.is_null() {
            core::ptr::copy_nonoverlapping(ptr, new_ptr, layout.size().min(new_size));
            self.dealloc(ptr, layout);
        }
        new_ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if heap_aligned(layout) {
            self.allocate_zeroed(layout.size()).map_or(core::ptr::null_mut(), |ptr| ptr.as_ptr())
        } else {
            self.allocate_overaligned(layout, true)
        }
    }
}

/// Allocates `size` bytes from the process heap, or returns null.
#[inline]
pub fn allocate(size: usize) -> *mut u8 {
    PROCESS_HEAP.allocate(size).map_or(core::ptr::null_mut(), |ptr| ptr.as_ptr())
}

/// Array form of [`allocate`]. Behaves identically.
#[inline]
pub fn allocate_array(size: usize) -> *mut u8 {
    allocate(size)
}

/// Returns a block to the process heap. Null is a no-op.
///
/// # Safety
///
/// `ptr` must be null or a live block obtained from [`allocate`].
#[inline]
pub unsafe fn deallocate(ptr: *mut u8) {
    PROCESS_HEAP.deallocate(ptr)
}

/// # Safety
///
/// See [`deallocate`].
#[inline]
pub unsafe fn deallocate_array(ptr: *mut u8) {
    deallocate(ptr)
}

/// Size-tagged form of [`deallocate`]; the host heap knows the block size.
///
/// # Safety
///
/// See [`deallocate`].
#[inline]
pub unsafe fn deallocate_sized(ptr: *mut u8, _size: usize) {
    deallocate(ptr)
}

/// # Safety
///
/// See [`deallocate`].
#[inline]
pub unsafe fn deallocate_array_sized(ptr: *mut u8, _size: usize) {
    deallocate(ptr)
}

/// C++ `operator new`/`operator delete` under the manglings the common
/// toolchains reference.
#[cfg(all(feature = "symbols", not(test)))]
mod symbols {
    use core::ffi::c_void;

    #[cfg_attr(all(target_env = "msvc", target_pointer_width = "32"), export_name = "??2@YAPAXI@Z")]
    #[cfg_attr(all(target_env = "msvc", target_pointer_width = "64"), export_name = "??2@YAPEAX_K@Z")]
    #[cfg_attr(all(not(target_env = "msvc"), target_pointer_width = "32"), export_name = "_Znwj")]
    #[cfg_attr(all(not(target_env = "msvc"), target_pointer_width = "64"), export_name = "_Znwm")]
    pub extern "C" fn operator_new(size: usize) -> *mut c_void {
        super::allocate(size).cast()
    }

    #[cfg_attr(all(target_env = "msvc", target_pointer_width = "32"), export_name = "??_U@YAPAXI@Z")]
    #[cfg_attr(all(target_env = "msvc", target_pointer_width = "64"), export_name = "??_U@YAPEAX_K@Z")]
    #[cfg_attr(all(not(target_env = "msvc"), target_pointer_width = "32"), export_name = "_Znaj")]
    #[cfg_attr(all(not(target_env = "msvc"), target_pointer_width = "64"), export_name = "_Znam")]
    pub extern "C" fn operator_new_array(size: usize) -> *mut c_void {
        super::allocate_array(size).cast()
    }

    #[cfg_attr(all(target_env = "msvc", target_pointer_width = "32"), export_name = "??3@YAXPAX@Z")]
    #[cfg_attr(all(target_env = "msvc", target_pointer_width = "64"), export_name = "??3@YAXPEAX@Z")]
    #[cfg_attr(not(target_env = "msvc"), export_name = "_ZdlPv")]
    pub unsafe extern "C" fn operator_delete(ptr: *mut c_void) {
        super::deallocate(ptr.cast())
    }

    #[cfg_attr(all(target_env = "msvc", target_pointer_width = "32"), export_name = "??_V@YAXPAX@Z")]
    #[cfg_attr(all(target_env = "msvc", target_pointer_width = "64"), export_name = "??_V@YAXPEAX@Z")]
    #[cfg_attr(not(target_env = "msvc"), export_name = "_ZdaPv")]
    pub unsafe extern "C" fn operator_delete_array(ptr: *mut c_void) {
        super::deallocate_array(ptr.cast())
    }

    #[cfg_attr(all(target_env = "msvc", target_pointer_width = "32"), export_name = "??3@YAXPAXI@Z")]
    #[cfg_attr(all(target_env = "msvc", target_pointer_width = "64"), export_name = "??3@YAXPEAX_K@Z")]
    #[cfg_attr(all(not(target_env = "msvc"), target_pointer_width = "32"), export_name = "_ZdlPvj")]
    #[cfg_attr(all(not(target_env = "msvc"), target_pointer_width = "64"), export_name = "_ZdlPvm")]
    pub unsafe extern "C" fn operator_delete_sized(ptr: *mut c_void, size: usize) {
        super::deallocate_sized(ptr.cast(), size)
    }

    #[cfg_attr(all(target_env = "msvc", target_pointer_width = "32"), export_name = "??_V@YAXPAXI@Z")]
    #[cfg_attr(all(target_env = "msvc", target_pointer_width = "64"), export_name = "??_V@YAXPEAX_K@Z")]
    #[cfg_attr(all(not(target_env = "msvc"), target_pointer_width = "32"), export_name = "_ZdaPvj")]
    #[cfg_attr(all(not(target_env = "msvc"), target_pointer_width = "64"), export_name = "_ZdaPvm")]
    pub unsafe extern "C" fn operator_delete_array_sized(ptr: *mut c_void, size: usize) {
        super::deallocate_array_sized(ptr.cast(), size)
    }
}
