//! Capability-tagged byte buffers.
//!
//! The player needs two kinds of memory: large frame buffers that can live
//! anywhere (PSRAM on the board) and a smaller buffer the SPI DMA engine is
//! able to read from. Buffers free themselves when dropped.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::ops::DerefMut;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryKind {
    /// Large, slow memory is fine.
    Bulk,
    /// Must be reachable by the display transfer engine.
    TransferSafe,
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bulk => f.write_str("bulk"),
            Self::TransferSafe => f.write_str("transfer-safe"),
        }
    }
}

/// Source of zeroed byte buffers of a given kind.
pub trait RegionAllocator {
    type Buffer: DerefMut<Target = [u8]>;

    /// `None` when the region cannot supply `len` bytes.
    fn allocate(&mut self, kind: MemoryKind, len: usize) -> Option<Self::Buffer>;
}

impl<A: RegionAllocator + ?Sized> RegionAllocator for &mut A {
    type Buffer = A::Buffer;

    fn allocate(&mut self, kind: MemoryKind, len: usize) -> Option<Self::Buffer> {
        (**self).allocate(kind, len)
    }
}

/// Both kinds from the global heap. Right for hosts and for targets where
/// every heap region is DMA capable.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeapAllocator;

impl RegionAllocator for HeapAllocator {
    type Buffer = Box<[u8]>;

    fn allocate(&mut self, kind: MemoryKind, len: usize) -> Option<Box<[u8]>> {
        let mut v = Vec::new();
        if v.try_reserve_exact(len).is_err() {
            log::error!("heap: cannot reserve {} {} bytes", len, kind);
            return None;
        }
        v.resize(len, 0u8);
        Some(v.into_boxed_slice())
    }
}

#[cfg(feature = "esp32s3-st7796s")]
pub use caps::{CapsAllocator, CapsBuffer};

/// PSRAM for bulk buffers, internal SRAM for anything the SPI DMA touches.
#[cfg(feature = "esp32s3-st7796s")]
mod caps {
    use super::{MemoryKind, RegionAllocator};
    use core::alloc::{GlobalAlloc, Layout};
    use core::ops::{Deref, DerefMut};
    use core::ptr::NonNull;
    use esp_alloc::{MemoryCapability, HEAP};

    // DMA descriptors want word-aligned buffers.
    const ALIGN: usize = 4;

    #[derive(Clone, Copy, Debug, Default)]
    pub struct CapsAllocator;

    /// Zeroed block from a capability-filtered heap region.
    pub struct CapsBuffer {
        ptr: NonNull<u8>,
        len: usize,
        layout: Layout,
    }

    impl RegionAllocator for CapsAllocator {
        type Buffer = CapsBuffer;

        fn allocate(&mut self, kind: MemoryKind, len: usize) -> Option<CapsBuffer> {
            let layout = Layout::from_size_align(len.max(1), ALIGN).ok()?;
            let caps = match kind {
                MemoryKind::Bulk => MemoryCapability::External.into(),
                MemoryKind::TransferSafe => MemoryCapability::Internal.into(),
            };
            // SAFETY: layout has a non-zero size.
            let raw = unsafe { HEAP.alloc_caps(caps, layout) };
            let Some(ptr) = NonNull::new(raw) else {
                log::error!("no {} region with {} bytes free (heap: {})", kind, len, HEAP.free());
                return None;
            };
            // SAFETY: fresh allocation of at least `len` bytes.
            unsafe { ptr.as_ptr().write_bytes(0, len) };
            Some(CapsBuffer { ptr, len, layout })
        }
    }

    impl Deref for CapsBuffer {
        type Target = [u8];
        fn deref(&self) -> &[u8] {
            // SAFETY: owned, initialised, `len` bytes.
            unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
        }
    }

    impl DerefMut for CapsBuffer {
        fn deref_mut(&mut self) -> &mut [u8] {
            // SAFETY: as above, and `&mut self` is unique.
            unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
        }
    }

    impl Drop for CapsBuffer {
        fn drop(&mut self) {
            // SAFETY: allocated from HEAP with this layout.
            unsafe { HEAP.dealloc(self.ptr.as_ptr(), self.layout) }
        }
    }
}
