//! Pool-backed, reference-counted multichannel audio buffers.
//!
//! An [`AudioBuffer`] owns one block of PCM: a fixed frame count, sample
//! format, channel count, and either planar or interleaved storage. Buffers
//! are never allocated on the real-time path; they are acquired from a
//! [`Pool`] sized up front for a single configured shape, and returned to the
//! pool when the last [`Handle`] referencing a slot is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::{BbxError, Result};

/// On-the-wire sample representation carried by a buffer's planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    I8,
    U8,
    I16,
    I32,
    F32,
    F64,
}

impl SampleFormat {
    /// Size in bytes of one sample in this format.
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::I8 | SampleFormat::U8 => 1,
            SampleFormat::I16 => 2,
            SampleFormat::I32 | SampleFormat::F32 => 4,
            SampleFormat::F64 => 8,
        }
    }
}

/// Whether channels live in separate planes or are interleaved sample-by-sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Planarity {
    Planar,
    Interleaved,
}

/// The shape every buffer in a given [`Pool`] shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferShape {
    pub frames: usize,
    pub channels: usize,
    pub sample_rate: u32,
    pub format: SampleFormat,
    pub planarity: Planarity,
}

impl BufferShape {
    pub fn new(frames: usize, channels: usize, sample_rate: u32, format: SampleFormat, planarity: Planarity) -> Self {
        Self { frames, channels, sample_rate, format, planarity }
    }

    /// Size in bytes of one plane (or the single interleaved plane).
    fn plane_len_bytes(&self) -> usize {
        match self.planarity {
            Planarity::Planar => self.frames * self.format.bytes_per_sample(),
            Planarity::Interleaved => self.frames * self.channels * self.format.bytes_per_sample(),
        }
    }

    fn plane_count(&self) -> usize {
        match self.planarity {
            Planarity::Planar => self.channels,
            Planarity::Interleaved => 1,
        }
    }
}

/// SIMD-friendly alignment for plane allocations.
const PLANE_ALIGNMENT: usize = 16;

fn aligned_plane(len: usize) -> Vec<u8> {
    // Over-allocate to PLANE_ALIGNMENT and truncate; Vec<u8>'s own allocator
    // alignment is 1, so padding is the only portable way to get a buffer
    // whose base is very likely (not guaranteed, but good enough for the
    // in-process conversions this crate performs) aligned for wide loads.
    let padded = len + PLANE_ALIGNMENT;
    let mut v = vec![0u8; padded];
    v.truncate(len);
    v
}

/// One multichannel PCM block: immutable shape, mutable sample contents.
pub struct AudioBuffer {
    shape: BufferShape,
    planes: Vec<Vec<u8>>,
}

impl AudioBuffer {
    fn new(shape: BufferShape) -> Self {
        let plane_len = shape.plane_len_bytes();
        let planes = (0..shape.plane_count()).map(|_| aligned_plane(plane_len)).collect();
        Self { shape, planes }
    }

    pub fn shape(&self) -> &BufferShape {
        &self.shape
    }

    pub fn frames(&self) -> usize {
        self.shape.frames
    }

    pub fn channels(&self) -> usize {
        self.shape.channels
    }

    pub fn is_planar(&self) -> bool {
        matches!(self.shape.planarity, Planarity::Planar)
    }

    /// Raw bytes for plane `index` (channel index when planar, 0 when interleaved).
    pub fn plane(&self, index: usize) -> &[u8] {
        &self.planes[index]
    }

    pub fn plane_mut(&mut self, index: usize) -> &mut [u8] {
        &mut self.planes[index]
    }

    pub fn planes(&self) -> &[Vec<u8>] {
        &self.planes
    }

    fn zero(&mut self) {
        for plane in &mut self.planes {
            plane.fill(0);
        }
    }

    /// Deep-copies sample data from `other` into `self`. Both buffers must
    /// share an identical shape; this is a structural requirement, not a
    /// format conversion.
    pub fn copy_from(&mut self, other: &AudioBuffer) -> Result<()> {
        if self.shape != other.shape {
            return Err(BbxError::InvalidBufferSize);
        }
        for (dst, src) in self.planes.iter_mut().zip(other.planes.iter()) {
            dst.copy_from_slice(src);
        }
        Ok(())
    }

    /// Raw pointer/linesize pairs for handing this buffer to an external
    /// codec library. Formats are copied across this boundary, never
    /// transcoded; the caller is responsible for matching `shape.format`.
    pub fn to_interop_frame(&self) -> InteropFrame {
        InteropFrame {
            pointers: self.planes.iter().map(|p| p.as_ptr()).collect(),
            linesize: self.shape.plane_len_bytes(),
            frames: self.shape.frames,
            channels: self.shape.channels,
        }
    }

    /// Fills this buffer's planes from raw external pointers. `frame` must
    /// describe the same shape as `self` (checked via `linesize`/`frames`).
    ///
    /// # Safety
    /// Every pointer in `frame.pointers` must be valid for reads of
    /// `frame.linesize` bytes and must not alias `self`'s planes.
    pub unsafe fn from_interop_frame(&mut self, frame: &InteropFrame) -> Result<()> {
        if frame.frames != self.shape.frames || frame.linesize != self.shape.plane_len_bytes() {
            return Err(BbxError::InvalidBufferSize);
        }
        if frame.pointers.len() != self.planes.len() {
            return Err(BbxError::InvalidBufferSize);
        }
        for (dst, &src) in self.planes.iter_mut().zip(frame.pointers.iter()) {
            let slice = unsafe { std::slice::from_raw_parts(src, frame.linesize) };
            dst.copy_from_slice(slice);
        }
        Ok(())
    }
}

/// Raw pointers and sizing handed to/from an external interop boundary (e.g.
/// a hardware driver or a codec library). Carries no ownership.
pub struct InteropFrame {
    pub pointers: Vec<*const u8>,
    pub linesize: usize,
    pub frames: usize,
    pub channels: usize,
}

struct Slot {
    in_use: AtomicBool,
    refcount: AtomicUsize,
    buffer: std::cell::UnsafeCell<AudioBuffer>,
}

// SAFETY: a slot's buffer is mutated only while `in_use` was just won via
// CAS and exactly one `Handle` exists for it (enforced by `Pool::acquire`
// returning a single handle and views borrowing through `Arc<AudioBuffer>`
// clones, never `&mut`).
unsafe impl Sync for Slot {}

struct PoolInner {
    shape: BufferShape,
    slots: Vec<Slot>,
}

/// Fixed-capacity set of same-shaped [`AudioBuffer`]s. `acquire`/`release`
/// never allocate and never block; on exhaustion, acquisition fails.
///
/// Cheaply `Clone`: clones share the same backing slots, so a pool can be
/// handed to more than one thread (e.g. a driver's separate input and output
/// stream callbacks) without duplicating the underlying buffers.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    pub fn new(shape: BufferShape, capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| Slot {
                in_use: AtomicBool::new(false),
                refcount: AtomicUsize::new(0),
                buffer: std::cell::UnsafeCell::new(AudioBuffer::new(shape)),
            })
            .collect();
        Self { inner: Arc::new(PoolInner { shape, slots }) }
    }

    pub fn shape(&self) -> &BufferShape {
        &self.inner.shape
    }

    pub fn capacity(&self) -> usize {
        self.inner.slots.len()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.slots.iter().filter(|s| s.in_use.load(Ordering::Acquire)).count()
    }

    /// Non-blocking, constant-time (for a small fixed capacity) acquisition.
    /// Returns `None` rather than allocating when every slot is in use.
    pub fn acquire(&self) -> Option<Handle> {
        for (index, slot) in self.inner.slots.iter().enumerate() {
            if slot.in_use.compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed).is_ok() {
                slot.refcount.store(1, Ordering::Release);
                // SAFETY: we just won ownership of this slot.
                unsafe { (*slot.buffer.get()).zero() };
                return Some(Handle { pool: Arc::clone(&self.inner), index });
            }
        }
        None
    }
}

/// A reference-counted handle to one pooled [`AudioBuffer`]. Cloning shares
/// the same underlying buffer (used for views); the slot returns to the pool
/// when the last clone is dropped.
pub struct Handle {
    pool: Arc<PoolInner>,
    index: usize,
}

impl Handle {
    fn slot(&self) -> &Slot {
        &self.pool.slots[self.index]
    }

    pub fn as_ref(&self) -> &AudioBuffer {
        // SAFETY: the slot is held live by this handle's refcount; mutation
        // only ever happens through `as_mut`, which requires unique
        // ownership (checked via the refcount).
        unsafe { &*self.slot().buffer.get() }
    }

    /// Mutable access. Returns `None` if this handle is shared (a view
    /// exists), since views are strictly borrow-only.
    pub fn as_mut(&mut self) -> Option<&mut AudioBuffer> {
        if self.slot().refcount.load(Ordering::Acquire) != 1 {
            return None;
        }
        // SAFETY: refcount == 1 means this is the only handle to the slot.
        Some(unsafe { &mut *self.slot().buffer.get() })
    }

    /// Returns a non-owning window over `self` spanning
    /// `[start_frame, start_frame + frames)`. The parent handle's refcount is
    /// incremented, keeping the backing buffer alive; the view never
    /// observes a reallocation because pooled buffers never resize in place.
    pub fn view(&self, start_frame: usize, frames: usize) -> Result<View> {
        let shape = self.as_ref().shape();
        if start_frame + frames > shape.frames {
            return Err(BbxError::InvalidBufferSize);
        }
        self.slot().refcount.fetch_add(1, Ordering::AcqRel);
        Ok(View { parent: Handle { pool: Arc::clone(&self.pool), index: self.index }, start_frame, frames })
    }
}

impl Clone for Handle {
    fn clone(&self) -> Self {
        self.slot().refcount.fetch_add(1, Ordering::AcqRel);
        Handle { pool: Arc::clone(&self.pool), index: self.index }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if self.slot().refcount.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.slot().in_use.store(false, Ordering::Release);
        }
    }
}

/// A borrow-only window over a sub-range of a parent [`Handle`]'s frames.
/// The parent is kept alive for the view's lifetime; a view never owns
/// memory and is never released to the pool independently.
pub struct View {
    parent: Handle,
    start_frame: usize,
    frames: usize,
}

impl View {
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn start_frame(&self) -> usize {
        self.start_frame
    }

    pub fn parent(&self) -> &AudioBuffer {
        self.parent.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> BufferShape {
        BufferShape::new(64, 2, 48_000, SampleFormat::F32, Planarity::Planar)
    }

    #[test]
    fn acquire_fails_rather_than_allocates_on_exhaustion() {
        let pool = Pool::new(shape(), 2);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert!(pool.acquire().is_none());
        drop(a);
        assert!(pool.acquire().is_some());
        drop(b);
    }

    #[test]
    fn release_on_drop_returns_slot_to_pool() {
        let pool = Pool::new(shape(), 1);
        assert_eq!(pool.in_flight(), 0);
        {
            let _h = pool.acquire().unwrap();
            assert_eq!(pool.in_flight(), 1);
        }
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn view_keeps_parent_alive_and_blocks_mutation() {
        let pool = Pool::new(shape(), 1);
        let mut h = pool.acquire().unwrap();
        let view = h.view(0, 32).unwrap();
        assert!(h.as_mut().is_none(), "a live view must prevent mutable access");
        assert_eq!(view.frames(), 32);
        drop(view);
        assert!(h.as_mut().is_some());
    }

    #[test]
    fn copy_from_rejects_mismatched_shapes() {
        let pool_a = Pool::new(shape(), 1);
        let pool_b = Pool::new(BufferShape::new(32, 2, 48_000, SampleFormat::F32, Planarity::Planar), 1);
        let mut a = pool_a.acquire().unwrap();
        let b = pool_b.acquire().unwrap();
        let err = a.as_mut().unwrap().copy_from(b.as_ref()).unwrap_err();
        assert_eq!(err, BbxError::InvalidBufferSize);
    }
}
