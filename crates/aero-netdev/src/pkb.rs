use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;

/// Head room reserved by [`HeapPkbAllocator`] in front of every buffer.
///
/// Comfortably larger than any link-layer header we prepend (14 bytes for Ethernet).
pub const DEFAULT_PKB_HEADROOM: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PkbError {
    #[error("packet buffer head room exhausted (need {needed}, have {available})")]
    NoHeadroom { needed: usize, available: usize },

    #[error("packet buffer tail room exhausted (need {needed}, have {available})")]
    NoTailroom { needed: usize, available: usize },

    #[error("packet buffer holds {available} bytes, cannot pull {needed}")]
    Underrun { needed: usize, available: usize },
}

/// A packet buffer: one fixed allocation with a movable window of valid data.
///
/// ```text
/// 0          head          tail          capacity
/// | headroom |     data     |  tailroom  |
/// ```
///
/// [`push`](Self::push) grows the window toward the front (prepending a header),
/// [`put`](Self::put) declares bytes at the tail valid after they were filled in place via
/// [`tailroom_mut`](Self::tailroom_mut), and [`pull`](Self::pull) consumes a header from the front.
pub struct PacketBuffer {
    buf: Box<[u8]>,
    head: usize,
    tail: usize,
}

impl PacketBuffer {
    /// An empty buffer with `capacity` bytes of tail room and no head room.
    pub fn new(capacity: usize) -> Self {
        Self::with_headroom(0, capacity)
    }

    /// An empty buffer with `headroom` bytes reserved in front of `len` bytes of tail room.
    pub fn with_headroom(headroom: usize, len: usize) -> Self {
        Self {
            buf: vec![0u8; headroom + len].into_boxed_slice(),
            head: headroom,
            tail: headroom,
        }
    }

    /// Convenience constructor for a buffer whose valid data is `data`.
    pub fn from_payload(headroom: usize, data: &[u8]) -> Self {
        let mut pkb = Self::with_headroom(headroom, data.len());
        pkb.tailroom_mut().copy_from_slice(data);
        pkb.tail += data.len();
        pkb
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.tail - self.head
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn headroom(&self) -> usize {
        self.head
    }

    pub fn tailroom(&self) -> usize {
        self.buf.len() - self.tail
    }

    pub fn data(&self) -> &[u8] {
        &self.buf[self.head..self.tail]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.head..self.tail]
    }

    /// Unclaimed bytes after the valid data, for an external fill followed by [`Self::put`].
    pub fn tailroom_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.tail..]
    }

    /// Prepend `len` bytes and return them for the caller to fill.
    pub fn push(&mut self, len: usize) -> Result<&mut [u8], PkbError> {
        if len > self.head {
            return Err(PkbError::NoHeadroom {
                needed: len,
                available: self.head,
            });
        }
        self.head -= len;
        Ok(&mut self.buf[self.head..self.head + len])
    }

    /// Remove `len` bytes from the front, returning them.
    pub fn pull(&mut self, len: usize) -> Result<&[u8], PkbError> {
        let available = self.len();
        if len > available {
            return Err(PkbError::Underrun {
                needed: len,
                available,
            });
        }
        let start = self.head;
        self.head += len;
        Ok(&self.buf[start..self.head])
    }

    /// Declare `len` more bytes at the tail as valid data.
    pub fn put(&mut self, len: usize) -> Result<&mut [u8], PkbError> {
        let available = self.tailroom();
        if len > available {
            return Err(PkbError::NoTailroom {
                needed: len,
                available,
            });
        }
        let start = self.tail;
        self.tail += len;
        Ok(&mut self.buf[start..self.tail])
    }
}

impl core::fmt::Debug for PacketBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PacketBuffer")
            .field("len", &self.len())
            .field("headroom", &self.headroom())
            .field("tailroom", &self.tailroom())
            .finish()
    }
}

/// Source and sink of packet buffers.
///
/// The network core never creates or destroys packet storage on its own: it asks the allocator
/// for a buffer before each receive and hands every buffer it gives up (after a transmit attempt,
/// after a failed receive) back through [`free_pkb`](Self::free_pkb).
pub trait PkbAllocator {
    /// Allocate a buffer with at least `len` bytes of tail room, or `None` when out of memory.
    fn alloc_pkb(&mut self, len: usize) -> Option<PacketBuffer>;

    /// Release a buffer.
    fn free_pkb(&mut self, pkb: PacketBuffer) {
        drop(pkb);
    }
}

/// Plain heap allocator; never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapPkbAllocator {
    pub headroom: usize,
}

impl Default for HeapPkbAllocator {
    fn default() -> Self {
        Self {
            headroom: DEFAULT_PKB_HEADROOM,
        }
    }
}

impl PkbAllocator for HeapPkbAllocator {
    fn alloc_pkb(&mut self, len: usize) -> Option<PacketBuffer> {
        Some(PacketBuffer::with_headroom(self.headroom, len))
    }
}

impl<T: PkbAllocator + ?Sized> PkbAllocator for Rc<RefCell<T>> {
    fn alloc_pkb(&mut self, len: usize) -> Option<PacketBuffer> {
        self.borrow_mut().alloc_pkb(len)
    }

    fn free_pkb(&mut self, pkb: PacketBuffer) {
        self.borrow_mut().free_pkb(pkb);
    }
}
