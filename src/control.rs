use core::marker::PhantomData;

/// Control byte marking a slot that has never held an element since the last
/// rehash. Only this value terminates a probe.
///
/// Every special byte has its high bit set and every full byte has it clear.
pub const EMPTY: u8 = 0x80;

/// Control byte marking a tombstone: the slot held an element that was
/// erased while some probe may have passed over it. Lookups scan past it.
pub const DELETED: u8 = 0xFE;

/// Control byte stored at index `capacity`, one past the last slot.
pub const SENTINEL: u8 = 0xFF;

/// Returns `true` if `ctrl` marks a live element.
#[inline(always)]
pub fn is_full(ctrl: u8) -> bool {
    ctrl & 0x80 == 0
}

/// Returns `true` if `ctrl` is [`EMPTY`].
#[inline(always)]
pub fn is_empty(ctrl: u8) -> bool {
    ctrl == EMPTY
}

/// Returns `true` if `ctrl` is [`DELETED`].
#[inline(always)]
pub fn is_deleted(ctrl: u8) -> bool {
    ctrl == DELETED
}

/// Hash bits that select the initial probe offset once masked by the
/// capacity.
#[inline(always)]
pub fn h1(hash: u64) -> usize {
    hash as usize
}

/// The 7-bit tag stored in a full control byte.
///
/// Taken from the top of the hash so it stays independent of the low bits
/// consumed by [`h1`] for any capacity below 2^57.
#[inline(always)]
pub fn h2(hash: u64) -> u8 {
    (hash >> 57) as u8
}

/// A set of slot positions within one group, one bit per slot.
///
/// Iterating yields positions from the lowest slot index to the highest, which
/// is the order a lookup compares candidates in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitMask(pub u32);

impl BitMask {
    /// Returns `true` if at least one slot is in the set.
    #[inline(always)]
    pub fn any_bit_set(self) -> bool {
        self.0 != 0
    }

    /// Position of the lowest set bit, if any.
    #[inline(always)]
    pub fn lowest_set_bit(self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0.trailing_zeros() as usize)
        }
    }

    /// Number of unset slots below the lowest set bit.
    #[inline(always)]
    pub fn trailing_zeros(self) -> usize {
        self.0.trailing_zeros() as usize
    }

    /// Number of unset slots above the highest set bit, for a group of
    /// `width` slots.
    #[inline(always)]
    pub fn leading_zeros(self, width: usize) -> usize {
        debug_assert!(width <= 32);
        self.0.leading_zeros() as usize - (32 - width)
    }
}

impl Iterator for BitMask {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let bit = self.lowest_set_bit()?;
        self.0 &= self.0 - 1;
        Some(bit)
    }
}

/// A window of control bytes that is matched in a single probing step.
///
/// This is the pluggable part of the simulator: a table back-end picks the
/// group width its lookups use, and every computation here (probe sequence,
/// cloned control bytes, growth limits) follows from that choice.
pub trait Group: Copy {
    /// Number of control bytes in the group.
    const WIDTH: usize;

    /// Loads the first `WIDTH` bytes of `ctrl`.
    ///
    /// # Panics
    ///
    /// Panics if `ctrl` is shorter than `WIDTH`.
    fn load(ctrl: &[u8]) -> Self;

    /// Slots whose control byte equals `tag` exactly.
    fn match_tag(self, tag: u8) -> BitMask;

    /// Slots whose control byte is [`EMPTY`].
    fn match_empty(self) -> BitMask;

    /// Slots whose control byte is [`EMPTY`] or [`DELETED`].
    fn match_empty_or_deleted(self) -> BitMask;

    /// Slots holding a live element.
    fn match_full(self) -> BitMask;
}

#[cfg(all(target_arch = "x86", target_feature = "sse2"))]
use core::arch::x86 as arch;
#[cfg(all(target_arch = "x86_64", target_feature = "sse2"))]
use core::arch::x86_64 as arch;

/// A 16-byte group, matched with SSE2 where available.
#[derive(Clone, Copy)]
#[repr(C, align(16))]
pub struct Group16 {
    bytes: [u8; 16],
}

impl Group16 {
    #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), target_feature = "sse2"))]
    #[inline(always)]
    fn load_sse2(&self) -> arch::__m128i {
        // SAFETY: `Group16` is `#[repr(C, align(16))]` with `bytes` at offset 0,
        // so the aligned 16-byte load stays within `self`.
        unsafe { arch::_mm_load_si128(self.bytes.as_ptr() as *const arch::__m128i) }
    }

    #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), target_feature = "sse2"))]
    #[inline(always)]
    fn match_byte_sse2(&self, byte: u8) -> BitMask {
        // SAFETY: SSE2 is statically enabled for this target.
        unsafe {
            let cmp = arch::_mm_cmpeq_epi8(self.load_sse2(), arch::_mm_set1_epi8(byte as i8));
            BitMask(arch::_mm_movemask_epi8(cmp) as u16 as u32)
        }
    }

    #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), target_feature = "sse2"))]
    #[inline(always)]
    fn match_empty_or_deleted_sse2(&self) -> BitMask {
        // SAFETY: SSE2 is statically enabled for this target.
        // Signed, EMPTY (-128) and DELETED (-2) are the only bytes below
        // SENTINEL (-1).
        unsafe {
            let special = arch::_mm_set1_epi8(SENTINEL as i8);
            let cmp = arch::_mm_cmpgt_epi8(special, self.load_sse2());
            BitMask(arch::_mm_movemask_epi8(cmp) as u16 as u32)
        }
    }

    #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), target_feature = "sse2"))]
    #[inline(always)]
    fn match_full_sse2(&self) -> BitMask {
        // SAFETY: SSE2 is statically enabled for this target.
        unsafe { BitMask(!(arch::_mm_movemask_epi8(self.load_sse2()) as u32) & 0xFFFF) }
    }

    #[inline]
    fn match_where(&self, pred: impl Fn(u8) -> bool) -> BitMask {
        let mut bits = 0u32;
        for (i, &b) in self.bytes.iter().enumerate() {
            if pred(b) {
                bits |= 1 << i;
            }
        }
        BitMask(bits)
    }

    #[cfg_attr(
        all(any(target_arch = "x86", target_arch = "x86_64"), target_feature = "sse2"),
        allow(dead_code)
    )]
    fn match_byte_scalar(&self, byte: u8) -> BitMask {
        self.match_where(|b| b == byte)
    }

    #[cfg_attr(
        all(any(target_arch = "x86", target_arch = "x86_64"), target_feature = "sse2"),
        allow(dead_code)
    )]
    fn match_empty_or_deleted_scalar(&self) -> BitMask {
        self.match_where(|b| (b as i8) < (SENTINEL as i8))
    }

    #[cfg_attr(
        all(any(target_arch = "x86", target_arch = "x86_64"), target_feature = "sse2"),
        allow(dead_code)
    )]
    fn match_full_scalar(&self) -> BitMask {
        self.match_where(is_full)
    }
}

impl Group for Group16 {
    const WIDTH: usize = 16;

    #[inline(always)]
    fn load(ctrl: &[u8]) -> Self {
        let mut bytes = [EMPTY; 16];
        bytes.copy_from_slice(&ctrl[..16]);
        Group16 { bytes }
    }

    #[inline(always)]
    fn match_tag(self, tag: u8) -> BitMask {
        #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), target_feature = "sse2"))]
        {
            return self.match_byte_sse2(tag);
        }

        #[allow(unreachable_code)]
        self.match_byte_scalar(tag)
    }

    #[inline(always)]
    fn match_empty(self) -> BitMask {
        self.match_tag(EMPTY)
    }

    #[inline(always)]
    fn match_empty_or_deleted(self) -> BitMask {
        #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), target_feature = "sse2"))]
        {
            return self.match_empty_or_deleted_sse2();
        }

        #[allow(unreachable_code)]
        self.match_empty_or_deleted_scalar()
    }

    #[inline(always)]
    fn match_full(self) -> BitMask {
        #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), target_feature = "sse2"))]
        {
            return self.match_full_sse2();
        }

        #[allow(unreachable_code)]
        self.match_full_scalar()
    }
}

const LSBS: u64 = 0x0101_0101_0101_0101;
const LOW7: u64 = 0x7F7F_7F7F_7F7F_7F7F;
const MSBS: u64 = 0x8080_8080_8080_8080;

/// An 8-byte group matched with portable 64-bit SWAR arithmetic.
#[derive(Clone, Copy)]
pub struct Group8(u64);

impl Group8 {
    /// Gathers the high bit of every byte into bits `0..8`.
    #[inline(always)]
    fn compress(msbs: u64) -> BitMask {
        // After the shift each byte holds 0 or 1; the multiply lands byte `i`
        // in bit `56 + i` without carries between terms.
        BitMask((((msbs >> 7).wrapping_mul(0x0102_0408_1020_4080)) >> 56) as u32)
    }
}

impl Group for Group8 {
    const WIDTH: usize = 8;

    #[inline(always)]
    fn load(ctrl: &[u8]) -> Self {
        let mut bytes = [EMPTY; 8];
        bytes.copy_from_slice(&ctrl[..8]);
        Group8(u64::from_le_bytes(bytes))
    }

    #[inline(always)]
    fn match_tag(self, tag: u8) -> BitMask {
        // Exact zero-byte test on `ctrl ^ tag`: no false positives.
        let x = self.0 ^ LSBS.wrapping_mul(tag as u64);
        Self::compress(!(((x & LOW7) + LOW7) | x | LOW7))
    }

    #[inline(always)]
    fn match_empty(self) -> BitMask {
        // High bit set and bit 1 clear: EMPTY only.
        Self::compress(self.0 & !(self.0 << 6) & MSBS)
    }

    #[inline(always)]
    fn match_empty_or_deleted(self) -> BitMask {
        // High bit set and bit 0 clear: EMPTY or DELETED, never SENTINEL.
        Self::compress(self.0 & !(self.0 << 7) & MSBS)
    }

    #[inline(always)]
    fn match_full(self) -> BitMask {
        Self::compress(!self.0 & MSBS)
    }
}

cfg_if::cfg_if! {
    if #[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), target_feature = "sse2"))] {
        /// The group a table built for this target probes with.
        pub type DefaultGroup = Group16;
    } else {
        /// The group a table built for this target probes with.
        pub type DefaultGroup = Group8;
    }
}

/// The quadratic (triangular) sequence of group offsets a lookup visits.
///
/// Starting from `h1(hash) & capacity`, the n-th step jumps `n * WIDTH`
/// slots further, wrapping at the capacity. With `capacity + 1` a power of
/// two this visits every group exactly once before repeating.
#[derive(Clone, Debug)]
pub struct ProbeSeq<G> {
    mask: usize,
    offset: usize,
    index: usize,
    _group: PhantomData<G>,
}

impl<G: Group> ProbeSeq<G> {
    /// Starts the sequence for `hash` in a table of `capacity` slots.
    #[inline]
    pub fn new(hash: u64, capacity: usize) -> Self {
        debug_assert!(crate::capacity::is_valid_capacity(capacity));
        ProbeSeq {
            mask: capacity,
            offset: h1(hash) & capacity,
            index: 0,
            _group: PhantomData,
        }
    }

    /// Slot index the current group starts at.
    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Absolute slot index of position `i` within the current group.
    #[inline(always)]
    pub fn offset_of(&self, i: usize) -> usize {
        (self.offset + i) & self.mask
    }

    /// Total distance travelled so far, in slots.
    #[inline(always)]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Advances to the next group.
    #[inline]
    pub fn move_next(&mut self) {
        self.index += G::WIDTH;
        self.offset += self.index;
        self.offset &= self.mask;
        debug_assert!(
            self.index <= self.mask + G::WIDTH,
            "went past end of probe sequence"
        );
    }
}
