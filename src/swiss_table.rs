use alloc::alloc::handle_alloc_error;
use core::alloc::Layout;
use core::fmt::Debug;
use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::ptr::NonNull;

use crate::capacity::capacity_overflow;
use crate::capacity::capacity_to_growth;
use crate::capacity::num_cloned_bytes;
use crate::capacity::try_capacity_for;
use crate::control::DELETED;
use crate::control::DefaultGroup;
use crate::control::EMPTY;
use crate::control::Group;
use crate::control::ProbeSeq;
use crate::control::SENTINEL;
use crate::control::h2;
use crate::control::is_deleted;
use crate::control::is_empty;
use crate::control::is_full;
use crate::table::Iter;
use crate::table::TableRef;

#[derive(Debug)]
struct DataLayout {
    layout: Layout,
    ctrl_len: usize,
    slots_offset: usize,
}

impl DataLayout {
    const fn unallocated() -> Self {
        DataLayout {
            layout: Layout::new::<()>(),
            ctrl_len: 0,
            slots_offset: 0,
        }
    }

    fn new<T, G: Group>(capacity: usize) -> Self {
        let ctrl_len = capacity
            .checked_add(1 + num_cloned_bytes::<G>())
            .unwrap_or_else(|| capacity_overflow());
        let ctrl_layout = Layout::array::<u8>(ctrl_len).unwrap_or_else(|_| capacity_overflow());
        let slots_layout =
            Layout::array::<MaybeUninit<T>>(capacity).unwrap_or_else(|_| capacity_overflow());

        let (layout, _) = Layout::new::<()>()
            .extend(ctrl_layout)
            .unwrap_or_else(|_| capacity_overflow());
        let (layout, slots_offset) = layout
            .extend(slots_layout)
            .unwrap_or_else(|_| capacity_overflow());

        DataLayout {
            layout,
            ctrl_len,
            slots_offset,
        }
    }

    /// Allocates storage for `capacity` slots with every control byte
    /// `EMPTY` apart from the sentinel.
    fn allocate(&self, capacity: usize) -> NonNull<u8> {
        debug_assert!(self.layout.size() != 0);
        // SAFETY: A layout for a non-zero capacity always includes the
        // control bytes, so its size is non-zero. Allocation failure is
        // handled. `capacity < ctrl_len`, so the sentinel write is in bounds.
        unsafe {
            let raw_alloc = alloc::alloc::alloc(self.layout);
            if raw_alloc.is_null() {
                handle_alloc_error(self.layout);
            }

            core::ptr::write_bytes(raw_alloc, EMPTY, self.ctrl_len);
            *raw_alloc.add(capacity) = SENTINEL;

            NonNull::new_unchecked(raw_alloc)
        }
    }
}

/// A minimal open-addressing table with SwissTable lookup, used to produce
/// realistic [`TableRef`] snapshots.
///
/// Like the tables it stands in for, it takes hashes and equality closures
/// from the caller instead of owning a hasher. Control bytes and slots share
/// one allocation, laid out exactly as
/// [`alloc_size`](crate::capacity::alloc_size) describes.
///
/// # Examples
///
/// ```rust
/// use swiss_probe::SwissTable;
///
/// fn hash(n: &u64) -> u64 {
///     n.wrapping_mul(0x9E37_79B9_7F4A_7C15)
/// }
///
/// let mut table = SwissTable::new();
/// for n in 0..10u64 {
///     table.insert_unique(hash(&n), n, hash);
/// }
///
/// assert_eq!(table.len(), 10);
/// assert_eq!(table.find(hash(&3), |&v| v == 3), Some(&3));
/// assert_eq!(table.remove(hash(&3), |&v| v == 3), Some(3));
/// assert_eq!(table.find(hash(&3), |&v| v == 3), None);
/// ```
pub struct SwissTable<T, G = DefaultGroup> {
    layout: DataLayout,
    alloc: NonNull<u8>,

    capacity: usize,
    len: usize,
    growth_left: usize,

    _marker: PhantomData<T>,
    _group: PhantomData<G>,
}

// SAFETY: The table uniquely owns its allocation and the elements in it.
unsafe impl<T: Send, G> Send for SwissTable<T, G> {}
// SAFETY: Shared access only hands out shared references to elements.
unsafe impl<T: Sync, G> Sync for SwissTable<T, G> {}

impl<T, G: Group> Debug for SwissTable<T, G> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SwissTable")
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .field("growth_left", &self.growth_left)
            .field("allocation_size", &self.allocation_size())
            .finish()
    }
}

impl<T, G: Group> Default for SwissTable<T, G> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T, G> Drop for SwissTable<T, G> {
    fn drop(&mut self) {
        if self.capacity == 0 {
            return;
        }

        // SAFETY: Full control bytes name initialized slots, and the
        // allocation was made with `self.layout`.
        unsafe {
            if core::mem::needs_drop::<T>() && self.len > 0 {
                let ctrl = core::slice::from_raw_parts(self.alloc.as_ptr(), self.capacity);
                let slots = self
                    .alloc
                    .as_ptr()
                    .add(self.layout.slots_offset)
                    .cast::<T>();
                for (index, &byte) in ctrl.iter().enumerate() {
                    if is_full(byte) {
                        slots.add(index).drop_in_place();
                    }
                }
            }

            alloc::alloc::dealloc(self.alloc.as_ptr(), self.layout.layout);
        }
    }
}

impl<T> SwissTable<T, DefaultGroup> {
    /// Creates an empty table. It does not allocate until the first insert.
    pub const fn new() -> Self {
        Self::empty()
    }

    /// Creates a table that holds at least `capacity` elements without
    /// growing.
    ///
    /// # Panics
    ///
    /// Panics if the allocation size overflows.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_reserved(capacity)
    }
}

impl<T, G: Group> SwissTable<T, G> {
    /// Creates an empty table probing with `G`.
    pub const fn empty() -> Self {
        SwissTable {
            layout: DataLayout::unallocated(),
            alloc: NonNull::dangling(),
            capacity: 0,
            len: 0,
            growth_left: 0,
            _marker: PhantomData,
            _group: PhantomData,
        }
    }

    /// Creates a table probing with `G` that holds at least `elements`
    /// elements without growing.
    ///
    /// # Panics
    ///
    /// Panics if the allocation size overflows.
    pub fn with_reserved(elements: usize) -> Self {
        let capacity = try_capacity_for::<G>(elements).unwrap_or_else(|_| capacity_overflow());
        if capacity == 0 {
            return Self::empty();
        }

        let layout = DataLayout::new::<T, G>(capacity);
        let alloc = layout.allocate(capacity);
        SwissTable {
            layout,
            alloc,
            capacity,
            len: 0,
            growth_left: capacity_to_growth::<G>(capacity),
            _marker: PhantomData,
            _group: PhantomData,
        }
    }

    /// Number of live elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the table holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots. Always `0` or of the form `2^n - 1`.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of inserts into `EMPTY` slots left before the table must grow
    /// or rehash.
    pub fn growth_left(&self) -> usize {
        self.growth_left
    }

    /// Size in bytes of the backing allocation, or `0` if the table has not
    /// allocated.
    pub fn allocation_size(&self) -> usize {
        self.layout.layout.size()
    }

    /// A read-only snapshot for the diagnostics.
    pub fn view(&self) -> TableRef<'_, T, G> {
        if self.capacity == 0 {
            return TableRef::empty();
        }

        // SAFETY: The control array carries the sentinel and mirrored bytes,
        // and every full byte names an initialized slot.
        unsafe { TableRef::from_raw_parts(self.capacity, self.ctrl(), self.slots()) }
    }

    /// Returns an iterator over all elements, in slot order.
    pub fn iter(&self) -> Iter<'_, T> {
        self.view().iter()
    }

    /// Returns the element with hash `hash` for which `eq` returns `true`.
    pub fn find(&self, hash: u64, eq: impl Fn(&T) -> bool) -> Option<&T> {
        let index = self.find_index(hash, eq)?;
        // SAFETY: `find_index` only returns full slots.
        Some(unsafe { &*self.slot_ptr(index) })
    }

    /// Mutable form of [`find`](Self::find).
    pub fn find_mut(&mut self, hash: u64, eq: impl Fn(&T) -> bool) -> Option<&mut T> {
        let index = self.find_index(hash, eq)?;
        // SAFETY: `find_index` only returns full slots.
        Some(unsafe { &mut *self.slot_ptr(index) })
    }

    /// Inserts `value` without checking whether an equal element is already
    /// present.
    ///
    /// `hasher` must return the hash each stored element was inserted with;
    /// it is called to rehash elements when the table grows.
    pub fn insert_unique(&mut self, hash: u64, value: T, hasher: impl Fn(&T) -> u64) -> &mut T {
        if self.capacity == 0 {
            self.resize(1, &hasher);
        }

        let mut index = self.find_first_non_full(hash);
        if self.growth_left == 0 && !is_deleted(self.ctrl()[index]) {
            self.rehash_and_grow(&hasher);
            index = self.find_first_non_full(hash);
        }

        self.growth_left -= usize::from(is_empty(self.ctrl()[index]));
        self.set_ctrl(index, h2(hash));
        self.len += 1;

        let slot = self.slot_ptr(index);
        // SAFETY: `index` was empty or deleted, so writing does not leak an
        // element. Its control byte is now full.
        unsafe {
            slot.write(value);
            &mut *slot
        }
    }

    /// Removes and returns the element with hash `hash` for which `eq`
    /// returns `true`.
    pub fn remove(&mut self, hash: u64, eq: impl Fn(&T) -> bool) -> Option<T> {
        let index = self.find_index(hash, eq)?;
        self.erase_meta(index);
        // SAFETY: The slot was full, and its control byte no longer is, so the
        // element is read out exactly once.
        Some(unsafe { self.slot_ptr(index).read() })
    }

    /// Removes all elements, keeping the allocation.
    pub fn clear(&mut self) {
        if self.capacity == 0 {
            return;
        }

        if core::mem::needs_drop::<T>() && self.len > 0 {
            for index in 0..self.capacity {
                if is_full(self.ctrl()[index]) {
                    // SAFETY: Full control bytes name initialized slots.
                    unsafe { self.slot_ptr(index).drop_in_place() };
                }
            }
        }

        let capacity = self.capacity;
        let ctrl = self.ctrl_mut();
        ctrl.fill(EMPTY);
        ctrl[capacity] = SENTINEL;

        self.len = 0;
        self.growth_left = capacity_to_growth::<G>(capacity);
    }

    fn ctrl(&self) -> &[u8] {
        // SAFETY: The first `ctrl_len` bytes of the allocation are initialized
        // control bytes. When unallocated, `ctrl_len` is 0.
        unsafe { core::slice::from_raw_parts(self.alloc.as_ptr(), self.layout.ctrl_len) }
    }

    fn ctrl_mut(&mut self) -> &mut [u8] {
        // SAFETY: As for `ctrl`, and `&mut self` guarantees exclusive access.
        unsafe { core::slice::from_raw_parts_mut(self.alloc.as_ptr(), self.layout.ctrl_len) }
    }

    fn slots(&self) -> &[MaybeUninit<T>] {
        debug_assert!(self.capacity != 0);
        // SAFETY: The slot array starts at `slots_offset`, aligned for `T`,
        // and holds `capacity` slots.
        unsafe {
            core::slice::from_raw_parts(
                self.alloc
                    .as_ptr()
                    .add(self.layout.slots_offset)
                    .cast::<MaybeUninit<T>>(),
                self.capacity,
            )
        }
    }

    #[inline(always)]
    fn slot_ptr(&self, index: usize) -> *mut T {
        debug_assert!(index < self.capacity);
        // SAFETY: `index < capacity` keeps the pointer inside the slot array.
        unsafe {
            self.alloc
                .as_ptr()
                .add(self.layout.slots_offset)
                .cast::<T>()
                .add(index)
        }
    }

    /// Sets the control byte of `index` and its cloned copy.
    fn set_ctrl(&mut self, index: usize, byte: u8) {
        debug_assert!(index < self.capacity);
        let capacity = self.capacity;
        let cloned = num_cloned_bytes::<G>();
        let mirror = (index.wrapping_sub(cloned) & capacity) + (cloned & capacity);

        let ctrl = self.ctrl_mut();
        ctrl[index] = byte;
        ctrl[mirror] = byte;
    }

    fn find_index(&self, hash: u64, eq: impl Fn(&T) -> bool) -> Option<usize> {
        if self.capacity == 0 {
            return None;
        }

        let tag = h2(hash);
        let mut seq = ProbeSeq::<G>::new(hash, self.capacity);
        loop {
            let group = G::load(&self.ctrl()[seq.offset()..]);
            for bit in group.match_tag(tag) {
                let index = seq.offset_of(bit);
                // SAFETY: A byte equal to `tag` is full, so the slot is
                // initialized.
                if eq(unsafe { &*self.slot_ptr(index) }) {
                    return Some(index);
                }
            }

            if group.match_empty().any_bit_set() {
                return None;
            }

            seq.move_next();
        }
    }

    /// First `EMPTY` or `DELETED` slot on the probe sequence for `hash`.
    ///
    /// In a table with no free slot this may return the sentinel's index,
    /// which callers reject because it is not a tombstone.
    fn find_first_non_full(&self, hash: u64) -> usize {
        debug_assert!(self.capacity != 0);
        let mut seq = ProbeSeq::<G>::new(hash, self.capacity);
        loop {
            let group = G::load(&self.ctrl()[seq.offset()..]);
            if let Some(bit) = group.match_empty_or_deleted().lowest_set_bit() {
                return seq.offset_of(bit);
            }

            seq.move_next();
        }
    }

    /// Marks `index` free. The slot becomes `EMPTY` only if no lookup could
    /// have probed past it: every group-sized window containing it also
    /// contains an `EMPTY` byte.
    fn erase_meta(&mut self, index: usize) {
        let index_before = index.wrapping_sub(G::WIDTH) & self.capacity;
        let empty_after = G::load(&self.ctrl()[index..]).match_empty();
        let empty_before = G::load(&self.ctrl()[index_before..]).match_empty();

        let was_never_full = empty_before.any_bit_set()
            && empty_after.any_bit_set()
            && empty_after.trailing_zeros() + empty_before.leading_zeros(G::WIDTH) < G::WIDTH;

        self.set_ctrl(index, if was_never_full { EMPTY } else { DELETED });
        self.growth_left += usize::from(was_never_full);
        self.len -= 1;
    }

    #[cold]
    fn rehash_and_grow(&mut self, hasher: &impl Fn(&T) -> u64) {
        if self.capacity > G::WIDTH && (self.len as u128) * 32 <= (self.capacity as u128) * 25 {
            log::debug!(
                "rehashing in place at capacity {}: {} elements, {} tombstones",
                self.capacity,
                self.len,
                capacity_to_growth::<G>(self.capacity) - self.len - self.growth_left
            );
            self.resize(self.capacity, hasher);
        } else {
            let capacity = self
                .capacity
                .checked_mul(2)
                .and_then(|c| c.checked_add(1))
                .unwrap_or_else(|| capacity_overflow());
            self.resize(capacity, hasher);
        }
    }

    fn resize(&mut self, capacity: usize, hasher: &impl Fn(&T) -> u64) {
        log::debug!(
            "resizing table from capacity {} to {} ({} elements)",
            self.capacity,
            capacity,
            self.len
        );

        let new_layout = DataLayout::new::<T, G>(capacity);
        let new_alloc = new_layout.allocate(capacity);
        let old_layout = core::mem::replace(&mut self.layout, new_layout);
        let old_alloc = core::mem::replace(&mut self.alloc, new_alloc);
        let old_capacity = core::mem::replace(&mut self.capacity, capacity);
        self.growth_left = capacity_to_growth::<G>(capacity) - self.len;

        if old_capacity == 0 {
            return;
        }

        // SAFETY: The old allocation stays live until the end of this block.
        // Each full slot is moved out exactly once into a free slot of the new
        // allocation, and the old storage is freed without dropping elements.
        unsafe {
            let old_ctrl = core::slice::from_raw_parts(old_alloc.as_ptr(), old_capacity);
            let old_slots = old_alloc.as_ptr().add(old_layout.slots_offset).cast::<T>();
            for (index, &byte) in old_ctrl.iter().enumerate() {
                if !is_full(byte) {
                    continue;
                }

                let src = old_slots.add(index);
                let hash = hasher(&*src);
                let target = self.find_first_non_full(hash);
                self.set_ctrl(target, h2(hash));
                core::ptr::copy_nonoverlapping(src, self.slot_ptr(target), 1);
            }

            alloc::alloc::dealloc(old_alloc.as_ptr(), old_layout.layout);
        }
    }
}

impl<'a, T, G: Group> IntoIterator for &'a SwissTable<T, G> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::Cell;
    use core::hash::Hasher;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;
    use test_log::test;

    use super::*;
    use crate::Policy;
    use crate::capacity::alloc_size;
    use crate::control::Group8;
    use crate::control::Group16;
    use crate::diagnostics::allocated_bytes;
    use crate::diagnostics::lower_bound_allocated_bytes_for;
    use crate::diagnostics::probe_count;
    use crate::diagnostics::probe_histogram;

    struct HashState {
        k0: u64,
        k1: u64,
    }

    impl HashState {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k0: rng.try_next_u64().unwrap(),
                k1: rng.try_next_u64().unwrap(),
            }
        }

        fn hash_u64(&self, key: u64) -> u64 {
            let mut h = SipHasher::new_with_keys(self.k0, self.k1);
            h.write_u64(key);
            h.finish()
        }
    }

    impl Policy for HashState {
        type Key = u64;
        type Slot = u64;

        fn hash(&self, key: &u64) -> u64 {
            self.hash_u64(*key)
        }

        fn eq(&self, slot: &u64, key: &u64) -> bool {
            slot == key
        }

        fn key<'s>(&self, slot: &'s u64) -> &'s u64 {
            slot
        }
    }

    fn filled<G: Group>(state: &HashState, keys: impl IntoIterator<Item = u64>) -> SwissTable<u64, G> {
        let mut table = SwissTable::<u64, G>::empty();
        for key in keys {
            table.insert_unique(state.hash_u64(key), key, |&k| state.hash_u64(k));
        }
        table
    }

    #[test]
    fn insert_find_remove() {
        let state = HashState::default();
        let mut table = filled::<DefaultGroup>(&state, 0..1000);
        assert_eq!(table.len(), 1000);

        for key in 0..1000 {
            assert_eq!(table.find(state.hash_u64(key), |&k| k == key), Some(&key));
        }
        assert_eq!(table.find(state.hash_u64(1000), |&k| k == 1000), None);

        for key in (0..1000).step_by(2) {
            assert_eq!(table.remove(state.hash_u64(key), |&k| k == key), Some(key));
        }
        assert_eq!(table.len(), 500);
        assert_eq!(table.remove(state.hash_u64(0), |&k| k == 0), None);

        for key in 0..1000 {
            let found = table.find(state.hash_u64(key), |&k| k == key);
            assert_eq!(found.is_some(), key % 2 == 1, "key {key}");
        }

        if let Some(v) = table.find_mut(state.hash_u64(1), |&k| k == 1) {
            *v = 1;
        }
        let mut keys: Vec<u64> = table.iter().copied().collect();
        keys.sort_unstable();
        assert_eq!(keys, (1..1000).step_by(2).collect::<Vec<_>>());
    }

    #[test]
    fn growth_sequence() {
        let state = HashState::default();
        let mut table = SwissTable::<u64, Group16>::empty();
        assert_eq!(table.capacity(), 0);
        assert_eq!(table.allocation_size(), 0);

        let mut capacities = Vec::new();
        for key in 0..16u64 {
            table.insert_unique(state.hash_u64(key), key, |&k| state.hash_u64(k));
            capacities.push(table.capacity());
        }
        assert_eq!(
            capacities,
            [1, 3, 3, 7, 7, 7, 7, 15, 15, 15, 15, 15, 15, 15, 31, 31]
        );

        let mut table = SwissTable::<u64, Group8>::empty();
        for key in 0..7u64 {
            table.insert_unique(state.hash_u64(key), key, |&k| state.hash_u64(k));
        }
        assert_eq!(table.capacity(), 15);
    }

    #[test]
    fn allocation_matches_diagnostics() {
        let state = HashState::default();
        let mut table = SwissTable::<u64, Group16>::empty();
        assert_eq!(allocated_bytes(&state, &table.view()), 0);

        for key in 0..500u64 {
            table.insert_unique(state.hash_u64(key), key, |&k| state.hash_u64(k));
            assert_eq!(allocated_bytes(&state, &table.view()), table.allocation_size());
        }
        for key in 0..250u64 {
            table.remove(state.hash_u64(key), |&k| k == key);
            assert_eq!(allocated_bytes(&state, &table.view()), table.allocation_size());
        }
        assert_eq!(
            table.allocation_size(),
            alloc_size::<Group16>(table.capacity(), 8, core::mem::align_of::<u64>())
        );
    }

    #[test]
    fn reserved_tables_hit_lower_bound() {
        fn check<G: Group>(state: &HashState) {
            for n in 0..200usize {
                let mut table = SwissTable::<u64, G>::with_reserved(n);
                let lower_bound = lower_bound_allocated_bytes_for::<G, _>(state, n);
                assert_eq!(table.allocation_size(), lower_bound, "width {} n {n}", G::WIDTH);

                let capacity = table.capacity();
                for key in 0..n as u64 {
                    table.insert_unique(state.hash_u64(key), key, |&k| state.hash_u64(k));
                }
                assert_eq!(table.capacity(), capacity, "width {} n {n}", G::WIDTH);
                assert!(lower_bound <= allocated_bytes(state, &table.view()));
            }
        }

        let state = HashState::default();
        check::<Group8>(&state);
        check::<Group16>(&state);
    }

    #[test]
    fn grown_tables_stay_above_lower_bound() {
        let state = HashState::default();
        let table = filled::<DefaultGroup>(&state, 0..3000);
        assert!(
            crate::lower_bound_allocated_bytes(&state, table.len())
                <= allocated_bytes(&state, &table.view())
        );
    }

    #[test]
    fn remove_from_sparse_group_frees_slot() {
        let state = HashState::default();
        let mut table = SwissTable::<u64, Group16>::with_reserved(10);
        table.insert_unique(state.hash_u64(1), 1, |&k| state.hash_u64(k));
        let growth = table.growth_left();

        table.remove(state.hash_u64(1), |&k| k == 1);
        assert_eq!(table.growth_left(), growth + 1);
        assert!(table.view().ctrl()[..table.capacity()].iter().all(|&b| b == EMPTY));
    }

    #[test]
    fn churn_rehashes_in_place() {
        let state = HashState::default();
        let mut table = SwissTable::<u64, Group16>::with_reserved(100);
        assert_eq!(table.capacity(), 127);

        for key in 0..10_000u64 {
            table.insert_unique(state.hash_u64(key), key, |&k| state.hash_u64(k));
            if key >= 10 {
                let old = key - 10;
                assert_eq!(table.remove(state.hash_u64(old), |&k| k == old), Some(old));
            }
        }

        assert_eq!(table.capacity(), 127);
        assert_eq!(table.len(), 10);
        for key in 9_990..10_000u64 {
            assert!(table.find(state.hash_u64(key), |&k| k == key).is_some());
        }
        assert_eq!(probe_histogram(&state, &table.view()).total_elements(), 10);
    }

    #[test]
    fn churn_below_25_32_load_keeps_capacity() {
        let state = HashState::default();
        let mut table = SwissTable::<u64, Group16>::with_reserved(100);
        assert_eq!(table.capacity(), 127);

        // 80 live elements: 80 * 32 <= 127 * 25, so full tombstone groups
        // are reclaimed without growing.
        for key in 0..20_000u64 {
            table.insert_unique(state.hash_u64(key), key, |&k| state.hash_u64(k));
            if key >= 80 {
                let old = key - 80;
                assert_eq!(table.remove(state.hash_u64(old), |&k| k == old), Some(old));
            }
        }

        assert_eq!(table.capacity(), 127);
        assert_eq!(table.len(), 80);
        for key in 19_920..20_000u64 {
            assert!(table.find(state.hash_u64(key), |&k| k == key).is_some());
        }
    }

    #[test]
    fn churn_above_25_32_load_grows() {
        let state = HashState::default();
        let mut table = SwissTable::<u64, Group16>::with_reserved(100);

        // 100 * 32 > 127 * 25
        for key in 0..20_000u64 {
            table.insert_unique(state.hash_u64(key), key, |&k| state.hash_u64(k));
            if key >= 100 {
                let old = key - 100;
                assert_eq!(table.remove(state.hash_u64(old), |&k| k == old), Some(old));
            }
        }

        assert_eq!(table.capacity(), 255);
        assert_eq!(table.len(), 100);
    }

    #[test]
    fn probe_count_matches_failed_comparisons() {
        let state = HashState::default();
        let table = filled::<DefaultGroup>(&state, 0..2000);
        let view = table.view();
        let capacity = view.capacity();

        for key in 0..2000u64 {
            let hash = state.hash_u64(key);
            let calls = Cell::new(0usize);
            let found = table.find(hash, |&k| {
                calls.set(calls.get() + 1);
                k == key
            });
            let found = found.unwrap();

            let failed = calls.get() - 1;
            let probes = probe_count(&state, &view, &key);
            assert!(probes >= failed, "key {key}: {probes} < {failed}");

            let slot_index = (0..capacity)
                .find(|&i| view.slot(i).is_some_and(|slot| core::ptr::eq(slot, found)))
                .unwrap();
            let home = crate::control::h1(hash) & capacity;
            if slot_index.wrapping_sub(home) & capacity < DefaultGroup::WIDTH {
                assert_eq!(probes, failed, "key {key}");
            }
        }
    }

    #[test]
    fn clear_drops_elements() {
        let tracker = Rc::new(());
        let mut table = SwissTable::<Rc<()>, Group8>::empty();
        for n in 0..50u64 {
            table.insert_unique(n, tracker.clone(), |_| 0);
        }
        assert_eq!(Rc::strong_count(&tracker), 51);

        let capacity = table.capacity();
        table.clear();
        assert_eq!(Rc::strong_count(&tracker), 1);
        assert_eq!(table.len(), 0);
        assert_eq!(table.capacity(), capacity);
        assert_eq!(table.growth_left(), capacity_to_growth::<Group8>(capacity));
        assert!(table.iter().next().is_none());

        table.insert_unique(3, tracker.clone(), |_| 0);
        drop(table);
        assert_eq!(Rc::strong_count(&tracker), 1);
    }

    #[test]
    fn debug_output() {
        let table = SwissTable::<u64>::with_capacity(20);
        let rendered = alloc::format!("{table:?}");
        assert!(rendered.contains("SwissTable"));
        assert!(rendered.contains("capacity: 31"));
        assert!(table.is_empty());
        assert_eq!((&table).into_iter().count(), 0);
    }
}
