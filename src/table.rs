use core::fmt::Debug;
use core::marker::PhantomData;
use core::mem::MaybeUninit;

use crate::capacity::is_valid_capacity;
use crate::capacity::num_control_bytes;
use crate::control::DefaultGroup;
use crate::control::EMPTY;
use crate::control::Group;
use crate::control::is_full;

/// A read-only view of a live SwissTable.
///
/// The view borrows the table's control bytes and slot array for `'a`, so the
/// table cannot be mutated while any diagnostic holds it. `G` is the group
/// the table probes with; it must match the table's lookup path for probe
/// counts to be meaningful.
pub struct TableRef<'a, T, G = DefaultGroup> {
    capacity: usize,
    ctrl: &'a [u8],
    slots: &'a [MaybeUninit<T>],
    _group: PhantomData<G>,
}

impl<T, G> Clone for TableRef<'_, T, G> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, G> Copy for TableRef<'_, T, G> {}

impl<T, G: Group> Debug for TableRef<'_, T, G> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use alloc::format;
        use alloc::string::ToString;
        use alloc::vec::Vec;

        f.debug_struct("TableRef")
            .field("capacity", &self.capacity)
            .field("group_width", &G::WIDTH)
            .field(
                "ctrl",
                &self
                    .ctrl
                    .chunks(G::WIDTH)
                    .map(|w| {
                        w.iter()
                            .map(|b| match *b {
                                EMPTY => "..".to_string(),
                                b if is_full(b) => format!("{b:02x}"),
                                b => format!("{b:02X}"),
                            })
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<'a, T, G: Group> TableRef<'a, T, G> {
    /// A view of a table that has never allocated.
    pub const fn empty() -> Self {
        TableRef {
            capacity: 0,
            ctrl: &[],
            slots: &[],
            _group: PhantomData,
        }
    }

    /// Creates a view over a table's raw storage.
    ///
    /// # Safety
    ///
    /// - `capacity` is `0` or of the form `2^n - 1`, and `slots.len()` equals
    ///   `capacity`.
    /// - When `capacity > 0`, `ctrl` holds at least `capacity + G::WIDTH`
    ///   bytes: one per slot, the sentinel at index `capacity`, and the first
    ///   `G::WIDTH - 1` slot bytes cloned after it.
    /// - Every full control byte at index `i < capacity` has an initialized
    ///   element in `slots[i]`, and every full cloned byte mirrors one.
    pub unsafe fn from_raw_parts(
        capacity: usize,
        ctrl: &'a [u8],
        slots: &'a [MaybeUninit<T>],
    ) -> Self {
        debug_assert!(capacity == 0 || is_valid_capacity(capacity));
        debug_assert!(capacity == 0 || ctrl.len() >= num_control_bytes::<G>(capacity));
        debug_assert_eq!(slots.len(), capacity);

        TableRef {
            capacity,
            ctrl,
            slots,
            _group: PhantomData,
        }
    }

    /// Number of element slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The full control array, sentinel and cloned bytes included.
    pub fn ctrl(&self) -> &'a [u8] {
        self.ctrl
    }

    /// Number of live elements.
    pub fn len(&self) -> usize {
        self.ctrl[..self.capacity]
            .iter()
            .filter(|&&b| is_full(b))
            .count()
    }

    /// Returns `true` if the table holds no live elements.
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// The element at `index`, or `None` if that slot is not full.
    pub fn slot(&self, index: usize) -> Option<&'a T> {
        if index < self.capacity && is_full(self.ctrl[index]) {
            // SAFETY: A full control byte guarantees an initialized slot, per
            // the contract of `from_raw_parts`.
            Some(unsafe { self.slots[index].assume_init_ref() })
        } else {
            None
        }
    }

    /// The element at `index`.
    ///
    /// # Safety
    ///
    /// `index < capacity` and the control byte for `index` is full.
    #[inline(always)]
    pub(crate) unsafe fn slot_unchecked(&self, index: usize) -> &'a T {
        debug_assert!(index < self.capacity && is_full(self.ctrl[index]));
        // SAFETY: Caller ensures `index` names a full slot within bounds.
        unsafe { self.slots.get_unchecked(index).assume_init_ref() }
    }

    /// The group of control bytes starting at slot `offset`.
    #[inline(always)]
    pub(crate) fn group(&self, offset: usize) -> G {
        G::load(&self.ctrl[offset..])
    }

    /// Returns an iterator over all live elements, in slot order.
    pub fn iter(&self) -> Iter<'a, T> {
        Iter {
            ctrl: &self.ctrl[..self.capacity],
            slots: self.slots,
            index: 0,
        }
    }
}

impl<'a, T, G: Group> IntoIterator for &TableRef<'a, T, G> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over the live elements of a [`TableRef`].
pub struct Iter<'a, T> {
    ctrl: &'a [u8],
    slots: &'a [MaybeUninit<T>],
    index: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.ctrl.len() {
            let index = self.index;
            self.index += 1;
            if is_full(self.ctrl[index]) {
                // SAFETY: Full control bytes name initialized slots, per the
                // contract of `TableRef::from_raw_parts`.
                return Some(unsafe { self.slots[index].assume_init_ref() });
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.ctrl.len() - self.index))
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use super::*;
    use crate::control::DELETED;
    use crate::control::Group8;
    use crate::control::SENTINEL;

    /// Capacity-7 table over 8-wide groups holding `{0: 10, 3: 13, 5: 15}`,
    /// with a tombstone in slot 1.
    fn fixture() -> (Vec<u8>, Vec<MaybeUninit<u32>>) {
        let mut ctrl = vec![EMPTY; 7 + 8];
        let mut slots: Vec<MaybeUninit<u32>> = (0..7).map(|_| MaybeUninit::uninit()).collect();
        for (index, tag) in [(0, 0x11), (3, 0x22), (5, 0x33)] {
            ctrl[index] = tag;
            ctrl[8 + index] = tag;
            slots[index] = MaybeUninit::new(10 + index as u32);
        }
        ctrl[1] = DELETED;
        ctrl[9] = DELETED;
        ctrl[7] = SENTINEL;
        (ctrl, slots)
    }

    #[test]
    fn iterates_live_slots() {
        let (ctrl, slots) = fixture();
        // SAFETY: The fixture marks exactly the initialized slots as full.
        let table = unsafe { TableRef::<u32, Group8>::from_raw_parts(7, &ctrl, &slots) };

        assert_eq!(table.capacity(), 7);
        assert_eq!(table.len(), 3);
        assert!(!table.is_empty());
        assert_eq!(table.iter().copied().collect::<Vec<_>>(), [10, 13, 15]);
        assert_eq!((&table).into_iter().count(), 3);

        assert_eq!(table.slot(0), Some(&10));
        assert_eq!(table.slot(1), None);
        assert_eq!(table.slot(2), None);
        assert_eq!(table.slot(7), None);
        assert_eq!(table.slot(100), None);
    }

    #[test]
    fn empty_view() {
        let table = TableRef::<u64, Group8>::empty();
        assert_eq!(table.capacity(), 0);
        assert_eq!(table.len(), 0);
        assert!(table.is_empty());
        assert!(table.iter().next().is_none());
    }

    #[test]
    fn debug_output_shows_groups() {
        let (ctrl, slots) = fixture();
        // SAFETY: The fixture marks exactly the initialized slots as full.
        let table = unsafe { TableRef::<u32, Group8>::from_raw_parts(7, &ctrl, &slots) };
        let rendered = alloc::format!("{table:?}");
        assert!(rendered.contains("11, FE, .., 22"), "{rendered}");
        assert!(rendered.contains("group_width: 8"), "{rendered}");
    }
}
