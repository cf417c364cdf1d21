//! Capacity and allocation-size arithmetic mirroring the table's growth
//! policy.
//!
//! A table's capacity is always of the form `2^n - 1` so that `capacity`
//! doubles as the probe mask. The backing allocation holds the control bytes
//! (one per slot, a sentinel, and `WIDTH - 1` cloned bytes so that group loads
//! never run past the end) followed by the slot array, aligned for the slot
//! type.

use crate::control::Group;
use crate::error::CapacityOverflow;

/// Maximum load factor, as `numerator / denominator` of the capacity.
pub const MAX_LOAD_FACTOR: (usize, usize) = (7, 8);

#[cold]
#[inline(never)]
pub(crate) fn capacity_overflow() -> ! {
    panic!("{}", CapacityOverflow)
}

/// Returns `true` if `capacity` is of the form `2^n - 1` with `n > 0`.
#[inline(always)]
pub fn is_valid_capacity(capacity: usize) -> bool {
    capacity > 0 && capacity.wrapping_add(1) & capacity == 0
}

/// Rounds `requested` up to the nearest valid capacity.
///
/// `0` normalizes to `1`, the smallest table that can hold an element.
#[inline]
pub fn normalize_capacity(requested: usize) -> usize {
    if requested == 0 {
        1
    } else {
        usize::MAX >> requested.leading_zeros()
    }
}

/// Number of elements a table of `capacity` slots holds before it must grow.
#[inline]
pub fn capacity_to_growth<G: Group>(capacity: usize) -> usize {
    debug_assert!(is_valid_capacity(capacity));
    // With 8-wide groups, a full table of 7 would leave a probe window made of
    // seven full bytes and the sentinel, with no EMPTY to stop a miss.
    if G::WIDTH == 8 && capacity == 7 {
        return 6;
    }
    capacity - capacity / MAX_LOAD_FACTOR.1
}

fn checked_growth_to_lower_bound_capacity<G: Group>(growth: usize) -> Option<usize> {
    if G::WIDTH == 8 && growth == 7 {
        return Some(8);
    }
    growth.checked_add(growth.saturating_sub(1) / MAX_LOAD_FACTOR.0)
}

/// Smallest capacity (before normalization) whose growth limit admits
/// `growth` elements. This is the inverse of [`capacity_to_growth`].
///
/// # Panics
///
/// Panics if the result does not fit in a `usize`.
#[inline]
pub fn growth_to_lower_bound_capacity<G: Group>(growth: usize) -> usize {
    checked_growth_to_lower_bound_capacity::<G>(growth).unwrap_or_else(|| capacity_overflow())
}

/// Number of control bytes cloned past the sentinel.
#[inline(always)]
pub const fn num_cloned_bytes<G: Group>() -> usize {
    G::WIDTH - 1
}

/// Length of the control array of a table with `capacity` slots.
#[inline]
pub fn num_control_bytes<G: Group>(capacity: usize) -> usize {
    capacity + 1 + num_cloned_bytes::<G>()
}

fn try_slot_offset<G: Group>(capacity: usize, slot_align: usize) -> Result<usize, CapacityOverflow> {
    debug_assert!(slot_align.is_power_of_two());
    capacity
        .checked_add(1 + num_cloned_bytes::<G>())
        .and_then(|ctrl| ctrl.checked_add(slot_align - 1))
        .map(|end| end & !(slot_align - 1))
        .ok_or(CapacityOverflow)
}

/// Byte offset of the slot array from the start of the allocation.
#[inline]
pub fn slot_offset<G: Group>(capacity: usize, slot_align: usize) -> usize {
    try_slot_offset::<G>(capacity, slot_align).unwrap_or_else(|_| capacity_overflow())
}

/// Size in bytes of the allocation backing a table of `capacity` slots, or
/// an error if it does not fit in a `usize`.
pub fn try_alloc_size<G: Group>(
    capacity: usize,
    slot_size: usize,
    slot_align: usize,
) -> Result<usize, CapacityOverflow> {
    debug_assert!(is_valid_capacity(capacity));
    let offset = try_slot_offset::<G>(capacity, slot_align)?;
    capacity
        .checked_mul(slot_size)
        .and_then(|slots| slots.checked_add(offset))
        .ok_or(CapacityOverflow)
}

/// Size in bytes of the allocation backing a table of `capacity` slots.
///
/// # Panics
///
/// Panics if the size does not fit in a `usize`.
#[inline]
pub fn alloc_size<G: Group>(capacity: usize, slot_size: usize, slot_align: usize) -> usize {
    try_alloc_size::<G>(capacity, slot_size, slot_align).unwrap_or_else(|_| capacity_overflow())
}

/// Capacity a table reserving room for `elements` would allocate, or `0` if
/// it would not allocate at all.
pub fn try_capacity_for<G: Group>(elements: usize) -> Result<usize, CapacityOverflow> {
    let capacity = checked_growth_to_lower_bound_capacity::<G>(elements).ok_or(CapacityOverflow)?;
    if capacity == 0 {
        return Ok(0);
    }
    Ok(normalize_capacity(capacity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::Group8;
    use crate::control::Group16;

    #[test]
    fn valid_capacities() {
        for n in 1..usize::BITS {
            assert!(is_valid_capacity((1usize << n) - 1));
        }
        assert!(is_valid_capacity(usize::MAX));
        assert!(!is_valid_capacity(0));
        assert!(!is_valid_capacity(8));
        assert!(!is_valid_capacity(14));
    }

    #[test]
    fn normalize_rounds_up() {
        assert_eq!(normalize_capacity(0), 1);
        assert_eq!(normalize_capacity(1), 1);
        assert_eq!(normalize_capacity(2), 3);
        assert_eq!(normalize_capacity(3), 3);
        assert_eq!(normalize_capacity(8), 15);
        assert_eq!(normalize_capacity(15), 15);
        assert_eq!(normalize_capacity(16), 31);
        assert_eq!(normalize_capacity(usize::MAX), usize::MAX);
        for n in 1..4096 {
            let capacity = normalize_capacity(n);
            assert!(is_valid_capacity(capacity));
            assert!(capacity >= n);
            assert!(capacity / 2 < n);
        }
    }

    #[test]
    fn growth_round_trips() {
        fn check<G: Group>() {
            for growth in 0..10_000 {
                let capacity = normalize_capacity(growth_to_lower_bound_capacity::<G>(growth));
                assert!(
                    capacity_to_growth::<G>(capacity) >= growth,
                    "width {} growth {growth} capacity {capacity}",
                    G::WIDTH
                );
            }
            for n in 1..20 {
                let capacity = (1usize << n) - 1;
                let growth = capacity_to_growth::<G>(capacity);
                assert!(growth <= capacity);
                assert!(normalize_capacity(growth_to_lower_bound_capacity::<G>(growth)) <= capacity);
            }
        }

        check::<Group8>();
        check::<Group16>();
    }

    #[test]
    fn small_table_growth() {
        assert_eq!(capacity_to_growth::<Group16>(1), 1);
        assert_eq!(capacity_to_growth::<Group16>(7), 7);
        assert_eq!(capacity_to_growth::<Group8>(7), 6);
        assert_eq!(capacity_to_growth::<Group16>(15), 14);
        assert_eq!(capacity_to_growth::<Group16>(127), 112);

        assert_eq!(growth_to_lower_bound_capacity::<Group16>(0), 0);
        assert_eq!(growth_to_lower_bound_capacity::<Group16>(7), 7);
        assert_eq!(growth_to_lower_bound_capacity::<Group8>(7), 8);
        assert_eq!(growth_to_lower_bound_capacity::<Group16>(8), 9);
    }

    #[test]
    fn alloc_size_layout() {
        // 15 slots + sentinel + 15 cloned bytes, padded to 8, then 15 * 8.
        assert_eq!(slot_offset::<Group16>(15, 8), 32);
        assert_eq!(alloc_size::<Group16>(15, 8, 8), 32 + 120);
        // 7 + 1 + 7 control bytes.
        assert_eq!(alloc_size::<Group8>(7, 4, 4), 16 + 28);
        assert_eq!(alloc_size::<Group8>(7, 1, 1), 15 + 7);
        assert_eq!(alloc_size::<Group16>(1, 0, 1), 17);
        assert_eq!(alloc_size::<Group16>(3, 24, 16), 32 + 72);
    }

    #[test]
    fn capacity_for_elements() {
        assert_eq!(try_capacity_for::<Group16>(0), Ok(0));
        assert_eq!(try_capacity_for::<Group16>(1), Ok(1));
        assert_eq!(try_capacity_for::<Group16>(7), Ok(7));
        assert_eq!(try_capacity_for::<Group16>(8), Ok(15));
        assert_eq!(try_capacity_for::<Group8>(6), Ok(7));
        assert_eq!(try_capacity_for::<Group8>(7), Ok(15));
    }

    #[test]
    fn overflow_is_reported() {
        assert_eq!(try_capacity_for::<Group16>(usize::MAX), Err(CapacityOverflow));
        assert_eq!(
            try_alloc_size::<Group16>(usize::MAX >> 1, 16, 8),
            Err(CapacityOverflow)
        );
    }

    #[test]
    #[should_panic(expected = "capacity overflow")]
    fn alloc_size_panics_on_overflow() {
        alloc_size::<Group16>(usize::MAX >> 1, 16, 8);
    }
}
