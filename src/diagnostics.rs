//! Probe-length and memory diagnostics.
//!
//! A SwissTable's public API hides how many probes a lookup takes. The
//! functions here replay the lookup algorithm over a [`TableRef`] to count
//! them, and reproduce the allocation-size formula to report memory use.
//! Nothing here mutates the table or allocates beyond the returned
//! histogram.

use alloc::vec::Vec;
use core::fmt;
use core::ops::Index;

use crate::capacity::alloc_size;
use crate::capacity::try_alloc_size;
use crate::capacity::try_capacity_for;
use crate::control::DefaultGroup;
use crate::control::Group;
use crate::control::ProbeSeq;
use crate::control::h2;
use crate::error::CapacityOverflow;
use crate::policy::Policy;
use crate::table::TableRef;

/// Returns the number of probes a lookup of `key` takes in `table`.
///
/// Returns 0 for a lookup with no collisions. Each failed equality check
/// against a slot with a matching tag counts as one probe, and so does each
/// move to the next group. The final, successful comparison does not count.
///
/// `key` does not need to be present: a miss counts probes up to the first
/// group containing an [`EMPTY`](crate::control::EMPTY) byte. Tombstones do
/// not end a probe.
///
/// # Examples
///
/// ```rust
/// # #[cfg(feature = "reference-table")]
/// # {
/// use core::hash::BuildHasherDefault;
///
/// use siphasher::sip::SipHasher;
/// use swiss_probe::Policy;
/// use swiss_probe::SetPolicy;
/// use swiss_probe::SwissTable;
/// use swiss_probe::probe_count;
///
/// let policy = SetPolicy::<u64, BuildHasherDefault<SipHasher>>::default();
/// let mut table = SwissTable::new();
/// for n in 0..100u64 {
///     table.insert_unique(policy.hash(&n), n, |v| policy.hash(v));
/// }
///
/// let view = table.view();
/// let hit = probe_count(&policy, &view, &42);
/// assert_eq!(hit, probe_count(&policy, &view, &42));
/// # }
/// ```
pub fn probe_count<P, G>(policy: &P, table: &TableRef<'_, P::Slot, G>, key: &P::Key) -> usize
where
    P: Policy + ?Sized,
    G: Group,
{
    if table.capacity() == 0 {
        return 0;
    }

    let hash = policy.hash(key);
    let tag = h2(hash);
    let mut seq = ProbeSeq::<G>::new(hash, table.capacity());
    let mut num_probes = 0;

    loop {
        let group = table.group(seq.offset());
        for bit in group.match_tag(tag) {
            let index = seq.offset_of(bit);
            // SAFETY: A byte equal to `tag` is full. Bytes inside the slot range
            // name their own slot, and cloned bytes past the sentinel mirror the
            // slot that `offset_of` wraps around to, per the contract of
            // `TableRef::from_raw_parts`.
            let slot = unsafe { table.slot_unchecked(index) };
            if policy.eq(slot, key) {
                return num_probes;
            }

            num_probes += 1;
        }

        if group.match_empty().any_bit_set() {
            return num_probes;
        }

        seq.move_next();
        num_probes += 1;
    }
}

/// Returns the number of bytes the table has allocated for its control bytes
/// and slots, or 0 if it has not allocated.
///
/// Heap memory owned by the elements themselves is not included.
pub fn allocated_bytes<P, G>(policy: &P, table: &TableRef<'_, P::Slot, G>) -> usize
where
    P: Policy + ?Sized,
    G: Group,
{
    let capacity = table.capacity();
    if capacity == 0 {
        return 0;
    }

    alloc_size::<G>(capacity, policy.slot_size(), policy.slot_align())
}

/// Returns the fewest bytes a table holding `size` elements can have
/// allocated, for tables probing with this target's [`DefaultGroup`].
///
/// # Panics
///
/// Panics if the size does not fit in a `usize`.
pub fn lower_bound_allocated_bytes<P>(policy: &P, size: usize) -> usize
where
    P: Policy + ?Sized,
{
    lower_bound_allocated_bytes_for::<DefaultGroup, P>(policy, size)
}

/// Returns the fewest bytes a table holding `size` elements can have
/// allocated, for tables probing with `G`.
///
/// # Panics
///
/// Panics if the size does not fit in a `usize`.
pub fn lower_bound_allocated_bytes_for<G, P>(policy: &P, size: usize) -> usize
where
    G: Group,
    P: Policy + ?Sized,
{
    match try_lower_bound_allocated_bytes::<G, P>(policy, size) {
        Ok(bytes) => bytes,
        Err(err) => panic!("{err}"),
    }
}

/// Fallible form of [`lower_bound_allocated_bytes_for`].
pub fn try_lower_bound_allocated_bytes<G, P>(
    policy: &P,
    size: usize,
) -> Result<usize, CapacityOverflow>
where
    G: Group,
    P: Policy + ?Sized,
{
    let capacity = try_capacity_for::<G>(size)?;
    if capacity == 0 {
        return Ok(0);
    }

    try_alloc_size::<G>(capacity, policy.slot_size(), policy.slot_align())
}

/// Returns the probe count of every live element, binned by count.
///
/// `histogram[n]` is the number of elements whose lookup takes `n` probes.
/// The buckets sum to the number of live elements.
pub fn probe_histogram<P, G>(policy: &P, table: &TableRef<'_, P::Slot, G>) -> ProbeHistogram
where
    P: Policy + ?Sized,
    G: Group,
{
    let mut counts: Vec<usize> = Vec::new();
    for slot in table.iter() {
        let num_probes = probe_count(policy, table, policy.key(slot));
        if counts.len() <= num_probes {
            counts.resize(num_probes + 1, 0);
        }
        counts[num_probes] += 1;
    }

    let histogram = ProbeHistogram { counts };
    log::trace!(
        "probe histogram over capacity {}: {} elements in {} buckets",
        table.capacity(),
        histogram.total_elements(),
        histogram.len()
    );
    histogram
}

/// Returns aggregate probe statistics over every live element.
pub fn probe_summary<P, G>(policy: &P, table: &TableRef<'_, P::Slot, G>) -> ProbeSummary
where
    P: Policy + ?Sized,
    G: Group,
{
    probe_histogram(policy, table).summary()
}

/// Distribution of probe counts across a table's elements.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProbeHistogram {
    counts: Vec<usize>,
}

impl ProbeHistogram {
    /// Bucket counts, indexed by probe count.
    pub fn as_slice(&self) -> &[usize] {
        &self.counts
    }

    /// Consumes the histogram, returning the bucket counts.
    pub fn into_vec(self) -> Vec<usize> {
        self.counts
    }

    /// Number of buckets: one more than the highest probe count seen.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns `true` if no element was counted.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Count in bucket `bucket`, 0 past [`len`](Self::len).
    ///
    /// Indexing with `histogram[bucket]` panics past the end instead.
    pub fn get(&self, bucket: usize) -> usize {
        self.counts.get(bucket).copied().unwrap_or(0)
    }

    /// Highest probe count of any element.
    pub fn max_probes(&self) -> Option<usize> {
        self.counts.len().checked_sub(1)
    }

    /// Number of elements counted.
    pub fn total_elements(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Sum of the probe counts of all elements.
    pub fn total_probes(&self) -> usize {
        self.counts
            .iter()
            .enumerate()
            .map(|(probes, &count)| probes * count)
            .sum()
    }

    /// Folds the histogram into a [`ProbeSummary`].
    pub fn summary(&self) -> ProbeSummary {
        ProbeSummary::new(self.total_elements(), self.total_probes())
    }

    /// Pretty-prints the histogram to stdout.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        print!("{self}");
    }
}

impl Index<usize> for ProbeHistogram {
    type Output = usize;

    fn index(&self, probes: usize) -> &usize {
        &self.counts[probes]
    }
}

impl From<ProbeHistogram> for Vec<usize> {
    fn from(histogram: ProbeHistogram) -> Self {
        histogram.counts
    }
}

/// Renders a horizontal bar chart, one row per probe count.
impl fmt::Display for ProbeHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use core::fmt::Write;

        const MAX_BAR: usize = 60;
        const PARTIAL: [char; 8] = [' ', '▏', '▎', '▍', '▌', '▋', '▊', '▉'];

        let max = self.counts.iter().copied().max().unwrap_or(0);
        if max == 0 {
            return writeln!(f, "probe histogram: empty");
        }

        let total_units = MAX_BAR * 8;
        let label_width = (self.counts.len() - 1).checked_ilog10().unwrap_or(0) as usize + 1;
        writeln!(f, "probe histogram ({} entries):", self.total_elements())?;

        for (probes, &count) in self.counts.iter().enumerate() {
            write!(f, "{probes:>label_width$} | ")?;
            if count > 0 {
                let units = (count as u128 * total_units as u128).div_ceil(max as u128) as usize;
                for _ in 0..units / 8 {
                    f.write_char('█')?;
                }
                if units % 8 > 0 {
                    f.write_char(PARTIAL[units % 8])?;
                }
            }
            writeln!(f, " ({count})")?;
        }

        Ok(())
    }
}

/// Aggregate probe statistics for a table.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ProbeSummary {
    /// Number of elements counted.
    pub total_elements: usize,
    /// Sum of the probe counts of all elements.
    pub total_probes: usize,
    /// `total_probes / total_elements`, or `None` for an empty table.
    pub mean: Option<f64>,
}

impl ProbeSummary {
    fn new(total_elements: usize, total_probes: usize) -> Self {
        let mean = if total_elements == 0 {
            None
        } else {
            Some(total_probes as f64 / total_elements as f64)
        };

        ProbeSummary {
            total_elements,
            total_probes,
            mean,
        }
    }

    /// Pretty-prints the summary to stdout.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("{self}");
    }
}

impl fmt::Display for ProbeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "elements: {}, probes: {}, ",
            self.total_elements, self.total_probes
        )?;
        match self.mean {
            Some(mean) => write!(f, "mean: {mean:.3}"),
            None => write!(f, "mean: undefined"),
        }
    }
}
