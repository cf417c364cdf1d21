use core::fmt;

/// The size of a table's backing allocation does not fit in a `usize`.
///
/// No live table can be this large, so this only surfaces when sizing a
/// hypothetical table from an element count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CapacityOverflow;

impl fmt::Display for CapacityOverflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("capacity overflow while computing table allocation size")
    }
}

impl core::error::Error for CapacityOverflow {}
