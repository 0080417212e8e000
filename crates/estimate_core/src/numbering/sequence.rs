//! Next-sequence computation over a snapshot of sibling numbers.

/// Returns `max(existing) + 1`, or `1` when no sibling holds a number.
///
/// `None` entries (siblings that never received a number) are ignored.
/// Returns `None` when a sibling already holds `u32::MAX`; there is no
/// free number above it.
pub fn next_co_sequence_no<I>(existing: I) -> Option<u32>
where
    I: IntoIterator<Item = Option<u32>>,
{
    match existing.into_iter().flatten().max() {
        Some(max) => max.checked_add(1),
        None => Some(1),
    }
}

#[cfg(test)]
mod tests {
    use super::next_co_sequence_no;

    #[test]
    fn empty_snapshot_starts_at_one() {
        assert_eq!(next_co_sequence_no(Vec::<Option<u32>>::new()), Some(1));
        assert_eq!(next_co_sequence_no([None, None]), Some(1));
    }

    #[test]
    fn gaps_and_nulls_use_max_plus_one() {
        assert_eq!(next_co_sequence_no([Some(1), Some(3), None, Some(2)]), Some(4));
        assert_eq!(next_co_sequence_no([Some(7)]), Some(8));
    }

    #[test]
    fn exhausted_range_has_no_next_number() {
        assert_eq!(next_co_sequence_no([Some(u32::MAX)]), None);
        assert_eq!(next_co_sequence_no([Some(u32::MAX - 1)]), Some(u32::MAX));
    }
}
