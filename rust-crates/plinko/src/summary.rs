use crate::Slot;

/// English ordinal for a 1-based rank: `1st`, `2nd`, `3rd`, `4th`, `11th`, `21st`.
pub fn ordinal(rank: usize) -> String {
    let suffix = match (rank % 10, rank % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{rank}{suffix}")
}

/// Popup text shown once every winner has been revealed.
/// Slots are displayed 1-based, in rank order.
pub fn winners_summary(slots: &[Slot]) -> String {
    let label = if slots.len() > 1 { "Winners" } else { "Winner" };
    let body = slots
        .iter()
        .enumerate()
        .map(|(index, slot)| format!("#{} ({})", slot + 1, ordinal(index + 1)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{label}: {body}!")
}
