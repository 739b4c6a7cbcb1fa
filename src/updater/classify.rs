//! Free-text classification of channel messages
//!
//! Matching is plain substring search. The channel's wording is not under
//! our control, so nothing stricter is attempted.

use crate::types::Region;

/// Phrase announcing that an alert was raised
pub const ALERT_RAISED: &str = "Повітряна тривога";

/// Phrase announcing that an alert was cleared
pub const ALERT_CLEARED: &str = "Відбій";

/// `Some(true)` for a raised alert, `Some(false)` for a cleared one,
/// `None` when neither phrase occurs
pub fn classify(sentence: &str) -> Option<bool> {
    if sentence.contains(ALERT_RAISED) {
        Some(true)
    } else if sentence.contains(ALERT_CLEARED) {
        Some(false)
    } else {
        None
    }
}

/// Index of the first region, in list order, whose native name occurs in `sentence`
pub fn find_region(regions: &[Region], sentence: &str) -> Option<usize> {
    regions
        .iter()
        .position(|region| sentence.contains(region.native_name.as_str()))
}
