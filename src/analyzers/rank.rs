//! Dense ranking for rate tables.

/// Assigns dense ranks to a series already sorted descending: equal
/// values share a rank and the next distinct value gets rank + 1, with
/// no gaps.
pub fn dense_ranks(sorted_desc: &[f64]) -> Vec<u32> {
    let mut ranks = Vec::with_capacity(sorted_desc.len());
    let mut rank = 0u32;
    let mut previous: Option<f64> = None;
    for &value in sorted_desc {
        if previous != Some(value) {
            rank += 1;
            previous = Some(value);
        }
        ranks.push(rank);
    }
    ranks
}
