// 📏 Similarity Scorer - How alike are two payer names?
//
// Score = 2 * LCS / (len_a + len_b), scaled to 0..=100 and rounded half up.
// LCS is taken over the lower-cased characters, so the score is
// case-insensitive and symmetric by construction.
//
// Examples:
// - "Delta Dental of Arizona" vs "Delta Dental Arizona" → 93
// - "Delta Dental of Arizona" vs "Delta Dent AZ"        → 72

/// Score two names for likeness, 0 (nothing shared) to 100 (identical)
pub fn score(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 100;
    }
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let lcs = lcs_length(&a, &b);

    // round(200 * lcs / total), half up, in integer arithmetic
    ((400 * lcs + total) / (2 * total)) as u8
}

/// Length of the longest common subsequence of two character slices
///
/// Two-row dynamic programming table: O(len_a * len_b) time, O(len_b) space.
fn lcs_length(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                std::cmp::max(prev[j + 1], curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

// ============================================================================
// TESTS
// ============================================================================
