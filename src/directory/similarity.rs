//! Fuzzy name similarity
//!
//! Scores are symmetric, case-insensitive and normalized to 0..=100 so they
//! can be compared against a percentage threshold.

/// Lowercases and collapses runs of whitespace
fn normalize(name: &str) -> Vec<char> {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .chars()
        .collect()
}

/// Length of the longest common subsequence
fn common_subsequence_len(a: &[char], b: &[char]) -> usize {
    let mut row = vec![0usize; b.len() + 1];
    for &ca in a {
        let mut diagonal = 0;
        for (j, &cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb {
                diagonal + 1
            } else {
                above.max(row[j])
            };
            diagonal = above;
        }
    }
    row[b.len()]
}

/// Similarity of two names as a whole-number percentage
///
/// Indel ratio over the normalized strings: twice the common subsequence
/// length divided by the combined length. Identical names score 100; an
/// empty name scores 0 against anything.
pub fn similarity_score(a: &str, b: &str) -> u8 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let total = (a.len() + b.len()) as f64;
    let matched = 2.0 * common_subsequence_len(&a, &b) as f64;
    (100.0 * matched / total).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        identical = { "John Doe", "John Doe", 100 },
        case_only = { "JOHN DOE", "john doe", 100 },
        extra_spaces = { "  John   Doe ", "John Doe", 100 },
        disjoint = { "abc", "xyz", 0 },
        dropped_last_letter = { "John Do", "John Doe", 93 },
        dropped_inner_letter = { "Anne Lee", "Ann Lee", 93 },
        one_substitution_in_ten = { "Jane Smyth", "Jane Smith", 90 },
        two_edits = { "Jon Does", "John Doe", 88 },
        empty = { "", "John Doe", 0 },
    )]
    fn test_scores(a: &str, b: &str, expected: u8) {
        assert_eq!(similarity_score(a, b), expected);
    }

    #[test]
    fn test_symmetric() {
        for (a, b) in [("Alice Smith", "alice smyth"), ("Bob", "Robert"), ("", "x")] {
            assert_eq!(similarity_score(a, b), similarity_score(b, a));
        }
    }
}
