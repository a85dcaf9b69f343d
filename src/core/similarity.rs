// CleanLog - core/similarity.rs
//
// Ratcliff/Obershelp string similarity: 2 * M / T, where M is the number of
// characters in matching blocks found by recursively taking the longest
// common substring and T is the combined length. No junk heuristics are
// applied; counterparty names are short.

use std::collections::HashMap;

/// Similarity of two counterparty names in [0, 1].
///
/// Inputs are trimmed. Two empty names are identical (1.0); one empty name
/// never matches (0.0).
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let (sa, sb) = (a.trim(), b.trim());
    if sa.is_empty() || sb.is_empty() {
        return if sa == sb { 1.0 } else { 0.0 };
    }
    ratio(sa, sb)
}

/// Raw Ratcliff/Obershelp ratio over characters.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

/// Total size of all matching blocks.
fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, &c) in b.iter().enumerate() {
        b2j.entry(c).or_default().push(j);
    }

    let mut matched = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(a, &b2j, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            queue.push((i + k, ahi, j + k, bhi));
        }
    }
    matched
}

/// Longest common block in a[alo..ahi] x b[blo..bhi].
///
/// Ties go to the block starting earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[char],
    b2j: &HashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_k) = (alo, blo, 0);
    // j2len[j] = length of the match ending at a[i-1], b[j]
    let mut j2len: HashMap<usize, usize> = HashMap::new();
    for (i, c) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next: HashMap<usize, usize> = HashMap::new();
        if let Some(positions) = b2j.get(c) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = j
                    .checked_sub(1)
                    .and_then(|p| j2len.get(&p))
                    .copied()
                    .unwrap_or(0)
                    + 1;
                next.insert(j, k);
                if k > best_k {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_k = k;
                }
            }
        }
        j2len = next;
    }
    (best_i, best_j, best_k)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_identical_names() {
        assert!(approx(name_similarity("星巴克", "星巴克"), 1.0));
    }

    #[test]
    fn test_empty_handling() {
        assert!(approx(name_similarity("", ""), 1.0));
        assert!(approx(name_similarity("  ", ""), 1.0));
        assert!(approx(name_similarity("abc", ""), 0.0));
    }

    #[test]
    fn test_reference_ratios() {
        // Reference values from the classic Ratcliff/Obershelp examples.
        assert!(approx(ratio("abcd", "bcde"), 0.75));
        assert!(approx(
            ratio(
                "private Thread currentThread;",
                "private volatile Thread currentThread;"
            ),
            58.0 / 67.0
        ));
        assert!(approx(ratio("abc", "xyz"), 0.0));
    }

    #[test]
    fn test_partial_chinese_names() {
        // "星巴克咖啡" vs "星巴克": 3 shared chars out of 8 total -> 0.75
        assert!(approx(name_similarity("星巴克咖啡", "星巴克"), 0.75));
    }

    #[test]
    fn test_ties_prefer_earliest_block() {
        // Both "ab" blocks have length 2; the earliest in `a` wins and
        // consumes all of `b`.
        assert!(approx(ratio("abxab", "ab"), 4.0 / 7.0));
    }
}
