//! Retrieval metrics.

use std::collections::HashSet;

/// Share of gold documents found among the first `k` retrieved ones.
///
/// Returns 0.0 when `gold` is empty.
pub fn recall_at_k(retrieved: &[String], gold: &[String], k: usize) -> f64 {
    if gold.is_empty() {
        return 0.0;
    }
    let top_k: HashSet<&str> = retrieved.iter().take(k).map(String::as_str).collect();
    let gold_set: HashSet<&str> = gold.iter().map(String::as_str).collect();
    let hits = top_k.intersection(&gold_set).count();
    hits as f64 / gold.len() as f64
}

/// Mean recall@k over `(retrieved, gold)` pairs. Returns 0.0 for no pairs.
pub fn mean_recall_at_k<'a, I>(results: I, k: usize) -> f64
where
    I: IntoIterator<Item = (&'a [String], &'a [String])>,
{
    let (sum, count) = results
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), (retrieved, gold)| {
            (sum + recall_at_k(retrieved, gold, k), count + 1)
        });
    if count == 0 { 0.0 } else { sum / count as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_recall_full() {
        let retrieved = ids(&["a", "b", "c"]);
        let gold = ids(&["a", "c"]);
        assert_eq!(recall_at_k(&retrieved, &gold, 10), 1.0);
    }

    #[test]
    fn test_recall_respects_k() {
        let retrieved = ids(&["x", "y", "a"]);
        let gold = ids(&["a"]);
        assert_eq!(recall_at_k(&retrieved, &gold, 2), 0.0);
        assert_eq!(recall_at_k(&retrieved, &gold, 3), 1.0);
    }

    #[test]
    fn test_recall_partial() {
        let retrieved = ids(&["a", "x"]);
        let gold = ids(&["a", "b", "c", "d"]);
        assert!((recall_at_k(&retrieved, &gold, 10) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_recall_empty_gold() {
        assert_eq!(recall_at_k(&ids(&["a"]), &[], 10), 0.0);
    }

    #[test]
    fn test_recall_duplicate_retrieved_counted_once() {
        let retrieved = ids(&["a", "a", "a"]);
        let gold = ids(&["a", "b"]);
        assert!((recall_at_k(&retrieved, &gold, 10) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_mean_recall() {
        let r1 = ids(&["a"]);
        let g1 = ids(&["a"]);
        let r2 = ids(&["x"]);
        let g2 = ids(&["b"]);
        let mean = mean_recall_at_k(
            [(r1.as_slice(), g1.as_slice()), (r2.as_slice(), g2.as_slice())],
            10,
        );
        assert!((mean - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_mean_recall_empty() {
        assert_eq!(mean_recall_at_k(std::iter::empty(), 10), 0.0);
    }
}
