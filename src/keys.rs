//! Work-list arithmetic: set difference and chunk partitioning
//!
//! Object keys are opaque strings compared for equality only. A key list keeps
//! file order and may hold duplicates; nothing here deduplicates beyond what
//! the difference itself removes.

use std::collections::HashSet;

/// Opaque remote object path
pub type Key = String;

/// Keys of `source`, in original order, that do not appear in `excluded`
///
/// Membership is tested against a hash set so both lists can be in the
/// millions.
pub fn diff(source: Vec<Key>, excluded: &[Key]) -> Vec<Key> {
    if excluded.is_empty() {
        return source;
    }

    let excluded: HashSet<&str> = excluded.iter().map(String::as_str).collect();
    source
        .into_iter()
        .filter(|key| !excluded.contains(key.as_str()))
        .collect()
}

/// Apply [`diff`] successively, feeding each output into the next exclusion
pub fn remaining_work(master: Vec<Key>, exclusions: &[&[Key]]) -> Vec<Key> {
    exclusions
        .iter()
        .fold(master, |remaining, excluded| diff(remaining, excluded))
}

/// Size of every chunk except the last one
///
/// `floor(len / workers)`, never below 1. A zero worker count is treated as one
/// worker.
pub fn chunk_size(len: usize, worker_count: usize) -> usize {
    (len / worker_count.max(1)).max(1)
}

/// Partition `list` into at most `worker_count` contiguous chunks
///
/// When `worker_count` exceeds the list length it is clamped, so no chunk is
/// ever empty. The remainder goes to the final chunk instead of forming an
/// extra short one: 10 keys over 3 workers gives `[3, 3, 4]`.
pub fn chunk(list: Vec<Key>, worker_count: usize) -> Vec<Vec<Key>> {
    if list.is_empty() {
        return Vec::new();
    }

    let workers = worker_count.clamp(1, list.len());
    let size = chunk_size(list.len(), workers);

    let mut chunks = Vec::with_capacity(workers);
    let mut rest = list;
    for _ in 1..workers {
        let tail = rest.split_off(size);
        chunks.push(rest);
        rest = tail;
    }
    chunks.push(rest);

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> Vec<Key> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn numbered(n: usize) -> Vec<Key> {
        (0..n).map(|i| format!("2018/06/{i:02}/file.txt")).collect()
    }

    #[test]
    fn test_diff_preserves_source_order() {
        let source = keys(&["d", "a", "c", "b"]);
        let excluded = keys(&["c", "x"]);
        assert_eq!(diff(source, &excluded), keys(&["d", "a", "b"]));
    }

    #[test]
    fn test_diff_against_empty_is_identity() {
        let source = keys(&["a", "b", "a"]);
        assert_eq!(diff(source.clone(), &[]), source);
    }

    #[test]
    fn test_diff_against_self_is_empty() {
        let source = keys(&["a", "b", "c"]);
        assert!(diff(source.clone(), &source).is_empty());
    }

    #[test]
    fn test_diff_removes_every_duplicate() {
        let source = keys(&["a", "b", "a", "c", "a"]);
        assert_eq!(diff(source, &keys(&["a"])), keys(&["b", "c"]));
    }

    #[test]
    fn test_remaining_work_applies_logs_in_sequence() {
        let master = keys(&["a", "b", "c", "d", "e"]);
        let requested = keys(&["b", "d"]);
        let available = keys(&["a"]);

        let remaining = remaining_work(master, &[&requested, &available]);
        assert_eq!(remaining, keys(&["c", "e"]));
    }

    #[test]
    fn test_chunk_remainder_goes_to_last() {
        let chunks = chunk(numbered(10), 3);
        let sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 4]);
    }

    #[test]
    fn test_chunk_clamps_worker_count() {
        let chunks = chunk(numbered(2), 8);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() == 1));
    }

    #[test]
    fn test_chunk_concatenation_reproduces_list() {
        let list = numbered(23);
        let chunks = chunk(list.clone(), 4);
        assert_eq!(chunks.concat(), list);
    }

    #[test]
    fn test_chunk_empty_list() {
        assert!(chunk(Vec::new(), 4).is_empty());
    }

    #[test]
    fn test_chunk_size_floor() {
        assert_eq!(chunk_size(10, 3), 3);
        assert_eq!(chunk_size(2, 8), 1);
        assert_eq!(chunk_size(5, 0), 5);
    }
}
