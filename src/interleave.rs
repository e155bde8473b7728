/// Merge two sequences so elements of each are spread as evenly as possible
/// across the output, in proportion to their lengths.
///
/// Output index `i` takes from `a` when `(i * n) % (m + n) < m`, else from
/// `b`. Both inputs are consumed exactly once, in order.
pub fn interleave<T>(a: Vec<T>, b: Vec<T>) -> Vec<T> {
    let (m, n) = (a.len(), b.len());
    let total = m + n;
    let mut a = a.into_iter();
    let mut b = b.into_iter();
    let mut merged = Vec::with_capacity(total);
    for i in 0..total {
        let next = if (i * n) % total < m { a.next() } else { b.next() };
        merged.extend(next);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_by_divmod_rule() {
        let merged = interleave(vec!["a", "b"], vec!["x", "y", "z"]);
        assert_eq!(merged, vec!["a", "x", "b", "y", "z"]);
    }

    #[test]
    fn empty_sides() {
        assert_eq!(interleave(Vec::<i32>::new(), vec![1, 2]), vec![1, 2]);
        assert_eq!(interleave(vec![1, 2], Vec::new()), vec![1, 2]);
        assert!(interleave(Vec::<i32>::new(), Vec::new()).is_empty());
    }

    #[test]
    fn sparse_side_is_spread_out() {
        let sweeps = vec!["S"; 2];
        let tracks = vec!["T"; 8];
        let merged = interleave(sweeps, tracks);
        let positions: Vec<usize> = merged
            .iter()
            .enumerate()
            .filter(|(_, x)| **x == "S")
            .map(|(i, _)| i)
            .collect();
        assert_eq!(positions, vec![0, 5]);
    }

    #[test]
    fn consumes_every_element_in_order() {
        for m in 0..7 {
            for n in 0..7 {
                let a: Vec<i32> = (0..m).collect();
                let b: Vec<i32> = (100..100 + n).collect();
                let merged = interleave(a.clone(), b.clone());
                assert_eq!(merged.len(), (m + n) as usize);
                let from_a: Vec<i32> = merged.iter().copied().filter(|x| *x < 100).collect();
                let from_b: Vec<i32> = merged.iter().copied().filter(|x| *x >= 100).collect();
                assert_eq!(from_a, a);
                assert_eq!(from_b, b);
            }
        }
    }
}
