//! Feature importance ranking.

/// A ranked input column.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedFeature {
    /// Column name.
    pub name: String,
    /// Normalized importance; sums to 1.0 across all columns when the
    /// forest contains at least one split.
    pub importance: f64,
    /// 1-based rank (1 = most important).
    pub rank: usize,
}

/// Normalize per-column totals and rank them.
///
/// The sort is stable, so equal scores keep their original column order.
pub(crate) fn rank_features(totals: &[f64], names: &[String]) -> Vec<RankedFeature> {
    let sum: f64 = totals.iter().sum();
    let mut ranked: Vec<RankedFeature> = names
        .iter()
        .zip(totals)
        .map(|(name, &total)| RankedFeature {
            name: name.clone(),
            importance: if sum > 0.0 { total / sum } else { 0.0 },
            rank: 0,
        })
        .collect();

    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    for (i, feature) in ranked.iter_mut().enumerate() {
        feature.rank = i + 1;
    }
    ranked
}

#[cfg(test)]
mod tests {
    use super::rank_features;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("c{i}")).collect()
    }

    #[test]
    fn normalized_and_descending() {
        let ranked = rank_features(&[1.0, 3.0, 0.0, 4.0], &names(4));
        let order: Vec<&str> = ranked.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(order, ["c3", "c1", "c0", "c2"]);
        assert!((ranked[0].importance - 0.5).abs() < 1e-12);
        let total: f64 = ranked.iter().map(|f| f.importance).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert_eq!(ranked.iter().map(|f| f.rank).collect::<Vec<_>>(), [1, 2, 3, 4]);
    }

    #[test]
    fn ties_keep_column_order() {
        let ranked = rank_features(&[2.0, 1.0, 2.0, 1.0], &names(4));
        let order: Vec<&str> = ranked.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(order, ["c0", "c2", "c1", "c3"]);
    }

    #[test]
    fn no_splits_gives_zeros() {
        let ranked = rank_features(&[0.0, 0.0], &names(2));
        assert!(ranked.iter().all(|f| f.importance == 0.0));
        assert_eq!(ranked[0].name, "c0");
    }
}
