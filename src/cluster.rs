//! Greedy proximity clustering of detection centroids.
//!
//! Detections from a single inference call often overlap: one tree crown can
//! produce several nearby boxes. The counter groups centroids whose chained
//! pairwise distance stays under a threshold and reports the number of groups
//! as the number of unique objects.
//!
//! The scan is deliberately greedy and order-dependent: each centroid joins
//! the first existing cluster containing any member closer than the threshold,
//! checked in cluster creation order and member insertion order. A point
//! within threshold of two separate clusters joins whichever it is compared
//! against first and does not merge them. That is the contract; do not replace
//! it with transitive connected-components clustering.

use crate::bbox::{BoundingBox, Point};

/// Default proximity threshold in pixels.
pub const DEFAULT_THRESHOLD: f64 = 50.0;

/// Group points into proximity clusters with a single greedy pass.
///
/// Membership requires Euclidean distance strictly below `threshold` to any
/// one existing member (single-linkage by chain), so a non-positive threshold
/// yields one singleton cluster per point. Clusters are returned in creation
/// order; members in insertion order.
pub fn cluster_points(points: &[Point], threshold: f64) -> Vec<Vec<Point>> {
    let mut clusters: Vec<Vec<Point>> = Vec::new();

    'points: for &point in points {
        for cluster in clusters.iter_mut() {
            // Insertion-order scan; the first member under the threshold wins
            // and no later cluster is considered.
            if cluster
                .iter()
                .any(|member| point.distance(member) < threshold)
            {
                cluster.push(point);
                continue 'points;
            }
        }
        clusters.push(vec![point]);
    }

    clusters
}

/// Count proximity clusters among the centroids of `boxes`.
///
/// This is the unique-object estimate: empty input counts zero, and every
/// box contributes exactly one centroid to exactly one cluster.
pub fn cluster_count(boxes: &[BoundingBox], threshold: f64) -> usize {
    let centroids: Vec<Point> = boxes.iter().map(BoundingBox::centroid).collect();
    cluster_points(&centroids, threshold).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn centered(x: f64, y: f64) -> BoundingBox {
        BoundingBox::new(x - 5.0, y - 5.0, x + 5.0, y + 5.0)
    }

    #[test]
    fn empty_input_counts_zero() {
        assert_eq!(cluster_count(&[], DEFAULT_THRESHOLD), 0);
        assert_eq!(cluster_count(&[], 0.0), 0);
    }

    #[test]
    fn single_box_counts_one() {
        assert_eq!(cluster_count(&[centered(100.0, 100.0)], DEFAULT_THRESHOLD), 1);
        assert_eq!(cluster_count(&[centered(100.0, 100.0)], 0.1), 1);
    }

    #[test]
    fn nearby_centroids_merge() {
        // Centroids (0,0) and (10,10): distance ~14.1, under the default 50.
        let boxes = [centered(0.0, 0.0), centered(10.0, 10.0)];
        assert_eq!(cluster_count(&boxes, DEFAULT_THRESHOLD), 1);
    }

    #[test]
    fn distant_centroids_stay_separate() {
        let boxes = [centered(0.0, 0.0), centered(1000.0, 1000.0)];
        assert_eq!(cluster_count(&boxes, DEFAULT_THRESHOLD), 2);
    }

    #[test]
    fn chain_links_through_intermediate_point() {
        // (0,0)-(40,0) and (40,0)-(80,0) are each under 50; the endpoints are
        // 80 apart. Single-linkage chains all three into one cluster.
        let boxes = [centered(0.0, 0.0), centered(40.0, 0.0), centered(80.0, 0.0)];
        assert_eq!(cluster_count(&boxes, DEFAULT_THRESHOLD), 1);
    }

    #[test]
    fn threshold_comparison_is_strict() {
        // Exactly at the threshold does not merge.
        let boxes = [centered(0.0, 0.0), centered(50.0, 0.0)];
        assert_eq!(cluster_count(&boxes, 50.0), 2);
        assert_eq!(cluster_count(&boxes, 50.0 + 1e-9), 1);
    }

    #[test]
    fn non_positive_threshold_yields_singletons() {
        let boxes = [
            centered(0.0, 0.0),
            centered(1.0, 0.0),
            centered(2.0, 0.0),
            centered(3.0, 0.0),
        ];
        assert_eq!(cluster_count(&boxes, 0.0), 4);
        assert_eq!(cluster_count(&boxes, -50.0), 4);
    }

    #[test]
    fn greedy_scan_is_order_dependent() {
        // A(0,0) and B(80,0) are 80 apart; C(40,0) is within 50 of both.
        let a = Point::new(0.0, 0.0);
        let b = Point::new(80.0, 0.0);
        let c = Point::new(40.0, 0.0);

        // C arrives last: A and B have already opened separate clusters, and
        // C joins A's (scanned first) without merging them.
        let clusters = cluster_points(&[a, b, c], DEFAULT_THRESHOLD);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0], vec![a, c]);
        assert_eq!(clusters[1], vec![b]);

        // C arrives before B: B now chains to C inside the first cluster, so
        // the same set of points yields a different count.
        let clusters = cluster_points(&[a, c, b], DEFAULT_THRESHOLD);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0], vec![a, c, b]);
    }

    #[test]
    fn first_matching_cluster_wins() {
        // Two separate clusters, then a point within threshold of both. It
        // must land in the first-created cluster and leave the second intact.
        let first = Point::new(0.0, 0.0);
        let second = Point::new(90.0, 0.0);
        let between = Point::new(45.0, 0.0);

        let clusters = cluster_points(&[first, second, between], DEFAULT_THRESHOLD);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0], vec![first, between]);
        assert_eq!(clusters[1], vec![second]);
    }

    #[test]
    fn clusters_partition_the_input() {
        let points: Vec<Point> = (0..20)
            .map(|i| Point::new((i as f64) * 30.0, ((i % 3) as f64) * 200.0))
            .collect();
        let clusters = cluster_points(&points, DEFAULT_THRESHOLD);
        let total: usize = clusters.iter().map(Vec::len).sum();
        assert_eq!(total, points.len());
        assert!(clusters.iter().all(|cluster| !cluster.is_empty()));
    }

    #[test]
    fn nan_centroid_forms_its_own_cluster() {
        // NaN distances compare false against any threshold.
        let boxes = [centered(0.0, 0.0), centered(f64::NAN, 0.0), centered(1.0, 0.0)];
        assert_eq!(cluster_count(&boxes, DEFAULT_THRESHOLD), 2);
    }
}
