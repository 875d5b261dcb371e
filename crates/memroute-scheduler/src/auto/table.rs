//! Per-bucket preference tables for the auto scheduler.
//!
//! [`RoutingTable`] is the mutable state, owned by the feedback worker
//! alone. After each change the worker copies the touched bucket into
//! [`PublishedTable`], which readers load without ever waiting on a
//! feedback application.

use std::sync::{Arc, RwLock};

/// A bucket's host preference order and the weights that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketView {
    /// Host indices, most preferred first.
    pub order: Vec<usize>,
    /// Weight per host index (not per position).
    pub weights: Vec<f64>,
}

impl BucketView {
    /// Whether `order` is non-increasing in weight.
    pub fn is_ranked(&self) -> bool {
        self.order
            .windows(2)
            .all(|w| self.weights[w[0]] >= self.weights[w[1]])
    }
}

/// One immutable feedback item, as queued for the worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Feedback {
    pub host_index: usize,
    pub bucket_index: usize,
    pub adjust: f64,
}

/// The mutable ranking state: one [`BucketView`] per bucket.
///
/// Every bucket starts with all hosts in address order at weight zero,
/// which is trivially ranked. [`apply`](Self::apply) keeps it ranked.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    buckets: Vec<BucketView>,
}

impl RoutingTable {
    pub fn new(host_count: usize, bucket_count: usize) -> Self {
        let view = BucketView {
            order: (0..host_count).collect(),
            weights: vec![0.0; host_count],
        };
        Self {
            buckets: vec![view; bucket_count],
        }
    }

    pub fn bucket(&self, bucket: usize) -> &BucketView {
        &self.buckets[bucket]
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Fold one feedback item into its bucket.
    ///
    /// Non-negative adjustments average with the current weight, so one
    /// spike only moves it halfway. Negative ones are added in full.
    /// The host then moves one neighbour at a time until the bucket is
    /// ranked again. Returns `false` if the item names a host or bucket
    /// outside the table.
    pub fn apply(&mut self, fb: Feedback) -> bool {
        let Some(view) = self.buckets.get_mut(fb.bucket_index) else {
            return false;
        };
        let host = fb.host_index;
        let Some(weight) = view.weights.get_mut(host) else {
            return false;
        };

        let old = *weight;
        if fb.adjust >= 0.0 {
            *weight = (*weight + fb.adjust) / 2.0;
        } else {
            *weight += fb.adjust;
        }
        let new = *weight;

        let order = &mut view.order;
        let weights = &view.weights;
        let Some(mut k) = order.iter().position(|&h| h == host) else {
            return false;
        };

        if new > old {
            while k > 0 && weights[order[k]] > weights[order[k - 1]] {
                order.swap(k, k - 1);
                k -= 1;
            }
        } else {
            while k + 1 < order.len() && weights[order[k]] < weights[order[k + 1]] {
                order.swap(k, k + 1);
                k += 1;
            }
        }
        true
    }
}

/// Reader-facing copy of the routing table, one slot per bucket.
#[derive(Debug)]
pub struct PublishedTable {
    slots: Vec<RwLock<Arc<BucketView>>>,
}

impl PublishedTable {
    pub fn new(table: &RoutingTable) -> Self {
        Self {
            slots: table
                .buckets
                .iter()
                .map(|view| RwLock::new(Arc::new(view.clone())))
                .collect(),
        }
    }

    pub fn load(&self, bucket: usize) -> Arc<BucketView> {
        self.slots[bucket].read().expect("bucket slot lock").clone()
    }

    pub fn store(&self, bucket: usize, view: BucketView) {
        *self.slots[bucket].write().expect("bucket slot lock") = Arc::new(view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fb(host_index: usize, bucket_index: usize, adjust: f64) -> Feedback {
        Feedback {
            host_index,
            bucket_index,
            adjust,
        }
    }

    #[test]
    fn new_table_is_identity_order_at_zero() {
        let table = RoutingTable::new(3, 4);
        assert_eq!(table.bucket_count(), 4);
        for b in 0..4 {
            assert_eq!(table.bucket(b).order, vec![0, 1, 2]);
            assert_eq!(table.bucket(b).weights, vec![0.0; 3]);
            assert!(table.bucket(b).is_ranked());
        }
    }

    #[test]
    fn positive_feedback_averages() {
        let mut table = RoutingTable::new(2, 1);
        table.apply(fb(1, 0, 10.0));
        assert_eq!(table.bucket(0).weights[1], 5.0);
        table.apply(fb(1, 0, 10.0));
        assert_eq!(table.bucket(0).weights[1], 7.5);
        table.apply(fb(1, 0, 0.0));
        assert_eq!(table.bucket(0).weights[1], 3.75);
    }

    #[test]
    fn negative_feedback_applies_in_full() {
        let mut table = RoutingTable::new(2, 1);
        table.apply(fb(0, 0, 8.0));
        table.apply(fb(0, 0, -10.0));
        assert_eq!(table.bucket(0).weights[0], -6.0);
    }

    #[test]
    fn reward_moves_host_forward() {
        let mut table = RoutingTable::new(3, 1);
        table.apply(fb(2, 0, 4.0));
        assert_eq!(table.bucket(0).order, vec![2, 0, 1]);
        table.apply(fb(1, 0, 2.0));
        assert_eq!(table.bucket(0).order, vec![2, 1, 0]);
    }

    #[test]
    fn penalty_moves_host_back() {
        let mut table = RoutingTable::new(3, 1);
        table.apply(fb(0, 0, -1.0));
        assert_eq!(table.bucket(0).order, vec![1, 2, 0]);
    }

    #[test]
    fn ties_keep_their_place() {
        let mut table = RoutingTable::new(3, 1);
        table.apply(fb(1, 0, 0.0));
        assert_eq!(table.bucket(0).order, vec![0, 1, 2]);
    }

    #[test]
    fn only_the_named_bucket_changes() {
        let mut table = RoutingTable::new(2, 2);
        table.apply(fb(1, 1, 6.0));
        assert_eq!(table.bucket(0).order, vec![0, 1]);
        assert_eq!(table.bucket(1).order, vec![1, 0]);
    }

    #[test]
    fn repeated_reward_is_monotonic() {
        let mut table = RoutingTable::new(4, 1);
        table.apply(fb(0, 0, 9.0));
        table.apply(fb(1, 0, 7.0));
        table.apply(fb(2, 0, 5.0));

        let mut last_weight = table.bucket(0).weights[3];
        let mut last_rank = table.bucket(0).order.iter().position(|&h| h == 3).unwrap();
        for _ in 0..10 {
            table.apply(fb(3, 0, 20.0));
            let weight = table.bucket(0).weights[3];
            let rank = table.bucket(0).order.iter().position(|&h| h == 3).unwrap();
            assert!(weight > last_weight);
            assert!(rank <= last_rank);
            last_weight = weight;
            last_rank = rank;
        }
        assert_eq!(last_rank, 0);
    }

    #[test]
    fn one_large_penalty_drops_below_lower_ranked_host() {
        let mut table = RoutingTable::new(3, 1);
        table.apply(fb(0, 0, 10.0));
        table.apply(fb(1, 0, 4.0));
        assert_eq!(table.bucket(0).order, vec![0, 1, 2]);

        table.apply(fb(0, 0, -8.0));
        assert_eq!(table.bucket(0).order, vec![1, 2, 0]);
    }

    #[test]
    fn burst_leaves_every_bucket_ranked() {
        let hosts = 5;
        let buckets = 4;
        let mut table = RoutingTable::new(hosts, buckets);

        // Deterministic mix of rewards and penalties.
        let mut seed = 0x2545_f491u32;
        for _ in 0..2000 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let host = seed as usize % hosts;
            let bucket = (seed >> 8) as usize % buckets;
            let adjust = f64::from(seed % 200) / 10.0 - 6.0;
            assert!(table.apply(fb(host, bucket, adjust)));
        }

        for b in 0..buckets {
            let view = table.bucket(b);
            assert!(view.is_ranked(), "bucket {b}: {view:?}");
            let mut sorted = view.order.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, (0..hosts).collect::<Vec<_>>());
        }
    }

    #[test]
    fn out_of_range_items_are_rejected() {
        let mut table = RoutingTable::new(2, 2);
        assert!(!table.apply(fb(5, 0, 1.0)));
        assert!(!table.apply(fb(0, 9, 1.0)));
        assert_eq!(table.bucket(0).weights, vec![0.0, 0.0]);
    }

    #[test]
    fn published_table_swaps_whole_views() {
        let mut table = RoutingTable::new(2, 2);
        let published = PublishedTable::new(&table);
        let before = published.load(1);

        table.apply(fb(1, 1, 3.0));
        published.store(1, table.bucket(1).clone());

        // A reader holding the old view keeps seeing it.
        assert_eq!(before.order, vec![0, 1]);
        assert_eq!(published.load(1).order, vec![1, 0]);
        assert_eq!(published.load(0).order, vec![0, 1]);
    }
}
