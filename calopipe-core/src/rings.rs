//! Concentric ring energy sums.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Ring energy sums of one cluster, concatenated over all ring layers.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RingSet {
    /// Index of the source cluster in the event's cluster collection.
    pub cluster_index: usize,
    /// Ring sums, layer after layer.
    pub rings: Vec<f64>,
    /// Number of rings contributed by each layer, in order.
    pub layout: Vec<usize>,
}

impl RingSet {
    /// Total number of rings.
    pub fn len(&self) -> usize {
        self.rings.len()
    }

    /// Returns true if there are no rings.
    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    /// Rings contributed by one layer.
    pub fn layer(&self, index: usize) -> Option<&[f64]> {
        let start: usize = self.layout.iter().take(index).sum();
        let len = *self.layout.get(index)?;
        self.rings.get(start..start + len)
    }

    /// Sum of all rings.
    pub fn total(&self) -> f64 {
        self.rings.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_slices() {
        let rs = RingSet {
            cluster_index: 0,
            rings: vec![1.0, 2.0, 3.0, 4.0, 5.0],
            layout: vec![2, 3],
        };
        assert_eq!(rs.layer(0), Some(&[1.0, 2.0][..]));
        assert_eq!(rs.layer(1), Some(&[3.0, 4.0, 5.0][..]));
        assert_eq!(rs.layer(2), None);
        assert!((rs.total() - 15.0).abs() < f64::EPSILON);
    }
}
