//! Dimension-relationship attributes.
//!
//! Runtime behavior is modeled as the relation between a non-time dimension
//! (objective value, ...) and a time-like one (runtime, FEs, ...). Every pair
//! of dimensions whose time flags differ becomes one attribute to fit.

use crate::data::Dimension;

/// An (independent, dependent) dimension pair. The independent dimension is
/// the non-time one; the dependent one is time-like.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DimensionRelationship {
    /// Column index of the non-time dimension.
    pub independent: usize,
    /// Column index of the time-like dimension.
    pub dependent: usize,
    independent_name: String,
    dependent_name: String,
}

impl DimensionRelationship {
    /// Name of the independent dimension.
    pub fn independent_name(&self) -> &str {
        &self.independent_name
    }

    /// Name of the dependent dimension.
    pub fn dependent_name(&self) -> &str {
        &self.dependent_name
    }

    /// `"<independent> -> <dependent>"`.
    pub fn label(&self) -> String {
        format!("{} -> {}", self.independent_name, self.dependent_name)
    }
}

/// Enumerate attributes in dimension-index order.
///
/// For every pair `i < j` where exactly one dimension is a time measure, the
/// non-time one is listed first. Fitting-table indices depend on this order.
pub fn enumerate(dimensions: &[Dimension]) -> Vec<DimensionRelationship> {
    let mut out = Vec::new();
    for (i, a) in dimensions.iter().enumerate() {
        for (j, b) in dimensions.iter().enumerate().skip(i + 1) {
            if a.is_time_measure() == b.is_time_measure() {
                continue;
            }
            let ((ii, ia), (di, da)) = if a.is_time_measure() {
                ((j, b), (i, a))
            } else {
                ((i, a), (j, b))
            };
            out.push(DimensionRelationship {
                independent: ii,
                dependent: di,
                independent_name: ia.name().to_owned(),
                dependent_name: da.name().to_owned(),
            });
        }
    }
    out
}
