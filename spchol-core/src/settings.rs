//! Factorization settings.

use crate::ordering::OrderingMethod;

/// Settings for [`SparseCholesky`](crate::SparseCholesky).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CholeskySettings {
    /// Fill-reducing ordering.
    pub ordering: OrderingMethod,

    /// Reject matrices whose stored pattern or values are not symmetric.
    ///
    /// When false only entries with `row <= col` are read and the strictly
    /// lower triangle is ignored.
    pub check_symmetry: bool,

    /// Log phase statistics at info level.
    pub verbose: bool,
}

impl Default for CholeskySettings {
    fn default() -> Self {
        // SPCHOL_ORDERING accepts 0/natural or 1/amd
        let ordering = std::env::var("SPCHOL_ORDERING")
            .ok()
            .and_then(|s| s.parse::<OrderingMethod>().ok())
            .unwrap_or_default();

        Self {
            ordering,
            check_symmetry: std::env::var("SPCHOL_CHECK_SYMMETRY")
                .ok()
                .map(|s| s == "1" || s.to_lowercase() == "true")
                .unwrap_or(false),
            verbose: std::env::var("SPCHOL_VERBOSE")
                .ok()
                .map(|s| s != "0" && s.to_lowercase() != "false")
                .unwrap_or(false),
        }
    }
}

impl CholeskySettings {
    /// Default settings with the given ordering.
    pub fn with_ordering(ordering: OrderingMethod) -> Self {
        Self {
            ordering,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_ordering_overrides() {
        let settings = CholeskySettings::with_ordering(OrderingMethod::Natural);
        assert_eq!(settings.ordering, OrderingMethod::Natural);

        let settings = CholeskySettings {
            check_symmetry: true,
            ..CholeskySettings::with_ordering(OrderingMethod::Amd)
        };
        assert!(settings.check_symmetry);
        assert_eq!(settings.ordering, OrderingMethod::Amd);
    }
}
