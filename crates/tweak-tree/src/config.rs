//! Tree configuration.

/// How `apply_snapshot` pairs incoming array items with existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayReconciliation {
    /// Item `i` is only ever reconciled against the item previously at `i`.
    #[default]
    Positional,
    /// Incoming model items with a declared id may reuse an existing model
    /// instance of the same type and id from any index of the same array.
    /// Items without an id fall back to positional matching.
    ById,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeConfig {
    /// When set, structural mutations require an active write scope.
    pub protected: bool,
    pub array_reconciliation: ArrayReconciliation,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            protected: true,
            array_reconciliation: ArrayReconciliation::Positional,
        }
    }
}

impl TreeConfig {
    pub fn with_protection(mut self, protected: bool) -> Self {
        self.protected = protected;
        self
    }

    pub fn with_array_reconciliation(mut self, mode: ArrayReconciliation) -> Self {
        self.array_reconciliation = mode;
        self
    }
}
