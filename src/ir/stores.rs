//! Dex store partitioning.
//!
//! An application ships as one or more stores, each holding a set of
//! classes. The root store is loaded first and is visible to every other
//! store; non-root stores must not reference each other. The inliner
//! consults [`XStoreRefs`] to reject inlinings that would smuggle a
//! reference across that boundary.

use rustc_hash::FxHashMap;

use crate::ir::TypeDesc;

/// A single dex store: a named partition of the scope's classes.
#[derive(Debug)]
pub struct DexStore {
    name: String,
    types: Vec<TypeDesc>,
}

impl DexStore {
    /// Creates a store holding the given class descriptors.
    #[must_use]
    pub fn new(name: &str, types: Vec<TypeDesc>) -> Self {
        Self {
            name: name.to_string(),
            types,
        }
    }

    /// Store name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Class descriptors assigned to this store.
    #[must_use]
    pub fn types(&self) -> &[TypeDesc] {
        &self.types
    }
}

/// Cross-store reference checker.
///
/// Store index 0 is the root store. A reference from store `i` into store
/// `j` is legal when `j == i` or `j` is the root store; anything else would
/// break the load order.
#[derive(Debug, Default)]
pub struct XStoreRefs {
    store_of_type: FxHashMap<TypeDesc, usize>,
    num_stores: usize,
}

impl XStoreRefs {
    /// Builds the checker from the store list.
    #[must_use]
    pub fn new(stores: &[DexStore]) -> Self {
        let mut store_of_type = FxHashMap::default();
        for (idx, store) in stores.iter().enumerate() {
            for t in store.types() {
                store_of_type.insert(t.clone(), idx);
            }
        }
        Self {
            store_of_type,
            num_stores: stores.len(),
        }
    }

    /// The store index of a type. Types outside every store (externals)
    /// return `None`.
    #[must_use]
    pub fn store_idx(&self, type_: &str) -> Option<usize> {
        self.store_of_type.get(type_).copied()
    }

    /// Returns `true` if a member of `caller_store` referencing `type_`
    /// would cross an illegal store boundary.
    #[must_use]
    pub fn illegal_ref(&self, caller_store: usize, type_: &str) -> bool {
        match self.store_idx(type_) {
            // External types live outside the partitioning.
            None => false,
            Some(0) => false,
            Some(target) => target != caller_store,
        }
    }

    /// Number of stores.
    #[must_use]
    pub const fn num_stores(&self) -> usize {
        self.num_stores
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::type_desc;

    use super::*;

    #[test]
    fn test_cross_store_rules() {
        let stores = vec![
            DexStore::new("root", vec![type_desc("LRoot;")]),
            DexStore::new("feature-a", vec![type_desc("LA;")]),
            DexStore::new("feature-b", vec![type_desc("LB;")]),
        ];
        let xstores = XStoreRefs::new(&stores);

        assert_eq!(xstores.store_idx("LA;"), Some(1));
        // Same store and root store are fine.
        assert!(!xstores.illegal_ref(1, "LA;"));
        assert!(!xstores.illegal_ref(1, "LRoot;"));
        // Crossing between feature stores is not.
        assert!(xstores.illegal_ref(1, "LB;"));
        // Externals are never illegal.
        assert!(!xstores.illegal_ref(1, "Ljava/lang/Object;"));
    }
}
