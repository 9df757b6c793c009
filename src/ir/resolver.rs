//! Reference resolution.
//!
//! The optimizer never assumes a reference resolves; every transformation
//! that needs a definition asks a [`Resolver`] and silently skips the site
//! when the answer is `None`. [`ScopeResolver`] is the standard
//! implementation over a [`Scope`]; alternative resolvers (e.g. ones aware
//! of classes outside the scope) can be supplied by the embedder.

use std::sync::Arc;

use crate::ir::{FieldDef, FieldRef, InvokeKind, MethodDef, MethodRefData, Scope};

/// How a method reference should be searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodSearch {
    /// Exact class only: private methods and constructors.
    Direct,
    /// Exact class only: static methods.
    Static,
    /// The class and its superclasses: virtual dispatch.
    Virtual,
    /// Strictly above the class: `invoke-super` dispatch.
    Super,
    /// Interface dispatch; searched like virtual within the scope.
    Interface,
    /// Any of the above.
    Any,
}

impl MethodSearch {
    /// The search kind matching an invoke's dispatch kind.
    #[must_use]
    pub const fn from_invoke(kind: InvokeKind) -> Self {
        match kind {
            InvokeKind::Direct => Self::Direct,
            InvokeKind::Static => Self::Static,
            InvokeKind::Virtual => Self::Virtual,
            InvokeKind::Super => Self::Super,
            InvokeKind::Interface => Self::Interface,
        }
    }
}

/// Maps references to definitions.
pub trait Resolver: Send + Sync {
    /// Resolves a method reference, or `None` when no definition is known.
    fn resolve_method(
        &self,
        mref: &MethodRefData,
        search: MethodSearch,
    ) -> Option<Arc<MethodDef>>;

    /// Resolves a field reference, or `None` when no definition is known.
    fn resolve_field(&self, fref: &FieldRef) -> Option<Arc<FieldDef>>;
}

/// Resolver backed by a [`Scope`].
#[derive(Debug)]
pub struct ScopeResolver {
    scope: Arc<Scope>,
}

impl ScopeResolver {
    /// Creates a resolver over the given scope.
    #[must_use]
    pub fn new(scope: Arc<Scope>) -> Self {
        Self { scope }
    }

    fn find_in_hierarchy(
        &self,
        class: &str,
        name: &str,
        proto: &crate::ir::Proto,
        skip_first: bool,
    ) -> Option<Arc<MethodDef>> {
        let mut current: Option<Arc<str>> = Some(Arc::from(class));
        let mut first = true;
        while let Some(c) = current {
            let cls = self.scope.class(&c)?;
            if !(first && skip_first) {
                if let Some(m) = cls.find_method(name, proto) {
                    return Some(m.clone());
                }
            }
            first = false;
            current = cls.super_class.clone();
        }
        None
    }
}

impl Resolver for ScopeResolver {
    fn resolve_method(
        &self,
        mref: &MethodRefData,
        search: MethodSearch,
    ) -> Option<Arc<MethodDef>> {
        match search {
            MethodSearch::Direct | MethodSearch::Static => self
                .scope
                .class(&mref.class)
                .and_then(|c| c.find_method(&mref.name, &mref.proto).cloned()),
            MethodSearch::Virtual | MethodSearch::Interface | MethodSearch::Any => {
                self.find_in_hierarchy(&mref.class, &mref.name, &mref.proto, false)
            }
            MethodSearch::Super => {
                self.find_in_hierarchy(&mref.class, &mref.name, &mref.proto, true)
            }
        }
    }

    fn resolve_field(&self, fref: &FieldRef) -> Option<Arc<FieldDef>> {
        let mut current: Option<Arc<str>> = Some(fref.class.clone());
        while let Some(c) = current {
            let cls = self.scope.class(&c)?;
            if let Some(f) = cls.find_field(&fref.name) {
                return Some(f.clone());
            }
            current = cls.super_class.clone();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::{AccessFlags, DexClass, Proto};

    use super::*;

    #[test]
    fn test_virtual_walks_hierarchy_super_skips_self() {
        let mut base = DexClass::new("LBase;", None, AccessFlags::PUBLIC);
        base.methods
            .push(MethodDef::new("LBase;", "m", Proto::void(), AccessFlags::PUBLIC));
        let mut derived = DexClass::new("LDerived;", Some("LBase;"), AccessFlags::PUBLIC);
        derived.methods.push(MethodDef::new(
            "LDerived;",
            "m",
            Proto::void(),
            AccessFlags::PUBLIC,
        ));

        let scope = Arc::new(Scope::new(vec![base, derived]));
        let resolver = ScopeResolver::new(scope);

        let mref = MethodRefData::new("LDerived;", "m", Proto::void());
        let virt = resolver
            .resolve_method(&mref, MethodSearch::Virtual)
            .expect("virtual resolves");
        assert_eq!(&**virt.class(), "LDerived;");

        let sup = resolver
            .resolve_method(&mref, MethodSearch::Super)
            .expect("super resolves");
        assert_eq!(&**sup.class(), "LBase;");
    }

    #[test]
    fn test_unresolved_is_none() {
        let scope = Arc::new(Scope::new(vec![]));
        let resolver = ScopeResolver::new(scope);
        let mref = MethodRefData::new("LMissing;", "m", Proto::void());
        assert!(resolver.resolve_method(&mref, MethodSearch::Any).is_none());
        assert!(resolver
            .resolve_field(&FieldRef::new("LMissing;", "f", "I"))
            .is_none());
    }
}
