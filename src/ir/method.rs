//! Method, field, and class definitions, and the scope that owns them.
//!
//! Definitions are the resolved counterparts of references. Method bodies
//! live behind a mutex: the inliner's wait-count discipline guarantees at
//! most one worker rewrites a given method at a time, and the lock makes
//! that guarantee checkable.
//!
//! Methods order by their full descriptor. Every map that influences the
//! output iterates in that order, so the optimizer produces the same binary
//! on every run regardless of hashing or thread interleaving.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam_skiplist::SkipMap;

use crate::ir::{AccessFlags, IrCode, MethodRefData, Proto, TypeDesc};

/// A field definition.
#[derive(Debug)]
pub struct FieldDef {
    /// Declaring class descriptor.
    pub class: TypeDesc,
    /// Field name.
    pub name: Arc<str>,
    /// Field type descriptor.
    pub type_: TypeDesc,
    /// Access flags.
    pub flags: AccessFlags,
}

impl FieldDef {
    /// Creates a field definition.
    #[must_use]
    pub fn new(class: &str, name: &str, type_: &str, flags: AccessFlags) -> Arc<Self> {
        Arc::new(Self {
            class: Arc::from(class),
            name: Arc::from(name),
            type_: Arc::from(type_),
            flags,
        })
    }

    /// Returns `true` if the field is public.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.flags.contains(AccessFlags::PUBLIC)
    }
}

/// A method definition: reference data, flags, and an optional body.
#[derive(Debug)]
pub struct MethodDef {
    class: TypeDesc,
    name: Arc<str>,
    proto: Proto,
    descriptor: String,
    flags: AtomicU32,
    no_inline: AtomicBool,
    code: Mutex<Option<IrCode>>,
}

impl MethodDef {
    /// Creates a method definition without a body.
    #[must_use]
    pub fn new(class: &str, name: &str, proto: Proto, flags: AccessFlags) -> Arc<Self> {
        let class: TypeDesc = Arc::from(class);
        let name: Arc<str> = Arc::from(name);
        let descriptor = format!("{class}.{name}:{proto}");
        Arc::new(Self {
            class,
            name,
            proto,
            descriptor,
            flags: AtomicU32::new(flags.bits()),
            no_inline: AtomicBool::new(false),
            code: Mutex::new(None),
        })
    }

    /// Declaring class descriptor.
    #[must_use]
    pub fn class(&self) -> &TypeDesc {
        &self.class
    }

    /// Method name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Method prototype.
    #[must_use]
    pub fn proto(&self) -> &Proto {
        &self.proto
    }

    /// Full descriptor, the stable comparator key.
    #[must_use]
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// The symbolic reference naming this definition.
    #[must_use]
    pub fn refdata(&self) -> MethodRefData {
        MethodRefData {
            class: self.class.clone(),
            name: self.name.clone(),
            proto: self.proto.clone(),
        }
    }

    /// Current access flags.
    #[must_use]
    pub fn flags(&self) -> AccessFlags {
        AccessFlags::from_bits_truncate(self.flags.load(AtomicOrdering::Acquire))
    }

    /// Returns `true` if the method is static.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags().contains(AccessFlags::STATIC)
    }

    /// Returns `true` if the method is private.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.flags().contains(AccessFlags::PRIVATE)
    }

    /// Returns `true` if the method is public.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.flags().contains(AccessFlags::PUBLIC)
    }

    /// Returns `true` for `<init>` and `<clinit>`.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.flags().contains(AccessFlags::CONSTRUCTOR)
            || &*self.name == "<init>"
            || &*self.name == "<clinit>"
    }

    /// Returns `true` if this is the declared initializer of `class`.
    #[must_use]
    pub fn is_initializer_of(&self, class: &str) -> bool {
        self.is_constructor() && &*self.class == class
    }

    /// Demotes the method from instance-direct to static.
    ///
    /// Only called by the inliner's terminal make-static pass; callers must
    /// have rewritten every `invoke-direct` of this method to
    /// `invoke-static`.
    pub fn make_static(&self) {
        self.flags
            .fetch_or(AccessFlags::STATIC.bits(), AtomicOrdering::AcqRel);
    }

    /// Marks the method as never inlinable.
    pub fn set_no_inline(&self) {
        self.no_inline.store(true, AtomicOrdering::Release);
    }

    /// Returns `true` if the method was marked uninlinable.
    #[must_use]
    pub fn no_inline(&self) -> bool {
        self.no_inline.load(AtomicOrdering::Acquire)
    }

    /// Installs a body.
    pub fn set_code(&self, code: IrCode) {
        *self.lock_code() = Some(code);
    }

    /// Locks the body for reading or rewriting.
    ///
    /// Recovers from poisoning: a panicking worker must not wedge the whole
    /// pipeline, and a half-rewritten body is caught by the panic itself.
    #[must_use]
    pub fn lock_code(&self) -> MutexGuard<'_, Option<IrCode>> {
        self.code.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Display for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptor)
    }
}

/// A method definition ordered by its descriptor.
///
/// The deterministic key of every map whose iteration order reaches the
/// output.
#[derive(Debug, Clone)]
pub struct OrderedMethod(pub Arc<MethodDef>);

impl OrderedMethod {
    /// The wrapped definition.
    #[must_use]
    pub fn get(&self) -> &Arc<MethodDef> {
        &self.0
    }
}

impl Deref for OrderedMethod {
    type Target = MethodDef;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq for OrderedMethod {
    fn eq(&self, other: &Self) -> bool {
        self.0.descriptor() == other.0.descriptor()
    }
}

impl Eq for OrderedMethod {}

impl PartialOrd for OrderedMethod {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedMethod {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.descriptor().cmp(other.0.descriptor())
    }
}

impl Hash for OrderedMethod {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.descriptor().hash(state);
    }
}

impl From<Arc<MethodDef>> for OrderedMethod {
    fn from(m: Arc<MethodDef>) -> Self {
        Self(m)
    }
}

/// A class definition.
#[derive(Debug)]
pub struct DexClass {
    /// Class type descriptor.
    pub type_: TypeDesc,
    /// Superclass descriptor, if any.
    pub super_class: Option<TypeDesc>,
    /// Access flags.
    pub flags: AccessFlags,
    /// Whether the class is defined outside the scope (a stub carrying
    /// only visibility information).
    pub external: bool,
    /// Methods declared by the class.
    pub methods: Vec<Arc<MethodDef>>,
    /// Fields declared by the class.
    pub fields: Vec<Arc<FieldDef>>,
}

impl DexClass {
    /// Creates a class definition.
    #[must_use]
    pub fn new(type_: &str, super_class: Option<&str>, flags: AccessFlags) -> Self {
        Self {
            type_: Arc::from(type_),
            super_class: super_class.map(Arc::from),
            flags,
            external: false,
            methods: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Creates an external stub: a class known only by name and flags.
    #[must_use]
    pub fn new_external(type_: &str, flags: AccessFlags) -> Self {
        Self {
            external: true,
            ..Self::new(type_, None, flags)
        }
    }

    /// Finds a declared method by name and prototype.
    #[must_use]
    pub fn find_method(&self, name: &str, proto: &Proto) -> Option<&Arc<MethodDef>> {
        self.methods
            .iter()
            .find(|m| m.name() == name && m.proto() == proto)
    }

    /// Finds a declared field by name.
    #[must_use]
    pub fn find_field(&self, name: &str) -> Option<&Arc<FieldDef>> {
        self.fields.iter().find(|f| &*f.name == name)
    }
}

/// The set of classes the optimizer operates on, with concurrent indexes.
#[derive(Debug)]
pub struct Scope {
    classes: Vec<Arc<DexClass>>,
    types: SkipMap<TypeDesc, Arc<DexClass>>,
    methods: SkipMap<String, Arc<MethodDef>>,
}

impl Scope {
    /// Builds a scope and its lookup indexes from class definitions.
    #[must_use]
    pub fn new(classes: Vec<DexClass>) -> Self {
        let classes: Vec<Arc<DexClass>> = classes.into_iter().map(Arc::new).collect();
        let types = SkipMap::new();
        let methods = SkipMap::new();
        for class in &classes {
            types.insert(class.type_.clone(), class.clone());
            for m in &class.methods {
                methods.insert(m.descriptor().to_string(), m.clone());
            }
        }
        Self {
            classes,
            types,
            methods,
        }
    }

    /// All classes, in input order.
    #[must_use]
    pub fn classes(&self) -> &[Arc<DexClass>] {
        &self.classes
    }

    /// Looks up a class by type descriptor.
    #[must_use]
    pub fn class(&self, type_: &str) -> Option<Arc<DexClass>> {
        self.types.get(type_).map(|e| e.value().clone())
    }

    /// Looks up a method by full descriptor.
    #[must_use]
    pub fn method(&self, descriptor: &str) -> Option<Arc<MethodDef>> {
        self.methods.get(descriptor).map(|e| e.value().clone())
    }

    /// Returns `true` if `child` equals `parent` or derives from it within
    /// the scope.
    #[must_use]
    pub fn is_subclass(&self, parent: &str, child: &str) -> bool {
        let mut current = Some(Arc::<str>::from(child));
        while let Some(c) = current {
            if &*c == parent {
                return true;
            }
            current = self.class(&c).and_then(|cls| cls.super_class.clone());
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(class: &str, name: &str) -> Arc<MethodDef> {
        MethodDef::new(class, name, Proto::void(), AccessFlags::PUBLIC)
    }

    #[test]
    fn test_ordered_method_comparator() {
        let a = OrderedMethod(method("LA;", "m"));
        let b = OrderedMethod(method("LB;", "m"));
        let a2 = OrderedMethod(method("LA;", "m"));
        assert!(a < b);
        assert_eq!(a, a2);
    }

    #[test]
    fn test_make_static() {
        let m = method("LA;", "helper");
        assert!(!m.is_static());
        m.make_static();
        assert!(m.is_static());
    }

    #[test]
    fn test_scope_lookup_and_subclassing() {
        let mut base = DexClass::new("LBase;", Some("Ljava/lang/Object;"), AccessFlags::PUBLIC);
        base.methods.push(method("LBase;", "m"));
        let derived = DexClass::new("LDerived;", Some("LBase;"), AccessFlags::PUBLIC);

        let scope = Scope::new(vec![base, derived]);
        assert!(scope.class("LBase;").is_some());
        assert!(scope.method("LBase;.m:()V").is_some());
        assert!(scope.is_subclass("LBase;", "LDerived;"));
        assert!(!scope.is_subclass("LDerived;", "LBase;"));
    }
}
