//! Type, field, and method references.
//!
//! References name a member symbolically (declaring class, name, descriptor)
//! without asserting that a definition exists in the current scope. A
//! [`crate::ir::Resolver`] maps references to definitions; unresolvable
//! references are a normal condition, not an error.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

/// A JVM-style type descriptor, e.g. `I`, `J`, or `Lcom/foo/Bar;`.
///
/// Descriptors are reference-counted strings so that the many structures
/// keyed by type share one allocation.
pub type TypeDesc = Arc<str>;

/// Creates a [`TypeDesc`] from a string literal or slice.
#[must_use]
pub fn type_desc(s: &str) -> TypeDesc {
    Arc::from(s)
}

/// Returns `true` if the descriptor names a wide primitive (`J` or `D`)
/// occupying a register pair.
#[must_use]
pub fn is_wide_type(desc: &str) -> bool {
    matches!(desc, "J" | "D")
}

bitflags! {
    /// Access and property flags of classes, fields, and methods.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessFlags: u32 {
        /// Publicly accessible.
        const PUBLIC = 0x0001;
        /// Accessible only within the declaring class.
        const PRIVATE = 0x0002;
        /// Accessible within the declaring class hierarchy.
        const PROTECTED = 0x0004;
        /// Static member.
        const STATIC = 0x0008;
        /// Final member or class.
        const FINAL = 0x0010;
        /// Declared as an interface.
        const INTERFACE = 0x0200;
        /// Abstract method or class.
        const ABSTRACT = 0x0400;
        /// Enum class or enum field.
        const ENUM = 0x4000;
        /// Instance or class constructor.
        const CONSTRUCTOR = 0x10000;
    }
}

/// A method prototype: return type and ordered argument types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Proto {
    /// Return type descriptor.
    pub ret: TypeDesc,
    /// Argument type descriptors, in declaration order.
    pub args: Vec<TypeDesc>,
}

impl Proto {
    /// Creates a prototype from a return type and argument types.
    #[must_use]
    pub fn new(ret: &str, args: &[&str]) -> Self {
        Self {
            ret: type_desc(ret),
            args: args.iter().map(|a| type_desc(a)).collect(),
        }
    }

    /// Creates a `()V` prototype.
    #[must_use]
    pub fn void() -> Self {
        Self::new("V", &[])
    }

    /// Number of registers the declared arguments occupy (wide types count
    /// twice). Does not include the implicit `this` register.
    #[must_use]
    pub fn arg_words(&self) -> u32 {
        self.args
            .iter()
            .map(|a| if is_wide_type(a) { 2 } else { 1 })
            .sum()
    }

    /// Returns `true` if the return type is `V`.
    #[must_use]
    pub fn is_void(&self) -> bool {
        &*self.ret == "V"
    }

    /// Returns `true` if the return type occupies a register pair.
    #[must_use]
    pub fn returns_wide(&self) -> bool {
        is_wide_type(&self.ret)
    }
}

impl fmt::Display for Proto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for a in &self.args {
            write!(f, "{a}")?;
        }
        write!(f, "){}", self.ret)
    }
}

/// A symbolic reference to a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldRef {
    /// Declaring class descriptor.
    pub class: TypeDesc,
    /// Field name.
    pub name: Arc<str>,
    /// Field type descriptor.
    pub type_: TypeDesc,
}

impl FieldRef {
    /// Creates a field reference.
    #[must_use]
    pub fn new(class: &str, name: &str, type_: &str) -> Self {
        Self {
            class: type_desc(class),
            name: Arc::from(name),
            type_: type_desc(type_),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}:{}", self.class, self.name, self.type_)
    }
}

/// A symbolic reference to a method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRefData {
    /// Declaring class descriptor.
    pub class: TypeDesc,
    /// Method name.
    pub name: Arc<str>,
    /// Method prototype.
    pub proto: Proto,
}

impl MethodRefData {
    /// Creates a method reference.
    #[must_use]
    pub fn new(class: &str, name: &str, proto: Proto) -> Self {
        Self {
            class: type_desc(class),
            name: Arc::from(name),
            proto,
        }
    }

    /// Full descriptor string, used as the stable comparator key.
    #[must_use]
    pub fn descriptor(&self) -> String {
        format!("{}.{}:{}", self.class, self.name, self.proto)
    }
}

impl fmt::Display for MethodRefData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.class, self.name, self.proto)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proto_words_and_display() {
        let p = Proto::new("V", &["I", "J", "Ljava/lang/String;"]);
        assert_eq!(p.arg_words(), 4);
        assert!(p.is_void());
        assert_eq!(p.to_string(), "(IJLjava/lang/String;)V");

        let w = Proto::new("D", &[]);
        assert!(w.returns_wide());
    }

    #[test]
    fn test_ref_descriptors() {
        let f = FieldRef::new("Lcom/foo/Bar;", "count", "I");
        assert_eq!(f.to_string(), "Lcom/foo/Bar;->count:I");

        let m = MethodRefData::new("Lcom/foo/Bar;", "frob", Proto::new("I", &["I"]));
        assert_eq!(m.descriptor(), "Lcom/foo/Bar;.frob:(I)I");
    }
}
