//! The semantic types assigned to expressions and declarations

use std::fmt::Display;

/// Resolved type of an expression or declaration.
///
/// Primitives are unit variants, so identity and structural equality
/// coincide; there is no interning table to thread around. `Named` covers
/// both class and interface types, distinguished by the declaration the
/// name resolves to. `Error` exists for internal bookkeeping only; checks
/// that encounter an unresolved operand skip silently instead of
/// cascading.
#[derive(Clone, PartialEq, Debug)]
pub enum Ty {
    Int,
    Double,
    Bool,
    String,
    Void,
    Null,
    Error,
    Named(std::string::String),
    Array(Box<Ty>),
}

impl Ty {
    pub fn array_of(self) -> Ty {
        Ty::Array(Box::new(self))
    }
    pub fn is_named(&self) -> bool {
        matches!(self, Ty::Named(_))
    }
    pub fn is_array(&self) -> bool {
        matches!(self, Ty::Array(_))
    }
    /// Element type of an array type.
    pub fn elem_type(&self) -> Option<&Ty> {
        match self {
            Ty::Array(elem) => Some(elem),
            _ => None,
        }
    }
    pub fn named(&self) -> Option<&str> {
        match self {
            Ty::Named(name) => Some(name),
            _ => None,
        }
    }
    /// Structural equivalence. Primitive fast path and array recursion
    /// both fall out of derived equality.
    pub fn is_equivalent_to(&self, other: &Ty) -> bool {
        self == other
    }
    /// `null` may flow into any reference type but never a primitive.
    pub fn accepts_null(&self) -> bool {
        matches!(self, Ty::Named(_) | Ty::Array(_))
    }
}

impl Display for Ty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ty::Int => write!(f, "int"),
            Ty::Double => write!(f, "double"),
            Ty::Bool => write!(f, "bool"),
            Ty::String => write!(f, "string"),
            Ty::Void => write!(f, "void"),
            Ty::Null => write!(f, "null"),
            Ty::Error => write!(f, "error"),
            Ty::Named(name) => write!(f, "{}", name),
            Ty::Array(elem) => write!(f, "{}[]", elem),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equivalence_is_reflexive_and_symmetric() {
        let types = [
            Ty::Int,
            Ty::Bool,
            Ty::String,
            Ty::Named("Shape".to_string()),
            Ty::Int.array_of(),
            Ty::Named("Shape".to_string()).array_of().array_of(),
        ];
        for t in &types {
            assert!(t.is_equivalent_to(t));
        }
        for a in &types {
            for b in &types {
                assert_eq!(a.is_equivalent_to(b), b.is_equivalent_to(a));
            }
        }
    }

    #[test]
    fn equivalence_distinguishes_structure() {
        assert!(!Ty::Int.is_equivalent_to(&Ty::Bool));
        assert!(!Ty::Int.is_equivalent_to(&Ty::Int.array_of()));
        assert!(!Ty::Named("A".to_string()).is_equivalent_to(&Ty::Named("B".to_string())));
        assert!(Ty::Named("A".to_string())
            .array_of()
            .is_equivalent_to(&Ty::Named("A".to_string()).array_of()));
    }

    #[test]
    fn null_flows_into_reference_types_only() {
        assert!(Ty::Named("A".to_string()).accepts_null());
        assert!(Ty::Int.array_of().accepts_null());
        assert!(Ty::Named("A".to_string()).array_of().accepts_null());
        assert!(!Ty::Int.accepts_null());
        assert!(!Ty::Bool.accepts_null());
        assert!(!Ty::String.accepts_null());
        assert!(!Ty::Void.accepts_null());
    }

    #[test]
    fn display_matches_source_syntax() {
        assert_eq!(Ty::Int.to_string(), "int");
        assert_eq!(Ty::Int.array_of().to_string(), "int[]");
        assert_eq!(
            Ty::Named("Shape".to_string()).array_of().array_of().to_string(),
            "Shape[][]"
        );
    }
}
