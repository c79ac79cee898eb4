//! Compatibility oracle contract.
//!
//! The oracle is the only way two [`Schema`]s are compared. Implementations
//! decide structural subtyping: `a` is a subtype of `b` when every instance
//! valid under `a` is also valid under `b`.

use crate::schema::Schema;

/// Relationship between two schemas `a` and `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypesIdentity {
    /// Both schemas accept exactly the same instances
    Equal,
    /// `a` accepts everything `b` accepts, and more
    AIsSupertypeOfB,
    /// `b` accepts everything `a` accepts, and more
    AIsSubtypeOfB,
    /// Neither schema contains the other
    Incompatible,
}

impl TypesIdentity {
    /// Combine two inclusion checks into a verdict.
    ///
    /// `a_in_b` means every instance of `a` is an instance of `b`.
    #[must_use]
    pub fn from_inclusions(a_in_b: bool, b_in_a: bool) -> Self {
        match (a_in_b, b_in_a) {
            (true, true) => Self::Equal,
            (true, false) => Self::AIsSubtypeOfB,
            (false, true) => Self::AIsSupertypeOfB,
            (false, false) => Self::Incompatible,
        }
    }

    /// The same relationship seen from the other side.
    #[must_use]
    pub fn flip(self) -> Self {
        match self {
            Self::AIsSupertypeOfB => Self::AIsSubtypeOfB,
            Self::AIsSubtypeOfB => Self::AIsSupertypeOfB,
            same => same,
        }
    }

    /// `a` is equal to or a subtype of `b`.
    #[must_use]
    pub fn a_within_b(self) -> bool {
        matches!(self, Self::Equal | Self::AIsSubtypeOfB)
    }

    /// `b` is equal to or a subtype of `a`.
    #[must_use]
    pub fn b_within_a(self) -> bool {
        matches!(self, Self::Equal | Self::AIsSupertypeOfB)
    }
}

/// A structural subtyping decision procedure.
pub trait CompatibilityOracle: Send + Sync {
    /// Compare `a` against `b`.
    ///
    /// # Errors
    ///
    /// Returns error if either schema is malformed or uses constructs the
    /// oracle cannot interpret.
    fn compare(&self, a: &Schema, b: &Schema) -> Result<TypesIdentity, OracleError>;
}

/// Errors reported by an oracle.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OracleError {
    /// A schema document is structurally invalid
    #[error("malformed schema: {0}")]
    Malformed(String),
    /// A `$ref` points nowhere
    #[error("unresolvable reference: {0}")]
    UnresolvedRef(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inclusions_map_to_identity() {
        assert_eq!(TypesIdentity::from_inclusions(true, true), TypesIdentity::Equal);
        assert_eq!(
            TypesIdentity::from_inclusions(true, false),
            TypesIdentity::AIsSubtypeOfB
        );
        assert_eq!(
            TypesIdentity::from_inclusions(false, true),
            TypesIdentity::AIsSupertypeOfB
        );
        assert_eq!(
            TypesIdentity::from_inclusions(false, false),
            TypesIdentity::Incompatible
        );
    }

    #[test]
    fn flip_swaps_direction_only() {
        assert_eq!(
            TypesIdentity::AIsSubtypeOfB.flip(),
            TypesIdentity::AIsSupertypeOfB
        );
        assert_eq!(TypesIdentity::Equal.flip(), TypesIdentity::Equal);
        assert_eq!(TypesIdentity::Incompatible.flip(), TypesIdentity::Incompatible);
    }

    #[test]
    fn within_checks() {
        assert!(TypesIdentity::Equal.a_within_b());
        assert!(TypesIdentity::Equal.b_within_a());
        assert!(TypesIdentity::AIsSubtypeOfB.a_within_b());
        assert!(!TypesIdentity::AIsSubtypeOfB.b_within_a());
        assert!(!TypesIdentity::Incompatible.a_within_b());
    }
}
