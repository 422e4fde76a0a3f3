//! Relationship declarations between collections.

/// What happens to dependents of a deleted entity that reference it via a
/// `ref` relationship with `on_delete` configured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OnDelete {
    /// Block the delete with a `ForeignKeyError` (default).
    #[default]
    Restrict,
    /// Delete dependents transitively.
    Cascade,
    /// Clear the dependents' foreign key.
    SetNull,
}

/// The direction of a declared relationship.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelationshipKind {
    /// This collection's entities carry a foreign-key field pointing to one
    /// entity of `target`.
    Ref {
        /// Target collection name.
        target: String,
        /// Field on this collection holding the target id.
        foreign_key: String,
        /// Behavior when the target is deleted.
        on_delete: OnDelete,
    },
    /// A virtual reverse view: `target`'s entities whose `foreign_key` field
    /// equals this entity's id.
    Inverse {
        /// Target collection name.
        target: String,
        /// Field on the target collection holding this entity's id.
        foreign_key: String,
    },
}

/// A named relationship declaration on a [`crate::config::CollectionConfig`].
#[derive(Clone, Debug)]
pub struct RelationshipConfig {
    /// Relationship direction and target.
    pub kind: RelationshipKind,
    /// Whether a missing `ref` target is tolerated during `populate`
    /// (resolves to `null`) instead of failing with `DanglingReferenceError`.
    pub optional: bool,
}

impl RelationshipConfig {
    /// Declares a `ref` relationship (this collection → `target`).
    pub fn reference(
        target: impl Into<String>,
        foreign_key: impl Into<String>,
        on_delete: OnDelete,
    ) -> Self {
        Self {
            kind: RelationshipKind::Ref {
                target: target.into(),
                foreign_key: foreign_key.into(),
                on_delete,
            },
            optional: false,
        }
    }

    /// Declares an `inverse` relationship (`target` → this collection).
    pub fn inverse(target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self {
            kind: RelationshipKind::Inverse {
                target: target.into(),
                foreign_key: foreign_key.into(),
            },
            optional: false,
        }
    }

    /// Marks a `ref` relationship as tolerating a missing target on populate.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Returns the target collection name, regardless of direction.
    pub fn target(&self) -> &str {
        match &self.kind {
            RelationshipKind::Ref { target, .. } => target,
            RelationshipKind::Inverse { target, .. } => target,
        }
    }

    /// Returns the foreign-key field name, regardless of direction.
    pub fn foreign_key(&self) -> &str {
        match &self.kind {
            RelationshipKind::Ref { foreign_key, .. } => foreign_key,
            RelationshipKind::Inverse { foreign_key, .. } => foreign_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_builder() {
        let rel = RelationshipConfig::reference("companies", "companyId", OnDelete::Cascade);
        assert_eq!(rel.target(), "companies");
        assert_eq!(rel.foreign_key(), "companyId");
        assert!(matches!(
            rel.kind,
            RelationshipKind::Ref {
                on_delete: OnDelete::Cascade,
                ..
            }
        ));
    }

    #[test]
    fn test_inverse_builder() {
        let rel = RelationshipConfig::inverse("users", "companyId");
        assert_eq!(rel.target(), "users");
        assert!(matches!(rel.kind, RelationshipKind::Inverse { .. }));
    }

    #[test]
    fn test_optional_flag() {
        let rel = RelationshipConfig::reference("companies", "companyId", OnDelete::Restrict).optional();
        assert!(rel.optional);
    }
}
