//! The reference model (spec.md S3 "Reference (`Ref`)", "DefUse triple").

use crate::location::SourceLocation;
use crate::set::KeyedSet;
use crate::spec::TypeSpecId;
use std::hash::Hash;

/// What a name occurrence denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum RefKind {
    Variable,
    Class,
    Function,
    Import,
    Mutation,
    Magic,
}

/// Whether an occurrence defines, updates, or merely uses a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum RefLevel {
    Definition,
    Update,
    Use,
}

/// A statement's identity, used as the endpoint of dataflow edges. Statement
/// locations are unique within a program (spec.md S3 invariant: "line
/// numbers are contiguous and disjoint per cell"), so the statement's own
/// location doubles as an opaque node handle -- no separate arena needed.
pub type NodeId = SourceLocation;

/// An immutable record describing a single name occurrence relevant to
/// dataflow. Identity inside a set is `(name, level, location)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ref {
    pub name: String,
    pub kind: RefKind,
    pub level: RefLevel,
    pub location: SourceLocation,
    pub node: NodeId,
    pub inferred_type: Option<TypeSpecId>,
}

impl Ref {
    pub fn new(name: impl Into<String>, kind: RefKind, level: RefLevel, location: SourceLocation, node: NodeId) -> Self {
        Self { name: name.into(), kind, level, location, node, inferred_type: None }
    }

    pub fn with_inferred_type(mut self, ty: TypeSpecId) -> Self {
        self.inferred_type = Some(ty);
        self
    }

    pub fn identity(&self) -> (String, RefLevel, SourceLocation) {
        (self.name.clone(), self.level, self.location.clone())
    }
}

fn ref_key(r: &Ref) -> (String, RefLevel, SourceLocation) {
    r.identity()
}

pub type RefSet = KeyedSet<Ref, (String, RefLevel, SourceLocation), fn(&Ref) -> (String, RefLevel, SourceLocation)>;

pub fn ref_set() -> RefSet {
    KeyedSet::new(ref_key)
}

pub fn ref_set_from(iter: impl IntoIterator<Item = Ref>) -> RefSet {
    KeyedSet::from_iter(ref_key, iter)
}

/// Three ref-sets attached to a program point (spec.md S3 "DefUse triple").
#[derive(Clone)]
pub struct DefUse {
    pub definition: RefSet,
    pub update: RefSet,
    pub uses: RefSet,
}

impl Default for DefUse {
    fn default() -> Self {
        Self { definition: ref_set(), update: ref_set(), uses: ref_set() }
    }
}

impl DefUse {
    pub fn new() -> Self {
        Self::default()
    }

    /// `defs = DEFINITION u UPDATE`.
    pub fn defs(&self) -> RefSet {
        self.definition.union([self.update.clone()])
    }

    /// `uses = UPDATE u USE`.
    pub fn used(&self) -> RefSet {
        self.update.union([self.uses.clone()])
    }

    pub fn union(&self, other: &DefUse) -> DefUse {
        DefUse {
            definition: self.definition.union([other.definition.clone()]),
            update: self.update.union([other.update.clone()]),
            uses: self.uses.union([other.uses.clone()]),
        }
    }

    pub fn equals(&self, other: &DefUse) -> bool {
        self.definition.equals(&other.definition) && self.update.equals(&other.update) && self.uses.equals(&other.uses)
    }
}

/// A reference kind bucket used by the gen/kill tables (spec.md S4.E); maps
/// 1:1 to `RefLevel` but named separately since the dataflow tables index by
/// this concept rather than by a `Ref` value.
pub type RefBucket = RefLevel;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::SourceLocation;

    fn loc(line: u32) -> SourceLocation {
        SourceLocation::new(line, 0, line, 1)
    }

    #[test]
    fn defs_is_definition_union_update() {
        let mut du = DefUse::new();
        du.definition.add(Ref::new("a", RefKind::Variable, RefLevel::Definition, loc(1), loc(1)));
        du.update.add(Ref::new("b", RefKind::Variable, RefLevel::Update, loc(1), loc(1)));
        assert_eq!(du.defs().size(), 2);
    }

    #[test]
    fn ref_identity_ignores_kind_and_type() {
        let r1 = Ref::new("a", RefKind::Variable, RefLevel::Definition, loc(1), loc(1));
        let r2 = Ref::new("a", RefKind::Class, RefLevel::Definition, loc(1), loc(1));
        assert_eq!(r1.identity(), r2.identity());
    }
}
