//! Caller-facing permission references.
//!
//! Callers name permissions by id, by name, by entity, or by any list of
//! those. Every shape is flattened into the same sequence of atoms before it
//! reaches lookups or membership checks.

use serde::{Deserialize, Serialize};

use crate::{Permission, PermissionId};

/// Separator accepted inside name references to denote several names.
const NAME_SEPARATOR: char = '|';

/// Reference to one or more permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionReference {
    /// Permission primary key.
    Id(PermissionId),
    /// Permission name, possibly pipe-delimited (`"publish|edit"`).
    Name(String),
    /// Already resolved permission entity.
    Entity(Permission),
    /// Ordered mixture of references.
    List(Vec<PermissionReference>),
}

impl PermissionReference {
    /// Builds a list reference from any iterable of reference-like values.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<PermissionReference>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Flattens nested lists and splits pipe-delimited names into atoms.
    ///
    /// The returned references are never `List`, and never contain a
    /// separator or an empty name. Order follows the input.
    #[must_use]
    pub fn flatten(self) -> Vec<PermissionReference> {
        let mut atoms = Vec::new();
        self.flatten_into(&mut atoms);
        atoms
    }

    fn flatten_into(self, atoms: &mut Vec<PermissionReference>) {
        match self {
            Self::List(items) => {
                for item in items {
                    item.flatten_into(atoms);
                }
            }
            Self::Name(value) => atoms.extend(
                value
                    .split(NAME_SEPARATOR)
                    .filter(|segment| !segment.is_empty())
                    .map(|segment| Self::Name(segment.to_owned())),
            ),
            atom => atoms.push(atom),
        }
    }

    /// Returns the identifier this atom denotes, treating numeric names as ids.
    #[must_use]
    pub fn numeric_id(&self) -> Option<PermissionId> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Name(value) => value.parse::<u64>().ok().map(PermissionId::new),
            Self::Entity(_) | Self::List(_) => None,
        }
    }

    /// Returns whether this reference denotes the given permission.
    ///
    /// Ids and numeric names compare against the id, names against the name,
    /// entities by identity. A list or pipe-delimited name matches when any of
    /// its atoms does.
    #[must_use]
    pub fn matches(&self, permission: &Permission) -> bool {
        match self {
            Self::Entity(entity) => entity.is(permission),
            Self::List(items) => items.iter().any(|item| item.matches(permission)),
            Self::Name(value) if value.contains(NAME_SEPARATOR) => value
                .split(NAME_SEPARATOR)
                .filter(|segment| !segment.is_empty())
                .any(|segment| Self::Name(segment.to_owned()).matches(permission)),
            Self::Name(value) => match self.numeric_id() {
                Some(id) => id == permission.id(),
                None => value == permission.name(),
            },
            Self::Id(id) => *id == permission.id(),
        }
    }
}

impl From<u64> for PermissionReference {
    fn from(value: u64) -> Self {
        Self::Id(PermissionId::new(value))
    }
}

impl From<PermissionId> for PermissionReference {
    fn from(value: PermissionId) -> Self {
        Self::Id(value)
    }
}

impl From<&str> for PermissionReference {
    fn from(value: &str) -> Self {
        Self::Name(value.to_owned())
    }
}

impl From<String> for PermissionReference {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

impl From<Permission> for PermissionReference {
    fn from(value: Permission) -> Self {
        Self::Entity(value)
    }
}

impl From<&Permission> for PermissionReference {
    fn from(value: &Permission) -> Self {
        Self::Entity(value.clone())
    }
}

impl<T> From<Vec<T>> for PermissionReference
where
    T: Into<PermissionReference>,
{
    fn from(values: Vec<T>) -> Self {
        Self::list(values)
    }
}

impl<T, const N: usize> From<[T; N]> for PermissionReference
where
    T: Into<PermissionReference>,
{
    fn from(values: [T; N]) -> Self {
        Self::list(values)
    }
}
