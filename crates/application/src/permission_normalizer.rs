use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rolegate_core::{AppError, AppResult};
use rolegate_domain::{Permission, PermissionId, PermissionReference};
use tracing::debug;

use crate::PermissionStore;

/// Resolves heterogeneous permission references against the store.
#[derive(Clone)]
pub struct PermissionNormalizer {
    store: Arc<dyn PermissionStore>,
}

/// One distinct lookup key extracted from a flattened reference.
enum RequestedPermission {
    Id(PermissionId),
    Name(String),
    Entity(Permission),
}

impl PermissionNormalizer {
    /// Creates a normalizer backed by the given store.
    #[must_use]
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self { store }
    }

    /// Normalizes a reference into flat atoms.
    ///
    /// With `must_load` every atom is resolved to a stored entity (returned as
    /// `PermissionReference::Entity`) and unknown references fail the call.
    /// Without it the atoms are returned as requested, without store access.
    pub async fn resolve(
        &self,
        reference: PermissionReference,
        must_load: bool,
    ) -> AppResult<Vec<PermissionReference>> {
        if !must_load {
            return Ok(reference.flatten());
        }

        Ok(self
            .load(reference)
            .await?
            .into_iter()
            .map(PermissionReference::Entity)
            .collect())
    }

    /// Resolves every atom of the reference to a stored permission.
    ///
    /// Numeric atoms are fetched in one lookup by id, names in one lookup by
    /// name, and entities are taken as they are. The result keeps the order
    /// of first occurrence and contains each permission once. If any
    /// requested id or name does not exist the whole call fails with
    /// [`AppError::NotFound`].
    pub async fn load(&self, reference: PermissionReference) -> AppResult<Vec<Permission>> {
        let requested = distinct_requests(reference.flatten());
        if requested.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<PermissionId> = requested
            .iter()
            .filter_map(|request| match request {
                RequestedPermission::Id(id) => Some(*id),
                _ => None,
            })
            .collect();
        let names: Vec<String> = requested
            .iter()
            .filter_map(|request| match request {
                RequestedPermission::Name(name) => Some(name.clone()),
                _ => None,
            })
            .collect();

        let by_id: HashMap<PermissionId, Permission> = if ids.is_empty() {
            HashMap::new()
        } else {
            self.store
                .find_permissions_by_ids(&ids)
                .await?
                .into_iter()
                .map(|permission| (permission.id(), permission))
                .collect()
        };
        let by_name: HashMap<String, Permission> = if names.is_empty() {
            HashMap::new()
        } else {
            self.store
                .find_permissions_by_names(&names)
                .await?
                .into_iter()
                .map(|permission| (permission.name().to_owned(), permission))
                .collect()
        };

        let missing_ids: Vec<String> = ids
            .iter()
            .filter(|id| !by_id.contains_key(id))
            .map(ToString::to_string)
            .collect();
        let missing_names: Vec<String> = names
            .iter()
            .filter(|name| !by_name.contains_key(name.as_str()))
            .cloned()
            .collect();

        if !missing_ids.is_empty() || !missing_names.is_empty() {
            return Err(not_found_error(
                requested.len(),
                &missing_ids,
                &missing_names,
            ));
        }

        let mut seen = HashSet::new();
        let mut permissions = Vec::with_capacity(requested.len());
        for request in requested {
            let permission = match request {
                RequestedPermission::Id(id) => by_id.get(&id).cloned(),
                RequestedPermission::Name(name) => by_name.get(name.as_str()).cloned(),
                RequestedPermission::Entity(permission) => Some(permission),
            };

            if let Some(permission) = permission
                && seen.insert(permission.id())
            {
                permissions.push(permission);
            }
        }

        debug!(
            requested_ids = ids.len(),
            requested_names = names.len(),
            resolved = permissions.len(),
            "resolved permission references"
        );

        Ok(permissions)
    }
}

fn distinct_requests(atoms: Vec<PermissionReference>) -> Vec<RequestedPermission> {
    let mut seen_ids = HashSet::new();
    let mut seen_names = HashSet::new();
    let mut requests = Vec::with_capacity(atoms.len());

    for atom in atoms {
        if let Some(id) = atom.numeric_id() {
            if seen_ids.insert(id) {
                requests.push(RequestedPermission::Id(id));
            }
            continue;
        }

        match atom {
            PermissionReference::Name(name) => {
                if seen_names.insert(name.clone()) {
                    requests.push(RequestedPermission::Name(name));
                }
            }
            PermissionReference::Entity(permission) => {
                requests.push(RequestedPermission::Entity(permission));
            }
            PermissionReference::Id(_) | PermissionReference::List(_) => {}
        }
    }

    requests
}

fn not_found_error(requested: usize, missing_ids: &[String], missing_names: &[String]) -> AppError {
    let mut parts = Vec::new();
    if !missing_ids.is_empty() {
        parts.push(format!("ids [{}]", missing_ids.join(", ")));
    }
    if !missing_names.is_empty() {
        parts.push(format!("names [{}]", missing_names.join(", ")));
    }

    AppError::NotFound(format!(
        "{} of {requested} requested permission(s) do not exist: {}",
        missing_ids.len() + missing_names.len(),
        parts.join("; ")
    ))
}
