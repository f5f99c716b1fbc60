//! Entity permissions.
//!
//! Writes always land on the target entity's own ACL: when the entity still
//! inherits, the inherited entries become the starting point of a new local
//! ACL.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::api::SynapseApi;
use crate::error::Result;
use crate::model::{AccessControlList, AccessType, ResourceAccess};

/// Principal id of the Bridge Downstream service account.
pub const BRIDGE_DOWNSTREAM_PRINCIPAL: i64 = 3432808;

/// Full control short of ownership, granted to the reserved principal.
pub const ADMIN_ACCESS: [AccessType; 8] = [
    AccessType::Download,
    AccessType::Read,
    AccessType::Update,
    AccessType::Create,
    AccessType::ChangePermissions,
    AccessType::Delete,
    AccessType::Moderate,
    AccessType::ChangeSettings,
];

pub fn admin_access() -> BTreeSet<AccessType> {
    ADMIN_ACCESS.into_iter().collect()
}

/// A principal that is skipped while copying and then granted `access`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedPrincipal {
    pub principal_id: i64,
    pub access: BTreeSet<AccessType>,
}

impl Default for ReservedPrincipal {
    fn default() -> Self {
        Self {
            principal_id: BRIDGE_DOWNSTREAM_PRINCIPAL,
            access: admin_access(),
        }
    }
}

/// The ACL currently governing `entity_id`, and whether it is attached locally.
pub fn effective_acl(api: &dyn SynapseApi, entity_id: &str) -> Result<(AccessControlList, bool)> {
    let benefactor = api.get_benefactor(entity_id)?;
    let acl = api.get_acl(&benefactor)?;
    Ok((acl, benefactor == entity_id))
}

/// Set `principal_id`'s access; `overwrite = false` unions with what it had.
pub fn grant(
    entries: &mut Vec<ResourceAccess>,
    principal_id: i64,
    access: &BTreeSet<AccessType>,
    overwrite: bool,
) {
    match entries.iter_mut().find(|ra| ra.principal_id == principal_id) {
        Some(existing) if overwrite => existing.access_type = access.clone(),
        Some(existing) => existing.access_type.extend(access.iter().copied()),
        None => entries.push(ResourceAccess {
            principal_id,
            access_type: access.clone(),
        }),
    }
    entries.retain(|ra| !ra.access_type.is_empty());
}

/// Overlay `source` entries (minus the reserved principal) onto `target`,
/// then give the reserved principal its fixed access.
pub fn merge_copied_access(
    target: &mut Vec<ResourceAccess>,
    source: &[ResourceAccess],
    reserved: &ReservedPrincipal,
) {
    for entry in source
        .iter()
        .filter(|ra| ra.principal_id != reserved.principal_id)
    {
        grant(target, entry.principal_id, &entry.access_type, true);
    }
    grant(target, reserved.principal_id, &reserved.access, true);
}

fn store(api: &dyn SynapseApi, mut acl: AccessControlList, entity_id: &str, local: bool) -> Result<AccessControlList> {
    if local {
        api.update_acl(&acl)
    } else {
        acl.id = entity_id.to_string();
        acl.etag = None;
        debug!(entity_id, "creating local ACL");
        api.create_acl(&acl)
    }
}

/// Apply `entries` to `entity_id`'s ACL, one principal at a time.
pub fn set_permissions(
    api: &dyn SynapseApi,
    entity_id: &str,
    entries: &[ResourceAccess],
    overwrite: bool,
) -> Result<AccessControlList> {
    let (mut acl, local) = effective_acl(api, entity_id)?;
    for entry in entries {
        grant(&mut acl.resource_access, entry.principal_id, &entry.access_type, overwrite);
    }
    store(api, acl, entity_id, local)
}

/// Copy `source_id`'s ACL onto `destination_id` (see [`merge_copied_access`]).
pub fn copy_acl(
    api: &dyn SynapseApi,
    source_id: &str,
    destination_id: &str,
    reserved: &ReservedPrincipal,
) -> Result<AccessControlList> {
    let (source, _) = effective_acl(api, source_id)?;
    let (mut destination, local) = effective_acl(api, destination_id)?;
    merge_copied_access(&mut destination.resource_access, &source.resource_access, reserved);
    let stored = store(api, destination, destination_id, local)?;
    info!(
        source_id,
        destination_id,
        principals = stored.resource_access.len(),
        reserved_principal = reserved.principal_id,
        "copied ACL"
    );
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySynapse;
    use crate::model::{Entity, EntityKind};

    fn ra(principal_id: i64, access: &[AccessType]) -> ResourceAccess {
        ResourceAccess {
            principal_id,
            access_type: access.iter().copied().collect(),
        }
    }

    #[test]
    fn reserved_principal_is_replaced_not_copied() {
        let reserved = ReservedPrincipal::default();
        let source = vec![
            ra(100, &[AccessType::Read]),
            ra(BRIDGE_DOWNSTREAM_PRINCIPAL, &[AccessType::Read]),
        ];
        let mut target = vec![ra(200, &[AccessType::Read, AccessType::Download])];
        merge_copied_access(&mut target, &source, &reserved);

        assert_eq!(target.len(), 3);
        assert_eq!(target[1], ra(100, &[AccessType::Read]));
        let bridge = target
            .iter()
            .find(|r| r.principal_id == BRIDGE_DOWNSTREAM_PRINCIPAL)
            .unwrap();
        assert_eq!(bridge.access_type, admin_access());
    }

    #[test]
    fn reserved_principal_granted_even_when_absent_from_source() {
        let reserved = ReservedPrincipal::default();
        let mut target = Vec::new();
        merge_copied_access(&mut target, &[ra(7, &[AccessType::Read])], &reserved);
        assert_eq!(target.last().unwrap().principal_id, BRIDGE_DOWNSTREAM_PRINCIPAL);
        assert_eq!(target.last().unwrap().access_type.len(), 8);
    }

    #[test]
    fn grant_union_vs_overwrite() {
        let mut entries = vec![ra(1, &[AccessType::Read])];
        grant(&mut entries, 1, &[AccessType::Download].into_iter().collect(), false);
        assert_eq!(entries[0], ra(1, &[AccessType::Read, AccessType::Download]));
        grant(&mut entries, 1, &[AccessType::Update].into_iter().collect(), true);
        assert_eq!(entries[0], ra(1, &[AccessType::Update]));
        grant(&mut entries, 1, &BTreeSet::new(), true);
        assert!(entries.is_empty());
    }

    #[test]
    fn copy_creates_local_acl_on_inheriting_folder() {
        let synapse = InMemorySynapse::new();
        let project = synapse.insert_entity(Entity::new(EntityKind::Project, "Study", None));
        let mut project_acl = AccessControlList::new(project.clone());
        project_acl.resource_access = vec![ra(273948, &[AccessType::Read])];
        synapse.insert_acl(project_acl);

        let raw = synapse.insert_entity(Entity::new(EntityKind::Folder, "Bridge Raw Data", Some(&project)));
        let mut raw_acl = AccessControlList::new(raw.clone());
        raw_acl.resource_access = vec![
            ra(3333, &[AccessType::Read, AccessType::Download]),
            ra(BRIDGE_DOWNSTREAM_PRINCIPAL, &[AccessType::Read]),
        ];
        synapse.insert_acl(raw_acl);

        let parquet = synapse.insert_entity(Entity::new(EntityKind::Folder, "parquet", Some(&project)));
        copy_acl(&synapse, &raw, &parquet, &ReservedPrincipal::default()).unwrap();

        let local = synapse.local_acl(&parquet).expect("parquet now has its own ACL");
        assert_eq!(
            local.access_for(3333),
            Some(&[AccessType::Read, AccessType::Download].into_iter().collect())
        );
        assert_eq!(local.access_for(273948), Some(&[AccessType::Read].into_iter().collect()));
        assert_eq!(local.access_for(BRIDGE_DOWNSTREAM_PRINCIPAL), Some(&admin_access()));
        // The project ACL is untouched.
        assert_eq!(synapse.local_acl(&project).unwrap().resource_access.len(), 1);
    }

    #[test]
    fn set_permissions_updates_existing_local_acl() {
        let synapse = InMemorySynapse::new();
        let project = synapse.insert_entity(Entity::new(EntityKind::Project, "Study", None));
        let stored = set_permissions(&synapse, &project, &[ra(9, &[AccessType::Read])], false).unwrap();
        assert_eq!(stored.access_for(9), Some(&[AccessType::Read].into_iter().collect()));
        assert!(stored.etag.is_some());
    }
}
