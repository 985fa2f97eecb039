//! Permission catalog. Tags are `<resource>.<action>`; the resource names are
//! the ones the admin frontend uses for its menus.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::validation::ValidationErrors;

const CRUD: &[&str] = &["view", "create", "edit", "delete"];

/// Resource name and the label shown in the role editor
const RESOURCES: &[(&str, &str)] = &[
    ("categorias", "Categorías"),
    ("productos", "Productos"),
    ("obras", "Obras"),
    ("cargos", "Cargos"),
    ("trabajadores", "Trabajadores"),
    ("requerimientos", "Requerimientos"),
    ("ordenes_compra", "Órdenes de compra"),
    ("asistencias", "Asistencias"),
    ("capacitaciones", "Capacitaciones"),
    ("cotizaciones", "Cotizaciones"),
    ("usuarios", "Usuarios"),
    ("roles", "Roles"),
];

/// Actions beyond CRUD
const EXTRA: &[(&str, &str)] = &[
    ("requerimientos", "approve"),
    ("asistencias", "discounts"),
];

#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
pub struct PermissionGroup {
    pub resource: String,
    pub label: String,
    pub permissions: Vec<String>,
}

/// Every known tag grouped by resource, in menu order
pub fn catalog() -> Vec<PermissionGroup> {
    RESOURCES
        .iter()
        .map(|(resource, label)| {
            let extra = EXTRA
                .iter()
                .filter(|(r, _)| r == resource)
                .map(|(_, action)| *action);
            PermissionGroup {
                resource: resource.to_string(),
                label: label.to_string(),
                permissions: CRUD
                    .iter()
                    .copied()
                    .chain(extra)
                    .map(|action| format!("{resource}.{action}"))
                    .collect(),
            }
        })
        .collect()
}

/// Flat sorted list of every known tag
pub fn all() -> Vec<String> {
    let mut tags: Vec<String> = catalog().into_iter().flat_map(|g| g.permissions).collect();
    tags.sort();
    tags
}

pub fn is_known(tag: &str) -> bool {
    let Some((resource, action)) = tag.split_once('.') else {
        return false;
    };
    RESOURCES.iter().any(|(r, _)| *r == resource)
        && (CRUD.contains(&action) || EXTRA.contains(&(resource, action)))
}

/// Reject unknown tags, reporting each offending index under `permissions.N`
pub fn check_known(tags: &[String]) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    for (index, tag) in tags.iter().enumerate() {
        if !is_known(tag) {
            errors.add(
                &format!("permissions.{index}"),
                format!("The permission {tag} does not exist."),
            );
        }
    }
    errors.into_result()
}
