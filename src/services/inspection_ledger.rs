//! InspectionLedger - conciliación del recon ledger
//!
//! Funciones puras sobre `Inspection`: merge de resoluciones e issues
//! nuevos reportados por los técnicos al cerrar sesión, y el resumen
//! humano-legible que decide si hace falta un ticket de recon.
//!
//! Todo aquí es síncrono y sin I/O a propósito: los backends de storage
//! ejecutan el merge DENTRO de su sección atómica (mutex o transacción con
//! row lock) para que dos clock-outs concurrentes sobre la misma
//! inspección se serialicen en lugar de pisarse el blob.

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;

use crate::models::inspection::{ChecklistEntry, ChecklistMap, Inspection, ItemStatus};
use crate::models::time_log::{ItemResolution, NewIssue};

/// Prefijo de item mecánico en las claves de resolución
pub const MECH_PREFIX: &str = "mech-";
/// Prefijo de item cosmético en las claves de resolución
pub const COS_PREFIX: &str = "cos-";

lazy_static! {
    /// Vocabulario fijo de componentes cosméticos; un issue nuevo cuyo
    /// nombre de item esté aquí se clasifica como cosmético, el resto va
    /// al checklist mecánico.
    static ref COSMETIC_COMPONENTS: HashSet<&'static str> = [
        "paint",
        "bumper",
        "windshield",
        "glass",
        "upholstery",
        "trim",
        "wheel",
        "rim",
        "headlight",
        "taillight",
        "mirror",
        "seat",
        "carpet",
        "dashboard",
        "door panel",
        "body panel",
        "interior",
        "exterior",
    ]
    .into_iter()
    .collect();
}

/// Resultado de un merge del ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub items_fixed: usize,
    pub remaining_open: usize,
}

/// Aplica las resoluciones y los issues nuevos de un técnico al ledger
///
/// - Resoluciones: claves con prefijo `mech-`/`cos-`. Las notas se
///   acumulan unidas por newline preservando las previas; `fixed: true`
///   pone el item en `Fixed` e incrementa el conteo. Una clave que no
///   existe en el ledger se ignora sin crear entradas fantasma.
/// - Issues nuevos: se clasifican por el vocabulario cosmético, entran con
///   clave desambiguada si el nombre colisiona, con estado `Fixed` si se
///   resolvieron al descubrirse o `Fail` si quedan pendientes.
///
/// `remaining_open` se recalcula con un scan fresco de ambos mapas.
pub fn merge(
    inspection: &mut Inspection,
    resolutions: &HashMap<String, ItemResolution>,
    new_issues: &[NewIssue],
) -> MergeOutcome {
    let mut items_fixed = 0;

    for (key, resolution) in resolutions {
        let applied = if let Some(item) = key.strip_prefix(MECH_PREFIX) {
            apply_resolution(&mut inspection.mechanical, item, resolution)
        } else if let Some(item) = key.strip_prefix(COS_PREFIX) {
            apply_resolution(&mut inspection.cosmetic, item, resolution)
        } else {
            // clave sin prefijo conocido: se ignora
            false
        };

        if applied && resolution.fixed {
            items_fixed += 1;
        }
    }

    for issue in new_issues {
        let map = if is_cosmetic_component(&issue.item) {
            &mut inspection.cosmetic
        } else {
            &mut inspection.mechanical
        };

        let key = disambiguate_key(map, &issue.item);
        let status = if issue.fixed {
            items_fixed += 1;
            ItemStatus::Fixed
        } else {
            ItemStatus::Fail
        };

        let mut notes = format!("Reported: {}", issue.description);
        if issue.fixed {
            notes.push_str("\nFixed on discovery");
        }

        map.insert(key, ChecklistEntry::new(status, notes));
    }

    MergeOutcome {
        items_fixed,
        remaining_open: inspection.remaining_open(),
    }
}

/// Aplica una resolución a un item existente; devuelve `false` si la clave
/// no existe (no se crean entradas implícitamente)
fn apply_resolution(map: &mut ChecklistMap, item: &str, resolution: &ItemResolution) -> bool {
    let Some(entry) = map.get_mut(item) else {
        return false;
    };

    if !resolution.notes.is_empty() {
        if entry.notes.is_empty() {
            entry.notes = resolution.notes.clone();
        } else {
            entry.notes = format!("{}\n{}", entry.notes, resolution.notes);
        }
    }

    if resolution.fixed {
        entry.status = ItemStatus::Fixed;
    }

    true
}

fn is_cosmetic_component(item: &str) -> bool {
    COSMETIC_COMPONENTS.contains(item.trim().to_lowercase().as_str())
}

/// Clave única para un item nuevo: si el nombre ya existe se añade un
/// sufijo numérico en lugar de sobreescribir en silencio
fn disambiguate_key(map: &ChecklistMap, name: &str) -> String {
    if !map.contains_key(name) {
        return name.to_string();
    }
    let mut counter = 2;
    loop {
        let candidate = format!("{} ({})", name, counter);
        if !map.contains_key(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Resumen humano-legible de la inspección
///
/// Lista cada entrada abierta (`Fail`/`Attention`) de ambos checklists más
/// todos los códigos de diagnóstico. Devuelve `None` si no hay nada que
/// reportar; el caller lo usa para decidir si crear un ticket de recon.
pub fn summarize(inspection: &Inspection) -> Option<String> {
    let mut lines = Vec::new();

    for (name, entry) in &inspection.mechanical {
        if entry.status.is_open() {
            lines.push(format_entry("Mechanical", name, entry));
        }
    }
    for (name, entry) in &inspection.cosmetic {
        if entry.status.is_open() {
            lines.push(format_entry("Cosmetic", name, entry));
        }
    }
    for code in &inspection.diagnostic_codes {
        lines.push(format!("[DTC] {}: {}", code.code, code.description));
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn format_entry(section: &str, name: &str, entry: &ChecklistEntry) -> String {
    if entry.notes.is_empty() {
        format!("[{}] {}: {}", section, name, entry.status.as_str())
    } else {
        format!(
            "[{}] {}: {} - {}",
            section,
            name,
            entry.status.as_str(),
            entry.notes
        )
    }
}
