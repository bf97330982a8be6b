//! Composite aggregator
//!
//! Merges per-module readiness bits into one vehicle-wide view. A system is
//! supported if any module supports it, and complete only if every module
//! supporting it reports it complete. A system nobody supports is never complete.

use j1939_core::{CompositeSystem, Dm26, Dm5, ModuleRecord, ParsedPacket, SystemSet};

/// Width of the system label column
pub const LABEL_WIDTH: usize = 26;

/// Readiness message a composite was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessKind {
    /// Supported / complete since code clear
    Dm5,
    /// Enabled / complete this cycle
    Dm26,
}

impl ReadinessKind {
    pub fn name(self) -> &'static str {
        match self {
            ReadinessKind::Dm5 => "DM5",
            ReadinessKind::Dm26 => "DM26",
        }
    }
}

/// One module's readiness bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleReadiness {
    pub source: u8,
    /// Supported (DM5) or enabled (DM26)
    pub supported: SystemSet,
    pub complete: SystemSet,
}

impl From<&Dm5> for ModuleReadiness {
    fn from(dm5: &Dm5) -> Self {
        Self {
            source: dm5.source(),
            supported: dm5.supported,
            complete: dm5.complete,
        }
    }
}

impl From<&Dm26> for ModuleReadiness {
    fn from(dm26: &Dm26) -> Self {
        Self {
            source: dm26.source(),
            supported: dm26.enabled,
            complete: dm26.complete,
        }
    }
}

/// Vehicle-wide readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeTable {
    pub kind: ReadinessKind,
    pub supported: SystemSet,
    pub complete: SystemSet,
}

impl CompositeTable {
    /// Reduce module readiness bits to the vehicle composite
    pub fn aggregate(kind: ReadinessKind, modules: &[ModuleReadiness]) -> Self {
        let supported = SystemSet::any_of(modules.iter().map(|m| m.supported));
        // systems some supporting module has not completed
        let incomplete = SystemSet::any_of(modules.iter().map(|m| m.supported.difference(m.complete)));
        Self {
            kind,
            supported,
            complete: supported.difference(incomplete),
        }
    }

    /// Composite of the latest DM5 of each module
    pub fn from_dm5<'a>(modules: impl IntoIterator<Item = &'a ModuleRecord>) -> Self {
        let readiness: Vec<ModuleReadiness> = modules
            .into_iter()
            .filter_map(|m| m.latest::<Dm5>())
            .map(|dm5| ModuleReadiness::from(&dm5))
            .collect();
        Self::aggregate(ReadinessKind::Dm5, &readiness)
    }

    /// Composite of the latest DM26 of each module
    pub fn from_dm26<'a>(modules: impl IntoIterator<Item = &'a ModuleRecord>) -> Self {
        let readiness: Vec<ModuleReadiness> = modules
            .into_iter()
            .filter_map(|m| m.latest::<Dm26>())
            .map(|dm26| ModuleReadiness::from(&dm26))
            .collect();
        Self::aggregate(ReadinessKind::Dm26, &readiness)
    }

    pub fn is_supported(&self, system: CompositeSystem) -> bool {
        self.supported.contains(system)
    }

    pub fn is_complete(&self, system: CompositeSystem) -> bool {
        self.complete.contains(system)
    }

    /// Fixed-column text report, one row per system, ending with a blank line
    pub fn render(&self) -> String {
        let mut out = format!("Vehicle Composite of {}:\n", self.kind.name());
        for system in CompositeSystem::ALL {
            let status = if self.is_complete(system) {
                "complete"
            } else {
                "not complete"
            };
            let row = match self.kind {
                ReadinessKind::Dm5 => {
                    let support = if self.is_supported(system) {
                        "supported"
                    } else {
                        "not supported"
                    };
                    format!("    {:<w$} {:>13}, {:>12}", system.name(), support, status, w = LABEL_WIDTH)
                }
                ReadinessKind::Dm26 => {
                    let enabled = if self.is_supported(system) {
                        "enabled"
                    } else {
                        "not enabled"
                    };
                    format!("    {:<w$} {:>11}, {:>12}", system.name(), enabled, status, w = LABEL_WIDTH)
                }
            };
            out.push_str(&row);
            out.push('\n');
        }
        out.push('\n');
        out
    }
}

/// Systems claimed by more than one module
pub fn multiply_supported(modules: &[ModuleReadiness]) -> SystemSet {
    let mut seen = SystemSet::EMPTY;
    let mut repeated = SystemSet::EMPTY;
    for module in modules {
        repeated = repeated.union(seen.intersection(module.supported));
        seen = seen.union(module.supported);
    }
    repeated
}
