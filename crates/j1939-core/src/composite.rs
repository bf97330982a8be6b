//! Emission-related monitor categories and the per-module readiness bitset
//!
//! DM5 and DM26 both carry two bit-sets over [`CompositeSystem`]. Rather than
//! branching per monitor, the bits are collected into a [`SystemSet`] keyed by
//! the enum ordinal, so vehicle-wide reductions are plain bitwise OR/AND.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The sixteen monitored systems reported by DM5/DM26, in report order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CompositeSystem {
    AcSystemRefrigerant,
    BoostPressureControlSys,
    Catalyst,
    ColdStartAidSystem,
    ComprehensiveComponent,
    DieselParticulateFilter,
    EgrVvtSystem,
    EvaporativeSystem,
    ExhaustGasSensor,
    ExhaustGasSensorHeater,
    FuelSystem,
    HeatedCatalyst,
    Misfire,
    NmhcConvertingCatalyst,
    NoxCatalystAbsorber,
    SecondaryAirSystem,
}

impl CompositeSystem {
    /// All systems in declaration order
    pub const ALL: [CompositeSystem; 16] = [
        CompositeSystem::AcSystemRefrigerant,
        CompositeSystem::BoostPressureControlSys,
        CompositeSystem::Catalyst,
        CompositeSystem::ColdStartAidSystem,
        CompositeSystem::ComprehensiveComponent,
        CompositeSystem::DieselParticulateFilter,
        CompositeSystem::EgrVvtSystem,
        CompositeSystem::EvaporativeSystem,
        CompositeSystem::ExhaustGasSensor,
        CompositeSystem::ExhaustGasSensorHeater,
        CompositeSystem::FuelSystem,
        CompositeSystem::HeatedCatalyst,
        CompositeSystem::Misfire,
        CompositeSystem::NmhcConvertingCatalyst,
        CompositeSystem::NoxCatalystAbsorber,
        CompositeSystem::SecondaryAirSystem,
    ];

    /// Report label
    pub fn name(self) -> &'static str {
        match self {
            CompositeSystem::AcSystemRefrigerant => "A/C system refrigerant",
            CompositeSystem::BoostPressureControlSys => "Boost pressure control sys",
            CompositeSystem::Catalyst => "Catalyst",
            CompositeSystem::ColdStartAidSystem => "Cold start aid system",
            CompositeSystem::ComprehensiveComponent => "Comprehensive component",
            CompositeSystem::DieselParticulateFilter => "Diesel Particulate Filter",
            CompositeSystem::EgrVvtSystem => "EGR/VVT system",
            CompositeSystem::EvaporativeSystem => "Evaporative system",
            CompositeSystem::ExhaustGasSensor => "Exhaust Gas Sensor",
            CompositeSystem::ExhaustGasSensorHeater => "Exhaust Gas Sensor heater",
            CompositeSystem::FuelSystem => "Fuel System",
            CompositeSystem::HeatedCatalyst => "Heated catalyst",
            CompositeSystem::Misfire => "Misfire",
            CompositeSystem::NmhcConvertingCatalyst => "NMHC converting catalyst",
            CompositeSystem::NoxCatalystAbsorber => "NOx catalyst/adsorber",
            CompositeSystem::SecondaryAirSystem => "Secondary air system",
        }
    }

    /// Position in [`CompositeSystem::ALL`]
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Misfire, fuel system and comprehensive component are continuously monitored
    pub fn is_continuous(self) -> bool {
        matches!(
            self,
            CompositeSystem::Misfire
                | CompositeSystem::FuelSystem
                | CompositeSystem::ComprehensiveComponent
        )
    }

    /// Payload byte index and bit position of the support/enable flag
    pub fn support_bit(self) -> (usize, u8) {
        match self {
            CompositeSystem::Misfire => (3, 0),
            CompositeSystem::FuelSystem => (3, 1),
            CompositeSystem::ComprehensiveComponent => (3, 2),
            CompositeSystem::Catalyst => (4, 0),
            CompositeSystem::HeatedCatalyst => (4, 1),
            CompositeSystem::EvaporativeSystem => (4, 2),
            CompositeSystem::SecondaryAirSystem => (4, 3),
            CompositeSystem::AcSystemRefrigerant => (4, 4),
            CompositeSystem::ExhaustGasSensor => (4, 5),
            CompositeSystem::ExhaustGasSensorHeater => (4, 6),
            CompositeSystem::EgrVvtSystem => (4, 7),
            CompositeSystem::ColdStartAidSystem => (5, 0),
            CompositeSystem::BoostPressureControlSys => (5, 1),
            CompositeSystem::DieselParticulateFilter => (5, 2),
            CompositeSystem::NoxCatalystAbsorber => (5, 3),
            CompositeSystem::NmhcConvertingCatalyst => (5, 4),
        }
    }

    /// Payload byte index and bit position of the status flag (0 = complete)
    pub fn status_bit(self) -> (usize, u8) {
        let (byte, bit) = self.support_bit();
        if self.is_continuous() {
            (byte, bit + 4)
        } else {
            (byte + 2, bit)
        }
    }
}

impl fmt::Display for CompositeSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed-size set of [`CompositeSystem`]s keyed by ordinal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SystemSet(u16);

impl SystemSet {
    pub const EMPTY: SystemSet = SystemSet(0);
    pub const ALL: SystemSet = SystemSet(0xFFFF);

    pub fn from_bits(bits: u16) -> Self {
        SystemSet(bits)
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn contains(self, system: CompositeSystem) -> bool {
        self.0 & (1 << system.ordinal()) != 0
    }

    pub fn insert(&mut self, system: CompositeSystem) {
        self.0 |= 1 << system.ordinal();
    }

    pub fn remove(&mut self, system: CompositeSystem) {
        self.0 &= !(1 << system.ordinal());
    }

    pub fn with(mut self, system: CompositeSystem) -> Self {
        self.insert(system);
        self
    }

    pub fn union(self, other: SystemSet) -> SystemSet {
        SystemSet(self.0 | other.0)
    }

    pub fn intersection(self, other: SystemSet) -> SystemSet {
        SystemSet(self.0 & other.0)
    }

    pub fn difference(self, other: SystemSet) -> SystemSet {
        SystemSet(self.0 & !other.0)
    }

    pub fn complement(self) -> SystemSet {
        SystemSet(!self.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Members in declaration order
    pub fn iter(self) -> impl Iterator<Item = CompositeSystem> {
        CompositeSystem::ALL
            .into_iter()
            .filter(move |system| self.contains(*system))
    }

    /// OR-reduction
    pub fn any_of<I: IntoIterator<Item = SystemSet>>(sets: I) -> SystemSet {
        sets.into_iter().fold(SystemSet::EMPTY, SystemSet::union)
    }

    /// AND-reduction; an empty input reduces to the empty set
    pub fn all_of<I: IntoIterator<Item = SystemSet>>(sets: I) -> SystemSet {
        let mut iter = sets.into_iter();
        match iter.next() {
            Some(first) => iter.fold(first, SystemSet::intersection),
            None => SystemSet::EMPTY,
        }
    }

    /// Read the flags at each system's bit position from a readiness payload
    pub(crate) fn from_payload(payload: &[u8], locate: fn(CompositeSystem) -> (usize, u8)) -> Self {
        let mut set = SystemSet::EMPTY;
        for system in CompositeSystem::ALL {
            let (byte, bit) = locate(system);
            if payload.get(byte).is_some_and(|b| b & (1 << bit) != 0) {
                set.insert(system);
            }
        }
        set
    }

    /// Write each member's flag into a readiness payload
    pub(crate) fn write_payload(
        self,
        payload: &mut [u8],
        locate: fn(CompositeSystem) -> (usize, u8),
    ) {
        for system in self.iter() {
            let (byte, bit) = locate(system);
            if let Some(b) = payload.get_mut(byte) {
                *b |= 1 << bit;
            }
        }
    }
}

impl FromIterator<CompositeSystem> for SystemSet {
    fn from_iter<T: IntoIterator<Item = CompositeSystem>>(iter: T) -> Self {
        let mut set = SystemSet::EMPTY;
        for system in iter {
            set.insert(system);
        }
        set
    }
}

/// One monitor's state as reported by a single module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredSystem {
    pub system: CompositeSystem,
    pub source: u8,
    /// Supported (DM5) or enabled this cycle (DM26)
    pub enabled: bool,
    pub complete: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_order_matches_all() {
        for (i, system) in CompositeSystem::ALL.iter().enumerate() {
            assert_eq!(system.ordinal() as usize, i);
        }
    }

    #[test]
    fn test_bit_positions_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for system in CompositeSystem::ALL {
            assert!(seen.insert(system.support_bit()));
            assert!(seen.insert(system.status_bit()));
        }
    }

    #[test]
    fn test_status_bit_layout() {
        assert_eq!(CompositeSystem::Misfire.status_bit(), (3, 4));
        assert_eq!(CompositeSystem::ComprehensiveComponent.status_bit(), (3, 6));
        assert_eq!(CompositeSystem::EgrVvtSystem.status_bit(), (6, 7));
        assert_eq!(CompositeSystem::NmhcConvertingCatalyst.status_bit(), (7, 4));
    }

    #[test]
    fn test_reductions() {
        let a = SystemSet::EMPTY
            .with(CompositeSystem::Misfire)
            .with(CompositeSystem::Catalyst);
        let b = SystemSet::EMPTY
            .with(CompositeSystem::Catalyst)
            .with(CompositeSystem::FuelSystem);

        let any = SystemSet::any_of([a, b]);
        assert_eq!(any.len(), 3);

        let all = SystemSet::all_of([a, b]);
        assert_eq!(all.iter().collect::<Vec<_>>(), vec![CompositeSystem::Catalyst]);

        assert_eq!(SystemSet::all_of(Vec::new()), SystemSet::EMPTY);
        assert_eq!(SystemSet::any_of(Vec::new()), SystemSet::EMPTY);
    }

    #[test]
    fn test_iter_in_declaration_order() {
        let set: SystemSet = [CompositeSystem::SecondaryAirSystem, CompositeSystem::AcSystemRefrigerant]
            .into_iter()
            .collect();
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![CompositeSystem::AcSystemRefrigerant, CompositeSystem::SecondaryAirSystem]
        );
    }
}
