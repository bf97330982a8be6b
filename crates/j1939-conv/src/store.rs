//! SPN Store - the definition tables used while validating
//!
//! Provides lookup by SPN and PGN, the SPN→PGN mapping used to plan
//! requests, and packet decoding.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::Duration;

use j1939_core::Packet;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decode::{self, SpnValue};
use crate::definition::{builtin_pgns, builtin_spns, PgnDefinition, SpnDefinition};
use crate::error::{parse_spn, ConvError, ConvResult};

/// Thread-safe store for SPN and PGN definitions
#[derive(Debug, Default)]
pub struct SpnStore {
    spns: RwLock<HashMap<u32, SpnDefinition>>,
    pgns: RwLock<HashMap<u32, PgnDefinition>>,
}

impl SpnStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with the built-in tables
    pub fn with_defaults() -> Self {
        let store = Self::new();
        for pgn in builtin_pgns() {
            store.register_pgn(pgn);
        }
        for spn in builtin_spns() {
            store.register_spn(spn);
        }
        store
    }

    /// Load definitions from a YAML file on top of the built-in tables
    pub fn from_file(path: impl AsRef<Path>) -> ConvResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load definitions from a YAML string on top of the built-in tables
    pub fn from_yaml(yaml: &str) -> ConvResult<Self> {
        let store = Self::with_defaults();
        store.load_yaml(yaml)?;
        Ok(store)
    }

    /// Merge YAML definitions into this store; entries replace existing ones
    pub fn load_yaml(&self, yaml: &str) -> ConvResult<()> {
        let file: DefinitionFile = serde_yaml::from_str(yaml)?;

        for (key, mut def) in file.pgns.unwrap_or_default() {
            def.pgn = key;
            self.register_pgn(def);
        }

        for (key, mut def) in file.spns.unwrap_or_default() {
            def.spn = parse_spn(&key)?;
            if !matches!(def.length, 1 | 2 | 4) {
                return Err(ConvError::InvalidDefinition {
                    spn: def.spn,
                    reason: format!("unsupported slot length {}", def.length),
                });
            }
            if !self.pgns.read().contains_key(&def.pgn) {
                return Err(ConvError::UnknownPgn(def.pgn));
            }
            self.register_spn(def);
        }

        Ok(())
    }

    pub fn register_pgn(&self, def: PgnDefinition) {
        debug!(pgn = def.pgn, label = %def.label, "Registered PGN definition");
        self.pgns.write().insert(def.pgn, def);
    }

    pub fn register_spn(&self, def: SpnDefinition) {
        self.spns.write().insert(def.spn, def);
    }

    pub fn spn(&self, spn: u32) -> Option<SpnDefinition> {
        self.spns.read().get(&spn).cloned()
    }

    pub fn pgn(&self, pgn: u32) -> Option<PgnDefinition> {
        self.pgns.read().get(&pgn).cloned()
    }

    /// Parameter group that carries `spn`
    pub fn pgn_for_spn(&self, spn: u32) -> Option<u32> {
        self.spns.read().get(&spn).map(|def| def.pgn)
    }

    /// Slots carried by `pgn`, in payload order
    pub fn spns_for_pgn(&self, pgn: u32) -> Vec<SpnDefinition> {
        let mut defs: Vec<SpnDefinition> = self
            .spns
            .read()
            .values()
            .filter(|def| def.pgn == pgn)
            .cloned()
            .collect();
        defs.sort_by_key(|def| (def.start, def.spn));
        defs
    }

    pub fn is_on_request(&self, pgn: u32) -> bool {
        self.pgns.read().get(&pgn).is_some_and(|def| def.on_request)
    }

    /// Defined broadcast period, if the group is broadcast
    pub fn broadcast_period(&self, pgn: u32) -> Option<Duration> {
        self.pgns
            .read()
            .get(&pgn)
            .and_then(|def| def.broadcast_period_ms)
            .map(Duration::from_millis)
    }

    /// Broadcast-only groups carrying any of `spns`, ascending
    ///
    /// These can only be observed on the bus, never obtained by request.
    pub fn non_on_request_pgns(&self, spns: &[u32]) -> Vec<u32> {
        let pgns = self.pgns.read();
        self.pgns_for(spns)
            .into_iter()
            .filter(|pgn| pgns.get(pgn).is_some_and(|def| !def.on_request))
            .collect()
    }

    /// Requestable groups carrying any of `spns`, minus those already covered, ascending
    pub fn pgns_for_ds_request(&self, already_covered: &[u32], spns: &[u32]) -> Vec<u32> {
        let pgns = self.pgns.read();
        self.pgns_for(spns)
            .into_iter()
            .filter(|pgn| !already_covered.contains(pgn))
            .filter(|pgn| pgns.get(pgn).is_some_and(|def| def.on_request))
            .collect()
    }

    /// Longest defined broadcast period among `pgns`; zero when none is broadcast
    pub fn maximum_broadcast_period(&self, pgns: &[u32]) -> Duration {
        pgns.iter()
            .filter_map(|&pgn| self.broadcast_period(pgn))
            .max()
            .unwrap_or(Duration::ZERO)
    }

    /// Decode every known slot of the packet
    pub fn decode_packet(&self, packet: &Packet) -> Vec<SpnValue> {
        decode::decode_packet(packet, &self.spns_for_pgn(packet.pgn))
    }

    /// Decode a single SPN from a packet of the right group
    pub fn decode_spn(&self, spn: u32, packet: &Packet) -> ConvResult<SpnValue> {
        let def = self.spn(spn).ok_or(ConvError::UnknownSpn(spn))?;
        if def.pgn != packet.pgn {
            return Err(ConvError::UnknownPgn(packet.pgn));
        }
        Ok(SpnValue::decode(&def, &packet.payload))
    }

    /// Get the number of SPNs registered
    pub fn len(&self) -> usize {
        self.spns.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn pgns_for(&self, spns: &[u32]) -> BTreeSet<u32> {
        let defs = self.spns.read();
        spns.iter()
            .filter_map(|spn| defs.get(spn).map(|def| def.pgn))
            .collect()
    }
}

/// YAML file structure for definitions
#[derive(Debug, Serialize, Deserialize)]
struct DefinitionFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pgns: Option<HashMap<u32, PgnDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    spns: Option<HashMap<String, SpnDefinition>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Reading;

    #[test]
    fn test_store_register_and_get() {
        let store = SpnStore::new();
        store.register_pgn(PgnDefinition::broadcast(65262, "Engine Temperature 1", "ET1", 1000));
        store.register_spn(
            SpnDefinition::new(110, "Engine Coolant Temperature", 65262, 0, 1)
                .with_scale(1.0, -40.0)
                .with_unit("°C"),
        );

        assert_eq!(store.len(), 1);
        assert_eq!(store.pgn_for_spn(110), Some(65262));
        assert_eq!(store.pgn_for_spn(190), None);
        assert_eq!(store.spn(110).unwrap().label, "Engine Coolant Temperature");
    }

    #[test]
    fn test_decode_packet() {
        let store = SpnStore::with_defaults();
        let packet = Packet::new(65262, 0, vec![132, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);

        let values = store.decode_packet(&packet);
        let spns: Vec<u32> = values.iter().map(|v| v.spn).collect();
        assert_eq!(spns, vec![110, 174, 175]);
        assert_eq!(values[0].reading, Reading::Valid(92.0));
        assert!(values[1].is_not_available());
        assert!(values[2].is_not_available());
    }

    #[test]
    fn test_non_on_request_pgns() {
        let store = SpnStore::with_defaults();
        // 190 EEC1 (broadcast only), 247 HOURS (on request), 108 AMB (both)
        assert_eq!(store.non_on_request_pgns(&[247, 190, 108, 9999]), vec![61444]);
    }

    #[test]
    fn test_pgns_for_ds_request() {
        let store = SpnStore::with_defaults();
        assert_eq!(store.pgns_for_ds_request(&[], &[247, 250, 190, 108]), vec![65253, 65257, 65269]);
        assert_eq!(store.pgns_for_ds_request(&[65269], &[247, 108]), vec![65253]);
    }

    #[test]
    fn test_maximum_broadcast_period() {
        let store = SpnStore::with_defaults();
        assert_eq!(store.maximum_broadcast_period(&[61444, 65262, 65253]), Duration::from_millis(1000));
        assert_eq!(store.maximum_broadcast_period(&[65253]), Duration::ZERO);
    }

    #[test]
    fn test_store_from_yaml() {
        let yaml = r#"
pgns:
  65266:
    label: Fuel Economy (Liquid)
    acronym: LFE1
    broadcast_period_ms: 100

spns:
  "183":
    label: Engine Fuel Rate
    pgn: 65266
    start: 0
    length: 2
    scale: 0.05
    unit: l/h
    min: 0
    max: 200
    obd: true
"#;

        let store = SpnStore::from_yaml(yaml).unwrap();
        assert!(store.spn(190).is_some());

        let def = store.spn(183).unwrap();
        assert_eq!(def.spn, 183);
        assert!(def.obd);
        assert_eq!(store.broadcast_period(65266), Some(Duration::from_millis(100)));

        let value = store.decode_spn(183, &Packet::new(65266, 0, vec![0x90, 0x01])).unwrap();
        assert_eq!(value.reading, Reading::Valid(20.0));
    }

    #[test]
    fn test_yaml_rejects_unknown_pgn() {
        let yaml = r#"
spns:
  SPN 183:
    label: Engine Fuel Rate
    pgn: 65266
    start: 0
    length: 2
"#;
        let result = SpnStore::from_yaml(yaml);
        assert!(matches!(result, Err(ConvError::UnknownPgn(65266))));
    }

    #[test]
    fn test_yaml_rejects_bad_length() {
        let yaml = r#"
spns:
  "183":
    label: Engine Fuel Rate
    pgn: 65262
    start: 0
    length: 3
"#;
        let result = SpnStore::from_yaml(yaml);
        assert!(matches!(result, Err(ConvError::InvalidDefinition { spn: 183, .. })));
    }

    #[test]
    fn test_decode_unknown_spn() {
        let store = SpnStore::new();
        let result = store.decode_spn(190, &Packet::new(61444, 0, vec![0xFF; 8]));
        assert!(matches!(result, Err(ConvError::UnknownSpn(190))));
    }
}
