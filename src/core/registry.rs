// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Bijection between render colors and the instances of a scan.
//!
//! A `Registry` is built once per scan from its metadata and never changes afterwards.
//! It is passed by reference to the rasterizer (to decode label renders)
//! and to whoever needs the label or color of an instance.

use std::collections::{BTreeMap, HashMap};

use crate::core::color::PackedRgb;
use crate::misc::error::{Error, Result};

/// Scan-local instance identifier. 0 is reserved for the background.
pub type InstanceId = u16;

/// A labeled object of a scan.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Instance {
    pub id: InstanceId,
    /// Semantic label, such as "chair".
    pub label: String,
    /// Unique color of this instance in the labels model.
    pub color: PackedRgb,
}

/// Color to instance mapping and its inverse.
#[derive(Clone, Default, Debug)]
pub struct Registry {
    instances: BTreeMap<InstanceId, Instance>,
    color_to_id: HashMap<PackedRgb, InstanceId>,
}

impl Registry {
    /// Build the registry, checking that ids and colors are unique.
    pub fn new<I: IntoIterator<Item = Instance>>(instances: I) -> Result<Registry> {
        let mut registry = Registry::default();
        for instance in instances {
            if instance.id == 0 {
                return Err(Error::InvalidInstanceId(instance.id.to_string()));
            }
            if registry.instances.contains_key(&instance.id) {
                return Err(Error::DuplicateInstance(instance.id));
            }
            if registry.color_to_id.contains_key(&instance.color) {
                return Err(Error::DuplicateColor(instance.color));
            }
            registry.color_to_id.insert(instance.color, instance.id);
            registry.instances.insert(instance.id, instance);
        }
        Ok(registry)
    }

    /// True when no metadata was found for the scan.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Instance rendered with this color, if any.
    pub fn decode(&self, color: PackedRgb) -> Option<InstanceId> {
        self.color_to_id.get(&color).cloned()
    }

    pub fn color(&self, id: InstanceId) -> Option<PackedRgb> {
        self.instances.get(&id).map(|instance| instance.color)
    }

    pub fn label(&self, id: InstanceId) -> Option<&str> {
        self.instances.get(&id).map(|instance| instance.label.as_str())
    }

    /// Instances ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &Instance> {
        self.instances.values()
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;

    fn instance(id: InstanceId, label: &str, hex: u32) -> Instance {
        Instance {
            id,
            label: label.to_string(),
            color: PackedRgb::from_hex(hex),
        }
    }

    #[test]
    fn decode_both_ways() {
        let registry =
            Registry::new(vec![instance(3, "chair", 0xff0000), instance(7, "table", 0x00ff00)])
                .unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.decode(PackedRgb::from_hex(0x00ff00)), Some(7));
        assert_eq!(registry.decode(PackedRgb::from_hex(0x0000ff)), None);
        assert_eq!(registry.color(3), Some(PackedRgb::from_hex(0xff0000)));
        assert_eq!(registry.label(7), Some("table"));
        assert_eq!(registry.label(1), None);
        let ids: Vec<_> = registry.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![3, 7]);
    }

    #[test]
    fn shared_color_is_rejected() {
        let result = Registry::new(vec![instance(1, "wall", 0xaec7e8), instance(2, "floor", 0xaec7e8)]);
        match result {
            Err(Error::DuplicateColor(color)) => assert_eq!(color.hex(), 0xaec7e8),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn duplicate_and_background_ids_are_rejected() {
        let duplicate = Registry::new(vec![instance(1, "wall", 0x010101), instance(1, "floor", 0x020202)]);
        assert!(matches!(duplicate, Err(Error::DuplicateInstance(1))));
        let background = Registry::new(vec![instance(0, "wall", 0x010101)]);
        assert!(matches!(background, Err(Error::InvalidInstanceId(_))));
    }

    #[test]
    fn empty_registry() {
        let registry = Registry::new(Vec::new()).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.decode(PackedRgb::from_hex(0)), None);
    }
}
