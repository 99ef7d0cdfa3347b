//! Inventories for the point-cloud objects: solids, beads and spheres.
//!
//! All three sets share the same shape: a slot arena, a serial-number
//! inventory, and a shuffleable iteration list.

use rand::Rng;

use cytomech_datastructures::{Arena, Inventory, Serial, SlotKey, ShuffleList};
use cytomech_mech::{Bead, Solid, Sphere};

macro_rules! object_set {
    ($Set:ident, $Obj:ident, $Body:ident, $field:ident) => {
        pub struct $Obj {
            pub $field: $Body,
            pub prop: usize,
            pub serial: Serial,
            pub mark: i32,
        }

        #[derive(Default)]
        pub struct $Set {
            pub(crate) arena: Arena<$Obj>,
            pub(crate) inventory: Inventory,
            pub list: ShuffleList,
        }

        impl $Set {
            pub fn new() -> $Set {
                $Set::default()
            }

            pub fn len(&self) -> usize {
                self.arena.len()
            }

            pub fn is_empty(&self) -> bool {
                self.arena.is_empty()
            }

            pub fn add(&mut self, $field: $Body, prop: usize) -> SlotKey {
                let key = self.arena.insert($Obj { $field, prop, serial: 0, mark: 0 });
                let serial = self.inventory.assign(key);
                self.arena.get_mut(key).unwrap().serial = serial;
                self.list.push(key);
                return key;
            }

            pub fn restore(&mut self, $field: $Body, prop: usize, serial: Serial) -> SlotKey {
                let key = self.arena.insert($Obj { $field, prop, serial, mark: 0 });
                self.inventory.assign_serial(serial, key);
                self.list.push(key);
                return key;
            }

            pub fn remove(&mut self, key: SlotKey) -> Option<$Obj> {
                let obj = self.arena.remove(key)?;
                self.inventory.unassign(obj.serial);
                self.list.remove(key);
                Some(obj)
            }

            pub fn get(&self, key: SlotKey) -> Option<&$Obj> {
                self.arena.get(key)
            }

            pub fn get_mut(&mut self, key: SlotKey) -> Option<&mut $Obj> {
                self.arena.get_mut(key)
            }

            pub fn find_serial(&self, serial: Serial) -> Option<SlotKey> {
                self.inventory.get(serial)
            }

            pub fn first(&self) -> Option<SlotKey> {
                self.inventory.iter().next().map(|(_, k)| k)
            }

            pub fn iter(&self) -> impl Iterator<Item = (SlotKey, &$Obj)> {
                self.arena.iter()
            }

            pub fn iter_mut(&mut self) -> impl Iterator<Item = (SlotKey, &mut $Obj)> {
                self.arena.iter_mut()
            }

            pub fn mix<R: Rng>(&mut self, rng: &mut R) {
                self.list.mix(rng);
            }

            pub fn clear(&mut self) {
                self.arena.clear();
                self.inventory.clear();
                self.list.clear();
            }
        }
    };
}

object_set!(SolidSet, SolidObj, Solid, solid);
object_set!(BeadSet, BeadObj, Bead, bead);
object_set!(SphereSet, SphereObj, Sphere, sphere);
