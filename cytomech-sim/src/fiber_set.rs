use rand::Rng;

use cytomech_datastructures::{Arena, Inventory, Serial, SlotKey, ShuffleList};
use cytomech_mech::Fiber;

use crate::TipState;

/// Back-reference from a fiber to one binder attached on it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BinderRef {
    Single(SlotKey),
    /// couple key and hand index (0 or 1)
    Couple(SlotKey, u8),
}

/// A fiber with its bookkeeping: class, serial number, attached binders
/// and the assembly state of its plus end.
pub struct FiberObj {
    pub fiber: Fiber,
    pub prop: usize,
    pub serial: Serial,
    pub mark: i32,
    /// binders currently attached to this fiber
    pub binders: Vec<BinderRef>,
    /// assembly state of the plus end
    pub tip_state: TipState,
    /// length assembled at the plus end during the last step
    pub fresh_growth: f64,
}

/// The inventory of all fibers.
#[derive(Default)]
pub struct FiberSet {
    pub(crate) arena: Arena<FiberObj>,
    pub(crate) inventory: Inventory,
    /// iteration order for the step, reshuffled every time
    pub list: ShuffleList,
}

impl FiberSet {
    pub fn new() -> FiberSet {
        FiberSet::default()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Registers a new fiber, assigning the next serial number
    pub fn add(&mut self, fiber: Fiber, prop: usize) -> SlotKey {
        let key = self.arena.insert(FiberObj {
            fiber,
            prop,
            serial: 0,
            mark: 0,
            binders: Vec::new(),
            tip_state: TipState::Static,
            fresh_growth: 0.0,
        });
        let serial = self.inventory.assign(key);
        self.arena.get_mut(key).unwrap().serial = serial;
        self.list.push(key);
        return key;
    }

    /// Registers a fiber under an explicit serial number, as needed when
    /// reading a trajectory frame.
    pub fn restore(&mut self, fiber: Fiber, prop: usize, serial: Serial) -> SlotKey {
        let key = self.arena.insert(FiberObj {
            fiber,
            prop,
            serial,
            mark: 0,
            binders: Vec::new(),
            tip_state: TipState::Static,
            fresh_growth: 0.0,
        });
        self.inventory.assign_serial(serial, key);
        self.list.push(key);
        return key;
    }

    /// Removes a fiber; its binders must have been detached or transferred
    /// beforehand.
    pub fn remove(&mut self, key: SlotKey) -> Option<FiberObj> {
        let obj = self.arena.remove(key)?;
        debug_assert!(obj.binders.is_empty(), "fiber removed while binders are attached");
        self.inventory.unassign(obj.serial);
        self.list.remove(key);
        Some(obj)
    }

    pub fn get(&self, key: SlotKey) -> Option<&FiberObj> {
        self.arena.get(key)
    }

    pub fn get_mut(&mut self, key: SlotKey) -> Option<&mut FiberObj> {
        self.arena.get_mut(key)
    }

    pub fn contains(&self, key: SlotKey) -> bool {
        self.arena.contains(key)
    }

    /// Finds a fiber by its serial number
    pub fn find_serial(&self, serial: Serial) -> Option<SlotKey> {
        self.inventory.get(serial)
    }

    /// The fiber with the smallest serial number
    pub fn first(&self) -> Option<SlotKey> {
        self.inventory.iter().next().map(|(_, k)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotKey, &FiberObj)> {
        self.arena.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SlotKey, &mut FiberObj)> {
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
