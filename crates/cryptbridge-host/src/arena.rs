//! Generation-checked storage for native objects.
//!
//! A slot goes through three states:
//!
//! ```text
//! Live ──destroy──▶ Destroyed ──collect──▶ Free
//!  │                                        ▲  │
//!  └──────────────collect───────────────────┘  └──insert──▶ Live (generation + 1)
//! ```
//!
//! A destroyed slot still belongs to its handle: the host may keep reading
//! and writing the per-instance attributes, but every native operation fails
//! with "invalid object". Only collection (the host's finalizer) returns the
//! slot to the free list and advances its generation, which invalidates
//! every outstanding copy of the handle.
//!
//! A slot whose generation is exhausted is retired on collection instead of
//! recycled, so a generation value is never handed out twice for one slot.

use tracing::debug;

use crate::{
    error::DispatchError,
    handle::{Handle, TypeTag},
    object::NativeObject,
    value::{Table, Value},
};

#[derive(Debug)]
struct Slot {
    generation: u32,
    tag: TypeTag,
    occupied: bool,
    object: Option<NativeObject>,
    extras: Table,
}

impl Slot {
    fn matches(&self, handle: Handle) -> bool {
        self.occupied && self.generation == handle.generation() && self.tag == handle.tag()
    }
}

/// Owner of every native object handed to the host.
#[derive(Debug, Default)]
pub struct ObjectArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl ObjectArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `object` and return its handle.
    pub fn insert(&mut self, object: NativeObject) -> Result<Handle, DispatchError> {
        let tag = object.tag();

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.tag = tag;
            slot.occupied = true;
            slot.object = Some(object);
            let handle = Handle::new(tag, index, slot.generation);
            debug!(tag = tag.name(), slot = index, generation = slot.generation, "object created");
            return Ok(handle);
        }

        let index = u32::try_from(self.slots.len()).map_err(|_| DispatchError::CreationFailed {
            reason: "object arena is full".to_string(),
        })?;
        self.slots.push(Slot {
            generation: 0,
            tag,
            occupied: true,
            object: Some(object),
            extras: Table::new(),
        });
        debug!(tag = tag.name(), slot = index, generation = 0, "object created");
        Ok(Handle::new(tag, index, 0))
    }

    fn slot(&self, handle: Handle) -> Option<&Slot> {
        self.slots.get(handle.slot() as usize).filter(|slot| slot.matches(handle))
    }

    fn slot_mut(&mut self, handle: Handle) -> Option<&mut Slot> {
        self.slots.get_mut(handle.slot() as usize).filter(|slot| slot.matches(handle))
    }

    fn invalid(handle: Handle) -> DispatchError {
        DispatchError::InvalidObject { type_name: handle.tag().name() }
    }

    /// Whether `handle` names an object that has not been destroyed.
    pub fn is_valid(&self, handle: Handle) -> bool {
        self.slot(handle).is_some_and(|slot| slot.object.is_some())
    }

    /// Whether `handle` still owns its slot (live or destroyed, not collected).
    pub fn is_attached(&self, handle: Handle) -> bool {
        self.slot(handle).is_some()
    }

    /// Native object behind `handle`.
    pub fn object_mut(&mut self, handle: Handle) -> Result<&mut NativeObject, DispatchError> {
        self.slot_mut(handle).and_then(|slot| slot.object.as_mut()).ok_or(Self::invalid(handle))
    }

    /// Release the native object. Idempotent.
    ///
    /// The slot forgets the object before it is dropped, so nothing can
    /// observe a half-released object. Returns whether anything was released.
    pub fn destroy(&mut self, handle: Handle) -> bool {
        let Some(object) = self.slot_mut(handle).and_then(|slot| slot.object.take()) else {
            return false;
        };
        drop(object);
        debug!(tag = handle.tag().name(), slot = handle.slot(), "object destroyed");
        true
    }

    /// Finalize the handle: destroy the object, drop per-instance
    /// attributes and recycle the slot. Idempotent.
    pub fn collect(&mut self, handle: Handle) -> bool {
        self.destroy(handle);

        let Some(slot) = self.slot_mut(handle) else {
            return false;
        };
        slot.occupied = false;
        slot.extras.clear();
        match slot.generation.checked_add(1) {
            Some(generation) => {
                slot.generation = generation;
                self.free.push(handle.slot());
                debug!(tag = handle.tag().name(), slot = handle.slot(), "slot collected");
            },
            None => {
                debug!(tag = handle.tag().name(), slot = handle.slot(), "slot retired");
            },
        }
        true
    }

    /// Per-instance attribute `key`, `nil` if unset.
    pub fn extra(&self, handle: Handle, key: &str) -> Result<Value, DispatchError> {
        let slot = self.slot(handle).ok_or(Self::invalid(handle))?;
        Ok(slot.extras.get(key).cloned().unwrap_or(Value::Nil))
    }

    /// Store a per-instance attribute. Storing `nil` removes it.
    pub fn set_extra(
        &mut self,
        handle: Handle,
        key: &str,
        value: Value,
    ) -> Result<(), DispatchError> {
        let slot = self.slot_mut(handle).ok_or(Self::invalid(handle))?;
        if value.is_nil() {
            slot.extras.remove(key);
        } else {
            slot.extras.insert(key.to_string(), value);
        }
        Ok(())
    }

    /// Handles of every attached slot.
    pub fn handles(&self) -> Vec<Handle> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.occupied)
            .map(|(index, slot)| Handle::new(slot.tag, index as u32, slot.generation))
            .collect()
    }

    /// Number of objects not yet destroyed.
    pub fn live_objects(&self) -> usize {
        self.slots.iter().filter(|slot| slot.object.is_some()).count()
    }

    /// Collect every attached slot. Returns how many were collected.
    pub fn clear(&mut self) -> usize {
        self.handles().into_iter().filter(|handle| self.collect(*handle)).count()
    }
}
