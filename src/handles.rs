//! Generational handles for resources the host owns and must release.
//!
//! A handle packs a slot index and the slot's generation into a `u64`
//! (`index << 32 | generation`). Releasing a resource bumps the generation, so
//! every copy of the old handle goes stale at once.

use crate::error::{PluginError, PluginResult};
use core::marker::PhantomData;

pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub fn from_raw(raw: u64) -> Self {
        Self { index: (raw >> 32) as u32, generation: raw as u32, _marker: PhantomData }
    }

    pub fn raw(&self) -> u64 {
        (u64::from(self.index) << 32) | u64::from(self.generation)
    }
}

// Manual impls: the derives would require `T` to implement them too.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> core::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Handle({:#x})", self.raw())
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

pub struct HandleTable<T> {
    kind: &'static str,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> HandleTable<T> {
    pub fn new(kind: &'static str) -> Self {
        Self { kind, slots: Vec::new(), free: Vec::new(), live: 0 }
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn insert(&mut self, value: T) -> Handle<T> {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return Handle { index, generation: slot.generation, _marker: PhantomData };
        }
        let index = self.slots.len() as u32;
        // Generation 0 is never issued so a zeroed raw handle is always stale.
        self.slots.push(Slot { generation: 1, value: Some(value) });
        Handle { index, generation: 1, _marker: PhantomData }
    }

    fn stale(&self, handle: Handle<T>) -> PluginError {
        PluginError::StaleHandle { kind: self.kind, raw: handle.raw() }
    }

    pub fn get(&self, handle: Handle<T>) -> PluginResult<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
            .ok_or_else(|| self.stale(handle))
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> PluginResult<&mut T> {
        let stale = self.stale(handle);
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_mut())
            .ok_or(stale)
    }

    pub fn remove(&mut self, handle: Handle<T>) -> PluginResult<T> {
        let stale = self.stale(handle);
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.value.is_some())
            .ok_or(stale)?;
        let value = slot.value.take().ok_or(PluginError::StaleHandle { kind: self.kind, raw: handle.raw() })?;
        slot.generation = slot.generation.wrapping_add(1).max(1);
        self.free.push(handle.index);
        self.live -= 1;
        Ok(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| {
                (Handle { index: index as u32, generation: slot.generation, _marker: PhantomData }, value)
            })
        })
    }
}
