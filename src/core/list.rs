//! # Intrusive List
//!
//! Doubly linked list whose links live in an arena of slots owned by the
//! list. Each slot carries its `prev`/`next` indices and an owner tag, so
//! insertion at either end, removal of a known node and membership checks
//! are all O(1).
//!
//! Nodes are addressed by [`NodeHandle`]s. A handle names the list that
//! issued it and the slot generation it was issued for, so a stale handle
//! or a handle from another list is rejected instead of unlinking the wrong
//! node. Freed slots are kept on an internal freelist and reused by later
//! insertions, which makes the arena its own node pool.

use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_LIST_ID: AtomicU32 = AtomicU32::new(1);

/// Identity of one list instance. Zero is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListId(u32);

impl ListId {
    fn next() -> Self {
        ListId(NEXT_LIST_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Stable reference to a node inside an [`IntrusiveList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    owner: ListId,
    index: usize,
    generation: u32,
}

impl NodeHandle {
    /// The list this handle was issued by.
    pub fn owner(&self) -> ListId {
        self.owner
    }
}

#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    prev: Option<usize>,
    next: Option<usize>,
    /// `Some` while linked into this list; `None` while on the freelist.
    owner: Option<ListId>,
    generation: u32,
}

/// Ordered doubly linked list backed by an index arena.
#[derive(Debug)]
pub struct IntrusiveList<T> {
    id: ListId,
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> IntrusiveList<T> {
    pub fn new() -> Self {
        Self {
            id: ListId::next(),
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn id(&self) -> ListId {
        self.id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push_front(&mut self, value: T) -> NodeHandle {
        self.insert(value, None, self.head)
    }

    pub fn push_back(&mut self, value: T) -> NodeHandle {
        self.insert(value, self.tail, None)
    }

    /// Insert `value` before `node`, handing the value back when `node` is
    /// not a member.
    pub fn insert_before(&mut self, node: NodeHandle, value: T) -> Result<NodeHandle, T> {
        if !self.contains(node) {
            return Err(value);
        }
        let prev = self.slots[node.index].prev;
        Ok(self.insert(value, prev, Some(node.index)))
    }

    /// Insert `value` after `node`, handing the value back when `node` is
    /// not a member.
    pub fn insert_after(&mut self, node: NodeHandle, value: T) -> Result<NodeHandle, T> {
        if !self.contains(node) {
            return Err(value);
        }
        let next = self.slots[node.index].next;
        Ok(self.insert(value, Some(node.index), next))
    }

    /// Unlink `node` and return its value. Foreign or stale handles yield
    /// `None` and leave the list untouched.
    pub fn remove(&mut self, node: NodeHandle) -> Option<T> {
        if !self.contains(node) {
            return None;
        }
        Some(self.unlink(node.index))
    }

    pub fn pop_front(&mut self) -> Option<T> {
        self.head.map(|index| self.unlink(index))
    }

    pub fn pop_back(&mut self) -> Option<T> {
        self.tail.map(|index| self.unlink(index))
    }

    pub fn front(&self) -> Option<&T> {
        self.head.and_then(|index| self.slots[index].value.as_ref())
    }

    pub fn back(&self) -> Option<&T> {
        self.tail.and_then(|index| self.slots[index].value.as_ref())
    }

    pub fn front_mut(&mut self) -> Option<&mut T> {
        match self.head {
            Some(index) => self.slots[index].value.as_mut(),
            None => None,
        }
    }

    pub fn get(&self, node: NodeHandle) -> Option<&T> {
        if !self.contains(node) {
            return None;
        }
        self.slots[node.index].value.as_ref()
    }

    /// O(1) membership test through the owner tag and generation.
    pub fn contains(&self, node: NodeHandle) -> bool {
        if node.owner != self.id {
            return false;
        }
        let member = self
            .slots
            .get(node.index)
            .is_some_and(|slot| slot.owner == Some(self.id) && slot.generation == node.generation);
        debug_assert!(!member || self.scan_contains(node.index));
        member
    }

    /// Unlink every node. Slots stay allocated for reuse.
    pub fn clear(&mut self) {
        while self.pop_front().is_some() {}
    }

    /// Iterate front to back.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.head,
            remaining: self.len,
        }
    }

    /// Drain front to back.
    pub fn drain(&mut self) -> Drain<'_, T> {
        Drain { list: self }
    }

    fn insert(&mut self, value: T, prev: Option<usize>, next: Option<usize>) -> NodeHandle {
        let index = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.value = Some(value);
                slot.prev = prev;
                slot.next = next;
                slot.owner = Some(self.id);
                index
            }
            None => {
                self.slots.push(Slot {
                    value: Some(value),
                    prev,
                    next,
                    owner: Some(self.id),
                    generation: 0,
                });
                self.slots.len() - 1
            }
        };

        match next {
            Some(n) => self.slots[n].prev = Some(index),
            None => self.tail = Some(index),
        }
        match prev {
            Some(p) => self.slots[p].next = Some(index),
            None => self.head = Some(index),
        }
        self.len += 1;

        NodeHandle {
            owner: self.id,
            index,
            generation: self.slots[index].generation,
        }
    }

    fn unlink(&mut self, index: usize) -> T {
        let (prev, next) = {
            let slot = &self.slots[index];
            (slot.prev, slot.next)
        };

        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }

        let slot = &mut self.slots[index];
        slot.prev = None;
        slot.next = None;
        slot.owner = None;
        slot.generation = slot.generation.wrapping_add(1);
        let value = slot.value.take();
        self.free.push(index);
        self.len -= 1;

        match value {
            Some(value) => value,
            None => unreachable!("linked slot always holds a value"),
        }
    }

    fn scan_contains(&self, index: usize) -> bool {
        let mut cursor = self.head;
        while let Some(current) = cursor {
            if current == index {
                return true;
            }
            cursor = self.slots[current].next;
        }
        false
    }
}

impl<T> Default for IntrusiveList<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Front-to-back iterator over an [`IntrusiveList`].
pub struct Iter<'a, T> {
    list: &'a IntrusiveList<T>,
    cursor: Option<usize>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let index = self.cursor?;
        let slot = &self.list.slots[index];
        self.cursor = slot.next;
        self.remaining -= 1;
        slot.value.as_ref()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// Draining iterator that pops from the front.
pub struct Drain<'a, T> {
    list: &'a mut IntrusiveList<T>,
}

impl<T> Iterator for Drain<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.list.pop_front()
    }
}
