//! Singly linked free list over [`BlockTable`] indices, and the
//! placement strategies that scan it.

use shoal_core::{AllocationStrategy, ArenaError};

use crate::block::{Block, BlockId, BlockTable};

/// Head of the free list. Links live in each block's `next_free`.
pub(crate) struct FreeList {
    head: Option<BlockId>,
    len: usize,
}

impl FreeList {
    /// A list holding only `first`.
    pub(crate) fn new(table: &mut BlockTable, first: BlockId) -> Self {
        let mut list = Self { head: None, len: 0 };
        list.push_front(table, first);
        list
    }

    /// Number of blocks on the list.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn head(&self) -> Option<BlockId> {
        self.head
    }

    pub(crate) fn push_front(&mut self, table: &mut BlockTable, id: BlockId) {
        table.get_mut(id).next_free = self.head;
        self.head = Some(id);
        self.len += 1;
    }

    /// Unlink `id`. Returns `false` if it was not on the list.
    pub(crate) fn remove(&mut self, table: &mut BlockTable, id: BlockId) -> bool {
        let next = table.get(id).next_free;
        if self.head == Some(id) {
            self.head = next;
        } else {
            let Some(prev) = self.predecessor(table, id) else {
                return false;
            };
            table.get_mut(prev).next_free = next;
        }
        table.get_mut(id).next_free = None;
        self.len -= 1;
        true
    }

    /// Put `new` where `old` was. `old` leaves the list.
    pub(crate) fn replace(&mut self, table: &mut BlockTable, old: BlockId, new: BlockId) {
        let next = table.get(old).next_free;
        if self.head == Some(old) {
            self.head = Some(new);
        } else if let Some(prev) = self.predecessor(table, old) {
            table.get_mut(prev).next_free = Some(new);
        } else {
            // `old` was not listed; treat as a plain insertion.
            self.push_front(table, new);
            return;
        }
        table.get_mut(new).next_free = next;
        table.get_mut(old).next_free = None;
    }

    fn predecessor(&self, table: &BlockTable, id: BlockId) -> Option<BlockId> {
        let mut cursor = self.head;
        while let Some(current) = cursor {
            let next = table.get(current).next_free;
            if next == Some(id) {
                return Some(current);
            }
            cursor = next;
        }
        None
    }

    /// Block IDs in list order.
    pub(crate) fn iter<'a>(&self, table: &'a BlockTable) -> impl Iterator<Item = BlockId> + 'a {
        let mut cursor = self.head;
        let mut remaining = self.len;
        std::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            let id = cursor?;
            remaining -= 1;
            cursor = table.try_get(id)?.next_free;
            Some(id)
        })
    }

    /// Pick the block that satisfies `request` bytes under `strategy`.
    ///
    /// `check` runs on every block visited; its first error aborts the scan.
    /// Returns `Ok(None)` when no block is large enough.
    pub(crate) fn select(
        &self,
        table: &BlockTable,
        strategy: AllocationStrategy,
        request: usize,
        mut check: impl FnMut(&Block) -> Result<(), ArenaError>,
    ) -> Result<Option<BlockId>, ArenaError> {
        let mut chosen: Option<(BlockId, usize)> = None;
        let mut cursor = self.head;
        while let Some(id) = cursor {
            let block = table.get(id);
            check(block)?;
            if block.size >= request {
                match strategy {
                    AllocationStrategy::FirstFit => return Ok(Some(id)),
                    AllocationStrategy::BestFit => {
                        if chosen.is_none_or(|(_, size)| block.size < size) {
                            chosen = Some((id, block.size));
                        }
                    }
                    AllocationStrategy::WorstFit => {
                        if chosen.is_none_or(|(_, size)| block.size > size) {
                            chosen = Some((id, block.size));
                        }
                    }
                }
            }
            cursor = block.next_free;
        }
        Ok(chosen.map(|(id, _)| id))
    }
}
