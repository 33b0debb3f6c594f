//! Block records and the side table that stores them.
//!
//! Block metadata does not live inside the arena buffer. Each block is a
//! [`Block`] record in a [`BlockTable`] slab, addressed by [`BlockId`].
//! Physical neighbours are linked by index, free-list membership by
//! `next_free`, and an offset index maps a header offset back to its
//! record so that a data pointer can be resolved in O(1).

use indexmap::IndexMap;
use shoal_core::align::integrity_tag;

/// Index of a live record in a [`BlockTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct BlockId(usize);

/// Metadata for one contiguous region `[offset, offset + header + size)`.
#[derive(Clone, Debug)]
pub(crate) struct Block {
    /// Header offset from the arena start.
    pub(crate) offset: usize,
    /// Usable bytes, excluding the header.
    pub(crate) size: usize,
    /// Allocated (`true`) or free.
    pub(crate) used: bool,
    /// `integrity_tag(size, offset)` as of the last legitimate update.
    pub(crate) tag: u64,
    /// Next block on the free list. Only meaningful while free.
    pub(crate) next_free: Option<BlockId>,
    /// Physically preceding block.
    pub(crate) prev: Option<BlockId>,
    /// Physically following block.
    pub(crate) next: Option<BlockId>,
}

impl Block {
    fn new(offset: usize, size: usize) -> Self {
        Self {
            offset,
            size,
            used: false,
            tag: integrity_tag(size, offset),
            next_free: None,
            prev: None,
            next: None,
        }
    }

    /// Recompute the tag after a legitimate size or offset change.
    pub(crate) fn retag(&mut self) {
        self.tag = integrity_tag(self.size, self.offset);
    }

    /// Whether the stored tag still matches size and offset.
    pub(crate) fn is_intact(&self) -> bool {
        self.tag == integrity_tag(self.size, self.offset)
    }

    /// Header plus data bytes.
    pub(crate) fn footprint(&self, header: usize) -> usize {
        header + self.size
    }
}

/// Slab of block records with recycled slots.
pub(crate) struct BlockTable {
    slots: Vec<Option<Block>>,
    /// Indices of empty slots available for reuse.
    vacant: Vec<usize>,
    /// Header offset → record.
    by_offset: IndexMap<usize, BlockId>,
    first: Option<BlockId>,
}

impl BlockTable {
    /// An empty table. Call [`reset`](Self::reset) before use.
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            vacant: Vec::new(),
            by_offset: IndexMap::new(),
            first: None,
        }
    }

    /// Drop every record and start over with a single free block.
    /// Returns its ID.
    pub(crate) fn reset(&mut self, capacity: usize, header: usize) -> BlockId {
        self.slots.clear();
        self.vacant.clear();
        self.by_offset.clear();
        let id = self.insert(Block::new(0, capacity - header));
        self.first = Some(id);
        id
    }

    fn insert(&mut self, block: Block) -> BlockId {
        let offset = block.offset;
        let id = if let Some(slot) = self.vacant.pop() {
            self.slots[slot] = Some(block);
            BlockId(slot)
        } else {
            self.slots.push(Some(block));
            BlockId(self.slots.len() - 1)
        };
        self.by_offset.insert(offset, id);
        id
    }

    fn release(&mut self, id: BlockId) -> Block {
        let block = self.slots[id.0]
            .take()
            .expect("released block id refers to a live record");
        self.by_offset.swap_remove(&block.offset);
        self.vacant.push(id.0);
        block
    }

    /// Look up a live record.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not refer to a live record.
    pub(crate) fn get(&self, id: BlockId) -> &Block {
        self.try_get(id).expect("block id refers to a live record")
    }

    /// Mutable counterpart of [`get`](Self::get).
    pub(crate) fn get_mut(&mut self, id: BlockId) -> &mut Block {
        self.slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .expect("block id refers to a live record")
    }

    /// Look up a record that may have been released.
    pub(crate) fn try_get(&self, id: BlockId) -> Option<&Block> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    /// The block at offset 0.
    pub(crate) fn first(&self) -> Option<BlockId> {
        self.first
    }

    /// The block whose header starts at `offset`.
    pub(crate) fn find(&self, offset: usize) -> Option<BlockId> {
        self.by_offset.get(&offset).copied()
    }

    /// Number of live records.
    pub(crate) fn len(&self) -> usize {
        self.by_offset.len()
    }

    /// All live records in slot order (not physical order).
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Block> {
        self.slots.iter().flatten()
    }

    /// Live records in physical order, following `next` links.
    ///
    /// Stops after `len()` steps so that a corrupted chain cannot loop.
    pub(crate) fn physical(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        let mut cursor = self.first;
        let mut remaining = self.len();
        std::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            let id = cursor?;
            let block = self.try_get(id)?;
            remaining -= 1;
            cursor = block.next;
            Some((id, block))
        })
    }

    /// Shrink `id` to `size` bytes and carve the tail into a new free
    /// block placed physically right after it. Returns the new block.
    ///
    /// The caller guarantees `size + header <= block.size`.
    pub(crate) fn split(&mut self, id: BlockId, size: usize, header: usize) -> BlockId {
        let (offset, old_size, next) = {
            let block = self.get(id);
            (block.offset, block.size, block.next)
        };
        debug_assert!(old_size >= size + header);

        let mut rest = Block::new(offset + header + size, old_size - size - header);
        rest.prev = Some(id);
        rest.next = next;
        let rest_id = self.insert(rest);
        if let Some(next) = next {
            self.get_mut(next).prev = Some(rest_id);
        }

        let block = self.get_mut(id);
        block.size = size;
        block.next = Some(rest_id);
        block.retag();
        rest_id
    }

    /// Merge the physical successor of `id` into `id`. Returns the
    /// absorbed record, which is no longer in the table.
    ///
    /// # Panics
    ///
    /// Panics if `id` has no physical successor.
    pub(crate) fn absorb_next(&mut self, id: BlockId, header: usize) -> Block {
        let next_id = self
            .get(id)
            .next
            .expect("absorb_next requires a physical successor");
        let absorbed = self.release(next_id);
        if let Some(after) = absorbed.next {
            self.get_mut(after).prev = Some(id);
        }
        let block = self.get_mut(id);
        block.size += header + absorbed.size;
        block.next = absorbed.next;
        block.retag();
        absorbed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: usize = 16;

    fn formatted(capacity: usize) -> BlockTable {
        let mut table = BlockTable::new();
        table.reset(capacity, HEADER);
        table
    }

    #[test]
    fn new_table_has_single_spanning_block() {
        let table = formatted(1024);
        assert_eq!(table.len(), 1);
        let first = table.first().unwrap();
        let block = table.get(first);
        assert_eq!(block.offset, 0);
        assert_eq!(block.size, 1024 - HEADER);
        assert!(!block.used);
        assert!(block.is_intact());
    }

    #[test]
    fn split_links_remainder_after_block() {
        let mut table = formatted(1024);
        let first = table.first().unwrap();
        let rest = table.split(first, 64, HEADER);

        let a = table.get(first);
        let b = table.get(rest);
        assert_eq!(a.size, 64);
        assert_eq!(a.next, Some(rest));
        assert_eq!(b.offset, HEADER + 64);
        assert_eq!(b.size, 1024 - 2 * HEADER - 64);
        assert_eq!(b.prev, Some(first));
        assert!(a.is_intact() && b.is_intact());
        assert_eq!(table.find(HEADER + 64), Some(rest));
    }

    #[test]
    fn absorb_restores_original_span() {
        let mut table = formatted(1024);
        let first = table.first().unwrap();
        let rest = table.split(first, 64, HEADER);
        let absorbed = table.absorb_next(first, HEADER);

        assert_eq!(absorbed.offset, HEADER + 64);
        assert_eq!(table.len(), 1);
        assert!(table.try_get(rest).is_none());
        assert_eq!(table.get(first).size, 1024 - HEADER);
        assert_eq!(table.get(first).next, None);
    }

    #[test]
    fn released_slots_are_reused() {
        let mut table = formatted(1024);
        let first = table.first().unwrap();
        let rest = table.split(first, 64, HEADER);
        table.absorb_next(first, HEADER);
        let again = table.split(first, 128, HEADER);
        assert_eq!(again, rest);
    }

    #[test]
    fn physical_walk_follows_links() {
        let mut table = formatted(1024);
        let a = table.first().unwrap();
        let b = table.split(a, 64, HEADER);
        let c = table.split(b, 32, HEADER);
        let order: Vec<_> = table.physical().map(|(id, _)| id).collect();
        assert_eq!(order, vec![a, b, c]);
        let end: usize = table.physical().map(|(_, blk)| blk.footprint(HEADER)).sum();
        assert_eq!(end, 1024);
    }

    #[test]
    fn tampered_size_is_detected() {
        let mut table = formatted(1024);
        let first = table.first().unwrap();
        table.get_mut(first).size += 1;
        assert!(!table.get(first).is_intact());
    }
}
