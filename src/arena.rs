//! Index-addressed scratch pools.
//!
//! Every cross-structure reference in the render graph is a plain `u32` index
//! into one of these pools rather than a pointer or an `Rc`. This mirrors the
//! pool-of-indices style the rest of this crate's ancestor code used for its
//! Vulkan object tables (`sid_vec::IdVec`), generalized here to work without
//! pulling in that crate.

use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// A typed, packed `{offset, count}` view into an [`IndexArena<T>`].
///
/// Spans are relative to a specific pool; nothing stops you from indexing the
/// wrong pool with the wrong span, which is why every phase keeps its spans
/// next to the one pool they were carved from.
#[derive(Debug)]
pub struct Span<T> {
    offset: u32,
    count: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Span<T> {
    pub const fn empty() -> Self {
        Span {
            offset: 0,
            count: 0,
            _marker: PhantomData,
        }
    }

    pub fn new(offset: u32, count: u32) -> Self {
        Span {
            offset,
            count,
            _marker: PhantomData,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn end(&self) -> u32 {
        self.offset + self.count
    }

    pub fn set_range(&mut self, offset: u32, count: u32) {
        self.offset = offset;
        self.count = count;
    }

    pub fn get<'a>(&self, pool: &'a [T]) -> &'a [T] {
        &pool[self.offset as usize..self.end() as usize]
    }

    pub fn get_mut<'a>(&self, pool: &'a mut [T]) -> &'a mut [T] {
        &mut pool[self.offset as usize..self.end() as usize]
    }
}

// `#[derive(Clone, Copy)]` would require `T: Clone`/`T: Copy`; the span never
// actually stores a `T`, so implement these by hand.
impl<T> Clone for Span<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Span<T> {}
impl<T> Default for Span<T> {
    fn default() -> Self {
        Span::empty()
    }
}
impl<T> PartialEq for Span<T> {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset && self.count == other.count
    }
}
impl<T> Eq for Span<T> {}

/// Opaque snapshot of an [`IndexArena`]'s length, used to unwind partial phase
/// output when a phase fails partway through (spec §7: "arena checkpoints").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaCheckpoint(usize);

/// A growable, index-addressed pool. Conceptually the scratch or frame arena
/// described in the design notes: phases allocate into it, and on error the
/// allocations since the last checkpoint are discarded by truncation rather
/// than by individually freeing anything.
#[derive(Debug)]
pub struct IndexArena<T> {
    items: Vec<T>,
}

impl<T> Default for IndexArena<T> {
    fn default() -> Self {
        IndexArena { items: Vec::new() }
    }
}

impl<T> IndexArena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        IndexArena {
            items: Vec::with_capacity(cap),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn checkpoint(&self) -> ArenaCheckpoint {
        ArenaCheckpoint(self.items.len())
    }

    pub fn restore(&mut self, checkpoint: ArenaCheckpoint) {
        self.items.truncate(checkpoint.0);
    }

    /// Drops every element but keeps the backing allocation, for reuse across
    /// frames without re-growing the pool from zero each time.
    pub fn reset_keep_capacity(&mut self) {
        self.items.clear();
    }

    pub fn push(&mut self, value: T) -> u32 {
        let idx = self.items.len() as u32;
        self.items.push(value);
        idx
    }

    /// Appends `count` clones of `value` and returns a span covering them.
    pub fn grow_filled(&mut self, count: usize, value: T) -> Span<T>
    where
        T: Clone,
    {
        let offset = self.items.len() as u32;
        self.items.resize(self.items.len() + count, value);
        Span::new(offset, count as u32)
    }

    pub fn resize(&mut self, new_len: usize, value: T)
    where
        T: Clone,
    {
        self.items.resize(new_len, value);
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }

    pub fn iter(&self) -> std::slice::Iter<T> {
        self.items.iter()
    }

    pub fn get(&self, index: u32) -> Option<&T> {
        self.items.get(index as usize)
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.items.get_mut(index as usize)
    }
}

impl<T> Index<u32> for IndexArena<T> {
    type Output = T;
    fn index(&self, index: u32) -> &T {
        &self.items[index as usize]
    }
}

impl<T> IndexMut<u32> for IndexArena<T> {
    fn index_mut(&mut self, index: u32) -> &mut T {
        &mut self.items[index as usize]
    }
}

impl<T> Index<Span<T>> for IndexArena<T> {
    type Output = [T];
    fn index(&self, span: Span<T>) -> &[T] {
        span.get(&self.items)
    }
}

impl<T> IndexMut<Span<T>> for IndexArena<T> {
    fn index_mut(&mut self, span: Span<T>) -> &mut [T] {
        span.get_mut(&mut self.items)
    }
}

/// RAII guard that restores an arena to its entry checkpoint unless
/// explicitly dismissed, used to unwind scratch allocations on an early
/// `?`-return out of a phase.
pub struct ScratchGuard<'a, T> {
    arena: &'a mut IndexArena<T>,
    checkpoint: ArenaCheckpoint,
    dismissed: bool,
}

impl<'a, T> ScratchGuard<'a, T> {
    pub fn new(arena: &'a mut IndexArena<T>) -> Self {
        let checkpoint = arena.checkpoint();
        ScratchGuard {
            arena,
            checkpoint,
            dismissed: false,
        }
    }

    /// Keep everything allocated since the guard was created (the phase
    /// succeeded).
    pub fn dismiss(mut self) {
        self.dismissed = true;
    }

    pub fn arena_mut(&mut self) -> &mut IndexArena<T> {
        self.arena
    }
}

impl<'a, T> Drop for ScratchGuard<'a, T> {
    fn drop(&mut self) {
        if !self.dismissed {
            self.arena.restore(self.checkpoint);
        }
    }
}

/// A simple free-list-backed pool of variable-length reference lists (used
/// for per-resource accessor-node lists, which grow and shrink as the access
/// DAG is built). Mirrors `SpanPool<T>` from the design notes: rather than
/// reallocating a `Vec` per resource, every resource's accessor list lives as
/// a `Span` into one shared backing `IndexArena`.
#[derive(Debug, Default)]
pub struct SpanPool<T> {
    backing: IndexArena<T>,
}

impl<T: Clone + PartialEq> SpanPool<T> {
    pub fn new() -> Self {
        SpanPool {
            backing: IndexArena::new(),
        }
    }

    pub fn reset(&mut self) {
        self.backing.reset_keep_capacity();
    }

    pub fn get<'a>(&'a self, span: Span<T>) -> &'a [T] {
        span.get(self.backing.as_slice())
    }

    /// Appends `value` to the span, growing the backing pool. Because spans
    /// are not individually freed (the whole pool resets once per frame),
    /// appending always allocates a fresh tail rather than reusing freed
    /// holes -- acceptable since node-reference lists are write-once within a
    /// single `AccessDagBuilder` run.
    pub fn push(&mut self, span: &mut Span<T>, value: T) {
        if span.is_empty() {
            let offset = self.backing.push(value);
            *span = Span::new(offset, 1);
            return;
        }
        if span.end() as usize == self.backing.len() {
            self.backing.push(value);
            span.set_range(span.offset(), span.len() as u32 + 1);
            return;
        }
        // Not at the tail: relocate. This only happens when two spans were
        // interleaved in the backing pool, which the access-DAG builder
        // avoids by always appending to the most-recently-grown span first.
        let mut items: Vec<T> = span.get(self.backing.as_slice()).to_vec();
        items.push(value);
        let offset = self.backing.len() as u32;
        for item in items {
            self.backing.push(item);
        }
        *span = Span::new(offset, span.len() as u32 + 1);
    }

    pub fn clone_span(&mut self, src: Span<T>) -> Span<T> {
        let items: Vec<T> = src.get(self.backing.as_slice()).to_vec();
        let offset = self.backing.len() as u32;
        for item in items {
            self.backing.push(item);
        }
        Span::new(offset, src.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_restore_truncates() {
        let mut arena: IndexArena<u32> = IndexArena::new();
        arena.push(1);
        arena.push(2);
        let cp = arena.checkpoint();
        arena.push(3);
        arena.push(4);
        assert_eq!(arena.len(), 4);
        arena.restore(cp);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena[0], 1);
        assert_eq!(arena[1], 2);
    }

    #[test]
    fn span_pool_push_grows_in_place_at_tail() {
        let mut pool: SpanPool<u32> = SpanPool::new();
        let mut span = Span::empty();
        pool.push(&mut span, 10);
        pool.push(&mut span, 20);
        pool.push(&mut span, 30);
        assert_eq!(pool.get(span), &[10, 20, 30]);
    }

    #[test]
    fn scratch_guard_restores_on_drop() {
        let mut arena: IndexArena<u32> = IndexArena::new();
        arena.push(1);
        {
            let mut guard = ScratchGuard::new(&mut arena);
            guard.arena_mut().push(2);
        }
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn scratch_guard_keeps_allocations_when_dismissed() {
        let mut arena: IndexArena<u32> = IndexArena::new();
        arena.push(1);
        {
            let mut guard = ScratchGuard::new(&mut arena);
            guard.arena_mut().push(2);
            guard.dismiss();
        }
        assert_eq!(arena.len(), 2);
    }
}
