//! Spatial index of built chunks
//!
//! Holds every chunk the controller has built, keyed by origin, plus the
//! subset whose last geometry build produced vertices. Both sets are updated
//! at the same call sites so the nonempty set never names a missing chunk.

use crate::streaming::chunk::{Chunk, ChunkKey};
use std::collections::{BTreeSet, HashMap};

/// Chunk storage with a nonempty subset index
#[derive(Debug, Default)]
pub struct ChunkIndex {
    /// Map of chunk keys to chunks
    chunks: HashMap<ChunkKey, Chunk>,
    /// Keys of chunks with a nonempty mesh, ordered for deterministic draws
    nonempty: BTreeSet<ChunkKey>,
}

impl ChunkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: ChunkKey) -> Option<&Chunk> {
        self.chunks.get(&key)
    }

    pub fn get_mut(&mut self, key: ChunkKey) -> Option<&mut Chunk> {
        self.chunks.get_mut(&key)
    }

    /// Insert a chunk, indexing it as nonempty if its mesh is.
    ///
    /// # Returns
    /// The replaced chunk, whose resources the caller must release
    pub fn insert(&mut self, chunk: Chunk) -> Option<Chunk> {
        let key = chunk.key();
        self.set_nonempty(key, chunk.is_nonempty());
        self.chunks.insert(key, chunk)
    }

    /// Remove a chunk from both indices
    ///
    /// # Returns
    /// The removed chunk, whose resources the caller must release
    pub fn remove(&mut self, key: ChunkKey) -> Option<Chunk> {
        self.nonempty.remove(&key);
        self.chunks.remove(&key)
    }

    pub fn contains(&self, key: ChunkKey) -> bool {
        self.chunks.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChunkKey, &Chunk)> {
        self.chunks.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ChunkKey, &mut Chunk)> {
        self.chunks.iter_mut()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ChunkKey> {
        self.chunks.keys()
    }

    /// Keys of chunks with a nonempty mesh, in key order
    pub fn nonempty_keys(&self) -> impl Iterator<Item = &ChunkKey> {
        self.nonempty.iter()
    }

    pub fn nonempty_len(&self) -> usize {
        self.nonempty.len()
    }

    pub fn is_nonempty(&self, key: ChunkKey) -> bool {
        self.nonempty.contains(&key)
    }

    /// Record the emptiness of a chunk's latest build.
    ///
    /// # Returns
    /// True if membership changed
    pub fn set_nonempty(&mut self, key: ChunkKey, nonempty: bool) -> bool {
        if nonempty {
            self.nonempty.insert(key)
        } else {
            self.nonempty.remove(&key)
        }
    }

    /// Remove every chunk, handing them back for release
    pub fn drain(&mut self) -> impl Iterator<Item = Chunk> + '_ {
        self.nonempty.clear();
        self.chunks.drain().map(|(_, chunk)| chunk)
    }

    /// Remove every chunk matching a predicate, handing them back for release
    pub fn remove_where<F>(&mut self, mut predicate: F) -> Vec<Chunk>
    where
        F: FnMut(&ChunkKey, &Chunk) -> bool,
    {
        let doomed: Vec<ChunkKey> = self
            .chunks
            .iter()
            .filter(|(key, chunk)| predicate(key, chunk))
            .map(|(key, _)| *key)
            .collect();
        doomed.into_iter().filter_map(|key| self.remove(key)).collect()
    }

    /// Every nonempty key names an indexed chunk that is nonempty
    pub fn is_consistent(&self) -> bool {
        self.nonempty
            .iter()
            .all(|key| self.chunks.get(key).is_some_and(|c| c.is_nonempty()))
            && self
                .chunks
                .iter()
                .all(|(key, chunk)| chunk.is_nonempty() == self.nonempty.contains(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::IVec3;
    use crate::render::backend::MeshData;
    use crate::render::headless::HeadlessBackend;
    use crate::world::{BlockType, Blockset, TextureAtlas, World};

    struct Fixture {
        world: World,
        backend: HeadlessBackend,
        scratch: MeshData,
    }

    impl Fixture {
        fn new() -> Self {
            let blockset = Blockset::new(TextureAtlas::default(), vec![BlockType::new("stone", true, 2)]);
            let mut world = World::new(IVec3::splat(42), blockset).unwrap();
            // One solid cube in the chunk at the origin only
            world.set_block(IVec3::new(1, 1, 1), 2);
            Self {
                world,
                backend: HeadlessBackend::new(),
                scratch: MeshData::default(),
            }
        }

        fn make_chunk(&mut self, x: i32, y: i32, z: i32) -> Chunk {
            let key = ChunkKey::containing(IVec3::new(x, y, z) * 14);
            Chunk::build(key, &self.world, &mut self.backend, &mut self.scratch)
        }
    }

    fn key(x: i32, y: i32, z: i32) -> ChunkKey {
        ChunkKey::containing(IVec3::new(x, y, z) * 14)
    }

    #[test]
    fn test_index_new() {
        let index = ChunkIndex::new();
        assert_eq!(index.len(), 0);
        assert!(index.is_empty());
        assert_eq!(index.nonempty_len(), 0);
    }

    #[test]
    fn test_index_insert_and_get() {
        let mut fx = Fixture::new();
        let mut index = ChunkIndex::new();
        let chunk = fx.make_chunk(1, 2, 0);

        index.insert(chunk);
        assert_eq!(index.len(), 1);
        assert!(index.contains(key(1, 2, 0)));
        assert_eq!(index.get(key(1, 2, 0)).unwrap().key(), key(1, 2, 0));
        assert!(index.get(key(0, 0, 0)).is_none());
    }

    #[test]
    fn test_index_insert_replace() {
        let mut fx = Fixture::new();
        let mut index = ChunkIndex::new();

        let replaced = index.insert(fx.make_chunk(1, 0, 0));
        assert!(replaced.is_none());

        let replaced = index.insert(fx.make_chunk(1, 0, 0));
        assert_eq!(replaced.unwrap().key(), key(1, 0, 0));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_nonempty_tracks_insert_and_remove() {
        let mut fx = Fixture::new();
        let mut index = ChunkIndex::new();

        index.insert(fx.make_chunk(0, 0, 0));
        index.insert(fx.make_chunk(1, 0, 0));
        assert!(index.is_nonempty(key(0, 0, 0)));
        assert!(!index.is_nonempty(key(1, 0, 0)));
        assert_eq!(index.nonempty_keys().copied().collect::<Vec<_>>(), vec![key(0, 0, 0)]);
        assert!(index.is_consistent());

        let mut removed = index.remove(key(0, 0, 0)).unwrap();
        removed.release(&mut fx.backend);
        assert!(!index.is_nonempty(key(0, 0, 0)));
        assert!(index.is_consistent());
    }

    #[test]
    fn test_set_nonempty_reports_change() {
        let mut index = ChunkIndex::new();
        assert!(index.set_nonempty(key(0, 0, 0), true));
        assert!(!index.set_nonempty(key(0, 0, 0), true));
        assert!(index.set_nonempty(key(0, 0, 0), false));
        assert!(!index.set_nonempty(key(0, 0, 0), false));
    }

    #[test]
    fn test_index_remove_missing() {
        let mut index = ChunkIndex::new();
        assert!(index.remove(key(3, 3, 3)).is_none());
    }

    #[test]
    fn test_remove_where() {
        let mut fx = Fixture::new();
        let mut index = ChunkIndex::new();
        for x in 0..3 {
            index.insert(fx.make_chunk(x, 0, 0));
        }

        let removed = index.remove_where(|k, _| k.origin().x > 0);
        assert_eq!(removed.len(), 2);
        assert_eq!(index.len(), 1);
        assert!(index.contains(key(0, 0, 0)));
        assert!(index.is_consistent());
    }

    #[test]
    fn test_index_drain() {
        let mut fx = Fixture::new();
        let mut index = ChunkIndex::new();
        index.insert(fx.make_chunk(0, 0, 0));
        index.insert(fx.make_chunk(0, 1, 0));

        for mut chunk in index.drain() {
            chunk.release(&mut fx.backend);
        }
        assert!(index.is_empty());
        assert_eq!(index.nonempty_len(), 0);
        assert_eq!(fx.backend.live_mesh_count(), 0);
    }

    #[test]
    fn test_keys_iterator() {
        let mut fx = Fixture::new();
        let mut index = ChunkIndex::new();
        index.insert(fx.make_chunk(1, 2, 0));
        index.insert(fx.make_chunk(2, 0, 1));

        let keys: Vec<_> = index.keys().copied().collect();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&key(1, 2, 0)));
        assert!(keys.contains(&key(2, 0, 1)));
    }
}
