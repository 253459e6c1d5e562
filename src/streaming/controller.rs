//! Chunk visibility and streaming for one world
//!
//! [`WorldRenderer`] decides which chunks exist around the viewer, builds and
//! rebuilds them within a per-frame time budget, and draws everything it
//! holds. World, blockset and settings changes arrive through listener
//! closures that queue them in an [`Inbox`]; the queue is applied at the start
//! of every `tick` and `draw`.

use std::collections::HashMap;
use std::rc::Rc;

use crate::circuit::CircuitRenderer;
use crate::core::observer::Subscription;
use crate::core::time::Clock;
use crate::core::types::{IVec3, Vec3};
use crate::particles::ParticleSystem;
use crate::render::backend::{MeshData, RenderBackend};
use crate::render::overlay::DebugOverlays;
use crate::streaming::cache::ChunkIndex;
use crate::streaming::chunk::{dist_sq, Chunk, ChunkKey, DirtyKind, CHUNK_SIZE};
use crate::streaming::config::RenderSettings;
use crate::streaming::distance::RenderDistanceCache;
use crate::streaming::events::{Inbox, RenderEvent};
use crate::streaming::priority::DirtyQueue;
use crate::world::{BlocksetEvent, TransientKind, World, WorldEvent};

/// Where the renderer is in its frame cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    /// All queues are empty
    Idle,
    /// Work is left over for later frames
    Draining,
    /// Resources are gone; every operation is a no-op
    Released,
}

/// What one `tick` did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub events_processed: usize,
    pub visibility_recomputed: bool,
    pub chunks_built: usize,
    pub chunks_rebuilt: usize,
    pub chunks_evicted: usize,
    pub circuits_added: usize,
    pub circuits_dropped: usize,
    /// Add and dirty queue length after the tick
    pub pending: usize,
    pub frame_requested: bool,
}

/// What one `draw` submitted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawReport {
    pub chunks_drawn: usize,
    pub chunks_culled: usize,
    pub circuits_drawn: usize,
    pub particles_drawn: usize,
    pub particles_expired: usize,
}

/// Cumulative counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub ticks: u64,
    pub draws: u64,
    pub events_processed: u64,
    pub visibility_recomputes: u64,
    pub chunks_built: u64,
    pub chunks_rebuilt: u64,
    pub chunks_evicted: u64,
    pub circuits_added: u64,
    pub circuits_dropped: u64,
    pub particles_spawned: u64,
}

/// Streams and draws the chunks of one world around a moving viewer
pub struct WorldRenderer<B: RenderBackend> {
    backend: B,
    settings: Rc<RenderSettings>,
    clock: Rc<dyn Clock>,
    redraw: Rc<dyn Fn()>,
    inbox: Inbox,
    world_subscription: Option<Subscription>,
    blockset_subscription: Option<Subscription>,
    settings_subscriptions: Vec<Subscription>,
    state: StreamState,
    player_chunk: Option<ChunkKey>,
    add_queue: DirtyQueue,
    dirty_queue: DirtyQueue,
    chunks: ChunkIndex,
    circuits: HashMap<IVec3, CircuitRenderer>,
    particles: Vec<ParticleSystem>,
    distances: RenderDistanceCache,
    overlays: DebugOverlays,
    /// Reused vertex storage for chunk builds
    scratch: MeshData,
    /// Reused key list for draw passes
    draw_keys: Vec<ChunkKey>,
    stats: StreamStats,
}

impl<B: RenderBackend> WorldRenderer<B> {
    /// Create a renderer and subscribe it to the world, its blockset and the settings
    ///
    /// # Arguments
    /// * `world` - World to stream; must be passed to every later `tick` and `draw`
    /// * `backend` - Owner of all GPU resources the renderer creates
    /// * `settings` - Live settings shared with the host
    /// * `clock` - Time source for frame deadlines and particle lifetimes
    /// * `redraw` - Called whenever another frame is needed
    pub fn new(
        world: &World,
        backend: B,
        settings: Rc<RenderSettings>,
        clock: Rc<dyn Clock>,
        redraw: Rc<dyn Fn()>,
    ) -> Self {
        let inbox = Inbox::new(redraw.clone());

        let world_subscription = {
            let inbox = inbox.clone();
            world.listen(move |event| inbox.push(RenderEvent::World(event.clone())))
        };
        let distance_subscription = {
            let inbox = inbox.clone();
            settings
                .render_distance
                .listen(move |d| inbox.push(RenderEvent::RenderDistanceChanged(*d)))
        };
        let debug_subscription = {
            let inbox = inbox.clone();
            settings
                .debug_texture_allocation
                .listen(move |on| inbox.push(RenderEvent::DebugToggled(*on)))
        };

        log::info!(
            "Created world renderer for {} world, render distance {:.1}",
            world.dims(),
            settings.render_distance.get()
        );

        Self {
            blockset_subscription: Some(Self::listen_blockset(world, &inbox)),
            backend,
            settings,
            clock,
            redraw,
            inbox,
            world_subscription: Some(world_subscription),
            settings_subscriptions: vec![distance_subscription, debug_subscription],
            state: StreamState::Idle,
            player_chunk: None,
            add_queue: DirtyQueue::new(),
            dirty_queue: DirtyQueue::new(),
            chunks: ChunkIndex::new(),
            circuits: HashMap::new(),
            particles: Vec::new(),
            distances: RenderDistanceCache::new(),
            overlays: DebugOverlays::new(),
            scratch: MeshData::default(),
            draw_keys: Vec::new(),
            stats: StreamStats::default(),
        }
    }

    fn listen_blockset(world: &World, inbox: &Inbox) -> Subscription {
        let inbox = inbox.clone();
        world
            .blockset()
            .listen(move |event| inbox.push(RenderEvent::Blockset(*event)))
    }

    /// Per-frame streaming step
    ///
    /// Applies queued notifications, recomputes visibility if the viewer
    /// entered another chunk, then builds queued chunks until the frame
    /// deadline passes.
    pub fn tick(&mut self, world: &World, view_position: Vec3) -> TickReport {
        let mut report = TickReport::default();
        if self.state == StreamState::Released {
            return report;
        }
        self.stats.ticks += 1;
        report.events_processed = self.process_events(world);

        let player = ChunkKey::from_view_position(view_position);
        if self.player_chunk != Some(player) {
            self.update_visibility(world, player, &mut report);
        }

        let deadline = self.settings.budget.deadline(self.clock.now(), self.add_queue.len());
        while !self.add_queue.is_empty() && self.clock.now() < deadline {
            let Some(key) = self.add_queue.dequeue_nearest() else {
                break;
            };
            self.calc_chunk(world, key, &mut report);
        }
        while !self.dirty_queue.is_empty() && self.clock.now() < deadline {
            let Some(key) = self.dirty_queue.dequeue_nearest() else {
                break;
            };
            if self.chunks.contains(key) {
                self.calc_chunk(world, key, &mut report);
            }
        }

        report.pending = self.pending_work();
        if report.pending > 0 {
            self.state = StreamState::Draining;
            report.frame_requested = true;
            (self.redraw)();
        } else {
            self.state = StreamState::Idle;
        }
        report
    }

    /// Submit everything currently held
    pub fn draw(&mut self, world: &World) -> DrawReport {
        let mut report = DrawReport::default();
        if self.state == StreamState::Released {
            return report;
        }
        self.stats.draws += 1;
        self.process_events(world);

        let mut keys = std::mem::take(&mut self.draw_keys);
        keys.clear();
        keys.extend(self.chunks.nonempty_keys().copied());
        for key in &keys {
            if let Some(chunk) = self.chunks.get_mut(*key) {
                if self.backend.aabb_in_view(chunk.aabb()) {
                    chunk.draw(&mut self.backend);
                    report.chunks_drawn += 1;
                } else {
                    report.chunks_culled += 1;
                }
            }
        }
        self.draw_keys = keys;

        for (origin, renderer) in self.circuits.iter_mut() {
            if let Some(circuit) = world.circuit(*origin) {
                renderer.draw(circuit, &mut self.backend);
                report.circuits_drawn += 1;
            }
        }

        let now = self.clock.now();
        let mut i = 0;
        while i < self.particles.len() {
            if self.particles[i].expired(now) {
                let mut expired = self.particles.swap_remove(i);
                expired.release(&mut self.backend);
                report.particles_expired += 1;
            } else {
                let key = ChunkKey::containing(self.particles[i].cube());
                let light = self
                    .chunks
                    .get_mut(key)
                    .map(|chunk| chunk.light_texture(&mut self.backend));
                self.particles[i].draw(now, light, &mut self.backend);
                report.particles_drawn += 1;
                i += 1;
            }
        }
        if !self.particles.is_empty() {
            (self.redraw)();
        }

        if self.settings.show_boundaries {
            self.overlays.draw_boundaries(&mut self.backend, world.dims());
        }
        if self.settings.debug_texture_allocation.get() {
            self.overlays.draw_texture_debug(&mut self.backend);
        }
        report
    }

    /// Destroy every backend resource and stop listening. The renderer is
    /// inert afterwards.
    pub fn release_resources(&mut self) {
        if self.state == StreamState::Released {
            return;
        }
        self.world_subscription = None;
        self.blockset_subscription = None;
        self.settings_subscriptions.clear();
        self.inbox.clear();

        let mut released = 0;
        for mut chunk in self.chunks.drain() {
            chunk.release(&mut self.backend);
            released += 1;
        }
        for (_, mut renderer) in self.circuits.drain() {
            renderer.release(&mut self.backend);
        }
        for mut system in self.particles.drain(..) {
            system.release(&mut self.backend);
        }
        self.overlays.release(&mut self.backend);
        self.add_queue.clear();
        self.dirty_queue.clear();
        self.player_chunk = None;
        self.state = StreamState::Released;
        log::info!("Released world renderer ({} chunks)", released);
    }

    /// Chunks waiting to be built or rebuilt
    pub fn pending_work(&self) -> usize {
        self.add_queue.len() + self.dirty_queue.len()
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn player_chunk(&self) -> Option<ChunkKey> {
        self.player_chunk
    }

    pub fn chunks(&self) -> &ChunkIndex {
        &self.chunks
    }

    pub fn add_queue_len(&self) -> usize {
        self.add_queue.len()
    }

    pub fn dirty_queue_len(&self) -> usize {
        self.dirty_queue.len()
    }

    pub fn has_circuit(&self, origin: IVec3) -> bool {
        self.circuits.contains_key(&origin)
    }

    pub fn circuit_count(&self) -> usize {
        self.circuits.len()
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Apply queued notifications. Returns how many were handled.
    fn process_events(&mut self, world: &World) -> usize {
        let events = self.inbox.take_all();
        let count = events.len();
        for event in events {
            match event {
                RenderEvent::World(WorldEvent::BlockDirtied(cube)) => {
                    self.dirty_chunks_for_block(cube, DirtyKind::Geometry)
                }
                RenderEvent::World(WorldEvent::BlockRelit(cube)) => {
                    self.dirty_chunks_for_block(cube, DirtyKind::Lighting)
                }
                RenderEvent::World(WorldEvent::CircuitDirtied(origin)) => {
                    self.dirty_circuit(world, origin)
                }
                RenderEvent::World(WorldEvent::CircuitDeleted(origin)) => {
                    if let Some(mut renderer) = self.circuits.remove(&origin) {
                        renderer.release(&mut self.backend);
                    }
                }
                RenderEvent::World(WorldEvent::DirtyAll) => self.dirty_all(),
                RenderEvent::World(WorldEvent::BlocksetChanged) => {
                    self.blockset_subscription = Some(Self::listen_blockset(world, &self.inbox));
                    self.dirty_all();
                }
                RenderEvent::World(WorldEvent::Transient { cube, kind, block, rotation }) => {
                    self.add_particles(world, cube, kind, block, rotation)
                }
                RenderEvent::Blockset(
                    BlocksetEvent::TexturingChanged | BlocksetEvent::TableChanged,
                ) => self.dirty_all(),
                RenderEvent::RenderDistanceChanged(distance) => {
                    log::debug!("Render distance changed to {:.1}", distance);
                    self.player_chunk = None;
                    self.add_queue.clear();
                    self.dirty_queue.clear();
                }
                // The listener already asked for a frame
                RenderEvent::DebugToggled(_) => {}
            }
        }
        self.stats.events_processed += count as u64;
        count
    }

    /// Flag the chunk holding `cube`, and any neighbor sharing the face the cube touches
    fn dirty_chunks_for_block(&mut self, cube: IVec3, kind: DirtyKind) {
        let key = ChunkKey::containing(cube);
        let local = cube - key.origin();
        self.set_dirty_chunk(key, kind);
        for (axis, unit) in IVec3::AXES.into_iter().enumerate() {
            if local[axis] == 0 {
                self.set_dirty_chunk(key.offset_by_chunks(-unit), kind);
            }
            if local[axis] == CHUNK_SIZE - 1 {
                self.set_dirty_chunk(key.offset_by_chunks(unit), kind);
            }
        }
    }

    /// Only chunks that already exist are flagged
    fn set_dirty_chunk(&mut self, key: ChunkKey, kind: DirtyKind) {
        if let Some(chunk) = self.chunks.get_mut(key) {
            chunk.set_dirty(kind);
            self.dirty_queue.enqueue(key);
        }
    }

    fn dirty_all(&mut self) {
        self.dirty_queue.clear();
        for (key, chunk) in self.chunks.iter_mut() {
            chunk.set_dirty(DirtyKind::Geometry);
            chunk.set_dirty(DirtyKind::Lighting);
            self.dirty_queue.enqueue(*key);
        }
        log::debug!("Marked all {} chunks dirty", self.dirty_queue.len());
    }

    fn dirty_circuit(&mut self, world: &World, origin: IVec3) {
        let Some(circuit) = world.circuit(origin) else {
            if let Some(mut renderer) = self.circuits.remove(&origin) {
                renderer.release(&mut self.backend);
            }
            return;
        };
        match self.circuits.get_mut(&origin) {
            Some(renderer) => {
                renderer.recompute(circuit, world.blockset().tile_size(), &mut self.backend)
            }
            None => {
                self.add_circuits(world);
            }
        }
    }

    /// Create renderers for circuits within the add distance. Needs a player chunk.
    fn add_circuits(&mut self, world: &World) -> usize {
        let Some(player) = self.player_chunk else {
            return 0;
        };
        let add_distance_sq = self
            .distances
            .get(self.settings.render_distance.get())
            .add_distance_sq;
        let tile_size = world.blockset().tile_size();
        let mut added = 0;
        for (origin, circuit) in world.circuits() {
            if dist_sq(*origin, player.origin()) < add_distance_sq
                && !self.circuits.contains_key(origin)
            {
                let renderer = CircuitRenderer::new(circuit, tile_size, &mut self.backend);
                self.circuits.insert(*origin, renderer);
                added += 1;
            }
        }
        self.stats.circuits_added += added as u64;
        added
    }

    fn add_particles(
        &mut self,
        world: &World,
        cube: IVec3,
        kind: TransientKind,
        block: u8,
        rotation: u8,
    ) {
        let system = ParticleSystem::new(
            cube,
            kind,
            block,
            rotation,
            world.blockset(),
            self.clock.now(),
            &mut self.backend,
        );
        self.particles.push(system);
        self.stats.particles_spawned += 1;
    }

    /// The viewer entered `player`: queue newly visible chunks, drop far ones
    fn update_visibility(&mut self, world: &World, player: ChunkKey, report: &mut TickReport) {
        let dims = world.dims();
        self.player_chunk = Some(player);
        self.add_queue.set_focus(player);
        self.dirty_queue.set_focus(player);

        let info = self.distances.get(self.settings.render_distance.get());
        let drop_distance_sq = info.drop_distance_sq;
        for offset in &info.near_chunk_order {
            let key = player.offset(*offset);
            if key.intersects_world(dims) && !self.chunks.contains(key) {
                self.add_queue.enqueue(key);
            }
        }

        let evicted = self.chunks.remove_where(|key, _| key.dist_sq(&player) > drop_distance_sq);
        report.chunks_evicted = evicted.len();
        for mut chunk in evicted {
            chunk.release(&mut self.backend);
        }

        report.circuits_added = self.add_circuits(world);
        let far: Vec<IVec3> = self
            .circuits
            .keys()
            .filter(|origin| dist_sq(**origin, player.origin()) > drop_distance_sq)
            .copied()
            .collect();
        for origin in far {
            if let Some(mut renderer) = self.circuits.remove(&origin) {
                renderer.release(&mut self.backend);
                report.circuits_dropped += 1;
            }
        }

        // Retained chunks may still be flagged after the dirty queue was cleared
        for (key, chunk) in self.chunks.iter() {
            if chunk.is_dirty() {
                self.dirty_queue.enqueue(*key);
            }
        }

        report.visibility_recomputed = true;
        self.stats.visibility_recomputes += 1;
        self.stats.chunks_evicted += report.chunks_evicted as u64;
        self.stats.circuits_dropped += report.circuits_dropped as u64;
        log::debug!(
            "Viewer entered chunk {}: {} queued, {} evicted, {} chunks held",
            player.origin(),
            self.add_queue.len(),
            report.chunks_evicted,
            self.chunks.len()
        );
    }

    /// Build a missing chunk or rebuild the flagged aspects of an existing one
    fn calc_chunk(&mut self, world: &World, key: ChunkKey, report: &mut TickReport) {
        match self.chunks.get_mut(key) {
            Some(chunk) => {
                if !chunk.is_dirty() {
                    return;
                }
                let geometry = chunk.rebuild_dirty(world, &mut self.backend, &mut self.scratch);
                let nonempty = chunk.is_nonempty();
                if geometry {
                    self.chunks.set_nonempty(key, nonempty);
                }
                report.chunks_rebuilt += 1;
                self.stats.chunks_rebuilt += 1;
            }
            None => {
                let chunk = Chunk::build(key, world, &mut self.backend, &mut self.scratch);
                self.chunks.insert(chunk);
                report.chunks_built += 1;
                self.stats.chunks_built += 1;
            }
        }
    }
}

impl<B: RenderBackend> std::fmt::Debug for WorldRenderer<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldRenderer")
            .field("state", &self.state)
            .field("player_chunk", &self.player_chunk)
            .field("chunks", &self.chunks.len())
            .field("pending", &self.pending_work())
            .field("circuits", &self.circuits.len())
            .field("particles", &self.particles.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::ManualClock;
    use crate::math::Aabb;
    use crate::render::backend::DrawKind;
    use crate::render::headless::HeadlessBackend;
    use crate::world::{BlockType, Blockset, Circuit, NetValue, TextureAtlas};
    use std::cell::Cell;
    use std::time::{Duration, Instant};

    const STONE: u8 = 2;

    /// Clock that moves forward by a fixed step every time it is read
    struct SteppingClock {
        now: Cell<Instant>,
        step: Duration,
    }

    impl Clock for SteppingClock {
        fn now(&self) -> Instant {
            let now = self.now.get();
            self.now.set(now + self.step);
            now
        }
    }

    struct Harness {
        world: World,
        settings: Rc<RenderSettings>,
        clock: ManualClock,
        redraws: Rc<Cell<usize>>,
        renderer: WorldRenderer<HeadlessBackend>,
    }

    fn blockset() -> Blockset {
        Blockset::new(TextureAtlas::default(), vec![BlockType::new("stone", true, 1)])
    }

    type Parts = (World, Rc<RenderSettings>, Rc<Cell<usize>>, WorldRenderer<HeadlessBackend>);

    fn harness_with(dims: IVec3, render_distance: f32, clock: Rc<dyn Clock>) -> Parts {
        let world = World::new(dims, blockset()).unwrap();
        let settings = Rc::new(RenderSettings::default());
        settings.render_distance.set(render_distance);
        let redraws = Rc::new(Cell::new(0));
        let counter = redraws.clone();
        let renderer = WorldRenderer::new(
            &world,
            HeadlessBackend::new(),
            settings.clone(),
            clock,
            Rc::new(move || counter.set(counter.get() + 1)),
        );
        (world, settings, redraws, renderer)
    }

    fn harness(dims: IVec3, render_distance: f32) -> Harness {
        let clock = ManualClock::new();
        let (world, settings, redraws, renderer) =
            harness_with(dims, render_distance, Rc::new(clock.clone()));
        Harness { world, settings, clock, redraws, renderer }
    }

    fn drain(h: &mut Harness, view: Vec3) {
        for _ in 0..100 {
            if h.renderer.tick(&h.world, view).pending == 0 {
                return;
            }
        }
        panic!("streaming never settled");
    }

    #[test]
    fn test_first_tick_builds_every_intersecting_chunk() {
        let mut h = harness(IVec3::new(28, 14, 28), 100.0);
        let report = h.renderer.tick(&h.world, Vec3::new(1.0, 1.0, 1.0));

        assert!(report.visibility_recomputed);
        // x and z in {0, 14, 28}, y in {0, 14}
        assert_eq!(report.chunks_built, 18);
        assert_eq!(report.pending, 0);
        assert_eq!(h.renderer.state(), StreamState::Idle);
        assert!(h.renderer.chunks().keys().all(|k| k.origin().to_array().iter().all(|c| c.rem_euclid(CHUNK_SIZE) == 0)));
    }

    #[test]
    fn test_small_budget_limits_builds() {
        let clock = SteppingClock { now: Cell::new(Instant::now()), step: Duration::from_millis(4) };
        let (world, _settings, redraws, mut renderer) = harness_with(IVec3::new(28, 14, 28), 100.0, Rc::new(clock));

        let report = renderer.tick(&world, Vec3::ZERO);
        // Reads at +4 and +8 are before the 10 ms deadline
        assert_eq!(report.chunks_built, 2);
        assert_eq!(report.pending, 16);
        assert!(report.frame_requested);
        assert_eq!(renderer.state(), StreamState::Draining);
        assert_eq!(redraws.get(), 1);
    }

    #[test]
    fn test_backlog_earns_large_budget() {
        let clock = SteppingClock { now: Cell::new(Instant::now()), step: Duration::from_millis(4) };
        let (world, _settings, _redraws, mut renderer) = harness_with(IVec3::new(56, 14, 56), 100.0, Rc::new(clock));

        let report = renderer.tick(&world, Vec3::ZERO);
        // 5 * 2 * 5 chunks queued, above the threshold of 30
        assert_eq!(report.chunks_built + report.pending, 50);
        assert_eq!(report.chunks_built, 7);
    }

    #[test]
    fn test_nearest_chunks_build_first() {
        let clock = SteppingClock { now: Cell::new(Instant::now()), step: Duration::from_millis(4) };
        let (world, _settings, _redraws, mut renderer) = harness_with(IVec3::new(56, 14, 56), 100.0, Rc::new(clock));

        renderer.tick(&world, Vec3::new(29.0, 1.0, 29.0));
        let player = ChunkKey::containing(IVec3::new(28, 0, 28));
        assert!(renderer.chunks().contains(player));
        // One chunk at distance 0 and five face neighbors at 196 come before the rest
        let mut distances: Vec<i64> = renderer.chunks().keys().map(|k| k.dist_sq(&player)).collect();
        distances.sort();
        assert_eq!(distances, vec![0, 196, 196, 196, 196, 196, 392]);
    }

    #[test]
    fn test_idle_tick_changes_nothing() {
        let mut h = harness(IVec3::new(28, 14, 28), 100.0);
        drain(&mut h, Vec3::ONE);
        let redraws = h.redraws.get();
        let created = h.renderer.backend().stats();

        let report = h.renderer.tick(&h.world, Vec3::new(2.0, 3.0, 4.0));
        assert_eq!(report, TickReport::default());
        assert_eq!(h.redraws.get(), redraws);
        assert_eq!(h.renderer.backend().stats(), created);
        assert_eq!(h.renderer.state(), StreamState::Idle);
    }

    #[test]
    fn test_hysteresis_between_add_and_drop() {
        let mut h = harness(IVec3::new(140, 70, 140), 20.0);
        let near = Vec3::new(45.0, 30.0, 45.0);
        let candidate = ChunkKey::containing(IVec3::new(70, 42, 56));
        // 28^2 + 14^2 + 14^2 = 1176, between 1156 and 2304
        assert_eq!(candidate.dist_sq(&ChunkKey::from_view_position(near)), 1176);

        drain(&mut h, near);
        assert!(!h.renderer.chunks().contains(candidate));

        drain(&mut h, Vec3::new(71.0, 43.0, 57.0));
        assert!(h.renderer.chunks().contains(candidate));

        drain(&mut h, near);
        assert!(h.renderer.chunks().contains(candidate));

        let report = h.renderer.tick(&h.world, Vec3::new(15.0, 15.0, 15.0));
        assert!(report.chunks_evicted > 0);
        assert!(!h.renderer.chunks().contains(candidate));
        assert!(h.renderer.chunks().is_consistent());
    }

    #[test]
    fn test_evicted_chunks_release_resources() {
        let mut h = harness(IVec3::new(140, 14, 14), 20.0);
        drain(&mut h, Vec3::new(1.0, 1.0, 1.0));
        let held = h.renderer.chunks().len();
        drain(&mut h, Vec3::new(139.0, 1.0, 1.0));

        let backend = h.renderer.backend();
        assert_eq!(backend.live_mesh_count(), h.renderer.chunks().len());
        assert!(backend.stats().meshes_destroyed > 0);
        assert!(held > 0);
    }

    #[test]
    fn test_nonempty_index_tracks_last_build() {
        let mut h = harness(IVec3::new(28, 14, 28), 100.0);
        drain(&mut h, Vec3::ONE);
        assert_eq!(h.renderer.chunks().nonempty_len(), 0);

        let key = ChunkKey::containing(IVec3::new(20, 5, 20));
        h.world.set_block(IVec3::new(20, 5, 20), STONE);
        drain(&mut h, Vec3::ONE);
        assert!(h.renderer.chunks().is_nonempty(key));
        assert_eq!(h.renderer.chunks().nonempty_len(), 1);

        h.world.set_block(IVec3::new(20, 5, 20), 0);
        drain(&mut h, Vec3::ONE);
        assert!(!h.renderer.chunks().is_nonempty(key));
        assert!(h.renderer.chunks().is_consistent());
    }

    #[test]
    fn test_block_change_dirties_boundary_neighbors() {
        let mut h = harness(IVec3::new(42, 14, 28), 100.0);
        drain(&mut h, Vec3::ONE);

        h.world.set_block(IVec3::new(20, 5, 5), STONE);
        h.renderer.draw(&h.world);
        assert_eq!(h.renderer.dirty_queue_len(), 1);

        // Local x is 0: the chunk at x = 0 shares the face
        h.world.set_block(IVec3::new(14, 5, 5), STONE);
        h.renderer.draw(&h.world);
        assert_eq!(h.renderer.dirty_queue_len(), 2);

        // Local x is 13 and local z is 13
        h.world.set_block(IVec3::new(27, 5, 13), STONE);
        h.renderer.draw(&h.world);
        assert_eq!(h.renderer.dirty_queue_len(), 4);

        let report = h.renderer.tick(&h.world, Vec3::ONE);
        assert_eq!(report.chunks_rebuilt, 4);
        assert_eq!(report.chunks_built, 0);
    }

    #[test]
    fn test_relight_rebuilds_only_lighting() {
        let mut h = harness(IVec3::new(28, 14, 28), 100.0);
        drain(&mut h, Vec3::ONE);
        let meshes = h.renderer.backend().stats().meshes_created;

        h.world.set_light(IVec3::new(5, 5, 5), 10);
        let report = h.renderer.tick(&h.world, Vec3::ONE);
        assert_eq!(report.chunks_rebuilt, 1);

        let key = ChunkKey::containing(IVec3::new(5, 5, 5));
        let chunk = h.renderer.chunks().get(key).unwrap();
        assert_eq!(chunk.light().data()[crate::lighting::light_index(IVec3::new(5, 5, 5))], 10);
        assert_eq!(h.renderer.backend().stats().meshes_created, meshes);
    }

    #[test]
    fn test_changes_outside_held_chunks_are_ignored() {
        let mut h = harness(IVec3::new(140, 14, 14), 20.0);
        drain(&mut h, Vec3::ONE);

        h.world.set_block(IVec3::new(130, 5, 5), STONE);
        h.renderer.draw(&h.world);
        assert_eq!(h.renderer.dirty_queue_len(), 0);
    }

    #[test]
    fn test_render_distance_change_clears_queues() {
        let clock = SteppingClock { now: Cell::new(Instant::now()), step: Duration::from_millis(4) };
        let (world, settings, _redraws, mut renderer) = harness_with(IVec3::new(56, 14, 56), 100.0, Rc::new(clock));
        renderer.tick(&world, Vec3::ZERO);
        assert!(renderer.pending_work() > 0);

        settings.render_distance.set(20.0);
        renderer.draw(&world);
        assert_eq!(renderer.pending_work(), 0);
        assert_eq!(renderer.player_chunk(), None);

        let report = renderer.tick(&world, Vec3::ZERO);
        assert!(report.visibility_recomputed);
        assert!(renderer.player_chunk().is_some());
    }

    #[test]
    fn test_dirty_all_flags_every_chunk() {
        let mut h = harness(IVec3::new(28, 14, 28), 100.0);
        drain(&mut h, Vec3::ONE);

        h.world.invalidate_all();
        h.renderer.draw(&h.world);
        assert_eq!(h.renderer.dirty_queue_len(), 18);

        let report = h.renderer.tick(&h.world, Vec3::ONE);
        assert_eq!(report.chunks_rebuilt, 18);
    }

    #[test]
    fn test_blockset_swap_resubscribes() {
        let mut h = harness(IVec3::new(28, 14, 28), 100.0);
        drain(&mut h, Vec3::ONE);

        h.world.set_blockset(blockset());
        drain(&mut h, Vec3::ONE);

        h.world.blockset_mut().retexture(TextureAtlas { tile_size: 8, tiles_per_row: 4 });
        h.renderer.draw(&h.world);
        assert_eq!(h.renderer.dirty_queue_len(), 18);
    }

    #[test]
    fn test_circuits_follow_viewer() {
        let mut h = harness(IVec3::new(140, 14, 14), 20.0);
        let origin = IVec3::new(2, 2, 2);
        h.world.set_circuit(Circuit::new(origin).with_edge(0, origin, IVec3::new(3, 2, 2)));

        // No player chunk yet: nothing to compare against
        h.renderer.draw(&h.world);
        assert_eq!(h.renderer.circuit_count(), 0);

        drain(&mut h, Vec3::ONE);
        assert!(h.renderer.has_circuit(origin));

        h.world.set_net_value(origin, 0, NetValue::Bool(true));
        h.renderer.backend_mut().take_submitted();
        let report = h.renderer.draw(&h.world);
        assert_eq!(report.circuits_drawn, 1);

        let report = h.renderer.tick(&h.world, Vec3::new(139.0, 1.0, 1.0));
        assert_eq!(report.circuits_dropped, 1);
        assert!(!h.renderer.has_circuit(origin));
    }

    #[test]
    fn test_circuit_rewire_and_delete() {
        let mut h = harness(IVec3::new(28, 14, 28), 100.0);
        drain(&mut h, Vec3::ONE);
        let origin = IVec3::new(4, 4, 4);

        h.world.set_circuit(Circuit::new(origin).with_edge(0, origin, IVec3::new(5, 4, 4)));
        h.renderer.draw(&h.world);
        assert!(h.renderer.has_circuit(origin));

        h.world.set_circuit(
            Circuit::new(origin)
                .with_edge(0, origin, IVec3::new(5, 4, 4))
                .with_edge(1, IVec3::new(5, 4, 4), IVec3::new(5, 5, 4)),
        );
        h.renderer.draw(&h.world);
        assert_eq!(h.renderer.circuit_count(), 1);

        let meshes_before = h.renderer.backend().live_mesh_count();
        h.world.remove_circuit(origin);
        h.renderer.draw(&h.world);
        assert!(!h.renderer.has_circuit(origin));
        assert_eq!(h.renderer.backend().live_mesh_count(), meshes_before - 1);
    }

    #[test]
    fn test_particles_live_then_expire() {
        let mut h = harness(IVec3::new(28, 14, 28), 100.0);
        h.world.set_block(IVec3::new(3, 3, 3), STONE);
        drain(&mut h, Vec3::ONE);

        h.world.emit_transient(IVec3::new(3, 3, 3), TransientKind::Destroy);
        h.world.set_block(IVec3::new(3, 3, 3), 0);
        h.renderer.tick(&h.world, Vec3::ONE);
        assert_eq!(h.renderer.particle_count(), 1);

        let redraws = h.redraws.get();
        h.renderer.backend_mut().take_submitted();
        let report = h.renderer.draw(&h.world);
        assert_eq!(report.particles_drawn, 1);
        assert!(h.redraws.get() > redraws);

        let submitted = h.renderer.backend_mut().take_submitted();
        let particles = submitted.iter().find(|c| c.kind == DrawKind::Particles).unwrap();
        assert!(particles.light_texture.is_some());

        h.clock.advance(Duration::from_secs(2));
        let live = h.renderer.backend().live_mesh_count();
        let report = h.renderer.draw(&h.world);
        assert_eq!(report.particles_expired, 1);
        assert_eq!(h.renderer.particle_count(), 0);
        assert_eq!(h.renderer.backend().live_mesh_count(), live - 1);
    }

    #[test]
    fn test_particles_outlive_their_chunk() {
        let mut h = harness(IVec3::new(28, 14, 28), 20.0);
        h.world.set_block(IVec3::new(3, 3, 3), STONE);
        drain(&mut h, Vec3::ONE);

        h.world.emit_transient(IVec3::new(3, 3, 3), TransientKind::Destroy);
        h.world.set_block(IVec3::new(3, 3, 3), 0);
        h.renderer.tick(&h.world, Vec3::ONE);
        assert_eq!(h.renderer.particle_count(), 1);

        // Far enough that the chunk holding the particle is evicted
        let report = h.renderer.tick(&h.world, Vec3::new(139.0, 1.0, 1.0));
        assert!(report.chunks_evicted > 0);
        assert!(!h.renderer.chunks().contains(ChunkKey::containing(IVec3::new(3, 3, 3))));

        h.renderer.backend_mut().take_submitted();
        let report = h.renderer.draw(&h.world);
        assert_eq!(report.particles_drawn, 1);

        let backend = h.renderer.backend_mut();
        let submitted = backend.take_submitted();
        let particles = submitted.iter().find(|c| c.kind == DrawKind::Particles).unwrap();
        assert_eq!(particles.light_texture, None);
        for light in submitted.iter().filter_map(|c| c.light_texture) {
            assert!(h.renderer.backend().texture_data(light).is_some());
        }
    }

    #[test]
    fn test_particles_use_recreated_light_after_context_loss() {
        let mut h = harness(IVec3::new(14, 14, 14), 100.0);
        h.world.set_block(IVec3::new(3, 3, 3), STONE);
        drain(&mut h, Vec3::ONE);

        h.world.emit_transient(IVec3::new(3, 3, 3), TransientKind::Destroy);
        h.world.set_block(IVec3::new(3, 3, 3), 0);
        h.renderer.tick(&h.world, Vec3::ONE);

        h.renderer.backend_mut().lose_context();
        h.renderer.backend_mut().take_submitted();
        h.renderer.draw(&h.world);

        let submitted = h.renderer.backend_mut().take_submitted();
        let particles = submitted.iter().find(|c| c.kind == DrawKind::Particles).unwrap();
        let light = particles.light_texture.unwrap();
        assert!(h.renderer.backend().texture_data(light).is_some());
    }

    #[test]
    fn test_draw_culls_chunks_out_of_view() {
        let mut h = harness(IVec3::new(42, 14, 14), 100.0);
        for x in [1, 15, 29] {
            h.world.set_block(IVec3::new(x, 1, 1), STONE);
        }
        drain(&mut h, Vec3::ONE);

        h.renderer.backend_mut().set_view_bounds(Some(Aabb::new(Vec3::ZERO, Vec3::new(20.0, 14.0, 14.0))));
        let report = h.renderer.draw(&h.world);
        assert_eq!(report.chunks_drawn, 2);
        assert_eq!(report.chunks_culled, 1);

        let submitted = h.renderer.backend_mut().take_submitted();
        assert!(submitted.iter().all(|c| c.kind == DrawKind::Chunk && c.light_texture.is_some()));
    }

    #[test]
    fn test_draw_recreates_light_after_context_loss() {
        let mut h = harness(IVec3::new(14, 14, 14), 100.0);
        h.world.set_block(IVec3::new(1, 1, 1), STONE);
        drain(&mut h, Vec3::ONE);
        h.renderer.draw(&h.world);
        let created = h.renderer.backend().stats().textures_created;

        h.renderer.backend_mut().lose_context();
        h.renderer.backend_mut().take_submitted();
        h.renderer.draw(&h.world);

        let backend = h.renderer.backend_mut();
        assert_eq!(backend.stats().textures_created, created + 1);
        let submitted = backend.take_submitted();
        let light = submitted[0].light_texture.unwrap();
        assert!(h.renderer.backend().texture_data(light).is_some());
    }

    #[test]
    fn test_overlays_follow_settings() {
        let world = World::new(IVec3::new(14, 14, 14), blockset()).unwrap();
        let settings = Rc::new(RenderSettings { show_boundaries: true, ..RenderSettings::default() });
        let mut renderer = WorldRenderer::new(
            &world,
            HeadlessBackend::new(),
            settings.clone(),
            Rc::new(ManualClock::new()),
            Rc::new(|| {}),
        );

        renderer.draw(&world);
        let kinds: Vec<DrawKind> = renderer.backend_mut().take_submitted().iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![DrawKind::Overlay]);

        settings.debug_texture_allocation.set(true);
        renderer.draw(&world);
        let kinds: Vec<DrawKind> = renderer.backend_mut().take_submitted().iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![DrawKind::Overlay, DrawKind::ScreenOverlay]);
    }

    #[test]
    fn test_release_resources_is_final() {
        let mut h = harness(IVec3::new(28, 14, 28), 100.0);
        h.world.set_block(IVec3::new(3, 3, 3), STONE);
        h.world.set_circuit(Circuit::new(IVec3::new(5, 5, 5)).with_edge(0, IVec3::new(5, 5, 5), IVec3::new(6, 5, 5)));
        drain(&mut h, Vec3::ONE);
        h.world.emit_transient(IVec3::new(3, 3, 3), TransientKind::Create);
        h.renderer.draw(&h.world);
        assert_eq!(h.world.listener_count(), 1);

        h.renderer.release_resources();
        assert_eq!(h.renderer.state(), StreamState::Released);
        assert_eq!(h.world.listener_count(), 0);
        assert_eq!(h.settings.render_distance.listener_count(), 0);
        assert_eq!(h.renderer.backend().live_mesh_count(), 0);
        assert_eq!(h.renderer.backend().live_texture_count(), 0);

        h.world.set_block(IVec3::new(4, 4, 4), STONE);
        assert_eq!(h.renderer.tick(&h.world, Vec3::new(20.0, 1.0, 1.0)), TickReport::default());
        assert_eq!(h.renderer.draw(&h.world), DrawReport::default());
        assert!(h.renderer.chunks().is_empty());
    }
}
