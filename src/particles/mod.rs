//! Short-lived fragment effects for placed and broken blocks
//!
//! A destroyed block bursts into fragments that fly outward and fall. A
//! created block gathers fragments from around it into its shape. Each system
//! owns its mesh and expires after [`PARTICLE_LIFETIME`]. The light texture
//! belongs to the containing chunk and is passed in at draw time.

use std::time::{Duration, Instant};

use crate::core::types::{IVec3, Vec3};
use crate::render::backend::{
    DrawCommand, DrawKind, MeshData, MeshHandle, Primitive, RenderBackend, TextureHandle,
};
use crate::world::{Blockset, CubeRotation, TransientKind};

pub const PARTICLE_LIFETIME: Duration = Duration::from_millis(1000);

/// Fragments per axis are capped so big tiles don't explode into thousands of points
const MAX_FRAGMENTS_PER_AXIS: u32 = 4;

const GRAVITY: f32 = -9.8;

#[derive(Clone, Copy, Debug)]
struct Fragment {
    /// Resting position relative to the cube's low corner
    home: Vec3,
    /// Launch velocity for bursts, scatter offset for gathers
    motion: Vec3,
    texcoord: [f32; 2],
}

/// One block's fragment effect
#[derive(Debug)]
pub struct ParticleSystem {
    cube: IVec3,
    kind: TransientKind,
    started: Instant,
    fragments: Vec<Fragment>,
    mesh: Option<MeshHandle>,
    scratch: MeshData,
}

impl ParticleSystem {
    /// Create the effect for the block `block` with rotation code `rotation`
    /// as it looked when the event fired
    pub fn new<B: RenderBackend>(
        cube: IVec3,
        kind: TransientKind,
        block: u8,
        rotation: u8,
        blockset: &Blockset,
        now: Instant,
        backend: &mut B,
    ) -> Self {
        let per_axis = blockset.tile_size().clamp(1, MAX_FRAGMENTS_PER_AXIS);
        let tile = blockset.block_type(block).map_or(0, |t| t.tile);
        let (u0, v0, u1, v1) = blockset.atlas().tile_uv(tile);
        let rotation = CubeRotation::by_code_or_identity(rotation);

        let seed = (cube.x as u64) << 42
            ^ (cube.y as u64 & 0x1f_ffff) << 21
            ^ (cube.z as u64 & 0x1f_ffff);
        let mut rng = fastrand::Rng::with_seed(seed);

        let step = 1.0 / per_axis as f32;
        let mut fragments = Vec::with_capacity((per_axis * per_axis * per_axis) as usize);
        for i in 0..per_axis {
            for j in 0..per_axis {
                for k in 0..per_axis {
                    let local = (Vec3::new(i as f32, j as f32, k as f32) + 0.5) * step;
                    let home = rotation.transform_point(local);
                    let outward = (home - Vec3::splat(0.5)) * 2.0;
                    let jitter = Vec3::new(rng.f32(), rng.f32(), rng.f32()) - 0.5;
                    let motion = match kind {
                        TransientKind::Destroy => {
                            outward * 2.0 + jitter + Vec3::Y * (1.5 + rng.f32())
                        }
                        TransientKind::Create => outward + jitter,
                    };
                    let texcoord = [u0 + (u1 - u0) * local.x, v0 + (v1 - v0) * (1.0 - local.y)];
                    fragments.push(Fragment { home, motion, texcoord });
                }
            }
        }

        let mut system = Self {
            cube,
            kind,
            started: now,
            fragments,
            mesh: None,
            scratch: MeshData::new(Primitive::Points),
        };
        system.fill_mesh(Duration::ZERO);
        let label = format!("particles_{}_{}_{}", cube.x, cube.y, cube.z);
        system.mesh = Some(backend.create_mesh(&label, &system.scratch));
        system
    }

    pub fn cube(&self) -> IVec3 {
        self.cube
    }

    pub fn kind(&self) -> TransientKind {
        self.kind
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    pub fn expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) >= PARTICLE_LIFETIME
    }

    /// World position of every fragment after `age`
    pub fn positions_at(&self, age: Duration) -> Vec<Vec3> {
        let t = age.min(PARTICLE_LIFETIME).as_secs_f32();
        let progress = t / PARTICLE_LIFETIME.as_secs_f32();
        let base = self.cube.as_vec3();
        self.fragments
            .iter()
            .map(|f| {
                base + match self.kind {
                    TransientKind::Destroy => {
                        f.home + f.motion * t + Vec3::Y * (0.5 * GRAVITY * t * t)
                    }
                    TransientKind::Create => f.home + f.motion * (1.0 - progress),
                }
            })
            .collect()
    }

    fn fill_mesh(&mut self, age: Duration) {
        let positions = self.positions_at(age);
        self.scratch.clear();
        for (position, fragment) in positions.iter().zip(&self.fragments) {
            self.scratch.positions.push(position.to_array());
            self.scratch.normals.push([0.0; 3]);
            self.scratch.texcoords.push(fragment.texcoord);
        }
    }

    /// Advance the animation to `now` and submit, lit by `light_texture`
    pub fn draw<B: RenderBackend>(
        &mut self,
        now: Instant,
        light_texture: Option<TextureHandle>,
        backend: &mut B,
    ) {
        let Some(mesh) = self.mesh else {
            return;
        };
        self.fill_mesh(now.saturating_duration_since(self.started));
        backend.update_mesh(mesh, &self.scratch);
        backend.submit(DrawCommand {
            mesh,
            light_texture,
            kind: DrawKind::Particles,
        });
    }

    pub fn release<B: RenderBackend>(&mut self, backend: &mut B) {
        if let Some(mesh) = self.mesh.take() {
            backend.destroy_mesh(mesh);
        }
    }
}
