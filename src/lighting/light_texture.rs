//! Padded per-chunk light volumes
//!
//! A chunk's light texture covers the chunk plus a one-cube shell on every
//! side, so shading at chunk edges can sample the neighbors. Coordinates wrap
//! modulo [`LIGHT_TEXTURE_SIZE`], which is exactly `CHUNK_SIZE + 2`: every
//! padded cell lands on a distinct texel.

use crate::core::types::IVec3;
use crate::render::backend::{ContextTicket, RenderBackend, TextureHandle};
use crate::streaming::chunk::LIGHT_TEXTURE_SIZE;
use crate::world::World;

/// Bytes in one packed light volume
pub const LIGHT_TEXTURE_BYTES: usize = LIGHT_TEXTURE_SIZE * LIGHT_TEXTURE_SIZE * LIGHT_TEXTURE_SIZE;

/// Texel index of a world cube inside a light volume
#[inline]
pub fn light_index(cube: IVec3) -> usize {
    let l = LIGHT_TEXTURE_SIZE as i32;
    let x = cube.x.rem_euclid(l) as usize;
    let y = cube.y.rem_euclid(l) as usize;
    let z = cube.z.rem_euclid(l) as usize;
    (x * LIGHT_TEXTURE_SIZE + y) * LIGHT_TEXTURE_SIZE + z
}

/// Pack light for the cubes `[origin - 1, limit]` on every axis.
///
/// `limit` is the chunk's exclusive upper corner clipped to the world, so the
/// inclusive range reaches one cube past the chunk. Cubes outside the world
/// read the world's outside light level.
pub fn pack_light(world: &World, origin: IVec3, limit: IVec3, out: &mut [u8]) {
    debug_assert_eq!(out.len(), LIGHT_TEXTURE_BYTES);
    debug_assert!((limit - origin).max_element() <= LIGHT_TEXTURE_SIZE as i32 - 2);

    let raw = world.raw_light();
    let outside = world.light_outside();
    for x in origin.x - 1..=limit.x {
        for y in origin.y - 1..=limit.y {
            for z in origin.z - 1..=limit.z {
                let cube = IVec3::new(x, y, z);
                out[light_index(cube)] = if world.in_bounds(cube) {
                    raw[world.raw_index(cube)]
                } else {
                    outside
                };
            }
        }
    }
}

/// CPU-side light volume and the GPU texture it was last uploaded to
#[derive(Debug)]
pub struct LightTexture {
    data: Vec<u8>,
    handle: Option<TextureHandle>,
    /// Context the handle belongs to
    ticket: ContextTicket,
}

impl LightTexture {
    pub fn new() -> Self {
        Self {
            data: vec![0; LIGHT_TEXTURE_BYTES],
            handle: None,
            ticket: ContextTicket::default(),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether the GPU copy exists in the backend's current context
    pub fn is_current<B: RenderBackend>(&self, backend: &B) -> bool {
        self.handle.is_some() && self.ticket == backend.context_ticket()
    }

    /// Repack from the world and upload
    pub fn refresh<B: RenderBackend>(
        &mut self,
        world: &World,
        origin: IVec3,
        limit: IVec3,
        backend: &mut B,
    ) {
        pack_light(world, origin, limit, &mut self.data);
        self.upload(backend);
    }

    /// Push the packed data to the GPU, creating the texture when there is
    /// no current one
    pub fn upload<B: RenderBackend>(&mut self, backend: &mut B) -> TextureHandle {
        match self.handle {
            Some(handle) if self.ticket == backend.context_ticket() => {
                backend.update_light_texture(handle, &self.data);
                handle
            }
            stale => {
                if let Some(handle) = stale {
                    log::debug!("Re-creating light texture {:?} after context change", handle);
                    backend.destroy_texture(handle);
                }
                let handle = backend.create_light_texture(&self.data);
                self.handle = Some(handle);
                self.ticket = backend.context_ticket();
                handle
            }
        }
    }

    /// A texture valid in the backend's current context. Re-created and
    /// re-uploaded from the packed data when the context changed.
    pub fn get<B: RenderBackend>(&mut self, backend: &mut B) -> TextureHandle {
        match self.handle {
            Some(handle) if self.ticket == backend.context_ticket() => handle,
            _ => self.upload(backend),
        }
    }

    /// Handle without validation, for consumers that only borrow the chunk
    pub fn handle(&self) -> Option<TextureHandle> {
        self.handle
    }

    pub fn release<B: RenderBackend>(&mut self, backend: &mut B) {
        if let Some(handle) = self.handle.take() {
            backend.destroy_texture(handle);
        }
    }
}

impl Default for LightTexture {
    fn default() -> Self {
        Self::new()
    }
}
