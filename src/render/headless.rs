//! In-memory backend: keeps resources as plain data and records draws
//!
//! Used by tests, benches and the demo binary, and as a reference for how a
//! backend is expected to behave around context loss.

use std::collections::HashMap;

use crate::math::Aabb;
use crate::render::backend::{
    ContextTicket, DrawCommand, MeshData, MeshHandle, RenderBackend, TextureHandle,
};

/// Resource counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    pub meshes_created: usize,
    pub meshes_destroyed: usize,
    pub textures_created: usize,
    pub textures_destroyed: usize,
    pub texture_uploads: usize,
}

/// Backend without a GPU
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_id: u64,
    ticket: u64,
    meshes: HashMap<MeshHandle, MeshData>,
    textures: HashMap<TextureHandle, Vec<u8>>,
    /// `None` means everything is in view
    view: Option<Aabb>,
    submitted: Vec<DrawCommand>,
    stats: HeadlessStats,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Restrict `aabb_in_view` to boxes intersecting `view`
    pub fn set_view_bounds(&mut self, view: Option<Aabb>) {
        self.view = view;
    }

    /// Simulate a lost rendering context: every texture is gone and the
    /// ticket moves on
    pub fn lose_context(&mut self) {
        self.ticket += 1;
        self.textures.clear();
    }

    pub fn mesh(&self, handle: MeshHandle) -> Option<&MeshData> {
        self.meshes.get(&handle)
    }

    pub fn texture_data(&self, handle: TextureHandle) -> Option<&[u8]> {
        self.textures.get(&handle).map(|t| t.as_slice())
    }

    pub fn live_mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn stats(&self) -> HeadlessStats {
        self.stats
    }

    /// Draws submitted since the last call
    pub fn take_submitted(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.submitted)
    }
}

impl RenderBackend for HeadlessBackend {
    fn create_mesh(&mut self, _label: &str, mesh: &MeshData) -> MeshHandle {
        let handle = MeshHandle(self.allocate_id());
        self.meshes.insert(handle, mesh.clone());
        self.stats.meshes_created += 1;
        handle
    }

    fn update_mesh(&mut self, handle: MeshHandle, mesh: &MeshData) {
        debug_assert!(self.meshes.contains_key(&handle), "update of unknown mesh {:?}", handle);
        if let Some(stored) = self.meshes.get_mut(&handle) {
            stored.clone_from(mesh);
        }
    }

    fn update_colors(&mut self, handle: MeshHandle, colors: &[[f32; 4]]) {
        if let Some(stored) = self.meshes.get_mut(&handle) {
            debug_assert_eq!(stored.vertex_count(), colors.len());
            stored.colors.clear();
            stored.colors.extend_from_slice(colors);
        }
    }

    fn destroy_mesh(&mut self, handle: MeshHandle) {
        if self.meshes.remove(&handle).is_some() {
            self.stats.meshes_destroyed += 1;
        }
    }

    fn create_light_texture(&mut self, data: &[u8]) -> TextureHandle {
        let handle = TextureHandle(self.allocate_id());
        self.textures.insert(handle, data.to_vec());
        self.stats.textures_created += 1;
        self.stats.texture_uploads += 1;
        handle
    }

    fn update_light_texture(&mut self, handle: TextureHandle, data: &[u8]) {
        if let Some(stored) = self.textures.get_mut(&handle) {
            stored.clear();
            stored.extend_from_slice(data);
            self.stats.texture_uploads += 1;
        }
    }

    fn destroy_texture(&mut self, handle: TextureHandle) {
        // Stale handles from a lost context are already gone
        if self.textures.remove(&handle).is_some() {
            self.stats.textures_destroyed += 1;
        }
    }

    fn context_ticket(&self) -> ContextTicket {
        ContextTicket(self.ticket)
    }

    fn aabb_in_view(&self, aabb: &Aabb) -> bool {
        match &self.view {
            Some(view) => view.intersects(aabb),
            None => true,
        }
    }

    fn submit(&mut self, command: DrawCommand) {
        self.submitted.push(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Vec3;
    use crate::render::backend::{DrawKind, Primitive};

    #[test]
    fn test_mesh_lifecycle() {
        let mut backend = HeadlessBackend::new();
        let mut mesh = MeshData::new(Primitive::Triangles);
        mesh.positions.push([1.0, 2.0, 3.0]);

        let handle = backend.create_mesh("test", &mesh);
        assert_eq!(backend.live_mesh_count(), 1);
        assert_eq!(backend.mesh(handle).unwrap().vertex_count(), 1);

        backend.destroy_mesh(handle);
        backend.destroy_mesh(handle);
        assert_eq!(backend.live_mesh_count(), 0);
        assert_eq!(backend.stats().meshes_destroyed, 1);
    }

    #[test]
    fn test_lose_context_drops_textures() {
        let mut backend = HeadlessBackend::new();
        let before = backend.context_ticket();
        let handle = backend.create_light_texture(&[1, 2, 3]);

        backend.lose_context();

        assert_ne!(backend.context_ticket(), before);
        assert!(backend.texture_data(handle).is_none());
        backend.destroy_texture(handle);
        assert_eq!(backend.stats().textures_destroyed, 0);
    }

    #[test]
    fn test_view_bounds() {
        let mut backend = HeadlessBackend::new();
        let far = Aabb::new(Vec3::splat(100.0), Vec3::splat(101.0));
        assert!(backend.aabb_in_view(&far));

        backend.set_view_bounds(Some(Aabb::new(Vec3::ZERO, Vec3::splat(10.0))));
        assert!(!backend.aabb_in_view(&far));
    }

    #[test]
    fn test_submitted_is_drained() {
        let mut backend = HeadlessBackend::new();
        let mesh = backend.create_mesh("m", &MeshData::default());
        backend.submit(DrawCommand { mesh, light_texture: None, kind: DrawKind::Chunk });

        assert_eq!(backend.take_submitted().len(), 1);
        assert!(backend.take_submitted().is_empty());
    }
}
