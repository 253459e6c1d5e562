//! wgpu implementation of [`RenderBackend`]
//!
//! Meshes become interleaved vertex buffers, light volumes become 3D `R8Unorm`
//! textures. Draws are collected per frame; the host encodes them into its own
//! render pass with pipelines of its choosing.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use wgpu::util::DeviceExt;

use crate::core::error::Error;
use crate::core::types::{Mat4, Result};
use crate::math::{Aabb, Frustum};
use crate::render::backend::{
    ContextTicket, DrawCommand, MeshData, MeshHandle, RenderBackend, TextureHandle,
};
use crate::render::vertex::MeshVertex;
use crate::streaming::chunk::LIGHT_TEXTURE_SIZE;

/// A vertex buffer plus the CPU copy used for partial color rewrites
struct GpuMesh {
    buffer: wgpu::Buffer,
    vertices: Vec<MeshVertex>,
}

struct GpuLightTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Backend drawing through a wgpu device owned by the host
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    next_id: u64,
    /// Bumped by the device-lost callback and by [`WgpuBackend::replace_device`]
    ticket: Arc<AtomicU64>,
    meshes: HashMap<MeshHandle, GpuMesh>,
    textures: HashMap<TextureHandle, GpuLightTexture>,
    frustum: Frustum,
    frame: Vec<DrawCommand>,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let ticket = Arc::new(AtomicU64::new(0));
        Self::watch_device(&device, &ticket);
        Self {
            device,
            queue,
            next_id: 0,
            ticket,
            meshes: HashMap::new(),
            textures: HashMap::new(),
            frustum: Frustum::everything(),
            frame: Vec::new(),
        }
    }

    /// Request an adapter and device without a surface
    pub async fn new_headless() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| Error::Gpu(format!("No suitable adapter found: {:?}", e)))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("voxstream_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                experimental_features: Default::default(),
                trace: Default::default(),
            })
            .await
            .map_err(|e| Error::Gpu(e.to_string()))?;

        log::info!("GPU backend on {}", adapter.get_info().name);
        Ok(Self::new(device, queue))
    }

    fn watch_device(device: &wgpu::Device, ticket: &Arc<AtomicU64>) {
        let ticket = Arc::clone(ticket);
        device.set_device_lost_callback(move |reason, message| {
            log::warn!("GPU device lost ({:?}): {}", reason, message);
            ticket.fetch_add(1, Ordering::SeqCst);
        });
    }

    /// Switch to a freshly created device after a loss. Every texture is
    /// dropped; owners re-create them on their next draw. Meshes are
    /// re-uploaded from their CPU copies.
    pub fn replace_device(&mut self, device: wgpu::Device, queue: wgpu::Queue) {
        Self::watch_device(&device, &self.ticket);
        self.device = device;
        self.queue = queue;
        self.textures.clear();
        self.ticket.fetch_add(1, Ordering::SeqCst);

        for (handle, mesh) in self.meshes.iter_mut() {
            let label = format!("mesh_{}", handle.0);
            mesh.buffer = Self::vertex_buffer(&self.device, &label, &mesh.vertices);
        }
        log::info!("GPU device replaced, {} meshes re-uploaded", self.meshes.len());
    }

    /// Set the camera used by `aabb_in_view`
    pub fn set_view_projection(&mut self, view_projection: &Mat4) {
        self.frustum = Frustum::from_view_projection(view_projection);
    }

    /// Draws submitted since the last call
    pub fn take_frame(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.frame)
    }

    /// Buffer and vertex count for encoding a draw
    pub fn vertex_buffer_of(&self, handle: MeshHandle) -> Option<(&wgpu::Buffer, u32)> {
        self.meshes
            .get(&handle)
            .map(|mesh| (&mesh.buffer, mesh.vertices.len() as u32))
    }

    pub fn light_view(&self, handle: TextureHandle) -> Option<&wgpu::TextureView> {
        self.textures.get(&handle).map(|t| &t.view)
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn vertex_buffer(device: &wgpu::Device, label: &str, vertices: &[MeshVertex]) -> wgpu::Buffer {
        // Buffers always hold at least one vertex
        let contents: &[MeshVertex] = if vertices.is_empty() {
            &[MeshVertex {
                position: [0.0; 3],
                normal: [0.0; 3],
                texcoord: [0.0; 2],
                color: [0.0; 4],
            }]
        } else {
            vertices
        };
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(contents),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        })
    }

    fn light_extent() -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: LIGHT_TEXTURE_SIZE as u32,
            height: LIGHT_TEXTURE_SIZE as u32,
            depth_or_array_layers: LIGHT_TEXTURE_SIZE as u32,
        }
    }

    fn write_light(queue: &wgpu::Queue, texture: &wgpu::Texture, data: &[u8]) {
        debug_assert_eq!(data.len(), LIGHT_TEXTURE_SIZE.pow(3));
        let edge = LIGHT_TEXTURE_SIZE as u32;
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(edge),
                rows_per_image: Some(edge),
            },
            Self::light_extent(),
        );
    }
}

impl RenderBackend for WgpuBackend {
    fn create_mesh(&mut self, label: &str, mesh: &MeshData) -> MeshHandle {
        let handle = MeshHandle(self.allocate_id());
        let vertices = MeshVertex::interleave(mesh);
        let buffer = Self::vertex_buffer(&self.device, label, &vertices);
        self.meshes.insert(handle, GpuMesh { buffer, vertices });
        handle
    }

    fn update_mesh(&mut self, handle: MeshHandle, mesh: &MeshData) {
        let Some(gpu_mesh) = self.meshes.get_mut(&handle) else {
            return;
        };
        let vertices = MeshVertex::interleave(mesh);
        if vertices.len() == gpu_mesh.vertices.len() && !vertices.is_empty() {
            self.queue.write_buffer(&gpu_mesh.buffer, 0, bytemuck::cast_slice(&vertices));
        } else {
            let label = format!("mesh_{}", handle.0);
            gpu_mesh.buffer = Self::vertex_buffer(&self.device, &label, &vertices);
        }
        gpu_mesh.vertices = vertices;
    }

    fn update_colors(&mut self, handle: MeshHandle, colors: &[[f32; 4]]) {
        let Some(gpu_mesh) = self.meshes.get_mut(&handle) else {
            return;
        };
        debug_assert_eq!(gpu_mesh.vertices.len(), colors.len());
        for (vertex, color) in gpu_mesh.vertices.iter_mut().zip(colors) {
            vertex.color = *color;
        }
        if !gpu_mesh.vertices.is_empty() {
            self.queue.write_buffer(&gpu_mesh.buffer, 0, bytemuck::cast_slice(&gpu_mesh.vertices));
        }
    }

    fn destroy_mesh(&mut self, handle: MeshHandle) {
        if let Some(mesh) = self.meshes.remove(&handle) {
            mesh.buffer.destroy();
        }
    }

    fn create_light_texture(&mut self, data: &[u8]) -> TextureHandle {
        let handle = TextureHandle(self.allocate_id());
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("chunk_light"),
            size: Self::light_extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        Self::write_light(&self.queue, &texture, data);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.textures.insert(handle, GpuLightTexture { texture, view });
        handle
    }

    fn update_light_texture(&mut self, handle: TextureHandle, data: &[u8]) {
        if let Some(light) = self.textures.get(&handle) {
            Self::write_light(&self.queue, &light.texture, data);
        }
    }

    fn destroy_texture(&mut self, handle: TextureHandle) {
        if let Some(light) = self.textures.remove(&handle) {
            light.texture.destroy();
        }
    }

    fn context_ticket(&self) -> ContextTicket {
        ContextTicket(self.ticket.load(Ordering::SeqCst))
    }

    fn aabb_in_view(&self, aabb: &Aabb) -> bool {
        self.frustum.intersects_aabb(aabb)
    }

    fn submit(&mut self, command: DrawCommand) {
        self.frame.push(command);
    }
}
