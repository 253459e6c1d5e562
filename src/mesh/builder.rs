//! Chunk mesh construction with face culling
//!
//! Every non-empty voxel contributes the six faces of its rotated block
//! geometry. A face is dropped when the voxel is opaque and so is its neighbor
//! in the face's direction.

use crate::core::types::IVec3;
use crate::render::backend::{MeshData, Primitive};
use crate::world::{CubeRotation, Face, FaceGeometry, World, ID_EMPTY};

/// Counters from one build
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MeshStats {
    pub voxels: usize,
    pub faces: usize,
    pub culled_faces: usize,
    /// Voxels with a rotation code outside the table, drawn unrotated
    pub unknown_rotations: usize,
    /// Voxels with an id the blockset doesn't define, drawn as the placeholder
    pub unknown_blocks: usize,
}

/// Mesh the cubes `[origin, limit)` of a world into `out`.
///
/// `out` is cleared first so a scratch buffer can be reused across chunks.
/// Neighbors outside the world count as empty.
pub fn build_chunk_mesh(
    world: &World,
    origin: IVec3,
    limit: IVec3,
    out: &mut MeshData,
) -> MeshStats {
    out.clear();
    out.primitive = Primitive::Triangles;

    let blockset = world.blockset();
    let opaques = blockset.opacity_table();
    let is_opaque = |id: u8| opaques.get(id as usize).copied().unwrap_or(false);
    let blocks = world.raw_blocks();
    let rotations = world.raw_rotations();

    let mut stats = MeshStats::default();
    for x in origin.x..limit.x {
        for y in origin.y..limit.y {
            for z in origin.z..limit.z {
                let cube = IVec3::new(x, y, z);
                let raw_index = world.raw_index(cube);
                let value = blocks[raw_index];
                if value == ID_EMPTY {
                    continue;
                }
                stats.voxels += 1;

                let rotation = CubeRotation::by_code(rotations[raw_index]).unwrap_or_else(|| {
                    stats.unknown_rotations += 1;
                    CubeRotation::IDENTITY
                });
                if blockset.block_type(value).is_none() {
                    stats.unknown_blocks += 1;
                }
                let faces = blockset.face_data(value, rotation.code());
                let this_opaque = is_opaque(value);

                for face in Face::ALL {
                    let facing = rotation.face_normal(face);
                    if this_opaque && is_opaque(world.block_at(cube + facing)) {
                        stats.culled_faces += 1;
                        continue;
                    }
                    push_face(out, faces.face(face), cube, facing);
                    stats.faces += 1;
                }
            }
        }
    }

    if stats.unknown_rotations > 0 {
        log::warn!(
            "{} voxels in [{}, {}) have unknown rotation codes, using identity",
            stats.unknown_rotations,
            origin,
            limit
        );
    }
    if stats.unknown_blocks > 0 {
        log::warn!(
            "{} voxels in [{}, {}) have unknown block ids, drawing placeholder",
            stats.unknown_blocks,
            origin,
            limit
        );
    }
    stats
}

fn push_face(out: &mut MeshData, geometry: &FaceGeometry, cube: IVec3, facing: IVec3) {
    let offset = cube.as_vec3();
    let normal = facing.as_vec3().to_array();
    for (position, texcoord) in geometry.positions.iter().zip(&geometry.texcoords) {
        out.positions
            .push([position[0] + offset.x, position[1] + offset.y, position[2] + offset.z]);
        out.texcoords.push(*texcoord);
        out.normals.push(normal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{BlockType, Blockset, TextureAtlas};

    const STONE: u8 = 2;
    const GLASS: u8 = 3;

    fn world(dims: IVec3) -> World {
        let blockset = Blockset::new(
            TextureAtlas::default(),
            vec![BlockType::new("stone", true, 2), BlockType::new("glass", false, 3)],
        );
        World::new(dims, blockset).unwrap()
    }

    fn build(world: &World) -> (MeshData, MeshStats) {
        let mut out = MeshData::default();
        let stats = build_chunk_mesh(world, IVec3::ZERO, world.dims(), &mut out);
        (out, stats)
    }

    #[test]
    fn test_empty_world_is_empty() {
        let (mesh, stats) = build(&world(IVec3::splat(4)));
        assert!(mesh.is_empty());
        assert_eq!(stats, MeshStats::default());
    }

    #[test]
    fn test_isolated_voxel_has_six_faces() {
        let mut w = world(IVec3::splat(4));
        w.set_block(IVec3::ONE, STONE);

        let (mesh, stats) = build(&w);
        assert_eq!(stats.faces, 6);
        assert_eq!(mesh.vertex_count(), 36);
        assert_eq!(mesh.normals.len(), 36);
        assert_eq!(mesh.texcoords.len(), 36);
    }

    #[test]
    fn test_opaque_neighbor_hides_shared_face() {
        let mut w = world(IVec3::splat(4));
        w.set_block(IVec3::ONE, STONE);
        w.set_block(IVec3::new(2, 1, 1), STONE);

        let mut out = MeshData::default();
        // Mesh only the first voxel's cube
        let stats = build_chunk_mesh(&w, IVec3::ONE, IVec3::splat(2), &mut out);
        assert_eq!(stats.faces, 5);
        assert_eq!(stats.culled_faces, 1);
        assert!(out.normals.iter().all(|n| *n != [1.0, 0.0, 0.0]));
    }

    #[test]
    fn test_transparent_voxels_keep_faces() {
        let mut w = world(IVec3::splat(4));
        w.set_block(IVec3::ONE, GLASS);
        w.set_block(IVec3::new(2, 1, 1), STONE);

        let (_, stats) = build(&w);
        // Glass keeps all 6; stone culls nothing since glass isn't opaque
        assert_eq!(stats.faces, 12);
    }

    #[test]
    fn test_world_edge_counts_as_empty() {
        let mut w = world(IVec3::splat(1));
        w.set_block(IVec3::ZERO, STONE);
        let (_, stats) = build(&w);
        assert_eq!(stats.faces, 6);
    }

    #[test]
    fn test_unknown_id_draws_placeholder_without_culling() {
        let mut w = world(IVec3::splat(4));
        w.set_block(IVec3::ONE, 99);
        w.set_block(IVec3::new(2, 1, 1), STONE);

        let (mesh, stats) = build(&w);
        // Unknown id is not opaque, so neither voxel hides a face
        assert_eq!(stats.faces, 12);
        assert_eq!(stats.unknown_blocks, 1);
        let placeholder = &w.blockset().face_data(crate::world::ID_BOGUS, 0).faces[0].positions[0];
        let expected = [placeholder[0] + 1.0, placeholder[1] + 1.0, placeholder[2] + 1.0];
        assert!(mesh.positions.contains(&expected));
    }

    #[test]
    fn test_unknown_rotations_counted_and_drawn_unrotated() {
        let mut w = world(IVec3::splat(4));
        for x in 0..3 {
            w.set_block(IVec3::new(x, 0, 0), GLASS);
            w.set_rotation(IVec3::new(x, 0, 0), 200);
        }

        let (mesh, stats) = build(&w);
        assert_eq!(stats.unknown_rotations, 3);
        assert_eq!(stats.unknown_blocks, 0);
        assert_eq!(stats.faces, 18);
        assert_eq!(mesh.normals[0], CubeRotation::IDENTITY.nx().as_vec3().to_array());
    }

    #[test]
    fn test_vertices_offset_by_cube() {
        let mut w = world(IVec3::splat(8));
        w.set_block(IVec3::new(5, 6, 7), STONE);
        let (mesh, _) = build(&w);
        for p in &mesh.positions {
            assert!((5.0..=6.0).contains(&p[0]));
            assert!((6.0..=7.0).contains(&p[1]));
            assert!((7.0..=8.0).contains(&p[2]));
        }
    }

    #[test]
    fn test_rotated_voxel_normals_follow_rotation() {
        let mut w = world(IVec3::splat(4));
        let rotation = CubeRotation::all().nth(13).unwrap();
        w.set_block(IVec3::ONE, STONE);
        w.set_rotation(IVec3::ONE, rotation.code());

        let (mesh, _) = build(&w);
        // First face emitted is the rotated low-x face
        let expected = rotation.nx().as_vec3().to_array();
        assert_eq!(mesh.normals[0], expected);
    }

    #[test]
    fn test_scratch_buffer_is_reused() {
        let mut w = world(IVec3::splat(4));
        w.set_block(IVec3::ONE, STONE);
        let mut out = MeshData::default();
        build_chunk_mesh(&w, IVec3::ZERO, w.dims(), &mut out);
        build_chunk_mesh(&w, IVec3::ZERO, w.dims(), &mut out);
        assert_eq!(out.vertex_count(), 36);
    }
}
