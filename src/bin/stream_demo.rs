//! Streaming demo: walks a viewer across a generated world with the headless backend.
//!
//! Usage: cargo run --release --bin stream_demo -- [OPTIONS]
//!
//! Options:
//!   --size <CUBES>     World edge length in cubes (default: 256)
//!   --height <CUBES>   World height in cubes (default: 64)
//!   --seed <SEED>      Terrain seed (default: 12345)
//!   --frames <N>       Frames to simulate (default: 600)
//!   --speed <CUBES>    Viewer movement per frame (default: 0.5)
//!   --config <PATH>    Render config JSON (default: built-in defaults)
//!
//! Set RUST_LOG=voxstream=debug to watch visibility changes.

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;

use glam::{IVec3, Vec3};
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

use voxstream::core::{logging, Result, SystemClock};
use voxstream::render::HeadlessBackend;
use voxstream::streaming::{RenderConfig, RenderSettings, WorldRenderer};
use voxstream::world::{BlockType, Blockset, Circuit, NetValue, TextureAtlas, TransientKind, World};

const GRASS: u8 = 2;
const DIRT: u8 = 3;
const STONE: u8 = 4;
const GLASS: u8 = 5;

fn main() -> Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let size = parse_arg::<i32>(&args, "--size").unwrap_or(256);
    let height = parse_arg::<i32>(&args, "--height").unwrap_or(64);
    let seed = parse_arg::<u32>(&args, "--seed").unwrap_or(12345);
    let frames = parse_arg::<usize>(&args, "--frames").unwrap_or(600);
    let speed = parse_arg::<f32>(&args, "--speed").unwrap_or(0.5);

    let config = match parse_arg::<PathBuf>(&args, "--config") {
        Some(path) => RenderConfig::load(&path)?,
        None => RenderConfig::default(),
    };

    println!("=== Voxstream Streaming Demo ===");
    println!("World:  {} x {} x {}", size, height, size);
    println!("Seed:   {}", seed);
    println!("Frames: {} at {} cubes/frame", frames, speed);
    println!("Render distance: {}", config.render_distance);
    println!();

    let gen_start = Instant::now();
    let mut world = generate_world(IVec3::new(size, height, size), seed)?;
    println!("Generated world in {:.2?}", gen_start.elapsed());

    let ground = surface_height(&world, IVec3::new(size / 2, 0, size / 2));
    let circuit_origin = IVec3::new(size / 2, ground + 2, size / 2);
    world.set_circuit(
        Circuit::new(circuit_origin)
            .with_edge(0, circuit_origin, circuit_origin + IVec3::X * 4)
            .with_edge(1, circuit_origin + IVec3::X * 4, circuit_origin + IVec3::new(4, 3, 0)),
    );

    let settings = Rc::new(RenderSettings::from(&config));
    let frame_requests = Rc::new(Cell::new(0usize));
    let requests = frame_requests.clone();
    let mut renderer = WorldRenderer::new(
        &world,
        HeadlessBackend::new(),
        settings.clone(),
        Rc::new(SystemClock),
        Rc::new(move || requests.set(requests.get() + 1)),
    );

    let run_start = Instant::now();
    let mut position = Vec3::new(8.0, height as f32 * 0.75, size as f32 / 2.0);
    let mut settled_at = None;
    for frame in 0..frames {
        position.x = (position.x + speed).min(size as f32 - 1.0);

        // Dig a trench behind the viewer every so often
        if frame % 60 == 30 {
            let x = position.x as i32;
            let z = position.z as i32;
            let top = surface_height(&world, IVec3::new(x, 0, z)) - 1;
            if top >= 0 {
                let cube = IVec3::new(x, top, z);
                world.emit_transient(cube, TransientKind::Destroy);
                world.set_block(cube, 0);
            }
        }
        world.set_net_value(circuit_origin, 0, NetValue::Number(frame as f64 / 60.0));
        world.set_net_value(circuit_origin, 1, NetValue::Bool(frame % 120 < 60));

        let tick = renderer.tick(&world, position);
        renderer.draw(&world);
        renderer.backend_mut().take_submitted();

        if tick.pending == 0 && settled_at.is_none() {
            settled_at = Some(frame);
        } else if tick.pending > 0 {
            settled_at = None;
        }
        if frame % 100 == 0 {
            log::info!(
                "frame {}: viewer x {:.0}, {} chunks held, {} pending",
                frame,
                position.x,
                renderer.chunks().len(),
                tick.pending
            );
        }
    }

    let stats = renderer.stats();
    let backend_stats = renderer.backend().stats();
    println!();
    println!("Ran {} frames in {:.2?}", frames, run_start.elapsed());
    println!("Chunks built:     {}", stats.chunks_built);
    println!("Chunks rebuilt:   {}", stats.chunks_rebuilt);
    println!("Chunks evicted:   {}", stats.chunks_evicted);
    println!(
        "Chunks held:      {} ({} nonempty)",
        renderer.chunks().len(),
        renderer.chunks().nonempty_len()
    );
    println!("Visibility recomputes: {}", stats.visibility_recomputes);
    println!("Particles spawned:     {}", stats.particles_spawned);
    println!("Frame requests:        {}", frame_requests.get());
    println!(
        "Meshes: {} created, {} destroyed; textures: {} created, {} uploads",
        backend_stats.meshes_created,
        backend_stats.meshes_destroyed,
        backend_stats.textures_created,
        backend_stats.texture_uploads
    );
    if let Some(frame) = settled_at {
        println!("Streaming settled at frame {}", frame);
    }

    renderer.release_resources();
    Ok(())
}

/// Heightmap terrain: grass over dirt over stone, with a glass pillar at the center
fn generate_world(dims: IVec3, seed: u32) -> Result<World> {
    let blockset = Blockset::new(
        TextureAtlas::default(),
        vec![
            BlockType::new("grass", true, 0),
            BlockType::new("dirt", true, 1),
            BlockType::new("stone", true, 2),
            BlockType::new("glass", false, 3),
        ],
    );

    let noise = Fbm::<Perlin>::new(seed)
        .set_octaves(4)
        .set_persistence(0.5)
        .set_lacunarity(2.0);

    let volume = (dims.x * dims.y * dims.z) as usize;
    let mut blocks = vec![0u8; volume];
    let mut light = vec![255u8; volume];
    let index = |x: i32, y: i32, z: i32| ((x * dims.y + y) * dims.z + z) as usize;

    let base = dims.y as f64 * 0.4;
    let amplitude = dims.y as f64 * 0.25;
    for x in 0..dims.x {
        for z in 0..dims.z {
            let n = noise.get([x as f64 / 64.0, z as f64 / 64.0]);
            let surface = ((base + n * amplitude) as i32).clamp(1, dims.y - 1);
            for y in 0..surface {
                let block = match surface - y {
                    1 => GRASS,
                    2..=4 => DIRT,
                    _ => STONE,
                };
                blocks[index(x, y, z)] = block;
                light[index(x, y, z)] = 40;
            }
        }
    }

    let center = dims / 2;
    for y in 0..dims.y {
        blocks[index(center.x + 3, y, center.z + 3)] = GLASS;
    }

    World::from_raw(dims, blocks, vec![0; volume], light, 255, blockset)
}

/// First empty cube above the ground at this column
fn surface_height(world: &World, column: IVec3) -> i32 {
    (0..world.dims().y)
        .rev()
        .find(|&y| world.block_at(IVec3::new(column.x, y, column.z)) != 0)
        .map_or(0, |y| y + 1)
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}
