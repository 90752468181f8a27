use std::{sync::Arc, thread, time::Duration};

use cgmath::Point3;
use voxel_world_engine::engine_state::{
    rendering::meshing::MeshCommand,
    voxels::{
        block::block_type::BlockType,
        block_entity::NoBlockEntities,
        chunk::{ChunkDimensions, ChunkKey},
        generation::WorldGenerator,
        persistence::{DirectoryStore, KeyValueStore, MemoryStore},
    },
    ChunkManager, WorldConfig,
};

fn config(seed: u32) -> WorldConfig {
    WorldConfig {
        seed: Some(seed),
        chunk_size: 32,
        chunk_height: 128,
        render_distance: 1,
        worker_count: Some(0),
        eviction_probability: 0.0,
        autosave_interval_secs: 0,
        ..WorldConfig::default()
    }
}

fn open(config: WorldConfig, store: Arc<dyn KeyValueStore>) -> ChunkManager {
    ChunkManager::open(config, store, Box::new(NoBlockEntities)).unwrap()
}

#[test]
fn seed_42_chunk_has_bedrock_surface_and_sky() {
    let mut world = open(config(42), Arc::new(MemoryStore::new()));
    world.wait_for_chunk(0, 0);

    let generator = WorldGenerator::new(42, ChunkDimensions::new(32, 128));
    let terrain = generator.terrain();
    let mut open_sky = 0;

    for z in 0..32 {
        for x in 0..32 {
            assert_eq!(world.get_block(x, 0, z), BlockType::BEDROCK.id());

            let h = terrain.height_at(x, z);
            assert_eq!(world.get_block(x, h, z), BlockType::GRASS.id());

            let above = world.get_block(x, h + 1, z);
            if above == BlockType::AIR.id() {
                open_sky += 1;
            } else {
                // Only trees grow out of the surface
                assert!(above == BlockType::LOG.id() || above == BlockType::LEAVES.id());
            }
        }
    }
    assert!(open_sky > 900, "only {} columns open to the sky", open_sky);
}

#[test]
fn interior_edit_dirties_and_rebuilds_only_its_chunk() {
    let mut world = open(config(42), Arc::new(MemoryStore::new()));
    for (cx, cz) in [(0, 0), (-1, 0), (1, 0), (0, -1), (0, 1)] {
        world.wait_for_chunk(cx, cz);
    }
    world.flush();
    world.drain_mesh_commands();
    assert!(!world.is_dirty(0, 0));

    assert!(world.set_block(5, 10, 5, BlockType::AIR.id()));

    assert!(!world.has_block(5, 10, 5));
    assert!(world.is_dirty(0, 0));
    assert_eq!(world.dirty_count(), 1);
    assert_eq!(
        world.drain_mesh_commands(),
        vec![MeshCommand::Upload(ChunkKey::new(0, 0))]
    );
}

#[test]
fn chunks_unloaded_while_pending_are_discarded() {
    let config = WorldConfig {
        worker_count: Some(1),
        ..config(3)
    };
    let mut world = open(config, Arc::new(MemoryStore::new()));

    // Start work around the origin, then leave before it finishes
    world.update(Point3::new(16.0, 80.0, 16.0));
    let far = Point3::new(100.0 * 32.0 + 16.0, 80.0, 16.0);
    for _ in 0..2000 {
        world.update(far);
        if world.pending_count() == 0 && world.get_chunk_count().total >= 9 {
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }

    assert_eq!(world.pending_count(), 0);
    for cz in -1..=1 {
        for cx in -1..=1 {
            assert!(!world.is_chunk_loaded(cx * 32, cz * 32));
            assert!(world.mesh(ChunkKey::new(cx, cz)).is_none());
        }
    }
    let origin_uploads = world.drain_mesh_commands().into_iter().filter(|command| {
        matches!(command, MeshCommand::Upload(key) if key.chebyshev_distance(ChunkKey::new(0, 0)) <= 1)
    });
    assert_eq!(origin_uploads.count(), 0);
    assert!(world.is_chunk_loaded(100 * 32, 0));
}

#[test]
fn flush_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let mut world = open(config(11), store.clone());
    world.wait_for_chunk(0, 0);
    world.set_block(3, 60, 3, BlockType::PLANKS.id());

    assert_eq!(world.flush(), 1);
    assert_eq!(world.dirty_count(), 0);

    let writes = store.write_count();
    assert_eq!(world.flush(), 0);
    assert_eq!(store.write_count(), writes);
}

#[test]
fn failed_saves_keep_chunks_dirty() {
    let store = Arc::new(MemoryStore::new());
    let mut world = open(config(11), store.clone());
    world.wait_for_chunk(0, 0);

    store.set_available(false);
    assert_eq!(world.flush(), 0);
    assert!(world.is_dirty(0, 0));

    store.set_available(true);
    assert_eq!(world.flush(), 1);
    assert!(!world.is_dirty(0, 0));
}

#[test]
fn eviction_never_drops_unsaved_chunks() {
    let config = WorldConfig {
        max_resident_chunks: 4,
        eviction_batch: 50,
        ..config(5)
    };
    let mut world = open(config, Arc::new(MemoryStore::new()));
    for cx in 10..20 {
        world.wait_for_chunk(cx, 0);
    }
    world.flush();

    // The three farthest chunks get unsaved edits
    for cx in 17..20 {
        assert!(world.set_block(cx * 32 + 4, 50, 4, BlockType::GLASS.id()));
    }

    assert_eq!(world.evict_now(), 7);
    assert_eq!(world.get_chunk_count().total, 3);
    for cx in 17..20 {
        assert!(world.is_chunk_loaded(cx * 32, 0));
        assert_eq!(world.get_block(cx * 32 + 4, 50, 4), BlockType::GLASS.id());
    }
}

#[test]
fn eviction_releases_a_full_batch_just_over_the_cap() {
    let config = WorldConfig {
        max_resident_chunks: 10,
        eviction_batch: 5,
        ..config(5)
    };
    let mut world = open(config, Arc::new(MemoryStore::new()));
    for cx in 10..21 {
        world.wait_for_chunk(cx, 0);
    }
    world.flush();
    assert_eq!(world.get_chunk_count().total, 11);

    assert_eq!(world.evict_now(), 5);
    assert_eq!(world.get_chunk_count().total, 6);
    // Farthest go first
    for cx in 16..21 {
        assert!(!world.is_chunk_loaded(cx * 32, 0));
    }
    for cx in 10..16 {
        assert!(world.is_chunk_loaded(cx * 32, 0));
    }

    // Back under the cap, nothing more to do
    assert_eq!(world.evict_now(), 0);
}

#[test]
fn independent_generation_is_seamless_and_deterministic() {
    let dims = ChunkDimensions::new(32, 128);
    let a = WorldGenerator::new(1234, dims);
    let b = WorldGenerator::new(1234, dims);

    // Generated in a different order by a different instance
    let right_first = b.generate_chunk(ChunkKey::new(1, 0));
    let left = a.generate_chunk(ChunkKey::new(0, 0));
    let left_again = b.generate_chunk(ChunkKey::new(0, 0));
    assert_eq!(left, left_again);

    for z in 0..32 {
        let border_height = a.terrain().height_at(32, z);
        assert_eq!(border_height, b.terrain().height_at(32, z));
        assert_eq!(
            right_first.get(0, border_height as usize, z as usize),
            BlockType::GRASS.id()
        );
        let inner_height = a.terrain().height_at(31, z);
        assert_eq!(
            left.get(31, inner_height as usize, z as usize),
            BlockType::GRASS.id()
        );
    }
}

#[test]
fn directory_worlds_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();

    let seed = {
        let store = Arc::new(DirectoryStore::new(dir.path()));
        let mut world = open(config(77), store);
        world.wait_for_chunk(0, 0);
        world.set_block(8, 20, 8, BlockType::AIR.id());
        world.flush();
        world.get_seed()
    };

    let store = Arc::new(DirectoryStore::new(dir.path()));
    let mut world = open(config(1), store);
    assert_eq!(world.get_seed(), seed);
    world.wait_for_chunk(0, 0);
    assert!(!world.has_block(8, 20, 8));
    assert!(!world.is_dirty(0, 0));
    assert!(world.has_block(9, 20, 8));
}
