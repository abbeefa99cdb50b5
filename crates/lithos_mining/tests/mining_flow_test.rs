//! Integration test for mining generated chunks with persisted overlays.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use lithos_mining::{CellState, CoverSelection, OverlayKey, OverlayStore, RevealError};
use lithos_procedural::{
    Catalog, Chunk, ChunkCoord, ChunkGenerator, ChunkSize, GenerationParams, WorldPos,
};

fn catalog() -> Arc<Catalog> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data/catalog.toml");
    Arc::new(Catalog::load(&path).unwrap())
}

fn generate(catalog: &Arc<Catalog>, seed: &str, edge: u32) -> Chunk {
    let gen = ChunkGenerator::new(Arc::clone(catalog));
    gen.generate(&GenerationParams::new(seed, WorldPos::default(), ChunkSize::new(edge).unwrap()))
        .unwrap()
}

fn key(seed: &str, edge: u32) -> OverlayKey {
    OverlayKey::new(
        &catalog(),
        seed,
        WorldPos::default(),
        ChunkCoord::default(),
        ChunkSize::new(edge).unwrap(),
        &BTreeMap::new(),
        &[],
    )
}

fn temp_dir() -> std::path::PathBuf {
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("lithos_mining_flow_{id}"))
}

#[test]
fn test_mine_whole_chunk_reveals_generated_minerals() {
    let catalog = catalog();
    let chunk = generate(&catalog, "default_seed", 4);
    let store = OverlayStore::in_memory(Arc::clone(&catalog));
    let k = key("default_seed", 4);
    let mut overlay = store
        .restore_or_initialize(&k, &chunk, || CoverSelection::Seeded.select(&catalog, "default_seed"))
        .unwrap();

    for z in 0..4 {
        assert_eq!(overlay.frontier(), z as u32);
        for x in 0..4 {
            for y in 0..4 {
                let mineral = overlay.reveal(&chunk, x, y, z).unwrap();
                assert_eq!(Some(mineral), chunk.get(x, y, z));
            }
        }
    }
    assert!(overlay.is_cleared());
    assert!(overlay.cells().iter().all(|cell| cell.is_revealed()));
}

#[test]
fn test_depth_gating_on_generated_chunk() {
    let catalog = catalog();
    let chunk = generate(&catalog, "gate", 3);
    let mut overlay = lithos_mining::MinedOverlay::initialize(&chunk, CoverSelection::Seeded.select(&catalog, "gate"));

    assert!(matches!(
        overlay.reveal(&chunk, 0, 0, 2),
        Err(RevealError::OutOfFrontier { z: 2, frontier: 0 })
    ));
    for x in 0..3 {
        for y in 0..3 {
            overlay.reveal(&chunk, x, y, 0).unwrap();
        }
    }
    assert!(matches!(
        overlay.reveal(&chunk, 0, 0, 2),
        Err(RevealError::OutOfFrontier { z: 2, frontier: 1 })
    ));
    assert!(matches!(overlay.cell(0, 0, 1), Some(CellState::Covered(_))));
    assert!(overlay.reveal(&chunk, 0, 0, 1).is_ok());
}

#[test]
fn test_progress_survives_restart_on_disk() {
    let dir = temp_dir();
    let catalog = catalog();
    let chunk = generate(&catalog, "restart", 5);
    let k = key("restart", 5);

    let saved = {
        let store = OverlayStore::on_disk(&dir, Arc::clone(&catalog)).unwrap();
        let mut overlay = store
            .restore_or_initialize(&k, &chunk, || CoverSelection::Seeded.select(&catalog, "restart"))
            .unwrap();
        for x in 0..5 {
            for y in 0..5 {
                overlay.reveal(&chunk, x, y, 0).unwrap();
            }
        }
        overlay.reveal(&chunk, 2, 2, 1).unwrap();
        let mut lease = store.lease(&k);
        lease.stage(&overlay);
        lease.commit().unwrap();
        overlay
    };

    let store = OverlayStore::on_disk(&dir, Arc::clone(&catalog)).unwrap();
    let restored = store
        .restore_or_initialize(&k, &chunk, || panic!("overlay should be restored"))
        .unwrap();
    assert_eq!(restored, saved);
    assert_eq!(restored.frontier(), 1);

    // A different tuple never sees this progress.
    let other_chunk = generate(&catalog, "restart-2", 5);
    let fresh = store
        .restore_or_initialize(&key("restart-2", 5), &other_chunk, || {
            CoverSelection::Seeded.select(&catalog, "restart-2")
        })
        .unwrap();
    assert_eq!(fresh.revealed_count(), 0);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_concurrent_leases_are_serialized() {
    let catalog = catalog();
    let chunk = Arc::new(generate(&catalog, "threads", 4));
    let store = Arc::new(OverlayStore::in_memory(Arc::clone(&catalog)));
    let k = key("threads", 4);
    store
        .restore_or_initialize(&k, &chunk, || CoverSelection::Seeded.select(&catalog, "threads"))
        .unwrap();

    // Each thread reveals one top-layer cell with a read-modify-write under
    // a single lease. Without mutual exclusion some reveals would be lost.
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let store = Arc::clone(&store);
            let chunk = Arc::clone(&chunk);
            let k = k.clone();
            thread::spawn(move || {
                let mut lease = store.lease(&k);
                let mut overlay = lease.load().unwrap().unwrap();
                overlay.reveal(&chunk, i / 4, i % 4, 0).unwrap();
                lease.stage(&overlay);
                lease.commit().unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let overlay = store.lease(&k).load().unwrap().unwrap();
    assert_eq!(overlay.revealed_count(), 16);
    assert_eq!(overlay.frontier(), 1);
}
