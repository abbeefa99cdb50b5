//! # Explorer Integration Test
//!
//! Sessions built from config files, end to end.

use std::path::{Path, PathBuf};

use lithos::{ExplorerConfig, ExplorerError, ExplorerSession, GenerationRequest};

fn catalog_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data/catalog.toml")
}

fn temp_dir(name: &str) -> PathBuf {
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("lithos_explorer_{name}_{id}"))
}

fn config(overlay_dir: Option<PathBuf>) -> ExplorerConfig {
    let mut config = ExplorerConfig::default();
    config.catalog_path = catalog_path();
    config.mining.overlay_dir = overlay_dir;
    config
}

/// Test: Config files load, and a session built from one generates.
#[test]
fn test_session_from_config_file() {
    let dir = temp_dir("config");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("lithos.toml");
    std::fs::write(
        &path,
        format!(
            "catalog_path = {:?}\n\n[generation]\nmax_size = 16\nworker_threads = 2\n\n[mining]\ncover_variant = \"moss\"\n",
            catalog_path().display().to_string()
        ),
    )
    .unwrap();

    let config = ExplorerConfig::load(&path).unwrap();
    let session = ExplorerSession::from_config(&config).unwrap();
    let response = session.generate(&GenerationRequest::new("cfg", 16)).unwrap();
    assert_eq!(response.chunk.len(), 16);

    let view = session.view().unwrap();
    assert_eq!(
        view.cells[0][0][0],
        lithos::CellView::Covered("moss".to_owned())
    );

    assert!(matches!(
        session.generate(&GenerationRequest::new("cfg", 17)),
        Err(ExplorerError::InvalidRequest(_))
    ));

    std::fs::remove_dir_all(&dir).ok();
}

/// Test: A missing catalog is fatal and says where it looked.
#[test]
fn test_missing_catalog_is_fatal() {
    let mut config = config(None);
    config.catalog_path = PathBuf::from("/definitely/not/here/catalog.toml");
    let err = ExplorerSession::from_config(&config).err().unwrap();
    assert!(err.to_string().contains("/definitely/not/here/catalog.toml"));
}

/// Test: Mining progress survives a new session over the same directory.
#[test]
fn test_progress_persists_across_sessions() {
    let dir = temp_dir("persist");
    let request = GenerationRequest::new("persist", 3);

    {
        let session = ExplorerSession::from_config(&config(Some(dir.clone()))).unwrap();
        session.generate(&request).unwrap();
        for x in 0..3 {
            for y in 0..3 {
                session.reveal(x, y, 0).unwrap();
            }
        }
        session.reveal(1, 1, 1).unwrap();
        assert_eq!(session.frontier().unwrap(), 1);
    }

    let session = ExplorerSession::from_config(&config(Some(dir.clone()))).unwrap();
    session.generate(&request).unwrap();
    assert_eq!(session.frontier().unwrap(), 1);
    assert!(matches!(
        session.reveal(1, 1, 1),
        Err(ExplorerError::Reveal(_))
    ));

    std::fs::remove_dir_all(&dir).ok();
}

/// Test: Boundary sizes generate and mine.
#[test]
fn test_boundary_sizes() {
    let session = ExplorerSession::from_config(&config(None)).unwrap();

    let tiny = session.generate(&GenerationRequest::new("edge", 1)).unwrap();
    assert_eq!(tiny.chunk.len(), 1);
    let outcome = session.reveal(0, 0, 0).unwrap();
    assert_eq!(outcome.mineral, tiny.chunk[0][0][0]);
    assert!(outcome.cleared);
    assert_eq!(outcome.frontier, 1);

    let big = session.generate(&GenerationRequest::new("edge", 128)).unwrap();
    assert_eq!(big.chunk.len(), 128);
    assert_eq!(big.chunk[127].len(), 128);
    assert_eq!(big.chunk[127][127].len(), 128);
}

/// Test: Chunk coordinates shift the window by whole chunks.
#[test]
fn test_chunk_coordinates_shift_origin() {
    let session = ExplorerSession::from_config(&config(None)).unwrap();
    let mut request = GenerationRequest::new("shift", 4);
    request.chunk = lithos::procedural::ChunkCoord::new(1, 0, 0);
    let shifted = session.generate(&request).unwrap();

    let mut wide = GenerationRequest::new("shift", 8);
    wide.debug = true;
    let wide = session.generate(&wide).unwrap();
    for x in 0..4 {
        for y in 0..4 {
            for z in 0..4 {
                assert_eq!(shifted.chunk[x][y][z], wide.chunk[x + 4][y][z]);
            }
        }
    }
    assert!(wide.debug_info.is_some());
}

fn swap_catalog(alpha: f64, beta: f64) -> String {
    format!(
        "cover_variants = [\"dust\"]\n\n[[layers]]\nkey = \"all\"\nstart = 0\n\n\
         [minerals.alpha]\nprob_layers = {{ all = {alpha:?} }}\n\n\
         [minerals.beta]\nprob_layers = {{ all = {beta:?} }}\n"
    )
}

/// Test: Progress mined under one catalog never shows through another.
#[test]
fn test_catalog_change_does_not_restore_foreign_progress() {
    let dir = temp_dir("catalog_swap");
    std::fs::create_dir_all(&dir).unwrap();
    let alpha_path = dir.join("alpha.toml");
    let beta_path = dir.join("beta.toml");
    std::fs::write(&alpha_path, swap_catalog(1.0, 0.0)).unwrap();
    std::fs::write(&beta_path, swap_catalog(0.0, 1.0)).unwrap();

    let session_for = |catalog: &Path| {
        let mut config = config(Some(dir.join("overlays")));
        config.catalog_path = catalog.to_path_buf();
        ExplorerSession::from_config(&config).unwrap()
    };
    let request = GenerationRequest::new("swap", 2);

    {
        let session = session_for(&alpha_path);
        session.generate(&request).unwrap();
        assert_eq!(session.reveal(0, 0, 0).unwrap().mineral, "alpha");
    }

    let session = session_for(&beta_path);
    let response = session.generate(&request).unwrap();
    assert_eq!(response.chunk[0][0][0], "beta");
    assert_eq!(
        session.view().unwrap().cells[0][0][0],
        lithos::CellView::Covered("dust".to_owned())
    );
    assert_eq!(session.reveal(0, 0, 0).unwrap().mineral, "beta");

    // The alpha progress is still there for the alpha catalog.
    let session = session_for(&alpha_path);
    session.generate(&request).unwrap();
    assert_eq!(
        session.view().unwrap().cells[0][0][0],
        lithos::CellView::Revealed("alpha".to_owned())
    );

    std::fs::remove_dir_all(&dir).ok();
}
