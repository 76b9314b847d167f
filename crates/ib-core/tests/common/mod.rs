use std::path::PathBuf;
use std::sync::Arc;

use ib_core::{Model, ModelOptions};
use ib_engine::{ModelDescriptor, RefBackend};
use tempfile::TempDir;

/// Vocabulary entries and merges that encode "hello world" as two tokens.
pub fn descriptor() -> ModelDescriptor {
    let merges = [
        ("h", "e"),
        ("l", "l"),
        ("he", "ll"),
        ("hell", "o"),
        ("\u{2581}", "w"),
        ("o", "r"),
        ("\u{2581}w", "or"),
        ("l", "d"),
        ("\u{2581}wor", "ld"),
    ];
    ModelDescriptor {
        tokens: merges.iter().map(|(a, b)| format!("{}{}", a, b)).collect(),
        merges: merges
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect(),
        n_embd: 16,
        seed: 42,
        ..Default::default()
    }
}

/// A descriptor written to a temporary directory. The directory lives as long
/// as the fixture.
pub struct Fixture {
    _dir: TempDir,
    pub path: PathBuf,
}

pub fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    descriptor().save(&path).unwrap();
    Fixture { _dir: dir, path }
}

pub fn loaded_model(fixture: &Fixture) -> Model {
    let model = Model::create(Arc::new(RefBackend::new()), ModelOptions::default());
    model.load(&fixture.path).unwrap();
    model
}
