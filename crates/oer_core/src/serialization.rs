//! Binary scene cache.
//!
//! The file is a plain bincode dump of a [`SceneNode`] tree. There is no
//! header, version or checksum: a file written by an incompatible build
//! fails to decode (or decodes into garbage), and deleting it forces a
//! rebuild.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use thiserror::Error;

use crate::scene::SceneNode;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache i/o on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cache encoding for {path}: {source}")]
    Codec {
        path: String,
        #[source]
        source: bincode::Error,
    },
}

pub fn serialize<W: Write>(node: &SceneNode, writer: W) -> bincode::Result<()> {
    bincode::serialize_into(writer, node)
}

pub fn deserialize<R: Read>(reader: R) -> bincode::Result<SceneNode> {
    bincode::deserialize_from(reader)
}

pub fn save_scene(node: &SceneNode, path: &Path) -> Result<(), CacheError> {
    let io_err = |source| CacheError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serialize(node, &mut writer).map_err(|source| CacheError::Codec {
        path: path.display().to_string(),
        source,
    })?;
    writer.flush().map_err(io_err)
}

pub fn load_scene(path: &Path) -> Result<SceneNode, CacheError> {
    let file = File::open(path).map_err(|source| CacheError::Io {
        path: path.display().to_string(),
        source,
    })?;
    deserialize(BufReader::new(file)).map_err(|source| CacheError::Codec {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{
        ground_grid, BspTransformer, CollectedGeometryTransformer, QuadTransformer,
        SceneTransformer,
    };
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file_path(name_hint: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "oer_cache_test_{}_{}_{}.bin",
            name_hint,
            std::process::id(),
            nanos
        ))
    }

    fn partitioned_tree() -> SceneNode {
        let mut faces = ground_grid(8, 400.0, 0.0);
        faces.extend(ground_grid(2, 50.0, 12.0));
        let mut root = SceneNode::group().with_child(SceneNode::geometry(faces));
        CollectedGeometryTransformer.transform(&mut root);
        QuadTransformer::with_limits(20, 150.0).transform(&mut root);
        BspTransformer::default().transform(&mut root);
        root
    }

    #[test]
    fn partitioned_tree_survives_round_trip() {
        let path = temp_file_path("round_trip");
        let tree = partitioned_tree();

        save_scene(&tree, &path).expect("save should succeed");
        let loaded = load_scene(&path).expect("load should succeed");

        assert_eq!(loaded.node_count(), tree.node_count());
        assert_eq!(loaded.outline(), tree.outline());
        assert_eq!(loaded.collect_world_faces(), tree.collect_world_faces());

        let _ = fs::remove_file(path);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let path = temp_file_path("missing");
        let err = load_scene(&path).expect_err("missing file should fail");
        assert!(matches!(err, CacheError::Io { .. }));
    }

    #[test]
    fn load_truncated_file_is_codec_error() {
        let path = temp_file_path("truncated");
        let mut bytes = Vec::new();
        serialize(&partitioned_tree(), &mut bytes).expect("encode");
        fs::write(&path, &bytes[..bytes.len() / 2]).expect("write truncated cache");

        let err = load_scene(&path).expect_err("truncated file should fail");
        assert!(matches!(err, CacheError::Codec { .. }));

        let _ = fs::remove_file(path);
    }
}
