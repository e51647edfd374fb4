//! Binary snapshots of a [`PrereqGraph`].
//!
//! A checkpoint file is a borsh-encoded envelope holding a magic number, a
//! format version, the SHA-256 digest of the payload and the payload itself.
//! The payload is the save time plus the graph's [`GraphParts`].

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use borsh::{BorshDeserialize, BorshSerialize};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::domain::{GraphParts, InvalidParts, PrereqGraph};

const MAGIC: [u8; 8] = *b"PRQCHAIN";
const FORMAT_VERSION: u16 = 1;

#[derive(BorshSerialize, BorshDeserialize)]
struct Envelope {
    magic: [u8; 8],
    version: u16,
    digest: [u8; 32],
    payload: Vec<u8>,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct Snapshot {
    saved_at_ms: i64,
    parts: GraphParts,
}

/// A graph restored from a checkpoint file.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    /// The restored graph.
    pub graph: PrereqGraph,
    /// When the checkpoint was written.
    pub saved_at: DateTime<Utc>,
}

/// Errors raised while writing or restoring a checkpoint.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// The checkpoint file could not be read or written.
    #[error("failed to access checkpoint {}: {source}", path.display())]
    Io {
        /// The checkpoint file.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// The file is not a well-formed checkpoint.
    #[error("failed to decode checkpoint: {0}")]
    Decode(io::Error),
    /// The file does not start with the checkpoint magic number.
    #[error("not a checkpoint file")]
    BadMagic,
    /// The file was written by an incompatible format version.
    #[error("unsupported checkpoint format version {0}")]
    UnsupportedVersion(u16),
    /// The payload does not match its recorded digest.
    #[error("checkpoint digest does not match its content")]
    DigestMismatch,
    /// The stored graph violates a structural invariant.
    #[error("checkpoint holds an invalid graph: {0}")]
    Invalid(#[from] InvalidParts),
}

/// Writes `graph` to `path`, replacing any existing checkpoint.
///
/// The file is written next to its destination and renamed into place, so a
/// failed save never leaves a truncated checkpoint behind.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
#[instrument(level = "debug", skip(graph))]
pub fn save(path: &Path, graph: &PrereqGraph) -> Result<(), CheckpointError> {
    let io_error = |source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    };

    let snapshot = Snapshot {
        saved_at_ms: Utc::now().timestamp_millis(),
        parts: graph.to_parts(),
    };
    let payload = borsh::to_vec(&snapshot).map_err(io_error)?;
    let envelope = Envelope {
        magic: MAGIC,
        version: FORMAT_VERSION,
        digest: Sha256::digest(&payload).into(),
        payload,
    };
    let encoded = borsh::to_vec(&envelope).map_err(io_error)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    let staging = path.with_extension("ckpt.tmp");
    fs::write(&staging, encoded).map_err(io_error)?;
    fs::rename(&staging, path).map_err(io_error)?;

    tracing::debug!(
        vertices = graph.vertex_count(),
        edges = graph.edge_count(),
        "checkpoint written"
    );
    Ok(())
}

/// Restores a graph from the checkpoint at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not a checkpoint of the
/// current format, fails its digest check, or holds an invalid graph.
#[instrument(level = "debug")]
pub fn load(path: &Path) -> Result<Checkpoint, CheckpointError> {
    let bytes = fs::read(path).map_err(|source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let envelope: Envelope = borsh::from_slice(&bytes).map_err(CheckpointError::Decode)?;
    if envelope.magic != MAGIC {
        return Err(CheckpointError::BadMagic);
    }
    if envelope.version != FORMAT_VERSION {
        return Err(CheckpointError::UnsupportedVersion(envelope.version));
    }
    let digest: [u8; 32] = Sha256::digest(&envelope.payload).into();
    if digest != envelope.digest {
        return Err(CheckpointError::DigestMismatch);
    }

    let snapshot: Snapshot =
        borsh::from_slice(&envelope.payload).map_err(CheckpointError::Decode)?;
    let graph = PrereqGraph::from_parts(snapshot.parts)?;
    let saved_at = DateTime::<Utc>::from_timestamp_millis(snapshot.saved_at_ms).unwrap_or_default();

    Ok(Checkpoint { graph, saved_at })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AcademicYear, ModuleUniverse, PrereqTree};

    fn sample_graph() -> PrereqGraph {
        let universe = ModuleUniverse::new(
            ["CS1010", "CS1010E", "CS1231", "CS2040", "CS3243", "MA1100"]
                .iter()
                .map(|c| c.parse().unwrap()),
        );
        let mut graph = PrereqGraph::new(universe);
        graph.contract_preclusions("CS1010", "CS1010E or equivalent");
        let year = Some(AcademicYear::new(2019));
        graph.add_edge("CS1010", "CS1231", year);
        graph.add_edge("CS1231", "CS2040", year);
        graph.add_prerequisites("CS2040", &PrereqTree::Module("CS3243".to_string()), None);
        graph
    }

    #[test]
    fn round_trip_reproduces_results() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("checkpoint").join("graph.ckpt");
        let graph = sample_graph();

        let before = Utc::now();
        save(&path, &graph).unwrap();
        let restored = load(&path).unwrap();

        assert_eq!(restored.graph.to_parts(), graph.to_parts());
        assert!(restored.saved_at.timestamp_millis() >= before.timestamp_millis());
        assert_eq!(
            restored.graph.validate().unwrap().longest_paths(),
            graph.validate().unwrap().longest_paths()
        );
        assert!(!path.with_extension("ckpt.tmp").exists());
    }

    #[test]
    fn tampered_payload_fails_digest_check() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("graph.ckpt");
        save(&path, &sample_graph()).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        assert!(matches!(load(&path), Err(CheckpointError::DigestMismatch)));
    }

    #[test]
    fn truncated_file_fails_to_decode() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("graph.ckpt");
        save(&path, &sample_graph()).unwrap();

        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        assert!(matches!(load(&path), Err(CheckpointError::Decode(_))));
    }

    #[test]
    fn foreign_file_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("graph.ckpt");
        let envelope = Envelope {
            magic: *b"SOMETHIN",
            version: FORMAT_VERSION,
            digest: [0; 32],
            payload: Vec::new(),
        };
        fs::write(&path, borsh::to_vec(&envelope).unwrap()).unwrap();

        assert!(matches!(load(&path), Err(CheckpointError::BadMagic)));
    }

    #[test]
    fn future_version_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("graph.ckpt");
        let envelope = Envelope {
            magic: MAGIC,
            version: FORMAT_VERSION + 1,
            digest: [0; 32],
            payload: Vec::new(),
        };
        fs::write(&path, borsh::to_vec(&envelope).unwrap()).unwrap();

        assert!(matches!(
            load(&path),
            Err(CheckpointError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load(&tmp.path().join("absent.ckpt")).unwrap_err();
        assert!(matches!(err, CheckpointError::Io { .. }));
    }
}
