//! Tails files: the public accumulator elements of a revocation registry, stored on disk.
//!
//! Layout is a two byte big-endian version followed by `2N` compressed G2 points. The file is
//! named after, and validated against, the base58 Blake2b-256 digest of its contents.

use std::{
    fs::{self, File},
    io::{BufWriter, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use bls12_381::{G2Affine, G2Projective};
use digest::Digest;
use rand::RngCore;

use crate::{
    error::{Error, Result},
    hash::Blake2b256,
};

pub const TAILS_VERSION: u16 = 2;
pub const TAIL_SIZE: usize = 96;
const HEADER_SIZE: u64 = 2;

/// Sink for newly generated tails.
pub trait TailsWriter {
    /// Persist the given tails and return their location and hash.
    fn write(&mut self, tails: &mut dyn Iterator<Item = G2Projective>) -> Result<(String, String)>;
}

/// Random access to tails by their 1-based position.
pub trait TailsReader {
    fn tail(&mut self, position: u32) -> Result<G2Projective>;
}

#[derive(Clone, Debug)]
pub struct TailsFileWriter {
    root: PathBuf,
}

impl TailsFileWriter {
    /// Writes tails into `root`, or a directory under the system temp dir if `None`.
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root: root.unwrap_or_else(|| std::env::temp_dir().join("anoncreds-tails")),
        }
    }
}

impl Default for TailsFileWriter {
    fn default() -> Self {
        Self::new(None)
    }
}

impl TailsWriter for TailsFileWriter {
    fn write(&mut self, tails: &mut dyn Iterator<Item = G2Projective>) -> Result<(String, String)> {
        fs::create_dir_all(&self.root)?;
        let mut suffix = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut suffix);
        let tmp_path = self
            .root
            .join(format!(".{}.tmp", bs58::encode(suffix).into_string()));

        let mut hasher = Blake2b256::new();
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        let header = TAILS_VERSION.to_be_bytes();
        hasher.update(header);
        writer.write_all(&header)?;
        let mut count = 0usize;
        for tail in tails {
            let bytes = G2Affine::from(tail).to_compressed();
            hasher.update(bytes);
            writer.write_all(&bytes)?;
            count += 1;
        }
        writer.flush()?;
        drop(writer);

        let hash = bs58::encode(hasher.finalize()).into_string();
        let path = self.root.join(&hash);
        fs::rename(&tmp_path, &path)?;
        tracing::debug!(tails = count, path = %path.display(), "wrote tails file");
        Ok((path.to_string_lossy().into_owned(), hash))
    }
}

#[derive(Debug)]
pub struct TailsFileReader {
    path: PathBuf,
    file: Option<File>,
}

impl TailsFileReader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
        }
    }

    fn file(&mut self) -> Result<&mut File> {
        if self.file.is_none() {
            let mut file = File::open(&self.path)?;
            let mut header = [0u8; 2];
            file.read_exact(&mut header)?;
            if u16::from_be_bytes(header) != TAILS_VERSION {
                return Err(Error::invalid(format!(
                    "unsupported tails file version in {}",
                    self.path.display()
                )));
            }
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| Error::invalid("tails file is not open"))
    }

    /// Check the digest of the whole file against the hash recorded in the registry definition.
    pub fn verify_hash(&mut self, expected: &str) -> Result<()> {
        let file = self.file()?;
        file.seek(SeekFrom::Start(0))?;
        let mut hasher = Blake2b256::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        let actual = bs58::encode(hasher.finalize()).into_string();
        match actual == expected {
            true => Ok(()),
            false => Err(Error::invalid(format!(
                "tails hash mismatch: expected {expected}, got {actual}"
            ))),
        }
    }
}

impl TailsReader for TailsFileReader {
    fn tail(&mut self, position: u32) -> Result<G2Projective> {
        if position == 0 {
            return Err(Error::invalid("tails positions start at 1"));
        }
        let offset = HEADER_SIZE + u64::from(position - 1) * TAIL_SIZE as u64;
        let file = self.file()?;
        file.seek(SeekFrom::Start(offset))?;
        let mut bytes = [0u8; TAIL_SIZE];
        file.read_exact(&mut bytes)?;
        Option::<G2Affine>::from(G2Affine::from_compressed(&bytes))
            .map(G2Projective::from)
            .ok_or_else(|| Error::invalid(format!("invalid tail at position {position}")))
    }
}

/// In-memory tails, mostly useful for tests.
impl TailsReader for Vec<G2Projective> {
    fn tail(&mut self, position: u32) -> Result<G2Projective> {
        position
            .checked_sub(1)
            .and_then(|i| self.get(i as usize))
            .copied()
            .ok_or_else(|| Error::invalid(format!("no tail at position {position}")))
    }
}
