//! Zip container holding the package parts.
//!
//! Reads load every member into memory in archive order. Writes always put
//! `mimetype` first and store every member uncompressed, which is what the
//! host application expects.

mod working_copy;

pub use working_copy::WorkingCopy;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, Result};

/// Name of the member that must come first in the archive.
pub const MIMETYPE: &str = "mimetype";

/// Members skipped by identifier rewrites.
pub const CONTAINER_XML: &str = "META-INF/container.xml";
pub const METADATA_XML: &str = "META-INF/metadata.xml";

/// How an archive is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// The archive must exist.
    Read,
    /// The archive must not exist yet; members are added then [`Archive::save`]d.
    Create,
}

/// An in-memory view of a package archive.
#[derive(Debug, Clone)]
pub struct Archive {
    path: PathBuf,
    members: Vec<(String, Vec<u8>)>,
    index: HashMap<String, usize>,
}

impl Archive {
    /// Open `path` in the given mode.
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref();
        match mode {
            OpenMode::Read => {
                if !path.exists() {
                    return Err(Error::NotFound(path.to_path_buf()));
                }
                let file = File::open(path)?;
                let mut archive = Self::read_from_reader(BufReader::new(file))?;
                archive.path = path.to_path_buf();
                Ok(archive)
            }
            OpenMode::Create => {
                if path.exists() {
                    return Err(Error::AlreadyExists(path.to_path_buf()));
                }
                Ok(Self {
                    path: path.to_path_buf(),
                    members: Vec::new(),
                    index: HashMap::new(),
                })
            }
        }
    }

    /// Load every member of a zip stream.
    pub fn read_from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut zip = ZipArchive::new(reader)?;
        let mut archive = Self {
            path: PathBuf::new(),
            members: Vec::with_capacity(zip.len()),
            index: HashMap::new(),
        };

        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut contents = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut contents)?;
            archive.insert(name, contents);
        }

        Ok(archive)
    }

    /// Load a package from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read_from_reader(Cursor::new(bytes))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Contents of `name`, or [`Error::MissingPart`].
    pub fn read(&self, name: &str) -> Result<&[u8]> {
        self.index
            .get(name)
            .map(|&i| self.members[i].1.as_slice())
            .ok_or_else(|| Error::MissingPart(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Member names in archive order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Add or replace a member.
    pub fn insert(&mut self, name: String, contents: Vec<u8>) {
        match self.index.get(&name) {
            Some(&i) => self.members[i].1 = contents,
            None => {
                self.index.insert(name.clone(), self.members.len());
                self.members.push((name, contents));
            }
        }
    }

    /// Write an archive opened with [`OpenMode::Create`].
    ///
    /// Fails with [`Error::AlreadyExists`] if something appeared at the path
    /// in the meantime; an existing file is never overwritten.
    pub fn save(&self) -> Result<()> {
        let dir = parent_dir(&self.path);
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        write_members(tmp.as_file_mut(), self.members.iter().map(|(n, d)| (n.as_str(), d.as_slice())))?;
        tmp.persist_noclobber(&self.path).map_err(|e| {
            if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                Error::AlreadyExists(self.path.clone())
            } else {
                Error::Io(e.error)
            }
        })?;
        info!("wrote {} ({} members)", self.path.display(), self.members.len());
        Ok(())
    }

    /// Pack the files below `dir` into a new archive at `dest`.
    ///
    /// Member names are the paths relative to `dir` with `/` separators.
    pub fn create_from_dir<P: AsRef<Path>, Q: AsRef<Path>>(dir: P, dest: Q) -> Result<Self> {
        let dir = dir.as_ref();
        let mut archive = Self::open(dest, OpenMode::Create)?;

        if !dir.is_dir() {
            return Err(Error::NotFound(dir.to_path_buf()));
        }

        let mut files = Vec::new();
        collect_files(dir, dir, &mut files)?;
        files.sort();
        for name in files {
            let contents = std::fs::read(dir.join(&name))?;
            archive.insert(name, contents);
        }
        debug!("packing {} members from {}", archive.len(), dir.display());

        archive.save()?;
        Ok(archive)
    }
}

/// Write `members` as a stored zip stream, `mimetype` first.
pub fn write_members<'a, W, I>(writer: W, members: I) -> Result<()>
where
    W: Write + Seek,
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut zip = ZipWriter::new(writer);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    let mut rest = Vec::new();
    for (name, data) in members {
        if name == MIMETYPE {
            zip.start_file(name, stored)?;
            zip.write_all(data)?;
        } else {
            rest.push((name, data));
        }
    }
    for (name, data) in rest {
        zip.start_file(name, stored)?;
        zip.write_all(data)?;
    }

    zip.finish()?;
    Ok(())
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files(root, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.push(name);
        }
    }
    Ok(())
}

pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}
