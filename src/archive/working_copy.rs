//! Scratch-directory session used for every mutation.
//!
//! The archive is extracted into a private temporary directory, edited there
//! member by member, and repacked on [`WorkingCopy::commit`]. The new archive
//! is written next to the original and renamed over it, so the original path
//! always names a complete archive. Dropping the session without committing
//! discards the scratch directory and leaves the original untouched.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use log::{debug, info};
use tempfile::{NamedTempFile, TempDir};
use zip::ZipArchive;

use super::{parent_dir, write_members};
use crate::error::{Error, Result};

pub struct WorkingCopy {
    archive_path: PathBuf,
    scratch: TempDir,
    /// Member names in the order they will be written.
    members: Vec<String>,
}

impl WorkingCopy {
    /// Extract every member of `archive_path` into a fresh scratch directory.
    pub fn begin<P: AsRef<Path>>(archive_path: P) -> Result<Self> {
        let archive_path = archive_path.as_ref().to_path_buf();
        if !archive_path.exists() {
            return Err(Error::NotFound(archive_path));
        }

        let scratch = tempfile::Builder::new().prefix("idmlkit-").tempdir()?;
        let file = File::open(&archive_path)?;
        let mut zip = ZipArchive::new(BufReader::new(file))?;
        let mut members = Vec::with_capacity(zip.len());

        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let rel = entry
                .enclosed_name()
                .ok_or_else(|| Error::UnsafeMemberName(name.clone()))?;
            let dest = scratch.path().join(rel);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&dest)?;
            io::copy(&mut entry, &mut out)?;
            members.push(name);
        }

        debug!(
            "extracted {} members of {} to {}",
            members.len(),
            archive_path.display(),
            scratch.path().display()
        );

        Ok(Self {
            archive_path,
            scratch,
            members,
        })
    }

    /// Root of the scratch directory.
    pub fn dir(&self) -> &Path {
        self.scratch.path()
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.iter().any(|m| m == name)
    }

    pub fn names(&self) -> &[String] {
        &self.members
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        if !self.contains(name) {
            return Err(Error::MissingPart(name.to_string()));
        }
        Ok(fs::read(self.member_path(name)?)?)
    }

    /// Write a member, adding it at the end of the member list if new.
    pub fn write(&mut self, name: &str, contents: &[u8]) -> Result<()> {
        let path = self.member_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        if !self.contains(name) {
            self.members.push(name.to_string());
        }
        Ok(())
    }

    /// Rename a member, keeping its position in the member list.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let pos = self
            .members
            .iter()
            .position(|m| m == from)
            .ok_or_else(|| Error::MissingPart(from.to_string()))?;
        let src = self.member_path(from)?;
        let dst = self.member_path(to)?;
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(src, dst)?;
        self.members[pos] = to.to_string();
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<()> {
        let path = self.member_path(name)?;
        if self.contains(name) {
            fs::remove_file(path)?;
            self.members.retain(|m| m != name);
        }
        Ok(())
    }

    /// Repack the scratch directory and atomically replace the original archive.
    pub fn commit(self) -> Result<()> {
        let mut contents = Vec::with_capacity(self.members.len());
        for name in &self.members {
            contents.push((name.as_str(), fs::read(self.member_path(name)?)?));
        }

        let mut tmp = NamedTempFile::new_in(parent_dir(&self.archive_path))?;
        write_members(
            tmp.as_file_mut(),
            contents.iter().map(|(n, d)| (*n, d.as_slice())),
        )?;
        tmp.persist(&self.archive_path).map_err(|e| Error::Io(e.error))?;

        info!(
            "committed {} ({} members)",
            self.archive_path.display(),
            self.members.len()
        );
        Ok(())
    }

    fn member_path(&self, name: &str) -> Result<PathBuf> {
        let rel = Path::new(name);
        let safe = rel
            .components()
            .all(|c| matches!(c, std::path::Component::Normal(_)));
        if !safe || name.is_empty() {
            return Err(Error::UnsafeMemberName(name.to_string()));
        }
        Ok(self.scratch.path().join(rel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{Archive, MIMETYPE, OpenMode};

    fn make_archive(dir: &Path) -> PathBuf {
        let path = dir.join("pkg.idml");
        let mut archive = Archive::open(&path, OpenMode::Create).unwrap();
        archive.insert("designmap.xml".into(), b"<Document/>".to_vec());
        archive.insert(MIMETYPE.into(), b"application/vnd.adobe.indesign-idml-package".to_vec());
        archive.insert("Stories/Story_u1.xml".into(), b"<Story/>".to_vec());
        archive.save().unwrap();
        path
    }

    #[test]
    fn test_commit_replaces_archive() {
        let tmp = TempDir::new().unwrap();
        let path = make_archive(tmp.path());

        let mut wc = WorkingCopy::begin(&path).unwrap();
        wc.rename("Stories/Story_u1.xml", "Stories/Story_Xu1.xml").unwrap();
        wc.write("XML/Mapping.xml", b"<Mapping/>").unwrap();
        wc.commit().unwrap();

        let archive = Archive::open(&path, OpenMode::Read).unwrap();
        let names: Vec<_> = archive.names().collect();
        assert_eq!(names[0], MIMETYPE);
        assert!(archive.contains("Stories/Story_Xu1.xml"));
        assert!(!archive.contains("Stories/Story_u1.xml"));
        assert_eq!(archive.read("XML/Mapping.xml").unwrap(), b"<Mapping/>");
    }

    #[test]
    fn test_scratch_removed_on_drop() {
        let tmp = TempDir::new().unwrap();
        let path = make_archive(tmp.path());
        let before = fs::read(&path).unwrap();

        let scratch = {
            let mut wc = WorkingCopy::begin(&path).unwrap();
            wc.write("designmap.xml", b"<Changed/>").unwrap();
            wc.dir().to_path_buf()
        };

        assert!(!scratch.exists(), "scratch dir should be removed");
        assert_eq!(fs::read(&path).unwrap(), before, "original must be untouched");
    }

    #[test]
    fn test_unsafe_names_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = make_archive(tmp.path());
        let mut wc = WorkingCopy::begin(&path).unwrap();
        assert!(matches!(
            wc.write("../escape.xml", b""),
            Err(Error::UnsafeMemberName(_))
        ));
        assert!(matches!(wc.read("XML/Tags.xml"), Err(Error::MissingPart(_))));
    }
}
