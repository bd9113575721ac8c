//! Parsed view over a [`WorkingCopy`].
//!
//! Every XML member is parsed up front so edits can move nodes between
//! parts freely. Only the parts handed out mutably are serialized back on
//! commit.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use log::debug;

use crate::archive::WorkingCopy;
use crate::error::{Error, Result};
use crate::part::PartSource;
use crate::xml::{SerializeOptions, XmlDocument};

pub struct Session {
    wc: WorkingCopy,
    docs: HashMap<String, XmlDocument>,
    dirty: HashSet<String>,
}

impl Session {
    pub fn begin<P: AsRef<Path>>(path: P) -> Result<Self> {
        let wc = WorkingCopy::begin(path)?;
        let mut docs = HashMap::new();
        for name in wc.names().iter().filter(|n| n.ends_with(".xml")) {
            let bytes = wc.read(name)?;
            docs.insert(name.clone(), XmlDocument::parse_part(name, &bytes)?);
        }
        Ok(Self {
            wc,
            docs,
            dirty: HashSet::new(),
        })
    }

    /// Mutable access to a part; the part is rewritten on commit.
    pub fn doc_mut(&mut self, name: &str) -> Result<&mut XmlDocument> {
        let doc = self
            .docs
            .get_mut(name)
            .ok_or_else(|| Error::MissingPart(name.to_string()))?;
        self.dirty.insert(name.to_string());
        Ok(doc)
    }

    /// Add or replace a part.
    pub fn put(&mut self, name: &str, doc: XmlDocument) -> Result<()> {
        if !self.wc.contains(name) {
            self.wc.write(name, b"")?;
        }
        self.docs.insert(name.to_string(), doc);
        self.dirty.insert(name.to_string());
        Ok(())
    }

    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        self.wc.rename(from, to)?;
        if let Some(doc) = self.docs.remove(from) {
            self.docs.insert(to.to_string(), doc);
        }
        if self.dirty.remove(from) {
            self.dirty.insert(to.to_string());
        }
        debug!("renamed {from} -> {to}");
        Ok(())
    }

    /// Serialize the touched parts and replace the archive.
    pub fn commit(mut self) -> Result<()> {
        let mut dirty: Vec<String> = self.dirty.drain().collect();
        dirty.sort();
        for name in dirty {
            if let Some(doc) = self.docs.get(&name) {
                let bytes = doc.serialize(&SerializeOptions::for_part(&name));
                self.wc.write(&name, &bytes)?;
                debug!("rewrote {name} ({} bytes)", bytes.len());
            }
        }
        self.wc.commit()
    }
}

impl PartSource for Session {
    fn member_names(&self) -> Vec<String> {
        self.wc.names().to_vec()
    }

    fn has_part(&self, name: &str) -> bool {
        self.docs.contains_key(name)
    }

    fn part(&self, name: &str) -> Result<&XmlDocument> {
        self.docs
            .get(name)
            .ok_or_else(|| Error::MissingPart(name.to_string()))
    }
}
