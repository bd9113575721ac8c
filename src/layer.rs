//! Layers across the manifest and the spreads.
//!
//! The manifest lists the layers; spread items point at one through
//! `ItemLayer`. Guides carry an `ItemLayer` too but do not keep a layer in
//! use, and are dropped along with the layer they sit on.

use log::{debug, info};

use crate::error::{Error, Result};
use crate::package::Session;
use crate::part::designmap;
use crate::part::{DESIGNMAP, PartSource, spread_parts};
use crate::xml::{NodeId, XmlDocument};

/// Whether any element other than a guide sits on `layer`.
pub fn has_any_item_on_layer(doc: &XmlDocument, layer: &str) -> bool {
    doc.elements()
        .any(|n| !doc.is_named(n, "Guide") && doc.attr(n, "ItemLayer") == Some(layer))
}

pub fn guides_on_layer(doc: &XmlDocument, layer: &str) -> Vec<NodeId> {
    doc.elements_named("Guide")
        .filter(|&n| doc.attr(n, "ItemLayer") == Some(layer))
        .collect()
}

/// Manifest layers holding at least one spread item, in manifest order.
pub fn referenced_layers<S: PartSource + ?Sized>(src: &S) -> Result<Vec<String>> {
    let spreads = spread_parts(src)
        .iter()
        .map(|name| src.part(name))
        .collect::<Result<Vec<_>>>()?;
    Ok(designmap::layer_ids(src.part(DESIGNMAP)?)
        .into_iter()
        .filter(|id| spreads.iter().any(|doc| has_any_item_on_layer(doc, id)))
        .collect())
}

pub(crate) fn suffix_layers(session: &mut Session, suffix: &str) -> Result<()> {
    designmap::suffix_layers(session.doc_mut(DESIGNMAP)?, suffix);
    Ok(())
}

/// Collapse every layer into the first one and move all spread items onto it.
pub(crate) fn merge_layers(session: &mut Session, with_name: Option<&str>) -> Result<()> {
    let Some(kept) = designmap::merge_layers(session.doc_mut(DESIGNMAP)?, with_name) else {
        return Ok(());
    };
    for name in spread_parts(&*session) {
        let doc = session.doc_mut(&name)?;
        let on_layers: Vec<NodeId> = doc.elements().filter(|&n| doc.attr(n, "ItemLayer").is_some()).collect();
        for node in on_layers {
            doc.set_attr(node, "ItemLayer", kept.as_str());
        }
    }
    info!("merged layers into {kept}");
    Ok(())
}

/// Remove the guides placed on `layer` from every spread.
pub(crate) fn remove_guides_on_layer(session: &mut Session, layer: &str) -> Result<usize> {
    let mut removed = 0;
    for name in spread_parts(&*session) {
        if guides_on_layer(session.part(&name)?, layer).is_empty() {
            continue;
        }
        let doc = session.doc_mut(&name)?;
        for guide in guides_on_layer(doc, layer) {
            doc.detach(guide);
            removed += 1;
        }
    }
    if removed > 0 {
        debug!("removed {removed} guides on layer {layer}");
    }
    Ok(removed)
}

pub(crate) fn remove_layer(session: &mut Session, layer: &str) -> Result<()> {
    if !designmap::layer_ids(session.part(DESIGNMAP)?).iter().any(|id| id == layer) {
        return Err(Error::LayerNotFound(layer.to_string()));
    }
    remove_guides_on_layer(session, layer)?;
    designmap::remove_layer(session.doc_mut(DESIGNMAP)?, layer);
    debug!("removed layer {layer}");
    Ok(())
}

/// Remove the layers no spread item sits on. Returns their ids.
pub(crate) fn remove_orphan_layers(session: &mut Session) -> Result<Vec<String>> {
    let referenced = referenced_layers(&*session)?;
    let orphans: Vec<String> = designmap::layer_ids(session.part(DESIGNMAP)?)
        .into_iter()
        .filter(|id| !referenced.contains(id))
        .collect();
    for layer in &orphans {
        remove_layer(session, layer)?;
    }
    Ok(orphans)
}
