//! Page and spread geometry.
//!
//! A `Page` is placed in its spread by `GeometricBounds` (`y1 x1 y2 x2`,
//! before transformation) and `ItemTransform` (`a b c d tx ty`). Pages of a
//! spread are assumed to be aligned vertically, so only the x axis decides
//! which page an item sits on. All values are read and written as exact
//! decimals so repeated moves never drift.

use std::str::FromStr;

use log::warn;
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::xml::{NodeId, XmlDocument};

const ANCHOR_PATH: &str = "Properties/PathGeometry/GeometryPathType/PathPointArray/PathPointType";

/// Elements without their own path geometry; their parent frame is used.
const CONTAINED_GRAPHICS: [&str; 3] = ["Image", "EPS", "PDF"];

/// Spread children that are not page items.
pub(crate) const NON_ITEMS: [&str; 2] = ["Page", "FlattenerPreference"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    Recto,
    Verso,
}

impl Face {
    pub fn complement(self) -> Self {
        match self {
            Face::Recto => Face::Verso,
            Face::Verso => Face::Recto,
        }
    }
}

/// Page rectangle in spread coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coordinates {
    pub x1: Decimal,
    pub y1: Decimal,
    pub x2: Decimal,
    pub y2: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub node: NodeId,
    pub self_id: String,
    pub bounds: [Decimal; 4],
    pub transform: [Decimal; 6],
}

impl Page {
    pub fn read(doc: &XmlDocument, node: NodeId) -> Result<Self> {
        Ok(Self {
            node,
            self_id: doc.attr(node, "Self").unwrap_or_default().to_string(),
            bounds: numbers_attr(doc, node, "GeometricBounds")?,
            transform: numbers_attr(doc, node, "ItemTransform")?,
        })
    }

    pub fn coordinates(&self) -> Coordinates {
        let [b0, b1, b2, b3] = self.bounds;
        let (tx, ty) = (self.transform[4], self.transform[5]);
        Coordinates {
            x1: b1 + tx,
            y1: b0 + ty,
            x2: b3 + tx,
            y2: b2 + ty,
        }
    }

    pub fn face(&self) -> Face {
        if self.coordinates().x1 >= Decimal::ZERO {
            Face::Recto
        } else {
            Face::Verso
        }
    }

    /// Sibling items whose first translated anchor lies in the page's x range.
    pub fn items(&self, doc: &XmlDocument) -> Result<Vec<NodeId>> {
        let Some(parent) = doc.parent(self.node) else {
            return Ok(Vec::new());
        };
        let coords = self.coordinates();
        let mut items = Vec::new();
        for sibling in doc.element_children(parent).collect::<Vec<_>>() {
            if NON_ITEMS.iter().any(|n| doc.is_named(sibling, n)) || doc.attr(sibling, "ItemTransform").is_none() {
                continue;
            }
            let Some((x, _)) = translated_anchor(doc, sibling)? else {
                warn!(
                    "page item {} has no path geometry; not assigned to a page",
                    doc.attr(sibling, "Self").unwrap_or("?")
                );
                continue;
            };
            if x >= coords.x1 && x <= coords.x2 {
                items.push(sibling);
            }
        }
        Ok(items)
    }
}

/// The `Spread` element of a spread part.
pub fn spread_node(doc: &XmlDocument) -> Result<NodeId> {
    let root = doc.root();
    if doc.is_named(root, "Spread") {
        return Ok(root);
    }
    doc.first_child_named(root, "Spread")
        .ok_or_else(|| Error::UnsupportedShape("spread part without a Spread element".into()))
}

/// Pages of a spread part, in document order.
pub fn pages(doc: &XmlDocument) -> Result<Vec<Page>> {
    let spread = spread_node(doc)?;
    doc.children_named(spread, "Page")
        .collect::<Vec<_>>()
        .into_iter()
        .map(|p| Page::read(doc, p))
        .collect()
}

/// Move `page` to `face`, carrying `items` along rigidly.
///
/// A recto page gets an x translation of zero, a verso page `-x2` of its
/// bounds. Returns `false` when the page already had that face.
pub fn set_face(doc: &mut XmlDocument, page: NodeId, face: Face, items: &[NodeId]) -> Result<bool> {
    let current = Page::read(doc, page)?;
    if current.face() == face {
        return Ok(false);
    }

    let mut transform = current.transform;
    transform[4] = match face {
        Face::Recto => Decimal::ZERO,
        Face::Verso => -current.bounds[3],
    };
    let dx = transform[4] - current.transform[4];
    doc.set_attr(page, "ItemTransform", format_numbers(&transform));

    for &item in items {
        translate(doc, item, dx, Decimal::ZERO)?;
    }
    Ok(true)
}

/// Add `dx`/`dy` to the translation of `node`'s `ItemTransform`.
pub fn translate(doc: &mut XmlDocument, node: NodeId, dx: Decimal, dy: Decimal) -> Result<()> {
    let mut transform: [Decimal; 6] = numbers_attr(doc, node, "ItemTransform")?;
    transform[4] += dx;
    transform[5] += dy;
    doc.set_attr(node, "ItemTransform", format_numbers(&transform));
    Ok(())
}

/// First anchor point of an item in spread coordinates.
pub fn translated_anchor(doc: &XmlDocument, node: NodeId) -> Result<Option<(Decimal, Decimal)>> {
    let Some(point) = doc.find_path(node, ANCHOR_PATH) else {
        return Ok(None);
    };
    let [x, y]: [Decimal; 2] = numbers_attr(doc, point, "Anchor")?;
    let transform: [Decimal; 6] = numbers_attr(doc, node, "ItemTransform")?;
    Ok(Some((x + transform[4], y + transform[5])))
}

/// Translated anchor of a placed element, using the enclosing frame for
/// graphics that carry no path of their own.
pub fn placement_anchor(doc: &XmlDocument, node: NodeId) -> Result<(Decimal, Decimal)> {
    let mut node = node;
    if CONTAINED_GRAPHICS.iter().any(|g| doc.is_named(node, g))
        && let Some(parent) = doc.parent(node)
    {
        node = parent;
    }
    translated_anchor(doc, node)?.ok_or_else(|| Error::InvalidGeometry {
        element: doc.attr(node, "Self").unwrap_or("?").to_string(),
        message: "no anchor point".into(),
    })
}

/// Offset that moves the source anchor onto the destination anchor.
pub fn compute_insert_translation(
    dest: &XmlDocument,
    at: NodeId,
    src: &XmlDocument,
    only: NodeId,
) -> Result<(Decimal, Decimal)> {
    let (ax, ay) = placement_anchor(dest, at)?;
    let (ox, oy) = placement_anchor(src, only)?;
    Ok((ax - ox, ay - oy))
}

/// Copy `src_page` and its items into the spread of `dest`.
///
/// A spread holds at most two pages. An empty spread gets the page as a
/// verso; otherwise the page goes right after the existing one and becomes
/// its complement.
pub fn add_page(dest: &mut XmlDocument, src: &XmlDocument, src_page: NodeId) -> Result<NodeId> {
    let spread = spread_node(dest)?;
    let existing = pages(dest)?;
    if existing.len() >= 2 {
        return Err(Error::UnsupportedShape(format!(
            "spread {} already holds two pages",
            dest.attr(spread, "Self").unwrap_or("?")
        )));
    }

    let incoming = Page::read(src, src_page)?;
    let src_items = incoming.items(src)?;

    let page_copy = dest.import_node(src, src_page);
    let face = match existing.last() {
        Some(last) => {
            dest.insert_after(last.node, page_copy);
            last.face().complement()
        }
        None => {
            dest.append_child(spread, page_copy);
            Face::Verso
        }
    };

    let mut copied = Vec::with_capacity(src_items.len());
    for item in src_items {
        let copy = dest.import_node(src, item);
        dest.append_child(spread, copy);
        copied.push(copy);
    }

    set_face(dest, page_copy, face, &copied)?;
    Ok(page_copy)
}

/// Remove every child of the `Spread` element, keeping its attributes.
pub fn clear_spread(doc: &mut XmlDocument) -> Result<()> {
    let spread = spread_node(doc)?;
    doc.clear_children(spread);
    Ok(())
}

pub fn parse_decimal(value: &str) -> Option<Decimal> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .ok()
}

/// Space-separated decimals, zero written as `0`.
pub fn format_numbers(values: &[Decimal]) -> String {
    values
        .iter()
        .map(|v| if v.is_zero() { "0".to_string() } else { v.to_string() })
        .collect::<Vec<_>>()
        .join(" ")
}

fn numbers_attr<const N: usize>(doc: &XmlDocument, node: NodeId, attr: &str) -> Result<[Decimal; N]> {
    let element = || doc.attr(node, "Self").unwrap_or_else(|| doc.name(node).unwrap_or("?")).to_string();
    let raw = doc.attr(node, attr).ok_or_else(|| Error::InvalidGeometry {
        element: element(),
        message: format!("missing {attr}"),
    })?;

    let values: Vec<Decimal> = raw
        .split_whitespace()
        .map(parse_decimal)
        .collect::<Option<_>>()
        .ok_or_else(|| Error::InvalidGeometry {
            element: element(),
            message: format!("{attr} is not numeric: {raw:?}"),
        })?;

    values.try_into().map_err(|v: Vec<Decimal>| Error::InvalidGeometry {
        element: element(),
        message: format!("{attr} has {} values, expected {N}", v.len()),
    })
}
