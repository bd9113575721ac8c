//! Arena-allocated XML tree.
//!
//! Every node of a part lives in one contiguous vector and refers to its
//! parent and children by index. Detached nodes stay in the arena but are
//! unreachable from the root, so removal never invalidates other ids.

/// Unique identifier for a node in an [`XmlDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Node payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    /// Element with its qualified name (`idPkg:Story`) and attributes in
    /// document order. Namespace declarations are kept as attributes.
    Element { name: String, attrs: Vec<Attribute> },
    Text(String),
    CData(String),
    Comment(String),
    /// Processing instruction body, target included (`aid style="50" ...`).
    ProcessingInstruction(String),
}

/// XML attribute with its unescaped value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct XmlNode {
    pub data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl XmlNode {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: None,
            children: Vec::new(),
        }
    }
}

/// A parsed XML part.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    nodes: Vec<XmlNode>,
    root: NodeId,
    /// Comments and processing instructions that precede the root element.
    pub(crate) prolog: Vec<NodeId>,
    pub(crate) doctype: Option<String>,
}

impl XmlDocument {
    /// Create a document holding a single empty root element.
    pub fn new(root_name: &str) -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            prolog: Vec::new(),
            doctype: None,
        };
        doc.root = doc.create_element(root_name);
        doc
    }

    pub(crate) fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            root: NodeId(0),
            prolog: Vec::new(),
            doctype: None,
        }
    }

    pub(crate) fn set_root(&mut self, id: NodeId) {
        self.root = id;
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(XmlNode::new(data));
        id
    }

    /// The root element.
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn prolog(&self) -> &[NodeId] {
        &self.prolog
    }

    pub fn node(&self, id: NodeId) -> &XmlNode {
        &self.nodes[id.0 as usize]
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.node(id).data
    }

    pub(crate) fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0 as usize].data
    }

    /// Element name, or `None` for non-element nodes.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).data {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.node(id).data, NodeData::Element { .. })
    }

    pub fn is_named(&self, id: NodeId, name: &str) -> bool {
        self.name(id) == Some(name)
    }

    pub fn rename(&mut self, id: NodeId, new_name: &str) {
        if let NodeData::Element { name, .. } = &mut self.nodes[id.0 as usize].data {
            *name = new_name.to_string();
        }
    }

    pub fn attrs(&self, id: NodeId) -> &[Attribute] {
        match &self.node(id).data {
            NodeData::Element { attrs, .. } => attrs,
            _ => &[],
        }
    }

    pub fn attr(&self, id: NodeId, key: &str) -> Option<&str> {
        self.attrs(id)
            .iter()
            .find(|a| a.name == key)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn set_attr(&mut self, id: NodeId, key: &str, value: impl Into<String>) {
        if let NodeData::Element { attrs, .. } = &mut self.nodes[id.0 as usize].data {
            let value = value.into();
            match attrs.iter_mut().find(|a| a.name == key) {
                Some(attr) => attr.value = value,
                None => attrs.push(Attribute::new(key, value)),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, key: &str) -> Option<String> {
        if let NodeData::Element { attrs, .. } = &mut self.nodes[id.0 as usize].data {
            let pos = attrs.iter().position(|a| a.name == key)?;
            return Some(attrs.remove(pos).value);
        }
        None
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.is_element(c))
    }

    pub fn children_named<'a>(
        &'a self,
        id: NodeId,
        name: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.children(id)
            .iter()
            .copied()
            .filter(move |&c| self.is_named(c, name))
    }

    pub fn first_child_named(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.children_named(id, name).next()
    }

    /// Follow a `/`-separated chain of child element names, taking the first
    /// match at each step.
    pub fn find_path(&self, id: NodeId, path: &str) -> Option<NodeId> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(id, |node, step| self.first_child_named(node, step))
    }

    /// First descendant (excluding `id`) with the given name, in document order.
    pub fn find_descendant(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.descendants(id)
            .into_iter()
            .skip(1)
            .find(|&n| self.is_named(n, name))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    /// `id` and everything below it, in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Element descendants of the root, root included.
    pub fn elements(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.descendants(self.root)
            .into_iter()
            .filter(|&n| self.is_element(n))
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    /// Element siblings after `id`.
    pub fn following_siblings(&self, id: NodeId) -> Vec<NodeId> {
        let Some(parent) = self.parent(id) else {
            return Vec::new();
        };
        let Some(pos) = self.index_in_parent(id) else {
            return Vec::new();
        };
        self.children(parent)[pos + 1..]
            .iter()
            .copied()
            .filter(|&c| self.is_element(c))
            .collect()
    }

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.alloc(NodeData::Element {
            name: name.to_string(),
            attrs: Vec::new(),
        })
    }

    pub fn create_element_with(&mut self, name: &str, attrs: Vec<Attribute>) -> NodeId {
        self.alloc(NodeData::Element {
            name: name.to_string(),
            attrs,
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Text(text.to_string()))
    }

    pub(crate) fn create_node(&mut self, data: NodeData) -> NodeId {
        self.alloc(data)
    }

    /// Text of a text or CDATA node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).data {
            NodeData::Text(t) | NodeData::CData(t) => Some(t),
            _ => None,
        }
    }

    /// Concatenated text of every text node below `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    /// Replace all children of `id` with a single text node.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        self.clear_children(id);
        if !text.is_empty() {
            let t = self.create_text(text);
            self.append_child(id, t);
        }
    }

    /// Remove `id` from its parent. The node and its subtree stay usable.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0 as usize].parent.take() {
            self.nodes[parent.0 as usize].children.retain(|&c| c != id);
        }
    }

    pub fn clear_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.nodes[id.0 as usize].children);
        for child in children {
            self.nodes[child.0 as usize].parent = None;
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0 as usize].parent = Some(parent);
        self.nodes[parent.0 as usize].children.push(child);
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        self.nodes[child.0 as usize].parent = Some(parent);
        let children = &mut self.nodes[parent.0 as usize].children;
        let index = index.min(children.len());
        children.insert(index, child);
    }

    /// Insert `node` as the next sibling of `reference`.
    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) {
        self.detach(node);
        if let (Some(parent), Some(pos)) = (self.parent(reference), self.index_in_parent(reference)) {
            self.insert_child(parent, pos + 1, node);
        }
    }

    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) {
        self.detach(node);
        if let (Some(parent), Some(pos)) = (self.parent(reference), self.index_in_parent(reference)) {
            self.insert_child(parent, pos, node);
        }
    }

    /// Deep-copy `src_id` from `src` into this arena. The copy is detached.
    pub fn import_node(&mut self, src: &XmlDocument, src_id: NodeId) -> NodeId {
        let copy = self.alloc(src.data(src_id).clone());
        for &child in src.children(src_id) {
            let child_copy = self.import_node(src, child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// Deep-copy a node within this document. The copy is detached.
    pub fn duplicate(&mut self, id: NodeId) -> NodeId {
        let data = self.data(id).clone();
        let copy = self.alloc(data);
        let children = self.children(id).to_vec();
        for child in children {
            let child_copy = self.duplicate(child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// First element in document order matching `tag` (any tag when `None`)
    /// whose `attr` equals `value`.
    pub fn get_by_id(&self, tag: Option<&str>, attr: &str, value: &str) -> Option<NodeId> {
        self.elements().find(|&n| {
            tag.is_none_or(|t| self.is_named(n, t)) && self.attr(n, attr) == Some(value)
        })
    }

    /// Every attached element with the given name, in document order.
    pub fn elements_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.elements().filter(move |&n| self.is_named(n, name))
    }
}
