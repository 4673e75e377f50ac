//! In-memory host document
//!
//! The player is a client of a small DOM surface: element creation, attribute
//! and class manipulation, inline styles, tree mutation, focus, and listener
//! registration. [`Document`] implements that surface as an arena of elements
//! so the chrome can run headless. Layout is not computed here; hosts report
//! measured sizes with [`Document::set_measured_size`].
//!
//! Listeners don't hold callbacks. Each one records the player that owns it,
//! and [`Document::dispatch`] returns the `(owner, listener)` pairs an event
//! reaches, in delivery order: document/window capture listeners first, then
//! the target and, for bubbling events, its ancestors.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::types::{Dimension, PlayerId};
use crate::{Error, Result};

/// Shared handle to the host document
pub type SharedDocument = Rc<RefCell<Document>>;

/// Element handle. Elements are never deallocated, so a `NodeId` stays valid
/// for the lifetime of the document that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(usize);

/// Listener handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

/// Where a listener is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTarget {
    Node(NodeId),
    Document,
    Window,
}

/// DOM event types the chrome listens for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomEventKind {
    Click,
    KeyDown,
    Focus,
    FocusOut,
    MouseEnter,
    MouseMove,
    MouseLeave,
    TouchStart,
    Resize,
}

impl DomEventKind {
    pub fn bubbles(&self) -> bool {
        matches!(
            self,
            DomEventKind::Click
                | DomEventKind::KeyDown
                | DomEventKind::FocusOut
                | DomEventKind::MouseMove
                | DomEventKind::TouchStart
        )
    }
}

/// Modifier keys held during a key event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Modifiers {
    pub fn any(&self) -> bool {
        self.ctrl || self.alt || self.shift || self.meta
    }
}

/// A host event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomEvent {
    pub kind: DomEventKind,
    pub target: EventTarget,
    #[serde(default)]
    pub key_code: Option<u32>,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub related_target: Option<NodeId>,
    /// Pointer x offset within the target, in pixels
    #[serde(default)]
    pub offset_x: Option<f64>,
}

impl DomEvent {
    pub fn new(kind: DomEventKind, target: EventTarget) -> Self {
        Self {
            kind,
            target,
            key_code: None,
            modifiers: Modifiers::default(),
            related_target: None,
            offset_x: None,
        }
    }

    pub fn click(node: NodeId) -> Self {
        Self::new(DomEventKind::Click, EventTarget::Node(node))
    }

    pub fn key_down(node: NodeId, key_code: u32) -> Self {
        Self {
            key_code: Some(key_code),
            ..Self::new(DomEventKind::KeyDown, EventTarget::Node(node))
        }
    }

    pub fn focus(node: NodeId, related_target: Option<NodeId>) -> Self {
        Self {
            related_target,
            ..Self::new(DomEventKind::Focus, EventTarget::Node(node))
        }
    }

    pub fn resize() -> Self {
        Self::new(DomEventKind::Resize, EventTarget::Window)
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_offset_x(mut self, offset_x: f64) -> Self {
        self.offset_x = Some(offset_x);
        self
    }

    pub fn target_node(&self) -> Option<NodeId> {
        match self.target {
            EventTarget::Node(n) => Some(n),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Listener {
    id: ListenerId,
    target: EventTarget,
    kind: DomEventKind,
    owner: PlayerId,
}

#[derive(Debug, Clone, Default)]
struct Element {
    tag: String,
    attributes: BTreeMap<String, String>,
    classes: Vec<String>,
    style: BTreeMap<String, String>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    measured: Option<(f64, f64)>,
    player: Option<PlayerId>,
}

/// Arena-backed host document rooted at `<body>`
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Element>,
    body: NodeId,
    active: Option<NodeId>,
    viewport: (f64, f64),
    listeners: Vec<Listener>,
    next_listener: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document with an empty body and a 1280x720 viewport
    pub fn new() -> Self {
        let body = Element {
            tag: "body".to_string(),
            ..Default::default()
        };
        Self {
            nodes: vec![body],
            body: NodeId(0),
            active: None,
            viewport: (1280.0, 720.0),
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    pub fn into_shared(self) -> SharedDocument {
        Rc::new(RefCell::new(self))
    }

    fn el(&self, node: NodeId) -> &Element {
        &self.nodes[node.0]
    }

    fn el_mut(&mut self, node: NodeId) -> &mut Element {
        &mut self.nodes[node.0]
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn viewport(&self) -> (f64, f64) {
        self.viewport
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport = (width, height);
    }

    // Tree

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.nodes.push(Element {
            tag: tag.to_ascii_lowercase(),
            ..Default::default()
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Create an element with the given classes and append it to `parent`
    pub fn create_child(&mut self, parent: NodeId, tag: &str, classes: &str) -> NodeId {
        let node = self.create_element(tag);
        self.add_class(node, classes);
        self.append_child(parent, node);
        node
    }

    pub fn tag(&self, node: NodeId) -> &str {
        &self.el(node).tag
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.el(node).parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.el(node).children
    }

    /// Remove `node` from its parent, if any
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.el(node).parent {
            self.el_mut(parent).children.retain(|c| *c != node);
            self.el_mut(node).parent = None;
            if self.active.is_some_and(|a| a == node || self.contains(node, a)) {
                self.active = None;
            }
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.el_mut(parent).children.push(child);
        self.el_mut(child).parent = Some(parent);
    }

    /// Insert `child` at `index` among `parent`'s children (clamped)
    pub fn insert_child_at(&mut self, parent: NodeId, child: NodeId, index: usize) {
        self.detach(child);
        let children = &mut self.el_mut(parent).children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.el_mut(child).parent = Some(parent);
    }

    /// Insert `node` right before `reference` in `reference`'s parent
    pub fn insert_before(&mut self, node: NodeId, reference: NodeId) -> Result<()> {
        if node == reference {
            return Ok(());
        }
        self.detach(node);
        let parent = self.el(reference).parent.ok_or(Error::DetachedNode)?;
        let index = self
            .el(parent)
            .children
            .iter()
            .position(|c| *c == reference)
            .ok_or(Error::DetachedNode)?;
        self.el_mut(parent).children.insert(index, node);
        self.el_mut(node).parent = Some(parent);
        Ok(())
    }

    /// True if `node` is `ancestor` or one of its descendants
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.el(n).parent;
        }
        false
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        self.contains(self.body, node)
    }

    /// Nearest inclusive ancestor matching `pred`
    pub fn closest(&self, node: NodeId, pred: impl Fn(&Document, NodeId) -> bool) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(n) = current {
            if pred(self, n) {
                return Some(n);
            }
            current = self.el(n).parent;
        }
        None
    }

    fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.el(root).children.iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.el(n).children.iter().rev().copied());
        }
        out
    }

    /// First descendant of `root` (document order) carrying `class`
    pub fn find_by_class(&self, root: NodeId, class: &str) -> Option<NodeId> {
        self.descendants(root)
            .into_iter()
            .find(|n| self.has_class(*n, class))
    }

    pub fn find_all_by_class(&self, root: NodeId, class: &str) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|n| self.has_class(*n, class))
            .collect()
    }

    pub fn find_all_by_tag(&self, root: NodeId, tags: &[&str]) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|n| tags.contains(&self.tag(*n)))
            .collect()
    }

    /// Attached element whose `id` attribute equals `id`
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.body)
            .into_iter()
            .find(|n| self.attr(*n, "id") == Some(id))
    }

    /// True if `a` follows `b` in document order
    pub fn is_node_after(&self, a: NodeId, b: NodeId) -> bool {
        let order = self.descendants(self.body);
        let pos_a = order.iter().position(|n| *n == a);
        let pos_b = order.iter().position(|n| *n == b);
        matches!((pos_a, pos_b), (Some(a), Some(b)) if a > b)
    }

    /// Copy `node` (and its subtree when `deep`) into a new detached element.
    /// Listeners and player back-references are not copied.
    pub fn clone_node(&mut self, node: NodeId, deep: bool) -> NodeId {
        let source = self.el(node).clone();
        let copy = self.create_element(&source.tag);
        {
            let el = self.el_mut(copy);
            el.attributes = source.attributes;
            el.classes = source.classes;
            el.style = source.style;
            el.text = source.text;
            el.measured = source.measured;
        }
        if deep {
            for child in source.children {
                let child_copy = self.clone_node(child, true);
                self.append_child(copy, child_copy);
            }
        }
        copy
    }

    // Attributes

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.el(node).attributes.get(name).map(String::as_str)
    }

    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.el(node).attributes.contains_key(name)
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: impl Into<String>) {
        self.el_mut(node).attributes.insert(name.to_string(), value.into());
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        self.el_mut(node).attributes.remove(name);
    }

    // Classes

    /// Add every whitespace-separated class in `classes`
    pub fn add_class(&mut self, node: NodeId, classes: &str) {
        for class in classes.split_whitespace() {
            if !self.has_class(node, class) {
                self.el_mut(node).classes.push(class.to_string());
            }
        }
    }

    pub fn remove_class(&mut self, node: NodeId, classes: &str) {
        for class in classes.split_whitespace() {
            self.el_mut(node).classes.retain(|c| c != class);
        }
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.el(node).classes.iter().any(|c| c == class)
    }

    pub fn class_name(&self, node: NodeId) -> String {
        self.el(node).classes.join(" ")
    }

    pub fn set_class_name(&mut self, node: NodeId, class_name: &str) {
        self.el_mut(node).classes.clear();
        self.add_class(node, class_name);
    }

    // Inline style

    pub fn style(&self, node: NodeId, property: &str) -> Option<&str> {
        self.el(node).style.get(property).map(String::as_str)
    }

    pub fn set_style(&mut self, node: NodeId, property: &str, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            self.el_mut(node).style.remove(property);
        } else {
            self.el_mut(node).style.insert(property.to_string(), value);
        }
    }

    pub fn remove_style(&mut self, node: NodeId, property: &str) {
        self.el_mut(node).style.remove(property);
    }

    pub fn set_display(&mut self, node: NodeId, shown: bool) {
        self.set_style(node, "display", if shown { "block" } else { "none" });
    }

    // Text

    pub fn text(&self, node: NodeId) -> &str {
        &self.el(node).text
    }

    pub fn set_text(&mut self, node: NodeId, text: impl Into<String>) {
        self.el_mut(node).text = text.into();
    }

    // Layout

    /// Record the host-measured size of `node`
    pub fn set_measured_size(&mut self, node: NodeId, width: f64, height: f64) {
        self.el_mut(node).measured = Some((width, height));
    }

    /// Measured size of `node`: the host measurement when present, otherwise
    /// resolved from inline pixel/percentage styles, otherwise zero.
    pub fn measured_size(&self, node: NodeId) -> (f64, f64) {
        if let Some(size) = self.el(node).measured {
            return size;
        }
        if node == self.body {
            return self.viewport;
        }
        let parent = || self.el(node).parent.map(|p| self.measured_size(p)).unwrap_or((0.0, 0.0));
        let resolve = |property: &str, parent_len: &dyn Fn() -> f64| {
            match self.style(node, property).and_then(Dimension::from_css) {
                Some(Dimension::Px(v)) if v.is_finite() => v.max(0.0),
                Some(Dimension::Percent(p)) if p.is_finite() => (parent_len() * p / 100.0).max(0.0),
                _ => 0.0,
            }
        };
        (resolve("width", &|| parent().0), resolve("height", &|| parent().1))
    }

    /// Attached and neither the node nor an ancestor has `display: none`
    pub fn is_displayed(&self, node: NodeId) -> bool {
        if !self.is_attached(node) {
            return false;
        }
        let mut current = Some(node);
        while let Some(n) = current {
            if self.style(n, "display") == Some("none") {
                return false;
            }
            current = self.el(n).parent;
        }
        true
    }

    // Focus

    pub fn active_element(&self) -> Option<NodeId> {
        self.active
    }

    pub fn focus(&mut self, node: NodeId) {
        self.active = Some(node);
    }

    pub fn blur(&mut self) {
        self.active = None;
    }

    // Player back-reference

    pub fn node_player(&self, node: NodeId) -> Option<PlayerId> {
        self.el(node).player
    }

    pub fn set_node_player(&mut self, node: NodeId, player: Option<PlayerId>) {
        self.el_mut(node).player = player;
    }

    // Listeners

    pub fn add_listener(&mut self, target: EventTarget, kind: DomEventKind, owner: PlayerId) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push(Listener { id, target, kind, owner });
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        before != self.listeners.len()
    }

    /// Remove every listener owned by `owner`, returning how many were removed
    pub fn remove_listeners_for(&mut self, owner: PlayerId) -> usize {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.owner != owner);
        before - self.listeners.len()
    }

    pub fn listener_count(&self, owner: PlayerId) -> usize {
        self.listeners.iter().filter(|l| l.owner == owner).count()
    }

    /// Listeners reached by `event`, in delivery order
    pub fn dispatch(&self, event: &DomEvent) -> Vec<(PlayerId, ListenerId)> {
        let matching = |target: EventTarget| {
            self.listeners
                .iter()
                .filter(move |l| l.target == target && l.kind == event.kind)
                .map(|l| (l.owner, l.id))
        };

        match event.target {
            EventTarget::Window => matching(EventTarget::Window).collect(),
            EventTarget::Document => matching(EventTarget::Document).collect(),
            // target, then its ancestors, then the document
            EventTarget::Node(node) => {
                let mut out: Vec<_> = matching(EventTarget::Node(node)).collect();
                if event.kind.bubbles() {
                    let mut current = self.el(node).parent;
                    while let Some(n) = current {
                        out.extend(matching(EventTarget::Node(n)));
                        current = self.el(n).parent;
                    }
                }
                if self.is_attached(node) {
                    out.extend(matching(EventTarget::Document));
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_insert_and_detach() {
        let mut doc = Document::new();
        let body = doc.body();
        let a = doc.create_child(body, "div", "a");
        let b = doc.create_element("div");
        doc.insert_before(b, a).unwrap();
        assert_eq!(doc.children(body), &[b, a]);

        doc.detach(a);
        assert!(!doc.is_attached(a));
        assert!(doc.insert_before(b, a).is_err());
    }

    #[test]
    fn test_classes_and_lookup() {
        let mut doc = Document::new();
        let body = doc.body();
        let outer = doc.create_child(body, "div", "outer box");
        let inner = doc.create_child(outer, "span", "inner");
        doc.set_attr(inner, "id", "x");

        assert!(doc.has_class(outer, "box"));
        assert_eq!(doc.find_by_class(body, "inner"), Some(inner));
        assert_eq!(doc.element_by_id("x"), Some(inner));
        assert_eq!(doc.closest(inner, |d, n| d.has_class(n, "outer")), Some(outer));

        doc.remove_class(outer, "box");
        assert_eq!(doc.class_name(outer), "outer");
    }

    #[test]
    fn test_measured_size_from_styles() {
        let mut doc = Document::new();
        let body = doc.body();
        let parent = doc.create_child(body, "div", "");
        doc.set_measured_size(parent, 800.0, 600.0);
        let child = doc.create_child(parent, "div", "");
        doc.set_style(child, "width", "50%");
        doc.set_style(child, "height", "120px");
        assert_eq!(doc.measured_size(child), (400.0, 120.0));
    }

    #[test]
    fn test_dispatch_order() {
        let mut doc = Document::new();
        let body = doc.body();
        let outer = doc.create_child(body, "div", "");
        let inner = doc.create_child(outer, "div", "");
        let p = PlayerId(0);

        let on_outer = doc.add_listener(EventTarget::Node(outer), DomEventKind::Click, p);
        let on_inner = doc.add_listener(EventTarget::Node(inner), DomEventKind::Click, p);
        let on_doc = doc.add_listener(EventTarget::Document, DomEventKind::Click, p);
        let _focus = doc.add_listener(EventTarget::Node(outer), DomEventKind::Focus, p);

        let routes: Vec<_> = doc.dispatch(&DomEvent::click(inner)).into_iter().map(|(_, l)| l).collect();
        assert_eq!(routes, vec![on_inner, on_outer, on_doc]);

        // focus doesn't bubble
        assert!(doc.dispatch(&DomEvent::focus(inner, None)).is_empty());

        assert_eq!(doc.remove_listeners_for(p), 4);
        assert!(doc.dispatch(&DomEvent::click(inner)).is_empty());
    }

    #[test]
    fn test_clone_node_is_detached_copy() {
        let mut doc = Document::new();
        let body = doc.body();
        let video = doc.create_child(body, "video", "skin");
        doc.set_attr(video, "id", "v1");
        doc.set_node_player(video, Some(PlayerId(1)));
        let source = doc.create_child(video, "source", "");
        doc.set_attr(source, "src", "a.mp4");

        let copy = doc.clone_node(video, true);
        assert!(!doc.is_attached(copy));
        assert_eq!(doc.attr(copy, "id"), Some("v1"));
        assert_eq!(doc.children(copy).len(), 1);
        assert_eq!(doc.node_player(copy), None);
    }

    #[test]
    fn test_document_order() {
        let mut doc = Document::new();
        let body = doc.body();
        let a = doc.create_child(body, "div", "");
        let b = doc.create_child(body, "div", "");
        assert!(doc.is_node_after(b, a));
        assert!(!doc.is_node_after(a, b));
    }
}
