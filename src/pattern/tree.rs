// Pattern tree arena
// Nodes live in a flat arena and refer to each other by PatternId. Every node
// owns its children; the parent link is a plain back-reference.

use super::meta::{Meta, MetaFlags};
use super::node::{FieldKind, PatternKind, PatternNode};
use super::{PatternError, Result};
use crate::bitwise::{Address, Size};
use std::fmt;
use std::ops::Index;
use thiserror::Error;

/// Stable handle of a node inside a [`PatternTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PatternId(usize);

impl PatternId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyReason {
    #[error("document has no codeplug")]
    MissingRoot,

    #[error("has no children")]
    NoChildren,

    #[error("repeat has no repeated pattern")]
    MissingChild,

    #[error("has no address")]
    MissingAddress,

    #[error("has zero size")]
    ZeroSize,

    #[error("children are not ordered by address")]
    Unordered,

    #[error("overlaps the preceding pattern ending at {0}")]
    Overlap(Address),

    #[error("is not placed at {expected}")]
    Misplaced { expected: Address },

    #[error("repeat count is zero")]
    ZeroCount,

    #[error("minimum repetition {min} exceeds maximum {max}")]
    InvalidRepetition { min: u64, max: u64 },

    #[error("step {step} is smaller than the repeated pattern size {size}")]
    StepTooSmall { step: Size, size: Size },

    #[error("is wider than 64 bits")]
    TooWide,

    #[error("minimum {min} exceeds maximum {max}")]
    InvalidBounds { min: i64, max: i64 },

    #[error("default value {0} is out of bounds")]
    DefaultOutOfBounds(i64),

    #[error("width is not a whole number of BCD digits")]
    PartialDigit,

    #[error("enum has no items")]
    NoItems,

    #[error("item value {0} does not fit the field width")]
    ItemOutOfRange(u64),

    #[error("content has {actual} bytes, field needs {expected}")]
    ContentMismatch { expected: u64, actual: usize },
}

/// A failed verification: which pattern and why
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{pattern}: {reason}")]
pub struct VerifyError {
    pub pattern: String,
    pub reason: VerifyReason,
}

#[derive(Debug, Clone, Default)]
pub struct PatternTree {
    nodes: Vec<Option<PatternNode>>,
    root: Option<PatternId>,
}

impl Index<PatternId> for PatternTree {
    type Output = PatternNode;

    fn index(&self, id: PatternId) -> &PatternNode {
        match self.nodes.get(id.0) {
            Some(Some(node)) => node,
            _ => panic!("pattern {} does not exist", id),
        }
    }
}

impl PatternTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tree holding an empty codeplug root
    pub fn with_codeplug(meta: Meta) -> Self {
        let mut tree = Self::new();
        let root = tree.create(PatternKind::Codeplug);
        if let Some(Some(node)) = tree.nodes.get_mut(root.0) {
            node.meta = meta;
        }
        tree.root = Some(root);
        tree
    }

    pub fn root(&self) -> Option<PatternId> {
        self.root
    }

    /// Make a detached codeplug the document root
    pub fn set_root(&mut self, id: PatternId) -> Result<()> {
        let node = self.node(id)?;
        if node.kind != PatternKind::Codeplug {
            return Err(PatternError::NotAContainer(self.describe(id)));
        }
        if node.parent.is_some() {
            return Err(PatternError::AlreadyAttached);
        }
        self.root = Some(id);
        Ok(())
    }

    /// Add a detached node to the arena
    pub fn create(&mut self, kind: PatternKind) -> PatternId {
        let id = PatternId(self.nodes.len());
        self.nodes.push(Some(PatternNode::new(kind)));
        id
    }

    pub fn create_with(&mut self, kind: PatternKind, meta: Meta, address: Option<Address>) -> PatternId {
        let id = self.create(kind);
        if let Some(Some(node)) = self.nodes.get_mut(id.0) {
            node.meta = meta;
            node.address = address;
        }
        id
    }

    pub fn get(&self, id: PatternId) -> Option<&PatternNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn contains(&self, id: PatternId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn node(&self, id: PatternId) -> Result<&PatternNode> {
        self.get(id).ok_or(PatternError::UnknownPattern(id))
    }

    fn node_mut(&mut self, id: PatternId) -> Result<&mut PatternNode> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(PatternError::UnknownPattern(id))
    }

    pub fn meta_mut(&mut self, id: PatternId) -> Result<&mut Meta> {
        Ok(&mut self.node_mut(id)?.meta)
    }

    /// Direct access for the builder; callers must relayout after changing widths
    pub(crate) fn kind_mut(&mut self, id: PatternId) -> Result<&mut PatternKind> {
        Ok(&mut self.node_mut(id)?.kind)
    }

    /// Replace the kind of a node, keeping its children and relayouting its siblings
    pub fn set_kind(&mut self, id: PatternId, kind: PatternKind) -> Result<()> {
        let node = self.node(id)?;
        if !kind.can_have_children() && !node.children.is_empty() {
            return Err(PatternError::NotAContainer(kind.tag().to_string()));
        }
        if let Some(parent) = node.parent {
            if !kind.is_fixed() && !matches!(self[parent].kind, PatternKind::Codeplug) {
                return Err(PatternError::NotFixed(self.describe(parent)));
            }
        }
        self.node_mut(id)?.kind = kind;
        self.propagate_resize(id);
        Ok(())
    }

    /// Set the address of a detached pattern or a codeplug child.
    /// Addresses inside elements and repeats follow from the layout.
    pub fn set_address(&mut self, id: PatternId, address: Address) -> Result<()> {
        let parent = self.node(id)?.parent;
        match parent {
            None => {
                self.node_mut(id)?.address = Some(address);
            }
            Some(parent) if self[parent].kind == PatternKind::Codeplug => {
                self.node_mut(id)?.address = Some(address);
                let mut children = std::mem::take(&mut self.node_mut(parent)?.children);
                children.sort_by_key(|child| self[*child].address);
                self.node_mut(parent)?.children = children;
            }
            Some(_) => return Err(PatternError::ManagedAddress(self.describe(id))),
        }
        Ok(())
    }

    pub fn parent(&self, id: PatternId) -> Option<PatternId> {
        self.get(id).and_then(|node| node.parent)
    }

    pub fn children(&self, id: PatternId) -> &[PatternId] {
        self.get(id).map(|node| node.children.as_slice()).unwrap_or(&[])
    }

    pub fn child_count(&self, id: PatternId) -> usize {
        self.children(id).len()
    }

    pub fn child(&self, id: PatternId, index: usize) -> Option<PatternId> {
        self.children(id).get(index).copied()
    }

    pub fn index_of(&self, parent: PatternId, child: PatternId) -> Option<usize> {
        self.children(parent).iter().position(|c| *c == child)
    }

    /// Closest element containing the given pattern
    pub fn find_enclosing_element(&self, id: PatternId) -> Option<PatternId> {
        let mut current = self.parent(id);
        while let Some(candidate) = current {
            if self[candidate].kind == PatternKind::Element {
                return Some(candidate);
            }
            current = self.parent(candidate);
        }
        None
    }

    /// Pre-order list of a subtree, starting with `id`
    pub fn descendants(&self, id: PatternId) -> Vec<PatternId> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !self.contains(current) {
                continue;
            }
            result.push(current);
            stack.extend(self.children(current).iter().rev());
        }
        result
    }

    /// Most severe review flag within a subtree
    pub fn combined_flags(&self, id: PatternId) -> MetaFlags {
        self.descendants(id)
            .into_iter()
            .map(|node| self[node].meta.flags)
            .max()
            .unwrap_or_default()
    }

    /// Size of a fixed pattern; `None` for codeplugs, variable repeats and
    /// sizes beyond the address space
    pub fn size(&self, id: PatternId) -> Option<Size> {
        self.checked_size(id).ok().flatten()
    }

    /// Distance between successive repetitions
    pub fn stride(&self, id: PatternId) -> Option<Size> {
        self.checked_stride(id).ok().flatten()
    }

    /// Space a pattern may occupy: its size, or the largest extent of a bounded repeat
    pub fn extent(&self, id: PatternId) -> Option<Size> {
        self.checked_extent(id).ok().flatten()
    }

    fn overflow(&self, id: PatternId) -> PatternError {
        PatternError::Overflow(self.describe(id))
    }

    fn checked_size(&self, id: PatternId) -> Result<Option<Size>> {
        let Some(node) = self.get(id) else {
            return Ok(None);
        };
        match &node.kind {
            PatternKind::Field(field) => Ok(Some(field.width())),
            PatternKind::Element => {
                let mut total = Size::zero();
                for child in &node.children {
                    let Some(size) = self.checked_size(*child)? else {
                        return Ok(None);
                    };
                    total = total.checked_add(size).ok_or_else(|| self.overflow(id))?;
                }
                Ok(Some(total))
            }
            PatternKind::FixedRepeat(spec) => match self.checked_stride(id)? {
                Some(stride) => stride
                    .checked_mul(spec.count)
                    .map(Some)
                    .ok_or_else(|| self.overflow(id)),
                None => Ok(None),
            },
            PatternKind::Codeplug | PatternKind::Repeat(_) => Ok(None),
        }
    }

    fn checked_stride(&self, id: PatternId) -> Result<Option<Size>> {
        let Some(node) = self.get(id) else {
            return Ok(None);
        };
        let step = match &node.kind {
            PatternKind::Repeat(spec) => spec.step,
            PatternKind::FixedRepeat(spec) => spec.step,
            _ => return Ok(None),
        };
        match (step, node.children.first()) {
            (Some(step), _) => Ok(Some(step)),
            (None, Some(child)) => self.checked_size(*child),
            (None, None) => Ok(None),
        }
    }

    fn checked_extent(&self, id: PatternId) -> Result<Option<Size>> {
        match self.get(id).map(|node| &node.kind) {
            Some(PatternKind::Repeat(spec)) => match (self.checked_stride(id)?, spec.max) {
                (Some(stride), Some(max)) => stride
                    .checked_mul(max)
                    .map(Some)
                    .ok_or_else(|| self.overflow(id)),
                _ => Ok(None),
            },
            _ => self.checked_size(id),
        }
    }

    /// Fails if the extent of `id`, or its end address, lies beyond the address space
    pub fn check_layout(&self, id: PatternId) -> Result<()> {
        let extent = self.checked_extent(id)?;
        if let (Some(address), Some(extent)) = (self.absolute_address(id), extent) {
            address.checked_add(extent).ok_or_else(|| self.overflow(id))?;
        }
        Ok(())
    }

    /// Address resolved through all parents.
    /// Children of repeats resolve to their first repetition.
    pub fn absolute_address(&self, id: PatternId) -> Option<Address> {
        let node = self.get(id)?;
        let local = node.address?;
        match node.parent {
            None => Some(local),
            Some(parent) if self[parent].kind == PatternKind::Codeplug => Some(local),
            Some(parent) => self
                .absolute_address(parent)?
                .checked_add(Size::from_bits(local.bits())),
        }
    }

    /// Short human readable identification used in messages
    pub fn describe(&self, id: PatternId) -> String {
        let Some(node) = self.get(id) else {
            return format!("pattern {}", id);
        };
        let mut text = node.kind.tag().to_string();
        if node.meta.has_name() {
            text.push_str(&format!(" '{}'", node.meta.name));
        }
        if let Some(address) = self.absolute_address(id) {
            text.push_str(&format!(" at {}", address));
        }
        text
    }

    fn is_ancestor(&self, ancestor: PatternId, id: PatternId) -> bool {
        let mut current = Some(id);
        while let Some(candidate) = current {
            if candidate == ancestor {
                return true;
            }
            current = self.parent(candidate);
        }
        false
    }

    fn check_attach(&self, parent: PatternId, child: PatternId) -> Result<()> {
        let parent_node = self.node(parent)?;
        let child_node = self.node(child)?;
        if child_node.parent.is_some() || self.root == Some(child) {
            return Err(PatternError::AlreadyAttached);
        }
        if self.is_ancestor(child, parent) {
            return Err(PatternError::Cycle);
        }
        match &parent_node.kind {
            PatternKind::Field(_) => Err(PatternError::NotAContainer(self.describe(parent))),
            PatternKind::Codeplug => match child_node.kind {
                PatternKind::Codeplug => Err(PatternError::NestedCodeplug),
                _ => Ok(()),
            },
            PatternKind::Element if !child_node.kind.is_fixed() => {
                Err(PatternError::NotFixed(self.describe(parent)))
            }
            PatternKind::Element => Ok(()),
            PatternKind::Repeat(_) | PatternKind::FixedRepeat(_) => {
                if !parent_node.children.is_empty() {
                    Err(PatternError::RepeatOccupied)
                } else if !child_node.kind.is_fixed() {
                    Err(PatternError::NotFixed(self.describe(parent)))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Where the child at `index` of a layout-managed parent has to start
    fn expected_address(&self, parent: PatternId, index: usize) -> Address {
        if index == 0 {
            return Address::zero();
        }
        let previous = self.children(parent)[index - 1];
        let start = self[previous].address.unwrap_or_default();
        start.saturating_add(self.size(previous).unwrap_or_default())
    }

    /// End of the last codeplug child, if that child has a fixed size
    fn codeplug_append_address(&self, codeplug: PatternId) -> Option<Address> {
        let last = *self.children(codeplug).last()?;
        self[last].address?.checked_add(self.size(last)?)
    }

    /// Attach `child` as the last child of `parent`.
    ///
    /// Codeplug children keep absolute addresses and are kept in address
    /// order; a child without address is placed right after the previous one.
    /// Element and repeat children are laid out by their parent.
    pub fn append_child(&mut self, parent: PatternId, child: PatternId) -> Result<()> {
        self.check_attach(parent, child)?;

        if self[parent].kind == PatternKind::Codeplug {
            let address = match self[child].address {
                Some(address) => address,
                None => self
                    .codeplug_append_address(parent)
                    .ok_or_else(|| PatternError::MissingAddress(self.describe(child)))?,
            };
            let position = self
                .children(parent)
                .partition_point(|c| self[*c].address.is_some_and(|a| a <= address));
            let child_node = self.node_mut(child)?;
            child_node.address = Some(address);
            child_node.parent = Some(parent);
            self.node_mut(parent)?.children.insert(position, child);
            return Ok(());
        }

        let index = self.child_count(parent);
        let expected = self.expected_address(parent, index);
        if let Some(found) = self[child].address {
            if found != expected {
                return Err(PatternError::Misplaced { found, expected });
            }
        }
        let child_node = self.node_mut(child)?;
        child_node.address = Some(expected);
        child_node.parent = Some(parent);
        self.node_mut(parent)?.children.push(child);
        self.propagate_resize(parent);
        Ok(())
    }

    /// Attach `child` at position `index`, shifting the following children
    pub fn insert_child(&mut self, parent: PatternId, index: usize, child: PatternId) -> Result<()> {
        let count = self.child_count(parent);
        if index > count {
            return Err(PatternError::IndexOutOfRange { index, count });
        }
        self.check_attach(parent, child)?;

        if self[parent].kind == PatternKind::Codeplug {
            if self[child].address.is_none() {
                let address = match index {
                    0 => None,
                    _ => {
                        let previous = self.children(parent)[index - 1];
                        self[previous]
                            .address
                            .zip(self.size(previous))
                            .and_then(|(address, size)| address.checked_add(size))
                    }
                }
                .ok_or_else(|| PatternError::MissingAddress(self.describe(child)))?;
                self.node_mut(child)?.address = Some(address);
            }
            self.node_mut(child)?.parent = Some(parent);
            self.node_mut(parent)?.children.insert(index, child);
            return Ok(());
        }

        let expected = self.expected_address(parent, index);
        if let Some(found) = self[child].address {
            if found != expected {
                return Err(PatternError::Misplaced { found, expected });
            }
        }
        self.node_mut(child)?.parent = Some(parent);
        self.node_mut(parent)?.children.insert(index, child);
        self.relayout(parent, index);
        self.propagate_resize(parent);
        Ok(())
    }

    /// Detach the child at `index` without destroying it, so it can be re-parented
    pub fn take_child(&mut self, parent: PatternId, index: usize) -> Result<PatternId> {
        let count = self.child_count(parent);
        if index >= count {
            return Err(PatternError::IndexOutOfRange { index, count });
        }
        let child = self.node_mut(parent)?.children.remove(index);
        let managed = self[parent].kind != PatternKind::Codeplug;
        let child_node = self.node_mut(child)?;
        child_node.parent = None;
        if managed {
            child_node.address = None;
            self.relayout(parent, index);
            self.propagate_resize(parent);
        }
        Ok(child)
    }

    /// Remove the child at `index` and destroy its whole subtree
    pub fn delete_child(&mut self, parent: PatternId, index: usize) -> Result<()> {
        let child = self.take_child(parent, index)?;
        self.destroy(child);
        Ok(())
    }

    /// Destroy a detached subtree
    pub fn destroy(&mut self, id: PatternId) {
        if self.parent(id).is_some() {
            tracing::warn!("Refusing to destroy attached pattern {}", self.describe(id));
            return;
        }
        for node in self.descendants(id) {
            if let Some(slot) = self.nodes.get_mut(node.0) {
                *slot = None;
            }
        }
        if self.root == Some(id) {
            self.root = None;
        }
    }

    fn relayout(&mut self, parent: PatternId, from: usize) {
        if self.get(parent).map(|node| &node.kind) != Some(&PatternKind::Element) {
            return;
        }
        for index in from..self.child_count(parent) {
            let address = self.expected_address(parent, index);
            let child = self.children(parent)[index];
            if let Some(Some(node)) = self.nodes.get_mut(child.0) {
                node.address = Some(address);
            }
        }
    }

    /// The size of `id` changed; move the siblings that follow it in every enclosing element
    fn propagate_resize(&mut self, id: PatternId) {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            match self[parent].kind {
                PatternKind::Element => {
                    if let Some(index) = self.index_of(parent, current) {
                        self.relayout(parent, index + 1);
                    }
                }
                PatternKind::Repeat(_) | PatternKind::FixedRepeat(_) => {}
                PatternKind::Codeplug | PatternKind::Field(_) => break,
            }
            current = parent;
        }
    }

    /// True when `[address, address+len)` lies inside the extent of the codeplug children
    pub fn covers(&self, address: u32, len: usize) -> bool {
        let Some(root) = self.root else {
            return false;
        };
        let mut ranges: Vec<(u64, u64)> = self
            .children(root)
            .iter()
            .filter_map(|child| {
                let start = self.absolute_address(*child)?.bits();
                Some((start, start.saturating_add(self.extent(*child)?.bits())))
            })
            .collect();
        ranges.sort_unstable();

        let start = address as u64 * 8;
        let end = start + len as u64 * 8;
        let mut merged: Option<(u64, u64)> = None;
        for (range_start, range_end) in ranges {
            merged = match merged {
                Some((s, e)) if range_start <= e => Some((s, e.max(range_end))),
                Some((s, e)) => {
                    if s <= start && end <= e {
                        return true;
                    }
                    Some((range_start, range_end))
                }
                None => Some((range_start, range_end)),
            };
        }
        matches!(merged, Some((s, e)) if s <= start && end <= e)
    }

    /// Verify the whole document
    pub fn verify_root(&self) -> std::result::Result<(), VerifyError> {
        match self.root {
            Some(root) => self.verify(root),
            None => Err(VerifyError {
                pattern: "document".to_string(),
                reason: VerifyReason::MissingRoot,
            }),
        }
    }

    /// Structural verification of a subtree, reporting the first problem found
    pub fn verify(&self, id: PatternId) -> std::result::Result<(), VerifyError> {
        let fail = |reason: VerifyReason| VerifyError {
            pattern: self.describe(id),
            reason,
        };
        let Some(node) = self.get(id) else {
            return Err(VerifyError {
                pattern: format!("pattern {}", id),
                reason: VerifyReason::MissingChild,
            });
        };

        match &node.kind {
            PatternKind::Codeplug => {
                if node.children.is_empty() {
                    return Err(fail(VerifyReason::NoChildren));
                }
                let mut previous: Option<(Address, Option<Size>)> = None;
                for child in &node.children {
                    let Some(address) = self[*child].address else {
                        return Err(VerifyError {
                            pattern: self.describe(*child),
                            reason: VerifyReason::MissingAddress,
                        });
                    };
                    if let Some((prev_address, prev_extent)) = previous {
                        if address < prev_address {
                            return Err(fail(VerifyReason::Unordered));
                        }
                        if let Some(extent) = prev_extent {
                            let prev_end = prev_address.saturating_add(extent);
                            if address < prev_end {
                                return Err(VerifyError {
                                    pattern: self.describe(*child),
                                    reason: VerifyReason::Overlap(prev_end),
                                });
                            }
                        }
                    }
                    self.verify(*child)?;
                    previous = Some((address, self.extent(*child)));
                }
            }
            PatternKind::Element => {
                if node.children.is_empty() {
                    return Err(fail(VerifyReason::NoChildren));
                }
                for (index, child) in node.children.iter().enumerate() {
                    let expected = self.expected_address(id, index);
                    if self[*child].address != Some(expected) {
                        return Err(VerifyError {
                            pattern: self.describe(*child),
                            reason: VerifyReason::Misplaced { expected },
                        });
                    }
                    self.verify(*child)?;
                }
            }
            PatternKind::Repeat(spec) => {
                let child = *node
                    .children
                    .first()
                    .ok_or_else(|| fail(VerifyReason::MissingChild))?;
                if let (Some(min), Some(max)) = (spec.min, spec.max) {
                    if min > max {
                        return Err(fail(VerifyReason::InvalidRepetition { min, max }));
                    }
                }
                self.verify(child)?;
                self.verify_step(id, spec.step, child)?;
            }
            PatternKind::FixedRepeat(spec) => {
                let child = *node
                    .children
                    .first()
                    .ok_or_else(|| fail(VerifyReason::MissingChild))?;
                if spec.count == 0 {
                    return Err(fail(VerifyReason::ZeroCount));
                }
                self.verify(child)?;
                self.verify_step(id, spec.step, child)?;
            }
            PatternKind::Field(field) => verify_field(field).map_err(fail)?,
        }
        Ok(())
    }

    fn verify_step(
        &self,
        id: PatternId,
        step: Option<Size>,
        child: PatternId,
    ) -> std::result::Result<(), VerifyError> {
        if let (Some(step), Some(size)) = (step, self.size(child)) {
            if step < size {
                return Err(VerifyError {
                    pattern: self.describe(id),
                    reason: VerifyReason::StepTooSmall { step, size },
                });
            }
        }
        Ok(())
    }
}

fn verify_field(field: &FieldKind) -> std::result::Result<(), VerifyReason> {
    if field.width().is_zero() {
        return Err(VerifyReason::ZeroSize);
    }
    match field {
        FieldKind::Integer(int) => {
            if int.width.bits() > 64 {
                return Err(VerifyReason::TooWide);
            }
            if let (Some(min), Some(max)) = (int.min, int.max) {
                if min > max {
                    return Err(VerifyReason::InvalidBounds { min, max });
                }
            }
            if let Some(default) = int.default {
                let below = int.min.is_some_and(|min| default < min);
                let above = int.max.is_some_and(|max| default > max);
                if below || above {
                    return Err(VerifyReason::DefaultOutOfBounds(default));
                }
            }
        }
        FieldKind::Bcd(bcd) => {
            if bcd.width.bits() % 4 != 0 {
                return Err(VerifyReason::PartialDigit);
            }
        }
        FieldKind::Enum(field) => {
            if field.items.is_empty() {
                return Err(VerifyReason::NoItems);
            }
            let bits = field.width.bits();
            if let Some(item) = field
                .items
                .iter()
                .find(|item| bits < 64 && item.value >> bits != 0)
            {
                return Err(VerifyReason::ItemOutOfRange(item.value));
            }
        }
        FieldKind::Unused {
            width,
            content: Some(content),
        } => {
            if width.whole_bytes() != Some(content.len() as u64) {
                return Err(VerifyReason::ContentMismatch {
                    expected: width.bytes_ceil(),
                    actual: content.len(),
                });
            }
        }
        FieldKind::String(_) | FieldKind::Unknown { .. } | FieldKind::Unused { .. } => {}
    }
    Ok(())
}
