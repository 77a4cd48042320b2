//! The file's object tree.
//!
//! An HFA file is a tree of self-describing entries, each naming its type
//! in the embedded dictionary. Nodes materialize on first traversal and are
//! cached for the lifetime of the tree; sibling links that would loop back
//! onto an already-walked ancestor are truncated rather than followed.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek, SeekFrom};

use log::{debug, warn};

use super::cursor;
use super::dictionary::value::{self, FieldValues};
use super::dictionary::Dictionary;
use super::error::{HfaError, Result};
use super::Lazy;

/// Byte widths of the fixed name fields in an entry header.
const NAME_LEN: usize = 64;
const TYPE_NAME_LEN: usize = 32;

/// One node of the object tree, identified by its file position.
#[derive(Debug)]
pub struct EntryNode {
    pub file_pos: u64,
    pub name: String,
    pub type_name: String,
    pub data_offset: u64,
    pub data_size: u32,
    next_offset: u64,
    child_offset: u64,
    /// Non-owning back-references, used only for the ancestor-offset walk
    /// that detects sibling cycles.
    parent: Option<u64>,
    previous: Option<u64>,
    child: Lazy<Option<u64>>,
    next: Lazy<Option<u64>>,
    values: Lazy<FieldValues>,
}

/// Arena of materialized entries keyed by file offset.
#[derive(Debug)]
pub struct EntryTree {
    nodes: HashMap<u64, EntryNode>,
    root: u64,
}

impl EntryTree {
    /// Materialize the root entry at `root_offset`.
    pub fn read<R: Read + Seek>(cur: &mut R, root_offset: u64) -> Result<Self> {
        let mut tree = EntryTree {
            nodes: HashMap::new(),
            root: root_offset,
        };
        tree.materialize(cur, root_offset, None, None)?;
        Ok(tree)
    }

    pub fn root(&self) -> u64 {
        self.root
    }

    pub fn node(&self, offset: u64) -> Result<&EntryNode> {
        self.nodes
            .get(&offset)
            .ok_or_else(|| HfaError::InvalidFormat(format!("No entry at offset {}", offset)))
    }

    /// Read the fixed entry header at `pos` and cache the node.
    fn materialize<R: Read + Seek>(
        &mut self,
        cur: &mut R,
        pos: u64,
        parent: Option<u64>,
        previous: Option<u64>,
    ) -> Result<u64> {
        if self.nodes.contains_key(&pos) {
            return Ok(pos);
        }
        cur.seek(SeekFrom::Start(pos))?;
        let next_offset = cursor::read_u32(cur)? as u64;
        let _reserved0 = cursor::read_u32(cur)?;
        let _reserved1 = cursor::read_u32(cur)?;
        let child_offset = cursor::read_u32(cur)? as u64;
        let data_offset = cursor::read_u32(cur)? as u64;
        let data_size = cursor::read_u32(cur)?;
        let name = cursor::read_fixed_string(cur, NAME_LEN)?;
        let type_name = cursor::read_fixed_string(cur, TYPE_NAME_LEN)?;
        debug!("Entry at {}: {:?} ({})", pos, name, type_name);

        self.nodes.insert(
            pos,
            EntryNode {
                file_pos: pos,
                name,
                type_name,
                data_offset,
                data_size,
                next_offset,
                child_offset,
                parent,
                previous,
                child: Lazy::Unresolved,
                next: Lazy::Unresolved,
                values: Lazy::Unresolved,
            },
        );
        Ok(pos)
    }

    /// Lazily materialize the first child of the entry at `offset`.
    pub fn child<R: Read + Seek>(&mut self, cur: &mut R, offset: u64) -> Result<Option<u64>> {
        if let Lazy::Resolved(child) = self.node(offset)?.child {
            return Ok(child);
        }
        let target = self.node(offset)?.child_offset;
        let child = if target == 0 {
            None
        } else {
            Some(self.materialize(cur, target, Some(offset), None)?)
        };
        self.set_child(offset, child)?;
        Ok(child)
    }

    /// Lazily materialize the next sibling of the entry at `offset`.
    ///
    /// A sibling link whose target offset already appears among the walked
    /// ancestors would loop; it is treated as absent and the chain is
    /// truncated there.
    pub fn next<R: Read + Seek>(&mut self, cur: &mut R, offset: u64) -> Result<Option<u64>> {
        if let Lazy::Resolved(next) = self.node(offset)?.next {
            return Ok(next);
        }
        let target = self.node(offset)?.next_offset;
        let next = if target == 0 {
            None
        } else if self.is_ancestor(offset, target) {
            warn!(
                "Entry at {} has a cyclic sibling link to {}; truncating chain",
                offset, target
            );
            None
        } else {
            Some(self.materialize(cur, target, self.node(offset)?.parent, Some(offset))?)
        };
        self.set_next(offset, next)?;
        Ok(next)
    }

    /// Walk the previous/parent back-references from `offset`, checking
    /// whether `target` is already on the chain.
    fn is_ancestor(&self, offset: u64, target: u64) -> bool {
        let mut current = Some(offset);
        while let Some(pos) = current {
            if pos == target {
                return true;
            }
            current = self
                .nodes
                .get(&pos)
                .and_then(|n| n.previous.or(n.parent));
        }
        false
    }

    /// Linearly scan the child/sibling chain of `offset` for a child named
    /// `name`.
    ///
    /// The walk stops on any revisited offset. The ancestor check in
    /// [`EntryTree::next`] cannot see links resolved under a different
    /// parent, so the chain itself may still loop.
    pub fn named_child<R: Read + Seek>(
        &mut self,
        cur: &mut R,
        offset: u64,
        name: &str,
    ) -> Result<Option<u64>> {
        let mut seen = HashSet::new();
        let mut current = self.child(cur, offset)?;
        while let Some(pos) = current {
            if !seen.insert(pos) {
                warn!(
                    "Sibling chain under {} revisits entry {}; truncating walk",
                    offset, pos
                );
                return Ok(None);
            }
            if self.node(pos)?.name == name {
                return Ok(Some(pos));
            }
            current = self.next(cur, pos)?;
        }
        Ok(None)
    }

    /// Collect every child of `offset`, in sibling order. Stops on any
    /// revisited offset, like [`EntryTree::named_child`].
    pub fn children<R: Read + Seek>(&mut self, cur: &mut R, offset: u64) -> Result<Vec<u64>> {
        let mut seen = HashSet::new();
        let mut children = Vec::new();
        let mut current = self.child(cur, offset)?;
        while let Some(pos) = current {
            if !seen.insert(pos) {
                warn!(
                    "Sibling chain under {} revisits entry {}; truncating walk",
                    offset, pos
                );
                break;
            }
            children.push(pos);
            current = self.next(cur, pos)?;
        }
        Ok(children)
    }

    /// Lazily decode the entry's field values via its dictionary type.
    ///
    /// Decoding seeks to the entry's data blob, or to the header position
    /// itself when the entry carries no separate blob.
    pub fn field_values<R: Read + Seek>(
        &mut self,
        cur: &mut R,
        dict: &mut Dictionary,
        offset: u64,
    ) -> Result<&FieldValues> {
        let (resolved, seek_pos, type_name) = {
            let node = self.node(offset)?;
            let seek_pos = if node.data_offset != 0 {
                node.data_offset
            } else {
                node.file_pos
            };
            (
                matches!(node.values, Lazy::Resolved(_)),
                seek_pos,
                node.type_name.clone(),
            )
        };
        if !resolved {
            cur.seek(SeekFrom::Start(seek_pos))?;
            let values = value::decode_type(cur, dict, &type_name)?;
            if let Some(node) = self.nodes.get_mut(&offset) {
                node.values = Lazy::Resolved(values);
            }
        }
        match &self.node(offset)?.values {
            Lazy::Resolved(values) => Ok(values),
            Lazy::Unresolved => Err(HfaError::InvalidFormat(format!(
                "Field values for entry at {} did not resolve",
                offset
            ))),
        }
    }

    fn set_child(&mut self, offset: u64, child: Option<u64>) -> Result<()> {
        match self.nodes.get_mut(&offset) {
            Some(node) => {
                node.child = Lazy::Resolved(child);
                Ok(())
            }
            None => Err(HfaError::InvalidFormat(format!(
                "No entry at offset {}",
                offset
            ))),
        }
    }

    fn set_next(&mut self, offset: u64, next: Option<u64>) -> Result<()> {
        match self.nodes.get_mut(&offset) {
            Some(node) => {
                node.next = Lazy::Resolved(next);
                Ok(())
            }
            None => Err(HfaError::InvalidFormat(format!(
                "No entry at offset {}",
                offset
            ))),
        }
    }
}
