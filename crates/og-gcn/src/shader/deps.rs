//! Value provenance graph
//!
//! Records where the bits behind a resource descriptor come from so they
//! can be re-read from guest state after translation. Nodes are shared
//! through `Arc`: cloning a handle retains a node and dropping it releases
//! it. A memory-indirect node holds its base and offset children, which
//! stay alive as long as any parent or outside handle still refers to them.

use og_core::error::{GcnError, Result};
use std::sync::Arc;

/// Live guest state consulted when evaluating provenance
pub trait GuestState {
    /// Current value of scalar register `index`
    fn sgpr(&self, index: u32) -> u32;

    /// Read `size` bytes of guest memory at a GPU virtual address
    fn resolve_indirect_read(&self, address: u64, size: usize) -> Option<Vec<u8>>;
}

/// Provenance kind
#[derive(Debug, Clone, PartialEq)]
pub enum DependencyKind {
    Immediate(u64),
    ScalarRegister(u32),
    MemoryIndirect {
        base: Arc<DependencyNode>,
        offset: Arc<DependencyNode>,
    },
}

/// One provenance record
#[derive(Debug, PartialEq)]
pub struct DependencyNode {
    /// Creation index within its graph
    pub id: u32,
    pub kind: DependencyKind,
}

impl DependencyNode {
    /// Read `size` raw bytes described by this node
    pub fn read_bytes(&self, guest: &dyn GuestState, size: usize) -> Result<Vec<u8>> {
        match &self.kind {
            DependencyKind::Immediate(value) => {
                if size > 8 {
                    return Err(GcnError::UnresolvedDependency(format!(
                        "immediate node {} cannot supply {} bytes",
                        self.id, size
                    )));
                }
                Ok(value.to_le_bytes()[..size].to_vec())
            }
            DependencyKind::ScalarRegister(index) => {
                let regs = size.div_ceil(4) as u32;
                let mut bytes: Vec<u8> = (0..regs)
                    .flat_map(|i| guest.sgpr(index + i).to_le_bytes())
                    .collect();
                bytes.truncate(size);
                Ok(bytes)
            }
            DependencyKind::MemoryIndirect { base, offset } => {
                let address = base
                    .evaluate(guest, 8)?
                    .wrapping_add(offset.evaluate(guest, 4)?);
                let bytes = guest.resolve_indirect_read(address, size).ok_or_else(|| {
                    GcnError::UnresolvedDependency(format!(
                        "read of {} bytes at 0x{:x} (node {})",
                        size, address, self.id
                    ))
                })?;
                if bytes.len() < size {
                    return Err(GcnError::UnresolvedDependency(format!(
                        "short read at 0x{:x}: {} of {} bytes",
                        address,
                        bytes.len(),
                        size
                    )));
                }
                Ok(bytes)
            }
        }
    }

    /// Resolve the node to an integer of at most 8 bytes
    pub fn evaluate(&self, guest: &dyn GuestState, size: usize) -> Result<u64> {
        let size = size.min(8);
        let bytes = self.read_bytes(guest, size)?;
        let mut raw = [0u8; 8];
        raw[..size].copy_from_slice(&bytes[..size]);
        Ok(u64::from_le_bytes(raw))
    }
}

/// Append-only arena of provenance nodes for one analysis pass
#[derive(Debug, Default, PartialEq)]
pub struct DependencyGraph {
    nodes: Vec<Arc<DependencyNode>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, kind: DependencyKind) -> Arc<DependencyNode> {
        let node = Arc::new(DependencyNode {
            id: self.nodes.len() as u32,
            kind,
        });
        self.nodes.push(Arc::clone(&node));
        node
    }

    pub fn immediate(&mut self, value: u64) -> Arc<DependencyNode> {
        self.push(DependencyKind::Immediate(value))
    }

    pub fn scalar_register(&mut self, index: u32) -> Arc<DependencyNode> {
        self.push(DependencyKind::ScalarRegister(index))
    }

    /// Both children gain a reference held by the new node
    pub fn memory_indirect(
        &mut self,
        base: &Arc<DependencyNode>,
        offset: &Arc<DependencyNode>,
    ) -> Arc<DependencyNode> {
        self.push(DependencyKind::MemoryIndirect {
            base: Arc::clone(base),
            offset: Arc::clone(offset),
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&Arc<DependencyNode>> {
        self.nodes.get(id as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<DependencyNode>> {
        self.nodes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Guest {
        sgprs: Vec<u32>,
        memory: HashMap<u64, Vec<u8>>,
    }

    impl GuestState for Guest {
        fn sgpr(&self, index: u32) -> u32 {
            self.sgprs.get(index as usize).copied().unwrap_or(0)
        }

        fn resolve_indirect_read(&self, address: u64, size: usize) -> Option<Vec<u8>> {
            self.memory.get(&address).map(|b| b[..size.min(b.len())].to_vec())
        }
    }

    #[test]
    fn test_memory_indirect_retains_children() {
        let mut graph = DependencyGraph::new();
        let base = graph.scalar_register(0);
        let offset = graph.immediate(0x10);
        assert_eq!(Arc::strong_count(&base), 2);

        let node = graph.memory_indirect(&base, &offset);
        assert_eq!(Arc::strong_count(&base), 3);
        assert_eq!(Arc::strong_count(&offset), 3);
        assert_eq!(node.id, 2);

        drop(node);
        drop(graph);
        // only our handles remain once the arena and the parent are gone
        assert_eq!(Arc::strong_count(&base), 1);
        assert_eq!(Arc::strong_count(&offset), 1);
    }

    #[test]
    fn test_children_outlive_released_parent_while_shared() {
        let mut graph = DependencyGraph::new();
        let base = graph.scalar_register(2);
        let offset = graph.immediate(0);
        let parent = graph.memory_indirect(&base, &offset);
        let weak_base = Arc::downgrade(&base);
        drop(base);
        drop(offset);
        drop(graph);

        assert!(weak_base.upgrade().is_some());
        drop(parent);
        assert!(weak_base.upgrade().is_none());
    }

    #[test]
    fn test_evaluate_register_pair_and_memory() {
        let mut memory = HashMap::new();
        memory.insert(0x1_0000_0020u64, vec![0xEF, 0xBE, 0xAD, 0xDE]);
        let guest = Guest {
            sgprs: vec![0x0000_0000, 0x0000_0001],
            memory,
        };

        let mut graph = DependencyGraph::new();
        let base = graph.scalar_register(0);
        assert_eq!(base.evaluate(&guest, 8).unwrap(), 0x1_0000_0000);

        let offset = graph.immediate(0x20);
        let node = graph.memory_indirect(&base, &offset);
        assert_eq!(node.evaluate(&guest, 4).unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn test_unresolved_read() {
        let guest = Guest {
            sgprs: vec![0; 4],
            memory: HashMap::new(),
        };
        let mut graph = DependencyGraph::new();
        let base = graph.scalar_register(0);
        let offset = graph.immediate(0);
        let node = graph.memory_indirect(&base, &offset);
        assert!(matches!(
            node.read_bytes(&guest, 16),
            Err(GcnError::UnresolvedDependency(_))
        ));
        assert!(graph.immediate(1).read_bytes(&guest, 16).is_err());
    }
}
