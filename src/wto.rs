//! Weak topological ordering (Bourdoncle, 1993).
//!
//! A WTO is a hierarchical ordering of the blocks of a CFG where every
//! cycle is a nested component with a distinguished *head*. Iterating in
//! this order visits each loop head after every block outside the loop that
//! feeds it, and only widening at heads is needed for termination.
//!
//! For example, the CFG of `i = 0; while (i < 10) i++; return` with blocks
//! `B0 -> B1 -> {B2, B3}`, `B2 -> B1` has the WTO `B0 (B1 B2) B3`.

use std::fmt;

use crate::cfg::Cfg;
use crate::types::BlockId;

/// Element of a weak topological ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WtoComponent {
    Vertex(BlockId),
    Cycle { head: BlockId, components: Vec<WtoComponent> },
}

impl WtoComponent {
    /// First block visited by this component.
    pub fn head(&self) -> BlockId {
        match self {
            WtoComponent::Vertex(v) => *v,
            WtoComponent::Cycle { head, .. } => *head,
        }
    }
}

impl fmt::Display for WtoComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WtoComponent::Vertex(v) => write!(f, "{}", v),
            WtoComponent::Cycle { head, components } => {
                write!(f, "({}", head)?;
                for c in components {
                    write!(f, " {}", c)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Weak topological ordering of the blocks reachable from the entry.
#[derive(Debug, Clone)]
pub struct Wto {
    components: Vec<WtoComponent>,
    /// Heads of the cycles enclosing each block, outermost first.
    nesting: Vec<Vec<BlockId>>,
}

const VISITED: u32 = u32::MAX;

struct Builder<'a> {
    cfg: &'a Cfg,
    dfn: Vec<u32>,
    stack: Vec<BlockId>,
    num: u32,
}

impl Builder<'_> {
    fn visit(&mut self, v: BlockId, partition: &mut Vec<WtoComponent>) -> u32 {
        self.stack.push(v);
        self.num += 1;
        self.dfn[v.0] = self.num;
        let mut head = self.num;
        let mut is_loop = false;
        for succ in self.cfg.successors(v) {
            let min = if self.dfn[succ.0] == 0 {
                self.visit(succ, partition)
            } else {
                self.dfn[succ.0]
            };
            if min <= head {
                head = min;
                is_loop = true;
            }
        }
        if head == self.dfn[v.0] {
            self.dfn[v.0] = VISITED;
            let mut element = self.stack.pop();
            if is_loop {
                while let Some(e) = element {
                    if e == v {
                        break;
                    }
                    self.dfn[e.0] = 0;
                    element = self.stack.pop();
                }
                partition.push(self.component(v));
            } else {
                partition.push(WtoComponent::Vertex(v));
            }
        }
        head
    }

    fn component(&mut self, head: BlockId) -> WtoComponent {
        let mut partition = Vec::new();
        for succ in self.cfg.successors(head) {
            if self.dfn[succ.0] == 0 {
                self.visit(succ, &mut partition);
            }
        }
        // Components are discovered in reverse order.
        partition.reverse();
        WtoComponent::Cycle {
            head,
            components: partition,
        }
    }
}

impl Wto {
    pub fn new(cfg: &Cfg) -> Self {
        let mut builder = Builder {
            cfg,
            dfn: vec![0; cfg.num_blocks()],
            stack: Vec::new(),
            num: 0,
        };
        let mut components = Vec::new();
        builder.visit(cfg.entry(), &mut components);
        components.reverse();

        let mut nesting = vec![Vec::new(); cfg.num_blocks()];
        fn walk(c: &WtoComponent, heads: &mut Vec<BlockId>, nesting: &mut [Vec<BlockId>]) {
            match c {
                WtoComponent::Vertex(v) => nesting[v.0] = heads.clone(),
                WtoComponent::Cycle { head, components } => {
                    nesting[head.0] = heads.clone();
                    heads.push(*head);
                    for c in components {
                        walk(c, heads, nesting);
                    }
                    heads.pop();
                }
            }
        }
        let mut heads = Vec::new();
        for c in &components {
            walk(c, &mut heads, &mut nesting);
        }

        Self { components, nesting }
    }

    pub fn components(&self) -> &[WtoComponent] {
        &self.components
    }

    /// Heads of the cycles strictly containing `block`, outermost first.
    pub fn nesting(&self, block: BlockId) -> &[BlockId] {
        &self.nesting[block.0]
    }

    /// Whether `block` is the head of a cycle.
    pub fn is_head(&self, block: BlockId) -> bool {
        fn find(cs: &[WtoComponent], block: BlockId) -> bool {
            cs.iter().any(|c| match c {
                WtoComponent::Vertex(_) => false,
                WtoComponent::Cycle { head, components } => *head == block || find(components, block),
            })
        }
        find(&self.components, block)
    }
}

impl fmt::Display for Wto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.components.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}
