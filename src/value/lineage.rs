//! Append-only provenance arena
//!
//! Every simulated value carries a `Lineage` handle into a shared
//! `LineageStore`. A node records the instruction indices a value moved
//! through (its history) plus the lineages it was merged from (its parents),
//! forming a DAG with structural sharing and no cycles. Nodes are never
//! mutated after insertion, so handles taken by a snapshot stay valid for
//! the lifetime of the store.

use std::cell::RefCell;
use std::rc::Rc;

use super::{Category, Value};

/// Handle into a [`LineageStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lineage(u32);

#[derive(Debug, Clone)]
struct LineageNode {
    history: Vec<usize>,
    parents: Vec<Lineage>,
}

/// Arena of provenance nodes, shared between a simulator and its snapshots.
///
/// Cloning the store clones the handle, not the nodes; the arena is
/// append-only and single-threaded, which keeps simulator snapshots
/// proportional to stack depth plus locals count.
#[derive(Debug, Clone, Default)]
pub struct LineageStore {
    nodes: Rc<RefCell<Vec<LineageNode>>>,
}

impl LineageStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, node: LineageNode) -> Lineage {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(node);
        Lineage((nodes.len() - 1) as u32)
    }

    /// Lineage of a method-entry value: no producing instruction, no parents.
    pub fn argument(&self) -> Lineage {
        self.insert(LineageNode { history: Vec::new(), parents: Vec::new() })
    }

    /// Lineage of a value first produced by the instruction at `pc`.
    pub fn origin(&self, pc: usize) -> Lineage {
        self.insert(LineageNode { history: vec![pc], parents: Vec::new() })
    }

    /// Lineage of a value moved (loaded, duplicated) by the instruction at
    /// `pc`: the parent's history extended by one entry, parents unchanged.
    pub fn moved(&self, parent: Lineage, pc: usize) -> Lineage {
        let node = {
            let nodes = self.nodes.borrow();
            let p = &nodes[parent.0 as usize];
            let mut history = p.history.clone();
            history.push(pc);
            LineageNode { history, parents: p.parents.clone() }
        };
        self.insert(node)
    }

    /// Lineage of a value combining several operands at the instruction at
    /// `pc`; the operands' lineages become parents of the new node.
    pub fn merged(&self, pc: usize, parents: &[Lineage]) -> Lineage {
        self.insert(LineageNode { history: vec![pc], parents: parents.to_vec() })
    }

    /// Ordered move history of a node, oldest first.
    pub fn history_of(&self, lineage: Lineage) -> Vec<usize> {
        self.nodes.borrow()[lineage.0 as usize].history.clone()
    }

    /// Parent lineages of a node (merge inputs).
    pub fn parents_of(&self, lineage: Lineage) -> Vec<Lineage> {
        self.nodes.borrow()[lineage.0 as usize].parents.clone()
    }

    /// Instruction that most recently produced or moved this value.
    pub fn last_producer(&self, lineage: Lineage) -> Option<usize> {
        self.nodes.borrow()[lineage.0 as usize].history.last().copied()
    }

    /// Instruction that first produced this value, if any.
    pub fn first_producer(&self, lineage: Lineage) -> Option<usize> {
        self.nodes.borrow()[lineage.0 as usize].history.first().copied()
    }

    /// True when the node has neither history nor parents, i.e. the value
    /// entered the method as an argument or receiver.
    pub fn is_argument(&self, lineage: Lineage) -> bool {
        let nodes = self.nodes.borrow();
        let node = &nodes[lineage.0 as usize];
        node.history.is_empty() && node.parents.is_empty()
    }

    /// New value moved through the instruction at `pc`; category and known
    /// literal carry over untouched.
    pub fn move_value(&self, value: &Value, pc: usize) -> Value {
        Value {
            category: value.category,
            known: value.known.clone(),
            lineage: self.moved(value.lineage, pc),
        }
    }

    /// Fresh value produced at `pc` from the given operands; their lineages
    /// become the parents of the new value's lineage.
    pub fn fresh(&self, category: Category, pc: usize, operands: &[&Value]) -> Value {
        let lineage = if operands.is_empty() {
            self.origin(pc)
        } else {
            let parents: Vec<Lineage> = operands.iter().map(|v| v.lineage).collect();
            self.merged(pc, &parents)
        };
        Value { category, known: None, lineage }
    }
}
