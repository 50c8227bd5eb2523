//! Flat view of an entity graph.
//!
//! A saved entity carries its owned children inline. The engine flattens that
//! tree into a list of shallow rows in pre-order (every owner before what it
//! owns), works on the list, and folds it back into a tree afterwards. Both
//! directions are iterative; the schema depth never matters.

use bakehouse_bakery::{Record, Relation};
use bakehouse_core::{EntityId, IntegrityError, IntegrityResult};

#[derive(Debug, Clone)]
pub struct Node {
    pub record: Record,
    /// Owner position in the list and the relation linking it to this node.
    pub parent: Option<(usize, Relation)>,
    pub children: Vec<(Relation, usize)>,
    /// The stored row, when this node updates an existing one.
    pub stored: Option<Record>,
}

impl Node {
    fn new(record: Record, parent: Option<(usize, Relation)>) -> Self {
        Self {
            record,
            parent,
            children: Vec::new(),
            stored: None,
        }
    }

    pub fn id(&self) -> IntegrityResult<EntityId> {
        self.record.id().ok_or_else(|| {
            IntegrityError::invariant(format!("{} has no identity yet", self.record.name()))
        })
    }

    pub fn is_new(&self) -> bool {
        self.stored.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    /// Single shallow root, children added with [`Graph::push`].
    pub fn rooted(root: Record) -> Self {
        Self {
            nodes: vec![Node::new(root, None)],
        }
    }

    /// Detach every embedded child of `root`, recursively, into pre-order.
    pub fn flatten(root: Record) -> Self {
        let mut graph = Self::default();
        let mut pending = vec![(root, None)];

        while let Some((mut record, parent)) = pending.pop() {
            let position = graph.nodes.len();
            let children = record.detach_children();
            for (relation, child) in children.into_iter().rev() {
                pending.push((child, Some((position, relation))));
            }
            if let Some((owner, relation)) = parent {
                graph.nodes[owner].children.push((relation, position));
            }
            graph.nodes.push(Node::new(record, parent));
        }
        graph
    }

    pub fn push(&mut self, record: Record, owner: usize, relation: Relation) -> usize {
        let position = self.nodes.len();
        self.nodes[owner].children.push((relation, position));
        self.nodes.push(Node::new(record, Some((owner, relation))));
        position
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn node(&self, position: usize) -> Option<&Node> {
        self.nodes.get(position)
    }

    pub fn node_mut(&mut self, position: usize) -> Option<&mut Node> {
        self.nodes.get_mut(position)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Fold the list back into the root record, children re-embedded in their
    /// original order.
    pub fn assemble(self) -> IntegrityResult<Record> {
        let links: Vec<Vec<(Relation, usize)>> =
            self.nodes.iter().map(|node| node.children.clone()).collect();
        let mut slots: Vec<Option<Record>> =
            self.nodes.into_iter().map(|node| Some(node.record)).collect();

        // Children always sit after their owner, so walking backwards finishes
        // every subtree before it is attached.
        for position in (0..slots.len()).rev() {
            for &(relation, child) in &links[position] {
                let child = slots
                    .get_mut(child)
                    .and_then(Option::take)
                    .ok_or_else(|| IntegrityError::invariant("graph node attached twice"))?;
                let owner = slots
                    .get_mut(position)
                    .and_then(Option::as_mut)
                    .ok_or_else(|| IntegrityError::invariant("graph owner missing"))?;
                owner.attach_child(relation, child)?;
            }
        }

        slots
            .into_iter()
            .next()
            .flatten()
            .ok_or_else(|| IntegrityError::invariant("empty graph"))
    }
}
