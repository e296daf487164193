use crate::constraint::Direction;
use crate::operation::{Dependency, LinkType, Operation, OperationId};
use petgraph::Direction::{Incoming, Outgoing};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("dependency cycle among operations {operations:?}")]
    Cycle { operations: Vec<OperationId> },
    #[error("dependency {predecessor} -> {successor} references unknown operation {operation_id}")]
    UnknownOperation {
        operation_id: OperationId,
        predecessor: OperationId,
        successor: OperationId,
    },
    #[error("duplicate operation id {operation_id}")]
    DuplicateOperation { operation_id: OperationId },
}

/// Precedence graph of one job's operations; edges run predecessor -> successor.
#[derive(Debug, Clone)]
pub struct OperationDag {
    graph: DiGraph<OperationId, LinkType>,
    id_to_index: HashMap<OperationId, NodeIndex>,
}

impl OperationDag {
    /// Build and validate the graph. Cycles are rejected here so every
    /// later traversal covers all operations.
    pub fn build(operations: &[Operation], dependencies: &[Dependency]) -> Result<Self, GraphError> {
        let mut graph: DiGraph<OperationId, LinkType> =
            DiGraph::with_capacity(operations.len(), dependencies.len());
        let mut id_to_index: HashMap<OperationId, NodeIndex> = HashMap::with_capacity(operations.len());

        for operation in operations {
            if id_to_index.contains_key(&operation.id) {
                return Err(GraphError::DuplicateOperation {
                    operation_id: operation.id,
                });
            }
            let node_ix = graph.add_node(operation.id);
            id_to_index.insert(operation.id, node_ix);
        }

        for dependency in dependencies {
            let lookup = |id: OperationId| {
                id_to_index
                    .get(&id)
                    .copied()
                    .ok_or(GraphError::UnknownOperation {
                        operation_id: id,
                        predecessor: dependency.predecessor,
                        successor: dependency.successor,
                    })
            };
            let u = lookup(dependency.predecessor)?;
            let v = lookup(dependency.successor)?;
            graph.update_edge(u, v, dependency.link_type);
        }

        let dag = Self { graph, id_to_index };
        if dag.kahn(Direction::Forward).len() < dag.graph.node_count() {
            return Err(GraphError::Cycle {
                operations: dag.cyclic_operations(),
            });
        }
        Ok(dag)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of distinct precedence links.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, id: OperationId) -> bool {
        self.id_to_index.contains_key(&id)
    }

    /// Forward: every predecessor before its successors. Backward: every
    /// successor before its predecessors. Independent operations come out in
    /// ascending id order.
    pub fn topological_order(&self, direction: Direction) -> Vec<OperationId> {
        self.kahn(direction)
    }

    pub fn predecessors(&self, id: OperationId) -> Vec<OperationId> {
        self.neighbors(id, Incoming)
    }

    pub fn successors(&self, id: OperationId) -> Vec<OperationId> {
        self.neighbors(id, Outgoing)
    }

    /// Dependencies whose link type is not finish-to-start.
    pub fn degraded_links(&self) -> Vec<Dependency> {
        let mut links: Vec<Dependency> = self
            .graph
            .edge_indices()
            .filter_map(|edge| {
                let link_type = self.graph[edge];
                if link_type == LinkType::FinishToStart {
                    return None;
                }
                let (u, v) = self.graph.edge_endpoints(edge)?;
                Some(Dependency {
                    predecessor: self.graph[u],
                    successor: self.graph[v],
                    link_type,
                })
            })
            .collect();
        links.sort_by_key(|d| (d.predecessor, d.successor));
        links
    }

    fn neighbors(&self, id: OperationId, direction: petgraph::Direction) -> Vec<OperationId> {
        let Some(&node_ix) = self.id_to_index.get(&id) else {
            return Vec::new();
        };
        let mut ids: Vec<OperationId> = self
            .graph
            .neighbors_directed(node_ix, direction)
            .map(|ix| self.graph[ix])
            .collect();
        ids.sort_unstable();
        ids
    }

    fn kahn(&self, direction: Direction) -> Vec<OperationId> {
        let (inbound, outbound) = match direction {
            Direction::Forward => (Incoming, Outgoing),
            Direction::Backward => (Outgoing, Incoming),
        };

        let mut degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|ix| (ix, self.graph.neighbors_directed(ix, inbound).count()))
            .collect();

        let mut ready: BinaryHeap<Reverse<(OperationId, NodeIndex)>> = degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(&ix, _)| Reverse((self.graph[ix], ix)))
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse((id, ix))) = ready.pop() {
            order.push(id);
            for next in self.graph.neighbors_directed(ix, outbound) {
                if let Some(d) = degree.get_mut(&next) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push(Reverse((self.graph[next], next)));
                    }
                }
            }
        }
        order
    }

    fn cyclic_operations(&self) -> Vec<OperationId> {
        let mut ids: Vec<OperationId> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
            .flatten()
            .map(|ix| self.graph[ix])
            .collect();
        ids.sort_unstable();
        ids
    }
}
