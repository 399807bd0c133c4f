use slotmap::SecondaryMap;
use std::collections::VecDeque;

use crate::{
    api::GraphApi,
    connector::{ConnectorError, OutputConnector, ResolvedInput},
    graph::{BuildError, Graph, NodeKey},
};

///Result of the scheduling pass: the flat execution order and the output
/// descriptors every node declared for this build.
pub(crate) struct Topology {
    pub order: Vec<NodeKey>,
    pub outputs: SecondaryMap<NodeKey, Vec<OutputConnector>>,
}

impl<A: GraphApi> Graph<A> {
    ///Checks the static edge invariants before scheduling: every input is
    /// connected, connected through the entry point matching its declared
    /// kind, and self-loops carry a delay.
    pub(crate) fn validate_inputs(&self) -> Result<(), BuildError> {
        for (key, data) in self.nodes.iter() {
            for (index, input) in data.inputs.iter().enumerate() {
                let Some(conn) = &data.input_connections[index] else {
                    return Err(BuildError::UnconnectedInput {
                        node: data.name.clone(),
                        input: input.name().to_owned(),
                        index,
                    });
                };
                if conn.kind != input.kind() {
                    return Err(BuildError::Connector(ConnectorError::InputKindMismatch {
                        node: data.name.clone(),
                        input: input.name().to_owned(),
                        input_index: index,
                        declared: input.kind(),
                        connected: conn.kind,
                    }));
                }
                if conn.src == key && input.delay() == 0 {
                    return Err(BuildError::ZeroDelaySelfLoop {
                        node: data.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    ///Visits the nodes in topological order of the zero-delay subgraph and
    /// resolves every node's outputs along the way. Delayed inputs resolve to
    /// the feedback placeholder, so cycles are admitted exactly where an edge
    /// declares a delay.
    pub(crate) fn schedule(&mut self) -> Result<Topology, BuildError> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut outputs: SecondaryMap<NodeKey, Vec<OutputConnector>> = SecondaryMap::new();
        let mut visited: SecondaryMap<NodeKey, ()> = SecondaryMap::new();

        // Nodes without any same-iteration dependency start the schedule, in
        // insertion order.
        let mut queue: VecDeque<NodeKey> = self
            .nodes
            .iter()
            .filter(|(_, data)| data.inputs.iter().all(|input| input.delay() > 0))
            .map(|(key, _)| key)
            .collect();

        while let Some(key) = queue.pop_front() {
            order.push(key);
            visited.insert(key, ());

            // What this node's inputs are connected to. Reads over a delayed
            // edge see a previous iteration and must not take part in format
            // or extent inference.
            let resolved: Vec<ResolvedInput> = {
                let data = &self.nodes[key];
                data.inputs
                    .iter()
                    .zip(&data.input_connections)
                    .map(|(input, conn)| {
                        if input.delay() > 0 {
                            return ResolvedInput::Feedback;
                        }
                        let conn = conn.as_ref().unwrap();
                        match &outputs[conn.src][conn.src_output] {
                            OutputConnector::Image(out) => ResolvedInput::Image(out.clone()),
                            OutputConnector::Buffer(out) => ResolvedInput::Buffer(out.clone()),
                        }
                    })
                    .collect()
            };

            let data = self.nodes.get_mut(key).unwrap();
            let outs = data.node.describe_outputs(&resolved);

            // Edges were buffered before the output count was known.
            if let Some(highest) = data.output_connections.iter().rposition(|s| !s.is_empty()) {
                if highest >= outs.len() {
                    return Err(BuildError::InvalidOutputIndex {
                        node: data.name.clone(),
                        index: highest,
                    });
                }
            }
            outputs.insert(key, outs);

            // Successors over zero-delay edges whose zero-delay dependencies
            // are now all satisfied, in insertion order.
            let data = &self.nodes[key];
            let mut candidates: Vec<NodeKey> = Vec::new();
            for sinks in &data.output_connections {
                for &(dst, dst_input) in sinks {
                    if self.nodes[dst].inputs[dst_input].delay() == 0 {
                        candidates.push(dst);
                    }
                }
            }
            candidates.sort_by_key(|&c| self.nodes[c].order);
            candidates.dedup();

            for candidate in candidates {
                if visited.contains_key(candidate) {
                    return Err(BuildError::UndelayedCycle {
                        src: self.nodes[key].name.clone(),
                        dst: self.nodes[candidate].name.clone(),
                    });
                }
                let cdata = &self.nodes[candidate];
                let satisfied = cdata
                    .inputs
                    .iter()
                    .zip(&cdata.input_connections)
                    .all(|(input, conn)| {
                        input.delay() > 0
                            || visited.contains_key(conn.as_ref().unwrap().src)
                    });
                if satisfied {
                    queue.push_back(candidate);
                }
            }
        }

        if order.len() != self.nodes.len() {
            return Err(BuildError::GraphNotSchedulable {
                scheduled: order.len(),
                total: self.nodes.len(),
            });
        }

        Ok(Topology { order, outputs })
    }
}
