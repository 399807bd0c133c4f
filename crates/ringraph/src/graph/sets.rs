use ash::vk;
use fxhash::FxHashMap;
use slotmap::{SecondaryMap, SlotMap};

use crate::{
    api::{GraphApi, Lifetime},
    connector::{ConnectorError, InputConnector, OutputConnector},
    graph::{Backing, BarrierBatch, BuildError, Graph, NodeData, NodeKey},
    node::NodeIo,
    resources::{BufferRes, BufferResKey, ImageRes, ImageResKey},
    util::lcm_all,
};

///Result of the allocation pass. Staged separately so a failing allocation
/// leaves the previously built graph untouched.
pub(crate) struct Allocation<A: GraphApi> {
    pub images: SlotMap<ImageResKey, ImageRes<A>>,
    pub buffers: SlotMap<BufferResKey, BufferRes<A>>,
    pub backings: SecondaryMap<NodeKey, Vec<Backing>>,
}

impl<A: GraphApi> Graph<A> {
    ///Creates `max_delay + 1` backings per output, with usage, stage and
    /// access masks unioned over all sinks. Persistent outputs come from the
    /// dedicated allocator and are carried over from the previous build when
    /// their description did not change.
    pub(crate) fn allocate_outputs(
        &self,
        api: &mut A,
        topology: &super::scheduler::Topology,
    ) -> Result<Allocation<A>, BuildError> {
        let mut allocation = Allocation {
            images: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            backings: SecondaryMap::new(),
        };

        // Persistent backings of the previous build, keyed by owner node and
        // output name. Their handles and carried layout/access state survive
        // the rebuild as long as the description still matches.
        let mut carried_images: FxHashMap<(String, String), ImageRes<A>> = FxHashMap::default();
        let mut carried_buffers: FxHashMap<(String, String), BufferRes<A>> = FxHashMap::default();
        for (_key, data) in self.nodes.iter() {
            for (out_idx, out) in data.outputs.iter().enumerate() {
                if !out.is_persistent() {
                    continue;
                }
                match data.backings.get(out_idx) {
                    Some(Backing::Images(keys)) => {
                        if let Some(res) = keys.first().and_then(|k| self.images.get(*k)) {
                            carried_images.insert(
                                (data.name.clone(), out.name().to_owned()),
                                res.clone(),
                            );
                        }
                    }
                    Some(Backing::Buffers(keys)) => {
                        if let Some(res) = keys.first().and_then(|k| self.buffers.get(*k)) {
                            carried_buffers.insert(
                                (data.name.clone(), out.name().to_owned()),
                                res.clone(),
                            );
                        }
                    }
                    None => {}
                }
            }
        }

        for &key in &topology.order {
            let data = &self.nodes[key];
            let outputs = &topology.outputs[key];
            let mut node_backings = Vec::with_capacity(outputs.len());

            for (out_idx, out) in outputs.iter().enumerate() {
                let empty = Vec::new();
                let sinks = data.output_connections.get(out_idx).unwrap_or(&empty);

                let mut consumer_stages = vk::PipelineStageFlags2::empty();
                let mut consumer_access = vk::AccessFlags2::empty();
                let mut image_usage = vk::ImageUsageFlags::empty();
                let mut buffer_usage = vk::BufferUsageFlags::empty();
                let mut max_delay = 0u32;

                for &(dst, dst_input) in sinks {
                    let dst_data = &self.nodes[dst];
                    let input = &dst_data.inputs[dst_input];
                    if input.kind() != out.kind() {
                        return Err(BuildError::Connector(ConnectorError::EdgeKindMismatch {
                            src: data.name.clone(),
                            output_index: out_idx,
                            output: out.kind(),
                            dst: dst_data.name.clone(),
                            input_index: dst_input,
                            input: input.kind(),
                        }));
                    }
                    if out.is_persistent() && input.delay() > 0 {
                        return Err(BuildError::PersistentDelayedRead {
                            src: data.name.clone(),
                            output: out.name().to_owned(),
                            dst: dst_data.name.clone(),
                            input: dst_input,
                        });
                    }
                    max_delay = max_delay.max(input.delay());
                    match input {
                        InputConnector::Image(i) => {
                            consumer_stages |= i.stages;
                            consumer_access |= i.access;
                            image_usage |= i.usage;
                        }
                        InputConnector::Buffer(b) => {
                            consumer_stages |= b.stages;
                            consumer_access |= b.access;
                            buffer_usage |= b.usage;
                        }
                    }
                }

                let copies = max_delay as usize + 1;
                match out {
                    OutputConnector::Image(out) => {
                        let mut desc = out.desc.clone();
                        desc.usage |= image_usage;
                        let lifetime = if out.persistent {
                            Lifetime::Persistent
                        } else {
                            Lifetime::Transient
                        };

                        let mut keys = Vec::with_capacity(copies);
                        for copy in 0..copies {
                            let carried = if out.persistent {
                                carried_images
                                    .remove(&(data.name.clone(), out.name.clone()))
                                    .filter(|res| res.desc == desc)
                            } else {
                                None
                            };
                            let res = match carried {
                                Some(mut res) => {
                                    res.rebind(consumer_stages, consumer_access);
                                    res
                                }
                                None => {
                                    let image = api
                                        .create_image(
                                            &desc,
                                            lifetime,
                                            &format!(
                                                "node '{}' image, output '{}', copy '{}'",
                                                data.name, out.name, copy
                                            ),
                                        )
                                        .map_err(BuildError::Allocation)?;
                                    ImageRes::new(
                                        image,
                                        desc.clone(),
                                        out.persistent,
                                        consumer_stages,
                                        consumer_access,
                                    )
                                }
                            };
                            keys.push(allocation.images.insert(res));
                        }
                        node_backings.push(Backing::Images(keys));
                    }
                    OutputConnector::Buffer(out) => {
                        let mut desc = out.desc.clone();
                        desc.usage |= buffer_usage;
                        let lifetime = if out.persistent {
                            Lifetime::Persistent
                        } else {
                            Lifetime::Transient
                        };

                        let mut keys = Vec::with_capacity(copies);
                        for copy in 0..copies {
                            let carried = if out.persistent {
                                carried_buffers
                                    .remove(&(data.name.clone(), out.name.clone()))
                                    .filter(|res| res.desc == desc)
                            } else {
                                None
                            };
                            let res = match carried {
                                Some(mut res) => {
                                    res.rebind(consumer_stages, consumer_access);
                                    res
                                }
                                None => {
                                    let buffer = api
                                        .create_buffer(
                                            &desc,
                                            lifetime,
                                            &format!(
                                                "node '{}' buffer, output '{}', copy '{}'",
                                                data.name, out.name, copy
                                            ),
                                        )
                                        .map_err(BuildError::Allocation)?;
                                    BufferRes::new(
                                        buffer,
                                        desc.clone(),
                                        out.persistent,
                                        consumer_stages,
                                        consumer_access,
                                    )
                                }
                            };
                            keys.push(allocation.buffers.insert(res));
                        }
                        node_backings.push(Backing::Buffers(keys));
                    }
                }
            }

            allocation.backings.insert(key, node_backings);
        }

        Ok(allocation)
    }

    ///Precomputes, per node and per resource-set slot, the physical backings
    /// the node sees. The slot count is the least common multiple of the copy
    /// counts in the node's neighbourhood, after that many iterations the
    /// binding pattern repeats.
    pub(crate) fn prepare_resource_sets(&mut self) {
        let order = self.topology.clone();
        for key in order {
            let sets = {
                let data = &self.nodes[key];

                let mut counts: Vec<u64> = Vec::new();
                for conn in data.input_connections.iter().flatten() {
                    counts.push(self.nodes[conn.src].backings[conn.src_output].copies() as u64);
                }
                for backing in &data.backings {
                    counts.push(backing.copies() as u64);
                }
                let set_count = lcm_all(counts) as usize;

                let mut sets = Vec::with_capacity(set_count);
                for set_index in 0..set_count {
                    let mut io = NodeIo {
                        set_index: set_index as u32,
                        input_images: Vec::new(),
                        input_buffers: Vec::new(),
                        output_images: Vec::new(),
                        output_buffers: Vec::new(),
                    };

                    for (input, conn) in data.inputs.iter().zip(&data.input_connections) {
                        let conn = conn.as_ref().unwrap();
                        let delay = input.delay() as usize;
                        match &self.nodes[conn.src].backings[conn.src_output] {
                            Backing::Images(keys) => {
                                let copies = keys.len();
                                let idx = (set_index + copies - delay) % copies;
                                io.input_images.push(self.images[keys[idx]].image.clone());
                            }
                            Backing::Buffers(keys) => {
                                let copies = keys.len();
                                let idx = (set_index + copies - delay) % copies;
                                io.input_buffers.push(self.buffers[keys[idx]].buffer.clone());
                            }
                        }
                    }

                    for backing in &data.backings {
                        match backing {
                            Backing::Images(keys) => {
                                let idx = set_index % keys.len();
                                io.output_images.push(self.images[keys[idx]].image.clone());
                            }
                            Backing::Buffers(keys) => {
                                let idx = set_index % keys.len();
                                io.output_buffers.push(self.buffers[keys[idx]].buffer.clone());
                            }
                        }
                    }

                    sets.push(io);
                }
                sets
            };
            self.nodes.get_mut(key).unwrap().sets = sets;
        }
    }
}

///Computes the dependency batch that must run before `key` executes in
/// `set_index`, advancing the simulated resource states along the way.
///
/// Inputs coming out of a write get the full producer→consumer transition
/// (images additionally move into their required layout, read-after-read
/// only transitions the layout if it differs). Every output transitions into
/// its write state, transient images from `UNDEFINED` since their previous
/// content is dead by then.
pub(crate) fn barrier_batch_for<A: GraphApi>(
    nodes: &SlotMap<NodeKey, NodeData<A>>,
    images: &mut SlotMap<ImageResKey, ImageRes<A>>,
    buffers: &mut SlotMap<BufferResKey, BufferRes<A>>,
    key: NodeKey,
    set_index: usize,
) -> BarrierBatch<A> {
    let data = &nodes[key];
    let mut batch = BarrierBatch::new();

    for (input, conn) in data.inputs.iter().zip(&data.input_connections) {
        let conn = conn.as_ref().unwrap();
        let delay = input.delay() as usize;
        match (&nodes[conn.src].backings[conn.src_output], input) {
            (Backing::Images(keys), InputConnector::Image(image_in)) => {
                let copies = keys.len();
                let idx = (set_index + copies - delay) % copies;
                if let Some(barrier) = images[keys[idx]].input_barrier(image_in.required_layout) {
                    batch.images.push(barrier);
                }
            }
            (Backing::Buffers(keys), InputConnector::Buffer(_)) => {
                let copies = keys.len();
                let idx = (set_index + copies - delay) % copies;
                if let Some(barrier) = buffers[keys[idx]].input_barrier() {
                    batch.buffers.push(barrier);
                }
            }
            // kinds were validated during allocation
            _ => {}
        }
    }

    for (out, backing) in data.outputs.iter().zip(&data.backings) {
        match (backing, out) {
            (Backing::Images(keys), OutputConnector::Image(image_out)) => {
                let idx = set_index % keys.len();
                batch.images.push(images[keys[idx]].output_barrier(image_out));
            }
            (Backing::Buffers(keys), OutputConnector::Buffer(buffer_out)) => {
                let idx = set_index % keys.len();
                batch
                    .buffers
                    .push(buffers[keys[idx]].output_barrier(buffer_out));
            }
            _ => {}
        }
    }

    batch
}
