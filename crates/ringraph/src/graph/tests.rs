use ash::vk;
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use super::*;
use crate::{
    api::Lifetime,
    connector::{BufferIn, ImageIn, ImageOut, ResolvedInput},
    node::NodeStatus,
    test_api::{TestApi, TestCmd, TestImage},
};

#[derive(Clone, Debug)]
struct Seen {
    iteration: u64,
    set_index: u32,
    input_images: Vec<TestImage>,
    output_images: Vec<TestImage>,
}

type Log = Rc<RefCell<Vec<Seen>>>;

struct TestNode {
    inputs: Vec<InputConnector>,
    outputs: Vec<OutputConnector>,
    log: Log,
    rebuild_at: Option<u64>,
    skip: bool,
    builds: Rc<Cell<u32>>,
}

impl TestNode {
    fn new(
        inputs: Vec<InputConnector>,
        outputs: Vec<OutputConnector>,
    ) -> (Self, Log, Rc<Cell<u32>>) {
        let log = Log::default();
        let builds = Rc::new(Cell::new(0));
        (
            TestNode {
                inputs,
                outputs,
                log: log.clone(),
                rebuild_at: None,
                skip: false,
                builds: builds.clone(),
            },
            log,
            builds,
        )
    }
}

impl Node<TestApi> for TestNode {
    fn describe_inputs(&self) -> Vec<InputConnector> {
        self.inputs.clone()
    }

    fn describe_outputs(&mut self, _inputs: &[ResolvedInput]) -> Vec<OutputConnector> {
        self.outputs.clone()
    }

    fn pre_process(&mut self, info: &RunInfo) -> NodeStatus {
        NodeStatus {
            request_rebuild: self.rebuild_at == Some(info.iteration),
            skip_run: self.skip,
        }
    }

    fn build(
        &mut self,
        _api: &mut TestApi,
        _cmd: &mut TestCmd,
        _io: &[NodeIo<TestApi>],
    ) -> Result<(), anyhow::Error> {
        self.builds.set(self.builds.get() + 1);
        Ok(())
    }

    fn process(
        &mut self,
        _api: &mut TestApi,
        run: &mut GraphRun<'_, TestApi>,
        io: &NodeIo<TestApi>,
    ) -> Result<(), anyhow::Error> {
        self.log.borrow_mut().push(Seen {
            iteration: run.iteration(),
            set_index: io.set_index,
            input_images: io.input_images.clone(),
            output_images: io.output_images.clone(),
        });
        Ok(())
    }
}

fn image_out(name: &str) -> OutputConnector {
    ImageOut::compute_write(
        name,
        crate::api::ImgDesc::storage_image_2d(vk::Format::R32G32B32A32_SFLOAT, 64, 64),
    )
    .into()
}

fn image_in(name: &str, delay: u32) -> InputConnector {
    ImageIn::compute_read(name).with_delay(delay).into()
}

fn frame(graph: &mut Graph<TestApi>, api: &mut TestApi) -> TestCmd {
    graph.run(api).unwrap().execute_callbacks(api)
}

fn backing_images(graph: &Graph<TestApi>, node: NodeKey, output: usize) -> Vec<TestImage> {
    match &graph.nodes[node].backings[output] {
        Backing::Images(keys) => keys.iter().map(|k| graph.images[*k].image.clone()).collect(),
        Backing::Buffers(_) => panic!("expected image backing"),
    }
}

fn topology_names(graph: &Graph<TestApi>) -> Vec<String> {
    graph
        .topology
        .iter()
        .map(|&k| graph.nodes[k].name.clone())
        .collect()
}

#[test]
fn linear_pipeline() {
    let mut api = TestApi::default();
    let mut graph = Graph::new(&mut api, 2).unwrap();

    let (a, _, _) = TestNode::new(vec![], vec![image_out("a")]);
    let (b, _, _) = TestNode::new(vec![image_in("in", 0)], vec![image_out("b")]);
    let (c, log_c, _) = TestNode::new(vec![image_in("in", 0)], vec![]);
    let a = graph.add_node("a", a).unwrap();
    let b = graph.add_node("b", b).unwrap();
    let c = graph.add_node("c", c).unwrap();
    graph.connect_image(a, b, 0, 0).unwrap();
    graph.connect_image(b, c, 0, 0).unwrap();

    // first frame builds
    frame(&mut graph, &mut api);
    assert_eq!(topology_names(&graph), ["a", "b", "c"]);
    assert_eq!(backing_images(&graph, a, 0).len(), 1);
    assert_eq!(backing_images(&graph, b, 0).len(), 1);
    for &key in &graph.topology {
        assert_eq!(graph.nodes[key].sets.len(), 1);
    }

    // steady frame: one dependency batch per node
    let cmd = frame(&mut graph, &mut api);
    assert_eq!(cmd.batches.len(), 3);

    // b: full write→read transition into the required layout plus its own
    // output transition
    let b_batch = &cmd.batches[1];
    assert_eq!(b_batch.images.len(), 2);
    let read = &b_batch.images[0];
    assert_eq!(read.new_layout, vk::ImageLayout::GENERAL);
    assert_eq!(read.src_access, vk::AccessFlags2::SHADER_STORAGE_WRITE);
    assert_eq!(read.dst_access, vk::AccessFlags2::SHADER_STORAGE_READ);
    assert_eq!(read.dst_stage, vk::PipelineStageFlags2::COMPUTE_SHADER);
    let write = &b_batch.images[1];
    assert_eq!(write.old_layout, vk::ImageLayout::UNDEFINED);
    assert_eq!(write.new_layout, vk::ImageLayout::GENERAL);

    assert_eq!(log_c.borrow().len(), 2);
    assert_eq!(log_c.borrow()[1].input_images, backing_images(&graph, b, 0));
}

#[test]
fn feedback_accumulator() {
    let mut api = TestApi::default();
    let mut graph = Graph::new(&mut api, 2).unwrap();

    let (a, _, _) = TestNode::new(vec![], vec![image_out("a")]);
    let (b, log_b, _) = TestNode::new(
        vec![image_in("src", 0), image_in("history", 1)],
        vec![image_out("acc")],
    );
    let a = graph.add_node("a", a).unwrap();
    let b = graph.add_node("b", b).unwrap();
    graph.connect_image(a, b, 0, 0).unwrap();
    graph.connect_image(b, b, 0, 1).unwrap();

    for _ in 0..8 {
        frame(&mut graph, &mut api);
    }

    let copies = backing_images(&graph, b, 0);
    assert_eq!(copies.len(), 2);
    assert_eq!(graph.nodes[b].sets.len(), 2);

    let log = log_b.borrow();
    assert_eq!(log.len(), 8);
    let at7 = &log[7];
    assert_eq!(at7.iteration, 7);
    assert_eq!(at7.set_index, 1);
    // reads the value written one iteration earlier, writes the other copy
    assert_eq!(at7.input_images[1], copies[0]);
    assert_eq!(at7.output_images[0], copies[1]);

    // steady state: the delayed read always comes out of a write, so the
    // precomputed batch carries the full producer→consumer transition
    let slot0 = &graph.nodes[b].batches[0];
    let read = slot0
        .images
        .iter()
        .find(|bar| bar.image == copies[1])
        .unwrap();
    assert_eq!(read.old_layout, vk::ImageLayout::GENERAL);
    assert_eq!(read.src_access, vk::AccessFlags2::SHADER_STORAGE_WRITE);
    assert_eq!(read.dst_access, vk::AccessFlags2::SHADER_STORAGE_READ);
}

#[test]
fn fan_out_with_differing_delays() {
    let mut api = TestApi::default();
    let mut graph = Graph::new(&mut api, 2).unwrap();

    let (a, log_a, _) = TestNode::new(vec![], vec![image_out("x")]);
    let (b, log_b, _) = TestNode::new(vec![image_in("now", 0)], vec![]);
    let (c, log_c, _) = TestNode::new(vec![image_in("old", 2)], vec![]);
    let a = graph.add_node("a", a).unwrap();
    let b = graph.add_node("b", b).unwrap();
    let c = graph.add_node("c", c).unwrap();
    graph.connect_image(a, b, 0, 0).unwrap();
    graph.connect_image(a, c, 0, 0).unwrap();

    for _ in 0..7 {
        frame(&mut graph, &mut api);
    }

    let copies = backing_images(&graph, a, 0);
    assert_eq!(copies.len(), 3);

    let log_a = log_a.borrow();
    let log_b = log_b.borrow();
    let log_c = log_c.borrow();
    for i in 0..7usize {
        // b reads what a wrote this iteration
        assert_eq!(log_b[i].input_images[0], log_a[i].output_images[0]);
        assert_eq!(log_b[i].input_images[0], copies[i % 3]);
        // c lags two iterations behind
        assert_eq!(log_c[i].input_images[0], copies[(i + 1) % 3]);
        if i >= 2 {
            assert_eq!(log_c[i].input_images[0], log_a[i - 2].output_images[0]);
        }
    }
}

#[test]
fn persistent_output() {
    let mut api = TestApi::default();
    let mut graph = Graph::new(&mut api, 2).unwrap();

    let (a, _, _) = TestNode::new(
        vec![],
        vec![OutputConnector::from(
            ImageOut::compute_write(
                "state",
                crate::api::ImgDesc::storage_image_2d(vk::Format::R32_SFLOAT, 16, 16),
            )
            .persistent(),
        )],
    );
    let (b, _, _) = TestNode::new(vec![image_in("in", 0)], vec![]);
    let a = graph.add_node("a", a).unwrap();
    let b = graph.add_node("b", b).unwrap();
    graph.connect_image(a, b, 0, 0).unwrap();

    frame(&mut graph, &mut api);
    let persistent = api
        .allocations
        .iter()
        .find(|alloc| alloc.name.contains("'state'"))
        .unwrap();
    assert_eq!(persistent.lifetime, Lifetime::Persistent);

    // persistent content is preserved, the write transitions in place
    let a_batch = &graph.nodes[a].batches[0];
    assert_eq!(a_batch.images[0].old_layout, vk::ImageLayout::GENERAL);
    assert_eq!(a_batch.images[0].new_layout, vk::ImageLayout::GENERAL);
}

#[test]
fn persistent_output_rejects_delayed_reader() {
    let mut api = TestApi::default();
    let mut graph = Graph::new(&mut api, 2).unwrap();

    let (a, _, _) = TestNode::new(
        vec![],
        vec![OutputConnector::from(
            ImageOut::compute_write(
                "state",
                crate::api::ImgDesc::storage_image_2d(vk::Format::R32_SFLOAT, 16, 16),
            )
            .persistent(),
        )],
    );
    let (b, _, _) = TestNode::new(vec![image_in("in", 1)], vec![]);
    let a = graph.add_node("a", a).unwrap();
    let b = graph.add_node("b", b).unwrap();
    graph.connect_image(a, b, 0, 0).unwrap();

    let err = graph.run(&mut api).unwrap_err();
    assert!(matches!(
        err,
        RunError::Build(BuildError::PersistentDelayedRead { .. })
    ));
}

#[test]
fn zero_delay_cycle_fails() {
    let mut api = TestApi::default();
    let mut graph = Graph::new(&mut api, 2).unwrap();

    let (a, _, _) = TestNode::new(vec![image_in("in", 0)], vec![image_out("a")]);
    let (b, _, _) = TestNode::new(vec![image_in("in", 0)], vec![image_out("b")]);
    let a = graph.add_node("a", a).unwrap();
    let b = graph.add_node("b", b).unwrap();
    graph.connect_image(a, b, 0, 0).unwrap();
    graph.connect_image(b, a, 0, 0).unwrap();

    let mut cmd = TestCmd::default();
    let err = graph.build(&mut api, &mut cmd).unwrap_err();
    assert!(matches!(err, BuildError::GraphNotSchedulable { .. }));
}

#[test]
fn rebuild_on_pre_process() {
    let mut api = TestApi::default();
    let mut graph = Graph::new(&mut api, 2).unwrap();

    let (a, _, a_builds) = TestNode::new(
        vec![],
        vec![OutputConnector::from(
            ImageOut::compute_write(
                "state",
                crate::api::ImgDesc::storage_image_2d(vk::Format::R32_SFLOAT, 16, 16),
            )
            .persistent(),
        )],
    );
    let (mut b, log_b, _) = TestNode::new(vec![image_in("in", 0)], vec![image_out("b")]);
    b.rebuild_at = Some(10);
    let a = graph.add_node("a", a).unwrap();
    let b = graph.add_node("b", b).unwrap();
    graph.connect_image(a, b, 0, 0).unwrap();

    for _ in 0..10 {
        frame(&mut graph, &mut api);
    }
    assert_eq!(log_b.borrow().last().unwrap().iteration, 9);
    let persistent_before = backing_images(&graph, a, 0);
    let transient_before = backing_images(&graph, b, 0);
    assert_eq!(a_builds.get(), 1);

    // iteration 10 requests the rebuild in pre-process; the engine honours it
    // before processing and the frame runs as iteration 0 again
    let run = graph.run(&mut api).unwrap();
    assert_eq!(run.iteration(), 0);
    assert_eq!(run.elapsed_since_connect(), std::time::Duration::ZERO);
    run.execute_callbacks(&mut api);

    assert_eq!(a_builds.get(), 2);
    assert_eq!(log_b.borrow().last().unwrap().iteration, 0);
    // the persistent backing survived the rebuild, the transient one did not
    assert_eq!(backing_images(&graph, a, 0), persistent_before);
    assert_ne!(backing_images(&graph, b, 0), transient_before);
}

#[test]
fn argument_errors() {
    let mut api = TestApi::default();
    let mut graph = Graph::new(&mut api, 2).unwrap();

    let (a, _, _) = TestNode::new(vec![], vec![image_out("a")]);
    let (b, _, _) = TestNode::new(vec![image_in("in", 0)], vec![]);
    let a = graph.add_node("a", a).unwrap();
    let b = graph.add_node("b", b).unwrap();

    let (dup, _, _) = TestNode::new(vec![], vec![]);
    assert!(matches!(
        graph.add_node("a", dup),
        Err(ArgumentError::NameTaken(_))
    ));

    assert!(matches!(
        graph.connect_image(a, b, 0, 1),
        Err(ArgumentError::NoSuchInput { .. })
    ));

    graph.connect_image(a, b, 0, 0).unwrap();
    assert!(matches!(
        graph.connect_image(a, b, 0, 0),
        Err(ArgumentError::AlreadyConnected { .. })
    ));
}

#[test]
fn same_delay_image_read_is_rejected() {
    let mut api = TestApi::default();
    let mut graph = Graph::new(&mut api, 2).unwrap();

    let (a, _, _) = TestNode::new(vec![], vec![image_out("a")]);
    let (b, _, _) = TestNode::new(vec![image_in("first", 1), image_in("second", 1)], vec![]);
    let a = graph.add_node("a", a).unwrap();
    let b = graph.add_node("b", b).unwrap();

    graph.connect_image(a, b, 0, 0).unwrap();
    assert!(matches!(
        graph.connect_image(a, b, 0, 1),
        Err(ArgumentError::SameDelayImageRead { delay: 1, .. })
    ));
}

#[test]
fn unconnected_input_fails_build() {
    let mut api = TestApi::default();
    let mut graph = Graph::new(&mut api, 2).unwrap();

    let (b, _, _) = TestNode::new(vec![image_in("in", 0)], vec![]);
    graph.add_node("b", b).unwrap();

    let mut cmd = TestCmd::default();
    assert!(matches!(
        graph.build(&mut api, &mut cmd),
        Err(BuildError::UnconnectedInput { .. })
    ));
}

#[test]
fn zero_delay_self_loop_fails_build() {
    let mut api = TestApi::default();
    let mut graph = Graph::new(&mut api, 2).unwrap();

    let (b, _, _) = TestNode::new(vec![image_in("in", 0)], vec![image_out("b")]);
    let b = graph.add_node("b", b).unwrap();
    graph.connect_image(b, b, 0, 0).unwrap();

    let mut cmd = TestCmd::default();
    assert!(matches!(
        graph.build(&mut api, &mut cmd),
        Err(BuildError::ZeroDelaySelfLoop { .. })
    ));
}

#[test]
fn connector_kind_mismatch_fails_build() {
    let mut api = TestApi::default();
    let mut graph = Graph::new(&mut api, 2).unwrap();

    let (a, _, _) = TestNode::new(vec![], vec![image_out("a")]);
    let (b, _, _) = TestNode::new(
        vec![InputConnector::from(BufferIn::compute_read("in"))],
        vec![],
    );
    let a = graph.add_node("a", a).unwrap();
    let b = graph.add_node("b", b).unwrap();
    // wiring a buffer input through the image entry point
    graph.connect_image(a, b, 0, 0).unwrap();

    let mut cmd = TestCmd::default();
    assert!(matches!(
        graph.build(&mut api, &mut cmd),
        Err(BuildError::Connector(_))
    ));
}

#[test]
fn invalid_output_index_fails_build() {
    let mut api = TestApi::default();
    let mut graph = Graph::new(&mut api, 2).unwrap();

    let (a, _, _) = TestNode::new(vec![], vec![image_out("a")]);
    let (b, _, _) = TestNode::new(vec![image_in("in", 0)], vec![]);
    let a = graph.add_node("a", a).unwrap();
    let b = graph.add_node("b", b).unwrap();
    graph.connect_image(a, b, 1, 0).unwrap();

    let mut cmd = TestCmd::default();
    assert!(matches!(
        graph.build(&mut api, &mut cmd),
        Err(BuildError::InvalidOutputIndex { .. })
    ));
}

#[test]
fn slot_count_is_lcm_of_neighbourhood() {
    let mut api = TestApi::default();
    let mut graph = Graph::new(&mut api, 2).unwrap();

    let (a, _, _) = TestNode::new(vec![image_in("self", 1)], vec![image_out("a")]);
    let (b, _, _) = TestNode::new(vec![image_in("self", 2)], vec![image_out("b")]);
    let (x, _, _) = TestNode::new(vec![image_in("a", 1), image_in("b", 2)], vec![image_out("x")]);
    let a = graph.add_node("a", a).unwrap();
    let b = graph.add_node("b", b).unwrap();
    let x = graph.add_node("x", x).unwrap();
    // a and b feed themselves so their outputs ring over 2 and 3 copies
    graph.connect_image(a, a, 0, 0).unwrap();
    graph.connect_image(b, b, 0, 0).unwrap();
    graph.connect_image(a, x, 0, 0).unwrap();
    graph.connect_image(b, x, 0, 1).unwrap();

    frame(&mut graph, &mut api);
    assert_eq!(backing_images(&graph, a, 0).len(), 2);
    assert_eq!(backing_images(&graph, b, 0).len(), 3);
    assert_eq!(graph.nodes[x].sets.len(), 6);
}

#[test]
fn in_flight_ring_sequence() {
    let mut api = TestApi::default();
    let mut graph = Graph::new(&mut api, 3).unwrap();

    let (a, _, _) = TestNode::new(vec![], vec![image_out("a")]);
    graph.add_node("a", a).unwrap();

    let mut indices = Vec::new();
    let mut signals = Vec::new();
    for _ in 0..7 {
        let run = graph.run(&mut api).unwrap();
        indices.push(run.in_flight_index());
        signals.push((
            run.signal_semaphores().last().unwrap().clone(),
            *run.signal_values().last().unwrap(),
        ));
        run.execute_callbacks(&mut api);
    }
    assert_eq!(indices, [0, 1, 2, 0, 1, 2, 0]);

    // every frame signals its slot's timeline semaphore with an increasing value
    assert_eq!(signals[0].0, signals[3].0);
    assert_eq!(signals[0].1 + 1, signals[3].1);
    let (sem, value) = graph.slot_finished(0);
    assert_eq!(signals[6].0, *sem);
    assert_eq!(signals[6].1, value);
}

#[test]
fn rebuild_is_idempotent() {
    let mut api = TestApi::default();
    let mut graph = Graph::new(&mut api, 2).unwrap();

    let (a, _, _) = TestNode::new(vec![], vec![image_out("a")]);
    let (b, _, _) = TestNode::new(
        vec![image_in("src", 0), image_in("history", 1)],
        vec![image_out("acc")],
    );
    let a = graph.add_node("a", a).unwrap();
    let b = graph.add_node("b", b).unwrap();
    graph.connect_image(a, b, 0, 0).unwrap();
    graph.connect_image(b, b, 0, 1).unwrap();

    frame(&mut graph, &mut api);
    let topo_first = topology_names(&graph);
    let copies_first = backing_images(&graph, b, 0).len();
    let sets_first = graph.nodes[b].sets.len();
    let batch_sizes_first: Vec<usize> = graph.nodes[b]
        .batches
        .iter()
        .map(|batch| batch.images.len())
        .collect();

    graph.request_rebuild();
    frame(&mut graph, &mut api);

    assert_eq!(topology_names(&graph), topo_first);
    assert_eq!(backing_images(&graph, b, 0).len(), copies_first);
    assert_eq!(graph.nodes[b].sets.len(), sets_first);
    let batch_sizes_second: Vec<usize> = graph.nodes[b]
        .batches
        .iter()
        .map(|batch| batch.images.len())
        .collect();
    assert_eq!(batch_sizes_first, batch_sizes_second);
}

#[test]
fn skipped_node_still_gets_its_barriers() {
    let mut api = TestApi::default();
    let mut graph = Graph::new(&mut api, 2).unwrap();

    let (a, _, _) = TestNode::new(vec![], vec![image_out("a")]);
    let (mut b, log_b, _) = TestNode::new(vec![image_in("in", 0)], vec![]);
    b.skip = true;
    let a = graph.add_node("a", a).unwrap();
    let b = graph.add_node("b", b).unwrap();
    graph.connect_image(a, b, 0, 0).unwrap();

    frame(&mut graph, &mut api);
    let cmd = frame(&mut graph, &mut api);

    assert!(log_b.borrow().is_empty());
    // both nodes' dependency batches are still recorded
    assert_eq!(cmd.batches.len(), 2);
}

#[test]
fn submit_callbacks_fire_in_fifo_order() {
    let mut api = TestApi::default();
    let mut graph = Graph::new(&mut api, 2).unwrap();

    struct CallbackNode {
        order: Rc<RefCell<Vec<u32>>>,
    }
    impl Node<TestApi> for CallbackNode {
        fn describe_outputs(&mut self, _inputs: &[ResolvedInput]) -> Vec<OutputConnector> {
            vec![image_out("out")]
        }
        fn process(
            &mut self,
            _api: &mut TestApi,
            run: &mut GraphRun<'_, TestApi>,
            _io: &NodeIo<TestApi>,
        ) -> Result<(), anyhow::Error> {
            let first = self.order.clone();
            let second = self.order.clone();
            run.add_submit_callback(move |_api| first.borrow_mut().push(1));
            run.add_submit_callback(move |_api| second.borrow_mut().push(2));
            Ok(())
        }
    }

    let order = Rc::new(RefCell::new(Vec::new()));
    graph
        .add_node(
            "cb",
            CallbackNode {
                order: order.clone(),
            },
        )
        .unwrap();

    let run = graph.run(&mut api).unwrap();
    assert!(order.borrow().is_empty());
    run.execute_callbacks(&mut api);
    assert_eq!(*order.borrow(), [1, 2]);
}

#[test]
fn failing_node_aborts_the_frame() {
    let mut api = TestApi::default();
    let mut graph = Graph::new(&mut api, 2).unwrap();

    struct FailingNode;
    impl Node<TestApi> for FailingNode {
        fn describe_outputs(&mut self, _inputs: &[ResolvedInput]) -> Vec<OutputConnector> {
            vec![image_out("out")]
        }
        fn process(
            &mut self,
            _api: &mut TestApi,
            _run: &mut GraphRun<'_, TestApi>,
            _io: &NodeIo<TestApi>,
        ) -> Result<(), anyhow::Error> {
            anyhow::bail!("shader blew up")
        }
    }

    graph.add_node("boom", FailingNode).unwrap();
    let err = graph.run(&mut api).unwrap_err();
    assert!(matches!(err, RunError::Node { .. }));
}

#[test]
fn build_failure_keeps_previous_topology() {
    let mut api = TestApi::default();
    let mut graph = Graph::new(&mut api, 2).unwrap();

    let (a, _, _) = TestNode::new(vec![], vec![image_out("a")]);
    let (b, log_b, _) = TestNode::new(vec![image_in("in", 0)], vec![]);
    let a = graph.add_node("a", a).unwrap();
    let b = graph.add_node("b", b).unwrap();
    graph.connect_image(a, b, 0, 0).unwrap();
    frame(&mut graph, &mut api);

    // a new node with an unconnected input makes the next build fail
    let (c, _, _) = TestNode::new(vec![image_in("in", 0)], vec![]);
    graph.add_node("c", c).unwrap();
    assert!(graph.run(&mut api).is_err());

    // the previous schedule is still intact and usable
    assert_eq!(topology_names(&graph), ["a", "b"]);
    assert_eq!(log_b.borrow().len(), 1);
}
