//! Expression graph & scheduler (spec §4.6, §5): a DAG of operation nodes
//! built by the caller, then submitted to a worker pool that dispatches
//! nodes as their predecessors complete. Re-architected per SPEC_FULL.md's
//! design note away from the original's intrusive reference-counted nodes
//! with raw back-pointers: nodes live in an arena (`Vec<Node>` behind a
//! lock) and edges are index pairs, matching the "arena + index edges"
//! redesign called for in spec §9.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};

use crate::algorithms::{self, assign, ewise, mxv, reduce, transpose};
use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::library::Library;
use crate::matrix::Matrix;
use crate::ops::{OpBinary, OpSelect};
use crate::scalar::Scalar;
use crate::shared::Shared;
use crate::types::Value;
use crate::vector::Vector;

pub type NodeId = usize;

/// A node's operation kind and its captured operands. Mirrors the kind
/// table of spec §4.6; `Vxm` carries the same operand shape as `Mxv` and
/// is executed by transposing the matrix and delegating to the `mxv`
/// registry (SPEC_FULL.md "Supplemented features").
enum NodeKind {
    MatrixWrite { matrix: Shared<Matrix>, rows: Vec<usize>, cols: Vec<usize>, values: Vec<Value>, accumulator: Option<Shared<OpBinary>> },
    MatrixRead { matrix: Shared<Matrix> },
    VectorWrite { vector: Shared<Vector>, indices: Vec<usize>, values: Vec<Value>, accumulator: Option<Shared<OpBinary>> },
    VectorRead { vector: Shared<Vector> },
    ScalarWrite { scalar: Shared<Scalar>, value: Value },
    ScalarRead { scalar: Shared<Scalar> },
    Mxv(mxv::MxvParams),
    Vxm(mxv::MxvParams),
    MReduce(reduce::MReduceParams),
    VReduce(reduce::VReduceParams),
    VSelectCount(assign::VSelectCountParams),
    Transpose(transpose::TransposeParams),
    VAssign(assign::VAssignParams),
    VEwiseAdd(ewise::VEwiseAddParams),
    MEwiseAdd(ewise::MEwiseAddParams),
    Callback(Mutex<Option<Box<dyn FnOnce() -> Result<()> + Send>>>),
}

/// Identity of the matrix/vector/scalar a node writes to, used to detect
/// unlinked concurrent writes (spec §7 `InvalidExpression`, §8 S6). Two
/// `Shared` handles to the same entity always produce the same id since
/// it's derived from the `Arc`'s backing address.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum EntityId {
    Vector(usize),
    Matrix(usize),
    Scalar(usize),
}

fn vector_entity(v: &Shared<Vector>) -> EntityId {
    EntityId::Vector(Shared::as_ptr(v) as *const () as usize)
}

fn matrix_entity(m: &Shared<Matrix>) -> EntityId {
    EntityId::Matrix(Shared::as_ptr(m) as *const () as usize)
}

fn scalar_entity(s: &Shared<Scalar>) -> EntityId {
    EntityId::Scalar(Shared::as_ptr(s) as *const () as usize)
}

impl NodeKind {
    fn op_name(&self) -> &'static str {
        match self {
            NodeKind::MatrixWrite { .. } => "matrix_write",
            NodeKind::MatrixRead { .. } => "matrix_read",
            NodeKind::VectorWrite { .. } => "vector_write",
            NodeKind::VectorRead { .. } => "vector_read",
            NodeKind::ScalarWrite { .. } => "scalar_write",
            NodeKind::ScalarRead { .. } => "scalar_read",
            NodeKind::Mxv(_) => "mxv",
            NodeKind::Vxm(_) => "vxm",
            NodeKind::MReduce(_) => "m_reduce",
            NodeKind::VReduce(_) => "v_reduce",
            NodeKind::VSelectCount(_) => "v_select_count",
            NodeKind::Transpose(_) => "transpose",
            NodeKind::VAssign(_) => "v_assign",
            NodeKind::VEwiseAdd(_) | NodeKind::MEwiseAdd(_) => "ewise_add",
            NodeKind::Callback(_) => "callback",
        }
    }

    /// The entity this node writes to, if any (spec §5 "two nodes that
    /// write the same matrix/vector must be linked"). `None` for read-only
    /// nodes and `callback`, which has no declared operand to conflict on.
    fn written_entity(&self) -> Option<EntityId> {
        match self {
            NodeKind::MatrixWrite { matrix, .. } => Some(matrix_entity(matrix)),
            NodeKind::VectorWrite { vector, .. } => Some(vector_entity(vector)),
            NodeKind::ScalarWrite { scalar, .. } => Some(scalar_entity(scalar)),
            NodeKind::Mxv(p) | NodeKind::Vxm(p) => Some(vector_entity(&p.out)),
            NodeKind::MReduce(p) => Some(scalar_entity(&p.out)),
            NodeKind::VReduce(p) => Some(scalar_entity(&p.out)),
            NodeKind::VSelectCount(p) => Some(scalar_entity(&p.out)),
            NodeKind::Transpose(p) => Some(matrix_entity(&p.out)),
            NodeKind::VAssign(p) => Some(vector_entity(&p.out)),
            NodeKind::VEwiseAdd(p) => Some(vector_entity(&p.out)),
            NodeKind::MEwiseAdd(p) => Some(matrix_entity(&p.out)),
            NodeKind::MatrixRead { .. }
            | NodeKind::VectorRead { .. }
            | NodeKind::ScalarRead { .. }
            | NodeKind::Callback(_) => None,
        }
    }
}

/// The host-observable output of a node that produces one (spec §6 "reads
/// produce ... on the host").
#[derive(Debug, Clone)]
pub enum NodeResult {
    MatrixRead { rows: Vec<usize>, cols: Vec<usize>, values: Vec<Value> },
    VectorRead { indices: Vec<usize>, values: Vec<Value> },
    ScalarRead { value: Option<Value> },
    SelectCount { count: u64 },
}

struct Node {
    kind: NodeKind,
    preds: Vec<NodeId>,
    succs: Vec<NodeId>,
    in_degree: AtomicUsize,
    result: Mutex<Option<NodeResult>>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Node { kind, preds: Vec::new(), succs: Vec::new(), in_degree: AtomicUsize::new(0), result: Mutex::new(None) }
    }
}

/// Expression lifecycle (spec §4.6): `Default -> Submitted -> Scheduled ->
/// Evaluating -> {Evaluated, Aborted}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    Default = 0,
    Submitted = 1,
    Scheduled = 2,
    Evaluating = 3,
    Evaluated = 4,
    Aborted = 5,
}

impl State {
    fn from_u8(v: u8) -> State {
        match v {
            0 => State::Default,
            1 => State::Submitted,
            2 => State::Scheduled,
            3 => State::Evaluating,
            4 => State::Evaluated,
            _ => State::Aborted,
        }
    }
}

/// A builder-then-scheduler for a DAG of operation nodes. Nodes are
/// appended via the `*_node` factories, wired with [`Expression::link`],
/// then handed to the worker pool by [`Expression::submit`].
pub struct Expression {
    nodes: RwLock<Vec<Node>>,
    state: AtomicU8,
    first_error: Mutex<Option<Error>>,
    next_queue: AtomicUsize,
}

impl Expression {
    pub fn new() -> Shared<Self> {
        Shared::new(Expression {
            nodes: RwLock::new(Vec::new()),
            state: AtomicU8::new(State::Default as u8),
            first_error: Mutex::new(None),
            next_queue: AtomicUsize::new(0),
        })
    }

    pub fn state(&self) -> State {
        State::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, s: State) {
        self.state.store(s as u8, Ordering::Release);
    }

    fn push(&self, kind: NodeKind) -> NodeId {
        let mut nodes = self.nodes.write();
        nodes.push(Node::new(kind));
        nodes.len() - 1
    }

    pub fn matrix_write_node(
        &self,
        matrix: Shared<Matrix>,
        rows: Vec<usize>,
        cols: Vec<usize>,
        values: Vec<Value>,
        accumulator: Option<Shared<OpBinary>>,
    ) -> NodeId {
        self.push(NodeKind::MatrixWrite { matrix, rows, cols, values, accumulator })
    }

    pub fn matrix_read_node(&self, matrix: Shared<Matrix>) -> NodeId {
        self.push(NodeKind::MatrixRead { matrix })
    }

    pub fn vector_write_node(
        &self,
        vector: Shared<Vector>,
        indices: Vec<usize>,
        values: Vec<Value>,
        accumulator: Option<Shared<OpBinary>>,
    ) -> NodeId {
        self.push(NodeKind::VectorWrite { vector, indices, values, accumulator })
    }

    pub fn vector_read_node(&self, vector: Shared<Vector>) -> NodeId {
        self.push(NodeKind::VectorRead { vector })
    }

    pub fn scalar_write_node(&self, scalar: Shared<Scalar>, value: Value) -> NodeId {
        self.push(NodeKind::ScalarWrite { scalar, value })
    }

    pub fn scalar_read_node(&self, scalar: Shared<Scalar>) -> NodeId {
        self.push(NodeKind::ScalarRead { scalar })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn mxv_node(
        &self,
        out: Shared<Vector>,
        mask: Option<Shared<Vector>>,
        matrix: Shared<Matrix>,
        input: Shared<Vector>,
        mult_op: Shared<OpBinary>,
        add_op: Shared<OpBinary>,
        descriptor: Descriptor,
    ) -> NodeId {
        self.push(NodeKind::Mxv(mxv::MxvParams { out, mask, matrix, input, mult_op, add_op, descriptor }))
    }

    /// `out = mask (matrix^T x[mult,add] in_vec)`, kept as its own node
    /// kind per spec.md's table but executed by transposing the matrix and
    /// delegating to the `mxv` registry (SPEC_FULL.md "vxm via
    /// transpose-and-delegate").
    #[allow(clippy::too_many_arguments)]
    pub fn vxm_node(
        &self,
        out: Shared<Vector>,
        mask: Option<Shared<Vector>>,
        matrix: Shared<Matrix>,
        input: Shared<Vector>,
        mult_op: Shared<OpBinary>,
        add_op: Shared<OpBinary>,
        descriptor: Descriptor,
    ) -> NodeId {
        self.push(NodeKind::Vxm(mxv::MxvParams { out, mask, matrix, input, mult_op, add_op, descriptor }))
    }

    pub fn m_reduce_node(&self, out: Shared<Scalar>, input: Shared<Matrix>, op: Shared<OpBinary>, init: Option<Value>) -> NodeId {
        self.push(NodeKind::MReduce(reduce::MReduceParams { out, input, op, init }))
    }

    pub fn v_reduce_node(&self, out: Shared<Scalar>, input: Shared<Vector>, op: Shared<OpBinary>, init: Option<Value>) -> NodeId {
        self.push(NodeKind::VReduce(reduce::VReduceParams { out, input, op, init }))
    }

    pub fn v_select_count_node(&self, out: Shared<Scalar>, input: Shared<Vector>, selector: Shared<OpSelect>) -> NodeId {
        self.push(NodeKind::VSelectCount(assign::VSelectCountParams { out, input, selector }))
    }

    pub fn transpose_node(&self, out: Shared<Matrix>, mask: Option<Shared<Matrix>>, input: Shared<Matrix>, descriptor: Descriptor) -> NodeId {
        self.push(NodeKind::Transpose(transpose::TransposeParams { out, mask, input, descriptor }))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn v_assign_node(
        &self,
        out: Shared<Vector>,
        mask: Option<Shared<Vector>>,
        input: Shared<Vector>,
        selector: Option<Shared<OpSelect>>,
        descriptor: Descriptor,
    ) -> NodeId {
        self.push(NodeKind::VAssign(assign::VAssignParams { out, mask, input, selector, descriptor }))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn v_ewise_add_node(
        &self,
        out: Shared<Vector>,
        mask: Option<Shared<Vector>>,
        a: Shared<Vector>,
        b: Shared<Vector>,
        op: Shared<OpBinary>,
        descriptor: Descriptor,
    ) -> NodeId {
        self.push(NodeKind::VEwiseAdd(ewise::VEwiseAddParams { out, mask, a, b, op, descriptor }))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn m_ewise_add_node(
        &self,
        out: Shared<Matrix>,
        mask: Option<Shared<Matrix>>,
        a: Shared<Matrix>,
        b: Shared<Matrix>,
        op: Shared<OpBinary>,
        descriptor: Descriptor,
    ) -> NodeId {
        self.push(NodeKind::MEwiseAdd(ewise::MEwiseAddParams { out, mask, a, b, op, descriptor }))
    }

    /// Runs `f` on a worker thread during evaluation (spec §4.6 `callback`,
    /// SPEC_FULL.md Open Question 2): `f` receives no reference to this
    /// expression, so it cannot observe or mutate the graph itself, only
    /// whatever operands it closed over.
    pub fn callback_node(&self, f: impl FnOnce() -> Result<()> + Send + 'static) -> NodeId {
        self.push(NodeKind::Callback(Mutex::new(Some(Box::new(f)))))
    }

    /// Adds a dependency edge `pred -> succ`. Rejected if it would create a
    /// cycle or duplicate an existing edge (spec §4.6 "a node may be linked
    /// at most once into one expression").
    pub fn link(&self, pred: NodeId, succ: NodeId) -> Result<()> {
        if pred == succ {
            return Err(Error::invalid_expression("a node cannot depend on itself"));
        }
        {
            let mut nodes = self.nodes.write();
            if pred >= nodes.len() || succ >= nodes.len() {
                return Err(Error::invalid_expression("link references an unknown node id"));
            }
            if nodes[pred].succs.contains(&succ) {
                return Err(Error::invalid_expression("duplicate link between the same two nodes"));
            }
            nodes[pred].succs.push(succ);
            nodes[succ].preds.push(pred);
        }
        if self.has_cycle() {
            let mut nodes = self.nodes.write();
            nodes[pred].succs.retain(|&s| s != succ);
            nodes[succ].preds.retain(|&p| p != pred);
            return Err(Error::invalid_expression("link would create a cycle"));
        }
        Ok(())
    }

    /// Kahn's algorithm: a graph has a cycle iff not every node can be
    /// peeled off by repeatedly removing zero-in-degree nodes.
    fn has_cycle(&self) -> bool {
        let nodes = self.nodes.read();
        let mut in_degree: Vec<usize> = nodes.iter().map(|n| n.preds.len()).collect();
        let mut frontier: Vec<NodeId> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut visited = 0;
        while let Some(id) = frontier.pop() {
            visited += 1;
            for &succ in &nodes[id].succs {
                in_degree[succ] -= 1;
                if in_degree[succ] == 0 {
                    frontier.push(succ);
                }
            }
        }
        visited != nodes.len()
    }

    /// True if two nodes write the same matrix/vector/scalar with no path
    /// between them in either direction (spec §7 `InvalidExpression`
    /// "unlinked concurrent writes"; spec §8 S6). Computed by a per-node
    /// forward-reachability BFS; quadratic in node count but expressions
    /// stay small relative to the matrix/vector data they operate over.
    fn has_unlinked_concurrent_writes(&self) -> bool {
        let nodes = self.nodes.read();
        let n = nodes.len();
        if n < 2 {
            return false;
        }

        let mut reachable = vec![vec![false; n]; n];
        for start in 0..n {
            let mut stack = vec![start];
            while let Some(id) = stack.pop() {
                for &succ in &nodes[id].succs {
                    if !reachable[start][succ] {
                        reachable[start][succ] = true;
                        stack.push(succ);
                    }
                }
            }
        }

        let mut writers: std::collections::HashMap<EntityId, Vec<NodeId>> = std::collections::HashMap::new();
        for (id, node) in nodes.iter().enumerate() {
            if let Some(entity) = node.kind.written_entity() {
                writers.entry(entity).or_default().push(id);
            }
        }

        writers.values().any(|ids| {
            ids.iter().enumerate().any(|(i, &a)| {
                ids[i + 1..].iter().any(|&b| !reachable[a][b] && !reachable[b][a])
            })
        })
    }

    fn abort(&self, err: Error) {
        let mut first = self.first_error.lock();
        if first.is_none() {
            tracing::error!(kind = err.kind_name(), "expression aborted: {}", err);
            *first = Some(err);
        }
        self.set_state(State::Aborted);
    }

    /// Runs one node's algorithm. Accelerator work would be routed to a
    /// round-robin queue index here (spec §5); the CPU backend has no
    /// per-queue state to route onto, so this only affects the log line.
    fn execute_node(&self, id: NodeId) -> Result<Option<NodeResult>> {
        let backend = Library::backend();
        let queue = self.next_queue.fetch_add(1, Ordering::Relaxed) % backend.queue_count().max(1);

        // Callback bodies run with no lock on the node arena held, since
        // they're arbitrary user code that must not be able to deadlock
        // against this expression's own bookkeeping.
        let pending_callback = {
            let nodes = self.nodes.read();
            tracing::debug!(node = id, op = nodes[id].kind.op_name(), queue, "dispatching node");
            match &nodes[id].kind {
                NodeKind::Callback(cell) => Some(cell.lock().take()),
                _ => None,
            }
        };
        if let Some(f) = pending_callback {
            return match f {
                Some(f) => f().map(|()| None),
                None => Ok(None),
            };
        }

        let nodes = self.nodes.read();
        let node = &nodes[id];
        match &node.kind {
            NodeKind::MatrixWrite { matrix, rows, cols, values, accumulator } => {
                matrix.build(rows, cols, values, accumulator.as_deref())?;
                Ok(None)
            }
            NodeKind::MatrixRead { matrix } => {
                let (rows, cols, values) = matrix.read();
                Ok(Some(NodeResult::MatrixRead { rows, cols, values }))
            }
            NodeKind::VectorWrite { vector, indices, values, accumulator } => {
                vector.build(indices, values, accumulator.as_deref())?;
                Ok(None)
            }
            NodeKind::VectorRead { vector } => {
                let (indices, values) = vector.read();
                Ok(Some(NodeResult::VectorRead { indices, values }))
            }
            NodeKind::ScalarWrite { scalar, value } => {
                scalar.set(value.clone());
                Ok(None)
            }
            NodeKind::ScalarRead { scalar } => Ok(Some(NodeResult::ScalarRead { value: scalar.get() })),
            NodeKind::Mxv(params) => {
                algorithms::MXV.dispatch(params)?;
                Ok(None)
            }
            NodeKind::Vxm(params) => {
                let transposed = Matrix::new(params.matrix.ty().clone(), params.matrix.ncols(), params.matrix.nrows());
                let tp = transpose::TransposeParams {
                    out: transposed.clone(),
                    mask: None,
                    input: params.matrix.clone(),
                    descriptor: Descriptor::new(),
                };
                algorithms::TRANSPOSE.dispatch(&tp)?;
                let mp = mxv::MxvParams {
                    out: params.out.clone(),
                    mask: params.mask.clone(),
                    matrix: transposed,
                    input: params.input.clone(),
                    mult_op: params.mult_op.clone(),
                    add_op: params.add_op.clone(),
                    descriptor: params.descriptor.clone(),
                };
                algorithms::MXV.dispatch(&mp)?;
                Ok(None)
            }
            NodeKind::MReduce(params) => {
                algorithms::M_REDUCE.dispatch(params)?;
                Ok(None)
            }
            NodeKind::VReduce(params) => {
                algorithms::V_REDUCE.dispatch(params)?;
                Ok(None)
            }
            NodeKind::VSelectCount(params) => {
                algorithms::V_SELECT_COUNT.dispatch(params)?;
                let count = match params.out.get() {
                    Some(Value::Uint(n)) => n,
                    _ => 0,
                };
                Ok(Some(NodeResult::SelectCount { count }))
            }
            NodeKind::Transpose(params) => {
                algorithms::TRANSPOSE.dispatch(params)?;
                Ok(None)
            }
            NodeKind::VAssign(params) => {
                algorithms::V_ASSIGN.dispatch(params)?;
                Ok(None)
            }
            NodeKind::VEwiseAdd(params) => {
                algorithms::V_EWISE_ADD.dispatch(params)?;
                Ok(None)
            }
            NodeKind::MEwiseAdd(params) => {
                algorithms::M_EWISE_ADD.dispatch(params)?;
                Ok(None)
            }
            NodeKind::Callback(_) => unreachable!("callback nodes are handled before this match"),
        }
    }

    /// Submits the graph to the worker pool. Computes a topological order
    /// (rejecting cycles as `InvalidExpression`), then dispatches the
    /// zero-in-degree frontier; each completed node dispatches any
    /// successor whose in-degree has just reached zero (spec §4.6).
    pub fn submit(self: &Shared<Self>) -> Result<Submission> {
        if self.state() != State::Default {
            return Err(Error::invalid_state("expression already submitted"));
        }
        algorithms::ensure_installed();
        self.set_state(State::Submitted);
        if self.has_cycle() {
            self.abort(Error::invalid_expression("cycle detected at submission"));
            let (tx, rx) = bounded(1);
            let _ = tx.send(());
            return Ok(Submission { expression: self.clone(), done: rx });
        }
        if self.has_unlinked_concurrent_writes() {
            self.abort(Error::invalid_expression(
                "two nodes write the same matrix/vector/scalar with no dependency edge between them",
            ));
            let (tx, rx) = bounded(1);
            let _ = tx.send(());
            return Ok(Submission { expression: self.clone(), done: rx });
        }

        let n = {
            let nodes = self.nodes.read();
            for node in nodes.iter() {
                node.in_degree.store(node.preds.len(), Ordering::Relaxed);
            }
            nodes.len()
        };
        self.set_state(State::Scheduled);
        self.set_state(State::Evaluating);

        let (done_tx, done_rx) = bounded(1);
        if n == 0 {
            self.set_state(State::Evaluated);
            let _ = done_tx.send(());
            return Ok(Submission { expression: self.clone(), done: done_rx });
        }

        let remaining = Shared::new(AtomicUsize::new(n));
        let frontier: Vec<NodeId> = {
            let nodes = self.nodes.read();
            (0..n).filter(|&i| nodes[i].preds.is_empty()).collect()
        };
        for id in frontier {
            Self::spawn_node(self.clone(), id, remaining.clone(), done_tx.clone());
        }
        Ok(Submission { expression: self.clone(), done: done_rx })
    }

    fn spawn_node(expr: Shared<Expression>, id: NodeId, remaining: Shared<AtomicUsize>, done_tx: Sender<()>) {
        rayon::spawn(move || {
            // Re-check abortion right before running, per spec §4.6: "each
            // task, before running, re-checks the expression state; if it
            // is Aborted it returns immediately".
            if expr.state() == State::Aborted {
                Self::finish_one(&expr, &remaining, &done_tx);
                return;
            }
            match expr.execute_node(id) {
                Ok(result) => {
                    *expr.nodes.read()[id].result.lock() = result;
                    let succs = expr.nodes.read()[id].succs.clone();
                    for succ in succs {
                        let prev = expr.nodes.read()[succ].in_degree.fetch_sub(1, Ordering::AcqRel);
                        if prev == 1 {
                            Self::spawn_node(expr.clone(), succ, remaining.clone(), done_tx.clone());
                        }
                    }
                }
                Err(err) => expr.abort(err),
            }
            Self::finish_one(&expr, &remaining, &done_tx);
        });
    }

    fn finish_one(expr: &Shared<Expression>, remaining: &Shared<AtomicUsize>, done_tx: &Sender<()>) {
        if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            if expr.state() != State::Aborted {
                expr.set_state(State::Evaluated);
            }
            let _ = done_tx.send(());
        }
    }

    fn result(&self, node: NodeId) -> Option<NodeResult> {
        self.nodes.read().get(node).and_then(|n| n.result.lock().clone())
    }
}

/// Handle returned by [`Expression::submit`]: waits for the graph to reach
/// a terminal state and exposes the first error, if any (spec §6).
pub struct Submission {
    expression: Shared<Expression>,
    done: Receiver<()>,
}

impl Submission {
    /// Blocks until the expression reaches `Evaluated` or `Aborted`.
    pub fn wait(&self) -> State {
        let _ = self.done.recv();
        self.expression.state()
    }

    pub fn state(&self) -> State {
        self.expression.state()
    }

    /// The first error captured across the graph, if it ended `Aborted`
    /// (spec §7: "the user observes the first original error ... secondary
    /// Aborteds are not surfaced").
    pub fn error(&self) -> Option<String> {
        self.expression.first_error.lock().as_ref().map(|e| e.to_string())
    }

    pub fn result(&self, node: NodeId) -> Option<NodeResult> {
        self.expression.result(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::builtin;
    use crate::types::INT;

    #[test]
    fn scalar_round_trip_evaluates() {
        let expr = Expression::new();
        let scalar = Scalar::new(INT.clone());
        let write = expr.scalar_write_node(scalar.clone(), Value::Int(42));
        let read = expr.scalar_read_node(scalar.clone());
        expr.link(write, read).unwrap();

        let submission = expr.submit().unwrap();
        assert_eq!(submission.wait(), State::Evaluated);
        assert!(matches!(submission.result(read), Some(NodeResult::ScalarRead { value: Some(Value::Int(42)) })));
    }

    #[test]
    fn vector_build_with_accumulator_combines_duplicates() {
        let expr = Expression::new();
        let v = Vector::new(INT.clone(), 6);
        let write = expr.vector_write_node(
            v.clone(),
            vec![3, 1, 3, 0],
            vec![Value::Int(10), Value::Int(20), Value::Int(7), Value::Int(5)],
            Some(builtin::plus_int()),
        );
        let read = expr.vector_read_node(v.clone());
        expr.link(write, read).unwrap();

        let submission = expr.submit().unwrap();
        assert_eq!(submission.wait(), State::Evaluated);
        match submission.result(read) {
            Some(NodeResult::VectorRead { indices, values }) => {
                assert_eq!(indices, vec![0, 1, 3]);
                assert_eq!(values, vec![Value::Int(5), Value::Int(20), Value::Int(17)]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn self_loop_is_rejected() {
        let expr = Expression::new();
        let scalar = Scalar::new(INT.clone());
        let node = expr.scalar_write_node(scalar, Value::Int(1));
        assert!(matches!(expr.link(node, node), Err(Error::InvalidExpression(_))));
    }

    #[test]
    fn cycle_is_rejected_at_link_time() {
        let expr = Expression::new();
        let scalar = Scalar::new(INT.clone());
        let a = expr.scalar_write_node(scalar.clone(), Value::Int(1));
        let b = expr.scalar_read_node(scalar);
        expr.link(a, b).unwrap();
        assert!(matches!(expr.link(b, a), Err(Error::InvalidExpression(_))));
    }

    #[test]
    fn unlinked_concurrent_writes_abort_the_expression() {
        // S6: two writes to the same vector with no edge between them.
        let expr = Expression::new();
        let v = Vector::new(INT.clone(), 4);
        expr.vector_write_node(v.clone(), vec![0], vec![Value::Int(1)], None);
        expr.vector_write_node(v.clone(), vec![0], vec![Value::Int(2)], None);
        let submission = expr.submit().unwrap();
        assert_eq!(submission.wait(), State::Aborted);
        assert!(submission.error().unwrap().starts_with("invalid expression"));
        assert_eq!(v.get(0).unwrap(), None);
    }

    #[test]
    fn callback_failure_aborts_the_expression() {
        let expr = Expression::new();
        let scalar = Scalar::new(INT.clone());
        let write = expr.scalar_write_node(scalar.clone(), Value::Int(1));
        let callback = expr.callback_node(|| Err(Error::invalid_state("boom")));
        let read = expr.scalar_read_node(scalar);
        expr.link(write, callback).unwrap();
        expr.link(callback, read).unwrap();

        let submission = expr.submit().unwrap();
        assert_eq!(submission.wait(), State::Aborted);
        assert!(submission.error().unwrap().contains("boom"));
    }

    #[test]
    fn mxv_through_expression_matches_direct_dispatch() {
        let matrix = Matrix::new(INT.clone(), 2, 2);
        matrix.set(0, 0, Value::Int(2), None).unwrap();
        let input = Vector::new(INT.clone(), 2);
        input.set(0, Value::Int(3), None).unwrap();
        let out = Vector::new(INT.clone(), 2);

        let expr = Expression::new();
        let node = expr.mxv_node(out.clone(), None, matrix, input, builtin::times_int(), builtin::plus_int(), Descriptor::new());
        let submission = expr.submit().unwrap();
        assert_eq!(submission.wait(), State::Evaluated);
        let _ = node;
        assert_eq!(out.get(0).unwrap(), Some(Value::Int(6)));
    }
}
