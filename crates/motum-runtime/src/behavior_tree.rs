//! Tick-result behaviour tree.
//!
//! The control loop is one tree of named leaves ticked once per control
//! cycle against a shared context.  Every node returns a [`TickResult`]:
//!
//! | Result | Meaning |
//! |---|---|
//! | [`TickResult::Succeed`] | the node's work is done |
//! | [`TickResult::Continue`] | still running; stop here and come back next tick |
//! | [`TickResult::Fail`] | the node failed, with the reason |
//!
//! # Composites
//!
//! | Node type    | Description                                                          |
//! |--------------|----------------------------------------------------------------------|
//! | [`Sequence`] | Ticks children in order; stops at the first `Fail` or `Continue`.    |
//! | [`Selector`] | Ticks children in order; stops at the first `Succeed` or `Continue`. |
//! | [`Leaf`]     | Runs a closure over the context and returns its result.              |
//!
//! [`Sequence`]: BehaviorNode::Sequence
//! [`Selector`]: BehaviorNode::Selector
//! [`Leaf`]: BehaviorNode::Leaf
//!
//! # Example
//!
//! ```rust
//! use motum_runtime::behavior_tree::{BehaviorNode, TickResult};
//!
//! let mut tree = BehaviorNode::sequence("count", vec![
//!     BehaviorNode::leaf("bump", |n: &mut u32| {
//!         *n += 1;
//!         TickResult::Succeed
//!     }),
//!     BehaviorNode::leaf("enough", |n: &mut u32| {
//!         if *n >= 3 { TickResult::Succeed } else { TickResult::Continue }
//!     }),
//! ]);
//!
//! let mut n = 0;
//! assert_eq!(tree.tick(&mut n), TickResult::Continue);
//! assert_eq!(tree.tick(&mut n), TickResult::Continue);
//! assert_eq!(tree.tick(&mut n), TickResult::Succeed);
//! ```

use motum_types::MotumError;

// ─────────────────────────────────────────────────────────────────────────────
// TickResult
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of ticking a node once.
#[derive(Debug, Clone, PartialEq)]
pub enum TickResult {
    Continue,
    Succeed,
    Fail(MotumError),
}

impl TickResult {
    /// `Continue` and `Succeed` are not failures.
    pub fn is_fail(&self) -> bool {
        matches!(self, TickResult::Fail(_))
    }

    /// `Succeed` and `Fail` end whatever was ticking.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TickResult::Continue)
    }
}

impl From<Result<(), MotumError>> for TickResult {
    fn from(result: Result<(), MotumError>) -> Self {
        match result {
            Ok(()) => TickResult::Succeed,
            Err(e) => TickResult::Fail(e),
        }
    }
}

/// Run `children` in order until one does not succeed.
pub fn sequence<I>(children: I) -> TickResult
where
    I: IntoIterator,
    I::Item: FnOnce() -> TickResult,
{
    for child in children {
        match child() {
            TickResult::Succeed => continue,
            other => return other,
        }
    }
    TickResult::Succeed
}

/// Run `children` in order until one does not fail.  When every child fails
/// the last failure is returned; an empty selector fails with `empty`.
pub fn selector<I>(children: I, empty: impl FnOnce() -> MotumError) -> TickResult
where
    I: IntoIterator,
    I::Item: FnOnce() -> TickResult,
{
    let mut last = None;
    for child in children {
        match child() {
            TickResult::Fail(e) => last = Some(e),
            other => return other,
        }
    }
    TickResult::Fail(last.unwrap_or_else(empty))
}

// ─────────────────────────────────────────────────────────────────────────────
// BehaviorNode
// ─────────────────────────────────────────────────────────────────────────────

type Action<C> = Box<dyn FnMut(&mut C) -> TickResult + Send>;

/// A node in a behaviour tree over context `C`.
pub enum BehaviorNode<C> {
    Sequence {
        name: String,
        children: Vec<BehaviorNode<C>>,
    },
    Selector {
        name: String,
        children: Vec<BehaviorNode<C>>,
    },
    Leaf {
        name: String,
        action: Action<C>,
    },
}

impl<C> BehaviorNode<C> {
    /// `action` is called exactly once per [`tick`][BehaviorNode::tick] that
    /// reaches it.
    pub fn leaf(name: impl Into<String>, action: impl FnMut(&mut C) -> TickResult + Send + 'static) -> Self {
        BehaviorNode::Leaf {
            name: name.into(),
            action: Box::new(action),
        }
    }

    pub fn sequence(name: impl Into<String>, children: Vec<BehaviorNode<C>>) -> Self {
        BehaviorNode::Sequence {
            name: name.into(),
            children,
        }
    }

    pub fn selector(name: impl Into<String>, children: Vec<BehaviorNode<C>>) -> Self {
        BehaviorNode::Selector {
            name: name.into(),
            children,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            BehaviorNode::Sequence { name, .. }
            | BehaviorNode::Selector { name, .. }
            | BehaviorNode::Leaf { name, .. } => name,
        }
    }

    /// Names of every leaf, depth first.
    pub fn leaves(&self) -> Vec<&str> {
        match self {
            BehaviorNode::Leaf { name, .. } => vec![name.as_str()],
            BehaviorNode::Sequence { children, .. } | BehaviorNode::Selector { children, .. } => {
                children.iter().flat_map(BehaviorNode::leaves).collect()
            }
        }
    }

    pub fn tick(&mut self, ctx: &mut C) -> TickResult {
        match self {
            BehaviorNode::Leaf { action, .. } => action(ctx),
            BehaviorNode::Sequence { children, .. } => {
                for child in children.iter_mut() {
                    match child.tick(ctx) {
                        TickResult::Succeed => continue,
                        other => return other,
                    }
                }
                TickResult::Succeed
            }
            BehaviorNode::Selector { name, children } => {
                let mut last = None;
                for child in children.iter_mut() {
                    match child.tick(ctx) {
                        TickResult::Fail(e) => last = Some(e),
                        other => return other,
                    }
                }
                TickResult::Fail(
                    last.unwrap_or_else(|| MotumError::InvalidGoal(format!("selector \"{name}\" has no children"))),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Trace = Vec<&'static str>;

    fn leaf(name: &'static str, result: TickResult) -> BehaviorNode<Trace> {
        BehaviorNode::leaf(name, move |trace: &mut Trace| {
            trace.push(name);
            result.clone()
        })
    }

    fn fail() -> TickResult {
        TickResult::Fail(MotumError::InfeasibleSolve("no".into()))
    }

    #[test]
    fn sequence_runs_all_children_on_success() {
        let mut tree = BehaviorNode::sequence(
            "s",
            vec![leaf("a", TickResult::Succeed), leaf("b", TickResult::Succeed)],
        );
        let mut trace = Trace::new();
        assert_eq!(tree.tick(&mut trace), TickResult::Succeed);
        assert_eq!(trace, vec!["a", "b"]);
    }

    #[test]
    fn sequence_stops_at_first_failure() {
        let mut tree = BehaviorNode::sequence(
            "s",
            vec![leaf("a", TickResult::Succeed), leaf("b", fail()), leaf("c", TickResult::Succeed)],
        );
        let mut trace = Trace::new();
        assert_eq!(tree.tick(&mut trace), fail());
        assert_eq!(trace, vec!["a", "b"]);
    }

    #[test]
    fn sequence_pauses_on_continue() {
        let mut tree = BehaviorNode::sequence(
            "s",
            vec![leaf("a", TickResult::Continue), leaf("b", TickResult::Succeed)],
        );
        let mut trace = Trace::new();
        assert_eq!(tree.tick(&mut trace), TickResult::Continue);
        assert_eq!(trace, vec!["a"]);
    }

    #[test]
    fn empty_sequence_succeeds() {
        let mut tree = BehaviorNode::<Trace>::sequence("s", vec![]);
        assert_eq!(tree.tick(&mut Trace::new()), TickResult::Succeed);
    }

    #[test]
    fn selector_stops_at_first_success() {
        let mut tree = BehaviorNode::selector(
            "sel",
            vec![leaf("a", fail()), leaf("b", TickResult::Succeed), leaf("c", fail())],
        );
        let mut trace = Trace::new();
        assert_eq!(tree.tick(&mut trace), TickResult::Succeed);
        assert_eq!(trace, vec!["a", "b"]);
    }

    #[test]
    fn selector_returns_last_failure() {
        let mut tree = BehaviorNode::selector(
            "sel",
            vec![
                leaf("a", TickResult::Fail(MotumError::Cancelled("first".into()))),
                leaf("b", fail()),
            ],
        );
        assert_eq!(tree.tick(&mut Trace::new()), fail());
    }

    #[test]
    fn selector_pauses_on_continue() {
        let mut tree = BehaviorNode::selector(
            "sel",
            vec![leaf("a", fail()), leaf("b", TickResult::Continue), leaf("c", TickResult::Succeed)],
        );
        let mut trace = Trace::new();
        assert_eq!(tree.tick(&mut trace), TickResult::Continue);
        assert_eq!(trace, vec!["a", "b"]);
    }

    #[test]
    fn empty_selector_fails_with_its_name() {
        let mut tree = BehaviorNode::<Trace>::selector("sync", vec![]);
        let TickResult::Fail(e) = tree.tick(&mut Trace::new()) else {
            panic!("expected failure");
        };
        assert!(e.to_string().contains("sync"));
    }

    #[test]
    fn nested_selector_inside_sequence() {
        let mut tree = BehaviorNode::sequence(
            "outer",
            vec![
                BehaviorNode::selector("pick", vec![leaf("x", fail()), leaf("y", TickResult::Succeed)]),
                leaf("z", TickResult::Succeed),
            ],
        );
        let mut trace = Trace::new();
        assert_eq!(tree.tick(&mut trace), TickResult::Succeed);
        assert_eq!(trace, vec!["x", "y", "z"]);
        assert_eq!(tree.leaves(), vec!["x", "y", "z"]);
        assert_eq!(tree.name(), "outer");
    }

    #[test]
    fn combinator_functions_match_node_semantics() {
        let calls = std::cell::Cell::new(0);
        let step = |r: TickResult| {
            let calls = &calls;
            move || {
                calls.set(calls.get() + 1);
                r
            }
        };
        assert_eq!(sequence([step(TickResult::Succeed), step(fail()), step(TickResult::Succeed)]), fail());
        assert_eq!(calls.get(), 2);

        calls.set(0);
        let r = selector([step(fail()), step(TickResult::Succeed)], || MotumError::InvalidGoal("empty".into()));
        assert_eq!(r, TickResult::Succeed);
        assert_eq!(calls.get(), 2);

        let none: [fn() -> TickResult; 0] = [];
        assert_eq!(
            selector(none, || MotumError::InvalidGoal("empty".into())),
            TickResult::Fail(MotumError::InvalidGoal("empty".into()))
        );
    }

    #[test]
    fn results_convert_from_unit_results() {
        assert_eq!(TickResult::from(Ok(())), TickResult::Succeed);
        assert!(TickResult::from(Err(MotumError::Cancelled("x".into()))).is_fail());
        assert!(!TickResult::Continue.is_terminal());
    }
}
