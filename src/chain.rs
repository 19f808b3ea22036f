//! Per-request chain assembly.
//!
//! A [`Chain`] is built fresh for every request from registry snapshots. It
//! fixes the order the handlers run in and the [`ExecutionMode`] used to run
//! them. [`Chain::execute`] runs it.

use crate::interceptor::{FailureHandler, Snapshot, SuccessHandler};
use std::fmt;

/// How the pre-send half of a chain is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Pre-send handlers run inline, before the returned future is first polled.
    Direct,
    /// Every step is scheduled as a continuation of the previous one.
    Suspended,
}

impl ExecutionMode {
    /// Returns `true` for [`ExecutionMode::Direct`].
    pub fn is_direct(self) -> bool {
        self == ExecutionMode::Direct
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Direct => f.write_str("direct"),
            ExecutionMode::Suspended => f.write_str("suspended"),
        }
    }
}

/// One `(success, failure)` pair of an assembled chain.
pub(crate) struct Step<T, E> {
    pub(crate) on_fulfilled: SuccessHandler<T, E>,
    pub(crate) on_rejected: Option<FailureHandler<T, E>>,
}

impl<T, E> Clone for Step<T, E> {
    fn clone(&self) -> Self {
        Self {
            on_fulfilled: self.on_fulfilled.clone(),
            on_rejected: self.on_rejected.clone(),
        }
    }
}

/// The ordered handler sequences for a single request.
///
/// - `C` is the request configuration seen by pre-send handlers.
/// - `R` is the response seen by post-receive handlers.
/// - `E` is the failure type shared by every step and the transport.
pub struct Chain<C, R, E> {
    pub(crate) pre: Vec<Step<C, E>>,
    pub(crate) post: Vec<Step<R, E>>,
    pub(crate) mode: ExecutionMode,
}

impl<C, R, E> Chain<C, R, E> {
    /// Builds the chain for one request.
    ///
    /// Activated pre-send interceptors are placed in reverse registration
    /// order, so the most recently registered one sees the configuration
    /// first. Post-receive interceptors keep registration order and ignore
    /// activation predicates. The mode is [`ExecutionMode::Direct`] only when
    /// every activated pre-send interceptor is synchronous, which includes
    /// the case of none at all.
    pub fn assemble(pre: &Snapshot<C, E>, post: &Snapshot<R, E>, config: &C) -> Self {
        let mut all_synchronous = true;
        let mut pre_steps = Vec::with_capacity(pre.len());

        for interceptor in pre.iter().rev() {
            if !interceptor.is_active_for(config) {
                continue;
            }
            all_synchronous &= interceptor.is_synchronous();
            pre_steps.push(Step {
                on_fulfilled: interceptor.on_fulfilled().clone(),
                on_rejected: interceptor.on_rejected_handler().cloned(),
            });
        }

        let post_steps = post
            .iter()
            .map(|interceptor| Step {
                on_fulfilled: interceptor.on_fulfilled().clone(),
                on_rejected: interceptor.on_rejected_handler().cloned(),
            })
            .collect::<Vec<_>>();

        let mode = if all_synchronous {
            ExecutionMode::Direct
        } else {
            ExecutionMode::Suspended
        };

        tracing::debug!(
            mode = %mode,
            pre_registered = pre.len(),
            pre_active = pre_steps.len(),
            post = post_steps.len(),
            "Assembled interceptor chain"
        );

        Self {
            pre: pre_steps,
            post: post_steps,
            mode,
        }
    }

    /// The execution strategy chosen for this request.
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Number of activated pre-send steps.
    pub fn pre_len(&self) -> usize {
        self.pre.len()
    }

    /// Number of post-receive steps.
    pub fn post_len(&self) -> usize {
        self.post.len()
    }
}

impl<C, R, E> fmt::Debug for Chain<C, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("mode", &self.mode)
            .field("pre", &self.pre.len())
            .field("post", &self.post.len())
            .finish()
    }
}
