//! Chain execution.
//!
//! Two strategies share the same [`Chain`] data:
//!
//! - [`run_suspended`] folds every step, the transport call and the
//!   post-receive steps into one sequential future.
//! - [`run_direct`] runs the pre-send steps inline at call time and only
//!   suspends from the transport call onward.
//!
//! Both settle exactly once, with the same ordering and failure routing,
//! except that a failing pre-send success handler in the direct strategy
//! ends the pre-send phase: no further pre-send handler runs, and dispatch
//! goes ahead with the recovered configuration (or, without a failure
//! handler, the configuration as it stood before the failing step).

use crate::chain::{Chain, ExecutionMode, Step};
use crate::interceptor::Handler;
use crate::transport::Transport;
use futures::future::BoxFuture;
use std::sync::Arc;

impl<C, R, E> Chain<C, R, E>
where
    C: Clone + Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
{
    /// Runs the chain around one transport call.
    ///
    /// In [`ExecutionMode::Direct`] the pre-send handlers, and the invocation
    /// of the transport, happen before this function returns. The outcome is
    /// always observed by awaiting the returned future.
    ///
    /// # Panics
    ///
    /// Handlers and transports report failures through `Err`. If one panics
    /// instead, the panic is not caught: in the direct mode it unwinds out of
    /// this call, otherwise out of the returned future.
    pub fn execute<T>(self, config: C, transport: Arc<T>) -> BoxFuture<'static, Result<R, E>>
    where
        T: Transport<C, R, E> + ?Sized + 'static,
    {
        match self.mode {
            ExecutionMode::Direct => run_direct(self.pre, self.post, config, transport),
            ExecutionMode::Suspended => run_suspended(self.pre, self.post, config, transport),
        }
    }
}

/// Runs every step as a continuation of the previous one.
pub(crate) fn run_suspended<C, R, E, T>(
    pre: Vec<Step<C, E>>,
    post: Vec<Step<R, E>>,
    config: C,
    transport: Arc<T>,
) -> BoxFuture<'static, Result<R, E>>
where
    C: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
    T: Transport<C, R, E> + ?Sized + 'static,
{
    Box::pin(async move {
        let mut state = Ok(config);
        for step in &pre {
            state = settle(step, state).await;
        }

        let response = match state {
            Ok(config) => transport.dispatch(config).await,
            Err(error) => {
                tracing::debug!("Pre-send chain settled as failure; skipping dispatch");
                Err(error)
            }
        };

        fold_post(post, response).await
    })
}

/// Runs the pre-send steps inline, then dispatches.
///
/// A step whose handler may suspend hands the remaining steps over to
/// [`run_suspended`]. Assembly only picks the direct strategy when every
/// pre-send handler is synchronous, so this is a fallback, not a path taken
/// by assembled chains.
pub(crate) fn run_direct<C, R, E, T>(
    pre: Vec<Step<C, E>>,
    post: Vec<Step<R, E>>,
    mut config: C,
    transport: Arc<T>,
) -> BoxFuture<'static, Result<R, E>>
where
    C: Clone + Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
    T: Transport<C, R, E> + ?Sized + 'static,
{
    let mut steps = pre.into_iter().enumerate();

    while let Some((index, step)) = steps.next() {
        let on_fulfilled = match &step.on_fulfilled {
            Handler::Sync(on_fulfilled) => Some(Arc::clone(on_fulfilled)),
            Handler::Async(_) => None,
        };
        let Some(on_fulfilled) = on_fulfilled else {
            let rest = std::iter::once(step).chain(steps.map(|(_, step)| step)).collect();
            return run_suspended(rest, post, config, transport);
        };

        let error = match on_fulfilled(config.clone()) {
            Ok(next) => {
                config = next;
                continue;
            }
            Err(error) => error,
        };

        tracing::debug!(
            step = index,
            "Pre-send handler failed; skipping remaining pre-send handlers"
        );

        match step.on_rejected {
            None => {}
            Some(Handler::Sync(on_rejected)) => match on_rejected(error) {
                Ok(recovered) => config = recovered,
                Err(error) => return Box::pin(futures::future::ready(Err(error))),
            },
            Some(Handler::Async(on_rejected)) => {
                let recovering = on_rejected(error);
                return Box::pin(async move {
                    let config = recovering.await?;
                    fold_post(post, transport.dispatch(config).await).await
                });
            }
        }
        break;
    }

    let dispatched = transport.dispatch(config);
    Box::pin(async move { fold_post(post, dispatched.await).await })
}

async fn fold_post<R, E>(post: Vec<Step<R, E>>, mut state: Result<R, E>) -> Result<R, E>
where
    R: Send + 'static,
    E: Send + 'static,
{
    for step in &post {
        state = settle(step, state).await;
    }
    state
}

/// Attaches one `(success, failure)` pair to a settled state.
///
/// A failure without a failure handler passes through unchanged.
async fn settle<T, E>(step: &Step<T, E>, state: Result<T, E>) -> Result<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    match state {
        Ok(value) => step.on_fulfilled.call(value).await,
        Err(error) => match &step.on_rejected {
            Some(on_rejected) => on_rejected.call(error).await,
            None => Err(error),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::{Interceptor, InterceptorManager};
    use parking_lot::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn logging(log: &Log, name: &'static str) -> Interceptor<Vec<String>, String> {
        let log = Arc::clone(log);
        Interceptor::sync(move |mut config: Vec<String>| {
            log.lock().push(name.to_string());
            config.push(name.to_string());
            Ok(config)
        })
        .synchronous(true)
    }

    fn failing(log: &Log, name: &'static str) -> Interceptor<Vec<String>, String> {
        let log = Arc::clone(log);
        Interceptor::sync(move |_config: Vec<String>| {
            log.lock().push(name.to_string());
            Err(format!("{} failed", name))
        })
        .synchronous(true)
    }

    fn echo_transport(log: &Log) -> Arc<impl Transport<Vec<String>, Vec<String>, String>> {
        let log = Arc::clone(log);
        Arc::new(move |config: Vec<String>| {
            log.lock().push("dispatch".to_string());
            async move { Ok::<_, String>(config) }
        })
    }

    fn chain(
        pre: &InterceptorManager<Vec<String>, String>,
    ) -> Chain<Vec<String>, Vec<String>, String> {
        Chain::assemble(&pre.snapshot(), &InterceptorManager::new().snapshot(), &Vec::new())
    }

    #[tokio::test]
    async fn test_direct_runs_pre_send_before_first_poll() {
        let log = Log::default();
        let pre = InterceptorManager::new();
        pre.use_interceptor(logging(&log, "a"));
        pre.use_interceptor(logging(&log, "b"));

        let chain = chain(&pre);
        assert_eq!(chain.mode(), ExecutionMode::Direct);

        let pending = chain.execute(Vec::new(), echo_transport(&log));
        assert_eq!(*log.lock(), vec!["b", "a", "dispatch"]);

        assert_eq!(pending.await.unwrap(), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_suspended_runs_nothing_before_first_poll() {
        let log = Log::default();
        let pre = InterceptorManager::new();
        pre.use_interceptor(logging(&log, "a"));
        pre.use_interceptor(logging(&log, "b").synchronous(false));

        let chain = chain(&pre);
        assert_eq!(chain.mode(), ExecutionMode::Suspended);

        let pending = chain.execute(Vec::new(), echo_transport(&log));
        assert!(log.lock().is_empty());

        assert_eq!(pending.await.unwrap(), vec!["b", "a"]);
        assert_eq!(*log.lock(), vec!["b", "a", "dispatch"]);
    }

    #[tokio::test]
    async fn test_direct_failure_without_handler_dispatches_previous_config() {
        let log = Log::default();
        let pre = InterceptorManager::new();
        pre.use_interceptor(logging(&log, "a"));
        pre.use_interceptor(failing(&log, "b"));
        pre.use_interceptor(logging(&log, "c"));

        let result = chain(&pre)
            .execute(Vec::new(), echo_transport(&log))
            .await;

        // "a" never runs: the failure in "b" ends the pre-send phase.
        assert_eq!(result.unwrap(), vec!["c"]);
        assert_eq!(*log.lock(), vec!["c", "b", "dispatch"]);
    }

    #[tokio::test]
    async fn test_direct_failure_dispatches_recovered_config() {
        let log = Log::default();
        let pre = InterceptorManager::new();
        pre.use_interceptor(logging(&log, "a"));
        pre.use_interceptor(
            failing(&log, "b").on_rejected_sync(|error| Ok(vec![format!("recovered: {}", error)])),
        );

        let result = chain(&pre)
            .execute(Vec::new(), echo_transport(&log))
            .await;

        assert_eq!(result.unwrap(), vec!["recovered: b failed"]);
        assert_eq!(*log.lock(), vec!["b", "dispatch"]);
    }

    #[tokio::test]
    async fn test_direct_failing_failure_handler_skips_dispatch() {
        let log = Log::default();
        let pre = InterceptorManager::new();
        pre.use_interceptor(logging(&log, "a"));
        pre.use_interceptor(
            failing(&log, "b").on_rejected_sync(|error| Err(format!("still {}", error))),
        );

        let result = chain(&pre)
            .execute(Vec::new(), echo_transport(&log))
            .await;

        assert_eq!(result.unwrap_err(), "still b failed");
        assert_eq!(*log.lock(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_suspended_failure_propagates_to_later_failure_handler() {
        let log = Log::default();
        let pre = InterceptorManager::new();
        // Runs last: recovers from the failure raised two steps earlier.
        pre.use_interceptor(
            logging(&log, "a")
                .synchronous(false)
                .on_rejected_sync(|error| Ok(vec![format!("a recovered {}", error)])),
        );
        pre.use_interceptor(logging(&log, "b").synchronous(false));
        pre.use_interceptor(failing(&log, "c").synchronous(false));

        let result = chain(&pre)
            .execute(Vec::new(), echo_transport(&log))
            .await;

        // "b" has no failure handler, so the failure passes it untouched.
        assert_eq!(result.unwrap(), vec!["a recovered c failed"]);
        assert_eq!(*log.lock(), vec!["c", "dispatch"]);
    }

    #[tokio::test]
    async fn test_suspended_unhandled_failure_skips_dispatch() {
        let log = Log::default();
        let pre = InterceptorManager::new();
        pre.use_interceptor(failing(&log, "a").synchronous(false));

        let result = chain(&pre)
            .execute(Vec::new(), echo_transport(&log))
            .await;

        assert_eq!(result.unwrap_err(), "a failed");
        assert_eq!(*log.lock(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_direct_hands_off_to_suspended_on_async_step() {
        let log = Log::default();
        let async_step = Step {
            on_fulfilled: Handler::Async(Arc::new(|mut config: Vec<String>| {
                Box::pin(async move {
                    config.push("async".to_string());
                    Ok(config)
                }) as BoxFuture<'static, Result<Vec<String>, String>>
            })),
            on_rejected: None,
        };
        let sync_step = Step {
            on_fulfilled: Handler::Sync(Arc::new(|mut config: Vec<String>| {
                config.push("sync".to_string());
                Ok::<_, String>(config)
            })),
            on_rejected: None,
        };

        let result = run_direct(
            vec![sync_step.clone(), async_step, sync_step],
            Vec::new(),
            Vec::new(),
            echo_transport(&log),
        )
        .await;

        assert_eq!(result.unwrap(), vec!["sync", "async", "sync"]);
    }
}
