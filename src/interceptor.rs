//! Interceptors and the registry that holds them.
//!
//! An [`Interceptor`] is a pair of handlers: one for the success path and an
//! optional one for the failure path. Interceptors are registered with an
//! [`InterceptorManager`], which hands out stable [`InterceptorId`]s and
//! produces immutable [`Snapshot`]s for the chain assembler to read.

use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type SyncFn<In, Out, E> = Arc<dyn Fn(In) -> Result<Out, E> + Send + Sync>;
type AsyncFn<In, Out, E> = Arc<dyn Fn(In) -> BoxFuture<'static, Result<Out, E>> + Send + Sync>;
type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// A single handler role: maps an input to a new value or a failure.
///
/// `Sync` handlers return immediately and may be run inline by the direct
/// execution strategy. `Async` handlers may suspend and are only ever awaited.
pub enum Handler<In, Out, E> {
    /// Runs to completion without suspending.
    Sync(SyncFn<In, Out, E>),
    /// May suspend before producing its result.
    Async(AsyncFn<In, Out, E>),
}

/// Success path handler: receives the current value.
pub type SuccessHandler<T, E> = Handler<T, T, E>;

/// Failure path handler: receives the failure and may recover into a value.
pub type FailureHandler<T, E> = Handler<E, T, E>;

impl<In, Out, E> Handler<In, Out, E> {
    /// Returns `true` if this handler never suspends.
    pub fn is_sync(&self) -> bool {
        matches!(self, Handler::Sync(_))
    }
}

impl<In, Out, E> Handler<In, Out, E>
where
    Out: Send + 'static,
    E: Send + 'static,
{
    /// Invokes the handler through the suspension mechanism.
    ///
    /// A `Sync` handler runs at call time and its result is wrapped in an
    /// already-settled future.
    pub fn call(&self, input: In) -> BoxFuture<'static, Result<Out, E>> {
        match self {
            Handler::Sync(f) => Box::pin(futures::future::ready(f(input))),
            Handler::Async(f) => f(input),
        }
    }
}

impl<In, Out, E> Clone for Handler<In, Out, E> {
    fn clone(&self) -> Self {
        match self {
            Handler::Sync(f) => Handler::Sync(Arc::clone(f)),
            Handler::Async(f) => Handler::Async(Arc::clone(f)),
        }
    }
}

impl<In, Out, E> fmt::Debug for Handler<In, Out, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Sync(_) => f.write_str("Handler::Sync"),
            Handler::Async(_) => f.write_str("Handler::Async"),
        }
    }
}

/// A registered pair of handlers wrapped around one side of the transport call.
///
/// # Examples
///
/// ```
/// use chainwire::{Error, RequestConfig, RequestInterceptor};
///
/// // A pure header transform that may run on the synchronous fast path.
/// let auth = RequestInterceptor::sync(|config: RequestConfig| {
///     config.with_header("authorization", "Bearer token")
/// })
/// .synchronous(true);
/// assert!(auth.is_synchronous());
///
/// // Only participates in requests against the admin API.
/// let audit = RequestInterceptor::new(|config: RequestConfig| async move { Ok(config) })
///     .run_when(|config: &RequestConfig| config.path.starts_with("/admin"));
/// assert!(!audit.is_synchronous());
/// ```
pub struct Interceptor<T, E> {
    on_fulfilled: SuccessHandler<T, E>,
    on_rejected: Option<FailureHandler<T, E>>,
    synchronous: bool,
    run_when: Option<Predicate<T>>,
}

impl<T, E> Interceptor<T, E>
where
    T: 'static,
    E: 'static,
{
    /// Creates an interceptor whose success handler may suspend.
    pub fn new<F, Fut>(on_fulfilled: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::from_handler(Handler::Async(Arc::new(
            move |value| -> BoxFuture<'static, Result<T, E>> { Box::pin(on_fulfilled(value)) },
        )))
    }

    /// Creates an interceptor whose success handler never suspends.
    ///
    /// The interceptor is not declared synchronous until
    /// [`synchronous(true)`](Self::synchronous) is called.
    pub fn sync<F>(on_fulfilled: F) -> Self
    where
        F: Fn(T) -> Result<T, E> + Send + Sync + 'static,
    {
        Self::from_handler(Handler::Sync(Arc::new(on_fulfilled)))
    }

    /// Creates an interceptor from an already built success handler.
    pub fn from_handler(on_fulfilled: SuccessHandler<T, E>) -> Self {
        Self {
            on_fulfilled,
            on_rejected: None,
            synchronous: false,
            run_when: None,
        }
    }

    /// Sets a failure handler that may suspend.
    ///
    /// This withdraws an earlier `synchronous(true)` declaration.
    pub fn on_rejected<F, Fut>(mut self, on_rejected: F) -> Self
    where
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        if self.synchronous {
            tracing::warn!(
                "Suspending failure handler attached; interceptor is no longer synchronous"
            );
            self.synchronous = false;
        }
        self.on_rejected = Some(Handler::Async(Arc::new(
            move |error| -> BoxFuture<'static, Result<T, E>> { Box::pin(on_rejected(error)) },
        )));
        self
    }

    /// Sets a failure handler that never suspends.
    pub fn on_rejected_sync<F>(mut self, on_rejected: F) -> Self
    where
        F: Fn(E) -> Result<T, E> + Send + Sync + 'static,
    {
        self.on_rejected = Some(Handler::Sync(Arc::new(on_rejected)));
        self
    }

    /// Declares whether this interceptor can run in the direct strategy.
    ///
    /// The declaration is refused, and the interceptor stays suspended, when
    /// either of its handlers may suspend.
    pub fn synchronous(mut self, synchronous: bool) -> Self {
        if synchronous && !self.handlers_are_sync() {
            tracing::warn!(
                "Refusing synchronous declaration for an interceptor with a suspending handler"
            );
            self.synchronous = false;
        } else {
            self.synchronous = synchronous;
        }
        self
    }

    /// Sets the activation predicate, evaluated once per request at chain-build time.
    ///
    /// Only pre-send interceptors consult the predicate.
    pub fn run_when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.run_when = Some(Arc::new(predicate));
        self
    }
}

impl<T, E> Interceptor<T, E> {
    /// Returns `true` if the interceptor is declared synchronous.
    pub fn is_synchronous(&self) -> bool {
        self.synchronous
    }

    /// Evaluates the activation predicate; interceptors without one are always active.
    pub fn is_active_for(&self, value: &T) -> bool {
        self.run_when.as_ref().map_or(true, |predicate| predicate(value))
    }

    pub(crate) fn on_fulfilled(&self) -> &SuccessHandler<T, E> {
        &self.on_fulfilled
    }

    pub(crate) fn on_rejected_handler(&self) -> Option<&FailureHandler<T, E>> {
        self.on_rejected.as_ref()
    }

    fn handlers_are_sync(&self) -> bool {
        self.on_fulfilled.is_sync() && self.on_rejected.as_ref().map_or(true, Handler::is_sync)
    }
}

impl<T, E> fmt::Debug for Interceptor<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("on_fulfilled", &self.on_fulfilled)
            .field("on_rejected", &self.on_rejected)
            .field("synchronous", &self.synchronous)
            .field("run_when", &self.run_when.is_some())
            .finish()
    }
}

/// Stable identifier of a registered interceptor.
///
/// Ids are never reused, even after the entry is ejected or the registry is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterceptorId(usize);

struct Slots<T, E> {
    entries: Vec<Option<Arc<Interceptor<T, E>>>>,
    version: u64,
}

/// An ordered registry of interceptors.
///
/// Removal leaves a tombstone, so the ids of the remaining entries stay valid
/// and registration order is preserved. All operations take `&self`; the
/// registry can be shared between a client and the code configuring it.
pub struct InterceptorManager<T, E> {
    slots: RwLock<Slots<T, E>>,
}

impl<T, E> InterceptorManager<T, E> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Slots {
                entries: Vec::new(),
                version: 0,
            }),
        }
    }

    /// Registers an interceptor after all existing ones and returns its id.
    pub fn use_interceptor(&self, interceptor: Interceptor<T, E>) -> InterceptorId {
        let mut slots = self.slots.write();
        let id = InterceptorId(slots.entries.len());
        slots.entries.push(Some(Arc::new(interceptor)));
        slots.version += 1;
        tracing::debug!(id = id.0, version = slots.version, "Registered interceptor");
        id
    }

    /// Removes an interceptor. Unknown or already ejected ids are ignored.
    pub fn eject(&self, id: InterceptorId) {
        let mut slots = self.slots.write();
        if let Some(slot) = slots.entries.get_mut(id.0) {
            if slot.take().is_some() {
                slots.version += 1;
                tracing::debug!(id = id.0, version = slots.version, "Ejected interceptor");
            }
        }
    }

    /// Removes every registered interceptor.
    pub fn clear(&self) {
        let mut slots = self.slots.write();
        for slot in slots.entries.iter_mut() {
            *slot = None;
        }
        slots.version += 1;
    }

    /// Number of live (non-ejected) interceptors.
    pub fn len(&self) -> usize {
        self.slots.read().entries.iter().flatten().count()
    }

    /// Returns `true` if no live interceptors are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Monotonic counter bumped by every mutation.
    pub fn version(&self) -> u64 {
        self.slots.read().version
    }

    /// Captures the live interceptors in registration order.
    ///
    /// Later registry mutations never affect an existing snapshot.
    pub fn snapshot(&self) -> Snapshot<T, E> {
        let slots = self.slots.read();
        Snapshot {
            entries: slots.entries.iter().flatten().cloned().collect(),
            version: slots.version,
        }
    }
}

impl<T, E> Default for InterceptorManager<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for InterceptorManager<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.read();
        f.debug_struct("InterceptorManager")
            .field("live", &slots.entries.iter().flatten().count())
            .field("version", &slots.version)
            .finish()
    }
}

/// An immutable view of a registry at one point in time.
pub struct Snapshot<T, E> {
    entries: Vec<Arc<Interceptor<T, E>>>,
    version: u64,
}

impl<T, E> Snapshot<T, E> {
    /// Iterates the captured interceptors in registration order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Interceptor<T, E>> + '_ {
        self.entries.iter().map(|entry| entry.as_ref())
    }

    /// Number of captured interceptors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the snapshot holds no interceptors.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registry version the snapshot was taken at.
    pub fn version(&self) -> u64 {
        self.version
    }
}

impl<T, E> Clone for Snapshot<T, E> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            version: self.version,
        }
    }
}

/// The two registries of a client: pre-send over the request configuration
/// and post-receive over the response.
pub struct Interceptors<C, R, E> {
    request: InterceptorManager<C, E>,
    response: InterceptorManager<R, E>,
}

impl<C, R, E> Interceptors<C, R, E> {
    /// Creates a pair of empty registries.
    pub fn new() -> Self {
        Self {
            request: InterceptorManager::new(),
            response: InterceptorManager::new(),
        }
    }

    /// Pre-send interceptors.
    pub fn request(&self) -> &InterceptorManager<C, E> {
        &self.request
    }

    /// Post-receive interceptors.
    pub fn response(&self) -> &InterceptorManager<R, E> {
        &self.response
    }
}

impl<C, R, E> Default for Interceptors<C, R, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, R, E> fmt::Debug for Interceptors<C, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptors")
            .field("request", &self.request)
            .field("response", &self.response)
            .finish()
    }
}
