//! Route handlers and how the router stores them.
//!
//! Routes map to `async fn`s of many distinct types, so the router keeps each
//! one as an `Arc<dyn ErasedHandler<S>>`. `S` is the shared application state.
//!
//! Registering `books::get_book` goes through these steps:
//!
//! ```text
//! router.on(Method::Get, "/get-book/{name}", books::get_book)
//!     -> books::get_book.into_boxed_handler()      (blanket Handler impl)
//!     -> Arc::new(Erased(books::get_book))         (stored once per route)
//! per request:
//!     -> handler.call(state, req)                  (one dynamic call)
//!     -> Box::pin(async { get_book(state, req).await.into_response() })
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// What every stored handler returns: a boxed future yielding the response.
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Object-safe form of [`Handler`].
///
/// Public only because [`Handler::into_boxed_handler`] names it.
#[doc(hidden)]
pub trait ErasedHandler<S> {
    fn call(&self, state: Arc<S>, req: Request) -> BoxFuture;
}

/// How the router holds a handler; cloned into every request task.
#[doc(hidden)]
pub type BoxedHandler<S> = Arc<dyn ErasedHandler<S> + Send + Sync + 'static>;

/// Anything that can be bound to a route.
///
/// Satisfied automatically by async functions and closures shaped like
///
/// ```text
/// async fn handler(state: Arc<S>, req: Request) -> impl IntoResponse
/// ```
///
/// and sealed, so nothing else can implement it.
pub trait Handler<S>: private::Sealed<S> + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler<S>;
}

mod private {
    pub trait Sealed<S> {}
}

impl<S, F, Fut, R> private::Sealed<S> for F
where
    F: Fn(Arc<S>, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<S, F, Fut, R> Handler<S> for F
where
    S: Send + Sync + 'static,
    F: Fn(Arc<S>, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler<S> {
        Arc::new(Erased(self))
    }
}

/// A concrete handler behind the [`ErasedHandler`] interface.
struct Erased<F>(F);

impl<S, F, Fut, R> ErasedHandler<S> for Erased<F>
where
    F: Fn(Arc<S>, Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, state: Arc<S>, req: Request) -> BoxFuture {
        let pending = (self.0)(state, req);
        Box::pin(async move { pending.await.into_response() })
    }
}
