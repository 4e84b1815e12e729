//! Radix-tree request router.
//!
//! One tree keyed by path, one small method table per path. Knowing the path
//! matched lets the router tell "no such route" (404) apart from "wrong verb"
//! (405). Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).

use std::collections::HashMap;
use std::sync::Arc;

use matchit::Router as MatchitRouter;
use percent_encoding::percent_decode_str;

use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;

/// The application router, carrying the state handed to every handler.
pub struct Router<S> {
    tree: MatchitRouter<usize>,
    paths: HashMap<String, usize>,
    endpoints: Vec<Vec<(Method, BoxedHandler<S>)>>,
    state: Arc<S>,
}

/// Outcome of resolving a method + path pair.
pub(crate) enum Lookup<S> {
    Found(Method, BoxedHandler<S>, HashMap<String, String>),
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

impl<S: Send + Sync + 'static> Router<S> {
    pub fn new(state: S) -> Self {
        Self {
            tree: MatchitRouter::new(),
            paths: HashMap::new(),
            endpoints: Vec::new(),
            state: Arc::new(state),
        }
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with one already
    /// registered, or if `method` is already bound on `path`.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler<S>) -> Self {
        let index = match self.paths.get(path) {
            Some(&index) => index,
            None => {
                let index = self.endpoints.len();
                self.tree
                    .insert(path, index)
                    .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
                self.paths.insert(path.to_owned(), index);
                self.endpoints.push(Vec::new());
                index
            }
        };

        let endpoint = &mut self.endpoints[index];
        assert!(
            endpoint.iter().all(|(m, _)| *m != method),
            "duplicate route `{method} {path}`"
        );
        endpoint.push((method, handler.into_boxed_handler()));
        self
    }

    pub fn state(&self) -> Arc<S> {
        Arc::clone(&self.state)
    }

    /// Resolves `path`, then `method` on it. `method` is `None` for verbs
    /// outside RFC 9110, which are never bound.
    pub(crate) fn lookup(&self, method: Option<Method>, path: &str) -> Lookup<S> {
        let Ok(matched) = self.tree.at(path) else {
            return Lookup::NotFound;
        };
        let endpoint = &self.endpoints[*matched.value];

        let bound = method.and_then(|method| endpoint.iter().find(|(m, _)| *m == method));
        let Some((method, handler)) = bound else {
            return Lookup::MethodNotAllowed(endpoint.iter().map(|(m, _)| *m).collect());
        };

        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), percent_decode_str(v).decode_utf8_lossy().into_owned()))
            .collect();
        Lookup::Found(*method, Arc::clone(handler), params)
    }
}
