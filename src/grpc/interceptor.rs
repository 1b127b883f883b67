//! Interceptor chain composition.
//!
//! The builder keeps two ordered chains (unary and stream) with
//! wholesale-replace semantics. tonic interceptors cannot distinguish call
//! kinds, so at start time both chains are composed in order (unary chain
//! first) into one request interceptor applied to every call.

use std::sync::Arc;

use tonic::service::Interceptor;
use tonic::{Request, Status};

/// A request-phase interceptor: inspect or rewrite the request metadata, or
/// reject the call with a [`Status`].
pub type InterceptorFn = Arc<dyn Fn(Request<()>) -> Result<Request<()>, Status> + Send + Sync>;

/// Wrap a closure into an [`InterceptorFn`].
pub fn interceptor_fn<F>(f: F) -> InterceptorFn
where
    F: Fn(Request<()>) -> Result<Request<()>, Status> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Compose the configured chains into a single tonic interceptor.
pub(crate) fn compose(
    unary: &[InterceptorFn],
    stream: &[InterceptorFn],
) -> impl Interceptor + Clone {
    let chain: Vec<InterceptorFn> = unary.iter().chain(stream.iter()).cloned().collect();
    move |mut request: Request<()>| {
        for interceptor in &chain {
            request = interceptor(request)?;
        }
        Ok(request)
    }
}
