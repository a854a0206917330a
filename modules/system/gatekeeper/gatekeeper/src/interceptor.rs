//! Transport integration: a tower layer resolving once per call, and a
//! stream wrapper resolving once per received message.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use gatekeeper_sdk::{
    AuthorizationContext, CallMetadata, ClientProfile, GatekeeperClient, GatekeeperError,
    RequestDescriptor, RequestInput, ScopedRequest,
};
use http::{Request, Response, StatusCode};
use kubegate_security::Claims;
use tower::{Layer, Service};

use crate::domain::credentials::metadata_from_headers;

/// Cluster and namespace a call targets, inserted into request extensions by
/// whatever decodes the request ahead of the gatekeeper layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestScope {
    pub cluster: Option<String>,
    pub namespace: Option<String>,
}

impl ScopedRequest for RequestScope {
    fn cluster(&self) -> Option<&str> {
        self.cluster.as_deref()
    }

    fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

/// Layer that authorizes every call before it reaches the inner service.
///
/// A [`RequestDescriptor`] found in the request extensions is used as is;
/// otherwise one is derived from the URI path and any [`RequestScope`]
/// extension. On success the [`AuthorizationContext`] is inserted into the
/// request extensions.
///
/// # Example
/// ```ignore
/// let svc = ServiceBuilder::new()
///     .layer(GatekeeperLayer::new(client))
///     .service(handler);
/// ```
#[derive(Clone)]
pub struct GatekeeperLayer {
    client: Arc<dyn GatekeeperClient>,
}

impl GatekeeperLayer {
    #[must_use]
    pub fn new(client: Arc<dyn GatekeeperClient>) -> Self {
        Self { client }
    }
}

impl<S> Layer<S> for GatekeeperLayer {
    type Service = GatekeeperService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GatekeeperService {
            inner,
            client: Arc::clone(&self.client),
        }
    }
}

#[derive(Clone)]
pub struct GatekeeperService<S> {
    inner: S,
    client: Arc<dyn GatekeeperClient>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for GatekeeperService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let client = Arc::clone(&self.client);
        let not_ready_inner = self.inner.clone();
        let mut ready_inner = std::mem::replace(&mut self.inner, not_ready_inner);

        Box::pin(async move {
            let metadata = metadata_from_headers(request.headers());
            let descriptor = request.extensions().get::<RequestDescriptor>().cloned();
            let scope = request
                .extensions()
                .get::<RequestScope>()
                .cloned()
                .unwrap_or_default();
            let method = request.uri().path().to_owned();
            let input = match &descriptor {
                Some(d) => RequestInput::Descriptor(d),
                None => RequestInput::Call {
                    method: &method,
                    request: &scope,
                },
            };

            match client.authorize(&metadata, input).await {
                Ok(context) => {
                    request.extensions_mut().insert(context);
                    ready_inner.call(request).await
                }
                Err(e) => Ok(error_response(&e)),
            }
        })
    }
}

fn error_response<B: Default>(error: &GatekeeperError) -> Response<B> {
    let status = match error {
        GatekeeperError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        GatekeeperError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        GatekeeperError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let mut response = Response::new(B::default());
    *response.status_mut() = status;
    response
}

/// Typed access to the resolved context in request extensions.
///
/// Every accessor fails with `Internal` when the gatekeeper has not run.
pub trait AuthorizationContextExt {
    /// # Errors
    ///
    /// Returns `Internal` if no context was attached.
    fn authorization_context(&self) -> Result<&AuthorizationContext, GatekeeperError>;

    /// # Errors
    ///
    /// Returns `Internal` if no context was attached.
    fn claims(&self) -> Result<&Claims, GatekeeperError> {
        self.authorization_context().map(AuthorizationContext::claims)
    }

    /// # Errors
    ///
    /// Returns `Internal` if no context was attached.
    fn client_profile(&self) -> Result<&Arc<ClientProfile>, GatekeeperError> {
        self.authorization_context().map(AuthorizationContext::profile)
    }
}

impl AuthorizationContextExt for http::Extensions {
    fn authorization_context(&self) -> Result<&AuthorizationContext, GatekeeperError> {
        self.get::<AuthorizationContext>().ok_or_else(|| {
            GatekeeperError::Internal(
                "authorization context not found - gatekeeper layer not configured".to_owned(),
            )
        })
    }
}

/// A received message together with the context it was authorized under.
#[derive(Debug, Clone)]
pub struct Authorized<M> {
    pub message: M,
    pub context: AuthorizationContext,
}

#[derive(Debug, thiserror::Error)]
pub enum StreamRecvError<E> {
    #[error("failed to receive message: {0}")]
    Recv(E),

    #[error(transparent)]
    Denied(#[from] GatekeeperError),
}

/// Wraps an inbound message stream and authorizes each message as it is
/// received, with the call's metadata and the message's own scope.
pub struct AuthorizingStream<St> {
    inner: St,
    client: Arc<dyn GatekeeperClient>,
    metadata: CallMetadata,
    method: String,
}

impl<St> AuthorizingStream<St> {
    #[must_use]
    pub fn new(
        inner: St,
        client: Arc<dyn GatekeeperClient>,
        metadata: CallMetadata,
        method: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            client,
            metadata,
            method: method.into(),
        }
    }
}

impl<St, M, E> AuthorizingStream<St>
where
    St: Stream<Item = Result<M, E>> + Unpin,
    M: ScopedRequest,
{
    /// Receive the next message and authorize it. `None` at end of stream.
    pub async fn next_authorized(&mut self) -> Option<Result<Authorized<M>, StreamRecvError<E>>> {
        let message = match self.inner.next().await? {
            Ok(message) => message,
            Err(e) => return Some(Err(StreamRecvError::Recv(e))),
        };
        let input = RequestInput::Call {
            method: &self.method,
            request: &message,
        };
        let result = self.client.authorize(&self.metadata, input).await;
        Some(match result {
            Ok(context) => Ok(Authorized { message, context }),
            Err(e) => Err(StreamRecvError::Denied(e)),
        })
    }
}
