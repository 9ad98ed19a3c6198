//! Tower Layer implementation for authentication

use std::sync::Arc;

use tower::Layer;

use super::AuthLayerConfig;
use super::service::AuthService;
use crate::jwt::TokenVerifier;

/// Tower Layer that adds bearer-token authentication to services
///
/// # Example
///
/// ```rust,ignore
/// use tower::ServiceBuilder;
/// use autolog_auth::tower::AuthLayer;
///
/// let service = ServiceBuilder::new()
///     .layer(AuthLayer::new(verifier))
///     .service(my_inner_service);
/// ```
#[derive(Debug)]
pub struct AuthLayer<V> {
    verifier: Arc<V>,
    config: AuthLayerConfig,
}

impl<V> Clone for AuthLayer<V> {
    fn clone(&self) -> Self {
        Self {
            verifier: Arc::clone(&self.verifier),
            config: self.config.clone(),
        }
    }
}

impl<V> AuthLayer<V>
where
    V: TokenVerifier,
{
    /// Create a new auth layer with default configuration
    pub fn new(verifier: V) -> Self {
        Self::from_arc(Arc::new(verifier))
    }

    /// Create a new auth layer from a shared verifier
    pub fn from_arc(verifier: Arc<V>) -> Self {
        Self {
            verifier,
            config: AuthLayerConfig::default(),
        }
    }

    /// Set the configuration for this layer
    #[must_use]
    pub fn config(mut self, config: AuthLayerConfig) -> Self {
        self.config = config;
        self
    }

    /// Serve `path` without authentication
    #[must_use]
    pub fn bypass_path(mut self, path: impl Into<String>) -> Self {
        self.config.bypass_paths.push(path.into());
        self
    }
}

impl<S, V> Layer<S> for AuthLayer<V> {
    type Service = AuthService<S, V>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService::new(inner, Arc::clone(&self.verifier), self.config.clone())
    }
}
