//! High-level client.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use irdata_core::{
    ClientConfig, Credentials, Endpoint, QueryParams, Resource, Result, Store, Transport,
};

use crate::authenticator::LoginOutcome;
use crate::endpoints::{CAR_GET, DOC, MEMBER_CHART_DATA, TRACK_GET};
use crate::resolver::ResourceResolver;
use crate::transport::HttpTransport;

/// Client for the data API.
///
/// Owns one transport for its whole lifetime and resolves every request
/// through a [`ResourceResolver`], so login, back-off and link indirection
/// are handled transparently.
///
/// # Example
///
/// ```no_run
/// use irdata_client::IrDataClient;
/// use irdata_core::Credentials;
///
/// # async fn example() -> Result<(), irdata_core::Error> {
/// let client = IrDataClient::new(Credentials::new("alice@example.com", "hunter2"))?;
/// let cars: serde_json::Value = client.cars().await?.json()?;
/// println!("{}", cars);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct IrDataClient<T = HttpTransport> {
    resolver: ResourceResolver<T>,
}

impl IrDataClient<HttpTransport> {
    /// Create a client with the default configuration.
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_config(credentials, ClientConfig::default())
    }

    /// Create a client with an explicit configuration.
    pub fn with_config(credentials: Credentials, config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Self::with_transport(transport, credentials, config)
    }
}

impl<T: Transport> IrDataClient<T> {
    /// Create a client over any transport.
    pub fn with_transport(transport: T, credentials: Credentials, config: ClientConfig) -> Result<Self> {
        let resolver = ResourceResolver::new(Arc::new(transport), credentials, &config)?;
        Ok(Self { resolver })
    }

    /// Log in eagerly instead of on the first fetch.
    ///
    /// Waits for a fetch in flight, so it never races that fetch's own
    /// re-authentication.
    pub async fn login(&self) -> Result<LoginOutcome> {
        self.resolver.login().await
    }

    pub fn is_authenticated(&self) -> bool {
        self.resolver.authenticator().is_authenticated()
    }

    /// Token that aborts any back-off currently in progress.
    pub fn cancellation_token(&self) -> &CancellationToken {
        self.resolver.cancellation_token()
    }

    pub fn resolver(&self) -> &ResourceResolver<T> {
        &self.resolver
    }

    /// Fetch a validated endpoint.
    pub async fn fetch(&self, endpoint: &Endpoint, params: &QueryParams) -> Result<Resource> {
        self.resolver.fetch(endpoint, params).await
    }

    /// Fetch an endpoint given as a path string.
    pub async fn get_resource(&self, path: &str, params: &QueryParams) -> Result<Resource> {
        let endpoint = Endpoint::new(path)?;
        self.fetch(&endpoint, params).await
    }

    /// The car catalogue.
    pub async fn cars(&self) -> Result<Resource> {
        self.get_resource(CAR_GET, &QueryParams::new()).await
    }

    /// The track catalogue.
    pub async fn tracks(&self) -> Result<Resource> {
        self.get_resource(TRACK_GET, &QueryParams::new()).await
    }

    /// Chart data for one member in one category.
    pub async fn member_chart_data(
        &self,
        cust_id: u64,
        category_id: u32,
        chart_type: u32,
    ) -> Result<Resource> {
        let params = QueryParams::new()
            .with("cust_id", cust_id)
            .with("category_id", category_id)
            .with("chart_type", chart_type);
        self.get_resource(MEMBER_CHART_DATA, &params).await
    }

    /// Documentation for every data endpoint.
    pub async fn doc(&self) -> Result<Resource> {
        self.get_resource(DOC, &QueryParams::new()).await
    }

    /// Fetch an endpoint and hand the resolved bytes to `store` as `name`.
    #[instrument(skip(self, params, store), fields(%endpoint))]
    pub async fn fetch_and_save<S: Store + ?Sized>(
        &self,
        endpoint: &Endpoint,
        params: &QueryParams,
        name: &str,
        store: &S,
    ) -> Result<Resource> {
        let resource = self.fetch(endpoint, params).await?;
        let bytes = resource.to_bytes();
        store.save(name, &bytes).await?;
        info!(name, bytes = bytes.len(), "Saved resource");
        Ok(resource)
    }
}
