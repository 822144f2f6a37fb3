use crate::api::Client;
use crate::config::CloudEnvironment;
use crate::locks::ResourceLocks;
use std::fmt;
use std::sync::Arc;

/// Shared state handed to every resource and data source
#[derive(Clone)]
pub struct AppServiceProviderData {
    pub client: Arc<Client>,
    pub locks: Arc<ResourceLocks>,
    pub subscription_id: String,
    pub environment: CloudEnvironment,
}

impl AppServiceProviderData {
    pub fn new(client: Client, subscription_id: impl Into<String>) -> Self {
        Self {
            client: Arc::new(client),
            locks: Arc::new(ResourceLocks::new()),
            subscription_id: subscription_id.into(),
            environment: CloudEnvironment::Public,
        }
    }

    pub fn with_environment(mut self, environment: CloudEnvironment) -> Self {
        self.environment = environment;
        self
    }
}

// The client holds the credential, so only the identifying fields are shown
impl fmt::Debug for AppServiceProviderData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppServiceProviderData")
            .field("subscription_id", &self.subscription_id)
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}
