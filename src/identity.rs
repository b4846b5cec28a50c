use std::sync::Arc;

/// Process-wide identity shared by every sink and the request middleware.
///
/// Built once during initialization and handed out behind an [`Arc`];
/// there is no way to mutate it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    service_name: String,
    dev_mode: bool,
}

impl ServiceIdentity {
    pub fn new(service_name: impl Into<String>, dev_mode: bool) -> Arc<Self> {
        Arc::new(ServiceIdentity { service_name: service_name.into(), dev_mode })
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Local development mode: human-readable console output and no
    /// latency/ip/user agent fields in request logs.
    pub fn dev_mode(&self) -> bool {
        self.dev_mode
    }
}
