//! Control-plane configuration.

use std::time::Duration;

use soap_client::Service;

/// Tunables for the whole control plane.
///
/// Every outbound call's deadline, every cache's TTL, and the subscription
/// lifecycle cadence derive from here.
#[derive(Debug, Clone)]
pub struct MaestroConfig {
    /// Deadline for each SOAP and GENA call
    /// Default: 5 seconds
    pub call_timeout: Duration,

    /// Port range the NOTIFY callback server binds within
    /// Default: (3400, 3500)
    pub callback_port_range: (u16, u16),

    /// Service kinds every discovered device is subscribed to
    pub subscribed_services: Vec<Service>,

    /// Timeout requested on SUBSCRIBE/RENEW, in seconds
    /// Default: 1800
    pub subscription_timeout_seconds: u32,

    /// Renewal happens this many seconds before device-reported expiry
    /// Default: 60
    pub renewal_buffer_seconds: u32,

    /// Cadence of the subscription renewal sweep
    /// Default: 30 seconds
    pub renewal_sweep_interval: Duration,

    /// Freshness window for cached device state
    /// Default: 120 seconds
    pub state_ttl: Duration,

    /// Freshness window for the zone topology cache
    /// Default: 300 seconds
    pub topology_ttl: Duration,

    /// Freshness window for extracted music-service credentials
    /// Default: 24 hours
    pub credentials_ttl: Duration,

    /// Cadence of the state-cache prune task
    /// Default: 300 seconds
    pub prune_interval: Duration,
}

impl Default for MaestroConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(5),
            callback_port_range: (3400, 3500),
            subscribed_services: vec![
                Service::AVTransport,
                Service::RenderingControl,
                Service::ZoneGroupTopology,
            ],
            subscription_timeout_seconds: 1800,
            renewal_buffer_seconds: 60,
            renewal_sweep_interval: Duration::from_secs(30),
            state_ttl: Duration::from_secs(120),
            topology_ttl: Duration::from_secs(300),
            credentials_ttl: Duration::from_secs(24 * 60 * 60),
            prune_interval: Duration::from_secs(300),
        }
    }
}

impl MaestroConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the configuration for values that cannot work.
    pub fn validate(&self) -> Result<(), String> {
        if self.callback_port_range.0 >= self.callback_port_range.1 {
            return Err("invalid callback port range: start must be less than end".to_string());
        }
        if self.subscribed_services.is_empty() {
            return Err("at least one subscribed service kind is required".to_string());
        }
        if self.call_timeout == Duration::ZERO {
            return Err("call timeout must be greater than zero".to_string());
        }
        if self.subscription_timeout_seconds == 0 {
            return Err("subscription timeout must be greater than zero".to_string());
        }
        if self.renewal_sweep_interval == Duration::ZERO {
            return Err("renewal sweep interval must be greater than zero".to_string());
        }
        if self.state_ttl == Duration::ZERO {
            return Err("state TTL must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_callback_ports(mut self, start: u16, end: u16) -> Self {
        self.callback_port_range = (start, end);
        self
    }

    pub fn with_state_ttl(mut self, ttl: Duration) -> Self {
        self.state_ttl = ttl;
        self
    }

    pub fn with_subscribed_services(mut self, services: Vec<Service>) -> Self {
        self.subscribed_services = services;
        self
    }
}
