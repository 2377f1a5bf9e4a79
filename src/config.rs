use std::time::Duration;

/// LayerEdge referral API host.
pub const DEFAULT_BASE_URL: &str = "https://referralapi.layeredge.io/api";

/// Resolved runtime settings shared by the client, the lifecycle tasks and
/// the renderer. Built once from CLI flags at startup and never mutated.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the reward service API.
    pub base_url: String,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Bounded retry: attempts per client operation.
    pub retry_attempts: u32,
    /// Bounded retry: fixed delay between attempts.
    pub retry_delay: Duration,
    /// Activation polling: status probes after the activation call at startup.
    pub activation_poll_attempts: u32,
    /// Activation polling: fixed wait before each probe.
    pub activation_poll_interval: Duration,
    /// Activation polling ceiling when re-activating a node that stopped.
    pub restart_poll_attempts: u32,
    /// Delay between refresh cycles, armed after the previous cycle completes.
    pub ping_interval: Duration,
    /// Wallets shown per dashboard page.
    pub page_size: usize,
    /// Minimum interval between physical dashboard draws.
    pub min_render_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            retry_attempts: 5,
            retry_delay: Duration::from_secs(2),
            activation_poll_attempts: 30,
            activation_poll_interval: Duration::from_secs(10),
            restart_poll_attempts: 60,
            ping_interval: Duration::from_secs(30),
            page_size: 5,
            min_render_interval: Duration::from_millis(100),
        }
    }
}
