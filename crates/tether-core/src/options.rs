/// Parameters for one connection attempt.
///
/// Immutable once an attempt starts; the channel reuses the stored copy
/// verbatim on every reconnect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Transport address, e.g. `wss://example.net/gate`.
    pub address: String,
    /// Reconnect budget: how many automatic reconnect attempts are made
    /// after the transport drops, before the channel closes for good.
    pub max_retries: u32,
}

impl ConnectOptions {
    pub fn new(address: impl Into<String>, max_retries: u32) -> Self {
        Self {
            address: address.into(),
            max_retries,
        }
    }
}
