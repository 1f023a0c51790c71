/// Presentation listener for connection status.
///
/// The channel pushes boolean signals at its transition points; the sink
/// never calls back into the channel. Implementations are invoked outside
/// the channel lock and must not block.
pub trait StatusSink: Send + Sync {
    /// An initial connection attempt is in flight.
    fn connecting(&self, active: bool);

    /// The channel lost its connection and a reconnect is pending.
    fn reconnecting(&self, active: bool);

    /// At least one request is waiting for a response.
    fn requesting(&self, active: bool);
}
