//! Event type names.

// Inbound, server pushed
pub const NOTIFICATION: &str = "notification";
pub const PIPELINE_UPDATE: &str = "pipeline_update";
pub const STATION_ALERT: &str = "station_alert";

// Inbound, lifecycle
pub const CONNECTED: &str = "connected";
pub const AUTHENTICATED: &str = "authenticated";

// Local lifecycle signals, dispatched by the connection manager itself
pub const CONNECT: &str = "connect";
pub const DISCONNECT: &str = "disconnect";

// Outbound
pub const AUTHENTICATE: &str = "authenticate";
pub const SUBSCRIBE_PIPELINE: &str = "subscribe_pipeline";
pub const SUBSCRIBE_STATION: &str = "subscribe_station";
