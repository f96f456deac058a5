//! Wire constants of the Constellation HTTP endpoint.

/// Wildcard token: matches any value in a StateObject filter field.
pub const WILDCARD: &str = "*";

/// Length of a hub-assigned subscription id (a UUID string).
pub const SUBSCRIPTION_ID_LEN: usize = 36;

/// Segment appended to the configured base path.
pub const REST_PATH: &str = "rest/constellation/";

/// Default `User-Agent` header value.
pub const DEFAULT_USER_AGENT: &str = "ArduinoLib/2.4";

/// Default wait for the first response byte, in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;

/// Default long-poll timeout sent to `GetMessages`/`GetStateObjects`, in milliseconds.
pub const DEFAULT_SUBSCRIPTION_TIMEOUT_MS: u64 = 60_000;

/// Default number of items per long-poll response.
pub const DEFAULT_SUBSCRIPTION_LIMIT: u32 = 1;

/// Message key used for saga responses.
pub const RESPONSE_MESSAGE_KEY: &str = "__Response";

/// Endpoint method names, appended to the base path.
pub mod methods {
    /// Acquire or renew the message subscription
    pub const SUBSCRIBE_TO_MESSAGE: &str = "SubscribeToMessage";
    /// Join a message group
    pub const SUBSCRIBE_TO_MESSAGE_GROUP: &str = "SubscribeToMessageGroup";
    /// Acquire the StateObject subscription or add a filter to it
    pub const SUBSCRIBE_TO_STATE_OBJECTS: &str = "SubscribeToStateObjects";
    /// Message long-poll
    pub const GET_MESSAGES: &str = "GetMessages";
    /// StateObject long-poll
    pub const GET_STATE_OBJECTS: &str = "GetStateObjects";
    /// One-shot StateObject query
    pub const REQUEST_STATE_OBJECTS: &str = "RequestStateObjects";
    /// Package settings
    pub const GET_SETTINGS: &str = "GetSettings";
    /// Delete published StateObjects
    pub const PURGE_STATE_OBJECTS: &str = "PurgeStateObjects";
    /// Write a line to the hub log
    pub const WRITE_LOG: &str = "WriteLog";
    /// Send a message (GET or POST)
    pub const SEND_MESSAGE: &str = "SendMessage";
    /// Publish a StateObject
    pub const PUSH_STATE_OBJECT: &str = "PushStateObject";
    /// Advertise the package's message callbacks
    pub const DECLARE_PACKAGE_DESCRIPTOR: &str = "DeclarePackageDescriptor";
}

/// Identity headers sent with every request.
pub mod headers {
    /// Sentinel name header
    pub const SENTINEL_NAME: &str = "SentinelName";
    /// Package name header
    pub const PACKAGE_NAME: &str = "PackageName";
    /// Access key header
    pub const ACCESS_KEY: &str = "AccessKey";
}
