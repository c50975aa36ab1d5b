//! Default values for the Strava provider.

/// Name of the HTTP client reserved for provider back-channel calls.
pub const BACKCHANNEL_HTTP_CLIENT_NAME: &str = "strava-backchannel";

pub const TOKEN_ENDPOINT: &str = "https://www.strava.com/oauth/token";
