//! Backend paths, relative to the API root

pub mod auth {
    pub const LOGIN: &str = "auth/login";
    pub const LOGOUT: &str = "auth/logout";
    pub const REFRESH: &str = "auth/refresh";
    /// Takes the current access token as the `accessToken` query parameter
    pub const CHECK_AUTH: &str = "auth/check-auth";
    pub const CHANGE_PASSWORD: &str = "auth/change-password";
}
