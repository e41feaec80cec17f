//! API constants for the Copper developer API

/// Base URL of the Copper developer API
pub const DEFAULT_BASE_URL: &str = "https://api.copper.com/developer_api/v1";

/// Bulk update endpoint for company records
pub const COMPANIES_BULK_UPDATE: &str = "companies/bulk_update";

/// Custom field definition listing
pub const CUSTOM_FIELD_DEFINITIONS: &str = "custom_field_definitions";

/// Headers used on every Copper request
pub mod headers {
    pub const ACCESS_TOKEN: &str = "X-PW-AccessToken";
    pub const APPLICATION: &str = "X-PW-Application";
    pub const USER_EMAIL: &str = "X-PW-UserEmail";

    /// Value of the application header for API-key access
    pub const APPLICATION_DEVELOPER_API: &str = "developer_api";

    pub const CONTENT_TYPE_JSON: &str = "application/json";

    /// Seconds to wait after a 429
    pub const RETRY_AFTER: &str = "Retry-After";
}

fn join(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

/// Build the bulk update endpoint URL
pub fn bulk_update_endpoint(base_url: &str) -> String {
    join(base_url, COMPANIES_BULK_UPDATE)
}

/// Build the custom field definitions endpoint URL
pub fn custom_field_definitions_endpoint(base_url: &str) -> String {
    join(base_url, CUSTOM_FIELD_DEFINITIONS)
}
