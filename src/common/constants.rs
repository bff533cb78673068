//! Defaults shared by the server, the client-side controllers and the config layer.

// Listing cache
pub const PRODUCTS_CACHE_KEY: &str = "products";
pub const SERVICES_CACHE_KEY: &str = "services";
pub const DEFAULT_CACHE_TTL_MINUTES: i64 = 5;
/// One week.
pub const MAX_CACHE_TTL_MINUTES: i64 = 7 * 24 * 60;

// Name uniqueness checks
pub const DEFAULT_NAME_CHECK_DEBOUNCE_MS: u64 = 500;

// Media uploads: one automatic retry after the first failure
pub const DEFAULT_UPLOAD_ATTEMPTS: u32 = 2;

// Multipart field names (wire contract)
pub const DISPLAY_IMAGE_FIELD: &str = "displayImage";
pub const ADDITIONAL_IMAGES_FIELD: &str = "additionalImages";
pub const CUSTOM_SECTIONS_FIELD: &str = "customSections";

// HTTP server
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 20 * 1024 * 1024;
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080/api";
pub const DEFAULT_CLIENT_TIMEOUT_SECS: u64 = 30;
