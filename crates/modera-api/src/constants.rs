/// Versioned prefix for every API route
pub const API_PREFIX: &str = "/api/v0";

/// Content type assumed for presigned uploads when the client names none
pub const DEFAULT_UPLOAD_CONTENT_TYPE: &str = "application/octet-stream";

/// Request bodies carry JSON envelopes and at most one inline text payload
pub const MAX_REQUEST_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Server-level cap on in-flight HTTP requests
pub const HTTP_CONCURRENCY_LIMIT: usize = 1024;
