//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP context)
//! 2. `TraceLayer` (request spans)
//! 3. Request ID (correlation ID in span, Sentry scope and response)
//! 4. CORS (configured frontend origin only)
//! 5. Rate limiting on credential endpoints (governor)
//!
//! Authentication is not a layer: customer-scoped handlers take the
//! [`RequireCustomer`] extractor.

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::{CurrentCustomer, RequireCustomer};
pub use rate_limit::auth_rate_limiter;
pub use request_id::{RequestId, request_id_middleware};
