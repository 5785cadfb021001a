pub mod net;
pub mod rate_limiter;
pub mod token;
