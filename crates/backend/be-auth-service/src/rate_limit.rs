use std::{net::IpAddr, num::NonZeroU32, sync::Arc};

use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};

pub type LoginFailureRateLimiter =
    Arc<RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>>;

const FAILURES_PER_MINUTE: NonZeroU32 = NonZeroU32::new(10).unwrap();
const FAILURE_BURST: NonZeroU32 = NonZeroU32::new(5).unwrap();

/// Budget of failed admin logins per client address.
pub fn new_login_failure_rate_limiter() -> LoginFailureRateLimiter {
    login_failure_rate_limiter(FAILURES_PER_MINUTE, FAILURE_BURST)
}

pub fn login_failure_rate_limiter(
    per_minute: NonZeroU32,
    burst: NonZeroU32,
) -> LoginFailureRateLimiter {
    Arc::new(RateLimiter::keyed(
        Quota::per_minute(per_minute).allow_burst(burst),
    ))
}
