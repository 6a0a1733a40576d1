//! Browser timers via gloo-timers.

use std::future::Future;
use std::pin::Pin;

use gloo_timers::future::TimeoutFuture;

use billy_core::ports::TimerPort;

pub struct GlooTimer;

impl TimerPort for GlooTimer {
    fn sleep(&self, ms: u64) -> Pin<Box<dyn Future<Output = ()>>> {
        let ms = u32::try_from(ms).unwrap_or(u32::MAX);
        Box::pin(TimeoutFuture::new(ms))
    }
}
