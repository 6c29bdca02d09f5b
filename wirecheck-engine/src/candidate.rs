//! The entry point a program under test provides.

use crate::proxy::NetworkProxy;

/// A program under test. It runs once, on its own thread, and talks to the
/// harness only through the proxy.
pub trait Candidate: Send + 'static {
    fn run(self, proxy: &mut NetworkProxy) -> anyhow::Result<()>;
}

impl<F> Candidate for F
where
    F: FnOnce(&mut NetworkProxy) -> anyhow::Result<()> + Send + 'static,
{
    fn run(self, proxy: &mut NetworkProxy) -> anyhow::Result<()> {
        self(proxy)
    }
}
