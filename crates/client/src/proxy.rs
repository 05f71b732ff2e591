//! Scoped `no_proxy` override.
//!
//! Remote topology calls must bypass any configured forward proxy for the
//! service's domain. The prior value of `no_proxy` is snapshotted when the
//! guard is taken and restored when it drops, on every exit path, so the
//! override never leaks into unrelated code later in the process.

use std::env;
use std::ffi::OsString;

const NO_PROXY: &str = "no_proxy";

/// RAII guard holding a `no_proxy` override for one remote call.
#[derive(Debug)]
pub struct ProxyBypass {
    prior: Option<OsString>,
}

impl ProxyBypass {
    pub fn new(domain: &str) -> Self {
        let prior = env::var_os(NO_PROXY);
        // The access layer is single-threaded (sequential awaits, no spawned
        // tasks), which is the precondition for mutating process env state.
        unsafe { env::set_var(NO_PROXY, domain) };
        Self { prior }
    }
}

impl Drop for ProxyBypass {
    fn drop(&mut self) {
        match self.prior.take() {
            Some(prior) => unsafe { env::set_var(NO_PROXY, prior) },
            None => unsafe { env::remove_var(NO_PROXY) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // The guard mutates process-wide state; serialize the tests touching it.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn restores_prior_value() {
        let _env = ENV_LOCK.lock().unwrap();
        unsafe { env::set_var(NO_PROXY, "example.net") };
        {
            let _bypass = ProxyBypass::new(".opensciencegrid.org");
            assert_eq!(env::var(NO_PROXY).unwrap(), ".opensciencegrid.org");
        }
        assert_eq!(env::var(NO_PROXY).unwrap(), "example.net");
        unsafe { env::remove_var(NO_PROXY) };
    }

    #[test]
    fn removes_variable_when_previously_unset() {
        let _env = ENV_LOCK.lock().unwrap();
        unsafe { env::remove_var(NO_PROXY) };
        {
            let _bypass = ProxyBypass::new(".opensciencegrid.org");
            assert_eq!(env::var(NO_PROXY).unwrap(), ".opensciencegrid.org");
        }
        assert!(env::var_os(NO_PROXY).is_none());
    }
}
