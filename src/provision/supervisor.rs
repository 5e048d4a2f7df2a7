//! Connection supervisor.
//!
//! Issues a single join request with the stored credentials, then polls
//! the link state up to a fixed ceiling. An access point that never
//! answers must not strand the device in a silent retry loop, so budget
//! exhaustion is reported to the caller, which falls back to provisioning.
//! The supervisor keeps no state between boots.

use std::time::Duration;

use log::{debug, info, warn};

use crate::platform::{LinkStatus, Radio, RadioError, Sleeper};

use super::credentials::Credentials;

/// Join polling cadence and ceiling.
///
/// The defaults preserve the classic 200 polls at 100 ms, roughly a 20 s
/// budget; routers with slow DHCP can need more than half of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of link-state samples before giving up.
    pub max_polls: u32,
    /// Delay between samples.
    pub poll_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_polls: 200,
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Result of one supervised join attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The link came up within the budget.
    Connected,
    /// The budget ran out; the caller should re-provision.
    RetriesExhausted,
}

/// Join the network with the given credentials under a bounded poll budget.
///
/// `on_poll` receives the running sample count for an external indicator.
/// A `Failed` sample does not abort the loop early: the driver may recover
/// within the budget, and the ceiling bounds the wait either way.
pub fn supervise_connect<R, T, F>(
    radio: &mut R,
    credentials: &Credentials,
    sleeper: &mut T,
    policy: &RetryPolicy,
    mut on_poll: F,
) -> Result<ConnectOutcome, RadioError>
where
    R: Radio,
    T: Sleeper,
    F: FnMut(u32),
{
    info!("joining '{}'", credentials.ssid);
    radio.request_connect(credentials)?;

    for poll in 1..=policy.max_polls {
        match radio.link_status() {
            LinkStatus::Connected => {
                info!("link up after {} polls", poll);
                return Ok(ConnectOutcome::Connected);
            }
            LinkStatus::Pending => {
                debug!("waiting for link ({}/{})", poll, policy.max_polls);
            }
            LinkStatus::Failed => {
                debug!("join reported failure, still polling ({}/{})", poll, policy.max_polls);
            }
        }
        on_poll(poll);
        sleeper.sleep(policy.poll_interval);
    }

    warn!(
        "no link after {} polls, giving up on '{}'",
        policy.max_polls, credentials.ssid
    );
    Ok(ConnectOutcome::RetriesExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::host::{InstantSleeper, ScriptedRadio};

    fn creds() -> Credentials {
        Credentials::snapshot("HomeNet", "secret1")
    }

    fn policy(max_polls: u32) -> RetryPolicy {
        RetryPolicy {
            max_polls,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn test_connects_within_budget() {
        let mut radio = ScriptedRadio::new(creds()).connects_after(3);
        let mut sleeper = InstantSleeper::default();

        let outcome =
            supervise_connect(&mut radio, &creds(), &mut sleeper, &policy(10), |_| {}).unwrap();

        assert_eq!(outcome, ConnectOutcome::Connected);
        assert_eq!(radio.status_polls, 4);
        assert_eq!(radio.connect_requests.len(), 1);
        assert_eq!(radio.connect_requests[0], creds());
    }

    #[test]
    fn test_never_polls_beyond_ceiling() {
        let mut radio = ScriptedRadio::new(creds());
        let mut sleeper = InstantSleeper::default();

        let outcome =
            supervise_connect(&mut radio, &creds(), &mut sleeper, &policy(7), |_| {}).unwrap();

        assert_eq!(outcome, ConnectOutcome::RetriesExhausted);
        assert_eq!(radio.status_polls, 7);
        assert_eq!(sleeper.sleeps, 7);
    }

    #[test]
    fn test_failed_samples_do_not_abort_early() {
        let mut radio = ScriptedRadio::new(creds()).always_failing();
        let mut sleeper = InstantSleeper::default();

        let outcome =
            supervise_connect(&mut radio, &creds(), &mut sleeper, &policy(5), |_| {}).unwrap();

        assert_eq!(outcome, ConnectOutcome::RetriesExhausted);
        assert_eq!(radio.status_polls, 5);
    }

    #[test]
    fn test_single_join_request_per_run() {
        let mut radio = ScriptedRadio::new(creds());
        let mut sleeper = InstantSleeper::default();

        supervise_connect(&mut radio, &creds(), &mut sleeper, &policy(20), |_| {}).unwrap();

        assert_eq!(radio.connect_requests.len(), 1);
    }

    #[test]
    fn test_indicator_sees_running_poll_count() {
        let mut radio = ScriptedRadio::new(creds());
        let mut sleeper = InstantSleeper::default();

        let mut seen = Vec::new();
        supervise_connect(&mut radio, &creds(), &mut sleeper, &policy(4), |poll| {
            seen.push(poll)
        })
        .unwrap();

        assert_eq!(seen, vec![1, 2, 3, 4]);
    }
}
