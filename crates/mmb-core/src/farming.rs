//! Per-account farming loop.
//!
//! The loop is an explicit state machine over [`Phase`]:
//!
//! ```text
//! RefreshingToken -> Polling -> Claiming(action) -> RefreshingToken
//!                           \-> Waiting { then }  -> then
//! ```
//!
//! Each step takes the current [`LoopState`] and returns the next one. Errors
//! are classified once, in [`FarmingSession::run`]: fatal ones end the loop,
//! everything else becomes a short backoff.

use std::{sync::Arc, time::Duration};

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::LoopTimings,
    domain::{AccountId, AuthToken},
    errors::Error,
    ports::{AuthProvider, FarmApi},
    profile::{FarmingStatus, ProfileSnapshot},
    proxy::ProxySpec,
    timing::{
        check_daily_grant, claim_wait, format_local, format_wait, random_tap_percent, secs,
        tap_count, GrantEligibility,
    },
    Result,
};

/// Work chosen after a profile fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    ClaimDailyGrant,
    StartFarming,
    /// Submit the finished cycle, then start the next one.
    FinishAndRestart { farm_rate: u64, boost: Option<u32> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitReason {
    Idle,
    Backoff,
    DailyGrant,
    FarmingCycle,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    RefreshingToken,
    Polling,
    Claiming(Action),
    Waiting {
        duration: Duration,
        reason: WaitReason,
        then: Box<Phase>,
    },
}

impl Phase {
    fn wait(duration: Duration, reason: WaitReason, then: Phase) -> Self {
        Phase::Waiting {
            duration,
            reason,
            then: Box::new(then),
        }
    }
}

#[derive(Clone, Debug)]
pub struct IssuedToken {
    pub token: AuthToken,
    /// Local monotonic clock; only used for refresh cadence.
    pub issued_at: Instant,
}

/// Immutable loop state. Steps return a new value instead of mutating.
#[derive(Clone, Debug)]
pub struct LoopState {
    pub phase: Phase,
    pub token: Option<IssuedToken>,
    pub balance: Option<i64>,
}

impl Default for LoopState {
    fn default() -> Self {
        Self {
            phase: Phase::RefreshingToken,
            token: None,
            balance: None,
        }
    }
}

impl LoopState {
    pub fn with_phase(&self, phase: Phase) -> Self {
        Self {
            phase,
            ..self.clone()
        }
    }

    fn with_balance(&self, balance: i64, phase: Phase) -> Self {
        Self {
            phase,
            balance: Some(balance),
            ..self.clone()
        }
    }

    /// State after a failed step: back off, then start over from the token gate.
    ///
    /// A rejected token is dropped so the next iteration logs in again.
    pub fn after_failure(&self, err: &Error, backoff: Duration) -> Self {
        let token = if err.is_unauthorized() {
            None
        } else {
            self.token.clone()
        };
        Self {
            phase: Phase::wait(backoff, WaitReason::Backoff, Phase::RefreshingToken),
            token,
            balance: self.balance,
        }
    }

    fn token_is_fresh(&self, ttl: Duration) -> bool {
        self.token
            .as_ref()
            .is_some_and(|t| t.issued_at.elapsed() < ttl)
    }
}

/// Decide the next phase from a fresh profile.
///
/// Priority: daily grant, then starting an idle farm, then the farming cycle.
/// A pending grant that comes due before the cycle ends shortens the wait.
/// Every wait ends at the token gate, so the claim after it is re-planned from
/// a fresh profile with a fresh token.
pub fn plan(profile: &ProfileSnapshot, grant: GrantEligibility) -> Result<Phase> {
    if grant.is_available() {
        return Ok(Phase::Claiming(Action::ClaimDailyGrant));
    }

    let started_at = match profile.farming {
        FarmingStatus::Await => return Ok(Phase::Claiming(Action::StartFarming)),
        FarmingStatus::InProgress { started_at } => started_at,
    };

    let cycle_wait = claim_wait(started_at, profile.server_time)?;
    if cycle_wait <= 0 {
        return Ok(Phase::Claiming(Action::FinishAndRestart {
            farm_rate: profile.farm_rate,
            boost: profile.boost,
        }));
    }

    // Eligibility is strict, so wake one second past `next_at`.
    let grant_wait = grant.wait_secs();
    let next = if grant_wait < cycle_wait {
        Phase::wait(
            secs(grant_wait + 1),
            WaitReason::DailyGrant,
            Phase::RefreshingToken,
        )
    } else {
        Phase::wait(
            secs(cycle_wait),
            WaitReason::FarmingCycle,
            Phase::RefreshingToken,
        )
    };
    Ok(next)
}

/// One account's farming loop. Owns its API client for the loop's lifetime.
pub struct FarmingSession {
    account: AccountId,
    auth: Arc<dyn AuthProvider>,
    api: Arc<dyn FarmApi>,
    proxy: Option<ProxySpec>,
    timings: LoopTimings,
}

impl FarmingSession {
    pub fn new(
        account: AccountId,
        auth: Arc<dyn AuthProvider>,
        api: Arc<dyn FarmApi>,
        proxy: Option<ProxySpec>,
        timings: LoopTimings,
    ) -> Self {
        Self {
            account,
            auth,
            api,
            proxy,
            timings,
        }
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    /// Run until cancelled or until the session is rejected.
    ///
    /// Returns `Ok(())` on cancellation and `Err` only for fatal errors.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        if let Some(proxy) = &self.proxy {
            self.check_proxy(proxy).await;
        }

        let mut state = LoopState::default();
        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!(account = %self.account, "Stopping farming loop");
                    return Ok(());
                }
                r = self.step(&state) => r,
            };

            state = match result {
                Ok(next) => next,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!(account = %self.account, error = %e, "Iteration failed");
                    state.after_failure(&e, self.timings.error_backoff)
                }
            };
        }
    }

    /// Execute the current phase and return the next state.
    pub async fn step(&self, state: &LoopState) -> Result<LoopState> {
        match &state.phase {
            Phase::RefreshingToken => self.refresh_token(state).await,
            Phase::Polling => self.poll(state).await,
            Phase::Claiming(action) => self.claim(state, action).await,
            Phase::Waiting {
                duration, then, ..
            } => {
                sleep(*duration).await;
                Ok(state.with_phase((**then).clone()))
            }
        }
    }

    async fn refresh_token(&self, state: &LoopState) -> Result<LoopState> {
        if state.token_is_fresh(self.timings.token_ttl) {
            return Ok(state.with_phase(Phase::Polling));
        }

        let init_data = self
            .auth
            .web_app_data(&self.account, self.proxy.as_ref())
            .await?;
        let token = self.api.login(&init_data).await?;
        debug!(account = %self.account, token = %token.fingerprint(), "Logged in");

        Ok(LoopState {
            phase: Phase::Polling,
            token: Some(IssuedToken {
                token,
                issued_at: Instant::now(),
            }),
            balance: state.balance,
        })
    }

    async fn poll(&self, state: &LoopState) -> Result<LoopState> {
        let Some(issued) = &state.token else {
            return Ok(state.with_phase(Phase::RefreshingToken));
        };

        let profile = self.api.profile(&issued.token).await?;
        info!(account = %self.account, balance = profile.balance, "Balance: {}", profile.balance);

        let grant = check_daily_grant(profile.daily_grant, profile.server_time)?;
        match grant {
            GrantEligibility::Available if profile.daily_grant.is_none() => {
                info!(account = %self.account, "First daily grant is available")
            }
            GrantEligibility::Available => {
                info!(account = %self.account, "Daily grant is available")
            }
            GrantEligibility::Pending { next_at, .. } => {
                info!(account = %self.account, "Next daily grant at {}", format_local(next_at))
            }
        }

        let next = plan(&profile, grant)?;
        match &next {
            Phase::Claiming(Action::StartFarming) => {
                info!(account = %self.account, "Farming is idle, starting a new cycle")
            }
            Phase::Claiming(Action::FinishAndRestart { .. }) => {
                info!(account = %self.account, "Farming cycle complete, claiming")
            }
            Phase::Waiting {
                duration,
                reason: WaitReason::DailyGrant,
                ..
            } => info!(
                account = %self.account,
                "Farming active, waiting {} for the daily grant",
                format_wait(duration.as_secs() as i64)
            ),
            Phase::Waiting {
                duration,
                reason: WaitReason::FarmingCycle,
                ..
            } => info!(
                account = %self.account,
                "Farming active, waiting {} before claiming",
                format_wait(duration.as_secs() as i64)
            ),
            _ => {}
        }

        Ok(state.with_balance(profile.balance, next))
    }

    async fn claim(&self, state: &LoopState, action: &Action) -> Result<LoopState> {
        let Some(issued) = &state.token else {
            return Ok(state.with_phase(Phase::RefreshingToken));
        };
        let token = &issued.token;

        match action {
            Action::ClaimDailyGrant => {
                let balance = self.api.claim_daily_grant(token).await?;
                info!(account = %self.account, balance, "Daily grant claimed");
                Ok(state.with_balance(balance, Phase::RefreshingToken))
            }
            Action::StartFarming => {
                self.start_farming(token).await?;
                info!(account = %self.account, "Farming started");
                Ok(state.with_phase(Phase::RefreshingToken))
            }
            Action::FinishAndRestart { farm_rate, boost } => {
                let percent = random_tap_percent(&mut rand::thread_rng());
                let taps = tap_count(*farm_rate, *boost, percent);

                let balance = self.api.finish_farming(token, taps).await?;
                info!(account = %self.account, taps, balance, "Farming claimed");

                self.start_farming(token).await?;
                info!(account = %self.account, balance, "Farming restarted, balance: {balance}");

                let idle = Phase::wait(
                    self.timings.idle_sleep,
                    WaitReason::Idle,
                    Phase::RefreshingToken,
                );
                Ok(state.with_balance(balance, idle))
            }
        }
    }

    async fn start_farming(&self, token: &AuthToken) -> Result<()> {
        sleep(self.timings.start_farming_delay).await;
        let status = self.api.start_farming(token).await?;
        debug!(account = %self.account, status = %status, "Start farming acknowledged");
        Ok(())
    }

    async fn check_proxy(&self, proxy: &ProxySpec) {
        match self.api.egress_ip().await {
            Ok(ip) => info!(account = %self.account, "Proxy IP: {ip}"),
            Err(e) => warn!(account = %self.account, proxy = %proxy, error = %e, "Proxy check failed"),
        }
    }
}
