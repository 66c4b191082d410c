use std::{path::Path, sync::Arc, time::Duration};

use rand::Rng;
use tokio::{task::JoinSet, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use mmb_core::{
    config::Config,
    domain::AccountId,
    errors::Error,
    farming::FarmingSession,
    ports::AuthProvider,
    proxy::{load_proxies, ProxySpec},
};
use mmb_http::{HttpFarmApi, HttpSettings};
use mmb_session::{discover_sessions, SessionFileAuth};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mmb_core::logging::init("mmb")?;

    let cfg = Config::load()?;
    let accounts = require_sessions(discover_sessions(&cfg.sessions_dir)?, &cfg.sessions_dir)?;

    let proxies = if cfg.use_proxy_from_file {
        load_proxies(&cfg.proxies_file)?
    } else {
        Vec::new()
    };
    info!(
        accounts = accounts.len(),
        proxies = proxies.len(),
        "Starting MMBump farming"
    );

    let auth: Arc<dyn AuthProvider> = Arc::new(SessionFileAuth::new(&cfg.sessions_dir));
    let cancel = CancellationToken::new();
    let mut tasks = JoinSet::new();

    for (i, account) in accounts.into_iter().enumerate() {
        let proxy = assign_proxy(&proxies, i);
        let api = match HttpFarmApi::new(HttpSettings {
            base_url: cfg.api_base_url.clone(),
            proxy_check_url: cfg.proxy_check_url.clone(),
            proxy: proxy.clone(),
        }) {
            Ok(api) => api,
            Err(e) => {
                error!(account = %account, error = %e, "Skipping account");
                continue;
            }
        };

        let session = FarmingSession::new(account, auth.clone(), Arc::new(api), proxy, cfg.timings);
        let delay = start_delay(cfg.start_jitter, &mut rand::thread_rng());
        tasks.spawn(run_account(session, delay, cancel.clone()));
    }

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested");
                cancel.cancel();
            }
        }
    });

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Account task crashed");
        }
    }

    Ok(())
}

async fn run_account(session: FarmingSession, delay: Duration, cancel: CancellationToken) {
    if !delay.is_zero() {
        info!(account = %session.account(), "Starting in {}s", delay.as_secs());
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = sleep(delay) => {}
        }
    }

    match session.run(cancel).await {
        Ok(()) => {}
        Err(e) if e.is_fatal() => error!("{} | Invalid Session: {e}", session.account()),
        Err(e) => warn!(account = %session.account(), error = %e, "Farming loop ended"),
    }
}

/// An empty sessions directory is a configuration error.
fn require_sessions(accounts: Vec<AccountId>, dir: &Path) -> mmb_core::Result<Vec<AccountId>> {
    if accounts.is_empty() {
        return Err(Error::Config(format!(
            "no *.session files found in {}",
            dir.display()
        )));
    }
    Ok(accounts)
}

/// Round-robin proxy assignment; `None` when no proxies are configured.
fn assign_proxy(proxies: &[ProxySpec], index: usize) -> Option<ProxySpec> {
    if proxies.is_empty() {
        return None;
    }
    proxies.get(index % proxies.len()).cloned()
}

fn start_delay<R: Rng + ?Sized>(jitter: Duration, rng: &mut R) -> Duration {
    if jitter.is_zero() {
        return Duration::ZERO;
    }
    Duration::from_secs(rng.gen_range(0..=jitter.as_secs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn proxies_are_assigned_round_robin() {
        let proxies: Vec<ProxySpec> = ["h1:1", "h2:2"]
            .iter()
            .map(|p| p.parse().unwrap())
            .collect();
        let hosts: Vec<String> = (0..5)
            .map(|i| assign_proxy(&proxies, i).unwrap().host)
            .collect();
        assert_eq!(hosts, ["h1", "h2", "h1", "h2", "h1"]);
        assert!(assign_proxy(&[], 3).is_none());
    }

    #[test]
    fn empty_sessions_dir_is_a_config_error() {
        let err = require_sessions(Vec::new(), Path::new("sessions")).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("sessions")));

        let one = vec![AccountId("alice".to_string())];
        assert_eq!(require_sessions(one.clone(), Path::new("sessions")).unwrap(), one);
    }

    #[test]
    fn start_delay_stays_within_jitter() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(start_delay(Duration::ZERO, &mut rng), Duration::ZERO);
        for _ in 0..100 {
            assert!(start_delay(Duration::from_secs(30), &mut rng) <= Duration::from_secs(30));
        }
    }
}
