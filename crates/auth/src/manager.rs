//! Token lifecycle for one platform connection.
//!
//! Responsibilities:
//! - Obtain a token through the platform's grant flow.
//! - Hold the current token and answer validity queries without I/O.
//! - Refresh autonomously `safety_margin` before expiry, retrying once on
//!   transient failures.
//! - Guarantee at most one armed refresh timer and no token after disconnect.
use arc_swap::ArcSwapOption;
use patchbot_config::RefreshConfig;
use patchbot_types::{
    ConnectionState, Credential, GrantFlow, PatchbotError, PlatformId, TokenEndpoint, TokenGrant,
    TokenState, TokenStatus,
    token::{duplicate_secret, parse_scope},
    traits::Result,
};
use secrecy::SecretString;
use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};
use tokio::{sync::watch, time::Instant};

use crate::{profile::PlatformProfile, schedule::RefreshSchedule, state::random_state};

const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(300);
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(300);
/// Longest token lifetime accepted from a platform.
const MAX_LIFETIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);
/// Lower bound on the delay between consecutive refreshes.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Timing of scheduled refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// How long before expiry the scheduled refresh fires.
    pub safety_margin: Duration,
    /// Wait before the single retry of a failed scheduled refresh.
    pub retry_backoff: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            safety_margin: DEFAULT_SAFETY_MARGIN,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl From<&RefreshConfig> for RefreshPolicy {
    fn from(config: &RefreshConfig) -> Self {
        Self {
            safety_margin: config.safety_margin(),
            retry_backoff: config.retry_backoff(),
        }
    }
}

/// Outcome of [`TokenLifecycleManager::initialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Initialization {
    /// A token was obtained directly (client-credentials platforms).
    Connected,
    /// The user must authorize at `url`; finish with `handle_callback`.
    Redirect { url: String },
}

struct Session {
    token: TokenState,
    /// Monotonic counterpart of `token.expires_at`.
    deadline: Instant,
}

impl Session {
    fn is_valid(&self, now: Instant) -> bool {
        now < self.deadline
    }
}

struct Inner {
    profile: PlatformProfile,
    endpoint: Arc<dyn TokenEndpoint>,
    policy: RefreshPolicy,
    credential: Mutex<Option<Arc<Credential>>>,
    /// Anti-forgery state of the authorization in progress.
    pending: Mutex<Option<String>>,
    session: ArcSwapOption<Session>,
    schedule: RefreshSchedule,
    /// Bumped on every reset; results from older generations are dropped.
    generation: Mutex<u64>,
    events: watch::Sender<ConnectionState>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Obtains, holds and refreshes the access token of a single platform.
///
/// Dropping the manager disconnects it.
pub struct TokenLifecycleManager {
    inner: Arc<Inner>,
}

impl TokenLifecycleManager {
    pub fn new(
        profile: PlatformProfile,
        endpoint: Arc<dyn TokenEndpoint>,
        policy: RefreshPolicy,
    ) -> Self {
        let (events, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                profile,
                endpoint,
                policy,
                credential: Mutex::new(None),
                pending: Mutex::new(None),
                session: ArcSwapOption::empty(),
                schedule: RefreshSchedule::new(),
                generation: Mutex::new(0),
                events,
            }),
        }
    }

    /// Manager using the built-in profile of `platform` and default timing.
    pub fn for_platform(platform: PlatformId, endpoint: Arc<dyn TokenEndpoint>) -> Self {
        Self::new(
            PlatformProfile::for_platform(platform),
            endpoint,
            RefreshPolicy::default(),
        )
    }

    #[must_use]
    pub fn platform(&self) -> PlatformId {
        self.inner.profile.platform
    }

    #[must_use]
    pub fn profile(&self) -> &PlatformProfile {
        &self.inner.profile
    }

    /// Start a fresh connection with `credential`.
    ///
    /// Anything held from a previous connection is dropped first. Client
    /// credentials platforms are connected when this returns; authorization
    /// code platforms return the URL the user must visit.
    ///
    /// # Errors
    ///
    /// [`PatchbotError::Configuration`] for an unusable credential, and any
    /// token endpoint error for client-credentials platforms.
    pub async fn initialize(&self, credential: Credential) -> Result<Initialization> {
        let inner = &self.inner;
        inner.profile.validate(&credential)?;
        let credential = Arc::new(credential);
        let (generation, _) = inner.reset(Some(Arc::clone(&credential)));

        match inner.profile.flow {
            GrantFlow::ClientCredentials => {
                let request = inner.profile.client_credentials_request(&credential);
                let grant = inner.endpoint.request_token(request).await.inspect_err(|e| {
                    tracing::warn!(platform = %inner.profile.platform, error = %e, "client credentials exchange failed");
                })?;
                inner.install(generation, grant, None, false)?;
                Ok(Initialization::Connected)
            }
            GrantFlow::AuthorizationCode => {
                let state = random_state();
                let url = inner.profile.authorization_url(&credential, &state)?;
                {
                    let current = lock(&inner.generation);
                    if *current != generation {
                        return Err(PatchbotError::NotConnected(inner.profile.platform));
                    }
                    *lock(&inner.pending) = Some(state);
                    inner.publish(ConnectionState::Authorizing);
                }
                tracing::info!(platform = %inner.profile.platform, "awaiting authorization callback");
                Ok(Initialization::Redirect { url })
            }
        }
    }

    /// Complete an authorization-code flow with the redirect's `code` and `state`.
    ///
    /// A failed exchange leaves the authorization pending, so the same
    /// `state` can be presented again.
    ///
    /// # Errors
    ///
    /// [`PatchbotError::StateMismatch`] when no authorization is pending or
    /// `state` differs from the one issued; [`PatchbotError::Configuration`]
    /// for an empty code; token endpoint errors otherwise.
    pub async fn handle_callback(&self, code: &str, state: &str) -> Result<()> {
        let inner = &self.inner;
        let (generation, credential) = {
            let generation = lock(&inner.generation);
            let pending = lock(&inner.pending);
            if pending.as_deref() != Some(state) {
                tracing::warn!(platform = %inner.profile.platform, "callback state mismatch");
                return Err(PatchbotError::StateMismatch);
            }
            let credential = lock(&inner.credential)
                .clone()
                .ok_or(PatchbotError::NotConnected(inner.profile.platform))?;
            (*generation, credential)
        };
        if code.trim().is_empty() {
            return Err(PatchbotError::Configuration(
                "authorization code is empty".into(),
            ));
        }

        let request = inner.profile.authorization_code_request(&credential, code)?;
        let grant = inner.endpoint.request_token(request).await.inspect_err(|e| {
            tracing::warn!(platform = %inner.profile.platform, error = %e, "authorization code exchange failed");
        })?;
        inner.install(generation, grant, None, true)
    }

    /// Current access token, if one is held and not expired.
    #[must_use]
    pub fn access_token(&self) -> Option<SecretString> {
        let session = self.inner.session.load_full()?;
        session
            .is_valid(Instant::now())
            .then(|| duplicate_secret(&session.token.access_token))
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.inner
            .session
            .load_full()
            .is_some_and(|s| s.is_valid(Instant::now()))
    }

    /// Renew the held token now and re-arm the scheduled refresh.
    ///
    /// On failure the current token is left in place.
    ///
    /// # Errors
    ///
    /// [`PatchbotError::NotConnected`] without a token,
    /// [`PatchbotError::RefreshUnavailable`] when the platform needs a refresh
    /// token and none was issued, token endpoint errors otherwise.
    pub async fn refresh(&self) -> Result<()> {
        self.inner.refresh().await.inspect_err(|e| {
            tracing::warn!(platform = %self.inner.profile.platform, error = %e, "token refresh failed");
        })
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.connection_state()
    }

    /// Snapshot of the connection for display.
    #[must_use]
    pub fn status(&self) -> TokenStatus {
        let inner = &self.inner;
        let platform = inner.profile.platform;
        let Some(session) = inner.session.load_full() else {
            return TokenStatus::disconnected(platform, inner.connection_state());
        };
        let now = Instant::now();
        let valid = session.is_valid(now);
        TokenStatus {
            platform,
            state: if valid {
                ConnectionState::Connected
            } else {
                ConnectionState::Expired
            },
            has_token: true,
            is_valid: valid,
            expires_at: Some(session.token.expires_at),
            time_until_expiry: valid.then(|| session.deadline.saturating_duration_since(now)),
            has_refresh_token: session.token.refresh_token.is_some(),
            next_refresh_in: inner.schedule.next_fire_in(),
        }
    }

    /// Delay until the armed refresh fires.
    #[must_use]
    pub fn next_refresh_in(&self) -> Option<Duration> {
        self.inner.schedule.next_fire_in()
    }

    /// Watch explicit state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.inner.events.subscribe()
    }

    /// Cancel the timer and drop the token and any pending authorization.
    ///
    /// Safe to call repeatedly. Exchanges still in flight are discarded
    /// when they complete.
    pub fn disconnect(&self) {
        let (_, cleared) = self.inner.reset(None);
        if cleared {
            tracing::info!(platform = %self.inner.profile.platform, "disconnected");
        }
    }

    /// Alias of [`TokenLifecycleManager::disconnect`].
    pub fn destroy(&self) {
        self.disconnect();
    }
}

impl Drop for TokenLifecycleManager {
    fn drop(&mut self) {
        self.inner.reset(None);
    }
}

impl Inner {
    /// Drop everything held and start a new generation.
    ///
    /// Returns the new generation and whether anything was cleared.
    fn reset(&self, credential: Option<Arc<Credential>>) -> (u64, bool) {
        let mut generation = lock(&self.generation);
        *generation += 1;
        let cancelled = self.schedule.cancel();
        let had_session = self.session.swap(None).is_some();
        let had_pending = lock(&self.pending).take().is_some();
        *lock(&self.credential) = credential;
        self.publish(ConnectionState::Disconnected);
        (*generation, cancelled || had_session || had_pending)
    }

    fn connection_state(&self) -> ConnectionState {
        match self.session.load_full() {
            Some(session) if session.is_valid(Instant::now()) => ConnectionState::Connected,
            Some(_) => ConnectionState::Expired,
            None if lock(&self.pending).is_some() => ConnectionState::Authorizing,
            None => ConnectionState::Disconnected,
        }
    }

    fn publish(&self, state: ConnectionState) {
        self.events.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    async fn refresh(self: &Arc<Self>) -> Result<()> {
        let platform = self.profile.platform;
        let generation = *lock(&self.generation);
        let session = self
            .session
            .load_full()
            .ok_or(PatchbotError::NotConnected(platform))?;
        let credential = lock(&self.credential)
            .clone()
            .ok_or(PatchbotError::NotConnected(platform))?;

        let request = self.profile.refresh_request(&credential, &session.token)?;
        tracing::debug!(%platform, "refreshing token");
        let grant = self.endpoint.request_token(request).await?;
        self.install(generation, grant, Some(&session.token), false)
    }

    /// Store a freshly issued token and arm the next refresh.
    ///
    /// Fails with `NotConnected` when the connection was reset while the
    /// exchange was in flight; the grant is dropped in that case.
    fn install(
        self: &Arc<Self>,
        generation: u64,
        grant: TokenGrant,
        previous: Option<&TokenState>,
        clear_pending: bool,
    ) -> Result<()> {
        let platform = self.profile.platform;
        let expires_in = match grant.expires_in {
            Some(0) => {
                return Err(PatchbotError::InvalidResponse(
                    "expires_in must be positive".into(),
                ));
            }
            Some(secs) => secs,
            None => self.profile.default_lifetime.as_secs(),
        };
        let lifetime = Duration::from_secs(expires_in);
        if lifetime > MAX_LIFETIME {
            return Err(PatchbotError::InvalidResponse(format!(
                "expires_in {expires_in} exceeds {} seconds",
                MAX_LIFETIME.as_secs()
            )));
        }
        let deadline = Instant::now()
            .checked_add(lifetime)
            .ok_or_else(|| PatchbotError::InvalidResponse("expires_in out of range".into()))?;
        let delay = refresh_delay(lifetime, self.policy.safety_margin, previous.is_some());

        let refresh_token = grant.refresh_token.or_else(|| {
            previous
                .and_then(|p| p.refresh_token.as_ref())
                .map(duplicate_secret)
        });
        let scope = match (grant.scope.as_deref(), previous) {
            (Some(scope), _) => parse_scope(scope),
            (None, Some(previous)) => previous.scope.clone(),
            (None, None) => self.requested_scope(),
        };
        let token = TokenState::from_secret(grant.access_token, lifetime)
            .with_refresh(refresh_token)
            .with_scope(scope);
        let has_refresh_token = token.refresh_token.is_some();

        let current = lock(&self.generation);
        if *current != generation {
            tracing::debug!(%platform, "discarding token issued to a reset connection");
            return Err(PatchbotError::NotConnected(platform));
        }
        self.session.store(Some(Arc::new(Session { token, deadline })));
        if clear_pending {
            *lock(&self.pending) = None;
        }
        // Re-arming from inside the scheduled task aborts that task; nothing
        // awaits after this point, so it still runs to completion.
        self.schedule.arm(delay, scheduled_refresh(Arc::downgrade(self)));
        self.publish(ConnectionState::Connected);
        drop(current);

        tracing::info!(
            %platform,
            expires_in,
            has_refresh_token,
            refresh_in_secs = delay.as_secs(),
            "token acquired"
        );
        Ok(())
    }

    fn requested_scope(&self) -> BTreeSet<String> {
        match lock(&self.credential).as_deref() {
            Some(credential) if !credential.scopes.is_empty() => {
                credential.scopes.iter().cloned().collect()
            }
            _ => self.profile.default_scopes.iter().cloned().collect(),
        }
    }

    /// Arm the retry unless the connection was reset meanwhile.
    fn arm_retry(self: &Arc<Self>, generation: u64) {
        let current = lock(&self.generation);
        if *current == generation {
            self.schedule.arm(
                self.policy.retry_backoff,
                scheduled_retry(Arc::downgrade(self)),
            );
        }
    }
}

/// Delay before the next scheduled refresh of a token living `lifetime`.
///
/// Fires `margin` before expiry. A renewed token whose lifetime is within the
/// margin is refreshed halfway through its life, never sooner than
/// [`MIN_REFRESH_INTERVAL`].
fn refresh_delay(lifetime: Duration, margin: Duration, renewed: bool) -> Duration {
    let delay = lifetime.saturating_sub(margin);
    if renewed && delay.is_zero() {
        (lifetime / 2).max(MIN_REFRESH_INTERVAL)
    } else {
        delay
    }
}

async fn scheduled_refresh(inner: Weak<Inner>) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let platform = inner.profile.platform;
    let generation = *lock(&inner.generation);
    match inner.refresh().await {
        Ok(()) => {}
        Err(e) if e.is_retryable() => {
            tracing::warn!(
                %platform,
                attempt = 1,
                error = %e,
                retry_in_secs = inner.policy.retry_backoff.as_secs(),
                "scheduled refresh failed, will retry"
            );
            inner.arm_retry(generation);
        }
        Err(e) => {
            tracing::error!(%platform, attempt = 1, error = %e, "scheduled refresh failed, giving up");
        }
    }
}

async fn scheduled_retry(inner: Weak<Inner>) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    if let Err(e) = inner.refresh().await {
        tracing::error!(
            platform = %inner.profile.platform,
            attempt = 2,
            error = %e,
            "scheduled refresh failed, giving up"
        );
    }
}
