/*!
 * Sandbox Broker
 * Drives one open request from account resolution to a committed session
 *
 * START -> PERMISSION_RESOLVED -> FILE_OPENED -> SESSION_RESOLVED
 *       -> LINKED (skipped on exact-URI reuse) -> LAUNCHING
 *       -> COMMITTED | FAILED
 *
 * Every failing request produces one alert and at most one fault event,
 * and every request terminates its context exactly once.
 */

use super::cleanup;
use super::request::{OpenOutcome, OpenRequest, OpenState, Reuse};
use super::key_lock::KeyLocks;
use crate::core::clock::{Clock, SystemClock};
use crate::core::config::BrokerConfig;
use crate::core::errors::{BrokerError, IdentityError, ServiceError};
use crate::core::types::{AppIndex, BrokerResult, SandboxKey, UserId};
use crate::link::{LinkFile, LinkProvisioner};
use crate::monitoring::{EventCode, RequestSpan, StageSpan, Telemetry, TelemetryEvent, TracingSink};
use crate::permissions::{GatheringPolicy, PermissionResolver, PermissionTier, PolicyResolver};
use crate::services::{
    AlertPresenter, AssetLookup, DlpFile, DlpFileService, FileAsset, IdentityProvider,
    LaunchRequest, RequestContext, SandboxManager, SourceFd, UriGrant,
};
use crate::session::{
    CommitOutcome, ReverseResolution, ReverseResolver, Session, SessionSummary, SharedRegistry,
};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};

/// External collaborators the broker drives
#[derive(Clone)]
pub struct BrokerServices {
    pub identity: Arc<dyn IdentityProvider>,
    pub files: Arc<dyn DlpFileService>,
    pub sandboxes: Arc<dyn SandboxManager>,
    pub assets: Arc<dyn AssetLookup>,
    pub alerts: Arc<dyn AlertPresenter>,
}

/// Builder for SandboxBroker
pub struct SandboxBrokerBuilder {
    services: BrokerServices,
    config: BrokerConfig,
    resolver: Option<Arc<dyn PermissionResolver>>,
    telemetry: Option<Telemetry>,
    clock: Option<Arc<dyn Clock>>,
    registry: Option<SharedRegistry>,
}

impl SandboxBrokerBuilder {
    pub fn new(services: BrokerServices) -> Self {
        Self {
            services,
            config: BrokerConfig::default(),
            resolver: None,
            telemetry: None,
            clock: None,
            registry: None,
        }
    }

    pub fn with_config(mut self, config: BrokerConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the policy-table resolver
    pub fn with_resolver(mut self, resolver: Arc<dyn PermissionResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Share a registry with other owners
    pub fn with_registry(mut self, registry: SharedRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> SandboxBroker {
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(PolicyResolver) as Arc<dyn PermissionResolver>);
        let telemetry = self
            .telemetry
            .unwrap_or_else(|| Telemetry::new(Arc::new(TracingSink)));
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let registry = self.registry.unwrap_or_default();

        let provisioner = LinkProvisioner::new(&self.config, clock);
        let reverse = ReverseResolver::new(
            registry.clone(),
            self.services.identity.clone(),
            resolver.clone(),
            self.config.account_kind,
        );

        info!(
            mount = %self.config.link_mount_prefix.display(),
            account_kind = ?self.config.account_kind,
            "Sandbox broker initialized"
        );

        SandboxBroker {
            config: self.config,
            services: self.services,
            resolver,
            telemetry,
            provisioner,
            registry,
            reverse,
            uri_locks: KeyLocks::new(),
            tier_locks: KeyLocks::new(),
        }
    }
}

/// Coordinates DLP files, link files, and sandbox instances
pub struct SandboxBroker {
    config: BrokerConfig,
    services: BrokerServices,
    resolver: Arc<dyn PermissionResolver>,
    telemetry: Telemetry,
    provisioner: LinkProvisioner,
    registry: SharedRegistry,
    reverse: ReverseResolver,
    uri_locks: KeyLocks,
    /// Held by gathering opens from route lookup to commit
    tier_locks: KeyLocks,
}

/// Terminates the request context when the request ends, on every path
struct TerminateOnDrop<'a>(&'a dyn RequestContext);

impl Drop for TerminateOnDrop<'_> {
    fn drop(&mut self) {
        self.0.terminate();
    }
}

/// Instance chosen for a request
enum Placement {
    /// URI already has a committed session
    Existing(Arc<Session>),
    /// Instance that still needs a fresh link
    New { key: SandboxKey, reuse: Reuse },
}

/// Request-scoped values known once the file is open
struct Opened<'r> {
    request: &'r OpenRequest,
    user_id: UserId,
    source_fd: SourceFd,
    file: Arc<dyn DlpFile>,
    tier: PermissionTier,
    gathering: GatheringPolicy,
}

impl SandboxBroker {
    pub fn builder(services: BrokerServices) -> SandboxBrokerBuilder {
        SandboxBrokerBuilder::new(services)
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Open `request.uri` inside the requested sandboxed application
    pub async fn open_request(
        &self,
        request: &OpenRequest,
        ctx: &dyn RequestContext,
    ) -> BrokerResult<OpenOutcome> {
        let _terminate = TerminateOnDrop(ctx);
        let span = RequestSpan::new("open_request", &request.uri);

        let mut state = OpenState::Start;
        let result = self
            .run_open(request, &mut state)
            .instrument(span.span().clone())
            .await;

        match &result {
            Ok(outcome) => {
                span.record_outcome("committed");
                info!(
                    trace_id = %span.trace_id(),
                    uri = %request.uri,
                    sandbox = %outcome.key,
                    link_name = %outcome.link_name,
                    reuse = ?outcome.reuse,
                    "Open request committed"
                );
            }
            Err(e) => {
                span.record_outcome("failed");
                error!(
                    trace_id = %span.trace_id(),
                    uri = %request.uri,
                    error = %e,
                    "Open request failed"
                );
                self.services.alerts.present(e.alert()).await;
            }
        }
        result
    }

    /// Map a link file back to its DLP file for the current identity
    pub async fn reverse_resolve(&self, link_name: &str) -> BrokerResult<ReverseResolution> {
        self.reverse.resolve(link_name).await
    }

    /// Tear down one session when its sandbox closes the link
    pub async fn close_link(&self, key: &SandboxKey, link_name: &str) -> Option<SessionSummary> {
        let Some(session) = self
            .registry
            .remove_by_sandbox_key_and_link_name(key, link_name)
        else {
            debug!(sandbox = %key, link_name = %link_name, "No session to close");
            return None;
        };
        cleanup::release_session(self.services.files.as_ref(), &session).await;
        info!(sandbox = %key, link_name = %link_name, uri = %session.uri, "Session closed");
        Some(session.summary())
    }

    /// Tear down every session of an exited sandbox instance
    pub async fn sandbox_exited(&self, key: &SandboxKey) -> usize {
        let sessions = self.registry.remove_sandbox(key);
        join_all(
            sessions
                .iter()
                .map(|session| cleanup::release_session(self.services.files.as_ref(), session)),
        )
        .await;
        if !sessions.is_empty() {
            info!(sandbox = %key, sessions = sessions.len(), "Sandbox exited, sessions released");
        }
        sessions.len()
    }

    async fn run_open(
        &self,
        request: &OpenRequest,
        state: &mut OpenState,
    ) -> BrokerResult<OpenOutcome> {
        let result = self.drive(request, state).await;
        if let Err(e) = &result {
            debug!(state = %state, error = %e, "Open request aborted");
            transition(state, OpenState::Failed);
        }
        result
    }

    async fn drive(&self, request: &OpenRequest, state: &mut OpenState) -> BrokerResult<OpenOutcome> {
        request.validate()?;
        let _uri_guard = self.uri_locks.acquire(&request.uri).await;

        let account = self
            .services
            .identity
            .current_account()
            .await
            .map_err(|e| IdentityError::Unavailable(e.reason()))?;
        let identity = account.identity(self.config.account_kind)?.to_string();
        transition(state, OpenState::PermissionResolved);

        let bundle = request.target.bundle_name.as_str();
        let (source_fd, file) = match self.open_file(&request.uri).await {
            Ok(opened) => opened,
            Err(e) => {
                self.fault(&e, account.user_id, bundle, None).await;
                return Err(e);
            }
        };
        transition(state, OpenState::FileOpened);

        let tier = match self
            .resolver
            .resolve(&identity, file.policy())
            .ensure_grantable()
        {
            Ok(tier) => tier,
            Err(e) => {
                cleanup::close_source(self.services.files.as_ref(), file.as_ref(), source_fd).await;
                return Err(e);
            }
        };

        let gathering = match file.gathering_policy().await {
            Ok(policy) => policy,
            Err(e) => {
                cleanup::close_source(self.services.files.as_ref(), file.as_ref(), source_fd).await;
                let err = BrokerError::SandboxInstall(e);
                self.fault(&err, account.user_id, bundle, None).await;
                return Err(err);
            }
        };

        // A gathering install publishes its tier route only at commit
        let _tier_guard = match gathering {
            GatheringPolicy::Gathering => Some(
                self.tier_locks
                    .acquire(&format!("{}#{}", bundle, tier))
                    .await,
            ),
            GatheringPolicy::NonGathering => None,
        };

        let opened = Opened {
            request,
            user_id: account.user_id,
            source_fd,
            file,
            tier,
            gathering,
        };

        match self.place(&opened).await? {
            Placement::Existing(session) => {
                transition(state, OpenState::SessionResolved);
                self.launch_existing(&opened, session, state).await
            }
            Placement::New { key, reuse } => {
                transition(state, OpenState::SessionResolved);
                self.launch_new(opened, key, reuse, state).await
            }
        }
    }

    /// Source descriptor and parsed DLP file behind `uri`
    async fn open_file(&self, uri: &str) -> BrokerResult<(SourceFd, Arc<dyn DlpFile>)> {
        let stage = StageSpan::new("open_file", self.config.slow_stage());
        let files = self.services.files.as_ref();
        let opened = async {
            let fd = files.source_fd(uri).await?;
            match files.open(fd).await {
                Ok(file) => Ok::<_, ServiceError>((fd, file)),
                Err(e) => {
                    cleanup::release_source(files, fd).await;
                    Err(e)
                }
            }
        }
        .await;
        opened.map_err(|e| {
            stage.record_error(&e.to_string());
            BrokerError::FileOpen(e)
        })
    }

    /// Apply reuse order: exact URI, then gathering tier, then install
    async fn place(&self, opened: &Opened<'_>) -> BrokerResult<Placement> {
        let request = opened.request;
        if let Some(existing) = self.registry.lookup_by_uri(&request.uri) {
            debug!(uri = %request.uri, sandbox = %existing.key, "File already open, reusing session");
            // The duplicate handle opened for this request is not needed
            if !Arc::ptr_eq(&existing.file, &opened.file) {
                cleanup::close_file(opened.file.as_ref()).await;
            }
            if opened.source_fd != existing.source_fd {
                cleanup::release_source(self.services.files.as_ref(), opened.source_fd).await;
            }
            return Ok(Placement::Existing(existing));
        }

        let bundle = request.target.bundle_name.as_str();
        if let Some(key) = self
            .registry
            .lookup_for_gathering(opened.tier, opened.gathering, bundle)
        {
            info!(uri = %request.uri, sandbox = %key, tier = %opened.tier, "Gathering on, routing to existing sandbox");
            return Ok(Placement::New {
                key,
                reuse: Reuse::Gathering,
            });
        }

        let stage = StageSpan::new("install_sandbox", self.config.slow_stage());
        let installed = self
            .services
            .sandboxes
            .install(bundle, opened.tier, opened.user_id, &request.uri)
            .await;
        match installed {
            Ok(app_index) => {
                drop(stage);
                let key = SandboxKey::new(bundle, app_index);
                self.telemetry
                    .emit(TelemetryEvent::behavior(
                        EventCode::InstallSandboxSuccess,
                        opened.user_id,
                        &key,
                    ))
                    .await;
                Ok(Placement::New {
                    key,
                    reuse: Reuse::Fresh,
                })
            }
            Err(e) => {
                stage.record_error(&e.to_string());
                drop(stage);
                self.close_opened(opened).await;
                let err = BrokerError::SandboxInstall(e);
                self.fault(&err, opened.user_id, bundle, None).await;
                Err(err)
            }
        }
    }

    /// Relaunch the instance that already holds this URI's link
    async fn launch_existing(
        &self,
        opened: &Opened<'_>,
        session: Arc<Session>,
        state: &mut OpenState,
    ) -> BrokerResult<OpenOutcome> {
        let request = opened.request;
        let asset = self.asset_for(&request.uri).await?;
        transition(state, OpenState::Launching);

        let launch = self.launch_request(request, &session.key, &session.link, asset, opened.tier);
        launch.validate()?;
        if let Err(e) = self.launch(&launch).await {
            self.fault(&e, opened.user_id, &session.key.bundle_name, Some(session.key.app_index))
                .await;
            return Err(e);
        }

        let outcome = OpenOutcome {
            key: session.key.clone(),
            link_name: session.link.name.clone(),
            link_uri: session.link.uri.clone(),
            writable: session.link.writable(),
            tier: opened.tier,
            reuse: Reuse::ExactUri,
        };
        self.committed(session, opened, state).await;
        Ok(outcome)
    }

    /// Provision a link into `key` and launch it
    async fn launch_new(
        &self,
        opened: Opened<'_>,
        key: SandboxKey,
        reuse: Reuse,
        state: &mut OpenState,
    ) -> BrokerResult<OpenOutcome> {
        let request = opened.request;

        let stage = StageSpan::new("add_link", self.config.slow_stage());
        let link = match self
            .provisioner
            .provision(opened.file.as_ref(), &key, &request.file_name)
            .await
        {
            Ok(link) => link,
            Err(e) => {
                stage.record_error(&e.to_string());
                drop(stage);
                self.close_opened(&opened).await;
                let err = BrokerError::LinkCreation(e);
                self.fault(&err, opened.user_id, &key.bundle_name, Some(key.app_index))
                    .await;
                return Err(err);
            }
        };
        drop(stage);
        transition(state, OpenState::Linked);

        let asset = match self.asset_for(&request.uri).await {
            Ok(asset) => asset,
            Err(e) => {
                self.release_opened(&opened, &link).await;
                return Err(e);
            }
        };
        transition(state, OpenState::Launching);

        let launch = self.launch_request(request, &key, &link, asset, opened.tier);
        let launched = match launch.validate() {
            Ok(()) => self.launch(&launch).await,
            Err(e) => Err(e),
        };
        if let Err(e) = launched {
            self.release_opened(&opened, &link).await;
            self.fault(&e, opened.user_id, &key.bundle_name, Some(key.app_index))
                .await;
            return Err(e);
        }

        let outcome = OpenOutcome {
            key: key.clone(),
            link_name: link.name.clone(),
            link_uri: link.uri.clone(),
            writable: link.writable(),
            tier: opened.tier,
            reuse,
        };
        let session = Arc::new(Session {
            uri: request.uri.clone(),
            file: opened.file.clone(),
            link,
            source_fd: opened.source_fd,
            key,
            tier: opened.tier,
        });
        self.committed(session, &opened, state).await;
        Ok(outcome)
    }

    /// Close the request's file and its source descriptor
    async fn close_opened(&self, opened: &Opened<'_>) {
        cleanup::close_source(
            self.services.files.as_ref(),
            opened.file.as_ref(),
            opened.source_fd,
        )
        .await;
    }

    /// Undo a provisioned but uncommitted link along with the file
    async fn release_opened(&self, opened: &Opened<'_>, link: &LinkFile) {
        cleanup::release_link(
            self.services.files.as_ref(),
            opened.file.as_ref(),
            link,
            opened.source_fd,
        )
        .await;
    }

    async fn asset_for(&self, uri: &str) -> BrokerResult<FileAsset> {
        self.services.assets.asset_for(uri).await.ok_or_else(|| {
            warn!(uri = %uri, "No media asset for file");
            BrokerError::AssetResolution {
                uri: uri.to_string(),
            }
        })
    }

    fn launch_request(
        &self,
        request: &OpenRequest,
        key: &SandboxKey,
        link: &LinkFile,
        asset: FileAsset,
        tier: PermissionTier,
    ) -> LaunchRequest {
        let writable = link.writable();
        LaunchRequest {
            sandbox: key.clone(),
            ability_name: request.target.ability_name.clone(),
            module_name: request.target.module_name.clone(),
            link_name: link.name.clone(),
            link_uri: link.uri.clone(),
            link_writable: writable,
            uri_grant: UriGrant::for_writable(writable),
            original_uri: request.uri.clone(),
            asset,
            security_flag: tier.security_flag(),
        }
    }

    async fn launch(&self, launch: &LaunchRequest) -> BrokerResult<()> {
        let stage = StageSpan::new("start_sandbox", self.config.slow_stage());
        self.services.sandboxes.launch(launch).await.map_err(|e| {
            stage.record_error(&e.to_string());
            BrokerError::SandboxLaunch(e)
        })
    }

    /// Register a launched session and report it
    async fn committed(&self, session: Arc<Session>, opened: &Opened<'_>, state: &mut OpenState) {
        let key = session.key.clone();
        match self.registry.commit(session, opened.gathering) {
            CommitOutcome::Inserted | CommitOutcome::Refreshed => {}
            CommitOutcome::Replaced(previous) => {
                warn!(
                    uri = %previous.uri,
                    previous_link = %previous.link_name(),
                    "Registered session displaced"
                );
            }
        }
        transition(state, OpenState::Committed);

        self.telemetry
            .emit(TelemetryEvent::behavior(
                EventCode::StartSandboxSuccess,
                opened.user_id,
                &key,
            ))
            .await;

        if let Err(e) = self.services.sandboxes.start_companion().await {
            warn!(error = %e, "Failed to start companion service");
        }
    }

    /// Emit the fault event `err` maps to, if any
    async fn fault(
        &self,
        err: &BrokerError,
        user_id: UserId,
        bundle: &str,
        app_index: Option<AppIndex>,
    ) {
        if let Some(code) = err.fault_code() {
            self.telemetry
                .emit(TelemetryEvent::fault(
                    code,
                    user_id,
                    bundle,
                    app_index,
                    err.fault_reason(),
                ))
                .await;
        }
    }
}

fn transition(state: &mut OpenState, next: OpenState) {
    debug!(from = %state, to = %next, "open state");
    *state = next;
}

impl std::fmt::Debug for SandboxBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxBroker")
            .field("config", &self.config)
            .field("provisioner", &self.provisioner)
            .field("registry", &self.registry.stats())
            .finish_non_exhaustive()
    }
}
