use clap::Parser;
use pkg_api::server::{ServerConfig, start_server};
use pkg_cluster::{ClusterGateway, KubeGateway};
use pkg_constants::network::DEFAULT_API_PORT;
use pkg_constants::paths::{DEFAULT_SERVER_CONFIG, DEFAULT_SERVER_DATA_DIR};
use pkg_constants::state::SYNC_LEASE_TTL_SECS;
use pkg_constants::sync::DEFAULT_SYNC_INTERVAL_SECS;
use pkg_controllers::sync::{SyncOrchestrator, SyncSettings};
use pkg_state::client::StateStore;
use pkg_state::registry::PortalRegistry;
use pkg_types::config::{ServerConfigFile, load_config_file};
use pkg_types::notice::Severity;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "kportal-server",
    about = "Keeps portal namespaces and service accounts in sync with a Kubernetes cluster"
)]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, env = "KPORTAL_CONFIG", default_value = DEFAULT_SERVER_CONFIG)]
    config: String,

    /// Port to listen on
    #[arg(long, env = "KPORTAL_PORT")]
    port: Option<u16>,

    /// Directory for SlateDB state storage
    #[arg(long, env = "KPORTAL_DATA_DIR")]
    data_dir: Option<String>,

    /// Admin token required by the API
    #[arg(long, env = "KPORTAL_TOKEN")]
    token: Option<String>,

    /// Seconds between scheduled sync passes (0 disables the schedule)
    #[arg(long, env = "KPORTAL_SYNC_INTERVAL_SECS")]
    sync_interval_secs: Option<u64>,

    /// Cluster roles every visible namespace is bound to (comma separated)
    #[arg(long, env = "KPORTAL_NAMESPACE_CLUSTER_ROLES", value_delimiter = ',')]
    namespace_cluster_roles: Option<Vec<String>>,

    /// Seconds after which an unreleased sync lease may be taken over
    #[arg(long, env = "KPORTAL_LEASE_TTL_SECS")]
    lease_ttl_secs: Option<u64>,

    /// Run a single sync pass and exit instead of serving the API
    #[arg(long)]
    once: bool,

    /// Log as JSON lines
    #[arg(long, env = "KPORTAL_LOG_JSON")]
    log_json: bool,
}

/// Settings after merging CLI/env, config file and defaults.
#[derive(Debug)]
struct Settings {
    port: u16,
    data_dir: String,
    token: String,
    sync_interval_secs: u64,
    cluster_roles: Vec<String>,
    lease_ttl_secs: u64,
}

impl Settings {
    /// CLI args and environment > config file > defaults.
    fn merge(cli: Cli, file: ServerConfigFile) -> Self {
        let token = cli.token.or(file.token).unwrap_or_else(|| {
            let generated = uuid::Uuid::new_v4().to_string();
            warn!(
                "No admin token configured, generated {}*** for this run",
                mask_token(&generated)
            );
            eprintln!("Admin token for this run: {}", generated);
            generated
        });
        Self {
            port: cli.port.or(file.port).unwrap_or(DEFAULT_API_PORT),
            data_dir: cli
                .data_dir
                .or(file.data_dir)
                .unwrap_or_else(|| DEFAULT_SERVER_DATA_DIR.to_string()),
            token,
            sync_interval_secs: cli
                .sync_interval_secs
                .or(file.sync_interval_secs)
                .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS),
            cluster_roles: cli
                .namespace_cluster_roles
                .or(file.namespace_cluster_roles)
                .unwrap_or_default(),
            lease_ttl_secs: cli
                .lease_ttl_secs
                .or(file.lease_ttl_secs)
                .unwrap_or(SYNC_LEASE_TTL_SECS),
        }
    }

    fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            required_roles: self.cluster_roles.clone(),
            lease_ttl: Duration::from_secs(self.lease_ttl_secs),
            ..Default::default()
        }
    }
}

/// First characters of a token, safe to log.
fn mask_token(token: &str) -> String {
    token.chars().take(4).collect()
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    // Load config file (returns defaults if file not found)
    let file_cfg: ServerConfigFile = load_config_file(&cli.config)?;
    info!("Config file: {}", cli.config);

    let once = cli.once;
    let settings = Settings::merge(cli, file_cfg);

    info!("Starting kportal-server");
    info!("  Port:          {}", settings.port);
    info!("  Data dir:      {}", settings.data_dir);
    info!("  Token:         {}***", mask_token(&settings.token));
    info!("  Sync interval: {}s", settings.sync_interval_secs);
    info!("  Cluster roles: {:?}", settings.cluster_roles);

    let cluster: Arc<dyn ClusterGateway> = Arc::new(KubeGateway::try_default().await?);

    if once {
        return run_once(&settings, cluster).await;
    }

    let config = ServerConfig {
        addr: SocketAddr::from(([0, 0, 0, 0], settings.port)),
        data_dir: settings.data_dir.clone(),
        admin_token: settings.token.clone(),
        sync_interval: (settings.sync_interval_secs > 0)
            .then(|| Duration::from_secs(settings.sync_interval_secs)),
        sync: settings.sync_settings(),
    };

    start_server(config, cluster).await?;

    Ok(())
}

/// One pass without the API, for cron-style deployments.
async fn run_once(settings: &Settings, cluster: Arc<dyn ClusterGateway>) -> anyhow::Result<()> {
    let store = StateStore::new(&settings.data_dir).await?;
    let registry = PortalRegistry::new(store.clone());
    let orchestrator = SyncOrchestrator::new(registry, cluster, settings.sync_settings());

    let outcome = orchestrator.run_once().await;
    let errors = outcome.notices_with(Severity::Error).count();
    store.close().await?;

    if !outcome.success {
        error!("Sync pass failed");
        std::process::exit(1);
    }
    info!("Sync pass completed with {} error notice(s)", errors);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_wins_over_file_and_file_over_defaults() {
        let cli = Cli::parse_from([
            "kportal-server",
            "--port",
            "9000",
            "--namespace-cluster-roles",
            "edit,view",
        ]);
        let file = ServerConfigFile {
            port: Some(8000),
            data_dir: Some("/srv/kportal".to_string()),
            token: Some("secret".to_string()),
            namespace_cluster_roles: Some(vec!["admin".to_string()]),
            ..Default::default()
        };

        let settings = Settings::merge(cli, file);
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.data_dir, "/srv/kportal");
        assert_eq!(settings.token, "secret");
        assert_eq!(settings.cluster_roles, vec!["edit", "view"]);
        assert_eq!(settings.sync_interval_secs, DEFAULT_SYNC_INTERVAL_SECS);
        assert_eq!(settings.lease_ttl_secs, SYNC_LEASE_TTL_SECS);
    }

    #[test]
    fn missing_token_is_generated() {
        let cli = Cli::parse_from(["kportal-server"]);
        let settings = Settings::merge(cli, ServerConfigFile::default());
        assert!(!settings.token.is_empty());
        assert!(settings.cluster_roles.is_empty());
    }

    #[test]
    fn logged_token_is_masked() {
        assert_eq!(mask_token("0123456789abcdef"), "0123");
        assert_eq!(mask_token("ab"), "ab");
    }
}
