use clap::{Parser, Subcommand};
use crossterm::style::Stylize;
use pkg_constants::network::DEFAULT_API_ADDR;
use pkg_types::namespace::ClusterNamespace;
use pkg_types::notice::{Notice, Severity};
use pkg_types::service_account::ClusterServiceAccount;
use pkg_types::sync::SyncOutcome;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::info;

#[derive(Parser)]
#[command(name = "kportalctl", about = "CLI tool for the kportal server")]
struct Cli {
    /// Server API endpoint
    #[arg(long, env = "KPORTAL_SERVER", default_value = DEFAULT_API_ADDR)]
    server: String,

    /// Admin token
    #[arg(long, env = "KPORTAL_TOKEN", default_value = "")]
    token: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize namespaces and service accounts with Kubernetes
    Sync,
    /// Manage namespace records
    Ns {
        #[command(subcommand)]
        action: NsAction,
    },
    /// Manage service account records
    Sa {
        #[command(subcommand)]
        action: SaAction,
    },
}

#[derive(Subcommand)]
enum NsAction {
    /// List namespace records
    List,
    /// Request a new namespace, created on the next sync
    Create { name: String },
    /// Hide a namespace from role binding enforcement
    Hide { id: String },
    /// Make a hidden namespace visible again
    Show { id: String },
}

#[derive(Subcommand)]
enum SaAction {
    /// List service account records
    List {
        /// Only accounts of this namespace record id
        #[arg(long, short)]
        namespace: Option<String>,
    },
    /// Request a new service account, created on the next sync
    Create { namespace_id: String, name: String },
}

struct Api {
    client: reqwest::Client,
    base: String,
    token: String,
}

impl Api {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base.trim_end_matches('/'), path)
    }

    /// Send the request and decode the JSON body, exiting with the server's
    /// answer on any non-success status.
    async fn send<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> anyhow::Result<T> {
        let resp = req.bearer_auth(&self.token).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            eprintln!("Error: server returned {}: {}", status, body);
            std::process::exit(1);
        }
        Ok(resp.json().await?)
    }
}

fn print_notice(notice: &Notice) {
    let line = match notice.severity {
        Severity::Info => notice.message.clone().stylize(),
        Severity::Success => notice.message.clone().green(),
        Severity::Warning => notice.message.clone().yellow(),
        Severity::Error => notice.message.clone().red(),
    };
    println!("{}", line);
}

fn print_namespaces(namespaces: &[ClusterNamespace]) {
    println!(
        "{:<38} {:<24} {:<8} {:<10} {}",
        "ID", "NAME", "VISIBLE", "STATE", "CREATED"
    );
    for ns in namespaces {
        println!(
            "{:<38} {:<24} {:<8} {:<10} {}",
            ns.id,
            ns.name,
            ns.visible,
            if ns.is_synced() { "synced" } else { "pending" },
            ns.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    if namespaces.is_empty() {
        println!("(no namespaces)");
    }
}

fn print_service_accounts(accounts: &[ClusterServiceAccount]) {
    println!(
        "{:<38} {:<24} {:<38} {:<10} {}",
        "ID", "NAME", "NAMESPACE ID", "STATE", "CREATED"
    );
    for sa in accounts {
        println!(
            "{:<38} {:<24} {:<38} {:<10} {}",
            sa.id,
            sa.name,
            sa.namespace_id,
            if sa.is_synced() { "synced" } else { "pending" },
            sa.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    if accounts.is_empty() {
        println!("(no service accounts)");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();

    let api = Api {
        client: reqwest::Client::new(),
        base: cli.server.clone(),
        token: cli.token.clone(),
    };

    match &cli.command {
        Commands::Sync => {
            info!("Requesting sync pass from {}", cli.server);
            let outcome: SyncOutcome = api.send(api.client.post(api.url("/api/v1/sync"))).await?;
            for notice in &outcome.notices {
                print_notice(notice);
            }
            if !outcome.success {
                std::process::exit(1);
            }
        }
        Commands::Ns { action } => match action {
            NsAction::List => {
                let namespaces: Vec<ClusterNamespace> =
                    api.send(api.client.get(api.url("/api/v1/namespaces"))).await?;
                print_namespaces(&namespaces);
            }
            NsAction::Create { name } => {
                let ns: ClusterNamespace = api
                    .send(
                        api.client
                            .post(api.url("/api/v1/namespaces"))
                            .json(&json!({ "name": name })),
                    )
                    .await?;
                println!("namespace '{}' requested (id={})", ns.name, ns.id);
            }
            NsAction::Hide { id } | NsAction::Show { id } => {
                let visible = matches!(action, NsAction::Show { .. });
                let ns: ClusterNamespace = api
                    .send(
                        api.client
                            .put(api.url(&format!("/api/v1/namespaces/{}/visibility", id)))
                            .json(&json!({ "visible": visible })),
                    )
                    .await?;
                println!("namespace '{}' visible={}", ns.name, ns.visible);
            }
        },
        Commands::Sa { action } => match action {
            SaAction::List { namespace } => {
                let path = match namespace {
                    Some(id) => format!("/api/v1/serviceaccounts?namespace={}", id),
                    None => "/api/v1/serviceaccounts".to_string(),
                };
                let accounts: Vec<ClusterServiceAccount> =
                    api.send(api.client.get(api.url(&path))).await?;
                print_service_accounts(&accounts);
            }
            SaAction::Create { namespace_id, name } => {
                let sa: ClusterServiceAccount = api
                    .send(
                        api.client
                            .post(api.url(&format!(
                                "/api/v1/namespaces/{}/serviceaccounts",
                                namespace_id
                            )))
                            .json(&json!({ "name": name })),
                    )
                    .await?;
                println!("service account '{}' requested (id={})", sa.name, sa.id);
            }
        },
    }

    Ok(())
}
