use serde::{Deserialize, Serialize};

/// Server configuration file (YAML).
///
/// Example `config.yaml`:
/// ```yaml
/// port: 8086
/// data-dir: /var/lib/kportal/data
/// token: my-admin-token
/// sync-interval-secs: 300
/// namespace-cluster-roles:
///   - edit
///   - kubeportal-default
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfigFile {
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default, alias = "data-dir")]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, alias = "sync-interval-secs")]
    pub sync_interval_secs: Option<u64>,
    /// Cluster roles every visible namespace must be bound to.
    #[serde(default, alias = "namespace-cluster-roles")]
    pub namespace_cluster_roles: Option<Vec<String>>,
    #[serde(default, alias = "lease-ttl-secs")]
    pub lease_ttl_secs: Option<u64>,
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config: T = serde_yaml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("kportal-{}-{}.yaml", name, uuid::Uuid::new_v4()))
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = temp_path("missing");
        let cfg: ServerConfigFile = load_config_file(path.to_str().unwrap()).unwrap();
        assert!(cfg.port.is_none());
        assert!(cfg.namespace_cluster_roles.is_none());
    }

    #[test]
    fn kebab_case_keys() {
        let path = temp_path("kebab");
        std::fs::write(
            &path,
            "port: 9000\ndata-dir: /srv/kportal\nsync-interval-secs: 60\nnamespace-cluster-roles:\n  - edit\n  - view\n",
        )
        .unwrap();
        let cfg: ServerConfigFile = load_config_file(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(cfg.port, Some(9000));
        assert_eq!(cfg.data_dir.as_deref(), Some("/srv/kportal"));
        assert_eq!(cfg.sync_interval_secs, Some(60));
        assert_eq!(
            cfg.namespace_cluster_roles,
            Some(vec!["edit".to_string(), "view".to_string()])
        );
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let path = temp_path("broken");
        std::fs::write(&path, "port: [not a port\n").unwrap();
        let result: anyhow::Result<ServerConfigFile> = load_config_file(path.to_str().unwrap());
        std::fs::remove_file(&path).unwrap();
        assert!(result.is_err());
    }
}
