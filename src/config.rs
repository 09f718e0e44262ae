use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use stitchgate_handler::{ServiceRoute, ServiceRouteTable};
use stitchgate_planner::PartitionPolicy;
use stitchgate_schema::ComposedSchema;
use tracing::instrument;

#[derive(Debug, Default, Deserialize, Parser)]
pub struct Config {
    /// Path of the config file
    #[clap(long, env = "CONFIG_FILE", default_value = "config.toml")]
    #[serde(skip)]
    pub file: PathBuf,

    #[clap(long, env, default_value = "127.0.0.1:8000")]
    #[serde(default = "default_bind")]
    pub bind: String,

    #[clap(long, env, value_delimiter = ',')]
    #[serde(default)]
    pub forward_headers: Vec<String>,

    /// How top-level fields are grouped into upstream requests: `coalesce` or `split`
    #[clap(long, env, default_value = "coalesce")]
    #[serde(default)]
    pub partition_policy: PartitionPolicy,

    #[clap(skip)]
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub name: String,
    pub addr: String,
    #[serde(default)]
    pub tls: bool,
    pub query_path: Option<String>,
    pub websocket_path: Option<String>,
    /// SDL file describing the schema the service executes
    pub schema: PathBuf,
}

impl ServiceConfig {
    fn from_env(env_prefix: &str, service_prefix: &str) -> anyhow::Result<Self> {
        let var = |suffix: &str| std::env::var(format!("{}{}_{}", env_prefix, service_prefix, suffix));
        let required = |suffix: &str| {
            var(suffix).with_context(|| {
                format!(
                    "Missing required environment variable '{}{}_{}'.",
                    env_prefix, service_prefix, suffix
                )
            })
        };

        Ok(ServiceConfig {
            name: var("NAME").unwrap_or(service_prefix.to_ascii_lowercase()),
            addr: required("ADDR")?,
            tls: var("TLS").unwrap_or("false".to_string()).parse().unwrap_or_default(),
            query_path: var("QUERY_PATH").ok(),
            websocket_path: var("WEBSOCKET_PATH").ok(),
            schema: required("SCHEMA")?.into(),
        })
    }
}

impl Config {
    /// Parse the config file and environment variables.
    /// If the config file exists, it will be parsed first and ignore
    /// environment variables.
    pub fn try_parse() -> anyhow::Result<Self> {
        let mut env_config = Config::parse();

        if Path::exists(&env_config.file) {
            let file_config = std::fs::read_to_string(&env_config.file)
                .with_context(|| format!("Failed to read config file '{}'.", &env_config.file.display()))?;
            let mut file_config: Config = toml::from_str(&file_config)
                .with_context(|| format!("Failed to parse config file '{}'.", &env_config.file.display()))?;
            file_config.file = env_config.file;

            // Override service URI with env var if set
            for service in &mut file_config.services {
                if let Ok(addr) = std::env::var(format!("SERVICE_{}_ADDR", service.name.to_ascii_uppercase())) {
                    tracing::info!("Overriding service '{}' addr with env var", service.name);
                    service.addr = addr;
                }
            }

            Ok(file_config)
        } else {
            let env_prefix = "SERVICE_";

            let mut service_prefixes = std::env::vars()
                .filter_map(|(name, _)| {
                    name.strip_prefix(env_prefix)
                        .and_then(|name| name.split('_').next())
                        .map(ToString::to_string)
                })
                .collect::<Vec<String>>();

            service_prefixes.sort();
            service_prefixes.dedup();

            // Parse dynamically environment variables for services.
            // The following environment variables are parsed:
            // SERVICE_<SERVICE_NAME>_NAME
            // SERVICE_<SERVICE_NAME>_ADDR
            // SERVICE_<SERVICE_NAME>_TLS
            // SERVICE_<SERVICE_NAME>_QUERY_PATH
            // SERVICE_<SERVICE_NAME>_WEBSOCKET_PATH
            // SERVICE_<SERVICE_NAME>_SCHEMA
            env_config.services = service_prefixes
                .iter()
                .map(|service_prefix| ServiceConfig::from_env(env_prefix, service_prefix))
                .collect::<anyhow::Result<Vec<_>>>()?;

            Ok(env_config)
        }
    }

    #[instrument(ret, level = "trace")]
    pub fn create_route_table(&self) -> ServiceRouteTable {
        let mut route_table = ServiceRouteTable::default();
        for service in &self.services {
            route_table.insert(service.name.clone(), ServiceRoute {
                addr: service.addr.clone(),
                tls: service.tls,
                query_path: service.query_path.clone(),
                websocket_path: service.websocket_path.clone(),
            });
        }
        route_table
    }

    /// Load every service's SDL and stitch them into one schema.
    pub fn compose_schema(&self) -> anyhow::Result<ComposedSchema> {
        let documents = self
            .services
            .iter()
            .map(|service| {
                let sdl = std::fs::read_to_string(&service.schema).with_context(|| {
                    format!(
                        "Failed to read schema '{}' of service '{}'.",
                        service.schema.display(),
                        service.name
                    )
                })?;
                let document = parser::parse_schema(sdl)
                    .with_context(|| format!("Failed to parse schema of service '{}'.", service.name))?;
                Ok((service.name.clone(), document))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        ComposedSchema::combine(documents).context("Failed to stitch the service schemas.")
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;
    use tempfile::NamedTempFile;

    use super::*;

    fn clear_service_vars() {
        for (name, _) in std::env::vars() {
            if name.starts_with("SERVICE_") {
                std::env::remove_var(name);
            }
        }
    }

    #[tokio::test]
    #[serial]
    async fn parse_base_env_vars() {
        clear_service_vars();
        std::env::set_var("CONFIG_FILE", "does_not_exist.toml");
        std::env::set_var("FORWARD_HEADERS", "authorization,x-test");
        std::env::set_var("PARTITION_POLICY", "split");

        let parsed_config = Config::try_parse().expect("Failed to parse config");
        assert_eq!(parsed_config.bind, "127.0.0.1:8000");
        assert_eq!(parsed_config.file.display().to_string(), "does_not_exist.toml");
        assert_eq!(parsed_config.forward_headers, vec![
            "authorization".to_string(),
            "x-test".to_string()
        ]);
        assert_eq!(parsed_config.partition_policy, PartitionPolicy::Split);
        assert!(parsed_config.services.is_empty());

        std::env::remove_var("CONFIG_FILE");
        std::env::remove_var("FORWARD_HEADERS");
        std::env::remove_var("PARTITION_POLICY");
    }

    #[tokio::test]
    #[serial]
    async fn parse_service_env_vars() {
        clear_service_vars();
        std::env::set_var("CONFIG_FILE", "does_not_exist.toml");
        std::env::set_var("SERVICE_TESTENV_NAME", "testenv");
        std::env::set_var("SERVICE_TESTENV_ADDR", "test.tld");
        std::env::set_var("SERVICE_TESTENV_TLS", "true");
        std::env::set_var("SERVICE_TESTENV_QUERY_PATH", "/graphql");
        std::env::set_var("SERVICE_TESTENV_WEBSOCKET_PATH", "/graphql/ws");
        std::env::set_var("SERVICE_TESTENV_SCHEMA", "schemas/testenv.graphql");

        let parsed_config = Config::try_parse().expect("Failed to parse config");
        assert_eq!(parsed_config.partition_policy, PartitionPolicy::Coalesce);
        assert_eq!(parsed_config.services.len(), 1);
        let service_config = parsed_config.services.first().expect("No service config");
        assert_eq!(service_config.name, "testenv");
        assert_eq!(service_config.addr, "test.tld");
        assert!(service_config.tls);
        assert_eq!(service_config.query_path, Some("/graphql".to_string()));
        assert_eq!(service_config.websocket_path, Some("/graphql/ws".to_string()));
        assert_eq!(service_config.schema, PathBuf::from("schemas/testenv.graphql"));

        clear_service_vars();
        std::env::remove_var("CONFIG_FILE");
    }

    #[tokio::test]
    #[serial]
    async fn service_env_vars_require_an_address() {
        clear_service_vars();
        std::env::set_var("CONFIG_FILE", "does_not_exist.toml");
        std::env::set_var("SERVICE_BROKEN_SCHEMA", "broken.graphql");

        let err = Config::try_parse().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required environment variable 'SERVICE_BROKEN_ADDR'."
        );

        clear_service_vars();
        std::env::remove_var("CONFIG_FILE");
    }

    #[tokio::test]
    #[serial]
    async fn parse_config_file() {
        clear_service_vars();
        let mut tmpfile = NamedTempFile::with_prefix("stitchgate").expect("Failed to create temp config");
        write!(
            tmpfile,
            r#"
        bind = "0.0.0.0:4000"
        forward_headers = ["authorization"]
        partition_policy = "split"
        [[services]]
        name = "test"
        addr = "test:4000"
        query_path = "/public/graphql"
        websocket_path = "/public/ws"
        schema = "test.graphql"
        "#
        )
        .expect("Failed to write temp config");
        std::env::set_var("CONFIG_FILE", tmpfile.path().display().to_string());
        std::env::set_var("BIND", "127.0.0.1:8000");

        let parsed_config = Config::try_parse().expect("Failed to parse config");
        assert_eq!(parsed_config.bind, "0.0.0.0:4000");
        assert_eq!(parsed_config.forward_headers, vec!["authorization".to_string()]);
        assert_eq!(parsed_config.partition_policy, PartitionPolicy::Split);
        assert_eq!(parsed_config.services.len(), 1);

        let service_config = parsed_config.services.first().expect("No service config");
        assert_eq!(service_config.name, "test");
        assert_eq!(service_config.addr, "test:4000");
        assert!(!service_config.tls);
        assert_eq!(service_config.query_path, Some("/public/graphql".to_string()));
        assert_eq!(service_config.websocket_path, Some("/public/ws".to_string()));

        let route_table = parsed_config.create_route_table();
        assert_eq!(route_table["test"].addr, "test:4000");

        std::env::remove_var("CONFIG_FILE");
        std::env::remove_var("BIND");
    }

    #[tokio::test]
    #[serial]
    async fn parse_config_file_service_addr_override() {
        clear_service_vars();
        let mut tmpfile = NamedTempFile::with_prefix("stitchgate").expect("Failed to create temp config");
        write!(
            tmpfile,
            r#"
        [[services]]
        name = "testoverride"
        addr = "test:4000"
        schema = "test.graphql"
        "#
        )
        .expect("Failed to write temp config");
        std::env::set_var("CONFIG_FILE", tmpfile.path().display().to_string());
        std::env::set_var("SERVICE_TESTOVERRIDE_ADDR", "127.0.0.1:8000");

        let parsed_config = Config::try_parse().expect("Failed to parse config");
        assert_eq!(parsed_config.partition_policy, PartitionPolicy::Coalesce);
        assert_eq!(parsed_config.services.len(), 1);

        let service_config = parsed_config.services.first().expect("No service config");
        assert_eq!(service_config.name, "testoverride");
        assert_eq!(service_config.addr, "127.0.0.1:8000");

        std::env::remove_var("CONFIG_FILE");
        std::env::remove_var("SERVICE_TESTOVERRIDE_ADDR");
    }

    #[test]
    #[serial]
    fn compose_schema_from_files() {
        let mut accounts = NamedTempFile::new().expect("Failed to create temp schema");
        write!(accounts, "type Query {{ me: String }}").expect("Failed to write temp schema");
        let mut reviews = NamedTempFile::new().expect("Failed to create temp schema");
        write!(reviews, "type Query {{ topReviews: [String!]! }}").expect("Failed to write temp schema");

        let config = Config {
            services: vec![
                ServiceConfig {
                    name: "accounts".to_string(),
                    addr: "accounts:8000".to_string(),
                    tls: false,
                    query_path: None,
                    websocket_path: None,
                    schema: accounts.path().to_path_buf(),
                },
                ServiceConfig {
                    name: "reviews".to_string(),
                    addr: "reviews:8000".to_string(),
                    tls: false,
                    query_path: None,
                    websocket_path: None,
                    schema: reviews.path().to_path_buf(),
                },
            ],
            ..Default::default()
        };

        let schema = config.compose_schema().expect("Failed to compose schema");
        assert_eq!(schema.upstream_of("Query", "me"), Some("accounts"));
        assert_eq!(schema.upstream_of("Query", "topReviews"), Some("reviews"));

        let missing = Config {
            services: vec![ServiceConfig {
                schema: PathBuf::from("does_not_exist.graphql"),
                ..config.services[0].clone()
            }],
            ..Default::default()
        };
        assert!(missing.compose_schema().is_err());
    }
}
