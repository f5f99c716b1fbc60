//! Platform and AWS connection flags shared by the networked commands.

use anyhow::{Context, Result};
use bridgeform_aws::config::{DEFAULT_REGION, ENDPOINT_URL_ENV, PROFILE_ENV, REGION_ENV};
use bridgeform_aws::{AwsConfig, Credentials, ParameterStore, SsmClient};
use bridgeform_synapse::client::REPO_ENDPOINT_ENV;
use bridgeform_synapse::credentials::{resolve_token, ResolvedToken};
use bridgeform_synapse::{ClientConfig, SynapseClient};
use clap::Args;
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct AuthArgs {
    /// SSM parameter holding a Synapse personal access token (SecureString).
    ///
    /// Without it the token comes from SYNAPSE_AUTH_TOKEN or ~/.synapseConfig.
    #[arg(long)]
    pub ssm_parameter: Option<String>,

    /// AWS profile from the shared config/credentials files.
    #[arg(long, env = PROFILE_ENV)]
    pub aws_profile: Option<String>,

    #[arg(long, env = REGION_ENV, default_value = DEFAULT_REGION)]
    pub aws_region: String,

    /// Override for every AWS service endpoint (S3 emulator, VPC endpoint).
    #[arg(long, env = ENDPOINT_URL_ENV)]
    pub aws_endpoint_url: Option<String>,

    /// Synapse repository endpoint (the file service is derived from it).
    #[arg(long, env = REPO_ENDPOINT_ENV)]
    pub synapse_endpoint: Option<String>,
}

impl AuthArgs {
    pub fn aws_config(&self) -> Result<AwsConfig> {
        Ok(AwsConfig::new(self.aws_region.clone())
            .with_profile(self.aws_profile.clone())
            .with_endpoint_url(self.aws_endpoint_url.as_deref())?)
    }

    pub fn aws_credentials(&self) -> Result<Credentials> {
        bridgeform_aws::credentials::resolve(&self.aws_config()?)
            .context("resolving AWS credentials")
    }

    pub fn client_config(&self) -> Result<ClientConfig> {
        let config = ClientConfig::default();
        match &self.synapse_endpoint {
            Some(endpoint) => Ok(config.with_repo_endpoint(endpoint)?),
            None => Ok(config),
        }
    }

    /// Authenticated platform client; the token is validated with a profile lookup.
    pub fn connect_synapse(&self) -> Result<SynapseClient> {
        let explicit = match &self.ssm_parameter {
            Some(name) => {
                let ssm = SsmClient::new(self.aws_config()?, self.aws_credentials()?)?;
                Some(fetch_platform_token(&ssm, name)?)
            }
            None => None,
        };
        let ResolvedToken { token, source } = resolve_token(explicit)?;
        let client = SynapseClient::new(token, self.client_config()?)?;
        let profile = client
            .user_profile()
            .with_context(|| format!("authenticating with token from {source}"))?;
        info!(user = %profile.user_name, owner_id = %profile.owner_id, %source, "logged in to Synapse");
        Ok(client)
    }
}

pub fn fetch_platform_token(store: &dyn ParameterStore, name: &str) -> Result<String> {
    let token = store
        .get_parameter(name, true)
        .with_context(|| format!("reading Synapse token from SSM parameter {name}"))?;
    info!(parameter = name, "fetched Synapse token from SSM");
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridgeform_aws::StaticParameterStore;

    fn args() -> AuthArgs {
        AuthArgs {
            ssm_parameter: None,
            aws_profile: None,
            aws_region: "us-west-2".to_string(),
            aws_endpoint_url: None,
            synapse_endpoint: None,
        }
    }

    #[test]
    fn token_from_parameter_store() {
        let store = StaticParameterStore::new().with("/bridge/synapse-token", "pat");
        assert_eq!(fetch_platform_token(&store, "/bridge/synapse-token").unwrap(), "pat");
        let err = fetch_platform_token(&store, "/other").unwrap_err();
        assert!(format!("{err:#}").contains("/other"));
    }

    #[test]
    fn endpoints_follow_flags() {
        let mut args = args();
        assert_eq!(args.aws_config().unwrap().region, "us-west-2");
        args.synapse_endpoint = Some("https://repo-staging.prod.sagebase.org/repo/v1".to_string());
        let config = args.client_config().unwrap();
        assert_eq!(
            config.file_endpoint.as_str(),
            "https://repo-staging.prod.sagebase.org/file/v1"
        );
    }
}
