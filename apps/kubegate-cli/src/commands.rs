//! `check` and `describe`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use gatekeeper::{Gatekeeper, GatekeeperConfig, GatekeeperLocalClient, RequestScope};
use gatekeeper_sdk::{
    AuthMode, AuthorizationContext, CallMetadata, GatekeeperClient, GatekeeperError,
    RequestDescriptor, RequestInput,
};
use serde::Serialize;

use crate::deployment::Deployment;

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Gatekeeper settings (YAML). Defaults and `KUBEGATE_*` apply without it.
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Clusters, plugins and cached resources (YAML)
    #[arg(long, short = 'd')]
    pub deployment: PathBuf,
}

impl ConfigArgs {
    async fn gatekeeper(&self) -> anyhow::Result<Gatekeeper> {
        let config = GatekeeperConfig::load(self.config.as_deref())?;
        Deployment::load(&self.deployment)?.build(&config).await
    }
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// `authorization` header value; repeat for several
    #[arg(long, short = 'a')]
    pub authorization: Vec<String>,

    /// `cookie` header value; repeat for several
    #[arg(long)]
    pub cookie: Vec<String>,

    /// Target cluster. Defaults to the primary cluster.
    #[arg(long)]
    pub cluster: Option<String>,

    #[arg(long, short = 'n')]
    pub namespace: Option<String>,

    /// RPC method name the action and resource are derived from,
    /// e.g. `/workflow.WorkflowService/ListWorkflows`
    #[arg(long, conflicts_with_all = ["resource", "action"])]
    pub method: Option<String>,

    #[arg(long, required_unless_present = "method")]
    pub resource: Option<String>,

    #[arg(long, required_unless_present = "method")]
    pub action: Option<String>,
}

/// Outcome of one `check`.
#[derive(Debug, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub request: RequestDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DecisionError>,
}

#[derive(Debug, Serialize)]
pub struct DecisionError {
    pub code: &'static str,
    pub message: String,
}

impl Decision {
    fn new(
        request: RequestDescriptor,
        result: Result<AuthorizationContext, GatekeeperError>,
    ) -> Self {
        match result {
            Ok(ctx) => {
                let (profile, claims) = ctx.into_parts();
                Self {
                    allowed: true,
                    request,
                    subject: Some(claims.subject().to_owned()),
                    service_account: claims.service_account_name().map(str::to_owned),
                    host: Some(profile.rest_config().host().to_owned()),
                    error: None,
                }
            }
            Err(e) => {
                let code = match &e {
                    GatekeeperError::Unauthenticated(_) => "unauthenticated",
                    GatekeeperError::PermissionDenied(_) => "permission_denied",
                    GatekeeperError::Internal(_) => "internal",
                };
                Self {
                    allowed: false,
                    request,
                    subject: None,
                    service_account: None,
                    host: None,
                    error: Some(DecisionError {
                        code,
                        message: e.message().to_owned(),
                    }),
                }
            }
        }
    }
}

/// Authorize one call described by `args`.
///
/// # Errors
///
/// Returns an error only if the gatekeeper cannot be built. Refusals are
/// reported in the returned [`Decision`].
pub async fn check(args: &CheckArgs) -> anyhow::Result<Decision> {
    let gatekeeper = Arc::new(args.config.gatekeeper().await?);

    let metadata = CallMetadata {
        authorization: args.authorization.clone(),
        cookies: args.cookie.clone(),
    };
    let scope = RequestScope {
        cluster: args.cluster.clone(),
        namespace: args.namespace.clone(),
    };
    let descriptor;
    let input = if let Some(method) = &args.method {
        RequestInput::Call {
            method,
            request: &scope,
        }
    } else {
        descriptor = RequestDescriptor::new(
            args.cluster
                .clone()
                .unwrap_or_else(|| gatekeeper.clusters().primary_cluster().to_owned()),
            args.namespace.clone().unwrap_or_default(),
            args.resource.clone().context("--resource is required")?,
            args.action.clone().context("--action is required")?,
        );
        RequestInput::Descriptor(&descriptor)
    };

    let request = gatekeeper.describe(input);
    let client = GatekeeperLocalClient::new(Arc::clone(&gatekeeper));
    let result = client.authorize(&metadata, input).await;
    Ok(Decision::new(request, result))
}

#[derive(Args, Debug, Clone)]
pub struct DescribeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub modes: Vec<AuthMode>,
    pub primary_cluster: String,
    pub clusters: Vec<String>,
}

/// Summarize the gatekeeper the configuration builds.
///
/// # Errors
///
/// Returns an error if the gatekeeper cannot be built.
pub async fn describe(args: &DescribeArgs) -> anyhow::Result<Summary> {
    let gatekeeper = args.config.gatekeeper().await?;
    Ok(Summary {
        modes: gatekeeper.modes().iter().collect(),
        primary_cluster: gatekeeper.clusters().primary_cluster().to_owned(),
        clusters: gatekeeper.clusters().clusters().map(str::to_owned).collect(),
    })
}
