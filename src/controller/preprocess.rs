//! Derived fields of the desired state
//!
//! Fills the parts of [`DesiredState`] that depend on the cluster or on
//! other fields: the address collectors send to, the forward-proxy settings
//! read from a secret, the hash that rolls the proxy when those settings
//! change, and the sanitized proxy args.

use sha2::{Digest, Sha256};

use super::cluster::ClusterQuery;
use crate::desired_state::{DesiredState, HttpProxyConfig, PROXY_NAME};
use crate::error::{Error, Result};

pub const HTTP_URL_KEY: &str = "http-url";
pub const USERNAME_KEY: &str = "basic-auth-username";
pub const PASSWORD_KEY: &str = "basic-auth-password";
pub const CA_BUNDLE_KEY: &str = "tls-root-ca-bundle";

/// Fill every derived field of `state`
pub async fn preprocess(query: &dyn ClusterQuery, mut state: DesiredState) -> Result<DesiredState> {
    if state.proxy.enable {
        state.proxy_address = proxy_address(&state.namespace, state.proxy.metric_port);
    }

    state.proxy.args = sanitize_args(&state.proxy.args);

    state.proxy.http_proxy = match &state.proxy.http_proxy_secret {
        Some(secret) => Some(http_proxy_from_secret(query, &state.namespace, secret).await?),
        None => None,
    };
    state.proxy.config_hash = config_hash(state.proxy.http_proxy.as_ref())?;

    Ok(state)
}

/// In-cluster address of the proxy service
pub fn proxy_address(namespace: &str, port: u16) -> String {
    format!("{PROXY_NAME}.{namespace}.svc.cluster.local:{port}")
}

/// Replace line breaks with spaces and trim
pub fn sanitize_args(args: &str) -> String {
    args.replace(['\r', '\n'], " ").trim().to_string()
}

async fn http_proxy_from_secret(
    query: &dyn ClusterQuery,
    namespace: &str,
    secret: &str,
) -> Result<HttpProxyConfig> {
    let data = query
        .get_secret(namespace, secret)
        .await?
        .ok_or_else(|| Error::SecretError(format!("secret {namespace}/{secret} not found")))?;

    let raw_url = data
        .get(HTTP_URL_KEY)
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| {
            Error::SecretError(format!("secret {namespace}/{secret} has no {HTTP_URL_KEY}"))
        })?;

    let url = reqwest::Url::parse(raw_url).map_err(|e| {
        Error::SecretError(format!("invalid {HTTP_URL_KEY} in secret {secret}: {e}"))
    })?;
    let host = url
        .host_str()
        .ok_or_else(|| {
            Error::SecretError(format!("{HTTP_URL_KEY} in secret {secret} has no host"))
        })?
        .to_string();
    let port = url.port_or_known_default().ok_or_else(|| {
        Error::SecretError(format!("{HTTP_URL_KEY} in secret {secret} has no port"))
    })?;

    let optional = |key: &str| data.get(key).filter(|v| !v.is_empty()).cloned();

    Ok(HttpProxyConfig {
        host,
        port,
        username: optional(USERNAME_KEY),
        password: optional(PASSWORD_KEY),
        ca_bundle: optional(CA_BUNDLE_KEY),
    })
}

/// SHA-256 hex digest of the forward-proxy settings; empty when unset
pub fn config_hash(http_proxy: Option<&HttpProxyConfig>) -> Result<String> {
    match http_proxy {
        Some(config) => {
            let bytes = serde_json::to_vec(config)?;
            Ok(hex::encode(Sha256::digest(&bytes)))
        }
        None => Ok(String::new()),
    }
}
