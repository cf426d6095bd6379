use url::Url;

use crate::config::HubSettings;
use crate::utils::ClientError;

pub const DEVICE_ID_ENV: &str = "IOTEDGE_DEVICEID";
pub const MODULE_ID_ENV: &str = "IOTEDGE_MODULEID";
pub const GATEWAY_HOST_ENV: &str = "IOTEDGE_GATEWAYHOSTNAME";

/// Identity of this module as published by the edge runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleIdentity {
    pub device_id: String,
    pub module_id: String,
    pub gateway_host: String,
}

impl ModuleIdentity {
    pub fn from_env() -> Result<Self, ClientError> {
        Ok(Self {
            device_id: required(DEVICE_ID_ENV)?,
            module_id: required(MODULE_ID_ENV)?,
            gateway_host: required(GATEWAY_HOST_ENV)?,
        })
    }

    /// The configured hub url, or the module endpoint on the gateway.
    pub fn hub_url(&self, settings: &HubSettings) -> Result<Url, ClientError> {
        let raw = match &settings.url {
            Some(url) => url.clone(),
            None => format!(
                "ws://{}:{}/modules/{}/{}",
                self.gateway_host, settings.port, self.device_id, self.module_id
            ),
        };
        Ok(Url::parse(&raw)?)
    }
}

fn required(name: &'static str) -> Result<String, ClientError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ClientError::Environment(name)),
    }
}
