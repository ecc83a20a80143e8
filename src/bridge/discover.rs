use std::time::Duration;

use serde::Deserialize;

use hue::api::DiscoveryEndpoint;

use crate::error::ApiResult;

const DISCOVERY_URL: &str = "https://discovery.meethue.com/";
const PROBE_TIMEOUT_SECS: u64 = 3;

/// A candidate confirmed to be a Hue bridge by its device description.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BridgeCandidate {
    pub id: String,
    pub ip: String,
    pub name: String,
}

/// The subset of `description.xml` needed to identify a bridge.
#[derive(Debug, Deserialize)]
struct DeviceDescription {
    device: DeviceInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DeviceInfo {
    manufacturer: String,
    #[serde(rename = "modelName")]
    model_name: String,
    #[serde(rename = "friendlyName")]
    friendly_name: String,
}

impl DeviceInfo {
    /// The cloud endpoint occasionally lists stale or non-Hue devices, so a
    /// candidate only counts once its description carries Hue markers.
    fn is_hue_bridge(&self) -> bool {
        let manufacturer = self.manufacturer.to_ascii_lowercase();
        let model = self.model_name.to_ascii_lowercase();
        manufacturer.contains("philips")
            || manufacturer.contains("signify")
            || model.contains("hue bridge")
    }
}

/// Query the cloud discovery endpoint, then probe each candidate's device
/// description. Candidates that fail the probe, or turn out not to be Hue
/// bridges, are dropped silently; an empty result is not an error.
pub async fn discover() -> ApiResult<Vec<BridgeCandidate>> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
        .build()?;

    let endpoints: Vec<DiscoveryEndpoint> =
        http.get(DISCOVERY_URL).send().await?.json().await?;
    log::debug!("Cloud discovery returned {} candidate(s)", endpoints.len());

    let mut bridges = vec![];
    for endpoint in endpoints {
        match probe(&http, &endpoint.internal_ip_address).await {
            Ok(Some(device)) => {
                log::info!(
                    "Found bridge at {}: {}",
                    endpoint.internal_ip_address,
                    device.friendly_name
                );
                bridges.push(BridgeCandidate {
                    id: endpoint.id,
                    ip: endpoint.internal_ip_address,
                    name: device.friendly_name,
                });
            }
            Ok(None) => {
                log::debug!(
                    "Candidate {} is not a Hue bridge, skipping",
                    endpoint.internal_ip_address
                );
            }
            Err(err) => {
                log::debug!(
                    "Probe of candidate {} failed: {err}",
                    endpoint.internal_ip_address
                );
            }
        }
    }

    Ok(bridges)
}

async fn probe(http: &reqwest::Client, ip: &str) -> ApiResult<Option<DeviceInfo>> {
    let xml = http
        .get(format!("http://{ip}/description.xml"))
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let description: DeviceDescription = quick_xml::de::from_str(&xml)?;
    if description.device.is_hue_bridge() {
        Ok(Some(description.device))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRIDGE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <device>
    <deviceType>urn:schemas-upnp-org:device:Basic:1</deviceType>
    <friendlyName>Philips hue (192.168.1.20)</friendlyName>
    <manufacturer>Signify</manufacturer>
    <modelName>Philips hue bridge 2015</modelName>
    <modelNumber>BSB002</modelNumber>
  </device>
</root>"#;

    const OTHER_XML: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <device>
    <friendlyName>Sonos Play:1</friendlyName>
    <manufacturer>Sonos, Inc.</manufacturer>
    <modelName>Sonos Play:1</modelName>
  </device>
</root>"#;

    #[test]
    fn bridge_description_is_accepted() {
        let description: DeviceDescription = quick_xml::de::from_str(BRIDGE_XML).unwrap();
        assert!(description.device.is_hue_bridge());
        assert_eq!(description.device.friendly_name, "Philips hue (192.168.1.20)");
    }

    #[test]
    fn non_hue_device_is_rejected() {
        let description: DeviceDescription = quick_xml::de::from_str(OTHER_XML).unwrap();
        assert!(!description.device.is_hue_bridge());
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let description: DeviceDescription =
            quick_xml::de::from_str("<root><device><modelName>x</modelName></device></root>")
                .unwrap();
        assert!(!description.device.is_hue_bridge());
    }
}
