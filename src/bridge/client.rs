use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use hue::api::{GroupsReply, HueApiResult, LightStateUpdate, LightsReply};

use crate::config::BridgeConnection;
use crate::error::{ApiError, ApiResult};
use crate::model::{Group, Light};

/// The write-side surface of the bridge, split out so the preview engine can
/// run against an in-memory fake in tests.
#[async_trait]
pub trait BridgeCommands: Send + Sync {
    /// The bridge's native state payload for one light, verbatim.
    ///
    /// Used for exact restoration: percent-based round-tripping loses
    /// hue/sat/ct fidelity, so restore replays this payload instead.
    /// Fetch failures degrade to `None` (coarse restore path).
    async fn raw_state(&self, light_id: &str) -> Option<Value>;

    async fn set_light_state(&self, light_id: &str, upd: &LightStateUpdate) -> ApiResult<()>;

    async fn set_group_action(&self, group_id: &str, upd: &LightStateUpdate) -> ApiResult<()>;
}

/// Plain-HTTP client for one paired bridge.
pub struct BridgeClient {
    conn: BridgeConnection,
    http: reqwest::Client,
}

impl BridgeClient {
    const DEFAULT_TIMEOUT_SECS: u64 = 10;

    pub fn new(conn: BridgeConnection) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self { conn, http })
    }

    fn endpoint_url(&self, path: &str) -> String {
        format!(
            "http://{}/api/{}/{}",
            self.conn.ip, self.conn.username, path
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let response = self
            .http
            .get(self.endpoint_url(path))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// PUT a state/action body; the v1 api acknowledges with an array of
    /// per-field success/error entries.
    async fn put_json(&self, path: &str, body: &impl serde::Serialize) -> ApiResult<()> {
        let replies: Vec<HueApiResult<Value>> = self
            .http
            .put(self.endpoint_url(path))
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        for reply in replies {
            if let HueApiResult::Error(err) = reply {
                return Err(ApiError::from_wire(err));
            }
        }

        Ok(())
    }

    pub async fn fetch_lights(&self) -> ApiResult<Vec<Light>> {
        let replies: LightsReply = self.get_json("lights").await?;
        Ok(replies
            .into_iter()
            .map(|(id, reply)| Light::from_reply(id, &reply))
            .collect())
    }

    pub async fn fetch_groups(&self) -> ApiResult<Vec<Group>> {
        let replies: GroupsReply = self.get_json("groups").await?;
        Ok(replies
            .into_iter()
            .filter_map(|(id, reply)| Group::from_reply(id, &reply))
            .collect())
    }
}

#[async_trait]
impl BridgeCommands for BridgeClient {
    async fn raw_state(&self, light_id: &str) -> Option<Value> {
        let reply: Value = match self.get_json(&format!("lights/{light_id}")).await {
            Ok(reply) => reply,
            Err(err) => {
                log::warn!("Raw state fetch for light {light_id} failed: {err}");
                return None;
            }
        };

        let state = reply.get("state")?.clone();
        if state.is_object() { Some(state) } else { None }
    }

    async fn set_light_state(&self, light_id: &str, upd: &LightStateUpdate) -> ApiResult<()> {
        self.put_json(&format!("lights/{light_id}/state"), upd)
            .await
    }

    async fn set_group_action(&self, group_id: &str, upd: &LightStateUpdate) -> ApiResult<()> {
        self.put_json(&format!("groups/{group_id}/action"), upd)
            .await
    }
}
