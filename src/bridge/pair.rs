use std::future::Future;
use std::time::Duration;

use hue::api::{HueApiResult, NewUser, NewUserReply};

use crate::error::{ApiError, ApiResult};

/// Device type announced during registration; the bridge shows this in its
/// whitelist.
const DEVICE_TYPE: &str = "pauselight#companion";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PairOutcome {
    Paired(String),
    /// The bridge wants its physical button pressed; worth retrying.
    LinkButtonNotPressed,
    Failed,
}

/// One registration attempt against `POST /api`.
pub async fn pair_once(http: &reqwest::Client, ip: &str) -> ApiResult<PairOutcome> {
    let body = NewUser {
        devicetype: DEVICE_TYPE.to_string(),
    };

    let replies: Vec<HueApiResult<NewUserReply>> = http
        .post(format!("http://{ip}/api"))
        .json(&body)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    match replies.into_iter().next() {
        Some(HueApiResult::Success(reply)) => Ok(PairOutcome::Paired(reply.username)),
        Some(HueApiResult::Error(err)) => {
            let err = ApiError::from_wire(err);
            if err.is_link_button_not_pressed() {
                Ok(PairOutcome::LinkButtonNotPressed)
            } else {
                log::warn!("Pairing rejected: {err}");
                Ok(PairOutcome::Failed)
            }
        }
        None => Err(ApiError::EmptyReply),
    }
}

/// Drive pairing attempts on a fixed interval until one succeeds or the
/// attempt budget runs out.
///
/// Pairing is a one-time ritual where the user walks to the bridge and
/// presses the button, so the delay is flat rather than backing off.
/// Exhausting the budget yields `Failed`, distinguishable from the
/// still-retrying `LinkButtonNotPressed` state a UI may surface meanwhile.
pub async fn pair_with_retry<F, Fut>(
    mut attempt: F,
    attempts: u32,
    delay: Duration,
) -> PairOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<PairOutcome>>,
{
    for n in 1..=attempts {
        match attempt().await {
            Ok(PairOutcome::Paired(username)) => return PairOutcome::Paired(username),
            Ok(PairOutcome::Failed) => return PairOutcome::Failed,
            Ok(PairOutcome::LinkButtonNotPressed) => {
                log::info!("Link button not pressed (attempt {n}/{attempts})");
            }
            Err(err) => {
                log::warn!("Pairing attempt {n}/{attempts} failed: {err}");
            }
        }

        if n < attempts {
            tokio::time::sleep(delay).await;
        }
    }

    PairOutcome::Failed
}
