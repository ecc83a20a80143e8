use thiserror::Error;

use hue::api::ApiErrorDetail;

#[derive(Error, Debug)]
pub enum ApiError {
    /// No bridge ip/username configured; operations requiring a connection
    /// abort before any network activity.
    #[error("Bridge connection not configured (run `pauselight pair` first)")]
    NotConfigured,

    /// Preview invoked with an empty light and group selection.
    #[error("No lights or groups selected")]
    NoTargets,

    /// The bridge replied, but the payload carries an api-level error.
    #[error("Bridge api error {typ}: {description}")]
    Protocol { typ: u32, description: String },

    #[error("Bridge reply was empty")]
    EmptyReply,

    /// Pairing gave up: hard rejection or retry budget exhausted.
    #[error("Pairing failed (was the link button pressed?)")]
    PairingFailed,

    #[error("Invalid color {0:?} (expected hex RRGGBB or AARRGGBB)")]
    InvalidColor(String),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    SerdeYml(#[from] serde_yml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Xml(#[from] quick_xml::DeError),

    #[error(transparent)]
    SetLogger(#[from] log::SetLoggerError),

    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    #[must_use]
    pub fn from_wire(err: ApiErrorDetail) -> Self {
        Self::Protocol {
            typ: err.typ,
            description: err.description,
        }
    }

    #[must_use]
    pub const fn is_link_button_not_pressed(&self) -> bool {
        matches!(
            self,
            Self::Protocol {
                typ: hue::ERR_LINK_BUTTON_NOT_PRESSED,
                ..
            }
        )
    }
}
