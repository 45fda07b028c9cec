use std::path::PathBuf;

/// Central error type for crtdeck.
#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    #[error("config error: {0}")]
    Config(String),

    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// No SS-550 on the bus. Recoverable: the device actor keeps polling.
    #[error("deck not found (VID 0200, PID 1000)")]
    DeviceNotFound,

    /// The interface is claimed by another process. Not recoverable until
    /// the user closes whatever holds it.
    #[error("deck is busy: interface claimed by another process")]
    DeviceBusy,

    /// A single transfer failed; the session stays open.
    #[error("USB transfer failed: {0}")]
    Transfer(rusb::Error),

    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    #[error("render error: {0}")]
    Render(String),

    #[error("font error: {0}")]
    Font(String),

    #[error("icon error: {path}: {source}")]
    Icon {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("image encode error: {0}")]
    ImageEncode(#[from] image::ImageError),

    #[error("invalid key combo '{combo}': unknown token '{token}'")]
    KeyCombo { combo: String, token: String },

    #[error("shell command failed: {command}: {message}")]
    Shell { command: String, message: String },

    #[error("text injection failed: {0}")]
    Inject(String),

    #[error("{service} authentication rejected: {message}")]
    IntegrationAuth {
        service: &'static str,
        message: String,
    },

    #[error("{service} unreachable: {message}")]
    IntegrationNetwork {
        service: &'static str,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeckError {
    /// True when the device-side failure means the handle is gone,
    /// rather than a single lost transfer.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotFound
                | Self::Usb(rusb::Error::NoDevice)
                | Self::Usb(rusb::Error::Io)
                | Self::Usb(rusb::Error::Pipe)
        )
    }
}

pub type Result<T> = std::result::Result<T, DeckError>;
