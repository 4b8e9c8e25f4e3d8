use {
    anyhow::Context as _,
    image::{ImageReader, RgbaImage},
    std::path::Path,
    strum::{Display, EnumIter},
    tracing::{info, warn},
};

/// Visual states of the assistant's send button that have a stored reference capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ButtonState {
    /// Upload finished, the message can be sent.
    Ready,
    /// The message was sent and the assistant is answering.
    Sent,
}

impl ButtonState {
    pub fn file_name(self) -> String {
        format!("send_button_{}.png", self)
    }
}

/// Reference captures of the send button, loaded once per run.
///
/// A missing image is not an error: detection falls back to change-based
/// heuristics for that state.
#[derive(Debug, Default)]
pub struct ReferenceImages {
    pub ready: Option<RgbaImage>,
    pub sent: Option<RgbaImage>,
}

impl ReferenceImages {
    pub fn load(dir: &Path) -> Self {
        let load = |state: ButtonState| {
            let path = dir.join(state.file_name());
            match load_image(&path) {
                Ok(image) => {
                    info!("loaded {} reference image {:?}", state, path);
                    Some(image)
                }
                Err(err) => {
                    warn!("no {} reference image, using fallback detection: {:?}", state, err);
                    None
                }
            }
        };
        Self {
            ready: load(ButtonState::Ready),
            sent: load(ButtonState::Sent),
        }
    }
}

pub fn load_image(path: &Path) -> anyhow::Result<RgbaImage> {
    let reader =
        ImageReader::open(path).with_context(|| format!("failed to open image {:?}", path))?;
    let image = reader
        .decode()
        .with_context(|| format!("failed to decode image {:?}", path))?;
    Ok(image.into_rgba8())
}

#[test]
fn missing_references_fall_back() {
    let dir = tempfile::tempdir().unwrap();
    let sent = RgbaImage::from_pixel(60, 60, image::Rgba([20, 90, 200, 255]));
    sent.save(dir.path().join(ButtonState::Sent.file_name()))
        .unwrap();

    let references = ReferenceImages::load(dir.path());
    assert!(references.ready.is_none());
    assert_eq!(references.sent.as_ref(), Some(&sent));
}
