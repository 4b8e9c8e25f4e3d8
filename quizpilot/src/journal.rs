use {
    crate::desktop::Desktop,
    anyhow::Context as _,
    chrono::Local,
    fs_err::create_dir_all,
    image::RgbaImage,
    std::path::PathBuf,
    strum::{AsRefStr, EnumIter, IntoEnumIterator},
    tracing::{info, warn},
};

const TRANSIENT_QUESTION_FILE: &str = "temp_question.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ShotCategory {
    Questions,
    AssistantInput,
    AssistantResponse,
    Answers,
    ScreenShift,
    Errors,
}

/// Debug screenshots sorted into one directory per category.
///
/// Saving is best effort: failures are logged and never abort a cycle.
pub struct ScreenshotJournal {
    root: PathBuf,
    enabled: bool,
}

impl ScreenshotJournal {
    pub fn new(root: impl Into<PathBuf>, enabled: bool) -> anyhow::Result<Self> {
        let root = root.into();
        if enabled {
            for category in ShotCategory::iter() {
                create_dir_all(root.join(category.as_ref()))?;
            }
        }
        Ok(Self { root, enabled })
    }

    /// Writes the question image that the send step loads back.
    ///
    /// Written even when screenshots are disabled.
    pub fn store_transient(&self, image: &RgbaImage) -> anyhow::Result<PathBuf> {
        create_dir_all(&self.root)?;
        let path = self.root.join(TRANSIENT_QUESTION_FILE);
        image
            .save(&path)
            .with_context(|| format!("failed to save image {:?}", path))?;
        info!("question screenshot saved to {:?}", path);
        Ok(path)
    }

    pub fn save(&self, category: ShotCategory, name: &str, image: &RgbaImage) {
        if !self.enabled {
            return;
        }
        let path = self.root.join(category.as_ref()).join(format!(
            "{}_{}.png",
            Local::now().format("%Y%m%d_%H%M%S"),
            name
        ));
        match image.save(&path) {
            Ok(()) => info!("screenshot saved: {:?}", path),
            Err(err) => warn!("failed to save screenshot {:?}: {:?}", path, err),
        }
    }

    /// Captures the whole screen and saves it.
    pub fn capture(&self, desktop: &mut dyn Desktop, category: ShotCategory, name: &str) {
        if !self.enabled {
            return;
        }
        match desktop.capture_screen() {
            Ok(image) => self.save(category, name, &image),
            Err(err) => warn!("failed to capture screenshot {:?}: {:?}", name, err),
        }
    }
}

#[test]
fn saves_into_category_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let journal = ScreenshotJournal::new(dir.path(), true).unwrap();
    journal.save(ShotCategory::ScreenShift, "before_shift_q1", &RgbaImage::new(4, 4));

    let files: Vec<_> = fs_err::read_dir(dir.path().join("screen_shift"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("_before_shift_q1.png"));
    assert!(dir.path().join("assistant_input").is_dir());
}

#[test]
fn disabled_journal_still_stores_transient_question() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("shots");
    let journal = ScreenshotJournal::new(&root, false).unwrap();
    journal.save(ShotCategory::Answers, "selected_A_q1", &RgbaImage::new(4, 4));
    assert!(!root.exists());

    let path = journal.store_transient(&RgbaImage::new(4, 4)).unwrap();
    assert_eq!(path, root.join("temp_question.png"));
    assert!(path.is_file());
}
