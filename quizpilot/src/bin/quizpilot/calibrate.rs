use {
    anyhow::bail,
    quizpilot::{
        config::{AssistantConfig, LayoutVariants},
        hotkey::KeyEvents,
        AnswerLetter, Config, ScreenPoint, ScreenRegion,
    },
    rdev::Key,
    std::{collections::BTreeMap, path::Path},
    strum::IntoEnumIterator,
    tracing::info,
};

struct Calibrator {
    context: uidrive::Context,
    keys: KeyEvents,
}

impl Calibrator {
    /// Shows `instruction`, waits for SPACE and returns the pointer position.
    fn point(&self, instruction: &str) -> anyhow::Result<ScreenPoint> {
        println!("\n{instruction}");
        println!("(press SPACE to record, ESC to abort)");
        if self.keys.wait_for_any(&[Key::Space, Key::Escape])? == Key::Escape {
            bail!("calibration aborted");
        }
        let (x, y) = self.context.cursor_position()?;
        println!("  recorded ({x}, {y})");
        Ok(ScreenPoint::new(x, y))
    }

    fn region(&self, name: &str) -> anyhow::Result<ScreenRegion> {
        let top_left = self.point(&format!("Move the mouse to the TOP-LEFT corner of the {name}"))?;
        let bottom_right =
            self.point(&format!("Move the mouse to the BOTTOM-RIGHT corner of the {name}"))?;
        let region = ScreenRegion::from_corners(top_left, bottom_right);
        if region.is_empty() {
            bail!("the {} has zero size: {}", name, region);
        }
        Ok(region)
    }

    fn answer_options(&self, label: &str) -> anyhow::Result<BTreeMap<AnswerLetter, ScreenPoint>> {
        AnswerLetter::iter()
            .map(|letter| {
                let point = self.point(&format!("[{label}] Move the mouse to answer option {letter}"))?;
                Ok((letter, point))
            })
            .collect()
    }
}

/// Records every coordinate of the quiz and assistant layout and writes the
/// resulting config. Settings other than coordinates keep their defaults, or
/// the values from `output` if it already exists.
pub fn run(output: &Path) -> anyhow::Result<()> {
    let base = if output.try_exists()? {
        info!("updating coordinates in {:?}", output);
        Config::load(output)?
    } else {
        Config::default()
    };
    let calibrator = Calibrator {
        context: uidrive::Context::new()?,
        keys: KeyEvents::listen(),
    };

    println!("{}", "=".repeat(60));
    println!("Calibration: open the quiz on one half of the screen and the assistant on the other.");
    println!("{}", "=".repeat(60));

    let question_area = calibrator.region("question area")?;
    let first_options = calibrator.answer_options("QUESTION 1")?;
    let first_next = calibrator.point("[QUESTION 1] Move the mouse to the NEXT button")?;
    println!("\nNow move on to question 2 so that the layout shifts.");
    let shifted_options = calibrator.answer_options("QUESTION 2+")?;
    let shifted_next = calibrator.point("[QUESTION 2+] Move the mouse to the NEXT button")?;
    let input_field = calibrator.point("Move the mouse to the assistant's input field")?;
    let send_button = calibrator.point("Move the mouse to the assistant's send button")?;
    let response_area = calibrator.region("assistant's response area")?;

    let config = Config {
        question_area,
        answer_options: LayoutVariants {
            first: first_options,
            shifted: shifted_options,
        },
        next_button: LayoutVariants {
            first: first_next,
            shifted: shifted_next,
        },
        assistant: AssistantConfig {
            input_field,
            send_button,
            response_area,
            ..base.assistant
        },
        ..base
    };
    config.validate()?;
    config.save(output)?;
    println!("\nConfiguration saved to {:?}", output);
    println!("Next: run `quizpilot capture-refs` to record the send button states.");
    Ok(())
}
