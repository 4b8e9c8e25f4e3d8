mod calibrate;

use {
    anyhow::{bail, Context as _},
    clap::Parser,
    quizpilot::{
        config::DEFAULT_CONFIG_PATH,
        hotkey::{parse_key, KeyEvents},
        logging,
        reference::{ButtonState, ReferenceImages},
        run_automation, CancellationToken, Config, QuestionCycleController, RunOutcome,
    },
    std::{
        io::{self, BufRead, Write},
        path::{Path, PathBuf},
        process,
        thread::sleep,
        time::Duration,
    },
    strum::IntoEnumIterator,
    tracing::info,
};

const START_COUNTDOWN: Duration = Duration::from_secs(3);

const ASSISTANT_INSTRUCTIONS: &str = "\
You are helping with a multiple-choice quiz. When given a screenshot of a
question with multiple choice options, analyze the image and respond with
ONLY the letter of the correct answer (A, B, C, or D).

IMPORTANT RULES:
1. Respond with ONLY a single letter: A, B, C, or D
2. Do NOT provide explanations or analysis
3. Do NOT append to previous answers
4. Each response should be ONLY the current answer, nothing else
5. Forget all previous questions - only answer the current one

Example:
[Image shows: What is 2+2? A) 3 B) 4 C) 5 D) 6]
Your response: B";

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
enum Args {
    /// Answer quiz questions until the budget is used up or the stop key is pressed.
    Run {
        #[clap(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
        /// Number of questions to answer. Asked interactively if omitted.
        #[clap(long)]
        questions: Option<u32>,
        /// Skip the interactive questions and start waiting for the start key.
        #[clap(long)]
        yes: bool,
    },
    /// Capture reference images of the assistant's send button.
    CaptureRefs {
        #[clap(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Record screen coordinates interactively and write a config file.
    Calibrate {
        #[clap(long, default_value = DEFAULT_CONFIG_PATH)]
        output: PathBuf,
    },
    /// Print the pointer position until Escape is pressed.
    Track,
    /// Write the default config file.
    InitConfig {
        #[clap(long, default_value = DEFAULT_CONFIG_PATH)]
        output: PathBuf,
        /// Overwrite an existing file.
        #[clap(long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    match Args::parse() {
        Args::Run {
            config,
            questions,
            yes,
        } => {
            let config = Config::load(&config)?;
            logging::init(config.log_file.as_deref())?;
            let code = run(config, questions, yes)?;
            process::exit(code);
        }
        Args::CaptureRefs { config } => {
            logging::init(None)?;
            capture_refs(&Config::load(&config)?)
        }
        Args::Calibrate { output } => {
            logging::init(None)?;
            calibrate::run(&output)
        }
        Args::Track => {
            logging::init(None)?;
            track()
        }
        Args::InitConfig { output, force } => {
            logging::init(None)?;
            if output.try_exists()? && !force {
                bail!("{:?} already exists, pass --force to overwrite it", output);
            }
            Config::default().save(&output)?;
            info!("default config written to {:?}", output);
            Ok(())
        }
    }
}

fn prompt_line(prompt: &str) -> anyhow::Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Returns the process exit code.
fn run(config: Config, questions: Option<u32>, yes: bool) -> anyhow::Result<i32> {
    let start_key = parse_key(&config.hotkeys.start).context("invalid start hotkey")?;
    let stop_key = parse_key(&config.hotkeys.stop).context("invalid stop hotkey")?;

    println!("{}", "=".repeat(70));
    println!("Assistant system instructions:\n");
    println!("{ASSISTANT_INSTRUCTIONS}");
    println!("{}", "-".repeat(70));
    println!("Press {} to start, {} to stop at any time.", config.hotkeys.start, config.hotkeys.stop);
    println!();

    let budget = if yes {
        questions
    } else {
        let answer = prompt_line("Have you set up the assistant with the instructions above? (y/n): ")?;
        if !answer.eq_ignore_ascii_case("y") {
            println!("Set up the assistant first, then run again.");
            return Ok(0);
        }
        match questions {
            Some(n) => Some(n),
            None => {
                let answer = prompt_line("How many questions to process? (Enter for unlimited): ")?;
                if answer.is_empty() {
                    None
                } else {
                    match answer.parse() {
                        Ok(n) => Some(n),
                        Err(_) => {
                            println!("Invalid number, defaulting to unlimited");
                            None
                        }
                    }
                }
            }
        }
    };

    let keys = KeyEvents::listen();
    println!("Press {} when ready to start...", config.hotkeys.start);
    keys.wait_for(start_key)?;
    println!("Starting in {} seconds, position your windows now!", START_COUNTDOWN.as_secs());
    sleep(START_COUNTDOWN);

    let token = CancellationToken::new();
    let _stop_listener = keys.cancel_on(stop_key, token.clone());
    {
        let token = token.clone();
        ctrlc::set_handler(move || token.cancel()).context("failed to set Ctrl-C handler")?;
    }

    let references = ReferenceImages::load(&config.reference_dir);
    let desktop = uidrive::Context::new()?;
    let screenshots_dir = config.screenshots.enabled.then(|| config.screenshots.dir.clone());
    let log_file = config.log_file.clone();
    let mut controller = QuestionCycleController::new(desktop, config, references, token)?;
    let summary = run_automation(&mut controller, budget);

    println!("{}", "=".repeat(70));
    println!("Automation {}: {} questions processed", summary.outcome, summary.completed);
    if let Some(path) = log_file {
        println!("Detailed log: {:?}", path);
    }
    if let Some(dir) = screenshots_dir {
        println!("Screenshots saved in {:?}", dir);
    }
    Ok(match summary.outcome {
        RunOutcome::Completed => 0,
        RunOutcome::Interrupted => 130,
        RunOutcome::Failed => 1,
    })
}

fn capture_refs(config: &Config) -> anyhow::Result<()> {
    let context = uidrive::Context::new()?;
    let keys = KeyEvents::listen();
    let region = config.assistant.send_button_region();
    fs_err::create_dir_all(&config.reference_dir)?;

    for state in ButtonState::iter() {
        println!("{}", "=".repeat(60));
        println!("Capturing send button state: {}", state);
        println!("Region: {}", region);
        println!("Bring the send button into the '{}' state and press SPACE...", state);
        keys.wait_for(rdev::Key::Space)?;

        let image = context.capture_region(region.x, region.y, region.width, region.height)?;
        let path = config.reference_dir.join(state.file_name());
        save_png(&image, &path)?;
        println!("Saved {:?} ({}x{})", path, image.width(), image.height());
    }
    println!("Reference images are ready; the run will use them for send button detection.");
    Ok(())
}

fn save_png(image: &image::RgbaImage, path: &Path) -> anyhow::Result<()> {
    image
        .save(path)
        .with_context(|| format!("failed to save image {:?}", path))
}

fn track() -> anyhow::Result<()> {
    let context = uidrive::Context::new()?;
    let keys = KeyEvents::listen();
    println!("Move the mouse to read coordinates, press ESC to quit.");
    loop {
        let (x, y) = context.cursor_position()?;
        print!("\rX: {x:5}  Y: {y:5}");
        io::stdout().flush()?;
        if keys.pressed_within(rdev::Key::Escape, Duration::from_millis(100))? {
            println!();
            return Ok(());
        }
    }
}
