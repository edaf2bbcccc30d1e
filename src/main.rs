use std::cell::RefCell;
use std::process::ExitCode;
use std::rc::Rc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use interview_kiosk::voice::Microphone;
use interview_kiosk::{
    AnalyticsView, CameraCapture, Config, InitialContext, Recognizer, SessionController,
    SessionOutcome, Speaker, SubmitClient, VoiceInput, VoiceOutput,
};

/// Kiosk - voice-driven interview session client
#[derive(Parser)]
#[command(name = "kiosk", version, about)]
struct Cli {
    /// Interview server base URL
    #[arg(long, env = "KIOSK_SERVER_URL")]
    server: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable voice features (type-only session)
    #[arg(long, env = "KIOSK_DISABLE_VOICE")]
    disable_voice: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an interview session
    Run {
        /// First question text (from the server-rendered page context)
        #[arg(long)]
        question: String,

        /// Progress label, e.g. "Question 1 of 10"
        #[arg(long)]
        progress: String,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Speak a line through the TTS output
    TestSpeak {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the speech output.")]
        text: String,
    },
    /// Fetch and print the analytics charts
    Analytics,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,interview_kiosk=info",
        1 => "info,interview_kiosk=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env();
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    if cli.disable_voice {
        config.voice.enabled = false;
    }

    match cli.command {
        Command::Run { question, progress } => run_session(config, question, progress).await,
        Command::TestMic { duration } => test_mic(duration).await,
        Command::TestSpeak { text } => test_speak(&config, &text).await,
        Command::Analytics => show_analytics(&config).await,
    }
}

/// Voice input shared between the controller (which starts listening
/// sessions) and the drive loop (which polls for audio)
#[derive(Clone)]
struct SharedVoiceInput(Rc<RefCell<VoiceInput>>);

impl Recognizer for SharedVoiceInput {
    fn start(&mut self) -> interview_kiosk::Result<u64> {
        self.0.borrow_mut().start()
    }
}

#[allow(clippy::future_not_send, clippy::too_many_lines)]
async fn run_session(config: Config, question: String, progress: String) -> anyhow::Result<()> {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();

    let speaker = VoiceOutput::new(&config.voice);
    let input = SharedVoiceInput(Rc::new(RefCell::new(VoiceInput::new(
        &config.voice,
        config.timing.no_speech_timeout,
        events_tx,
    ))));
    // The CLI build has no platform video feed wired in, so the camera
    // reports unavailable and answers are submitted without imagery.
    let camera = CameraCapture::new();
    let api = SubmitClient::new(&config.server_url);

    let mut controller = SessionController::new(
        InitialContext { question, progress },
        Box::new(speaker),
        Box::new(input.clone()),
        Box::new(camera),
        Box::new(api),
        &config,
    )?;

    controller.start().await;
    print_notices(&mut controller);
    println!("{}", controller.progress_label());
    println!("Q: {}", controller.session().current_question());
    println!("(type your answer, then :submit — or :mic to listen again, :quit to leave)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tick = tokio::time::interval(Duration::from_millis(100));

    loop {
        tokio::select! {
            _ = tick.tick() => {
                input.0.borrow_mut().process().await;
            }
            Some(update) = events_rx.recv() => {
                controller.handle_recognition(update);
                print_notices(&mut controller);
                if !controller.answer().is_empty() {
                    println!("A: {}", controller.answer());
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    ":quit" => break,
                    ":mic" => {
                        controller.retrigger_listening();
                        print_notices(&mut controller);
                    }
                    ":submit" => {
                        let before = controller.session().current_index();
                        let outcome = controller.submit_answer().await;
                        print_notices(&mut controller);

                        if let SessionOutcome::Complete { destination } = outcome {
                            println!("Interview complete. See results at {destination}");
                            break;
                        }
                        if controller.session().current_index() > before {
                            println!("{}", controller.progress_label());
                            println!("Q: {}", controller.session().current_question());
                        }
                    }
                    text => controller.set_answer(text),
                }
            }
        }
    }

    input.0.borrow_mut().stop();
    Ok(())
}

fn print_notices(controller: &mut SessionController) {
    for notice in controller.drain_notices() {
        println!("[!] {}", notice.message);
    }
}

async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Recording for {duration} seconds...");

    let mut mic = Microphone::new()?;
    mic.start()?;
    tokio::time::sleep(Duration::from_secs(duration)).await;
    let samples = mic.take_samples();
    mic.stop();

    let peak = samples.iter().fold(0.0f32, |max, s| max.max(s.abs()));
    println!("Captured {} samples, peak amplitude {peak:.3}", samples.len());

    if peak < 0.01 {
        println!("Warning: very low signal - check microphone permissions");
    }

    Ok(())
}

async fn test_speak(config: &Config, text: &str) -> anyhow::Result<()> {
    let output = VoiceOutput::new(&config.voice);
    if !output.is_available() {
        anyhow::bail!("speech output unavailable (is KIOSK_SPEECH_API_KEY set?)");
    }

    output.speak(text);
    // speak() is fire-and-forget; give playback time to finish
    tokio::time::sleep(Duration::from_secs(10)).await;
    Ok(())
}

async fn show_analytics(config: &Config) -> anyhow::Result<()> {
    let client = SubmitClient::new(&config.server_url);
    let view = AnalyticsView::load(&client).await?;

    println!("{}", view.sentiment.title);
    for slice in &view.sentiment.slices {
        println!("  {} {}: {}", slice.color, slice.label, slice.value);
    }

    println!("{}", view.emotion.title);
    for bar in &view.emotion.bars {
        println!("  {}: {}", bar.label, bar.value);
    }

    Ok(())
}
