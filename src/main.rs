use std::process::ExitCode;

use clap::{Parser, Subcommand};

use voice_verify::audio::list_input_devices;
use voice_verify::settings::{self, AppSettings};
use voice_verify::{
    FlowError, Microphone, Navigator, Page, SessionContext, StatusSink, StatusUpdate,
    UploadClient, VoiceFlow,
};

#[derive(Parser, Debug)]
#[command(name = "voice-verify", version, about = "Voice enrollment and verification client")]
struct Cli {
    /// Verification service root URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Seconds of audio to record
    #[arg(long, global = true)]
    seconds: Option<u64>,

    /// Input device name (see `devices`)
    #[arg(long, global = true)]
    device: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a sample and enroll it for ID
    Enroll { id: String },
    /// Record a sample and verify it against ID
    Verify { id: String },
    /// Check that the service is reachable
    Health,
    /// List audio input devices
    Devices,
    /// Print the effective settings
    Config {
        /// Write them to the settings file
        #[arg(long)]
        save: bool,
    },
}

/// Renders status lines on the terminal.
struct TerminalStatus;

impl StatusSink for TerminalStatus {
    fn set_status(&self, update: StatusUpdate) {
        if update.success {
            println!("[ok]   {}", update.message);
        } else {
            eprintln!("[fail] {}", update.message);
        }
    }
}

struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, page: Page) {
        match page {
            Page::Exam => println!("Verification complete, exam unlocked."),
            Page::Enrollment => println!("Verification required first."),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env file if present (for development convenience)
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let settings = resolve_settings(&cli);

    match run(cli.command, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn resolve_settings(cli: &Cli) -> AppSettings {
    let mut settings = settings::load_settings();
    settings.apply_env_overrides();

    if let Some(url) = &cli.base_url {
        settings.base_url = url.clone();
    }
    if let Some(secs) = cli.seconds {
        settings.record_secs = secs;
    }
    if cli.device.is_some() {
        settings.input_device = cli.device.clone();
    }
    settings
}

async fn run(command: Command, settings: AppSettings) -> Result<(), String> {
    if let Command::Config { save } = command {
        let json = serde_json::to_string_pretty(&settings).map_err(|e| e.to_string())?;
        println!("{}", json);
        if save {
            settings::save_settings(&settings)?;
            println!("Saved to {:?}", settings::settings_path()?);
        }
        return Ok(());
    }

    if let Command::Devices = command {
        let devices = list_input_devices().map_err(|e| e.to_string())?;
        if devices.is_empty() {
            println!("No input devices found");
        }
        for name in devices {
            println!("{}", name);
        }
        return Ok(());
    }

    let client = UploadClient::new(settings.base_url.clone(), settings.request_timeout())
        .map_err(|e| e.to_string())?;

    if let Command::Health = command {
        let message = client.health().await.map_err(|e| e.to_string())?;
        println!("{}: {}", client.base_url(), message);
        return Ok(());
    }

    let microphone = Microphone::default()
        .with_device(settings.input_device.clone())
        .with_queue_capacity(settings.chunk_queue_capacity);
    let flow = VoiceFlow::new(microphone, client, settings.flow_config());

    let outcome = match command {
        Command::Enroll { id } => flow.enroll(&id, &TerminalStatus).await,
        Command::Verify { id } => {
            let mut session = SessionContext::new();
            flow.verify(&id, &TerminalStatus, &mut session, &TerminalNavigator)
                .await
        }
        Command::Health | Command::Devices | Command::Config { .. } => return Ok(()),
    };

    outcome.map(|_| ()).map_err(|e| match e {
        // Already shown verbatim through the status sink
        FlowError::Rejected(message) => format!("rejected: {}", message),
        other => other.to_string(),
    })
}
