use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use usmkit_cli::{commands, SubtitleFormat};

#[derive(Parser)]
#[command(name = "usmkit")]
#[command(about = "usmkit - Inspect, remux and splice USM media containers", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump every chunk of a container as JSON
    Dump {
        /// Input .usm file
        #[arg(short, long)]
        input: String,

        /// Output JSON file (defaults to the input with a .json extension)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Extract subtitles, one file per language
    Subs {
        /// Input .usm file
        #[arg(short, long)]
        input: String,

        /// Subtitle format
        #[arg(short, long, value_enum, default_value = "srt")]
        format: SubtitleFormat,

        /// Output folder (defaults to the input's folder)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Replace the audio track of a container with another's
    ReplaceAudio {
        /// Main file, or folder of files
        #[arg(short, long)]
        input: String,

        /// File (or folder of files) to take the audio from
        #[arg(short, long)]
        donor: String,

        /// Output file or folder (defaults to <input>-new.usm or <input>/out)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Rewrite a container with sorted streams and a fresh seek table
    Remux {
        /// Input .usm file
        #[arg(short, long)]
        input: String,

        /// Output .usm file
        #[arg(short, long)]
        output: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    // Execute command
    match cli.command {
        Commands::Dump { input, output } => commands::dump::execute(&input, output.as_deref()),

        Commands::Subs {
            input,
            format,
            output,
        } => commands::subs::execute(&input, format, output.as_deref()),

        Commands::ReplaceAudio {
            input,
            donor,
            output,
        } => commands::replace_audio::execute(&input, &donor, output.as_deref()),

        Commands::Remux { input, output } => commands::remux::execute(&input, &output),
    }
}
