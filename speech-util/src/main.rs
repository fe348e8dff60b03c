use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use log::info;

use speech_util::{phones, score, transcript};

#[derive(Parser, Debug)]
#[command(version, about = "Phone-level scoring for speech recognition outputs")]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score hypothesis transcriptions against references (phone error rate)
    Score(ScoreArgs),
}

#[derive(Args, Debug)]
struct ScoreArgs {
    /// Reference transcription file, one `uttid phone ...` line per utterance
    #[arg(long)]
    refs: String,

    /// Hypothesis transcription file in the same format
    #[arg(long)]
    hyps: String,

    /// Optional two-column phone mapping applied to both sides
    /// (e.g. the TIMIT 48->39 folding)
    #[arg(long)]
    phone_map: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match &cli.commands {
        Commands::Score(args) => run_score(args),
    }
}

fn run_score(args: &ScoreArgs) -> Result<()> {
    let mut refs = transcript::read_transcriptions(&args.refs)?;
    let mut hyps = transcript::read_transcriptions(&args.hyps)?;

    if let Some(map_file) = &args.phone_map {
        let map = phones::read_phone_map(map_file)?;
        for phones_seq in refs.values_mut() {
            *phones_seq = phones::map_phones(phones_seq, &map);
        }
        for phones_seq in hyps.values_mut() {
            *phones_seq = phones::map_phones(phones_seq, &map);
        }
    }

    info!("scoring {} utterances", refs.len());
    let rate = score::error_rate(&refs, &hyps)?;
    println!("phone error rate: {:.2}%", 100. * rate);
    Ok(())
}
