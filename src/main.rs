use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use midi2events::formatter::{self, EventFormatter, TextFormatter};
use midi2events::{
    DuplicateNotePolicy, EventLog, MidiParser, MidiSource, ParsedEvent, ParserConfig,
};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[arg(short, long)]
    midi_file: String,

    #[arg(long, help = "Tempo in BPM until the file sets one")]
    tempo: Option<f64>,

    #[arg(long, help = "Close a sounding note when its note number is struck again")]
    retrigger: bool,

    #[arg(long, help = "Also print messages the parser does not interpret")]
    show_unhandled: bool,

    #[arg(short, long, help = "Only parse the track with this index")]
    track: Option<usize>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    info!("MIDI FILE: {}", args.midi_file);

    let mut source = MidiSource::load(&args.midi_file).context("load midi file")?;
    if let Some(index) = args.track {
        let count = source.tracks.len();
        let track = source
            .tracks
            .get(index)
            .cloned()
            .with_context(|| format!("track {} not found ({} tracks)", index, count))?;
        source.tracks = vec![track];
    }

    let mut config = ParserConfig::default();
    if let Some(tempo) = args.tempo {
        config.default_tempo_bpm = tempo;
    }
    if args.retrigger {
        config.duplicate_note_policy = DuplicateNotePolicy::Retrigger;
    }

    let mut parser = MidiParser::with_config(config).context("parser configuration")?;
    let log = EventLog::new();
    parser.add_listener(Box::new(log.clone()));
    parser.parse(&source).context("parse midi file")?;

    let mut events = log.take();
    let tempo_map = formatter::tempo_map(&events, source.resolution, config.default_tempo_bpm);
    formatter::place_rests(&mut events, &tempo_map);
    let formatter = TextFormatter::new(tempo_map);

    let (mut notes, mut rests, mut unhandled) = (0, 0, 0);
    for timed in &events {
        match timed.event {
            ParsedEvent::Note(_) => notes += 1,
            ParsedEvent::Rest(_) => rests += 1,
            ParsedEvent::Unhandled(_) => {
                unhandled += 1;
                if !args.show_unhandled {
                    continue;
                }
            }
            _ => (),
        }
        println!("{}", formatter.format(timed));
    }

    info!(
        "{} notes, {} rests, {} handled messages, {} unhandled",
        notes,
        rests,
        log.handled_count(),
        unhandled
    );

    Ok(())
}
