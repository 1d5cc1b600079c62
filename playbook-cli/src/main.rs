//! Playbook CLI Tool
//!
//! Command-line interface for authoring, inspecting and playing back saved
//! play files.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use playbook_core::{
    capture, EntityPosition, Frame, FrameSink, InterpolationMode, Positions, SavedPlay, Session,
    SessionConfig,
};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "playbook")]
#[command(about = "Playbook - record piece positions as keyframes and play them back")]
#[command(version)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty play file
    New {
        /// Play file path
        file: PathBuf,

        /// Timeline length in ticks
        #[arg(long, default_value = "2500")]
        duration: u32,
    },

    /// Record a keyframe, replacing any keyframe at the same time
    Record {
        /// Play file path
        file: PathBuf,

        /// Timeline tick of the keyframe
        #[arg(short, long)]
        time: u32,

        /// Piece position as id=x,y (repeatable)
        #[arg(short, long = "piece", value_parser = parse_piece)]
        pieces: Vec<(String, EntityPosition)>,

        /// Shared object position as x,y
        #[arg(short, long, value_parser = parse_position)]
        special: Option<EntityPosition>,
    },

    /// Print the interpolated positions at a time
    Query {
        /// Play file path
        file: PathBuf,

        /// Timeline tick to query
        #[arg(short, long)]
        time: u32,

        /// Also interpolate pieces that only appear in the later keyframe
        #[arg(long)]
        union_keys: bool,
    },

    /// Show play file information
    Info {
        /// Play file path
        file: PathBuf,
    },

    /// Play the timeline from the start and print the sampled frames
    Play {
        /// Play file path
        file: PathBuf,

        /// Sample every N ticks
        #[arg(long, default_value = "100")]
        every: u32,

        /// Write frames as JSON lines instead of printing them
        #[arg(long)]
        json: Option<PathBuf>,

        /// Also interpolate pieces that only appear in the later keyframe
        #[arg(long)]
        union_keys: bool,
    },

    /// Convert a play file to JSON
    Export {
        /// Play file path
        file: PathBuf,

        /// Output JSON path
        output: PathBuf,
    },

    /// Convert JSON back into a play file
    Import {
        /// Input JSON path
        input: PathBuf,

        /// Play file path
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::New { file, duration } => new_play(&file, duration)?,

        Commands::Record {
            file,
            time,
            pieces,
            special,
        } => record_keyframe(&file, time, pieces, special)?,

        Commands::Query {
            file,
            time,
            union_keys,
        } => query_play(&file, time, union_keys)?,

        Commands::Info { file } => print_info(&load_play(&file)?),

        Commands::Play {
            file,
            every,
            json,
            union_keys,
        } => play(&file, every, json, union_keys)?,

        Commands::Export { file, output } => {
            let play = load_play(&file)?;
            std::fs::write(&output, play.to_json()?).context("Failed to write JSON file")?;
            println!("Exported {} keyframes to {}", play.keyframes.len(), output.display());
        }

        Commands::Import { input, file } => {
            let json = std::fs::read_to_string(&input).context("Failed to read JSON file")?;
            let play = SavedPlay::from_json(&json).context("Failed to parse JSON play")?;
            // Normalize ordering before it reaches disk
            let duration = play.duration;
            let play = SavedPlay::from_store(duration, &play.into_store());
            save_play(&file, &play)?;
            println!("Imported {} keyframes into {}", play.keyframes.len(), file.display());
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_play(path: &Path) -> Result<SavedPlay> {
    let file = File::open(path).context("Failed to open play file")?;
    SavedPlay::read(BufReader::new(file)).context("Failed to read play file")
}

fn save_play(path: &Path, play: &SavedPlay) -> Result<()> {
    let file = File::create(path).context("Failed to create play file")?;
    let mut writer = BufWriter::new(file);
    play.write(&mut writer).context("Failed to write play file")?;
    writer.flush().context("Failed to flush play file")?;
    Ok(())
}

fn session_config(duration: u32, union_keys: bool) -> SessionConfig {
    SessionConfig {
        duration,
        interpolation: if union_keys {
            InterpolationMode::UnionKeys
        } else {
            InterpolationMode::PrevKeys
        },
    }
}

fn new_play(path: &Path, duration: u32) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    save_play(path, &SavedPlay::new(duration, Vec::new()))?;
    println!("Created {} ({} ticks)", path.display(), duration);
    Ok(())
}

fn record_keyframe(
    path: &Path,
    time: u32,
    pieces: Vec<(String, EntityPosition)>,
    special: Option<EntityPosition>,
) -> Result<()> {
    let play = load_play(path)?;
    let duration = play.duration;
    let mut session = Session::from_saved(play, SessionConfig::default());

    if let Some(notice) = past_end_notice(time, duration) {
        eprintln!("{}", notice);
    }

    let positions: Positions = pieces.into_iter().collect();
    let replaced = session.store().get(time).is_some();
    session.record_at(time, positions, special);
    save_play(path, &session.to_saved())?;

    println!(
        "{} keyframe at tick {} ({} keyframes total)",
        if replaced { "Replaced" } else { "Recorded" },
        time,
        session.store().len()
    );
    Ok(())
}

/// Warning for keyframes that playback can never reach
fn past_end_notice(time: u32, duration: u32) -> Option<String> {
    (time > duration).then(|| {
        format!(
            "Warning: tick {} is past the end of the timeline ({}), playback will not reach it",
            time, duration
        )
    })
}

fn query_play(path: &Path, time: u32, union_keys: bool) -> Result<()> {
    let play = load_play(path)?;
    let config = session_config(play.duration, union_keys);
    let store = play.into_store();

    // Queries are not clamped to the timeline, unlike scrubbing.
    match store.query_with(time, config.interpolation) {
        Some(frame) => print_frame(time, &frame),
        None => println!("No data: nothing has been recorded yet"),
    }
    Ok(())
}

fn play(path: &Path, every: u32, json: Option<PathBuf>, union_keys: bool) -> Result<()> {
    let play = load_play(path)?;
    let config = session_config(play.duration, union_keys);
    let mut session = Session::from_saved(play, config);

    let summary = match json {
        Some(output) => {
            let file = File::create(&output).context("Failed to create JSON lines file")?;
            let mut sink = JsonLinesSink {
                writer: BufWriter::new(file),
            };
            let summary =
                capture(&mut session, &mut sink, every).context("Failed to play timeline")?;
            sink.writer.flush().context("Failed to flush JSON lines file")?;
            println!("Wrote frames to {}", output.display());
            summary
        }
        None => capture(&mut session, &mut PrintSink, every).context("Failed to play timeline")?,
    };

    println!(
        "Played {} ticks, sampled {} frames",
        summary.ticks, summary.frames
    );
    Ok(())
}

/// Prints each sampled frame to stdout
struct PrintSink;

impl FrameSink for PrintSink {
    fn capture(&mut self, time: u32, frame: Option<&Frame>) -> playbook_core::Result<()> {
        match frame {
            Some(frame) => print_frame(time, frame),
            None => println!("[{}] no data", time),
        }
        Ok(())
    }
}

/// Writes one JSON object per sampled frame
struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> FrameSink for JsonLinesSink<W> {
    fn capture(&mut self, time: u32, frame: Option<&Frame>) -> playbook_core::Result<()> {
        let line = serde_json::json!({ "time": time, "frame": frame });
        serde_json::to_writer(&mut self.writer, &line)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

fn print_frame(time: u32, frame: &Frame) {
    println!("[{}]", time);
    for (id, pos) in &frame.positions {
        println!("  {}: ({:.2}, {:.2})", id, pos.x, pos.y);
    }
    if let Some(pos) = frame.special {
        println!("  special: ({:.2}, {:.2})", pos.x, pos.y);
    }
}

fn print_info(play: &SavedPlay) {
    let session = Session::from_saved(play.clone(), SessionConfig::default());
    let timeline = session.timeline();

    println!("\n=== Play Information ===");
    println!("Duration: {} ticks", play.duration);
    println!("Keyframes: {}", session.store().len());

    println!("\n=== Keyframes ===");
    for keyframe in session.store().iter() {
        println!(
            "  tick {}: {} pieces{}",
            keyframe.time,
            keyframe.positions.len(),
            if keyframe.special.is_some() {
                ", special object"
            } else {
                ""
            }
        );
    }

    let markers = timeline.markers(session.store());
    println!("\n=== Timeline Markers ===");
    for marker in &markers {
        println!("  {:>6.1}%  tick {}", marker.fraction * 100.0, marker.time);
    }
    let unreachable = session.store().len() - markers.len();
    if unreachable > 0 {
        println!("  ... and {} keyframes past the end of the timeline", unreachable);
    }
}

fn parse_position(s: &str) -> std::result::Result<EntityPosition, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected x,y but got '{}'", s))?;
    let x = x.trim().parse::<f64>().map_err(|e| format!("bad x '{}': {}", x, e))?;
    let y = y.trim().parse::<f64>().map_err(|e| format!("bad y '{}': {}", y, e))?;
    Ok(EntityPosition::new(x, y))
}

fn parse_piece(s: &str) -> std::result::Result<(String, EntityPosition), String> {
    let (id, pos) = s
        .split_once('=')
        .ok_or_else(|| format!("expected id=x,y but got '{}'", s))?;
    if id.is_empty() {
        return Err("piece id must not be empty".to_string());
    }
    Ok((id.to_string(), parse_position(pos)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_piece() {
        let (id, pos) = parse_piece("pg=12.5, 80").unwrap();
        assert_eq!(id, "pg");
        assert_eq!(pos, EntityPosition::new(12.5, 80.0));
    }

    #[test]
    fn test_parse_piece_rejects_garbage() {
        assert!(parse_piece("pg").is_err());
        assert!(parse_piece("=1,2").is_err());
        assert!(parse_piece("pg=1;2").is_err());
        assert!(parse_position("a,2").is_err());
    }

    #[test]
    fn test_past_end_notice() {
        assert_eq!(past_end_notice(2500, 2500), None);
        let notice = past_end_notice(2600, 2500).unwrap();
        assert!(notice.contains("tick 2600"));
    }

    #[test]
    fn test_json_lines_sink() {
        let mut sink = JsonLinesSink { writer: Vec::new() };
        let mut positions = Positions::new();
        positions.insert("p1".to_string(), EntityPosition::new(1.0, 2.0));
        let frame = Frame {
            positions,
            special: None,
        };

        sink.capture(0, None).unwrap();
        sink.capture(5, Some(&frame)).unwrap();

        let text = String::from_utf8(sink.writer).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0]["frame"].is_null());
        assert_eq!(lines[1]["time"], 5);
        assert_eq!(lines[1]["frame"]["positions"]["p1"]["x"], 1.0);
    }
}
