use super::{read_container, write_container};
use anyhow::{bail, Context, Result};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use usmkit_core::{MuxStats, StreamKind};

/// Result of splicing one file
#[derive(Debug)]
pub enum Outcome {
    Written(MuxStats),
    /// The donor carries no audio; nothing was written
    NoDonorAudio,
}

pub fn execute(input: &str, donor: &str, output: Option<&str>) -> Result<()> {
    let input_path = Path::new(input);
    let donor_path = Path::new(donor);

    let input_is_dir = fs::metadata(input_path)
        .with_context(|| format!("Failed to open input: {}", input))?
        .is_dir();
    let donor_is_dir = fs::metadata(donor_path)
        .with_context(|| format!("Failed to open donor: {}", donor))?
        .is_dir();

    if input_is_dir != donor_is_dir {
        bail!("Both inputs must be either folders or files");
    }

    if input_is_dir {
        let out_dir = output
            .map(PathBuf::from)
            .unwrap_or_else(|| input_path.join("out"));
        return replace_batch(input_path, donor_path, &out_dir);
    }

    let out_file = output
        .map(PathBuf::from)
        .unwrap_or_else(|| default_output(input));

    println!("\n=== Replace Audio ===");
    match replace_file(input_path, donor_path, &out_file)? {
        Outcome::Written(stats) => {
            println!("Chunks written:    {}", stats.chunks_written);
            println!("Bytes written:     {} bytes", stats.bytes_written);
            println!("{} Wrote {}", "✓".green(), out_file.display());
        }
        Outcome::NoDonorAudio => {
            println!("{} {} has no audio streams, nothing written", "✗".red(), donor);
        }
    }

    Ok(())
}

/// `<input without .usm>-new.usm`
pub fn default_output(input: &str) -> PathBuf {
    let base = input.strip_suffix(".usm").unwrap_or(input);
    PathBuf::from(format!("{}-new.usm", base))
}

/// Splice the audio of `donor` into `input` and write the result to `output`
pub fn replace_file(input: &Path, donor: &Path, output: &Path) -> Result<Outcome> {
    info!("Replacing audio of {} with {}", input.display(), donor.display());

    let mut main = read_container(input)?;
    let donor_container = read_container(donor)?;

    if donor_container.streams(StreamKind::Audio).is_empty() {
        warn!("{} has no audio streams, skipping", donor.display());
        return Ok(Outcome::NoDonorAudio);
    }

    main.replace_stream(&donor_container, StreamKind::Audio)
        .with_context(|| format!("Failed to splice audio into {}", input.display()))?;

    let stats = write_container(&mut main, output)?;
    Ok(Outcome::Written(stats))
}

/// Counters reported at the end of a batch run
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

fn replace_batch(input_dir: &Path, donor_dir: &Path, out_dir: &Path) -> Result<()> {
    let summary = run_batch(input_dir, donor_dir, out_dir)?;

    println!("\n=== Batch Results ===");
    println!("Written:           {}", summary.written);
    println!("Skipped:           {}", summary.skipped);
    println!("Failed:            {}", summary.failed);

    if summary.failed == 0 {
        println!("{} All done, output in {}", "✓".green(), out_dir.display());
    } else {
        println!("{} {} files failed", "✗".red(), summary.failed);
    }

    Ok(())
}

/// Process every `.usm` file directly inside `input_dir`
///
/// Sub-folders and other files are ignored. A file is skipped when its
/// output already exists or when the donor folder has no file of the same
/// name. Per-file failures are logged and counted, not propagated.
pub fn run_batch(input_dir: &Path, donor_dir: &Path, out_dir: &Path) -> Result<BatchSummary> {
    info!(
        "Batch replace: {} + {} -> {}",
        input_dir.display(),
        donor_dir.display(),
        out_dir.display()
    );

    let mut names: Vec<String> = fs::read_dir(input_dir)
        .with_context(|| format!("Failed to read folder: {}", input_dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| Path::new(name).extension().is_some_and(|ext| ext == "usm"))
        .collect();
    names.sort();

    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output folder: {}", out_dir.display()))?;

    let progress = ProgressBar::new(names.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")?.progress_chars("##-"),
    );

    let mut summary = BatchSummary::default();
    for name in &names {
        progress.set_message(name.clone());

        let output = out_dir.join(name);
        let donor = donor_dir.join(name);

        if output.exists() {
            warn!("{} already exists, skipping", output.display());
            summary.skipped += 1;
        } else if !donor.is_file() {
            warn!("{} has no donor file, skipping", name);
            summary.skipped += 1;
        } else {
            match replace_file(&input_dir.join(name), &donor, &output) {
                Ok(Outcome::Written(_)) => {
                    progress.println(format!("{} {}", "✓".green(), name));
                    summary.written += 1;
                }
                Ok(Outcome::NoDonorAudio) => summary.skipped += 1,
                Err(e) => {
                    warn!("{}: {:#}", name, e);
                    progress.println(format!("{} {}: {:#}", "✗".red(), name, e));
                    summary.failed += 1;
                }
            }
        }

        progress.inc(1);
    }
    progress.finish_and_clear();

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output() {
        assert_eq!(default_output("dir/movie.usm"), PathBuf::from("dir/movie-new.usm"));
        assert_eq!(default_output("movie"), PathBuf::from("movie-new.usm"));
    }
}
