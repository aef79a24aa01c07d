//! CLI tool to extract the songs of a Dynamix MUS file to MIDI files.
use std::io::Write;
use std::path::PathBuf;

use dynamix_mus::{extract_all, ExtractReport, Mus, Policy};
use snafu::prelude::*;
use snafu::{report, Whatever};

const USAGE: &str = "Usage: mus2mid [--fail-fast] [--list] <input.mus> <output.mid>";

/// Command line arguments
#[derive(Debug, PartialEq)]
struct Args {
    input: PathBuf,
    /// Output name pattern, not needed when listing
    output: Option<PathBuf>,
    policy: Policy,
    list: bool,
}

/// Parse the arguments after the program name,
/// or `None` if they do not match the usage.
fn parse_args(args: impl IntoIterator<Item = String>) -> Option<Args> {
    let mut policy = Policy::KeepGoing;
    let mut list = false;
    let mut positional = Vec::new();

    for arg in args {
        match arg.as_str() {
            "--fail-fast" => policy = Policy::FailFast,
            "--list" => list = true,
            flag if flag.starts_with("--") => return None,
            _ => positional.push(PathBuf::from(arg)),
        }
    }

    let mut positional = positional.into_iter();
    let input = positional.next()?;
    let output = positional.next();
    if positional.next().is_some() || (output.is_none() && !list) {
        return None;
    }

    Some(Args {
        input,
        output,
        policy,
        list,
    })
}

#[report]
fn main() -> Result<(), Whatever> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let Some(args) = parse_args(std::env::args().skip(1)) else {
        eprintln!("Dynamix song -> MID converter");
        eprintln!("{USAGE}");
        std::process::exit(-1);
    };

    log::info!("Reading {}", args.input.display());
    let mus = Mus::from_file(&args.input).whatever_context("Failed to read MUS file")?;

    if args.list {
        return list_songs(&mus);
    }

    let Some(output) = &args.output else {
        whatever!("Missing output file");
    };

    println!(
        "Extracting {} songs ({} policy)",
        mus.song_count(),
        args.policy
    );

    let report = extract_all(&mus, output, args.policy);

    print_report(
        &report,
        args.policy,
        std::io::stdout().lock(),
        std::io::stderr().lock(),
    )
}

/// Print the diagnostic record of every extracted song and every error,
/// failing if any song could not be extracted.
fn print_report(
    report: &ExtractReport,
    policy: Policy,
    mut out: impl Write,
    mut err: impl Write,
) -> Result<(), Whatever> {
    for song in &report.extracted {
        writeln!(out, "{}", song.info).whatever_context("Failed to print report")?;
    }
    for error in &report.errors {
        writeln!(err, "Error: {}", snafu::Report::from_error(error))
            .whatever_context("Failed to print report")?;
    }
    writeln!(
        out,
        "{} song(s) written, {} failed ({} policy)",
        report.extracted.len(),
        report.errors.len(),
        policy
    )
    .whatever_context("Failed to print report")?;

    ensure_whatever!(
        report.is_success(),
        "{} song(s) could not be extracted ({} policy)",
        report.errors.len(),
        policy
    );
    Ok(())
}

/// Print the diagnostic record of every song without writing anything
fn list_songs(mus: &Mus) -> Result<(), Whatever> {
    let mut failed = 0;
    for song in mus.songs() {
        match song {
            Ok(song) => println!("{}", song),
            Err(e) => {
                failed += 1;
                eprintln!("Error: {}", e);
            }
        }
    }

    ensure_whatever!(failed == 0, "{} song(s) are invalid", failed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{parse_args, print_report, Args};
    use dynamix_mus::{extract_all, Mus, Policy};
    use std::path::PathBuf;

    fn args(list: &[&str]) -> Option<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_positional_arguments() {
        assert_eq!(
            args(&["song.rol", "song.mid"]),
            Some(Args {
                input: PathBuf::from("song.rol"),
                output: Some(PathBuf::from("song.mid")),
                policy: Policy::KeepGoing,
                list: false,
            })
        );
    }

    #[test]
    fn parses_flags() {
        let parsed = args(&["--fail-fast", "in.mus", "out.mid"]).unwrap();
        assert_eq!(parsed.policy, Policy::FailFast);

        let parsed = args(&["in.mus", "--list"]).unwrap();
        assert!(parsed.list);
        assert_eq!(parsed.output, None);
    }

    #[test]
    fn rejects_bad_usage() {
        assert_eq!(args(&[]), None);
        assert_eq!(args(&["in.mus"]), None);
        assert_eq!(args(&["in.mus", "out.mid", "extra"]), None);
        assert_eq!(args(&["--verbose", "in.mus", "out.mid"]), None);
    }

    /// Two songs: an empty one at offset 8 and one past the end
    fn mus_with_bad_song() -> Mus {
        let data = vec![
            0x08, 0x00, 0x00, 0x00, 0xFF, 0x00, 0x00, 0x00, // TOC
            0x08, 0x00, 0x00, 0x00, 0x18, 0x00, 0xFF, 0xFF, // header, no payload
        ];
        Mus::parse(data).unwrap()
    }

    #[test]
    fn failed_songs_fail_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let mus = mus_with_bad_song();

        for policy in [Policy::KeepGoing, Policy::FailFast] {
            let report = extract_all(&mus, dir.path().join("song.mid"), policy);
            let mut out = Vec::new();
            let mut err = Vec::new();

            let outcome = print_report(&report, policy, &mut out, &mut err);
            let message = outcome.unwrap_err().to_string();
            assert_eq!(
                message,
                format!("1 song(s) could not be extracted ({policy} policy)")
            );

            let out = String::from_utf8(out).unwrap();
            assert!(out.starts_with("Song 0: offset = 0x0008, size = 0x0008"));
            assert!(out.contains(&format!("1 song(s) written, 1 failed ({policy} policy)")));

            let err = String::from_utf8(err).unwrap();
            assert!(err.starts_with("Error: Invalid song #1 at offset 0x00FF"));
        }
    }

    #[test]
    fn successful_run_reports_policy() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = mus_with_bad_song().data;
        // point the second TOC entry at the first song as well
        data[4] = 0x08;
        let mus = Mus::parse(data).unwrap();

        let report = extract_all(&mus, dir.path().join("song.mid"), Policy::KeepGoing);
        let mut out = Vec::new();
        let mut err = Vec::new();
        print_report(&report, Policy::KeepGoing, &mut out, &mut err).unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.ends_with("2 song(s) written, 0 failed (keep-going policy)\n"));
        assert!(err.is_empty());
    }
}
