use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use dftoolkit_core::{
	EvidenceLedger, HashAlgorithm, HashEngine, TimelineAnalyzer, ToolkitConfig,
	WindowsRegistryParser,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "dftoolkit", version, about = "Digital Forensics Toolkit")]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,
	/// Read buffer size used when hashing, in bytes
	#[arg(long, global = true)]
	buffer_size: Option<usize>,
	/// Log debug output to stderr
	#[arg(long, short, global = true)]
	verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Extract file metadata
	Metadata {
		path: PathBuf,
		/// Render sizes and times as strings
		#[arg(long)]
		readable: bool,
		/// Describe the link target instead of the link
		#[arg(long)]
		follow_symlinks: bool,
	},
	/// Calculate file hashes
	Hash { path: PathBuf },
	/// Verify file hashes
	Verify {
		path: PathBuf,
		#[arg(long)]
		md5: Option<String>,
		#[arg(long)]
		sha1: Option<String>,
		#[arg(long)]
		sha256: Option<String>,
	},
	/// Build timeline from directory
	Timeline {
		directory: PathBuf,
		#[arg(long)]
		include_access: bool,
	},
	/// Simulate deleted file recovery
	Recover {
		image_directory: PathBuf,
		/// Defaults to ./recovered
		#[arg(long)]
		destination: Option<PathBuf>,
	},
	/// Parse a .reg export
	Registry {
		path: PathBuf,
		/// Only show keys containing this text (case-insensitive)
		#[arg(long)]
		filter: Option<String>,
	},
	/// Extract ASCII strings from memory dump
	Strings {
		path: PathBuf,
		#[arg(long)]
		limit: Option<usize>,
		#[arg(long)]
		min_length: Option<usize>,
	},
	/// Maintain an evidence chain-of-custody ledger
	Evidence {
		#[command(subcommand)]
		action: EvidenceCommand,
	},
}

#[derive(Subcommand, Debug)]
enum EvidenceCommand {
	/// Register a new evidence item
	Register {
		/// Ledger file (JSON export format), created when missing
		ledger: PathBuf,
		identifier: String,
		description: String,
		location: String,
		/// Hash this file and store the digests with the item
		#[arg(long, value_name = "FILE")]
		hash: Option<PathBuf>,
	},
	/// Record a custody transfer or handling action
	Transfer {
		ledger: PathBuf,
		identifier: String,
		actor: String,
		action: String,
		#[arg(long)]
		notes: Option<String>,
	},
	/// Print the chain of custody
	Show { ledger: PathBuf },
}

fn main() -> ExitCode {
	let cli = Cli::parse();

	// Logs go to stderr so stdout stays machine-readable
	tracing_subscriber::fmt()
		.with_writer(std::io::stderr)
		.with_max_level(if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::WARN })
		.init();

	match run(cli) {
		Ok(code) => code,
		Err(e) => {
			eprintln!("error: {:#}", e);
			ExitCode::FAILURE
		}
	}
}

fn run(cli: Cli) -> Result<ExitCode> {
	let mut config = ToolkitConfig::default();
	if let Some(size) = cli.buffer_size {
		config = config.with_hash_buffer_size(size);
	}

	let Some(command) = cli.command else {
		Cli::command().print_help()?;
		return Ok(ExitCode::from(1));
	};

	match command {
		Commands::Metadata { path, readable, follow_symlinks } => {
			let extractor = config
				.with_follow_symlinks(follow_symlinks)
				.metadata_extractor();
			let metadata = extractor.extract(&path)?;
			let json = if readable {
				serde_json::to_string_pretty(&metadata.readable())?
			} else {
				serde_json::to_string_pretty(&metadata)?
			};
			println!("{}", json);
		}
		Commands::Hash { path } => {
			let digests = config.hash_engine().calculate(&path)?;
			println!("{}", serde_json::to_string_pretty(&digests)?);
		}
		Commands::Verify { path, md5, sha1, sha256 } => {
			let expected: BTreeMap<HashAlgorithm, String> = [
				(HashAlgorithm::Md5, md5),
				(HashAlgorithm::Sha1, sha1),
				(HashAlgorithm::Sha256, sha256),
			]
			.into_iter()
			.filter_map(|(algorithm, digest)| digest.map(|d| (algorithm, d)))
			.collect();

			let verification = config.hash_engine().verify(&path, &expected)?;
			println!("{}", HashEngine::summarize(&verification));
		}
		Commands::Timeline { directory, include_access } => {
			let progress = spinner(format!("Walking {}", directory.display()));
			let mut analyzer = TimelineAnalyzer::new();
			let built = analyzer.build_from_directory(&directory, include_access);
			finish(progress);
			built?;

			for line in analyzer.as_strings(true) {
				println!("{}", line);
			}
		}
		Commands::Recover { image_directory, destination } => {
			let destination = destination.unwrap_or_else(|| config.recovery_destination.clone());
			let simulator = config.recovery_simulator();

			let progress = spinner(format!("Scanning {}", image_directory.display()));
			let records = simulator.scan(&image_directory);
			finish(progress);
			let records = records?;

			let report = simulator.recover(&records, &destination)?;
			let resolved = report
				.destination
				.canonicalize()
				.with_context(|| format!("Failed to resolve {}", destination.display()))?;
			println!("Recovered {} file(s) to {}", records.len(), resolved.display());
		}
		Commands::Registry { path, filter } => {
			let mut parser = WindowsRegistryParser::new();
			parser.parse_reg_file(&path)?;
			let values = match filter.as_deref() {
				Some(needle) => parser.find_values(needle),
				None => parser.values().iter().collect(),
			};
			for value in values {
				println!("[{}] {} = {}", value.key_path, value.name, value.value);
			}
		}
		Commands::Strings { path, limit, min_length } => {
			if let Some(length) = min_length {
				config = config.with_min_string_length(length);
			}
			let strings = config.memory_analyzer().extract_ascii_strings(&path, limit)?;
			for string in strings {
				println!("0x{:08x}: {}", string.offset, string.value);
			}
		}
		Commands::Evidence { action } => run_evidence(&config, action)?,
	}
	Ok(ExitCode::SUCCESS)
}

fn run_evidence(config: &ToolkitConfig, action: EvidenceCommand) -> Result<()> {
	match action {
		EvidenceCommand::Register { ledger: ledger_path, identifier, description, location, hash } => {
			let mut ledger = if ledger_path.exists() {
				load_ledger(&ledger_path)?
			} else {
				EvidenceLedger::new()
			};

			let hashes = match hash {
				Some(file) => Some(
					config
						.hash_engine()
						.calculate(&file)
						.with_context(|| format!("Failed to hash {}", file.display()))?,
				),
				None => None,
			};

			ledger.register_item(identifier.as_str(), description, location, hashes)?;
			ledger.export(&ledger_path)?;
			println!("✅ Registered {} in {}", identifier, ledger_path.display());
		}
		EvidenceCommand::Transfer { ledger: ledger_path, identifier, actor, action, notes } => {
			let mut ledger = load_ledger(&ledger_path)?;
			let line = ledger
				.log_transfer(&identifier, actor, action, notes)?
				.summary_line();
			ledger.export(&ledger_path)?;
			println!("{}", line.trim_start());
		}
		EvidenceCommand::Show { ledger: ledger_path } => {
			for line in load_ledger(&ledger_path)?.summary() {
				println!("{}", line);
			}
		}
	}
	Ok(())
}

fn load_ledger(path: &Path) -> Result<EvidenceLedger> {
	EvidenceLedger::import(path).with_context(|| format!("Failed to load ledger {}", path.display()))
}

/// Spinner on stderr, only when a person is watching
fn spinner(message: String) -> Option<ProgressBar> {
	if !atty::is(atty::Stream::Stderr) {
		return None;
	}
	let progress = ProgressBar::new_spinner();
	progress.set_style(
		ProgressStyle::with_template("{spinner} {msg}")
			.unwrap_or_else(|_| ProgressStyle::default_spinner()),
	);
	progress.set_message(message);
	progress.enable_steady_tick(Duration::from_millis(100));
	Some(progress)
}

fn finish(progress: Option<ProgressBar>) {
	if let Some(progress) = progress {
		progress.finish_and_clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_cli_definition_is_valid() {
		Cli::command().debug_assert();
	}

	#[test]
	fn test_no_subcommand_parses() {
		let cli = Cli::try_parse_from(["dftoolkit"]).unwrap();
		assert!(cli.command.is_none());
	}

	#[test]
	fn test_unknown_subcommand_is_usage_error() {
		let err = Cli::try_parse_from(["dftoolkit", "carve"]).unwrap_err();
		assert_eq!(err.exit_code(), 2);
	}

	#[test]
	fn test_verify_flags() {
		let cli = Cli::try_parse_from(["dftoolkit", "verify", "disk.img", "--sha1", "abc"]).unwrap();
		match cli.command {
			Some(Commands::Verify { path, md5, sha1, sha256 }) => {
				assert_eq!(path, PathBuf::from("disk.img"));
				assert!(md5.is_none());
				assert_eq!(sha1.as_deref(), Some("abc"));
				assert!(sha256.is_none());
			}
			other => panic!("unexpected command: {:?}", other),
		}
	}

	#[test]
	fn test_evidence_show_takes_ledger() {
		let cli = Cli::try_parse_from(["dftoolkit", "evidence", "show", "case.json"]).unwrap();
		match cli.command {
			Some(Commands::Evidence { action: EvidenceCommand::Show { ledger } }) => {
				assert_eq!(ledger, PathBuf::from("case.json"));
			}
			other => panic!("unexpected command: {:?}", other),
		}
		assert!(Cli::try_parse_from(["dftoolkit", "evidence", "show"]).is_err());
	}

	#[test]
	fn test_evidence_register_with_hash_file() {
		let cli = Cli::try_parse_from([
			"dftoolkit",
			"evidence",
			"register",
			"custody.json",
			"EVD-1",
			"Suspect laptop",
			"locker 3",
			"--hash",
			"laptop.img",
		])
		.unwrap();
		match cli.command {
			Some(Commands::Evidence {
				action: EvidenceCommand::Register { ledger, identifier, description, location, hash },
			}) => {
				assert_eq!(ledger, PathBuf::from("custody.json"));
				assert_eq!(identifier, "EVD-1");
				assert_eq!(description, "Suspect laptop");
				assert_eq!(location, "locker 3");
				assert_eq!(hash, Some(PathBuf::from("laptop.img")));
			}
			other => panic!("unexpected command: {:?}", other),
		}
	}

	#[test]
	fn test_evidence_transfer_notes() {
		let cli = Cli::try_parse_from([
			"dftoolkit", "evidence", "transfer", "custody.json", "EVD-1", "Analyst Kim", "Checked out",
			"--notes", "Case 118",
		])
		.unwrap();
		match cli.command {
			Some(Commands::Evidence {
				action: EvidenceCommand::Transfer { ledger, identifier, notes, .. },
			}) => {
				assert_eq!(ledger, PathBuf::from("custody.json"));
				assert_eq!(identifier, "EVD-1");
				assert_eq!(notes.as_deref(), Some("Case 118"));
			}
			other => panic!("unexpected command: {:?}", other),
		}
	}

	#[test]
	fn test_runtime_error_is_reported() {
		let cli = Cli::try_parse_from(["dftoolkit", "hash", "/no/such/evidence.img"]).unwrap();
		let err = run(cli).unwrap_err();
		assert!(format!("{:#}", err).contains("not found"));
	}
}
