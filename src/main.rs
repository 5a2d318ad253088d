use std::fs;
use std::path::{Path, PathBuf};
use std::process::{self, Command, ExitStatus};

use clap::{Parser, Subcommand};
use snafu::{ResultExt, Snafu};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "gox", version, about = "Transpile gox sources into Go")]
struct Args {
  #[command(subcommand)]
  task: Task,
}

#[derive(Debug, Subcommand)]
enum Task {
  /// Print the token stream, one token per line
  Tokenize { file: PathBuf },

  /// Print the parsed statements
  Parse { file: PathBuf },

  /// Print the generated Go source
  Transpile { file: PathBuf },

  /// Transpile, then hand the result to `go run`
  Run {
    file: PathBuf,

    /// Go toolchain binary
    #[arg(long, env = "GOX_GO", default_value = "go")]
    go: PathBuf,

    /// Keep the temporary directory holding the generated source
    #[arg(long)]
    keep: bool,
  },
}

#[derive(Debug, Snafu)]
enum CliError {
  #[snafu(display("failed to read {}: {source}", path.display()))]
  ReadSource {
    path: PathBuf,
    source: std::io::Error,
  },

  #[snafu(display("{source}"))]
  Compile { source: gox::CompileError },

  #[snafu(display("failed to create a temporary directory: {source}"))]
  TempDir { source: std::io::Error },

  #[snafu(display("failed to write {}: {source}", path.display()))]
  WriteTarget {
    path: PathBuf,
    source: std::io::Error,
  },

  #[snafu(display("failed to launch {}: {source}", go.display()))]
  Launch {
    go: PathBuf,
    source: std::io::Error,
  },

  #[snafu(display("{} exited with {status}", go.display()))]
  GoFailed { go: PathBuf, status: ExitStatus },
}

fn main() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  if let Err(err) = run(args.task) {
    eprintln!("{err}");
    process::exit(1);
  }
}

fn run(task: Task) -> Result<(), CliError> {
  match task {
    Task::Tokenize { file } => {
      let source = read_source(&file)?;
      for token in gox::tokenize(&source).context(CompileSnafu)? {
        println!("{token}");
      }
    }
    Task::Parse { file } => {
      let source = read_source(&file)?;
      let stmts = gox::parse_source(&source).context(CompileSnafu)?;
      println!("{stmts:#?}");
    }
    Task::Transpile { file } => {
      let source = read_source(&file)?;
      println!("{}", gox::transpile(&source).context(CompileSnafu)?);
    }
    Task::Run { file, go, keep } => run_file(&file, &go, keep)?,
  }
  Ok(())
}

fn read_source(path: &Path) -> Result<String, CliError> {
  let source = fs::read_to_string(path).context(ReadSourceSnafu { path })?;
  debug!(path = %path.display(), bytes = source.len(), "read source");
  Ok(source)
}

/// Write the generated source as `<stem>.go` in a scratch directory and run
/// it, forwarding the program's output.
fn run_file(file: &Path, go: &Path, keep: bool) -> Result<(), CliError> {
  let source = read_source(file)?;
  let output = gox::transpile(&source).context(CompileSnafu)?;

  let dir = tempfile::Builder::new()
    .prefix("gox")
    .tempdir()
    .context(TempDirSnafu)?;
  let stem = file
    .file_stem()
    .map_or_else(|| "main".to_string(), |stem| stem.to_string_lossy().into_owned());
  let target = dir.path().join(format!("{stem}.go"));
  fs::write(&target, output).context(WriteTargetSnafu { path: &target })?;

  info!(path = %target.display(), go = %go.display(), "running generated source");
  let result = Command::new(go)
    .arg("run")
    .arg(&target)
    .output()
    .context(LaunchSnafu { go })?;
  print!("{}", String::from_utf8_lossy(&result.stdout));
  eprint!("{}", String::from_utf8_lossy(&result.stderr));

  if keep {
    let kept = dir.keep();
    eprintln!("generated source kept in {}", kept.display());
  }

  if !result.status.success() {
    return GoFailedSnafu {
      go,
      status: result.status,
    }
    .fail();
  }
  Ok(())
}
