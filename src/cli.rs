// Command-line front end for Unravel.
//
// Thin wrapper over the library: read a file, decompose it with the built-in
// registry, then print, compare or rewrite the resulting tree.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::codec::Registry;
use crate::fragment::{DecomposeOptions, Fragment, replace_all};
use crate::walk;

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Decompose nested encoded payloads into fragment trees.
#[derive(Parser, Debug)]
#[command(
    name = "unravel",
    version,
    about = "Recursive payload decomposition",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Machine-readable JSON output.
    #[arg(long = "json", global = true)]
    json_output: bool,

    #[command(flatten)]
    limits: LimitArgs,
}

#[derive(Args, Debug)]
struct LimitArgs {
    /// Restrict decomposition to these codecs (repeatable; registry order is kept).
    #[arg(long = "codec", value_name = "NAME", global = true, action = ArgAction::Append)]
    codecs: Vec<String>,

    /// Do not decompose nodes at this depth or deeper.
    #[arg(long = "max-depth", global = true)]
    max_depth: Option<usize>,

    /// Stop after creating this many nodes.
    #[arg(long = "max-nodes", global = true)]
    max_nodes: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Print the decomposition tree.
    Explode(InputArgs),
    /// Print the flattened projection of the tree.
    Flatten(InputArgs),
    /// Print the structural fingerprint of each input.
    Fingerprint(MultiInputArgs),
    /// Walk two inputs in lock-step and report differing leaves.
    Diff(DiffArgs),
    /// Substitute bytes at every node, then recompose.
    Replace(ReplaceArgs),
    /// List the registered codecs in order.
    Codecs,
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Input file ("-" for stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

#[derive(Args, Debug)]
struct MultiInputArgs {
    /// Input files.
    #[arg(value_hint = ValueHint::FilePath, required = true)]
    inputs: Vec<PathBuf>,
}

#[derive(Args, Debug)]
struct DiffArgs {
    /// First input.
    #[arg(value_hint = ValueHint::FilePath)]
    left: PathBuf,

    /// Second input.
    #[arg(value_hint = ValueHint::FilePath)]
    right: PathBuf,
}

#[derive(Args, Debug)]
struct ReplaceArgs {
    /// Input file ("-" for stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Bytes to look for in every decoded node.
    #[arg(long)]
    from: String,

    /// Replacement bytes.
    #[arg(long)]
    to: String,

    /// Output file (default: stdout).
    #[arg(long, short = 'o', value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Explode,
    Flatten,
    Fingerprint,
    Diff,
    Replace,
    Codecs,
}

#[derive(Debug)]
struct Options {
    command: Command,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    codecs: Vec<String>,
    limits: DecomposeOptions,
    inputs: Vec<PathBuf>,
    output_file: Option<PathBuf>,
    from: Vec<u8>,
    to: Vec<u8>,
}

fn resolve_options(cli: Cli) -> Options {
    let mut opts = Options {
        command: Command::Codecs,
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        json_output: cli.json_output,
        codecs: cli.limits.codecs,
        limits: DecomposeOptions {
            max_depth: cli.limits.max_depth,
            max_nodes: cli.limits.max_nodes,
        },
        inputs: Vec::new(),
        output_file: None,
        from: Vec::new(),
        to: Vec::new(),
    };

    match cli.command {
        Cmd::Explode(args) => {
            opts.command = Command::Explode;
            opts.inputs = vec![args.input];
        }
        Cmd::Flatten(args) => {
            opts.command = Command::Flatten;
            opts.inputs = vec![args.input];
        }
        Cmd::Fingerprint(args) => {
            opts.command = Command::Fingerprint;
            opts.inputs = args.inputs;
        }
        Cmd::Diff(args) => {
            opts.command = Command::Diff;
            opts.inputs = vec![args.left, args.right];
        }
        Cmd::Replace(args) => {
            opts.command = Command::Replace;
            opts.inputs = vec![args.input];
            opts.output_file = args.output;
            opts.from = args.from.into_bytes();
            opts.to = args.to.into_bytes();
        }
        Cmd::Codecs => opts.command = Command::Codecs,
    }
    opts
}

fn build_registry(opts: &Options) -> Result<Registry, String> {
    let registry = Registry::standard();
    if opts.codecs.is_empty() {
        return Ok(registry);
    }
    registry.select(&opts.codecs).map_err(|e| e.to_string())
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("unravel".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let opts = resolve_options(cli);
        let _ = build_registry(&opts);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_input(path: &Path) -> io::Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut data = Vec::new();
        io::stdin().lock().read_to_end(&mut data)?;
        Ok(data)
    } else {
        std::fs::read(path)
    }
}

fn load(path: &Path, registry: &Registry, opts: &Options) -> Result<Fragment, String> {
    let data = read_input(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let mut root = Fragment::new(data);
    let stats = root.decompose_with(registry, &opts.limits);
    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "unravel: {}: {} nodes, depth {}{}",
            path.display(),
            stats.nodes,
            stats.depth,
            if stats.truncated { " (truncated)" } else { "" }
        );
    }
    if stats.truncated && !opts.quiet {
        log::warn!("{}: decomposition stopped by limits", path.display());
    }
    Ok(root)
}

fn display_bytes(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).escape_debug().to_string()
}

fn display_path(path: &[usize]) -> String {
    let parts: Vec<String> = path.iter().map(|i| i.to_string()).collect();
    format!("/{}", parts.join("/"))
}

fn tree_json(node: &Fragment) -> serde_json::Value {
    serde_json::json!({
        "codec": node.codec(),
        "fingerprint": node.fingerprint().to_hex(),
        "contents": String::from_utf8_lossy(node.contents()),
        "children": node.children().iter().map(tree_json).collect::<Vec<_>>(),
    })
}

fn emit(out: &[u8]) -> Result<(), String> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    lock.write_all(out)
        .and_then(|_| lock.flush())
        .map_err(|e| format!("write: {e}"))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_explode(opts: &Options, registry: &Registry) -> Result<i32, String> {
    let root = load(&opts.inputs[0], registry, opts)?;
    let mut out = String::new();
    if opts.json_output {
        out = serde_json::to_string_pretty(&tree_json(&root)).map_err(|e| e.to_string())?;
        out.push('\n');
    } else {
        for (depth, node) in root.iter() {
            let fingerprint = if node.fingerprint().is_empty() {
                "-".to_string()
            } else {
                node.fingerprint().to_hex()
            };
            out.push_str(&format!(
                "{}{} {}: {}\n",
                "  ".repeat(depth),
                node.codec().unwrap_or("root"),
                fingerprint,
                display_bytes(node.contents())
            ));
        }
    }
    emit(out.as_bytes())?;
    Ok(0)
}

fn cmd_flatten(opts: &Options, registry: &Registry) -> Result<i32, String> {
    let root = load(&opts.inputs[0], registry, opts)?;
    let mut out = root.flatten();
    out.push(b'\n');
    emit(&out)?;
    Ok(0)
}

fn cmd_fingerprint(opts: &Options, registry: &Registry) -> Result<i32, String> {
    let mut rows = Vec::with_capacity(opts.inputs.len());
    for path in &opts.inputs {
        let root = load(path, registry, opts)?;
        rows.push((path, root.fingerprint().to_hex()));
    }

    let out = if opts.json_output {
        let json: Vec<serde_json::Value> = rows
            .iter()
            .map(|(path, fp)| serde_json::json!({ "path": path.display().to_string(), "fingerprint": fp }))
            .collect();
        let mut s = serde_json::to_string_pretty(&json).map_err(|e| e.to_string())?;
        s.push('\n');
        s
    } else {
        rows.iter()
            .map(|(path, fp)| format!("{fp}  {}\n", path.display()))
            .collect()
    };
    emit(out.as_bytes())?;
    Ok(0)
}

fn cmd_diff(opts: &Options, registry: &Registry) -> Result<i32, String> {
    let left = load(&opts.inputs[0], registry, opts)?;
    let right = load(&opts.inputs[1], registry, opts)?;

    let divergences = match walk::diff(&[&left, &right]) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("unravel: diff: {e}");
            return Ok(1);
        }
    };

    let out = if opts.json_output {
        let json: Vec<serde_json::Value> = divergences
            .iter()
            .map(|d| {
                serde_json::json!({
                    "path": d.path,
                    "contents": d.contents.iter().map(|c| String::from_utf8_lossy(c)).collect::<Vec<_>>(),
                })
            })
            .collect();
        let mut s = serde_json::to_string_pretty(&json).map_err(|e| e.to_string())?;
        s.push('\n');
        s
    } else {
        let mut s = String::new();
        for d in &divergences {
            s.push_str(&format!("{}\n", display_path(&d.path)));
            s.push_str(&format!("  - {}\n", display_bytes(&d.contents[0])));
            s.push_str(&format!("  + {}\n", display_bytes(&d.contents[1])));
        }
        s
    };
    if !opts.quiet {
        emit(out.as_bytes())?;
    }
    Ok(0)
}

fn cmd_replace(opts: &Options, registry: &Registry) -> Result<i32, String> {
    if opts.from.is_empty() {
        return Err("replace: --from must not be empty".into());
    }
    let mut root = load(&opts.inputs[0], registry, opts)?;
    root.apply(|contents| replace_all(contents, &opts.from, &opts.to));
    root.recompose();
    let result = root.into_contents();

    match &opts.output_file {
        Some(path) => {
            if path.exists() && !opts.force {
                return Err(format!(
                    "output file exists, use -f to overwrite: {}",
                    path.display()
                ));
            }
            std::fs::write(path, &result).map_err(|e| format!("replace: write: {e}"))?;
        }
        None => emit(&result)?,
    }

    if opts.verbose > 0 && !opts.quiet {
        eprintln!("unravel: replace: output {} bytes", result.len());
    }
    Ok(0)
}

fn cmd_codecs(opts: &Options, registry: &Registry) -> Result<i32, String> {
    let out = if opts.json_output {
        let names: Vec<&str> = registry.names().collect();
        let mut s = serde_json::to_string_pretty(&names).map_err(|e| e.to_string())?;
        s.push('\n');
        s
    } else {
        registry
            .names()
            .enumerate()
            .map(|(i, name)| format!("{i:3}  {name}\n"))
            .collect()
    };
    emit(out.as_bytes())?;
    Ok(0)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    let level = match (opts.quiet, opts.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let registry = match build_registry(&opts) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("unravel: {e}");
            process::exit(1);
        }
    };

    let result = match opts.command {
        Command::Explode => cmd_explode(&opts, &registry),
        Command::Flatten => cmd_flatten(&opts, &registry),
        Command::Fingerprint => cmd_fingerprint(&opts, &registry),
        Command::Diff => cmd_diff(&opts, &registry),
        Command::Replace => cmd_replace(&opts, &registry),
        Command::Codecs => cmd_codecs(&opts, &registry),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("unravel: {e}");
            1
        }
    };
    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_opts(args: &[&str]) -> Options {
        let argv: Vec<String> = std::iter::once("unravel".to_string())
            .chain(args.iter().map(|s| s.to_string()))
            .collect();
        let cli = Cli::try_parse_from(argv).expect("cli parse failed");
        resolve_options(cli)
    }

    #[test]
    fn explode_subcommand_maps_correctly() {
        let opts = parse_opts(&["explode", "in.bin", "--max-depth", "4"]);
        assert_eq!(opts.command, Command::Explode);
        assert_eq!(opts.inputs, vec![PathBuf::from("in.bin")]);
        assert_eq!(opts.limits.max_depth, Some(4));
        assert_eq!(opts.limits.max_nodes, None);
    }

    #[test]
    fn diff_takes_two_inputs() {
        let opts = parse_opts(&["diff", "a", "b"]);
        assert_eq!(opts.command, Command::Diff);
        assert_eq!(opts.inputs, vec![PathBuf::from("a"), PathBuf::from("b")]);
    }

    #[test]
    fn fingerprint_requires_an_input() {
        let argv = ["unravel", "fingerprint"];
        assert!(Cli::try_parse_from(argv).is_err());
        let opts = parse_opts(&["fingerprint", "a", "b", "c"]);
        assert_eq!(opts.inputs.len(), 3);
    }

    #[test]
    fn replace_flags_parse() {
        let opts = parse_opts(&[
            "--force", "replace", "--from", "alice", "--to", "bob", "-o", "out.bin", "in.bin",
        ]);
        assert_eq!(opts.command, Command::Replace);
        assert!(opts.force);
        assert_eq!(opts.from, b"alice");
        assert_eq!(opts.to, b"bob");
        assert_eq!(opts.output_file, Some(PathBuf::from("out.bin")));
    }

    #[test]
    fn codec_selection_is_global_and_repeatable() {
        let opts = parse_opts(&["codecs", "--codec", "json", "--codec", "base64"]);
        assert_eq!(opts.codecs, ["json", "base64"]);
        let registry = build_registry(&opts).unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), ["base64", "json"]);
    }

    #[test]
    fn unknown_codec_is_reported() {
        let opts = parse_opts(&["codecs", "--codec", "rot13"]);
        assert_eq!(build_registry(&opts).unwrap_err(), "unknown codec: rot13");
    }

    #[test]
    fn verbose_is_capped() {
        let opts = parse_opts(&["-v", "-v", "-v", "codecs"]);
        assert_eq!(opts.verbose, 2);
    }

    #[test]
    fn display_helpers() {
        assert_eq!(display_path(&[]), "/");
        assert_eq!(display_path(&[0, 2]), "/0/2");
        assert_eq!(display_bytes(b"a\r\nb"), "a\\r\\nb");
    }

    #[test]
    fn fuzz_parser_tolerates_garbage() {
        let args: Vec<String> = ["--max-depth", "x", "diff", "--codec"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        fuzz_try_parse_args(&args);
        fuzz_try_parse_args(&[]);
    }
}
