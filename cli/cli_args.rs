use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct ProjectConfigOpts {
    #[arg(
        long,
        help = "Specify the target project directory (default: current dir).",
        help_heading = "Project Setup",
        value_name = "PATH"
    )]
    pub project_root: Option<PathBuf>,

    #[arg(
        long,
        help = "Specify path/filename of the TOML config file (default: .projdoc/projdoc.toml).",
        value_name = "CONFIG_FILE",
        conflicts_with = "no_config_file",
        help_heading = "Project Setup"
    )]
    pub config_file: Option<String>,

    #[arg(
        long,
        help = "Disable loading any TOML config file.",
        conflicts_with = "config_file",
        help_heading = "Project Setup"
    )]
    pub no_config_file: bool,

    #[arg(
        long,
        help = "Specify the project name (overrides config/dir name).",
        value_name = "NAME",
        help_heading = "Project Setup"
    )]
    pub project_name: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ScanOpts {
    #[arg(
        long,
        value_name = "SIZE",
        help = "Skip files larger than SIZE (e.g. '1MiB', '512kb').",
        help_heading = "Scanning"
    )]
    pub max_file_size: Option<String>,

    #[arg(
        short = 'x',
        long = "exclude",
        value_name = "PATTERN",
        action = clap::ArgAction::Append,
        help = "Add an exclude pattern (ignore-file syntax). Repeatable.",
        help_heading = "Scanning"
    )]
    pub exclude: Vec<String>,

    #[arg(
        long,
        help = "Do not read the project's ignore file.",
        help_heading = "Scanning"
    )]
    pub no_ignore_file: bool,

    #[arg(
        long,
        help = "Disable the built-in ignore rules (node_modules, target, lock files, ...).",
        help_heading = "Scanning"
    )]
    pub no_builtin_ignore: bool,

    #[arg(
        long,
        help = "Follow symbolic links while scanning.",
        help_heading = "Scanning"
    )]
    pub follow_links: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ChunkOpts {
    #[arg(
        short = 't',
        long,
        value_name = "TOKENS",
        help = "Maximum estimated tokens per batch [default: 5000].",
        help_heading = "Batching"
    )]
    pub max_tokens: Option<usize>,

    #[arg(
        long,
        value_name = "ESTIMATOR",
        value_parser = ["chars", "cl100k"],
        help = "Token estimator: 'chars' (chars/4) or 'cl100k' (BPE count).",
        help_heading = "Batching"
    )]
    pub token_estimator: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FormatOutputOpts {
    #[arg(short = 'f', long, help = "Set the output format (default: pretty text).", value_name = "FORMAT", value_parser = ["text", "json", "yaml"], help_heading = "Output Formatting")]
    pub format: Option<String>,

    #[arg(
        long,
        help = "Pretty-print JSON output.",
        help_heading = "Output Formatting"
    )]
    pub pretty: bool,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Generate project documentation from source files with a text-generation service.",
    long_about = "projdoc scans a project directory, filters out ignored and binary files, \nclassifies the project, packs file contents into token-bounded batches and asks a \ntext-generation service to document each batch.",
    help_template = "{about-section}\nUsage: {usage}\n\n{all-args}{after-help}",
    after_help = "EXAMPLES:\n  projdoc scan\n  projdoc chunks -t 3000 -f json\n  projdoc generate --save\n  projdoc generate --dry-run",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase message verbosity (-v, -vv).")]
    pub verbose: u8,

    #[arg(
        short,
        long,
        global = true,
        help = "Silence informational messages and warnings."
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    #[command(
        visible_alias = "s",
        about = "Scan the project and show the analysis (languages, dependencies, type)."
    )]
    Scan(ScanArgs),

    #[command(
        visible_alias = "c",
        about = "Show how project files would be packed into batches."
    )]
    Chunks(ChunksArgs),

    #[command(
        visible_alias = "g",
        visible_alias = "gen",
        about = "Generate the project document."
    )]
    Generate(GenerateArgs),

    #[command(about = "Show or save the default configuration file structure.")]
    Config(ConfigArgs),

    #[command(about = "Generate or save shell completion scripts.")]
    Completion(CompletionArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub scan: ScanOpts,
    #[clap(flatten)]
    pub format_output: FormatOutputOpts,
}

#[derive(Args, Debug, Clone)]
pub struct ChunksArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub scan: ScanOpts,
    #[clap(flatten)]
    pub chunk: ChunkOpts,
    #[clap(flatten)]
    pub format_output: FormatOutputOpts,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[clap(flatten)]
    pub scan: ScanOpts,
    #[clap(flatten)]
    pub chunk: ChunkOpts,

    #[arg(
        long,
        help = "Print the document to standard output.",
        help_heading = "Output Control",
        conflicts_with = "save"
    )]
    pub stdout: bool,

    #[arg(
        short = 's', long, value_name = "PATH",
        num_args = 0..=1,
        help_heading = "Output Control",
        help = "Save the document. Optional PATH overrides [output].file_name.",
    )]
    pub save: Option<Option<PathBuf>>,

    #[arg(
        long,
        help = "Do not back up an existing output file before overwriting it.",
        help_heading = "Output Control"
    )]
    pub no_backup: bool,

    #[arg(
        long,
        help = "Stop after batching and show the plan; no service calls are made.",
        help_heading = "Output Control"
    )]
    pub dry_run: bool,

    #[arg(
        long,
        value_name = "MODEL",
        help = "Override the generation model.",
        help_heading = "Generation"
    )]
    pub model: Option<String>,

    #[arg(
        long,
        value_name = "URL",
        help = "Override the chat-completions endpoint.",
        help_heading = "Generation"
    )]
    pub endpoint: Option<String>,

    #[arg(
        long,
        value_name = "DELAY",
        help = "Pause between service calls (e.g. '500ms', '2s') [default: 1s].",
        help_heading = "Generation"
    )]
    pub request_delay: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionArgs {
    #[arg(
        long,
        value_name = "SHELL",
        help = "Shell to generate completions for (fish, bash, zsh) [default: fish]"
    )]
    pub shell: Option<String>,
    #[arg(
        long,
        help = "Save completion script to default location (prompts overwrite)."
    )]
    pub save: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[clap(flatten)]
    pub project_config: ProjectConfigOpts,
    #[arg(
        long,
        help = "Save default config structure to default path (prompts overwrite)."
    )]
    pub save: bool,
}
