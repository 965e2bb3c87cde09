use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use depmatch::config::PipelineConfig;
use depmatch::extract::{CatalogExtractor, Extractor};
use depmatch::graph::Vocab;
use depmatch::parser::{CommandParser, ConlluParser, DependencyParser};
use depmatch::pipeline::{CONLL_COLUMN, CancelToken, Pipeline, RunSummary};
use depmatch::profile::LanguageProfile;
use depmatch::semgrex::SemgrexIndex;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "depmatch")]
#[command(about = "Extract dependency relations from tabular text corpora", long_about = None)]
struct Cli {
    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a text column and extract SOV triples and target modifiers
    Extract {
        #[command(flatten)]
        io: IoArgs,

        /// Lemma to pin to the subject or object slot
        #[arg(short, long)]
        target: Option<String>,

        /// Also match verbs carrying a negation marker
        #[arg(short, long)]
        negation: bool,

        /// Built-in language profile
        #[arg(short, long, default_value = "en")]
        lang: String,

        /// JSON language profile, overrides --lang
        #[arg(long)]
        profile: Option<PathBuf>,

        /// External parser command reading text on stdin, writing CoNLL-U
        #[arg(long)]
        parser_cmd: Option<String>,

        /// The text column already holds CoNLL-U
        #[arg(long, conflicts_with = "parser_cmd")]
        pre_parsed: bool,

        /// Also write (id, parsed_text, conll_string) rows here
        #[arg(long)]
        conll_output: Option<PathBuf>,

        /// Clean social-media text before parsing
        #[arg(long)]
        clean: bool,
    },
    /// Match a JSON pattern catalog against a column of CoNLL-U strings
    Match {
        #[command(flatten)]
        io: IoArgs,

        /// JSON pattern catalog
        #[arg(short, long)]
        patterns: PathBuf,
    },
}

#[derive(Args)]
struct IoArgs {
    /// Input delimited file, optionally gzipped
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file; the final artifact gets a .gz suffix
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON pipeline config; flags given on the command line win
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    id_col: Option<String>,

    /// Text column (default "text" for extract, "conll_string" for match)
    #[arg(long)]
    text_col: Option<String>,

    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long)]
    delimiter: Option<char>,

    /// Written for unpopulated fields
    #[arg(long)]
    absent: Option<String>,
}

impl IoArgs {
    fn into_config(self, default_text_col: &str) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => {
                let (Some(input), Some(output)) = (&self.input, &self.output) else {
                    bail!("--input and --output are required without --config");
                };
                let mut config = PipelineConfig::new(input, output);
                config.text_col = default_text_col.to_string();
                config
            }
        };

        if let Some(input) = self.input {
            config.input = input;
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        if let Some(id_col) = self.id_col {
            config.id_col = id_col;
        }
        if let Some(text_col) = self.text_col {
            config.text_col = text_col;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(delimiter) = self.delimiter {
            config.delimiter = delimiter;
        }
        if let Some(absent) = self.absent {
            config.absent_marker = absent;
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create log file {}", path.display()))?;
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        None => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    Ok(())
}

fn run_pipeline(
    config: PipelineConfig,
    parser: &mut dyn DependencyParser,
    extractor: &dyn Extractor,
) -> anyhow::Result<RunSummary> {
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .context("cannot install Ctrl-C handler")?;

    let pipeline = Pipeline::new(config).with_cancel_token(cancel);
    let summary = pipeline.run(parser, extractor)?;

    if summary.interrupted {
        warn!("run interrupted; output holds the batches completed before the signal");
    }
    if let Some(output) = &summary.output {
        info!(output = %output.display(), rows = summary.rows_written, "wrote output");
    }
    if let Some(conll) = &summary.conll_output {
        info!(output = %conll.display(), "wrote CoNLL output");
    }
    if !summary.failed_row_ids.is_empty() {
        warn!(count = summary.failed_row_ids.len(), "some rows failed, see warnings above");
    }

    Ok(summary)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;

    match cli.command {
        Commands::Extract {
            io,
            target,
            negation,
            lang,
            profile,
            parser_cmd,
            pre_parsed,
            conll_output,
            clean,
        } => {
            let mut config = io.into_config("text")?;
            config.clean_text |= clean;
            if conll_output.is_some() {
                config.conll_output = conll_output;
            }

            let profile = match profile {
                Some(path) => LanguageProfile::load(&path)?,
                None => LanguageProfile::builtin(&lang)?,
            };
            info!(lang = %profile.lang, target = ?target, negation, "compiling pattern catalog");
            let extractor = CatalogExtractor::new(profile, target.as_deref(), negation)?;

            let vocab = Vocab::new();
            let mut parser: Box<dyn DependencyParser> = match (parser_cmd, pre_parsed) {
                (_, true) => Box::new(ConlluParser::new(vocab)),
                (Some(command), false) => Box::new(
                    CommandParser::from_command_line(&command, vocab)
                        .context("--parser-cmd is empty")?,
                ),
                (None, false) => bail!("either --parser-cmd or --pre-parsed is required"),
            };

            run_pipeline(config, parser.as_mut(), &extractor)?;
        }
        Commands::Match { io, patterns } => {
            let config = io.into_config(CONLL_COLUMN)?;
            let index = SemgrexIndex::load(&patterns)?;
            info!(
                families = index.families().len(),
                columns = index.columns().len(),
                "loaded pattern catalog"
            );

            let mut parser = ConlluParser::new(Vocab::new());
            run_pipeline(config, &mut parser, &index)?;
        }
    }

    Ok(())
}
