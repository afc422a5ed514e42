//! # ultima
//!
//! Chat with your own documents from the terminal.
//!
//! Usage:
//!   ultima --data-source ./docs                 # API mode, credentials from the environment
//!   ultima --mode local --model GPT4All -s x.pdf
//!   ultima --debug                              # verbose logging

mod repl;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use ultima_chat::{
    Components, Credentials, DefaultComponents, DistanceMetric, EmbeddingModel, LiveVerifier, Mode,
    ModelKind,
    Notice, Options, SessionState, Settings,
};

use crate::repl::{Command, HELP};

#[derive(Parser, Debug)]
#[command(name = "ultima", version, about = "Chat with your own documents")]
struct Cli {
    /// File, directory or URL to chat with
    #[arg(short = 's', long, env = "ULTIMA_DATA_SOURCE")]
    data_source: Option<String>,

    /// api or local
    #[arg(long, env = "ULTIMA_MODE")]
    mode: Option<Mode>,

    /// Chat model (gpt-3.5-turbo, gpt-4, GPT4All)
    #[arg(long, env = "ULTIMA_MODEL")]
    model: Option<ModelKind>,

    /// Embedding model instead of the one paired with the chat model
    /// (text-embedding-ada-002, all-MiniLM-L6-v2, nomic-embed-text-v1.5)
    #[arg(long, env = "ULTIMA_EMBEDDING")]
    embedding: Option<EmbeddingModel>,

    /// Chunks handed to the model per question
    #[arg(long, env = "ULTIMA_K")]
    k: Option<usize>,

    /// Candidates scanned before diversity re-ranking
    #[arg(long, env = "ULTIMA_FETCH_K")]
    fetch_k: Option<usize>,

    /// Maximum tokens per chunk
    #[arg(long, env = "ULTIMA_CHUNK_SIZE")]
    chunk_size: Option<usize>,

    /// Tokens shared by consecutive chunks
    #[arg(long, env = "ULTIMA_CHUNK_OVERLAP")]
    chunk_overlap: Option<usize>,

    #[arg(long, env = "ULTIMA_TEMPERATURE")]
    temperature: Option<f32>,

    /// Token cap on the retrieved context per prompt
    #[arg(long, env = "ULTIMA_MAX_TOKENS")]
    max_tokens: Option<usize>,

    /// Context window of local models
    #[arg(long, env = "ULTIMA_MODEL_N_CTX")]
    model_n_ctx: Option<u32>,

    /// cos, L2, L1 or max
    #[arg(long, env = "ULTIMA_DISTANCE_METRIC")]
    distance_metric: Option<DistanceMetric>,

    /// Disable maximal marginal relevance re-ranking
    #[arg(long, env = "ULTIMA_NO_MMR")]
    no_mmr: bool,

    /// Directory for local datasets
    #[arg(long, env = "ULTIMA_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Directory for model weights and caches
    #[arg(long, env = "ULTIMA_MODELS_DIR", default_value = "models")]
    models_dir: PathBuf,

    /// Verbose logging
    #[arg(short, long, env = "ULTIMA_DEBUG")]
    debug: bool,
}

impl Cli {
    fn options(&self) -> Options {
        let mut options = Options::default();
        if let Some(mode) = self.mode {
            options.mode = mode;
            if options.model.mode() != mode {
                if let Some(first) = ModelKind::for_mode(mode).first() {
                    options.model = *first;
                }
            }
        }
        if let Some(model) = self.model {
            options.model = model;
            options.mode = model.mode();
        }
        options.embedding = self.embedding.or(options.embedding);
        options.k = self.k.unwrap_or(options.k);
        options.fetch_k = self.fetch_k.unwrap_or(options.fetch_k.max(options.k));
        options.chunk_size = self.chunk_size.unwrap_or(options.chunk_size);
        options.chunk_overlap = self.chunk_overlap.unwrap_or(options.chunk_overlap);
        options.temperature = self.temperature.unwrap_or(options.temperature);
        options.max_tokens = self.max_tokens.unwrap_or(options.max_tokens);
        options.model_n_ctx = self.model_n_ctx.unwrap_or(options.model_n_ctx);
        options.distance_metric = self.distance_metric.unwrap_or(options.distance_metric);
        options.maximal_marginal_relevance = !self.no_mmr;
        options
    }
}

fn show(notice: &Notice) {
    if notice.is_error() {
        eprintln!("✗ {notice}");
    } else {
        println!("✓ {notice}");
    }
}

fn print_history(state: &SessionState) {
    if state.history().is_empty() {
        println!("(no questions yet)");
    }
    for (i, (question, answer)) in state.history().iter().enumerate() {
        println!("[{}] you: {question}\n    ultima: {answer}", i + 1);
    }
}

async fn handle(
    state: SessionState,
    command: Command,
    components: &dyn Components,
) -> (SessionState, bool) {
    let state = match command {
        Command::Empty => state,
        Command::Quit => return (state, false),
        Command::Help => {
            println!("{HELP}");
            state
        }
        Command::Ask(question) => {
            if state.chain().is_none() {
                eprintln!("✗ No chain yet: set a data source with :source, then :rebuild");
                return (state, true);
            }
            let (state, answer) = state.generate_response(&question).await;
            match answer {
                Ok(answer) => println!("\n{answer}\n"),
                Err(e) => eprintln!("✗ {e}"),
            }
            state
        }
        Command::Auth(input) => {
            let (state, notice) = state.authenticate(input, &LiveVerifier).await;
            show(&notice);
            state
        }
        Command::Source(source) => {
            let (state, notice) = state.set_data_source(source, components).await;
            show(&notice);
            state
        }
        Command::Mode(mode) => {
            let (state, notice) = state.set_mode(mode, components).await;
            show(&notice);
            state
        }
        Command::Model(model) => {
            let (state, notice) = state.set_model(model, components).await;
            show(&notice);
            state
        }
        Command::Set { key, value } => {
            let mut options = state.options().clone();
            match options.set(&key, &value) {
                Ok(()) => {
                    let (state, notice) = state.set_options(options, components).await;
                    show(&notice);
                    state
                }
                Err(e) => {
                    eprintln!("✗ {e}");
                    state
                }
            }
        }
        Command::Rebuild => {
            if !state.can_start() {
                eprintln!("✗ Authenticate with :auth first, or switch to :mode local");
                return (state, true);
            }
            println!("Building chain for {} ...", state.data_source());
            let (state, notice) = state.update_chain(components).await;
            show(&notice);
            state
        }
        Command::Options => {
            println!("{:#?}", state.options());
            state
        }
        Command::Usage => {
            println!("{}", state.usage());
            state
        }
        Command::History => {
            print_history(&state);
            state
        }
    };
    (state, true)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    ultima_chat::logging::init(cli.debug);

    let options = cli.options();
    if let Err(e) = options.validate() {
        anyhow::bail!("{e}");
    }
    let settings = Settings::default()
        .with_data_dir(cli.data_dir.clone())
        .with_models_dir(cli.models_dir.clone());
    let components = DefaultComponents::new(settings);

    println!("ultima {} - {}", env!("CARGO_PKG_VERSION"), ultima_chat::PROJECT_URL);
    let mut state = SessionState::new(options);

    if state.options().mode == Mode::Api {
        let (next, notice) = state.authenticate(Credentials::default(), &LiveVerifier).await;
        state = next;
        show(&notice);
    }
    if let Some(source) = cli.data_source {
        let (next, notice) = state.set_data_source(source, &components).await;
        state = next;
        show(&notice);
    }
    if state.can_start() {
        println!("Building chain for {} ...", state.data_source());
        let (next, notice) = state.update_chain(&components).await;
        state = next;
        show(&notice);
    } else {
        println!("Authenticate with :auth to start, or switch to :mode local");
    }
    println!("Type :help for commands.");

    let mut editor = DefaultEditor::new()?;
    loop {
        let line = match editor.readline("ultima> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                eprintln!("✗ {e}");
                continue;
            }
        };
        if !command.is_secret() && command != Command::Empty {
            let _ = editor.add_history_entry(line.as_str());
        }

        let (next, keep_going) = handle(state, command, &components).await;
        state = next;
        if !keep_going {
            break;
        }
    }

    println!("{}", state.usage());
    Ok(())
}
