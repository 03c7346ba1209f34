use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{LevelFilter, debug, info};
use sysreg::{
    Pipeline,
    compositor::{Assets, Chunk},
    config::{ConfigLayer, DepRule, PublicPathLayer, RegistrationOptions},
    interceptor::ResolveRequest,
    naming::NameAllocator,
    stub::{StubStore, StubSynthesizer},
};

/// Wrap bundler output in a SystemJS System.register envelope
#[derive(Parser, Debug)]
#[command(name = "sysreg", author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Wrap an emitted entry chunk
    Wrap(WrapArgs),
    /// Print the identifier derived for each request
    Names {
        #[arg(required = true)]
        requests: Vec<String>,
    },
    /// Write stub modules for the given requests into a directory
    Stubs {
        #[arg(long, value_name = "DIR")]
        dir: PathBuf,
        #[arg(required = true)]
        requests: Vec<String>,
    },
}

#[derive(Args, Debug)]
struct WrapArgs {
    /// Emitted chunk to wrap
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Output file; defaults to stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Configuration file; defaults to ./sysreg.toml when present
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Name the loader registers the bundle under
    #[arg(long)]
    register_name: Option<String>,

    /// Externalize this request (replaces configured systemjsDeps)
    #[arg(long = "dep", value_name = "REQUEST")]
    deps: Vec<String>,

    /// Externalize requests matching this regular expression
    #[arg(long = "dep-pattern", value_name = "REGEX")]
    dep_patterns: Vec<String>,

    /// Import requests found in the bundle, run through the classifier
    #[arg(long = "request", value_name = "REQUEST")]
    requests: Vec<String>,

    /// Strip line breaks from the envelope
    #[arg(long)]
    minify: bool,

    /// Derive the public path from the loader's load record
    #[arg(long)]
    public_path: bool,
}

impl WrapArgs {
    fn to_layer(&self) -> ConfigLayer {
        let deps: Vec<DepRule> = self
            .deps
            .iter()
            .cloned()
            .map(DepRule::Literal)
            .chain(
                self.dep_patterns
                    .iter()
                    .map(|pattern| DepRule::Pattern {
                        pattern: pattern.clone(),
                    }),
            )
            .collect();
        ConfigLayer {
            register_name: self.register_name.clone(),
            systemjs_deps: (!deps.is_empty()).then_some(deps),
            minify: self.minify.then_some(true),
            public_path: self.public_path.then(|| PublicPathLayer {
                use_systemjs_locate_dir: Some(true),
                bootstrap_pattern: None,
            }),
            ..ConfigLayer::default()
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Wrap(args) => wrap(&args),
        Command::Names { requests } => names(&requests),
        Command::Stubs { dir, requests } => stubs(dir, &requests),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn wrap(args: &WrapArgs) -> Result<()> {
    let options = RegistrationOptions::load(args.config.as_deref(), args.to_layer())
        .context("Failed to load configuration")?;
    let validated = options.validate().context("Invalid configuration")?;
    let mut pipeline = Pipeline::new(validated)?;

    for request in &args.requests {
        pipeline.before_resolve(ResolveRequest::new(request.as_str(), "."))?;
    }

    let file = args.input.display().to_string();
    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read chunk {file}"))?;
    let mut assets = Assets::new();
    assets.insert(file.clone(), text);
    pipeline.compose(&[Chunk::initial("main", [file.as_str()])], &mut assets)?;

    let wrapped = assets
        .shift_remove(&file)
        .context("Wrapped chunk disappeared from the asset map")?;
    match &args.output {
        Some(path) => {
            fs::write(path, wrapped)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => io::stdout().lock().write_all(wrapped.as_bytes())?,
    }

    let summary = pipeline.finish()?;
    debug!("Build summary: {summary:?}");
    Ok(())
}

fn names(requests: &[String]) -> Result<()> {
    let mut allocator = NameAllocator::new();
    let mut out = io::stdout().lock();
    for request in requests {
        writeln!(out, "{request}\t{}", allocator.allocate(request))?;
    }
    Ok(())
}

fn stubs(dir: PathBuf, requests: &[String]) -> Result<()> {
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let mut synthesizer = StubSynthesizer::new(StubStore::in_directory(dir));
    for request in requests {
        synthesizer.synthesize(request)?;
    }

    let mut out = io::stdout().lock();
    for binding in synthesizer.bindings() {
        writeln!(out, "{}\t{}", binding.request, binding.stub_path.display())?;
    }
    drop(out);

    let kept = synthesizer.into_store().persist();
    info!("Kept {} stub(s)", kept.len());
    Ok(())
}
