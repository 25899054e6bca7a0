//! `nodegen`: compile node-model schemas into resolved models and code.

mod config;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use nodegen_codegen_lib::{available_targets, generator_for, write_generated};
use nodegen_ir::{CloneStep, ResolvedClass, ResolvedModel};

use crate::config::NodegenConfig;

#[derive(Parser, Debug)]
#[command(name = "nodegen")]
#[command(about = "Resolve AST node schemas and generate node code")]
struct Cli {
    /// Path to config file (default: ./nodegen.toml if present).
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve a schema and report every defect.
    Check {
        /// Input .nodes or .json schema file.
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print the resolved contract of every class, or of one.
    Inspect {
        /// Input .nodes or .json schema file.
        #[arg(short, long)]
        input: PathBuf,

        /// Only this class.
        #[arg(long)]
        class: Option<String>,
    },

    /// Run emitters and write their files.
    Generate {
        /// Input .nodes or .json schema file.
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory (overrides `output.dir`).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emitter target, repeatable (json, rust). Overrides `output.targets`.
        #[arg(short, long = "target")]
        target: Vec<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let config_path = NodegenConfig::resolve_path(cli.config.as_deref());
    let config = NodegenConfig::load(&config_path, cli.config.is_some())?;
    debug!(path = %config_path.display(), ?config, "configuration loaded");

    match cli.command {
        Commands::Check { input } => {
            let model = load_model(&input, &config)?;
            let leaves = model.leaves().count();
            println!(
                "{}: {} classes ({} leaves, {} categories), {} external types",
                input.display(),
                model.classes.len(),
                leaves,
                model.classes.len() - leaves,
                model.externals.len(),
            );
        }
        Commands::Inspect { input, class } => {
            let model = load_model(&input, &config)?;
            match class {
                Some(name) => {
                    let Some(class) = model.class(&name) else {
                        bail!("no class named '{}' in {}", name, input.display());
                    };
                    print!("{}", describe(class));
                }
                None => {
                    for class in &model.classes {
                        print!("{}", describe(class));
                    }
                }
            }
        }
        Commands::Generate {
            input,
            output,
            target,
        } => {
            let model = load_model(&input, &config)?;
            let dir = config.output_dir(output.as_deref());
            let targets = config.targets(&target, available_targets());

            for name in &targets {
                let Some(gen) = generator_for(name) else {
                    bail!(
                        "unsupported target: {} (available: {})",
                        name,
                        available_targets().join(", ")
                    );
                };
                info!(emitter = %name, language = gen.language(), "generating");
                let code = gen.generate(&model)?;
                for path in write_generated(&code, &dir)? {
                    println!("wrote {}", path.display());
                }
            }
        }
    }

    Ok(())
}

/// Load, apply config defaults and resolve.
fn load_model(input: &Path, config: &NodegenConfig) -> Result<ResolvedModel> {
    let mut schema = nodegen_parser::load_schema(input)?;

    if schema.root.is_none() {
        schema.root = config.root.clone();
    }
    for name in &config.externals {
        if !schema.externals.contains(name) {
            schema.externals.push(name.clone());
        }
    }
    nodegen_parser::tag_externals(&mut schema);

    let model = nodegen_resolve::resolve_schema(&schema)
        .with_context(|| format!("cannot resolve {}", input.display()))?;
    Ok(model)
}

fn describe(class: &ResolvedClass) -> String {
    let mut out = String::new();

    out.push_str(&format!("class {}", class.name));
    if let Some(superclass) = &class.superclass {
        out.push_str(&format!(" : {}", superclass));
    }
    if class.indicators.generic {
        out.push_str(" #generic");
    }
    if class.indicators.unique {
        out.push_str(" #unique");
    }
    if let Some(m) = &class.indicators.mangle {
        out.push_str(&format!(" #mangle({}, {})", m.name_field, m.flag_field));
    }
    out.push('\n');
    out.push_str(&format!("  chain: {}\n", class.chain.join(" > ")));

    out.push_str("  fields:\n");
    for f in &class.fields {
        let binding = if f.policy.constructor_bound {
            "ctor"
        } else {
            "deferred"
        };
        let optional = if f.policy.optional { "?" } else { "" };
        let hidden = if f.policy.visitable { "" } else { " hidden" };
        out.push_str(&format!(
            "    {}: {}{} [{} {}{}] from {}\n",
            f.name, f.kind, optional, binding, f.policy.copy_mode, hidden, f.declared_in
        ));
    }

    let params: Vec<String> = class
        .constructor
        .iter()
        .map(|p| format!("{}{}", p.field, if p.optional { "?" } else { "" }))
        .collect();
    out.push_str(&format!("  constructor: ({})\n", params.join(", ")));

    let slots: Vec<String> = class
        .traversal
        .iter()
        .map(|s| format!("{}{}", s.field, if s.list { "[]" } else { "" }))
        .collect();
    out.push_str(&format!("  traversal: {}\n", slots.join(", ")));

    let steps: Vec<String> = class
        .clone
        .iter()
        .map(|r| format!("{}={}", r.field, step_name(&r.step)))
        .collect();
    out.push_str(&format!("  clone: {}\n", steps.join(", ")));
    out
}

fn step_name(step: &CloneStep) -> String {
    match step {
        CloneStep::CopyValue => "copy".into(),
        CloneStep::CloneChild => "clone".into(),
        CloneStep::CloneList => "clone_list".into(),
        CloneStep::ShareReference => "share".into(),
        CloneStep::Reset => "reset".into(),
        CloneStep::ExternalCopy { type_name } => format!("external_copy({})", type_name),
    }
}
