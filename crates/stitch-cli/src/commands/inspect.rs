use clap::Args;
use std::path::PathBuf;
use stitch_engine::{Corpus, Weaver};

#[derive(Args)]
pub(crate) struct InspectArgs {
    /// Corpus to read
    pub input: PathBuf,

    /// Configuration file (defaults to `stitch.toml` under the input)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

pub(crate) fn execute(args: InspectArgs, json_logs: bool) -> anyhow::Result<i32> {
    let config = crate::load_config(args.config.as_deref(), &args.input)?;
    crate::init_logging(&config.log_filter, json_logs);

    let corpus = match Corpus::load(&args.input) {
        Ok(corpus) => corpus,
        Err(errors) => {
            for error in &errors {
                eprintln!("{error}");
            }
            return Ok(1);
        }
    };

    match Weaver::new(config).inspect(&corpus) {
        Ok(directives) if args.json => {
            println!("{}", serde_json::to_string_pretty(&directives)?);
            Ok(0)
        }
        Ok(directives) => {
            for d in &directives {
                let mut flags = Vec::new();
                if d.replace {
                    flags.push("replace".to_string());
                }
                if d.before {
                    flags.push("before".to_string());
                }
                if let Some(template) = &d.add_catch {
                    flags.push(format!("addCatch={template:?}"));
                }
                let resolved: Vec<_> = d.resolved.iter().map(ToString::to_string).collect();
                println!(
                    "{} -> {} as {} [{}] => {}",
                    d.source,
                    d.target,
                    d.member,
                    flags.join(", "),
                    resolved.join(", ")
                );
            }
            Ok(0)
        }
        Err(failure) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&failure.report())?);
            } else {
                for diagnostic in failure.diagnostics() {
                    eprintln!("[{}] {}", diagnostic.kind, diagnostic.message);
                }
            }
            Ok(1)
        }
    }
}
