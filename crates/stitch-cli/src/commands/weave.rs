use clap::Args;
use std::path::PathBuf;
use stitch_engine::Weaver;

#[derive(Args)]
pub(crate) struct WeaveArgs {
    /// Corpus to read
    pub input: PathBuf,

    /// Directory to write the woven corpus to; replaced only on success
    pub output: PathBuf,

    /// Configuration file (defaults to `stitch.toml` under the input)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Exit code 1 when any stage fails
pub(crate) fn execute(args: WeaveArgs, json_logs: bool) -> anyhow::Result<i32> {
    let config = crate::load_config(args.config.as_deref(), &args.input)?;
    crate::init_logging(&config.log_filter, json_logs);
    tracing::debug!(?config, input = %args.input.display(), output = %args.output.display(), "weaving");

    match Weaver::new(config).run(&args.input, &args.output) {
        Ok(report) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for target in &report.targets {
                    println!("{} [{}]", target.class, target.hash.short());
                    for mutation in &target.mutations {
                        println!("  {mutation}");
                    }
                }
                println!(
                    "{} classes, {} directives, {} mutated, {} unchanged -> {}",
                    report.classes,
                    report.directives,
                    report.targets.len(),
                    report.unchanged,
                    args.output.display()
                );
            }
            Ok(0)
        }
        Err(failure) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&failure.report())?);
            } else {
                eprintln!("{failure}");
                for diagnostic in failure.diagnostics() {
                    eprintln!("  [{}] {}", diagnostic.kind, diagnostic.message);
                    for violation in &diagnostic.violations {
                        eprintln!("      {violation}");
                    }
                }
            }
            Ok(1)
        }
    }
}
