use anyhow::Context;
use clap::Args;
use std::path::PathBuf;
use stitch_artifact::{ClassName, Value};
use stitch_engine::{Corpus, Machine, Slot};

#[derive(Args)]
pub(crate) struct InvokeArgs {
    /// Corpus to load (typically a woven output)
    pub corpus: PathBuf,

    /// Fully-qualified class name
    pub class: String,

    /// Method name; an instance method is called on a fresh instance
    pub method: String,

    /// Arguments: integers, `true`/`false`, `null`, anything else is a string
    pub args: Vec<String>,
}

pub(crate) fn execute(args: InvokeArgs, json_logs: bool) -> anyhow::Result<i32> {
    crate::init_logging("warn", json_logs);

    let corpus = Corpus::load(&args.corpus).map_err(|errors| {
        let messages: Vec<_> = errors.iter().map(ToString::to_string).collect();
        anyhow::anyhow!(messages.join("\n"))
    })?;
    let class = ClassName::new(&args.class).with_context(|| format!("bad class name {}", args.class))?;
    let call_args = args.args.iter().map(|raw| parse_arg(raw)).collect();

    let mut machine = Machine::new(corpus.classes());
    let result = machine.invoke(&class, &args.method, call_args);
    for line in machine.output() {
        println!("{line}");
    }
    match result {
        Ok(Slot::Value(Value::Null)) => Ok(0),
        Ok(value) => {
            println!("=> {value}");
            Ok(0)
        }
        Err(fault) => {
            eprintln!("fault: {fault}");
            Ok(1)
        }
    }
}

fn parse_arg(raw: &str) -> Slot {
    let value = match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => raw
            .parse::<i64>()
            .map_or_else(|_| Value::Str(raw.to_string()), Value::Int),
    };
    Slot::Value(value)
}
