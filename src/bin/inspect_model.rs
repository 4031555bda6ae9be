//! Inspect a serialized model file and generate resolver setup code.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::warn;
use microlite::{ModelInfo, Operator, TFLITE_SCHEMA_VERSION};

#[derive(Parser)]
#[command(name = "inspect-model")]
#[command(about = "Inspect a TFLite flatbuffer model and generate resolver setup code")]
struct Args {
    /// Path to the .tflite model file
    model: PathBuf,

    /// Emit machine-readable JSON instead of text
    #[arg(long)]
    json: bool,

    /// Print a ready-to-paste resolver factory for this model
    #[arg(long)]
    emit_resolver: bool,

    /// Arena size in bytes for the generated setup call
    #[arg(long, default_value_t = 10 * 1024)]
    arena_size: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let info = ModelInfo::from_file(&args.model)
        .with_context(|| format!("failed to read model {}", args.model.display()))?;

    if info.schema_version != TFLITE_SCHEMA_VERSION {
        warn!(
            "model is schema version {}, this harness supports version {}",
            info.schema_version, TFLITE_SCHEMA_VERSION
        );
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else if args.emit_resolver {
        print!("{}", render_resolver(&info, args.arena_size));
    } else {
        print!("{}", render_summary(&info));
    }
    Ok(())
}

fn render_summary(info: &ModelInfo) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "model: {} bytes, schema version {}",
        info.len, info.schema_version
    );
    if let Some(description) = &info.description {
        let _ = writeln!(out, "description: {description}");
    }
    let _ = writeln!(out, "operators ({}):", info.operators.len());
    for op in &info.operators {
        match op {
            Operator::Builtin(builtin) => {
                let _ = writeln!(out, "  {builtin}  -> {}", builtin.registration_name());
            }
            Operator::Custom(name) => {
                let _ = writeln!(out, "  {name}  -> custom, needs backend support");
            }
            Operator::Unknown(code) => {
                let _ = writeln!(out, "  UNKNOWN({code})  -> builtin code not recognized");
            }
        }
    }
    out
}

fn render_resolver(info: &ModelInfo, arena_size: usize) -> String {
    let count = info.operators.len();
    let mut out = String::new();
    let _ = writeln!(
        out,
        "// Generated from a model of {} bytes (schema version {}, {} operators).",
        info.len, info.schema_version, count
    );
    let _ = writeln!(out, "//");
    let _ = writeln!(out, "// let mut interpreter = microlite::setup_model::<{count}, {arena_size}, _, _>(");
    let _ = writeln!(out, "//     MODEL_BYTES,");
    let _ = writeln!(out, "//     runtime,");
    let _ = writeln!(out, "//     build_resolver,");
    let _ = writeln!(out, "//     microlite::SetupOptions::default(),");
    let _ = writeln!(out, "// )?;");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "fn build_resolver(capacity: usize) -> microlite::Result<microlite::OpResolver> {{"
    );
    let _ = writeln!(
        out,
        "    let mut resolver = microlite::OpResolver::with_capacity(capacity);"
    );
    for op in &info.operators {
        match op {
            Operator::Builtin(builtin) => {
                let _ = writeln!(
                    out,
                    "    resolver.register_builtin(microlite::BuiltinOp::{builtin:?})?; // {}",
                    builtin.registration_name()
                );
            }
            Operator::Custom(name) => {
                let _ = writeln!(out, "    resolver.register_custom({name:?})?;");
            }
            Operator::Unknown(code) => {
                let _ = writeln!(
                    out,
                    "    // builtin code {code} is not recognized by this harness"
                );
            }
        }
    }
    let _ = writeln!(out, "    Ok(resolver)");
    let _ = writeln!(out, "}}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use microlite::test_utils::ModelBuilder;
    use microlite::BuiltinOp;

    fn info() -> ModelInfo {
        let blob = ModelBuilder::new(3)
            .description("sine approximation")
            .operator(BuiltinOp::FullyConnected)
            .operator(BuiltinOp::Softmax)
            .custom("my_op")
            .build();
        ModelInfo::parse(&blob).unwrap()
    }

    #[test]
    fn summary_lists_operators_with_registration_names() {
        let summary = render_summary(&info());
        assert!(summary.contains("schema version 3"));
        assert!(summary.contains("description: sine approximation"));
        assert!(summary.contains("FULLY_CONNECTED  -> AddFullyConnected"));
        assert!(summary.contains("SOFTMAX  -> AddSoftmax"));
        assert!(summary.contains("my_op  -> custom, needs backend support"));
    }

    #[test]
    fn resolver_snippet_registers_every_operator() {
        let snippet = render_resolver(&info(), 4096);
        assert!(snippet.contains("setup_model::<3, 4096, _, _>"));
        assert!(snippet.contains("register_builtin(microlite::BuiltinOp::FullyConnected)?;"));
        assert!(snippet.contains("register_builtin(microlite::BuiltinOp::Softmax)?;"));
        assert!(snippet.contains("register_custom(\"my_op\")?;"));
        assert!(snippet.contains("OpResolver::with_capacity(capacity)"));
    }
}
