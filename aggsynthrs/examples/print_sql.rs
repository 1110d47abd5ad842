use std::{env, path::PathBuf};

use aggsynth::{AggregateCatalog, AggsynthConfig};
use tracing_subscriber::EnvFilter;

fn usage() {
    eprintln!("Usage: print_sql <definitions_dir> <aggregate_name> [--discovery]");
    eprintln!("Example: cargo run --example print_sql -- demos/aggregates sales_by_year");
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1).collect::<Vec<_>>();
    if args.len() < 2 {
        usage();
        std::process::exit(1);
    }

    let definitions_dir = PathBuf::from(args.remove(0));
    let name = args.remove(0);
    let discovery = args.iter().any(|a| a == "--discovery");

    let config = AggsynthConfig::load_default();
    let catalog = AggregateCatalog::load_from_dir(&definitions_dir)?;
    let definition = catalog.get(&name).ok_or_else(|| {
        anyhow::anyhow!(
            "no aggregate named '{name}' in {}",
            definitions_dir.display()
        )
    })?;

    let sql = if discovery {
        definition.pivot_values_sql(&config)?
    } else {
        definition.build_sql(&config)?
    };
    println!("{sql}");
    Ok(())
}
