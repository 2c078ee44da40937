//! Inspect the routing tree built from a configuration file.

use std::path::PathBuf;

use axum::http::Method;
use clap::Parser;

use radix_router::config::load_config;
use radix_router::http::Router;

#[derive(Parser)]
#[command(name = "route-inspect")]
#[command(about = "Print the routing tree of a configuration and resolve lookups", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Request method for --path lookups.
    #[arg(short, long, default_value = "GET")]
    method: String,

    /// Paths to resolve against the tree.
    #[arg(short, long)]
    path: Vec<String>,

    /// Skip the tree dump.
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let router = Router::from_config(&config)?;

    if !cli.quiet {
        println!("{} routes", router.tree().route_count());
        print!("{}", router.tree());
    }

    let method = Method::from_bytes(cli.method.to_ascii_uppercase().as_bytes())?;
    for path in &cli.path {
        let lookup = router.lookup(&method, path);
        match lookup.handler {
            Some(_) => {
                let params: Vec<String> = lookup
                    .params
                    .iter()
                    .map(|(name, value)| format!("{name}={value}"))
                    .collect();
                println!("{method} {path} -> matched [{}]", params.join(", "));
            }
            None if lookup.tsr => println!("{method} {path} -> no match, trailing slash redirect"),
            None => {
                let allowed: Vec<&str> = lookup.allowed_methods().map(Method::as_str).collect();
                if allowed.is_empty() {
                    println!("{method} {path} -> no match");
                } else {
                    println!("{method} {path} -> method not allowed, allow: {}", allowed.join(", "));
                }
            }
        }
    }
    Ok(())
}
