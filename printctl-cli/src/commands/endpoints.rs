//! Print the compiled endpoint tables.

use clap::Args;
use printctl::device::MODEL_S3;
use printctl::endpoint::{compile_model, LimitSpec, BUNDLED_DESCRIPTOR};

use crate::error::CliError;

#[derive(Debug, Args)]
pub struct EndpointsArgs {
    /// Printer model in the bundled endpoint descriptor
    #[arg(long, default_value = MODEL_S3)]
    pub model: String,

    /// Base URL the descriptor is compiled against
    #[arg(long, default_value = "http://printer")]
    pub base: String,

    /// Only show this category
    #[arg(long)]
    pub category: Option<String>,
}

pub fn run(args: EndpointsArgs) -> Result<(), CliError> {
    let tables = compile_model(BUNDLED_DESCRIPTOR, &args.model, &args.base)?;

    let mut categories: Vec<_> = tables
        .routes
        .categories()
        .filter(|(name, _)| args.category.as_deref().map_or(true, |c| c == name.as_str()))
        .collect();
    categories.sort_by(|a, b| a.0.cmp(b.0));

    for (category, routes) in categories {
        println!("[{}]", category);
        let mut labels: Vec<_> = routes.iter().collect();
        labels.sort();
        for (label, url) in labels {
            match tables.limits.limit(category, label) {
                Some(limit) => println!("  {:<10} {}  {}", label, url, format_limit(limit)),
                None => println!("  {:<10} {}", label, url),
            }
        }
    }
    Ok(())
}

fn format_limit(limit: &LimitSpec) -> String {
    match limit {
        LimitSpec::Range { min, max } => format!("[{} .. {}]", min, max),
        LimitSpec::Choices(choices) => {
            let choices: Vec<String> = choices.iter().map(|c| c.to_string()).collect();
            format!("{{{}}}", choices.join(", "))
        }
    }
}
