//! `nuage resolvers` - list the resolver templates of a GraphQL type

use anyhow::Result;
use colored::Colorize;

use crate::Context;
use crate::config::NuageConfig;
use crate::resolvers;
use crate::ui;

pub fn run(ctx: &Context, type_name: &str) -> Result<()> {
    let config = NuageConfig::load(ctx.config.as_deref())?.with_stack(ctx.stack.as_deref())?;
    let dir = config.resolvers_dir();
    let templates = resolvers::scan(&dir, type_name)?;

    ui::header(&format!("Resolvers for {type_name}"));
    ui::kv("Directory", &dir.display().to_string());
    println!();

    if templates.is_empty() {
        ui::warn(&format!("No templates match {type_name}"));
        return Ok(());
    }

    for template in &templates {
        println!(
            "  {} {}.{}",
            "•".cyan(),
            template.operation_type.dimmed(),
            template.operation_name.bold()
        );
        if ctx.verbose > 0 {
            ui::dim(&format!(
                "{} ({} bytes)",
                template.request_path.display(),
                template.request.len()
            ));
            ui::dim(&format!(
                "{} ({} bytes)",
                template.response_path.display(),
                template.response.len()
            ));
        }
    }

    println!();
    ui::dim(&ui::plural(templates.len(), "resolver"));
    Ok(())
}
