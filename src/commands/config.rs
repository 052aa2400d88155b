use anyhow::Result;

use crate::Context;
use crate::config::config_dir;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let settings = ctx.settings()?;
    let controller = settings.controller_options()?;
    let execute = settings.execute_options();

    ui::header("Settings");
    let source = match &ctx.config {
        Some(path) => path.display().to_string(),
        None => config_dir()?.join("config.toml").display().to_string(),
    };
    ui::kv("Settings file", &source);
    ui::kv("State file", &settings.state_file().display().to_string());
    ui::kv("Jobs", &execute.jobs.to_string());
    let order = match controller.replace_order {
        converge::ReplaceOrder::DestroyBeforeCreate => "destroy-before-create",
        converge::ReplaceOrder::CreateBeforeDestroy => "create-before-destroy",
    };
    ui::kv("Replace order", order);
    ui::dim(
        "Jobs and replace order apply to orchestrators embedding converge; \
         gatecfg makes no remote calls",
    );

    ui::section("Force refresh");
    if controller.force_refresh.is_empty() {
        ui::dim("None; preserve-class attributes keep the recorded value");
    } else {
        for (kind, attribute) in controller.force_refresh.iter() {
            println!("  {kind}.{attribute}");
        }
    }
    Ok(())
}
