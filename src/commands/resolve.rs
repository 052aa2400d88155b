use anyhow::Result;
use converge::registry;

use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, kind: &str, token: &str) -> Result<()> {
    let identity = converge::resolve(token, kind)?;

    if ctx.quiet {
        println!("{}", registry().require(kind)?.token(&identity));
        return Ok(());
    }

    ui::header(&format!("{kind} {token}"));
    if let Some(parent) = &identity.parent {
        ui::kv("parent", parent);
    }
    ui::kv("id", &identity.id);
    Ok(())
}
