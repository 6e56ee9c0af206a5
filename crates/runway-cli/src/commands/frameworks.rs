use std::path::Path;

use runway_core::FrameworkRegistry;

pub fn frameworks_list(registry: &FrameworkRegistry) {
    for name in registry.names() {
        println!("{name}");
    }
}

/// Open `name` at `root` and print the commands it exposes.
pub fn frameworks_commands(
    registry: &FrameworkRegistry,
    name: &str,
    root: &Path,
) -> anyhow::Result<()> {
    let framework = registry.open(name, root)?;
    let commands = framework.list_commands()?;

    if commands.is_empty() {
        println!("{} exposes no commands", framework.name());
        return Ok(());
    }
    for command in commands {
        println!("{command}");
    }
    Ok(())
}
