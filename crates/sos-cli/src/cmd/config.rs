//! Show or change repository configuration

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;

pub fn run(key: Option<&str>, value: Option<&str>, add: bool, remove: bool) -> Result<()> {
    let mut repo = util::open_repo()?;

    let Some(key) = key else {
        let config = repo.config();
        println!("{}", "Flags".bold());
        println!("  strict   = {}", config.strict);
        println!("  compress = {}", config.compress);
        println!("  picky    = {}", config.picky);
        println!("{}", "Pattern lists".bold());
        print_list("tracked", &config.tracked);
        print_list("ignores", &config.ignores);
        print_list("ignores_whitelist", &config.ignores_whitelist);
        print_list("text_types", &config.text_types);
        print_list("binary_types", &config.binary_types);
        return Ok(());
    };

    let Some(value) = value else {
        anyhow::bail!("config {key:?} needs a value");
    };

    if add || remove {
        repo.edit_config_list(key, value, add)?;
        let verb = if add { "added to" } else { "removed from" };
        println!("{} {} {} {}", "✓".green(), value.cyan(), verb, key);
    } else {
        repo.set_config_flag(key, value)?;
        println!("{} {} = {}", "✓".green(), key, value.cyan());
    }
    Ok(())
}

fn print_list(name: &str, entries: &[String]) {
    if entries.is_empty() {
        println!("  {name} = {}", "(empty)".dimmed());
    } else {
        println!("  {name} = {}", entries.join(", "));
    }
}
