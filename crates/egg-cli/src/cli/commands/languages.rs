use anyhow::Result;

use egg_core::lang::LanguageTable;

pub fn run() -> Result<()> {
    let table = LanguageTable::from_env();
    for (language, command) in table.iter() {
        println!("{language}: {}", command.join(" "));
    }
    Ok(())
}
