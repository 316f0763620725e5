//! The process-wide language→command table.
//!
//! Built once from defaults, `EGG_CMD_<LANG>` environment overrides and any
//! host-supplied mappings, before a pipeline runs; read-only afterwards. An
//! override value is a space-separated command vector, and an unknown
//! `<LANG>` suffix registers a new language.

use std::collections::BTreeMap;

pub const ENV_CMD_PREFIX: &str = "EGG_CMD_";

/// Immutable mapping from lowercase language name to command vector.
#[derive(Debug, Clone)]
pub struct LanguageTable {
    commands: BTreeMap<String, Vec<String>>,
}

impl LanguageTable {
    /// Built-in commands: `python`, `r`, `bash`.
    pub fn defaults() -> Self {
        let mut commands = BTreeMap::new();
        commands.insert("python".to_string(), vec!["python3".to_string()]);
        commands.insert("r".to_string(), vec!["Rscript".to_string()]);
        commands.insert("bash".to_string(), vec!["bash".to_string()]);
        Self { commands }
    }

    /// Defaults plus `EGG_CMD_<LANG>` overrides and additions.
    pub fn from_env() -> Self {
        let mut table = Self::defaults();
        for (key, value) in std::env::vars() {
            let Some(lang) = key.strip_prefix(ENV_CMD_PREFIX) else {
                continue;
            };
            let command: Vec<String> = value.split_whitespace().map(str::to_string).collect();
            if lang.is_empty() || command.is_empty() {
                continue;
            }
            table.commands.insert(lang.to_lowercase(), command);
        }
        table
    }

    /// Apply host-supplied mappings over the current table.
    pub fn with_commands<I>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        for (lang, command) in extra {
            if !command.is_empty() {
                self.commands.insert(lang.to_lowercase(), command);
            }
        }
        self
    }

    /// Command vector for `language` (case-insensitive).
    pub fn command(&self, language: &str) -> Option<&[String]> {
        self.commands
            .get(&language.to_lowercase())
            .map(Vec::as_slice)
    }

    /// All registered languages with their commands, sorted by language.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.commands
            .iter()
            .map(|(lang, cmd)| (lang.as_str(), cmd.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_known_languages() {
        let table = LanguageTable::defaults();
        assert_eq!(table.command("python"), Some(&["python3".to_string()][..]));
        assert_eq!(table.command("r"), Some(&["Rscript".to_string()][..]));
        assert_eq!(table.command("bash"), Some(&["bash".to_string()][..]));
        assert_eq!(table.command("cobol"), None);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let table = LanguageTable::defaults();
        assert_eq!(table.command("Python"), table.command("python"));
    }

    #[test]
    fn env_override_replaces_and_adds() {
        std::env::set_var("EGG_CMD_PYTHON", "/custom/python -u");
        std::env::set_var("EGG_CMD_ZSH", "zsh");
        let table = LanguageTable::from_env();
        std::env::remove_var("EGG_CMD_PYTHON");
        std::env::remove_var("EGG_CMD_ZSH");

        assert_eq!(
            table.command("python"),
            Some(&["/custom/python".to_string(), "-u".to_string()][..])
        );
        assert_eq!(table.command("zsh"), Some(&["zsh".to_string()][..]));
    }

    #[test]
    fn host_mappings_extend_the_table() {
        let table = LanguageTable::defaults()
            .with_commands([("Lua".to_string(), vec!["lua5.4".to_string()])]);
        assert_eq!(table.command("lua"), Some(&["lua5.4".to_string()][..]));
    }
}
