use crate::config::{Config, ConfigError, ConfigPaths};
use clap::Args;
use std::fs;
use std::path::Path;
use std::process::Command;

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Print config with secrets redacted
    #[arg(long)]
    pub print: bool,

    /// Edit a draft of the config in $RECAP_EDITOR, falling back to $VISUAL or $EDITOR
    #[arg(long)]
    pub edit: bool,

    /// Set a config value (dotted key=value)
    #[arg(long, value_name = "key=value")]
    pub set: Vec<String>,
}

pub fn run(args: &ConfigArgs, paths: &ConfigPaths) -> Result<(), ConfigError> {
    if args.edit && (!args.set.is_empty() || args.print) {
        return Err(ConfigError::Validation(
            "--edit cannot be combined with --set or --print".into(),
        ));
    }

    let mut config = Config::load_or_create(paths)?;

    if args.edit {
        edit_config(paths, |key| std::env::var(key).ok())?;
        return Ok(());
    }

    if !args.set.is_empty() {
        for assignment in &args.set {
            apply_set(&mut config, assignment)?;
        }
        config.validate()?;
        Config::write(paths, &config)?;
    }

    if args.print || args.set.is_empty() {
        let output = toml::to_string_pretty(&config.redacted())?;
        println!("{output}");
    }

    Ok(())
}

/// Editor variables checked in order.
const EDITOR_VARS: [&str; 3] = ["RECAP_EDITOR", "VISUAL", "EDITOR"];

#[derive(Debug, PartialEq)]
struct EditorCommand {
    program: String,
    args: Vec<String>,
}

/// Edits a draft copy of the config and only replaces the real file once the
/// draft parses and validates. A rejected draft stays next to the config.
fn edit_config(
    paths: &ConfigPaths,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let editor = editor_command(lookup)?;
    let draft = paths.base_dir.join("config.edit.toml");
    fs::copy(&paths.config_path, &draft)?;

    let status = Command::new(&editor.program)
        .args(&editor.args)
        .arg(&draft)
        .status()?;
    if !status.success() {
        return Err(ConfigError::Validation(format!(
            "{} exited with {status}; draft kept at {}",
            editor.program,
            draft.display()
        )));
    }

    let edited = read_draft(&draft).map_err(|err| {
        ConfigError::Validation(format!("{err}; draft kept at {}", draft.display()))
    })?;
    Config::write(paths, &edited)?;
    fs::remove_file(&draft)?;
    tracing::debug!(editor = %editor.program, "config updated from editor");
    Ok(edited)
}

fn read_draft(draft: &Path) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(&fs::read_to_string(draft)?)?;
    config.validate()?;
    Ok(config)
}

fn editor_command(lookup: impl Fn(&str) -> Option<String>) -> Result<EditorCommand, ConfigError> {
    let (var, value) = EDITOR_VARS
        .iter()
        .find_map(|var| {
            let value = lookup(var).filter(|value| !value.trim().is_empty())?;
            Some((*var, value))
        })
        .ok_or_else(|| {
            ConfigError::Validation("no editor set; use --set or set RECAP_EDITOR".into())
        })?;

    let mut words = editor_words(&value)
        .ok_or_else(|| ConfigError::Validation(format!("${var} has an unclosed quote")))?
        .into_iter();
    let program = words
        .next()
        .filter(|program| !program.is_empty())
        .ok_or_else(|| ConfigError::Validation(format!("${var} names no program")))?;
    Ok(EditorCommand {
        program,
        args: words.collect(),
    })
}

#[derive(Clone, Copy, PartialEq)]
enum Quote {
    Bare,
    Single,
    Double,
}

/// Shell-style word split; `None` when a quote is left open. Quoted empty
/// strings survive as empty words.
fn editor_words(command: &str) -> Option<Vec<String>> {
    let mut words = Vec::new();
    let mut word: Option<String> = None;
    let mut quote = Quote::Bare;
    let mut chars = command.chars();

    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (Quote::Bare, ch) if ch.is_whitespace() => words.extend(word.take()),
            (Quote::Bare, '\'' | '"') => {
                quote = if ch == '"' { Quote::Double } else { Quote::Single };
                word.get_or_insert_with(String::new);
            }
            (Quote::Single, '\'') | (Quote::Double, '"') => quote = Quote::Bare,
            (Quote::Bare | Quote::Double, '\\') => {
                if let Some(next) = chars.next() {
                    word.get_or_insert_with(String::new).push(next);
                }
            }
            (_, ch) => word.get_or_insert_with(String::new).push(ch),
        }
    }

    if quote != Quote::Bare {
        return None;
    }
    words.extend(word);
    Some(words)
}

fn apply_set(config: &mut Config, assignment: &str) -> Result<(), ConfigError> {
    let (key, value) = assignment
        .split_once('=')
        .ok_or_else(|| ConfigError::Validation("expected key=value for --set".into()))?;
    let key = key.trim();
    let value = value.trim();
    match key {
        "model.id" => config.model.id = value.to_string(),
        "model.region" => config.model.region = value.to_string(),
        "model.endpoint" => config.model.endpoint = value.to_string(),
        "model.api_key" => config.model.api_key = value.to_string(),
        "generation.temperature" => config.generation.temperature = parse_f32(value, key)?,
        "generation.top_p" => config.generation.top_p = parse_f32(value, key)?,
        "generation.max_tokens" => config.generation.max_tokens = parse_u32(value, key)?,
        "transport.timeout_secs" => config.transport.timeout_secs = parse_u32(value, key)?,
        "retry.max_retries" => config.retry.max_retries = parse_u32(value, key)?,
        "retry.base_delay_ms" => config.retry.base_delay_ms = parse_u32(value, key)?,
        "retry.max_delay_ms" => config.retry.max_delay_ms = parse_u32(value, key)?,
        "summary.use_ai" => config.summary.use_ai = parse_bool(value, key)?,
        "summary.max_key_points" => config.summary.max_key_points = parse_u32(value, key)?,
        "output.dir" => config.output.dir = value.to_string(),
        "transcript.source" => config.transcript.source = value.to_string(),
        "transcript.dir" => config.transcript.dir = value.to_string(),
        "transcript.languages" => config.transcript.languages = parse_list(value),
        _ => {
            return Err(ConfigError::Validation(format!(
                "unknown config key: {key}"
            )));
        }
    }
    Ok(())
}

pub fn parse_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigError::Validation(format!(
            "{key} expects true or false"
        ))),
    }
}

fn parse_u32(value: &str, key: &str) -> Result<u32, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Validation(format!("{key} expects an unsigned integer")))
}

fn parse_f32(value: &str, key: &str) -> Result<f32, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Validation(format!("{key} expects a number")))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{EditorCommand, apply_set, edit_config, editor_command, editor_words};
    use crate::config::{Config, ConfigError, ConfigPaths};
    use std::collections::HashMap;
    use std::fs;

    fn words(command: &str) -> Vec<String> {
        editor_words(command).unwrap()
    }

    #[test]
    fn editor_words_follow_shell_quoting() {
        assert_eq!(words("code --wait"), vec!["code", "--wait"]);
        assert_eq!(
            words("\"/Applications/VS Code\" --wait"),
            vec!["/Applications/VS Code", "--wait"]
        );
        assert_eq!(words(r#"vim\ x 'a\b' """#), vec!["vim x", r"a\b", ""]);
        assert!(editor_words("\"unterminated").is_none());
    }

    #[test]
    fn editor_command_prefers_recap_editor() {
        let env = HashMap::from([
            ("RECAP_EDITOR", "hx"),
            ("VISUAL", "code --wait"),
            ("EDITOR", "vi"),
        ]);
        let lookup = |key: &str| env.get(key).map(|value| value.to_string());
        assert_eq!(editor_command(lookup).unwrap().program, "hx");

        let visual = |key: &str| lookup(key).filter(|_| key != "RECAP_EDITOR");
        assert_eq!(
            editor_command(visual).unwrap(),
            EditorCommand {
                program: "code".into(),
                args: vec!["--wait".into()],
            }
        );
    }

    #[test]
    fn editor_command_reports_missing_or_blank_editor() {
        let err = editor_command(|_| None).unwrap_err();
        assert!(err.to_string().contains("no editor set"));

        let blank = |key: &str| match key {
            "VISUAL" => Some("   ".to_string()),
            "EDITOR" => Some("\"\"".to_string()),
            _ => None,
        };
        let err = editor_command(blank).unwrap_err();
        assert!(err.to_string().contains("$EDITOR names no program"));

        let open = |key: &str| (key == "VISUAL").then(|| "'vim".to_string());
        let err = editor_command(open).unwrap_err();
        assert!(err.to_string().contains("$VISUAL has an unclosed quote"));
    }

    #[cfg(unix)]
    fn edit_with(script: &str) -> (tempfile::TempDir, ConfigPaths, Result<Config, ConfigError>) {
        let temp = tempfile::tempdir().unwrap();
        let paths = ConfigPaths::from_base(temp.path().join("recap"));
        Config::load_or_create(&paths).unwrap();
        let editor = format!("sh -c '{script}'");
        let lookup = |key: &str| (key == "RECAP_EDITOR").then(|| editor.clone());
        let result = edit_config(&paths, lookup);
        (temp, paths, result)
    }

    #[cfg(unix)]
    #[test]
    fn edit_replaces_config_after_validating_draft() {
        let script = r#"printf "[model]\nid = \"meta.llama3-8b-instruct-v1:0\"\n" > "$0""#;
        let (_temp, paths, result) = edit_with(script);

        assert_eq!(result.unwrap().model.id, "meta.llama3-8b-instruct-v1:0");
        let saved = Config::load(&paths).unwrap();
        assert_eq!(saved.model.id, "meta.llama3-8b-instruct-v1:0");
        assert!(!paths.base_dir.join("config.edit.toml").exists());
    }

    #[cfg(unix)]
    #[test]
    fn rejected_edit_keeps_config_and_draft() {
        let script = r#"printf "[generation]\ntemperature = 5.0\n" > "$0""#;
        let (_temp, paths, result) = edit_with(script);

        let err = result.unwrap_err();
        assert!(err.to_string().contains("generation.temperature"));
        assert!(err.to_string().contains("draft kept at"));
        assert!(paths.base_dir.join("config.edit.toml").exists());
        let saved = Config::load(&paths).unwrap();
        assert_eq!(saved.generation.temperature, 0.7);
    }

    #[cfg(unix)]
    #[test]
    fn failing_editor_leaves_config_alone() {
        let (_temp, paths, result) = edit_with("exit 3");

        assert!(result.unwrap_err().to_string().contains("sh exited with"));
        let saved = Config::load(&paths).unwrap();
        assert_eq!(saved.model.id, "amazon.nova-lite-v1:0");
        let draft = fs::read_to_string(paths.base_dir.join("config.edit.toml")).unwrap();
        assert!(draft.contains("amazon.nova-lite-v1:0"));
    }

    #[test]
    fn apply_set_updates_known_keys() {
        let mut config = Config::default();
        apply_set(&mut config, "model.id=meta.llama3-8b-instruct-v1:0").unwrap();
        apply_set(&mut config, "summary.use_ai=false").unwrap();
        apply_set(&mut config, "generation.temperature = 0.2").unwrap();
        apply_set(&mut config, "transcript.languages=de, en ,").unwrap();
        apply_set(&mut config, "transcript.source=files").unwrap();

        assert_eq!(config.model.id, "meta.llama3-8b-instruct-v1:0");
        assert!(!config.summary.use_ai);
        assert_eq!(config.generation.temperature, 0.2);
        assert_eq!(config.transcript.languages, vec!["de", "en"]);
        assert_eq!(config.transcript.source, "files");
    }

    #[test]
    fn apply_set_rejects_bad_input() {
        let mut config = Config::default();
        assert!(apply_set(&mut config, "model.id").is_err());
        assert!(apply_set(&mut config, "summary.use_ai=yes").is_err());
        assert!(apply_set(&mut config, "retry.max_retries=-1").is_err());
        let err = apply_set(&mut config, "ui.theme=dark").unwrap_err();
        assert!(err.to_string().contains("unknown config key"));
    }
}
