use anyhow::{Context as _, Result};
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::{Hinter, HistoryHinter};
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{
    Cmd, CompletionType, Config as EditorConfig, Context, Editor, EventHandler, Helper, KeyCode,
    KeyEvent, Modifiers,
};
use std::borrow::Cow::{self, Borrowed, Owned};
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::Config;
use crate::repl::{InputSource, SHELL_COMMANDS};

pub const PROMPT: &str = "deep-chat> ";
const MAX_COMPLETIONS: usize = 64;

/// Completion, inline history suggestions and prompt styling.
pub struct ChatHelper {
    words: BTreeSet<String>,
    hinter: HistoryHinter,
}

impl ChatHelper {
    pub fn new(words: impl IntoIterator<Item = String>) -> Self {
        Self {
            words: words.into_iter().collect(),
            hinter: HistoryHinter::new(),
        }
    }
}

impl Helper for ChatHelper {}

impl Completer for ChatHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (start, matches) = complete_word(&self.words, line, pos);
        let candidates = matches
            .into_iter()
            .map(|word| Pair {
                display: word.to_string(),
                replacement: word.to_string(),
            })
            .collect();
        Ok((start, candidates))
    }
}

impl Hinter for ChatHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, ctx: &Context<'_>) -> Option<String> {
        self.hinter.hint(line, pos, ctx)
    }
}

impl Highlighter for ChatHelper {
    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(
        &'s self,
        prompt: &'p str,
        _default: bool,
    ) -> Cow<'b, str> {
        Owned(prompt.blue().bold().to_string())
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Owned(hint.bright_black().to_string())
    }

    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        Borrowed(line)
    }
}

impl Validator for ChatHelper {}

/// Finds dictionary words extending the word under the cursor.
///
/// Returns the byte offset where the word starts and the matches in
/// lexical order.
fn complete_word<'w>(words: &'w BTreeSet<String>, line: &str, pos: usize) -> (usize, Vec<&'w str>) {
    let head = &line[..pos];
    let start = head
        .char_indices()
        .rev()
        .find(|(_, ch)| ch.is_whitespace())
        .map(|(idx, ch)| idx + ch.len_utf8())
        .unwrap_or(0);
    let prefix = &head[start..];
    if prefix.is_empty() {
        return (start, Vec::new());
    }

    let matches = words
        .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
        .take_while(|word| word.starts_with(prefix))
        .filter(|word| word.len() > prefix.len())
        .take(MAX_COMPLETIONS)
        .map(String::as_str)
        .collect();
    (start, matches)
}

/// Reads a whitespace-separated dictionary file.
pub fn load_words(path: &Path) -> std::io::Result<Vec<String>> {
    let contents = fs::read_to_string(path)?;
    Ok(contents.split_whitespace().map(str::to_string).collect())
}

/// Creates the history file and its parent directories if absent.
pub fn ensure_history_file(path: &Path) -> std::io::Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    OpenOptions::new().create(true).append(true).open(path)?;
    Ok(())
}

fn completion_words(cfg: &Config) -> Vec<String> {
    let mut words: Vec<String> = SHELL_COMMANDS.iter().map(|cmd| cmd.to_string()).collect();
    words.push("quit".to_string());

    if let Some(path) = &cfg.words_file {
        match load_words(path) {
            Ok(loaded) => {
                debug!(path = %path.display(), word_count = loaded.len(), "loaded completion words");
                words.extend(loaded);
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to load completion words");
            }
        }
    }

    words
}

/// Multi-line terminal input backed by rustyline with a persistent history.
///
/// Enter inserts a newline; Esc+Enter (Alt+Enter) sends the block.
pub struct LineEditor {
    editor: Editor<ChatHelper, DefaultHistory>,
    history_file: PathBuf,
}

impl LineEditor {
    pub fn new(cfg: &Config) -> Result<Self> {
        ensure_history_file(&cfg.history_file).with_context(|| {
            format!(
                "Failed to create history file at '{}'",
                cfg.history_file.display()
            )
        })?;

        let editor_config = EditorConfig::builder()
            .auto_add_history(true)
            .history_ignore_dups(true)
            .context("Failed to configure line editor history")?
            .completion_type(CompletionType::List)
            .build();
        let mut editor = Editor::with_config(editor_config)
            .context("Failed to initialize line editor")?;
        editor.set_helper(Some(ChatHelper::new(completion_words(cfg))));
        editor.bind_sequence(
            KeyEvent(KeyCode::Enter, Modifiers::NONE),
            EventHandler::Simple(Cmd::Newline),
        );
        editor.bind_sequence(
            KeyEvent(KeyCode::Enter, Modifiers::ALT),
            EventHandler::Simple(Cmd::AcceptLine),
        );

        if let Err(err) = editor.load_history(&cfg.history_file) {
            warn!(
                path = %cfg.history_file.display(),
                error = %err,
                "failed to load input history"
            );
        }

        Ok(Self {
            editor,
            history_file: cfg.history_file.clone(),
        })
    }
}

impl InputSource for LineEditor {
    fn read_block(&mut self) -> Result<Option<String>> {
        loop {
            match self.editor.readline(PROMPT) {
                Ok(block) => {
                    if let Err(err) = self.editor.save_history(&self.history_file) {
                        warn!(
                            path = %self.history_file.display(),
                            error = %err,
                            "failed to save input history"
                        );
                    }
                    return Ok(Some(block));
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => return Ok(None),
                Err(ReadlineError::Io(err)) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err).context("Failed to read input"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::{complete_word, ensure_history_file, load_words};

    fn words(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn completes_the_word_under_the_cursor() {
        let dict = words(&["apple", "application", "apply", "banana"]);

        let (start, matches) = complete_word(&dict, "I like appl", 11);
        assert_eq!(start, 7);
        assert_eq!(matches, ["apple", "application", "apply"]);
    }

    #[test]
    fn completion_uses_text_before_the_cursor_only() {
        let dict = words(&["banana", "band"]);

        let (start, matches) = complete_word(&dict, "ban trailing", 3);
        assert_eq!(start, 0);
        assert_eq!(matches, ["banana", "band"]);
    }

    #[test]
    fn no_completions_after_whitespace_or_for_exact_words() {
        let dict = words(&["apple"]);

        assert!(complete_word(&dict, "apple ", 6).1.is_empty());
        assert!(complete_word(&dict, "apple", 5).1.is_empty());
    }

    #[test]
    fn completion_handles_multibyte_prefixes_and_newlines() {
        let dict = words(&["café", "cafés"]);

        let line = "first line\ncaf";
        let (start, matches) = complete_word(&dict, line, line.len());
        assert_eq!(start, 11);
        assert_eq!(matches, ["café", "cafés"]);
    }

    #[test]
    fn load_words_splits_on_any_whitespace() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("words.txt");
        std::fs::write(&path, "alpha beta\ngamma\r\n\tdelta\n").expect("write words");

        let loaded = load_words(&path).expect("words should load");
        assert_eq!(loaded, ["alpha", "beta", "gamma", "delta"]);
    }

    #[test]
    fn ensure_history_file_creates_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("cache").join("deep-chat").join("history");

        ensure_history_file(&path).expect("history file should be created");
        assert!(path.is_file());

        std::fs::write(&path, "kept\n").expect("write history");
        ensure_history_file(&path).expect("existing file should be accepted");
        assert_eq!(
            std::fs::read_to_string(&path).expect("read history"),
            "kept\n"
        );
    }
}
