use once_cell::sync::Lazy;
use rustyline::history::FileHistory;
use rustyline::{CompletionType, Config as RustylineConfig, EditMode, Editor};

pub type ReplEditor = Editor<(), FileHistory>;

static HISTORY_PATH: Lazy<String> = Lazy::new(|| {
    let home_dir = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.analyst.history", home_dir)
});

pub fn create_editor() -> rustyline::Result<ReplEditor> {
    log::debug!("Creating rustyline editor configuration");
    let config = RustylineConfig::builder()
        .completion_type(CompletionType::List)
        .edit_mode(EditMode::Emacs)
        .build();

    let mut rl: ReplEditor = Editor::with_config(config)?;

    if rl.load_history(&**HISTORY_PATH).is_err() {
        log::debug!("No previous history file found");
    } else {
        log::debug!("History loaded successfully");
    }

    Ok(rl)
}

pub fn save_history(rl: &mut ReplEditor) -> rustyline::Result<()> {
    rl.save_history(&**HISTORY_PATH)
}
