//! The chat screen's event loop.

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use crate::session::ChatSession;
use crate::tui::{self, AppEvent, EventHandler, Tui};
use crate::ui::conversation::{ChatAction, ChatManager};

/// Run the terminal chat until the user exits. `backend` labels the header.
pub async fn run_chat(session: ChatSession, backend: String) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = event_loop(&mut terminal, session, backend).await;

    tui::restore().context("Failed to restore terminal")?;
    result
}

async fn event_loop(terminal: &mut Tui, session: ChatSession, backend: String) -> Result<()> {
    let (results_tx, mut results_rx) = mpsc::unbounded_channel();
    let mut manager = ChatManager::new(session, backend, results_tx);
    let mut events = EventHandler::new();

    tracing::info!(session = %manager.session().id(), "chat started");

    loop {
        terminal
            .draw(|frame| frame.render_widget(&manager, frame.size()))
            .context("Failed to draw frame")?;

        tokio::select! {
            event = events.next() => match event {
                Some(AppEvent::Key(key)) => {
                    if manager.handle_key(key) == ChatAction::Exit {
                        break;
                    }
                }
                Some(AppEvent::Paste(text)) => manager.handle_paste(&text),
                Some(AppEvent::Tick) => manager.on_tick(),
                Some(AppEvent::Resize(..)) => {}
                None => break,
            },
            Some(result) = results_rx.recv() => manager.complete(result),
        }
    }

    tracing::info!(
        session = %manager.session().id(),
        turns = manager.session().transcript().len(),
        "chat closed"
    );
    Ok(())
}
