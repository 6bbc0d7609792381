//! Delete confirmation read from the same stdin line stream as commands.

use std::sync::Arc;

use async_trait::async_trait;
use client_core::ConfirmationGate;
use tokio::sync::{mpsc, Mutex};

pub type SharedLines = Arc<Mutex<mpsc::Receiver<String>>>;

pub struct PromptGate {
    lines: SharedLines,
}

impl PromptGate {
    pub fn new(lines: SharedLines) -> Self {
        Self { lines }
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[async_trait]
impl ConfirmationGate for PromptGate {
    async fn confirm(&self, prompt: &str) -> bool {
        println!("{prompt} [y/N]");
        let answer = self.lines.lock().await.recv().await;
        answer.as_deref().is_some_and(is_affirmative)
    }
}
