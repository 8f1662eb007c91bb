use std::collections::BTreeSet;

use colored::Colorize;
use dialoguer::{Input, Select};

use crate::error::{BudgetError, Result};
use crate::prompt::{parse_tags, Choice, Prompter, Reply};

fn prompt_error(e: dialoguer::Error) -> BudgetError {
    BudgetError::Other(format!("prompt failed: {e}"))
}

/// Map the shared back/quit shortcuts, otherwise hand the text through.
fn text_reply(input: String) -> Reply<String> {
    match input.trim().to_lowercase().as_str() {
        "b" => Reply::Back,
        "q" => Reply::Quit,
        _ => Reply::Value(input),
    }
}

/// Terminal prompts built on dialoguer.
#[derive(Default)]
pub struct ConsolePrompter;

impl ConsolePrompter {
    pub fn new() -> Self {
        Self
    }

    fn read_line(&self, prompt: &str) -> Result<String> {
        Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map_err(prompt_error)
    }
}

impl Prompter for ConsolePrompter {
    fn prompt_category(&mut self, description: &str) -> Result<Reply<String>> {
        println!("{}", "\u{2500}".repeat(60));
        println!("  {}", description.bold());
        let input = self.read_line("Category (Enter=none, b=back, q=quit)")?;
        Ok(text_reply(input))
    }

    fn prompt_choice<T: Clone>(&mut self, prompt: &str, options: &[Choice<T>]) -> Result<Reply<T>> {
        let mut items: Vec<String> = options
            .iter()
            .map(|o| format!("{} ({})", o.label, o.key))
            .collect();
        items.push("\u{2190} Back".to_string());
        items.push("Quit".to_string());

        let idx = Select::new()
            .with_prompt(prompt)
            .items(&items)
            .default(0)
            .interact()
            .map_err(prompt_error)?;
        Ok(match options.get(idx) {
            Some(option) => Reply::Value(option.value.clone()),
            None if idx == options.len() => Reply::Back,
            None => Reply::Quit,
        })
    }

    fn prompt_tags(&mut self, description: &str) -> Result<Reply<BTreeSet<String>>> {
        let input = self.read_line(&format!("Tags for {description} (comma-separated, b=back, q=quit)"))?;
        Ok(match text_reply(input) {
            Reply::Value(text) => Reply::Value(parse_tags(&text)),
            Reply::Back => Reply::Back,
            Reply::Quit => Reply::Quit,
        })
    }
}
