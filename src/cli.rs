//! Command-line interface and REPL
//!
//! Lines are read on a dedicated thread (rustyline blocks) and handed to the
//! async main loop as parsed `ReplCommand`s.

use anyhow::Result;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;
use tracing::debug;

use crate::actions::{parse_option_tokens, Options};
use crate::catalog;
use crate::drivers::{Driver, MagicQDriver};
use crate::error::GatewayError;
use crate::host::VariableTable;

/// One parsed REPL line
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    /// `<action> key=value ...`
    Action { name: String, options: Options },
    /// `fb <feedback> key=value ...`
    Feedback { name: String, options: Options },
    /// `vars`
    Variables,
    /// `actions`
    Actions,
    Help,
    Quit,
}

/// Parse one line; blank lines yield None
pub fn parse_line(line: &str) -> Result<Option<ReplCommand>, GatewayError> {
    let mut tokens = line.split_whitespace();
    let Some(head) = tokens.next() else {
        return Ok(None);
    };

    let command = match head {
        "quit" | "exit" => ReplCommand::Quit,
        "help" | "?" => ReplCommand::Help,
        "vars" => ReplCommand::Variables,
        "actions" => ReplCommand::Actions,
        "fb" => {
            let name = tokens
                .next()
                .ok_or_else(|| GatewayError::malformed("fb", "usage: fb <feedback> key=value ..."))?;
            ReplCommand::Feedback {
                name: name.to_string(),
                options: parse_option_tokens(tokens)?,
            }
        }
        action => ReplCommand::Action {
            name: action.to_string(),
            options: parse_option_tokens(tokens)?,
        },
    };
    Ok(Some(command))
}

/// Start the line reader; it ends with a `Quit` on Ctrl+C / Ctrl+D
pub fn spawn_repl(tx: mpsc::UnboundedSender<ReplCommand>) -> Result<std::thread::JoinHandle<()>> {
    let mut rl = DefaultEditor::new()?;

    let handle = std::thread::Builder::new()
        .name("repl".to_string())
        .spawn(move || loop {
            match rl.readline("magicq> ") {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = rl.add_history_entry(line.as_str());
                    }
                    match parse_line(&line) {
                        Ok(Some(command)) => {
                            let quit = command == ReplCommand::Quit;
                            if tx.send(command).is_err() || quit {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => println!("{} {}", "error:".red(), e),
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    let _ = tx.send(ReplCommand::Quit);
                    break;
                }
                Err(e) => {
                    println!("{} {}", "readline error:".red(), e);
                    let _ = tx.send(ReplCommand::Quit);
                    break;
                }
            }
        })?;

    Ok(handle)
}

fn print_help() {
    println!("{}", "Commands:".bold());
    println!("  {}   run an action, e.g. {}", "<action> key=value ...".cyan(), "pb pbId=3 pbVal=75".yellow());
    println!("  {}   evaluate a feedback, e.g. {}", "fb <feedback> key=value ...".cyan(), "fb execLevel page=1 nr=2".yellow());
    println!("  {}                        list actions and their options", "actions".cyan());
    println!("  {}                           show variables", "vars".cyan());
    println!("  {}                           leave", "quit".cyan());
}

fn print_actions() {
    for action in catalog::action_definitions() {
        let options = action
            .options
            .iter()
            .map(|o| {
                if o.required {
                    o.id.to_string()
                } else {
                    format!("[{}={}]", o.id, o.default.unwrap_or(""))
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        println!("  {:14} {}  {}", action.id.cyan(), options, action.name.dimmed());
    }
    println!("{}", "Feedbacks (use with fb):".bold());
    for feedback in catalog::feedback_definitions() {
        let options = feedback.options.iter().map(|o| o.id).collect::<Vec<_>>().join(" ");
        println!("  {:14} {}  {}", feedback.id.cyan(), options, feedback.name.dimmed());
    }
}

fn print_variables(host: &VariableTable) {
    let values = host.values();
    for def in host.definitions() {
        let value = values
            .get(&def.variable_id)
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("  {:12} {:>5}  {}", def.variable_id.cyan(), value, def.name.dimmed());
    }
}

/// Run one command; returns false when the REPL should stop
pub async fn handle_command(command: ReplCommand, driver: &MagicQDriver, host: &VariableTable) -> bool {
    debug!(?command, "REPL command");
    match command {
        ReplCommand::Quit => return false,
        ReplCommand::Help => print_help(),
        ReplCommand::Actions => print_actions(),
        ReplCommand::Variables => print_variables(host),
        ReplCommand::Action { name, options } => match driver.execute(&name, &options).await {
            Ok(()) => println!("{} {}", "sent".green(), name),
            Err(e) => println!("{} {}", "error:".red(), e),
        },
        ReplCommand::Feedback { name, options } => {
            match driver.evaluate_feedback(&name, &options).await {
                Ok(active) => {
                    let label = if active { "true".green() } else { "false".red() };
                    println!("{} {}", name, label);
                }
                Err(e) => println!("{} {}", "error:".red(), e),
            }
        }
    }
    true
}
