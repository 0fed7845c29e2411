//! OSC sniffer for debugging console feedback
//!
//! Listens on the feedback port and prints every inbound message, marking
//! which status grammar (if any) it matched.

use anyhow::{Context, Result};
use chrono::Local;
use colored::*;
use rosc::{OscMessage, OscType};
use tokio::sync::mpsc;

use crate::config::ConsoleConfig;
use crate::decoder;
use crate::transport::{OscTransport, TransportEvent};

/// Render OSC arguments compactly: `i:75 f:0.500 s:"text"`
pub fn format_args(args: &[OscType]) -> String {
    args.iter()
        .map(|arg| match arg {
            OscType::Int(v) => format!("i:{}", v),
            OscType::Long(v) => format!("h:{}", v),
            OscType::Float(v) => format!("f:{:.3}", v),
            OscType::Double(v) => format!("d:{:.3}", v),
            OscType::Bool(v) => format!("b:{}", v),
            OscType::String(s) => format!("s:{:?}", s),
            OscType::Blob(b) => format!("blob[{}]", b.len()),
            other => format!("{:?}", other),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Grammar label for a message: the matching grammar name or "untracked"
pub fn describe(message: &OscMessage) -> &'static str {
    decoder::classify(&message.addr).unwrap_or("untracked")
}

fn print_message(message: &OscMessage) {
    let timestamp = Local::now().format("%H:%M:%S%.3f").to_string();
    let grammar = describe(message);
    let grammar = if grammar == "untracked" {
        grammar.bright_black()
    } else {
        grammar.bright_green()
    };

    let decoded = match decoder::decode(&message.addr, &message.args) {
        Some(status) => format!(" => {:?}", status).bright_blue(),
        None => String::new().normal(),
    };

    println!(
        "[{}] {:28} {:24} | {}{}",
        timestamp.dimmed(),
        message.addr.white(),
        format_args(&message.args).yellow(),
        grammar,
        decoded
    );
}

/// CLI OSC sniffer; runs until Ctrl+C
pub async fn run_cli_sniffer(config: &ConsoleConfig) -> Result<()> {
    println!("{}", "=== MagicQ OSC Sniffer ===".bold().cyan());
    println!("Press Ctrl+C to exit\n");

    let listen = ConsoleConfig {
        enable_feedback: true,
        ..config.clone()
    };
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let transport = OscTransport::open(&listen, event_tx)
        .await
        .with_context(|| format!("Failed to listen on UDP port {}", listen.rx_port))?;

    println!(
        "{} {}",
        "Listening on".green(),
        transport.local_addr().to_string().bright_white()
    );
    if listen.forward_osc {
        println!("Forwarding raw datagrams to 127.0.0.1:{}", listen.forward_port);
    }
    println!(
        "{}",
        "Format: [time] ADDRESS ARGS | GRAMMAR => DECODED".dimmed()
    );
    println!("{}\n", "─".repeat(80).dimmed());

    loop {
        tokio::select! {
            event = event_rx.recv() => match event {
                Some(TransportEvent::Message(message)) => print_message(&message),
                Some(TransportEvent::Error(reason)) => {
                    println!("{} {}", "receive error:".red(), reason);
                }
                Some(TransportEvent::Ready { .. }) => {}
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    transport.close().await;
    println!("\n{}", "Sniffer stopped".yellow());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(addr: &str, args: Vec<OscType>) -> OscMessage {
        OscMessage { addr: addr.to_string(), args }
    }

    #[test]
    fn test_format_args() {
        let args = vec![
            OscType::Int(75),
            OscType::Float(0.5),
            OscType::String("go".into()),
            OscType::Bool(true),
        ];
        assert_eq!(format_args(&args), r#"i:75 f:0.500 s:"go" b:true"#);
        assert_eq!(format_args(&[]), "");
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(&msg("/pb/3", vec![])), "playback-level");
        assert_eq!(describe(&msg("/pb/3/flash", vec![])), "playback-flash");
        assert_eq!(describe(&msg("/exec/1/2", vec![])), "execute-level");
        assert_eq!(describe(&msg("/rpc", vec![])), "untracked");
    }
}
