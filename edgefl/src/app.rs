//! Console front end: a status line plus a START trigger read from stdin.
//! Renders controller events in the order they arrive on the event channel.

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

use edgefl::{Attempt, RoundController, RoundEvent};

pub struct App {
    ctl: RoundController,
    events: UnboundedReceiver<RoundEvent>,
}

impl App {
    pub fn new(ctl: RoundController, events: UnboundedReceiver<RoundEvent>) -> Self {
        Self { ctl, events }
    }

    /// Interactive loop: Enter / `s` / `start` attempts a round, `q` quits.
    pub async fn run(&mut self) -> Result<()> {
        println!("{}", self.ctl.status());
        println!("[START] press Enter (q to quit)");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    match line.trim() {
                        "q" | "quit" => break,
                        "" | "s" | "start" => {
                            if let Attempt::Ignored = self.ctl.attempt_round().await {
                                println!("(round in progress – START disabled)");
                            }
                        }
                        other => println!("unknown command {other:?}; Enter starts, q quits"),
                    }
                }
                Some(ev) = self.events.recv() => render(&ev),
            }
        }
        Ok(())
    }

    /// One attempt, then exit after its terminal event.
    pub async fn run_once(&mut self) -> Result<()> {
        let handle = match self.ctl.attempt_round().await {
            Attempt::Started(h) => Some(h),
            Attempt::Skipped(_) => None,
            Attempt::Ignored => return Ok(()),
        };
        while let Some(ev) = self.events.recv().await {
            render(&ev);
            if ev.is_terminal() {
                break;
            }
        }
        if let Some(h) = handle {
            h.join().await?;
        }
        Ok(())
    }
}

fn render(ev: &RoundEvent) {
    println!("{}", ev.text());
    if let RoundEvent::Terminal {
        enable_start: true, ..
    } = ev
    {
        println!("[START] ready");
    }
}
