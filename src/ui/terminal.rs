// Terminal front-end
//
// Interactive stand-ins for the editor dialogs: the import options window,
// the "Blender is not responding" prompt, and a listener that echoes
// pipeline progress to stderr.

use crate::models::{AnalysisResult, ImportOptions};
use crate::services::{OptionsPrompt, UnresponsivePrompt, WaitDecision};
use crate::state::{StateChange, StateManager};
use camino::Utf8Path;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// Source of answer lines
pub trait LineInput {
    fn read_answer(&mut self, buf: &mut String) -> io::Result<usize>;
}

impl<R: BufRead> LineInput for R {
    fn read_answer(&mut self, buf: &mut String) -> io::Result<usize> {
        self.read_line(buf)
    }
}

/// Process stdin, locked only for the duration of each read so several
/// prompts can share it
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinInput;

impl LineInput for StdinInput {
    fn read_answer(&mut self, buf: &mut String) -> io::Result<usize> {
        io::stdin().read_line(buf)
    }
}

/// Read a yes/no answer. Empty input picks `default`; `None` on EOF or I/O error.
fn ask_yes_no<R: LineInput, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
    default: bool,
) -> Option<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };

    loop {
        write!(output, "{} {} ", question, hint).ok()?;
        output.flush().ok()?;

        let mut line = String::new();
        match input.read_answer(&mut line) {
            Ok(0) | Err(_) => return None,
            Ok(_) => {}
        }

        match line.trim().to_ascii_lowercase().as_str() {
            "" => return Some(default),
            "y" | "yes" => return Some(true),
            "n" | "no" => return Some(false),
            _ => {
                writeln!(output, "Please answer y or n.").ok()?;
            }
        }
    }
}

/// Options dialog on a terminal.
///
/// Asks once per collection, then for the pivot mode, then for confirmation.
/// With `assume_defaults` nothing is read and the defaults are accepted.
pub struct TerminalOptionsPrompt<R, W> {
    input: R,
    output: W,
    assume_defaults: bool,
}

impl TerminalOptionsPrompt<StdinInput, io::Stderr> {
    pub fn stdio(assume_defaults: bool) -> Self {
        Self::new(StdinInput, io::stderr(), assume_defaults)
    }
}

impl<R: LineInput, W: Write> TerminalOptionsPrompt<R, W> {
    pub fn new(input: R, output: W, assume_defaults: bool) -> Self {
        Self {
            input,
            output,
            assume_defaults,
        }
    }

    fn default_options(analysis: &AnalysisResult, previous: &ImportOptions) -> ImportOptions {
        let collections = analysis.collections.iter().filter(|name| {
            previous.enabled_collections.is_empty() || previous.enabled_collections.contains(*name)
        });
        ImportOptions::new(previous.use_object_pivot).with_collections(collections.cloned())
    }

    fn ask(
        &mut self,
        source: &Utf8Path,
        analysis: &AnalysisResult,
        previous: &ImportOptions,
    ) -> Option<ImportOptions> {
        let out = &mut self.output;
        writeln!(out, "\nImport options for {}", source).ok()?;

        if analysis.has_material_warnings() {
            writeln!(
                out,
                "Material issues were detected, which may make your materials not display properly:\n{}",
                analysis.material_warning_text()
            )
            .ok()?;
        }

        let defaults = Self::default_options(analysis, previous);
        let mut options = ImportOptions::new(false);

        for name in &analysis.collections {
            let question = format!("  Include collection '{}'?", name);
            let default = defaults.enabled_collections.contains(name);
            if ask_yes_no(&mut self.input, &mut self.output, &question, default)? {
                options.enable_collection(name.clone());
            }
        }

        options.use_object_pivot = ask_yes_no(
            &mut self.input,
            &mut self.output,
            "  Export each object at its own pivot?",
            defaults.use_object_pivot,
        )?;

        ask_yes_no(&mut self.input, &mut self.output, "Proceed with import?", true)?
            .then_some(options)
    }
}

impl<R: LineInput, W: Write> OptionsPrompt for TerminalOptionsPrompt<R, W> {
    fn prompt_options(
        &mut self,
        source: &Utf8Path,
        analysis: &AnalysisResult,
        previous: &ImportOptions,
    ) -> Option<ImportOptions> {
        if self.assume_defaults {
            let options = Self::default_options(analysis, previous);
            tracing::info!("Using default import options: {}", options);
            return Some(options);
        }

        let options = self.ask(source, analysis, previous);
        if options.is_none() {
            tracing::info!("Import options cancelled for {}", source);
        }
        options
    }
}

/// Asks whether to keep waiting on a slow Blender
pub struct TerminalUnresponsivePrompt<R, W> {
    input: R,
    output: W,
    assume_wait: bool,
}

impl TerminalUnresponsivePrompt<StdinInput, io::Stderr> {
    pub fn stdio(assume_wait: bool) -> Self {
        Self::new(StdinInput, io::stderr(), assume_wait)
    }
}

impl<R: LineInput, W: Write> TerminalUnresponsivePrompt<R, W> {
    pub fn new(input: R, output: W, assume_wait: bool) -> Self {
        Self {
            input,
            output,
            assume_wait,
        }
    }
}

impl<R: LineInput, W: Write> UnresponsivePrompt for TerminalUnresponsivePrompt<R, W> {
    fn on_unresponsive(&mut self, elapsed: Duration) -> WaitDecision {
        if self.assume_wait {
            return WaitDecision::KeepWaiting;
        }

        let question = format!(
            "Blender has been running for {:.0}s and may be unresponsive. Keep waiting?",
            elapsed.as_secs_f64()
        );
        // EOF means nobody can answer; stopping Blender is the safe outcome
        match ask_yes_no(&mut self.input, &mut self.output, &question, true) {
            Some(true) => WaitDecision::KeepWaiting,
            Some(false) | None => WaitDecision::Terminate,
        }
    }
}

/// Echo import progress to stderr until the state manager goes away
pub fn spawn_progress_listener(state_manager: &Arc<StateManager>) -> JoinHandle<()> {
    let mut rx = state_manager.subscribe();

    std::thread::spawn(move || {
        tracing::debug!("Progress listener started");

        loop {
            match rx.blocking_recv() {
                Ok(change) => {
                    tracing::trace!("State change received: {:?}", change);
                    match change {
                        StateChange::ImportStarted { source } => {
                            eprintln!("==> Importing {}", source);
                        }
                        StateChange::StageChanged { stage } => {
                            eprintln!("    {:?}", stage);
                        }
                        StateChange::ExportSkipped { source } => {
                            eprintln!("    {} is unchanged, reusing the previous export", source);
                        }
                        StateChange::ImportFinished { succeeded, message } => {
                            let status = if succeeded { "done" } else { "failed" };
                            eprintln!("==> {}: {}", status, message);
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Progress listener lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => {
                    tracing::debug!("State broadcast channel closed - stopping progress listener");
                    break;
                }
            }
        }
    })
}
