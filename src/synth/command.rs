use crate::audio::command::{CommandExecutor, SystemCommandExecutor};
use crate::error::{DubError, Result};
use crate::synth::Synthesizer;
use std::path::{Path, PathBuf};

/// Synthesizer that runs an external TTS program once per cue.
///
/// The argument template may contain `{text}` and `{out}`; they are replaced
/// with the cue text and the clip path to write.
#[derive(Debug)]
pub struct CommandSynthesizer<E: CommandExecutor = SystemCommandExecutor> {
    executor: E,
    program: String,
    args: Vec<String>,
}

impl CommandSynthesizer<SystemCommandExecutor> {
    /// Build from a `[program, args...]` template.
    pub fn from_template(template: &[String]) -> Result<Self> {
        Self::with_executor(SystemCommandExecutor::new(), template)
    }
}

impl<E: CommandExecutor> CommandSynthesizer<E> {
    pub fn with_executor(executor: E, template: &[String]) -> Result<Self> {
        let (program, args) = template
            .split_first()
            .ok_or_else(|| DubError::ConfigInvalidValue {
                key: "synthesis.command".to_string(),
                message: "command template is empty".to_string(),
            })?;
        Ok(Self {
            executor,
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn render_args(&self, text: &str, out: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace("{text}", text).replace("{out}", out))
            .collect()
    }
}

impl<E: CommandExecutor> Synthesizer for CommandSynthesizer<E> {
    fn synthesize(&self, text: &str, out: &Path) -> Result<PathBuf> {
        let out_str = out.to_str().ok_or_else(|| DubError::Audio {
            message: format!("path is not valid UTF-8: {}", out.display()),
        })?;
        let args = self.render_args(text, out_str);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        self.executor.execute(&self.program, &arg_refs)?;

        if !out.exists() {
            return Err(DubError::ToolFailed {
                tool: self.program.clone(),
                message: format!("no clip written to {}", out.display()),
            });
        }
        Ok(out.to_path_buf())
    }

    fn name(&self) -> &str {
        &self.program
    }
}
