//! Immutable description of one subprocess call.

use std::path::{Path, PathBuf};

use super::assembler::CommandLine;
use super::error::CommandError;
use super::escape::Platform;

/// Program plus final argument list, frozen once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: PathBuf,
    args: Vec<String>,
    inputs: Vec<PathBuf>,
    outputs: Vec<(usize, PathBuf)>,
}

impl Invocation {
    /// An invocation of an arbitrary program with a ready argument list.
    pub fn from_args<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub(crate) fn from_parts(
        program: PathBuf,
        args: Vec<String>,
        inputs: Vec<PathBuf>,
        outputs: Vec<(usize, PathBuf)>,
    ) -> Self {
        Self {
            program,
            args,
            inputs,
            outputs,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Input paths in command-line order.
    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    /// `(index, path)` for every output.
    pub fn outputs(&self) -> &[(usize, PathBuf)] {
        &self.outputs
    }

    /// Program and arguments, escaped for the given shell.
    pub fn to_shell_string(&self, platform: Platform) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(platform.escape(&self.program.to_string_lossy()));
        parts.extend(self.args.iter().map(|a| platform.escape(a)));
        parts.join(" ")
    }
}

#[derive(Debug, Clone)]
struct InputSpec {
    path: PathBuf,
    commands: CommandLine,
}

#[derive(Debug, Clone)]
struct OutputSpec {
    path: PathBuf,
    commands: CommandLine,
}

/// Collects the parts of an ffmpeg invocation in order:
/// pre-input commands, inputs, per-output commands and paths, post-output
/// commands.
#[derive(Debug, Clone)]
pub struct InvocationBuilder {
    program: PathBuf,
    pre_input: CommandLine,
    inputs: Vec<InputSpec>,
    outputs: Vec<OutputSpec>,
    post_output: CommandLine,
}

impl InvocationBuilder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            pre_input: CommandLine::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            post_output: CommandLine::new(),
        }
    }

    pub fn pre_input(&mut self, commands: &CommandLine) -> &mut Self {
        self.pre_input.extend(commands);
        self
    }

    pub fn add_pre_input(&mut self, flag: &str, value: Option<&str>) -> &mut Self {
        self.pre_input.push(flag, value);
        self
    }

    pub fn input(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.input_with(path, CommandLine::new())
    }

    /// Adds an input preceded by its own input options (`-ss`, `-f`, ...).
    pub fn input_with(&mut self, path: impl Into<PathBuf>, commands: CommandLine) -> &mut Self {
        self.inputs.push(InputSpec {
            path: path.into(),
            commands,
        });
        self
    }

    /// Adds an output; returns its index.
    pub fn output(&mut self, path: impl Into<PathBuf>, commands: CommandLine) -> usize {
        self.outputs.push(OutputSpec {
            path: path.into(),
            commands,
        });
        self.outputs.len() - 1
    }

    pub fn add_post_output(&mut self, flag: &str, value: Option<&str>) -> &mut Self {
        self.post_output.push(flag, value);
        self
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Freezes the builder into an [`Invocation`].
    pub fn build(&self) -> Result<Invocation, CommandError> {
        if self.program.as_os_str().is_empty() {
            return Err(CommandError::InvalidInvocation {
                reason: "program path is empty".to_string(),
            });
        }
        if self.outputs.is_empty() {
            return Err(CommandError::InvalidInvocation {
                reason: "at least one output is required".to_string(),
            });
        }

        let mut args = self.pre_input.to_args();
        for input in &self.inputs {
            args.extend(input.commands.to_args());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().into_owned());
        }
        for output in &self.outputs {
            args.extend(output.commands.to_args());
            args.push(output.path.to_string_lossy().into_owned());
        }
        args.extend(self.post_output.to_args());

        Ok(Invocation {
            program: self.program.clone(),
            args,
            inputs: self.inputs.iter().map(|i| i.path.clone()).collect(),
            outputs: self
                .outputs
                .iter()
                .enumerate()
                .map(|(index, o)| (index, o.path.clone()))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_orders_arguments() {
        let mut seek = CommandLine::new();
        seek.push("-ss", Some("10"));
        let mut video = CommandLine::new();
        video.push("-codec:v", Some("libx264"));
        let mut audio = CommandLine::new();
        audio.push("-vn", None);

        let mut builder = InvocationBuilder::new("ffmpeg");
        builder
            .add_pre_input("-y", None)
            .input_with("/in/movie.mkv", seek)
            .input("/in/cover.png");
        assert_eq!(builder.output("/out/movie.mp4", video), 0);
        assert_eq!(builder.output("/out/audio.m4a", audio), 1);
        builder.add_post_output("-benchmark", None);

        let invocation = builder.build().unwrap();
        assert_eq!(
            invocation.args(),
            &[
                "-y",
                "-ss",
                "10",
                "-i",
                "/in/movie.mkv",
                "-i",
                "/in/cover.png",
                "-codec:v",
                "libx264",
                "/out/movie.mp4",
                "-vn",
                "/out/audio.m4a",
                "-benchmark",
            ]
        );
        assert_eq!(invocation.inputs().len(), 2);
        assert_eq!(invocation.outputs()[1], (1, PathBuf::from("/out/audio.m4a")));
    }

    #[test]
    fn test_build_requires_output() {
        let mut builder = InvocationBuilder::new("ffmpeg");
        builder.input("/in.mp4");
        assert!(matches!(
            builder.build(),
            Err(CommandError::InvalidInvocation { .. })
        ));
    }

    #[test]
    fn test_shell_string_escapes_paths() {
        let mut builder = InvocationBuilder::new("/usr/bin/ffmpeg");
        builder.input("/videos/my clip.mov");
        builder.output("/videos/out.mp4", CommandLine::new());
        let invocation = builder.build().unwrap();

        assert_eq!(
            invocation.to_shell_string(Platform::Posix),
            "/usr/bin/ffmpeg -i '/videos/my clip.mov' /videos/out.mp4"
        );
    }

    #[test]
    fn test_from_args() {
        let invocation = Invocation::from_args("sh", ["-c", "echo hello"]);
        assert_eq!(invocation.program(), Path::new("sh"));
        assert_eq!(
            invocation.to_shell_string(Platform::Posix),
            "sh -c 'echo hello'"
        );
        assert!(invocation.outputs().is_empty());
    }
}
