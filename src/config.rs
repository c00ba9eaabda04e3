use clap::Parser;

const DEFAULT_PROMPT: &'static str = "> ";

/// A shell that runs one pipeline per line and reports every exit status.
#[derive(Debug, Parser)]
#[command(name = "pish", version)]
pub struct Config {
	/// Prompt written before each line is read
	#[arg(short, long, default_value = DEFAULT_PROMPT)]
	pub prompt: String,

	/// Do not write a prompt at all
	#[arg(long, conflicts_with = "prompt")]
	pub no_prompt: bool,

	/// Evaluate LINE, then exit with the last stage's exit status
	#[arg(short, long, value_name = "LINE")]
	pub command: Option<String>,
}

impl Config {
	pub fn prompt(&self) -> Option<&[u8]> {
		if self.no_prompt {
			None
		} else {
			Some(self.prompt.as_bytes())
		}
	}
}
