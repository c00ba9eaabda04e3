mod config;
mod eval;
mod global;
mod job;
mod parser;
mod search;
mod types;

use std::io;
use std::process;
use io::BufRead;
use io::Write;

use clap::Parser;
use log::debug;

/// What the read loop does after a line has been evaluated.
enum Flow {
	Continue(i32),
	Exit,
}

fn report(job: &job::Job) {
	let stdout = io::stdout();
	let mut stdout_locked = stdout.lock();
	for pr in &job.processes {
		let _ = writeln!(stdout_locked, "{}", pr);
	}
	let _ = stdout_locked.flush();
}

fn eval_line(state: &mut global::State, line: &[u8]) -> Flow {
	let parsed = parser::parse(line);
	debug!("parsed: {:?}", parsed);
	match parsed {
		Ok(types::Line::Empty) => Flow::Continue(0),
		Ok(types::Line::Exit) => Flow::Exit,
		Ok(types::Line::Pipeline(pipeline)) => match eval::execute(state, &pipeline) {
			Ok(job) => {
				report(&job);
				Flow::Continue(job.last_code().unwrap_or(126))
			},
			Err(e) => {
				let _ = writeln!(&mut io::stderr(), "pish: {}", e);
				Flow::Continue(126)
			},
		},
		Err(e) => {
			let _ = writeln!(&mut io::stderr(), "Invalid command: {}", e);
			Flow::Continue(2)
		},
	}
}

fn read_eval_loop(state: &mut global::State, prompt: Option<&[u8]>) -> i32 {
	let mut stdout = io::stdout();
	let stdin = io::stdin();
	let mut stdin_locked = stdin.lock();
	loop {
		if let Some(prompt) = prompt {
			let _ = stdout.write(prompt);
			let _ = stdout.flush();
		}
		let mut line: Vec<u8> = vec![];
		match stdin_locked.read_until(b'\n', &mut line) {
			Ok(0) => return 0,
			Ok(_) => {},
			Err(e) => {
				let _ = writeln!(&mut io::stderr(), "pish: failed to read input: {}", e);
				return 1;
			},
		}
		if let Flow::Exit = eval_line(state, &line) {
			return 0;
		}
	}
}

fn main() {
	env_logger::init();
	let config = config::Config::parse();
	let mut state = global::State::new();

	let code = match config.command {
		Some(ref line) => match eval_line(&mut state, line.as_bytes()) {
			Flow::Continue(code) => code,
			Flow::Exit => 0,
		},
		None => read_eval_loop(&mut state, config.prompt()),
	};
	process::exit(code)
}
