use std::convert::Infallible;
use std::ffi::{self, CStr, CString};
use std::fs;
use std::io::{self, Write};
use std::os::fd::{AsFd, AsRawFd, OwnedFd, RawFd};

use log::{debug, trace};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::unistd::{self, ForkResult, Pid};
use thiserror::Error;

use crate::global;
use crate::job;
use crate::types;

#[derive(Debug, Error)]
pub enum ExecError {
	#[error("{0}")]
	Nix(#[from] nix::Error),
	#[error("nul byte in command line: {0}")]
	Nul(#[from] ffi::NulError),
}

/// Failures on the child side of the fork. They never reach the shell; each
/// one only decides the child's exit status.
#[derive(Debug, Error)]
enum ChildError<'a> {
	#[error("failed to reset SIGPIPE: {0}")]
	Setup(nix::Error),
	#[error("failed to open {}: {}", .0.to_string_lossy(), .1)]
	Redirect(&'a CStr, io::Error),
	#[error("failed to redirect standard stream: {0}")]
	Dup(nix::Error),
	#[error("command not found: {}", .0.to_string_lossy())]
	NotFound(&'a CStr),
	#[error("failed to run {}: {}", .0.to_string_lossy(), .1)]
	Exec(&'a CStr, nix::Error),
}

impl<'a> ChildError<'a> {
	fn status(&self) -> libc::c_int {
		match *self {
			ChildError::Setup(_) | ChildError::Redirect(..) | ChildError::Dup(_) => 1,
			ChildError::NotFound(_) | ChildError::Exec(_, Errno::ENOENT) => 127,
			ChildError::Exec(..) => 126,
		}
	}
}

/// A command with everything the child needs converted before the fork.
#[derive(Debug)]
struct Program {
	name: Vec<u8>,
	path: Option<CString>,
	argv: Vec<CString>,
	input: Option<CString>,
	output: Option<CString>,
}

impl Program {
	fn prepare(state: &mut global::State, command: &types::Command) -> Result<Program, ExecError> {
		let argv: Result<Vec<CString>, ffi::NulError> = command.arguments.iter().map(|&s| CString::new(s)).collect();
		let argv = argv?;
		let path = state.search_cache.resolve(&argv[0]);
		let input = command.input.map(CString::new).transpose()?;
		let output = command.output.map(CString::new).transpose()?;
		Ok(Program { name: command.name().to_vec(), path: path, argv: argv, input: input, output: output })
	}
}

/// Pipe ends a child takes over as its standard streams. Whatever the spawn
/// receives here is closed in the parent once the child exists.
#[derive(Debug)]
struct Stdio {
	stdin: Option<OwnedFd>,
	stdout: Option<OwnedFd>,
}

fn open_redirect<'a>(path: &'a CStr, oopt: &fs::OpenOptions) -> Result<fs::File, ChildError<'a>> {
	use std::os::unix::ffi::OsStrExt;
	oopt.open(ffi::OsStr::from_bytes(path.to_bytes())).map_err(|e| ChildError::Redirect(path, e))
}

fn dup_onto<'a, Fd: AsFd>(fd: Fd, target: RawFd) -> Result<(), ChildError<'a>> {
	let r = unsafe { libc::dup2(fd.as_fd().as_raw_fd(), target) };
	Errno::result(r).map(drop).map_err(ChildError::Dup)
}

fn do_exec_program<'a>(program: &'a Program, stdio: Stdio) -> Result<Infallible, ChildError<'a>> {
	unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) }.map_err(ChildError::Setup)?;

	if let Some(ref input) = program.input {
		let file = open_redirect(input, fs::OpenOptions::new().read(true))?;
		dup_onto(&file, libc::STDIN_FILENO)?;
	}
	if let Some(ref output) = program.output {
		use std::os::unix::fs::OpenOptionsExt;
		let file = open_redirect(output, fs::OpenOptions::new().write(true).create(true).truncate(true).mode(0o666))?;
		dup_onto(&file, libc::STDOUT_FILENO)?;
	}
	// Pipe ends are applied last so they take precedence over files.
	let Stdio { stdin, stdout } = stdio;
	if let Some(fd) = stdout {
		dup_onto(&fd, libc::STDOUT_FILENO)?;
	}
	if let Some(fd) = stdin {
		dup_onto(&fd, libc::STDIN_FILENO)?;
	}

	let path = match program.path {
		Some(ref path) => path,
		None => return Err(ChildError::NotFound(&program.argv[0])),
	};
	unistd::execv(path, &program.argv).map_err(|e| ChildError::Exec(path, e))
}

fn exec_program(program: &Program, stdio: Stdio) -> ! {
	let s = match do_exec_program(program, stdio) {
		Ok(never) => match never {},
		Err(e) => {
			let _ = writeln!(&mut io::stderr(), "pish: {}", e);
			e.status()
		},
	};
	unsafe { libc::_exit(s) }
}

/// Forks a child running `program` with `stdio` bound to its standard
/// streams. The parent's copies of those descriptors are released on return.
fn spawn(program: &Program, stdio: Stdio) -> nix::Result<Pid> {
	match unsafe { unistd::fork() }? {
		ForkResult::Parent { child } => Ok(child),
		ForkResult::Child => exec_program(program, stdio),
	}
}

/// Spawns one stage reading from `stdin`, and returns its pid together with
/// the read end the following stage has to take as its standard input.
fn spawn_stage(program: &Program, stdin: Option<OwnedFd>, is_last: bool) -> Result<(Pid, Option<OwnedFd>), ExecError> {
	let (next_stdin, stdout) = if is_last {
		(None, None)
	} else {
		let (pipe_read, pipe_write) = unistd::pipe2(OFlag::O_CLOEXEC)?;
		trace!("pipe {:?} -> {:?}", pipe_write, pipe_read);
		(Some(pipe_read), Some(pipe_write))
	};
	let pid = spawn(program, Stdio { stdin: stdin, stdout: stdout })?;
	debug!("spawned {} as pid {}", String::from_utf8_lossy(&program.name), pid);
	Ok((pid, next_stdin))
}

fn spawn_programs(programs: &[Program], job: &mut job::Job) -> Result<(), ExecError> {
	let last = programs.len() - 1;
	programs.iter().enumerate().try_fold(None, |stdin, (i, program)| {
		let (pid, next_stdin) = spawn_stage(program, stdin, i == last)?;
		job.push(&program.name, pid);
		Ok::<_, ExecError>(next_stdin)
	})?;
	Ok(())
}

/// Runs every stage of `pipeline` and waits for all of them.
///
/// Nothing is spawned if a stage cannot be converted for exec. If a pipe or
/// fork fails, the remaining stages are skipped but the children already
/// running are still waited on and end up in the returned job.
pub fn execute(state: &mut global::State, pipeline: &types::Pipeline) -> Result<job::Job, ExecError> {
	assert!(pipeline.commands.len() > 0);

	let programs: Result<Vec<Program>, ExecError> = pipeline.commands.iter().map(|c| Program::prepare(state, c)).collect();
	let programs = programs?;

	let mut job = job::Job::new(programs.len());
	if let Err(e) = spawn_programs(&programs, &mut job) {
		let _ = writeln!(&mut io::stderr(), "pish: {}", e);
	}
	job.wait();
	Ok(job)
}
